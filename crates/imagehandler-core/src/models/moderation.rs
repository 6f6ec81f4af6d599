use serde::{Deserialize, Serialize};

/// One classification returned by the moderation collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationLabel {
    pub label_name: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
}

impl ModerationLabel {
    pub fn new(label_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            label_name: label_name.into(),
            confidence,
            parent_name: None,
        }
    }
}

/// Labels detected on an image, in the order the detector reported them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    #[serde(default)]
    pub moderation_labels: Vec<ModerationLabel>,
}

impl ModerationResult {
    pub fn new(moderation_labels: Vec<ModerationLabel>) -> Self {
        Self { moderation_labels }
    }

    pub fn is_empty(&self) -> bool {
        self.moderation_labels.is_empty()
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.moderation_labels.iter().map(|l| l.label_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_result_deserialize() {
        let result: ModerationResult = serde_json::from_str(
            r#"{"moderationLabels":[{"labelName":"Explicit Nudity","confidence":98.5}]}"#,
        )
        .unwrap();
        assert_eq!(result.moderation_labels.len(), 1);
        assert_eq!(
            result.label_names().collect::<Vec<_>>(),
            vec!["Explicit Nudity"]
        );
    }

    #[test]
    fn test_missing_labels_is_empty() {
        let result: ModerationResult = serde_json::from_str("{}").unwrap();
        assert!(result.is_empty());
    }
}
