use super::handle::Image;
use super::operations::gaussian_blur;
use imagehandler_core::ModerationResult;

const DEFAULT_BLUR_RADIUS: f64 = 50.0;
const MIN_BLUR_RADIUS: f64 = 0.3;
const MAX_BLUR_RADIUS: f64 = 1000.0;

/// Decides whether flagged content gets blurred, and how strongly
pub struct ModerationBlurPolicy;

impl ModerationBlurPolicy {
    /// Blur sigma to apply, or `None` to leave the image untouched.
    ///
    /// The radius defaults to 50 and is rounded up; both the requested value and
    /// its ceiling must lie in [0.3, 1000]. With an allowlist the first detected
    /// label that appears in it triggers the blur; without one any label does.
    pub fn blur_radius(
        requested: Option<f64>,
        allowlist: Option<&[String]>,
        found: &ModerationResult,
    ) -> Option<f32> {
        let requested = requested.unwrap_or(DEFAULT_BLUR_RADIUS);
        let effective = requested.ceil();
        if !(Self::in_range(requested) && Self::in_range(effective)) {
            return None;
        }

        let triggered = match allowlist {
            Some(labels) => found
                .label_names()
                .any(|name| labels.iter().any(|label| label == name)),
            None => !found.is_empty(),
        };

        triggered.then_some(effective as f32)
    }

    fn in_range(radius: f64) -> bool {
        (MIN_BLUR_RADIUS..=MAX_BLUR_RADIUS).contains(&radius)
    }

    pub fn apply(
        image: Image,
        requested: Option<f64>,
        allowlist: Option<&[String]>,
        found: &ModerationResult,
    ) -> Image {
        match Self::blur_radius(requested, allowlist, found) {
            Some(sigma) => {
                tracing::debug!(
                    sigma = sigma,
                    labels = found.moderation_labels.len(),
                    "Blurring moderated content"
                );
                image.map_frames(|frame| gaussian_blur(&frame, sigma))
            }
            None => image,
        }
    }
}
