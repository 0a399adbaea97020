use crux_core::constants::{
    IMAGE_BYTE_BUDGET, IMAGE_DIMENSION_LADDER, MAX_VIDEO_BYTES, THUMBNAIL_DIMENSION_LADDER,
    VIDEO_TRANSCODE_THRESHOLD_BYTES,
};
use crux_core::{CompressionPlan, MediaKind};

/// Decides whether a source is transcoded and which budget applies.
pub struct CompressionPlanner;

impl CompressionPlanner {
    pub fn plan(kind: MediaKind, size_bytes: u64) -> CompressionPlan {
        match kind {
            MediaKind::Video => CompressionPlan {
                should_transcode: size_bytes >= VIDEO_TRANSCODE_THRESHOLD_BYTES,
                byte_budget: None,
                dimension_ladder: None,
                max_accepted_bytes: MAX_VIDEO_BYTES,
            },
            MediaKind::Thumbnail => CompressionPlan {
                should_transcode: true,
                byte_budget: Some(IMAGE_BYTE_BUDGET),
                dimension_ladder: Some(&THUMBNAIL_DIMENSION_LADDER),
                max_accepted_bytes: IMAGE_BYTE_BUDGET,
            },
            MediaKind::Image => CompressionPlan {
                should_transcode: true,
                byte_budget: Some(IMAGE_BYTE_BUDGET),
                dimension_ladder: Some(&IMAGE_DIMENSION_LADDER),
                max_accepted_bytes: IMAGE_BYTE_BUDGET,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_core::constants::MB;

    #[test]
    fn test_small_video_is_not_transcoded() {
        let plan = CompressionPlanner::plan(MediaKind::Video, 15 * MB);
        assert!(!plan.should_transcode);
        assert_eq!(plan.byte_budget, None);
        assert_eq!(plan.max_accepted_bytes, 500 * MB);
    }

    #[test]
    fn test_video_threshold_is_inclusive() {
        assert!(CompressionPlanner::plan(MediaKind::Video, 20 * MB).should_transcode);
        assert!(!CompressionPlanner::plan(MediaKind::Video, 20 * MB - 1).should_transcode);
    }

    #[test]
    fn test_images_always_transcode() {
        let thumb = CompressionPlanner::plan(MediaKind::Thumbnail, 10);
        assert!(thumb.should_transcode);
        assert_eq!(thumb.byte_budget, Some(5 * MB));
        assert_eq!(thumb.dimension_ladder, Some(&[800u32, 600, 500, 400, 300][..]));

        let image = CompressionPlanner::plan(MediaKind::Image, 10 * MB);
        assert!(image.should_transcode);
        assert_eq!(image.dimension_ladder, Some(&[1920u32, 1080][..]));
    }
}
