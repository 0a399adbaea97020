//! Size thresholds, ladders and wire constants for the upload pipeline.

/// One mebibyte. All "MB" figures in this crate are binary.
pub const MB: u64 = 1024 * 1024;

/// Videos at or above this size are run through the video transcoder.
pub const VIDEO_TRANSCODE_THRESHOLD_BYTES: u64 = 20 * MB;

/// Hard ceiling for a video after (optional) transcoding.
pub const MAX_VIDEO_BYTES: u64 = 500 * MB;

/// Output budget for every image kind, and its hard ceiling after compression.
pub const IMAGE_BYTE_BUDGET: u64 = 5 * MB;

/// Files larger than this are sent in the smaller chunk size.
pub const LARGE_FILE_THRESHOLD_BYTES: u64 = 50 * MB;

pub const LARGE_FILE_CHUNK_BYTES: u64 = 3 * MB;
pub const DEFAULT_CHUNK_BYTES: u64 = 5 * MB;

/// Above this many chunks the per-request timeout is doubled.
pub const MANY_CHUNKS_THRESHOLD: u32 = 10;

/// JPEG quality steps tried in order (0.0-1.0).
pub const IMAGE_QUALITY_LADDER: [f32; 7] = [0.85, 0.70, 0.55, 0.40, 0.25, 0.15, 0.10];

/// Longer-edge ceilings for thumbnails, largest first.
pub const THUMBNAIL_DIMENSION_LADDER: [u32; 5] = [800, 600, 500, 400, 300];

/// Longer-edge ceilings for full-size images (sector photos).
pub const IMAGE_DIMENSION_LADDER: [u32; 2] = [1920, 1080];

pub const VIDEO_MAX_WIDTH: u32 = 1920;
pub const VIDEO_MIN_BITRATE_KBPS: u32 = 2000;
/// Target bitrate grows by this much per 1000px of output width.
pub const VIDEO_KBPS_PER_1000_PX: u32 = 4000;
/// A transcoded video is kept only when it is at most this fraction of the source.
pub const VIDEO_MAX_OUTPUT_RATIO: f64 = 0.9;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

pub const ALLOWED_VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-matroska",
];

/// Request headers of the chunked transfer protocol.
pub mod headers {
    pub const FILE_NAME: &str = "x-file-name";
    pub const FILE_SIZE: &str = "x-file-size";
    pub const FILE_TYPE: &str = "x-file-type";
    pub const CHUNK_INDEX: &str = "x-chunk-index";
    pub const TOTAL_CHUNKS: &str = "x-total-chunks";
    pub const SESSION_ID: &str = "x-session-id";
    pub const TARGET_ID: &str = "x-target-id";
}
