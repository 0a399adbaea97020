use crux_core::constants::{ALLOWED_IMAGE_TYPES, ALLOWED_VIDEO_TYPES};
use crux_core::{CompressionPlan, MediaKind, UploadError, UploadTask};

/// Validation errors for upload sources and final payloads
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError::Validation(err.to_string())
    }
}

/// Media validator
///
/// MIME checks run before any work; the size ceiling is checked on the final
/// (possibly transcoded) bytes right before transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaValidator;

impl MediaValidator {
    pub fn allowed_types(kind: MediaKind) -> &'static [&'static str] {
        match kind {
            MediaKind::Video => ALLOWED_VIDEO_TYPES,
            MediaKind::Image | MediaKind::Thumbnail => ALLOWED_IMAGE_TYPES,
        }
    }

    pub fn validate_task(&self, task: &UploadTask) -> Result<(), ValidationError> {
        if task.source_len() == 0 {
            return Err(ValidationError::EmptyFile);
        }

        let allowed = Self::allowed_types(task.kind());
        if !allowed.contains(&task.mime_type()) {
            return Err(ValidationError::InvalidContentType {
                content_type: task.mime_type().to_string(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            });
        }

        Ok(())
    }

    pub fn validate_final_size(
        &self,
        size: u64,
        plan: &CompressionPlan,
    ) -> Result<(), ValidationError> {
        if size > plan.max_accepted_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: plan.max_accepted_bytes,
            });
        }
        Ok(())
    }
}
