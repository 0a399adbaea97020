use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of asset being uploaded. Drives compression and progress weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    /// Full-size photo (e.g. a sector image).
    Image,
    /// Small preview image (video thumbnails, boulder thumbnails).
    Thumbnail,
}

impl MediaKind {
    pub fn is_image(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Thumbnail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file the caller wants uploaded. Immutable once built.
#[derive(Debug, Clone)]
pub struct UploadTask {
    id: Uuid,
    source: Bytes,
    file_name: String,
    mime_type: String,
    kind: MediaKind,
    target_entity_id: Option<String>,
}

impl UploadTask {
    pub fn new(
        source: impl Into<Bytes>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into().to_lowercase(),
            kind,
            target_entity_id: None,
        }
    }

    /// Associate the upload with a server-side record.
    pub fn with_target(mut self, target_entity_id: impl Into<String>) -> Self {
        self.target_entity_id = Some(target_entity_id.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cheap clone of the source bytes.
    pub fn source(&self) -> Bytes {
        self.source.clone()
    }

    pub fn source_len(&self) -> u64 {
        self.source.len() as u64
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn target_entity_id(&self) -> Option<&str> {
        self.target_entity_id.as_deref()
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_accessors() {
        let task = UploadTask::new(vec![1u8, 2, 3], "clip.MP4", "Video/MP4", MediaKind::Video)
            .with_target("route-42");
        assert_eq!(task.source_len(), 3);
        assert_eq!(task.mime_type(), "video/mp4");
        assert_eq!(task.target_entity_id(), Some("route-42"));
        assert_eq!(task.extension().as_deref(), Some("mp4"));
        assert_eq!(task.kind().to_string(), "video");
    }

    #[test]
    fn test_extension_edge_cases() {
        let no_ext = UploadTask::new(Vec::new(), "README", "image/png", MediaKind::Image);
        assert_eq!(no_ext.extension(), None);
        let dotfile = UploadTask::new(Vec::new(), ".hidden", "image/png", MediaKind::Image);
        assert_eq!(dotfile.extension(), None);
    }

    #[test]
    fn test_image_kinds() {
        assert!(MediaKind::Image.is_image());
        assert!(MediaKind::Thumbnail.is_image());
        assert!(!MediaKind::Video.is_image());
    }
}
