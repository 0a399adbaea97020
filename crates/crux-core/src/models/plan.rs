use bytes::Bytes;
use std::ops::Range;

/// Whether (and how hard) a source is transcoded before transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionPlan {
    pub should_transcode: bool,
    /// Encoded size the transcoder aims for. `None` means "smaller is better".
    pub byte_budget: Option<u64>,
    /// Longer-edge ceilings, largest first. Images only.
    pub dimension_ladder: Option<&'static [u32]>,
    /// Final size above which the upload fails validation.
    pub max_accepted_bytes: u64,
}

/// Output of a transcoder call.
///
/// Invariant: `output.len() <= source len`, or `transcoded == false` and the output is
/// the source verbatim.
#[derive(Debug, Clone)]
pub struct TranscodeResult {
    pub output: Bytes,
    pub width: u32,
    pub height: u32,
    pub orientation_corrected: bool,
    pub transcoded: bool,
    /// Quality step that produced the output (images only).
    pub quality: Option<f32>,
    /// Longer-edge ceiling that produced the output (images only).
    pub max_edge: Option<u32>,
}

impl TranscodeResult {
    /// The untouched source, used whenever transcoding does not pay off.
    pub fn passthrough(source: Bytes, width: u32, height: u32) -> Self {
        Self {
            output: source,
            width,
            height,
            orientation_corrected: false,
            transcoded: false,
            quality: None,
            max_edge: None,
        }
    }

    pub fn output_len(&self) -> u64 {
        self.output.len() as u64
    }
}

/// How a final file is split for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size_bytes: u64,
    pub total_chunks: u32,
    /// Present iff `total_chunks > 1`.
    pub session_id: Option<String>,
}

impl ChunkPlan {
    pub fn is_single_shot(&self) -> bool {
        self.total_chunks <= 1
    }

    /// Byte range of chunk `index`. The last chunk may be short.
    pub fn chunk_range(&self, index: u32) -> Range<u64> {
        let start = (index as u64 * self.chunk_size_bytes).min(self.file_size);
        let end = (start + self.chunk_size_bytes).min(self.file_size);
        start..end
    }
}
