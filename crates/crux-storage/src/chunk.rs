use crux_core::constants::{DEFAULT_CHUNK_BYTES, LARGE_FILE_CHUNK_BYTES, LARGE_FILE_THRESHOLD_BYTES};
use crux_core::ChunkPlan;
use uuid::Uuid;

/// Splits a final file size into a transfer plan.
pub struct ChunkPlanner;

impl ChunkPlanner {
    pub fn plan(final_size: u64) -> ChunkPlan {
        let chunk_size_bytes = if final_size > LARGE_FILE_THRESHOLD_BYTES {
            LARGE_FILE_CHUNK_BYTES
        } else {
            DEFAULT_CHUNK_BYTES
        };
        let total_chunks = final_size.div_ceil(chunk_size_bytes).max(1) as u32;

        ChunkPlan {
            file_size: final_size,
            chunk_size_bytes,
            total_chunks,
            session_id: (total_chunks > 1).then(Self::new_session_id),
        }
    }

    /// Same plan under a new session id, used when a chunk sequence restarts.
    pub fn with_fresh_session(plan: &ChunkPlan) -> ChunkPlan {
        ChunkPlan {
            session_id: plan.session_id.as_ref().map(|_| Self::new_session_id()),
            ..plan.clone()
        }
    }

    fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }
}
