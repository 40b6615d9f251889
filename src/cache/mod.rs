//! Processed-frame cache shared by export jobs and preview sessions.

mod store;

pub use store::{CacheKey, CacheStats, FrameCache};
