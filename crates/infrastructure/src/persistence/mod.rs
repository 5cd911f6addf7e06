//! File-backed persistence.

mod session_cache;

pub use session_cache::FileSessionCache;
