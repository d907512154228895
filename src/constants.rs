//! Global constants for stripefs
//!
//! This module centralizes commonly used constants across the codebase
//! to improve maintainability and reduce duplication.

/// Maximum path length for file operations (4KB)
///
/// This is a reasonable limit that prevents excessive memory allocation
/// while supporting very long paths if needed.
pub const MAX_PATH_LENGTH: usize = 4096;
