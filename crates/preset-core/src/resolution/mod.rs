//! Preset resolution: which preset applies to a subject, and which
//! resolution request is the current one.
//!
//! - **`resolver`** – Longest-prefix ancestor walk over the mapping tables
//!   with fallback to the global preset and finally to `"default"`.
//! - **`generation`** – Monotonic counter tagging each resolve+apply request
//!   so a slow earlier lookup cannot clobber a faster later one.

pub mod generation;
pub mod resolver;
