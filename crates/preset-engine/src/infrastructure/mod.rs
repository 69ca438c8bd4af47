//! Infrastructure layer: adapters to the outside world.
//!
//! Nothing in here decides *which* preset applies or *how* settings merge;
//! that is the application layer's job.  This layer only moves bytes
//! (preset files, the config file) and delivers notices.

pub mod notify;
pub mod storage;
