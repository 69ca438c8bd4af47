//! Generation tokens for overlapping resolve+apply requests.
//!
//! # Why generations? (for beginners)
//!
//! When the user clicks through notes quickly, several "resolve the preset
//! for this note, then apply it" requests can be in flight at once.  Each one
//! awaits a store read, and a slow read for an *earlier* note may complete
//! after a fast read for the *latest* note.  Applying it would show the
//! wrong preset.
//!
//! Every request therefore takes a [`Generation`] from the counter when it
//! starts.  When it completes it asks [`GenerationCounter::is_current`]; if a
//! newer request has started in the meantime the result is discarded.  The
//! underlying I/O is never cancelled, only its result.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU64` internally, so requests started from several
//! tasks or threads still receive distinct, strictly increasing generations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token identifying one resolve+apply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A thread-safe, monotonically increasing generation counter.
///
/// The first generation handed out is 1; 0 means "nothing started yet".
///
/// # Examples
///
/// ```rust
/// use preset_core::GenerationCounter;
///
/// let counter = GenerationCounter::new();
/// let first = counter.begin();
/// let second = counter.begin();
/// assert!(!counter.is_current(first));
/// assert!(counter.is_current(second));
/// ```
#[derive(Debug, Default)]
pub struct GenerationCounter {
    latest: AtomicU64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request and returns its generation.
    ///
    /// `AcqRel` so a completion that observes the new value also observes
    /// everything the starting task wrote before calling `begin`.
    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The most recently issued generation.
    pub fn latest(&self) -> Generation {
        Generation(self.latest.load(Ordering::Acquire))
    }

    /// Returns `true` if no request has started since `generation`.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest() == generation
    }
}
