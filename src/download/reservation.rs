//! In-flight output reservations.
//!
//! Two downloads writing the same output would corrupt each other's partial
//! fragments. [`Reservations`] is a keyed table of outputs currently being
//! written; a [`ReservationGuard`] holds one key and frees it when dropped,
//! whatever path the download took.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace};

use super::template::custom_output_name;

/// Identity of the output a request writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    /// A caller-chosen name inside the output directory.
    Named(PathBuf),
    /// A title-derived name, unknown until the engine runs; keyed by the
    /// resolved URL instead.
    Titled {
        /// Output directory.
        dir: PathBuf,
        /// Resolved URL.
        url: String,
    },
}

impl OutputTarget {
    /// Derives the target of a request.
    ///
    /// A custom name without an extension ends up with the merge container's,
    /// so `lecture` and `lecture.mp4` name the same file when merging to mp4.
    #[must_use]
    pub fn for_request(
        output_dir: &Path,
        custom_name: Option<&str>,
        url: &str,
        merge_format: &str,
    ) -> Self {
        let dir = std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());
        match custom_output_name(custom_name) {
            Some(name) if Path::new(&name).extension().is_none() => {
                Self::Named(dir.join(format!("{name}.{merge_format}")))
            }
            Some(name) => Self::Named(dir.join(name)),
            None => Self::Titled {
                dir,
                url: url.trim().to_string(),
            },
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(path) => write!(f, "{}", path.display()),
            Self::Titled { dir, url } => write!(f, "{url} (into {})", dir.display()),
        }
    }
}

/// Table of outputs currently being written.
///
/// Share it between orchestrators with `Arc` to guard them against each other.
#[derive(Debug, Default)]
pub struct Reservations {
    in_flight: DashMap<OutputTarget, Instant>,
}

impl Reservations {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `target`, or returns `None` when it is already held.
    #[must_use]
    pub fn try_reserve(&self, target: OutputTarget) -> Option<ReservationGuard<'_>> {
        match self.in_flight.entry(target.clone()) {
            Entry::Occupied(held) => {
                debug!(
                    output = %target,
                    held_ms = held.get().elapsed().as_millis(),
                    "Output already reserved"
                );
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                trace!(output = %target, "Output reserved");
                Some(ReservationGuard {
                    table: self,
                    target,
                })
            }
        }
    }

    /// Whether `target` is currently held.
    #[must_use]
    pub fn is_reserved(&self, target: &OutputTarget) -> bool {
        self.in_flight.contains_key(target)
    }

    /// Number of held reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Holds one reservation; releases it on drop.
#[derive(Debug)]
pub struct ReservationGuard<'a> {
    table: &'a Reservations,
    target: OutputTarget,
}

impl ReservationGuard<'_> {
    /// The reserved target.
    #[must_use]
    pub fn target(&self) -> &OutputTarget {
        &self.target
    }
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        self.table.in_flight.remove(&self.target);
        trace!(output = %self.target, "Output released");
    }
}
