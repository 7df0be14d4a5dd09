//! Observable orchestrator state and lifecycle events.

use vicinity_core::DataSource;

/// Loading state of the active generation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing fetched yet.
    #[default]
    Idle,
    /// A phase is in flight.
    Loading {
        /// Ring radius being fetched.
        phase: u32,
        /// Whether this is the first phase, which callers usually wait for.
        blocking: bool,
    },
    /// Every phase merged.
    Done,
    /// The generation was cancelled without a successor.
    Aborted,
    /// A phase failed; later phases were not attempted.
    Failed {
        /// User-visible reason.
        message: String,
    },
}

impl LoadState {
    /// Whether the first phase of the active generation is still in flight.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::Loading { blocking: true, .. })
    }

    /// Whether any phase is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

/// How a fetch ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every phase merged.
    Completed {
        /// Generation that completed.
        generation: u64,
        /// Ring radius actually reached after capping.
        radius: u32,
        /// Tiles requested from the service across all phases.
        requested_tiles: usize,
    },
    /// A newer generation or an abort took over; results were discarded.
    Superseded {
        /// Generation that was discarded.
        generation: u64,
    },
}

/// Why accumulated state was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The scoring configuration or another score-shaping option changed.
    ConfigChanged,
    /// The viewport moved too far for tiles to be reused.
    ZoomChanged,
}

/// Lifecycle notifications emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefetchEvent {
    /// A generation began.
    Started {
        /// New generation.
        generation: u64,
        /// Tiles in the viewport.
        viewport_tiles: usize,
    },
    /// Accumulated points and POIs were discarded.
    Cleared {
        /// Generation that discarded them.
        generation: u64,
        /// Trigger.
        reason: ClearReason,
    },
    /// A phase was merged and pruned.
    PhaseMerged {
        /// Owning generation.
        generation: u64,
        /// Ring radius of the phase.
        phase: u32,
        /// Tiles requested in this phase; zero when every tile was held.
        requested_tiles: usize,
        /// Points held after merging and pruning.
        points_held: usize,
    },
    /// The service answered from a different source than requested.
    SourceFallback {
        /// Owning generation.
        generation: u64,
        /// Source asked for.
        requested: DataSource,
        /// Source reported.
        actual: DataSource,
    },
    /// Every phase merged.
    Completed {
        /// Owning generation.
        generation: u64,
    },
    /// A phase failed.
    Failed {
        /// Owning generation.
        generation: u64,
        /// User-visible reason.
        message: String,
    },
    /// The generation was superseded and its results discarded.
    Superseded {
        /// Discarded generation.
        generation: u64,
    },
}

/// Observer of [`PrefetchEvent`]s.
///
/// Called synchronously from the fetch loop; implementations should return
/// quickly.
pub trait PrefetchListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &PrefetchEvent);
}
