//! Per-run mutable state threaded through the driver and the pipeline

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Timed phase of the fixed-point computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Focus,
    Coerce,
    Precondition,
    Update,
    Blur,
    Join,
    Total,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Focus,
        Phase::Coerce,
        Phase::Precondition,
        Phase::Update,
        Phase::Blur,
        Phase::Join,
        Phase::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::Coerce => "coerce",
            Phase::Precondition => "precondition",
            Phase::Update => "update",
            Phase::Blur => "blur",
            Phase::Join => "join",
            Phase::Total => "total",
        }
    }
}

/// Counters and timers of one analysis run
///
/// Advisory only: nothing in the fixed point reads these back except the
/// structure count used for the live-structure ceiling.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStatus {
    /// Structures joined into any location, initial ones included
    pub number_of_structures: usize,

    /// Distinct messages recorded
    pub number_of_messages: usize,

    /// Candidates discarded because coerce failed
    pub constraint_breaches: usize,

    /// Set when a strict post-update coerce failure stopped the run
    pub coerce_after_update_failed: bool,

    /// Worklist pops
    pub iterations: usize,
    pub max_worklist_size: usize,
    total_worklist_size: usize,

    /// Running mean of the focus discard ratio
    pub focus_discard_mean: f64,
    /// Running mean of its square
    pub focus_discard_mean_square: f64,
    pub focus_samples: u64,

    phases: BTreeMap<Phase, Duration>,
}

impl AnalysisStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        *self.phases.entry(phase).or_default() += elapsed;
    }

    pub fn elapsed(&self, phase: Phase) -> Duration {
        self.phases.get(&phase).copied().unwrap_or_default()
    }

    /// One application ended with `produced` successors out of `focused`
    /// structures
    pub fn record_focus(&mut self, focused: usize, produced: usize) {
        if focused == 0 {
            return;
        }
        let ratio = (focused as f64 - produced as f64) / focused as f64;
        let n = self.focus_samples as f64;
        self.focus_discard_mean = (self.focus_discard_mean * n + ratio) / (n + 1.0);
        self.focus_discard_mean_square =
            (self.focus_discard_mean_square * n + ratio * ratio) / (n + 1.0);
        self.focus_samples += 1;
    }

    pub fn focus_discard_variance(&self) -> f64 {
        (self.focus_discard_mean_square - self.focus_discard_mean * self.focus_discard_mean).max(0.0)
    }

    /// One worklist pop with `size` locations queued (the popped one included)
    pub fn record_iteration(&mut self, size: usize) {
        self.iterations += 1;
        self.max_worklist_size = self.max_worklist_size.max(size);
        self.total_worklist_size += size;
    }

    pub fn average_worklist_size(&self) -> usize {
        if self.iterations == 0 {
            0
        } else {
            self.total_worklist_size / self.iterations
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// State shared by every step of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub status: AnalysisStatus,

    /// Per-step structure dumps at info level
    pub verbose: bool,
}

impl RunContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            status: AnalysisStatus::new(),
            verbose,
        }
    }
}
