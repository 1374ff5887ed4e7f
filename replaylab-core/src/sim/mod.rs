//! Bar-by-bar fill simulation.

pub mod engine;
pub mod state;

pub use engine::{simulate, FillSimulator};
pub use state::TemplateState;

use crate::domain::{RejectedIntent, TemplateId};
use crate::domain::Fill;
use serde::{Deserialize, Serialize};

/// What to do with a position still open when the bar data runs out before
/// `valid_to`. Both behaviors are legitimate; the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedDataPolicy {
    /// Close at the last available bar and record the snap as a gap statistic.
    SnapToLastBar,
    /// Leave the template open and surface it in the result with a warning.
    LeaveOpen,
}

/// Fill-simulation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed quantity per template (the non-compounding path).
    pub qty: f64,
    pub exhausted_data: ExhaustedDataPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            qty: 1.0,
            exhausted_data: ExhaustedDataPolicy::SnapToLastBar,
        }
    }
}

/// Data-quality statistics from session-end fallbacks. A regression here is
/// visible without failing the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapStats {
    /// Session-end exits that snapped to a bar earlier than `valid_to`.
    pub session_end_snap_count: u64,
    /// Largest snap distance observed, in seconds.
    pub bars_gap_max_seconds: i64,
    /// Snaps wider than twice the symbol's median inter-bar gap.
    pub bars_gap_over_2x_median: u64,
}

impl GapStats {
    pub(crate) fn record_snap(&mut self, gap_seconds: i64, median_gap_seconds: i64) {
        self.session_end_snap_count += 1;
        self.bars_gap_max_seconds = self.bars_gap_max_seconds.max(gap_seconds);
        if median_gap_seconds > 0 && gap_seconds > 2 * median_gap_seconds {
            self.bars_gap_over_2x_median += 1;
        }
    }
}

/// Everything the simulator produces for one batch of intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimResult {
    /// Time-ordered fill log (entries, exits, and terminal non-fill markers).
    pub fills: Vec<Fill>,
    /// Intents that failed admission and never reached the bar loop.
    pub rejected: Vec<RejectedIntent>,
    /// Templates left open under [`ExhaustedDataPolicy::LeaveOpen`].
    pub left_open: Vec<TemplateId>,
    pub gap_stats: GapStats,
}
