//! Per-template lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one template inside the simulator:
/// `Pending → EntryFilled → ExitFilled`, or terminally
/// `Cancelled` (OCO / ambiguity / netting) or `Expired` (window closed with
/// no trigger).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TemplateState {
    Pending,
    EntryFilled { entry_ts: DateTime<Utc> },
    ExitFilled,
    Cancelled,
    Expired,
}

impl TemplateState {
    pub fn is_pending(self) -> bool {
        matches!(self, TemplateState::Pending)
    }

    pub fn is_open(self) -> bool {
        matches!(self, TemplateState::EntryFilled { .. })
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TemplateState::ExitFilled | TemplateState::Cancelled | TemplateState::Expired
        )
    }
}
