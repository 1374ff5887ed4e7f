//! Domain types for the replay engine.

pub mod bar;
pub mod event;
pub mod fill;
pub mod ids;
pub mod intent;
pub mod signal;
pub mod trade;

pub use bar::{validate_series, Bar, BarError};
pub use event::{EventKind, TradeEvent};
pub use fill::{Fill, FillReason};
pub use ids::{OcoGroupId, TemplateId};
pub use intent::{Intent, RejectReason, RejectedIntent, Side, ValidToReason};
pub use signal::{signal_from_fields, AdapterError, SignalRecord};
pub use trade::{Trade, TradeExitReason};

/// Symbol type alias
pub type Symbol = String;
