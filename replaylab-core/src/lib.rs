//! ReplayLab Core — deterministic order-admission and fill simulation.
//!
//! The component chain that replays strategy order intents against
//! historical bars without lookahead:
//! - Domain types (bars, intents, fills, trades, trade events)
//! - Total, shuffle-invariant event ordering with exits-before-entries ties
//! - Validity-window computation from a trading-session calendar
//! - Intent sanitization (the structural defense against lookahead bias)
//! - Bar-by-bar fill simulation with OCO groups and per-symbol netting
//! - Trade pairing with a proportional slippage/commission cost model
//! - Cash-only portfolio ledger with deterministic replay
//! - Event engine for the compounding execution path
//! - Content-hash manifests for run parity

pub mod compound;
pub mod costs;
pub mod domain;
pub mod ledger;
pub mod manifest;
pub mod ordering;
pub mod pairing;
pub mod sanitize;
pub mod session;
pub mod sim;
