//! ReplayLab Runner — backtest orchestration and artifact export.
//!
//! Builds on `replaylab-core`:
//! - Serializable run configuration with deterministic content hashes
//! - Full-pass runner: sanitize → window → simulate → pair → ledger
//! - Equity curve and drawdown derivation
//! - CSV/JSON artifact bundles with a schema-versioned manifest
//! - Parallel execution of independent runs

pub mod config;
pub mod equity;
pub mod export;
pub mod runner;

pub use config::{ConfigError, ExecutionMode, RunConfig};
pub use equity::{equity_from_ledger, equity_from_samples, max_drawdown_pct, EquityPoint};
pub use export::{
    export_result_json, import_result_json, load_manifest, save_artifacts, ArtifactPaths,
};
pub use runner::{
    run_backtest, run_batch, BacktestResult, RejectedSignal, RunError, SignalRejectReason,
};
