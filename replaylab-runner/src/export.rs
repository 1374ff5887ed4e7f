//! Artifact export — CSV tables, manifest, and ledger summary.
//!
//! Columnar artifacts for the reporting collaborator:
//! - `events_intent.csv` — sanitized intents
//! - `fills.csv` — the fill log with per-fill cost fields
//! - `trades.csv` — paired trades with gross/net pnl and cost breakdown
//! - `equity_curve.csv` — ts, equity, drawdown_pct
//! - `manifest.json` — content hashes of each stage, for run-parity checks
//! - `summary.json` — the ledger summary
//!
//! All serialization is canonical (fixed column order, fixed float
//! formatting), so identical runs produce byte-identical artifacts and the
//! manifest hashes are comparable across runs. `import_result_json` rejects
//! unknown schema versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use replaylab_core::domain::{Bar, Fill, Intent, Symbol, Trade};
use replaylab_core::manifest::{RunManifest, SCHEMA_VERSION};

use crate::equity::EquityPoint;
use crate::runner::BacktestResult;

// ─── CSV builders ───────────────────────────────────────────────────

/// Canonical bar serialization, used only for the manifest's `bars_hash`.
pub fn bars_csv(bars: &BTreeMap<Symbol, Vec<Bar>>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["symbol", "ts", "open", "high", "low", "close", "volume"])?;
    for series in bars.values() {
        for b in series {
            wtr.write_record([
                b.symbol.as_str(),
                &b.ts.to_rfc3339(),
                &format!("{:.6}", b.open),
                &format!("{:.6}", b.high),
                &format!("{:.6}", b.low),
                &format!("{:.6}", b.close),
                &format!("{:.2}", b.volume),
            ])?;
        }
    }
    finish(wtr)
}

pub fn intents_csv(intents: &[Intent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "template_id",
        "signal_ts",
        "symbol",
        "side",
        "entry_price",
        "stop_price",
        "take_profit_price",
        "oco_group_id",
        "valid_from",
        "valid_to",
        "valid_to_reason",
    ])?;
    for i in intents {
        wtr.write_record([
            i.template_id.as_str(),
            &i.signal_ts.to_rfc3339(),
            i.symbol.as_str(),
            i.side.as_str(),
            &format!("{:.6}", i.entry_price),
            &format!("{:.6}", i.stop_price),
            &format!("{:.6}", i.take_profit_price),
            i.oco_group_id.as_ref().map(|g| g.0.as_str()).unwrap_or(""),
            &i.valid_from.to_rfc3339(),
            &i.valid_to.to_rfc3339(),
            i.valid_to_reason.as_str(),
        ])?;
    }
    finish(wtr)
}

pub fn fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "template_id",
        "symbol",
        "fill_ts",
        "fill_price",
        "reason",
        "qty",
        "effective_price",
        "commission",
        "slippage_cost",
    ])?;
    for f in fills {
        wtr.write_record([
            f.template_id.as_str(),
            f.symbol.as_str(),
            &f.ts.to_rfc3339(),
            &format!("{:.6}", f.price),
            f.reason.as_str(),
            &format!("{:.6}", f.qty),
            &format!("{:.6}", f.effective_price),
            &format!("{:.6}", f.commission),
            &format!("{:.6}", f.slippage_cost),
        ])?;
    }
    finish(wtr)
}

pub fn trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "template_id",
        "symbol",
        "side",
        "qty",
        "entry_ts",
        "entry_price",
        "entry_effective_price",
        "exit_ts",
        "exit_price",
        "exit_effective_price",
        "gross_pnl",
        "commission_cost",
        "slippage_cost",
        "total_cost",
        "net_pnl",
        "exit_reason",
    ])?;
    for t in trades {
        wtr.write_record([
            t.template_id.as_str(),
            t.symbol.as_str(),
            t.side.as_str(),
            &format!("{:.6}", t.qty),
            &t.entry_ts.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.entry_effective_price),
            &t.exit_ts.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            &t.exit_price.map(|p| format!("{:.6}", p)).unwrap_or_default(),
            &t.exit_effective_price
                .map(|p| format!("{:.6}", p))
                .unwrap_or_default(),
            &format!("{:.6}", t.gross_pnl),
            &format!("{:.6}", t.commission_cost),
            &format!("{:.6}", t.slippage_cost),
            &format!("{:.6}", t.total_cost),
            &format!("{:.6}", t.net_pnl),
            t.exit_reason.as_str(),
        ])?;
    }
    finish(wtr)
}

pub fn equity_csv(points: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ts", "equity", "drawdown_pct"])?;
    for p in points {
        wtr.write_record([
            p.ts.to_rfc3339(),
            format!("{:.2}", p.equity),
            format!("{:.4}", p.drawdown_pct),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON round trip ────────────────────────────────────────────────

pub fn export_result_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult")
}

/// Deserialize a result, rejecting schema versions newer than this build.
pub fn import_result_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── Artifact bundle ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub events_intent: PathBuf,
    pub fills: PathBuf,
    pub trades: PathBuf,
    pub equity_curve: PathBuf,
    pub manifest: PathBuf,
    pub summary: PathBuf,
}

/// Write the full artifact set for one run into `dir` (created if missing).
pub fn save_artifacts(dir: &Path, result: &BacktestResult) -> Result<ArtifactPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;

    let paths = ArtifactPaths {
        dir: dir.to_path_buf(),
        events_intent: dir.join("events_intent.csv"),
        fills: dir.join("fills.csv"),
        trades: dir.join("trades.csv"),
        equity_curve: dir.join("equity_curve.csv"),
        manifest: dir.join("manifest.json"),
        summary: dir.join("summary.json"),
    };

    fs::write(&paths.events_intent, intents_csv(&result.intents)?)?;
    fs::write(&paths.fills, fills_csv(&result.fills)?)?;
    fs::write(&paths.trades, trades_csv(&result.trades)?)?;
    fs::write(&paths.equity_curve, equity_csv(&result.equity_curve)?)?;
    fs::write(
        &paths.manifest,
        serde_json::to_string_pretty(&result.manifest)?,
    )?;
    fs::write(
        &paths.summary,
        serde_json::to_string_pretty(&result.summary)?,
    )?;
    Ok(paths)
}

/// Load and schema-gate a manifest written by `save_artifacts`.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&text).context("failed to parse manifest JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported manifest schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}
