//! Event engine — the compounding execution path.
//!
//! Position size is recomputed at every ENTRY from *current* cash, so equity
//! compounds between trades. This path is used exclusively when compounding
//! is enabled and never otherwise; the fixed-quantity fill-sim path and this
//! one are selected by a closed configuration enum, so they cannot be mixed.

use std::collections::BTreeMap;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::costs::CostModel;
use crate::domain::{EventKind, Side, Symbol, TemplateId, TradeEvent};
use crate::ordering::{order_events, validate_event_order, OrderingViolation};

/// Explicit rounding strategy for position sizing. Never implicit float
/// rounding: the division runs in decimal arithmetic and rounds to a whole
/// quantity with the configured strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeRounding {
    Floor,
    Ceiling,
    Nearest,
}

impl SizeRounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            SizeRounding::Floor => RoundingStrategy::ToNegativeInfinity,
            SizeRounding::Ceiling => RoundingStrategy::ToPositiveInfinity,
            SizeRounding::Nearest => RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventEngineConfig {
    pub initial_cash: f64,
    /// When set, every entry uses this quantity; otherwise
    /// `qty = round(cash / price)` with the configured rounding.
    pub fixed_qty: Option<f64>,
    pub rounding: SizeRounding,
    pub commission_bps: f64,
    pub slippage_bps: f64,
}

/// Typed event rejection. Stable machine-readable strings; the netting
/// variant reuses the fill-log reason vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventReject {
    InsufficientCashForMinQty,
    NoPositionToExit,
    NettingOpenPosition,
}

impl EventReject {
    pub fn as_str(self) -> &'static str {
        match self {
            EventReject::InsufficientCashForMinQty => "insufficient_cash_for_min_qty",
            EventReject::NoPositionToExit => "no_position_to_exit",
            EventReject::NettingOpenPosition => "order_rejected_netting_open_position",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedEvent {
    pub event: TradeEvent,
    pub qty: f64,
    pub effective_price: f64,
    pub commission: f64,
    pub slippage_cost: f64,
    pub cash_after: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedEvent {
    pub event: TradeEvent,
    pub reason: EventReject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEngineResult {
    pub executed: Vec<ExecutedEvent>,
    pub rejected: Vec<RejectedEvent>,
    pub final_cash: f64,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    template_id: TemplateId,
    side: Side,
    qty: f64,
}

pub struct EventEngine {
    cfg: EventEngineConfig,
    cost: CostModel,
    cash: f64,
    open: BTreeMap<Symbol, OpenPosition>,
}

impl EventEngine {
    pub fn new(cfg: EventEngineConfig) -> Self {
        let cost = CostModel {
            commission_bps: cfg.commission_bps,
            slippage_bps: cfg.slippage_bps,
        };
        Self {
            cash: cfg.initial_cash,
            cost,
            cfg,
            open: BTreeMap::new(),
        }
    }

    /// Run the engine over an event set. Events are put into the canonical
    /// total order first and re-validated (exits before entries at a shared
    /// timestamp) as a runtime guard, so the result is identical for any
    /// permutation of the input.
    pub fn run(mut self, events: Vec<TradeEvent>) -> Result<EventEngineResult, OrderingViolation> {
        let events = order_events(events);
        validate_event_order(&events)?;

        let mut executed = Vec::new();
        let mut rejected = Vec::new();
        for event in events {
            match event.kind {
                EventKind::Entry => self.apply_entry(event, &mut executed, &mut rejected),
                EventKind::Exit => self.apply_exit(event, &mut executed, &mut rejected),
            }
        }
        Ok(EventEngineResult {
            executed,
            rejected,
            final_cash: self.cash,
        })
    }

    fn apply_entry(
        &mut self,
        event: TradeEvent,
        executed: &mut Vec<ExecutedEvent>,
        rejected: &mut Vec<RejectedEvent>,
    ) {
        if self.open.contains_key(&event.symbol) {
            self.reject(event, EventReject::NettingOpenPosition, rejected);
            return;
        }

        let qty = match self.cfg.fixed_qty {
            Some(q) => q,
            None => sized_qty(self.cash, event.price, self.cfg.rounding),
        };
        if qty <= 0.0 {
            self.reject(event, EventReject::InsufficientCashForMinQty, rejected);
            return;
        }

        let effective = self.cost.effective_price(event.side, event.price);
        let commission = self.cost.commission(effective, qty);
        let slippage_cost = self.cost.slippage_cost(event.side, event.price, qty);

        match event.side {
            Side::Buy => self.cash -= effective * qty,
            Side::Sell => self.cash += effective * qty,
        }
        self.cash -= commission;

        self.open.insert(
            event.symbol.clone(),
            OpenPosition {
                template_id: event.template_id.clone(),
                side: event.side,
                qty,
            },
        );
        executed.push(ExecutedEvent {
            event,
            qty,
            effective_price: effective,
            commission,
            slippage_cost,
            cash_after: self.cash,
        });
    }

    fn apply_exit(
        &mut self,
        event: TradeEvent,
        executed: &mut Vec<ExecutedEvent>,
        rejected: &mut Vec<RejectedEvent>,
    ) {
        let Some(position) = self.open.remove(&event.symbol) else {
            self.reject(event, EventReject::NoPositionToExit, rejected);
            return;
        };

        let exec_side = position.side.opposite();
        let qty = position.qty;
        let effective = self.cost.effective_price(exec_side, event.price);
        let commission = self.cost.commission(effective, qty);
        let slippage_cost = self.cost.slippage_cost(exec_side, event.price, qty);

        match exec_side {
            Side::Sell => self.cash += effective * qty,
            Side::Buy => self.cash -= effective * qty,
        }
        self.cash -= commission;

        tracing::debug!(
            template_id = %position.template_id,
            symbol = %event.symbol,
            qty,
            cash = self.cash,
            "position closed"
        );
        executed.push(ExecutedEvent {
            event,
            qty,
            effective_price: effective,
            commission,
            slippage_cost,
            cash_after: self.cash,
        });
    }

    fn reject(
        &self,
        event: TradeEvent,
        reason: EventReject,
        rejected: &mut Vec<RejectedEvent>,
    ) {
        tracing::warn!(
            template_id = %event.template_id,
            symbol = %event.symbol,
            reason = reason.as_str(),
            "event rejected"
        );
        rejected.push(RejectedEvent { event, reason });
    }
}

/// `round(cash / price)` in decimal arithmetic with an explicit strategy.
/// Degenerate inputs (non-positive price, NaN) size to zero and surface as
/// `insufficient_cash_for_min_qty`.
fn sized_qty(cash: f64, price: f64, rounding: SizeRounding) -> f64 {
    if price <= 0.0 {
        return 0.0;
    }
    let (Some(cash_d), Some(price_d)) = (Decimal::from_f64(cash), Decimal::from_f64(price))
    else {
        return 0.0;
    };
    (cash_d / price_d)
        .round_dp_with_strategy(0, rounding.strategy())
        .to_f64()
        .unwrap_or(0.0)
}
