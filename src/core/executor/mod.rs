//! Opportunity execution: pricing, sizing, submission and booking
//! (spec.md §4.5).
//!
//! Legs are submitted as a single batch; any per-leg submission failure
//! fails the whole trade rather than leaving a naked position open
//! (recorded as an open-question decision in `SPEC_FULL.md` §8).

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::core::breaker::CircuitBreaker;
use crate::core::domain::{ExecutionMode, LegResult, Opportunity, TradeRecord, TradeStatus};
use crate::core::exchange::{OrderClient, OrderLeg, OrderSide};
use crate::core::store::Storage;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub mode: ExecutionMode,
    /// Ticks of aggression added to each leg's ask price before submission.
    pub aggression_ticks: i64,
    pub min_profit_bps: i64,
    pub max_position_size: Decimal,
    pub fill_poll_initial: Duration,
    pub fill_poll_max: Duration,
    pub fill_timeout: Duration,
    /// Taker fee rate applied to realized-profit booking (spec.md §4.5).
    pub fee: Decimal,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            aggression_ticks: 0,
            min_profit_bps: 0,
            max_position_size: Decimal::from(10_000),
            fill_poll_initial: Duration::from_millis(100),
            fill_poll_max: Duration::from_secs(5),
            fill_timeout: Duration::from_secs(30),
            fee: Decimal::ZERO,
        }
    }
}

struct PricedLeg {
    token_id: crate::core::domain::TokenId,
    price: Decimal,
    size: Decimal,
}

fn round_bps(margin: Decimal) -> i64 {
    (margin * Decimal::from(10_000)).round().to_i64().unwrap_or(0)
}

fn snap_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return price;
    }
    (price / tick_size).round() * tick_size
}

pub struct Executor {
    config: ExecutorConfig,
    breaker: Arc<CircuitBreaker>,
    order_client: Option<Arc<dyn OrderClient>>,
    storage: Arc<dyn Storage>,
}

impl Executor {
    #[must_use]
    pub fn new(
        config: ExecutorConfig,
        breaker: Arc<CircuitBreaker>,
        order_client: Option<Arc<dyn OrderClient>>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self { config, breaker, order_client, storage }
    }

    /// Adjusts each leg's ask price by `aggression_ticks` and recomputes
    /// the profit margin against that adjustment. Returns `None` if the
    /// adjusted trade is no longer profitable enough to submit.
    fn price_legs(&self, opportunity: &Opportunity) -> Option<Vec<PricedLeg>> {
        let mut adjustment_sum = Decimal::ZERO;
        let legs: Vec<PricedLeg> = opportunity
            .legs()
            .iter()
            .map(|leg| {
                let adjusted = snap_to_tick(
                    leg.ask_price() + Decimal::from(self.config.aggression_ticks) * leg.tick_size(),
                    leg.tick_size(),
                );
                adjustment_sum += adjusted - leg.ask_price();
                PricedLeg {
                    token_id: leg.token_id().clone(),
                    price: adjusted,
                    size: opportunity.trade_size(),
                }
            })
            .collect();

        let adjusted_margin = opportunity.profit_margin() - adjustment_sum;
        if adjusted_margin <= Decimal::ZERO {
            return None;
        }
        if round_bps(adjusted_margin) < self.config.min_profit_bps {
            return None;
        }

        Some(legs)
    }

    /// Clamps trade size so no leg's notional exceeds `max_position_size`.
    /// Returns `None` if the clamp would push any leg below the size
    /// quoted by the opportunity's minimum order size floor.
    fn cap_position(&self, opportunity: &Opportunity, legs: &mut [PricedLeg]) -> Option<()> {
        let mut capped_size = opportunity.trade_size();
        for leg in legs.iter() {
            if leg.price > Decimal::ZERO {
                let max_size_for_leg = self.config.max_position_size / leg.price;
                capped_size = capped_size.min(max_size_for_leg);
            }
        }
        capped_size = capped_size.floor();

        for (leg, opp_leg) in legs.iter().zip(opportunity.legs()) {
            if capped_size < opp_leg.min_order_size() {
                warn!(token_id = %leg.token_id, "position cap collapsed trade below minimum order size");
                return None;
            }
        }

        for leg in legs.iter_mut() {
            leg.size = capped_size;
        }
        Some(())
    }

    async fn submit(&self, legs: &[PricedLeg], cancel: &watch::Receiver<bool>) -> Result<Vec<LegResult>> {
        match self.config.mode {
            ExecutionMode::Paper => Ok(legs
                .iter()
                .map(|l| LegResult {
                    token_id: l.token_id.clone(),
                    order_id: None,
                    submitted_price: l.price,
                    submitted_size: l.size,
                    filled_size: l.size,
                    filled_price: Some(l.price),
                    success: true,
                })
                .collect()),
            ExecutionMode::Live => {
                let client = self.order_client.as_ref().ok_or_else(|| {
                    crate::error::Error::Execution("live mode requires an order client".into())
                })?;
                let order_legs: Vec<OrderLeg> = legs
                    .iter()
                    .map(|l| OrderLeg { token_id: l.token_id.clone(), side: OrderSide::Buy, price: l.price, size: l.size })
                    .collect();
                let responses = client.place_orders(&order_legs).await?;

                if responses.len() != legs.len() || responses.iter().any(|r| !r.success) {
                    return Err(crate::error::Error::Execution(
                        "one or more legs failed to submit; aborting trade atomically".into(),
                    ));
                }

                let mut results = Vec::with_capacity(legs.len());
                for (leg, resp) in legs.iter().zip(responses.iter()) {
                    let filled = self.poll_fill(client.as_ref(), resp.order_id.as_deref(), leg.size, cancel).await;
                    results.push(LegResult {
                        token_id: leg.token_id.clone(),
                        order_id: resp.order_id.clone(),
                        submitted_price: leg.price,
                        submitted_size: leg.size,
                        filled_size: filled,
                        filled_price: Some(leg.price),
                        success: true,
                    });
                }
                Ok(results)
            }
        }
    }

    /// Polls for a fill until `target_size` is reached, the timeout
    /// elapses, or `cancel` fires — shutdown must not block behind a
    /// live poll's backoff (spec.md §4.5 Cancellation).
    async fn poll_fill(
        &self,
        client: &dyn OrderClient,
        order_id: Option<&str>,
        target_size: Decimal,
        cancel: &watch::Receiver<bool>,
    ) -> Decimal {
        let Some(order_id) = order_id else { return Decimal::ZERO };
        let deadline = tokio::time::Instant::now() + self.config.fill_timeout;
        let mut backoff = self.config.fill_poll_initial;
        let mut last_filled = Decimal::ZERO;
        let mut cancel = cancel.clone();

        loop {
            match client.get_fill(order_id).await {
                Ok(status) if status.filled_size >= target_size => return status.filled_size,
                Ok(status) => {
                    last_filled = status.filled_size;
                    if tokio::time::Instant::now() >= deadline {
                        return last_filled;
                    }
                }
                Err(e) => warn!(order_id, error = %e, "fill poll failed, retrying"),
            }

            if tokio::time::Instant::now() >= deadline {
                return last_filled;
            }

            tokio::select! {
                () = sleep(backoff) => {}
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!(order_id, "shutdown requested, stopping fill poll");
                        return last_filled;
                    }
                }
            }
            backoff = (backoff * 2).min(self.config.fill_poll_max);
        }
    }

    fn book(&self, opportunity: &Opportunity, legs: &[LegResult]) -> TradeRecord {
        let fully_filled = legs.iter().all(|l| l.filled_size >= l.submitted_size);
        let any_filled = legs.iter().any(|l| l.filled_size > Decimal::ZERO);
        let status = if fully_filled {
            TradeStatus::Filled
        } else if any_filled {
            TradeStatus::Partial
        } else {
            TradeStatus::Failed
        };

        let cost: Decimal = legs
            .iter()
            .map(|l| match self.config.mode {
                ExecutionMode::Live => l.filled_price.unwrap_or(l.submitted_price) * l.filled_size,
                ExecutionMode::Paper => l.submitted_price * l.submitted_size,
            })
            .sum();

        // Complete sets actually filled, not the pre-execution planned size:
        // a partial fill on one leg caps the whole set.
        let filled_units = legs.iter().map(|l| l.filled_size).fold(Decimal::MAX, Decimal::min);
        let fees = self.config.fee * cost;
        let realized_profit = filled_units - cost - fees;

        TradeRecord {
            opportunity_id: opportunity.id().to_string(),
            mode: self.config.mode,
            legs: legs.to_vec(),
            status,
            cost,
            realized_profit,
        }
    }

    async fn execute_one(&self, opportunity: Opportunity, cancel: &watch::Receiver<bool>) {
        if !self.breaker.enabled() {
            info!(opportunity_id = opportunity.id(), "circuit breaker open, skipping opportunity");
            return;
        }

        let Some(mut legs) = self.price_legs(&opportunity) else {
            info!(opportunity_id = opportunity.id(), "opportunity no longer profitable after price adjustment");
            return;
        };

        if self.cap_position(&opportunity, &mut legs).is_none() {
            return;
        }

        let leg_results = match self.submit(&legs, cancel).await {
            Ok(results) => results,
            Err(e) => {
                warn!(opportunity_id = opportunity.id(), error = %e, "execution failed");
                return;
            }
        };

        let record = self.book(&opportunity, &leg_results);
        self.breaker.record_trade(record.cost);

        if let Err(e) = self.storage.store_trade(&record).await {
            warn!(error = %e, "failed to persist trade record");
        }
    }

    /// Drains opportunities serially until the channel closes or
    /// `cancel` fires.
    pub async fn run(&self, mut rx: mpsc::Receiver<Opportunity>, mut cancel: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                maybe_opp = rx.recv() => {
                    match maybe_opp {
                        Some(opportunity) => self.execute_one(opportunity, &cancel).await,
                        None => return,
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
