//! Balance-threshold circuit breaker with hysteresis (spec.md §4.6).
//!
//! `enabled()` is a lock-free hot-path read so the Executor can gate
//! every opportunity without contending with the balance-check loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::Result;

const RING_CAPACITY: usize = 20;

#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self) -> Result<Decimal>;
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub min_absolute: Decimal,
    pub trade_multiplier: Decimal,
    pub hysteresis_ratio: Decimal,
    pub check_interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            min_absolute: dec!(5),
            trade_multiplier: dec!(3),
            hysteresis_ratio: dec!(1.5),
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Gates execution on recent-balance solvency, with hysteresis so a
/// balance oscillating near the disable threshold doesn't flap.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    enabled: AtomicBool,
    trade_sizes: Mutex<VecDeque<Decimal>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            enabled: AtomicBool::new(true),
            trade_sizes: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Records a completed trade's notional size for threshold
    /// computation. Non-positive sizes are ignored.
    pub fn record_trade(&self, size: Decimal) {
        if size <= Decimal::ZERO {
            return;
        }
        let mut ring = self.trade_sizes.lock();
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(size);
    }

    fn thresholds(&self) -> (Decimal, Decimal) {
        let ring = self.trade_sizes.lock();
        let mean = if ring.is_empty() {
            Decimal::ZERO
        } else {
            ring.iter().sum::<Decimal>() / Decimal::from(ring.len())
        };
        let disable = (mean * self.config.trade_multiplier).max(self.config.min_absolute);
        let enable = disable * self.config.hysteresis_ratio;
        (disable, enable)
    }

    /// Re-evaluates the enabled/disabled state against the current
    /// balance. A disabled breaker re-enables only once balance climbs
    /// to the (higher) enable threshold, never merely back above the
    /// disable threshold.
    pub fn evaluate(&self, balance: Decimal) {
        let (disable, enable) = self.thresholds();
        let was_enabled = self.enabled();

        if was_enabled && balance < disable {
            self.enabled.store(false, Ordering::Release);
            warn!(%balance, disable_threshold = %disable, "circuit breaker disabling execution");
        } else if !was_enabled && balance >= enable {
            self.enabled.store(true, Ordering::Release);
            info!(%balance, enable_threshold = %enable, "circuit breaker re-enabling execution");
        }
    }

    async fn check_balance(&self, source: &dyn BalanceSource) {
        match source.balance().await {
            Ok(balance) => self.evaluate(balance),
            Err(e) => warn!(error = %e, "balance check failed, retrying next tick"),
        }
    }

    /// Runs the periodic balance-check loop until `cancel` fires.
    pub async fn run(&self, source: &dyn BalanceSource, mut cancel: watch::Receiver<bool>) {
        self.check_balance(source).await;
        let mut interval = tokio::time::interval(self.config.check_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_balance(source).await;
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
