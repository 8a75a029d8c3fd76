//! Durable retry queue for non-cash refunds.
//!
//! A cancellation must release credit even when the credit ledger is down at
//! that moment, and must never fail because of it. Cancellation therefore
//! only *enqueues* refund tasks; a worker drains them with backoff and moves
//! exhausted tasks to a dead-letter list for operator attention.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vendo_core::{OrderId, PriceLineId};
use vendo_ledgers::{order_key, CreditLedger, EntityLock};
use vendo_orders::OrderStore;

/// Delay curve between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    /// base * 2^(attempt-1), capped at `max_delay`.
    Exponential,
}

/// Retry configuration for outbox tasks.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay before the given attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => base_ms
                .saturating_mul(1_u64 << (attempt - 1).min(32))
                .min(max_ms),
        };
        Duration::from_millis(delay_ms)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// One pending credit refund.
#[derive(Debug, Clone)]
pub struct RefundTask {
    pub id: Uuid,
    pub order_id: OrderId,
    pub price_line_id: PriceLineId,
    /// Attempts already made.
    pub attempt: u32,
    /// Not picked up before this instant.
    pub scheduled_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl RefundTask {
    fn new(order_id: OrderId, price_line_id: PriceLineId, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            price_line_id,
            attempt: 0,
            scheduled_at: at,
            last_error: None,
        }
    }
}

/// In-memory task queue with a dead-letter shelf.
#[derive(Debug, Default)]
pub struct RefundOutbox {
    pending: Mutex<Vec<RefundTask>>,
    dead: Mutex<Vec<RefundTask>>,
}

impl RefundOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, order_id: OrderId, price_line_id: PriceLineId, at: DateTime<Utc>) {
        let task = RefundTask::new(order_id, price_line_id, at);
        debug!(%order_id, %price_line_id, "refund task enqueued");
        self.pending
            .lock()
            .expect("outbox pending poisoned")
            .push(task);
    }

    /// Remove and return every task due at `now`.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Vec<RefundTask> {
        let mut pending = self.pending.lock().expect("outbox pending poisoned");
        let (due, later): (Vec<_>, Vec<_>) = pending
            .drain(..)
            .partition(|task| task.scheduled_at <= now);
        *pending = later;
        due
    }

    fn requeue(&self, task: RefundTask) {
        self.pending
            .lock()
            .expect("outbox pending poisoned")
            .push(task);
    }

    fn bury(&self, task: RefundTask) {
        self.dead.lock().expect("outbox dead poisoned").push(task);
    }

    pub fn pending(&self) -> Vec<RefundTask> {
        self.pending.lock().expect("outbox pending poisoned").clone()
    }

    pub fn dead_letters(&self) -> Vec<RefundTask> {
        self.dead.lock().expect("outbox dead poisoned").clone()
    }
}

/// Drains the outbox against the credit ledger.
pub struct RefundWorker {
    store: Arc<dyn OrderStore>,
    ledger: Arc<dyn CreditLedger>,
    locks: Arc<dyn EntityLock>,
    outbox: Arc<RefundOutbox>,
    policy: RetryPolicy,
}

impl RefundWorker {
    pub fn new(
        store: Arc<dyn OrderStore>,
        ledger: Arc<dyn CreditLedger>,
        locks: Arc<dyn EntityLock>,
        outbox: Arc<RefundOutbox>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            locks,
            outbox,
            policy,
        }
    }

    /// Process every due task once; reschedule or dead-letter failures.
    /// Returns the number of refunds completed in this pass.
    pub fn drain(&self, now: DateTime<Utc>) -> usize {
        let mut completed = 0;
        for mut task in self.outbox.claim_due(now) {
            match self.run(&task) {
                Ok(done) => {
                    if done {
                        completed += 1;
                    }
                }
                Err(err) => {
                    task.attempt += 1;
                    task.last_error = Some(err.clone());
                    if self.policy.should_retry(task.attempt) {
                        let delay = self.policy.delay_for_attempt(task.attempt);
                        task.scheduled_at = now
                            + chrono::Duration::milliseconds(delay.as_millis() as i64);
                        warn!(order_id = %task.order_id, attempt = task.attempt, error = %err,
                            "refund attempt failed; rescheduled");
                        self.outbox.requeue(task);
                    } else {
                        warn!(order_id = %task.order_id, attempts = task.attempt, error = %err,
                            "refund retries exhausted; dead-lettered");
                        self.outbox.bury(task);
                    }
                }
            }
        }
        completed
    }

    /// Execute one refund. `Ok(false)` means the task was obsolete (line
    /// already refunded or no longer eligible) and was dropped.
    fn run(&self, task: &RefundTask) -> Result<bool, String> {
        let _guard = self.locks.acquire(&[order_key(task.order_id)]);

        let mut order = self
            .store
            .find(task.order_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("order {} not found", task.order_id))?;
        let Some(line) = order.price_line(task.price_line_id).cloned() else {
            return Err(format!("price line {} not found", task.price_line_id));
        };
        if !line.can_refund_now() {
            debug!(order_id = %task.order_id, price_line_id = %task.price_line_id,
                "refund task obsolete; dropped");
            return Ok(false);
        }
        let user = order
            .user
            .ok_or_else(|| "order has no credit account owner".to_string())?;

        let from = self
            .ledger
            .system_account(&line.currency)
            .map_err(|err| err.to_string())?;
        let to = self
            .ledger
            .account_of(user, &line.currency)
            .map_err(|err| err.to_string())?;
        self.ledger
            .transfer(&from, &to, line.amount(), order.serial())
            .map_err(|err| err.to_string())?;

        if let Some(line) = order.price_line_mut(task.price_line_id) {
            line.refund = true;
        }
        self.store.save(&order).map_err(|err| err.to_string())?;
        info!(order_id = %task.order_id, price_line_id = %task.price_line_id,
            currency = %line.currency, "credit refund settled");
        Ok(true)
    }
}
