//! Virtual-currency settlement: charge credit accounts at creation, release
//! them on refund, and queue payouts when a canceled order still holds
//! settled credit lines.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use vendo_core::{OrderError, UserId};
use vendo_events::Subscriber;
use vendo_ledgers::{CreditLedger, CurrencyResolver, LedgerError};
use vendo_orders::{CreationGuard, Order, OrderEvent};

use crate::outbox::RefundOutbox;

fn ledger_error(err: LedgerError) -> OrderError {
    match err {
        LedgerError::InsufficientBalance { account } => OrderError::insufficient_credit(account),
        LedgerError::UnknownCurrency(code) => OrderError::validation(format!(
            "unknown settlement currency: {code}"
        )),
        other => OrderError::external(other.to_string()),
    }
}

pub struct CreditSubscriber {
    ledger: Arc<dyn CreditLedger>,
    currencies: Arc<dyn CurrencyResolver>,
    outbox: Arc<RefundOutbox>,
}

impl CreditSubscriber {
    pub fn new(
        ledger: Arc<dyn CreditLedger>,
        currencies: Arc<dyn CurrencyResolver>,
        outbox: Arc<RefundOutbox>,
    ) -> Self {
        Self {
            ledger,
            currencies,
            outbox,
        }
    }

    fn owner(order: &Order) -> Result<UserId, OrderError> {
        order
            .user
            .ok_or_else(|| OrderError::validation("credit settlement requires an order owner"))
    }

    /// Unpaid, counted, non-cash amounts summed per currency.
    fn outstanding(order: &Order) -> BTreeMap<String, Decimal> {
        let invalid = order.invalid_line_ids();
        let mut sums = BTreeMap::new();
        for line in &order.price_lines {
            let counted = line.line_id.is_none_or(|id| !invalid.contains(&id));
            if counted && !line.is_cny() && !line.paid && line.amount() > Decimal::ZERO {
                *sums.entry(line.currency.clone()).or_insert(Decimal::ZERO) += line.amount();
            }
        }
        sums
    }
}

impl CreationGuard for CreditSubscriber {
    fn name(&self) -> &'static str {
        "credit"
    }

    fn check(&self, order: &mut Order) -> Result<(), OrderError> {
        // Nothing-due lines settle right here, before any ledger calls.
        for line in &mut order.price_lines {
            if !line.is_cny() && !line.paid && line.amount() == Decimal::ZERO {
                line.paid = true;
            }
        }

        let outstanding = Self::outstanding(order);
        if outstanding.is_empty() {
            return Ok(());
        }
        let user = Self::owner(order)?;

        for (currency, due) in outstanding {
            if self.currencies.by_code(&currency).is_none() {
                return Err(OrderError::validation(format!(
                    "unknown settlement currency: {currency}"
                )));
            }
            if due < Decimal::ZERO {
                return Err(OrderError::validation(format!(
                    "negative settlement total in {currency}"
                )));
            }
            let account = self.ledger.account_of(user, &currency).map_err(ledger_error)?;
            let balance = self.ledger.balance_of(&account).map_err(ledger_error)?;
            if balance < due {
                return Err(OrderError::insufficient_credit(currency));
            }
        }
        Ok(())
    }
}

impl Subscriber<OrderEvent> for CreditSubscriber {
    type Ctx = Order;
    type Error = OrderError;

    fn name(&self) -> &'static str {
        "credit"
    }

    fn on_event(&self, event: &OrderEvent, order: &mut Order) -> Result<(), OrderError> {
        match event {
            OrderEvent::Created { .. } => {
                if Self::outstanding(order).is_empty() {
                    return Ok(());
                }
                let user = Self::owner(order)?;
                let invalid = order.invalid_line_ids();
                let serial = order.serial().to_string();

                for line in &mut order.price_lines {
                    let counted = line.line_id.is_none_or(|id| !invalid.contains(&id));
                    if !counted || line.is_cny() || line.paid || line.amount() <= Decimal::ZERO {
                        continue;
                    }
                    let from = self
                        .ledger
                        .account_of(user, &line.currency)
                        .map_err(ledger_error)?;
                    let to = self
                        .ledger
                        .system_account(&line.currency)
                        .map_err(ledger_error)?;
                    self.ledger
                        .transfer(&from, &to, line.amount(), &serial)
                        .map_err(|err| {
                            warn!(serial = %serial, currency = %line.currency, error = %err,
                                "credit charge failed");
                            ledger_error(err)
                        })?;
                    line.paid = true;
                    line.can_refund = true;
                    info!(serial = %serial, currency = %line.currency, amount = %line.amount(),
                        "credit line settled");
                }
                Ok(())
            }
            OrderEvent::Canceled { at, .. } => {
                // Payouts are deliberately asynchronous: cancellation must
                // survive a credit ledger outage.
                for line in &order.price_lines {
                    if !line.is_cny() && line.can_refund_now() {
                        self.outbox.enqueue(order.id, line.id, *at);
                    }
                }
                Ok(())
            }
            OrderEvent::RefundRequested { price_line_id, .. } => {
                let user = Self::owner(order)?;
                let line = order
                    .price_line(*price_line_id)
                    .ok_or(OrderError::NotFound)?;
                let from = self
                    .ledger
                    .system_account(&line.currency)
                    .map_err(ledger_error)?;
                let to = self
                    .ledger
                    .account_of(user, &line.currency)
                    .map_err(ledger_error)?;
                self.ledger
                    .transfer(&from, &to, line.amount(), order.serial())
                    .map_err(ledger_error)?;
                info!(serial = order.serial(), currency = %line.currency,
                    amount = %line.amount(), "credit refund transferred");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
