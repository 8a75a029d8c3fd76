//! The order aggregate and its owned entities.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vendo_core::{LineId, OrderId, PriceLineId, SkuId, UserId};
use vendo_pricing::{OrderPrices, PriceLine};

use crate::state::OrderState;

/// One product entry within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineId,
    pub sku: SkuId,
    /// Catalog product group the SKU belongs to, when known.
    pub spu: Option<String>,
    pub quantity: i64,
    /// False once cancelled; an all-invalid order cancels as a whole.
    pub valid: bool,
    pub cancel_time: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub finish_receive_time: Option<DateTime<Utc>>,
}

impl OrderLine {
    pub fn new(sku: SkuId, quantity: i64) -> Self {
        Self {
            id: LineId::new(),
            sku,
            spu: None,
            quantity,
            valid: true,
            cancel_time: None,
            cancel_reason: None,
            finish_receive_time: None,
        }
    }
}

/// Delivery contact attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderContact {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// One-to-one payment record, created only on a successful gateway callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub trade_no: String,
    pub amount: Decimal,
    pub pay_time: DateTime<Utc>,
}

/// Append-only audit snapshot; never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub serial: String,
    pub state: OrderState,
    pub at: DateTime<Utc>,
    pub actor: Option<UserId>,
    pub origin: String,
}

/// Aggregate root representing one customer purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable serial number; immutable post-creation.
    serial: String,
    pub order_type: String,
    state: OrderState,
    /// Trade number assigned by the external payment gateway.
    pub trade_no: Option<String>,
    /// Informational only; true totals always derive from price lines.
    pub total_amount: Decimal,
    pub user: Option<UserId>,

    pub create_time: Option<DateTime<Utc>>,
    pub cancel_time: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub finish_time: Option<DateTime<Utc>>,
    pub auto_cancel_time: Option<DateTime<Utc>>,
    pub start_receive_time: Option<DateTime<Utc>>,
    pub expire_receive_time: Option<DateTime<Utc>>,
    pub ship_time: Option<DateTime<Utc>>,

    pub contacts: Vec<OrderContact>,
    pub lines: Vec<OrderLine>,
    pub price_lines: Vec<PriceLine>,
    pub audit_logs: Vec<AuditLogEntry>,
    pub payment: Option<PaymentRecord>,
}

impl Order {
    pub fn build(serial: impl Into<String>, order_type: impl Into<String>) -> Self {
        Self {
            id: OrderId::new(),
            serial: serial.into(),
            order_type: order_type.into(),
            state: OrderState::Init,
            trade_no: None,
            total_amount: Decimal::ZERO,
            user: None,
            create_time: None,
            cancel_time: None,
            cancel_reason: None,
            finish_time: None,
            auto_cancel_time: None,
            start_receive_time: None,
            expire_receive_time: None,
            ship_time: None,
            contacts: Vec::new(),
            lines: Vec::new(),
            price_lines: Vec::new(),
            audit_logs: Vec::new(),
            payment: None,
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_contact(mut self, contact: OrderContact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_receive_window(
        mut self,
        start: Option<DateTime<Utc>>,
        expire: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_receive_time = start;
        self.expire_receive_time = expire;
        self
    }

    /// Append a product line, returning its id for price-line association.
    pub fn push_line(&mut self, line: OrderLine) -> LineId {
        let id = line.id;
        self.lines.push(line);
        id
    }

    pub fn push_price_line(&mut self, price_line: PriceLine) {
        self.price_lines.push(price_line);
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    /// State transitions stay inside lifecycle operations.
    pub(crate) fn set_state(&mut self, state: OrderState) {
        self.state = state;
    }

    pub fn line(&self, id: LineId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn line_mut(&mut self, id: LineId) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.id == id)
    }

    pub fn price_line(&self, id: PriceLineId) -> Option<&PriceLine> {
        self.price_lines.iter().find(|pl| pl.id == id)
    }

    pub fn price_line_mut(&mut self, id: PriceLineId) -> Option<&mut PriceLine> {
        self.price_lines.iter_mut().find(|pl| pl.id == id)
    }

    pub fn valid_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.valid)
    }

    pub fn all_lines_invalid(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| !l.valid)
    }

    /// Ids of invalidated lines; price lines owned by these drop out of
    /// every settlement total.
    pub fn invalid_line_ids(&self) -> HashSet<LineId> {
        self.lines
            .iter()
            .filter(|l| !l.valid)
            .map(|l| l.id)
            .collect()
    }

    /// Settlement view over this order's price lines.
    pub fn prices<'a>(&'a self, invalid: &'a HashSet<LineId>) -> OrderPrices<'a> {
        OrderPrices::new(&self.price_lines, invalid)
    }

    pub(crate) fn push_audit(
        &mut self,
        at: DateTime<Utc>,
        actor: Option<UserId>,
        origin: impl Into<String>,
    ) {
        let entry = AuditLogEntry {
            serial: self.serial.clone(),
            state: self.state,
            at,
            actor,
            origin: origin.into(),
        };
        self.audit_logs.push(entry);
    }
}
