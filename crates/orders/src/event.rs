//! Domain events published by lifecycle operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendo_core::{LineId, OrderError, OrderId, PriceLineId};
use vendo_events::{Dispatcher, Event, Subscriber};

use crate::model::Order;

/// Events emitted around order state transitions.
///
/// Subscribers receive the order itself as mutable dispatch context, so a
/// settlement side effect can record its outcome (for example marking a
/// price line paid) before the order is persisted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Created {
        order_id: OrderId,
        at: DateTime<Utc>,
    },
    Canceled {
        order_id: OrderId,
        /// Whether payment had settled before cancellation; decides between
        /// releasing a stock hold and restocking a committed deduction.
        was_paid: bool,
        at: DateTime<Utc>,
    },
    /// A single line was invalidated while the order itself stays open.
    LineCanceled {
        order_id: OrderId,
        line_id: LineId,
        /// Whether payment had settled; decides between releasing the line's
        /// hold and restocking its committed deduction.
        was_paid: bool,
        at: DateTime<Utc>,
    },
    Paid {
        order_id: OrderId,
        at: DateTime<Utc>,
    },
    Received {
        order_id: OrderId,
        at: DateTime<Utc>,
    },
    /// Pre-refund: an external ledger performs the actual transfer.
    RefundRequested {
        order_id: OrderId,
        price_line_id: PriceLineId,
        at: DateTime<Utc>,
    },
    /// Post-refund: the price line has been flagged refunded.
    Refunded {
        order_id: OrderId,
        price_line_id: PriceLineId,
        at: DateTime<Utc>,
    },
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "order.created",
            OrderEvent::Canceled { .. } => "order.canceled",
            OrderEvent::LineCanceled { .. } => "order.line_canceled",
            OrderEvent::Paid { .. } => "order.paid",
            OrderEvent::Received { .. } => "order.received",
            OrderEvent::RefundRequested { .. } => "order.refund_requested",
            OrderEvent::Refunded { .. } => "order.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created { at, .. }
            | OrderEvent::Canceled { at, .. }
            | OrderEvent::LineCanceled { at, .. }
            | OrderEvent::Paid { at, .. }
            | OrderEvent::Received { at, .. }
            | OrderEvent::RefundRequested { at, .. }
            | OrderEvent::Refunded { at, .. } => *at,
        }
    }
}

/// Dispatcher specialization used throughout the lifecycle services.
pub type OrderDispatcher = Dispatcher<OrderEvent, Order, OrderError>;

/// Subscriber specialization for order events.
pub type OrderSubscriber = dyn Subscriber<OrderEvent, Ctx = Order, Error = OrderError>;
