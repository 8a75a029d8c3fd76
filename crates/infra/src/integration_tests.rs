//! End-to-end scenarios across the wired platform: creation with stock
//! holds and credit settlement, payment reconciliation, cancellation in
//! both paid and unpaid states, and asynchronous credit refunds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;

use vendo_core::{OrderError, SkuId, StaticLabel, UserId};
use vendo_ledgers::{
    AccountRef, CreditLedger, MemoryCreditLedger, MemoryGateway, MemoryStockLedger, MovementKind,
    StaticCurrencies, StockLedger,
};
use vendo_orders::{Order, OrderContact, OrderLine, OrderState, PaymentCallback};
use vendo_pricing::{PriceKind, PriceLine};

use crate::outbox::RetryPolicy;
use crate::wiring::{OrderPlatform, PlatformConfig};

const GOLD: &str = "GOLD";

struct World {
    stock: Arc<MemoryStockLedger>,
    credit: Arc<MemoryCreditLedger>,
    gateway: Arc<MemoryGateway>,
    platform: OrderPlatform,
    user: UserId,
    sku: SkuId,
}

fn world() -> World {
    let stock = Arc::new(MemoryStockLedger::new());
    let credit = Arc::new(MemoryCreditLedger::new());
    let gateway = Arc::new(MemoryGateway::new());
    let user = UserId::new();
    let sku = SkuId::new();

    stock.put_stock(sku, 10);
    credit.deposit(AccountRef::new(format!("user:{user}"), GOLD), dec!(500));
    credit.deposit(AccountRef::new(format!("system:{GOLD}"), GOLD), dec!(10000));

    let platform = OrderPlatform::build(PlatformConfig {
        stock: stock.clone(),
        credit: credit.clone(),
        currencies: Arc::new(StaticCurrencies::default().with(GOLD, "游戏金币")),
        gateway: Some(gateway.clone()),
        free_label: Arc::new(StaticLabel::new("免费")),
        retry_policy: RetryPolicy::fixed(3, Duration::ZERO),
    });

    World {
        stock,
        credit,
        gateway,
        platform,
        user,
        sku,
    }
}

impl World {
    fn user_account(&self) -> AccountRef {
        AccountRef::new(format!("user:{}", self.user), GOLD)
    }

    /// Two units of the SKU, paid in CNY.
    fn cny_order(&self) -> Order {
        let mut order = Order::build(format!("SO-{}", Utc::now().timestamp_micros()), "retail")
            .with_user(self.user)
            .with_contact(OrderContact {
                name: "张三".to_string(),
                phone: "13800000000".to_string(),
                address: "上海市浦东新区张江路 58 号".to_string(),
            });
        let line = order.push_line(OrderLine::new(self.sku, 2));
        order.push_price_line(
            PriceLine::new(PriceKind::Sale, "商品", dec!(100.00)).with_line(line),
        );
        order
    }

    /// One unit of the SKU, paid entirely in GOLD credit.
    fn credit_order(&self, amount: rust_decimal::Decimal) -> Order {
        let mut order = Order::build(format!("SC-{}", Utc::now().timestamp_micros()), "retail")
            .with_user(self.user);
        let line = order.push_line(OrderLine::new(self.sku, 1));
        order.push_price_line(
            PriceLine::new(PriceKind::Sale, "金币商品", amount)
                .with_currency(GOLD)
                .with_line(line),
        );
        order
    }

    fn pay(&self, order: &Order) {
        let callback = PaymentCallback {
            order_id: Some(order.id),
            serial: None,
            trade_no: format!("TN-{}", order.serial()),
            amount: dec!(100.00),
            paid_at: Utc::now(),
        };
        self.platform.callbacks.on_success(&callback).unwrap();
    }

    fn movement_kinds(&self) -> Vec<MovementKind> {
        self.stock.movements().into_iter().map(|m| m.kind).collect()
    }
}

#[test]
fn creation_locks_stock_and_leaves_order_unpaid() {
    let w = world();
    let order = w.platform.lifecycle.create(w.cny_order()).unwrap();

    assert_eq!(order.state(), OrderState::Init);
    let movements = w.stock.movements();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::Lock);
    assert_eq!(movements[0].qty, 2);
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 8);
}

#[test]
fn insufficient_stock_rejects_creation_before_persisting() {
    let w = world();
    let mut order = w.cny_order();
    order.push_line(OrderLine::new(w.sku, 100));

    let err = w.platform.lifecycle.create(order).unwrap_err();
    assert!(matches!(err, OrderError::InsufficientStock { .. }));
    assert!(w.stock.movements().is_empty());
}

#[test]
fn duplicate_payment_callbacks_settle_stock_and_sales_once() {
    let w = world();
    let order = w.platform.lifecycle.create(w.cny_order()).unwrap();

    w.pay(&order);
    w.pay(&order);

    let settled = w.platform.store.find(order.id).unwrap().unwrap();
    assert_eq!(settled.state(), OrderState::Paid);
    assert!(settled.payment.is_some());

    // One hold, converted exactly once.
    assert_eq!(
        w.movement_kinds(),
        vec![MovementKind::Lock, MovementKind::Unlock, MovementKind::Deduct]
    );
    assert_eq!(w.platform.sales.sold(w.sku), 2);
}

#[test]
fn cancelling_an_unpaid_order_releases_the_hold() {
    let w = world();
    let order = w.platform.lifecycle.create(w.cny_order()).unwrap();

    w.platform.orders.cancel_order(order.id, None, Some("buyer regret")).unwrap();

    let stored = w.platform.store.find(order.id).unwrap().unwrap();
    assert_eq!(stored.state(), OrderState::Canceled);
    assert_eq!(w.movement_kinds(), vec![MovementKind::Lock, MovementKind::Unlock]);
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 10);
}

#[test]
fn cancelling_a_paid_order_restocks_instead_of_unlocking() {
    let w = world();
    let order = w.platform.lifecycle.create(w.cny_order()).unwrap();
    w.pay(&order);

    // The payment landed in the store; the cancel must observe it there
    // rather than trust whatever snapshot the caller still holds.
    w.platform.orders.cancel_order(order.id, None, None).unwrap();

    assert_eq!(
        w.movement_kinds(),
        vec![
            MovementKind::Lock,
            MovementKind::Unlock,
            MovementKind::Deduct,
            MovementKind::Return,
        ]
    );
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 10);
}

#[test]
fn credit_only_order_settles_at_creation() {
    let w = world();
    let order = w.platform.lifecycle.create(w.credit_order(dec!(120))).unwrap();

    // No payable CNY, so the order is born paid and stock commits too.
    assert_eq!(order.state(), OrderState::Paid);
    assert!(order.price_lines[0].paid);
    assert!(order.price_lines[0].can_refund);
    assert_eq!(
        w.movement_kinds(),
        vec![MovementKind::Lock, MovementKind::Unlock, MovementKind::Deduct]
    );
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(380));
    assert_eq!(w.platform.sales.sold(w.sku), 1);
}

#[test]
fn insufficient_credit_rejects_creation_with_no_side_effects() {
    let w = world();
    let err = w
        .platform
        .lifecycle
        .create(w.credit_order(dec!(9999)))
        .unwrap_err();

    assert!(matches!(err, OrderError::InsufficientCredit { .. }));
    assert!(w.stock.movements().is_empty());
    assert!(w.credit.transfers().is_empty());
}

#[test]
fn unknown_settlement_currency_is_a_validation_error() {
    let w = world();
    let mut order = Order::build("SC-bad", "retail").with_user(w.user);
    let line = order.push_line(OrderLine::new(w.sku, 1));
    order.push_price_line(
        PriceLine::new(PriceKind::Sale, "积分商品", dec!(10))
            .with_currency("POINTS")
            .with_line(line),
    );

    let err = w.platform.lifecycle.create(order).unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
}

#[test]
fn failed_credit_settlement_rolls_back_creation_and_stock() {
    let w = world();
    w.credit.fail_next_transfer();

    let err = w.platform.lifecycle.create(w.credit_order(dec!(50))).unwrap_err();
    assert!(matches!(err, OrderError::ExternalService(_)));

    // The order never persisted, the money never moved and the compensating
    // cancel released the hold taken just before the transfer.
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(500));
    assert_eq!(w.movement_kinds(), vec![MovementKind::Lock, MovementKind::Unlock]);
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 10);
}

#[test]
fn canceling_a_paid_credit_order_refunds_through_the_outbox() {
    let w = world();
    let order = w.platform.lifecycle.create(w.credit_order(dec!(120))).unwrap();
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(380));

    w.platform.orders.cancel_order(order.id, None, None).unwrap();

    // Cancellation itself only enqueues the payout.
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(380));
    assert_eq!(w.platform.outbox.pending().len(), 1);

    let completed = w.platform.refund_worker.drain(Utc::now());
    assert_eq!(completed, 1);
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(500));
    assert!(w.platform.outbox.pending().is_empty());

    let refunded = w.platform.store.find(order.id).unwrap().unwrap();
    assert!(refunded.price_lines[0].refund);

    // Draining again finds nothing to do.
    assert_eq!(w.platform.refund_worker.drain(Utc::now()), 0);
}

#[test]
fn outbox_retries_a_flaky_ledger_until_it_succeeds() {
    let w = world();
    let order = w.platform.lifecycle.create(w.credit_order(dec!(60))).unwrap();
    w.platform.orders.cancel_order(order.id, None, None).unwrap();

    w.credit.fail_next_transfer();
    assert_eq!(w.platform.refund_worker.drain(Utc::now()), 0);
    assert_eq!(w.platform.outbox.pending().len(), 1);
    assert_eq!(w.platform.outbox.pending()[0].attempt, 1);

    // Next pass succeeds; zero base delay keeps the task immediately due.
    assert_eq!(w.platform.refund_worker.drain(Utc::now()), 1);
    assert_eq!(w.credit.balance_of(&w.user_account()).unwrap(), dec!(500));
}

#[test]
fn exhausted_refund_tasks_are_dead_lettered() {
    let w = world();
    let order = w.platform.lifecycle.create(w.credit_order(dec!(60))).unwrap();
    w.platform.orders.cancel_order(order.id, None, None).unwrap();

    for _ in 0..3 {
        w.credit.fail_next_transfer();
        w.platform.refund_worker.drain(Utc::now());
    }

    assert!(w.platform.outbox.pending().is_empty());
    let dead = w.platform.outbox.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempt, 3);
    assert!(dead[0].last_error.is_some());
}

#[test]
fn cny_refund_after_payment_goes_through_the_gateway() {
    let w = world();
    let order = w.platform.lifecycle.create(w.cny_order()).unwrap();
    w.pay(&order);

    let paid = w.platform.store.find(order.id).unwrap().unwrap();
    let price_line_id = paid.price_lines[0].id;
    w.platform.orders.refund_price_line(order.id, price_line_id).unwrap();

    let refunds = w.gateway.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].1, dec!(100.00));
    let after = w.platform.store.find(order.id).unwrap().unwrap();
    assert!(after.price_lines[0].refund);
}

#[test]
fn cancelling_the_last_line_cascades_and_releases_stock_once() {
    let w = world();
    let mut draft = Order::build("SO-two-line", "retail").with_user(w.user);
    let a = draft.push_line(OrderLine::new(w.sku, 1));
    let b = draft.push_line(OrderLine::new(w.sku, 1));
    draft.push_price_line(PriceLine::new(PriceKind::Sale, "商品", dec!(30.00)).with_line(a));
    draft.push_price_line(PriceLine::new(PriceKind::Sale, "商品", dec!(40.00)).with_line(b));
    let order = w.platform.lifecycle.create(draft).unwrap();

    w.platform.orders.cancel_line(order.id, a, None, None).unwrap();
    assert_eq!(
        w.platform.store.find(order.id).unwrap().unwrap().state(),
        OrderState::Init
    );

    w.platform.orders.cancel_line(order.id, b, None, None).unwrap();
    let done = w.platform.store.find(order.id).unwrap().unwrap();
    assert_eq!(done.state(), OrderState::Canceled);

    // Creation locked 2 in one batch; each line released its own unit, so
    // the cascade itself had nothing left to move.
    assert_eq!(
        w.movement_kinds(),
        vec![MovementKind::Lock, MovementKind::Unlock, MovementKind::Unlock]
    );
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 10);
}

#[test]
fn payment_deducts_only_the_surviving_lines() {
    let w = world();
    let mut draft = Order::build("SO-split", "retail").with_user(w.user);
    let keep = draft.push_line(OrderLine::new(w.sku, 2));
    let dropped = draft.push_line(OrderLine::new(w.sku, 3));
    draft.push_price_line(PriceLine::new(PriceKind::Sale, "商品", dec!(40.00)).with_line(keep));
    draft.push_price_line(PriceLine::new(PriceKind::Sale, "商品", dec!(60.00)).with_line(dropped));
    let order = w.platform.lifecycle.create(draft).unwrap();

    w.platform.orders.cancel_line(order.id, dropped, None, Some("oos")).unwrap();
    w.pay(&order);

    // The cancelled line's 3 units went back at cancellation; payment
    // converted the remaining hold of 2 and nothing more.
    let movements: Vec<(MovementKind, i64)> =
        w.stock.movements().into_iter().map(|m| (m.kind, m.qty)).collect();
    assert_eq!(
        movements,
        vec![
            (MovementKind::Lock, 5),
            (MovementKind::Unlock, 3),
            (MovementKind::Unlock, 2),
            (MovementKind::Deduct, 2),
        ]
    );
    assert_eq!(w.stock.valid_stock(w.sku).unwrap(), 8);
    assert_eq!(w.platform.sales.sold(w.sku), 2);
}
