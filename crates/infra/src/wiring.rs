//! Assembly of the full order platform: ledgers, subscribers, lifecycle
//! chain and services, wired in the one order that keeps side effects
//! correct (stock before credit, counters last).

use std::sync::Arc;

use vendo_core::FreeLabelSource;
use vendo_ledgers::{
    CreditLedger, CurrencyResolver, EntityLock, LockRegistry, PaymentGateway, StockLedger,
};
use vendo_orders::{
    lifecycle_chain, CreationGuard, Lifecycle, MemoryOrderStore, OrderDispatcher, OrderService,
    OrderStore, PaymentCallbackService,
};

use crate::outbox::{RefundOutbox, RefundWorker, RetryPolicy};
use crate::subscribers::{CreditSubscriber, SalesCounter, StockSubscriber};

/// External collaborators and tuning knobs for one platform instance.
pub struct PlatformConfig {
    pub stock: Arc<dyn StockLedger>,
    pub credit: Arc<dyn CreditLedger>,
    pub currencies: Arc<dyn CurrencyResolver>,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub free_label: Arc<dyn FreeLabelSource>,
    pub retry_policy: RetryPolicy,
}

/// The wired platform.
pub struct OrderPlatform {
    pub store: Arc<dyn OrderStore>,
    pub locks: Arc<dyn EntityLock>,
    pub lifecycle: Arc<dyn Lifecycle>,
    pub orders: OrderService,
    pub callbacks: PaymentCallbackService,
    pub outbox: Arc<RefundOutbox>,
    pub refund_worker: RefundWorker,
    pub sales: Arc<SalesCounter>,
}

impl OrderPlatform {
    pub fn build(config: PlatformConfig) -> Self {
        let store: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
        Self::build_with_store(store, config)
    }

    pub fn build_with_store(store: Arc<dyn OrderStore>, config: PlatformConfig) -> Self {
        let locks: Arc<dyn EntityLock> = Arc::new(LockRegistry::new());
        let outbox = Arc::new(RefundOutbox::new());

        let stock = Arc::new(StockSubscriber::new(config.stock, locks.clone()));
        let credit = Arc::new(CreditSubscriber::new(
            config.credit.clone(),
            config.currencies,
            outbox.clone(),
        ));
        let sales = Arc::new(SalesCounter::new());

        let mut dispatcher = OrderDispatcher::new();
        dispatcher.register(stock.clone());
        dispatcher.register(credit.clone());
        dispatcher.register(sales.clone());
        let dispatcher = Arc::new(dispatcher);

        let guards: Vec<Arc<dyn CreationGuard>> = vec![stock, credit];
        let lifecycle = lifecycle_chain(
            store.clone(),
            dispatcher.clone(),
            guards,
            config.free_label,
        );

        let orders = OrderService::new(
            store.clone(),
            lifecycle.clone(),
            dispatcher.clone(),
            locks.clone(),
            config.gateway,
        );
        let callbacks = PaymentCallbackService::new(store.clone(), dispatcher, locks.clone());
        let refund_worker = RefundWorker::new(
            store.clone(),
            config.credit,
            locks.clone(),
            outbox.clone(),
            config.retry_policy,
        );

        Self {
            store,
            locks,
            lifecycle,
            orders,
            callbacks,
            outbox,
            refund_worker,
            sales,
        }
    }
}
