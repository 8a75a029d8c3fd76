use serde::{Deserialize, Serialize};

/// Order lifecycle state.
///
/// `Init` is the unique initial state; an order with nothing payable in CNY
/// is created directly in `Paid`. `Canceled` and the terminal aftersales
/// outcomes are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Init,
    Paying,
    Paid,
    PartShipped,
    Shipped,
    Received,
    Canceled,
    Expired,
    AftersalesIng,
    AftersalesSuccess,
    AftersalesFailed,
    Auditing,
    AcceptOrder,
    RejectOrder,
    Exception,
}

impl OrderState {
    /// User-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            OrderState::Init => "待支付",
            OrderState::Paying => "支付中",
            OrderState::Paid => "已支付",
            OrderState::PartShipped => "部分发货",
            OrderState::Shipped => "已发货",
            OrderState::Received => "已收货",
            OrderState::Canceled => "已取消",
            OrderState::Expired => "已过期",
            OrderState::AftersalesIng => "售后中",
            OrderState::AftersalesSuccess => "售后成功",
            OrderState::AftersalesFailed => "售后失败",
            OrderState::Auditing => "审核中",
            OrderState::AcceptOrder => "已接单",
            OrderState::RejectOrder => "已拒单",
            OrderState::Exception => "异常",
        }
    }

    /// Payment has not settled yet.
    pub fn is_unpaid(&self) -> bool {
        matches!(self, OrderState::Init | OrderState::Paying)
    }

    /// No further lifecycle transition leaves this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Canceled
                | OrderState::Expired
                | OrderState::AftersalesSuccess
                | OrderState::AftersalesFailed
        )
    }

    /// States from which `receive` may complete.
    pub fn can_receive(&self) -> bool {
        matches!(
            self,
            OrderState::Paid | OrderState::PartShipped | OrderState::Shipped
        )
    }
}

impl core::fmt::Display for OrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaid_covers_exactly_init_and_paying() {
        for state in [OrderState::Init, OrderState::Paying] {
            assert!(state.is_unpaid());
        }
        for state in [OrderState::Paid, OrderState::Canceled, OrderState::Shipped] {
            assert!(!state.is_unpaid());
        }
    }

    #[test]
    fn canceled_is_terminal() {
        assert!(OrderState::Canceled.is_terminal());
        assert!(!OrderState::Paid.is_terminal());
    }
}
