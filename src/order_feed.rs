use crate::error::{Result, SettlementError};
use crate::model::EligibleOrder;
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Port to the external order subsystem: a read-only feed of completed
/// sales eligible for aggregation into a new payout batch. The feed has
/// no notion of settlement state; the ledger's order index decides what
/// is still unsettled.
#[async_trait]
pub trait EligibleOrderSource: Send + Sync {
    async fn eligible_orders(&self, producer_id: &str) -> Result<Vec<EligibleOrder>>;
}

/// In-memory feed backing tests and local runs.
#[derive(Default)]
pub struct InMemoryOrderFeed {
    orders: RwLock<Vec<EligibleOrder>>,
}

impl InMemoryOrderFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, order: EligibleOrder) -> Result<()> {
        if order.amount <= Decimal::ZERO {
            return Err(SettlementError::Validation(format!(
                "order {} has non-positive amount {}",
                order.order_id, order.amount
            )));
        }
        let mut orders = self.orders.write();
        if orders.iter().any(|o| o.order_id == order.order_id) {
            return Err(SettlementError::Validation(format!(
                "order {} already published",
                order.order_id
            )));
        }
        orders.push(order);
        Ok(())
    }
}

#[async_trait]
impl EligibleOrderSource for InMemoryOrderFeed {
    async fn eligible_orders(&self, producer_id: &str) -> Result<Vec<EligibleOrder>> {
        Ok(self
            .orders
            .read()
            .iter()
            .filter(|o| o.producer_id == producer_id)
            .cloned()
            .collect())
    }
}
