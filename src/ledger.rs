use crate::context::ServiceContext;
use crate::error::{Result, SettlementError};
use crate::metrics;
use crate::model::{EligibleOrder, Payout, SettledOrder};
use crate::payout_fsm::{PayoutStatus, StatusChange};
use crate::persistence::store::SettlementStore;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::try_result::TryResult;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Platform fee for a batch: fraction of gross, rounded to cents at
/// creation time and frozen thereafter.
pub fn commission_for(gross: Decimal, rate: Decimal) -> Decimal {
    (gross * rate).round_dp(2)
}

/// Single source of truth for payout records and the order -> payout
/// index. All mutations flow through [`PayoutLedger::mutate`], which
/// serializes writers per record and publishes each committed record
/// atomically; reads are projections with no authority.
pub struct PayoutLedger {
    payouts: DashMap<String, Payout>,
    /// order_id -> id of the non-FAILED payout holding it. An order id is
    /// never held by two live batches; failing a payout releases its ids.
    order_index: DashMap<String, String>,
    store: Arc<SettlementStore>,
}

impl PayoutLedger {
    /// Hydrates the ledger from the store. The order index is rebuilt
    /// from the persisted table and cross-checked against the records.
    pub fn open(store: Arc<SettlementStore>) -> Result<Self> {
        let payouts = DashMap::new();
        for payout in store.load_payouts()? {
            payouts.insert(payout.id.clone(), payout);
        }

        let order_index = DashMap::new();
        for (order_id, payout_id) in store.load_order_index()? {
            order_index.insert(order_id, payout_id);
        }

        let ledger = Self {
            payouts,
            order_index,
            store,
        };
        info!(
            payouts = ledger.payouts.len(),
            settled_orders = ledger.order_index.len(),
            "payout ledger hydrated"
        );
        Ok(ledger)
    }

    /// Create a PENDING batch from a producer's eligible orders.
    ///
    /// Validates the batch, reserves every order id in the index (an id
    /// already held by a live payout rejects the whole batch), computes
    /// the frozen commission figures, and persists record + reservations
    /// together.
    pub fn create(
        &self,
        producer_id: &str,
        orders: &[EligibleOrder],
        commission_rate: Decimal,
        ctx: &ServiceContext,
    ) -> Result<Payout> {
        if producer_id.trim().is_empty() {
            return Err(SettlementError::Validation(
                "producer id must not be empty".into(),
            ));
        }
        if orders.is_empty() {
            return Err(SettlementError::Validation(
                "a payout batch needs at least one order".into(),
            ));
        }
        if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE {
            return Err(SettlementError::Validation(format!(
                "commission rate {} outside [0, 1)",
                commission_rate
            )));
        }
        for order in orders {
            if order.producer_id != producer_id {
                return Err(SettlementError::Validation(format!(
                    "order {} belongs to producer {}, not {}",
                    order.order_id, order.producer_id, producer_id
                )));
            }
            if order.amount <= Decimal::ZERO {
                return Err(SettlementError::Validation(format!(
                    "order {} has non-positive amount {}",
                    order.order_id, order.amount
                )));
            }
        }

        let payout_id = ctx.id.new_id();
        let now = ctx.time.now();

        // Reserve order ids one at a time; on a duplicate, roll back what
        // this call reserved and reject the batch. The entry API makes
        // each reservation atomic against concurrent creates.
        let mut reserved: Vec<String> = Vec::with_capacity(orders.len());
        for order in orders {
            match self.order_index.entry(order.order_id.clone()) {
                Entry::Occupied(held) => {
                    let holder = held.get().clone();
                    drop(held);
                    for order_id in &reserved {
                        self.order_index.remove(order_id);
                    }
                    warn!(
                        order_id = %order.order_id,
                        payout_id = %holder,
                        "order already settled by a live payout"
                    );
                    return Err(SettlementError::Validation(format!(
                        "order {} is already included in payout {}",
                        order.order_id, holder
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(payout_id.clone());
                    reserved.push(order.order_id.clone());
                }
            }
        }

        let gross_amount: Decimal = orders.iter().map(|o| o.amount).sum();
        let commission = commission_for(gross_amount, commission_rate);
        let payout = Payout {
            id: payout_id.clone(),
            producer_id: producer_id.to_string(),
            gross_amount,
            commission_rate,
            commission,
            net_amount: gross_amount - commission,
            status: PayoutStatus::Pending,
            scheduled_for: None,
            orders: orders.iter().map(SettledOrder::from).collect(),
            payment_reference: None,
            payment_method: None,
            bank_account_snapshot: None,
            failure_reason: None,
            transitions: Vec::new(),
            created_at: now,
            completed_at: None,
            version: 0,
        };
        debug_assert!(payout.amounts_consistent());

        if let Err(e) = self.store.persist_new_payout(&payout) {
            for order_id in &reserved {
                self.order_index.remove(order_id);
            }
            return Err(e.into());
        }
        self.payouts.insert(payout_id.clone(), payout.clone());

        metrics::PAYOUTS_CREATED.inc();
        metrics::OPEN_PAYOUTS.inc();
        info!(
            payout_id = %payout_id,
            producer_id = %producer_id,
            orders = payout.orders.len(),
            gross = %payout.gross_amount,
            net = %payout.net_amount,
            "payout batch created"
        );
        Ok(payout)
    }

    /// Sole mutation entrypoint.
    ///
    /// Takes the per-record write guard without blocking; contention and
    /// stale `expected_version` submissions return `ConcurrencyConflict`
    /// immediately, with no side effects. The closure receives the
    /// current record and returns the fully transitioned successor, which
    /// is persisted (WAL + state, order releases included) and then
    /// published in one swap, so readers see pre- or post-transition
    /// state and nothing in between.
    pub fn mutate<F>(&self, payout_id: &str, expected_version: Option<u64>, f: F) -> Result<Payout>
    where
        F: FnOnce(&Payout) -> Result<Payout>,
    {
        let mut entry = match self.payouts.try_get_mut(payout_id) {
            TryResult::Present(entry) => entry,
            TryResult::Absent => {
                return Err(SettlementError::NotFound(format!("payout {}", payout_id)));
            }
            TryResult::Locked => {
                metrics::CONCURRENCY_CONFLICTS.inc();
                return Err(SettlementError::ConcurrencyConflict(format!(
                    "payout {} is being modified",
                    payout_id
                )));
            }
        };

        if let Some(expected) = expected_version
            && expected != entry.version
        {
            metrics::CONCURRENCY_CONFLICTS.inc();
            return Err(SettlementError::ConcurrencyConflict(format!(
                "payout {} is at version {}, caller expected {}",
                payout_id, entry.version, expected
            )));
        }

        let previous_status = entry.status;
        let mut next = f(&entry)?;
        next.version = entry.version + 1;

        let released: Vec<String> = if next.status == PayoutStatus::Failed {
            next.orders.iter().map(|o| o.order_id.clone()).collect()
        } else {
            Vec::new()
        };

        let reason = next
            .transitions
            .last()
            .and_then(|t| t.reason.as_deref())
            .map(str::to_string);
        self.store
            .persist_transition(&next, previous_status, reason.as_deref(), &released)?;

        for order_id in &released {
            self.order_index.remove(order_id);
        }
        *entry = next.clone();
        drop(entry);

        if next.status.is_terminal() {
            metrics::OPEN_PAYOUTS.dec();
        }
        info!(
            payout_id = %payout_id,
            from = %previous_status,
            to = %next.status,
            version = next.version,
            "payout transition committed"
        );
        Ok(next)
    }

    // --- Reads ---

    pub fn get(&self, payout_id: &str) -> Result<Payout> {
        self.payouts
            .get(payout_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| SettlementError::NotFound(format!("payout {}", payout_id)))
    }

    pub fn list(&self, producer_id: Option<&str>, status: Option<PayoutStatus>) -> Vec<Payout> {
        let mut items: Vec<Payout> = self
            .payouts
            .iter()
            .filter(|p| producer_id.is_none_or(|id| p.producer_id == id))
            .filter(|p| status.is_none_or(|s| p.status == s))
            .map(|p| p.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }

    /// Id of the live payout holding this order, if any.
    pub fn settled_by(&self, order_id: &str) -> Option<String> {
        self.order_index.get(order_id).map(|p| p.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::redb_store::RedbStore;
    use crate::persistence::wal::WalManager;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_ledger(tag: &str) -> (PayoutLedger, ServiceContext, String) {
        let db_path = format!("/tmp/ledger_test_{}_{}.redb", tag, uuid::Uuid::new_v4());
        let redb = Arc::new(RedbStore::open(&db_path).unwrap());
        let wal = Arc::new(WalManager::new(redb.clone()));
        let store = Arc::new(SettlementStore::new(redb, wal).unwrap());
        let ctx = ServiceContext::new_simulated(Utc::now());
        (PayoutLedger::open(store).unwrap(), ctx, db_path)
    }

    fn order(id: &str, producer: &str, amount: Decimal) -> EligibleOrder {
        EligibleOrder {
            order_id: id.to_string(),
            producer_id: producer.to_string(),
            amount,
            order_date: Utc::now(),
        }
    }

    #[test]
    fn test_commission_formula() {
        assert_eq!(commission_for(dec!(1000), dec!(0.10)), dec!(100));
        assert_eq!(commission_for(dec!(333.33), dec!(0.10)), dec!(33.33));
        assert_eq!(commission_for(dec!(0.01), dec!(0.10)), dec!(0.00));
    }

    #[test]
    fn test_create_freezes_amounts() {
        let (ledger, ctx, db) = test_ledger("amounts");
        let payout = ledger
            .create(
                "prod-1",
                &[
                    order("o-1", "prod-1", dec!(600)),
                    order("o-2", "prod-1", dec!(400)),
                ],
                dec!(0.10),
                &ctx,
            )
            .unwrap();

        assert_eq!(payout.gross_amount, dec!(1000));
        assert_eq!(payout.commission, dec!(100));
        assert_eq!(payout.net_amount, dec!(900));
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert!(payout.amounts_consistent());

        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_order_cannot_join_two_live_payouts() {
        let (ledger, ctx, db) = test_ledger("double");
        ledger
            .create("prod-1", &[order("o-1", "prod-1", dec!(50))], dec!(0.10), &ctx)
            .unwrap();

        let err = ledger
            .create(
                "prod-1",
                &[
                    order("o-2", "prod-1", dec!(10)),
                    order("o-1", "prod-1", dec!(50)),
                ],
                dec!(0.10),
                &ctx,
            )
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)));
        // The failed batch must not leave o-2 reserved
        assert!(ledger.settled_by("o-2").is_none());

        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_create_rejects_foreign_and_empty_batches() {
        let (ledger, ctx, db) = test_ledger("reject");
        assert!(matches!(
            ledger.create("prod-1", &[], dec!(0.10), &ctx),
            Err(SettlementError::Validation(_))
        ));
        assert!(matches!(
            ledger.create(
                "prod-1",
                &[order("o-1", "prod-2", dec!(10))],
                dec!(0.10),
                &ctx
            ),
            Err(SettlementError::Validation(_))
        ));
        assert!(matches!(
            ledger.create(
                "prod-1",
                &[order("o-1", "prod-1", dec!(0))],
                dec!(0.10),
                &ctx
            ),
            Err(SettlementError::Validation(_))
        ));

        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_mutate_bumps_version_and_rejects_stale() {
        let (ledger, ctx, db) = test_ledger("version");
        let payout = ledger
            .create("prod-1", &[order("o-1", "prod-1", dec!(100))], dec!(0.10), &ctx)
            .unwrap();
        assert_eq!(payout.version, 0);

        let updated = ledger
            .mutate(&payout.id, Some(0), |current| {
                let mut next = current.clone();
                next.status = PayoutStatus::Scheduled;
                next.transitions.push(StatusChange {
                    from: current.status,
                    to: next.status,
                    at: ctx.time.now(),
                    reason: None,
                });
                Ok(next)
            })
            .unwrap();
        assert_eq!(updated.version, 1);

        let err = ledger
            .mutate(&payout.id, Some(0), |current| Ok(current.clone()))
            .unwrap_err();
        assert!(matches!(err, SettlementError::ConcurrencyConflict(_)));

        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_failed_payout_releases_orders() {
        let (ledger, ctx, db) = test_ledger("release");
        let payout = ledger
            .create("prod-1", &[order("o-1", "prod-1", dec!(100))], dec!(0.10), &ctx)
            .unwrap();
        assert_eq!(ledger.settled_by("o-1").as_deref(), Some(payout.id.as_str()));

        ledger
            .mutate(&payout.id, None, |current| {
                let mut next = current.clone();
                next.status = PayoutStatus::Failed;
                next.failure_reason = Some("bank declined".into());
                next.transitions.push(StatusChange {
                    from: current.status,
                    to: next.status,
                    at: ctx.time.now(),
                    reason: next.failure_reason.clone(),
                });
                Ok(next)
            })
            .unwrap();

        assert!(ledger.settled_by("o-1").is_none());
        // Released order can join a fresh batch
        assert!(
            ledger
                .create("prod-1", &[order("o-1", "prod-1", dec!(100))], dec!(0.10), &ctx)
                .is_ok()
        );

        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_list_filters() {
        let (ledger, ctx, db) = test_ledger("list");
        ledger
            .create("prod-1", &[order("o-1", "prod-1", dec!(10))], dec!(0.10), &ctx)
            .unwrap();
        ledger
            .create("prod-2", &[order("o-2", "prod-2", dec!(20))], dec!(0.10), &ctx)
            .unwrap();

        assert_eq!(ledger.list(None, None).len(), 2);
        assert_eq!(ledger.list(Some("prod-1"), None).len(), 1);
        assert_eq!(ledger.list(None, Some(PayoutStatus::Pending)).len(), 2);
        assert_eq!(ledger.list(None, Some(PayoutStatus::Completed)).len(), 0);

        let _ = std::fs::remove_file(db);
    }
}
