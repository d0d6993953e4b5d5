use chrono::{DateTime, Utc};
use harvest_settlement_rs::bank_registry::BankAccountRegistry;
use harvest_settlement_rs::context::{SequentialIdProvider, ServiceContext, SimulatedTimeProvider};
use harvest_settlement_rs::ledger::PayoutLedger;
use harvest_settlement_rs::model::{BankAccountDraft, EligibleOrder};
use harvest_settlement_rs::order_feed::{EligibleOrderSource, InMemoryOrderFeed};
use harvest_settlement_rs::persistence::redb_store::RedbStore;
use harvest_settlement_rs::persistence::store::SettlementStore;
use harvest_settlement_rs::persistence::wal::WalManager;
use harvest_settlement_rs::settlement::SettlementService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub struct TestHarness {
    pub service: Arc<SettlementService>,
    pub feed: Arc<InMemoryOrderFeed>,
    pub clock: Arc<SimulatedTimeProvider>,
    pub store: Arc<SettlementStore>,
    pub db_path: String,
}

/// Build a full settlement stack on a scratch database.
pub fn harness(tag: &str) -> TestHarness {
    let db_path = format!("/tmp/settlement_test_{}_{}.redb", tag, uuid::Uuid::new_v4());
    harness_at(&db_path)
}

/// Build the stack against an existing database path (recovery tests).
pub fn harness_at(db_path: &str) -> TestHarness {
    let redb = Arc::new(RedbStore::open(db_path).unwrap());
    let wal = Arc::new(WalManager::new(redb.clone()));
    let store = Arc::new(SettlementStore::new(redb, wal).unwrap());

    let clock = Arc::new(SimulatedTimeProvider::new(Utc::now()));
    let ctx = ServiceContext {
        time: clock.clone(),
        id: Arc::new(SequentialIdProvider::new()),
    };

    let ledger = Arc::new(PayoutLedger::open(store.clone()).unwrap());
    let registry = Arc::new(BankAccountRegistry::open(store.clone()).unwrap());
    let feed = Arc::new(InMemoryOrderFeed::new());
    let feed_port: Arc<dyn EligibleOrderSource> = feed.clone();

    let service = Arc::new(SettlementService::new(
        ledger,
        registry,
        feed_port,
        ctx,
        dec!(0.10),
    ));

    TestHarness {
        service,
        feed,
        clock,
        store,
        db_path: db_path.to_string(),
    }
}

impl TestHarness {
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn order(id: &str, producer: &str, amount: Decimal) -> EligibleOrder {
    EligibleOrder {
        order_id: id.to_string(),
        producer_id: producer.to_string(),
        amount,
        order_date: Utc::now(),
    }
}

pub fn account_draft(producer: &str, primary: bool) -> BankAccountDraft {
    BankAccountDraft {
        producer_id: producer.to_string(),
        bank_name: "First Agricultural".into(),
        account_name: "Meadow Farm Co".into(),
        account_number: "000123456".into(),
        account_type: "checking".into(),
        branch_name: "Main St".into(),
        is_primary: primary,
    }
}

pub fn tomorrow(clock: &SimulatedTimeProvider) -> DateTime<Utc> {
    use harvest_settlement_rs::context::TimeProvider;
    clock.now() + chrono::Duration::days(1)
}
