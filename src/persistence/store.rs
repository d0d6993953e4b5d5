use crate::model::{BankAccount, Payout};
use crate::payout_fsm::PayoutStatus;
use crate::persistence::redb_store::{RedbStore, StoreError};
use crate::persistence::wal::{WalEntry, WalManager};
use redb::{ReadableTable, TableDefinition};
use std::sync::Arc;

// Tables
const PAYOUTS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("payouts");
const ACCOUNTS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("bank_accounts");
/// order_id -> id of the non-FAILED payout currently holding it.
const ORDER_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("order_index");

/// Durable layout of the settlement core: payout records, bank accounts,
/// and the order index, with a WAL entry ahead of every write. A payout's
/// state, references and snapshot land in a single transaction together
/// with its order-index changes, so readers never recover a partial write.
pub struct SettlementStore {
    store: Arc<RedbStore>,
    wal: Arc<WalManager>,
}

impl SettlementStore {
    pub fn new(store: Arc<RedbStore>, wal: Arc<WalManager>) -> Result<Self, StoreError> {
        // Create all tables up front so first reads on a fresh database
        // see empty tables instead of TableDoesNotExist.
        let txn = store.begin_write()?;
        {
            let _ = txn.open_table(PAYOUTS_TABLE)?;
            let _ = txn.open_table(ACCOUNTS_TABLE)?;
            let _ = txn.open_table(ORDER_INDEX_TABLE)?;
        }
        txn.commit()?;
        wal.initialize()?;

        Ok(Self { store, wal })
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    // --- Payouts ---

    pub fn persist_new_payout(&self, payout: &Payout) -> Result<(), StoreError> {
        // WAL first
        self.wal
            .append(&WalEntry::PayoutCreated(Box::new(payout.clone())))?;

        // Record and order-index reservations commit together
        let txn = self.store.begin_write()?;
        {
            let mut payouts = txn.open_table(PAYOUTS_TABLE)?;
            let data = serde_json::to_vec(payout)?;
            payouts.insert(payout.id.as_str(), data)?;

            let mut index = txn.open_table(ORDER_INDEX_TABLE)?;
            for order in &payout.orders {
                index.insert(order.order_id.as_str(), payout.id.as_str())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Persist an applied transition. `released_orders` is non-empty only
    /// when the payout entered FAILED and its orders return to the
    /// unsettled pool; the removal commits atomically with the record.
    pub fn persist_transition(
        &self,
        payout: &Payout,
        from: PayoutStatus,
        reason: Option<&str>,
        released_orders: &[String],
    ) -> Result<(), StoreError> {
        self.wal.append(&WalEntry::PayoutTransition {
            payout_id: payout.id.clone(),
            from,
            to: payout.status,
            reason: reason.map(str::to_string),
        })?;
        if !released_orders.is_empty() {
            self.wal.append(&WalEntry::OrdersReleased {
                payout_id: payout.id.clone(),
                order_ids: released_orders.to_vec(),
            })?;
        }

        let txn = self.store.begin_write()?;
        {
            let mut payouts = txn.open_table(PAYOUTS_TABLE)?;
            let data = serde_json::to_vec(payout)?;
            payouts.insert(payout.id.as_str(), data)?;

            if !released_orders.is_empty() {
                let mut index = txn.open_table(ORDER_INDEX_TABLE)?;
                for order_id in released_orders {
                    index.remove(order_id.as_str())?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_payouts(&self) -> Result<Vec<Payout>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(PAYOUTS_TABLE)?;
        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (_, v) = res?;
            let item: Payout = serde_json::from_slice(&v.value())?;
            items.push(item);
        }
        Ok(items)
    }

    pub fn load_order_index(&self) -> Result<Vec<(String, String)>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(ORDER_INDEX_TABLE)?;
        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (k, v) = res?;
            items.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(items)
    }

    // --- Bank accounts ---

    pub fn persist_account(
        &self,
        account: &BankAccount,
        entry: &WalEntry,
    ) -> Result<(), StoreError> {
        self.wal.append(entry)?;

        let txn = self.store.begin_write()?;
        {
            let mut table = txn.open_table(ACCOUNTS_TABLE)?;
            let data = serde_json::to_vec(account)?;
            table.insert(account.id.as_str(), data)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_accounts(&self) -> Result<Vec<BankAccount>, StoreError> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(ACCOUNTS_TABLE)?;
        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (_, v) = res?;
            let item: BankAccount = serde_json::from_slice(&v.value())?;
            items.push(item);
        }
        Ok(items)
    }
}
