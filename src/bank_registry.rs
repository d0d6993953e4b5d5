use crate::context::ServiceContext;
use crate::error::{Result, SettlementError};
use crate::model::{BankAccount, BankAccountDraft};
use crate::persistence::store::SettlementStore;
use crate::persistence::wal::WalEntry;
use dashmap::DashMap;
use dashmap::try_result::TryResult;
use std::sync::Arc;
use tracing::info;

/// Owns producer bank accounts and their verification state.
///
/// An account is in exactly one of three states: pending (unverified,
/// unrejected), verified, or rejected-with-reason. Disbursement is only
/// ever allowed against a verified account of the payout's own producer;
/// [`BankAccountRegistry::disbursement_account`] is the enforcement point.
pub struct BankAccountRegistry {
    accounts: DashMap<String, BankAccount>,
    store: Arc<SettlementStore>,
}

impl BankAccountRegistry {
    pub fn open(store: Arc<SettlementStore>) -> Result<Self> {
        let accounts = DashMap::new();
        for account in store.load_accounts()? {
            accounts.insert(account.id.clone(), account);
        }
        let registry = Self { accounts, store };
        info!(accounts = registry.accounts.len(), "bank account registry hydrated");
        Ok(registry)
    }

    /// Producer-side intake. Accounts always enter unverified; claiming
    /// primary demotes any existing primary for the same producer.
    pub fn register(&self, draft: BankAccountDraft, ctx: &ServiceContext) -> Result<BankAccount> {
        for (field, value) in [
            ("producer id", &draft.producer_id),
            ("bank name", &draft.bank_name),
            ("account name", &draft.account_name),
            ("account number", &draft.account_number),
        ] {
            if value.trim().is_empty() {
                return Err(SettlementError::Validation(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        if draft.is_primary {
            self.demote_primary(&draft.producer_id)?;
        }

        let account = BankAccount {
            id: ctx.id.new_id(),
            producer_id: draft.producer_id,
            bank_name: draft.bank_name,
            account_name: draft.account_name,
            account_number: draft.account_number,
            account_type: draft.account_type,
            branch_name: draft.branch_name,
            is_primary: draft.is_primary,
            is_verified: false,
            verified_at: None,
            verified_by: None,
            rejection_reason: None,
            created_at: ctx.time.now(),
            version: 0,
        };
        self.store
            .persist_account(&account, &WalEntry::AccountRegistered(Box::new(account.clone())))?;
        self.accounts.insert(account.id.clone(), account.clone());

        info!(
            account_id = %account.id,
            producer_id = %account.producer_id,
            primary = account.is_primary,
            "bank account registered"
        );
        Ok(account)
    }

    /// Administrative confirmation the account is valid for disbursement.
    /// Re-verifying a verified account is a no-op success. A rejected
    /// account must be resubmitted first.
    pub fn verify(
        &self,
        account_id: &str,
        verified_by: &str,
        ctx: &ServiceContext,
    ) -> Result<BankAccount> {
        self.mutate(account_id, |account| {
            if account.is_verified {
                return Ok(None);
            }
            if account.is_rejected() {
                return Err(SettlementError::Validation(format!(
                    "account {} was rejected and must be resubmitted before verification",
                    account_id
                )));
            }
            let mut next = account.clone();
            next.is_verified = true;
            next.verified_at = Some(ctx.time.now());
            next.verified_by = Some(verified_by.to_string());
            Ok(Some((
                next,
                WalEntry::AccountVerified {
                    account_id: account_id.to_string(),
                    verified_by: verified_by.to_string(),
                },
            )))
        })
    }

    /// Administrative rejection; requires a non-empty reason.
    pub fn reject(&self, account_id: &str, reason: &str) -> Result<BankAccount> {
        if reason.trim().is_empty() {
            return Err(SettlementError::Validation(
                "rejection reason must not be empty".into(),
            ));
        }
        self.mutate(account_id, |account| {
            let mut next = account.clone();
            next.is_verified = false;
            next.verified_at = None;
            next.verified_by = None;
            next.rejection_reason = Some(reason.to_string());
            Ok(Some((
                next,
                WalEntry::AccountRejected {
                    account_id: account_id.to_string(),
                    reason: reason.to_string(),
                },
            )))
        })
    }

    /// Producer resubmission after rejection: clears the rejection and
    /// the account re-enters the pending pool.
    pub fn resubmit(&self, account_id: &str) -> Result<BankAccount> {
        self.mutate(account_id, |account| {
            if !account.is_rejected() {
                return Err(SettlementError::Validation(format!(
                    "account {} is not rejected",
                    account_id
                )));
            }
            let mut next = account.clone();
            next.rejection_reason = None;
            Ok(Some((
                next,
                WalEntry::AccountResubmitted {
                    account_id: account_id.to_string(),
                },
            )))
        })
    }

    pub fn get(&self, account_id: &str) -> Result<BankAccount> {
        self.accounts
            .get(account_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| SettlementError::NotFound(format!("bank account {}", account_id)))
    }

    pub fn list_for_producer(&self, producer_id: &str, include_unverified: bool) -> Vec<BankAccount> {
        let mut items: Vec<BankAccount> = self
            .accounts
            .iter()
            .filter(|a| a.producer_id == producer_id)
            .filter(|a| include_unverified || a.is_verified)
            .map(|a| a.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }

    /// Auto-selection for disbursement: primary-and-verified first, then
    /// the oldest verified account, else none — the caller must choose
    /// explicitly or fail.
    pub fn select_for_disbursement(&self, producer_id: &str) -> Option<BankAccount> {
        let verified = self.list_for_producer(producer_id, false);
        verified
            .iter()
            .find(|a| a.is_primary)
            .or_else(|| verified.first())
            .cloned()
    }

    /// Resolve an account for disbursement against a specific producer's
    /// payout. Anything but a verified, same-producer account is refused.
    pub fn disbursement_account(&self, account_id: &str, producer_id: &str) -> Result<BankAccount> {
        let account = self.get(account_id)?;
        if account.producer_id != producer_id {
            return Err(SettlementError::Validation(format!(
                "bank account {} does not belong to producer {}",
                account_id, producer_id
            )));
        }
        if !account.is_verified {
            return Err(SettlementError::Validation(format!(
                "bank account {} is not verified for disbursement",
                account_id
            )));
        }
        Ok(account)
    }

    /// Serialized per-account update. The closure returns `None` for a
    /// no-op success, or the successor record plus its WAL entry.
    fn mutate<F>(&self, account_id: &str, f: F) -> Result<BankAccount>
    where
        F: FnOnce(&BankAccount) -> Result<Option<(BankAccount, WalEntry)>>,
    {
        let mut entry = match self.accounts.try_get_mut(account_id) {
            TryResult::Present(entry) => entry,
            TryResult::Absent => {
                return Err(SettlementError::NotFound(format!(
                    "bank account {}",
                    account_id
                )));
            }
            TryResult::Locked => {
                return Err(SettlementError::ConcurrencyConflict(format!(
                    "bank account {} is being modified",
                    account_id
                )));
            }
        };

        match f(&entry)? {
            None => Ok(entry.clone()),
            Some((mut next, wal_entry)) => {
                next.version = entry.version + 1;
                self.store.persist_account(&next, &wal_entry)?;
                *entry = next.clone();
                Ok(next)
            }
        }
    }

    fn demote_primary(&self, producer_id: &str) -> Result<()> {
        let current_primary: Vec<String> = self
            .accounts
            .iter()
            .filter(|a| a.producer_id == producer_id && a.is_primary)
            .map(|a| a.id.clone())
            .collect();
        for account_id in current_primary {
            self.mutate(&account_id, |account| {
                let mut next = account.clone();
                next.is_primary = false;
                Ok(Some((
                    next.clone(),
                    WalEntry::AccountRegistered(Box::new(next)),
                )))
            })?;
        }
        Ok(())
    }
}
