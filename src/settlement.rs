use crate::bank_registry::BankAccountRegistry;
use crate::context::ServiceContext;
use crate::error::{Result, SettlementError};
use crate::ledger::PayoutLedger;
use crate::metrics;
use crate::model::{
    BankAccount, BankAccountDraft, BankAccountSnapshot, EligibleOrder, Payout, PaymentMethod,
};
use crate::order_feed::EligibleOrderSource;
use crate::payout_fsm::{PayoutStateMachine, PayoutStatus, StatusChange};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{info, warn};

/// Façade the administrative callers invoke.
///
/// Composes the ledger, the bank account registry and the state machine.
/// Every operation is atomic: it either returns the updated record or a
/// typed error with no state changed. Mutations on one payout id are
/// serialized by the ledger's per-record guard; a lost race surfaces as
/// `ConcurrencyConflict` for the caller to retry.
pub struct SettlementService {
    ledger: Arc<PayoutLedger>,
    registry: Arc<BankAccountRegistry>,
    feed: Arc<dyn EligibleOrderSource>,
    ctx: ServiceContext,
    commission_rate: Decimal,
}

impl SettlementService {
    pub fn new(
        ledger: Arc<PayoutLedger>,
        registry: Arc<BankAccountRegistry>,
        feed: Arc<dyn EligibleOrderSource>,
        ctx: ServiceContext,
        commission_rate: Decimal,
    ) -> Self {
        info!(commission_rate = %commission_rate, "settlement service initialized");
        Self {
            ledger,
            registry,
            feed,
            ctx,
            commission_rate,
        }
    }

    // --- Payout intake ---

    /// Aggregate a producer's eligible, still-unsettled orders into a new
    /// PENDING batch. Orders already held by a live payout are skipped;
    /// an empty remainder is a validation error, not an empty batch.
    pub async fn aggregate_for_producer(&self, producer_id: &str) -> Result<Payout> {
        let orders: Vec<EligibleOrder> = self
            .feed
            .eligible_orders(producer_id)
            .await?
            .into_iter()
            .filter(|o| self.ledger.settled_by(&o.order_id).is_none())
            .collect();
        if orders.is_empty() {
            return Err(SettlementError::Validation(format!(
                "producer {} has no unsettled orders to aggregate",
                producer_id
            )));
        }
        self.create_payout(producer_id, &orders)
    }

    /// Direct intake of an eligible-order batch from the caller.
    pub fn create_payout(&self, producer_id: &str, orders: &[EligibleOrder]) -> Result<Payout> {
        self.ledger
            .create(producer_id, orders, self.commission_rate, &self.ctx)
    }

    // --- Lifecycle operations ---

    /// PENDING -> SCHEDULED. The settlement date must not be in the past.
    pub fn schedule(
        &self,
        payout_id: &str,
        scheduled_for: DateTime<Utc>,
        expected_version: Option<u64>,
    ) -> Result<Payout> {
        let now = self.ctx.time.now();
        if scheduled_for < now {
            return Err(SettlementError::Validation(format!(
                "settlement date {} is in the past",
                scheduled_for
            )));
        }
        let updated = self.ledger.mutate(payout_id, expected_version, |current| {
            let next_status =
                PayoutStateMachine::transition(current.status, PayoutStatus::Scheduled)?;
            let mut next = current.clone();
            next.status = next_status;
            next.scheduled_for = Some(scheduled_for);
            next.transitions.push(StatusChange {
                from: current.status,
                to: next_status,
                at: now,
                reason: None,
            });
            Ok(next)
        })?;
        metrics::PAYOUTS_SCHEDULED.inc();
        Ok(updated)
    }

    /// SCHEDULED -> PROCESSING: disbursement handed to the bank.
    pub fn mark_processing(&self, payout_id: &str, expected_version: Option<u64>) -> Result<Payout> {
        let now = self.ctx.time.now();
        self.ledger.mutate(payout_id, expected_version, |current| {
            let next_status =
                PayoutStateMachine::transition(current.status, PayoutStatus::Processing)?;
            let mut next = current.clone();
            next.status = next_status;
            next.transitions.push(StatusChange {
                from: current.status,
                to: next_status,
                at: now,
                reason: None,
            });
            Ok(next)
        })
    }

    /// SCHEDULED/PROCESSING -> COMPLETED. The irreversible, money-bearing
    /// operation: requires a non-empty payment reference and a verified
    /// bank account of the payout's own producer, freezes the account
    /// snapshot, and stamps the completion time. Once a reader observes
    /// COMPLETED the record never changes again.
    pub fn complete(
        &self,
        payout_id: &str,
        bank_account_id: &str,
        payment_reference: &str,
        payment_method: PaymentMethod,
        expected_version: Option<u64>,
    ) -> Result<Payout> {
        if payment_reference.trim().is_empty() {
            return Err(SettlementError::Validation(
                "payment reference must not be empty".into(),
            ));
        }
        let now = self.ctx.time.now();
        let updated = self.ledger.mutate(payout_id, expected_version, |current| {
            // Account checks run under the record guard so the verified
            // account and the transition commit as one decision.
            let account = self
                .registry
                .disbursement_account(bank_account_id, &current.producer_id)?;
            let next_status =
                PayoutStateMachine::transition(current.status, PayoutStatus::Completed)?;

            let mut next = current.clone();
            next.status = next_status;
            next.payment_reference = Some(payment_reference.to_string());
            next.payment_method = Some(payment_method);
            next.bank_account_snapshot = Some(BankAccountSnapshot::capture(&account, now));
            next.completed_at = Some(now);
            next.transitions.push(StatusChange {
                from: current.status,
                to: next_status,
                at: now,
                reason: None,
            });
            Ok(next)
        })?;

        metrics::PAYOUTS_COMPLETED.inc();
        metrics::SETTLED_NET_AMOUNT.observe(updated.net_amount.to_f64().unwrap_or(f64::MAX));
        info!(
            payout_id = %payout_id,
            bank_account_id = %bank_account_id,
            net = %updated.net_amount,
            "payout disbursed"
        );
        Ok(updated)
    }

    /// SCHEDULED/PROCESSING -> FAILED. Requires a non-empty reason and
    /// releases the batch's orders back to the unsettled pool — the
    /// retry path is a brand-new batch, never a resurrected one.
    pub fn fail(
        &self,
        payout_id: &str,
        reason: &str,
        expected_version: Option<u64>,
    ) -> Result<Payout> {
        if reason.trim().is_empty() {
            return Err(SettlementError::Validation(
                "failure reason must not be empty".into(),
            ));
        }
        let now = self.ctx.time.now();
        let updated = self.ledger.mutate(payout_id, expected_version, |current| {
            let next_status = PayoutStateMachine::transition(current.status, PayoutStatus::Failed)?;
            let mut next = current.clone();
            next.status = next_status;
            next.failure_reason = Some(reason.to_string());
            next.transitions.push(StatusChange {
                from: current.status,
                to: next_status,
                at: now,
                reason: Some(reason.to_string()),
            });
            Ok(next)
        })?;

        metrics::PAYOUTS_FAILED.inc();
        warn!(
            payout_id = %payout_id,
            reason = %reason,
            released_orders = updated.orders.len(),
            "payout failed, orders released for re-aggregation"
        );
        Ok(updated)
    }

    // --- Bank account administration ---

    pub fn register_bank_account(&self, draft: BankAccountDraft) -> Result<BankAccount> {
        self.registry.register(draft, &self.ctx)
    }

    pub fn verify_bank_account(&self, account_id: &str, verified_by: &str) -> Result<BankAccount> {
        self.registry.verify(account_id, verified_by, &self.ctx)
    }

    pub fn reject_bank_account(&self, account_id: &str, reason: &str) -> Result<BankAccount> {
        self.registry.reject(account_id, reason)
    }

    pub fn resubmit_bank_account(&self, account_id: &str) -> Result<BankAccount> {
        self.registry.resubmit(account_id)
    }

    // --- Reads ---

    pub fn payout(&self, payout_id: &str) -> Result<Payout> {
        self.ledger.get(payout_id)
    }

    pub fn payouts(&self, producer_id: Option<&str>, status: Option<PayoutStatus>) -> Vec<Payout> {
        self.ledger.list(producer_id, status)
    }

    pub fn bank_accounts(&self, producer_id: &str, include_unverified: bool) -> Vec<BankAccount> {
        self.registry.list_for_producer(producer_id, include_unverified)
    }

    pub fn disbursement_candidate(&self, producer_id: &str) -> Option<BankAccount> {
        self.registry.select_for_disbursement(producer_id)
    }
}
