use crate::payout_fsm::{PayoutStatus, StatusChange};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "BANK_TRANSFER")]
    BankTransfer,
    #[serde(rename = "CHECK")]
    Check,
    #[serde(rename = "MOBILE_WALLET")]
    MobileWallet,
}

/// Read-only reference to a completed sale, fed in by the external order
/// subsystem. The settlement core only ever reads these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleOrder {
    pub order_id: String,
    pub producer_id: String,
    pub amount: Decimal,
    pub order_date: DateTime<Utc>,
}

/// An order captured into a payout batch at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledOrder {
    pub order_id: String,
    pub order_date: DateTime<Utc>,
    pub amount: Decimal,
}

impl From<&EligibleOrder> for SettledOrder {
    fn from(order: &EligibleOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            order_date: order.order_date,
            amount: order.amount,
        }
    }
}

/// A batch settlement of a producer's accumulated order earnings.
///
/// Mutated only through the ledger's guarded transition entrypoint; once
/// `status` is terminal the record never changes again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: String,
    pub producer_id: String,
    pub gross_amount: Decimal,
    /// Platform fee fraction in effect at batch creation, frozen thereafter.
    pub commission_rate: Decimal,
    pub commission: Decimal,
    pub net_amount: Decimal,
    pub status: PayoutStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub orders: Vec<SettledOrder>,
    pub payment_reference: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Frozen copy of the disbursement account, captured at completion.
    /// Later edits to the live account never alter settled history.
    pub bank_account_snapshot: Option<BankAccountSnapshot>,
    pub failure_reason: Option<String>,
    pub transitions: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped on every committed mutation; basis of optimistic retries.
    #[serde(default)]
    pub version: u64,
}

impl Payout {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Invariants every stored payout satisfies:
    /// `commission + net == gross` and `sum(orders) == gross`.
    pub fn amounts_consistent(&self) -> bool {
        let order_sum: Decimal = self.orders.iter().map(|o| o.amount).sum();
        self.commission + self.net_amount == self.gross_amount && order_sum == self.gross_amount
    }
}

/// A producer's bank account and its verification state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: String,
    pub producer_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub account_type: String,
    pub branch_name: String,
    pub is_primary: bool,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    /// Set only when explicitly rejected; mutually exclusive with
    /// `is_verified == true`.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl BankAccount {
    pub fn is_rejected(&self) -> bool {
        self.rejection_reason.is_some()
    }
}

/// Producer-submitted account details, before the registry assigns an id
/// and verification state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountDraft {
    pub producer_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub account_type: String,
    pub branch_name: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Identifying fields of the disbursement account, frozen at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountSnapshot {
    pub account_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub account_type: String,
    pub branch_name: String,
    pub captured_at: DateTime<Utc>,
}

impl BankAccountSnapshot {
    pub fn capture(account: &BankAccount, at: DateTime<Utc>) -> Self {
        Self {
            account_id: account.id.clone(),
            bank_name: account.bank_name.clone(),
            account_name: account.account_name.clone(),
            account_number: account.account_number.clone(),
            account_type: account.account_type.clone(),
            branch_name: account.branch_name.clone(),
            captured_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payout_with(gross: Decimal, commission: Decimal, net: Decimal) -> Payout {
        Payout {
            id: "p-1".into(),
            producer_id: "prod-1".into(),
            gross_amount: gross,
            commission_rate: dec!(0.10),
            commission,
            net_amount: net,
            status: PayoutStatus::Pending,
            scheduled_for: None,
            orders: vec![SettledOrder {
                order_id: "o-1".into(),
                order_date: Utc::now(),
                amount: gross,
            }],
            payment_reference: None,
            payment_method: None,
            bank_account_snapshot: None,
            failure_reason: None,
            transitions: vec![],
            created_at: Utc::now(),
            completed_at: None,
            version: 0,
        }
    }

    #[test]
    fn test_amounts_consistent() {
        assert!(payout_with(dec!(1000), dec!(100), dec!(900)).amounts_consistent());
        assert!(!payout_with(dec!(1000), dec!(100), dec!(850)).amounts_consistent());
    }

    #[test]
    fn test_payment_method_wire_format() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"BANK_TRANSFER\"");
    }
}
