//! Core domain types for the intake pipeline.

use std::fmt;

use crate::Amount;
use crate::discount::Percent;
use crate::mask::Masked;

/// A partner allowed to submit transactions.
#[derive(Clone, PartialEq, Eq)]
pub struct PartnerRecord {
    /// Unique key of the registry.
    pub reference_no: String,
    pub display_name: String,
    /// Plaintext shared secret, held in memory only.
    pub shared_secret: String,
}

impl PartnerRecord {
    pub fn new(
        reference_no: impl Into<String>,
        display_name: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            reference_no: reference_no.into(),
            display_name: display_name.into(),
            shared_secret: shared_secret.into(),
        }
    }
}

impl fmt::Debug for PartnerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerRecord")
            .field("reference_no", &self.reference_no)
            .field("display_name", &self.display_name)
            .field("shared_secret", &Masked(&self.shared_secret))
            .finish()
    }
}

/// One line of the purchased basket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLine {
    pub partner_item_ref: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Amount,
}

impl ItemLine {
    /// `quantity * unit_price`, `None` on overflow.
    pub fn line_total(&self) -> Option<Amount> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// A single inbound call, owned by one pipeline invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub partner_key: String,
    pub partner_ref_no: String,
    /// Base64 of the UTF-8 plaintext secret.
    pub partner_password: String,
    pub total_amount: Amount,
    pub items: Option<Vec<ItemLine>>,
    pub timestamp: String,
    pub signature: String,
}

impl fmt::Debug for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRequest")
            .field("partner_key", &self.partner_key)
            .field("partner_ref_no", &self.partner_ref_no)
            .field("partner_password", &Masked(&self.partner_password))
            .field("total_amount", &self.total_amount)
            .field("items", &self.items)
            .field("timestamp", &self.timestamp)
            .field("signature", &self.signature)
            .finish()
    }
}

/// The fields covered by a signature. Borrowed for the duration of one
/// build or verify call and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureContext<'a> {
    pub partner_key: &'a str,
    pub partner_ref_no: &'a str,
    pub total_amount: Amount,
    /// Timestamp exactly as it enters the canonical string.
    pub timestamp: &'a str,
}

/// Amounts computed for an accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub total_amount: Amount,
    pub total_discount: Amount,
    pub final_amount: Amount,
    pub percent: Percent,
}

/// Wire-level result flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeResult {
    Success,
    Failure,
}

impl OutcomeResult {
    /// `1` for success, `0` for failure.
    pub fn code(self) -> u8 {
        match self {
            OutcomeResult::Success => 1,
            OutcomeResult::Failure => 0,
        }
    }
}

/// The single result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Success(Settlement),
    Failure { message: String },
}

impl TransactionOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        TransactionOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn result(&self) -> OutcomeResult {
        match self {
            TransactionOutcome::Success(_) => OutcomeResult::Success,
            TransactionOutcome::Failure { .. } => OutcomeResult::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success(_))
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match self {
            TransactionOutcome::Success(settlement) => Some(settlement),
            TransactionOutcome::Failure { .. } => None,
        }
    }

    /// Failure message, absent on success.
    pub fn message(&self) -> Option<&str> {
        match self {
            TransactionOutcome::Success(_) => None,
            TransactionOutcome::Failure { message } => Some(message),
        }
    }
}
