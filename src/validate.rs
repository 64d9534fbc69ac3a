//! Field-level checks run before the pipeline proper.
//!
//! Every failing rule contributes one message; the messages are reported
//! together, in field order, joined with `"; "`.

use thiserror::Error;

use crate::Amount;
use crate::model::{ItemLine, TransactionRequest};

const MAX_PARTNER_FIELD: usize = 50;
const MAX_ITEM_REF: usize = 50;
const MAX_ITEM_NAME: usize = 100;
const MIN_QTY: i32 = 1;
const MAX_QTY: i32 = 5;

/// One or more field rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.join("; "))]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

/// Collects messages while walking the request.
#[derive(Default)]
struct Rules(Vec<String>);

impl Rules {
    fn required(&mut self, field: &str, value: &str, max_len: Option<usize>) {
        if value.trim().is_empty() {
            self.0.push(format!("{field} is required."));
        } else if let Some(max) = max_len.filter(|max| value.chars().count() > *max) {
            self.0.push(format!("{field} must be at most {max} characters."));
        }
    }

    fn positive(&mut self, field: &str, value: Amount) {
        if !value.is_positive() {
            self.0.push(format!("{field} must be greater than 0."));
        }
    }

    fn item(&mut self, idx: usize, item: &ItemLine) {
        self.required(
            &format!("items[{idx}].partneritemref"),
            &item.partner_item_ref,
            Some(MAX_ITEM_REF),
        );
        self.required(&format!("items[{idx}].name"), &item.name, Some(MAX_ITEM_NAME));
        if !(MIN_QTY..=MAX_QTY).contains(&item.quantity) {
            self.0.push(format!(
                "items[{idx}].qty must be between {MIN_QTY} and {MAX_QTY}."
            ));
        }
        self.positive(&format!("items[{idx}].unitprice"), item.unit_price);
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

/// Sum of `quantity * unit_price` over all lines, `None` on overflow.
pub fn items_total(items: &[ItemLine]) -> Option<Amount> {
    items
        .iter()
        .try_fold(Amount::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}

/// Check required fields, lengths and ranges. With `check_item_total`, a
/// non-empty item list must also add up to `total_amount`.
pub fn validate(
    request: &TransactionRequest,
    check_item_total: bool,
) -> Result<(), ValidationErrors> {
    let mut rules = Rules::default();

    rules.required("partnerkey", &request.partner_key, Some(MAX_PARTNER_FIELD));
    rules.required("partnerrefno", &request.partner_ref_no, Some(MAX_PARTNER_FIELD));
    rules.required(
        "partnerpassword",
        &request.partner_password,
        Some(MAX_PARTNER_FIELD),
    );
    rules.positive("totalamount", request.total_amount);
    rules.required("timestamp", &request.timestamp, None);
    rules.required("sig", &request.signature, None);

    if let Some(items) = request.items.as_deref() {
        for (idx, item) in items.iter().enumerate() {
            rules.item(idx, item);
        }
        if check_item_total
            && !items.is_empty()
            && items_total(items) != Some(request.total_amount)
        {
            rules.0.push("Invalid Total Amount.".to_string());
        }
    }

    rules.finish()
}
