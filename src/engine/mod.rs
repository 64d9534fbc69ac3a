//! Transaction intake pipeline.
//!
//! A request goes through field validation, partner authentication, timestamp
//! parsing and freshness, signature verification and finally the discount
//! computation. The first failing stage ends the run. Every run is independent:
//! the engine holds only read-only state and can serve concurrent calls.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{Span, debug, error, info, info_span};

use crate::Amount;
use crate::discount::DiscountPolicy;
use crate::mask::Masked;
use crate::model::{Settlement, SignatureContext, TransactionOutcome, TransactionRequest};
use crate::registry::PartnerRegistry;
use crate::signature;
use crate::timestamp::{self, FreshnessPolicy};
use crate::validate;

mod error;
pub use error::{IntakeError, Stage};

/// Shared, read-only partner lookup.
pub type SharedRegistry = Arc<dyn PartnerRegistry + Send + Sync>;

/// Tunables of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub freshness: FreshnessPolicy,
    pub discount: DiscountPolicy,
    /// Reject requests whose item lines do not add up to the total.
    pub check_item_total: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness: FreshnessPolicy::default(),
            discount: DiscountPolicy::default(),
            check_item_total: true,
        }
    }
}

/// A signature produced for partner tooling, with the timestamp in the exact
/// form it was signed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedStamp {
    pub timestamp: String,
    pub signature: String,
}

/// The transaction intake engine.
pub struct Engine {
    registry: SharedRegistry,
    config: EngineConfig,
    /// Parent of every event the engine emits.
    span: Span,
}

/// Public API
impl Engine {
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: SharedRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            span: info_span!("intake"),
        }
    }

    /// Replace the span the engine logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &(dyn PartnerRegistry + Send + Sync) {
        self.registry.as_ref()
    }

    /// Run the pipeline against the current UTC time.
    pub fn process(&self, request: &TransactionRequest) -> TransactionOutcome {
        self.process_at(request, Utc::now())
    }

    /// Run the pipeline with `now` as server time. Never panics: any fault
    /// inside the pipeline becomes an internal-error outcome.
    pub fn process_at(
        &self,
        request: &TransactionRequest,
        now: DateTime<Utc>,
    ) -> TransactionOutcome {
        let _guard = self.span.enter();
        debug!(
            partner_key = %request.partner_key,
            partner_ref_no = %request.partner_ref_no,
            partner_password = %Masked(&request.partner_password),
            amount = %request.total_amount,
            timestamp = %request.timestamp,
            "transaction received"
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(request, now)))
            .unwrap_or_else(|_| {
                error!(partner_ref_no = %request.partner_ref_no, "transaction pipeline panicked");
                Err(IntakeError::Internal)
            });

        Self::log_result(request, &result);

        match result {
            Ok(settlement) => TransactionOutcome::Success(settlement),
            Err(e) => TransactionOutcome::failure(e.to_string()),
        }
    }

    /// The pipeline proper, stopping at the first failing stage.
    pub fn evaluate(
        &self,
        request: &TransactionRequest,
        now: DateTime<Utc>,
    ) -> Result<Settlement, IntakeError> {
        validate::validate(request, self.config.check_item_total)?;

        self.authenticate(&request.partner_ref_no, &request.partner_password)?;

        let ts = timestamp::parse(&request.timestamp)?;
        self.config.freshness.check(&ts, &now)?;

        let signed_timestamp = timestamp::canonical(&ts);
        let ctx = SignatureContext {
            partner_key: &request.partner_key,
            partner_ref_no: &request.partner_ref_no,
            total_amount: request.total_amount,
            timestamp: &signed_timestamp,
        };
        if !signature::verify_for_partner(self.registry(), &ctx, &request.signature) {
            return Err(IntakeError::InvalidSignature);
        }

        let discount = self.config.discount.calculate(request.total_amount);
        Ok(Settlement {
            total_amount: request.total_amount,
            total_discount: discount.discount,
            final_amount: discount.final_amount,
            percent: discount.percent,
        })
    }

    /// Sign for a partner, the way a partner would sign its own request.
    /// The timestamp may be in any accepted form; it is signed canonically.
    pub fn generate_signature(
        &self,
        partner_key: &str,
        partner_ref_no: &str,
        total_amount: Amount,
        timestamp: &str,
    ) -> Result<SignedStamp, IntakeError> {
        let _guard = self.span.enter();

        let ts = timestamp::parse(timestamp)?;
        let signed_timestamp = timestamp::canonical(&ts);
        let ctx = SignatureContext {
            partner_key,
            partner_ref_no,
            total_amount,
            timestamp: &signed_timestamp,
        };

        if self.registry.lookup(partner_ref_no).is_none() {
            info!(partner_ref_no, "signature requested for unknown partner");
            return Err(IntakeError::Authentication);
        }
        let signature = signature::generate_for_partner(self.registry(), &ctx)
            .ok_or(IntakeError::InvalidSignature)?;

        debug!(partner_ref_no, timestamp = %signed_timestamp, "signature generated");
        Ok(SignedStamp {
            timestamp: signed_timestamp,
            signature,
        })
    }
}

/// Private API
impl Engine {
    fn authenticate(&self, partner_ref_no: &str, encoded_password: &str) -> Result<(), IntakeError> {
        if signature::validate_partner(self.registry(), partner_ref_no, encoded_password) {
            Ok(())
        } else {
            Err(IntakeError::Authentication)
        }
    }

    /// Small helper to log `evaluate` results
    fn log_result(request: &TransactionRequest, result: &Result<Settlement, IntakeError>) {
        match result {
            Ok(settlement) => {
                info!(
                    partner_ref_no = %request.partner_ref_no,
                    amount = %settlement.total_amount,
                    discount = %settlement.total_discount,
                    percent = %settlement.percent,
                    final_amount = %settlement.final_amount,
                    "transaction accepted"
                );
            }
            Err(IntakeError::Internal) => {
                error!(
                    partner_ref_no = %request.partner_ref_no,
                    "transaction failed with internal error"
                );
            }
            Err(e) => {
                info!(
                    partner_ref_no = %request.partner_ref_no,
                    amount = %request.total_amount,
                    stage = ?e.stage(),
                    reason = %e,
                    "transaction rejected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemLine;
    use crate::registry::StaticRegistry;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use chrono::TimeZone;

    // test utils

    const PARTNER_KEY: &str = "FAKEGOOGLE";
    const REF_NO: &str = "FG-00001";
    const SECRET: &str = "FAKEPASSWORD1234";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, 2, 11, 22).unwrap()
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(StaticRegistry::builtin()))
    }

    fn sign(amount: i64, timestamp: &str) -> String {
        let canonical = timestamp::canonical(&timestamp::parse(timestamp).unwrap());
        let ctx = SignatureContext {
            partner_key: PARTNER_KEY,
            partner_ref_no: REF_NO,
            total_amount: Amount::from_minor(amount),
            timestamp: &canonical,
        };
        signature::generate(&ctx, SECRET).unwrap()
    }

    fn request(amount: i64) -> TransactionRequest {
        let timestamp = "2024-08-15T02:11:22.0000000Z";
        TransactionRequest {
            partner_key: PARTNER_KEY.into(),
            partner_ref_no: REF_NO.into(),
            partner_password: STANDARD.encode(SECRET),
            total_amount: Amount::from_minor(amount),
            items: None,
            timestamp: timestamp.into(),
            signature: sign(amount, timestamp),
        }
    }

    fn settlement(outcome: &TransactionOutcome) -> (i64, i64, i64) {
        let s = outcome.settlement().expect("expected success");
        (
            s.total_amount.minor(),
            s.total_discount.minor(),
            s.final_amount.minor(),
        )
    }

    // Success

    #[test]
    fn valid_request_succeeds_with_discount() {
        let outcome = engine().process_at(&request(100_000), now());
        assert!(outcome.is_success());
        assert_eq!(settlement(&outcome), (100_000, 10_000, 90_000));
        assert_eq!(outcome.message(), None);
    }

    #[test]
    fn small_amount_has_no_discount() {
        let outcome = engine().process_at(&request(1_000), now());
        assert_eq!(settlement(&outcome), (1_000, 0, 1_000));
    }

    #[test]
    fn prime_bonus_flows_through() {
        let outcome = engine().process_at(&request(99_700), now());
        assert_eq!(settlement(&outcome), (99_700, 17_946, 81_754));
    }

    #[test]
    fn items_matching_total_succeed() {
        let mut req = request(1_000);
        req.items = Some(vec![ItemLine {
            partner_item_ref: "i-00001".into(),
            name: "Pen".into(),
            quantity: 4,
            unit_price: Amount::from_minor(250),
        }]);
        assert!(engine().process_at(&req, now()).is_success());
    }

    #[test]
    fn timestamp_in_other_form_verifies_against_canonical() {
        // same instant, signed canonically, submitted with an offset
        let mut req = request(30_000);
        req.timestamp = "2024-08-15T10:11:22+08:00".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(settlement(&outcome), (30_000, 1_500, 28_500));
    }

    #[test]
    fn identical_input_gives_identical_outcome() {
        let engine = engine();
        let req = request(60_000);
        let first = engine.process_at(&req, now());
        let second = engine.process_at(&req, now());
        assert_eq!(first, second);
    }

    // Validation

    #[test]
    fn validation_failure_reports_joined_messages() {
        let mut req = request(1_000);
        req.partner_key = String::new();
        req.signature = String::new();

        let outcome = engine().process_at(&req, now());
        assert_eq!(
            outcome.message(),
            Some("partnerkey is required.; sig is required.")
        );
    }

    #[test]
    fn validation_runs_before_authentication() {
        let mut req = request(1_000);
        req.partner_password = "wrong".into();
        req.total_amount = Amount::ZERO;

        let err = engine().evaluate(&req, now()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Validation));
    }

    // Authentication

    #[test]
    fn unknown_partner_is_denied() {
        let mut req = request(1_000);
        req.partner_ref_no = "FG-99999".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Access Denied!"));
    }

    #[test]
    fn wrong_password_is_denied() {
        let mut req = request(1_000);
        req.partner_password = STANDARD.encode("WRONGPASSWORD");
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Access Denied!"));
    }

    #[test]
    fn non_base64_password_is_denied() {
        let mut req = request(1_000);
        req.partner_password = "not_base64".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Access Denied!"));
    }

    // Timestamp

    #[test]
    fn unparseable_timestamp_is_rejected() {
        let mut req = request(1_000);
        req.timestamp = "not-a-date".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Invalid timestamp format"));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let later = now() + chrono::TimeDelta::minutes(6);
        let outcome = engine().process_at(&request(1_000), later);
        assert_eq!(outcome.message(), Some("Expired."));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let earlier = now() - chrono::TimeDelta::minutes(6);
        let outcome = engine().process_at(&request(1_000), earlier);
        assert_eq!(outcome.message(), Some("Expired."));
    }

    #[test]
    fn disabled_freshness_accepts_old_timestamp() {
        let config = EngineConfig {
            freshness: FreshnessPolicy::disabled(),
            ..EngineConfig::default()
        };
        let engine = Engine::with_config(Arc::new(StaticRegistry::builtin()), config);
        let much_later = now() + chrono::TimeDelta::days(30);
        assert!(engine.process_at(&request(1_000), much_later).is_success());
    }

    // Signature

    #[test]
    fn tampered_amount_fails_signature() {
        let mut req = request(1_000);
        req.total_amount = Amount::from_minor(1_001);
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Invalid signature"));
    }

    #[test]
    fn tampered_partner_key_fails_signature() {
        let mut req = request(1_000);
        req.partner_key = "FAKEGOOGLF".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Invalid signature"));
    }

    #[test]
    fn garbage_signature_fails() {
        let mut req = request(1_000);
        req.signature = "invalidsig".into();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Invalid signature"));
    }

    #[test]
    fn signature_over_raw_timestamp_text_fails() {
        // signing the submitted text instead of the canonical form is rejected
        let mut req = request(1_000);
        req.timestamp = "2024-08-15T02:11:22Z".into();
        let ctx = SignatureContext {
            partner_key: PARTNER_KEY,
            partner_ref_no: REF_NO,
            total_amount: Amount::from_minor(1_000),
            timestamp: "2024-08-15T02:11:22Z",
        };
        req.signature = signature::generate(&ctx, SECRET).unwrap();
        let outcome = engine().process_at(&req, now());
        assert_eq!(outcome.message(), Some("Invalid signature"));
    }

    // Signature generation

    #[test]
    fn generated_signature_is_accepted() {
        let engine = engine();
        let stamp = engine
            .generate_signature(PARTNER_KEY, REF_NO, Amount::from_minor(60_000), "20240815021122")
            .unwrap();
        assert_eq!(stamp.timestamp, "2024-08-15T02:11:22.0000000Z");

        let mut req = request(60_000);
        req.timestamp = stamp.timestamp;
        req.signature = stamp.signature;
        assert_eq!(settlement(&engine.process_at(&req, now())), (60_000, 4_200, 55_800));
    }

    #[test]
    fn generate_for_unknown_partner_is_denied() {
        let err = engine()
            .generate_signature(PARTNER_KEY, "FG-99999", Amount::from_minor(1), "20240815021122")
            .unwrap_err();
        assert_eq!(err, IntakeError::Authentication);
    }

    #[test]
    fn generate_with_bad_timestamp_fails() {
        let err = engine()
            .generate_signature(PARTNER_KEY, REF_NO, Amount::from_minor(1), "yesterday")
            .unwrap_err();
        assert_eq!(err, IntakeError::InvalidTimestamp);
    }

    #[test]
    fn generate_with_empty_partner_key_fails() {
        let err = engine()
            .generate_signature("", REF_NO, Amount::from_minor(1), "20240815021122")
            .unwrap_err();
        assert_eq!(err, IntakeError::InvalidSignature);
    }

    // Faults

    struct PanickingRegistry;

    impl PartnerRegistry for PanickingRegistry {
        fn lookup(&self, _reference_no: &str) -> Option<&crate::model::PartnerRecord> {
            panic!("registry backend unavailable");
        }
    }

    #[test]
    fn panic_inside_pipeline_becomes_internal_error() {
        let engine = Engine::new(Arc::new(PanickingRegistry));
        let outcome = engine.process_at(&request(1_000), now());
        assert_eq!(outcome.message(), Some("Internal server error"));
    }

    #[test]
    fn injected_span_does_not_change_outcome() {
        let engine = engine().with_span(tracing::info_span!("partner_gateway", node = 7));
        let outcome = engine.process_at(&request(60_000), now());
        assert_eq!(settlement(&outcome), (60_000, 4_200, 55_800));
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.process_at(&request(30_000 + i), now()).is_success()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
