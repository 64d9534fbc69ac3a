//! Partner credentials and request signatures.
//!
//! A signature is `base64(hex(sha256(canonical)))` where the canonical string is
//! the plain concatenation, without separators, of
//!
//! ```text
//! timestamp + partner_key + partner_ref_no + total_amount + base64(secret)
//! ```
//!
//! `total_amount` is the decimal string of the minor-unit integer. The hex digest
//! is lowercase, and it is its UTF-8 text (64 bytes), not the raw digest, that
//! gets Base64 encoded.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::model::{PartnerRecord, SignatureContext};
use crate::registry::PartnerRegistry;

/// Build the string that gets hashed. Returns `None` if any component is empty.
pub fn canonical_string(ctx: &SignatureContext<'_>, secret: &str) -> Option<String> {
    if ctx.timestamp.is_empty()
        || ctx.partner_key.is_empty()
        || ctx.partner_ref_no.is_empty()
        || secret.is_empty()
    {
        return None;
    }

    let encoded_secret = STANDARD.encode(secret.as_bytes());
    Some(format!(
        "{}{}{}{}{}",
        ctx.timestamp,
        ctx.partner_key,
        ctx.partner_ref_no,
        ctx.total_amount.minor(),
        encoded_secret
    ))
}

/// Compute the signature for `ctx` with the partner's plaintext `secret`.
pub fn generate(ctx: &SignatureContext<'_>, secret: &str) -> Option<String> {
    let canonical = canonical_string(ctx, secret)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let hex_digest = hex::encode(digest);
    Some(STANDARD.encode(hex_digest.as_bytes()))
}

/// Check `candidate` against the signature of `ctx`. Malformed input is `false`.
pub fn verify(ctx: &SignatureContext<'_>, candidate: &str, secret: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    match generate(ctx, secret) {
        Some(expected) => constant_time_eq(&expected, candidate),
        None => false,
    }
}

/// [`generate`] with the secret of the partner named by `ctx.partner_ref_no`.
/// Unknown partners yield `None`.
pub fn generate_for_partner<R: PartnerRegistry + ?Sized>(
    registry: &R,
    ctx: &SignatureContext<'_>,
) -> Option<String> {
    let partner = registry.lookup(ctx.partner_ref_no)?;
    generate(ctx, &partner.shared_secret)
}

/// [`verify`] with the secret of the partner named by `ctx.partner_ref_no`.
/// Unknown partners yield `false`.
pub fn verify_for_partner<R: PartnerRegistry + ?Sized>(
    registry: &R,
    ctx: &SignatureContext<'_>,
    candidate: &str,
) -> bool {
    registry
        .lookup(ctx.partner_ref_no)
        .is_some_and(|partner| verify(ctx, candidate, &partner.shared_secret))
}

/// Check a Base64-encoded password against the partner's stored secret.
/// Invalid Base64 or non UTF-8 content is a mismatch.
pub fn password_matches(partner: &PartnerRecord, encoded_password: &str) -> bool {
    let Ok(decoded) = STANDARD.decode(encoded_password.as_bytes()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    constant_time_eq(&decoded, &partner.shared_secret)
}

/// Look the partner up and check its password.
pub fn validate_partner<R: PartnerRegistry + ?Sized>(
    registry: &R,
    reference_no: &str,
    encoded_password: &str,
) -> bool {
    registry
        .lookup(reference_no)
        .is_some_and(|partner| password_matches(partner, encoded_password))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    // slices of unequal length compare unequal
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
