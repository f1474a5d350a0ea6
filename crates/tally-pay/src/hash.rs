//! # Paynow Message Hash
//!
//! ```text
//! hash = UPPER( hex( SHA-512( value₁ ‖ value₂ ‖ … ‖ valueₙ ‖ integration_key ) ) )
//! ```
//!
//! Values are concatenated in field order with no separator. The `hash`
//! field itself is never part of the input.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::form;

/// Hash of `values` in order, salted with the integration key.
pub fn compute<'a>(values: impl IntoIterator<Item = &'a str>, integration_key: &str) -> String {
    let mut hasher = Sha512::new();
    for value in values {
        hasher.update(value.as_bytes());
    }
    hasher.update(integration_key.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Hash over every field except `hash`.
pub fn compute_fields(fields: &[(String, String)], integration_key: &str) -> String {
    compute(
        fields
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("hash"))
            .map(|(_, v)| v.as_str()),
        integration_key,
    )
}

/// Checks the `hash` field against the other fields.
///
/// Case-insensitive and constant-time. A message without a hash never
/// verifies.
pub fn verify(fields: &[(String, String)], integration_key: &str) -> bool {
    let Some(supplied) = form::get(fields, "hash") else {
        return false;
    };
    let expected = compute_fields(fields, integration_key);
    let supplied = supplied.trim().to_ascii_uppercase();

    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
