//! # Paynow Message Formats
//!
//! Pure encoding and decoding of Paynow's form messages; no I/O here.
//!
//! ## Initiate
//! ```text
//! → id=<integration id>&reference=<ref>&amount=10.00
//!   &returnurl=...&resulturl=...&status=Message&hash=<hash>
//!
//! ← status=Ok&browserurl=...&pollurl=...&hash=<hash>
//! ← status=Error&error=Invalid+amount
//! ```
//!
//! ## Status (result URL callback or poll URL)
//! ```text
//! reference=<ref>&paynowreference=<id>&amount=10.00&status=Paid
//!   &pollurl=...&hash=<hash>
//! ```

use tally_core::{Money, PaymentStatus};

use crate::error::{PaymentError, PaymentResult};
use crate::form::{self, Fields};
use crate::hash;

/// The fixed `status` value of an initiate request.
const INITIATE_STATUS: &str = "Message";

/// Everything an initiate request carries apart from the hash.
#[derive(Debug, Clone)]
pub struct InitiateRequest<'a> {
    pub integration_id: &'a str,
    pub reference: &'a str,
    pub amount_cents: i64,
    pub return_url: &'a str,
    pub result_url: &'a str,
}

impl InitiateRequest<'_> {
    /// Ordered fields with the hash appended.
    pub fn to_fields(&self, integration_key: &str) -> Fields {
        let mut fields: Fields = vec![
            ("id".to_string(), self.integration_id.to_string()),
            ("reference".to_string(), self.reference.to_string()),
            (
                "amount".to_string(),
                Money::from_cents(self.amount_cents).to_decimal_string(),
            ),
            ("returnurl".to_string(), self.return_url.to_string()),
            ("resulturl".to_string(), self.result_url.to_string()),
            ("status".to_string(), INITIATE_STATUS.to_string()),
        ];
        let hash = hash::compute_fields(&fields, integration_key);
        fields.push(("hash".to_string(), hash));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub browser_url: String,
    pub poll_url: String,
}

/// Decodes the answer to an initiate request.
///
/// A hash, when present, must verify.
pub fn parse_initiate_response(body: &str, integration_key: &str) -> PaymentResult<InitiateResponse> {
    let fields = form::parse(body);
    let status = form::get(&fields, "status")
        .ok_or_else(|| PaymentError::MalformedResponse("missing status".into()))?;

    if status.eq_ignore_ascii_case("error") {
        let message = form::get(&fields, "error").unwrap_or("unknown error");
        return Err(PaymentError::GatewayRejected(message.to_string()));
    }
    if !status.eq_ignore_ascii_case("ok") {
        return Err(PaymentError::MalformedResponse(format!(
            "unexpected status '{status}'"
        )));
    }

    if form::get(&fields, "hash").is_some() && !hash::verify(&fields, integration_key) {
        return Err(PaymentError::InvalidHash);
    }

    let browser_url = form::get(&fields, "browserurl")
        .ok_or_else(|| PaymentError::MalformedResponse("missing browserurl".into()))?;
    let poll_url = form::get(&fields, "pollurl")
        .ok_or_else(|| PaymentError::MalformedResponse("missing pollurl".into()))?;

    Ok(InitiateResponse {
        browser_url: browser_url.to_string(),
        poll_url: poll_url.to_string(),
    })
}

/// A status message from a callback or a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub reference: String,
    /// Paynow's own id for the payment.
    pub paynow_reference: Option<String>,
    pub status: PaymentStatus,
    /// Status text as sent by Paynow.
    pub raw_status: String,
}

/// Reads reference and status from already-parsed fields. The hash is not
/// checked here.
pub fn parse_status(fields: &[(String, String)]) -> PaymentResult<StatusUpdate> {
    let reference = form::get(fields, "reference")
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PaymentError::MalformedResponse("missing reference".into()))?;
    let raw_status = form::get(fields, "status")
        .ok_or_else(|| PaymentError::MalformedResponse("missing status".into()))?;

    Ok(StatusUpdate {
        reference: reference.to_string(),
        paynow_reference: form::get(fields, "paynowreference")
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        status: map_status(raw_status),
        raw_status: raw_status.to_string(),
    })
}

/// Maps Paynow's status text onto the local payment status.
pub fn map_status(status: &str) -> PaymentStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "paid" | "awaiting delivery" | "delivered" => PaymentStatus::Completed,
        "cancelled" | "failed" | "disputed" | "refunded" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "3e9fed89-60e1-4ce5-ab6e-6b1eb2d4f977";

    #[test]
    fn test_initiate_fields() {
        let request = InitiateRequest {
            integration_id: "1201",
            reference: "INV-001",
            amount_cents: 1000,
            return_url: "https://shop.example.com/return",
            result_url: "https://shop.example.com/result",
        };
        let fields = request.to_fields(KEY);

        let names: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            ["id", "reference", "amount", "returnurl", "resulturl", "status", "hash"]
        );
        assert_eq!(fields[2].1, "10.00");
        assert_eq!(fields[5].1, "Message");
        assert_eq!(
            fields[6].1,
            "DA94ACDFE013CE28F84EFDC657B7FD94C4C2E1E02BF80C9F42B674D9F97CA9D301B1BB24FB12076A2701B0A972601933E9E22DE0A54A8C019AD63D0D622DE04A"
        );
    }

    #[test]
    fn test_initiate_ok_response() {
        let mut fields: Fields = vec![
            ("status".into(), "Ok".into()),
            ("browserurl".into(), "https://www.paynow.co.zw/Payment/ConfirmPayment/9510".into()),
            ("pollurl".into(), "https://www.paynow.co.zw/Interface/CheckPayment/?guid=abc".into()),
        ];
        let hash = hash::compute_fields(&fields, KEY);
        fields.push(("hash".into(), hash));

        let parsed = parse_initiate_response(&form::encode(&fields), KEY).unwrap();
        assert!(parsed.poll_url.ends_with("guid=abc"));

        // Same body, wrong key
        assert!(matches!(
            parse_initiate_response(&form::encode(&fields), "wrong"),
            Err(PaymentError::InvalidHash)
        ));
    }

    #[test]
    fn test_initiate_error_response() {
        let err = parse_initiate_response("status=Error&error=Invalid+amount+field", KEY).unwrap_err();
        match err {
            PaymentError::GatewayRejected(message) => assert_eq!(message, "Invalid amount field"),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            parse_initiate_response("status=ok", KEY),
            Err(PaymentError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_initiate_response("", KEY),
            Err(PaymentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("Paid"), PaymentStatus::Completed);
        assert_eq!(map_status("Awaiting Delivery"), PaymentStatus::Completed);
        assert_eq!(map_status("delivered"), PaymentStatus::Completed);
        assert_eq!(map_status("Cancelled"), PaymentStatus::Failed);
        assert_eq!(map_status("Disputed"), PaymentStatus::Failed);
        assert_eq!(map_status("Refunded"), PaymentStatus::Failed);
        assert_eq!(map_status("Sent"), PaymentStatus::Pending);
        assert_eq!(map_status("Created"), PaymentStatus::Pending);
    }

    #[test]
    fn test_parse_status_fields() {
        let fields = form::parse("reference=R1&paynowreference=88731&amount=10.00&status=Paid&hash=X");
        let update = parse_status(&fields).unwrap();
        assert_eq!(update.reference, "R1");
        assert_eq!(update.paynow_reference.as_deref(), Some("88731"));
        assert_eq!(update.status, PaymentStatus::Completed);

        let missing = form::parse("status=Paid");
        assert!(parse_status(&missing).is_err());
    }
}
