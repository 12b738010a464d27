//! Payment gateway notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{ReconcileError, ReconcileResult};

/// What a gateway notification says about a payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Pending,
    Failure,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Failure => "failure",
        }
    }

    /// Parse `success`, `pending` or `failure` (case-insensitive).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "pending" => Some(Self::Pending),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the gateway's HTTP notification.
///
/// Only the fields needed to classify and authenticate the payment are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
}

impl GatewayNotification {
    pub fn from_json(body: &[u8]) -> ReconcileResult<Self> {
        let notification: Self = serde_json::from_slice(body)?;
        if notification.order_id.trim().is_empty() {
            return Err(ReconcileError::Malformed("order_id is empty".into()));
        }
        Ok(notification)
    }

    /// Classify the transaction.
    ///
    /// `capture` counts as paid unless the fraud check is still deciding
    /// (`challenge`) or refused it.
    pub fn outcome(&self) -> PaymentOutcome {
        let fraud = self.fraud_status.as_deref().map(|s| s.trim().to_ascii_lowercase());
        match self.transaction_status.trim().to_ascii_lowercase().as_str() {
            "settlement" => PaymentOutcome::Success,
            "capture" => match fraud.as_deref() {
                None | Some("") | Some("accept") => PaymentOutcome::Success,
                Some("challenge") => PaymentOutcome::Pending,
                Some(_) => PaymentOutcome::Failure,
            },
            "pending" => PaymentOutcome::Pending,
            _ => PaymentOutcome::Failure,
        }
    }

    /// Expected `signature_key` for this notification under `server_key`.
    pub fn expected_signature(&self, server_key: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.order_id.as_bytes());
        hasher.update(self.status_code.as_bytes());
        hasher.update(self.gross_amount.as_bytes());
        hasher.update(server_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, server_key: &str) -> ReconcileResult<()> {
        if self
            .signature_key
            .trim()
            .eq_ignore_ascii_case(&self.expected_signature(server_key))
        {
            Ok(())
        } else {
            Err(ReconcileError::InvalidSignature(self.order_id.clone()))
        }
    }
}

/// Strip the `-R1234` suffix added when a buyer retries a payment, which
/// the gateway requires to be a fresh transaction id.
pub fn strip_retry_suffix(external_id: &str) -> &str {
    let id = external_id.trim();
    match id.rsplit_once("-R") {
        Some((base, digits))
            if !base.is_empty()
                && (1..=4).contains(&digits.len())
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn notification(status: &str, fraud: Option<&str>) -> GatewayNotification {
        GatewayNotification {
            order_id: "AB12CD34".into(),
            transaction_status: status.into(),
            fraud_status: fraud.map(String::from),
            status_code: "200".into(),
            gross_amount: "150000.00".into(),
            signature_key: String::new(),
        }
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(notification("settlement", None).outcome(), PaymentOutcome::Success);
        assert_eq!(notification("capture", Some("accept")).outcome(), PaymentOutcome::Success);
        assert_eq!(notification("capture", None).outcome(), PaymentOutcome::Success);
        assert_eq!(notification("capture", Some("challenge")).outcome(), PaymentOutcome::Pending);
        assert_eq!(notification("capture", Some("deny")).outcome(), PaymentOutcome::Failure);
        assert_eq!(notification("pending", None).outcome(), PaymentOutcome::Pending);
        assert_eq!(notification("expire", None).outcome(), PaymentOutcome::Failure);
        assert_eq!(notification("cancel", None).outcome(), PaymentOutcome::Failure);
        assert_eq!(notification("deny", None).outcome(), PaymentOutcome::Failure);
    }

    #[test]
    fn signature_roundtrip() {
        let mut n = notification("settlement", None);
        n.signature_key = n.expected_signature("server-key");
        assert_eq!(n.signature_key.len(), 128);
        assert!(n.verify("server-key").is_ok());
        assert!(matches!(
            n.verify("other-key"),
            Err(ReconcileError::InvalidSignature(id)) if id == "AB12CD34"
        ));
    }

    #[test]
    fn decodes_gateway_body() {
        let body = br#"{
            "order_id": "AB12CD34-R0412",
            "transaction_status": "capture",
            "fraud_status": "accept",
            "status_code": "200",
            "gross_amount": "150000.00",
            "signature_key": "abc",
            "payment_type": "bank_transfer"
        }"#;
        let n = GatewayNotification::from_json(body).unwrap();
        assert_eq!(n.outcome(), PaymentOutcome::Success);
        assert_eq!(strip_retry_suffix(&n.order_id), "AB12CD34");

        assert!(matches!(
            GatewayNotification::from_json(br#"{"order_id": "", "transaction_status": "x"}"#),
            Err(ReconcileError::Malformed(_))
        ));
        assert!(matches!(
            GatewayNotification::from_json(b"not json"),
            Err(ReconcileError::Malformed(_))
        ));
    }

    #[test]
    fn retry_suffix() {
        assert_eq!(strip_retry_suffix("AB12CD34-R0412"), "AB12CD34");
        assert_eq!(strip_retry_suffix("AB12CD34-R7"), "AB12CD34");
        assert_eq!(strip_retry_suffix(" AB12CD34 "), "AB12CD34");
        assert_eq!(strip_retry_suffix("AB12CD34-R12345"), "AB12CD34-R12345");
        assert_eq!(strip_retry_suffix("AB12CD34-RX"), "AB12CD34-RX");
        assert_eq!(strip_retry_suffix("-R12"), "-R12");
    }

    proptest! {
        #[test]
        fn stripping_restores_the_base_id(base in "[A-Z0-9]{8}", n in 0u32..10_000) {
            let retried = format!("{base}-R{n:04}");
            prop_assert_eq!(strip_retry_suffix(&retried), base.as_str());
            prop_assert_eq!(strip_retry_suffix(&base), base.as_str());
        }

        #[test]
        fn checkout_retry_ids_strip_back(base in "[A-Z0-9]{8}", secs in 0i64..4_000_000_000) {
            let retried = kemah_ledger::retry_id(&base, secs);
            prop_assert_eq!(strip_retry_suffix(&retried), base.as_str());
        }
    }
}
