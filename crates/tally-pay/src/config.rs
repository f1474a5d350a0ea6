//! # Payments Configuration
//!
//! Gateway endpoints and the URLs Paynow sends the customer and its
//! callbacks to. Integration credentials are per business and live in the
//! ledger, not here.
//!
//! ```toml
//! [paynow]
//! initiate_url = "https://www.paynow.co.zw/interface/initiatetransaction"
//! return_url = "https://shop.example.com/paid"
//! result_url = "https://shop.example.com/api/paynow/result"
//! request_timeout_secs = 30
//! ```
//!
//! Overrides: `TALLY_PAYNOW_INITIATE_URL`, `TALLY_PAYNOW_RETURN_URL`,
//! `TALLY_PAYNOW_RESULT_URL`.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaynowSettings {
    #[serde(default = "default_initiate_url")]
    pub initiate_url: String,

    /// Where the customer lands after paying.
    #[serde(default)]
    pub return_url: Option<String>,

    /// Where Paynow posts status callbacks.
    #[serde(default)]
    pub result_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_initiate_url() -> String {
    "https://www.paynow.co.zw/interface/initiatetransaction".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PaynowSettings {
    fn default() -> Self {
        PaynowSettings {
            initiate_url: default_initiate_url(),
            return_url: None,
            result_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub paynow: PaynowSettings,
}

impl PaymentsConfig {
    /// Defaults with `TALLY_PAYNOW_*` overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TALLY_PAYNOW_INITIATE_URL") {
            debug!(url = %url, "Overriding Paynow initiate URL from environment");
            self.paynow.initiate_url = url;
        }

        if let Some(url) = lookup("TALLY_PAYNOW_RETURN_URL") {
            self.paynow.return_url = Some(url);
        }

        if let Some(url) = lookup("TALLY_PAYNOW_RESULT_URL") {
            self.paynow.result_url = Some(url);
        }
    }
}
