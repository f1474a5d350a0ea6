//! # tally-pay: Payment Gateway Adapter for Tally POS
//!
//! Starts mobile-money payments through Paynow and keeps the local
//! `pending_payments` table current from verified status messages.
//!
//! Every message from Paynow is signed with an uppercase SHA-512 hex hash
//! over its field values followed by the business's integration key. A
//! message whose hash does not verify never touches the ledger.
//!
//! ## Modules
//!
//! - [`gateway`] - [`PaymentGateway`]: create, webhook, poll
//! - [`paynow`] - Paynow message encoding and status mapping
//! - [`hash`] - Message hashing and constant-time verification
//! - [`form`] - Ordered form-urlencoded fields
//! - [`http`] - The [`GatewayHttp`] seam and its reqwest implementation
//! - [`config`] - Endpoint and callback URL settings
//! - [`error`] - Payment error types

pub mod config;
pub mod error;
pub mod form;
pub mod gateway;
pub mod hash;
pub mod http;
pub mod paynow;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PaymentsConfig, PaynowSettings};
pub use error::{PaymentError, PaymentResult};
pub use gateway::{CreatePayment, PaymentGateway};
pub use http::{GatewayHttp, ReqwestGatewayHttp};
pub use paynow::{map_status, StatusUpdate};
