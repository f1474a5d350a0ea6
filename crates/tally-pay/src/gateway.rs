//! # Payment Gateway
//!
//! Starts gateway payments and applies their status messages to the local
//! `pending_payments` table.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Paynow Payment Lifecycle                            │
//! │                                                                         │
//! │  create_payment ──► POST initiate ──► status=Ok ──► PENDING row        │
//! │                                  └──► status=Error ──► GatewayRejected │
//! │                                                                         │
//! │  handle_webhook(body) ─┐                                               │
//! │  poll_payment(ref) ────┴─► find by reference ─► verify hash            │
//! │                                 │                    │                  │
//! │                          UnknownReference      InvalidHash              │
//! │                                                      │ ok               │
//! │                                                      ▼                  │
//! │                     Paid/Awaiting Delivery/Delivered → COMPLETED       │
//! │                     Cancelled/Failed/Disputed/Refunded → FAILED        │
//! │                     anything else → PENDING                            │
//! │                                                                         │
//! │  COMPLETED and FAILED never change again.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tally_core::validation::{validate_positive_amount, validate_reference};
use tally_core::{Gateway, PendingPayment};
use tally_db::{Database, DbError, GatewayCredentials, NewPendingPayment};
use tracing::{info, warn};

use crate::config::PaymentsConfig;
use crate::error::{PaymentError, PaymentResult};
use crate::form;
use crate::hash;
use crate::http::{GatewayHttp, ReqwestGatewayHttp};
use crate::paynow::{self, InitiateRequest, StatusUpdate};

/// Input to [`PaymentGateway::create_payment`].
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub business_id: String,
    pub gateway: Gateway,
    pub amount_cents: i64,
    /// Client idempotency key; echoed back in every status message.
    pub reference: String,
    /// Overrides the configured return URL.
    pub return_url: Option<String>,
    /// Overrides the configured result URL.
    pub result_url: Option<String>,
    pub transaction_id: Option<String>,
}

pub struct PaymentGateway {
    db: Database,
    config: PaymentsConfig,
    http: Arc<dyn GatewayHttp>,
}

impl PaymentGateway {
    pub fn new(db: Database, config: PaymentsConfig, http: Arc<dyn GatewayHttp>) -> Self {
        PaymentGateway { db, config, http }
    }

    /// Gateway talking to the real endpoints over HTTPS.
    pub fn with_reqwest(db: Database, config: PaymentsConfig) -> PaymentResult<Self> {
        let http = ReqwestGatewayHttp::new(config.paynow.request_timeout_secs)?;
        Ok(Self::new(db, config, Arc::new(http)))
    }

    /// Starts a payment and stores it as PENDING.
    pub async fn create_payment(&self, request: CreatePayment) -> PaymentResult<PendingPayment> {
        validate_reference(&request.reference)?;
        validate_positive_amount("amount", request.amount_cents)?;

        match request.gateway {
            Gateway::Paynow => self.create_paynow(request).await,
            Gateway::Pesepay => Err(PaymentError::GatewayUnavailable(Gateway::Pesepay)),
        }
    }

    async fn create_paynow(&self, request: CreatePayment) -> PaymentResult<PendingPayment> {
        let credentials = self.credentials(&request.business_id).await?;

        let return_url = request
            .return_url
            .clone()
            .or_else(|| self.config.paynow.return_url.clone())
            .ok_or_else(|| PaymentError::NotConfigured("Paynow return URL".into()))?;
        let result_url = request
            .result_url
            .clone()
            .or_else(|| self.config.paynow.result_url.clone())
            .ok_or_else(|| PaymentError::NotConfigured("Paynow result URL".into()))?;

        // Never initiate twice for one reference
        if self
            .db
            .payments()
            .get_by_reference(&request.reference)
            .await?
            .is_some()
        {
            return Err(DbError::duplicate("reference", &request.reference).into());
        }

        let fields = InitiateRequest {
            integration_id: &credentials.integration_id,
            reference: &request.reference,
            amount_cents: request.amount_cents,
            return_url: &return_url,
            result_url: &result_url,
        }
        .to_fields(&credentials.integration_key);

        info!(
            reference = %request.reference,
            amount = request.amount_cents,
            "Initiating Paynow payment"
        );
        let body = self
            .http
            .post_form(&self.config.paynow.initiate_url, form::encode(&fields))
            .await?;

        let response = match paynow::parse_initiate_response(&body, &credentials.integration_key) {
            Ok(response) => response,
            Err(e) => {
                warn!(reference = %request.reference, error = %e, "Paynow initiate failed");
                return Err(e);
            }
        };

        let payment = self
            .db
            .payments()
            .insert(NewPendingPayment {
                business_id: request.business_id,
                gateway: Gateway::Paynow,
                reference: request.reference,
                amount_cents: request.amount_cents,
                poll_url: Some(response.poll_url),
                browser_url: Some(response.browser_url),
                transaction_id: request.transaction_id,
            })
            .await?;

        Ok(payment)
    }

    /// Applies a status callback posted to the result URL.
    ///
    /// Nothing is written unless the reference is known and the hash
    /// verifies against that business's integration key.
    pub async fn handle_webhook(&self, body: &str) -> PaymentResult<PendingPayment> {
        let fields = form::parse(body);
        let update = paynow::parse_status(&fields)?;
        let payment = self.find(&update.reference).await?;

        self.apply_verified(&payment, &fields, update).await
    }

    /// Asks the gateway for the current status of a payment.
    ///
    /// Settled payments are returned as they are without a request.
    pub async fn poll_payment(&self, reference: &str) -> PaymentResult<PendingPayment> {
        let payment = self.find(reference).await?;
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let poll_url = payment
            .poll_url
            .clone()
            .ok_or_else(|| PaymentError::NotConfigured(format!("no poll URL for {reference}")))?;

        let body = self.http.get(&poll_url).await?;
        let fields = form::parse(&body);
        let update = paynow::parse_status(&fields)?;
        if update.reference != payment.reference {
            return Err(PaymentError::MalformedResponse(format!(
                "poll for {} answered for {}",
                payment.reference, update.reference
            )));
        }

        self.apply_verified(&payment, &fields, update).await
    }

    async fn find(&self, reference: &str) -> PaymentResult<PendingPayment> {
        match self.db.payments().get_by_reference(reference).await? {
            Some(payment) => Ok(payment),
            None => {
                warn!(reference = %reference, "Status message for unknown payment reference");
                Err(PaymentError::UnknownReference(reference.to_string()))
            }
        }
    }

    async fn credentials(&self, business_id: &str) -> PaymentResult<GatewayCredentials> {
        self.db
            .businesses()
            .gateway_credentials(business_id)
            .await?
            .ok_or_else(|| {
                PaymentError::NotConfigured(format!("no Paynow credentials for business {business_id}"))
            })
    }

    async fn apply_verified(
        &self,
        payment: &PendingPayment,
        fields: &[(String, String)],
        update: StatusUpdate,
    ) -> PaymentResult<PendingPayment> {
        if payment.gateway != Gateway::Paynow {
            return Err(PaymentError::GatewayUnavailable(payment.gateway));
        }

        let credentials = self.credentials(&payment.business_id).await?;
        if !hash::verify(fields, &credentials.integration_key) {
            warn!(reference = %payment.reference, "Rejected Paynow message with bad hash");
            return Err(PaymentError::InvalidHash);
        }

        let updated = self
            .db
            .payments()
            .update_status(
                &payment.reference,
                update.status,
                update.paynow_reference.as_deref(),
            )
            .await?;

        info!(
            reference = %updated.reference,
            paynow_status = %update.raw_status,
            status = ?updated.status,
            "Paynow status applied"
        );
        Ok(updated)
    }
}
