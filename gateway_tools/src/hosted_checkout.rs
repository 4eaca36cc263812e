use log::*;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vendor_payment_engine::{
    db_types::{GatewayKind, OrderId},
    traits::{CallbackEvent, CallbackStatus, SessionRequest},
    CallbackPayload,
    CheckoutSession,
    GatewayError,
    GatewayStatus,
    PaymentGateway,
};
use vpg_common::CURRENCY_CODE;

use crate::{
    config::HostedCheckoutConfig,
    helpers::{hmac_sha256, parse_amount, secure_eq},
    http::{GatewayHttpClient, RequestBody},
};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Tokenized checkout: the server creates an order at the provider and hands the returned session id to the client,
/// which completes payment in the provider's hosted SDK.
#[derive(Debug, Clone)]
pub struct HostedCheckoutGateway {
    config: HostedCheckoutConfig,
    http: GatewayHttpClient,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    order_status: String,
    #[serde(default)]
    cf_order_id: Option<serde_json::Value>,
    #[serde(default)]
    order_amount: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    order: WebhookOrder,
    payment: WebhookPayment,
}

#[derive(Debug, Deserialize)]
struct WebhookOrder {
    order_id: String,
    #[serde(default)]
    order_amount: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WebhookPayment {
    payment_status: String,
    #[serde(default)]
    cf_payment_id: Option<serde_json::Value>,
}

impl HostedCheckoutGateway {
    pub fn new(config: HostedCheckoutConfig) -> Result<Self, GatewayError> {
        let http = GatewayHttpClient::new(config.timeout, config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &HostedCheckoutConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn check_credentials(&self) -> Result<(), GatewayError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(GatewayError::Configuration("Hosted checkout credentials are not configured".into()));
        }
        Ok(())
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody<'_>,
    ) -> Result<T, GatewayError> {
        self.check_credentials()?;
        let headers = [
            ("x-client-id", self.config.client_id.reveal().as_str()),
            ("x-client-secret", self.config.client_secret.reveal().as_str()),
            ("x-api-version", self.config.api_version.as_str()),
            ("accept", "application/json"),
        ];
        self.http.request_json(method, &self.url(path), &headers, body).await
    }
}

/// `base64(HMAC-SHA256(secret, timestamp ‖ body))`, as sent in [`SIGNATURE_HEADER`].
pub fn sign_webhook(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, GatewayError> {
    let mac = hmac_sha256(secret.as_bytes(), &[timestamp.as_bytes(), body])?;
    Ok(base64::encode(mac))
}

/// Maps the provider's order status onto the three states the engine knows about.
fn order_status(status: &str) -> Option<bool> {
    match status {
        "PAID" => Some(true),
        "EXPIRED" | "TERMINATED" | "CANCELLED" | "FAILED" => Some(false),
        _ => None,
    }
}

fn json_to_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        v => Some(v.to_string()),
    }
}

impl PaymentGateway for HostedCheckoutGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::HostedCheckout
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "order_id": request.order_id.as_str(),
            "order_amount": request.amount.to_major_string(),
            "order_currency": CURRENCY_CODE,
            "customer_details": { "customer_id": request.customer_ref },
            "order_meta": { "return_url": request.return_url },
        });
        let response: CreateOrderResponse = self.call(Method::POST, "/orders", RequestBody::Json(&body)).await?;
        debug!("💳️ Hosted checkout session created for order {}", request.order_id);
        Ok(CheckoutSession::SessionToken { token: response.payment_session_id })
    }

    async fn query_status(&self, order_id: &OrderId) -> Result<GatewayStatus, GatewayError> {
        let path = format!("/orders/{order_id}");
        let response: OrderStatusResponse = self.call(Method::GET, &path, RequestBody::Empty).await?;
        trace!("💳️ Hosted checkout reports {} for order {order_id}", response.order_status);
        let status = match order_status(&response.order_status) {
            Some(true) => {
                let amount = json_to_string(response.order_amount).map(|a| parse_amount(&a)).transpose()?;
                GatewayStatus::Paid { reference: json_to_string(response.cf_order_id), amount }
            },
            Some(false) => GatewayStatus::Failed { reason: format!("Order {}", response.order_status.to_lowercase()) },
            None => GatewayStatus::Pending,
        };
        Ok(status)
    }

    fn validate_callback(&self, payload: &CallbackPayload) -> Result<CallbackEvent, GatewayError> {
        let (Some(signature), Some(timestamp)) = (&payload.signature, &payload.timestamp) else {
            return Err(GatewayError::InvalidSignature);
        };
        if self.config.webhook_secret.is_empty() {
            return Err(GatewayError::Configuration("No webhook secret configured".into()));
        }
        let expected = sign_webhook(self.config.webhook_secret.reveal(), timestamp, &payload.body)?;
        if !secure_eq(expected.as_bytes(), signature.trim().as_bytes()) {
            return Err(GatewayError::InvalidSignature);
        }
        let body: WebhookBody = serde_json::from_slice(&payload.body)
            .map_err(|e| GatewayError::MalformedPayload(format!("Unexpected webhook body. {e}")))?;
        let status = match body.data.payment.payment_status.as_str() {
            "SUCCESS" => CallbackStatus::Success,
            "FAILED" | "USER_DROPPED" | "CANCELLED" => CallbackStatus::Failed,
            _ => CallbackStatus::Other,
        };
        let amount = json_to_string(body.data.order.order_amount).map(|a| parse_amount(&a)).transpose()?;
        Ok(CallbackEvent {
            order_id: OrderId::from(body.data.order.order_id),
            status,
            provider_reference: json_to_string(body.data.payment.cf_payment_id),
            amount,
        })
    }
}
