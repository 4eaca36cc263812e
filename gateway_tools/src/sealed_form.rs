use log::*;
use reqwest::Method;
use serde::Deserialize;
use vendor_payment_engine::{
    db_types::{GatewayKind, MinorUnits, OrderId},
    traits::{CallbackEvent, CallbackStatus, SessionRequest},
    CallbackPayload,
    CheckoutSession,
    GatewayError,
    GatewayStatus,
    PaymentGateway,
};
use vpg_common::{Secret, CURRENCY_CODE};

use crate::{
    config::SealedFormConfig,
    helpers::{format_amount, hmac_sha256, parse_amount, secure_eq},
    http::{GatewayHttpClient, RequestBody},
};

/// Seals form fields with the merchant working key: `base64(urlencoded fields).hex(HMAC-SHA256(key, base64 part))`.
///
/// Sealed payloads are opaque to the browser that carries them. Nothing inside is trusted until [`Sealer::unseal`]
/// has verified the MAC.
#[derive(Debug, Clone)]
pub struct Sealer {
    key: Secret<String>,
}

impl Sealer {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }

    pub fn seal(&self, fields: &[(&str, &str)]) -> Result<String, GatewayError> {
        let encoded = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish();
        let payload = base64::encode(encoded);
        let mac = hmac_sha256(self.key_bytes()?, &[payload.as_bytes()])?;
        Ok(format!("{payload}.{}", hex::encode(mac)))
    }

    pub fn unseal(&self, sealed: &str) -> Result<Vec<(String, String)>, GatewayError> {
        let (payload, mac) = sealed.trim().rsplit_once('.').ok_or(GatewayError::InvalidSignature)?;
        let mac = hex::decode(mac).map_err(|_| GatewayError::InvalidSignature)?;
        let expected = hmac_sha256(self.key_bytes()?, &[payload.as_bytes()])?;
        if !secure_eq(&expected, &mac) {
            return Err(GatewayError::InvalidSignature);
        }
        let decoded = base64::decode(payload).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        Ok(url::form_urlencoded::parse(&decoded).into_owned().collect())
    }

    fn key_bytes(&self) -> Result<&[u8], GatewayError> {
        if self.key.is_empty() {
            return Err(GatewayError::Configuration("No working key configured".into()));
        }
        Ok(self.key.reveal().as_bytes())
    }
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn required<'a>(fields: &'a [(String, String)], name: &str) -> Result<&'a str, GatewayError> {
    field(fields, name).ok_or_else(|| GatewayError::MalformedPayload(format!("Missing field {name}")))
}

fn optional_amount(fields: &[(String, String)], name: &str) -> Result<Option<MinorUnits>, GatewayError> {
    field(fields, name).filter(|s| !s.is_empty()).map(parse_amount).transpose()
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: i32,
    enc_response: String,
}

/// Redirect-form checkout: the browser posts a sealed request to the provider and comes back with a sealed response.
#[derive(Debug, Clone)]
pub struct SealedFormGateway {
    config: SealedFormConfig,
    sealer: Sealer,
    http: GatewayHttpClient,
}

impl SealedFormGateway {
    pub fn new(config: SealedFormConfig) -> Result<Self, GatewayError> {
        let http = GatewayHttpClient::new(config.timeout, config.max_retries)?;
        let sealer = Sealer::new(config.working_key.clone());
        Ok(Self { config, sealer, http })
    }

    pub fn sealer(&self) -> &Sealer {
        &self.sealer
    }
}

impl PaymentGateway for SealedFormGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::SealedForm
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        let amount = format_amount(request.amount);
        let sealed = self.sealer.seal(&[
            ("merchant_id", self.config.merchant_id.as_str()),
            ("order_id", request.order_id.as_str()),
            ("amount", amount.as_str()),
            ("currency", CURRENCY_CODE),
            ("redirect_url", request.return_url.as_str()),
            ("cancel_url", request.return_url.as_str()),
            ("customer_identifier", request.customer_ref.as_str()),
        ])?;
        debug!("💳️ Sealed redirect form built for order {}", request.order_id);
        Ok(CheckoutSession::RedirectForm {
            action_url: self.config.action_url.clone(),
            fields: vec![
                ("encRequest".to_string(), sealed),
                ("access_code".to_string(), self.config.access_code.reveal().clone()),
            ],
        })
    }

    async fn query_status(&self, order_id: &OrderId) -> Result<GatewayStatus, GatewayError> {
        let sealed = self.sealer.seal(&[("order_no", order_id.as_str())])?;
        let form = vec![
            ("enc_request".to_string(), sealed),
            ("access_code".to_string(), self.config.access_code.reveal().clone()),
            ("command".to_string(), "orderStatusTracker".to_string()),
            ("request_type".to_string(), "JSON".to_string()),
            ("response_type".to_string(), "JSON".to_string()),
        ];
        let response: StatusResponse =
            self.http.request_json(Method::POST, &self.config.status_url, &[], RequestBody::Form(&form)).await?;
        if response.status != 0 {
            return Err(GatewayError::Provider { status: 200, message: format!("Status query refused for {order_id}") });
        }
        let fields = self.sealer.unseal(&response.enc_response)?;
        let status = required(&fields, "order_status")?;
        trace!("💳️ Sealed-form gateway reports {status} for order {order_id}");
        let result = match status {
            "Shipped" | "Successful" | "Success" => GatewayStatus::Paid {
                reference: field(&fields, "reference_no").map(String::from),
                amount: optional_amount(&fields, "order_amt")?,
            },
            "Aborted" | "Unsuccessful" | "Failure" | "Invalid" | "Timeout" | "Cancelled" => {
                GatewayStatus::Failed { reason: format!("Payment {}", status.to_lowercase()) }
            },
            _ => GatewayStatus::Pending,
        };
        Ok(result)
    }

    /// Server callbacks and browser returns both post `encResp=<sealed response>` as a form.
    fn validate_callback(&self, payload: &CallbackPayload) -> Result<CallbackEvent, GatewayError> {
        let form: Vec<(String, String)> = url::form_urlencoded::parse(&payload.body).into_owned().collect();
        let sealed = field(&form, "encResp").ok_or(GatewayError::InvalidSignature)?;
        let fields = self.sealer.unseal(sealed)?;
        let order_id = required(&fields, "order_id")?;
        let status = match required(&fields, "order_status")? {
            "Success" => CallbackStatus::Success,
            "Failure" | "Aborted" | "Unsuccessful" => CallbackStatus::Failed,
            _ => CallbackStatus::Other,
        };
        Ok(CallbackEvent {
            order_id: OrderId::from(order_id),
            status,
            provider_reference: field(&fields, "tracking_id").map(String::from),
            amount: optional_amount(&fields, "amount")?,
        })
    }
}
