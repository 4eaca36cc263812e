use std::time::Duration;

use log::*;
use vpg_common::Secret;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set, using {default} as default");
        default.to_string()
    })
}

fn secret_from_env(key: &str) -> Secret<String> {
    Secret::new(std::env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set. Requests to the gateway will be rejected until it is configured.");
        String::default()
    }))
}

fn timeout_from_env(key: &str) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("Invalid value for {key}: {s}. {e}. Using the default.")).ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
}

#[derive(Debug, Clone)]
pub struct HostedCheckoutConfig {
    /// e.g. `https://sandbox.gateway.example/pg`
    pub base_url: String,
    pub api_version: String,
    pub client_id: Secret<String>,
    pub client_secret: Secret<String>,
    /// Key used by the provider to sign webhooks. Often the same as the client secret.
    pub webhook_secret: Secret<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for HostedCheckoutConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.hosted-checkout.example/pg".to_string(),
            api_version: "2023-08-01".to_string(),
            client_id: Secret::default(),
            client_secret: Secret::default(),
            webhook_secret: Secret::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl HostedCheckoutConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = env_or_default("VPG_HOSTED_CHECKOUT_BASE_URL", &defaults.base_url);
        let api_version = env_or_default("VPG_HOSTED_CHECKOUT_API_VERSION", &defaults.api_version);
        let client_id = secret_from_env("VPG_HOSTED_CHECKOUT_CLIENT_ID");
        let client_secret = secret_from_env("VPG_HOSTED_CHECKOUT_CLIENT_SECRET");
        let webhook_secret = match std::env::var("VPG_HOSTED_CHECKOUT_WEBHOOK_SECRET") {
            Ok(s) => Secret::new(s),
            Err(_) => {
                info!("VPG_HOSTED_CHECKOUT_WEBHOOK_SECRET not set. Webhooks are verified with the client secret.");
                client_secret.clone()
            },
        };
        let timeout = timeout_from_env("VPG_GATEWAY_TIMEOUT_SECS");
        Self { base_url, api_version, client_id, client_secret, webhook_secret, timeout, ..defaults }
    }
}

#[derive(Debug, Clone)]
pub struct SealedFormConfig {
    pub merchant_id: String,
    pub access_code: Secret<String>,
    /// Symmetric key for sealing and unsealing payloads
    pub working_key: Secret<String>,
    /// Where the browser posts the sealed form
    pub action_url: String,
    /// Server-to-server order status endpoint
    pub status_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for SealedFormConfig {
    fn default() -> Self {
        Self {
            merchant_id: String::default(),
            access_code: Secret::default(),
            working_key: Secret::default(),
            action_url: "https://test.sealed-form.example/transaction/initiate".to_string(),
            status_url: "https://apitest.sealed-form.example/api/status".to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SealedFormConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let merchant_id = env_or_default("VPG_SEALED_FORM_MERCHANT_ID", "");
        let access_code = secret_from_env("VPG_SEALED_FORM_ACCESS_CODE");
        let working_key = secret_from_env("VPG_SEALED_FORM_WORKING_KEY");
        let action_url = env_or_default("VPG_SEALED_FORM_ACTION_URL", &defaults.action_url);
        let status_url = env_or_default("VPG_SEALED_FORM_STATUS_URL", &defaults.status_url);
        let timeout = timeout_from_env("VPG_GATEWAY_TIMEOUT_SECS");
        Self { merchant_id, access_code, working_key, action_url, status_url, timeout, ..defaults }
    }
}
