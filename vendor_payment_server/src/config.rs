use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use gateway_tools::{HostedCheckoutConfig, SealedFormConfig};
use log::*;
use vendor_payment_engine::{
    db_types::MinorUnits,
    reward_policy::{RewardPolicy, DEFAULT_CASHBACK_PER_PAYMENT, DEFAULT_COINS_PER_PAYMENT},
    settlement_cycles::SettlementConfig,
    PollPolicy,
    DEFAULT_PREMIUM_PERIOD_DAYS,
};
use vpg_common::Secret;

const DEFAULT_VPG_HOST: &str = "127.0.0.1";
const DEFAULT_VPG_PORT: u16 = 8370;
const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:8370";
const DEFAULT_STOREFRONT_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_REWARD_REPAIR_INTERVAL: StdDuration = StdDuration::from_secs(300);
const DEFAULT_REWARD_REPAIR_MIN_AGE: Duration = Duration::minutes(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The externally visible base URL of this server. Gateways send customers back to `{public_url}/payments/return`.
    pub public_url: String,
    /// The storefront the customer lands on after paying. Used for the "track order" and "home" links.
    pub storefront_url: String,
    /// Shared secret for the `/admin` endpoints, passed in the `x-admin-key` header. Admin access is disabled if empty.
    pub admin_key: Secret<String>,
    pub reward_policy: RewardPolicy,
    pub settlement: SettlementConfig,
    pub return_poll: PollPolicy,
    pub premium_period: Duration,
    /// How often the reward repair job runs
    pub reward_repair_interval: StdDuration,
    /// Paid orders younger than this are left alone by the repair job, since their reward write may still be running.
    pub reward_repair_min_age: Duration,
    pub hosted_checkout: HostedCheckoutConfig,
    pub sealed_form: SealedFormConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VPG_HOST.to_string(),
            port: DEFAULT_VPG_PORT,
            database_url: String::default(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            storefront_url: DEFAULT_STOREFRONT_URL.to_string(),
            admin_key: Secret::default(),
            reward_policy: RewardPolicy::default(),
            settlement: SettlementConfig::default(),
            return_poll: PollPolicy::default(),
            premium_period: Duration::days(DEFAULT_PREMIUM_PERIOD_DAYS),
            reward_repair_interval: DEFAULT_REWARD_REPAIR_INTERVAL,
            reward_repair_min_age: DEFAULT_REWARD_REPAIR_MIN_AGE,
            hosted_checkout: HostedCheckoutConfig::default(),
            sealed_form: SealedFormConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VPG_HOST").ok().unwrap_or_else(|| DEFAULT_VPG_HOST.into());
        let port = env::var("VPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VPG_PORT. {e} Using the default, {DEFAULT_VPG_PORT}, instead."
                    );
                    DEFAULT_VPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VPG_PORT);
        let database_url = env::var("VPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let public_url = env::var("VPG_PUBLIC_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_PUBLIC_URL is not set. Gateways will send customers back to {DEFAULT_PUBLIC_URL}.");
            DEFAULT_PUBLIC_URL.into()
        });
        let storefront_url = env::var("VPG_STOREFRONT_URL").ok().unwrap_or_else(|| {
            info!("🪛️ VPG_STOREFRONT_URL is not set. Using {DEFAULT_STOREFRONT_URL}.");
            DEFAULT_STOREFRONT_URL.into()
        });
        let admin_key = env::var("VPG_ADMIN_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_ADMIN_KEY is not set. The admin endpoints will refuse every request.");
            String::default()
        });
        let premium_period = parse_env::<i64>("VPG_PREMIUM_PERIOD_DAYS")
            .map(Duration::days)
            .unwrap_or_else(|| Duration::days(DEFAULT_PREMIUM_PERIOD_DAYS));
        let reward_repair_interval = parse_env::<u64>("VPG_REWARD_REPAIR_INTERVAL")
            .map(StdDuration::from_secs)
            .unwrap_or(DEFAULT_REWARD_REPAIR_INTERVAL);
        let reward_repair_min_age = parse_env::<i64>("VPG_REWARD_REPAIR_MIN_AGE")
            .map(Duration::seconds)
            .unwrap_or(DEFAULT_REWARD_REPAIR_MIN_AGE);
        Self {
            host,
            port,
            database_url,
            public_url: public_url.trim_end_matches('/').to_string(),
            storefront_url: storefront_url.trim_end_matches('/').to_string(),
            admin_key: Secret::new(admin_key),
            reward_policy: reward_policy_from_env(),
            settlement: settlement_config_from_env(),
            return_poll: poll_policy_from_env(),
            premium_period,
            reward_repair_interval,
            reward_repair_min_age,
            hosted_checkout: HostedCheckoutConfig::new_from_env_or_default(),
            sealed_form: SealedFormConfig::new_from_env_or_default(),
        }
    }
}

fn parse_env<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = env::var(name).ok()?;
    value.trim().parse::<T>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}: {value}. {e}")).ok()
}

fn reward_policy_from_env() -> RewardPolicy {
    let coins_per_payment = parse_env::<i64>("VPG_COINS_PER_PAYMENT").unwrap_or(DEFAULT_COINS_PER_PAYMENT);
    let cashback_per_payment = parse_env::<i64>("VPG_CASHBACK_PER_PAYMENT").unwrap_or(DEFAULT_CASHBACK_PER_PAYMENT);
    let min_order_amount = parse_env::<i64>("VPG_MIN_ORDER_AMOUNT").unwrap_or(0);
    let policy = RewardPolicy {
        coins_per_payment,
        cashback_per_payment: MinorUnits::from(cashback_per_payment),
        min_order_amount: MinorUnits::from(min_order_amount),
    };
    info!("🪛️ Reward policy: {policy:?}");
    policy
}

fn settlement_config_from_env() -> SettlementConfig {
    let defaults = SettlementConfig::default();
    let boundaries = match env::var("VPG_SETTLEMENT_CYCLES") {
        Ok(s) => SettlementConfig::parse_boundaries(&s).unwrap_or_else(|e| {
            warn!("🪛️ Invalid VPG_SETTLEMENT_CYCLES. {e} Using the default settlement cycles.");
            defaults.boundaries().to_vec()
        }),
        Err(_) => defaults.boundaries().to_vec(),
    };
    let offset = match env::var("VPG_SETTLEMENT_UTC_OFFSET") {
        Ok(s) => SettlementConfig::parse_offset(&s).unwrap_or_else(|e| {
            warn!("🪛️ Invalid VPG_SETTLEMENT_UTC_OFFSET. {e} Using the default offset.");
            defaults.utc_offset()
        }),
        Err(_) => defaults.utc_offset(),
    };
    let min_instant =
        parse_env::<i64>("VPG_MIN_INSTANT_PAYOUT").map(MinorUnits::from).unwrap_or_else(|| defaults.min_instant());
    SettlementConfig::new(boundaries, offset, min_instant).unwrap_or_else(|e| {
        warn!("🪛️ Invalid settlement configuration. {e} Using the defaults.");
        SettlementConfig::default()
    })
}

fn poll_policy_from_env() -> PollPolicy {
    let defaults = PollPolicy::default();
    PollPolicy {
        max_attempts: parse_env::<u32>("VPG_RETURN_POLL_ATTEMPTS").unwrap_or(defaults.max_attempts).max(1),
        interval: parse_env::<u64>("VPG_RETURN_POLL_INTERVAL_MS")
            .map(StdDuration::from_millis)
            .unwrap_or(defaults.interval),
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need. Secrets are kept out of it.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub public_url: String,
    pub storefront_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { public_url: config.public_url.clone(), storefront_url: config.storefront_url.clone() }
    }

    /// The return page. The hosted checkout sends customers here, and sealed-form returns are redirected here.
    pub fn return_page_url(&self, order_id: &str) -> String {
        format!("{}/payments/return?order_id={order_id}", self.public_url)
    }

    /// The sealed-form provider posts its sealed response back to this URL.
    pub fn sealed_return_url(&self) -> String {
        format!("{}/payments/return/sealed-form", self.public_url)
    }

    pub fn track_order_url(&self, order_id: &str) -> String {
        format!("{}/orders/{order_id}", self.storefront_url)
    }

    pub fn home_url(&self) -> String {
        format!("{}/", self.storefront_url)
    }
}

/// The admin API key, checked by the [`crate::auth::AdminAccess`] extractor.
#[derive(Clone, Debug, Default)]
pub struct AdminKey(pub Secret<String>);
