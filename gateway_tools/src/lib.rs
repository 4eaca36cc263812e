//! Clients for the payment gateways the marketplace accepts.
//!
//! Both adapters implement [`vendor_payment_engine::PaymentGateway`]:
//! * [`HostedCheckoutGateway`] opens a tokenized checkout session that the client completes with the provider's SDK,
//!   and signs its webhooks with an HMAC over the timestamp and raw body.
//! * [`SealedFormGateway`] builds a sealed form that the browser posts to the provider. Callbacks come back sealed
//!   with the same merchant key and are only trusted after the seal verifies.
mod config;
mod helpers;
mod hosted_checkout;
mod http;
mod sealed_form;

pub use config::{HostedCheckoutConfig, SealedFormConfig};
pub use helpers::{format_amount, parse_amount};
pub use hosted_checkout::{sign_webhook, HostedCheckoutGateway, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use http::GatewayHttpClient;
pub use sealed_form::{SealedFormGateway, Sealer};
