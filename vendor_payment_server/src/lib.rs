//! # Vendor payment server
//! This crate hosts the HTTP surface of the vendor marketplace payment system. It is responsible for:
//! * Recording payment intents at checkout and opening sessions with the payment gateways.
//! * Receiving gateway webhooks and customers returning from the payment page, and handing both to the reconciler.
//! * Exposing wallet balances, coin redemption, withdrawals and instant payouts.
//! * Running the reward repair job in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information, or run
//! the binary with any argument to print the help text.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/checkout`: Create a pending payment intent and a gateway session.
//! * `/webhooks/hosted-checkout`, `/webhooks/sealed-form`: Gateway notifications. Always answered with 200.
//! * `/payments/return`: The return page. Confirms the payment with the gateway and reports the outcome.
//! * `/wallets/...`: Customer and vendor wallets.
//! * `/settlement/...`: Settlement cycle state and instant payouts.
//! * `/admin/payouts/{id}/processed|rejected`: Payout resolution, protected by the admin key.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod reward_repair_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
