pub mod checkout_api;
pub mod clock;
pub mod errors;
pub mod finalizer_api;
pub mod reconciler;
pub mod reward_policy;
pub mod settlement_api;
pub mod settlement_cycles;
pub mod wallet_api;
