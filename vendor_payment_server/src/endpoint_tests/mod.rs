mod checkout;
mod payment_return;
mod settlement;
mod wallets;
mod webhooks;
