//! Request handler definitions
//!
//! Define each route and its handler here. Handlers only translate between HTTP and the engine APIs; the payment
//! logic itself lives in `vendor_payment_engine`.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. The return page may poll the gateway for several seconds, so every
//! wait in here must be an `.await`, never a blocking sleep.
//!
//! Handlers are generic over the storage backend and, where needed, over the gateway adapters. This lets the endpoint
//! tests run the real handlers against mocks.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use gateway_tools::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use log::*;
use vendor_payment_engine::{
    db_types::{GatewayKind, WalletKind},
    CallbackOutcome,
    CallbackPayload,
    CheckoutApi,
    PaymentGateway,
    PaymentLedgerDatabase,
    PayoutManagement,
    ReconcileError,
    Reconciler,
    SettlementApi,
    WalletApi,
    WalletManagement,
};

use crate::{
    auth::AdminAccess,
    config::ServerOptions,
    data_objects::{
        CheckoutRequest,
        CheckoutResponse,
        HistoryParams,
        InstantPayoutParams,
        JsonResponse,
        NotFoundResponse,
        RedeemParams,
        ResolvePayoutParams,
        ReturnPageResponse,
        ReturnParams,
        WithdrawParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
//
// * `impl Bound, ...` registers `handler::<B>` with `B` being the storage backend.
// * `with gateway impl Bound, ...` registers `handler::<B, G>` for a single gateway adapter `G`.
// * `with gateways impl Bound, ...` registers `handler::<B, H, S>` with the hosted-checkout adapter `H` and the
//   sealed-form adapter `S`, for handlers that pick the gateway per order.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal with gateway impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B, G>(core::marker::PhantomData<fn() -> (B, G)>);}
        paste::paste! { impl<B, G> [<$name:camel Route>]<B, G> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (B, G)>)
            }
        }}
        paste::paste! { impl<B, G> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B, G>
        where
            B: $($bounds +)+ 'static,
            G: vendor_payment_engine::PaymentGateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B, G>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal with gateways impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B, H, S>(core::marker::PhantomData<fn() -> (B, H, S)>);}
        paste::paste! { impl<B, H, S> [<$name:camel Route>]<B, H, S> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (B, H, S)>)
            }
        }}
        paste::paste! { impl<B, H, S> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B, H, S>
        where
            B: $($bounds +)+ 'static,
            H: vendor_payment_engine::PaymentGateway + 'static,
            S: vendor_payment_engine::PaymentGateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B, H, S>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" with gateways impl PaymentLedgerDatabase);
/// Records a pending payment intent and opens a session with the gateway the client asked for.
///
/// Re-submitting the same order id with the same details is safe and returns a fresh session. The same id with a
/// different amount is a 409. If the gateway cannot be reached the intent stays `pending` and the client gets a 503.
pub async fn checkout<B, H, S>(
    body: web::Json<CheckoutRequest>,
    hosted: web::Data<CheckoutApi<B, H>>,
    sealed: web::Data<CheckoutApi<B, S>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    H: PaymentGateway,
    S: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout for order {} via {}", request.order_id, request.gateway);
    let intent = request.into_intent()?;
    let outcome = match intent.gateway {
        GatewayKind::HostedCheckout => {
            let return_url = options.return_page_url(intent.order_id.as_str());
            hosted.create_checkout(intent, return_url).await
        },
        GatewayKind::SealedForm => sealed.create_checkout(intent, options.sealed_return_url()).await,
    }
    .map_err(|e| {
        debug!("💻️ Checkout failed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(outcome)))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(hosted_checkout_webhook => Post "/webhooks/hosted-checkout"
    with gateway impl PaymentLedgerDatabase, WalletManagement);
/// Server-to-server notifications from the hosted checkout provider.
///
/// Always answers 200 so that the provider does not keep re-sending payloads we have already looked at. Forged or
/// unreadable payloads are reported with `success: false` and change nothing.
pub async fn hosted_checkout_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    reconciler: web::Data<Reconciler<B, G>>,
) -> HttpResponse
where
    B: PaymentLedgerDatabase + WalletManagement,
    G: PaymentGateway,
{
    trace!("💻️ Received hosted checkout webhook");
    acknowledge_callback(&req, body, reconciler.as_ref()).await
}

route!(sealed_form_webhook => Post "/webhooks/sealed-form"
    with gateway impl PaymentLedgerDatabase, WalletManagement);
/// Server-to-server notifications from the sealed-form provider. Same contract as the hosted checkout webhook.
pub async fn sealed_form_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    reconciler: web::Data<Reconciler<B, G>>,
) -> HttpResponse
where
    B: PaymentLedgerDatabase + WalletManagement,
    G: PaymentGateway,
{
    trace!("💻️ Received sealed-form webhook");
    acknowledge_callback(&req, body, reconciler.as_ref()).await
}

fn callback_payload(req: &HttpRequest, body: web::Bytes) -> CallbackPayload {
    let mut payload = CallbackPayload::new(body.to_vec());
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from);
    if let Some(signature) = header(SIGNATURE_HEADER) {
        payload = payload.with_signature(signature);
    }
    if let Some(timestamp) = header(TIMESTAMP_HEADER) {
        payload = payload.with_timestamp(timestamp);
    }
    payload
}

async fn acknowledge_callback<B, G>(req: &HttpRequest, body: web::Bytes, reconciler: &Reconciler<B, G>) -> HttpResponse
where
    B: PaymentLedgerDatabase + WalletManagement,
    G: PaymentGateway,
{
    let payload = callback_payload(req, body);
    let response = match reconciler.handle_callback(&payload).await {
        Ok(CallbackOutcome::Finalized(outcome)) if outcome.duplicate => {
            JsonResponse::success(format!("Order {} was already confirmed", outcome.order_id))
        },
        Ok(CallbackOutcome::Finalized(outcome)) => {
            JsonResponse::success(format!("Order {} confirmed", outcome.order_id))
        },
        Ok(CallbackOutcome::Ignored(reason)) => JsonResponse::success(format!("Acknowledged. {reason}")),
        Ok(CallbackOutcome::Rejected) => JsonResponse::failure("Invalid signature"),
        Err(e) => {
            error!("💻️ Could not process {} callback. {e}", reconciler.gateway().kind());
            JsonResponse::failure("The callback could not be processed")
        },
    };
    HttpResponse::Ok().json(response)
}

//----------------------------------------------   Return page  ----------------------------------------------------
route!(payment_return => Get "/payments/return" with gateways impl PaymentLedgerDatabase, WalletManagement);
/// Where the customer's browser lands after paying.
///
/// The redirect itself proves nothing. The gateway that handled the order is asked for the authoritative status,
/// polling for a while if it has no final answer yet. When it still has none, the page reports `processing` and the
/// webhook will settle the order later.
pub async fn payment_return<B, H, S>(
    query: web::Query<ReturnParams>,
    hosted: web::Data<Reconciler<B, H>>,
    sealed: web::Data<Reconciler<B, S>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase + WalletManagement,
    H: PaymentGateway,
    S: PaymentGateway,
{
    let order_id = query.into_inner().order_id;
    debug!("💻️ GET payment return for order {order_id}");
    let intent = hosted.finalizer().db().fetch_payment_intent(&order_id).await?;
    let Some(intent) = intent else {
        return Ok(order_not_found(&options, &order_id));
    };
    let outcome = match intent.gateway {
        GatewayKind::HostedCheckout => hosted.confirm_on_return(&order_id).await,
        GatewayKind::SealedForm => sealed.confirm_on_return(&order_id).await,
    };
    match outcome {
        Ok(outcome) => {
            let track_order_url = options.track_order_url(order_id.as_str());
            Ok(HttpResponse::Ok().json(ReturnPageResponse::new(order_id, outcome, track_order_url)))
        },
        Err(ReconcileError::OrderNotFound(_)) => Ok(order_not_found(&options, &order_id)),
        Err(e) => Err(e.into()),
    }
}

fn order_not_found(options: &ServerOptions, order_id: &impl std::fmt::Display) -> HttpResponse {
    debug!("💻️ Return page requested for unknown order {order_id}");
    HttpResponse::NotFound()
        .json(NotFoundResponse { error: format!("Order {order_id} was not found"), home_url: options.home_url() })
}

route!(sealed_form_return => Post "/payments/return/sealed-form" with gateway impl PaymentLedgerDatabase);
/// The sealed-form provider posts the customer's browser back here with a sealed response. Once the seal checks out,
/// the browser is sent on to the regular return page, which asks the gateway for the real status.
pub async fn sealed_form_return<B, G>(
    body: web::Bytes,
    reconciler: web::Data<Reconciler<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    G: PaymentGateway,
{
    let event = reconciler.gateway().validate_callback(&CallbackPayload::new(body.to_vec())).map_err(|e| {
        warn!("💻️ Sealed-form return could not be unsealed. {e}");
        ServerError::InvalidSignature
    })?;
    debug!("💻️ Sealed-form return for order {}. Redirecting to the return page.", event.order_id);
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, options.return_page_url(event.order_id.as_str())))
        .finish())
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(customer_wallet => Get "/wallets/customer/{id}" impl WalletManagement);
pub async fn customer_wallet<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    debug!("💻️ GET customer wallet for {customer_id}");
    let wallet = api.customer_wallet(&customer_id).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

route!(vendor_wallet => Get "/wallets/vendor/{id}" impl WalletManagement);
pub async fn vendor_wallet<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = path.into_inner();
    debug!("💻️ GET vendor wallet for {vendor_id}");
    let wallet = api.vendor_wallet(&vendor_id).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

route!(wallet_history => Get "/wallets/{wallet}/{id}/history" impl WalletManagement);
/// Transactions for a customer or vendor wallet, newest first. Use `?limit=n` to change the page size.
pub async fn wallet_history<B: WalletManagement>(
    path: web::Path<(WalletKind, String)>,
    query: web::Query<HistoryParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (wallet, owner_id) = path.into_inner();
    debug!("💻️ GET {wallet} wallet history for {owner_id}");
    let history = api.history(wallet, &owner_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(redeem_coins => Post "/wallets/customer/{id}/redeem" impl WalletManagement);
pub async fn redeem_coins<B: WalletManagement>(
    path: web::Path<String>,
    body: web::Json<RedeemParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    let params = body.into_inner();
    debug!("💻️ POST redeem {} coins for {customer_id}", params.coins);
    if params.coins <= 0 {
        return Err(ServerError::InvalidRequestBody(format!("Cannot redeem {} coins", params.coins)));
    }
    let description = params.description.unwrap_or_else(|| format!("Redeemed {} coins", params.coins));
    let tx = api.redeem_coins(&customer_id, params.coins, &description).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(withdraw => Post "/wallets/vendor/{id}/withdraw" impl WalletManagement);
/// A standard withdrawal. Unlike instant payouts, this can draw on any part of the vendor balance at any time.
pub async fn withdraw<B: WalletManagement>(
    path: web::Path<String>,
    body: web::Json<WithdrawParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = path.into_inner();
    let amount = body.into_inner().amount;
    debug!("💻️ POST withdraw {amount} for {vendor_id}");
    let tx = api.withdraw(&vendor_id, amount).await?;
    Ok(HttpResponse::Ok().json(tx))
}

//----------------------------------------------   Settlement  ----------------------------------------------------
route!(settlement_cycle => Get "/settlement/cycle" impl WalletManagement, PayoutManagement);
pub async fn settlement_cycle<B>(api: web::Data<SettlementApi<B>>) -> HttpResponse
where B: WalletManagement + PayoutManagement {
    trace!("💻️ GET settlement cycle");
    HttpResponse::Ok().json(api.cycle_state())
}

route!(instant_payout => Post "/settlement/instant" impl WalletManagement, PayoutManagement);
pub async fn instant_payout<B>(
    body: web::Json<InstantPayoutParams>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: WalletManagement + PayoutManagement,
{
    let params = body.into_inner();
    debug!("💻️ POST instant payout of {} for {}", params.amount, params.vendor_id);
    let request = api.request_instant_payout(&params.vendor_id, params.amount).await.map_err(|e| {
        debug!("💻️ Instant payout refused. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(request))
}

route!(payout_history => Get "/settlement/payouts/{vendor_id}" impl WalletManagement, PayoutManagement);
pub async fn payout_history<B>(
    path: web::Path<String>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: WalletManagement + PayoutManagement,
{
    let vendor_id = path.into_inner();
    debug!("💻️ GET payout history for {vendor_id}");
    let requests = api.payout_history(&vendor_id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

route!(payout_processed => Post "/admin/payouts/{id}/processed" impl WalletManagement, PayoutManagement);
/// Admin: the payout has been sent. The matching withdrawal is written to the vendor wallet.
pub async fn payout_processed<B>(
    _admin: AdminAccess,
    path: web::Path<i64>,
    body: Option<web::Json<ResolvePayoutParams>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: WalletManagement + PayoutManagement,
{
    let id = path.into_inner();
    let note = body.and_then(|b| b.into_inner().note);
    info!("💻️ Admin marked payout request #{id} as processed");
    let request = api.process_payout(id, note).await?;
    Ok(HttpResponse::Ok().json(request))
}

route!(payout_rejected => Post "/admin/payouts/{id}/rejected" impl WalletManagement, PayoutManagement);
/// Admin: the payout will not be made. The vendor balance is left untouched.
pub async fn payout_rejected<B>(
    _admin: AdminAccess,
    path: web::Path<i64>,
    body: Option<web::Json<ResolvePayoutParams>>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: WalletManagement + PayoutManagement,
{
    let id = path.into_inner();
    let note = body.and_then(|b| b.into_inner().note);
    info!("💻️ Admin rejected payout request #{id}");
    let request = api.reject_payout(id, note).await?;
    Ok(HttpResponse::Ok().json(request))
}
