//! Admin access for the payout resolution endpoints.
//!
//! Requests must carry the configured key in the `x-admin-key` header. Add [`AdminAccess`] as a handler argument to
//! protect a route.
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use log::*;

use crate::{config::AdminKey, errors::ServerError};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequest for AdminAccess {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(check_admin_key(req))
    }
}

fn check_admin_key(req: &HttpRequest) -> Result<AdminAccess, ServerError> {
    let Some(key) = req.app_data::<web::Data<AdminKey>>() else {
        error!("🔐️ No admin key has been registered with the server. Refusing admin request.");
        return Err(ServerError::Unauthorized);
    };
    if key.0.is_empty() {
        warn!("🔐️ Admin request to {} refused. No admin key is configured.", req.path());
        return Err(ServerError::Unauthorized);
    }
    let supplied = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if keys_match(key.0.reveal().as_bytes(), supplied.as_bytes()) {
        trace!("🔐️ Admin key accepted for {}", req.path());
        Ok(AdminAccess)
    } else {
        warn!("🔐️ Admin request to {} refused. Missing or invalid admin key.", req.path());
        Err(ServerError::Unauthorized)
    }
}

fn keys_match(expected: &[u8], supplied: &[u8]) -> bool {
    if expected.len() != supplied.len() {
        return false;
    }
    expected.iter().zip(supplied).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
