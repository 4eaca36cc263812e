use hmac::{Hmac, Mac};
use sha2::Sha256;
use vendor_payment_engine::{db_types::MinorUnits, GatewayError};

type HmacSha256 = Hmac<Sha256>;

/// Gateways expect amounts as two-decimal strings in major units: `12345 → "123.45"`.
pub fn format_amount(amount: MinorUnits) -> String {
    amount.to_major_string()
}

pub fn parse_amount(value: &str) -> Result<MinorUnits, GatewayError> {
    MinorUnits::from_major_str(value).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, GatewayError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| GatewayError::Configuration(format!("Invalid HMAC key. {e}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compares two byte strings without short-circuiting on the first difference.
pub(crate) fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
