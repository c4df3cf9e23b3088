//! Collision-avoiding resource id generation

use tracing::debug;
use uuid::Uuid;

use crate::error::{CardDavError, Result};
use crate::transport::{DavMethod, Transport};

/// Probe cap; beyond this the id space is treated as exhausted
const MAX_ATTEMPTS: u32 = 100;

/// Produce a fresh 26-character token: three 8-char uppercase hex groups
/// joined by dashes. Uniqueness matters here, secrecy does not.
pub fn random_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("{}-{}-{}", &hex[..8], &hex[8..16], &hex[16..24])
}

/// Generate an id no resource under `base_url` currently uses.
///
/// Each candidate is probed with a GET on `<id>.vcf`; any success status
/// means the id is taken and a new one is drawn. Connection-level probe
/// failures propagate rather than risking a blind create.
pub fn generate(transport: &dyn Transport, base_url: &str) -> Result<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let id = random_id();
        let url = format!("{base_url}{id}.vcf");
        let response = transport.execute(&url, DavMethod::Get, None, None)?;

        if response.is_success() {
            debug!(
                "resource id {} already taken (status {}, attempt {})",
                id, response.status, attempt
            );
            continue;
        }

        return Ok(id);
    }

    Err(CardDavError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}
