//! Reference generation for purchase and payout records.
//!
//! References are human-traceable and double as the provider correlation
//! key. The timestamp+suffix shape keeps collisions improbable; the store
//! additionally enforces uniqueness, and a collision surfaces as a
//! retryable insert error.

use chrono::Utc;
use uuid::Uuid;

const PURCHASE_PREFIX: &str = "TXN";
const PAYOUT_PREFIX: &str = "PYT";
const SUFFIX_LEN: usize = 6;

pub fn purchase_reference() -> String {
    generate(PURCHASE_PREFIX)
}

pub fn payout_reference() -> String {
    generate(PAYOUT_PREFIX)
}

fn generate(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().timestamp_millis(),
        &simple[..SUFFIX_LEN]
    )
}
