//! Commission share math.
//! Pure and synchronous; every purchase computes its split exactly once
//! here and freezes the result into the transaction's metadata.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// The split of a purchase amount between platform, artist and reseller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub platform_amount: BigDecimal,
    pub artist_amount: BigDecimal,
    pub reseller_amount: BigDecimal,
}

impl CommissionBreakdown {
    pub fn total(&self) -> BigDecimal {
        &self.platform_amount + &self.artist_amount + &self.reseller_amount
    }
}

/// Fallback rates applied when neither the media row nor the reseller
/// link/user carries an override. Sourced from configuration at startup.
#[derive(Debug, Clone)]
pub struct RateDefaults {
    pub artist: BigDecimal,
    pub reseller: BigDecimal,
}

impl RateDefaults {
    /// The stock 50% artist / 20% reseller split.
    pub fn standard() -> Self {
        Self {
            artist: BigDecimal::new(5.into(), 1),
            reseller: BigDecimal::new(2.into(), 1),
        }
    }
}

/// Effective reseller rate for a reseller sale. The link-level override
/// always wins over the reseller user's own rate, which wins over the
/// configured default.
pub fn resolve_reseller_rate(
    link_rate: Option<&BigDecimal>,
    user_rate: Option<&BigDecimal>,
    defaults: &RateDefaults,
) -> BigDecimal {
    link_rate
        .or(user_rate)
        .cloned()
        .unwrap_or_else(|| defaults.reseller.clone())
}

/// Splits `amount` into platform/artist/reseller shares.
///
/// The platform takes whatever remains after the artist (and reseller)
/// shares, so rates summing past 1.0 drive the platform share negative.
/// That is not clamped here; the ledger logs it as a rate
/// misconfiguration and persists the split as computed.
pub fn compute_shares(
    amount: &BigDecimal,
    artist_rate: Option<&BigDecimal>,
    is_reseller_sale: bool,
    reseller_rate: Option<&BigDecimal>,
    defaults: &RateDefaults,
) -> CommissionBreakdown {
    let artist_rate = artist_rate.unwrap_or(&defaults.artist);

    if !is_reseller_sale {
        let artist_amount = amount * artist_rate;
        let platform_amount = amount - &artist_amount;

        return CommissionBreakdown {
            platform_amount,
            artist_amount,
            reseller_amount: BigDecimal::from(0),
        };
    }

    let reseller_rate = reseller_rate.unwrap_or(&defaults.reseller);
    let reseller_amount = amount * reseller_rate;
    let artist_amount = amount * artist_rate;
    let platform_amount = amount - &reseller_amount - &artist_amount;

    CommissionBreakdown {
        platform_amount,
        artist_amount,
        reseller_amount,
    }
}
