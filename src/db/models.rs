use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use std::fmt;
use std::str::FromStr;

use crate::domain::commission::CommissionBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            _ => anyhow::bail!("Invalid transaction status: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Failed,
    Hold,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDING",
            CommissionStatus::Paid => "PAID",
            CommissionStatus::Failed => "FAILED",
            CommissionStatus::Hold => "HOLD",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "PENDING" => Ok(CommissionStatus::Pending),
            "PAID" => Ok(CommissionStatus::Paid),
            "FAILED" => Ok(CommissionStatus::Failed),
            "HOLD" => Ok(CommissionStatus::Hold),
            _ => anyhow::bail!("Invalid commission status: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Active,
    Inactive,
    Suspended,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "ACTIVE",
            LinkStatus::Inactive => "INACTIVE",
            LinkStatus::Suspended => "SUSPENDED",
        }
    }
}

/// Structured metadata persisted on a transaction row as JSONB.
/// `calculated_amounts` is the breakdown frozen at creation time; payout
/// distribution consumes it verbatim and never recomputes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_amounts: Option<CommissionBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub commission_rate: Option<BigDecimal>,
    pub total_earnings: BigDecimal,
    pub total_commission: BigDecimal,
    pub paid_commission: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub artist_commission_rate: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResellerLink {
    pub id: i64,
    pub code: String,
    pub reseller_id: i64,
    pub media_id: i64,
    pub status: String,
    pub custom_commission_rate: Option<BigDecimal>,
    pub conversion_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ResellerLink {
    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub reference: String,
    pub user_id: i64,
    pub media_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: String,
    pub status: String,
    pub is_reseller_sale: bool,
    pub reseller_link_id: Option<i64>,
    pub provider_reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn parsed_status(&self) -> anyhow::Result<TransactionStatus> {
        self.status.parse()
    }

    pub fn parsed_metadata(&self) -> Option<TransactionMetadata> {
        self.metadata
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// The breakdown frozen into metadata at creation time.
    pub fn breakdown(&self) -> Option<CommissionBreakdown> {
        self.parsed_metadata()
            .and_then(|meta| meta.calculated_amounts)
    }
}

/// Insert payload for a transaction row. The id is store-assigned.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub user_id: i64,
    pub media_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: String,
    pub is_reseller_sale: bool,
    pub reseller_link_id: Option<i64>,
    pub metadata: TransactionMetadata,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub transaction_id: i64,
    pub media_id: i64,
    pub reseller_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub commission_rate: BigDecimal,
    pub status: String,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentAccount {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub account_number: String,
    pub is_default: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PayoutTransaction {
    pub id: i64,
    pub payment_account_id: i64,
    pub transaction_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub reference: String,
    pub metadata: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CurrencyExchange {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: BigDecimal,
    pub last_updated: DateTime<Utc>,
}
