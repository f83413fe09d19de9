pub mod ledger;
pub mod payout;
pub mod rates;
pub mod settlement;

pub use ledger::TransactionLedger;
pub use payout::PayoutDistributor;
pub use rates::{RateApiClient, RateConverter};
pub use settlement::SettlementService;
