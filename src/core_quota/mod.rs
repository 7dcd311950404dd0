// Transfer statistics and credit accounting fed by the transfer pipeline.

pub mod credits;
pub mod stats;

pub use credits::{CreditLedger, UserCredits};
pub use stats::{StatsSink, TransferStatsManager};
