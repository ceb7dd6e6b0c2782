pub mod listing;
pub mod units;
