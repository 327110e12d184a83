pub mod ledger;
pub mod manager;
pub mod sizing;

pub use ledger::HoldingsSnapshot;
pub use manager::{Portfolio, PortfolioError};
pub use sizing::{FixedQuantity, Sizer};
