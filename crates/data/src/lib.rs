pub mod financial;
pub mod moneyflow;
pub mod selector;
pub mod throttle;

pub use financial::{FinancialFetcher, FinancialSource};
pub use moneyflow::{MoneyFlowFetcher, MoneyFlowSource, NorthFlowSource};
pub use selector::StockSelector;
pub use throttle::RandomDelay;
