pub mod error;
pub mod models;
pub mod utils;

pub use error::{InsightError, Result};
pub use models::{
    north_trend_label, AnalysisResult, FinancialIndicators, MoneyFlowData, NorthFlowSummary,
};
