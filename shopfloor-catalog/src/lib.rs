pub mod classifier;
pub mod sales;

pub use classifier::{SalesClassifier, Tier, TierThresholds};
pub use sales::{aggregate_sales, SalesRecord, SalesReport, SalesReporter, DEFAULT_WINDOW_DAYS};
