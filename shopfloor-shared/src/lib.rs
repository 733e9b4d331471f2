pub mod calendar;
pub mod keys;

pub use calendar::{business_days_between, business_days_since};
pub use keys::{ItemKey, KeyParseError, OrderNumber};
