pub mod aging;
pub mod backorder;
pub mod memory;
pub mod tracker;

pub use aging::{AgingMonitor, AgingReport, AgingRow, AgingSummary, Severity, ShipBy};
pub use backorder::{
    accumulate_totals, extract_backordered_items, BackorderSplitter, FulfillmentState, ShipOutcome,
    ShippingPolicy,
};
pub use memory::InMemoryOrderStore;
pub use tracker::{current_station, AdvanceOptions, OrderAdvance, StationAge, StationTracker};
