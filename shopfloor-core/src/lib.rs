pub mod audit;
pub mod models;
pub mod repository;

pub use audit::{Actor, AuditNote, AuditSink, AuditSubject};
pub use models::{ItemStatus, ItemUpdate, Order, OrderItem, OrderTotals, Station, StationStamps};
pub use repository::{
    BacklogRepository, BackorderedLine, OrderStore, OrderTransaction, SalesHistoryRepository,
    SalesLine, SalesWindow,
};
pub use shopfloor_shared::{ItemKey, OrderNumber};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Order number {0} was already allocated")]
    AllocationConflict(OrderNumber),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Quantity invariant violated for item {key}: {detail}")]
    QuantityInvariantViolation { key: ItemKey, detail: String },
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    pub fn order_not_found(order_number: OrderNumber) -> Self {
        CoreError::NotFound {
            entity: "Order",
            key: order_number.to_string(),
        }
    }

    pub fn item_not_found(key: ItemKey) -> Self {
        CoreError::NotFound {
            entity: "Order item",
            key: key.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
