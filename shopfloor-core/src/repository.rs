use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfloor_shared::{ItemKey, OrderNumber};

use crate::audit::AuditSink;
use crate::models::{ItemUpdate, Order, OrderItem, OrderTotals, CANCELLED_STATUS};
use crate::{CoreError, CoreResult};

/// Entry point to order persistence. Every read and write happens inside a
/// unit of work obtained from `begin`; dropping it without `commit` rolls
/// everything back.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn OrderTransaction>>;
}

/// A single transaction against the order store.
///
/// Implementations must give `next_order_number` serializable semantics: two
/// concurrent transactions never observe the same number.
#[async_trait]
pub trait OrderTransaction: AuditSink + Send {
    async fn get_order(&mut self, order_number: OrderNumber) -> CoreResult<Option<Order>>;

    /// Lines of an order, ordered by item number
    async fn get_order_items(&mut self, order_number: OrderNumber) -> CoreResult<Vec<OrderItem>>;

    async fn get_item(&mut self, key: ItemKey) -> CoreResult<Option<OrderItem>>;

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()>;

    async fn insert_item(&mut self, item: &OrderItem) -> CoreResult<()>;

    async fn delete_item(&mut self, key: ItemKey) -> CoreResult<()>;

    /// Fails with `NotFound` when the line does not exist
    async fn update_item(&mut self, key: ItemKey, update: &ItemUpdate) -> CoreResult<()>;

    async fn update_order_totals(&mut self, order_number: OrderNumber, totals: &OrderTotals) -> CoreResult<()>;

    /// Allocate the next order number from the store's sequence
    async fn next_order_number(&mut self) -> CoreResult<OrderNumber>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;

    async fn is_approved(&mut self, order_number: OrderNumber) -> CoreResult<bool> {
        self.get_order(order_number)
            .await?
            .map(|order| order.approved)
            .ok_or_else(|| CoreError::order_not_found(order_number))
    }

    /// An order with no header record counts as cancelled
    async fn is_cancelled(&mut self, order_number: OrderNumber) -> CoreResult<bool> {
        Ok(self
            .get_order(order_number)
            .await?
            .map_or(true, |order| order.cancelled))
    }

    /// Stored status label, or `CANCELLED` when the line is gone
    async fn item_status(&mut self, key: ItemKey) -> CoreResult<String> {
        Ok(self
            .get_item(key)
            .await?
            .map(|item| item.status.label().to_string())
            .unwrap_or_else(|| CANCELLED_STATUS.to_string()))
    }
}

/// Open interval `(from, to)` of detail dates counted as sales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl SalesWindow {
    /// The `days` days leading up to `now`
    pub fn trailing(now: DateTime<Utc>, days: i64) -> CoreResult<Self> {
        let from = Duration::try_days(days)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| CoreError::ValidationError(format!("Sales window of {} days is out of range", days)))?;
        Ok(Self { from, to: now })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from < at && at < self.to
    }
}

/// One shipped non-adjustment line of an approved order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesLine {
    pub sku: String,
    pub quantity_shipped: i32,
    pub quantity_returned: i32,
    pub price_per_unit: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub detail_date: DateTime<Utc>,
}

#[async_trait]
pub trait SalesHistoryRepository: Send + Sync {
    async fn sales_lines(&self, window: &SalesWindow) -> CoreResult<Vec<SalesLine>>;
}

/// An item still waiting on production, with the order context the aging
/// report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackorderedLine {
    pub item: OrderItem,
    pub placed_at: DateTime<Utc>,
    pub order_product_total: Decimal,
}

#[async_trait]
pub trait BacklogRepository: Send + Sync {
    /// Non-adjustment lines with `quantity_needed > 0`
    async fn backordered_items(&self) -> CoreResult<Vec<BackorderedLine>>;
}
