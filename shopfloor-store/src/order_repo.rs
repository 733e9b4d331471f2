use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use shopfloor_core::{
    AuditNote, AuditSink, BacklogRepository, BackorderedLine, CoreError, CoreResult, ItemKey,
    ItemStatus, ItemUpdate, Order, OrderItem, OrderNumber, OrderStore, OrderTotals,
    OrderTransaction, SalesHistoryRepository, SalesLine, SalesWindow, Station, StationStamps,
};

const ORDER_COLUMNS: &str = "order_number, approved, cancelled, product_total, final_product_total, \
     grand_total, final_grand_total, shipping_total, tax_total, balance_due, expected_net, actual_net, \
     shipped_weight, num_items, back_orders_to_fill, source_order_number, order_date, created_at";

const ITEM_COLUMNS: &str = "d.order_number, d.item_number, d.sku, d.adjustment, d.quantity_ordered, \
     d.quantity_shipped, d.quantity_returned, d.quantity_needed, \
     COALESCE(d.price_per_unit, 0) AS price_per_unit, COALESCE(d.cost_per_unit, 0) AS cost_per_unit, \
     d.billed_subtotal, d.shipped_subtotal, d.final_subtotal, d.actual_weight, d.backordered, d.status, \
     d.engraving_at, d.welding_at, d.pc_paint_at, d.paint_fill_at, d.packaging_at, d.shipped_at, \
     d.detail_date, d.expected_ship_date";

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_number: i64,
    approved: bool,
    cancelled: bool,
    product_total: Decimal,
    final_product_total: Decimal,
    grand_total: Decimal,
    final_grand_total: Decimal,
    shipping_total: Decimal,
    tax_total: Decimal,
    balance_due: Decimal,
    expected_net: Decimal,
    actual_net: Decimal,
    shipped_weight: Decimal,
    num_items: i32,
    back_orders_to_fill: bool,
    source_order_number: Option<i64>,
    order_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            order_number: row.order_number,
            approved: row.approved,
            cancelled: row.cancelled,
            product_total: row.product_total,
            final_product_total: row.final_product_total,
            grand_total: row.grand_total,
            final_grand_total: row.final_grand_total,
            shipping_total: row.shipping_total,
            tax_total: row.tax_total,
            balance_due: row.balance_due,
            expected_net: row.expected_net,
            actual_net: row.actual_net,
            shipped_weight: row.shipped_weight,
            num_items: row.num_items,
            back_orders_to_fill: row.back_orders_to_fill,
            source_order_number: row.source_order_number,
            order_date: row.order_date,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_number: i64,
    item_number: i32,
    sku: String,
    adjustment: bool,
    quantity_ordered: i32,
    quantity_shipped: i32,
    quantity_returned: i32,
    quantity_needed: i32,
    price_per_unit: Decimal,
    cost_per_unit: Decimal,
    billed_subtotal: Decimal,
    shipped_subtotal: Decimal,
    final_subtotal: Option<Decimal>,
    actual_weight: Decimal,
    backordered: bool,
    status: String,
    engraving_at: Option<DateTime<Utc>>,
    welding_at: Option<DateTime<Utc>>,
    pc_paint_at: Option<DateTime<Utc>>,
    paint_fill_at: Option<DateTime<Utc>>,
    packaging_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    detail_date: DateTime<Utc>,
    expected_ship_date: Option<DateTime<Utc>>,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            order_number: row.order_number,
            item_number: row.item_number,
            sku: row.sku,
            adjustment: row.adjustment,
            quantity_ordered: row.quantity_ordered,
            quantity_shipped: row.quantity_shipped,
            quantity_returned: row.quantity_returned,
            quantity_needed: row.quantity_needed,
            price_per_unit: row.price_per_unit,
            cost_per_unit: row.cost_per_unit,
            billed_subtotal: row.billed_subtotal,
            shipped_subtotal: row.shipped_subtotal,
            final_subtotal: row.final_subtotal,
            actual_weight: row.actual_weight,
            backordered: row.backordered,
            status: ItemStatus::parse(&row.status),
            stations: StationStamps {
                engraving: row.engraving_at,
                welding: row.welding_at,
                pc_paint: row.pc_paint_at,
                paint_fill: row.paint_fill_at,
                packaging: row.packaging_at,
            },
            shipped_at: row.shipped_at,
            detail_date: row.detail_date,
            expected_ship_date: row.expected_ship_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BacklogRow {
    #[sqlx(flatten)]
    item: ItemRow,
    placed_at: DateTime<Utc>,
    order_product_total: Decimal,
}

#[derive(sqlx::FromRow)]
struct SalesRow {
    sku: String,
    quantity_shipped: i32,
    quantity_returned: i32,
    price_per_unit: Option<Decimal>,
    cost_per_unit: Option<Decimal>,
    detail_date: DateTime<Utc>,
}

fn station_column(station: Station) -> &'static str {
    match station {
        Station::Engraving => "engraving_at",
        Station::Welding => "welding_at",
        Station::PcPaint => "pc_paint_at",
        Station::PaintFill => "paint_fill_at",
        Station::Packaging => "packaging_at",
    }
}

fn storage(e: sqlx::Error) -> CoreError {
    CoreError::StorageError(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Postgres-backed order store
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn begin(&self) -> CoreResult<Box<dyn OrderTransaction>> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(Box::new(PgOrderTransaction { tx }))
    }
}

/// Wraps a live sqlx transaction; dropping it without `commit` rolls back
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AuditSink for PgOrderTransaction {
    async fn append_note(&mut self, note: &AuditNote) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_notes (id, order_number, item_number, text, author, status_label, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(note.id)
        .bind(note.subject.order_number())
        .bind(note.subject.item_number())
        .bind(&note.text)
        .bind(&note.author)
        .bind(&note.status_label)
        .bind(note.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn get_order(&mut self, order_number: OrderNumber) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE order_number = $1",
            ORDER_COLUMNS
        ))
        .bind(order_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(row.map(Order::from))
    }

    async fn get_order_items(&mut self, order_number: OrderNumber) -> CoreResult<Vec<OrderItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM order_items d WHERE d.order_number = $1 ORDER BY d.item_number",
            ITEM_COLUMNS
        ))
        .bind(order_number)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn get_item(&mut self, key: ItemKey) -> CoreResult<Option<OrderItem>> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM order_items d WHERE d.order_number = $1 AND d.item_number = $2",
            ITEM_COLUMNS
        ))
        .bind(key.order_number)
        .bind(key.item_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(row.map(OrderItem::from))
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            ORDER_COLUMNS
        ))
        .bind(order.order_number)
        .bind(order.approved)
        .bind(order.cancelled)
        .bind(order.product_total)
        .bind(order.final_product_total)
        .bind(order.grand_total)
        .bind(order.final_grand_total)
        .bind(order.shipping_total)
        .bind(order.tax_total)
        .bind(order.balance_due)
        .bind(order.expected_net)
        .bind(order.actual_net)
        .bind(order.shipped_weight)
        .bind(order.num_items)
        .bind(order.back_orders_to_fill)
        .bind(order.source_order_number)
        .bind(order.order_date)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::AllocationConflict(order.order_number)
            } else {
                storage(e)
            }
        })?;
        Ok(())
    }

    async fn insert_item(&mut self, item: &OrderItem) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_number, item_number, sku, adjustment, quantity_ordered,
                quantity_shipped, quantity_returned, quantity_needed, price_per_unit, cost_per_unit,
                billed_subtotal, shipped_subtotal, final_subtotal, actual_weight, backordered, status,
                engraving_at, welding_at, pc_paint_at, paint_fill_at, packaging_at, shipped_at,
                detail_date, expected_ship_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(item.order_number)
        .bind(item.item_number)
        .bind(&item.sku)
        .bind(item.adjustment)
        .bind(item.quantity_ordered)
        .bind(item.quantity_shipped)
        .bind(item.quantity_returned)
        .bind(item.quantity_needed)
        .bind(item.price_per_unit)
        .bind(item.cost_per_unit)
        .bind(item.billed_subtotal)
        .bind(item.shipped_subtotal)
        .bind(item.final_subtotal)
        .bind(item.actual_weight)
        .bind(item.backordered)
        .bind(item.status.label())
        .bind(item.stations.engraving)
        .bind(item.stations.welding)
        .bind(item.stations.pc_paint)
        .bind(item.stations.paint_fill)
        .bind(item.stations.packaging)
        .bind(item.shipped_at)
        .bind(item.detail_date)
        .bind(item.expected_ship_date)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn delete_item(&mut self, key: ItemKey) -> CoreResult<()> {
        sqlx::query("DELETE FROM order_items WHERE order_number = $1 AND item_number = $2")
            .bind(key.order_number)
            .bind(key.item_number)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn update_item(&mut self, key: ItemKey, update: &ItemUpdate) -> CoreResult<()> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE order_items SET ");
        push_item_update(&mut qb, update);
        qb.push(" WHERE order_number = ")
            .push_bind(key.order_number)
            .push(" AND item_number = ")
            .push_bind(key.item_number);

        let result = qb.build().execute(&mut *self.tx).await.map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::item_not_found(key));
        }
        debug!(item = %key, "Order item updated");
        Ok(())
    }

    async fn update_order_totals(&mut self, order_number: OrderNumber, totals: &OrderTotals) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET balance_due = $1, final_product_total = $1, final_grand_total = $1,
                shipped_weight = $2, expected_net = $3, actual_net = $4
            WHERE order_number = $5
            "#,
        )
        .bind(totals.final_total)
        .bind(totals.shipped_weight)
        .bind(totals.expected_net)
        .bind(totals.actual_net)
        .bind(order_number)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::order_not_found(order_number));
        }
        Ok(())
    }

    async fn next_order_number(&mut self) -> CoreResult<OrderNumber> {
        let (number,): (i64,) = sqlx::query_as("SELECT nextval('order_number_seq')")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(number)
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let PgOrderTransaction { tx } = *self;
        tx.commit().await.map_err(storage)
    }
}

/// SET clause for an item update. The item key is always rewritten onto
/// itself so the statement stays valid when the update is empty.
fn push_item_update(qb: &mut QueryBuilder<'_, Postgres>, update: &ItemUpdate) {
    let mut set = qb.separated(", ");
    set.push("item_number = item_number");

    if let Some(status) = &update.status {
        set.push("status = ").push_bind_unseparated(status.label().to_string());
    }
    for station in Station::PIPELINE {
        let column = station_column(station);
        match update.stamp {
            Some((stamped, at)) if stamped == station => {
                set.push(format!("{} = ", column)).push_bind_unseparated(at);
            }
            _ if update.clear_stations => {
                set.push(format!("{} = NULL", column));
            }
            _ => {}
        }
    }
    if let Some(quantity) = update.quantity_ordered {
        set.push("quantity_ordered = ").push_bind_unseparated(quantity);
    }
    if let Some(quantity) = update.quantity_shipped {
        set.push("quantity_shipped = ").push_bind_unseparated(quantity);
    }
    if let Some(quantity) = update.quantity_needed {
        set.push("quantity_needed = ").push_bind_unseparated(quantity);
    }
    if let Some(backordered) = update.backordered {
        set.push("backordered = ").push_bind_unseparated(backordered);
    }
    if let Some(subtotal) = update.billed_subtotal {
        set.push("billed_subtotal = ").push_bind_unseparated(subtotal);
    }
    if let Some(at) = update.shipped_at {
        set.push("shipped_at = ").push_bind_unseparated(at);
    }
}

#[async_trait]
impl BacklogRepository for PgOrderStore {
    async fn backordered_items(&self) -> CoreResult<Vec<BackorderedLine>> {
        let rows: Vec<BacklogRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}, o.order_date AS placed_at, o.product_total AS order_product_total
            FROM order_items d
            JOIN orders o ON o.order_number = d.order_number
            WHERE NOT d.adjustment AND d.quantity_needed > 0
            ORDER BY d.order_number, d.item_number
            "#,
            ITEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| BackorderedLine {
                item: row.item.into(),
                placed_at: row.placed_at,
                order_product_total: row.order_product_total,
            })
            .collect())
    }
}

#[async_trait]
impl SalesHistoryRepository for PgOrderStore {
    async fn sales_lines(&self, window: &SalesWindow) -> CoreResult<Vec<SalesLine>> {
        let rows: Vec<SalesRow> = sqlx::query_as(
            r#"
            SELECT d.sku, d.quantity_shipped, d.quantity_returned, d.price_per_unit, d.cost_per_unit, d.detail_date
            FROM order_items d
            JOIN orders o ON o.order_number = d.order_number
            WHERE o.approved AND NOT d.adjustment AND d.detail_date > $1 AND d.detail_date < $2
            "#,
        )
        .bind(window.from)
        .bind(window.to)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| SalesLine {
                sku: row.sku,
                quantity_shipped: row.quantity_shipped,
                quantity_returned: row.quantity_returned,
                price_per_unit: row.price_per_unit,
                cost_per_unit: row.cost_per_unit,
                detail_date: row.detail_date,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rework_with_stamp_assigns_each_column_once() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let update = ItemUpdate::new()
            .clear_stations()
            .status(Station::Welding.into())
            .stamp(Station::Welding, at);

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE order_items SET ");
        push_item_update(&mut qb, &update);
        let sql = qb.sql().to_string();

        assert_eq!(sql.matches("welding_at").count(), 1);
        assert!(sql.contains("welding_at = $2"));
        assert!(sql.contains("engraving_at = NULL"));
        assert!(sql.contains("packaging_at = NULL"));
    }

    #[test]
    fn test_empty_update_is_still_valid_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE order_items SET ");
        push_item_update(&mut qb, &ItemUpdate::new());
        assert_eq!(qb.sql(), "UPDATE order_items SET item_number = item_number");
    }

    #[test]
    fn test_item_row_maps_station_columns() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let row = ItemRow {
            order_number: 1001,
            item_number: 2,
            sku: "SIGN-02".to_string(),
            adjustment: false,
            quantity_ordered: 3,
            quantity_shipped: 1,
            quantity_returned: 0,
            quantity_needed: 2,
            price_per_unit: Decimal::new(1500, 2),
            cost_per_unit: Decimal::new(600, 2),
            billed_subtotal: Decimal::new(4500, 2),
            shipped_subtotal: Decimal::ZERO,
            final_subtotal: None,
            actual_weight: Decimal::ZERO,
            backordered: true,
            status: "Paint Fill".to_string(),
            engraving_at: None,
            welding_at: None,
            pc_paint_at: None,
            paint_fill_at: Some(at),
            packaging_at: None,
            shipped_at: None,
            detail_date: at,
            expected_ship_date: None,
        };

        let item = OrderItem::from(row);
        assert_eq!(item.key(), ItemKey::new(1001, 2));
        assert_eq!(item.status, ItemStatus::Station(Station::PaintFill));
        assert_eq!(item.stations.get(Station::PaintFill), Some(at));
        assert!(item.holds_quantity_invariant());
    }
}
