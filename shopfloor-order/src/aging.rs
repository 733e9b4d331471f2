use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use shopfloor_core::{BacklogRepository, BackorderedLine, CoreResult, ItemKey, OrderNumber};
use shopfloor_shared::business_days_between;

use crate::tracker::{current_station, StationAge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Ok,
    Notice,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipBy {
    Unscheduled,
    OnTrack,
    DueToday,
    Late,
}

impl ShipBy {
    fn from_days_left(days_left: Option<i64>) -> Self {
        match days_left {
            None => ShipBy::Unscheduled,
            Some(0) => ShipBy::DueToday,
            Some(days) if days < 0 => ShipBy::Late,
            Some(_) => ShipBy::OnTrack,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ShipBy::OnTrack => Severity::Ok,
            ShipBy::Unscheduled | ShipBy::DueToday => Severity::Notice,
            ShipBy::Late => Severity::Alert,
        }
    }
}

/// Severity of an item sitting at its current station for `elapsed` business days
pub fn staleness(elapsed: i64) -> Severity {
    match elapsed {
        i64::MIN..=0 => Severity::Ok,
        1 => Severity::Notice,
        _ => Severity::Alert,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingRow {
    pub key: ItemKey,
    /// Scannable order string, e.g. `100102`
    pub order_string: String,
    pub sku: String,
    pub status: String,
    pub quantity_needed: i32,
    pub placed_at: DateTime<Utc>,
    pub expected_ship_date: Option<DateTime<Utc>>,
    pub days_left: Option<i64>,
    pub ship_by: ShipBy,
    pub ship_by_severity: Severity,
    pub station: StationAge,
    pub station_severity: Severity,
}

impl AgingRow {
    pub fn is_late(&self) -> bool {
        self.ship_by == ShipBy::Late
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgingSummary {
    pub backordered_orders: usize,
    pub backordered_items: usize,
    pub backordered_sets: i64,
    pub backordered_sales: Decimal,
    pub late_orders: usize,
    pub late_items: usize,
    pub late_sets: i64,
    pub late_sales: Decimal,
    pub late_orders_pct: f64,
    pub late_items_pct: f64,
    pub late_sets_pct: f64,
    pub late_sales_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<AgingRow>,
    pub summary: AgingSummary,
}

/// Build the backlog aging report as of `now`.
///
/// Rows are ordered by ship-by days left with unscheduled items first. When
/// `status` is given only items currently carrying that label are reported.
pub fn build_aging_report(lines: &[BackorderedLine], now: DateTime<Utc>, status: Option<&str>) -> AgingReport {
    let today = now.date_naive();

    let mut rows: Vec<AgingRow> = lines
        .iter()
        .filter(|line| !line.item.adjustment && line.item.quantity_needed > 0)
        .filter(|line| status.map_or(true, |s| line.item.status.label() == s))
        .map(|line| {
            let item = &line.item;
            let days_left = item
                .expected_ship_date
                .map(|due| business_days_between(today, due.date_naive()));
            let ship_by = ShipBy::from_days_left(days_left);
            let station = current_station(item, line.placed_at, now);
            let station_severity = staleness(station.elapsed_business_days);

            AgingRow {
                key: item.key(),
                order_string: item.key().to_string(),
                sku: item.sku.clone(),
                status: item.status.label().to_string(),
                quantity_needed: item.quantity_needed,
                placed_at: line.placed_at,
                expected_ship_date: item.expected_ship_date,
                days_left,
                ship_by,
                ship_by_severity: ship_by.severity(),
                station,
                station_severity,
            }
        })
        .collect();

    // None sorts before Some
    rows.sort_by_key(|row| (row.days_left, row.key));

    let summary = summarize(lines, &rows);
    debug!(rows = rows.len(), late = summary.late_items, "Aging report built");

    AgingReport {
        generated_at: now,
        rows,
        summary,
    }
}

fn summarize(lines: &[BackorderedLine], rows: &[AgingRow]) -> AgingSummary {
    let order_totals: BTreeMap<OrderNumber, Decimal> = lines
        .iter()
        .map(|line| (line.item.order_number, line.order_product_total))
        .collect();

    let mut orders = BTreeMap::new();
    let mut late_orders = BTreeMap::new();
    let mut summary = AgingSummary::default();

    for row in rows {
        let total = order_totals
            .get(&row.key.order_number)
            .copied()
            .unwrap_or_default();
        orders.insert(row.key.order_number, total);
        summary.backordered_items += 1;
        summary.backordered_sets += i64::from(row.quantity_needed);

        if row.is_late() {
            late_orders.insert(row.key.order_number, total);
            summary.late_items += 1;
            summary.late_sets += i64::from(row.quantity_needed);
        }
    }

    summary.backordered_orders = orders.len();
    summary.backordered_sales = orders.values().copied().sum();
    summary.late_orders = late_orders.len();
    summary.late_sales = late_orders.values().copied().sum();

    summary.late_orders_pct = percent(summary.late_orders as f64, summary.backordered_orders as f64);
    summary.late_items_pct = percent(summary.late_items as f64, summary.backordered_items as f64);
    summary.late_sets_pct = percent(summary.late_sets as f64, summary.backordered_sets as f64);
    summary.late_sales_pct = percent(
        summary.late_sales.to_f64().unwrap_or_default(),
        summary.backordered_sales.to_f64().unwrap_or_default(),
    );
    summary
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Reads the backlog and produces aging reports
pub struct AgingMonitor {
    backlog: Arc<dyn BacklogRepository>,
}

impl AgingMonitor {
    pub fn new(backlog: Arc<dyn BacklogRepository>) -> Self {
        Self { backlog }
    }

    pub async fn report(&self, now: DateTime<Utc>, status: Option<&str>) -> CoreResult<AgingReport> {
        let lines = self.backlog.backordered_items().await?;
        Ok(build_aging_report(&lines, now, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOrderStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use shopfloor_core::{ItemStatus, Order, OrderItem, Station};

    fn day(d: u32) -> DateTime<Utc> {
        // March 2024: the 4th is a Monday
        Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap()
    }

    fn line(order: OrderNumber, item: i32, needed: i32, due: Option<u32>, total: Decimal) -> BackorderedLine {
        let mut item = OrderItem::new(order, item, format!("SKU-{}", item), needed, dec!(10.00), dec!(3.00));
        item.expected_ship_date = due.map(day);
        BackorderedLine {
            item,
            placed_at: day(1),
            order_product_total: total,
        }
    }

    #[test]
    fn test_ship_by_classification() {
        assert_eq!(ShipBy::from_days_left(None).severity(), Severity::Notice);
        assert_eq!(ShipBy::from_days_left(Some(0)), ShipBy::DueToday);
        assert_eq!(ShipBy::from_days_left(Some(-2)).severity(), Severity::Alert);
        assert_eq!(ShipBy::from_days_left(Some(3)).severity(), Severity::Ok);
    }

    #[test]
    fn test_staleness_thresholds() {
        assert_eq!(staleness(0), Severity::Ok);
        assert_eq!(staleness(1), Severity::Notice);
        assert_eq!(staleness(4), Severity::Alert);
    }

    #[test]
    fn test_rows_sorted_unscheduled_first_then_days_left() {
        let lines = vec![
            line(1001, 1, 2, Some(11), dec!(100)),
            line(1002, 1, 1, None, dec!(50)),
            line(1003, 1, 4, Some(5), dec!(80)),
        ];
        let report = build_aging_report(&lines, day(7), None);

        let order: Vec<_> = report.rows.iter().map(|r| r.key.order_number).collect();
        assert_eq!(order, vec![1002, 1003, 1001]);
        // Thursday the 7th back to Tuesday the 5th
        assert_eq!(report.rows[1].days_left, Some(-2));
        assert!(report.rows[1].is_late());
        assert_eq!(report.rows[2].days_left, Some(2));
        assert_eq!(report.rows[0].ship_by, ShipBy::Unscheduled);
    }

    #[test]
    fn test_summary_counts_distinct_orders() {
        let lines = vec![
            line(1001, 1, 2, Some(5), dec!(100)),
            line(1001, 2, 3, Some(5), dec!(100)),
            line(1002, 1, 5, Some(20), dec!(300)),
        ];
        let summary = build_aging_report(&lines, day(7), None).summary;

        assert_eq!(summary.backordered_orders, 2);
        assert_eq!(summary.backordered_items, 3);
        assert_eq!(summary.backordered_sets, 10);
        assert_eq!(summary.backordered_sales, dec!(400));
        assert_eq!(summary.late_orders, 1);
        assert_eq!(summary.late_items, 2);
        assert_eq!(summary.late_sets, 5);
        assert_eq!(summary.late_sales, dec!(100));
        assert_eq!(summary.late_orders_pct, 50.0);
        assert_eq!(summary.late_sets_pct, 50.0);
        assert_eq!(summary.late_sales_pct, 25.0);
    }

    #[test]
    fn test_empty_backlog_has_zero_percentages() {
        let report = build_aging_report(&[], day(7), None);
        assert!(report.rows.is_empty());
        assert_eq!(report.summary, AgingSummary::default());
    }

    #[test]
    fn test_station_staleness_and_status_filter() {
        let mut welding = line(1001, 1, 2, Some(20), dec!(100));
        welding.item.status = ItemStatus::Station(Station::Welding);
        welding.item.stations.set(Station::Welding, day(4));
        let fresh = line(1001, 2, 1, Some(20), dec!(100));

        let report = build_aging_report(&[welding, fresh], day(5), Some("Welding"));
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.order_string, "100101");
        assert_eq!(row.station.station_name, "Welding");
        assert_eq!(row.station.elapsed_business_days, 1);
        assert_eq!(row.station_severity, Severity::Notice);
    }

    #[tokio::test]
    async fn test_monitor_reads_backlog_from_store() {
        let store = Arc::new(InMemoryOrderStore::new());
        let mut order = Order::new(1001);
        order.order_date = day(1);
        order.product_total = dec!(70.00);
        let mut done = OrderItem::new(1001, 1, "SIGN-01".to_string(), 2, dec!(10.00), dec!(3.00));
        done.quantity_shipped = 2;
        done.quantity_needed = 0;
        let waiting = OrderItem::new(1001, 2, "SIGN-02".to_string(), 5, dec!(10.00), dec!(3.00));
        store.seed_order(order, vec![done, waiting]).await;

        let monitor = AgingMonitor::new(store);
        let report = monitor.report(day(6), None).await.unwrap();

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].sku, "SIGN-02");
        assert_eq!(report.rows[0].station.station_name, "Status");
        assert_eq!(report.rows[0].station_severity, Severity::Alert);
        assert_eq!(report.summary.backordered_sales, dec!(70.00));
    }
}
