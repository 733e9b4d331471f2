use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfloor_shared::{ItemKey, OrderNumber};
use std::fmt;

/// Label reported for an item that is not on any order line.
pub const CANCELLED_STATUS: &str = "CANCELLED";

/// Status given to freshly entered lines.
pub const NEW_ITEM_STATUS: &str = "NEW";

/// Production stations in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Station {
    Engraving,
    Welding,
    #[serde(rename = "PC/Paint")]
    PcPaint,
    #[serde(rename = "Paint Fill")]
    PaintFill,
    Packaging,
}

impl Station {
    pub const PIPELINE: [Station; 5] = [
        Station::Engraving,
        Station::Welding,
        Station::PcPaint,
        Station::PaintFill,
        Station::Packaging,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Station::Engraving => "Engraving",
            Station::Welding => "Welding",
            Station::PcPaint => "PC/Paint",
            Station::PaintFill => "Paint Fill",
            Station::Packaging => "Packaging",
        }
    }

    /// Position in the pipeline, starting at 1
    pub fn position(&self) -> u8 {
        match self {
            Station::Engraving => 1,
            Station::Welding => 2,
            Station::PcPaint => 3,
            Station::PaintFill => 4,
            Station::Packaging => 5,
        }
    }

    pub fn from_name(name: &str) -> Option<Station> {
        Station::PIPELINE.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One nullable timestamp slot per station. A `None` slot means the station
/// has not been reached, never "reached at time zero".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStamps {
    pub engraving: Option<DateTime<Utc>>,
    pub welding: Option<DateTime<Utc>>,
    pub pc_paint: Option<DateTime<Utc>>,
    pub paint_fill: Option<DateTime<Utc>>,
    pub packaging: Option<DateTime<Utc>>,
}

impl StationStamps {
    pub fn get(&self, station: Station) -> Option<DateTime<Utc>> {
        match station {
            Station::Engraving => self.engraving,
            Station::Welding => self.welding,
            Station::PcPaint => self.pc_paint,
            Station::PaintFill => self.paint_fill,
            Station::Packaging => self.packaging,
        }
    }

    pub fn set(&mut self, station: Station, at: DateTime<Utc>) {
        let slot = match station {
            Station::Engraving => &mut self.engraving,
            Station::Welding => &mut self.welding,
            Station::PcPaint => &mut self.pc_paint,
            Station::PaintFill => &mut self.paint_fill,
            Station::Packaging => &mut self.packaging,
        };
        *slot = Some(at);
    }

    /// Full pipeline reset
    pub fn clear(&mut self) {
        *self = StationStamps::default();
    }

    pub fn is_empty(&self) -> bool {
        Station::PIPELINE.iter().all(|s| self.get(*s).is_none())
    }
}

/// Item status: a pipeline station, or a free-text label for everything
/// outside the five-station pipeline (shipping, holds, terminal states).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemStatus {
    Station(Station),
    Label(String),
}

impl ItemStatus {
    pub fn parse(label: &str) -> Self {
        match Station::from_name(label) {
            Some(station) => ItemStatus::Station(station),
            None => ItemStatus::Label(label.to_string()),
        }
    }

    pub fn station(&self) -> Option<Station> {
        match self {
            ItemStatus::Station(station) => Some(*station),
            ItemStatus::Label(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ItemStatus::Station(station) => station.name(),
            ItemStatus::Label(label) => label,
        }
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Label(NEW_ITEM_STATUS.to_string())
    }
}

impl From<Station> for ItemStatus {
    fn from(station: Station) -> Self {
        ItemStatus::Station(station)
    }
}

impl From<String> for ItemStatus {
    fn from(label: String) -> Self {
        ItemStatus::parse(&label)
    }
}

impl From<ItemStatus> for String {
    fn from(status: ItemStatus) -> Self {
        status.label().to_string()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Order header. Owns its items exclusively; items are stored separately and
/// keyed by `order_number`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_number: OrderNumber,
    pub approved: bool,
    pub cancelled: bool,
    pub product_total: Decimal,
    pub final_product_total: Decimal,
    pub grand_total: Decimal,
    pub final_grand_total: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub balance_due: Decimal,
    pub expected_net: Decimal,
    pub actual_net: Decimal,
    pub shipped_weight: Decimal,
    pub num_items: i32,
    pub back_orders_to_fill: bool,
    pub source_order_number: Option<OrderNumber>,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_number: OrderNumber) -> Self {
        let now = Utc::now();
        Self {
            order_number,
            approved: false,
            cancelled: false,
            product_total: Decimal::ZERO,
            final_product_total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            final_grand_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            balance_due: Decimal::ZERO,
            expected_net: Decimal::ZERO,
            actual_net: Decimal::ZERO,
            shipped_weight: Decimal::ZERO,
            num_items: 0,
            back_orders_to_fill: false,
            source_order_number: None,
            order_date: now,
            created_at: now,
        }
    }

    /// Header copy for a successor order: new number, running totals and
    /// approval reset, dated `at`, linked back to this order.
    pub fn successor(&self, order_number: OrderNumber, at: DateTime<Utc>) -> Self {
        Self {
            order_number,
            approved: false,
            cancelled: self.cancelled,
            product_total: Decimal::ZERO,
            final_product_total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            final_grand_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            balance_due: Decimal::ZERO,
            expected_net: Decimal::ZERO,
            actual_net: Decimal::ZERO,
            shipped_weight: Decimal::ZERO,
            num_items: 0,
            back_orders_to_fill: false,
            source_order_number: Some(self.order_number),
            order_date: at,
            created_at: at,
        }
    }

    pub fn apply_totals(&mut self, totals: &OrderTotals) {
        self.balance_due = totals.final_total;
        self.final_product_total = totals.final_total;
        self.final_grand_total = totals.final_total;
        self.shipped_weight = totals.shipped_weight;
        self.expected_net = totals.expected_net;
        self.actual_net = totals.actual_net;
    }
}

/// Aggregates written onto an order header after its items are (re)built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub final_total: Decimal,
    pub shipped_weight: Decimal,
    pub expected_net: Decimal,
    pub actual_net: Decimal,
}

/// A line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub order_number: OrderNumber,
    pub item_number: i32,
    pub sku: String,
    /// Non-physical line (shipping fee, discount). Never tracked through stations.
    pub adjustment: bool,
    pub quantity_ordered: i32,
    pub quantity_shipped: i32,
    pub quantity_returned: i32,
    pub quantity_needed: i32,
    pub price_per_unit: Decimal,
    pub cost_per_unit: Decimal,
    pub billed_subtotal: Decimal,
    pub shipped_subtotal: Decimal,
    pub final_subtotal: Option<Decimal>,
    pub actual_weight: Decimal,
    pub backordered: bool,
    pub status: ItemStatus,
    pub stations: StationStamps,
    pub shipped_at: Option<DateTime<Utc>>,
    pub detail_date: DateTime<Utc>,
    pub expected_ship_date: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn new(
        order_number: OrderNumber,
        item_number: i32,
        sku: String,
        quantity_ordered: i32,
        price_per_unit: Decimal,
        cost_per_unit: Decimal,
    ) -> Self {
        let billed = price_per_unit * Decimal::from(quantity_ordered);
        Self {
            order_number,
            item_number,
            sku,
            adjustment: false,
            quantity_ordered,
            quantity_shipped: 0,
            quantity_returned: 0,
            quantity_needed: quantity_ordered,
            price_per_unit,
            cost_per_unit,
            billed_subtotal: billed,
            shipped_subtotal: Decimal::ZERO,
            final_subtotal: None,
            actual_weight: Decimal::ZERO,
            backordered: quantity_ordered > 0,
            status: ItemStatus::default(),
            stations: StationStamps::default(),
            shipped_at: None,
            detail_date: Utc::now(),
            expected_ship_date: None,
        }
    }

    /// Adjustment line such as a shipping charge
    pub fn adjustment(order_number: OrderNumber, item_number: i32, sku: String, amount: Decimal) -> Self {
        Self {
            adjustment: true,
            quantity_ordered: 1,
            quantity_shipped: 1,
            quantity_needed: 0,
            backordered: false,
            billed_subtotal: amount,
            shipped_subtotal: amount,
            ..Self::new(order_number, item_number, sku, 1, amount, Decimal::ZERO)
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.order_number, self.item_number)
    }

    /// Ordered more than has shipped
    pub fn is_backordered(&self) -> bool {
        self.quantity_ordered > self.quantity_shipped
    }

    pub fn holds_quantity_invariant(&self) -> bool {
        self.quantity_ordered == self.quantity_shipped + self.quantity_needed
    }
}

/// Typed partial update of an order line. Only the fields listed here are
/// mutable through the repository; everything else is fixed at insert time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub status: Option<ItemStatus>,
    pub clear_stations: bool,
    pub stamp: Option<(Station, DateTime<Utc>)>,
    pub quantity_ordered: Option<i32>,
    pub quantity_shipped: Option<i32>,
    pub quantity_needed: Option<i32>,
    pub backordered: Option<bool>,
    pub billed_subtotal: Option<Decimal>,
    pub shipped_at: Option<Option<DateTime<Utc>>>,
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn clear_stations(mut self) -> Self {
        self.clear_stations = true;
        self
    }

    pub fn stamp(mut self, station: Station, at: DateTime<Utc>) -> Self {
        self.stamp = Some((station, at));
        self
    }

    pub fn quantity_ordered(mut self, quantity: i32) -> Self {
        self.quantity_ordered = Some(quantity);
        self
    }

    pub fn quantity_shipped(mut self, quantity: i32) -> Self {
        self.quantity_shipped = Some(quantity);
        self
    }

    pub fn quantity_needed(mut self, quantity: i32) -> Self {
        self.quantity_needed = Some(quantity);
        self
    }

    pub fn backordered(mut self, backordered: bool) -> Self {
        self.backordered = Some(backordered);
        self
    }

    pub fn billed_subtotal(mut self, subtotal: Decimal) -> Self {
        self.billed_subtotal = Some(subtotal);
        self
    }

    pub fn shipped_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.shipped_at = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == ItemUpdate::default()
    }

    /// Apply to an in-memory line. Station reset happens before the stamp so
    /// a rework followed by a stamp leaves exactly one slot set.
    pub fn apply(&self, item: &mut OrderItem) {
        if self.clear_stations {
            item.stations.clear();
        }
        if let Some(status) = &self.status {
            item.status = status.clone();
        }
        if let Some((station, at)) = self.stamp {
            item.stations.set(station, at);
        }
        if let Some(quantity) = self.quantity_ordered {
            item.quantity_ordered = quantity;
        }
        if let Some(quantity) = self.quantity_shipped {
            item.quantity_shipped = quantity;
        }
        if let Some(quantity) = self.quantity_needed {
            item.quantity_needed = quantity;
        }
        if let Some(backordered) = self.backordered {
            item.backordered = backordered;
        }
        if let Some(subtotal) = self.billed_subtotal {
            item.billed_subtotal = subtotal;
        }
        if let Some(at) = self.shipped_at {
            item.shipped_at = at;
        }
    }
}
