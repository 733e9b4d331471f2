use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use shopfloor_core::{
    Actor, AuditNote, CoreError, CoreResult, ItemKey, ItemStatus, ItemUpdate, OrderItem,
    OrderNumber, OrderStore, OrderTransaction, Station, StationStamps,
};
use shopfloor_shared::business_days_between;

/// Marker reported when no station slot qualifies
pub const STATUS_MARKER: &str = "Status";

/// Sorts after Packaging
pub const STATUS_MARKER_ORDINAL: u8 = 6;

type SlotAccessor = fn(&StationStamps) -> Option<DateTime<Utc>>;

/// Stations in pipeline order with their timestamp slot. The current-station
/// scan walks this table; on equal timestamps the later entry wins.
const PIPELINE_SLOTS: [(Station, SlotAccessor); 5] = [
    (Station::Engraving, |s| s.engraving),
    (Station::Welding, |s| s.welding),
    (Station::PcPaint, |s| s.pc_paint),
    (Station::PaintFill, |s| s.paint_fill),
    (Station::Packaging, |s| s.packaging),
];

/// Where an item sits and for how long
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationAge {
    pub elapsed_business_days: i64,
    pub station_name: &'static str,
    pub ordinal: u8,
    pub station: Option<Station>,
    pub since: DateTime<Utc>,
}

/// Current station of `item` and the business days spent there as of `now`.
///
/// The latest-dated slot wins regardless of pipeline position. A slot only
/// counts when it is later than the start of the placed date; with no such
/// slot the item is reported at the `Status` marker, aged from the placed date.
pub fn current_station(item: &OrderItem, placed_at: DateTime<Utc>, now: DateTime<Utc>) -> StationAge {
    let baseline = placed_at.date_naive().and_time(NaiveTime::MIN).and_utc();

    let mut current: Option<(Station, DateTime<Utc>)> = None;
    for (station, slot) in PIPELINE_SLOTS {
        let Some(at) = slot(&item.stations) else {
            continue;
        };
        let wins = match current {
            None => at > baseline,
            Some((_, latest)) => at >= latest,
        };
        if wins {
            current = Some((station, at));
        }
    }

    match current {
        Some((station, since)) => StationAge {
            elapsed_business_days: business_days_between(since.date_naive(), now.date_naive()),
            station_name: station.name(),
            ordinal: station.position(),
            station: Some(station),
            since,
        },
        None => StationAge {
            elapsed_business_days: business_days_between(baseline.date_naive(), now.date_naive()),
            station_name: STATUS_MARKER,
            ordinal: STATUS_MARKER_ORDINAL,
            station: None,
            since: baseline,
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceOptions {
    /// Clear every station slot first and tag the note `REWORK`
    pub rework: bool,
    pub note: String,
}

impl AdvanceOptions {
    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            rework: false,
            note: note.into(),
        }
    }

    pub fn rework(note: impl Into<String>) -> Self {
        Self {
            rework: true,
            note: note.into(),
        }
    }
}

/// Result of advancing every line of an order
#[derive(Debug, Clone, Serialize)]
pub struct OrderAdvance {
    pub order_number: OrderNumber,
    pub skus: Vec<String>,
    pub items: Vec<OrderItem>,
}

/// Records station visits and status changes on order items
pub struct StationTracker {
    store: Arc<dyn OrderStore>,
}

impl StationTracker {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Move one item to `status`, stamping the station slot when `status` is
    /// a pipeline station. The status write and its audit note commit together.
    pub async fn advance(
        &self,
        key: ItemKey,
        status: &ItemStatus,
        at: DateTime<Utc>,
        actor: &Actor,
        options: &AdvanceOptions,
    ) -> CoreResult<OrderItem> {
        let mut tx = self.store.begin().await?;
        let item = advance_in(tx.as_mut(), key, status, at, actor, options).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Advance every non-adjustment item of an order inside one transaction
    pub async fn order_wide_advance(
        &self,
        order_number: OrderNumber,
        status: &ItemStatus,
        at: DateTime<Utc>,
        actor: &Actor,
        options: &AdvanceOptions,
    ) -> CoreResult<OrderAdvance> {
        let mut tx = self.store.begin().await?;
        let advanced = order_wide_advance_in(tx.as_mut(), order_number, status, at, actor, options).await?;
        tx.commit().await?;
        Ok(advanced)
    }

    /// Stored status label, `CANCELLED` for lines that no longer exist
    pub async fn item_status(&self, key: ItemKey) -> CoreResult<String> {
        let mut tx = self.store.begin().await?;
        let status = tx.item_status(key).await?;
        Ok(status)
    }

    /// Current station of a stored item, aged from its order's placed date
    pub async fn item_age(&self, key: ItemKey, now: DateTime<Utc>) -> CoreResult<StationAge> {
        let mut tx = self.store.begin().await?;
        let item = tx
            .get_item(key)
            .await?
            .ok_or_else(|| CoreError::item_not_found(key))?;
        let order = tx
            .get_order(key.order_number)
            .await?
            .ok_or_else(|| CoreError::order_not_found(key.order_number))?;

        let age = current_station(&item, order.order_date, now);
        debug!(item = %key, station = age.station_name, days = age.elapsed_business_days, "Station age");
        Ok(age)
    }
}

pub(crate) async fn advance_in(
    tx: &mut dyn OrderTransaction,
    key: ItemKey,
    status: &ItemStatus,
    at: DateTime<Utc>,
    actor: &Actor,
    options: &AdvanceOptions,
) -> CoreResult<OrderItem> {
    let mut item = tx
        .get_item(key)
        .await?
        .ok_or_else(|| CoreError::item_not_found(key))?;

    if item.adjustment {
        return Err(CoreError::ValidationError(format!(
            "Adjustment line {} is not tracked through stations",
            key
        )));
    }

    let mut update = ItemUpdate::new();
    let mut note = options.note.clone();
    if options.rework {
        update = update.clear_stations();
        note = format!("REWORK {}", note);
    }
    update = update.status(status.clone());
    if let Some(station) = status.station() {
        update = update.stamp(station, at);
    }

    tx.update_item(key, &update).await?;
    update.apply(&mut item);

    let text = format!("Item {} in {} {}", key.item_number, status, note)
        .trim_end()
        .to_string();
    tx.append_note(&AuditNote::for_item(key, text, actor, status.label(), at))
        .await?;

    info!(item = %key, status = %status, rework = options.rework, by = %actor.initials, "Item advanced");
    Ok(item)
}

pub(crate) async fn order_wide_advance_in(
    tx: &mut dyn OrderTransaction,
    order_number: OrderNumber,
    status: &ItemStatus,
    at: DateTime<Utc>,
    actor: &Actor,
    options: &AdvanceOptions,
) -> CoreResult<OrderAdvance> {
    if tx.get_order(order_number).await?.is_none() {
        return Err(CoreError::order_not_found(order_number));
    }

    let lines = tx.get_order_items(order_number).await?;
    let mut skus = Vec::new();
    let mut items = Vec::new();
    for line in lines.iter().filter(|line| !line.adjustment) {
        let item = advance_in(&mut *tx, line.key(), status, at, actor, options).await?;
        skus.push(item.sku.clone());
        items.push(item);
    }

    Ok(OrderAdvance {
        order_number,
        skus,
        items,
    })
}
