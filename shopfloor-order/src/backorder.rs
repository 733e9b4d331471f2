use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use shopfloor_core::{
    Actor, AuditNote, CoreError, CoreResult, ItemStatus, ItemUpdate, Order, OrderItem,
    OrderNumber, OrderStore, OrderTotals, OrderTransaction,
};

use crate::tracker::{order_wide_advance_in, AdvanceOptions};

/// Labels and markers the shipping flow writes and looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingPolicy {
    /// SKU of the adjustment line whose presence means "ready to ship"
    pub shipping_adjustment_sku: String,
    pub shipped_status: String,
    pub copy_note_author: String,
    pub copy_note_status: String,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            shipping_adjustment_sku: "Product".to_string(),
            shipped_status: "PREPARING TO SHIP!".to_string(),
            copy_note_author: "Shipping Dept".to_string(),
            copy_note_status: "Order Filled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    /// Nothing shipped yet
    Pending,
    /// Some units shipped, some still needed
    PartiallyShippable,
    /// Shipped portion stayed, the remainder moved to a successor order
    FullySplit,
    Shipped,
}

impl FulfillmentState {
    /// State derived from line quantities. `FullySplit` is never derived here;
    /// it is only reported by a shipment that created a successor.
    pub fn of(items: &[OrderItem]) -> Self {
        let mut lines = items.iter().filter(|item| !item.adjustment).peekable();
        if lines.peek().is_none() {
            return FulfillmentState::Pending;
        }

        let (mut any_shipped, mut any_needed) = (false, false);
        for line in lines {
            any_shipped |= line.quantity_shipped > 0;
            any_needed |= line.quantity_needed > 0;
        }

        match (any_shipped, any_needed) {
            (_, false) => FulfillmentState::Shipped,
            (true, true) => FulfillmentState::PartiallyShippable,
            (false, true) => FulfillmentState::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipOutcome {
    /// No shipping adjustment line yet; nothing was written
    NotReady {
        order_number: OrderNumber,
        state: FulfillmentState,
    },
    Shipped {
        order_number: OrderNumber,
        skus: Vec<String>,
        items: Vec<OrderItem>,
    },
    Split {
        source_order_number: OrderNumber,
        successor_order_number: OrderNumber,
        skus: Vec<String>,
        items: Vec<OrderItem>,
    },
}

impl ShipOutcome {
    pub fn state(&self) -> FulfillmentState {
        match self {
            ShipOutcome::NotReady { state, .. } => *state,
            ShipOutcome::Shipped { .. } => FulfillmentState::Shipped,
            ShipOutcome::Split { .. } => FulfillmentState::FullySplit,
        }
    }

    /// Order whose items were advanced to the shipped status
    pub fn target_order_number(&self) -> Option<OrderNumber> {
        match self {
            ShipOutcome::NotReady { .. } => None,
            ShipOutcome::Shipped { order_number, .. } => Some(*order_number),
            ShipOutcome::Split {
                successor_order_number,
                ..
            } => Some(*successor_order_number),
        }
    }

    pub fn skus(&self) -> &[String] {
        match self {
            ShipOutcome::NotReady { .. } => &[],
            ShipOutcome::Shipped { skus, .. } | ShipOutcome::Split { skus, .. } => skus,
        }
    }
}

/// Ships orders and moves unfilled quantities onto successor orders
pub struct BackorderSplitter {
    store: Arc<dyn OrderStore>,
    policy: ShippingPolicy,
}

impl BackorderSplitter {
    pub fn new(store: Arc<dyn OrderStore>, policy: ShippingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ShippingPolicy {
        &self.policy
    }

    /// Ship an order once its shipping adjustment line is present.
    ///
    /// Approved orders keep what has shipped; backordered quantities move to a
    /// new order which then becomes the one advanced to the shipped status.
    /// Everything commits together or not at all.
    pub async fn mark_shipped(
        &self,
        order_number: OrderNumber,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> CoreResult<ShipOutcome> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .get_order(order_number)
            .await?
            .ok_or_else(|| CoreError::order_not_found(order_number))?;
        if order.cancelled {
            return Err(CoreError::ValidationError(format!(
                "Order {} is cancelled and cannot ship",
                order_number
            )));
        }

        let items = tx.get_order_items(order_number).await?;
        let Some(marker) = items
            .iter()
            .find(|item| item.adjustment && item.sku == self.policy.shipping_adjustment_sku)
        else {
            let state = FulfillmentState::of(&items);
            warn!(order_number, ?state, "Order has no shipping adjustment yet");
            return Ok(ShipOutcome::NotReady { order_number, state });
        };
        tx.delete_item(marker.key()).await?;

        let mut successor = None;
        if order.approved {
            let remainder = extract_backordered_items(tx.as_mut(), order_number, at).await?;
            if !remainder.is_empty() {
                let number = create_successor_in(tx.as_mut(), &order, &remainder, at, &self.policy).await?;
                successor = Some(number);
            }
        }

        let target = successor.unwrap_or(order_number);
        fill_backorder_in(tx.as_mut(), target, at).await?;

        let status = ItemStatus::parse(&self.policy.shipped_status);
        let advanced =
            order_wide_advance_in(tx.as_mut(), target, &status, at, actor, &AdvanceOptions::default()).await?;

        tx.commit().await?;

        info!(order_number, target, skus = ?advanced.skus, "Order shipped");
        Ok(match successor {
            Some(successor_order_number) => ShipOutcome::Split {
                source_order_number: order_number,
                successor_order_number,
                skus: advanced.skus,
                items: advanced.items,
            },
            None => ShipOutcome::Shipped {
                order_number,
                skus: advanced.skus,
                items: advanced.items,
            },
        })
    }

    /// Copy `remainder` onto a freshly numbered successor of `source_order_number`
    pub async fn create_successor_order(
        &self,
        source_order_number: OrderNumber,
        remainder: &[OrderItem],
        at: DateTime<Utc>,
    ) -> CoreResult<OrderNumber> {
        let mut tx = self.store.begin().await?;
        let source = tx
            .get_order(source_order_number)
            .await?
            .ok_or_else(|| CoreError::order_not_found(source_order_number))?;
        let number = create_successor_in(tx.as_mut(), &source, remainder, at, &self.policy).await?;
        tx.commit().await?;
        Ok(number)
    }
}

/// Split the unfilled part off every backordered line of `order_number`.
///
/// Returns the remainder lines, still keyed under the source order. The
/// source lines are settled in place: nothing left needed, shipped date
/// stamped, backordered lines reduced to what shipped and re-billed. Source
/// totals are recomputed from the settled lines.
pub async fn extract_backordered_items(
    tx: &mut dyn OrderTransaction,
    order_number: OrderNumber,
    at: DateTime<Utc>,
) -> CoreResult<Vec<OrderItem>> {
    let items = tx.get_order_items(order_number).await?;
    let mut remainder = Vec::new();

    for item in items.iter().filter(|item| !item.adjustment) {
        let backordered = item.quantity_ordered > item.quantity_shipped;
        let moved = if backordered { item.quantity_needed } else { 0 };
        if moved + item.quantity_shipped != item.quantity_ordered {
            warn!(item = %item.key(), ordered = item.quantity_ordered, shipped = item.quantity_shipped, needed = item.quantity_needed, "Quantities do not balance");
            return Err(CoreError::QuantityInvariantViolation {
                key: item.key(),
                detail: format!(
                    "moved {} + shipped {} != ordered {}",
                    moved, item.quantity_shipped, item.quantity_ordered
                ),
            });
        }

        let mut update = ItemUpdate::new()
            .quantity_needed(0)
            .backordered(false)
            .shipped_at(Some(at));
        if backordered {
            update = update
                .quantity_ordered(item.quantity_shipped)
                .billed_subtotal(item.price_per_unit * Decimal::from(item.quantity_shipped));
            remainder.push(remainder_line(item));
        }
        tx.update_item(item.key(), &update).await?;
    }

    let settled = tx.get_order_items(order_number).await?;
    verify_quantities(&settled)?;
    tx.update_order_totals(order_number, &accumulate_totals(&settled))
        .await?;

    Ok(remainder)
}

fn remainder_line(item: &OrderItem) -> OrderItem {
    let billed = item.price_per_unit * Decimal::from(item.quantity_needed);
    OrderItem {
        quantity_ordered: item.quantity_needed,
        quantity_shipped: item.quantity_needed,
        quantity_needed: 0,
        backordered: false,
        billed_subtotal: billed,
        shipped_subtotal: billed,
        final_subtotal: None,
        shipped_at: None,
        ..item.clone()
    }
}

pub(crate) async fn create_successor_in(
    tx: &mut dyn OrderTransaction,
    source: &Order,
    remainder: &[OrderItem],
    at: DateTime<Utc>,
    policy: &ShippingPolicy,
) -> CoreResult<OrderNumber> {
    let number = tx.next_order_number().await?;
    tx.insert_order(&source.successor(number, at)).await?;

    tx.append_note(&AuditNote::for_order(
        number,
        format!("Copied from Order #{}", source.order_number),
        &policy.copy_note_author,
        &policy.copy_note_status,
        at,
    ))
    .await?;
    tx.append_note(&AuditNote::for_order(
        source.order_number,
        format!("Copied to Order #{}", number),
        &policy.copy_note_author,
        &policy.copy_note_status,
        at,
    ))
    .await?;

    let mut copied = Vec::with_capacity(remainder.len());
    for line in remainder {
        let item = OrderItem {
            order_number: number,
            detail_date: at,
            ..line.clone()
        };
        tx.insert_item(&item).await?;
        copied.push(item);
    }

    verify_quantities(&copied)?;
    tx.update_order_totals(number, &accumulate_totals(&copied))
        .await?;

    info!(source = source.order_number, successor = number, lines = copied.len(), "Successor order created");
    Ok(number)
}

/// Mark every physical line of `order_number` as completely shipped
pub(crate) async fn fill_backorder_in(
    tx: &mut dyn OrderTransaction,
    order_number: OrderNumber,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    let items = tx.get_order_items(order_number).await?;
    for item in items.iter().filter(|item| !item.adjustment) {
        let update = ItemUpdate::new()
            .quantity_shipped(item.quantity_ordered)
            .quantity_needed(0)
            .backordered(false)
            .shipped_at(Some(at));
        tx.update_item(item.key(), &update).await?;
    }
    Ok(())
}

/// Order totals accumulated over every line, adjustments included
pub fn accumulate_totals(items: &[OrderItem]) -> OrderTotals {
    let mut totals = OrderTotals::default();
    for item in items {
        totals.final_total += item.billed_subtotal;
        totals.shipped_weight += item.actual_weight + Decimal::from(item.quantity_shipped);
        totals.actual_net -= (item.cost_per_unit * Decimal::from(item.quantity_ordered)).abs();
    }
    totals.expected_net = totals.final_total + totals.actual_net;
    totals
}

fn verify_quantities(items: &[OrderItem]) -> CoreResult<()> {
    match items
        .iter()
        .find(|item| !item.adjustment && !item.holds_quantity_invariant())
    {
        Some(item) => Err(CoreError::QuantityInvariantViolation {
            key: item.key(),
            detail: format!(
                "ordered {} != shipped {} + needed {}",
                item.quantity_ordered, item.quantity_shipped, item.quantity_needed
            ),
        }),
        None => Ok(()),
    }
}
