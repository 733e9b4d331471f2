use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use shopfloor_core::{
    AuditNote, AuditSink, BacklogRepository, BackorderedLine, CoreError, CoreResult, ItemKey,
    ItemUpdate, Order, OrderItem, OrderNumber, OrderStore, OrderTotals, OrderTransaction,
    SalesHistoryRepository, SalesLine, SalesWindow,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: BTreeMap<OrderNumber, Order>,
    items: BTreeMap<ItemKey, OrderItem>,
    notes: Vec<AuditNote>,
    last_order_number: OrderNumber,
}

/// In-memory order store (tests and local runs).
///
/// A transaction holds the store lock from `begin` until it is committed or
/// dropped and works on a private copy, so transactions are serialized and an
/// uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose sequence continues after `last_order_number`
    pub fn starting_after(last_order_number: OrderNumber) -> Self {
        let state = MemoryState {
            last_order_number,
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn seed_order(&self, order: Order, items: Vec<OrderItem>) {
        let mut state = self.state.lock().await;
        state.last_order_number = state.last_order_number.max(order.order_number);
        for item in items {
            state.items.insert(item.key(), item);
        }
        state.orders.insert(order.order_number, order);
    }

    pub async fn order(&self, order_number: OrderNumber) -> Option<Order> {
        self.state.lock().await.orders.get(&order_number).cloned()
    }

    pub async fn items(&self, order_number: OrderNumber) -> Vec<OrderItem> {
        let state = self.state.lock().await;
        items_of(&state, order_number)
    }

    pub async fn notes(&self) -> Vec<AuditNote> {
        self.state.lock().await.notes.clone()
    }
}

fn items_of(state: &MemoryState, order_number: OrderNumber) -> Vec<OrderItem> {
    state
        .items
        .range(ItemKey::new(order_number, i32::MIN)..=ItemKey::new(order_number, i32::MAX))
        .map(|(_, item)| item.clone())
        .collect()
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin(&self) -> CoreResult<Box<dyn OrderTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

#[async_trait]
impl AuditSink for MemoryTransaction {
    async fn append_note(&mut self, note: &AuditNote) -> CoreResult<()> {
        self.working.notes.push(note.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderTransaction for MemoryTransaction {
    async fn get_order(&mut self, order_number: OrderNumber) -> CoreResult<Option<Order>> {
        Ok(self.working.orders.get(&order_number).cloned())
    }

    async fn get_order_items(&mut self, order_number: OrderNumber) -> CoreResult<Vec<OrderItem>> {
        Ok(items_of(&self.working, order_number))
    }

    async fn get_item(&mut self, key: ItemKey) -> CoreResult<Option<OrderItem>> {
        Ok(self.working.items.get(&key).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        if self.working.orders.contains_key(&order.order_number) {
            return Err(CoreError::AllocationConflict(order.order_number));
        }
        self.working.last_order_number = self.working.last_order_number.max(order.order_number);
        self.working.orders.insert(order.order_number, order.clone());
        Ok(())
    }

    async fn insert_item(&mut self, item: &OrderItem) -> CoreResult<()> {
        if self.working.items.contains_key(&item.key()) {
            return Err(CoreError::StorageError(format!("Duplicate order item {}", item.key())));
        }
        self.working.items.insert(item.key(), item.clone());
        Ok(())
    }

    async fn delete_item(&mut self, key: ItemKey) -> CoreResult<()> {
        self.working.items.remove(&key);
        Ok(())
    }

    async fn update_item(&mut self, key: ItemKey, update: &ItemUpdate) -> CoreResult<()> {
        let item = self
            .working
            .items
            .get_mut(&key)
            .ok_or_else(|| CoreError::item_not_found(key))?;
        update.apply(item);
        Ok(())
    }

    async fn update_order_totals(&mut self, order_number: OrderNumber, totals: &OrderTotals) -> CoreResult<()> {
        let order = self
            .working
            .orders
            .get_mut(&order_number)
            .ok_or_else(|| CoreError::order_not_found(order_number))?;
        order.apply_totals(totals);
        Ok(())
    }

    async fn next_order_number(&mut self) -> CoreResult<OrderNumber> {
        self.working.last_order_number += 1;
        Ok(self.working.last_order_number)
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BacklogRepository for InMemoryOrderStore {
    async fn backordered_items(&self) -> CoreResult<Vec<BackorderedLine>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| !item.adjustment && item.quantity_needed > 0)
            .filter_map(|item| {
                state.orders.get(&item.order_number).map(|order| BackorderedLine {
                    item: item.clone(),
                    placed_at: order.order_date,
                    order_product_total: order.product_total,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SalesHistoryRepository for InMemoryOrderStore {
    async fn sales_lines(&self, window: &SalesWindow) -> CoreResult<Vec<SalesLine>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| !item.adjustment && window.contains(item.detail_date))
            .filter(|item| {
                state
                    .orders
                    .get(&item.order_number)
                    .is_some_and(|order| order.approved)
            })
            .map(|item| SalesLine {
                sku: item.sku.clone(),
                quantity_shipped: item.quantity_shipped,
                quantity_returned: item.quantity_returned,
                price_per_unit: Some(item.price_per_unit),
                cost_per_unit: Some(item.cost_per_unit),
                detail_date: item.detail_date,
            })
            .collect())
    }
}
