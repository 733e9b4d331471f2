use std::sync::Arc;

use shopfloor_catalog::{SalesClassifier, SalesReporter, TierThresholds};
use shopfloor_core::{BacklogRepository, CoreResult, OrderStore, SalesHistoryRepository};
use shopfloor_order::{AgingMonitor, BackorderSplitter, ShippingPolicy, StationTracker};
use shopfloor_store::app_config::{Config, FulfillmentConfig, TierThresholdsConfig};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<StationTracker>,
    pub splitter: Arc<BackorderSplitter>,
    pub aging: Arc<AgingMonitor>,
    pub sales: Arc<SalesReporter>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, policy: ShippingPolicy, classifier: SalesClassifier, window_days: i64) -> Self
    where
        S: OrderStore + BacklogRepository + SalesHistoryRepository + 'static,
    {
        Self {
            tracker: Arc::new(StationTracker::new(store.clone())),
            splitter: Arc::new(BackorderSplitter::new(store.clone(), policy)),
            aging: Arc::new(AgingMonitor::new(store.clone())),
            sales: Arc::new(SalesReporter::new(store, classifier, window_days)),
        }
    }

    /// Services wired over `store` with the configured policy and thresholds
    pub fn from_config<S>(config: &Config, store: Arc<S>) -> CoreResult<Self>
    where
        S: OrderStore + BacklogRepository + SalesHistoryRepository + 'static,
    {
        let classifier = SalesClassifier::new(thresholds(&config.sales.tier_thresholds))?;
        Ok(Self::new(
            store,
            shipping_policy(&config.fulfillment),
            classifier,
            config.sales.window_days,
        ))
    }
}

fn shipping_policy(config: &FulfillmentConfig) -> ShippingPolicy {
    ShippingPolicy {
        shipping_adjustment_sku: config.shipping_adjustment_sku.clone(),
        shipped_status: config.shipped_status.clone(),
        copy_note_author: config.copy_note_author.clone(),
        copy_note_status: config.copy_note_status.clone(),
    }
}

fn thresholds(config: &TierThresholdsConfig) -> TierThresholds {
    TierThresholds {
        a: config.a,
        b: config.b,
        c: config.c,
        d: config.d,
    }
}
