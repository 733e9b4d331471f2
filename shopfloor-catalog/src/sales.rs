use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use shopfloor_core::{CoreError, CoreResult, SalesHistoryRepository, SalesLine, SalesWindow};

use crate::classifier::{SalesClassifier, Tier};

/// Characters of a SKU that name its product family
pub const FAMILY_PREFIX_LEN: usize = 5;

pub const DEFAULT_WINDOW_DAYS: i64 = 90;

/// Units and money for one requested SKU over a sales window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub sku: String,
    pub units: i64,
    pub gross: Decimal,
    pub net: Decimal,
    /// `None` when the window holds too few sales to rank
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub window: SalesWindow,
    pub records: Vec<SalesRecord>,
}

fn family_prefix(sku: &str) -> &str {
    match sku.char_indices().nth(FAMILY_PREFIX_LEN) {
        Some((end, _)) => &sku[..end],
        None => sku,
    }
}

/// A sales line counts toward `sku` when it is that SKU or its family prefix is
pub fn line_matches(line: &SalesLine, sku: &str) -> bool {
    line.sku == sku || family_prefix(&line.sku) == sku
}

/// Sum units, gross and net of the lines matching each requested SKU. A line
/// without a price adds units but no money; one without a cost adds no net.
pub fn aggregate_sales(skus: &[String], lines: &[SalesLine]) -> Vec<SalesRecord> {
    skus.iter()
        .map(|sku| {
            let mut record = SalesRecord {
                sku: sku.clone(),
                units: 0,
                gross: Decimal::ZERO,
                net: Decimal::ZERO,
                tier: None,
            };
            for line in lines.iter().filter(|line| line_matches(line, sku)) {
                let units = i64::from(line.quantity_shipped) - i64::from(line.quantity_returned);
                let sold = Decimal::from(units);
                record.units += units;
                if let Some(price) = line.price_per_unit {
                    record.gross += price * sold;
                    if let Some(cost) = line.cost_per_unit {
                        record.net += (price - cost) * sold;
                    }
                }
            }
            record
        })
        .collect()
}

/// Sales records with tiers over a trailing window of order history
pub struct SalesReporter {
    history: Arc<dyn SalesHistoryRepository>,
    classifier: SalesClassifier,
    window_days: i64,
}

impl SalesReporter {
    pub fn new(history: Arc<dyn SalesHistoryRepository>, classifier: SalesClassifier, window_days: i64) -> Self {
        Self {
            history,
            classifier,
            window_days,
        }
    }

    pub fn classifier(&self) -> &SalesClassifier {
        &self.classifier
    }

    /// Records for `skus` over the window ending at `now`; `days` overrides the
    /// configured window length.
    pub async fn records(&self, skus: &[String], now: DateTime<Utc>, days: Option<i64>) -> CoreResult<SalesReport> {
        let days = days.unwrap_or(self.window_days);
        if days <= 0 {
            return Err(CoreError::ValidationError(format!(
                "Sales window must be at least one day, got {}",
                days
            )));
        }

        let window = SalesWindow::trailing(now, days)?;
        let lines = self.history.sales_lines(&window).await?;
        let mut records = aggregate_sales(skus, &lines);

        let units: BTreeMap<String, i64> = records.iter().map(|r| (r.sku.clone(), r.units)).collect();
        match self.classifier.classify(&units) {
            Ok(tiers) => {
                for record in records.iter_mut() {
                    record.tier = tiers.get(&record.sku).copied();
                }
            }
            Err(CoreError::InsufficientData(reason)) => {
                warn!(%reason, "Sales records left unranked");
            }
            Err(e) => return Err(e),
        }

        debug!(skus = skus.len(), lines = lines.len(), days, "Sales records aggregated");
        Ok(SalesReport { window, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn sold(sku: &str, shipped: i32, returned: i32, price: Option<Decimal>, cost: Option<Decimal>) -> SalesLine {
        SalesLine {
            sku: sku.to_string(),
            quantity_shipped: shipped,
            quantity_returned: returned,
            price_per_unit: price,
            cost_per_unit: cost,
            detail_date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    struct FixedHistory(Vec<SalesLine>);

    #[async_trait]
    impl SalesHistoryRepository for FixedHistory {
        async fn sales_lines(&self, window: &SalesWindow) -> CoreResult<Vec<SalesLine>> {
            Ok(self
                .0
                .iter()
                .filter(|line| window.contains(line.detail_date))
                .cloned()
                .collect())
        }
    }

    #[test]
    fn test_family_prefix_matches_variants() {
        let line = sold("PLQ12-BLK", 1, 0, None, None);
        assert!(line_matches(&line, "PLQ12"));
        assert!(line_matches(&line, "PLQ12-BLK"));
        assert!(!line_matches(&line, "PLQ1"));
        assert!(line_matches(&sold("TAG", 1, 0, None, None), "TAG"));
    }

    #[test]
    fn test_units_net_of_returns_and_money() {
        let lines = vec![
            sold("PLQ12-BLK", 5, 1, Some(dec!(20.00)), Some(dec!(8.00))),
            sold("PLQ12-RED", 2, 0, Some(dec!(22.00)), None),
            sold("PLQ12-WHT", 3, 0, None, Some(dec!(8.00))),
            sold("MUG01", 9, 0, Some(dec!(5.00)), Some(dec!(2.00))),
        ];
        let records = aggregate_sales(&["PLQ12".to_string()], &lines);

        assert_eq!(records.len(), 1);
        let plaque = &records[0];
        assert_eq!(plaque.units, 9);
        assert_eq!(plaque.gross, dec!(124.00));
        assert_eq!(plaque.net, dec!(48.00));
    }

    #[test]
    fn test_unsold_sku_has_zero_record() {
        let records = aggregate_sales(&["NOPE1".to_string()], &[]);
        assert_eq!(records[0].units, 0);
        assert_eq!(records[0].gross, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reporter_ranks_within_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut stale = sold("MUG01", 100, 0, Some(dec!(5.00)), Some(dec!(2.00)));
        stale.detail_date = now - Duration::days(200);
        let history = FixedHistory(vec![
            sold("MUG01", 10, 0, Some(dec!(5.00)), Some(dec!(2.00))),
            sold("PLQ12-BLK", 30, 0, Some(dec!(20.00)), Some(dec!(8.00))),
            stale,
        ]);
        let reporter = SalesReporter::new(Arc::new(history), SalesClassifier::default(), DEFAULT_WINDOW_DAYS);

        let report = reporter
            .records(&["MUG01".to_string(), "PLQ12".to_string()], now, None)
            .await
            .unwrap();

        assert_eq!(report.records[0].units, 10);
        // 30 of 40 units tallied before MUG01
        assert_eq!(report.records[0].tier, Some(Tier::C));
        assert_eq!(report.records[1].tier, Some(Tier::A));
    }

    #[tokio::test]
    async fn test_reporter_leaves_empty_window_unranked() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let reporter = SalesReporter::new(Arc::new(FixedHistory(vec![])), SalesClassifier::default(), 90);

        let report = reporter.records(&["MUG01".to_string()], now, Some(7)).await.unwrap();
        assert_eq!(report.records[0].tier, None);

        let err = reporter.records(&["MUG01".to_string()], now, Some(0)).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_reporter_rejects_window_past_calendar_range() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let reporter = SalesReporter::new(Arc::new(FixedHistory(vec![])), SalesClassifier::default(), 90);

        let err = reporter
            .records(&["MUG01".to_string()], now, Some(1_000_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }
}
