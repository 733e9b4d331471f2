use serde::{Deserialize, Serialize};
use shopfloor_core::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::fmt;

/// Sales tier, `A` being the best sellers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::A, Tier::B, Tier::C, Tier::D];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        };
        f.write_str(label)
    }
}

/// Cumulative share of total units each tier may start at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            a: 0.25,
            b: 0.50,
            c: 0.75,
            d: 1.0,
        }
    }
}

impl TierThresholds {
    pub fn bounds(&self) -> [(Tier, f64); 4] {
        [(Tier::A, self.a), (Tier::B, self.b), (Tier::C, self.c), (Tier::D, self.d)]
    }

    /// Bounds must rise from A to D and end at 1.0
    pub fn validate(&self) -> CoreResult<()> {
        let bounds = self.bounds();
        let rising = bounds.windows(2).all(|pair| pair[0].1 <= pair[1].1);
        if !rising || self.a < 0.0 || self.d != 1.0 {
            return Err(CoreError::ValidationError(format!(
                "Tier thresholds must rise from A to D and end at 1.0, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Pareto-style ranking of SKUs by units sold
#[derive(Debug, Clone, Default)]
pub struct SalesClassifier {
    thresholds: TierThresholds,
}

impl SalesClassifier {
    pub fn new(thresholds: TierThresholds) -> CoreResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Assign a tier to every SKU.
    ///
    /// SKUs are walked from most to fewest units (ties by SKU). Each takes the
    /// first tier whose bound covers the units tallied before it, and a SKU
    /// selling exactly as many units as the previous one shares its tier.
    pub fn classify(&self, units_by_sku: &BTreeMap<String, i64>) -> CoreResult<BTreeMap<String, Tier>> {
        let total = units_by_sku
            .values()
            .try_fold(0i64, |acc, units| acc.checked_add(*units))
            .ok_or_else(|| overflow(units_by_sku.len()))?;
        if total <= 0 {
            return Err(CoreError::InsufficientData(format!(
                "Cannot rank {} SKUs with {} units sold",
                units_by_sku.len(),
                total
            )));
        }

        let mut ranked: Vec<(&String, i64)> = units_by_sku.iter().map(|(sku, units)| (sku, *units)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let bounds = self.thresholds.bounds();
        let mut tiers = BTreeMap::new();
        let mut tally = 0i64;
        let mut previous: Option<(i64, Tier)> = None;

        for (sku, units) in ranked {
            let tier = match previous {
                Some((prev_units, prev_tier)) if prev_units == units => prev_tier,
                _ => bounds
                    .iter()
                    .find(|(_, bound)| tally as f64 <= total as f64 * bound)
                    .map_or(Tier::D, |(tier, _)| *tier),
            };
            tiers.insert(sku.clone(), tier);
            previous = Some((units, tier));
            tally = tally.checked_add(units).ok_or_else(|| overflow(units_by_sku.len()))?;
        }

        Ok(tiers)
    }
}

fn overflow(skus: usize) -> CoreError {
    CoreError::ValidationError(format!("Unit counts for {} SKUs overflow the total", skus))
}
