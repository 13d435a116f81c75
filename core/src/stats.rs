//! Aggregate figures for the dashboard. Pure functions over a record set;
//! rendering lives with the host UI.

use serde::Serialize;

use crate::models::{MileageEntry, MileageUnit};

#[derive(Debug, Clone, Serialize)]
pub struct MileageSummary {
    pub entry_count: usize,
    pub total_miles: f64,
    pub total_liters: f64,
    /// Σ price per liter × liters, in pence.
    pub total_cost_pence: f64,
    /// Mean efficiency in the selected unit; 0 when there are no entries.
    pub average_mileage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<MileageEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst: Option<MileageEntry>,
}

/// Efficiency of one entry in the selected display unit.
#[must_use]
pub fn unit_value(entry: &MileageEntry, unit: MileageUnit) -> f64 {
    match unit {
        MileageUnit::KmPerL => entry.mileage_km_per_l,
        MileageUnit::Mpg => entry.mileage_mpg,
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(entries: &[MileageEntry], unit: MileageUnit) -> MileageSummary {
    let total_miles: f64 = entries.iter().map(|e| e.miles).sum();
    let total_liters: f64 = entries.iter().map(|e| e.liters).sum();
    let total_cost_pence: f64 = entries.iter().map(|e| e.price_pence * e.liters).sum();
    let average_mileage = if entries.is_empty() {
        0.0
    } else {
        entries.iter().map(|e| unit_value(e, unit)).sum::<f64>() / entries.len() as f64
    };

    let best = entries
        .iter()
        .max_by(|a, b| unit_value(a, unit).total_cmp(&unit_value(b, unit)))
        .cloned();
    let worst = entries
        .iter()
        .min_by(|a, b| unit_value(a, unit).total_cmp(&unit_value(b, unit)))
        .cloned();

    MileageSummary {
        entry_count: entries.len(),
        total_miles,
        total_liters,
        total_cost_pence,
        average_mileage,
        best,
        worst,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub value: f64,
}

/// (date, efficiency) points sorted oldest-first, ready for charting.
#[must_use]
pub fn trend(entries: &[MileageEntry], unit: MileageUnit) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = entries
        .iter()
        .map(|e| TrendPoint {
            date: e.date.clone(),
            value: unit_value(e, unit),
        })
        .collect();
    points.sort_by(|a, b| a.date.cmp(&b.date));
    points
}
