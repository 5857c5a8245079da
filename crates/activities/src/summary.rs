use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrolog_core::{DomainError, DomainResult};

use crate::activity::Activity;

/// Per-crop totals over a set of activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSummary {
    pub crop_type: String,
    pub activities: u64,
    pub total_cost: Decimal,
    pub total_surface_ha: Decimal,
    pub total_water: Decimal,
}

/// Group by crop type (case-insensitive), ordered by crop name.
pub fn summarize_by_crop<'a>(
    activities: impl IntoIterator<Item = &'a Activity>,
) -> DomainResult<Vec<CropSummary>> {
    let mut by_crop: BTreeMap<String, CropSummary> = BTreeMap::new();
    for a in activities {
        let key = a.crop_type().to_lowercase();
        let entry = by_crop.entry(key).or_insert_with(|| CropSummary {
            crop_type: a.crop_type().to_string(),
            activities: 0,
            total_cost: Decimal::ZERO,
            total_surface_ha: Decimal::ZERO,
            total_water: Decimal::ZERO,
        });
        entry.activities += 1;
        entry.total_cost = add(entry.total_cost, a.total_cost())?;
        entry.total_surface_ha = add(entry.total_surface_ha, a.surface_hectares())?;
        entry.total_water = add(entry.total_water, a.water_used())?;
    }
    Ok(by_crop.into_values().collect())
}

fn add(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(DomainError::out_of_range)
}
