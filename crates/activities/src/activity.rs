use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrolog_core::{AggregateRoot, DomainError, DomainResult, OwnerId, RecordId, Unit};

use crate::costing::{CostBreakdown, compute_costs};

/// Activity identifier (owner-scoped via `owner_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub RecordId);

impl ActivityId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    #[default]
    #[serde(rename = "ha")]
    Hectare,
    #[serde(rename = "m2")]
    SquareMetre,
}

impl AreaUnit {
    pub fn to_hectares(self, area: Decimal) -> Decimal {
        match self {
            AreaUnit::Hectare => area,
            AreaUnit::SquareMetre => area / Decimal::from(10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Fertilizer,
    Pesticide,
    Seed,
    Other,
}

/// Product line applied during an activity or a fertigation day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUsage {
    pub name: String,
    pub dose: Decimal,
    pub price_per_unit: Decimal,
    pub unit: Unit,
    pub category: ProductCategory,
}

impl ProductUsage {
    pub fn line_cost(&self) -> DomainResult<Decimal> {
        self.dose
            .checked_mul(self.price_per_unit)
            .ok_or_else(DomainError::out_of_range)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if self.dose < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "dose of '{}' cannot be negative",
                self.name
            )));
        }
        if self.price_per_unit < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "price of '{}' cannot be negative",
                self.name
            )));
        }
        Ok(())
    }
}

/// One day of fertigation inside an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FertigationDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub products: Vec<ProductUsage>,
    pub observation: Option<String>,
    /// Cost supplied by the user; when absent the day costs the sum of its product lines.
    pub cost: Option<Decimal>,
}

impl FertigationDay {
    pub fn effective_cost(&self) -> DomainResult<Decimal> {
        match self.cost {
            Some(cost) => Ok(cost),
            None => crate::costing::product_lines_cost(&self.products),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn validate(&self) -> DomainResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DomainError::validation("latitude must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DomainError::validation(
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(())
    }
}

/// SIGPAC parcel reference. Fields are opaque codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadastralReference {
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub aggregate: Option<String>,
    pub zone: Option<String>,
    pub polygon: Option<String>,
    pub parcel: Option<String>,
    pub enclosure: Option<String>,
}

/// User-editable part of an activity. Derived costs are never accepted as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub date: NaiveDate,
    pub name: String,
    pub crop_type: String,
    pub variety: Option<String>,
    pub transplant_date: Option<NaiveDate>,
    pub plant_count: u32,
    pub surface_area: Decimal,
    #[serde(default)]
    pub area_unit: AreaUnit,
    #[serde(default)]
    pub water_used: Decimal,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub products: Vec<ProductUsage>,
    pub cadastral: Option<CadastralReference>,
    pub notes: Option<String>,
    #[serde(default)]
    pub fertigation: Vec<FertigationDay>,
}

impl ActivityDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.crop_type.trim().is_empty() {
            return Err(DomainError::validation("crop_type cannot be empty"));
        }
        if self.plant_count == 0 {
            return Err(DomainError::validation("plant_count must be positive"));
        }
        if self.surface_area <= Decimal::ZERO {
            return Err(DomainError::validation("surface_area must be positive"));
        }
        if self.water_used < Decimal::ZERO {
            return Err(DomainError::validation("water_used cannot be negative"));
        }
        if let Some(transplant) = self.transplant_date {
            if transplant > self.date {
                return Err(DomainError::validation(
                    "transplant_date cannot be after the activity date",
                ));
            }
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        for p in &self.products {
            p.validate()?;
        }
        for day in &self.fertigation {
            if day.cost.is_some_and(|c| c < Decimal::ZERO) {
                return Err(DomainError::validation(format!(
                    "fertigation cost on {} cannot be negative",
                    day.date
                )));
            }
            for p in &day.products {
                p.validate()?;
            }
        }
        Ok(())
    }
}

/// Aggregate root: Activity.
///
/// `total_cost` and `cost_per_hectare` are recomputed from the line items on
/// every create/revise and have no setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    id: ActivityId,
    owner_id: OwnerId,
    #[serde(flatten)]
    draft: ActivityDraft,
    total_cost: Decimal,
    cost_per_hectare: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn create(
        owner_id: OwnerId,
        id: ActivityId,
        draft: ActivityDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        draft.validate()?;
        let costs = costs_of(&draft)?;
        Ok(Self {
            id,
            owner_id,
            draft: normalize(draft),
            total_cost: costs.total_cost,
            cost_per_hectare: costs.cost_per_hectare,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace every user-editable field and recompute the derived costs.
    pub fn revise(&mut self, draft: ActivityDraft, now: DateTime<Utc>) -> DomainResult<()> {
        draft.validate()?;
        let costs = costs_of(&draft)?;
        self.draft = normalize(draft);
        self.total_cost = costs.total_cost;
        self.cost_per_hectare = costs.cost_per_hectare;
        self.updated_at = now;
        Ok(())
    }

    pub fn id_typed(&self) -> ActivityId {
        self.id
    }

    pub fn details(&self) -> &ActivityDraft {
        &self.draft
    }

    pub fn date(&self) -> NaiveDate {
        self.draft.date
    }

    pub fn crop_type(&self) -> &str {
        &self.draft.crop_type
    }

    pub fn surface_hectares(&self) -> Decimal {
        self.draft.area_unit.to_hectares(self.draft.surface_area)
    }

    pub fn water_used(&self) -> Decimal {
        self.draft.water_used
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn cost_per_hectare(&self) -> Decimal {
        self.cost_per_hectare
    }

    pub fn costs(&self) -> CostBreakdown {
        CostBreakdown {
            total_cost: self.total_cost,
            cost_per_hectare: self.cost_per_hectare,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_fertigation_day(&self, day: NaiveDate) -> bool {
        self.draft.fertigation.iter().any(|d| d.date == day)
    }
}

fn costs_of(draft: &ActivityDraft) -> DomainResult<CostBreakdown> {
    compute_costs(
        &draft.products,
        &draft.fertigation,
        draft.surface_area,
        draft.area_unit,
    )
}

fn normalize(mut draft: ActivityDraft) -> ActivityDraft {
    draft.name = draft.name.trim().to_string();
    draft.crop_type = draft.crop_type.trim().to_string();
    draft.fertigation.sort_by_key(|d| d.date);
    draft
}

impl AggregateRoot for Activity {
    type Id = ActivityId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

/// Listing filter: inclusive date range and exact (case-insensitive) crop type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub crop_type: Option<String>,
}

impl ActivityFilter {
    pub fn matches(&self, a: &Activity) -> bool {
        self.from.is_none_or(|from| a.date() >= from)
            && self.to.is_none_or(|to| a.date() <= to)
            && self
                .crop_type
                .as_deref()
                .is_none_or(|crop| crop.trim().eq_ignore_ascii_case(a.crop_type()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn usage(name: &str, dose: Decimal, price: Decimal) -> ProductUsage {
        ProductUsage {
            name: name.to_string(),
            dose,
            price_per_unit: price,
            unit: Unit::Kilogram,
            category: ProductCategory::Fertilizer,
        }
    }

    pub(crate) fn draft(crop: &str) -> ActivityDraft {
        ActivityDraft {
            date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            name: "Spring planting".to_string(),
            crop_type: crop.to_string(),
            variety: Some("Raf".to_string()),
            transplant_date: NaiveDate::from_ymd_opt(2024, 4, 1),
            plant_count: 1200,
            surface_area: dec!(0.5),
            area_unit: AreaUnit::Hectare,
            water_used: dec!(40),
            location: Some(GeoPoint {
                latitude: 36.84,
                longitude: -2.46,
            }),
            products: vec![usage("Urea", dec!(10), dec!(2.0)), usage("NPK", dec!(5), dec!(3.0))],
            cadastral: None,
            notes: None,
            fertigation: Vec::new(),
        }
    }

    #[test]
    fn create_computes_derived_costs() {
        let a = Activity::create(
            OwnerId::new(),
            ActivityId::new(RecordId::new()),
            draft("tomato"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(a.total_cost(), dec!(35.0));
        assert_eq!(a.cost_per_hectare(), dec!(70.0));
    }

    #[test]
    fn revise_recomputes_costs() {
        let mut a = Activity::create(
            OwnerId::new(),
            ActivityId::new(RecordId::new()),
            draft("tomato"),
            Utc::now(),
        )
        .unwrap();
        let mut d = draft("tomato");
        d.fertigation.push(FertigationDay {
            date: NaiveDate::from_ymd_opt(2024, 4, 12).unwrap(),
            products: vec![],
            observation: Some("drip ok".to_string()),
            cost: Some(dec!(5)),
        });
        a.revise(d, Utc::now()).unwrap();
        assert_eq!(a.total_cost(), dec!(40));
        assert_eq!(a.cost_per_hectare(), dec!(80));
    }

    #[test]
    fn invalid_drafts_are_rejected() {
        let mut d = draft("tomato");
        d.plant_count = 0;
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));

        let mut d = draft("tomato");
        d.surface_area = dec!(0);
        assert!(d.validate().is_err());

        let mut d = draft("tomato");
        d.location = Some(GeoPoint {
            latitude: 91.0,
            longitude: 0.0,
        });
        assert!(d.validate().is_err());

        let mut d = draft("tomato");
        d.products[0].price_per_unit = dec!(-1);
        assert!(d.validate().is_err());

        let mut d = draft("tomato");
        d.transplant_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(d.validate().is_err());
    }

    #[test]
    fn huge_but_valid_line_is_rejected_instead_of_overflowing() {
        let mut d = draft("tomato");
        let huge = Decimal::from(1_000_000_000_000_000u64);
        d.products = vec![usage("Urea", huge, huge)];
        assert!(d.validate().is_ok());

        let err = Activity::create(OwnerId::new(), ActivityId::new(RecordId::new()), d.clone(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::out_of_range());

        let mut a = Activity::create(
            OwnerId::new(),
            ActivityId::new(RecordId::new()),
            draft("tomato"),
            Utc::now(),
        )
        .unwrap();
        let before = a.clone();
        assert!(a.revise(d, Utc::now()).is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn square_metres_are_converted_for_cost_per_hectare() {
        let mut d = draft("pepper");
        d.surface_area = dec!(5000);
        d.area_unit = AreaUnit::SquareMetre;
        let a = Activity::create(OwnerId::new(), ActivityId::new(RecordId::new()), d, Utc::now())
            .unwrap();
        assert_eq!(a.surface_hectares(), dec!(0.5));
        assert_eq!(a.cost_per_hectare(), dec!(70));
    }

    #[test]
    fn filter_matches_range_and_crop() {
        let a = Activity::create(
            OwnerId::new(),
            ActivityId::new(RecordId::new()),
            draft("Tomato"),
            Utc::now(),
        )
        .unwrap();
        let f = ActivityFilter {
            from: NaiveDate::from_ymd_opt(2024, 4, 1),
            to: NaiveDate::from_ymd_opt(2024, 4, 30),
            crop_type: Some("tomato".to_string()),
        };
        assert!(f.matches(&a));
        let f = ActivityFilter {
            to: NaiveDate::from_ymd_opt(2024, 4, 9),
            ..ActivityFilter::default()
        };
        assert!(!f.matches(&a));
    }

    #[test]
    fn json_shape_is_flat() {
        let a = Activity::create(
            OwnerId::new(),
            ActivityId::new(RecordId::new()),
            draft("tomato"),
            Utc::now(),
        )
        .unwrap();
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["crop_type"], "tomato");
        assert_eq!(v["area_unit"], "ha");
        assert!(v.get("total_cost").is_some());
        let back: Activity = serde_json::from_value(v).unwrap();
        assert_eq!(back.total_cost(), a.total_cost());
    }
}
