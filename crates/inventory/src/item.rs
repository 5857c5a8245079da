use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use agrolog_core::{Aggregate, AggregateRoot, DomainError, OwnerId, RecordId, Unit};

use crate::movement::{InventoryMovement, MovementModule, MovementOperation};

/// Inventory item identifier (owner-scoped via `owner_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub RecordId);

impl InventoryItemId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Fertilizer,
    Phytosanitary,
    Seed,
    Substrate,
    Fuel,
    Tool,
    Other,
}

impl core::str::FromStr for ItemCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fertilizer" => Ok(ItemCategory::Fertilizer),
            "phytosanitary" => Ok(ItemCategory::Phytosanitary),
            "seed" => Ok(ItemCategory::Seed),
            "substrate" => Ok(ItemCategory::Substrate),
            "fuel" => Ok(ItemCategory::Fuel),
            "tool" => Ok(ItemCategory::Tool),
            "other" => Ok(ItemCategory::Other),
            _ => Err(DomainError::validation(
                "category must be one of: fertilizer, phytosanitary, seed, substrate, fuel, tool, other",
            )),
        }
    }
}

/// Aggregate root: InventoryItem.
///
/// `quantity` only changes through [`InventoryMovement`]s; `movement_count` is
/// the sequence of the last movement applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    owner_id: OwnerId,
    name: String,
    category: ItemCategory,
    quantity: Decimal,
    unit: Unit,
    min_stock: Decimal,
    unit_price: Decimal,
    supplier_id: Option<RecordId>,
    location: Option<String>,
    expiry_date: Option<NaiveDate>,
    notes: Option<String>,
    movement_count: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for creating an item. A positive `quantity` is booked as an opening movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: ItemCategory,
    #[serde(default)]
    pub quantity: Decimal,
    pub unit: Unit,
    #[serde(default)]
    pub min_stock: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    pub supplier_id: Option<RecordId>,
    pub location: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Partial update of descriptive fields (quantity only moves through movements).
///
/// Clearable fields use `None` = no change, `Some(None)` = clear (JSON `null`),
/// `Some(Some(v))` = set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsPatch {
    pub name: Option<String>,
    pub category: Option<ItemCategory>,
    pub unit: Option<Unit>,
    pub min_stock: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<Option<RecordId>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

/// A present key (even `null`) becomes `Some`; an absent key stays `None` via `default`.
fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub movement_id: RecordId,
    pub operation: MovementOperation,
    pub amount: Decimal,
    pub unit: Unit,
    pub activity_id: Option<RecordId>,
    pub day: Option<NaiveDate>,
    pub module: Option<MovementModule>,
    pub purchase_id: Option<RecordId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl RecordMovement {
    /// Plain movement with no activity/purchase linkage.
    pub fn new(
        owner_id: OwnerId,
        item_id: InventoryItemId,
        operation: MovementOperation,
        amount: Decimal,
        unit: Unit,
    ) -> Self {
        Self {
            owner_id,
            item_id,
            movement_id: RecordId::new(),
            operation,
            amount,
            unit,
            activity_id: None,
            day: None,
            module: None,
            purchase_id: None,
            note: None,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RecordMovement(RecordMovement),
}

impl InventoryItem {
    /// Build a new item at zero stock, plus the opening movement when `input.quantity > 0`.
    pub fn create(
        owner_id: OwnerId,
        item_id: InventoryItemId,
        input: NewInventoryItem,
        now: DateTime<Utc>,
    ) -> Result<(Self, Option<InventoryMovement>), DomainError> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if input.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        ensure_non_negative("min_stock", input.min_stock)?;
        ensure_non_negative("unit_price", input.unit_price)?;

        let mut item = Self {
            id: item_id,
            owner_id,
            name: input.name.trim().to_string(),
            category: input.category,
            quantity: Decimal::ZERO,
            unit: input.unit,
            min_stock: input.min_stock,
            unit_price: input.unit_price,
            supplier_id: input.supplier_id,
            location: input.location,
            expiry_date: input.expiry_date,
            notes: input.notes,
            movement_count: 0,
            created_at: now,
            updated_at: now,
        };

        if input.quantity.is_zero() {
            return Ok((item, None));
        }

        let mut opening = RecordMovement::new(
            owner_id,
            item_id,
            MovementOperation::Add,
            input.quantity,
            input.unit,
        );
        opening.note = Some("opening balance".to_string());
        opening.occurred_at = now;

        let movement = item.decide_movement(&opening)?;
        item.apply(&movement);
        Ok((item, Some(movement)))
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn min_stock(&self) -> Decimal {
        self.min_stock
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn supplier_id(&self) -> Option<RecordId> {
        self.supplier_id
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn movement_count(&self) -> u64 {
        self.movement_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.min_stock
    }

    /// Current stock valued at the item's unit price; `None` when the product overflows.
    pub fn stock_value(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    /// Update descriptive fields. Switching unit is only allowed before any movement.
    pub fn update_details(
        &mut self,
        patch: ItemDetailsPatch,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(v) = patch.min_stock {
            ensure_non_negative("min_stock", v)?;
        }
        if let Some(v) = patch.unit_price {
            ensure_non_negative("unit_price", v)?;
        }
        if let Some(unit) = patch.unit {
            if unit != self.unit && self.movement_count > 0 {
                return Err(DomainError::invariant(
                    "unit cannot change once movements have been recorded",
                ));
            }
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(v) = patch.min_stock {
            self.min_stock = v;
        }
        if let Some(v) = patch.unit_price {
            self.unit_price = v;
        }
        if let Some(supplier_id) = patch.supplier_id {
            self.supplier_id = supplier_id;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(expiry_date) = patch.expiry_date {
            self.expiry_date = expiry_date;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    fn decide_movement(&self, cmd: &RecordMovement) -> Result<InventoryMovement, DomainError> {
        if cmd.owner_id != self.owner_id {
            // Another owner's item is indistinguishable from a missing one.
            return Err(DomainError::not_found());
        }
        if cmd.item_id != self.id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be positive"));
        }

        let normalized = cmd.unit.convert(cmd.amount, self.unit)?;
        let balance_after = self
            .quantity
            .checked_add(cmd.operation.signed(normalized))
            .ok_or_else(DomainError::out_of_range)?;
        if balance_after < Decimal::ZERO {
            return Err(DomainError::InsufficientStock {
                available: self.quantity,
                requested: normalized,
            });
        }

        Ok(InventoryMovement {
            id: cmd.movement_id,
            owner_id: self.owner_id,
            item_id: self.id,
            sequence: self.movement_count + 1,
            operation: cmd.operation,
            amount: cmd.amount,
            unit: cmd.unit,
            amount_in_item_unit: normalized,
            balance_after,
            activity_id: cmd.activity_id,
            day: cmd.day,
            module: cmd.module,
            purchase_id: cmd.purchase_id,
            note: cmd.note.clone(),
            // Never earlier than the previous movement, whatever the caller's clock says.
            created_at: cmd.occurred_at.max(self.updated_at),
        })
    }
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryMovement;
    type Error = DomainError;

    fn apply(&mut self, movement: &Self::Event) {
        self.quantity = movement.balance_after;
        self.movement_count = movement.sequence;
        self.updated_at = movement.created_at;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RecordMovement(cmd) => Ok(vec![self.decide_movement(cmd)?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::verify_trail;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn new_item(quantity: Decimal, unit: Unit) -> (InventoryItem, Vec<InventoryMovement>) {
        let owner = OwnerId::new();
        let id = InventoryItemId::new(RecordId::new());
        let (item, opening) = InventoryItem::create(
            owner,
            id,
            NewInventoryItem {
                name: "NPK 15-15-15".to_string(),
                category: ItemCategory::Fertilizer,
                quantity,
                unit,
                min_stock: dec!(10),
                unit_price: dec!(1.2),
                supplier_id: None,
                location: Some("shed".to_string()),
                expiry_date: None,
                notes: None,
            },
            Utc::now(),
        )
        .unwrap();
        (item, opening.into_iter().collect())
    }

    fn movement(
        item: &InventoryItem,
        operation: MovementOperation,
        amount: Decimal,
        unit: Unit,
    ) -> InventoryCommand {
        InventoryCommand::RecordMovement(RecordMovement::new(
            item.owner_id(),
            item.id_typed(),
            operation,
            amount,
            unit,
        ))
    }

    fn record(
        item: &mut InventoryItem,
        cmd: &InventoryCommand,
    ) -> Result<InventoryMovement, DomainError> {
        let events = item.handle(cmd)?;
        for e in &events {
            item.apply(e);
        }
        Ok(events.into_iter().next().unwrap())
    }

    #[test]
    fn opening_quantity_is_booked_as_first_movement() {
        let (item, opening) = new_item(dec!(100), Unit::Kilogram);
        assert_eq!(item.quantity(), dec!(100));
        assert_eq!(opening.len(), 1);
        assert_eq!(opening[0].sequence, 1);
        assert_eq!(opening[0].balance_after, dec!(100));
        assert_eq!(item.movement_count(), 1);
    }

    #[test]
    fn zero_opening_quantity_records_nothing() {
        let (item, opening) = new_item(dec!(0), Unit::Litre);
        assert!(opening.is_empty());
        assert_eq!(item.movement_count(), 0);
    }

    #[test]
    fn subtract_in_grams_is_normalized_to_kilograms() {
        let (mut item, _) = new_item(dec!(100), Unit::Kilogram);
        let cmd = movement(&item, MovementOperation::Subtract, dec!(2000), Unit::Gram);

        let m = record(&mut item, &cmd).unwrap();

        assert_eq!(m.amount, dec!(2000));
        assert_eq!(m.amount_in_item_unit, dec!(2));
        assert_eq!(m.balance_after, dec!(98));
        assert_eq!(item.quantity(), dec!(98));
    }

    #[test]
    fn oversized_subtract_is_rejected_without_state_change() {
        let (mut item, _) = new_item(dec!(100), Unit::Kilogram);
        let first = movement(&item, MovementOperation::Subtract, dec!(2000), Unit::Gram);
        record(&mut item, &first).unwrap();
        let before = item.clone();

        let cmd = movement(&item, MovementOperation::Subtract, dec!(150), Unit::Kilogram);
        let err = item.handle(&cmd).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: dec!(98),
                requested: dec!(150)
            }
        );
        assert_eq!(item, before);
    }

    #[test]
    fn incompatible_unit_is_rejected() {
        let (item, _) = new_item(dec!(5), Unit::Kilogram);
        let cmd = movement(&item, MovementOperation::Add, dec!(1), Unit::Litre);
        let err = item.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::UnitMismatch { .. }));
    }

    #[test]
    fn non_positive_amount_is_a_validation_error() {
        let (item, _) = new_item(dec!(5), Unit::Kilogram);
        let cmd = movement(&item, MovementOperation::Add, dec!(0), Unit::Kilogram);
        assert!(matches!(item.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn other_owner_sees_not_found() {
        let (item, _) = new_item(dec!(5), Unit::Kilogram);
        let cmd = RecordMovement::new(
            OwnerId::new(),
            item.id_typed(),
            MovementOperation::Add,
            dec!(1),
            Unit::Kilogram,
        );
        let err = item.handle(&InventoryCommand::RecordMovement(cmd)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn unit_is_locked_after_first_movement() {
        let (mut item, _) = new_item(dec!(5), Unit::Kilogram);
        let err = item
            .update_details(
                ItemDetailsPatch {
                    unit: Some(Unit::Gram),
                    ..ItemDetailsPatch::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let (mut empty, _) = new_item(dec!(0), Unit::Kilogram);
        empty
            .update_details(
                ItemDetailsPatch {
                    unit: Some(Unit::Gram),
                    name: Some("Seed bag".to_string()),
                    ..ItemDetailsPatch::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(empty.unit(), Unit::Gram);
        assert_eq!(empty.name(), "Seed bag");
    }

    #[test]
    fn below_minimum_flags_low_stock() {
        let (item, _) = new_item(dec!(4), Unit::Kilogram);
        assert!(item.is_below_minimum());
        assert_eq!(item.stock_value(), Some(dec!(4.8)));
    }

    #[test]
    fn huge_add_is_rejected_without_state_change() {
        let (mut item, _) = new_item(Decimal::MAX, Unit::Kilogram);
        let before = item.clone();

        let cmd = movement(&item, MovementOperation::Add, dec!(1), Unit::Kilogram);
        assert_eq!(item.handle(&cmd).unwrap_err(), DomainError::out_of_range());
        assert_eq!(item, before);

        // Converting a huge tonne amount into grams overflows before the balance does.
        let (grams, _) = new_item(dec!(0), Unit::Gram);
        let cmd = movement(&grams, MovementOperation::Add, Decimal::MAX, Unit::Tonne);
        assert!(matches!(grams.handle(&cmd), Err(DomainError::Validation(_))));

        item.unit_price = dec!(2);
        assert_eq!(item.stock_value(), None);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let (mut item, _) = new_item(dec!(5), Unit::Kilogram);
        assert_eq!(item.location(), Some("shed"));

        let keep: ItemDetailsPatch = serde_json::from_str(r#"{"notes":"bag 3"}"#).unwrap();
        item.update_details(keep, Utc::now()).unwrap();
        assert_eq!(item.location(), Some("shed"));
        assert_eq!(item.notes(), Some("bag 3"));

        let clear: ItemDetailsPatch =
            serde_json::from_str(r#"{"location":null,"expiry_date":null}"#).unwrap();
        assert_eq!(clear.location, Some(None));
        item.update_details(clear, Utc::now()).unwrap();
        assert_eq!(item.location(), None);
        assert_eq!(item.notes(), Some("bag 3"));
    }

    #[test]
    fn movement_time_never_precedes_the_previous_one() {
        let (mut item, trail) = new_item(dec!(5), Unit::Kilogram);
        let mut cmd = RecordMovement::new(
            item.owner_id(),
            item.id_typed(),
            MovementOperation::Add,
            dec!(1),
            Unit::Kilogram,
        );
        cmd.occurred_at = trail[0].created_at - chrono::Duration::seconds(30);
        let m = record(&mut item, &InventoryCommand::RecordMovement(cmd)).unwrap();
        assert!(m.created_at >= trail[0].created_at);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of accepted movements, the quantity equals the
        /// opening balance plus the signed sum, and each `balance_after` is the prefix sum.
        #[test]
        fn balances_are_running_prefix_sums(
            opening in 0u32..10_000u32,
            ops in prop::collection::vec((any::<bool>(), 1u32..5_000u32, any::<bool>()), 1..40)
        ) {
            let (mut item, mut trail) = new_item(Decimal::from(opening), Unit::Kilogram);
            let mut expected = Decimal::from(opening);

            for (is_add, grams, in_grams) in ops {
                let (amount, unit) = if in_grams {
                    (Decimal::from(grams), Unit::Gram)
                } else {
                    (Decimal::from(grams), Unit::Kilogram)
                };
                let op = if is_add { MovementOperation::Add } else { MovementOperation::Subtract };
                let normalized = unit.convert(amount, Unit::Kilogram).unwrap();
                let before = item.clone();

                let cmd = movement(&item, op, amount, unit);
                match record(&mut item, &cmd) {
                    Ok(m) => {
                        expected += op.signed(normalized);
                        prop_assert_eq!(m.balance_after, expected);
                        trail.push(m);
                    }
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert!(expected - normalized < Decimal::ZERO);
                        prop_assert_eq!(&item, &before);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {e:?}"),
                }
            }

            prop_assert_eq!(item.quantity(), expected);
            prop_assert_eq!(verify_trail(Decimal::ZERO, &trail).unwrap(), item.quantity());
            prop_assert_eq!(item.movement_count(), trail.len() as u64);
        }
    }
}
