use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrolog_core::{AggregateRoot, DomainError, DomainResult, OwnerId, RecordId, Unit};
use agrolog_inventory::{InventoryItemId, ItemCategory};

use crate::supplier::{Supplier, SupplierId};

/// Purchase identifier (owner-scoped via `owner_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(pub RecordId);

impl PurchaseId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier_id: SupplierId,
    pub product_name: String,
    pub category: ItemCategory,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_price: Decimal,
    pub purchase_date: NaiveDate,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    /// When set, the purchased quantity is booked into this item.
    pub inventory_item_id: Option<InventoryItemId>,
}

/// Aggregate root: Purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    id: PurchaseId,
    owner_id: OwnerId,
    supplier_id: SupplierId,
    product_name: String,
    category: ItemCategory,
    quantity: Decimal,
    unit: Unit,
    unit_price: Decimal,
    total: Decimal,
    purchase_date: NaiveDate,
    invoice_number: Option<String>,
    notes: Option<String>,
    inventory_item_id: Option<InventoryItemId>,
    created_at: DateTime<Utc>,
}

impl Purchase {
    /// Record a purchase from `supplier`, which must belong to the same owner and be active.
    pub fn create(
        owner_id: OwnerId,
        id: PurchaseId,
        supplier: &Supplier,
        input: NewPurchase,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if supplier.owner_id() != owner_id || supplier.id_typed() != input.supplier_id {
            return Err(DomainError::not_found());
        }
        if !supplier.is_active() {
            return Err(DomainError::invariant("supplier is inactive"));
        }
        if input.product_name.trim().is_empty() {
            return Err(DomainError::validation("product_name cannot be empty"));
        }
        if input.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        let total = input
            .quantity
            .checked_mul(input.unit_price)
            .ok_or_else(DomainError::out_of_range)?;

        Ok(Self {
            id,
            owner_id,
            supplier_id: input.supplier_id,
            product_name: input.product_name.trim().to_string(),
            category: input.category,
            quantity: input.quantity,
            unit: input.unit,
            unit_price: input.unit_price,
            total,
            purchase_date: input.purchase_date,
            invoice_number: input.invoice_number,
            notes: input.notes,
            inventory_item_id: input.inventory_item_id,
            created_at: now,
        })
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
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

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// `quantity × unit_price`.
    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.invoice_number.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn inventory_item_id(&self) -> Option<InventoryItemId> {
        self.inventory_item_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supplier::{ContactInfo, NewSupplier};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn supplier(owner: OwnerId) -> Supplier {
        Supplier::create(
            owner,
            SupplierId::new(RecordId::new()),
            NewSupplier {
                name: "Fertiberia".to_string(),
                tax_id: None,
                contact: ContactInfo::default(),
                notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn input(s: &Supplier, quantity: Decimal, unit_price: Decimal) -> NewPurchase {
        NewPurchase {
            supplier_id: s.id_typed(),
            product_name: "Potassium nitrate".to_string(),
            category: ItemCategory::Fertilizer,
            quantity,
            unit: Unit::Kilogram,
            unit_price,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            invoice_number: Some("F-0012".to_string()),
            notes: None,
            inventory_item_id: None,
        }
    }

    #[test]
    fn total_is_quantity_times_price() {
        let owner = OwnerId::new();
        let s = supplier(owner);
        let p = Purchase::create(
            owner,
            PurchaseId::new(RecordId::new()),
            &s,
            input(&s, dec!(25), dec!(1.32)),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.total(), dec!(33));
    }

    #[test]
    fn overflowing_total_is_a_validation_error() {
        let owner = OwnerId::new();
        let s = supplier(owner);
        let huge = Decimal::from(1_000_000_000_000_000u64);
        let err = Purchase::create(
            owner,
            PurchaseId::new(RecordId::new()),
            &s,
            input(&s, huge, huge),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::out_of_range());
    }

    #[test]
    fn inactive_supplier_is_rejected() {
        let owner = OwnerId::new();
        let mut s = supplier(owner);
        s.deactivate(Utc::now());
        let err = Purchase::create(
            owner,
            PurchaseId::new(RecordId::new()),
            &s,
            input(&s, dec!(1), dec!(1)),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn other_owners_supplier_is_not_found() {
        let s = supplier(OwnerId::new());
        let err = Purchase::create(
            OwnerId::new(),
            PurchaseId::new(RecordId::new()),
            &s,
            input(&s, dec!(1), dec!(1)),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        #[test]
        fn total_is_never_negative(qty in 1u32..100_000, price_cents in 0u32..100_000) {
            let owner = OwnerId::new();
            let s = supplier(owner);
            let p = Purchase::create(
                owner,
                PurchaseId::new(RecordId::new()),
                &s,
                input(&s, Decimal::from(qty), Decimal::new(price_cents.into(), 2)),
                Utc::now(),
            )
            .unwrap();
            prop_assert!(p.total() >= Decimal::ZERO);
            prop_assert_eq!(p.total(), p.quantity() * p.unit_price());
        }
    }
}
