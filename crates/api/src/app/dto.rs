use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use agrolog_activities::{Activity, ActivityFilter, CropSummary, Template, TemplateKind};
use agrolog_core::{RecordId, Unit};
use agrolog_infra::waitlist::WaitlistEntry;
use agrolog_inventory::{
    InventoryItem, InventoryItemId, InventoryMovement, ItemCategory, MovementModule,
    MovementOperation, MovementQuery,
};
use agrolog_purchasing::{Purchase, Supplier, SupplierId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ActivityListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub crop_type: Option<String>,
}

impl From<ActivityListQuery> for ActivityFilter {
    fn from(q: ActivityListQuery) -> Self {
        ActivityFilter {
            from: q.from,
            to: q.to,
            crop_type: q.crop_type.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsumptionRequest {
    pub item_id: RecordId,
    pub amount: Decimal,
    pub unit: Unit,
    pub day: Option<NaiveDate>,
    pub module: Option<MovementModule>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub category: Option<ItemCategory>,
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub operation: MovementOperation,
    pub amount: Decimal,
    pub unit: Unit,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub item_id: Option<RecordId>,
    pub activity_id: Option<RecordId>,
    pub module: Option<MovementModule>,
    pub day: Option<NaiveDate>,
}

impl From<MovementListQuery> for MovementQuery {
    fn from(q: MovementListQuery) -> Self {
        MovementQuery {
            item_id: q.item_id.map(InventoryItemId::new),
            activity_id: q.activity_id,
            module: q.module,
            day: q.day,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseListQuery {
    pub supplier_id: Option<RecordId>,
}

impl PurchaseListQuery {
    pub fn supplier(&self) -> Option<SupplierId> {
        self.supplier_id.map(SupplierId::new)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateListQuery {
    pub kind: Option<TemplateKind>,
}

#[derive(Debug, Deserialize)]
pub struct WaitlistRequest {
    pub email: String,
    pub name: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn activity_to_json(a: &Activity) -> serde_json::Value {
    let mut body = serde_json::to_value(a.details()).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = body.as_object_mut() {
        obj.insert("id".to_string(), serde_json::json!(a.id_typed().to_string()));
        obj.insert("total_cost".to_string(), serde_json::json!(a.total_cost()));
        obj.insert("cost_per_hectare".to_string(), serde_json::json!(a.cost_per_hectare()));
        obj.insert("surface_hectares".to_string(), serde_json::json!(a.surface_hectares()));
        obj.insert("created_at".to_string(), serde_json::json!(a.created_at().to_rfc3339()));
        obj.insert("updated_at".to_string(), serde_json::json!(a.updated_at().to_rfc3339()));
    }
    body
}

pub fn crop_summary_to_json(s: &CropSummary) -> serde_json::Value {
    serde_json::json!({
        "crop_type": s.crop_type,
        "activities": s.activities,
        "total_cost": s.total_cost,
        "total_surface_ha": s.total_surface_ha,
        "total_water": s.total_water,
    })
}

pub fn item_to_json(i: &InventoryItem) -> serde_json::Value {
    serde_json::json!({
        "id": i.id_typed().to_string(),
        "name": i.name(),
        "category": i.category(),
        "quantity": i.quantity(),
        "unit": i.unit(),
        "min_stock": i.min_stock(),
        "below_minimum": i.is_below_minimum(),
        "unit_price": i.unit_price(),
        "stock_value": i.stock_value(),
        "supplier_id": i.supplier_id().map(|s| s.to_string()),
        "location": i.location(),
        "expiry_date": i.expiry_date(),
        "notes": i.notes(),
        "movement_count": i.movement_count(),
        "created_at": i.created_at().to_rfc3339(),
        "updated_at": i.updated_at().to_rfc3339(),
    })
}

pub fn movement_to_json(m: &InventoryMovement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id.to_string(),
        "item_id": m.item_id.to_string(),
        "sequence": m.sequence,
        "operation": m.operation,
        "amount": m.amount,
        "unit": m.unit,
        "amount_in_item_unit": m.amount_in_item_unit,
        "balance_after": m.balance_after,
        "activity_id": m.activity_id.map(|id| id.to_string()),
        "day": m.day,
        "module": m.module,
        "purchase_id": m.purchase_id.map(|id| id.to_string()),
        "note": m.note,
        "created_at": m.created_at.to_rfc3339(),
    })
}

pub fn supplier_to_json(s: &Supplier) -> serde_json::Value {
    serde_json::json!({
        "id": s.id_typed().to_string(),
        "name": s.name(),
        "tax_id": s.tax_id(),
        "contact": s.contact(),
        "notes": s.notes(),
        "active": s.is_active(),
        "created_at": s.created_at().to_rfc3339(),
        "updated_at": s.updated_at().to_rfc3339(),
    })
}

pub fn purchase_to_json(p: &Purchase) -> serde_json::Value {
    serde_json::json!({
        "id": p.id_typed().to_string(),
        "supplier_id": p.supplier_id().to_string(),
        "product_name": p.product_name(),
        "category": p.category(),
        "quantity": p.quantity(),
        "unit": p.unit(),
        "unit_price": p.unit_price(),
        "total": p.total(),
        "purchase_date": p.purchase_date(),
        "invoice_number": p.invoice_number(),
        "notes": p.notes(),
        "inventory_item_id": p.inventory_item_id().map(|id| id.to_string()),
        "created_at": p.created_at().to_rfc3339(),
    })
}

pub fn template_to_json(t: &Template) -> serde_json::Value {
    serde_json::json!({
        "id": t.id_typed().to_string(),
        "name": t.name(),
        "kind": t.kind(),
        "products": t.products(),
        "notes": t.notes(),
        "created_at": t.created_at().to_rfc3339(),
        "updated_at": t.updated_at().to_rfc3339(),
    })
}

pub fn waitlist_entry_to_json(e: &WaitlistEntry) -> serde_json::Value {
    serde_json::json!({
        "email": e.email,
        "name": e.name,
        "joined_at": e.joined_at.to_rfc3339(),
    })
}
