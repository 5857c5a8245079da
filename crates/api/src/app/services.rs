//! Service wiring and the owner-scoped write paths behind the HTTP handlers.
//!
//! Two wirings share one struct: in-memory stores (dev/tests) and Postgres
//! stores over an injected pool. The pool is owned by `main`.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use agrolog_activities::{
    Activity, ActivityDraft, ActivityFilter, ActivityId, CropSummary, NewTemplate, Template,
    TemplateId, TemplateKind, summarize_by_crop,
};
use agrolog_core::{DomainError, DomainResult, ExpectedVersion, OwnerId, RecordId, Unit};
use agrolog_infra::ledger::{InMemoryMovementJournal, InventoryLedger, PostgresMovementJournal};
use agrolog_infra::notify::{Notifier, TracingNotifier};
use agrolog_infra::rate_limit::{CounterStore, InMemoryCounterStore, RateLimiter};
use agrolog_infra::store::{DocumentKey, DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use agrolog_infra::waitlist::{Signup, WAITLIST_COLLECTION, WaitlistEntry, WaitlistService};
use agrolog_infra::{AppConfig, ServiceError, ServiceResult, StoreError};
use agrolog_inventory::{
    InventoryItem, InventoryItemId, InventoryMovement, ItemCategory, ItemDetailsPatch,
    MovementModule, MovementOperation, MovementQuery, NewInventoryItem, RecordMovement,
};
use agrolog_purchasing::{
    NewPurchase, NewSupplier, Purchase, PurchaseId, Supplier, SupplierId, SupplierPatch,
};

const ACTIVITIES: &str = "activities";
const TEMPLATES: &str = "templates";
const SUPPLIERS: &str = "suppliers";
const PURCHASES: &str = "purchases";

/// Stock consumed by an activity (always a subtract movement).
#[derive(Debug, Clone)]
pub struct Consumption {
    pub item_id: InventoryItemId,
    pub amount: Decimal,
    pub unit: Unit,
    pub day: Option<NaiveDate>,
    pub module: Option<MovementModule>,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct AppServices {
    activities: Arc<dyn DocumentStore<ActivityId, Activity>>,
    templates: Arc<dyn DocumentStore<TemplateId, Template>>,
    suppliers: Arc<dyn DocumentStore<SupplierId, Supplier>>,
    purchases: Arc<dyn DocumentStore<PurchaseId, Purchase>>,
    ledger: InventoryLedger,
    waitlist: WaitlistService,
}

impl AppServices {
    pub fn in_memory(config: &AppConfig) -> Result<Self, StoreError> {
        Ok(Self {
            activities: Arc::new(InMemoryDocumentStore::<ActivityId, Activity>::new()),
            templates: Arc::new(InMemoryDocumentStore::<TemplateId, Template>::new()),
            suppliers: Arc::new(InMemoryDocumentStore::<SupplierId, Supplier>::new()),
            purchases: Arc::new(InMemoryDocumentStore::<PurchaseId, Purchase>::new()),
            ledger: InventoryLedger::new(Arc::new(InMemoryMovementJournal::new()), config.ledger_max_retries),
            waitlist: waitlist_service(
                config,
                Arc::new(InMemoryDocumentStore::<String, WaitlistEntry>::new()),
            )?,
        })
    }

    /// Postgres-backed stores. The schema must already be migrated.
    pub fn persistent(config: &AppConfig, pool: PgPool) -> Result<Self, StoreError> {
        Ok(Self {
            activities: Arc::new(PostgresDocumentStore::<ActivityId, Activity>::new(pool.clone(), ACTIVITIES)),
            templates: Arc::new(PostgresDocumentStore::<TemplateId, Template>::new(pool.clone(), TEMPLATES)),
            suppliers: Arc::new(PostgresDocumentStore::<SupplierId, Supplier>::new(pool.clone(), SUPPLIERS)),
            purchases: Arc::new(PostgresDocumentStore::<PurchaseId, Purchase>::new(pool.clone(), PURCHASES)),
            ledger: InventoryLedger::new(
                Arc::new(PostgresMovementJournal::new(pool.clone())),
                config.ledger_max_retries,
            ),
            waitlist: waitlist_service(
                config,
                Arc::new(PostgresDocumentStore::<String, WaitlistEntry>::new(pool, WAITLIST_COLLECTION)),
            )?,
        })
    }

    // -------------------------
    // Activities
    // -------------------------

    pub async fn create_activity(&self, owner_id: OwnerId, draft: ActivityDraft) -> ServiceResult<Activity> {
        let activity = Activity::create(owner_id, ActivityId::new(RecordId::new()), draft, Utc::now())?;
        self.activities
            .put(owner_id, activity.id_typed(), activity.clone(), ExpectedVersion::Exact(0))
            .await?;
        tracing::info!(activity_id = %activity.id_typed(), total_cost = %activity.total_cost(), "activity created");
        Ok(activity)
    }

    /// Newest first.
    pub async fn list_activities(&self, owner_id: OwnerId, filter: &ActivityFilter) -> ServiceResult<Vec<Activity>> {
        let mut activities: Vec<Activity> = self
            .activities
            .list(owner_id)
            .await?
            .into_iter()
            .map(|v| v.value)
            .filter(|a| filter.matches(a))
            .collect();
        activities.sort_by(|a, b| b.date().cmp(&a.date()).then(b.created_at().cmp(&a.created_at())));
        Ok(activities)
    }

    pub async fn get_activity(&self, owner_id: OwnerId, id: ActivityId) -> ServiceResult<Activity> {
        fetch(self.activities.as_ref(), owner_id, &id).await
    }

    pub async fn update_activity(
        &self,
        owner_id: OwnerId,
        id: ActivityId,
        draft: ActivityDraft,
    ) -> ServiceResult<Activity> {
        modify(self.activities.as_ref(), owner_id, id, |a| a.revise(draft, Utc::now())).await
    }

    pub async fn delete_activity(&self, owner_id: OwnerId, id: ActivityId) -> ServiceResult<()> {
        remove(self.activities.as_ref(), owner_id, &id).await
    }

    pub async fn activity_summary(&self, owner_id: OwnerId, filter: &ActivityFilter) -> ServiceResult<Vec<CropSummary>> {
        let activities = self.list_activities(owner_id, filter).await?;
        Ok(summarize_by_crop(&activities)?)
    }

    /// Book stock used by an activity as a subtract movement linked to it.
    ///
    /// `day` must be the activity date or one of its fertigation days.
    pub async fn consume_for_activity(
        &self,
        owner_id: OwnerId,
        activity_id: ActivityId,
        consumption: Consumption,
    ) -> ServiceResult<(InventoryItem, InventoryMovement)> {
        let activity = self.get_activity(owner_id, activity_id).await?;
        if let Some(day) = consumption.day {
            if day != activity.date() && !activity.has_fertigation_day(day) {
                return Err(DomainError::validation(format!(
                    "day {day} is neither the activity date nor one of its fertigation days"
                ))
                .into());
            }
        }

        let mut cmd = RecordMovement::new(
            owner_id,
            consumption.item_id,
            MovementOperation::Subtract,
            consumption.amount,
            consumption.unit,
        );
        cmd.activity_id = Some(activity_id.0);
        cmd.day = consumption.day;
        cmd.module = consumption.module;
        cmd.note = consumption.note;
        self.ledger.record_movement(cmd).await
    }

    // -------------------------
    // Inventory
    // -------------------------

    pub async fn create_item(
        &self,
        owner_id: OwnerId,
        input: NewInventoryItem,
    ) -> ServiceResult<(InventoryItem, Option<InventoryMovement>)> {
        self.ledger.create_item(owner_id, input).await
    }

    pub async fn list_items(
        &self,
        owner_id: OwnerId,
        category: Option<ItemCategory>,
        low_stock_only: bool,
    ) -> ServiceResult<Vec<InventoryItem>> {
        let items = self.ledger.list_items(owner_id).await?;
        Ok(items
            .into_iter()
            .filter(|i| category.is_none_or(|c| i.category() == c))
            .filter(|i| !low_stock_only || i.is_below_minimum())
            .collect())
    }

    pub async fn get_item(&self, owner_id: OwnerId, id: InventoryItemId) -> ServiceResult<InventoryItem> {
        self.ledger.get_item(owner_id, id).await
    }

    pub async fn update_item(
        &self,
        owner_id: OwnerId,
        id: InventoryItemId,
        patch: ItemDetailsPatch,
    ) -> ServiceResult<InventoryItem> {
        self.ledger.update_details(owner_id, id, patch).await
    }

    pub async fn delete_item(&self, owner_id: OwnerId, id: InventoryItemId) -> ServiceResult<()> {
        self.ledger.delete_item(owner_id, id).await
    }

    pub async fn record_movement(&self, cmd: RecordMovement) -> ServiceResult<(InventoryItem, InventoryMovement)> {
        self.ledger.record_movement(cmd).await
    }

    pub async fn movements(&self, owner_id: OwnerId, query: &MovementQuery) -> ServiceResult<Vec<InventoryMovement>> {
        self.ledger.movements(owner_id, query).await
    }

    // -------------------------
    // Suppliers
    // -------------------------

    pub async fn create_supplier(&self, owner_id: OwnerId, input: NewSupplier) -> ServiceResult<Supplier> {
        let supplier = Supplier::create(owner_id, SupplierId::new(RecordId::new()), input, Utc::now())?;
        self.suppliers
            .put(owner_id, supplier.id_typed(), supplier.clone(), ExpectedVersion::Exact(0))
            .await?;
        Ok(supplier)
    }

    /// Sorted by name; inactive suppliers only when asked for.
    pub async fn list_suppliers(&self, owner_id: OwnerId, include_inactive: bool) -> ServiceResult<Vec<Supplier>> {
        let mut suppliers: Vec<Supplier> = self
            .suppliers
            .list(owner_id)
            .await?
            .into_iter()
            .map(|v| v.value)
            .filter(|s| include_inactive || s.is_active())
            .collect();
        suppliers.sort_by_key(|s| s.name().to_lowercase());
        Ok(suppliers)
    }

    pub async fn get_supplier(&self, owner_id: OwnerId, id: SupplierId) -> ServiceResult<Supplier> {
        fetch(self.suppliers.as_ref(), owner_id, &id).await
    }

    pub async fn update_supplier(
        &self,
        owner_id: OwnerId,
        id: SupplierId,
        patch: SupplierPatch,
    ) -> ServiceResult<Supplier> {
        modify(self.suppliers.as_ref(), owner_id, id, |s| s.update(patch, Utc::now())).await
    }

    /// Soft delete.
    pub async fn deactivate_supplier(&self, owner_id: OwnerId, id: SupplierId) -> ServiceResult<Supplier> {
        modify(self.suppliers.as_ref(), owner_id, id, |s| {
            s.deactivate(Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn reactivate_supplier(&self, owner_id: OwnerId, id: SupplierId) -> ServiceResult<Supplier> {
        modify(self.suppliers.as_ref(), owner_id, id, |s| {
            s.reactivate(Utc::now());
            Ok(())
        })
        .await
    }

    // -------------------------
    // Purchases
    // -------------------------

    /// Record a purchase; a linked inventory item receives an `add` movement.
    ///
    /// When booking the movement fails the purchase is removed again and the
    /// ledger error is returned.
    pub async fn create_purchase(
        &self,
        owner_id: OwnerId,
        input: NewPurchase,
    ) -> ServiceResult<(Purchase, Option<InventoryMovement>)> {
        let supplier = self.get_supplier(owner_id, input.supplier_id).await?;
        let purchase = Purchase::create(owner_id, PurchaseId::new(RecordId::new()), &supplier, input, Utc::now())?;
        self.purchases
            .put(owner_id, purchase.id_typed(), purchase.clone(), ExpectedVersion::Exact(0))
            .await?;

        let Some(item_id) = purchase.inventory_item_id() else {
            return Ok((purchase, None));
        };

        let mut cmd = RecordMovement::new(
            owner_id,
            item_id,
            MovementOperation::Add,
            purchase.quantity(),
            purchase.unit(),
        );
        cmd.purchase_id = Some(purchase.id_typed().0);
        cmd.note = Some(format!("purchase of {}", purchase.product_name()));

        match self.ledger.record_movement(cmd).await {
            Ok((_, movement)) => Ok((purchase, Some(movement))),
            Err(e) => {
                tracing::warn!(purchase_id = %purchase.id_typed(), error = %e, "stock booking failed; removing purchase");
                if let Err(cleanup) = self.purchases.delete(owner_id, &purchase.id_typed()).await {
                    tracing::error!(purchase_id = %purchase.id_typed(), error = %cleanup, "failed to remove purchase");
                }
                Err(e)
            }
        }
    }

    /// Newest purchase date first.
    pub async fn list_purchases(
        &self,
        owner_id: OwnerId,
        supplier_id: Option<SupplierId>,
    ) -> ServiceResult<Vec<Purchase>> {
        let mut purchases: Vec<Purchase> = self
            .purchases
            .list(owner_id)
            .await?
            .into_iter()
            .map(|v| v.value)
            .filter(|p| supplier_id.is_none_or(|s| p.supplier_id() == s))
            .collect();
        purchases.sort_by(|a, b| {
            b.purchase_date()
                .cmp(&a.purchase_date())
                .then(b.created_at().cmp(&a.created_at()))
        });
        Ok(purchases)
    }

    pub async fn get_purchase(&self, owner_id: OwnerId, id: PurchaseId) -> ServiceResult<Purchase> {
        fetch(self.purchases.as_ref(), owner_id, &id).await
    }

    /// Removes the purchase record; stock already booked stays in the ledger.
    pub async fn delete_purchase(&self, owner_id: OwnerId, id: PurchaseId) -> ServiceResult<()> {
        remove(self.purchases.as_ref(), owner_id, &id).await
    }

    // -------------------------
    // Templates
    // -------------------------

    pub async fn create_template(&self, owner_id: OwnerId, input: NewTemplate) -> ServiceResult<Template> {
        let template = Template::create(owner_id, TemplateId::new(RecordId::new()), input, Utc::now())?;
        self.ensure_template_is_unique(owner_id, &template).await?;
        self.templates
            .put(owner_id, template.id_typed(), template.clone(), ExpectedVersion::Exact(0))
            .await?;
        Ok(template)
    }

    pub async fn list_templates(&self, owner_id: OwnerId, kind: Option<TemplateKind>) -> ServiceResult<Vec<Template>> {
        let mut templates: Vec<Template> = self
            .templates
            .list(owner_id)
            .await?
            .into_iter()
            .map(|v| v.value)
            .filter(|t| kind.is_none_or(|k| t.kind() == k))
            .collect();
        templates.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        Ok(templates)
    }

    pub async fn get_template(&self, owner_id: OwnerId, id: TemplateId) -> ServiceResult<Template> {
        fetch(self.templates.as_ref(), owner_id, &id).await
    }

    pub async fn update_template(
        &self,
        owner_id: OwnerId,
        id: TemplateId,
        input: NewTemplate,
    ) -> ServiceResult<Template> {
        let current = self
            .templates
            .get(owner_id, &id)
            .await?
            .ok_or_else(ServiceError::not_found)?;
        let mut template = current.value;
        template.revise(input, Utc::now())?;
        self.ensure_template_is_unique(owner_id, &template).await?;
        self.templates
            .put(owner_id, id, template.clone(), ExpectedVersion::Exact(current.version))
            .await?;
        Ok(template)
    }

    pub async fn delete_template(&self, owner_id: OwnerId, id: TemplateId) -> ServiceResult<()> {
        remove(self.templates.as_ref(), owner_id, &id).await
    }

    /// Case-insensitive (name, kind) must be free. Postgres backs this with a
    /// unique index for racing writers.
    async fn ensure_template_is_unique(&self, owner_id: OwnerId, template: &Template) -> ServiceResult<()> {
        let taken = self
            .templates
            .list(owner_id)
            .await?
            .iter()
            .any(|v| v.value.collides_with(template));
        if taken {
            return Err(DomainError::conflict(format!(
                "a {:?} template named '{}' already exists",
                template.kind(),
                template.name()
            ))
            .into());
        }
        Ok(())
    }

    // -------------------------
    // Waitlist
    // -------------------------

    pub async fn join_waitlist(&self, email: &str, name: Option<String>) -> ServiceResult<Signup> {
        self.waitlist.join(email, name).await
    }
}

fn waitlist_service(
    config: &AppConfig,
    store: Arc<dyn DocumentStore<String, WaitlistEntry>>,
) -> Result<WaitlistService, StoreError> {
    let limiter = RateLimiter::new(
        counter_store(config)?,
        config.waitlist_rate_limit,
        config.waitlist_rate_window,
    );
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    Ok(WaitlistService::new(store, limiter, notifier))
}

fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, StoreError> {
    #[cfg(feature = "redis")]
    {
        if let Some(url) = &config.redis_url {
            tracing::info!("using redis rate-limit counters");
            return Ok(Arc::new(agrolog_infra::rate_limit::RedisCounterStore::new(url)?));
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the redis feature is disabled; using in-memory counters");
        }
    }
    Ok(Arc::new(InMemoryCounterStore::new()))
}

async fn fetch<K, V>(store: &dyn DocumentStore<K, V>, owner_id: OwnerId, key: &K) -> ServiceResult<V>
where
    K: DocumentKey,
{
    store
        .get(owner_id, key)
        .await?
        .map(|v| v.value)
        .ok_or_else(ServiceError::not_found)
}

/// Load, mutate, write back under the loaded version. A concurrent edit is a `Conflict`.
async fn modify<K, V, F>(store: &dyn DocumentStore<K, V>, owner_id: OwnerId, key: K, mutate: F) -> ServiceResult<V>
where
    K: DocumentKey,
    V: Clone,
    F: FnOnce(&mut V) -> DomainResult<()>,
{
    let current = store
        .get(owner_id, &key)
        .await?
        .ok_or_else(ServiceError::not_found)?;
    let mut value = current.value;
    mutate(&mut value)?;
    store
        .put(owner_id, key, value.clone(), ExpectedVersion::Exact(current.version))
        .await?;
    Ok(value)
}

async fn remove<K, V>(store: &dyn DocumentStore<K, V>, owner_id: OwnerId, key: &K) -> ServiceResult<()>
where
    K: DocumentKey,
{
    if store.delete(owner_id, key).await? {
        Ok(())
    } else {
        Err(ServiceError::not_found())
    }
}
