use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrolog_core::{AggregateRoot, DomainError, DomainResult, OwnerId, RecordId};

/// Supplier identifier (owner-scoped via `owner_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub RecordId);

impl SupplierId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    fn validate(&self) -> DomainResult<()> {
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::validation("contact email is malformed"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    pub notes: Option<String>,
}

/// Partial update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub contact: Option<ContactInfo>,
    pub notes: Option<String>,
}

/// Aggregate root: Supplier.
///
/// Deleting a supplier only clears `active`; purchases keep pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    owner_id: OwnerId,
    name: String,
    tax_id: Option<String>,
    contact: ContactInfo,
    notes: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Supplier {
    pub fn create(
        owner_id: OwnerId,
        id: SupplierId,
        input: NewSupplier,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        input.contact.validate()?;
        Ok(Self {
            id,
            owner_id,
            name: input.name.trim().to_string(),
            tax_id: input.tax_id,
            contact: input.contact,
            notes: input.notes,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, patch: SupplierPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(contact) = &patch.contact {
            contact.validate()?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if patch.tax_id.is_some() {
            self.tax_id = patch.tax_id;
        }
        if let Some(contact) = patch.contact {
            self.contact = contact;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete. Idempotent.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.active {
            self.active = false;
            self.updated_at = now;
        }
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        if !self.active {
            self.active = true;
            self.updated_at = now;
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Inactive suppliers cannot take new purchases.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}
