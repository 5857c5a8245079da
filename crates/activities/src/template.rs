use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrolog_core::{AggregateRoot, DomainError, DomainResult, OwnerId, RecordId};

use crate::activity::ProductUsage;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub RecordId);

impl TemplateId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Fertigation,
    Phytosanitary,
    Activity,
}

impl core::str::FromStr for TemplateKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fertigation" => Ok(TemplateKind::Fertigation),
            "phytosanitary" => Ok(TemplateKind::Phytosanitary),
            "activity" => Ok(TemplateKind::Activity),
            _ => Err(DomainError::validation(
                "kind must be one of: fertigation, phytosanitary, activity",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub kind: TemplateKind,
    #[serde(default)]
    pub products: Vec<ProductUsage>,
    pub notes: Option<String>,
}

impl NewTemplate {
    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        for p in &self.products {
            p.validate()?;
        }
        Ok(())
    }
}

/// Aggregate root: Template.
///
/// Unique per owner on `(lowercase name, kind)`; the store layer enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    id: TemplateId,
    owner_id: OwnerId,
    name: String,
    kind: TemplateKind,
    products: Vec<ProductUsage>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Template {
    pub fn create(
        owner_id: OwnerId,
        id: TemplateId,
        input: NewTemplate,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            owner_id,
            name: input.name.trim().to_string(),
            kind: input.kind,
            products: input.products,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn revise(&mut self, input: NewTemplate, now: DateTime<Utc>) -> DomainResult<()> {
        input.validate()?;
        self.name = input.name.trim().to_string();
        self.kind = input.kind;
        self.products = input.products;
        self.notes = input.notes;
        self.updated_at = now;
        Ok(())
    }

    pub fn id_typed(&self) -> TemplateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn products(&self) -> &[ProductUsage] {
        &self.products
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Key used for the per-owner uniqueness check.
    pub fn unique_key(&self) -> (String, TemplateKind) {
        (self.name.to_lowercase(), self.kind)
    }

    /// Whether `other` (a different template of the same owner) would collide with this one.
    pub fn collides_with(&self, other: &Template) -> bool {
        self.id != other.id && self.owner_id == other.owner_id && self.unique_key() == other.unique_key()
    }
}

impl AggregateRoot for Template {
    type Id = TemplateId;

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
    use crate::activity::tests::usage;
    use rust_decimal_macros::dec;

    fn new_template(name: &str, kind: TemplateKind) -> NewTemplate {
        NewTemplate {
            name: name.to_string(),
            kind,
            products: vec![usage("Cal nitrate", dec!(3), dec!(0.8))],
            notes: None,
        }
    }

    #[test]
    fn same_name_and_kind_collide_ignoring_case() {
        let owner = OwnerId::new();
        let a = Template::create(
            owner,
            TemplateId::new(RecordId::new()),
            new_template("Week 1", TemplateKind::Fertigation),
            Utc::now(),
        )
        .unwrap();
        let b = Template::create(
            owner,
            TemplateId::new(RecordId::new()),
            new_template(" week 1 ", TemplateKind::Fertigation),
            Utc::now(),
        )
        .unwrap();
        let c = Template::create(
            owner,
            TemplateId::new(RecordId::new()),
            new_template("Week 1", TemplateKind::Phytosanitary),
            Utc::now(),
        )
        .unwrap();

        assert!(a.collides_with(&b));
        assert!(!a.collides_with(&c));
        assert!(!a.collides_with(&a));
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = Template::create(
            OwnerId::new(),
            TemplateId::new(RecordId::new()),
            new_template("  ", TemplateKind::Activity),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn kind_parses() {
        assert_eq!("Activity".parse::<TemplateKind>().unwrap(), TemplateKind::Activity);
        assert!("harvest".parse::<TemplateKind>().is_err());
    }
}
