use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrolog_core::{DomainError, DomainResult, OwnerId, RecordId, Unit};

use crate::item::InventoryItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementOperation {
    Add,
    Subtract,
}

impl MovementOperation {
    /// Signed effect of `amount` on the balance.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            MovementOperation::Add => amount,
            MovementOperation::Subtract => -amount,
        }
    }
}

/// Dashboard module that caused a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementModule {
    Fertigation,
    Phytosanitary,
    Water,
}

impl core::str::FromStr for MovementModule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fertigation" => Ok(MovementModule::Fertigation),
            "phytosanitary" => Ok(MovementModule::Phytosanitary),
            "water" => Ok(MovementModule::Water),
            _ => Err(DomainError::validation(
                "module must be one of: fertigation, phytosanitary, water",
            )),
        }
    }
}

/// Immutable ledger entry: one add/subtract applied to an inventory item.
///
/// `sequence` is gapless per item (1, 2, ...) and `balance_after` is the item
/// quantity right after this movement was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub item_id: InventoryItemId,
    pub sequence: u64,
    pub operation: MovementOperation,
    /// Amount in the movement's own unit.
    pub amount: Decimal,
    pub unit: Unit,
    /// Amount normalized into the item's unit.
    pub amount_in_item_unit: Decimal,
    pub balance_after: Decimal,
    pub activity_id: Option<RecordId>,
    pub day: Option<NaiveDate>,
    pub module: Option<MovementModule>,
    pub purchase_id: Option<RecordId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    pub fn signed_amount(&self) -> Decimal {
        self.operation.signed(self.amount_in_item_unit)
    }
}

/// Filter over an owner's movements (every field optional, all must match).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementQuery {
    pub item_id: Option<InventoryItemId>,
    pub activity_id: Option<RecordId>,
    pub module: Option<MovementModule>,
    pub day: Option<NaiveDate>,
}

impl MovementQuery {
    pub fn for_item(item_id: InventoryItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, m: &InventoryMovement) -> bool {
        self.item_id.is_none_or(|id| id == m.item_id)
            && self.activity_id.is_none_or(|id| Some(id) == m.activity_id)
            && self.module.is_none_or(|module| Some(module) == m.module)
            && self.day.is_none_or(|day| Some(day) == m.day)
    }
}

/// Check that `movements` (one item) reconstruct the quantity series from `opening`.
///
/// Movements are ordered by sequence; sequences must be consecutive, a trail
/// starting from a zero opening balance must start at sequence 1, and every
/// `balance_after` must equal the running prefix sum. Returns the final balance.
pub fn verify_trail(opening: Decimal, movements: &[InventoryMovement]) -> DomainResult<Decimal> {
    let mut sorted: Vec<&InventoryMovement> = movements.iter().collect();
    sorted.sort_by_key(|m| m.sequence);

    let mut balance = opening;
    let mut expected_seq: Option<u64> = opening.is_zero().then_some(1);
    for m in sorted {
        if let Some(seq) = expected_seq {
            if m.sequence != seq {
                return Err(DomainError::invariant(format!(
                    "movement sequence gap (expected {seq}, found {})",
                    m.sequence
                )));
            }
        }
        balance = balance
            .checked_add(m.signed_amount())
            .ok_or_else(|| DomainError::invariant(format!("movement {} overflows the balance", m.sequence)))?;
        if balance != m.balance_after {
            return Err(DomainError::invariant(format!(
                "movement {} records balance {} but trail gives {}",
                m.sequence, m.balance_after, balance
            )));
        }
        expected_seq = Some(m.sequence + 1);
    }
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mv(seq: u64, op: MovementOperation, amount: Decimal, balance_after: Decimal) -> InventoryMovement {
        InventoryMovement {
            id: RecordId::new(),
            owner_id: OwnerId::new(),
            item_id: InventoryItemId::new(RecordId::new()),
            sequence: seq,
            operation: op,
            amount,
            unit: Unit::Kilogram,
            amount_in_item_unit: amount,
            balance_after,
            activity_id: None,
            day: None,
            module: None,
            purchase_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn trail_reconstructs_final_balance_in_any_input_order() {
        let trail = vec![
            mv(2, MovementOperation::Subtract, dec!(2), dec!(98)),
            mv(1, MovementOperation::Add, dec!(100), dec!(100)),
            mv(3, MovementOperation::Add, dec!(0.5), dec!(98.5)),
        ];
        assert_eq!(verify_trail(Decimal::ZERO, &trail).unwrap(), dec!(98.5));
    }

    #[test]
    fn trail_from_zero_must_start_at_first_sequence() {
        let headless = vec![
            mv(2, MovementOperation::Add, dec!(10), dec!(10)),
            mv(3, MovementOperation::Add, dec!(5), dec!(15)),
        ];
        assert!(matches!(
            verify_trail(Decimal::ZERO, &headless),
            Err(DomainError::InvariantViolation(_))
        ));

        // A suffix checked from a known non-zero balance may start anywhere.
        let suffix = vec![mv(7, MovementOperation::Subtract, dec!(4), dec!(6))];
        assert_eq!(verify_trail(dec!(10), &suffix).unwrap(), dec!(6));
    }

    #[test]
    fn trail_detects_tampered_balance() {
        let trail = vec![
            mv(1, MovementOperation::Add, dec!(100), dec!(100)),
            mv(2, MovementOperation::Subtract, dec!(2), dec!(97)),
        ];
        assert!(matches!(
            verify_trail(Decimal::ZERO, &trail),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn trail_detects_sequence_gap() {
        let trail = vec![
            mv(1, MovementOperation::Add, dec!(10), dec!(10)),
            mv(3, MovementOperation::Add, dec!(10), dec!(20)),
        ];
        assert!(verify_trail(Decimal::ZERO, &trail).is_err());
    }

    #[test]
    fn query_matches_on_every_given_field() {
        let mut m = mv(1, MovementOperation::Subtract, dec!(1), dec!(0));
        let activity = RecordId::new();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        m.activity_id = Some(activity);
        m.module = Some(MovementModule::Fertigation);
        m.day = Some(day);

        assert!(MovementQuery::default().matches(&m));
        assert!(MovementQuery::for_item(m.item_id).matches(&m));
        let q = MovementQuery {
            activity_id: Some(activity),
            module: Some(MovementModule::Fertigation),
            day: Some(day),
            ..MovementQuery::default()
        };
        assert!(q.matches(&m));
        let q = MovementQuery {
            module: Some(MovementModule::Water),
            ..MovementQuery::default()
        };
        assert!(!q.matches(&m));
    }

    #[test]
    fn module_parses_case_insensitively() {
        assert_eq!("Water".parse::<MovementModule>().unwrap(), MovementModule::Water);
        assert!("irrigation".parse::<MovementModule>().is_err());
    }
}
