use crate::core::error::ValidationError;
use crate::core::money::{checked_sum, EPSILON};
use crate::core::user::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One participant's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub participant: UserId,
    pub owed: Decimal,
}

impl Split {
    pub fn new(participant: UserId, owed: Decimal) -> Self {
        Self { participant, owed }
    }
}

/// Rule used to divide an expense total among its participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Everyone owes `total / participants`; values are ignored.
    Equal,
    /// Values are the amounts owed and must sum to the total.
    Exact,
    /// Values are percentages of the total and must sum to 100.
    Percent,
}

type SplitFn = fn(Decimal, &[UserId], &[Decimal]) -> Result<Vec<Split>, ValidationError>;

impl SplitPolicy {
    pub const ALL: [SplitPolicy; 3] = [SplitPolicy::Equal, SplitPolicy::Exact, SplitPolicy::Percent];

    fn calculator(self) -> SplitFn {
        match self {
            SplitPolicy::Equal => equal_splits,
            SplitPolicy::Exact => exact_splits,
            SplitPolicy::Percent => percent_splits,
        }
    }

    /// Turn `total` into per-participant shares under this policy.
    ///
    /// The result follows the order of `participants`.
    pub fn calculate(
        self,
        total: Decimal,
        participants: &[UserId],
        values: &[Decimal],
    ) -> Result<Vec<Split>, ValidationError> {
        (self.calculator())(total, participants, values)
    }
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitPolicy::Equal => "equal",
            SplitPolicy::Exact => "exact",
            SplitPolicy::Percent => "percent",
        };
        f.write_str(name)
    }
}

/// Free-function form of [`SplitPolicy::calculate`].
pub fn calculate_splits(
    policy: SplitPolicy,
    total: Decimal,
    participants: &[UserId],
    values: &[Decimal],
) -> Result<Vec<Split>, ValidationError> {
    policy.calculate(total, participants, values)
}

fn equal_splits(
    total: Decimal,
    participants: &[UserId],
    _values: &[Decimal],
) -> Result<Vec<Split>, ValidationError> {
    if participants.is_empty() {
        return Err(ValidationError::NoParticipants);
    }
    let share = total / Decimal::from(participants.len());
    Ok(participants
        .iter()
        .map(|p| Split::new(p.clone(), share))
        .collect())
}

fn exact_splits(
    total: Decimal,
    participants: &[UserId],
    values: &[Decimal],
) -> Result<Vec<Split>, ValidationError> {
    check_values(participants, values)?;
    let sum = checked_sum(values)?;
    if (sum - total).abs() > EPSILON {
        return Err(ValidationError::ExactSumMismatch { total, sum });
    }
    Ok(participants
        .iter()
        .zip(values)
        .map(|(p, v)| Split::new(p.clone(), *v))
        .collect())
}

fn percent_splits(
    total: Decimal,
    participants: &[UserId],
    values: &[Decimal],
) -> Result<Vec<Split>, ValidationError> {
    check_values(participants, values)?;
    let hundred = Decimal::ONE_HUNDRED;
    let sum = checked_sum(values)?;
    if (sum - hundred).abs() > EPSILON {
        return Err(ValidationError::PercentSumMismatch { sum });
    }
    participants
        .iter()
        .zip(values)
        .map(|(p, v)| {
            (*v / hundred)
                .checked_mul(total)
                .map(|owed| Split::new(p.clone(), owed))
                .ok_or(ValidationError::AmountOverflow)
        })
        .collect()
}

fn check_values(participants: &[UserId], values: &[Decimal]) -> Result<(), ValidationError> {
    if participants.is_empty() {
        return Err(ValidationError::NoParticipants);
    }
    if values.len() != participants.len() {
        return Err(ValidationError::ValueCountMismatch {
            expected: participants.len(),
            got: values.len(),
        });
    }
    if let Some(negative) = values.iter().find(|v| **v < Decimal::ZERO) {
        return Err(ValidationError::NegativeValue(*negative));
    }
    Ok(())
}
