use crate::core::error::ValidationError;
use crate::core::group::GroupId;
use crate::core::split::{Split, SplitPolicy};
use crate::core::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded shared expense.
///
/// Expenses are immutable once created and kept for history only: balances
/// are updated when the expense is recorded and are never recomputed by
/// replaying the expense list.
///
/// # Examples
///
/// ```
/// use split_ledger::core::expense::ExpenseRequest;
/// use split_ledger::core::user::UserId;
/// use rust_decimal_macros::dec;
///
/// let people = vec![UserId::new("A"), UserId::new("B")];
/// let expense = ExpenseRequest::equal("Taxi", dec!(30), UserId::new("A"), people)
///     .into_expense(None)
///     .unwrap();
///
/// assert_eq!(expense.splits()[1].owed, dec!(15));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    id: Uuid,
    description: String,
    total: Decimal,
    payer: UserId,
    splits: Vec<Split>,
    policy: SplitPolicy,
    group: Option<GroupId>,
    created_at: DateTime<Utc>,
}

impl Expense {
    /// Create an expense from already-computed splits.
    pub fn new(
        description: impl Into<String>,
        total: Decimal,
        payer: UserId,
        splits: Vec<Split>,
        policy: SplitPolicy,
        group: Option<GroupId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            total,
            payer,
            splits,
            policy,
            group,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn payer(&self) -> &UserId {
        &self.payer
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    pub fn group(&self) -> Option<&GroupId> {
        self.group.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Payer and every participant, without duplicates, in first-seen order.
    pub fn involved(&self) -> Vec<&UserId> {
        let mut ids = vec![&self.payer];
        for split in &self.splits {
            if !ids.contains(&&split.participant) {
                ids.push(&split.participant);
            }
        }
        ids
    }

    /// Splits that move money: every share not owed by the payer.
    pub fn transfers(&self) -> impl Iterator<Item = &Split> {
        self.splits.iter().filter(move |s| s.participant != self.payer)
    }
}

/// Caller-side description of an expense before its splits are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRequest {
    pub description: String,
    pub total: Decimal,
    pub payer: UserId,
    pub participants: Vec<UserId>,
    pub policy: SplitPolicy,
    #[serde(default)]
    pub values: Vec<Decimal>,
}

impl ExpenseRequest {
    pub fn equal(
        description: impl Into<String>,
        total: Decimal,
        payer: UserId,
        participants: Vec<UserId>,
    ) -> Self {
        Self {
            description: description.into(),
            total,
            payer,
            participants,
            policy: SplitPolicy::Equal,
            values: Vec::new(),
        }
    }

    /// Split by explicit amounts, one per participant.
    pub fn exact(
        description: impl Into<String>,
        total: Decimal,
        payer: UserId,
        participants: Vec<UserId>,
        amounts: Vec<Decimal>,
    ) -> Self {
        Self {
            description: description.into(),
            total,
            payer,
            participants,
            policy: SplitPolicy::Exact,
            values: amounts,
        }
    }

    /// Split by percentages, one per participant.
    pub fn percent(
        description: impl Into<String>,
        total: Decimal,
        payer: UserId,
        participants: Vec<UserId>,
        percentages: Vec<Decimal>,
    ) -> Self {
        Self {
            description: description.into(),
            total,
            payer,
            participants,
            policy: SplitPolicy::Percent,
            values: percentages,
        }
    }

    /// Payer and participants, without duplicates.
    pub fn involved(&self) -> Vec<&UserId> {
        let mut ids = vec![&self.payer];
        for p in &self.participants {
            if !ids.contains(&p) {
                ids.push(p);
            }
        }
        ids
    }

    /// Compute the splits and build the immutable expense record.
    pub fn into_expense(self, group: Option<GroupId>) -> Result<Expense, ValidationError> {
        if self.total <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.total));
        }
        let splits = self
            .policy
            .calculate(self.total, &self.participants, &self.values)?;
        Ok(Expense::new(
            self.description,
            self.total,
            self.payer,
            splits,
            self.policy,
            group,
        ))
    }
}
