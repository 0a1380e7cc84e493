use crate::core::balance_sheet::BalanceSheet;
use crate::core::error::{LedgerError, LedgerResult, ValidationError};
use crate::core::expense::Expense;
use crate::core::user::UserId;
use crate::optimization::simplify::{DebtSimplifier, SimplificationResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an expense-sharing group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A group of users sharing expenses, with its own balance sheet.
///
/// The group guards its sheet: only current members may take part in its
/// expenses and settlements, and a member can only leave once every balance
/// they hold in the group is settled. Each operation validates completely
/// before mutating anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    name: String,
    members: Vec<UserId>,
    sheet: BalanceSheet,
    #[serde(default)]
    expenses: Vec<Expense>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
            sheet: BalanceSheet::new(),
            expenses: Vec::new(),
        }
    }

    /// Create a group and add `members` in order.
    pub fn with_members(
        id: GroupId,
        name: impl Into<String>,
        members: impl IntoIterator<Item = UserId>,
    ) -> Self {
        let mut group = Self::new(id, name);
        for member in members {
            group.add_member(member);
        }
        group
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn sheet(&self) -> &BalanceSheet {
        &self.sheet
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Append `user` to the member list. Returns false if already a member.
    pub fn add_member(&mut self, user: UserId) -> bool {
        if self.is_member(&user) {
            return false;
        }
        self.sheet.add_member(&user);
        self.members.push(user);
        true
    }

    /// Remove `user`, provided they hold no balance with anyone in the group.
    pub fn remove_member(&mut self, user: &UserId) -> LedgerResult<()> {
        self.ensure_members([user])?;
        if !self.sheet.is_fully_settled(user) {
            return Err(LedgerError::Precondition {
                group: self.id.clone(),
                user: user.clone(),
                outstanding: self.sheet.row(user).map_or(0, |row| row.len()),
            });
        }
        self.sheet.remove_member(user);
        self.members.retain(|m| m != user);
        Ok(())
    }

    /// Fail with a membership error on the first id that is not a member.
    pub fn ensure_members<'a>(&self, users: impl IntoIterator<Item = &'a UserId>) -> LedgerResult<()> {
        match users.into_iter().find(|u| !self.is_member(u)) {
            Some(outsider) => Err(LedgerError::Membership {
                group: self.id.clone(),
                user: outsider.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Apply an expense to the sheet and keep it in the group history.
    ///
    /// Every participant's share becomes a debt to the payer; the payer's own
    /// share is skipped. Balances are only touched once every share is known
    /// to fit.
    pub fn record_expense(&mut self, expense: Expense) -> LedgerResult<&Expense> {
        self.ensure_members(expense.involved())?;
        self.sheet.check_transfers(
            expense
                .transfers()
                .map(|split| (&split.participant, expense.payer(), split.owed)),
        )?;
        for split in expense.transfers() {
            self.sheet
                .apply_transfer(&split.participant, expense.payer(), split.owed)?;
        }
        self.expenses.push(expense);
        Ok(&self.expenses[self.expenses.len() - 1])
    }

    /// Record a direct payment of `amount` from `from` to `to`.
    ///
    /// A payment reduces what `from` owes `to` (or makes `to` owe `from`).
    pub fn settle(&mut self, from: &UserId, to: &UserId, amount: Decimal) -> LedgerResult<()> {
        validate_settlement(from, to, amount)?;
        self.ensure_members([from, to])?;
        self.sheet.apply_transfer(to, from, amount)?;
        Ok(())
    }

    /// Replace the sheet with a simplified one carrying the same net positions.
    pub fn simplify(&mut self) -> SimplificationResult {
        let result = DebtSimplifier::simplify(&self.sheet);
        self.sheet = result.sheet().clone();
        result
    }

    /// Group balances of one member, keyed by counterparty.
    pub fn balances_of(&self, user: &UserId) -> LedgerResult<BTreeMap<UserId, Decimal>> {
        self.ensure_members([user])?;
        Ok(self.sheet.balances_of(user))
    }

    /// Check that the sheet and member list agree and the sheet invariants hold.
    pub fn validate(&self) -> LedgerResult<()> {
        self.sheet.validate()?;
        if let Some(stranger) = self.sheet.members().find(|m| !self.is_member(m)) {
            return Err(LedgerError::InconsistentState(format!(
                "{stranger} has balances in group {} but is not a member",
                self.id
            )));
        }
        Ok(())
    }
}

/// Shared checks for a direct payment between two users.
pub(crate) fn validate_settlement(from: &UserId, to: &UserId, amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount).into());
    }
    if from == to {
        return Err(ValidationError::SelfSettlement(from.clone()).into());
    }
    Ok(())
}
