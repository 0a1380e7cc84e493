use crate::core::error::{LedgerError, LedgerResult, ValidationError};
use crate::core::money::{approx_eq, checked_sum, is_negligible, next_balance};
use crate::core::user::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Rows = BTreeMap<UserId, BTreeMap<UserId, Decimal>>;

/// Pairwise debts between the members of one scope.
///
/// `balance(a, b)` is positive when `b` owes `a` and negative when `a` owes
/// `b`. The sheet maintains two invariants after every call:
///
/// - every pair is stored on both sides with opposite signs, and
/// - entries smaller than [`EPSILON`](crate::core::money::EPSILON) are
///   removed, so "settled" means "absent".
///
/// Members appear as (possibly empty) rows once added.
///
/// The sheet also tracks its gross total and refuses any transfer that
/// would push a balance or that total out of `Decimal` range. Every sum
/// over its debts is bounded by the gross total, so downstream arithmetic
/// cannot overflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Rows", into = "Rows")]
pub struct BalanceSheet {
    rows: Rows,
    /// Sum of every outstanding debt, each pair counted once.
    gross: Decimal,
}

/// Store `value` as `row[other]`, or drop the entry when it is zero.
pub(crate) fn store_entry(row: &mut BTreeMap<UserId, Decimal>, other: &UserId, value: Decimal) {
    if value.is_zero() {
        row.remove(other);
    } else {
        row.insert(other.clone(), value);
    }
}

/// Gross total after one pair moves from `before` to `after`.
fn shift_gross(gross: Decimal, before: Decimal, after: Decimal) -> Result<Decimal, ValidationError> {
    gross
        .checked_sub(before.abs())
        .and_then(|g| g.checked_add(after.abs()))
        .ok_or(ValidationError::AmountOverflow)
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sheet with an empty row for each member.
    pub fn with_members<'a>(members: impl IntoIterator<Item = &'a UserId>) -> Self {
        let mut sheet = Self::new();
        for member in members {
            sheet.add_member(member);
        }
        sheet
    }

    /// Ensure `member` has a row. Existing balances are left untouched.
    pub fn add_member(&mut self, member: &UserId) {
        self.rows.entry(member.clone()).or_default();
    }

    /// Drop `member`'s row if it is empty. Returns false (and changes
    /// nothing) while the member still has balances.
    pub fn remove_member(&mut self, member: &UserId) -> bool {
        if !self.is_fully_settled(member) {
            return false;
        }
        self.rows.remove(member);
        true
    }

    /// Record that `from` owes `to` an additional `amount`.
    ///
    /// A negative amount reverses the direction. Transfers from a member to
    /// themselves are ignored. On overflow the sheet is left unchanged.
    pub fn apply_transfer(
        &mut self,
        from: &UserId,
        to: &UserId,
        amount: Decimal,
    ) -> Result<(), ValidationError> {
        if from == to {
            return Ok(());
        }
        let current = self.balance(to, from);
        let next = next_balance(current, amount)?;
        self.gross = shift_gross(self.gross, current, next)?;
        self.store_pair(to, from, next);
        Ok(())
    }

    /// Check that applying `transfers` in order would succeed, without
    /// touching the sheet.
    pub fn check_transfers<'a>(
        &self,
        transfers: impl IntoIterator<Item = (&'a UserId, &'a UserId, Decimal)>,
    ) -> Result<(), ValidationError> {
        let mut pending: BTreeMap<(&UserId, &UserId), Decimal> = BTreeMap::new();
        let mut gross = self.gross;
        for (from, to, amount) in transfers {
            if from == to {
                continue;
            }
            let current = pending
                .get(&(to, from))
                .copied()
                .unwrap_or_else(|| self.balance(to, from));
            let next = next_balance(current, amount)?;
            gross = shift_gross(gross, current, next)?;
            pending.insert((to, from), next);
            pending.insert((from, to), -next);
        }
        Ok(())
    }

    /// Set a debt between two members that hold no balance with each other.
    ///
    /// Used when building a sheet from payments whose total is already
    /// bounded by another sheet's gross.
    pub(crate) fn record_debt(&mut self, debtor: &UserId, creditor: &UserId, amount: Decimal) {
        if debtor == creditor || is_negligible(amount) {
            return;
        }
        self.store_pair(creditor, debtor, amount);
        self.gross += amount.abs();
    }

    fn store_pair(&mut self, member: &UserId, other: &UserId, value: Decimal) {
        store_entry(self.rows.entry(member.clone()).or_default(), other, value);
        store_entry(self.rows.entry(other.clone()).or_default(), member, -value);
    }

    /// Signed balance of `member` against `other`.
    pub fn balance(&self, member: &UserId, other: &UserId) -> Decimal {
        self.rows
            .get(member)
            .and_then(|row| row.get(other))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// The row of `member`, if the member is known to this sheet.
    pub fn row(&self, member: &UserId) -> Option<&BTreeMap<UserId, Decimal>> {
        self.rows.get(member)
    }

    /// Copy of `member`'s balances keyed by counterparty (empty if unknown).
    pub fn balances_of(&self, member: &UserId) -> BTreeMap<UserId, Decimal> {
        self.rows.get(member).cloned().unwrap_or_default()
    }

    /// True when `member` owes nobody and nobody owes `member`.
    pub fn is_fully_settled(&self, member: &UserId) -> bool {
        self.rows.get(member).map_or(true, |row| row.is_empty())
    }

    pub fn contains_member(&self, member: &UserId) -> bool {
        self.rows.contains_key(member)
    }

    /// Members with a row, in id order.
    pub fn members(&self) -> impl Iterator<Item = &UserId> {
        self.rows.keys()
    }

    /// Every outstanding debt once, as `(debtor, creditor, amount)` with a
    /// positive amount, ordered by creditor then debtor.
    pub fn debts(&self) -> Vec<(&UserId, &UserId, Decimal)> {
        self.rows
            .iter()
            .flat_map(|(creditor, row)| {
                row.iter()
                    .filter(|(_, amount)| **amount > Decimal::ZERO)
                    .map(move |(debtor, amount)| (debtor, creditor, *amount))
            })
            .collect()
    }

    /// Number of outstanding pairwise debts.
    pub fn debt_count(&self) -> usize {
        self.debts().len()
    }

    /// Total amount owed across all pairs.
    pub fn gross_total(&self) -> Decimal {
        self.gross
    }

    /// True when no member has any balance.
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|row| row.is_empty())
    }

    /// Check both sheet invariants, reporting the first violation.
    pub fn validate(&self) -> LedgerResult<()> {
        for (member, row) in &self.rows {
            for (other, amount) in row {
                if member == other {
                    return Err(LedgerError::InconsistentState(format!(
                        "{member} holds a balance with themselves"
                    )));
                }
                if is_negligible(*amount) {
                    return Err(LedgerError::InconsistentState(format!(
                        "negligible balance {amount} retained between {member} and {other}"
                    )));
                }
                let mirror = self.balance(other, member);
                if !approx_eq(*amount, -mirror) {
                    return Err(LedgerError::InconsistentState(format!(
                        "balance {member}->{other} is {amount} but mirror is {mirror}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Rows> for BalanceSheet {
    type Error = LedgerError;

    fn try_from(rows: Rows) -> Result<Self, Self::Error> {
        let mut sheet = Self {
            rows,
            gross: Decimal::ZERO,
        };
        // Counterparties that only appear inside another row still get a row.
        let referenced: Vec<UserId> = sheet
            .rows
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect();
        for member in &referenced {
            sheet.add_member(member);
        }
        sheet.validate()?;
        let amounts: Vec<Decimal> = sheet.debts().iter().map(|(_, _, amount)| *amount).collect();
        sheet.gross = checked_sum(&amounts).map_err(|_| {
            LedgerError::InconsistentState("outstanding balances exceed the representable range".to_string())
        })?;
        Ok(sheet)
    }
}

impl PartialEq for BalanceSheet {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl From<BalanceSheet> for Rows {
    fn from(sheet: BalanceSheet) -> Self {
        sheet.rows
    }
}
