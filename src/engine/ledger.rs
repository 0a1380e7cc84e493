use crate::core::error::{LedgerError, LedgerResult};
use crate::core::expense::{Expense, ExpenseRequest};
use crate::core::group::{validate_settlement, Group, GroupId};
use crate::core::money::{approx_eq, is_negligible, next_balance};
use crate::core::user::{User, UserId};
use crate::engine::notify::{LedgerEvent, Notifier, Scope};
use crate::engine::registry::{lock, Registry};
use crate::optimization::simplify::SimplificationResult;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Serializable copy of a whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    #[serde(default)]
    pub individual_expenses: Vec<Expense>,
}

/// Entry point for recording expenses and settlements.
///
/// A `Ledger` owns its registry, so independent ledgers never share state.
/// Operations take `&self` and may be called from many threads: changes to
/// one group are serialised by that group's lock, and individual changes
/// lock the users involved.
///
/// # Examples
///
/// ```
/// use split_ledger::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let ledger = Ledger::new();
/// for id in ["A", "B"] {
///     ledger.register_user(UserId::new(id), id).unwrap();
/// }
///
/// let people = vec![UserId::new("A"), UserId::new("B")];
/// ledger
///     .record_expense(None, ExpenseRequest::equal("Taxi", dec!(30), UserId::new("A"), people))
///     .unwrap();
///
/// let balances = ledger.balances_of(&UserId::new("B")).unwrap();
/// assert_eq!(balances[&UserId::new("A")], dec!(-15));
/// ```
#[derive(Default)]
pub struct Ledger {
    registry: Registry,
    individual_expenses: Mutex<Vec<Expense>>,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notifier that hears about every committed change.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.subscribe(Box::new(notifier));
        self
    }

    pub fn subscribe(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn register_user(&self, id: UserId, name: impl Into<String>) -> LedgerResult<()> {
        self.registry.register_user(User::new(id, name))
    }

    /// Create a group whose members must all be registered users.
    pub fn create_group(
        &self,
        id: GroupId,
        name: impl Into<String>,
        members: impl IntoIterator<Item = UserId>,
    ) -> LedgerResult<()> {
        let group = Group::with_members(id, name, members);
        self.registry.register_group(group)?;
        Ok(())
    }

    /// Add a registered user to a group. Returns false if already a member.
    pub fn add_member(&self, group_id: &GroupId, user: &UserId) -> LedgerResult<bool> {
        self.registry.ensure_users([user])?;
        let handle = self.registry.group(group_id)?;
        let added = lock(&handle).add_member(user.clone());
        if added {
            self.publish(&LedgerEvent::MemberAdded {
                group: group_id.clone(),
                user: user.clone(),
            });
        }
        Ok(added)
    }

    /// Remove a member who holds no balance in the group.
    pub fn remove_member(&self, group_id: &GroupId, user: &UserId) -> LedgerResult<()> {
        let handle = self.registry.group(group_id)?;
        let outcome = lock(&handle).remove_member(user);
        if let Err(err) = &outcome {
            warn!("rejected removal of {user} from {group_id}: {err}");
            return outcome;
        }
        self.publish(&LedgerEvent::MemberRemoved {
            group: group_id.clone(),
            user: user.clone(),
        });
        Ok(())
    }

    /// Record an expense in a group, or between individuals when `group` is
    /// `None`.
    ///
    /// Splits are computed and every party checked before any balance moves;
    /// a rejected expense leaves the ledger untouched.
    pub fn record_expense(
        &self,
        group: Option<&GroupId>,
        request: ExpenseRequest,
    ) -> LedgerResult<Expense> {
        let outcome = match group {
            Some(group_id) => self.record_group_expense(group_id, request),
            None => self.record_individual_expense(request),
        };
        let expense = outcome.map_err(|err| {
            warn!("rejected expense: {err}");
            err
        })?;

        info!(
            "recorded expense {} ({}) of {} paid by {}",
            expense.id(),
            expense.description(),
            expense.total(),
            expense.payer()
        );
        self.publish(&LedgerEvent::ExpenseAdded {
            scope: Scope::from_group(group),
            description: expense.description().to_string(),
            payer: expense.payer().clone(),
            total: expense.total(),
            participants: expense.splits().len(),
        });
        Ok(expense)
    }

    fn record_group_expense(
        &self,
        group_id: &GroupId,
        request: ExpenseRequest,
    ) -> LedgerResult<Expense> {
        let handle = self.registry.group(group_id)?;
        let expense = request.into_expense(Some(group_id.clone()))?;
        let mut group = lock(&handle);
        let recorded = group.record_expense(expense)?.clone();
        Ok(recorded)
    }

    fn record_individual_expense(&self, request: ExpenseRequest) -> LedgerResult<Expense> {
        self.registry.ensure_users(request.involved())?;
        let expense = request.into_expense(None)?;
        let transfers: Vec<(UserId, UserId, Decimal)> = expense
            .transfers()
            .map(|split| {
                (
                    split.participant.clone(),
                    expense.payer().clone(),
                    split.owed,
                )
            })
            .collect();
        self.apply_individual(&transfers)?;
        lock(&self.individual_expenses).push(expense.clone());
        Ok(expense)
    }

    /// Record a direct payment of `amount` from `from` to `to`.
    pub fn settle(
        &self,
        group: Option<&GroupId>,
        from: &UserId,
        to: &UserId,
        amount: Decimal,
    ) -> LedgerResult<()> {
        let outcome = match group {
            Some(group_id) => self.registry.group(group_id).and_then(|handle| {
                let mut locked = lock(&handle);
                locked.settle(from, to, amount)
            }),
            None => validate_settlement(from, to, amount)
                .and_then(|_| self.registry.ensure_users([from, to]))
                .and_then(|_| self.apply_individual(&[(to.clone(), from.clone(), amount)])),
        };
        if let Err(err) = &outcome {
            warn!("rejected settlement {from} -> {to}: {err}");
            return outcome;
        }

        info!("settled {amount} from {from} to {to}");
        self.publish(&LedgerEvent::SettlementRecorded {
            scope: Scope::from_group(group),
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Replace a group's sheet with its simplified equivalent.
    pub fn simplify_group(&self, group_id: &GroupId) -> LedgerResult<SimplificationResult> {
        let handle = self.registry.group(group_id)?;
        let result = lock(&handle).simplify();
        info!(
            "simplified group {group_id}: {} -> {} debts",
            result.debts_before(),
            result.debts_after()
        );
        self.publish(&LedgerEvent::GroupSimplified {
            group: group_id.clone(),
            debts_before: result.debts_before(),
            debts_after: result.debts_after(),
        });
        Ok(result)
    }

    /// Individual balances of `user`, keyed by counterparty.
    pub fn balances_of(&self, user: &UserId) -> LedgerResult<BTreeMap<UserId, Decimal>> {
        let handle = self.registry.user(user)?;
        let balances = lock(&handle).balances().clone();
        Ok(balances)
    }

    /// Balances of `user` inside one group, keyed by counterparty.
    pub fn group_balances_of(
        &self,
        group_id: &GroupId,
        user: &UserId,
    ) -> LedgerResult<BTreeMap<UserId, Decimal>> {
        let handle = self.registry.group(group_id)?;
        let balances = lock(&handle).balances_of(user);
        balances
    }

    /// Copy of a group's current state.
    pub fn group(&self, group_id: &GroupId) -> LedgerResult<Group> {
        let handle = self.registry.group(group_id)?;
        let group = lock(&handle).clone();
        Ok(group)
    }

    pub fn group_expenses(&self, group_id: &GroupId) -> LedgerResult<Vec<Expense>> {
        let handle = self.registry.group(group_id)?;
        let expenses = lock(&handle).expenses().to_vec();
        Ok(expenses)
    }

    pub fn individual_expenses(&self) -> Vec<Expense> {
        lock(&self.individual_expenses).clone()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            users: self.registry.users(),
            groups: self.registry.groups(),
            individual_expenses: self.individual_expenses(),
        }
    }

    /// Rebuild a ledger from a snapshot, rejecting any inconsistent state.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        validate_individual_balances(&snapshot.users)?;
        let ledger = Self::new();
        for user in snapshot.users {
            ledger.registry.register_user(user)?;
        }
        for group in snapshot.groups {
            group.validate()?;
            ledger.registry.register_group(group)?;
        }
        *lock(&ledger.individual_expenses) = snapshot.individual_expenses;
        Ok(ledger)
    }

    /// Apply `(debtor, creditor, amount)` edges to users' individual
    /// balances while holding every involved user's lock.
    ///
    /// Every new pair value is computed before any user is written, so an
    /// overflow leaves all balances untouched.
    fn apply_individual(&self, transfers: &[(UserId, UserId, Decimal)]) -> LedgerResult<()> {
        let handles = self
            .registry
            .users_in_lock_order(transfers.iter().flat_map(|(d, c, _)| [d, c]))?;
        let mut guards: BTreeMap<UserId, MutexGuard<'_, User>> = handles
            .iter()
            .map(|(id, handle)| (id.clone(), lock(handle)))
            .collect();

        let mut pending: BTreeMap<(UserId, UserId), Decimal> = BTreeMap::new();
        for (debtor, creditor, amount) in transfers {
            if debtor == creditor {
                continue;
            }
            let key = (creditor.clone(), debtor.clone());
            let current = match pending.get(&key) {
                Some(value) => *value,
                None => guards
                    .get(creditor)
                    .map_or(Decimal::ZERO, |user| user.balance_with(debtor)),
            };
            let next = next_balance(current, *amount)?;
            pending.insert((debtor.clone(), creditor.clone()), -next);
            pending.insert(key, next);
        }

        for ((member, other), value) in pending {
            if let Some(user) = guards.get_mut(&member) {
                user.set_balance(&other, value);
            }
        }
        Ok(())
    }

    fn publish(&self, event: &LedgerEvent) {
        let message = event.to_string();
        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(&message) {
                warn!("{err}");
            }
        }
    }
}

/// Check that individual balances mirror each other across users.
fn validate_individual_balances(users: &[User]) -> LedgerResult<()> {
    let by_id: BTreeMap<&UserId, &User> = users.iter().map(|u| (u.id(), u)).collect();
    for user in users {
        for (other, amount) in user.balances() {
            if is_negligible(*amount) {
                return Err(LedgerError::InconsistentState(format!(
                    "negligible balance {amount} retained between {} and {other}",
                    user.id()
                )));
            }
            let counterpart = by_id
                .get(other)
                .ok_or_else(|| LedgerError::UnknownUser(other.clone()))?;
            let mirror = counterpart.balance_with(user.id());
            if !approx_eq(*amount, -mirror) {
                return Err(LedgerError::InconsistentState(format!(
                    "balance {}->{other} is {amount} but mirror is {mirror}",
                    user.id()
                )));
            }
        }
    }
    Ok(())
}
