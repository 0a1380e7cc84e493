use crate::core::balance_sheet::store_entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a user of the ledger.
///
/// Identifiers are opaque strings chosen by the caller. They order
/// lexicographically, which is the order the ledger uses whenever it needs
/// a deterministic traversal (lock acquisition, tie-breaking).
///
/// # Examples
///
/// ```
/// use split_ledger::core::user::UserId;
///
/// let alice = UserId::new("alice");
/// let bob = UserId::new("bob");
/// assert_ne!(alice, bob);
/// assert!(alice < bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A registered user and their individual (non-group) balances.
///
/// `balances[other]` is positive when `other` owes this user and negative
/// when this user owes `other`. Every entry has a mirror of opposite sign
/// in the counterpart's own mapping; the ledger always updates both users
/// together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    #[serde(default)]
    balances: BTreeMap<UserId, Decimal>,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            balances: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Individual balances of this user, keyed by counterparty.
    pub fn balances(&self) -> &BTreeMap<UserId, Decimal> {
        &self.balances
    }

    /// Signed balance with one counterparty (zero when settled).
    pub fn balance_with(&self, other: &UserId) -> Decimal {
        self.balances.get(other).copied().unwrap_or(Decimal::ZERO)
    }

    /// True when this user has no outstanding individual balance.
    pub fn is_settled(&self) -> bool {
        self.balances.is_empty()
    }

    /// Overwrite this user's side of the edge with `other`; zero removes it.
    ///
    /// Callers must store the negated value on `other` under the same
    /// critical section.
    pub(crate) fn set_balance(&mut self, other: &UserId, value: Decimal) {
        store_entry(&mut self.balances, other, value);
    }
}
