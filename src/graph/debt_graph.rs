use crate::core::balance_sheet::BalanceSheet;
use crate::core::user::UserId;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Directed view of a balance sheet: one edge per outstanding debt,
/// pointing from debtor to creditor.
///
/// # Examples
///
/// ```
/// use split_ledger::core::balance_sheet::BalanceSheet;
/// use split_ledger::core::user::UserId;
/// use split_ledger::graph::debt_graph::DebtGraph;
/// use rust_decimal_macros::dec;
///
/// let mut sheet = BalanceSheet::new();
/// sheet.apply_transfer(&UserId::new("A"), &UserId::new("B"), dec!(100)).unwrap();
///
/// let graph = DebtGraph::from_sheet(&sheet);
/// assert_eq!(graph.member_count(), 2);
/// assert_eq!(graph.edge_amount(&UserId::new("A"), &UserId::new("B")), dec!(100));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DebtGraph {
    /// (debtor, creditor) -> amount owed
    edges: BTreeMap<(UserId, UserId), Decimal>,
    members: BTreeSet<UserId>,
}

impl DebtGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheet(sheet: &BalanceSheet) -> Self {
        let mut graph = Self::new();
        for member in sheet.members() {
            graph.members.insert(member.clone());
        }
        for (debtor, creditor, amount) in sheet.debts() {
            graph.add_debt(debtor.clone(), creditor.clone(), amount);
        }
        graph
    }

    /// Add `amount` to the edge from `debtor` to `creditor`.
    ///
    /// Only fed from balance sheets, whose gross total bounds every edge sum.
    pub(crate) fn add_debt(&mut self, debtor: UserId, creditor: UserId, amount: Decimal) {
        self.members.insert(debtor.clone());
        self.members.insert(creditor.clone());
        *self
            .edges
            .entry((debtor, creditor))
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    pub fn gross_total(&self) -> Decimal {
        self.edges.values().copied().sum()
    }

    pub fn edge_amount(&self, debtor: &UserId, creditor: &UserId) -> Decimal {
        self.edges
            .get(&(debtor.clone(), creditor.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// All edges as (debtor, creditor, amount).
    pub fn edges(&self) -> Vec<(&UserId, &UserId, Decimal)> {
        self.edges.iter().map(|((d, c), &amt)| (d, c, amt)).collect()
    }

    /// Creditors of `member` with the amount owed to each.
    pub fn outgoing(&self, member: &UserId) -> Vec<(&UserId, Decimal)> {
        self.edges
            .iter()
            .filter(|((d, _), _)| d == member)
            .map(|((_, c), &amt)| (c, amt))
            .collect()
    }

    /// Debtors of `member` with the amount each owes.
    pub fn incoming(&self, member: &UserId) -> Vec<(&UserId, Decimal)> {
        self.edges
            .iter()
            .filter(|((_, c), _)| c == member)
            .map(|((d, _), &amt)| (d, amt))
            .collect()
    }

    /// member -> [(creditor, amount)], with every member present.
    pub fn adjacency_list(&self) -> BTreeMap<UserId, Vec<(UserId, Decimal)>> {
        let mut adj: BTreeMap<UserId, Vec<(UserId, Decimal)>> = self
            .members
            .iter()
            .map(|m| (m.clone(), Vec::new()))
            .collect();
        for ((debtor, creditor), &amount) in &self.edges {
            adj.entry(debtor.clone())
                .or_default()
                .push((creditor.clone(), amount));
        }
        adj
    }
}
