use crate::core::user::UserId;
use crate::graph::debt_graph::DebtGraph;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// A circular chain of debts: each member owes the next, and the last owes
/// the first. Such a chain can be reduced by its smallest edge without
/// changing anyone's net position.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtCycle {
    /// Members in cycle order.
    pub members: Vec<UserId>,
    /// Smallest debt along the cycle.
    pub bottleneck: Decimal,
}

impl DebtCycle {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total gross amount removed by cancelling the cycle's bottleneck.
    pub fn potential_savings(&self) -> Decimal {
        self.bottleneck * Decimal::from(self.members.len())
    }
}

/// Find every simple debt cycle in the graph.
///
/// Each cycle is reported once, rooted at its smallest member id, and the
/// result is ordered by potential savings, largest first.
pub fn find_cycles(graph: &DebtGraph) -> Vec<DebtCycle> {
    let adj = graph.adjacency_list();
    let mut cycles = Vec::new();

    for start in graph.members() {
        let mut path: Vec<UserId> = Vec::new();
        let mut on_path: HashSet<UserId> = HashSet::new();
        walk(start, start, &adj, &mut path, &mut on_path, &mut cycles, graph);
    }

    deduplicate_cycles(&mut cycles);
    cycles.sort_by(|a, b| b.potential_savings().cmp(&a.potential_savings()));
    cycles
}

fn walk(
    current: &UserId,
    start: &UserId,
    adj: &BTreeMap<UserId, Vec<(UserId, Decimal)>>,
    path: &mut Vec<UserId>,
    on_path: &mut HashSet<UserId>,
    cycles: &mut Vec<DebtCycle>,
    graph: &DebtGraph,
) {
    path.push(current.clone());
    on_path.insert(current.clone());

    if let Some(creditors) = adj.get(current) {
        for (next, _) in creditors {
            if next == start && path.len() >= 2 {
                let limit = bottleneck(path.as_slice(), graph);
                if limit > Decimal::ZERO {
                    cycles.push(DebtCycle {
                        members: path.clone(),
                        bottleneck: limit,
                    });
                }
            } else if !on_path.contains(next) && next > start {
                // Only visit ids above the root so each cycle has one root.
                walk(next, start, adj, path, on_path, cycles, graph);
            }
        }
    }

    path.pop();
    on_path.remove(current);
}

fn bottleneck(members: &[UserId], graph: &DebtGraph) -> Decimal {
    (0..members.len())
        .map(|i| graph.edge_amount(&members[i], &members[(i + 1) % members.len()]))
        .min()
        .unwrap_or(Decimal::ZERO)
}

fn deduplicate_cycles(cycles: &mut Vec<DebtCycle>) {
    let mut seen: HashSet<Vec<UserId>> = HashSet::new();
    cycles.retain(|cycle| seen.insert(canonical_form(&cycle.members)));
}

/// Smallest rotation of the cycle.
fn canonical_form(members: &[UserId]) -> Vec<UserId> {
    (0..members.len())
        .map(|i| {
            members[i..]
                .iter()
                .chain(members[..i].iter())
                .cloned()
                .collect::<Vec<_>>()
        })
        .min()
        .unwrap_or_default()
}
