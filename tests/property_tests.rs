use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use split_ledger::core::money::{approx_eq, EPSILON};
use split_ledger::graph::cycle_detection::find_cycles;
use split_ledger::graph::debt_graph::DebtGraph;
use split_ledger::prelude::*;

const POOL: [&str; 5] = ["A", "B", "C", "D", "E"];

fn pool() -> Vec<UserId> {
    POOL.iter().map(|id| UserId::new(*id)).collect()
}

/// Pick a random member from a small pool (to increase overlap).
fn arb_member() -> impl Strategy<Value = UserId> {
    prop::sample::select(pool())
}

/// Split `whole` into shares proportional to `weights` that sum to it exactly.
fn partition(whole: Decimal, weights: &[u32]) -> Vec<Decimal> {
    let weight_sum = Decimal::from(weights.iter().sum::<u32>());
    let mut shares: Vec<Decimal> = weights
        .iter()
        .map(|w| {
            (whole * Decimal::from(*w) / weight_sum)
                .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        })
        .collect();
    let last = shares.len() - 1;
    let assigned: Decimal = shares[..last].iter().sum();
    shares[last] = whole - assigned;
    shares
}

/// Generate a valid expense request among pool members.
fn arb_request() -> impl Strategy<Value = ExpenseRequest> {
    (
        arb_member(),
        prop::sample::subsequence(pool(), 1..=POOL.len()),
        1u64..100_000u64,
        prop::sample::select(SplitPolicy::ALL.to_vec()),
        prop::collection::vec(1u32..100u32, POOL.len()),
    )
        .prop_map(|(payer, participants, cents, policy, weights)| {
            let total = Decimal::new(cents as i64, 2);
            let weights = &weights[..participants.len()];
            match policy {
                SplitPolicy::Equal => ExpenseRequest::equal("Shared", total, payer, participants),
                SplitPolicy::Exact => {
                    let amounts = partition(total, weights);
                    ExpenseRequest::exact("Shared", total, payer, participants, amounts)
                }
                SplitPolicy::Percent => {
                    let percentages = partition(Decimal::ONE_HUNDRED, weights);
                    ExpenseRequest::percent("Shared", total, payer, participants, percentages)
                }
            }
        })
}

fn arb_requests() -> impl Strategy<Value = Vec<ExpenseRequest>> {
    prop::collection::vec(arb_request(), 1..30)
}

/// A group of all pool members with `requests` applied.
fn group_with(requests: Vec<ExpenseRequest>) -> Group {
    let id = GroupId::new("G");
    let mut group = Group::with_members(id.clone(), "Group", pool());
    for request in requests {
        let expense = request.into_expense(Some(id.clone())).unwrap();
        group.record_expense(expense).unwrap();
    }
    group
}

proptest! {
    // ===================================================================
    // Splits always add back up to the expense total.
    // ===================================================================
    #[test]
    fn splits_sum_to_total(request in arb_request()) {
        let total = request.total;
        let participants = request.participants.len();
        let expense = request.into_expense(None).unwrap();
        let owed: Decimal = expense.splits().iter().map(|s| s.owed).sum();
        prop_assert!(approx_eq(owed, total), "splits {} vs total {}", owed, total);
        prop_assert_eq!(expense.splits().len(), participants);
        prop_assert!(expense.splits().iter().all(|s| s.owed >= Decimal::ZERO));
    }

    // ===================================================================
    // The sheet stays antisymmetric, self-free and pruned after every
    // recorded expense.
    // ===================================================================
    #[test]
    fn sheet_invariants_hold(requests in arb_requests()) {
        let id = GroupId::new("G");
        let mut group = Group::with_members(id.clone(), "Group", pool());
        for request in requests {
            group.record_expense(request.into_expense(Some(id.clone())).unwrap()).unwrap();
            prop_assert!(group.validate().is_ok());
            for a in pool() {
                prop_assert_eq!(group.sheet().balance(&a, &a), Decimal::ZERO);
                for b in pool() {
                    let ab = group.sheet().balance(&a, &b);
                    let ba = group.sheet().balance(&b, &a);
                    prop_assert!(approx_eq(ab, -ba));
                }
            }
        }
    }

    // ===================================================================
    // Net positions always sum to zero.
    // ===================================================================
    #[test]
    fn net_positions_sum_to_zero(requests in arb_requests()) {
        let group = group_with(requests);
        let total: Decimal = DebtSimplifier::net_positions(group.sheet()).values().sum();
        prop_assert!(approx_eq(total, Decimal::ZERO), "net positions sum to {}", total);
    }

    // ===================================================================
    // Paying off every debt leaves an empty sheet.
    // ===================================================================
    #[test]
    fn settling_every_debt_empties_sheet(requests in arb_requests()) {
        let mut group = group_with(requests);
        let debts: Vec<(UserId, UserId, Decimal)> = group
            .sheet()
            .debts()
            .into_iter()
            .map(|(d, c, amount)| (d.clone(), c.clone(), amount))
            .collect();
        for (debtor, creditor, amount) in debts {
            group.settle(&debtor, &creditor, amount).unwrap();
        }
        prop_assert!(group.sheet().is_empty());
    }

    // ===================================================================
    // Simplification conserves every member's net position, never adds
    // gross, and stays within the payment bound.
    // ===================================================================
    #[test]
    fn simplify_conserves_net_positions(requests in arb_requests()) {
        let group = group_with(requests);
        let before = DebtSimplifier::net_positions(group.sheet());
        let result = DebtSimplifier::simplify(group.sheet());

        prop_assert!(result.is_valid());
        prop_assert!(result.sheet().validate().is_ok());
        prop_assert!(result.gross_after() <= result.gross_before());
        prop_assert_eq!(result.payments().len(), result.debts_after());

        let after = DebtSimplifier::net_positions(result.sheet());
        for (member, net) in before {
            let now = after.get(&member).copied().unwrap_or_default();
            prop_assert!(
                (now - net).abs() <= result.tolerance(),
                "{} moved from {} to {}",
                member, net, now
            );
        }
    }

    // ===================================================================
    // A simplified sheet carries no cycles, and simplifying it again
    // cannot make it any more complicated.
    // ===================================================================
    #[test]
    fn simplify_is_stable(requests in arb_requests()) {
        let mut group = group_with(requests);
        let first = group.simplify();
        prop_assert!(find_cycles(&DebtGraph::from_sheet(group.sheet())).is_empty());

        let second = group.simplify();
        prop_assert!(second.is_valid());
        prop_assert!(second.debts_after() <= first.debts_after());
        prop_assert!(second.gross_after() <= first.gross_after() + EPSILON);
    }

    // ===================================================================
    // Savings percentage stays in [0, 100] and matches the gross figures.
    // ===================================================================
    #[test]
    fn savings_percent_in_range(requests in arb_requests()) {
        let group = group_with(requests);
        let result = DebtSimplifier::simplify(group.sheet());
        let pct = result.savings_percent();
        prop_assert!((0.0..=100.0).contains(&pct), "savings {}% out of range", pct);

        if result.gross_before() > Decimal::ZERO {
            let before: f64 = result.gross_before().to_string().parse().unwrap();
            let after: f64 = result.gross_after().to_string().parse().unwrap();
            assert_abs_diff_eq!(pct, (before - after) * 100.0 / before, epsilon = 1e-6);
        }
    }

    // ===================================================================
    // An expense naming an outsider is rejected and changes nothing.
    // ===================================================================
    #[test]
    fn outsider_expense_leaves_group_unchanged(
        requests in arb_requests(),
        payer in arb_member(),
        cents in 1u64..100_000u64,
    ) {
        let mut group = group_with(requests);
        let before = group.clone();
        let request = ExpenseRequest::equal(
            "Intruder",
            Decimal::new(cents as i64, 2),
            payer,
            vec![UserId::new("Z")],
        );
        let expense = request.into_expense(Some(GroupId::new("G"))).unwrap();
        prop_assert!(
            matches!(group.record_expense(expense), Err(LedgerError::Membership { .. })),
            "outsider must be rejected"
        );
        prop_assert_eq!(group, before);
    }

    // ===================================================================
    // A settlement moves exactly its amount between the two net positions.
    // ===================================================================
    #[test]
    fn settlement_shifts_net_positions(
        requests in arb_requests(),
        from in arb_member(),
        to in arb_member(),
        cents in 1u64..100_000u64,
    ) {
        prop_assume!(from != to);
        let mut group = group_with(requests);
        let amount = Decimal::new(cents as i64, 2);
        let before = DebtSimplifier::net_positions(group.sheet());
        group.settle(&from, &to, amount).unwrap();
        let after = DebtSimplifier::net_positions(group.sheet());

        let moved = |m: &UserId| {
            after.get(m).copied().unwrap_or_default() - before.get(m).copied().unwrap_or_default()
        };
        prop_assert!(approx_eq(moved(&from), amount));
        prop_assert!(approx_eq(moved(&to), -amount));
    }
}
