//! Random expense scenarios for exercising the ledger.
//!
//! Generates groups with a mix of equal, exact, and percent expenses so
//! simplification can be tested and benchmarked on realistic sheets.

use crate::core::error::LedgerResult;
use crate::core::expense::ExpenseRequest;
use crate::core::group::{Group, GroupId};
use crate::core::split::SplitPolicy;
use crate::core::user::UserId;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};

/// Configuration for generating a random group.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of members in the group.
    pub member_count: usize,
    /// Number of expenses to record.
    pub expense_count: usize,
    /// Smallest expense total, in whole units.
    pub min_amount: u64,
    /// Largest expense total, in whole units.
    pub max_amount: u64,
    /// Policies to draw from.
    pub policies: Vec<SplitPolicy>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            member_count: 6,
            expense_count: 20,
            min_amount: 5,
            max_amount: 500,
            policies: SplitPolicy::ALL.to_vec(),
        }
    }
}

/// Member ids used by generated scenarios.
pub fn member_ids(count: usize) -> Vec<UserId> {
    (0..count)
        .map(|i| UserId::new(format!("MEMBER-{:03}", i)))
        .collect()
}

/// Generate random expense requests among `config.member_count` members.
///
/// Every request is valid: exact amounts and percentages are built to sum
/// to the total and to 100 respectively.
pub fn generate_expenses(config: &ScenarioConfig) -> Vec<ExpenseRequest> {
    let mut rng = rand::thread_rng();
    let members = member_ids(config.member_count);
    if members.is_empty() || config.policies.is_empty() {
        return Vec::new();
    }

    let (low, high) = (
        config.min_amount.max(1),
        config.max_amount.max(config.min_amount.max(1)),
    );
    let mut requests = Vec::with_capacity(config.expense_count);

    for n in 0..config.expense_count {
        let total = Decimal::from(rng.gen_range(low..=high));
        let Some(payer) = members.choose(&mut rng).cloned() else {
            break;
        };
        let size = rng.gen_range(1..=members.len());
        let participants: Vec<UserId> = members
            .choose_multiple(&mut rng, size)
            .cloned()
            .collect();
        let description = format!("Expense #{}", n + 1);

        let policy = config.policies[rng.gen_range(0..config.policies.len())];
        let request = match policy {
            SplitPolicy::Equal => ExpenseRequest::equal(description, total, payer, participants),
            SplitPolicy::Exact => {
                let amounts = random_partition(&mut rng, total, participants.len());
                ExpenseRequest::exact(description, total, payer, participants, amounts)
            }
            SplitPolicy::Percent => {
                let percentages =
                    random_partition(&mut rng, Decimal::ONE_HUNDRED, participants.len());
                ExpenseRequest::percent(description, total, payer, participants, percentages)
            }
        };
        requests.push(request);
    }

    requests
}

/// Build a group with generated members and apply generated expenses.
pub fn generate_random_group(config: &ScenarioConfig) -> LedgerResult<Group> {
    let id = GroupId::new("SIMULATED");
    let mut group = Group::with_members(id.clone(), "Simulated group", member_ids(config.member_count));
    for request in generate_expenses(config) {
        group.record_expense(request.into_expense(Some(id.clone()))?)?;
    }
    Ok(group)
}

/// Split `whole` into `parts` non-negative shares that sum exactly to
/// `whole`. All but the last share are truncated to two decimal places.
fn random_partition<R: Rng>(rng: &mut R, whole: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let weights: Vec<u32> = (0..parts).map(|_| rng.gen_range(1..=100)).collect();
    let weight_sum = Decimal::from(weights.iter().sum::<u32>());

    let mut shares: Vec<Decimal> = weights
        .iter()
        .map(|w| {
            (whole * Decimal::from(*w) / weight_sum)
                .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        })
        .collect();
    let assigned: Decimal = shares[..parts - 1].iter().sum();
    shares[parts - 1] = whole - assigned;
    shares
}
