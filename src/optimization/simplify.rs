use crate::core::balance_sheet::BalanceSheet;
use crate::core::money::EPSILON;
use crate::core::user::UserId;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single settling payment proposed by the simplifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub from: UserId,
    pub to: UserId,
    pub amount: Decimal,
}

/// Outcome of simplifying one balance sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplificationResult {
    /// The replacement sheet.
    sheet: BalanceSheet,
    /// Payments that make up the replacement sheet, in matching order.
    payments: Vec<Payment>,
    /// Net position of every member before simplification.
    net_positions: BTreeMap<UserId, Decimal>,
    /// Amount outstanding before simplification.
    gross_before: Decimal,
    /// Amount outstanding after simplification.
    gross_after: Decimal,
    /// Pairwise debts before simplification.
    debts_before: usize,
    /// Members with a non-zero net position.
    counterparties: usize,
}

impl SimplificationResult {
    pub fn sheet(&self) -> &BalanceSheet {
        &self.sheet
    }

    pub fn into_sheet(self) -> BalanceSheet {
        self.sheet
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn net_positions(&self) -> &BTreeMap<UserId, Decimal> {
        &self.net_positions
    }

    /// Net position of `member` (zero for unknown members).
    pub fn net_position(&self, member: &UserId) -> Decimal {
        self.net_positions
            .get(member)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn gross_before(&self) -> Decimal {
        self.gross_before
    }

    pub fn gross_after(&self) -> Decimal {
        self.gross_after
    }

    pub fn debts_before(&self) -> usize {
        self.debts_before
    }

    pub fn debts_after(&self) -> usize {
        self.sheet.debt_count()
    }

    /// Reduction in the amount that has to change hands.
    pub fn savings(&self) -> Decimal {
        self.gross_before - self.gross_after
    }

    /// Savings as a percentage of the amount outstanding before.
    pub fn savings_percent(&self) -> f64 {
        if self.gross_before == Decimal::ZERO {
            return 0.0;
        }
        (self.savings() / self.gross_before)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|pct| pct.to_string().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Largest drift any single net position may show after simplification.
    ///
    /// Members within ε of zero are left out of matching, and their residue
    /// lands on whoever is matched last, so the bound grows with the number
    /// of members.
    pub fn tolerance(&self) -> Decimal {
        EPSILON * Decimal::from(self.net_positions.len().max(1))
    }

    /// True when the new sheet preserves every net position within
    /// [`tolerance`](Self::tolerance) and uses at most
    /// `creditors + debtors - 1` payments.
    pub fn is_valid(&self) -> bool {
        let after = DebtSimplifier::net_positions(&self.sheet);
        let tolerance = self.tolerance();
        let within = |a: Decimal, b: Decimal| {
            a.checked_sub(b).map_or(false, |diff| diff.abs() <= tolerance)
        };
        let conserved = self
            .net_positions
            .iter()
            .all(|(member, net)| within(*net, after.get(member).copied().unwrap_or_default()))
            && after
                .iter()
                .all(|(member, net)| self.net_positions.contains_key(member) || within(*net, Decimal::ZERO));
        let bound = self.counterparties.saturating_sub(1);
        conserved && self.debts_after() <= bound
    }
}

/// Greedy debt simplification.
///
/// Collapses an arbitrary web of pairwise debts into a small set of
/// payments with the same net effect on every member.
pub struct DebtSimplifier;

impl DebtSimplifier {
    /// Net position of every member of `sheet`.
    ///
    /// Each pairwise debt is counted once: the creditor gains the amount and
    /// the debtor loses it. Members without balances are reported as zero.
    pub fn net_positions(sheet: &BalanceSheet) -> BTreeMap<UserId, Decimal> {
        let mut net: BTreeMap<UserId, Decimal> = sheet
            .members()
            .map(|m| (m.clone(), Decimal::ZERO))
            .collect();
        for (debtor, creditor, amount) in sheet.debts() {
            *net.entry(creditor.clone()).or_insert(Decimal::ZERO) += amount;
            *net.entry(debtor.clone()).or_insert(Decimal::ZERO) -= amount;
        }
        net
    }

    /// Compute a replacement sheet with the same net positions and fewer debts.
    ///
    /// # Algorithm
    ///
    /// 1. Compute each member's net position.
    /// 2. Split members into creditors (`net > ε`) and debtors (`net < -ε`),
    ///    keeping magnitudes.
    /// 3. Sort both by magnitude, largest first; ties keep member id order.
    /// 4. Walk both lists with two pointers, paying `min(credit, debt)` from
    ///    the current debtor to the current creditor and advancing whichever
    ///    side drops below ε.
    ///
    /// This is a heuristic: it uses at most `creditors + debtors - 1`
    /// payments, which is not always the global minimum.
    pub fn simplify(sheet: &BalanceSheet) -> SimplificationResult {
        let net_positions = Self::net_positions(sheet);

        let mut creditors: Vec<(UserId, Decimal)> = Vec::new();
        let mut debtors: Vec<(UserId, Decimal)> = Vec::new();
        for (member, net) in &net_positions {
            if *net > EPSILON {
                creditors.push((member.clone(), *net));
            } else if *net < -EPSILON {
                debtors.push((member.clone(), -*net));
            }
        }
        // Stable sorts keep id order among equal magnitudes.
        creditors.sort_by(|a, b| b.1.cmp(&a.1));
        debtors.sort_by(|a, b| b.1.cmp(&a.1));
        debug!(
            "simplifying {} debts: {} creditors, {} debtors",
            sheet.debt_count(),
            creditors.len(),
            debtors.len()
        );

        let mut simplified = BalanceSheet::with_members(sheet.members());
        let mut payments = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < creditors.len() && j < debtors.len() {
            let amount = creditors[i].1.min(debtors[j].1);
            let (creditor, debtor) = (&creditors[i].0, &debtors[j].0);
            debug!("match {debtor} -> {creditor}: {amount}");
            simplified.record_debt(debtor, creditor, amount);
            payments.push(Payment {
                from: debtor.clone(),
                to: creditor.clone(),
                amount,
            });

            creditors[i].1 -= amount;
            debtors[j].1 -= amount;
            if creditors[i].1 < EPSILON {
                i += 1;
            }
            if debtors[j].1 < EPSILON {
                j += 1;
            }
        }

        SimplificationResult {
            gross_before: sheet.gross_total(),
            gross_after: simplified.gross_total(),
            debts_before: sheet.debt_count(),
            counterparties: creditors.len() + debtors.len(),
            sheet: simplified,
            payments,
            net_positions,
        }
    }
}

impl std::fmt::Display for SimplificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Simplification Result ===")?;
        writeln!(f, "Debts Before:   {}", self.debts_before)?;
        writeln!(f, "Debts After:    {}", self.debts_after())?;
        writeln!(f, "Gross Before:   {}", self.gross_before)?;
        writeln!(f, "Gross After:    {}", self.gross_after)?;
        writeln!(f, "Savings:        {}", self.savings())?;
        writeln!(f, "Savings %:      {:.1}%", self.savings_percent())?;
        writeln!(f, "Valid:          {}", self.is_valid())?;

        writeln!(f, "\n--- Payments ---")?;
        for payment in &self.payments {
            writeln!(f, "  {} pays {} {}", payment.from, payment.to, payment.amount)?;
        }
        Ok(())
    }
}
