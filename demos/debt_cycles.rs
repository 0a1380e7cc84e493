//! Circular debts and how simplification removes them.

use rust_decimal_macros::dec;
use split_ledger::graph::cycle_detection::find_cycles;
use split_ledger::graph::debt_graph::DebtGraph;
use split_ledger::prelude::*;

fn main() -> Result<(), ValidationError> {
    println!("╔══════════════════════════════════════════╗");
    println!("║  split-ledger: Debt Cycles Example       ║");
    println!("╚══════════════════════════════════════════╝\n");

    let [a, b, c, d] = ["A", "B", "C", "D"].map(UserId::new);
    let mut sheet = BalanceSheet::with_members([&a, &b, &c, &d]);

    // A owes B, B owes C, C owes A: a three-way loop, plus D owing A.
    sheet.apply_transfer(&a, &b, dec!(60))?;
    sheet.apply_transfer(&b, &c, dec!(45))?;
    sheet.apply_transfer(&c, &a, dec!(30))?;
    sheet.apply_transfer(&d, &a, dec!(25))?;

    let graph = DebtGraph::from_sheet(&sheet);
    println!(
        "Graph: {} members, {} debts, {} outstanding",
        graph.member_count(),
        graph.edge_count(),
        graph.gross_total()
    );
    for (debtor, creditor, amount) in graph.edges() {
        println!("  {debtor} owes {creditor} {amount}");
    }
    println!();

    let cycles = find_cycles(&graph);
    println!("━━━ Cycles ━━━\n");
    for (i, cycle) in cycles.iter().enumerate() {
        let path: Vec<&str> = cycle.members.iter().map(|m| m.as_str()).collect();
        println!("Cycle {}: {} → {}", i, path.join(" → "), path[0]);
        println!("  Bottleneck:        {}", cycle.bottleneck);
        println!("  Potential savings: {}", cycle.potential_savings());
    }
    println!();

    println!("━━━ Simplified ━━━\n");
    let result = DebtSimplifier::simplify(&sheet);
    println!("{}", result);
    println!(
        "Remaining cycles: {}",
        find_cycles(&DebtGraph::from_sheet(result.sheet())).len()
    );
    Ok(())
}
