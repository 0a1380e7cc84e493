//! A four-person trip recorded through the ledger.
//!
//! Shows group expenses under different split policies, a settlement,
//! and simplification of the group's debts.

use rust_decimal_macros::dec;
use split_ledger::prelude::*;
use std::sync::mpsc;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  split-ledger: Trip Expenses Example     ║");
    println!("╚══════════════════════════════════════════╝\n");

    let (tx, rx) = mpsc::channel();
    let ledger = Ledger::new().with_notifier(ChannelNotifier::new(tx));

    let [a, b, c, d] = ["A", "B", "C", "D"].map(UserId::new);
    for (id, name) in [(&a, "Alice"), (&b, "Bob"), (&c, "Carol"), (&d, "Dan")] {
        if let Err(e) = ledger.register_user(id.clone(), name) {
            eprintln!("{}", e);
            return;
        }
    }

    let trip = GroupId::new("trip");
    let everyone = vec![a.clone(), b.clone(), c.clone(), d.clone()];
    let steps = [
        ledger.create_group(trip.clone(), "Weekend trip", everyone.clone()),
        ledger
            .record_expense(
                Some(&trip),
                ExpenseRequest::equal("Lunch", dec!(800), a.clone(), everyone.clone()),
            )
            .map(|_| ()),
        ledger
            .record_expense(
                Some(&trip),
                ExpenseRequest::exact(
                    "Dinner",
                    dec!(700),
                    c.clone(),
                    vec![a.clone(), c.clone(), d.clone()],
                    vec![dec!(200), dec!(300), dec!(200)],
                ),
            )
            .map(|_| ()),
        ledger
            .record_expense(
                Some(&trip),
                ExpenseRequest::percent(
                    "Fuel",
                    dec!(120),
                    b.clone(),
                    vec![b.clone(), d.clone()],
                    vec![dec!(25), dec!(75)],
                ),
            )
            .map(|_| ()),
        ledger.settle(Some(&trip), &d, &a, dec!(50)),
    ];
    if let Some(Err(e)) = steps.into_iter().find(|s| s.is_err()) {
        eprintln!("Error: {}", e);
        return;
    }

    // --- Balances ---
    println!("━━━ Balances ━━━\n");
    let Ok(group) = ledger.group(&trip) else {
        return;
    };
    for (debtor, creditor, amount) in group.sheet().debts() {
        println!("  {} owes {} {}", debtor, creditor, amount);
    }
    println!();

    // --- Simplification ---
    println!("━━━ Simplified ━━━\n");
    match ledger.simplify_group(&trip) {
        Ok(result) => println!("{}", result),
        Err(e) => eprintln!("Error: {}", e),
    }

    // --- Notifications ---
    println!("━━━ Notifications ━━━\n");
    drop(ledger);
    for message in rx {
        println!("  {}", message);
    }
}
