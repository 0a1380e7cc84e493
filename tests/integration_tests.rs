use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use split_ledger::core::money::approx_eq;
use split_ledger::engine::notify::NotifyError;
use split_ledger::graph::cycle_detection::find_cycles;
use split_ledger::graph::debt_graph::DebtGraph;
use split_ledger::prelude::*;
use split_ledger::simulation::scenario::{generate_random_group, ScenarioConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

fn uid(s: &str) -> UserId {
    UserId::new(s)
}

fn trip_ledger() -> (Ledger, GroupId) {
    let ledger = Ledger::new();
    for id in ["A", "B", "C", "D"] {
        ledger.register_user(uid(id), id).unwrap();
    }
    let trip = GroupId::new("G");
    ledger
        .create_group(
            trip.clone(),
            "Trip",
            [uid("A"), uid("B"), uid("C"), uid("D")],
        )
        .unwrap();
    (ledger, trip)
}

fn row_sum(group: &Group, member: &str) -> Decimal {
    group.sheet().balances_of(&uid(member)).values().sum()
}

/// Lunch and dinner shared by four people, then simplified.
#[test]
fn full_pipeline_trip_scenario() {
    let (ledger, trip) = trip_ledger();

    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::equal(
                "Lunch",
                dec!(800),
                uid("A"),
                vec![uid("A"), uid("B"), uid("C"), uid("D")],
            ),
        )
        .unwrap();

    let group = ledger.group(&trip).unwrap();
    for member in ["B", "C", "D"] {
        assert_eq!(group.sheet().balance(&uid(member), &uid("A")), dec!(-200));
        assert_eq!(group.sheet().balance(&uid("A"), &uid(member)), dec!(200));
    }

    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::exact(
                "Dinner",
                dec!(700),
                uid("C"),
                vec![uid("A"), uid("C"), uid("D")],
                vec![dec!(200), dec!(300), dec!(200)],
            ),
        )
        .unwrap();

    let group = ledger.group(&trip).unwrap();
    let sheet = group.sheet();
    // A's 200 to C cancels C's 200 from lunch; the entry is pruned.
    assert_eq!(sheet.balance(&uid("A"), &uid("C")), Decimal::ZERO);
    assert!(sheet.row(&uid("A")).unwrap().get(&uid("C")).is_none());
    // D owes two separate creditors.
    assert_eq!(sheet.balance(&uid("D"), &uid("A")), dec!(-200));
    assert_eq!(sheet.balance(&uid("D"), &uid("C")), dec!(-200));
    assert_eq!(sheet.debt_count(), 3);
    assert!(group.validate().is_ok());
    assert_eq!(ledger.group_expenses(&trip).unwrap().len(), 2);

    let nets_before: Vec<Decimal> = ["A", "B", "C", "D"]
        .iter()
        .map(|m| row_sum(&group, m))
        .collect();
    assert_eq!(nets_before, vec![dec!(400), dec!(-200), dec!(200), dec!(-400)]);

    let result = ledger.simplify_group(&trip).unwrap();
    assert!(result.is_valid());
    assert_eq!(result.debts_before(), 3);
    assert_eq!(result.debts_after(), 2);
    assert_eq!(
        result.payments(),
        &[
            Payment {
                from: uid("D"),
                to: uid("A"),
                amount: dec!(400)
            },
            Payment {
                from: uid("B"),
                to: uid("C"),
                amount: dec!(200)
            },
        ]
    );

    let simplified = ledger.group(&trip).unwrap();
    assert!(simplified.validate().is_ok());
    for (member, before) in ["A", "B", "C", "D"].iter().zip(&nets_before) {
        assert!(approx_eq(row_sum(&simplified, member), *before));
    }
}

#[test]
fn test_settle_then_remove_member() {
    let (ledger, trip) = trip_ledger();
    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::equal("Taxi", dec!(40), uid("A"), vec![uid("A"), uid("B")]),
        )
        .unwrap();

    let err = ledger.remove_member(&trip, &uid("B")).unwrap_err();
    assert!(matches!(err, LedgerError::Precondition { outstanding: 1, .. }));
    assert!(ledger.group(&trip).unwrap().is_member(&uid("B")));

    ledger.settle(Some(&trip), &uid("B"), &uid("A"), dec!(20)).unwrap();
    assert!(ledger
        .group_balances_of(&trip, &uid("B"))
        .unwrap()
        .is_empty());

    ledger.remove_member(&trip, &uid("B")).unwrap();
    let group = ledger.group(&trip).unwrap();
    assert!(!group.is_member(&uid("B")));
    assert_eq!(
        ledger.record_expense(
            Some(&trip),
            ExpenseRequest::equal("Snacks", dec!(10), uid("A"), vec![uid("A"), uid("B")]),
        ),
        Err(LedgerError::Membership {
            group: trip.clone(),
            user: uid("B")
        })
    );
}

#[test]
fn test_settlement_validation() {
    let (ledger, trip) = trip_ledger();
    assert_eq!(
        ledger.settle(Some(&trip), &uid("A"), &uid("A"), dec!(5)),
        Err(LedgerError::Validation(ValidationError::SelfSettlement(uid("A"))))
    );
    assert_eq!(
        ledger.settle(None, &uid("A"), &uid("B"), dec!(0)),
        Err(LedgerError::Validation(ValidationError::NonPositiveAmount(
            dec!(0)
        )))
    );
    assert_eq!(
        ledger.settle(None, &uid("A"), &uid("Z"), dec!(5)),
        Err(LedgerError::UnknownUser(uid("Z")))
    );
}

#[test]
fn test_group_and_individual_scopes_are_separate() {
    let (ledger, trip) = trip_ledger();
    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::equal("Museum", dec!(60), uid("A"), vec![uid("A"), uid("B")]),
        )
        .unwrap();
    ledger
        .record_expense(
            None,
            ExpenseRequest::equal("Coffee", dec!(10), uid("B"), vec![uid("A"), uid("B")]),
        )
        .unwrap();

    assert_eq!(
        ledger.group_balances_of(&trip, &uid("A")).unwrap()[&uid("B")],
        dec!(30)
    );
    assert_eq!(ledger.balances_of(&uid("A")).unwrap()[&uid("B")], dec!(-5));
    assert_eq!(ledger.individual_expenses().len(), 1);
}

#[test]
fn test_snapshot_roundtrip() {
    let (ledger, trip) = trip_ledger();
    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::percent(
                "Hotel",
                dec!(300),
                uid("C"),
                vec![uid("A"), uid("B"), uid("C")],
                vec![dec!(50), dec!(25), dec!(25)],
            ),
        )
        .unwrap();
    ledger
        .record_expense(
            None,
            ExpenseRequest::equal("Bus", dec!(9), uid("D"), vec![uid("D"), uid("A")]),
        )
        .unwrap();

    let snapshot = ledger.snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: LedgerSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, snapshot);

    let rebuilt = Ledger::from_snapshot(restored).unwrap();
    assert_eq!(
        rebuilt.group_balances_of(&trip, &uid("C")).unwrap(),
        ledger.group_balances_of(&trip, &uid("C")).unwrap()
    );
    assert_eq!(
        rebuilt.balances_of(&uid("A")).unwrap()[&uid("D")],
        dec!(-4.5)
    );
    assert_eq!(rebuilt.snapshot(), snapshot);
}

#[test]
fn test_notifications_follow_commits() {
    let (tx, rx) = mpsc::channel();
    let ledger = Ledger::new().with_notifier(ChannelNotifier::new(tx));
    for id in ["A", "B"] {
        ledger.register_user(uid(id), id).unwrap();
    }
    let flat = GroupId::new("flat");
    ledger
        .create_group(flat.clone(), "Flat", [uid("A"), uid("B")])
        .unwrap();

    ledger
        .record_expense(
            Some(&flat),
            ExpenseRequest::equal("Rent", dec!(1000), uid("A"), vec![uid("A"), uid("B")]),
        )
        .unwrap();
    // Rejected operations publish nothing.
    assert!(ledger
        .settle(Some(&flat), &uid("B"), &uid("B"), dec!(1))
        .is_err());
    ledger.settle(Some(&flat), &uid("B"), &uid("A"), dec!(500)).unwrap();

    drop(ledger);
    let messages: Vec<String> = rx.iter().collect();
    assert_eq!(
        messages,
        vec![
            "A paid 1000 for \"Rent\" split 2 ways in group flat".to_string(),
            "B paid A 500 in group flat".to_string(),
        ]
    );
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError("mailbox full".to_string()))
    }
}

#[test]
fn test_failing_notifier_does_not_undo_change() {
    let ledger = Ledger::new().with_notifier(FailingNotifier);
    for id in ["A", "B"] {
        ledger.register_user(uid(id), id).unwrap();
    }
    ledger
        .record_expense(
            None,
            ExpenseRequest::equal("Pizza", dec!(24), uid("A"), vec![uid("A"), uid("B")]),
        )
        .unwrap();
    assert_eq!(ledger.balances_of(&uid("A")).unwrap()[&uid("B")], dec!(12));
}

#[test]
fn test_concurrent_settlements_on_one_group() {
    let (ledger, trip) = trip_ledger();
    ledger
        .record_expense(
            Some(&trip),
            ExpenseRequest::equal(
                "Cabin",
                dec!(4000),
                uid("A"),
                vec![uid("A"), uid("B"), uid("C"), uid("D")],
            ),
        )
        .unwrap();

    let ledger = Arc::new(ledger);
    let handles: Vec<_> = ["B", "C", "D"]
        .into_iter()
        .map(|member| {
            let ledger = Arc::clone(&ledger);
            let trip = trip.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    ledger
                        .settle(Some(&trip), &uid(member), &uid("A"), dec!(10))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let group = ledger.group(&trip).unwrap();
    assert!(group.validate().is_ok());
    assert!(group.sheet().is_empty());
}

#[test]
fn test_concurrent_individual_expenses() {
    let ledger = Arc::new(Ledger::new());
    for id in ["A", "B", "C"] {
        ledger.register_user(uid(id), id).unwrap();
    }

    let handles: Vec<_> = [("A", "B"), ("B", "C"), ("C", "A")]
        .into_iter()
        .map(|(payer, other)| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..50 {
                    ledger
                        .record_expense(
                            None,
                            ExpenseRequest::equal(
                                "Round",
                                dec!(2),
                                uid(payer),
                                vec![uid(payer), uid(other)],
                            ),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let restored = Ledger::from_snapshot(ledger.snapshot());
    assert!(restored.is_ok(), "balances must stay mirrored");
    assert_eq!(ledger.balances_of(&uid("A")).unwrap()[&uid("B")], dec!(50));
    assert_eq!(ledger.balances_of(&uid("A")).unwrap()[&uid("C")], dec!(-50));
    assert_eq!(ledger.individual_expenses().len(), 150);
}

#[test]
fn test_cycles_vanish_after_simplification() {
    let (ledger, trip) = trip_ledger();
    for (payer, participant, total) in [("A", "B", dec!(120)), ("B", "C", dec!(90)), ("C", "A", dec!(60))] {
        ledger
            .record_expense(
                Some(&trip),
                ExpenseRequest::exact(
                    "Round",
                    total,
                    uid(payer),
                    vec![uid(participant)],
                    vec![total],
                ),
            )
            .unwrap();
    }

    let before = ledger.group(&trip).unwrap();
    let cycles = find_cycles(&DebtGraph::from_sheet(before.sheet()));
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].bottleneck, dec!(60));

    let result = ledger.simplify_group(&trip).unwrap();
    assert!(result.is_valid());
    let after = ledger.group(&trip).unwrap();
    assert!(find_cycles(&DebtGraph::from_sheet(after.sheet())).is_empty());
    assert!(result.gross_after() < result.gross_before());
}

#[test]
fn test_generated_group_pipeline() {
    let config = ScenarioConfig {
        member_count: 12,
        expense_count: 80,
        ..Default::default()
    };
    let mut group = generate_random_group(&config).unwrap();
    assert!(group.validate().is_ok());

    let nets = DebtSimplifier::net_positions(group.sheet());
    let result = group.simplify();
    assert!(result.is_valid());
    assert!(group.validate().is_ok());
    for (member, net) in nets {
        let after: Decimal = group.sheet().balances_of(&member).values().sum();
        assert!(approx_eq(after, net));
    }
}
