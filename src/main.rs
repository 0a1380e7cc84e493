//! split-ledger CLI
//!
//! Apply a group's expenses and settlements from a JSON file, then
//! simplify the resulting debts.
//!
//! # Usage
//!
//! ```bash
//! # Simplify a group's debts
//! split-ledger simplify --input trip.json
//!
//! # Output as JSON
//! split-ledger simplify --input trip.json --format json
//!
//! # Show circular debts before simplification
//! split-ledger cycles --input trip.json
//!
//! # Generate a random group for testing
//! split-ledger generate --members 8 --expenses 40
//! ```

use env_logger::Env;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use split_ledger::core::expense::ExpenseRequest;
use split_ledger::core::group::GroupId;
use split_ledger::core::user::UserId;
use split_ledger::engine::ledger::Ledger;
use split_ledger::engine::notify::LogNotifier;
use split_ledger::graph::cycle_detection::find_cycles;
use split_ledger::graph::debt_graph::DebtGraph;
use split_ledger::optimization::simplify::{DebtSimplifier, Payment};
use split_ledger::simulation::scenario::{generate_expenses, member_ids, ScenarioConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"split-ledger — shared-expense ledger and debt simplification

USAGE:
    split-ledger <COMMAND> [OPTIONS]

COMMANDS:
    simplify    Apply a group file and simplify its debts
    cycles      Detect circular debts in a group file
    generate    Generate a random group file (for testing)
    help        Show this message

OPTIONS (simplify, cycles):
    --input <FILE>      Path to JSON group file
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --members <N>       Number of members (default: 6)
    --expenses <N>      Number of expenses (default: 20)
    --output <FILE>     Write to file instead of stdout

ENVIRONMENT:
    RUST_LOG            Log filter (default: warn)

EXAMPLES:
    split-ledger simplify --input trip.json
    split-ledger simplify --input trip.json --format json
    split-ledger cycles --input trip.json
    split-ledger generate --members 8 --expenses 40 --output trip.json"#
    );
}

/// JSON schema for a group file.
#[derive(Serialize, Deserialize)]
struct GroupFile {
    #[serde(default = "default_group")]
    group: String,
    members: Vec<String>,
    #[serde(default)]
    expenses: Vec<ExpenseRequest>,
    #[serde(default)]
    settlements: Vec<SettlementInput>,
}

fn default_group() -> String {
    "group".to_string()
}

#[derive(Serialize, Deserialize)]
struct SettlementInput {
    from: String,
    to: String,
    amount: Decimal,
}

/// JSON output schema for simplification results.
#[derive(Serialize)]
struct SimplifyOutput {
    group: String,
    debts_before: usize,
    debts_after: usize,
    gross_before: String,
    gross_after: String,
    savings: String,
    savings_percent: f64,
    valid: bool,
    positions: Vec<PositionOutput>,
    payments: Vec<Payment>,
}

#[derive(Serialize)]
struct PositionOutput {
    member: String,
    net_position: String,
    status: String,
}

#[derive(Serialize)]
struct CycleOutput {
    members: Vec<String>,
    bottleneck: String,
    potential_savings: String,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load_group(path: &str) -> (Ledger, GroupId) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading file '{}': {}", path, e)));

    let file: GroupFile = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "group": "trip",
  "members": ["A", "B", "C"],
  "expenses": [
    {{ "description": "Lunch", "total": "90", "payer": "A", "participants": ["A", "B", "C"], "policy": "equal" }}
  ],
  "settlements": [
    {{ "from": "B", "to": "A", "amount": "10" }}
  ]
}}"#
        );
        process::exit(1);
    });

    let ledger = Ledger::new().with_notifier(LogNotifier);
    let group = GroupId::new(file.group);
    for member in &file.members {
        ledger
            .register_user(UserId::new(member.as_str()), member.as_str())
            .unwrap_or_else(|e| fail(e));
    }
    ledger
        .create_group(
            group.clone(),
            group.as_str(),
            file.members.iter().map(|m| UserId::new(m.as_str())),
        )
        .unwrap_or_else(|e| fail(e));

    for (i, request) in file.expenses.into_iter().enumerate() {
        let description = request.description.clone();
        if let Err(e) = ledger.record_expense(Some(&group), request) {
            fail(format!("expense #{} ({}): {}", i + 1, description, e));
        }
    }
    for (i, settlement) in file.settlements.iter().enumerate() {
        let from = UserId::new(settlement.from.as_str());
        let to = UserId::new(settlement.to.as_str());
        if let Err(e) = ledger.settle(Some(&group), &from, &to, settlement.amount) {
            fail(format!("settlement #{}: {}", i + 1, e));
        }
    }

    (ledger, group)
}

/// Parse `--input` and `--format` for commands that read a group file.
fn parse_input_args(args: &[String]) -> (String, String) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--input requires a file path")),
                );
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| fail("--input <FILE> is required"));
    (path, format)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(format!("encoding JSON: {}", e)))
}

fn cmd_simplify(args: &[String]) {
    let (path, format) = parse_input_args(args);
    let (ledger, group) = load_group(&path);

    let before = ledger.group(&group).unwrap_or_else(|e| fail(e));
    let result = ledger.simplify_group(&group).unwrap_or_else(|e| fail(e));

    if format == "json" {
        let positions = result
            .net_positions()
            .iter()
            .filter(|(_, net)| **net != Decimal::ZERO)
            .map(|(member, net)| PositionOutput {
                member: member.to_string(),
                net_position: net.to_string(),
                status: if *net > Decimal::ZERO {
                    "CREDITOR".to_string()
                } else {
                    "DEBTOR".to_string()
                },
            })
            .collect();

        let output = SimplifyOutput {
            group: group.to_string(),
            debts_before: result.debts_before(),
            debts_after: result.debts_after(),
            gross_before: result.gross_before().to_string(),
            gross_after: result.gross_after().to_string(),
            savings: result.savings().to_string(),
            savings_percent: result.savings_percent(),
            valid: result.is_valid(),
            positions,
            payments: result.payments().to_vec(),
        };
        println!("{}", to_json(&output));
    } else {
        println!("=== Balances Before ===");
        for (debtor, creditor, amount) in before.sheet().debts() {
            println!("  {} owes {} {}", debtor, creditor, amount);
        }
        println!();
        println!("{}", result);

        println!("=== Net Positions ===");
        for (member, net) in result.net_positions() {
            println!("  {:<15} {:>15}", member, net.round_dp(2));
        }
    }
}

fn cmd_cycles(args: &[String]) {
    let (path, format) = parse_input_args(args);
    let (ledger, group) = load_group(&path);
    let snapshot = ledger.group(&group).unwrap_or_else(|e| fail(e));
    let cycles = find_cycles(&DebtGraph::from_sheet(snapshot.sheet()));

    if format == "json" {
        let output: Vec<CycleOutput> = cycles
            .iter()
            .map(|cycle| CycleOutput {
                members: cycle.members.iter().map(|m| m.to_string()).collect(),
                bottleneck: cycle.bottleneck.to_string(),
                potential_savings: cycle.potential_savings().to_string(),
            })
            .collect();
        println!("{}", to_json(&output));
    } else if cycles.is_empty() {
        println!("No debt cycles detected.");
    } else {
        for (i, cycle) in cycles.iter().enumerate() {
            let members: Vec<String> = cycle.members.iter().map(|m| m.to_string()).collect();
            println!("Cycle {}: {} → (back to start)", i, members.join(" → "));
            println!("  Bottleneck:        {}", cycle.bottleneck);
            println!("  Potential savings: {}", cycle.potential_savings());
        }
        let simplified = DebtSimplifier::simplify(snapshot.sheet());
        println!("\nTotal cycles: {}", cycles.len());
        println!(
            "Simplification would leave {} of {} debts.",
            simplified.debts_after(),
            simplified.debts_before()
        );
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = ScenarioConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--members" => {
                i += 1;
                config.member_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--members requires a number"));
            }
            "--expenses" => {
                i += 1;
                config.expense_count = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--expenses requires a number"));
            }
            "--output" => {
                i += 1;
                output_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--output requires a file path")),
                );
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let file = GroupFile {
        group: "generated".to_string(),
        members: member_ids(config.member_count)
            .iter()
            .map(|m| m.to_string())
            .collect(),
        expenses: generate_expenses(&config),
        settlements: Vec::new(),
    };
    let json = to_json(&file);

    if let Some(path) = output_path {
        fs::write(&path, &json)
            .unwrap_or_else(|e| fail(format!("writing to '{}': {}", path, e)));
        eprintln!(
            "Generated {} expenses across {} members → {}",
            file.expenses.len(),
            file.members.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "simplify" => cmd_simplify(rest),
        "cycles" => cmd_cycles(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
