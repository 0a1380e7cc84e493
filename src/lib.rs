//! # split-ledger
//!
//! Shared-expense ledger and debt simplification engine.
//!
//! Tracks who owes whom across individual and group contexts, splits
//! expenses under equal, exact, or percentage policies, and collapses a
//! group's web of pairwise debts into a small set of settling payments.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: users, groups, expenses, split policies, balance sheets
//! - **optimization** — Greedy debt simplification
//! - **graph** — Debt graph view and cycle detection
//! - **engine** — The caller-facing ledger, user/group registry, and notifications
//! - **simulation** — Random expense scenarios for testing and benchmarks

pub mod core;
pub mod engine;
pub mod graph;
pub mod optimization;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::balance_sheet::BalanceSheet;
    pub use crate::core::error::{LedgerError, LedgerResult, ValidationError};
    pub use crate::core::expense::{Expense, ExpenseRequest};
    pub use crate::core::group::{Group, GroupId};
    pub use crate::core::money::EPSILON;
    pub use crate::core::split::{calculate_splits, Split, SplitPolicy};
    pub use crate::core::user::{User, UserId};
    pub use crate::engine::ledger::{Ledger, LedgerSnapshot};
    pub use crate::engine::notify::{ChannelNotifier, LedgerEvent, LogNotifier, Notifier};
    pub use crate::optimization::simplify::{DebtSimplifier, Payment, SimplificationResult};
}
