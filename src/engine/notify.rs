use crate::core::group::GroupId;
use crate::core::user::UserId;
use log::info;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use thiserror::Error;

/// A notifier could not deliver a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification not delivered: {0}")]
pub struct NotifyError(pub String);

/// Receives a human-readable message after each committed ledger change.
///
/// Delivery is fire-and-forget: the change is already applied when
/// `notify` runs, and an error only gets logged.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes every message to the `log` facade at info level.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!("{message}");
        Ok(())
    }
}

/// Forwards every message over a channel.
#[derive(Debug)]
pub struct ChannelNotifier {
    sender: Mutex<Sender<String>>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<String>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| NotifyError("channel sender poisoned".to_string()))?;
        sender
            .send(message.to_string())
            .map_err(|_| NotifyError("receiver dropped".to_string()))
    }
}

/// Where a change was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Individual,
    Group(GroupId),
}

impl Scope {
    pub fn from_group(group: Option<&GroupId>) -> Self {
        group.map_or(Scope::Individual, |g| Scope::Group(g.clone()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Individual => f.write_str("individually"),
            Scope::Group(group) => write!(f, "in group {group}"),
        }
    }
}

/// A committed ledger change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    ExpenseAdded {
        scope: Scope,
        description: String,
        payer: UserId,
        total: Decimal,
        participants: usize,
    },
    SettlementRecorded {
        scope: Scope,
        from: UserId,
        to: UserId,
        amount: Decimal,
    },
    GroupSimplified {
        group: GroupId,
        debts_before: usize,
        debts_after: usize,
    },
    MemberAdded {
        group: GroupId,
        user: UserId,
    },
    MemberRemoved {
        group: GroupId,
        user: UserId,
    },
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::ExpenseAdded {
                scope,
                description,
                payer,
                total,
                participants,
            } => write!(
                f,
                "{payer} paid {total} for \"{description}\" split {participants} ways {scope}"
            ),
            LedgerEvent::SettlementRecorded {
                scope,
                from,
                to,
                amount,
            } => write!(f, "{from} paid {to} {amount} {scope}"),
            LedgerEvent::GroupSimplified {
                group,
                debts_before,
                debts_after,
            } => write!(
                f,
                "group {group} simplified from {debts_before} to {debts_after} debts"
            ),
            LedgerEvent::MemberAdded { group, user } => write!(f, "{user} joined group {group}"),
            LedgerEvent::MemberRemoved { group, user } => write!(f, "{user} left group {group}"),
        }
    }
}
