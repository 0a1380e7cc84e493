pub mod ledger;
pub mod notify;
pub mod registry;
