pub mod balance_sheet;
pub mod error;
pub mod expense;
pub mod group;
pub mod money;
pub mod split;
pub mod user;
