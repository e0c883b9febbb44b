pub mod ballot_ledger;
pub mod models;
pub mod poll_store;

pub use ballot_ledger::*;
pub use models::*;
pub use poll_store::*;
