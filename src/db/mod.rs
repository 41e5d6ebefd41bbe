pub mod account;
pub mod error;
pub mod income;
pub mod memory;
pub mod postgres;
pub mod request;
pub mod store;
pub mod tx;
pub mod utils;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{IncomeStore, LedgerStore, LedgerTx};
