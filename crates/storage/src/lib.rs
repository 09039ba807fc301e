pub mod db;
pub mod patterns;
pub mod store;
pub mod transactions;

pub use db::{create_db, create_in_memory, DbPool};
pub use patterns::{load_patterns, save_patterns};
pub use store::SqliteStore;
pub use transactions::{
    all_transactions, delete_transactions, get_transaction, insert_transactions,
    transactions_in_month, update_transaction,
};
