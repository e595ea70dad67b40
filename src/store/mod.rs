//! Customer persistence.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{Customer, CustomerStatus, CustomerStore, Stats};
