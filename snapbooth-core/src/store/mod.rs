//! `SessionStore` implementations.

pub mod memory;
pub mod postgres;

pub use memory::InMemorySessionStore;
pub use postgres::PostgresSessionStore;
