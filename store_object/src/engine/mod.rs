//! Persistence engines

pub mod memory;
pub mod postgres;

pub use memory::MemoryEngine;
pub use postgres::PgEngine;
