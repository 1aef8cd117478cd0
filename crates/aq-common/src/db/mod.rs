pub mod application_queue;
pub mod migrations;
pub mod pool;

pub use pool::{DbPoolError, PgPool};
