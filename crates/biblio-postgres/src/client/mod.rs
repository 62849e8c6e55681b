//! Database client: configuration, connection pooling, and migrations.

mod pg_client;
mod pg_config;

pub use self::pg_client::{ConnectionPool, PgClient, PgPoolStatus, PooledConnection};
pub use self::pg_config::PgConfig;
