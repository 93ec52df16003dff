//! PostgreSQL storage of the knowledge graph and of the stream cursor.
mod journal;
mod persistence;
mod pool;
mod schema;
mod storage;

pub use self::persistence::PostgresPersistence;
pub use self::pool::{connect_pool, PgConnection, PgPool};
pub use self::schema::run_migrations;
pub use self::storage::PostgresStorage;

/// Id of the row of the `cursors` table used by this sink.
pub const CURSOR_ID: &str = "geo";
