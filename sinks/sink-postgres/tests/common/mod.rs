#![allow(dead_code)]

use geo_sink_common::{Context, Cursor};
use geo_sink_postgres::{
    db::{connect_pool, run_migrations, PgPool},
    ipfs::DEFAULT_IPFS_GATEWAY,
    SinkPostgresOptions,
};
use testcontainers::{core::WaitFor, GenericImage};

pub const DAO: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
pub const DAO_CHECKSUM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const SPACE_PLUGIN: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
pub const VOTING_PLUGIN: &str = "0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb";
pub const MEMBER_ACCESS_PLUGIN: &str = "0xd1220a0cf47c7b9be7a2e6ba89f429762e7b9adb";

pub fn new_postgres_image() -> GenericImage {
    GenericImage::new("postgres", "15-alpine")
        .with_exposed_port(5432)
        .with_env_var("POSTGRES_DB", "postgres")
        .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
}

pub async fn new_pool(port: u16) -> PgPool {
    let options = SinkPostgresOptions {
        database_url: format!("postgresql://postgres@localhost:{}", port),
        no_tls: Some(true),
        tls_certificate: None,
        tls_disable_system_roots: None,
        tls_accept_invalid_certificates: None,
        tls_accept_invalid_hostnames: None,
        tls_use_sni: None,
        max_connections: 8,
        ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        ipfs_max_retries: 0,
        ipfs_timeout_seconds: 1,
    };
    let configuration = options.to_postgres_configuration().unwrap();
    let pool = connect_pool(&configuration).await.unwrap();

    let conn = pool.get().await.unwrap();
    run_migrations(&conn).await.unwrap();
    drop(conn);

    pool
}

pub fn new_cursor(block_number: u64) -> Cursor {
    Cursor {
        block_number,
        block_hash: format!("0x{block_number:064x}"),
        block_timestamp: Some(1_700_000_000 + block_number),
        cursor: format!("cursor-{block_number}"),
    }
}

pub fn new_context(block_number: u64) -> Context {
    Context {
        cursor: new_cursor(block_number),
        final_block_height: 0,
        request_id: format!("request-{block_number}"),
    }
}

pub async fn count(pool: &PgPool, query: &str) -> i64 {
    let conn = pool.get().await.unwrap();
    let row = conn.query_one(query, &[]).await.unwrap();
    row.get(0)
}
