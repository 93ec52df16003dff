use error_stack::{Result, ResultExt};
use tokio_postgres::Client;
use tracing::info;

use crate::sink::SinkPostgresError;

/// Tables are created if missing, existing data is left alone.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cursors (
    id text PRIMARY KEY,
    block_number bigint NOT NULL,
    block_hash text NOT NULL,
    block_timestamp bigint,
    cursor text NOT NULL
);

CREATE TABLE IF NOT EXISTS blocks (
    number bigint PRIMARY KEY,
    hash text NOT NULL,
    timestamp bigint,
    created_at_block bigint NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id text PRIMARY KEY,
    created_at_block bigint NOT NULL
);

CREATE TABLE IF NOT EXISTS spaces (
    id text PRIMARY KEY,
    dao_address text NOT NULL UNIQUE,
    type text NOT NULL,
    space_plugin_address text,
    main_voting_plugin_address text,
    member_access_plugin_address text,
    personal_space_admin_plugin_address text,
    admins text[] NOT NULL DEFAULT '{}',
    editors text[] NOT NULL DEFAULT '{}',
    editor_controllers text[] NOT NULL DEFAULT '{}',
    created_at_block bigint NOT NULL
);

CREATE TABLE IF NOT EXISTS space_members (
    space_id text NOT NULL,
    account_id text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, account_id)
);

CREATE TABLE IF NOT EXISTS space_editors (
    space_id text NOT NULL,
    account_id text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, account_id)
);

CREATE TABLE IF NOT EXISTS space_subspaces (
    parent_space_id text NOT NULL,
    subspace_id text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (parent_space_id, subspace_id)
);

CREATE TABLE IF NOT EXISTS edits (
    id text PRIMARY KEY,
    space_id text NOT NULL,
    name text NOT NULL,
    version text NOT NULL,
    content_uri text NOT NULL,
    authors text[] NOT NULL DEFAULT '{}',
    created_at_block bigint NOT NULL
);

CREATE TABLE IF NOT EXISTS entities (
    id text PRIMARY KEY,
    created_at_block bigint NOT NULL
);

CREATE TABLE IF NOT EXISTS triples (
    space_id text NOT NULL,
    entity_id text NOT NULL,
    attribute_id text NOT NULL,
    value_type text NOT NULL,
    value text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, entity_id, attribute_id)
);

CREATE TABLE IF NOT EXISTS relations (
    id text NOT NULL,
    space_id text NOT NULL,
    type_id text NOT NULL,
    from_entity_id text NOT NULL,
    to_entity_id text NOT NULL,
    entity_id text NOT NULL,
    "index" text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, id)
);

CREATE TABLE IF NOT EXISTS proposal_votes (
    space_id text NOT NULL,
    plugin_address text NOT NULL,
    onchain_proposal_id text NOT NULL,
    account_id text NOT NULL,
    vote text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, plugin_address, onchain_proposal_id, account_id)
);

CREATE TABLE IF NOT EXISTS executed_proposals (
    space_id text NOT NULL,
    plugin_address text NOT NULL,
    onchain_proposal_id text NOT NULL,
    created_at_block bigint NOT NULL,
    PRIMARY KEY (space_id, plugin_address, onchain_proposal_id)
);

CREATE TABLE IF NOT EXISTS row_snapshots (
    id bigserial PRIMARY KEY,
    block_number bigint NOT NULL,
    table_name text NOT NULL,
    row_key jsonb NOT NULL,
    row_data jsonb NOT NULL
);

CREATE INDEX IF NOT EXISTS row_snapshots_block_number_idx ON row_snapshots (block_number);
"#;

pub async fn run_migrations(client: &Client) -> Result<(), SinkPostgresError> {
    info!("running database migrations");
    client
        .batch_execute(SCHEMA)
        .await
        .change_context(SinkPostgresError)
        .attach_printable("failed to run database migrations")?;
    Ok(())
}
