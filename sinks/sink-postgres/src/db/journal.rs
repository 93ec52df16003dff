//! Row snapshots used to undo blocks.
//!
//! Writers snapshot the rows they are about to change or delete, tagged with the block number.
//! Undoing to block `J` deletes the rows created after `J` and restores, for every row changed
//! after `J`, the oldest snapshot taken after `J`, that is the row as it was at `J`.
use error_stack::{report, Result, ResultExt};
use serde_json::Value;
use tokio_postgres::{types::ToSql, GenericClient, Transaction};
use tracing::debug;

use crate::storage::WriteError;

/// A table whose rows carry `created_at_block`.
#[derive(Debug)]
pub struct TrackedTable {
    pub name: &'static str,
    pub key_columns: &'static [&'static str],
}

pub const BLOCKS: TrackedTable = TrackedTable {
    name: "blocks",
    key_columns: &["number"],
};

pub const ACCOUNTS: TrackedTable = TrackedTable {
    name: "accounts",
    key_columns: &["id"],
};

pub const SPACES: TrackedTable = TrackedTable {
    name: "spaces",
    key_columns: &["id"],
};

pub const SPACE_MEMBERS: TrackedTable = TrackedTable {
    name: "space_members",
    key_columns: &["space_id", "account_id"],
};

pub const SPACE_EDITORS: TrackedTable = TrackedTable {
    name: "space_editors",
    key_columns: &["space_id", "account_id"],
};

pub const SPACE_SUBSPACES: TrackedTable = TrackedTable {
    name: "space_subspaces",
    key_columns: &["parent_space_id", "subspace_id"],
};

pub const EDITS: TrackedTable = TrackedTable {
    name: "edits",
    key_columns: &["id"],
};

pub const ENTITIES: TrackedTable = TrackedTable {
    name: "entities",
    key_columns: &["id"],
};

pub const TRIPLES: TrackedTable = TrackedTable {
    name: "triples",
    key_columns: &["space_id", "entity_id", "attribute_id"],
};

pub const RELATIONS: TrackedTable = TrackedTable {
    name: "relations",
    key_columns: &["space_id", "id"],
};

pub const PROPOSAL_VOTES: TrackedTable = TrackedTable {
    name: "proposal_votes",
    key_columns: &[
        "space_id",
        "plugin_address",
        "onchain_proposal_id",
        "account_id",
    ],
};

pub const EXECUTED_PROPOSALS: TrackedTable = TrackedTable {
    name: "executed_proposals",
    key_columns: &["space_id", "plugin_address", "onchain_proposal_id"],
};

pub const TRACKED_TABLES: &[TrackedTable] = &[
    BLOCKS,
    ACCOUNTS,
    SPACES,
    SPACE_MEMBERS,
    SPACE_EDITORS,
    SPACE_SUBSPACES,
    EDITS,
    ENTITIES,
    TRIPLES,
    RELATIONS,
    PROPOSAL_VOTES,
    EXECUTED_PROPOSALS,
];

const LATEST_SNAPSHOTS_QUERY: &str = r#"
SELECT table_name, row_key, row_data FROM (
    SELECT DISTINCT ON (table_name, row_key) table_name, row_key, row_data
    FROM row_snapshots
    WHERE block_number > $1
    ORDER BY table_name, row_key, id
) s
WHERE (row_data->>'created_at_block')::bigint <= $1
"#;

impl TrackedTable {
    fn by_name(name: &str) -> Option<&'static TrackedTable> {
        TRACKED_TABLES.iter().find(|table| table.name == name)
    }

    /// Expression that evaluates to the json key of a row.
    pub fn key_expression(&self) -> String {
        let fields = self
            .key_columns
            .iter()
            .map(|column| format!("'{column}', {column}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("jsonb_build_object({fields})")
    }

    /// Filter on the key columns, bound to parameters `$1..$n`.
    pub fn key_filter(&self) -> String {
        self.key_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Snapshot the row with the given key, if it exists.
pub async fn snapshot(
    tx: &Transaction<'_>,
    table: &TrackedTable,
    key: &[&(dyn ToSql + Sync)],
    block: u64,
) -> Result<(), WriteError> {
    snapshot_where(tx, table, &table.key_filter(), key, block).await
}

/// Snapshot all rows matching `filter`.
pub async fn snapshot_where(
    tx: &Transaction<'_>,
    table: &TrackedTable,
    filter: &str,
    params: &[&(dyn ToSql + Sync)],
    block: u64,
) -> Result<(), WriteError> {
    let query = format!(
        "INSERT INTO row_snapshots (block_number, table_name, row_key, row_data) \
         SELECT {block}, '{name}', {key}, to_jsonb(t) FROM {name} t WHERE {filter}",
        name = table.name,
        key = table.key_expression(),
    );

    tx.execute(&query, params)
        .await
        .change_context(WriteError)
        .attach_printable_lazy(|| format!("failed to snapshot rows of {}", table.name))?;

    Ok(())
}

/// Revert all tracked tables to their state at `block_number`.
pub async fn undo(tx: &Transaction<'_>, block_number: u64) -> Result<(), WriteError> {
    let block = block_number as i64;

    for table in TRACKED_TABLES {
        let deleted = tx
            .execute(
                &format!("DELETE FROM {} WHERE created_at_block > $1", table.name),
                &[&block],
            )
            .await
            .change_context(WriteError)
            .attach_printable_lazy(|| format!("failed to delete new rows of {}", table.name))?;
        debug!(table = table.name, deleted, "deleted rows created after undo block");
    }

    let snapshots = tx
        .query(LATEST_SNAPSHOTS_QUERY, &[&block])
        .await
        .change_context(WriteError)
        .attach_printable("failed to read row snapshots")?;

    for snapshot in &snapshots {
        let table_name: String = snapshot.try_get(0).change_context(WriteError)?;
        let key: Value = snapshot.try_get(1).change_context(WriteError)?;
        let data: Value = snapshot.try_get(2).change_context(WriteError)?;

        let table = TrackedTable::by_name(&table_name).ok_or_else(|| {
            report!(WriteError).attach_printable(format!("unknown snapshot table {table_name}"))
        })?;

        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = $1",
                table.name,
                table.key_expression()
            ),
            &[&key],
        )
        .await
        .change_context(WriteError)
        .attach_printable_lazy(|| format!("failed to clear row of {}", table.name))?;

        tx.execute(
            &format!(
                "INSERT INTO {0} SELECT * FROM jsonb_populate_record(NULL::{0}, $1)",
                table.name
            ),
            &[&data],
        )
        .await
        .change_context(WriteError)
        .attach_printable_lazy(|| format!("failed to restore row of {}", table.name))?;
    }

    tx.execute("DELETE FROM row_snapshots WHERE block_number > $1", &[&block])
        .await
        .change_context(WriteError)
        .attach_printable("failed to delete row snapshots")?;

    debug!(block_number, restored = snapshots.len(), "undo journal applied");

    Ok(())
}

/// Drop the snapshots of blocks that can no longer be undone.
pub async fn prune<C>(client: &C, final_block_height: u64) -> Result<u64, WriteError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            "DELETE FROM row_snapshots WHERE block_number <= $1",
            &[&(final_block_height as i64)],
        )
        .await
        .change_context(WriteError)
        .attach_printable("failed to prune row snapshots")
}
