use async_trait::async_trait;
use error_stack::{report, Result, ResultExt};
use geo_sink_common::{Cursor, CursorAction};
use tokio_postgres::{types::ToSql, GenericClient, Row, Transaction};
use tracing::debug;

use crate::storage::{
    BlockRow, EditChange, EditRow, EditWrite, ExecutedProposalRow, MembershipRow, RelationRow,
    SpaceRole, SpaceRow, SpaceType, Storage, SubspaceRow, TripleRow, VoteRow, WriteError,
};

use super::{
    journal::{self, TrackedTable},
    persistence, PgConnection, PgPool,
};

const SPACE_COLUMNS: &str = "id, dao_address, type, space_plugin_address, \
    main_voting_plugin_address, member_access_plugin_address, \
    personal_space_admin_plugin_address, admins, editors, editor_controllers, created_at_block";

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// Storage backed by PostgreSQL.
///
/// Every write runs in its own transaction, together with the snapshot of the rows it changes.
/// An edit is a single write.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        PostgresStorage { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn connection(&self) -> Result<PgConnection, WriteError> {
        self.pool
            .get_owned()
            .await
            .change_context(WriteError)
            .attach_printable("failed to get database connection")
    }

    async fn query_space(&self, filter: &str, value: &str) -> Result<Option<SpaceRow>, WriteError> {
        let conn = self.connection().await?;
        let query = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE {filter} LIMIT 1");
        let row = conn
            .query_opt(&query, &[&value])
            .await
            .change_context(WriteError)
            .attach_printable("failed to query space")?;
        row.as_ref().map(space_from_row).transpose()
    }

    /// Run a statement that only inserts rows. Undo deletes them by creation block.
    async fn insert(&self, statement: &str, params: Params<'_>) -> Result<u64, WriteError> {
        let conn = self.connection().await?;
        conn.execute(statement, params)
            .await
            .change_context(WriteError)
            .attach_printable_lazy(|| format!("failed to run {statement}"))
    }

    /// Snapshot the row of `table` at `key`, then run `statement`.
    async fn tracked_write(
        &self,
        table: &TrackedTable,
        key: Params<'_>,
        statement: &str,
        params: Params<'_>,
        block: u64,
    ) -> Result<u64, WriteError> {
        let mut conn = self.connection().await?;
        let tx = begin(&mut conn).await?;
        let affected = tracked_execute(&tx, table, key, statement, params, block).await?;
        commit(tx).await?;
        Ok(affected)
    }

    async fn update_space(
        &self,
        space_id: &str,
        statement: &str,
        params: Params<'_>,
        block: u64,
    ) -> Result<(), WriteError> {
        let updated = self
            .tracked_write(&journal::SPACES, &[&space_id], statement, params, block)
            .await?;

        if updated == 0 {
            return Err(report!(WriteError)
                .attach_printable(format!("space {space_id} does not exist")));
        }

        Ok(())
    }

    async fn add_membership(
        &self,
        table: &TrackedTable,
        row: &MembershipRow,
        block: u64,
    ) -> Result<(), WriteError> {
        let statement = format!(
            "INSERT INTO {} (space_id, account_id, created_at_block) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
            table.name
        );
        self.insert(
            &statement,
            &[&row.space_id, &row.account_id, &(block as i64)],
        )
        .await?;
        Ok(())
    }

    async fn remove_membership(
        &self,
        table: &TrackedTable,
        row: &MembershipRow,
        block: u64,
    ) -> Result<(), WriteError> {
        let key: Params = &[&row.space_id, &row.account_id];
        let statement = format!("DELETE FROM {} WHERE {}", table.name, table.key_filter());
        self.tracked_write(table, key, &statement, key, block)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn space_by_id(&self, id: &str) -> Result<Option<SpaceRow>, WriteError> {
        self.query_space("id = $1", id).await
    }

    async fn space_by_dao(&self, dao_address: &str) -> Result<Option<SpaceRow>, WriteError> {
        self.query_space("dao_address = $1", dao_address).await
    }

    async fn space_by_plugin(&self, plugin_address: &str) -> Result<Option<SpaceRow>, WriteError> {
        self.query_space(
            "$1 IN (space_plugin_address, main_voting_plugin_address, \
             member_access_plugin_address, personal_space_admin_plugin_address)",
            plugin_address,
        )
        .await
    }

    async fn upsert_block(&self, block: &BlockRow) -> Result<(), WriteError> {
        let timestamp = block.timestamp.map(|timestamp| timestamp as i64);
        self.insert(
            "INSERT INTO blocks (number, hash, timestamp, created_at_block) \
             VALUES ($1, $2, $3, $1) \
             ON CONFLICT (number) DO UPDATE SET hash = EXCLUDED.hash, timestamp = EXCLUDED.timestamp",
            &[&(block.number as i64), &block.hash, &timestamp],
        )
        .await?;
        Ok(())
    }

    async fn upsert_accounts(&self, accounts: &[String], block: u64) -> Result<(), WriteError> {
        if accounts.is_empty() {
            return Ok(());
        }

        let conn = self.connection().await?;
        insert_accounts(&*conn, accounts, block).await
    }

    async fn insert_space(&self, space: &SpaceRow) -> Result<(), WriteError> {
        self.insert(
            "INSERT INTO spaces (id, dao_address, type, space_plugin_address, \
             main_voting_plugin_address, member_access_plugin_address, \
             personal_space_admin_plugin_address, admins, editors, editor_controllers, \
             created_at_block) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT DO NOTHING",
            &[
                &space.id,
                &space.dao_address,
                &space.space_type.as_str(),
                &space.space_plugin_address,
                &space.main_voting_plugin_address,
                &space.member_access_plugin_address,
                &space.personal_space_admin_plugin_address,
                &space.admins,
                &space.editors,
                &space.editor_controllers,
                &(space.created_at_block as i64),
            ],
        )
        .await?;
        Ok(())
    }

    async fn set_governance_plugins(
        &self,
        space_id: &str,
        main_voting_plugin_address: &str,
        member_access_plugin_address: &str,
        block: u64,
    ) -> Result<(), WriteError> {
        self.update_space(
            space_id,
            "UPDATE spaces SET main_voting_plugin_address = $2, member_access_plugin_address = $3 \
             WHERE id = $1",
            &[
                &space_id,
                &main_voting_plugin_address,
                &member_access_plugin_address,
            ],
            block,
        )
        .await
    }

    async fn set_personal_plugin(
        &self,
        space_id: &str,
        personal_space_admin_plugin_address: &str,
        block: u64,
    ) -> Result<(), WriteError> {
        self.update_space(
            space_id,
            "UPDATE spaces SET type = $2, personal_space_admin_plugin_address = $3 WHERE id = $1",
            &[
                &space_id,
                &SpaceType::Personal.as_str(),
                &personal_space_admin_plugin_address,
            ],
            block,
        )
        .await
    }

    async fn add_member(&self, member: &MembershipRow, block: u64) -> Result<(), WriteError> {
        self.add_membership(&journal::SPACE_MEMBERS, member, block)
            .await
    }

    async fn remove_member(&self, member: &MembershipRow, block: u64) -> Result<(), WriteError> {
        self.remove_membership(&journal::SPACE_MEMBERS, member, block)
            .await
    }

    async fn add_editor(&self, editor: &MembershipRow, block: u64) -> Result<(), WriteError> {
        self.add_membership(&journal::SPACE_EDITORS, editor, block)
            .await
    }

    async fn remove_editor(&self, editor: &MembershipRow, block: u64) -> Result<(), WriteError> {
        self.remove_membership(&journal::SPACE_EDITORS, editor, block)
            .await
    }

    async fn add_subspace(&self, subspace: &SubspaceRow, block: u64) -> Result<(), WriteError> {
        self.insert(
            "INSERT INTO space_subspaces (parent_space_id, subspace_id, created_at_block) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            &[
                &subspace.parent_space_id,
                &subspace.subspace_id,
                &(block as i64),
            ],
        )
        .await?;
        Ok(())
    }

    async fn remove_subspace(
        &self,
        subspace: &SubspaceRow,
        block: u64,
    ) -> Result<(), WriteError> {
        let table = &journal::SPACE_SUBSPACES;
        let key: Params = &[&subspace.parent_space_id, &subspace.subspace_id];
        let statement = format!("DELETE FROM {} WHERE {}", table.name, table.key_filter());
        self.tracked_write(table, key, &statement, key, block)
            .await?;
        Ok(())
    }

    async fn add_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        block: u64,
    ) -> Result<(), WriteError> {
        let statement = format!(
            "UPDATE spaces SET {column} = CASE WHEN $2::text = ANY({column}) THEN {column} \
             ELSE array_append({column}, $2::text) END WHERE id = $1",
            column = role.column()
        );
        self.update_space(space_id, &statement, &[&space_id, &account_id], block)
            .await
    }

    async fn remove_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        block: u64,
    ) -> Result<(), WriteError> {
        let statement = format!(
            "UPDATE spaces SET {column} = array_remove({column}, $2::text) WHERE id = $1",
            column = role.column()
        );
        self.update_space(space_id, &statement, &[&space_id, &account_id], block)
            .await
    }

    async fn apply_edit(&self, write: &EditWrite, block: u64) -> Result<(), WriteError> {
        let mut conn = self.connection().await?;
        let tx = begin(&mut conn).await?;

        insert_accounts(&tx, &write.accounts, block).await?;
        upsert_edit(&tx, &write.edit, block).await?;

        let space_id = write.edit.space_id.as_str();
        for (index, change) in write.changes.iter().enumerate() {
            apply_change(&tx, space_id, change, block)
                .await
                .attach_printable_lazy(|| format!("edit {} op {index}", write.edit.id))?;
        }

        // Dropping the transaction on error rolls back the whole edit.
        commit(tx).await
    }

    async fn upsert_vote(&self, vote: &VoteRow, block: u64) -> Result<(), WriteError> {
        self.tracked_write(
            &journal::PROPOSAL_VOTES,
            &[
                &vote.space_id,
                &vote.plugin_address,
                &vote.onchain_proposal_id,
                &vote.account_id,
            ],
            "INSERT INTO proposal_votes (space_id, plugin_address, onchain_proposal_id, \
             account_id, vote, created_at_block) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (space_id, plugin_address, onchain_proposal_id, account_id) \
             DO UPDATE SET vote = EXCLUDED.vote",
            &[
                &vote.space_id,
                &vote.plugin_address,
                &vote.onchain_proposal_id,
                &vote.account_id,
                &vote.vote.as_str(),
                &(block as i64),
            ],
            block,
        )
        .await?;
        Ok(())
    }

    async fn upsert_executed_proposal(
        &self,
        proposal: &ExecutedProposalRow,
        block: u64,
    ) -> Result<(), WriteError> {
        self.insert(
            "INSERT INTO executed_proposals (space_id, plugin_address, onchain_proposal_id, \
             created_at_block) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            &[
                &proposal.space_id,
                &proposal.plugin_address,
                &proposal.onchain_proposal_id,
                &(block as i64),
            ],
        )
        .await?;
        Ok(())
    }

    async fn finish_block(
        &self,
        block: &BlockRow,
        final_block_height: u64,
    ) -> Result<(), WriteError> {
        let conn = self.connection().await?;
        let pruned = journal::prune(&*conn, final_block_height).await?;
        debug!(block = block.number, final_block_height, pruned, "pruned row snapshots");
        Ok(())
    }

    async fn undo_to(&self, cursor: &Cursor) -> Result<CursorAction, WriteError> {
        let mut conn = self.connection().await?;
        let tx = begin(&mut conn).await?;

        journal::undo(&tx, cursor.block_number).await?;
        persistence::write_cursor(&tx, cursor).await?;

        commit(tx).await?;
        Ok(CursorAction::Skip)
    }
}

async fn begin(conn: &mut PgConnection) -> Result<Transaction<'_>, WriteError> {
    conn.transaction()
        .await
        .change_context(WriteError)
        .attach_printable("failed to start transaction")
}

async fn commit(tx: Transaction<'_>) -> Result<(), WriteError> {
    tx.commit()
        .await
        .change_context(WriteError)
        .attach_printable("failed to commit transaction")
}

/// Snapshot the row of `table` at `key`, then run `statement`.
async fn tracked_execute(
    tx: &Transaction<'_>,
    table: &TrackedTable,
    key: Params<'_>,
    statement: &str,
    params: Params<'_>,
    block: u64,
) -> Result<u64, WriteError> {
    journal::snapshot(tx, table, key, block).await?;
    tx.execute(statement, params)
        .await
        .change_context(WriteError)
        .attach_printable_lazy(|| format!("failed to write {}", table.name))
}

async fn insert_accounts<C>(client: &C, accounts: &[String], block: u64) -> Result<(), WriteError>
where
    C: GenericClient + Sync,
{
    if accounts.is_empty() {
        return Ok(());
    }

    client
        .execute(
            "INSERT INTO accounts (id, created_at_block) \
             SELECT unnest($1::text[]), $2::bigint \
             ON CONFLICT (id) DO NOTHING",
            &[&accounts, &(block as i64)],
        )
        .await
        .change_context(WriteError)
        .attach_printable("failed to write accounts")?;
    Ok(())
}

async fn upsert_edit(tx: &Transaction<'_>, edit: &EditRow, block: u64) -> Result<(), WriteError> {
    tracked_execute(
        tx,
        &journal::EDITS,
        &[&edit.id],
        "INSERT INTO edits (id, space_id, name, version, content_uri, authors, \
         created_at_block) VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET space_id = EXCLUDED.space_id, name = EXCLUDED.name, \
         version = EXCLUDED.version, content_uri = EXCLUDED.content_uri, \
         authors = EXCLUDED.authors",
        &[
            &edit.id,
            &edit.space_id,
            &edit.name,
            &edit.version,
            &edit.content_uri,
            &edit.authors,
            &(block as i64),
        ],
        block,
    )
    .await?;
    Ok(())
}

async fn apply_change(
    tx: &Transaction<'_>,
    space_id: &str,
    change: &EditChange,
    block: u64,
) -> Result<(), WriteError> {
    match change {
        EditChange::SetTriple(triple) => upsert_triple(tx, triple, block).await,
        EditChange::DeleteTriple {
            entity_id,
            attribute_id,
        } => {
            let table = &journal::TRIPLES;
            let key: Params = &[&space_id, entity_id, attribute_id];
            let statement = format!("DELETE FROM {} WHERE {}", table.name, table.key_filter());
            tracked_execute(tx, table, key, &statement, key, block).await?;
            Ok(())
        }
        EditChange::DeleteEntity { entity_id } => {
            delete_entity(tx, space_id, entity_id, block).await
        }
        EditChange::SetRelation(relation) => upsert_relation(tx, relation, block).await,
        EditChange::DeleteRelation { relation_id } => {
            let table = &journal::RELATIONS;
            let key: Params = &[&space_id, relation_id];
            let statement = format!("DELETE FROM {} WHERE {}", table.name, table.key_filter());
            tracked_execute(tx, table, key, &statement, key, block).await?;
            Ok(())
        }
    }
}

async fn upsert_triple(
    tx: &Transaction<'_>,
    triple: &TripleRow,
    block: u64,
) -> Result<(), WriteError> {
    insert_entities(tx, &[triple.entity_id.as_str()], block).await?;

    tracked_execute(
        tx,
        &journal::TRIPLES,
        &[&triple.space_id, &triple.entity_id, &triple.attribute_id],
        "INSERT INTO triples (space_id, entity_id, attribute_id, value_type, value, \
         created_at_block) VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (space_id, entity_id, attribute_id) DO UPDATE SET \
         value_type = EXCLUDED.value_type, value = EXCLUDED.value",
        &[
            &triple.space_id,
            &triple.entity_id,
            &triple.attribute_id,
            &triple.value_type.as_str(),
            &triple.value,
            &(block as i64),
        ],
        block,
    )
    .await?;
    Ok(())
}

async fn delete_entity(
    tx: &Transaction<'_>,
    space_id: &str,
    entity_id: &str,
    block: u64,
) -> Result<(), WriteError> {
    let params: Params = &[&space_id, &entity_id];

    let triples_filter = "space_id = $1 AND entity_id = $2";
    journal::snapshot_where(tx, &journal::TRIPLES, triples_filter, params, block).await?;
    tx.execute(
        &format!("DELETE FROM triples WHERE {triples_filter}"),
        params,
    )
    .await
    .change_context(WriteError)
    .attach_printable("failed to delete entity triples")?;

    let relations_filter =
        "space_id = $1 AND (from_entity_id = $2 OR to_entity_id = $2 OR entity_id = $2)";
    journal::snapshot_where(tx, &journal::RELATIONS, relations_filter, params, block).await?;
    tx.execute(
        &format!("DELETE FROM relations WHERE {relations_filter}"),
        params,
    )
    .await
    .change_context(WriteError)
    .attach_printable("failed to delete entity relations")?;

    Ok(())
}

async fn upsert_relation(
    tx: &Transaction<'_>,
    relation: &RelationRow,
    block: u64,
) -> Result<(), WriteError> {
    let mut entities = vec![
        relation.from_entity_id.as_str(),
        relation.to_entity_id.as_str(),
    ];
    if !relation.entity_id.is_empty() {
        entities.push(relation.entity_id.as_str());
    }
    insert_entities(tx, &entities, block).await?;

    tracked_execute(
        tx,
        &journal::RELATIONS,
        &[&relation.space_id, &relation.id],
        r#"INSERT INTO relations (id, space_id, type_id, from_entity_id, to_entity_id,
         entity_id, "index", created_at_block) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (space_id, id) DO UPDATE SET type_id = EXCLUDED.type_id,
         from_entity_id = EXCLUDED.from_entity_id, to_entity_id = EXCLUDED.to_entity_id,
         entity_id = EXCLUDED.entity_id, "index" = EXCLUDED."index""#,
        &[
            &relation.id,
            &relation.space_id,
            &relation.type_id,
            &relation.from_entity_id,
            &relation.to_entity_id,
            &relation.entity_id,
            &relation.index,
            &(block as i64),
        ],
        block,
    )
    .await?;
    Ok(())
}

async fn insert_entities(
    tx: &Transaction<'_>,
    entities: &[&str],
    block: u64,
) -> Result<(), WriteError> {
    tx.execute(
        "INSERT INTO entities (id, created_at_block) SELECT unnest($1::text[]), $2::bigint \
         ON CONFLICT (id) DO NOTHING",
        &[&entities, &(block as i64)],
    )
    .await
    .change_context(WriteError)
    .attach_printable("failed to write entities")?;
    Ok(())
}

fn space_from_row(row: &Row) -> Result<SpaceRow, WriteError> {
    let space_type: String = row.try_get("type").change_context(WriteError)?;
    let space_type = SpaceType::from_str_name(&space_type).ok_or_else(|| {
        report!(WriteError).attach_printable(format!("unknown space type {space_type}"))
    })?;
    let created_at_block: i64 = row.try_get("created_at_block").change_context(WriteError)?;

    Ok(SpaceRow {
        id: row.try_get("id").change_context(WriteError)?,
        dao_address: row.try_get("dao_address").change_context(WriteError)?,
        space_type,
        space_plugin_address: row
            .try_get("space_plugin_address")
            .change_context(WriteError)?,
        main_voting_plugin_address: row
            .try_get("main_voting_plugin_address")
            .change_context(WriteError)?,
        member_access_plugin_address: row
            .try_get("member_access_plugin_address")
            .change_context(WriteError)?,
        personal_space_admin_plugin_address: row
            .try_get("personal_space_admin_plugin_address")
            .change_context(WriteError)?,
        admins: row.try_get("admins").change_context(WriteError)?,
        editors: row.try_get("editors").change_context(WriteError)?,
        editor_controllers: row.try_get("editor_controllers").change_context(WriteError)?,
        created_at_block: created_at_block as u64,
    })
}
