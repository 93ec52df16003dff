use geo_sink_common::{CursorAction, PersistenceClient};
use geo_sink_postgres::{
    db::{PostgresPersistence, PostgresStorage, PgPool},
    decoder::ValueType,
    storage::{
        BlockRow, EditChange, EditRow, EditWrite, MembershipRow, RelationRow, SpaceRole,
        SpaceRow, Storage, TripleRow,
    },
};
use testcontainers::clients;

mod common;
use crate::common::*;

fn block(number: u64) -> BlockRow {
    BlockRow {
        number,
        hash: format!("0x{number:064x}"),
        timestamp: Some(1_700_000_000 + number),
    }
}

fn member(account: &str) -> MembershipRow {
    MembershipRow {
        space_id: DAO_CHECKSUM.to_string(),
        account_id: account.to_string(),
    }
}

fn set_name(entity: &str, name: &str) -> EditChange {
    EditChange::SetTriple(TripleRow {
        space_id: DAO_CHECKSUM.to_string(),
        entity_id: entity.to_string(),
        attribute_id: "name".to_string(),
        value_type: ValueType::Text,
        value: name.to_string(),
    })
}

fn friend(id: &str, from: &str, to: &str) -> EditChange {
    EditChange::SetRelation(RelationRow {
        id: id.to_string(),
        space_id: DAO_CHECKSUM.to_string(),
        type_id: "friend".to_string(),
        from_entity_id: from.to_string(),
        to_entity_id: to.to_string(),
        entity_id: String::new(),
        index: "a0".to_string(),
    })
}

fn edit_write(id: &str, changes: Vec<EditChange>) -> EditWrite {
    EditWrite {
        edit: EditRow {
            id: id.to_string(),
            space_id: DAO_CHECKSUM.to_string(),
            name: "People".to_string(),
            version: "1.0.0".to_string(),
            content_uri: format!("ipfs://{id}"),
            authors: vec![VOTING_PLUGIN.to_string()],
        },
        accounts: vec![VOTING_PLUGIN.to_string()],
        changes,
    }
}

async fn names(pool: &PgPool) -> Vec<(String, String)> {
    let conn = pool.get().await.unwrap();
    conn.query(
        "SELECT entity_id, value FROM triples WHERE attribute_id = 'name' ORDER BY entity_id",
        &[],
    )
    .await
    .unwrap()
    .iter()
    .map(|row| (row.get(0), row.get(1)))
    .collect()
}

async fn new_space(storage: &PostgresStorage) {
    storage.upsert_block(&block(1)).await.unwrap();
    let space = SpaceRow::new(DAO_CHECKSUM.to_string(), SPACE_PLUGIN.to_string(), 1);
    storage.insert_space(&space).await.unwrap();
    storage.finish_block(&block(1), 0).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_writes_are_idempotent() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    new_space(&storage).await;

    // inserting the space again leaves it alone.
    let other = SpaceRow::new(DAO_CHECKSUM.to_string(), VOTING_PLUGIN.to_string(), 2);
    storage.insert_space(&other).await.unwrap();
    let space = storage.space_by_id(DAO_CHECKSUM).await.unwrap().unwrap();
    assert_eq!(space.space_plugin_address.as_deref(), Some(SPACE_PLUGIN));

    let alice = member(VOTING_PLUGIN);
    storage.add_member(&alice, 2).await.unwrap();
    storage.add_member(&alice, 2).await.unwrap();
    assert_eq!(count(&pool, "SELECT count(*) FROM space_members").await, 1);

    storage.remove_member(&alice, 3).await.unwrap();
    storage.remove_member(&alice, 3).await.unwrap();
    assert_eq!(count(&pool, "SELECT count(*) FROM space_members").await, 0);

    for _ in 0..2 {
        storage
            .add_role(DAO_CHECKSUM, SpaceRole::Admin, VOTING_PLUGIN, 3)
            .await
            .unwrap();
    }
    let space = storage.space_by_id(DAO_CHECKSUM).await.unwrap().unwrap();
    assert_eq!(space.admins, vec![VOTING_PLUGIN.to_string()]);
}

#[tokio::test]
#[ignore]
async fn test_undo_restores_state() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    new_space(&storage).await;

    storage.upsert_block(&block(2)).await.unwrap();
    storage
        .set_governance_plugins(DAO_CHECKSUM, VOTING_PLUGIN, MEMBER_ACCESS_PLUGIN, 2)
        .await
        .unwrap();
    storage.add_member(&member(VOTING_PLUGIN), 2).await.unwrap();
    storage.finish_block(&block(2), 0).await.unwrap();

    storage.upsert_block(&block(3)).await.unwrap();
    storage.remove_member(&member(VOTING_PLUGIN), 3).await.unwrap();
    storage
        .add_member(&member(MEMBER_ACCESS_PLUGIN), 3)
        .await
        .unwrap();
    storage
        .add_role(DAO_CHECKSUM, SpaceRole::Editor, MEMBER_ACCESS_PLUGIN, 3)
        .await
        .unwrap();
    storage.finish_block(&block(3), 0).await.unwrap();

    let action = storage.undo_to(&new_cursor(2)).await.unwrap();
    assert_eq!(action, CursorAction::Skip);

    let conn = pool.get().await.unwrap();
    let members = conn
        .query("SELECT account_id FROM space_members", &[])
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<_, String>(0))
        .collect::<Vec<_>>();
    assert_eq!(members, vec![VOTING_PLUGIN.to_string()]);

    let space = storage.space_by_id(DAO_CHECKSUM).await.unwrap().unwrap();
    assert!(space.editors.is_empty());
    assert_eq!(
        space.main_voting_plugin_address.as_deref(),
        Some(VOTING_PLUGIN)
    );

    assert_eq!(count(&pool, "SELECT count(*) FROM blocks").await, 2);
    assert_eq!(
        count(&pool, "SELECT count(*) FROM row_snapshots WHERE block_number > 2").await,
        0
    );

    // undo again, past the governance plugins.
    storage.undo_to(&new_cursor(1)).await.unwrap();
    let space = storage.space_by_id(DAO_CHECKSUM).await.unwrap().unwrap();
    assert!(space.main_voting_plugin_address.is_none());
    assert_eq!(count(&pool, "SELECT count(*) FROM space_members").await, 0);
}

#[tokio::test]
#[ignore]
async fn test_cursor_follows_undo() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    let mut persistence = PostgresPersistence::new(pool.clone());

    persistence.lock().await.unwrap();
    assert!(persistence.get_cursor().await.unwrap().is_none());

    for number in 1..=5 {
        storage.upsert_block(&block(number)).await.unwrap();
        storage.finish_block(&block(number), 0).await.unwrap();
        persistence.put_cursor(new_cursor(number)).await.unwrap();
    }

    let cursor = persistence.get_cursor().await.unwrap().unwrap();
    assert_eq!(cursor.block_number, 5);
    assert_eq!(cursor.cursor, "cursor-5");

    // undo signals carry no timestamp, it's taken from the stored block.
    let mut target = new_cursor(3);
    target.block_timestamp = None;
    storage.undo_to(&target).await.unwrap();

    let cursor = persistence.get_cursor().await.unwrap().unwrap();
    assert_eq!(cursor.block_number, 3);
    assert_eq!(cursor.block_timestamp, Some(1_700_000_003));

    persistence.delete_cursor().await.unwrap();
    assert!(persistence.get_cursor().await.unwrap().is_none());
    persistence.unlock().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_failed_edit_writes_nothing() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    new_space(&storage).await;

    // text values can't contain NUL bytes.
    let edit = edit_write(
        "edit-1",
        vec![
            set_name("alice", "Alice"),
            set_name("bob", "B\0b"),
            set_name("carol", "Carol"),
        ],
    );
    storage.upsert_block(&block(2)).await.unwrap();
    assert!(storage.apply_edit(&edit, 2).await.is_err());

    assert_eq!(count(&pool, "SELECT count(*) FROM triples").await, 0);
    assert_eq!(count(&pool, "SELECT count(*) FROM entities").await, 0);
    assert_eq!(count(&pool, "SELECT count(*) FROM edits").await, 0);
    assert_eq!(count(&pool, "SELECT count(*) FROM accounts").await, 0);

    let edit = edit_write("edit-1", vec![set_name("alice", "Alice")]);
    storage.apply_edit(&edit, 2).await.unwrap();
    assert_eq!(
        names(&pool).await,
        vec![("alice".to_string(), "Alice".to_string())]
    );
}

#[tokio::test]
#[ignore]
async fn test_undo_restores_edits() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    new_space(&storage).await;

    storage.upsert_block(&block(2)).await.unwrap();
    let edit = edit_write(
        "edit-1",
        vec![set_name("alice", "Alice"), friend("rel-1", "alice", "bob")],
    );
    storage.apply_edit(&edit, 2).await.unwrap();
    storage.finish_block(&block(2), 0).await.unwrap();

    storage.upsert_block(&block(3)).await.unwrap();
    let edit = edit_write(
        "edit-2",
        vec![
            set_name("alice", "Alicia"),
            EditChange::DeleteRelation {
                relation_id: "rel-1".to_string(),
            },
            set_name("carol", "Carol"),
        ],
    );
    storage.apply_edit(&edit, 3).await.unwrap();
    storage.finish_block(&block(3), 0).await.unwrap();

    assert_eq!(
        names(&pool).await,
        vec![
            ("alice".to_string(), "Alicia".to_string()),
            ("carol".to_string(), "Carol".to_string()),
        ]
    );
    assert_eq!(count(&pool, "SELECT count(*) FROM relations").await, 0);

    storage.undo_to(&new_cursor(2)).await.unwrap();

    // the overwritten and the deleted rows come back as they were.
    assert_eq!(
        names(&pool).await,
        vec![("alice".to_string(), "Alice".to_string())]
    );
    let conn = pool.get().await.unwrap();
    let relation = conn
        .query_one(
            "SELECT from_entity_id, to_entity_id, type_id, \"index\", created_at_block FROM relations",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(relation.get::<_, String>(0), "alice");
    assert_eq!(relation.get::<_, String>(1), "bob");
    assert_eq!(relation.get::<_, String>(2), "friend");
    assert_eq!(relation.get::<_, String>(3), "a0");
    assert_eq!(relation.get::<_, i64>(4), 2);
    let value_type = conn
        .query_one(
            "SELECT value_type FROM triples WHERE entity_id = 'alice'",
            &[],
        )
        .await
        .unwrap()
        .get::<_, String>(0);
    assert_eq!(value_type, "TEXT");
    drop(conn);

    assert_eq!(
        count(&pool, "SELECT count(*) FROM entities WHERE id = 'carol'").await,
        0
    );
    assert_eq!(count(&pool, "SELECT count(*) FROM edits").await, 1);
}

#[tokio::test]
#[ignore]
async fn test_final_blocks_are_pruned() {
    let docker = clients::Cli::default();
    let postgres = docker.run(new_postgres_image());
    let port = postgres.get_host_port_ipv4(5432);

    let pool = new_pool(port).await;
    let storage = PostgresStorage::new(pool.clone());
    new_space(&storage).await;

    for (number, name) in [(2, "Alice"), (3, "Alicia"), (4, "Ali")] {
        storage.upsert_block(&block(number)).await.unwrap();
        let edit = edit_write(&format!("edit-{number}"), vec![set_name("alice", name)]);
        storage.apply_edit(&edit, number).await.unwrap();
        storage.finish_block(&block(number), 0).await.unwrap();
    }
    assert!(count(&pool, "SELECT count(*) FROM row_snapshots WHERE block_number = 3").await > 0);

    // block 3 is final: only the snapshots of block 4 can still be used.
    storage.upsert_block(&block(5)).await.unwrap();
    storage.finish_block(&block(5), 3).await.unwrap();
    assert_eq!(
        count(&pool, "SELECT count(*) FROM row_snapshots WHERE block_number <= 3").await,
        0
    );
    assert!(count(&pool, "SELECT count(*) FROM row_snapshots WHERE block_number = 4").await > 0);

    storage.undo_to(&new_cursor(3)).await.unwrap();
    assert_eq!(
        names(&pool).await,
        vec![("alice".to_string(), "Alicia".to_string())]
    );
}
