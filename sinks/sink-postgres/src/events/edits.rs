//! Load published edits from IPFS and apply their ops.
use error_stack::{Result, ResultExt};
use futures::future::try_join_all;
use tracing::debug;

use crate::{
    address::Address,
    decoder::{self, ActionType, Edit, Op, Relation, Triple},
    ipfs::ContentFetcher,
    storage::{EditChange, EditRow, EditWrite, RelationRow, Storage, TripleRow, WriteError},
};

use super::EventError;

/// An edit, with the uri it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEdit {
    pub content_uri: String,
    pub edit: Edit,
}

/// The space an import was exported from.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSpace {
    pub previous_network: String,
    pub previous_contract_address: String,
}

impl ImportedSpace {
    /// Id the space had before it was imported.
    pub fn space_id(&self) -> String {
        match Address::parse(&self.previous_contract_address) {
            Ok(address) => address.into_string(),
            Err(_) => self.previous_contract_address.clone(),
        }
    }
}

/// Content published at an uri.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedContent {
    pub edits: Vec<PublishedEdit>,
    pub import: Option<ImportedSpace>,
}

/// Fetch the content at `uri`. Imports are expanded to the edits they list.
pub async fn load_edits<F>(fetcher: &F, uri: &str) -> Result<LoadedContent, EventError>
where
    F: ContentFetcher + Sync + ?Sized,
{
    let content = fetcher
        .fetch(uri)
        .await
        .change_context(EventError)
        .attach_printable("failed to fetch edit")?;

    let action = decoder::decode_action_type(&content)
        .change_context(EventError)
        .attach_printable_lazy(|| format!("uri: {uri}"))?;

    match action {
        ActionType::AddEdit => {
            let edit = decoder::decode_edit(&content)
                .change_context(EventError)
                .attach_printable_lazy(|| format!("uri: {uri}"))?;
            Ok(LoadedContent {
                edits: vec![PublishedEdit {
                    content_uri: uri.to_string(),
                    edit,
                }],
                import: None,
            })
        }
        ActionType::ImportSpace => {
            let import = decoder::decode_import(&content)
                .change_context(EventError)
                .attach_printable_lazy(|| format!("uri: {uri}"))?;
            debug!(
                uri,
                edits = import.edits.len(),
                previous_network = %import.previous_network,
                "loading space import"
            );
            let edits = try_join_all(
                import
                    .edits
                    .iter()
                    .map(|edit_uri| load_import_edit(fetcher, edit_uri)),
            )
            .await?;

            Ok(LoadedContent {
                edits,
                import: Some(ImportedSpace {
                    previous_network: import.previous_network,
                    previous_contract_address: import.previous_contract_address,
                }),
            })
        }
    }
}

async fn load_import_edit<F>(fetcher: &F, uri: &str) -> Result<PublishedEdit, EventError>
where
    F: ContentFetcher + Sync + ?Sized,
{
    let content = fetcher
        .fetch(uri)
        .await
        .change_context(EventError)
        .attach_printable("failed to fetch imported edit")?;

    let imported = decoder::decode_import_edit(&content)
        .change_context(EventError)
        .attach_printable_lazy(|| format!("uri: {uri}"))?;

    Ok(PublishedEdit {
        content_uri: uri.to_string(),
        edit: imported.edit,
    })
}

/// Write the edit and its ops to the space, as a single write.
pub async fn apply_edit<S>(
    storage: &S,
    space_id: &str,
    published: &PublishedEdit,
    block: u64,
) -> Result<(), WriteError>
where
    S: Storage + Sync + ?Sized,
{
    storage
        .apply_edit(&edit_write(space_id, published), block)
        .await
}

/// The rows written by the edit, with its ops in order.
pub fn edit_write(space_id: &str, published: &PublishedEdit) -> EditWrite {
    let edit = &published.edit;

    // Authors that aren't addresses are kept on the edit only.
    let accounts = edit
        .authors
        .iter()
        .filter_map(|author| Address::parse(author).ok())
        .map(Address::into_string)
        .collect::<Vec<_>>();

    let id = if edit.id.is_empty() {
        published.content_uri.clone()
    } else {
        edit.id.clone()
    };

    let mut changes = Vec::with_capacity(edit.ops.len());
    for op in &edit.ops {
        match op {
            Op::SetTriple(triple) => changes.push(EditChange::SetTriple(triple_row(space_id, triple))),
            Op::DeleteTriple { entity, attribute } => changes.push(EditChange::DeleteTriple {
                entity_id: entity.clone(),
                attribute_id: attribute.clone(),
            }),
            Op::SetTripleBatch(triples) => changes.extend(
                triples
                    .iter()
                    .map(|triple| EditChange::SetTriple(triple_row(space_id, triple))),
            ),
            Op::DeleteEntity { id } => changes.push(EditChange::DeleteEntity {
                entity_id: id.clone(),
            }),
            Op::CreateRelation(relation) => {
                changes.push(EditChange::SetRelation(relation_row(space_id, relation)))
            }
            Op::DeleteRelation { id } => changes.push(EditChange::DeleteRelation {
                relation_id: id.clone(),
            }),
            Op::ImportFile { url } => {
                debug!(url = %url, "file imports are not indexed");
            }
        }
    }

    EditWrite {
        edit: EditRow {
            id,
            space_id: space_id.to_string(),
            name: edit.name.clone(),
            version: edit.version.clone(),
            content_uri: published.content_uri.clone(),
            authors: edit.authors.clone(),
        },
        accounts,
        changes,
    }
}

fn triple_row(space_id: &str, triple: &Triple) -> TripleRow {
    TripleRow {
        space_id: space_id.to_string(),
        entity_id: triple.entity.clone(),
        attribute_id: triple.attribute.clone(),
        value_type: triple.value.value_type,
        value: triple.value.value.clone(),
    }
}

fn relation_row(space_id: &str, relation: &Relation) -> RelationRow {
    RelationRow {
        id: relation.id.clone(),
        space_id: space_id.to_string(),
        type_id: relation.type_id.clone(),
        from_entity_id: relation.from_entity.clone(),
        to_entity_id: relation.to_entity.clone(),
        entity_id: relation.entity.clone(),
        index: relation.index.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{edit_write, ImportedSpace, PublishedEdit};
    use crate::{
        decoder::{ActionType, Edit, Op, Triple, Value, ValueType},
        storage::EditChange,
    };

    fn triple(entity: &str, value: &str) -> Triple {
        Triple {
            entity: entity.to_string(),
            attribute: "name".to_string(),
            value: Value {
                value_type: ValueType::Text,
                value: value.to_string(),
            },
        }
    }

    #[test]
    fn test_edit_write_keeps_op_order() {
        let published = PublishedEdit {
            content_uri: "ipfs://bafkedit".to_string(),
            edit: Edit {
                id: String::new(),
                name: "People".to_string(),
                version: "1.0.0".to_string(),
                action: ActionType::AddEdit,
                ops: vec![
                    Op::SetTriple(triple("alice", "Alice")),
                    Op::ImportFile {
                        url: "ipfs://bafkfile".to_string(),
                    },
                    Op::SetTripleBatch(vec![triple("bob", "Bob"), triple("carol", "Carol")]),
                    Op::DeleteEntity {
                        id: "alice".to_string(),
                    },
                ],
                authors: vec![
                    "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
                    "not-an-address".to_string(),
                ],
            },
        };

        let write = edit_write("space", &published);
        assert_eq!(write.edit.id, "ipfs://bafkedit");
        assert_eq!(write.edit.authors.len(), 2);
        assert_eq!(
            write.accounts,
            vec!["0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string()]
        );

        let entities = write
            .changes
            .iter()
            .map(|change| match change {
                EditChange::SetTriple(row) => format!("set {}", row.entity_id),
                EditChange::DeleteEntity { entity_id } => format!("delete {entity_id}"),
                other => panic!("unexpected change {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            entities,
            vec!["set alice", "set bob", "set carol", "delete alice"]
        );
    }

    #[test]
    fn test_imported_space_id() {
        let imported = ImportedSpace {
            previous_network: "TESTNET".to_string(),
            previous_contract_address: "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
        };
        assert_eq!(
            imported.space_id(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );

        let imported = ImportedSpace {
            previous_contract_address: "space-1".to_string(),
            ..imported
        };
        assert_eq!(imported.space_id(), "space-1");
    }
}
