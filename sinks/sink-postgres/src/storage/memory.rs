use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use error_stack::{report, Result};
use geo_sink_common::{Cursor, CursorAction};

use super::{
    BlockRow, EditChange, EditRow, EditWrite, ExecutedProposalRow, MembershipRow, RelationRow,
    SpaceRole, SpaceRow, SpaceType, Storage, SubspaceRow, TripleRow, VoteRow, WriteError,
};

type TripleKey = (String, String, String);
type RelationKey = (String, String);
type VoteKey = (String, String, String, String);
type ProposalKey = (String, String, String);

#[derive(Debug, Clone, Default)]
struct State {
    blocks: BTreeMap<u64, BlockRow>,
    accounts: BTreeSet<String>,
    spaces: BTreeMap<String, SpaceRow>,
    members: BTreeSet<MembershipRow>,
    editors: BTreeSet<MembershipRow>,
    subspaces: BTreeSet<SubspaceRow>,
    edits: BTreeMap<String, EditRow>,
    entities: BTreeSet<String>,
    triples: BTreeMap<TripleKey, TripleRow>,
    relations: BTreeMap<RelationKey, RelationRow>,
    votes: BTreeMap<VoteKey, VoteRow>,
    executed_proposals: BTreeMap<ProposalKey, ExecutedProposalRow>,
}

/// Storage that keeps the knowledge graph in memory.
///
/// The state after each finished block is kept until the block becomes final, undo restores it.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
    history: Mutex<BTreeMap<u64, State>>,
}

impl InMemoryStorage {
    fn state(&self) -> Result<MutexGuard<'_, State>, WriteError> {
        self.state
            .lock()
            .map_err(|_| report!(WriteError).attach_printable("storage state lock poisoned"))
    }

    fn history(&self) -> Result<MutexGuard<'_, BTreeMap<u64, State>>, WriteError> {
        self.history
            .lock()
            .map_err(|_| report!(WriteError).attach_printable("storage history lock poisoned"))
    }

    fn with_space<F>(&self, space_id: &str, f: F) -> Result<(), WriteError>
    where
        F: FnOnce(&mut SpaceRow),
    {
        let mut state = self.state()?;
        let Some(space) = state.spaces.get_mut(space_id) else {
            return Err(report!(WriteError)
                .attach_printable(format!("space {space_id} does not exist")));
        };
        f(space);
        Ok(())
    }

    pub fn blocks(&self) -> Result<Vec<u64>, WriteError> {
        Ok(self.state()?.blocks.keys().copied().collect())
    }

    pub fn accounts(&self) -> Result<Vec<String>, WriteError> {
        Ok(self.state()?.accounts.iter().cloned().collect())
    }

    pub fn members(&self, space_id: &str) -> Result<Vec<String>, WriteError> {
        Ok(accounts_of(&self.state()?.members, space_id))
    }

    pub fn editors(&self, space_id: &str) -> Result<Vec<String>, WriteError> {
        Ok(accounts_of(&self.state()?.editors, space_id))
    }

    pub fn subspaces(&self, parent_space_id: &str) -> Result<Vec<String>, WriteError> {
        Ok(self
            .state()?
            .subspaces
            .iter()
            .filter(|row| row.parent_space_id == parent_space_id)
            .map(|row| row.subspace_id.clone())
            .collect())
    }

    pub fn edits(&self) -> Result<Vec<EditRow>, WriteError> {
        Ok(self.state()?.edits.values().cloned().collect())
    }

    pub fn triples(&self, space_id: &str) -> Result<Vec<TripleRow>, WriteError> {
        Ok(self
            .state()?
            .triples
            .values()
            .filter(|row| row.space_id == space_id)
            .cloned()
            .collect())
    }

    pub fn relations(&self, space_id: &str) -> Result<Vec<RelationRow>, WriteError> {
        Ok(self
            .state()?
            .relations
            .values()
            .filter(|row| row.space_id == space_id)
            .cloned()
            .collect())
    }

    pub fn votes(&self) -> Result<Vec<VoteRow>, WriteError> {
        Ok(self.state()?.votes.values().cloned().collect())
    }

    pub fn executed_proposals(&self) -> Result<Vec<ExecutedProposalRow>, WriteError> {
        Ok(self.state()?.executed_proposals.values().cloned().collect())
    }
}

impl State {
    fn apply_change(&mut self, space_id: &str, change: &EditChange) {
        match change {
            EditChange::SetTriple(triple) => {
                self.entities.insert(triple.entity_id.clone());
                self.triples.insert(
                    (
                        triple.space_id.clone(),
                        triple.entity_id.clone(),
                        triple.attribute_id.clone(),
                    ),
                    triple.clone(),
                );
            }
            EditChange::DeleteTriple {
                entity_id,
                attribute_id,
            } => {
                self.triples.remove(&(
                    space_id.to_string(),
                    entity_id.clone(),
                    attribute_id.clone(),
                ));
            }
            EditChange::DeleteEntity { entity_id } => {
                self.triples
                    .retain(|_, row| !(row.space_id == space_id && &row.entity_id == entity_id));
                self.relations.retain(|_, row| {
                    !(row.space_id == space_id
                        && (&row.from_entity_id == entity_id
                            || &row.to_entity_id == entity_id
                            || &row.entity_id == entity_id))
                });
            }
            EditChange::SetRelation(relation) => {
                self.entities.insert(relation.from_entity_id.clone());
                self.entities.insert(relation.to_entity_id.clone());
                if !relation.entity_id.is_empty() {
                    self.entities.insert(relation.entity_id.clone());
                }
                self.relations.insert(
                    (relation.space_id.clone(), relation.id.clone()),
                    relation.clone(),
                );
            }
            EditChange::DeleteRelation { relation_id } => {
                self.relations
                    .remove(&(space_id.to_string(), relation_id.clone()));
            }
        }
    }
}

fn accounts_of(rows: &BTreeSet<MembershipRow>, space_id: &str) -> Vec<String> {
    rows.iter()
        .filter(|row| row.space_id == space_id)
        .map(|row| row.account_id.clone())
        .collect()
}

fn role_members_mut(space: &mut SpaceRow, role: SpaceRole) -> &mut Vec<String> {
    match role {
        SpaceRole::Admin => &mut space.admins,
        SpaceRole::Editor => &mut space.editors,
        SpaceRole::EditorController => &mut space.editor_controllers,
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn space_by_id(&self, id: &str) -> Result<Option<SpaceRow>, WriteError> {
        Ok(self.state()?.spaces.get(id).cloned())
    }

    async fn space_by_dao(&self, dao_address: &str) -> Result<Option<SpaceRow>, WriteError> {
        Ok(self
            .state()?
            .spaces
            .values()
            .find(|space| space.dao_address == dao_address)
            .cloned())
    }

    async fn space_by_plugin(&self, plugin_address: &str) -> Result<Option<SpaceRow>, WriteError> {
        Ok(self
            .state()?
            .spaces
            .values()
            .find(|space| space.has_plugin(plugin_address))
            .cloned())
    }

    async fn upsert_block(&self, block: &BlockRow) -> Result<(), WriteError> {
        self.state()?.blocks.insert(block.number, block.clone());
        Ok(())
    }

    async fn upsert_accounts(&self, accounts: &[String], _block: u64) -> Result<(), WriteError> {
        self.state()?.accounts.extend(accounts.iter().cloned());
        Ok(())
    }

    async fn insert_space(&self, space: &SpaceRow) -> Result<(), WriteError> {
        self.state()?
            .spaces
            .entry(space.id.clone())
            .or_insert_with(|| space.clone());
        Ok(())
    }

    async fn set_governance_plugins(
        &self,
        space_id: &str,
        main_voting_plugin_address: &str,
        member_access_plugin_address: &str,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.with_space(space_id, |space| {
            space.main_voting_plugin_address = Some(main_voting_plugin_address.to_string());
            space.member_access_plugin_address = Some(member_access_plugin_address.to_string());
        })
    }

    async fn set_personal_plugin(
        &self,
        space_id: &str,
        personal_space_admin_plugin_address: &str,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.with_space(space_id, |space| {
            space.space_type = SpaceType::Personal;
            space.personal_space_admin_plugin_address =
                Some(personal_space_admin_plugin_address.to_string());
        })
    }

    async fn add_member(&self, member: &MembershipRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.members.insert(member.clone());
        Ok(())
    }

    async fn remove_member(&self, member: &MembershipRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.members.remove(member);
        Ok(())
    }

    async fn add_editor(&self, editor: &MembershipRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.editors.insert(editor.clone());
        Ok(())
    }

    async fn remove_editor(&self, editor: &MembershipRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.editors.remove(editor);
        Ok(())
    }

    async fn add_subspace(&self, subspace: &SubspaceRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.subspaces.insert(subspace.clone());
        Ok(())
    }

    async fn remove_subspace(
        &self,
        subspace: &SubspaceRow,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.state()?.subspaces.remove(subspace);
        Ok(())
    }

    async fn add_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.with_space(space_id, |space| {
            let members = role_members_mut(space, role);
            if !members.iter().any(|member| member == account_id) {
                members.push(account_id.to_string());
            }
        })
    }

    async fn remove_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.with_space(space_id, |space| {
            role_members_mut(space, role).retain(|member| member != account_id);
        })
    }

    async fn apply_edit(&self, write: &EditWrite, _block: u64) -> Result<(), WriteError> {
        let mut state = self.state()?;
        state.accounts.extend(write.accounts.iter().cloned());
        state
            .edits
            .insert(write.edit.id.clone(), write.edit.clone());

        let space_id = write.edit.space_id.as_str();
        for change in &write.changes {
            state.apply_change(space_id, change);
        }
        Ok(())
    }

    async fn upsert_vote(&self, vote: &VoteRow, _block: u64) -> Result<(), WriteError> {
        self.state()?.votes.insert(
            (
                vote.space_id.clone(),
                vote.plugin_address.clone(),
                vote.onchain_proposal_id.clone(),
                vote.account_id.clone(),
            ),
            vote.clone(),
        );
        Ok(())
    }

    async fn upsert_executed_proposal(
        &self,
        proposal: &ExecutedProposalRow,
        _block: u64,
    ) -> Result<(), WriteError> {
        self.state()?.executed_proposals.insert(
            (
                proposal.space_id.clone(),
                proposal.plugin_address.clone(),
                proposal.onchain_proposal_id.clone(),
            ),
            proposal.clone(),
        );
        Ok(())
    }

    async fn finish_block(
        &self,
        block: &BlockRow,
        final_block_height: u64,
    ) -> Result<(), WriteError> {
        let state = self.state()?.clone();
        let mut history = self.history()?;
        history.insert(block.number, state);

        // Keep the newest final state, undo never goes below it.
        if let Some(oldest) = history.range(..=final_block_height).next_back().map(|(n, _)| *n) {
            history.retain(|number, _| *number >= oldest);
        }

        Ok(())
    }

    async fn undo_to(&self, cursor: &Cursor) -> Result<CursorAction, WriteError> {
        let mut history = self.history()?;
        history.retain(|number, _| *number <= cursor.block_number);
        let restored = history
            .values()
            .next_back()
            .cloned()
            .unwrap_or_default();
        *self.state()? = restored;
        Ok(CursorAction::Persist)
    }
}

#[cfg(test)]
mod tests {
    use geo_sink_common::{Cursor, CursorAction};

    use super::InMemoryStorage;
    use crate::storage::{BlockRow, MembershipRow, SpaceRow, Storage};

    fn block(number: u64) -> BlockRow {
        BlockRow {
            number,
            hash: format!("0x{number}"),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_undo_restores_finished_block() {
        let storage = InMemoryStorage::default();
        let member = MembershipRow {
            space_id: "space".to_string(),
            account_id: "alice".to_string(),
        };

        storage
            .insert_space(&SpaceRow::new("space".to_string(), "plugin".to_string(), 1))
            .await
            .unwrap();
        storage.add_member(&member, 1).await.unwrap();
        storage.finish_block(&block(1), 0).await.unwrap();

        storage.remove_member(&member, 2).await.unwrap();
        storage.finish_block(&block(2), 0).await.unwrap();
        assert!(storage.members("space").unwrap().is_empty());

        let action = storage
            .undo_to(&Cursor::genesis(1, "0x1"))
            .await
            .unwrap();
        assert_eq!(action, CursorAction::Persist);
        assert_eq!(storage.members("space").unwrap(), vec!["alice".to_string()]);

        storage.undo_to(&Cursor::genesis(0, "")).await.unwrap();
        assert!(storage.members("space").unwrap().is_empty());
        assert!(storage.space_by_id("space").await.unwrap().is_none());
    }
}
