//! Rows of the knowledge graph and the storage they are written to.
#[cfg(test)]
mod memory;

use std::fmt;

use async_trait::async_trait;
use error_stack::Result;
use geo_sink_common::{Cursor, CursorAction};

use crate::decoder::ValueType;

#[cfg(test)]
pub use self::memory::InMemoryStorage;

#[derive(Debug)]
pub struct WriteError;
impl error_stack::Context for WriteError {}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("storage operation failed")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    Public,
    Personal,
}

impl SpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceType::Public => "PUBLIC",
            SpaceType::Personal => "PERSONAL",
        }
    }

    pub fn from_str_name(value: &str) -> Option<SpaceType> {
        match value {
            "PUBLIC" => Some(SpaceType::Public),
            "PERSONAL" => Some(SpaceType::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceRow {
    /// Checksummed address of the space's DAO.
    pub id: String,
    pub dao_address: String,
    pub space_type: SpaceType,
    pub space_plugin_address: Option<String>,
    pub main_voting_plugin_address: Option<String>,
    pub member_access_plugin_address: Option<String>,
    pub personal_space_admin_plugin_address: Option<String>,
    pub admins: Vec<String>,
    pub editors: Vec<String>,
    pub editor_controllers: Vec<String>,
    pub created_at_block: u64,
}

impl SpaceRow {
    pub fn new(dao_address: String, space_plugin_address: String, created_at_block: u64) -> Self {
        SpaceRow {
            id: dao_address.clone(),
            dao_address,
            space_type: SpaceType::Public,
            space_plugin_address: Some(space_plugin_address),
            main_voting_plugin_address: None,
            member_access_plugin_address: None,
            personal_space_admin_plugin_address: None,
            admins: Vec::new(),
            editors: Vec::new(),
            editor_controllers: Vec::new(),
            created_at_block,
        }
    }

    /// True if `plugin` governs membership of the space.
    pub fn is_governance_plugin(&self, plugin: &str) -> bool {
        self.main_voting_plugin_address.as_deref() == Some(plugin)
            || self.personal_space_admin_plugin_address.as_deref() == Some(plugin)
    }

    pub fn is_space_plugin(&self, plugin: &str) -> bool {
        self.space_plugin_address.as_deref() == Some(plugin)
    }

    pub fn has_plugin(&self, plugin: &str) -> bool {
        self.is_space_plugin(plugin)
            || self.is_governance_plugin(plugin)
            || self.member_access_plugin_address.as_deref() == Some(plugin)
    }
}

/// Role sets stored on the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceRole {
    Admin,
    Editor,
    EditorController,
}

impl SpaceRole {
    pub fn column(&self) -> &'static str {
        match self {
            SpaceRole::Admin => "admins",
            SpaceRole::Editor => "editors",
            SpaceRole::EditorController => "editor_controllers",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub number: u64,
    pub hash: String,
    pub timestamp: Option<u64>,
}

/// A member or editor of a space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MembershipRow {
    pub space_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubspaceRow {
    pub parent_space_id: String,
    pub subspace_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditRow {
    pub id: String,
    pub space_id: String,
    pub name: String,
    pub version: String,
    pub content_uri: String,
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripleRow {
    pub space_id: String,
    pub entity_id: String,
    pub attribute_id: String,
    pub value_type: ValueType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
    pub id: String,
    pub space_id: String,
    pub type_id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub entity_id: String,
    pub index: String,
}

/// Row change made by one op of an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditChange {
    /// Also creates the triple's entity if missing.
    SetTriple(TripleRow),
    DeleteTriple {
        entity_id: String,
        attribute_id: String,
    },
    /// Deletes the triples of the entity and the relations it takes part in, within the space.
    DeleteEntity { entity_id: String },
    /// Also creates the entities the relation references if missing.
    SetRelation(RelationRow),
    DeleteRelation { relation_id: String },
}

/// An edit with the changes of its ops, in op order.
#[derive(Debug, Clone, PartialEq)]
pub struct EditWrite {
    pub edit: EditRow,
    /// Authors of the edit that are valid addresses.
    pub accounts: Vec<String>,
    pub changes: Vec<EditChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteType {
    Accept,
    Reject,
    Abstain,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Accept => "ACCEPT",
            VoteType::Reject => "REJECT",
            VoteType::Abstain => "ABSTAIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteRow {
    pub space_id: String,
    pub plugin_address: String,
    pub onchain_proposal_id: String,
    pub account_id: String,
    pub vote: VoteType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedProposalRow {
    pub space_id: String,
    pub plugin_address: String,
    pub onchain_proposal_id: String,
}

/// Read and write access to the knowledge graph.
///
/// Writes are idempotent: upserting the same row twice or removing a missing row succeeds.
/// Every write is tagged with the block that caused it so that it can be undone.
#[async_trait]
pub trait Storage {
    async fn space_by_id(&self, id: &str) -> Result<Option<SpaceRow>, WriteError>;

    async fn space_by_dao(&self, dao_address: &str) -> Result<Option<SpaceRow>, WriteError>;

    /// Space with any of its plugins at `plugin_address`.
    async fn space_by_plugin(&self, plugin_address: &str) -> Result<Option<SpaceRow>, WriteError>;

    async fn upsert_block(&self, block: &BlockRow) -> Result<(), WriteError>;

    async fn upsert_accounts(&self, accounts: &[String], block: u64) -> Result<(), WriteError>;

    /// Insert the space if missing. Existing spaces are left untouched.
    async fn insert_space(&self, space: &SpaceRow) -> Result<(), WriteError>;

    async fn set_governance_plugins(
        &self,
        space_id: &str,
        main_voting_plugin_address: &str,
        member_access_plugin_address: &str,
        block: u64,
    ) -> Result<(), WriteError>;

    /// Also turns the space into a personal space.
    async fn set_personal_plugin(
        &self,
        space_id: &str,
        personal_space_admin_plugin_address: &str,
        block: u64,
    ) -> Result<(), WriteError>;

    async fn add_member(&self, member: &MembershipRow, block: u64) -> Result<(), WriteError>;

    async fn remove_member(&self, member: &MembershipRow, block: u64) -> Result<(), WriteError>;

    async fn add_editor(&self, editor: &MembershipRow, block: u64) -> Result<(), WriteError>;

    async fn remove_editor(&self, editor: &MembershipRow, block: u64) -> Result<(), WriteError>;

    async fn add_subspace(&self, subspace: &SubspaceRow, block: u64) -> Result<(), WriteError>;

    async fn remove_subspace(&self, subspace: &SubspaceRow, block: u64)
        -> Result<(), WriteError>;

    async fn add_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        block: u64,
    ) -> Result<(), WriteError>;

    async fn remove_role(
        &self,
        space_id: &str,
        role: SpaceRole,
        account_id: &str,
        block: u64,
    ) -> Result<(), WriteError>;

    /// Write the edit and its changes in order. Nothing is written if any change fails.
    async fn apply_edit(&self, edit: &EditWrite, block: u64) -> Result<(), WriteError>;

    async fn upsert_vote(&self, vote: &VoteRow, block: u64) -> Result<(), WriteError>;

    async fn upsert_executed_proposal(
        &self,
        proposal: &ExecutedProposalRow,
        block: u64,
    ) -> Result<(), WriteError>;

    /// Called once all writes of `block` completed.
    ///
    /// Data needed to undo blocks up to `final_block_height` can be dropped.
    async fn finish_block(&self, block: &BlockRow, final_block_height: u64)
        -> Result<(), WriteError>;

    /// Revert every write made after the cursor's block.
    ///
    /// Storages that persist the cursor together with the revert return [CursorAction::Skip].
    async fn undo_to(&self, cursor: &Cursor) -> Result<CursorAction, WriteError>;
}
