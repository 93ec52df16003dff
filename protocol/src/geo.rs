//! Events emitted by the geo substreams module (`geo_out`).
//!
//! Addresses are hex strings as formatted by the module. They are not checksummed and must be
//! validated before use.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeoSpaceCreated {
    #[prost(string, tag = "1")]
    pub dao_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub space_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeoGovernancePluginCreated {
    #[prost(string, tag = "1")]
    pub dao_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub main_voting_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub member_access_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeoPersonalSpaceAdminPluginCreated {
    #[prost(string, tag = "1")]
    pub dao_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub personal_admin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub initial_editor: ::prost::alloc::string::String,
}

/// Editors added when a governance space is created.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitialEditorAdded {
    #[prost(string, repeated, tag = "1")]
    pub addresses: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MemberAdded {
    #[prost(string, tag = "1")]
    pub member_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub main_voting_plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MemberRemoved {
    #[prost(string, tag = "1")]
    pub member_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EditorAdded {
    #[prost(string, tag = "1")]
    pub editor_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub main_voting_plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EditorRemoved {
    #[prost(string, tag = "1")]
    pub editor_address: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubspaceAdded {
    #[prost(string, tag = "1")]
    pub subspace: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubspaceRemoved {
    #[prost(string, tag = "1")]
    pub subspace: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub change_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dao_address: ::prost::alloc::string::String,
}

/// Content approved by a space and executed onchain.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EditPublished {
    #[prost(string, tag = "1")]
    pub content_uri: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub dao_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VoteCast {
    /// The onchain proposal id is an incrementing integer, unique per plugin.
    #[prost(string, tag = "1")]
    pub onchain_proposal_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub voter: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub vote_option: u64,
    #[prost(string, tag = "4")]
    pub plugin_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProposalExecuted {
    #[prost(string, tag = "1")]
    pub proposal_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub plugin_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoleGranted {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    #[prost(string, tag = "3")]
    pub account: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub sender: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub space: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoleRevoked {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    #[prost(string, tag = "3")]
    pub account: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub sender: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub space: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoleChange {
    #[prost(oneof = "role_change::Change", tags = "1, 2")]
    pub change: ::core::option::Option<role_change::Change>,
}

pub mod role_change {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Change {
        #[prost(message, tag = "1")]
        Granted(super::RoleGranted),
        #[prost(message, tag = "2")]
        Revoked(super::RoleRevoked),
    }
}

/// All events in one block.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeoOutput {
    #[prost(message, repeated, tag = "1")]
    pub spaces_created: ::prost::alloc::vec::Vec<GeoSpaceCreated>,
    #[prost(message, repeated, tag = "2")]
    pub governance_plugins_created: ::prost::alloc::vec::Vec<GeoGovernancePluginCreated>,
    #[prost(message, repeated, tag = "3")]
    pub initial_editors_added: ::prost::alloc::vec::Vec<InitialEditorAdded>,
    #[prost(message, repeated, tag = "4")]
    pub votes_cast: ::prost::alloc::vec::Vec<VoteCast>,
    #[prost(message, repeated, tag = "5")]
    pub edits_published: ::prost::alloc::vec::Vec<EditPublished>,
    #[prost(message, repeated, tag = "7")]
    pub subspaces_added: ::prost::alloc::vec::Vec<SubspaceAdded>,
    #[prost(message, repeated, tag = "8")]
    pub subspaces_removed: ::prost::alloc::vec::Vec<SubspaceRemoved>,
    #[prost(message, repeated, tag = "9")]
    pub executed_proposals: ::prost::alloc::vec::Vec<ProposalExecuted>,
    #[prost(message, repeated, tag = "10")]
    pub members_added: ::prost::alloc::vec::Vec<MemberAdded>,
    #[prost(message, repeated, tag = "11")]
    pub editors_added: ::prost::alloc::vec::Vec<EditorAdded>,
    #[prost(message, repeated, tag = "12")]
    pub personal_plugins_created: ::prost::alloc::vec::Vec<GeoPersonalSpaceAdminPluginCreated>,
    #[prost(message, repeated, tag = "13")]
    pub members_removed: ::prost::alloc::vec::Vec<MemberRemoved>,
    #[prost(message, repeated, tag = "14")]
    pub editors_removed: ::prost::alloc::vec::Vec<EditorRemoved>,
    #[prost(message, repeated, tag = "16")]
    pub role_changes: ::prost::alloc::vec::Vec<RoleChange>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Role {
    NullRole = 0,
    Moderator = 1,
    Member = 2,
    Admin = 3,
}

impl Role {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Role::NullRole => "NULL_ROLE",
            Role::Moderator => "MODERATOR",
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }
}

impl ::prost::Name for GeoOutput {
    const NAME: &'static str = "GeoOutput";
    const PACKAGE: &'static str = "schema";

    fn full_name() -> ::prost::alloc::string::String {
        "schema.GeoOutput".into()
    }

    fn type_url() -> ::prost::alloc::string::String {
        "type.googleapis.com/schema.GeoOutput".into()
    }
}

impl GeoOutput {
    /// Returns true if the block contains no events.
    pub fn is_empty(&self) -> bool {
        self.spaces_created.is_empty()
            && self.governance_plugins_created.is_empty()
            && self.initial_editors_added.is_empty()
            && self.votes_cast.is_empty()
            && self.edits_published.is_empty()
            && self.subspaces_added.is_empty()
            && self.subspaces_removed.is_empty()
            && self.executed_proposals.is_empty()
            && self.members_added.is_empty()
            && self.editors_added.is_empty()
            && self.personal_plugins_created.is_empty()
            && self.members_removed.is_empty()
            && self.editors_removed.is_empty()
            && self.role_changes.is_empty()
    }
}
