//! Validate raw module events.
//!
//! Addresses are normalized to their checksum form. Parsers don't look at storage, so a valid
//! event can still reference a space that doesn't exist.
use std::fmt;

use error_stack::{Result, ResultExt};
use geo_protocol::geo;

use crate::address::Address;

#[derive(Debug)]
pub struct ParseError;
impl error_stack::Context for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid event")
    }
}

const ADDED: &str = "added";
const REMOVED: &str = "removed";

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceCreated {
    pub dao_address: Address,
    pub space_plugin_address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GovernancePluginCreated {
    pub dao_address: Address,
    pub main_voting_plugin_address: Address,
    pub member_access_plugin_address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalPluginCreated {
    pub dao_address: Address,
    pub personal_admin_plugin_address: Address,
    pub initial_editor: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialEditorsAdded {
    pub dao_address: Address,
    pub plugin_address: Address,
    pub editors: Vec<Address>,
}

/// A member or editor added to, or removed from, a space.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipChanged {
    pub account: Address,
    pub plugin_address: Address,
    pub dao_address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubspaceChanged {
    pub subspace: Address,
    pub plugin_address: Address,
    pub dao_address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditPublished {
    pub content_uri: String,
    pub plugin_address: Address,
    pub dao_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOption {
    Abstain,
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteCast {
    pub onchain_proposal_id: String,
    pub voter: Address,
    pub vote: VoteOption,
    pub plugin_address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposalExecuted {
    pub onchain_proposal_id: String,
    pub plugin_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Granted,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
    Moderator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleChanged {
    pub change: RoleChange,
    pub id: String,
    pub role: Role,
    pub account: Address,
    pub sender: Address,
    /// Address of the space plugin whose role changed.
    pub space: Address,
}

pub fn parse_space_created(event: &geo::GeoSpaceCreated) -> Result<SpaceCreated, ParseError> {
    Ok(SpaceCreated {
        dao_address: address(&event.dao_address, "dao_address")?,
        space_plugin_address: address(&event.space_address, "space_address")?,
    })
}

pub fn parse_governance_plugin_created(
    event: &geo::GeoGovernancePluginCreated,
) -> Result<GovernancePluginCreated, ParseError> {
    Ok(GovernancePluginCreated {
        dao_address: address(&event.dao_address, "dao_address")?,
        main_voting_plugin_address: address(&event.main_voting_address, "main_voting_address")?,
        member_access_plugin_address: address(
            &event.member_access_address,
            "member_access_address",
        )?,
    })
}

pub fn parse_personal_plugin_created(
    event: &geo::GeoPersonalSpaceAdminPluginCreated,
) -> Result<PersonalPluginCreated, ParseError> {
    Ok(PersonalPluginCreated {
        dao_address: address(&event.dao_address, "dao_address")?,
        personal_admin_plugin_address: address(
            &event.personal_admin_address,
            "personal_admin_address",
        )?,
        initial_editor: address(&event.initial_editor, "initial_editor")?,
    })
}

pub fn parse_initial_editors_added(
    event: &geo::InitialEditorAdded,
) -> Result<InitialEditorsAdded, ParseError> {
    if event.addresses.is_empty() {
        return Err(ParseError).attach_printable("initial editors without addresses");
    }

    let editors = event
        .addresses
        .iter()
        .map(|editor| address(editor, "addresses"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InitialEditorsAdded {
        dao_address: address(&event.dao_address, "dao_address")?,
        plugin_address: address(&event.plugin_address, "plugin_address")?,
        editors,
    })
}

pub fn parse_member_added(event: &geo::MemberAdded) -> Result<MembershipChanged, ParseError> {
    change_type(&event.change_type, ADDED)?;
    membership(
        &event.member_address,
        &event.main_voting_plugin_address,
        &event.dao_address,
    )
}

pub fn parse_member_removed(event: &geo::MemberRemoved) -> Result<MembershipChanged, ParseError> {
    change_type(&event.change_type, REMOVED)?;
    membership(&event.member_address, &event.plugin_address, &event.dao_address)
}

pub fn parse_editor_added(event: &geo::EditorAdded) -> Result<MembershipChanged, ParseError> {
    change_type(&event.change_type, ADDED)?;
    membership(
        &event.editor_address,
        &event.main_voting_plugin_address,
        &event.dao_address,
    )
}

pub fn parse_editor_removed(event: &geo::EditorRemoved) -> Result<MembershipChanged, ParseError> {
    change_type(&event.change_type, REMOVED)?;
    membership(&event.editor_address, &event.plugin_address, &event.dao_address)
}

pub fn parse_subspace_added(event: &geo::SubspaceAdded) -> Result<SubspaceChanged, ParseError> {
    change_type(&event.change_type, ADDED)?;
    subspace(&event.subspace, &event.plugin_address, &event.dao_address)
}

pub fn parse_subspace_removed(
    event: &geo::SubspaceRemoved,
) -> Result<SubspaceChanged, ParseError> {
    change_type(&event.change_type, REMOVED)?;
    subspace(&event.subspace, &event.plugin_address, &event.dao_address)
}

pub fn parse_edit_published(event: &geo::EditPublished) -> Result<EditPublished, ParseError> {
    if event.content_uri.is_empty() {
        return Err(ParseError).attach_printable("edit without content uri");
    }

    Ok(EditPublished {
        content_uri: event.content_uri.clone(),
        plugin_address: address(&event.plugin_address, "plugin_address")?,
        dao_address: address(&event.dao_address, "dao_address")?,
    })
}

pub fn parse_vote_cast(event: &geo::VoteCast) -> Result<VoteCast, ParseError> {
    let vote = match event.vote_option {
        1 => VoteOption::Abstain,
        2 => VoteOption::Yes,
        3 => VoteOption::No,
        option => {
            return Err(ParseError)
                .attach_printable("invalid vote option")
                .attach_printable_lazy(|| format!("vote option: {option}"));
        }
    };

    Ok(VoteCast {
        onchain_proposal_id: proposal_id(&event.onchain_proposal_id)?,
        voter: address(&event.voter, "voter")?,
        vote,
        plugin_address: address(&event.plugin_address, "plugin_address")?,
    })
}

pub fn parse_proposal_executed(
    event: &geo::ProposalExecuted,
) -> Result<ProposalExecuted, ParseError> {
    Ok(ProposalExecuted {
        onchain_proposal_id: proposal_id(&event.proposal_id)?,
        plugin_address: address(&event.plugin_address, "plugin_address")?,
    })
}

pub fn parse_role_change(event: &geo::RoleChange) -> Result<RoleChanged, ParseError> {
    let Some(change) = &event.change else {
        return Err(ParseError).attach_printable("role change without change");
    };

    let (change, id, role, account, sender, space) = match change {
        geo::role_change::Change::Granted(granted) => (
            RoleChange::Granted,
            &granted.id,
            granted.role,
            &granted.account,
            &granted.sender,
            &granted.space,
        ),
        geo::role_change::Change::Revoked(revoked) => (
            RoleChange::Revoked,
            &revoked.id,
            revoked.role,
            &revoked.account,
            &revoked.sender,
            &revoked.space,
        ),
    };

    let role = match geo::Role::try_from(role) {
        Ok(geo::Role::Admin) => Role::Admin,
        Ok(geo::Role::Member) => Role::Member,
        Ok(geo::Role::Moderator) => Role::Moderator,
        _ => {
            return Err(ParseError)
                .attach_printable("invalid role")
                .attach_printable_lazy(|| format!("role: {role}"));
        }
    };

    Ok(RoleChanged {
        change,
        id: id.clone(),
        role,
        account: address(account, "account")?,
        sender: address(sender, "sender")?,
        space: address(space, "space")?,
    })
}

fn address(value: &str, field: &'static str) -> Result<Address, ParseError> {
    Address::parse(value)
        .change_context(ParseError)
        .attach_printable_lazy(|| format!("field: {field}"))
}

fn change_type(value: &str, expected: &'static str) -> Result<(), ParseError> {
    if value != expected {
        return Err(ParseError)
            .attach_printable(format!("expected change type {expected:?}"))
            .attach_printable_lazy(|| format!("change type: {value:?}"));
    }
    Ok(())
}

fn proposal_id(value: &str) -> Result<String, ParseError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError)
            .attach_printable("proposal id must be a non negative integer")
            .attach_printable_lazy(|| format!("proposal id: {value:?}"));
    }
    Ok(value.to_string())
}

fn membership(
    account: &str,
    plugin_address: &str,
    dao_address: &str,
) -> Result<MembershipChanged, ParseError> {
    Ok(MembershipChanged {
        account: address(account, "account")?,
        plugin_address: address(plugin_address, "plugin_address")?,
        dao_address: address(dao_address, "dao_address")?,
    })
}

fn subspace(
    subspace: &str,
    plugin_address: &str,
    dao_address: &str,
) -> Result<SubspaceChanged, ParseError> {
    Ok(SubspaceChanged {
        subspace: address(subspace, "subspace")?,
        plugin_address: address(plugin_address, "plugin_address")?,
        dao_address: address(dao_address, "dao_address")?,
    })
}
