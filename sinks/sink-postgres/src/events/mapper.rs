//! Map validated events to rows, given the spaces they reference.
use std::fmt;

use error_stack::{Result, ResultExt};

use crate::storage::{
    ExecutedProposalRow, MembershipRow, SpaceRole, SpaceRow, SubspaceRow, VoteRow, VoteType,
};

use super::edits::ImportedSpace;
use super::parser::{
    EditPublished, GovernancePluginCreated, InitialEditorsAdded, MembershipChanged,
    PersonalPluginCreated, ProposalExecuted, Role, RoleChange, RoleChanged, SpaceCreated,
    SubspaceChanged, VoteCast, VoteOption,
};

/// The event comes from a plugin that doesn't belong to the DAO's space, or the DAO has no space.
#[derive(Debug)]
pub struct InvalidPluginAddressForDaoError;
impl error_stack::Context for InvalidPluginAddressForDaoError {}

impl fmt::Display for InvalidPluginAddressForDaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid plugin address for dao")
    }
}

#[derive(Debug)]
pub struct SpaceNotFoundError;
impl error_stack::Context for SpaceNotFoundError {}

impl fmt::Display for SpaceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("space not found")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GovernancePlugins {
    pub space_id: String,
    pub main_voting_plugin_address: String,
    pub member_access_plugin_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalPlugin {
    pub space_id: String,
    pub personal_space_admin_plugin_address: String,
    pub initial_editor: MembershipRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleUpdate {
    pub space_id: String,
    pub role: SpaceRole,
    pub account_id: String,
    pub granted: bool,
}

/// A space created with an import as its first content keeps the id it had before the import.
pub fn map_space_created(
    event: &SpaceCreated,
    imported: Option<&ImportedSpace>,
    block: u64,
) -> SpaceRow {
    let mut space = SpaceRow::new(
        event.dao_address.to_string(),
        event.space_plugin_address.to_string(),
        block,
    );
    if let Some(imported) = imported {
        space.id = imported.space_id();
    }
    space
}

pub fn map_governance_plugin_created(
    event: &GovernancePluginCreated,
    space: Option<SpaceRow>,
) -> Result<GovernancePlugins, InvalidPluginAddressForDaoError> {
    let space = dao_space(space, event.dao_address.as_str())?;
    Ok(GovernancePlugins {
        space_id: space.id,
        main_voting_plugin_address: event.main_voting_plugin_address.to_string(),
        member_access_plugin_address: event.member_access_plugin_address.to_string(),
    })
}

pub fn map_personal_plugin_created(
    event: &PersonalPluginCreated,
    space: Option<SpaceRow>,
) -> Result<PersonalPlugin, InvalidPluginAddressForDaoError> {
    let space = dao_space(space, event.dao_address.as_str())?;
    Ok(PersonalPlugin {
        initial_editor: MembershipRow {
            space_id: space.id.clone(),
            account_id: event.initial_editor.to_string(),
        },
        space_id: space.id,
        personal_space_admin_plugin_address: event.personal_admin_plugin_address.to_string(),
    })
}

pub fn map_initial_editors_added(
    event: &InitialEditorsAdded,
    space: Option<SpaceRow>,
) -> Result<Vec<MembershipRow>, InvalidPluginAddressForDaoError> {
    let space = governance_space(
        space,
        event.dao_address.as_str(),
        event.plugin_address.as_str(),
    )?;
    Ok(event
        .editors
        .iter()
        .map(|editor| MembershipRow {
            space_id: space.id.clone(),
            account_id: editor.to_string(),
        })
        .collect())
}

/// Member and editor changes are authorized by the governance plugin of the space.
pub fn map_membership_changed(
    event: &MembershipChanged,
    space: Option<SpaceRow>,
) -> Result<MembershipRow, InvalidPluginAddressForDaoError> {
    let space = governance_space(
        space,
        event.dao_address.as_str(),
        event.plugin_address.as_str(),
    )?;
    Ok(MembershipRow {
        space_id: space.id,
        account_id: event.account.to_string(),
    })
}

pub fn map_subspace_changed(
    event: &SubspaceChanged,
    space: Option<SpaceRow>,
) -> Result<SubspaceRow, InvalidPluginAddressForDaoError> {
    let space = plugin_space(space, event.dao_address.as_str(), event.plugin_address.as_str())?;
    Ok(SubspaceRow {
        parent_space_id: space.id,
        subspace_id: event.subspace.to_string(),
    })
}

/// Returns the space the edit is published to.
pub fn map_edit_published(
    event: &EditPublished,
    space: Option<SpaceRow>,
) -> Result<SpaceRow, InvalidPluginAddressForDaoError> {
    plugin_space(space, event.dao_address.as_str(), event.plugin_address.as_str())
}

/// `space` is the space with a plugin at the event's plugin address.
pub fn map_vote_cast(
    event: &VoteCast,
    space: Option<SpaceRow>,
) -> Result<VoteRow, SpaceNotFoundError> {
    let space = plugin_owner(space, event.plugin_address.as_str())?;
    let vote = match event.vote {
        VoteOption::Yes => VoteType::Accept,
        VoteOption::No => VoteType::Reject,
        VoteOption::Abstain => VoteType::Abstain,
    };

    Ok(VoteRow {
        space_id: space.id,
        plugin_address: event.plugin_address.to_string(),
        onchain_proposal_id: event.onchain_proposal_id.clone(),
        account_id: event.voter.to_string(),
        vote,
    })
}

pub fn map_proposal_executed(
    event: &ProposalExecuted,
    space: Option<SpaceRow>,
) -> Result<ExecutedProposalRow, SpaceNotFoundError> {
    let space = plugin_owner(space, event.plugin_address.as_str())?;
    Ok(ExecutedProposalRow {
        space_id: space.id,
        plugin_address: event.plugin_address.to_string(),
        onchain_proposal_id: event.onchain_proposal_id.clone(),
    })
}

/// `space` is the space with a plugin at the event's space address. Only its space plugin counts.
pub fn map_role_changed(
    event: &RoleChanged,
    space: Option<SpaceRow>,
) -> Result<RoleUpdate, SpaceNotFoundError> {
    let space = match space {
        Some(space) if space.is_space_plugin(event.space.as_str()) => space,
        _ => {
            return Err(SpaceNotFoundError)
                .attach_printable("no space with this space plugin")
                .attach_printable_lazy(|| format!("space plugin address: {}", event.space));
        }
    };

    let role = match event.role {
        Role::Admin => SpaceRole::Admin,
        Role::Member => SpaceRole::Editor,
        Role::Moderator => SpaceRole::EditorController,
    };

    Ok(RoleUpdate {
        space_id: space.id,
        role,
        account_id: event.account.to_string(),
        granted: event.change == RoleChange::Granted,
    })
}

fn dao_space(
    space: Option<SpaceRow>,
    dao_address: &str,
) -> Result<SpaceRow, InvalidPluginAddressForDaoError> {
    match space {
        Some(space) if space.dao_address == dao_address => Ok(space),
        _ => Err(InvalidPluginAddressForDaoError)
            .attach_printable("no space for dao")
            .attach_printable_lazy(|| format!("dao address: {dao_address}")),
    }
}

fn governance_space(
    space: Option<SpaceRow>,
    dao_address: &str,
    plugin_address: &str,
) -> Result<SpaceRow, InvalidPluginAddressForDaoError> {
    let space = dao_space(space, dao_address)?;
    if !space.is_governance_plugin(plugin_address) {
        return Err(InvalidPluginAddressForDaoError)
            .attach_printable("plugin is not the governance plugin of the space")
            .attach_printable_lazy(|| format!("dao address: {dao_address}"))
            .attach_printable_lazy(|| format!("plugin address: {plugin_address}"));
    }
    Ok(space)
}

fn plugin_space(
    space: Option<SpaceRow>,
    dao_address: &str,
    plugin_address: &str,
) -> Result<SpaceRow, InvalidPluginAddressForDaoError> {
    let space = dao_space(space, dao_address)?;
    if !space.is_space_plugin(plugin_address) {
        return Err(InvalidPluginAddressForDaoError)
            .attach_printable("plugin is not the space plugin of the space")
            .attach_printable_lazy(|| format!("dao address: {dao_address}"))
            .attach_printable_lazy(|| format!("plugin address: {plugin_address}"));
    }
    Ok(space)
}

fn plugin_owner(
    space: Option<SpaceRow>,
    plugin_address: &str,
) -> Result<SpaceRow, SpaceNotFoundError> {
    match space {
        Some(space) if space.has_plugin(plugin_address) => Ok(space),
        _ => Err(SpaceNotFoundError)
            .attach_printable("no space for plugin")
            .attach_printable_lazy(|| format!("plugin address: {plugin_address}")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::address::Address;

    fn address(value: &str) -> Address {
        Address::parse(value).unwrap()
    }

    fn dao() -> Address {
        address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")
    }

    fn space_plugin() -> Address {
        address("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359")
    }

    fn voting_plugin() -> Address {
        address("0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb")
    }

    fn account() -> Address {
        address("0xd1220a0cf47c7b9be7a2e6ba89f429762e7b9adb")
    }

    fn public_space() -> SpaceRow {
        let mut space = SpaceRow::new(dao().to_string(), space_plugin().to_string(), 1);
        space.main_voting_plugin_address = Some(voting_plugin().to_string());
        space
    }

    #[test]
    fn test_imported_space_keeps_previous_id() {
        let event = SpaceCreated {
            dao_address: dao(),
            space_plugin_address: space_plugin(),
        };
        let space = map_space_created(&event, None, 7);
        assert_eq!(space.id, dao().to_string());
        assert_eq!(space.created_at_block, 7);

        let imported = ImportedSpace {
            previous_network: "TESTNET".to_string(),
            previous_contract_address: "0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb".to_string(),
        };
        let space = map_space_created(&event, Some(&imported), 7);
        assert_eq!(space.id, voting_plugin().to_string());
        assert_eq!(space.dao_address, dao().to_string());
    }

    #[test]
    fn test_membership_requires_governance_plugin() {
        let event = MembershipChanged {
            account: account(),
            plugin_address: voting_plugin(),
            dao_address: dao(),
        };
        let row = map_membership_changed(&event, Some(public_space())).unwrap();
        assert_eq!(row.space_id, dao().to_string());
        assert_eq!(row.account_id, account().to_string());

        let event = MembershipChanged {
            plugin_address: space_plugin(),
            ..event
        };
        let err = map_membership_changed(&event, Some(public_space())).unwrap_err();
        assert_matches!(err.current_context(), InvalidPluginAddressForDaoError);

        let err = map_membership_changed(&event, None).unwrap_err();
        assert_matches!(err.current_context(), InvalidPluginAddressForDaoError);
    }

    #[test]
    fn test_subspace_requires_space_plugin() {
        let event = SubspaceChanged {
            subspace: account(),
            plugin_address: space_plugin(),
            dao_address: dao(),
        };
        let row = map_subspace_changed(&event, Some(public_space())).unwrap();
        assert_eq!(row.subspace_id, account().to_string());

        let event = SubspaceChanged {
            plugin_address: voting_plugin(),
            ..event
        };
        assert!(map_subspace_changed(&event, Some(public_space())).is_err());
    }

    #[test]
    fn test_vote_without_space() {
        let event = VoteCast {
            onchain_proposal_id: "1".to_string(),
            voter: account(),
            vote: VoteOption::No,
            plugin_address: voting_plugin(),
        };
        let row = map_vote_cast(&event, Some(public_space())).unwrap();
        assert_eq!(row.vote, VoteType::Reject);

        let err = map_vote_cast(&event, None).unwrap_err();
        assert_matches!(err.current_context(), SpaceNotFoundError);
    }

    #[test]
    fn test_role_maps_to_role_set() {
        let event = RoleChanged {
            change: RoleChange::Revoked,
            id: "role-1".to_string(),
            role: Role::Member,
            account: account(),
            sender: dao(),
            space: space_plugin(),
        };
        let update = map_role_changed(&event, Some(public_space())).unwrap();
        assert_eq!(update.role, SpaceRole::Editor);
        assert!(!update.granted);

        let event = RoleChanged {
            space: voting_plugin(),
            ..event
        };
        let err = map_role_changed(&event, Some(public_space())).unwrap_err();
        assert_matches!(err.current_context(), SpaceNotFoundError);
    }
}
