use std::{collections::HashMap, future::Future};

use error_stack::{Report, Result, ResultExt};
use futures::future::join_all;
use geo_observability::{Counter, KeyValue};
use geo_protocol::geo::{self, GeoOutput};
use geo_sink_common::{Cursor, CursorAction};
use tracing::{debug, info, warn};

use crate::{
    ipfs::ContentFetcher,
    storage::{BlockRow, MembershipRow, SpaceRow, Storage, SubspaceRow, WriteError},
};

use super::{
    edits::{apply_edit, load_edits, ImportedSpace, LoadedContent},
    mapper, parser, EventError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SpaceCreated,
    PersonalPluginCreated,
    GovernancePluginCreated,
    InitialEditorsAdded,
    RoleChanged,
    MemberAdded,
    MemberRemoved,
    EditorAdded,
    EditorRemoved,
    SubspaceAdded,
    SubspaceRemoved,
    VoteCast,
    EditPublished,
    ProposalExecuted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SpaceCreated => "space_created",
            EventKind::PersonalPluginCreated => "personal_plugin_created",
            EventKind::GovernancePluginCreated => "governance_plugin_created",
            EventKind::InitialEditorsAdded => "initial_editors_added",
            EventKind::RoleChanged => "role_changed",
            EventKind::MemberAdded => "member_added",
            EventKind::MemberRemoved => "member_removed",
            EventKind::EditorAdded => "editor_added",
            EventKind::EditorRemoved => "editor_removed",
            EventKind::SubspaceAdded => "subspace_added",
            EventKind::SubspaceRemoved => "subspace_removed",
            EventKind::VoteCast => "vote_cast",
            EventKind::EditPublished => "edit_published",
            EventKind::ProposalExecuted => "proposal_executed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub kind: EventKind,
    pub written: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct EventFailure {
    pub kind: EventKind,
    pub error: Report<EventError>,
}

/// Outcome of the events of one block.
#[derive(Debug, Default)]
pub struct BlockSummary {
    pub tallies: Vec<Tally>,
    pub failures: Vec<EventFailure>,
}

impl BlockSummary {
    pub fn tally(&self, kind: EventKind) -> Option<&Tally> {
        self.tallies.iter().find(|tally| tally.kind == kind)
    }

    pub fn written(&self) -> usize {
        self.tallies.iter().map(|tally| tally.written).sum()
    }

    pub fn failed(&self) -> usize {
        self.tallies.iter().map(|tally| tally.failed).sum()
    }
}

struct EventMetrics {
    processed: Counter<u64>,
    failed: Counter<u64>,
}

impl EventMetrics {
    fn new() -> Self {
        let meter = geo_observability::meter("geo_sink_postgres");
        EventMetrics {
            processed: meter
                .u64_counter("events_processed")
                .with_description("number of events written")
                .build(),
            failed: meter
                .u64_counter("events_failed")
                .with_description("number of events that could not be written")
                .build(),
        }
    }
}

/// Writes the events of a block to storage.
///
/// Events are handled kind by kind, in dependency order. A failed event is logged and counted,
/// the others are still written. Events of a kind whose writes commute are handled concurrently.
/// Role changes, votes and edits are written one at a time in chain order, the content of edits
/// is fetched concurrently before any event is written.
pub struct BlockHandler<S, F> {
    storage: S,
    fetcher: F,
    metrics: EventMetrics,
}

type EventResult = Result<(), EventError>;

/// A published edit with its content.
struct LoadedEdits {
    event: parser::EditPublished,
    content: LoadedContent,
}

impl<S, F> BlockHandler<S, F>
where
    S: Storage + Send + Sync,
    F: ContentFetcher + Send + Sync,
{
    pub fn new(storage: S, fetcher: F) -> Self {
        BlockHandler {
            storage,
            fetcher,
            metrics: EventMetrics::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write `output` for `block`.
    ///
    /// Fails only if the block itself couldn't be recorded. Failed events are in the summary.
    pub async fn handle_block(
        &self,
        block: &BlockRow,
        final_block_height: u64,
        output: &GeoOutput,
    ) -> Result<BlockSummary, WriteError> {
        self.storage.upsert_block(block).await?;

        let number = block.number;
        let mut summary = BlockSummary::default();

        let loaded = join_all(
            output
                .edits_published
                .iter()
                .map(|event| self.load_edit_published(event)),
        )
        .await;
        let imports = imported_spaces(&loaded);

        self.run(&mut summary, EventKind::SpaceCreated, &output.spaces_created, |e| {
            self.space_created(e, &imports, number)
        })
        .await;
        self.run(
            &mut summary,
            EventKind::PersonalPluginCreated,
            &output.personal_plugins_created,
            |e| self.personal_plugin_created(e, number),
        )
        .await;
        self.run(
            &mut summary,
            EventKind::GovernancePluginCreated,
            &output.governance_plugins_created,
            |e| self.governance_plugin_created(e, number),
        )
        .await;
        self.run(
            &mut summary,
            EventKind::InitialEditorsAdded,
            &output.initial_editors_added,
            |e| self.initial_editors_added(e, number),
        )
        .await;
        self.run_in_order(&mut summary, EventKind::RoleChanged, &output.role_changes, |e| {
            self.role_changed(e, number)
        })
        .await;
        self.run(&mut summary, EventKind::MemberAdded, &output.members_added, |e| {
            self.member_added(e, number)
        })
        .await;
        self.run(&mut summary, EventKind::MemberRemoved, &output.members_removed, |e| {
            self.member_removed(e, number)
        })
        .await;
        self.run(&mut summary, EventKind::EditorAdded, &output.editors_added, |e| {
            self.editor_added(e, number)
        })
        .await;
        self.run(&mut summary, EventKind::EditorRemoved, &output.editors_removed, |e| {
            self.editor_removed(e, number)
        })
        .await;
        self.run(&mut summary, EventKind::SubspaceAdded, &output.subspaces_added, |e| {
            self.subspace_added(e, number)
        })
        .await;
        self.run(
            &mut summary,
            EventKind::SubspaceRemoved,
            &output.subspaces_removed,
            |e| self.subspace_removed(e, number),
        )
        .await;
        self.run_in_order(&mut summary, EventKind::VoteCast, &output.votes_cast, |e| {
            self.vote_cast(e, number)
        })
        .await;
        self.run_in_order(&mut summary, EventKind::EditPublished, loaded, |e| {
            self.edit_published(e, number)
        })
        .await;
        self.run(
            &mut summary,
            EventKind::ProposalExecuted,
            &output.executed_proposals,
            |e| self.proposal_executed(e, number),
        )
        .await;

        self.storage.finish_block(block, final_block_height).await?;

        if summary.failed() > 0 {
            warn!(
                block = number,
                written = summary.written(),
                failed = summary.failed(),
                "block handled with failed events"
            );
        } else {
            info!(block = number, written = summary.written(), "block handled");
        }

        Ok(summary)
    }

    /// Revert the writes of every block after the cursor.
    pub async fn undo(&self, cursor: &Cursor) -> Result<CursorAction, WriteError> {
        info!(cursor = %cursor, "undo writes");
        self.storage.undo_to(cursor).await
    }

    async fn run<'a, T, H, Fut>(
        &self,
        summary: &mut BlockSummary,
        kind: EventKind,
        events: &'a [T],
        handler: H,
    ) where
        H: Fn(&'a T) -> Fut,
        Fut: Future<Output = EventResult>,
    {
        if events.is_empty() {
            return;
        }

        debug!(kind = kind.as_str(), count = events.len(), "handling events");
        let results = join_all(events.iter().map(handler)).await;
        self.record(summary, kind, results);
    }

    async fn run_in_order<I, H, Fut>(
        &self,
        summary: &mut BlockSummary,
        kind: EventKind,
        events: I,
        mut handler: H,
    ) where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        H: FnMut(I::Item) -> Fut,
        Fut: Future<Output = EventResult>,
    {
        let events = events.into_iter();
        let count = events.len();
        if count == 0 {
            return;
        }

        debug!(kind = kind.as_str(), count, "handling events in order");
        let mut results = Vec::with_capacity(count);
        for event in events {
            results.push(handler(event).await);
        }
        self.record(summary, kind, results);
    }

    fn record(&self, summary: &mut BlockSummary, kind: EventKind, results: Vec<EventResult>) {
        let attributes = [KeyValue::new("kind", kind.as_str())];
        let mut tally = Tally {
            kind,
            written: 0,
            failed: 0,
        };

        for result in results {
            match result {
                Ok(()) => tally.written += 1,
                Err(error) => {
                    warn!(kind = kind.as_str(), err = ?error, "failed to handle event");
                    tally.failed += 1;
                    summary.failures.push(EventFailure { kind, error });
                }
            }
        }

        self.metrics.processed.add(tally.written as u64, &attributes);
        self.metrics.failed.add(tally.failed as u64, &attributes);
        summary.tallies.push(tally);
    }

    async fn space_created(
        &self,
        event: &geo::GeoSpaceCreated,
        imports: &HashMap<String, ImportedSpace>,
        block: u64,
    ) -> EventResult {
        let event = parser::parse_space_created(event).change_context(EventError)?;
        let imported = imports.get(event.space_plugin_address.as_str());
        let space = mapper::map_space_created(&event, imported, block);
        self.storage
            .insert_space(&space)
            .await
            .change_context(EventError)
    }

    async fn personal_plugin_created(
        &self,
        event: &geo::GeoPersonalSpaceAdminPluginCreated,
        block: u64,
    ) -> EventResult {
        let event = parser::parse_personal_plugin_created(event).change_context(EventError)?;
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        let plugin =
            mapper::map_personal_plugin_created(&event, space).change_context(EventError)?;

        self.storage
            .set_personal_plugin(
                &plugin.space_id,
                &plugin.personal_space_admin_plugin_address,
                block,
            )
            .await
            .change_context(EventError)?;
        self.add_editors(&[plugin.initial_editor], block).await
    }

    async fn governance_plugin_created(
        &self,
        event: &geo::GeoGovernancePluginCreated,
        block: u64,
    ) -> EventResult {
        let event = parser::parse_governance_plugin_created(event).change_context(EventError)?;
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        let plugins =
            mapper::map_governance_plugin_created(&event, space).change_context(EventError)?;

        self.storage
            .set_governance_plugins(
                &plugins.space_id,
                &plugins.main_voting_plugin_address,
                &plugins.member_access_plugin_address,
                block,
            )
            .await
            .change_context(EventError)
    }

    async fn initial_editors_added(
        &self,
        event: &geo::InitialEditorAdded,
        block: u64,
    ) -> EventResult {
        let event = parser::parse_initial_editors_added(event).change_context(EventError)?;
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        let editors =
            mapper::map_initial_editors_added(&event, space).change_context(EventError)?;
        self.add_editors(&editors, block).await
    }

    async fn role_changed(&self, event: &geo::RoleChange, block: u64) -> EventResult {
        let event = parser::parse_role_change(event).change_context(EventError)?;
        let space = self.space_by_plugin(event.space.as_str()).await?;
        let update = mapper::map_role_changed(&event, space).change_context(EventError)?;

        if update.granted {
            self.storage
                .upsert_accounts(&[update.account_id.clone()], block)
                .await
                .change_context(EventError)?;
            self.storage
                .add_role(&update.space_id, update.role, &update.account_id, block)
                .await
                .change_context(EventError)
        } else {
            self.storage
                .remove_role(&update.space_id, update.role, &update.account_id, block)
                .await
                .change_context(EventError)
        }
    }

    async fn member_added(&self, event: &geo::MemberAdded, block: u64) -> EventResult {
        let event = parser::parse_member_added(event).change_context(EventError)?;
        let member = self.membership(&event).await?;
        self.storage
            .upsert_accounts(&[member.account_id.clone()], block)
            .await
            .change_context(EventError)?;
        self.storage
            .add_member(&member, block)
            .await
            .change_context(EventError)
    }

    async fn member_removed(&self, event: &geo::MemberRemoved, block: u64) -> EventResult {
        let event = parser::parse_member_removed(event).change_context(EventError)?;
        let member = self.membership(&event).await?;
        self.storage
            .remove_member(&member, block)
            .await
            .change_context(EventError)
    }

    async fn editor_added(&self, event: &geo::EditorAdded, block: u64) -> EventResult {
        let event = parser::parse_editor_added(event).change_context(EventError)?;
        let editor = self.membership(&event).await?;
        self.storage
            .upsert_accounts(&[editor.account_id.clone()], block)
            .await
            .change_context(EventError)?;
        self.storage
            .add_editor(&editor, block)
            .await
            .change_context(EventError)
    }

    async fn editor_removed(&self, event: &geo::EditorRemoved, block: u64) -> EventResult {
        let event = parser::parse_editor_removed(event).change_context(EventError)?;
        let editor = self.membership(&event).await?;
        self.storage
            .remove_editor(&editor, block)
            .await
            .change_context(EventError)
    }

    async fn subspace_added(&self, event: &geo::SubspaceAdded, block: u64) -> EventResult {
        let event = parser::parse_subspace_added(event).change_context(EventError)?;
        let subspace = self.subspace(&event).await?;
        self.storage
            .add_subspace(&subspace, block)
            .await
            .change_context(EventError)
    }

    async fn subspace_removed(&self, event: &geo::SubspaceRemoved, block: u64) -> EventResult {
        let event = parser::parse_subspace_removed(event).change_context(EventError)?;
        let subspace = self.subspace(&event).await?;
        self.storage
            .remove_subspace(&subspace, block)
            .await
            .change_context(EventError)
    }

    async fn vote_cast(&self, event: &geo::VoteCast, block: u64) -> EventResult {
        let event = parser::parse_vote_cast(event).change_context(EventError)?;
        let space = self.space_by_plugin(event.plugin_address.as_str()).await?;
        let vote = mapper::map_vote_cast(&event, space).change_context(EventError)?;

        self.storage
            .upsert_accounts(&[vote.account_id.clone()], block)
            .await
            .change_context(EventError)?;
        self.storage
            .upsert_vote(&vote, block)
            .await
            .change_context(EventError)
    }

    async fn load_edit_published(
        &self,
        event: &geo::EditPublished,
    ) -> Result<LoadedEdits, EventError> {
        let event = parser::parse_edit_published(event).change_context(EventError)?;
        let content = load_edits(&self.fetcher, &event.content_uri).await?;
        Ok(LoadedEdits { event, content })
    }

    async fn edit_published(
        &self,
        loaded: Result<LoadedEdits, EventError>,
        block: u64,
    ) -> EventResult {
        let LoadedEdits { event, content } = loaded?;
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        let space = mapper::map_edit_published(&event, space).change_context(EventError)?;

        for edit in &content.edits {
            apply_edit(&self.storage, &space.id, edit, block)
                .await
                .change_context(EventError)
                .attach_printable_lazy(|| format!("edit uri: {}", edit.content_uri))?;
        }

        debug!(space = %space.id, edits = content.edits.len(), "edits applied");
        Ok(())
    }

    async fn proposal_executed(
        &self,
        event: &geo::ProposalExecuted,
        block: u64,
    ) -> EventResult {
        let event = parser::parse_proposal_executed(event).change_context(EventError)?;
        let space = self.space_by_plugin(event.plugin_address.as_str()).await?;
        let proposal = mapper::map_proposal_executed(&event, space).change_context(EventError)?;

        self.storage
            .upsert_executed_proposal(&proposal, block)
            .await
            .change_context(EventError)
    }

    async fn membership(
        &self,
        event: &parser::MembershipChanged,
    ) -> Result<MembershipRow, EventError> {
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        mapper::map_membership_changed(event, space).change_context(EventError)
    }

    async fn subspace(
        &self,
        event: &parser::SubspaceChanged,
    ) -> Result<SubspaceRow, EventError> {
        let space = self.space_by_dao(event.dao_address.as_str()).await?;
        mapper::map_subspace_changed(event, space).change_context(EventError)
    }

    /// Editors of a new space are also its members.
    async fn add_editors(&self, editors: &[MembershipRow], block: u64) -> EventResult {
        let accounts = editors
            .iter()
            .map(|editor| editor.account_id.clone())
            .collect::<Vec<_>>();
        self.storage
            .upsert_accounts(&accounts, block)
            .await
            .change_context(EventError)?;

        for editor in editors {
            self.storage
                .add_editor(editor, block)
                .await
                .change_context(EventError)?;
            self.storage
                .add_member(editor, block)
                .await
                .change_context(EventError)?;
        }
        Ok(())
    }

    async fn space_by_dao(
        &self,
        dao_address: &str,
    ) -> Result<Option<SpaceRow>, EventError> {
        self.storage
            .space_by_dao(dao_address)
            .await
            .change_context(EventError)
    }

    async fn space_by_plugin(
        &self,
        plugin_address: &str,
    ) -> Result<Option<SpaceRow>, EventError> {
        self.storage
            .space_by_plugin(plugin_address)
            .await
            .change_context(EventError)
    }
}

/// Imports published by space plugins, by space plugin address.
fn imported_spaces(loaded: &[Result<LoadedEdits, EventError>]) -> HashMap<String, ImportedSpace> {
    loaded
        .iter()
        .filter_map(|loaded| loaded.as_ref().ok())
        .filter_map(|loaded| {
            let import = loaded.content.import.clone()?;
            Some((loaded.event.plugin_address.as_str().to_string(), import))
        })
        .collect()
}
