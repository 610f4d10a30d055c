//! Panel use-case service.
//!
//! # Responsibility
//! - Provide create/update/delete/lookup entry points for callers.
//! - Turn the repository's `page_size + 1` over-fetch into an explicit page
//!   envelope with a `has_next_page` flag.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or uniqueness checks.
//! - Service layer remains storage-agnostic.

use crate::model::panel::{Panel, PanelId};
use crate::repo::panel_repo::{PanelRepository, RepoError, RepoResult};

/// Input for creating a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPanelRequest {
    pub panel_name: String,
    pub description: String,
    pub sort_order: i64,
    pub is_active: bool,
    pub sys_user_id: String,
}

/// One page of panels in name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelPage {
    /// At most `page_size` panels.
    pub items: Vec<Panel>,
    /// 1-based record number of the first item.
    pub starting_record_number: u32,
    pub has_next_page: bool,
}

impl PanelPage {
    /// Record number the following page starts at, if there is one.
    pub fn next_starting_record_number(&self, page_size: u32) -> Option<u32> {
        self.has_next_page
            .then(|| self.starting_record_number.saturating_add(page_size))
    }
}

/// Panels adjacent to one panel in name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelNeighbors {
    pub previous: Vec<Panel>,
    pub next: Vec<Panel>,
}

/// Use-case service wrapper for panel operations.
pub struct PanelService<R: PanelRepository> {
    repo: R,
}

impl<R: PanelRepository> PanelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a panel and returns it with its generated id.
    pub fn create_panel(&self, request: NewPanelRequest) -> RepoResult<Panel> {
        let mut panel = Panel::new(
            request.panel_name,
            request.description,
            request.sys_user_id,
        );
        panel.sort_order = request.sort_order;
        panel.is_active = request.is_active;
        self.repo.insert_panel(&mut panel)?;
        Ok(panel)
    }

    pub fn update_panel(&self, panel: &Panel) -> RepoResult<()> {
        self.repo.update_panel(panel)
    }

    /// Deletes panels by id on behalf of `sys_user_id`.
    pub fn delete_panels(&self, ids: &[PanelId], sys_user_id: &str) -> RepoResult<()> {
        let panels = ids
            .iter()
            .map(|&id| Panel {
                id: Some(id),
                panel_name: String::new(),
                description: String::new(),
                is_active: false,
                sort_order: 0,
                sys_user_id: sys_user_id.to_string(),
            })
            .collect::<Vec<_>>();
        self.repo.delete_panels(&panels)
    }

    /// Gets one panel, mapping absence to `NotFound`.
    pub fn get_panel(&self, id: PanelId) -> RepoResult<Panel> {
        self.repo
            .get_panel_by_id(id)?
            .ok_or(RepoError::NotFound(id))
    }

    pub fn find_by_name(&self, name: &str) -> RepoResult<Option<Panel>> {
        self.repo.get_panel_by_name(name)
    }

    pub fn active_panels(&self) -> RepoResult<Vec<Panel>> {
        self.repo.list_active_panels()
    }

    pub fn all_panels(&self) -> RepoResult<Vec<Panel>> {
        self.repo.list_all_panels()
    }

    /// Loads one page starting at a 1-based record number.
    pub fn page_of_panels(&self, starting_record_number: u32) -> RepoResult<PanelPage> {
        let starting_record_number = starting_record_number.max(1);
        let page_size = usize::try_from(self.repo.page_size()).unwrap_or(usize::MAX);
        let mut items = self.repo.list_page(starting_record_number)?;
        let has_next_page = items.len() > page_size;
        items.truncate(page_size);
        Ok(PanelPage {
            items,
            starting_record_number,
            has_next_page,
        })
    }

    pub fn neighbors(&self, id: PanelId) -> RepoResult<PanelNeighbors> {
        Ok(PanelNeighbors {
            previous: self.repo.previous_panels(id)?,
            next: self.repo.next_panels(id)?,
        })
    }

    /// Active panels whose name starts with `prefix`, for autocomplete.
    pub fn autocomplete(&self, prefix: &str) -> RepoResult<Vec<Panel>> {
        self.repo.search_active_panels(prefix)
    }

    pub fn lookup_name(&self, id: PanelId) -> RepoResult<Option<String>> {
        self.repo.name_for_id(id)
    }

    pub fn lookup_description(&self, id: PanelId) -> RepoResult<Option<String>> {
        self.repo.description_for_id(id)
    }

    pub fn lookup_id(&self, name: &str) -> RepoResult<Option<PanelId>> {
        self.repo.id_for_name(name)
    }

    pub fn total_count(&self) -> RepoResult<u64> {
        self.repo.total_panel_count()
    }

    pub fn page_size(&self) -> u32 {
        self.repo.page_size()
    }
}
