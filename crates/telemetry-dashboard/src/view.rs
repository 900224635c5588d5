use std::collections::BTreeMap;

use tracing::debug;

use crate::config::SourcesConfig;
use crate::error::{Error, Result};
use crate::model::{Group, View, ViewState};

/// Active view, per-group entity tab and the auto-refresh toggle. Transitions
/// never fetch; the caller re-renders from whatever the cache holds.
#[derive(Debug, Clone)]
pub struct ViewController {
    state: ViewState,
    sources: SourcesConfig,
}

impl ViewController {
    pub fn new(sources: SourcesConfig, auto_refresh: bool) -> Self {
        let active_entity: BTreeMap<Group, String> = Group::ALL
            .into_iter()
            .map(|g| (g, sources.default_entity(g)))
            .collect();
        Self {
            state: ViewState {
                active_view: View::Dashboard,
                active_entity,
                auto_refresh_enabled: auto_refresh,
            },
            sources,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn active_view(&self) -> View {
        self.state.active_view
    }

    pub fn navigate(&mut self, view: View) {
        debug!(from = self.state.active_view.as_str(), to = view.as_str(), "navigate");
        self.state.active_view = view;
    }

    pub fn active_entity(&self, group: Group) -> Option<&str> {
        self.state.active_entity.get(&group).map(String::as_str)
    }

    /// Selecting a tab also brings its group's view to the front.
    pub fn select_entity(&mut self, group: Group, id: &str) -> Result<()> {
        if !self.sources.entities(group).iter().any(|e| e == id) {
            return Err(Error::msg(format!("unknown {group} entity '{id}'")));
        }
        self.state.active_entity.insert(group, id.to_string());
        self.state.active_view = View::for_group(group);
        Ok(())
    }

    /// Steps the active tab of `group` by `step` positions, wrapping around.
    pub fn cycle_entity(&mut self, group: Group, step: isize) -> Option<&str> {
        let ids = self.sources.entities(group);
        if ids.is_empty() {
            return None;
        }
        let current = self
            .active_entity(group)
            .and_then(|id| ids.iter().position(|e| e == id))
            .unwrap_or(0);
        let len = ids.len() as isize;
        let next = (current as isize + step).rem_euclid(len) as usize;
        self.state.active_entity.insert(group, ids[next].clone());
        self.active_entity(group)
    }

    /// Whether new data for (group, id) changes what the active view shows.
    pub fn affects(&self, group: Group, id: &str) -> bool {
        self.state.active_view.group() == Some(group) && self.active_entity(group) == Some(id)
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.state.auto_refresh_enabled
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.state.auto_refresh_enabled = enabled;
    }

    pub fn toggle_auto_refresh(&mut self) -> bool {
        self.state.auto_refresh_enabled = !self.state.auto_refresh_enabled;
        self.state.auto_refresh_enabled
    }
}
