use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::config::{DashboardConfig, SourcesConfig};
use crate::error::Result;
use crate::loader::{LoadEvent, LoadSink, Loader};
use crate::model::{Group, View, ViewState};
use crate::render::{DisplayModel, RenderInput, render};
use crate::scheduler::Scheduler;
use crate::surface::{Control, RenderingSurface, filter_state, present};
use crate::transport::Transport;
use crate::view::ViewController;

/// The one state object of a running dashboard: cache, view state and the
/// surface they are drawn on. Everything runs on a single thread; borrows are
/// never held across an await, so overlapping refresh cycles interleave
/// safely and the last write per entity wins.
pub struct Dashboard<S: RenderingSurface> {
    loader: Loader,
    cache: RefCell<CacheStore>,
    view: RefCell<ViewController>,
    surface: RefCell<S>,
    refresh_interval: Duration,
    cycles: Cell<u64>,
}

impl<S: RenderingSurface> Dashboard<S> {
    pub fn new(loader: Loader, surface: S, auto_refresh: bool, refresh_interval: Duration) -> Self {
        let view = ViewController::new(loader.sources().clone(), auto_refresh);
        Self {
            loader,
            cache: RefCell::new(CacheStore::new()),
            view: RefCell::new(view),
            surface: RefCell::new(surface),
            refresh_interval,
            cycles: Cell::new(0),
        }
    }

    pub fn from_config(cfg: &DashboardConfig, transport: Box<dyn Transport>, surface: S) -> Self {
        Self::new(
            Loader::new(transport, cfg.sources()),
            surface,
            cfg.refresh.auto,
            cfg.refresh.interval(),
        )
    }

    pub fn sources(&self) -> &SourcesConfig {
        self.loader.sources()
    }

    pub fn cache(&self) -> Ref<'_, CacheStore> {
        self.cache.borrow()
    }

    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    pub fn surface_mut(&self) -> RefMut<'_, S> {
        self.surface.borrow_mut()
    }

    pub fn view_state(&self) -> ViewState {
        self.view.borrow().state().clone()
    }

    pub fn active_view(&self) -> View {
        self.view.borrow().active_view()
    }

    /// Completed `load_all` cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    /// Model of the active view as of now, without drawing it.
    pub fn display_model(&self) -> DisplayModel {
        let (filter, search) = {
            let surface = self.surface.borrow();
            (
                filter_state(&*surface),
                surface.control_value(Control::DeviceSearch),
            )
        };
        let cache = self.cache.borrow();
        let view = self.view.borrow();
        render(&RenderInput {
            cache: &cache,
            view: view.state(),
            filter: &filter,
            device_search: &search,
            sources: self.loader.sources(),
        })
    }

    pub fn render_active(&self) {
        let model = self.display_model();
        present(&mut *self.surface.borrow_mut(), model);
    }

    pub async fn load_group(&self, group: Group) -> usize {
        self.loader.load_group(group, self).await
    }

    pub async fn load_all(&self) -> usize {
        self.loader.load_all(self).await
    }

    pub fn navigate(&self, view: View) {
        self.view.borrow_mut().navigate(view);
        self.render_active();
    }

    pub fn select_entity(&self, group: Group, id: &str) -> Result<()> {
        self.view.borrow_mut().select_entity(group, id)?;
        self.render_active();
        Ok(())
    }

    /// Moves the entity tab of the active view; no-op on views without tabs.
    pub fn cycle_entity(&self, step: isize) {
        let group = match self.active_view().group() {
            Some(g) if g != Group::Devices => g,
            _ => return,
        };
        self.view.borrow_mut().cycle_entity(group, step);
        self.render_active();
    }

    /// Filter or search controls changed on the surface.
    pub fn controls_changed(&self) {
        self.render_active();
    }

    /// Grows the history window of the selected camera. Only the camera
    /// history table paginates; elsewhere this does nothing.
    pub fn load_more(&self) -> Option<usize> {
        if self.active_view() != View::Cameras {
            return None;
        }
        let id = self
            .view
            .borrow()
            .active_entity(Group::Cameras)
            .map(str::to_string)?;
        let size = self.cache.borrow_mut().grow_window(Group::Cameras, &id);
        debug!(entity = %id, window = size, "history window grown");
        self.render_active();
        Some(size)
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.view.borrow().auto_refresh_enabled()
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.view.borrow_mut().set_auto_refresh(enabled);
    }

    pub fn toggle_auto_refresh(&self) -> bool {
        let enabled = self.view.borrow_mut().toggle_auto_refresh();
        info!(enabled, "auto-refresh toggled");
        enabled
    }
}

impl<S: RenderingSurface + 'static> Dashboard<S> {
    /// Manual refresh: a full cycle on its own task, independent of the timer.
    pub fn refresh(self: &Rc<Self>) -> JoinHandle<usize> {
        let this = Rc::clone(self);
        tokio::task::spawn_local(async move { this.load_all().await })
    }

    /// Hooks `load_all` to `scheduler`; ticks are skipped while the toggle is
    /// off.
    pub fn start_auto_refresh(self: &Rc<Self>, scheduler: &mut Scheduler) -> Result<()> {
        let weak = Rc::downgrade(self);
        scheduler.start(self.refresh_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(this) = weak.upgrade() else {
                    return;
                };
                if this.auto_refresh_enabled() {
                    this.load_all().await;
                } else {
                    debug!("auto-refresh disabled, tick skipped");
                }
            }
        })
    }
}

impl<S: RenderingSurface> LoadSink for Dashboard<S> {
    fn emit(&self, ev: LoadEvent) {
        match ev {
            LoadEvent::EntityLoaded {
                group,
                id,
                snapshot,
                history,
                failures,
            } => {
                {
                    let mut cache = self.cache.borrow_mut();
                    cache.set_snapshot(group, &id, snapshot);
                    cache.set_history(group, &id, history);
                }
                debug!(%group, entity = %id, failures, "entity cached");
                let affected = self.view.borrow().affects(group, &id);
                if affected {
                    self.render_active();
                }
            }
            LoadEvent::StageSettled { .. } => {}
            LoadEvent::CycleFinished { .. } => {
                self.cycles.set(self.cycles.get() + 1);
                if self.active_view() == View::Dashboard {
                    self.render_active();
                }
            }
        }
    }
}
