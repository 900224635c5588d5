use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::model::FilterState;
use crate::render::{DisplayModel, MountPoint};

/// Controls whose values the engine reads back from the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    EventTypeFilter,
    AuthorizationFilter,
    DeviceSearch,
}

/// Anything that can show a display model. The engine never asks a surface
/// about layout beyond "is this mount point present" and the current value of
/// the filter/search controls.
pub trait RenderingSurface {
    fn has_mount(&self, mount: MountPoint) -> bool;
    fn control_value(&self, control: Control) -> String;
    fn draw(&mut self, model: &DisplayModel);
}

pub fn filter_state(surface: &dyn RenderingSurface) -> FilterState {
    FilterState {
        event_type: surface.control_value(Control::EventTypeFilter),
        authorized: surface.control_value(Control::AuthorizationFilter),
    }
}

/// Drops panels the surface has nowhere to put, then draws.
pub fn present<S: RenderingSurface + ?Sized>(surface: &mut S, mut model: DisplayModel) {
    model.panels.retain(|(mount, _)| {
        let mounted = surface.has_mount(*mount);
        if !mounted {
            debug!(mount = mount.as_str(), "mount point missing, panel skipped");
        }
        mounted
    });
    surface.draw(&model);
}

/// Headless surface: every mount point exists unless removed, control values
/// are set directly, and drawn models are kept in order.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    missing: BTreeSet<MountPoint>,
    controls: BTreeMap<Control, String>,
    drawn: Vec<DisplayModel>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_mount(mut self, mount: MountPoint) -> Self {
        self.missing.insert(mount);
        self
    }

    pub fn set_control(&mut self, control: Control, value: &str) {
        self.controls.insert(control, value.to_string());
    }

    pub fn drawn(&self) -> &[DisplayModel] {
        &self.drawn
    }

    pub fn last(&self) -> Option<&DisplayModel> {
        self.drawn.last()
    }

    pub fn draw_count(&self) -> usize {
        self.drawn.len()
    }
}

impl RenderingSurface for RecordingSurface {
    fn has_mount(&self, mount: MountPoint) -> bool {
        !self.missing.contains(&mount)
    }

    fn control_value(&self, control: Control) -> String {
        self.controls.get(&control).cloned().unwrap_or_default()
    }

    fn draw(&mut self, model: &DisplayModel) {
        self.drawn.push(model.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::View;
    use crate::render::Panel;

    #[test]
    fn unmounted_panels_are_skipped_silently() {
        let mut s = RecordingSurface::new().without_mount(MountPoint::ActivityChart);
        let model = DisplayModel {
            view: View::Dashboard,
            title: "Vista General".into(),
            panels: vec![
                (MountPoint::StatCounters, Panel::Stats { counters: vec![] }),
                (
                    MountPoint::ActivityChart,
                    Panel::Tabs {
                        items: vec![],
                        active: None,
                    },
                ),
            ],
        };
        present(&mut s, model);
        let drawn = s.last().unwrap();
        assert_eq!(drawn.panels.len(), 1);
        assert!(drawn.panel(MountPoint::ActivityChart).is_none());
    }

    #[test]
    fn filter_reads_controls_with_empty_default() {
        let mut s = RecordingSurface::new();
        assert!(filter_state(&s).is_empty());
        s.set_control(Control::AuthorizationFilter, "false");
        let f = filter_state(&s);
        assert_eq!(f.authorized, "false");
        assert!(f.event_type.is_empty());
    }
}
