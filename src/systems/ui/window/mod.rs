//! Floating panels and the order in which they were opened.
//!
//! `OpenOrder` is the only source of truth for which panels are visible and
//! drives slot assignment in `systems::spatial::layout`. Panels themselves are
//! spawned once at startup and hidden while closed.
use bevy::prelude::*;
use enum_map::{Enum, EnumMap};
use smallvec::SmallVec;

use crate::{
    data::states::ViewMode,
    systems::{
        interaction::{DragEnded, Draggable, PointerSurface},
        spatial::SpatialSystem,
    },
};

/* ─────────────────────────  PLUGIN  ───────────────────────── */

pub struct PanelWindowPlugin;
impl Plugin for PanelWindowPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OpenOrder>()
            .add_message::<WindowCommand>()
            .add_systems(Startup, spawn_panel_windows)
            .add_systems(Update, apply_window_commands.in_set(SpatialSystem::Input))
            .add_systems(Update, PanelWindow::pin_after_drag.in_set(SpatialSystem::Dock))
            .add_systems(
                Update,
                PanelWindow::sync_visibility.after(SpatialSystem::Layout),
            );
    }
}

/* ─────────────────────────  DATA  ───────────────────────── */

#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKey {
    Video,
    Gallery,
    VideoGallery,
}

impl WindowKey {
    pub const ALL: [WindowKey; 3] = [WindowKey::Video, WindowKey::Gallery, WindowKey::VideoGallery];

    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Gallery => "gallery",
            Self::VideoGallery => "videoGallery",
        }
    }

    /// Rendered size in metres.
    pub fn default_size(self) -> Vec2 {
        match self {
            Self::Video => Vec2::new(1.2, 0.34),
            Self::Gallery => Vec2::new(1.0, 0.72),
            Self::VideoGallery => Vec2::new(0.9, 0.72),
        }
    }
}

pub fn default_widths() -> EnumMap<WindowKey, f32> {
    EnumMap::from_fn(|key: WindowKey| key.default_size().x)
}

/// Panels in the order they were opened. Reopening a closed panel moves it to
/// the back; opening one that is already open changes nothing.
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOrder(SmallVec<[WindowKey; 4]>);

impl OpenOrder {
    pub fn from_keys(keys: &[WindowKey]) -> Self {
        let mut order = Self::default();
        for key in keys {
            order.open(*key);
        }
        order
    }

    pub fn open(&mut self, key: WindowKey) -> bool {
        if self.contains(key) {
            return false;
        }
        self.0.push(key);
        true
    }

    pub fn close(&mut self, key: WindowKey) -> bool {
        let Some(index) = self.0.iter().position(|open| *open == key) else {
            return false;
        };
        self.0.remove(index);
        true
    }

    pub fn contains(&self, key: WindowKey) -> bool {
        self.0.contains(&key)
    }

    pub fn as_slice(&self) -> &[WindowKey] {
        &self.0
    }
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    Open(WindowKey),
    Close(WindowKey),
    Toggle(WindowKey),
}

#[derive(Component, Debug, Clone)]
#[require(Transform, Visibility, Draggable)]
pub struct PanelWindow {
    pub key: WindowKey,
    pub size: Vec2,
    pinned: bool,
}

impl PanelWindow {
    pub fn new(key: WindowKey) -> Self {
        Self {
            key,
            size: key.default_size(),
            pinned: false,
        }
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    /// A pinned panel was placed by hand and keeps its pose until the open
    /// set changes.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    fn pin_after_drag(
        mut ended: MessageReader<DragEnded>,
        mut windows: Query<&mut PanelWindow>,
    ) {
        for drag in ended.read() {
            if let Ok(mut window) = windows.get_mut(drag.entity) {
                window.pinned = true;
            }
        }
    }

    fn sync_visibility(
        order: Res<OpenOrder>,
        view_mode: Res<State<ViewMode>>,
        mut windows: Query<(&PanelWindow, &mut Visibility)>,
    ) {
        let browsing = *view_mode.get() == ViewMode::Browse;
        for (window, mut visibility) in &mut windows {
            let target = if browsing && order.contains(window.key) {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
            visibility.set_if_neq(target);
        }
    }
}

fn spawn_panel_windows(mut commands: Commands) {
    for key in WindowKey::ALL {
        let window = PanelWindow::new(key);
        commands.spawn((
            Name::new(format!("panel_window_{}", key.label())),
            PointerSurface::new(window.size),
            window,
            Visibility::Hidden,
        ));
    }
}

fn apply_window_commands(
    mut commands: MessageReader<WindowCommand>,
    mut order: ResMut<OpenOrder>,
) {
    for command in commands.read() {
        match *command {
            WindowCommand::Open(key) if !order.contains(key) => {
                order.open(key);
            }
            WindowCommand::Close(key) if order.contains(key) => {
                order.close(key);
            }
            WindowCommand::Toggle(key) => {
                if order.contains(key) {
                    order.close(key);
                } else {
                    order.open(key);
                }
            }
            _ => {}
        }
    }
}
