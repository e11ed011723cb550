use bevy::prelude::*;

pub struct ViewerStatesPlugin;
impl Plugin for ViewerStatesPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<ImmersiveSession>()
            .init_state::<ViewMode>();
    }
}

/// Whether the headset is currently presenting. Driven by the host session;
/// the dock listens for the `Inline -> Presenting` edge.
#[derive(Default, States, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmersiveSession {
    #[default]
    Inline,
    Presenting,
}

impl ImmersiveSession {
    pub fn toggled(self) -> Self {
        match self {
            Self::Inline => Self::Presenting,
            Self::Presenting => Self::Inline,
        }
    }
}

/// `Cinema` hides the dock and its windows behind a single large screen.
#[derive(Default, States, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    #[default]
    Browse,
    Cinema,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Browse => Self::Cinema,
            Self::Cinema => Self::Browse,
        }
    }
}
