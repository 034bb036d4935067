use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Physical keys the default bindings refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    C,
    E,
    P,
    R,
    Up,
    Down,
    Left,
    Right,
    Space,
    ShiftLeft,
    Escape,
    F1,
    F2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// One physical control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Binding {
    Key(Key),
    Mouse(MouseButton),
}

/// A logical input the simulation understands. Devices are mapped onto
/// actions through [`Bindings`]; nothing downstream sees raw keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    Sprint,
    Jump,
    SpawnCube,
    Respawn,
    ToggleCameraMode,
    ToggleDebugOverlay,
    TogglePause,
}

/// How an action is latched and when it is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    /// Overwritten every frame from held state.
    Continuous,
    /// Latched on press, cleared after each tick.
    Trigger,
    /// Latched on press, cleared once per render frame.
    Mode,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::MoveForward,
        Action::MoveBack,
        Action::MoveLeft,
        Action::MoveRight,
        Action::Sprint,
        Action::Jump,
        Action::SpawnCube,
        Action::Respawn,
        Action::ToggleCameraMode,
        Action::ToggleDebugOverlay,
        Action::TogglePause,
    ];

    pub fn category(self) -> ActionCategory {
        match self {
            Action::MoveForward
            | Action::MoveBack
            | Action::MoveLeft
            | Action::MoveRight
            | Action::Sprint => ActionCategory::Continuous,
            Action::Jump | Action::SpawnCube | Action::Respawn => ActionCategory::Trigger,
            Action::ToggleCameraMode | Action::ToggleDebugOverlay | Action::TogglePause => {
                ActionCategory::Mode
            }
        }
    }
}

/// Action to control mapping. Several controls may drive one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings {
    map: BTreeMap<Action, Vec<Binding>>,
}

impl Default for Bindings {
    fn default() -> Self {
        use Binding::{Key as K, Mouse as M};
        let mut b = Self::empty();
        b.bind(Action::MoveForward, K(Key::W))
            .bind(Action::MoveForward, K(Key::Up))
            .bind(Action::MoveBack, K(Key::S))
            .bind(Action::MoveBack, K(Key::Down))
            .bind(Action::MoveLeft, K(Key::A))
            .bind(Action::MoveLeft, K(Key::Left))
            .bind(Action::MoveRight, K(Key::D))
            .bind(Action::MoveRight, K(Key::Right))
            .bind(Action::Sprint, K(Key::ShiftLeft))
            .bind(Action::Jump, K(Key::Space))
            .bind(Action::SpawnCube, K(Key::E))
            .bind(Action::SpawnCube, M(MouseButton::Left))
            .bind(Action::Respawn, K(Key::R))
            .bind(Action::ToggleCameraMode, K(Key::C))
            .bind(Action::ToggleDebugOverlay, K(Key::F1))
            .bind(Action::TogglePause, K(Key::P));
        b
    }
}

impl Bindings {
    pub fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, action: Action, binding: Binding) -> &mut Self {
        let controls = self.map.entry(action).or_default();
        if !controls.contains(&binding) {
            controls.push(binding);
        }
        self
    }

    pub fn unbind_all(&mut self, action: Action) {
        self.map.remove(&action);
    }

    pub fn controls(&self, action: Action) -> &[Binding] {
        self.map.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }
}
