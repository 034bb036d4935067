use std::collections::BTreeSet;

use glam::Vec2;

use crate::action::Binding;

/// Poll results from the platform input layer for the current frame.
pub trait InputDevice {
    /// Control is held right now.
    fn is_down(&self, binding: Binding) -> bool;
    /// Control went down at least once since the previous poll.
    fn was_pressed(&self, binding: Binding) -> bool;
    /// Pointer motion accumulated since the previous poll.
    fn mouse_delta(&self) -> Vec2;
}

/// In-memory device driven by code: headless runs, replays and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    held: BTreeSet<Binding>,
    pressed: BTreeSet<Binding>,
    mouse_delta: Vec2,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a control down; registers a press edge if it was up.
    pub fn press(&mut self, binding: Binding) {
        if self.held.insert(binding) {
            self.pressed.insert(binding);
        }
    }

    pub fn release(&mut self, binding: Binding) {
        self.held.remove(&binding);
    }

    /// Press and release within the same poll window.
    pub fn tap(&mut self, binding: Binding) {
        self.pressed.insert(binding);
    }

    pub fn move_mouse(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    /// Forget edges and motion once a frame has been collected.
    pub fn end_poll(&mut self) {
        self.pressed.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

impl InputDevice for ScriptedDevice {
    fn is_down(&self, binding: Binding) -> bool {
        self.held.contains(&binding)
    }

    fn was_pressed(&self, binding: Binding) -> bool {
        self.pressed.contains(&binding)
    }

    fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }
}
