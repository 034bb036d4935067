use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::action::{Action, ActionCategory, Bindings};
use crate::device::InputDevice;

/// Latched input as seen by the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    // Continuous: overwritten every collect.
    pub move_x: f32,
    pub move_z: f32,
    pub look_delta: Vec2,
    pub sprint: bool,

    // Gameplay triggers: cleared by `consume_triggers`.
    pub jump: bool,
    pub spawn_cube: bool,
    pub respawn: bool,

    // Mode toggles: cleared by `consume_mode_inputs`.
    pub toggle_camera_mode: bool,
    pub toggle_debug_overlay: bool,
    pub toggle_pause: bool,
}

impl InputState {
    /// Planar movement request, x right and z forward, length at most 1.
    pub fn move_vector(&self) -> Vec2 {
        Vec2::new(self.move_x, self.move_z)
    }

    pub fn has_move_input(&self) -> bool {
        self.move_vector().length_squared() > 1e-6
    }

    pub fn any_trigger(&self) -> bool {
        self.any_latched(ActionCategory::Trigger)
    }

    pub fn any_mode_input(&self) -> bool {
        self.any_latched(ActionCategory::Mode)
    }

    /// Whether a press of `action` is currently latched. Always false for
    /// continuous actions, which are not latched.
    pub fn is_latched(&self, action: Action) -> bool {
        match action {
            Action::Jump => self.jump,
            Action::SpawnCube => self.spawn_cube,
            Action::Respawn => self.respawn,
            Action::ToggleCameraMode => self.toggle_camera_mode,
            Action::ToggleDebugOverlay => self.toggle_debug_overlay,
            Action::TogglePause => self.toggle_pause,
            _ => false,
        }
    }

    fn latched_mut(&mut self, action: Action) -> Option<&mut bool> {
        match action {
            Action::Jump => Some(&mut self.jump),
            Action::SpawnCube => Some(&mut self.spawn_cube),
            Action::Respawn => Some(&mut self.respawn),
            Action::ToggleCameraMode => Some(&mut self.toggle_camera_mode),
            Action::ToggleDebugOverlay => Some(&mut self.toggle_debug_overlay),
            Action::TogglePause => Some(&mut self.toggle_pause),
            _ => None,
        }
    }

    fn any_latched(&self, category: ActionCategory) -> bool {
        Action::ALL
            .into_iter()
            .any(|a| a.category() == category && self.is_latched(a))
    }

    fn clear(&mut self, category: ActionCategory) {
        for action in Action::ALL.into_iter().filter(|a| a.category() == category) {
            if let Some(flag) = self.latched_mut(action) {
                *flag = false;
            }
        }
    }
}

/// Two-phase buffer between device polling and the fixed tick.
///
/// `collect` runs once per render frame; the simulation then runs zero or
/// more ticks, each reading the state and calling `consume_triggers`. Mode
/// toggles are consumed once per render frame regardless of tick count. A
/// press in a frame that runs zero ticks therefore survives to the next
/// frame that does.
#[derive(Debug, Clone, Default)]
pub struct InputLatch {
    state: InputState,
    bindings: Bindings,
    frames_collected: u64,
}

impl InputLatch {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            state: InputState::default(),
            bindings,
            frames_collected: 0,
        }
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn set_bindings(&mut self, bindings: Bindings) {
        self.bindings = bindings;
    }

    pub fn frames_collected(&self) -> u64 {
        self.frames_collected
    }

    /// Sample the device for this render frame.
    pub fn collect(&mut self, device: &dyn InputDevice) {
        let held = |action| self.is_down(device, action);
        let axis = |pos, neg| f32::from(u8::from(held(pos))) - f32::from(u8::from(held(neg)));

        let mut movement = Vec2::new(
            axis(Action::MoveRight, Action::MoveLeft),
            axis(Action::MoveForward, Action::MoveBack),
        );
        if movement.length_squared() > 1.0 {
            movement = movement.normalize();
        }
        let sprint = held(Action::Sprint);

        let pressed: Vec<Action> = Action::ALL
            .into_iter()
            .filter(|a| a.category() != ActionCategory::Continuous)
            .filter(|&a| self.was_pressed(device, a))
            .collect();

        let s = &mut self.state;
        s.move_x = movement.x;
        s.move_z = movement.y;
        s.look_delta = device.mouse_delta();
        s.sprint = sprint;
        for action in pressed {
            if let Some(flag) = s.latched_mut(action) {
                *flag = true;
            }
        }

        self.frames_collected += 1;
        trace!(frame = self.frames_collected, state = ?self.state, "input collected");
    }

    /// Clear gameplay triggers. Called once per executed tick.
    pub fn consume_triggers(&mut self) {
        self.state.clear(ActionCategory::Trigger);
    }

    /// Clear mode toggles, returning what was latched. Called once per
    /// render frame.
    pub fn consume_mode_inputs(&mut self) -> InputState {
        let latched = self.state;
        self.state.clear(ActionCategory::Mode);
        latched
    }

    fn is_down(&self, device: &dyn InputDevice, action: Action) -> bool {
        self.bindings
            .controls(action)
            .iter()
            .any(|&b| device.is_down(b))
    }

    fn was_pressed(&self, device: &dyn InputDevice, action: Action) -> bool {
        self.bindings
            .controls(action)
            .iter()
            .any(|&b| device.was_pressed(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Binding, Key, MouseButton};
    use crate::device::ScriptedDevice;

    fn key(k: Key) -> Binding {
        Binding::Key(k)
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.press(key(Key::A));
        dev.press(key(Key::D));
        dev.press(key(Key::W));
        latch.collect(&dev);
        assert_eq!(latch.state().move_x, 0.0);
        assert_eq!(latch.state().move_z, 1.0);
    }

    #[test]
    fn diagonal_is_normalized() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.press(key(Key::W));
        dev.press(key(Key::D));
        latch.collect(&dev);
        let len = latch.state().move_vector().length();
        assert!((len - 1.0).abs() < 1e-6);
        assert!(latch.state().move_x > 0.0 && latch.state().move_z > 0.0);
    }

    #[test]
    fn continuous_fields_are_overwritten() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.press(key(Key::W));
        dev.press(key(Key::ShiftLeft));
        dev.move_mouse(Vec2::new(3.0, -1.0));
        latch.collect(&dev);
        assert!(latch.state().sprint);
        assert_eq!(latch.state().look_delta, Vec2::new(3.0, -1.0));

        dev.end_poll();
        dev.release(key(Key::W));
        dev.release(key(Key::ShiftLeft));
        latch.collect(&dev);
        assert!(!latch.state().has_move_input());
        assert!(!latch.state().sprint);
        assert_eq!(latch.state().look_delta, Vec2::ZERO);
    }

    #[test]
    fn triggers_survive_frames_without_ticks() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.tap(key(Key::Space));
        latch.collect(&dev);
        dev.end_poll();

        // Two frames where no tick ran: nothing consumed the trigger.
        latch.consume_mode_inputs();
        latch.collect(&dev);
        latch.consume_mode_inputs();
        assert!(latch.state().jump);

        // Several ticks in one frame: visible to the first, gone after.
        assert!(latch.state().jump);
        latch.consume_triggers();
        assert!(!latch.state().jump);
        latch.consume_triggers();
        assert!(!latch.state().jump);
    }

    #[test]
    fn collect_never_clears_a_latched_flag() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.tap(key(Key::R));
        dev.tap(Binding::Mouse(MouseButton::Left));
        latch.collect(&dev);
        dev.end_poll();
        latch.collect(&dev);
        assert!(latch.state().respawn);
        assert!(latch.state().spawn_cube);
    }

    #[test]
    fn consumption_does_not_cross_contaminate() {
        let mut latch = InputLatch::default();
        let mut dev = ScriptedDevice::new();
        dev.tap(key(Key::Space));
        dev.tap(key(Key::E));
        dev.tap(key(Key::C));
        dev.tap(key(Key::F1));
        dev.tap(key(Key::P));
        latch.collect(&dev);

        latch.consume_triggers();
        let s = *latch.state();
        assert!(!s.any_trigger());
        assert!(s.toggle_camera_mode && s.toggle_debug_overlay && s.toggle_pause);

        let mut latch = InputLatch::default();
        latch.collect(&dev);
        let seen = latch.consume_mode_inputs();
        assert!(seen.toggle_pause);
        let s = *latch.state();
        assert!(!s.any_mode_input());
        assert!(s.jump && s.spawn_cube);
    }

    #[test]
    fn each_latched_action_is_cleared_by_its_own_category() {
        for action in Action::ALL {
            let mut bindings = Bindings::empty();
            bindings.bind(action, key(Key::F2));
            let mut dev = ScriptedDevice::new();
            dev.tap(key(Key::F2));

            let mut latch = InputLatch::new(bindings.clone());
            latch.collect(&dev);
            let latched = latch.state().is_latched(action);
            assert_eq!(latched, action.category() != ActionCategory::Continuous, "{action:?}");

            latch.consume_triggers();
            let after_tick = latch.state().is_latched(action);
            let mut latch = InputLatch::new(bindings);
            latch.collect(&dev);
            latch.consume_mode_inputs();
            let after_frame = latch.state().is_latched(action);

            match action.category() {
                ActionCategory::Continuous => assert!(!after_tick && !after_frame),
                ActionCategory::Trigger => assert!(!after_tick && after_frame, "{action:?}"),
                ActionCategory::Mode => assert!(after_tick && !after_frame, "{action:?}"),
            }
        }
    }

    #[test]
    fn custom_bindings_are_honoured() {
        let mut bindings = Bindings::empty();
        bindings.bind(Action::Jump, key(Key::W));
        let mut latch = InputLatch::new(bindings);
        let mut dev = ScriptedDevice::new();
        dev.press(key(Key::W));
        latch.collect(&dev);
        assert!(latch.state().jump);
        assert!(!latch.state().has_move_input());
        assert_eq!(latch.frames_collected(), 1);
    }
}
