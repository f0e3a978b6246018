use std::collections::HashSet;

use glam::{Vec2, Vec3};
use winit::keyboard::KeyCode;

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    pub mouse_delta: Vec2,
    pub left_click: bool,
    pub right_click: bool,
}

impl InputState {
    pub fn press_key(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn add_mouse_delta(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn consume_left_click(&mut self) -> bool {
        let value = self.left_click;
        self.left_click = false;
        value
    }

    pub fn consume_right_click(&mut self) -> bool {
        let value = self.right_click;
        self.right_click = false;
        value
    }

    /// `[right, up, forward]` for `Camera::camera_translation`. The horizontal
    /// part has unit length whenever any of WASD is held.
    pub fn movement_input(&self) -> Vec3 {
        let horizontal = Vec2::new(
            self.axis(KeyCode::KeyD, KeyCode::KeyA),
            self.axis(KeyCode::KeyW, KeyCode::KeyS),
        )
        .normalize_or_zero();
        Vec3::new(
            horizontal.x,
            self.axis(KeyCode::Space, KeyCode::ShiftLeft),
            horizontal.y,
        )
    }

    /// Yaw and pitch deltas for this frame's mouse motion. Moving the mouse
    /// right turns right, moving it down looks down.
    pub fn look_delta(&self, sensitivity: f32) -> (f32, f32) {
        (
            -self.mouse_delta.x * sensitivity,
            -self.mouse_delta.y * sensitivity,
        )
    }

    fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        f32::from(u8::from(self.is_pressed(positive))) - f32::from(u8::from(self.is_pressed(negative)))
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use winit::keyboard::KeyCode;

    use super::InputState;

    #[test]
    fn opposing_keys_cancel() {
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);
        input.press_key(KeyCode::KeyD);
        input.press_key(KeyCode::Space);
        input.press_key(KeyCode::ShiftLeft);
        assert_eq!(input.movement_input().y, 0.0);

        input.release_key(KeyCode::KeyD);
        input.release_key(KeyCode::Space);
        assert_eq!(input.movement_input(), Vec3::new(0.0, -1.0, 1.0));

        input.press_key(KeyCode::KeyS);
        assert_eq!(input.movement_input(), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn diagonal_movement_is_no_faster() {
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);
        let straight = input.movement_input();
        input.press_key(KeyCode::KeyD);
        let diagonal = input.movement_input();

        assert!((diagonal.length() - straight.length()).abs() < 1e-6);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((diagonal - Vec3::new(half, 0.0, half)).length() < 1e-6);

        // Vertical input is not folded into the horizontal speed.
        input.press_key(KeyCode::Space);
        assert!((input.movement_input() - Vec3::new(half, 1.0, half)).length() < 1e-6);
    }

    #[test]
    fn look_delta_is_cleared_each_frame() {
        let mut input = InputState::default();
        input.add_mouse_delta(Vec2::new(10.0, -5.0));
        input.add_mouse_delta(Vec2::new(10.0, 0.0));
        let (yaw, pitch) = input.look_delta(0.002);
        assert!((yaw + 0.04).abs() < 1e-6);
        assert!((pitch - 0.01).abs() < 1e-6);

        input.clear_frame();
        assert_eq!(input.look_delta(0.002), (0.0, 0.0));
    }

    #[test]
    fn clicks_are_consumed_once() {
        let mut input = InputState::default();
        input.left_click = true;
        assert!(input.consume_left_click());
        assert!(!input.consume_left_click());
        assert!(!input.consume_right_click());
    }
}
