use crate::PerspectiveCamera;
use glam::{DVec2, Vec3};
use std::f32::consts::{PI, TAU};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};

const POLAR_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    None,
    Rotate,
    Pan,
    Dolly,
    Touch(u64),
}

/// Mouse/touch orbiting around a target point.
///
/// Left drag rotates, right drag (or shift + left) pans, wheel and middle
/// drag dolly. Pointer deltas are measured in the same pixels as
/// [`OrbitControls::set_viewport_size`].
pub struct OrbitControls {
    pub target: Vec3,
    pub enabled: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    viewport: DVec2,
    gesture: Gesture,
    cursor: Option<DVec2>,
    shift: bool,
}

impl OrbitControls {
    /// Binds to `camera` and points it at the origin.
    pub fn new(camera: &mut PerspectiveCamera) -> Self {
        let controls = Self {
            target: Vec3::ZERO,
            enabled: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            viewport: DVec2::ONE,
            gesture: Gesture::None,
            cursor: None,
            shift: false,
        };
        controls.apply(camera, 0.0, 0.0, 1.0, Vec3::ZERO);
        controls
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport = DVec2::new(width.max(1) as f64, height.max(1) as f64);
    }

    pub fn distance(&self, camera: &PerspectiveCamera) -> f32 {
        (camera.position - self.target).length()
    }

    /// Orbits by a pointer delta in pixels.
    pub fn rotate(&self, camera: &mut PerspectiveCamera, dx: f64, dy: f64) {
        let h = self.viewport.y as f32;
        let left = TAU * dx as f32 / h * self.rotate_speed;
        let up = TAU * dy as f32 / h * self.rotate_speed;
        self.apply(camera, -left, -up, 1.0, Vec3::ZERO);
    }

    /// Moves target and camera together in the view plane.
    pub fn pan(&mut self, camera: &mut PerspectiveCamera, dx: f64, dy: f64) {
        let h = self.viewport.y as f32;
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (camera.fov_y_degrees.to_radians() / 2.0).tan();

        let forward = camera.forward();
        let right = forward.cross(camera.up).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward);

        let shift = (-right * (2.0 * dx as f32 * target_distance / h)
            + up * (2.0 * dy as f32 * target_distance / h))
            * self.pan_speed;

        self.target += shift;
        self.apply(camera, 0.0, 0.0, 1.0, shift);
    }

    /// Positive steps move towards the target.
    pub fn dolly(&self, camera: &mut PerspectiveCamera, steps: f32) {
        let scale = self.zoom_scale().powf(steps);
        self.apply(camera, 0.0, 0.0, scale, Vec3::ZERO);
    }

    fn zoom_scale(&self) -> f32 {
        0.95_f32.powf(self.zoom_speed)
    }

    /// Re-derives the camera position from spherical deltas around the target.
    fn apply(
        &self,
        camera: &mut PerspectiveCamera,
        d_theta: f32,
        d_phi: f32,
        scale: f32,
        pan: Vec3,
    ) {
        // `pan` has already been added to the target.
        let offset = camera.position + pan - self.target;
        let radius = offset.length();

        let (theta, phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        let theta = theta + d_theta;
        let phi = (phi + d_phi).clamp(POLAR_EPS, PI - POLAR_EPS);
        let radius = (radius * scale).clamp(self.min_distance, self.max_distance);

        let sin_phi = phi.sin();
        let offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );

        camera.position = self.target + offset;
        camera.look_at = self.target;
    }

    /// Feeds a window event through the controls. Returns `true` when the
    /// event was used.
    pub fn handle_window_event(
        &mut self,
        event: &WindowEvent,
        camera: &mut PerspectiveCamera,
    ) -> bool {
        if let WindowEvent::ModifiersChanged(modifiers) = event {
            self.shift = modifiers.state().shift_key();
            return false;
        }
        if !self.enabled {
            self.gesture = Gesture::None;
            return false;
        }

        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                if *state == ElementState::Released {
                    let was_active = self.gesture != Gesture::None;
                    self.gesture = Gesture::None;
                    return was_active;
                }
                self.gesture = match button {
                    MouseButton::Left if self.shift => Gesture::Pan,
                    MouseButton::Left => Gesture::Rotate,
                    MouseButton::Right => Gesture::Pan,
                    MouseButton::Middle => Gesture::Dolly,
                    _ => return false,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = DVec2::new(position.x, position.y);
                let prev = self.cursor.replace(pos);
                let Some(prev) = prev else {
                    return false;
                };
                let delta = pos - prev;
                match self.gesture {
                    Gesture::Rotate => self.rotate(camera, delta.x, delta.y),
                    Gesture::Pan => self.pan(camera, delta.x, delta.y),
                    Gesture::Dolly => {
                        if delta.y != 0.0 {
                            let steps = if delta.y > 0.0 { -1.0 } else { 1.0 };
                            self.dolly(camera, steps);
                        }
                    }
                    Gesture::None | Gesture::Touch(_) => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y as f64,
                    MouseScrollDelta::PixelDelta(p) => p.y,
                };
                if y == 0.0 {
                    return false;
                }
                self.dolly(camera, y.signum() as f32);
                true
            }
            WindowEvent::Touch(touch) => self.handle_touch(touch, camera),
            _ => false,
        }
    }

    fn handle_touch(&mut self, touch: &Touch, camera: &mut PerspectiveCamera) -> bool {
        let pos = DVec2::new(touch.location.x, touch.location.y);
        match touch.phase {
            TouchPhase::Started => {
                if self.gesture != Gesture::None {
                    return false;
                }
                self.gesture = Gesture::Touch(touch.id);
                self.cursor = Some(pos);
                true
            }
            TouchPhase::Moved => {
                if self.gesture != Gesture::Touch(touch.id) {
                    return false;
                }
                if let Some(prev) = self.cursor.replace(pos) {
                    let delta = pos - prev;
                    self.rotate(camera, delta.x, delta.y);
                }
                true
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if self.gesture != Gesture::Touch(touch.id) {
                    return false;
                }
                self.gesture = Gesture::None;
                self.cursor = None;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use winit::dpi::PhysicalPosition;
    use winit::event::{DeviceId, Modifiers};
    use winit::keyboard::ModifiersState;

    fn device() -> DeviceId {
        // SAFETY: only used to build synthetic events.
        unsafe { DeviceId::dummy() }
    }

    fn press(button: MouseButton) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button,
        }
    }

    fn release(button: MouseButton) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Released,
            button,
        }
    }

    fn cursor(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(x, y),
        }
    }

    fn wheel(lines: f32) -> WindowEvent {
        WindowEvent::MouseWheel {
            device_id: device(),
            delta: MouseScrollDelta::LineDelta(0.0, lines),
            phase: TouchPhase::Moved,
        }
    }

    fn touch(id: u64, phase: TouchPhase, x: f64, y: f64) -> WindowEvent {
        WindowEvent::Touch(Touch {
            device_id: device(),
            phase,
            location: PhysicalPosition::new(x, y),
            force: None,
            id,
        })
    }

    fn setup() -> (PerspectiveCamera, OrbitControls) {
        let mut cam = PerspectiveCamera::new(35.0, 800.0 / 600.0, 1.0, 3000.0);
        cam.position = Vec3::new(50.0, 100.0, 100.0);
        let mut controls = OrbitControls::new(&mut cam);
        controls.set_viewport_size(800, 600);
        (cam, controls)
    }

    #[test]
    fn new_points_camera_at_origin() {
        let (cam, controls) = setup();
        assert_eq!(cam.look_at, Vec3::ZERO);
        assert_relative_eq!(cam.position.x, 50.0, epsilon = 1e-3);
        assert_relative_eq!(cam.position.y, 100.0, epsilon = 1e-3);
        assert_relative_eq!(cam.position.z, 100.0, epsilon = 1e-3);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-3);
    }

    #[test]
    fn rotate_keeps_distance() {
        let (mut cam, controls) = setup();
        let before = cam.position;
        controls.rotate(&mut cam, 120.0, 0.0);
        assert!((cam.position - before).length() > 1.0);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);
        // horizontal drag keeps height
        assert_relative_eq!(cam.position.y, 100.0, epsilon = 1e-2);
    }

    #[test]
    fn full_height_drag_is_full_turn() {
        let (mut cam, controls) = setup();
        let before = cam.position;
        controls.rotate(&mut cam, 600.0, 0.0);
        assert_relative_eq!(cam.position.x, before.x, epsilon = 1e-2);
        assert_relative_eq!(cam.position.z, before.z, epsilon = 1e-2);
    }

    #[test]
    fn polar_angle_is_clamped() {
        let (mut cam, controls) = setup();
        controls.rotate(&mut cam, 0.0, 10_000.0);
        assert!(cam.position.y > 0.0);
        assert!(cam.position.x.abs() < 1e-2 && cam.position.z.abs() < 1e-2);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);
    }

    #[test]
    fn dolly_scales_distance() {
        let (mut cam, controls) = setup();
        controls.dolly(&mut cam, 1.0);
        assert_relative_eq!(controls.distance(&cam), 150.0 * 0.95, epsilon = 1e-2);
        controls.dolly(&mut cam, -1.0);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);
    }

    #[test]
    fn dolly_respects_limits() {
        let (mut cam, mut controls) = setup();
        controls.min_distance = 140.0;
        controls.dolly(&mut cam, 10.0);
        assert_relative_eq!(controls.distance(&cam), 140.0, epsilon = 1e-2);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let (mut cam, mut controls) = setup();
        let offset_before = cam.position - controls.target;
        controls.pan(&mut cam, 40.0, -25.0);
        assert!(controls.target.length() > 0.1);
        let offset_after = cam.position - controls.target;
        assert_relative_eq!(offset_before.x, offset_after.x, epsilon = 1e-2);
        assert_relative_eq!(offset_before.y, offset_after.y, epsilon = 1e-2);
        assert_relative_eq!(offset_before.z, offset_after.z, epsilon = 1e-2);
        assert_eq!(cam.look_at, controls.target);
    }

    #[test]
    fn left_drag_rotates_until_release() {
        let (mut cam, mut controls) = setup();

        assert!(!controls.handle_window_event(&cursor(100.0, 100.0), &mut cam));
        assert!(controls.handle_window_event(&press(MouseButton::Left), &mut cam));

        let before = cam.position;
        assert!(controls.handle_window_event(&cursor(220.0, 100.0), &mut cam));
        assert!((cam.position - before).length() > 1.0);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);

        assert!(controls.handle_window_event(&release(MouseButton::Left), &mut cam));
        let after_release = cam.position;
        assert!(!controls.handle_window_event(&cursor(300.0, 100.0), &mut cam));
        assert_eq!(cam.position, after_release);
    }

    #[test]
    fn release_without_gesture_is_not_consumed() {
        let (mut cam, mut controls) = setup();
        assert!(!controls.handle_window_event(&release(MouseButton::Left), &mut cam));
        assert!(!controls.handle_window_event(&press(MouseButton::Back), &mut cam));
    }

    #[test]
    fn shift_left_drag_pans() {
        let (mut cam, mut controls) = setup();
        let shift = WindowEvent::ModifiersChanged(Modifiers::from(ModifiersState::SHIFT));
        assert!(!controls.handle_window_event(&shift, &mut cam));

        controls.handle_window_event(&cursor(100.0, 100.0), &mut cam);
        controls.handle_window_event(&press(MouseButton::Left), &mut cam);
        assert!(controls.handle_window_event(&cursor(160.0, 80.0), &mut cam));

        assert!(controls.target.length() > 0.1);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);
        assert_eq!(cam.look_at, controls.target);
    }

    #[test]
    fn wheel_dollies_one_step() {
        let (mut cam, mut controls) = setup();
        assert!(controls.handle_window_event(&wheel(1.0), &mut cam));
        assert_relative_eq!(controls.distance(&cam), 150.0 * 0.95, epsilon = 1e-2);
        assert!(!controls.handle_window_event(&wheel(0.0), &mut cam));
    }

    #[test]
    fn single_touch_drag_rotates() {
        let (mut cam, mut controls) = setup();
        let before = cam.position;

        assert!(controls.handle_window_event(&touch(1, TouchPhase::Started, 10.0, 10.0), &mut cam));
        // a second finger does not take over
        assert!(
            !controls.handle_window_event(&touch(2, TouchPhase::Started, 50.0, 50.0), &mut cam)
        );
        assert!(controls.handle_window_event(&touch(1, TouchPhase::Moved, 130.0, 10.0), &mut cam));
        assert!((cam.position - before).length() > 1.0);
        assert_relative_eq!(controls.distance(&cam), 150.0, epsilon = 1e-2);

        assert!(controls.handle_window_event(&touch(1, TouchPhase::Ended, 130.0, 10.0), &mut cam));
        assert!(!controls.handle_window_event(&touch(1, TouchPhase::Moved, 200.0, 10.0), &mut cam));
    }

    #[test]
    fn disabled_controls_ignore_everything() {
        let (mut cam, mut controls) = setup();
        controls.enabled = false;
        let before = cam.position;

        for event in [
            cursor(100.0, 100.0),
            press(MouseButton::Left),
            cursor(300.0, 200.0),
            wheel(3.0),
            touch(1, TouchPhase::Started, 0.0, 0.0),
            touch(1, TouchPhase::Moved, 90.0, 0.0),
            release(MouseButton::Left),
        ] {
            assert!(!controls.handle_window_event(&event, &mut cam));
        }
        assert_eq!(cam.position, before);
    }
}
