use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Wheel angle reported for one notch of a line-based mouse wheel, in
/// eighths of a degree
const ANGLE_PER_LINE: f32 = 120.0;

#[derive(Default)]
pub struct InputState {
    pub mouse_curr_pos: Vec2,
    pub mouse_prev_pos: Vec2,
    pub mouse_wheel_angle_delta: f32,

    pub mouse_left_just_pressed: bool,
    pub mouse_left_just_released: bool,
    pub mouse_left_down: bool,
}

impl InputState {
    pub fn process_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => {
                        self.mouse_left_just_pressed = true;
                        self.mouse_left_just_released = false;
                        self.mouse_left_down = true;
                    }
                    ElementState::Released => {
                        self.mouse_left_just_pressed = false;
                        self.mouse_left_just_released = true;
                        self.mouse_left_down = false;
                    }
                }
            }
            WindowEvent::CursorMoved {
                position,
                ..
            } => {
                self.mouse_prev_pos = self.mouse_curr_pos;
                self.mouse_curr_pos = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseWheel {
                delta,
                ..
            } => {
                self.mouse_wheel_angle_delta += match delta {
                    MouseScrollDelta::LineDelta(_x, y) => y * ANGLE_PER_LINE,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
            }
            WindowEvent::CursorLeft { .. } => {
                // A release outside the window is never reported
                self.mouse_left_just_released = self.mouse_left_down;
                self.mouse_left_down = false;
            }
            _ => {}
        }
    }

    /// Reset the input states for the next event.
    pub fn reset_frame(&mut self) {
        self.mouse_wheel_angle_delta = 0.0;
        self.mouse_prev_pos = self.mouse_curr_pos;
        self.mouse_left_just_pressed = false;
        self.mouse_left_just_released = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::{DeviceId, TouchPhase};

    fn device_id() -> DeviceId {
        unsafe { DeviceId::dummy() }
    }

    fn left(state: ElementState) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device_id(),
            state,
            button: MouseButton::Left,
        }
    }

    #[test]
    fn left_button_press_and_release_are_tracked() {
        let mut input = InputState::default();

        input.process_window_events(&left(ElementState::Pressed));
        assert!(input.mouse_left_down && input.mouse_left_just_pressed);

        input.reset_frame();
        input.process_window_events(&left(ElementState::Released));
        assert!(!input.mouse_left_down);
        assert!(input.mouse_left_just_released);
        assert!(!input.mouse_left_just_pressed);
    }

    #[test]
    fn wheel_lines_and_pixels_share_one_scale() {
        let mut input = InputState::default();
        let wheel = |delta| WindowEvent::MouseWheel {
            device_id: device_id(),
            delta,
            phase: TouchPhase::Moved,
        };

        input.process_window_events(&wheel(MouseScrollDelta::LineDelta(0.0, 1.0)));
        input.process_window_events(&wheel(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -20.0))));

        assert_eq!(input.mouse_wheel_angle_delta, 100.0);
        input.reset_frame();
        assert_eq!(input.mouse_wheel_angle_delta, 0.0);
    }

    #[test]
    fn leaving_the_window_ends_a_drag() {
        let mut input = InputState::default();
        input.process_window_events(&WindowEvent::CursorMoved {
            device_id: device_id(),
            position: PhysicalPosition::new(10.0, 20.0),
        });
        input.process_window_events(&left(ElementState::Pressed));
        input.reset_frame();

        input.process_window_events(&WindowEvent::CursorLeft { device_id: device_id() });

        assert!(input.mouse_left_just_released);
        assert!(!input.mouse_left_down);
        assert_eq!(input.mouse_curr_pos, Vec2::new(10.0, 20.0));
    }
}
