use nalgebra::Vector2;
use winit::event::{ElementState, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};
use winit::window::{CursorGrabMode, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
}

impl Key {
    fn slot(self) -> usize {
        match self {
            Key::W => 0,
            Key::A => 1,
            Key::S => 2,
            Key::D => 3,
            Key::Q => 4,
            Key::E => 5,
        }
    }

    fn from_virtual(key: VirtualKeyCode) -> Option<Self> {
        match key {
            VirtualKeyCode::W => Some(Key::W),
            VirtualKeyCode::A => Some(Key::A),
            VirtualKeyCode::S => Some(Key::S),
            VirtualKeyCode::D => Some(Key::D),
            VirtualKeyCode::Q => Some(Key::Q),
            VirtualKeyCode::E => Some(Key::E),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    Normal,
    Locked,
}

impl CursorMode {
    /// Applies the mode to a window. Platforms without cursor locking fall back to confinement.
    pub fn apply(self, window: &Window) {
        match self {
            CursorMode::Normal => {
                if let Err(error) = window.set_cursor_grab(CursorGrabMode::None) {
                    log::warn!("could not release cursor: {error}");
                }
                window.set_cursor_visible(true);
            }
            CursorMode::Locked => {
                let grabbed = window
                    .set_cursor_grab(CursorGrabMode::Locked)
                    .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
                if let Err(error) = grabbed {
                    log::warn!("could not grab cursor: {error}");
                }
                window.set_cursor_visible(false);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: [bool; 6],
    look: bool,
    pointer: Vector2<f32>,
    cursor_mode: CursorMode,
}

impl InputState {
    /// Feeds a window event; returns true when the event was relevant to the camera.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.move_pointer(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.set_look(matches!(state, ElementState::Pressed));
                true
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => match Key::from_virtual(*key) {
                Some(key) => {
                    match state {
                        ElementState::Pressed => self.press(key),
                        ElementState::Released => self.release(key),
                    }
                    true
                }
                None => false,
            },
            WindowEvent::Focused(false) => {
                self.keys = [false; 6];
                self.look = false;
                true
            }
            _ => false,
        }
    }

    pub fn press(&mut self, key: Key) {
        self.keys[key.slot()] = true;
    }

    pub fn release(&mut self, key: Key) {
        self.keys[key.slot()] = false;
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys[key.slot()]
    }

    pub fn move_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Vector2::new(x, y);
    }

    pub fn pointer(&self) -> Vector2<f32> {
        self.pointer
    }

    pub fn set_look(&mut self, held: bool) {
        self.look = held;
    }

    pub fn is_look_held(&self) -> bool {
        self.look
    }

    pub fn request_cursor_mode(&mut self, mode: CursorMode) {
        self.cursor_mode = mode;
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::{DeviceId, ModifiersState};

    #[test]
    fn test_key_state() {
        let mut input = InputState::default();
        assert!(!input.is_key_down(Key::W));
        input.press(Key::W);
        input.press(Key::Q);
        assert!(input.is_key_down(Key::W));
        assert!(input.is_key_down(Key::Q));
        input.release(Key::W);
        assert!(!input.is_key_down(Key::W));
        assert!(input.is_key_down(Key::Q));
    }

    #[test]
    #[allow(deprecated)]
    fn test_window_events() {
        let device_id = unsafe { DeviceId::dummy() };
        let mut input = InputState::default();

        let moved = WindowEvent::CursorMoved {
            device_id,
            position: PhysicalPosition::new(12.0, 34.0),
            modifiers: ModifiersState::empty(),
        };
        assert!(input.handle_event(&moved));
        assert_eq!(input.pointer(), Vector2::new(12.0, 34.0));

        let look = WindowEvent::MouseInput {
            device_id,
            state: ElementState::Pressed,
            button: MouseButton::Right,
            modifiers: ModifiersState::empty(),
        };
        assert!(input.handle_event(&look));
        assert!(input.is_look_held());

        let key = WindowEvent::KeyboardInput {
            device_id,
            input: KeyboardInput {
                scancode: 0,
                state: ElementState::Pressed,
                virtual_keycode: Some(VirtualKeyCode::D),
                modifiers: ModifiersState::empty(),
            },
            is_synthetic: false,
        };
        assert!(input.handle_event(&key));
        assert!(input.is_key_down(Key::D));

        let other = WindowEvent::KeyboardInput {
            device_id,
            input: KeyboardInput {
                scancode: 0,
                state: ElementState::Pressed,
                virtual_keycode: Some(VirtualKeyCode::Z),
                modifiers: ModifiersState::empty(),
            },
            is_synthetic: false,
        };
        assert!(!input.handle_event(&other));

        assert!(input.handle_event(&WindowEvent::Focused(false)));
        assert!(!input.is_key_down(Key::D));
        assert!(!input.is_look_held());
    }
}
