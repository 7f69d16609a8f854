//! Pointer/keyboard handling for the video controls.
//!
//! | input        | effect                         |
//! |--------------|--------------------------------|
//! | drag         | translate                      |
//! | `R` + drag   | rotate                         |
//! | wheel        | scale                          |
//! | `1` `2` `3`  | filter none / pixelate / gray  |
//! | `C`          | toggle CPU / GPU processing    |
//! | `Space`      | reset transform                |
//! | `P`          | print stats                    |
//! | `Escape`     | exit                           |

use camquad_engine::input::{
    InputEvent, Key, KeyState, MouseButton, MouseButtonState, PointerButtonEvent, PointerMoveEvent,
};
use glam::Vec2;

use crate::state::{AppContext, DragMode, FilterMode};

/// Degrees of rotation per pixel of horizontal drag.
const ROTATE_DEG_PER_PX: f32 = 0.5;
/// Scale change per wheel line.
const SCALE_PER_LINE: f32 = 0.1;

/// Requests that reach past the interaction state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    PrintStats,
}

/// Turns input events into [`AppContext`] mutations.
#[derive(Debug)]
pub struct InteractionController {
    rotate_held: bool,
    last_pointer: Option<Vec2>,
    window_size: Vec2,
}

impl InteractionController {
    pub const ROTATE_KEY: Key = Key::R;

    /// `width`/`height` are the window's logical size, the space pointer events use.
    pub fn new(width: f32, height: f32) -> Self {
        let mut controller = Self {
            rotate_held: false,
            last_pointer: None,
            window_size: Vec2::ONE,
        };
        controller.set_window_size(width, height);
        controller
    }

    pub fn set_window_size(&mut self, width: f32, height: f32) {
        self.window_size = Vec2::new(width, height).max(Vec2::ONE);
    }

    #[inline]
    pub fn rotate_held(&self) -> bool {
        self.rotate_held
    }

    /// Applies one event to `app`.
    pub fn handle(&mut self, event: &InputEvent, app: &mut AppContext) -> Option<Command> {
        match event {
            InputEvent::Key { key, state, repeat, .. } => self.on_key(*key, *state, *repeat, app),

            InputEvent::PointerButton(PointerButtonEvent { button: MouseButton::Left, state, x, y, .. }) => {
                let pos = Vec2::new(*x, *y);
                self.last_pointer = Some(pos);
                app.transform.set_mode(match state {
                    MouseButtonState::Pressed => DragMode::Dragging,
                    MouseButtonState::Released => DragMode::Idle,
                });
                None
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                let pos = Vec2::new(*x, *y);
                if app.transform.mode() == DragMode::Dragging {
                    if let Some(last) = self.last_pointer {
                        self.drag(pos - last, app);
                    }
                }
                self.last_pointer = Some(pos);
                None
            }

            InputEvent::MouseWheel { delta, .. } => {
                app.transform.adjust_scale(delta.lines_y() * SCALE_PER_LINE);
                None
            }

            InputEvent::Focused(false) => {
                // Key-up is not delivered while unfocused.
                self.rotate_held = false;
                None
            }

            _ => None,
        }
    }

    fn drag(&self, delta: Vec2, app: &mut AppContext) {
        if self.rotate_held {
            app.transform.rotate(delta.x * ROTATE_DEG_PER_PX);
        } else {
            app.transform.translate(Vec2::new(
                delta.x / self.window_size.x * 2.0,
                -delta.y / self.window_size.y * 2.0,
            ));
        }
    }

    fn on_key(&mut self, key: Key, state: KeyState, repeat: bool, app: &mut AppContext) -> Option<Command> {
        if key == Self::ROTATE_KEY {
            self.rotate_held = state == KeyState::Pressed;
            return None;
        }
        if state != KeyState::Pressed || repeat {
            return None;
        }

        match key {
            Key::Digit1 => set_filter(app, FilterMode::None),
            Key::Digit2 => set_filter(app, FilterMode::Pixelate),
            Key::Digit3 => set_filter(app, FilterMode::Grayscale),
            Key::C => {
                app.processing = app.processing.toggled();
                log::info!("processing mode: {}", app.processing);
            }
            Key::Space => {
                app.transform.reset();
                log::info!("transform reset");
            }
            Key::P => return Some(Command::PrintStats),
            Key::Escape => return Some(Command::Exit),
            _ => {}
        }
        None
    }
}

fn set_filter(app: &mut AppContext, filter: FilterMode) {
    if app.filter != filter {
        log::info!("filter: {filter}");
    }
    app.filter = filter;
}
