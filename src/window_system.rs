/*
 * The crate's boundary to the raw windowing surface. Both engines reparent,
 * probe, and resize native windows only through the `WindowSystem` trait so
 * the protocol logic stays portable; `window_win32` supplies the real
 * implementation on Windows and `window_stub` an in-memory one everywhere
 * else (and for the test suite).
 */

use crate::error::Result as AxResult;
use crate::types::{Modifiers, Rect};

/// Opaque native window handle. Zero is the reserved invalid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    pub const INVALID: WindowHandle = WindowHandle(0);

    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl Default for WindowHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Identity of a window procedure, compared to detect foreign resubclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WndProcId(pub usize);

pub trait WindowSystem {
    /// Current window-procedure identity, or `None` for a dead handle.
    fn window_proc(&self, window: WindowHandle) -> Option<WndProcId>;

    /// Install a window procedure, returning the previous one.
    fn set_window_proc(&self, window: WindowHandle, proc_id: WndProcId) -> Option<WndProcId>;

    /// Ask the window whether our subclass still answers its registration
    /// probe message. A well-behaved wrapping subclass forwards it.
    fn probe_subclass(&self, window: WindowHandle) -> bool;

    fn is_window(&self, window: WindowHandle) -> bool;

    /// Create the invisible placeholder window used when a component refuses
    /// to surface a window of its own.
    fn create_placeholder_window(&self, parent: WindowHandle) -> AxResult<WindowHandle>;

    fn destroy_window(&self, window: WindowHandle);

    /// Reparent `child` under `parent`, returning the previous parent.
    fn set_parent(&self, child: WindowHandle, parent: WindowHandle) -> AxResult<WindowHandle>;

    fn window_bounds(&self, window: WindowHandle) -> Option<Rect>;

    fn set_window_bounds(&self, window: WindowHandle, bounds: Rect) -> AxResult<()>;

    fn show_window(&self, window: WindowHandle, visible: bool);

    fn focus_window(&self, window: WindowHandle);

    /// Sample the live modifier-key state for accelerator forwarding.
    fn modifier_state(&self) -> Modifiers;

    /// Run a local translate+dispatch cycle for a message the focused widget
    /// claimed with `PreProcessResult::NeedsDispatch`.
    fn translate_and_dispatch(&self, message: &crate::types::InputMessage);
}
