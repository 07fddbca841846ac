/*
 * In-memory `WindowSystem` used on non-Windows builds and by the test
 * suite. Keeps just enough per-window state (parent, bounds, visibility,
 * window-procedure identity, probe behavior) to exercise the reparenting,
 * placeholder-window, and subclass-reconciliation paths, and journals the
 * reparent/dispatch traffic so tests can assert on protocol order.
 */

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{AxError, Result as AxResult};
use crate::types::{InputMessage, Modifiers, Rect};
use crate::window_system::{WindowHandle, WindowSystem, WndProcId};

#[derive(Debug, Clone)]
struct StubWindow {
    parent: WindowHandle,
    bounds: Rect,
    visible: bool,
    proc_id: WndProcId,
    answers_probe: bool,
}

#[derive(Debug, Default)]
pub struct StubWindowSystem {
    windows: RefCell<HashMap<WindowHandle, StubWindow>>,
    next_handle: RefCell<usize>,
    modifiers: RefCell<Modifiers>,
    journal: RefCell<Vec<String>>,
    dispatched: RefCell<Vec<InputMessage>>,
}

impl StubWindowSystem {
    pub fn new() -> Self {
        Self {
            next_handle: RefCell::new(1),
            ..Self::default()
        }
    }

    pub fn new_window(&self) -> WindowHandle {
        let mut next = self.next_handle.borrow_mut();
        let handle = WindowHandle(*next);
        *next += 1;
        self.windows.borrow_mut().insert(
            handle,
            StubWindow {
                parent: WindowHandle::INVALID,
                bounds: Rect::default(),
                visible: false,
                proc_id: WndProcId(handle.0 | 0x1000_0000),
                answers_probe: true,
            },
        );
        handle
    }

    pub fn set_modifiers(&self, modifiers: Modifiers) {
        *self.modifiers.borrow_mut() = modifiers;
    }

    /// Simulate a foreign layer stealing the subclass chain.
    pub fn hijack_subclass(&self, window: WindowHandle, proc_id: WndProcId, answers_probe: bool) {
        if let Some(win) = self.windows.borrow_mut().get_mut(&window) {
            win.proc_id = proc_id;
            win.answers_probe = answers_probe;
        }
    }

    pub fn parent_of(&self, window: WindowHandle) -> Option<WindowHandle> {
        self.windows.borrow().get(&window).map(|w| w.parent)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    pub fn dispatched_messages(&self) -> Vec<InputMessage> {
        self.dispatched.borrow().clone()
    }

    fn record(&self, entry: String) {
        self.journal.borrow_mut().push(entry);
    }
}

impl WindowSystem for StubWindowSystem {
    fn window_proc(&self, window: WindowHandle) -> Option<WndProcId> {
        self.windows.borrow().get(&window).map(|w| w.proc_id)
    }

    fn set_window_proc(&self, window: WindowHandle, proc_id: WndProcId) -> Option<WndProcId> {
        let mut windows = self.windows.borrow_mut();
        let win = windows.get_mut(&window)?;
        let previous = win.proc_id;
        win.proc_id = proc_id;
        Some(previous)
    }

    fn probe_subclass(&self, window: WindowHandle) -> bool {
        self.windows
            .borrow()
            .get(&window)
            .is_some_and(|w| w.answers_probe)
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        self.windows.borrow().contains_key(&window)
    }

    fn create_placeholder_window(&self, parent: WindowHandle) -> AxResult<WindowHandle> {
        let handle = self.new_window();
        if !parent.is_invalid() {
            self.set_parent(handle, parent)?;
        }
        self.record(format!("placeholder:{}", handle.0));
        Ok(handle)
    }

    fn destroy_window(&self, window: WindowHandle) {
        self.windows.borrow_mut().remove(&window);
        self.record(format!("destroy:{}", window.0));
    }

    fn set_parent(&self, child: WindowHandle, parent: WindowHandle) -> AxResult<WindowHandle> {
        let mut windows = self.windows.borrow_mut();
        if !parent.is_invalid() && !windows.contains_key(&parent) {
            return Err(AxError::NoWindow(format!(
                "reparent target {} does not exist",
                parent.0
            )));
        }
        let win = windows
            .get_mut(&child)
            .ok_or_else(|| AxError::NoWindow(format!("window {} does not exist", child.0)))?;
        let previous = win.parent;
        win.parent = parent;
        drop(windows);
        self.record(format!("reparent:{}->{}", child.0, parent.0));
        Ok(previous)
    }

    fn window_bounds(&self, window: WindowHandle) -> Option<Rect> {
        self.windows.borrow().get(&window).map(|w| w.bounds)
    }

    fn set_window_bounds(&self, window: WindowHandle, bounds: Rect) -> AxResult<()> {
        let mut windows = self.windows.borrow_mut();
        let win = windows
            .get_mut(&window)
            .ok_or_else(|| AxError::NoWindow(format!("window {} does not exist", window.0)))?;
        win.bounds = bounds;
        Ok(())
    }

    fn show_window(&self, window: WindowHandle, visible: bool) {
        if let Some(win) = self.windows.borrow_mut().get_mut(&window) {
            win.visible = visible;
        }
    }

    fn focus_window(&self, window: WindowHandle) {
        self.record(format!("focus:{}", window.0));
    }

    fn modifier_state(&self) -> Modifiers {
        *self.modifiers.borrow()
    }

    fn translate_and_dispatch(&self, message: &InputMessage) {
        self.dispatched.borrow_mut().push(*message);
    }
}
