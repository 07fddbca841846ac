/*
 * Win32-backed `WindowSystem`. This is the only module that touches the
 * `windows` crate; everything protocol-shaped stays in the portable core.
 *
 * Subclass probing uses a registered window message: our window procedure
 * answers it with a fixed magic value, so after a foreign layer resubclasses
 * a component window we can tell whether our subclass still participates in
 * the chain.
 */

use crate::error::{AxError, Result as AxResult};
use crate::types::{InputKind, InputMessage, Modifiers, Rect};
use crate::window_system::{WindowHandle, WindowSystem, WndProcId};

use windows::{
    Win32::{
        Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM},
        UI::Input::KeyboardAndMouse::{GetKeyState, SetFocus, VK_CONTROL, VK_MENU, VK_SHIFT},
        UI::WindowsAndMessaging::{
            CreateWindowExW, DestroyWindow, DispatchMessageW, GWLP_WNDPROC, GetWindowLongPtrW,
            GetWindowRect, HMENU, IsWindow, MSG, RegisterWindowMessageW, SW_HIDE, SW_SHOW,
            SWP_NOACTIVATE, SWP_NOZORDER, SendMessageW, SetParent, SetWindowLongPtrW,
            SetWindowPos, ShowWindow, TranslateMessage, WINDOW_EX_STYLE, WM_CHAR, WM_KEYDOWN,
            WM_SYSCHAR, WM_SYSKEYDOWN, WS_CHILD,
        },
    },
    core::w,
};

// Magic answer our subclass returns for the registration probe message.
const SUBCLASS_PROBE_RETVAL: isize = 0x4F44_5543; // "ODUC"

fn probe_message() -> u32 {
    // Registered once per process; the same name resolves to the same id.
    unsafe { RegisterWindowMessageW(w!("OleDuctUiSubclassProbe")) }
}

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut _)
}

fn handle_of(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as usize)
}

fn input_message_id(kind: InputKind) -> u32 {
    match kind {
        InputKind::KeyDown => WM_KEYDOWN,
        InputKind::SysKeyDown => WM_SYSKEYDOWN,
        InputKind::Char => WM_CHAR,
        InputKind::SysChar => WM_SYSCHAR,
    }
}

#[derive(Debug, Default)]
pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSystem for Win32WindowSystem {
    fn window_proc(&self, window: WindowHandle) -> Option<WndProcId> {
        unsafe {
            if !IsWindow(Some(hwnd(window))).as_bool() {
                return None;
            }
            let raw = GetWindowLongPtrW(hwnd(window), GWLP_WNDPROC);
            Some(WndProcId(raw as usize))
        }
    }

    fn set_window_proc(&self, window: WindowHandle, proc_id: WndProcId) -> Option<WndProcId> {
        unsafe {
            if !IsWindow(Some(hwnd(window))).as_bool() {
                return None;
            }
            let previous = SetWindowLongPtrW(hwnd(window), GWLP_WNDPROC, proc_id.0 as isize);
            Some(WndProcId(previous as usize))
        }
    }

    fn probe_subclass(&self, window: WindowHandle) -> bool {
        let answer: LRESULT =
            unsafe { SendMessageW(hwnd(window), probe_message(), None, None) };
        answer.0 == SUBCLASS_PROBE_RETVAL
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        unsafe { IsWindow(Some(hwnd(window))).as_bool() }
    }

    fn create_placeholder_window(&self, parent: WindowHandle) -> AxResult<WindowHandle> {
        // An invisible STATIC child stands in for a component that refuses
        // to surface a window of its own.
        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                w!("STATIC"),
                w!(""),
                WS_CHILD,
                0,
                0,
                0,
                0,
                (!parent.is_invalid()).then(|| hwnd(parent)),
                None::<HMENU>,
                None,
                None,
            )
        };
        match created {
            Ok(window) => Ok(handle_of(window)),
            Err(error) => Err(AxError::NoWindow(format!(
                "placeholder window creation failed: {error}"
            ))),
        }
    }

    fn destroy_window(&self, window: WindowHandle) {
        unsafe {
            // The window may already be gone; that is fine here.
            DestroyWindow(hwnd(window)).ok();
        }
    }

    fn set_parent(&self, child: WindowHandle, parent: WindowHandle) -> AxResult<WindowHandle> {
        unsafe {
            match SetParent(
                hwnd(child),
                (!parent.is_invalid()).then(|| hwnd(parent)),
            ) {
                Ok(previous) => Ok(handle_of(previous)),
                Err(error) => Err(AxError::NoWindow(format!(
                    "SetParent({}, {}) failed: {error}",
                    child.0, parent.0
                ))),
            }
        }
    }

    fn window_bounds(&self, window: WindowHandle) -> Option<Rect> {
        unsafe {
            let mut rect = windows::Win32::Foundation::RECT::default();
            GetWindowRect(hwnd(window), &mut rect).ok()?;
            Some(Rect::new(
                rect.left,
                rect.top,
                rect.right - rect.left,
                rect.bottom - rect.top,
            ))
        }
    }

    fn set_window_bounds(&self, window: WindowHandle, bounds: Rect) -> AxResult<()> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                None,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )
            .map_err(|error| {
                AxError::NoWindow(format!("SetWindowPos({}) failed: {error}", window.0))
            })
        }
    }

    fn show_window(&self, window: WindowHandle, visible: bool) {
        unsafe {
            let _ = ShowWindow(hwnd(window), if visible { SW_SHOW } else { SW_HIDE });
        }
    }

    fn focus_window(&self, window: WindowHandle) {
        unsafe {
            let _ = SetFocus(Some(hwnd(window)));
        }
    }

    fn modifier_state(&self) -> Modifiers {
        unsafe {
            Modifiers {
                shift: GetKeyState(VK_SHIFT.0 as i32) < 0,
                control: GetKeyState(VK_CONTROL.0 as i32) < 0,
                alt: GetKeyState(VK_MENU.0 as i32) < 0,
            }
        }
    }

    fn translate_and_dispatch(&self, message: &InputMessage) {
        let Some(kind) = message.kind else {
            return;
        };
        let msg = MSG {
            hwnd: hwnd(message.target),
            message: input_message_id(kind),
            wParam: WPARAM(message.key as usize),
            lParam: LPARAM(0),
            time: 0,
            pt: POINT::default(),
        };
        unsafe {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}
