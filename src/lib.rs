/*
 * Provides the public entry point for the OleDuctUI crate, the OLE/ActiveX
 * control-hosting layer companion to command-driven Win32 UI toolkits. This
 * module wires together the portable protocol engines (container-side and
 * control-side activation, persisted state, extender bridge) with the
 * Windows-specific window-system backend so downstream toolkits can treat
 * embedding as a single dependency.
 *
 * Conditional compilation keeps every protocol-shaped piece available on
 * all platforms: only `window_win32` touches the `windows` crate, and the
 * in-memory stub backs non-Windows builds and the test suite.
 */
pub mod accelerator;
pub mod ambient;
pub mod com;
pub mod container;
pub mod embedding;
pub mod error;
pub mod extender;
pub(crate) mod guards;
pub mod ocx_state;
pub mod property_bag;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod widget;
pub mod window_stub;
#[cfg(target_os = "windows")]
pub mod window_win32;
pub mod window_system;

pub use container::{HostConfig, OcLevel, OcxHost};
pub use embedding::{EmbeddedComponent, OleEmbedding};
pub use error::{AxError, Result as AxResult};
pub use extender::{DispatchAdapter, ExtenderBridge, WidgetArena};
pub use ocx_state::{OcxState, StorageKind};
pub use property_bag::{ErrorLog, PropertyBag, RecordingErrorLog};
pub use types::{
    DispId, DockStyle, FontSpec, InputKind, InputMessage, Modifiers, OleColor, OleVerb, Point,
    PreProcessResult, Rect, Size, SlotId, Variant,
};
pub use widget::{BlobCodec, DrawSurface, PropertyKind, PropertyStore, WidgetPeer};
#[cfg(target_os = "windows")]
pub use window_win32::Win32WindowSystem;
pub use window_system::{WindowHandle, WindowSystem, WndProcId};
