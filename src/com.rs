/*
 * The negotiated component boundary, modeled as explicit capability traits
 * instead of COM vtables. A foreign component is an `Rc<dyn OleControl>`;
 * everything beyond the base lifecycle is probed with `as_*` try-casts that
 * return `None` when the capability is absent, which keeps the "QueryInterface
 * failed" paths visible at every call site.
 *
 * The container implements the site-side traits (`ClientSite`, `InPlaceSite`,
 * `ControlSite`, `FrameWindow`) and hands them to the component; the
 * control-side engine consumes them. Both directions share `ComError`.
 */

use std::rc::Rc;

use thiserror::Error;

use crate::accelerator::AcceleratorTable;
use crate::ocx_state::StructuredStorage;
use crate::property_bag::{ErrorLog, PropertyBag};
use crate::types::{
    DispId, FontSpec, InputMessage, Modifiers, OleColor, OleVerb, Rect, Size, Variant,
};
use crate::widget::DrawSurface;
use crate::window_system::WindowHandle;

/*
 * Non-success results a negotiated interface can produce. The hosting
 * engines tolerate a specific subset (`is_tolerated_negotiation`) during
 * border-space and view-advise setup; everything else is wrapped into
 * `AxError::External` by the caller.
 */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComError {
    #[error("not implemented")]
    NotImplemented,

    #[error("no border tool space available")]
    NoToolSpace,

    #[error("invalid rectangle")]
    InvalidRect,

    #[error("requested interface is not supported")]
    NoInterface,

    #[error("class is not licensed")]
    NotLicensed,

    #[error("null pointer argument")]
    Pointer,

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ComError {
    /// The "not implemented / no tool space" family treated as success
    /// during border-space and view-advise negotiation.
    pub fn is_tolerated_negotiation(&self) -> bool {
        matches!(
            self,
            ComError::NotImplemented | ComError::NoToolSpace | ComError::InvalidRect
        )
    }
}

pub type ComResult<T> = std::result::Result<T, ComError>;

/// Drawing aspect for view advises; only content drawing is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawAspect {
    #[default]
    Content,
}

/*
 * Status bits a component reports at activation. Parsed once by the
 * container and latched for the component's lifetime.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MiscStatus {
    /// The component never shows a window at run time; the host owns one.
    pub invisible_at_runtime: bool,
    pub simple_frame: bool,
    pub act_like_button: bool,
    /// The client site must be assigned before depersistence.
    pub set_client_site_first: bool,
}

/// Result of `OleControl::get_control_info`.
#[derive(Debug, Clone, Default)]
pub struct ControlInfo {
    pub accelerators: AcceleratorTable,
}

/// Frame objects and geometry returned by `InPlaceSite::get_window_context`.
pub struct WindowContext {
    pub frame: Rc<dyn FrameWindow>,
    pub ui_window: Option<Rc<dyn FrameWindow>>,
    pub pos_rect: Rect,
    pub clip_rect: Rect,
}

/// Ambient flags exchanged during quick activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerFlags {
    pub auto_clip: bool,
    pub message_reflect: bool,
    pub supports_mnemonics: bool,
    pub user_mode: bool,
    pub ui_dead: bool,
}

/// Container half of the single-call batched activation exchange.
pub struct QuickActivateContainer {
    pub client_site: Rc<dyn ClientSite>,
    pub property_notify_sink: Option<Rc<dyn PropertyNotifySink>>,
    pub event_sink: Option<Rc<dyn EventSink>>,
    pub ambient_back_color: OleColor,
    pub ambient_fore_color: OleColor,
    pub ambient_font: Option<FontSpec>,
    pub flags: ContainerFlags,
}

/// Control half of the quick-activation exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickActivateControl {
    pub misc_status: MiscStatus,
    pub view_advised: bool,
    pub event_cookie: Option<u32>,
}

/*
 * Base lifecycle every hostable component implements, plus the capability
 * probes. Probes default to `None`: a component advertises a persistence or
 * activation capability by overriding the matching `as_*`.
 */
pub trait OleControl {
    fn do_verb(&self, verb: OleVerb) -> ComResult<()>;

    fn set_client_site(&self, site: Option<Rc<dyn ClientSite>>) -> ComResult<()>;

    fn client_site(&self) -> Option<Rc<dyn ClientSite>>;

    /// Extent in HIMETRIC units.
    fn get_extent(&self) -> ComResult<Size>;

    /// Propose a new extent in HIMETRIC units; the component answers with
    /// the extent it actually adopted.
    fn set_extent(&self, extent: Size) -> ComResult<Size>;

    fn advise(&self, sink: Rc<dyn AdviseSink>) -> ComResult<u32>;

    fn unadvise(&self, cookie: u32) -> ComResult<()>;

    fn enum_verbs(&self) -> ComResult<Vec<OleVerb>> {
        Ok(Vec::new())
    }

    fn close(&self, save: bool) -> ComResult<()>;

    /// Connect the container's event sink; returns a disconnect cookie.
    fn connect_events(&self, sink: Rc<dyn EventSink>) -> ComResult<u32> {
        let _ = sink;
        Err(ComError::NotImplemented)
    }

    fn disconnect_events(&self, cookie: u32) -> ComResult<()> {
        let _ = cookie;
        Err(ComError::NotImplemented)
    }

    fn freeze_events(&self, freeze: bool);

    fn on_ambient_property_change(&self, dispid: DispId);

    fn get_control_info(&self) -> ComResult<ControlInfo> {
        Err(ComError::NotImplemented)
    }

    /// The component's own window, once it has surfaced one.
    fn get_window(&self) -> ComResult<WindowHandle> {
        Err(ComError::NotImplemented)
    }

    // Capability probes. `None` means the negotiated interface is absent.

    fn as_persist_stream(&self) -> Option<&dyn PersistStream> {
        None
    }

    fn as_persist_stream_init(&self) -> Option<&dyn PersistStreamInit> {
        None
    }

    fn as_persist_storage(&self) -> Option<&dyn PersistStorage> {
        None
    }

    fn as_persist_property_bag(&self) -> Option<&dyn PersistPropertyBag> {
        None
    }

    fn as_quick_activate(&self) -> Option<&dyn QuickActivate> {
        None
    }

    fn as_in_place_object(&self) -> Option<&dyn InPlaceObject> {
        None
    }

    fn as_active_object(&self) -> Option<&dyn ActiveObject> {
        None
    }

    fn as_view_object(&self) -> Option<&dyn ViewObject> {
        None
    }
}

/// Sequential-stream persistence.
pub trait PersistStream {
    fn is_dirty(&self) -> bool;

    fn load(&self, data: &[u8]) -> ComResult<()>;

    fn save(&self, clear_dirty: bool) -> ComResult<Vec<u8>>;
}

/// Self-initializing stream persistence: adds the explicit fresh-state call.
pub trait PersistStreamInit: PersistStream {
    fn init_new(&self) -> ComResult<()>;
}

/// Structured-storage persistence.
pub trait PersistStorage {
    fn is_dirty(&self) -> bool;

    fn init_new(&self, storage: &mut StructuredStorage) -> ComResult<()>;

    fn load(&self, storage: &StructuredStorage) -> ComResult<()>;

    fn save(&self, storage: &mut StructuredStorage, same_as_load: bool) -> ComResult<()>;

    /// Storage ownership is handed back to the component; it may resume
    /// scribbling after this returns.
    fn save_completed(&self) -> ComResult<()>;
}

/// Name→value property-bag persistence.
pub trait PersistPropertyBag {
    fn init_new(&self) -> ComResult<()>;

    fn load(&self, bag: &PropertyBag, error_log: Option<&mut dyn ErrorLog>) -> ComResult<()>;

    fn save(&self, bag: &mut PropertyBag, clear_dirty: bool) -> ComResult<()>;
}

/// Single-call batched activation.
pub trait QuickActivate {
    fn quick_activate(
        &self,
        container: QuickActivateContainer,
    ) -> ComResult<QuickActivateControl>;
}

/// In-place object half the container drives during geometry changes and
/// deactivation.
pub trait InPlaceObject {
    fn set_object_rects(&self, pos_rect: Rect, clip_rect: Rect) -> ComResult<()>;

    fn in_place_deactivate(&self) -> ComResult<()>;

    fn ui_deactivate(&self) -> ComResult<()>;
}

/// The UI-active object registered with the host frame.
pub trait ActiveObject {
    fn translate_accelerator(&self, message: &InputMessage) -> ComResult<bool>;

    fn on_doc_window_activate(&self, active: bool) -> ComResult<()>;
}

/// Drawing and view-advise surface of a component.
pub trait ViewObject {
    fn draw(&self, surface: &mut dyn DrawSurface, bounds: Rect) -> ComResult<()>;

    fn set_advise(&self, aspect: DrawAspect, sink: Option<Rc<dyn AdviseSink>>) -> ComResult<()>;

    fn get_advise(&self) -> ComResult<Option<Rc<dyn AdviseSink>>>;
}

/// Callback a host registers to observe a component's visual changes.
pub trait AdviseSink {
    fn on_view_change(&self, aspect: DrawAspect);

    fn on_save(&self) {}

    fn on_close(&self) {}
}

/// Property-change notifications from component to container.
pub trait PropertyNotifySink {
    fn on_changed(&self, dispid: DispId);

    fn on_request_edit(&self, dispid: DispId) -> ComResult<()> {
        let _ = dispid;
        Ok(())
    }
}

/// Event delivery from component to container (the event sink).
pub trait EventSink {
    fn on_event(&self, name: &str, args: &[Variant]);
}

/*
 * Site services the container exposes to its component. The base trait is
 * always present once a client site is assigned; in-place and control-site
 * capabilities are probed the same way component capabilities are.
 */
pub trait ClientSite {
    fn save_object(&self) -> ComResult<()>;

    /// The component asks the container to make its window visible.
    fn show_object(&self) -> ComResult<()>;

    fn get_ambient_property(&self, dispid: DispId) -> Option<Variant>;

    fn as_in_place_site(&self) -> Option<&dyn InPlaceSite> {
        None
    }

    fn as_control_site(&self) -> Option<&dyn ControlSite> {
        None
    }
}

pub trait InPlaceSite {
    fn can_in_place_activate(&self) -> bool;

    fn on_in_place_activate(&self) -> ComResult<()>;

    fn on_ui_activate(&self) -> ComResult<()>;

    fn get_window(&self) -> ComResult<WindowHandle>;

    fn get_window_context(&self) -> ComResult<WindowContext>;

    fn on_ui_deactivate(&self, undoable: bool) -> ComResult<()>;

    fn on_in_place_deactivate(&self) -> ComResult<()>;

    /// The component proposes new geometry for itself.
    fn on_pos_rect_change(&self, pos_rect: Rect) -> ComResult<()>;
}

pub trait ControlSite {
    /// Offer an unclaimed input message to the host; `true` means consumed.
    fn translate_accelerator(
        &self,
        message: &InputMessage,
        modifiers: Modifiers,
    ) -> ComResult<bool>;

    fn on_focus(&self, focused: bool) -> ComResult<()>;
}

/// Host frame (or document) window: active-object registry and border space.
pub trait FrameWindow {
    fn window(&self) -> WindowHandle;

    fn set_active_object(
        &self,
        active: Option<Rc<dyn ActiveObject>>,
        name: Option<&str>,
    ) -> ComResult<()>;

    fn set_border_space(&self, space: Option<Rect>) -> ComResult<()>;
}

/*
 * Class-factory boundary. Licensing refusal is its own result so the
 * container can raise the dedicated licensing error instead of a generic
 * creation failure.
 */
pub trait ComponentFactory {
    fn class_name(&self) -> &str;

    fn create_instance(&self, license_key: Option<&str>) -> ComResult<Rc<dyn OleControl>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerated_negotiation_set_is_exact() {
        assert!(ComError::NotImplemented.is_tolerated_negotiation());
        assert!(ComError::NoToolSpace.is_tolerated_negotiation());
        assert!(ComError::InvalidRect.is_tolerated_negotiation());
        assert!(!ComError::NoInterface.is_tolerated_negotiation());
        assert!(!ComError::NotLicensed.is_tolerated_negotiation());
        assert!(!ComError::Unexpected("x".into()).is_tolerated_negotiation());
    }
}
