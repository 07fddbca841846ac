/*
 * Shared test doubles: a scriptable widget peer, a mock foreign component
 * with configurable persistence capabilities, and a recording host site.
 * Compiled only for tests; each engine's test module builds its scenarios
 * from these.
 */

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::com::{
    AdviseSink, ClientSite, ComError, ComResult, ControlSite, DrawAspect, FrameWindow,
    InPlaceSite, MiscStatus, OleControl, PersistPropertyBag, PersistStorage, PersistStream,
    PersistStreamInit, QuickActivate, QuickActivateContainer, QuickActivateControl,
    WindowContext,
};
use crate::error::{AxError, Result as AxResult};
use crate::ocx_state::StructuredStorage;
use crate::property_bag::{ErrorLog, PropertyBag};
use crate::types::{
    DispId, DockStyle, InputMessage, Modifiers, OleColor, OleVerb, PreProcessResult, Rect, Size,
    Variant,
};
use crate::widget::{BlobCodec, DrawSurface, PropertyKind, PropertyStore, WidgetPeer};
use crate::window_stub::StubWindowSystem;
use crate::window_system::{WindowHandle, WindowSystem};

/*
 * Widget double. Interior mutability throughout so the `&self` trait
 * surface can mutate; a stub window system (when provided) backs handle
 * creation so reparenting paths see real stub windows.
 */
pub(crate) struct TestWidget {
    name: String,
    text: RefCell<String>,
    bounds: Cell<Rect>,
    default_size: Size,
    visible: Cell<bool>,
    enabled: Cell<bool>,
    tab_index: Cell<i32>,
    tab_stop: Cell<bool>,
    dock: Cell<DockStyle>,
    back_color: Cell<OleColor>,
    fore_color: Cell<OleColor>,
    handle: Cell<Option<WindowHandle>>,
    windows: Option<Rc<StubWindowSystem>>,
    children: RefCell<Vec<Rc<dyn WidgetPeer>>>,
    focused: Cell<bool>,
    pre_process_answer: Cell<PreProcessResult>,
    properties: RefCell<BTreeMap<String, (PropertyKind, Variant)>>,
    failing_properties: RefCell<HashSet<String>>,
    paint_log: RefCell<Vec<Rect>>,
}

impl TestWidget {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: RefCell::new(String::new()),
            bounds: Cell::new(Rect::new(0, 0, 75, 23)),
            default_size: Size::new(75, 23),
            visible: Cell::new(false),
            enabled: Cell::new(true),
            tab_index: Cell::new(0),
            tab_stop: Cell::new(true),
            dock: Cell::new(DockStyle::None),
            back_color: Cell::new(OleColor::from_rgb(255, 255, 255)),
            fore_color: Cell::new(OleColor::from_rgb(0, 0, 0)),
            handle: Cell::new(None),
            windows: None,
            children: RefCell::new(Vec::new()),
            focused: Cell::new(false),
            pre_process_answer: Cell::new(PreProcessResult::NotNeeded),
            properties: RefCell::new(BTreeMap::new()),
            failing_properties: RefCell::new(HashSet::new()),
            paint_log: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_windows(name: &str, windows: Rc<StubWindowSystem>) -> Self {
        Self {
            windows: Some(windows),
            ..Self::new(name)
        }
    }

    pub(crate) fn set_widget_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
    }

    pub(crate) fn add_child(&self, child: Rc<dyn WidgetPeer>) {
        self.children.borrow_mut().push(child);
    }

    pub(crate) fn set_focused(&self, focused: bool) {
        self.focused.set(focused);
    }

    pub(crate) fn set_pre_process_answer(&self, answer: PreProcessResult) {
        self.pre_process_answer.set(answer);
    }

    pub(crate) fn define_property(&self, name: &str, kind: PropertyKind, value: Variant) {
        self.properties
            .borrow_mut()
            .insert(name.to_string(), (kind, value));
    }

    pub(crate) fn fail_property(&self, name: &str) {
        self.failing_properties.borrow_mut().insert(name.to_string());
    }

    pub(crate) fn property_value(&self, name: &str) -> Option<Variant> {
        self.properties.borrow().get(name).map(|(_, v)| v.clone())
    }

    pub(crate) fn paint_log(&self) -> Vec<Rect> {
        self.paint_log.borrow().clone()
    }

    fn check_failing(&self, name: &str) -> AxResult<()> {
        if self.failing_properties.borrow().contains(name) {
            return Err(AxError::Persistence(format!(
                "property '{name}' rigged to fail"
            )));
        }
        Ok(())
    }
}

impl WidgetPeer for TestWidget {
    fn bounds(&self) -> Rect {
        self.bounds.get()
    }

    fn set_bounds(&self, bounds: Rect) {
        self.bounds.set(bounds);
        if let (Some(windows), Some(handle)) = (&self.windows, self.handle.get()) {
            let _ = windows.set_window_bounds(handle, bounds);
        }
    }

    fn default_size(&self) -> Size {
        self.default_size
    }

    fn visible(&self) -> bool {
        self.visible.get()
    }

    fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    fn enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn set_text(&self, text: String) {
        *self.text.borrow_mut() = text;
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn children(&self) -> Vec<Rc<dyn WidgetPeer>> {
        self.children.borrow().clone()
    }

    fn handle(&self) -> Option<WindowHandle> {
        self.handle.get()
    }

    fn create_handle(&self) -> AxResult<WindowHandle> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let handle = match &self.windows {
            Some(windows) => windows.new_window(),
            None => return Err(AxError::NoWindow("test widget has no window system".into())),
        };
        self.handle.set(Some(handle));
        Ok(handle)
    }

    fn destroy_handle(&self) {
        if let (Some(windows), Some(handle)) = (&self.windows, self.handle.take()) {
            windows.destroy_window(handle);
        }
    }

    fn has_focus(&self) -> bool {
        self.focused.get()
    }

    fn focus(&self) {
        self.focused.set(true);
    }

    fn tab_index(&self) -> i32 {
        self.tab_index.get()
    }

    fn set_tab_index(&self, index: i32) {
        self.tab_index.set(index);
    }

    fn tab_stop(&self) -> bool {
        self.tab_stop.get()
    }

    fn set_tab_stop(&self, stop: bool) {
        self.tab_stop.set(stop);
    }

    fn dock(&self) -> DockStyle {
        self.dock.get()
    }

    fn set_dock(&self, dock: DockStyle) {
        self.dock.set(dock);
    }

    fn back_color(&self) -> OleColor {
        self.back_color.get()
    }

    fn set_back_color(&self, color: OleColor) {
        self.back_color.set(color);
    }

    fn fore_color(&self) -> OleColor {
        self.fore_color.get()
    }

    fn set_fore_color(&self, color: OleColor) {
        self.fore_color.set(color);
    }

    fn pre_process_input(&self, _message: &InputMessage) -> PreProcessResult {
        self.pre_process_answer.get()
    }

    fn paint(&self, surface: &mut dyn DrawSurface, bounds: Rect) {
        surface.fill_rect(bounds, self.back_color.get());
        self.paint_log.borrow_mut().push(bounds);
    }
}

impl PropertyStore for TestWidget {
    fn property_names(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    fn property_kind(&self, name: &str) -> Option<PropertyKind> {
        self.properties.borrow().get(name).map(|(kind, _)| *kind)
    }

    fn read_string(&self, name: &str) -> AxResult<String> {
        self.check_failing(name)?;
        match self.properties.borrow().get(name) {
            Some((_, Variant::Str(value))) => Ok(value.clone()),
            Some((_, other)) => Ok(format!("{other:?}")),
            None => Err(AxError::Persistence(format!("no property '{name}'"))),
        }
    }

    fn write_string(&self, name: &str, value: &str) -> AxResult<()> {
        self.check_failing(name)?;
        let mut properties = self.properties.borrow_mut();
        let kind = properties
            .get(name)
            .map(|(kind, _)| *kind)
            .unwrap_or(PropertyKind::StringRoundTrip);
        properties.insert(name.to_string(), (kind, Variant::Str(value.to_string())));
        Ok(())
    }

    fn read_bytes(&self, name: &str) -> AxResult<Vec<u8>> {
        self.check_failing(name)?;
        match self.properties.borrow().get(name) {
            Some((_, Variant::Blob(bytes))) => Ok(bytes.clone()),
            _ => Err(AxError::Persistence(format!("no byte property '{name}'"))),
        }
    }

    fn write_bytes(&self, name: &str, value: &[u8]) -> AxResult<()> {
        self.check_failing(name)?;
        let mut properties = self.properties.borrow_mut();
        let kind = properties
            .get(name)
            .map(|(kind, _)| *kind)
            .unwrap_or(PropertyKind::BytesRoundTrip);
        properties.insert(name.to_string(), (kind, Variant::Blob(value.to_vec())));
        Ok(())
    }

    fn read_opaque(&self, name: &str) -> AxResult<Variant> {
        self.check_failing(name)?;
        self.properties
            .borrow()
            .get(name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| AxError::Persistence(format!("no property '{name}'")))
    }

    fn write_opaque(&self, name: &str, value: Variant) -> AxResult<()> {
        self.check_failing(name)?;
        let mut properties = self.properties.borrow_mut();
        let kind = properties
            .get(name)
            .map(|(kind, _)| *kind)
            .unwrap_or(PropertyKind::Opaque);
        properties.insert(name.to_string(), (kind, value));
        Ok(())
    }
}

/*
 * Tagged-byte codec standing in for the external object-graph encoder.
 */
pub(crate) struct TestCodec;

impl BlobCodec for TestCodec {
    fn encode(&self, value: &Variant) -> AxResult<Vec<u8>> {
        let mut out = Vec::new();
        match value {
            Variant::I4(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Variant::Bool(v) => {
                out.push(2);
                out.push(*v as u8);
            }
            Variant::Str(v) => {
                out.push(3);
                out.extend_from_slice(v.as_bytes());
            }
            Variant::Color(v) => {
                out.push(4);
                out.extend_from_slice(&v.0.to_le_bytes());
            }
            Variant::Blob(v) => {
                out.push(5);
                out.extend_from_slice(v);
            }
            other => {
                return Err(AxError::Persistence(format!(
                    "test codec cannot encode {other:?}"
                )));
            }
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> AxResult<Variant> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| AxError::Persistence("empty codec payload".into()))?;
        Ok(match tag {
            1 => Variant::I4(i32::from_le_bytes(rest.try_into().map_err(|_| {
                AxError::Persistence("bad i4 payload".into())
            })?)),
            2 => Variant::Bool(first_byte_nonzero(rest)?),
            3 => Variant::Str(
                std::str::from_utf8(rest)
                    .map_err(|_| AxError::Persistence("bad string payload".into()))?
                    .to_string(),
            ),
            4 => Variant::Color(OleColor(u32::from_le_bytes(rest.try_into().map_err(
                |_| AxError::Persistence("bad color payload".into()),
            )?))),
            5 => Variant::Blob(rest.to_vec()),
            other => {
                return Err(AxError::Persistence(format!("unknown codec tag {other}")));
            }
        })
    }
}

fn first_byte_nonzero(rest: &[u8]) -> AxResult<bool> {
    rest.first()
        .map(|&b| b != 0)
        .ok_or_else(|| AxError::Persistence("bad bool payload".into()))
}

/// Draw surface that journals fills for view-object tests.
#[derive(Default)]
pub(crate) struct RecordingSurface {
    pub fills: Vec<(Rect, OleColor)>,
    pub texts: Vec<String>,
}

impl DrawSurface for RecordingSurface {
    fn fill_rect(&mut self, bounds: Rect, color: OleColor) {
        self.fills.push((bounds, color));
    }

    fn draw_text(&mut self, text: &str, _bounds: Rect, _color: OleColor) {
        self.texts.push(text.to_string());
    }
}

/// Frame double with a configurable border-space answer.
pub(crate) struct TestFrame {
    window: WindowHandle,
    pub border_space_answer: Cell<Option<ComError>>,
    pub active_objects: RefCell<Vec<bool>>, // true = set, false = cleared
}

impl TestFrame {
    pub(crate) fn new(window: WindowHandle) -> Self {
        Self {
            window,
            border_space_answer: Cell::new(None),
            active_objects: RefCell::new(Vec::new()),
        }
    }
}

impl FrameWindow for TestFrame {
    fn window(&self) -> WindowHandle {
        self.window
    }

    fn set_active_object(
        &self,
        active: Option<Rc<dyn crate::com::ActiveObject>>,
        _name: Option<&str>,
    ) -> ComResult<()> {
        self.active_objects.borrow_mut().push(active.is_some());
        Ok(())
    }

    fn set_border_space(&self, _space: Option<Rect>) -> ComResult<()> {
        match self.border_space_answer.take() {
            Some(error) => {
                // Keep the configured answer sticky for repeated calls.
                self.border_space_answer.set(Some(error.clone()));
                Err(error)
            }
            None => Ok(()),
        }
    }
}

/*
 * Recording client site: implements the full site surface the control-side
 * engine negotiates with, with scriptable answers and a notification log.
 */
pub(crate) struct TestSite {
    pub windows: Rc<StubWindowSystem>,
    pub host_window: WindowHandle,
    pub frame: Rc<TestFrame>,
    pub ui_window: Option<Rc<TestFrame>>,
    pub can_activate: Cell<bool>,
    pub in_place_capable: Cell<bool>,
    pub notifications: RefCell<Vec<String>>,
    pub ambients: RefCell<HashMap<i32, Variant>>,
    pub accel_answer: Cell<bool>,
    pub accel_log: RefCell<Vec<(InputMessage, Modifiers)>>,
    pub pos_rect: Cell<Rect>,
    pub pos_rect_hook: RefCell<Option<Box<dyn Fn(Rect)>>>,
}

impl TestSite {
    pub(crate) fn new(windows: Rc<StubWindowSystem>) -> Self {
        let host_window = windows.new_window();
        let frame_window = windows.new_window();
        Self {
            windows,
            host_window,
            frame: Rc::new(TestFrame::new(frame_window)),
            ui_window: None,
            can_activate: Cell::new(true),
            in_place_capable: Cell::new(true),
            notifications: RefCell::new(Vec::new()),
            ambients: RefCell::new(HashMap::new()),
            accel_answer: Cell::new(false),
            accel_log: RefCell::new(Vec::new()),
            pos_rect: Cell::new(Rect::new(0, 0, 100, 50)),
            pos_rect_hook: RefCell::new(None),
        }
    }

    pub(crate) fn set_ambient(&self, dispid: DispId, value: Variant) {
        self.ambients.borrow_mut().insert(dispid.raw(), value);
    }

    pub(crate) fn notes(&self) -> Vec<String> {
        self.notifications.borrow().clone()
    }

    fn note(&self, entry: &str) {
        self.notifications.borrow_mut().push(entry.to_string());
    }
}

impl ClientSite for TestSite {
    fn save_object(&self) -> ComResult<()> {
        self.note("save_object");
        Ok(())
    }

    fn show_object(&self) -> ComResult<()> {
        self.note("show_object");
        Ok(())
    }

    fn get_ambient_property(&self, dispid: DispId) -> Option<Variant> {
        self.note(&format!("ambient:{}", dispid.raw()));
        self.ambients.borrow().get(&dispid.raw()).cloned()
    }

    fn as_in_place_site(&self) -> Option<&dyn InPlaceSite> {
        self.in_place_capable.get().then_some(self as &dyn InPlaceSite)
    }

    fn as_control_site(&self) -> Option<&dyn ControlSite> {
        Some(self)
    }
}

impl InPlaceSite for TestSite {
    fn can_in_place_activate(&self) -> bool {
        self.can_activate.get()
    }

    fn on_in_place_activate(&self) -> ComResult<()> {
        self.note("on_in_place_activate");
        Ok(())
    }

    fn on_ui_activate(&self) -> ComResult<()> {
        self.note("on_ui_activate");
        Ok(())
    }

    fn get_window(&self) -> ComResult<WindowHandle> {
        Ok(self.host_window)
    }

    fn get_window_context(&self) -> ComResult<WindowContext> {
        self.note("get_window_context");
        Ok(WindowContext {
            frame: self.frame.clone(),
            ui_window: self
                .ui_window
                .as_ref()
                .map(|w| w.clone() as Rc<dyn FrameWindow>),
            pos_rect: self.pos_rect.get(),
            clip_rect: self.pos_rect.get(),
        })
    }

    fn on_ui_deactivate(&self, _undoable: bool) -> ComResult<()> {
        self.note("on_ui_deactivate");
        Ok(())
    }

    fn on_in_place_deactivate(&self) -> ComResult<()> {
        self.note("on_in_place_deactivate");
        Ok(())
    }

    fn on_pos_rect_change(&self, pos_rect: Rect) -> ComResult<()> {
        self.note(&format!("pos_rect:{}x{}", pos_rect.width, pos_rect.height));
        self.pos_rect.set(pos_rect);
        if let Some(hook) = self.pos_rect_hook.borrow().as_ref() {
            hook(pos_rect);
        }
        Ok(())
    }
}

impl ControlSite for TestSite {
    fn translate_accelerator(
        &self,
        message: &InputMessage,
        modifiers: Modifiers,
    ) -> ComResult<bool> {
        self.accel_log.borrow_mut().push((*message, modifiers));
        Ok(self.accel_answer.get())
    }

    fn on_focus(&self, focused: bool) -> ComResult<()> {
        self.note(&format!("focus:{focused}"));
        Ok(())
    }
}

/// Advise sink double counting view changes.
#[derive(Default)]
pub(crate) struct CountingSink {
    pub view_changes: Cell<u32>,
}

impl AdviseSink for CountingSink {
    fn on_view_change(&self, _aspect: DrawAspect) {
        self.view_changes.set(self.view_changes.get() + 1);
    }
}

/*
 * Mock foreign component for container-side tests. Capabilities are
 * configured per scenario; persisted "state" is a name→value map so the
 * depersist/save paths have real content to round-trip.
 */
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ComponentCaps {
    pub stream_init: bool,
    pub stream: bool,
    pub storage: bool,
    pub bag: bool,
    pub quick_activate: bool,
}

type VerbHook = Box<dyn Fn(OleVerb)>;

pub(crate) struct MockComponent {
    pub caps: ComponentCaps,
    pub misc: Cell<MiscStatus>,
    pub values: RefCell<BTreeMap<String, String>>,
    pub site: RefCell<Option<Rc<dyn ClientSite>>>,
    pub window: Cell<Option<WindowHandle>>,
    pub windows: Rc<StubWindowSystem>,
    pub refuses_window: Cell<bool>,
    pub freeze_depth: Cell<i32>,
    pub init_new_calls: Cell<u32>,
    pub load_calls: Cell<u32>,
    pub verb_log: RefCell<Vec<OleVerb>>,
    pub verb_hook: RefCell<Option<VerbHook>>,
    pub extent_himetric: Cell<Size>,
    pub extent_hook: RefCell<Option<Box<dyn Fn(Size)>>>,
    pub quick_activated: Cell<bool>,
    pub quick_fails: Cell<bool>,
    pub event_sinks: Cell<u32>,
    pub dirty: Cell<bool>,
}

impl MockComponent {
    pub(crate) fn new(caps: ComponentCaps, windows: Rc<StubWindowSystem>) -> Rc<Self> {
        Rc::new(Self {
            caps,
            misc: Cell::new(MiscStatus::default()),
            values: RefCell::new(BTreeMap::new()),
            site: RefCell::new(None),
            window: Cell::new(None),
            windows,
            refuses_window: Cell::new(false),
            freeze_depth: Cell::new(0),
            init_new_calls: Cell::new(0),
            load_calls: Cell::new(0),
            verb_log: RefCell::new(Vec::new()),
            verb_hook: RefCell::new(None),
            extent_himetric: Cell::new(crate::types::size_to_himetric(Size::new(75, 23))),
            extent_hook: RefCell::new(None),
            quick_activated: Cell::new(false),
            quick_fails: Cell::new(false),
            event_sinks: Cell::new(0),
            dirty: Cell::new(false),
        })
    }

    pub(crate) fn set_value(&self, name: &str, value: &str) {
        self.values.borrow_mut().insert(name.into(), value.into());
    }

    pub(crate) fn value(&self, name: &str) -> Option<String> {
        self.values.borrow().get(name).cloned()
    }

    fn snapshot(&self) -> Vec<u8> {
        let mut bag = PropertyBag::new();
        for (name, value) in self.values.borrow().iter() {
            bag.write(name, value);
        }
        bag.to_wire()
    }

    fn restore(&self, bytes: &[u8]) -> ComResult<()> {
        let bag = PropertyBag::from_wire(bytes)
            .map_err(|e| ComError::Unexpected(e.to_string()))?;
        let mut values = self.values.borrow_mut();
        values.clear();
        for (name, value) in bag.iter() {
            values.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }
}

impl OleControl for MockComponent {
    fn do_verb(&self, verb: OleVerb) -> ComResult<()> {
        self.verb_log.borrow_mut().push(verb);
        if verb == OleVerb::InPlaceActivate && !self.refuses_window.get() {
            // Surface our window under the host like a real OCX would.
            if self.window.get().is_none() {
                let window = self.windows.new_window();
                self.window.set(Some(window));
            }
        }
        if let Some(hook) = self.verb_hook.borrow().as_ref() {
            hook(verb);
        }
        Ok(())
    }

    fn set_client_site(&self, site: Option<Rc<dyn ClientSite>>) -> ComResult<()> {
        *self.site.borrow_mut() = site;
        Ok(())
    }

    fn client_site(&self) -> Option<Rc<dyn ClientSite>> {
        self.site.borrow().clone()
    }

    fn get_extent(&self) -> ComResult<Size> {
        Ok(self.extent_himetric.get())
    }

    fn set_extent(&self, extent: Size) -> ComResult<Size> {
        self.extent_himetric.set(extent);
        if let Some(hook) = self.extent_hook.borrow().as_ref() {
            hook(extent);
        }
        Ok(extent)
    }

    fn advise(&self, _sink: Rc<dyn AdviseSink>) -> ComResult<u32> {
        Ok(1)
    }

    fn unadvise(&self, _cookie: u32) -> ComResult<()> {
        Ok(())
    }

    fn close(&self, _save: bool) -> ComResult<()> {
        if let Some(window) = self.window.take() {
            self.windows.destroy_window(window);
        }
        Ok(())
    }

    fn connect_events(&self, _sink: Rc<dyn crate::com::EventSink>) -> ComResult<u32> {
        self.event_sinks.set(self.event_sinks.get() + 1);
        Ok(self.event_sinks.get())
    }

    fn disconnect_events(&self, _cookie: u32) -> ComResult<()> {
        let current = self.event_sinks.get();
        if current == 0 {
            return Err(ComError::Unexpected("no sink connected".into()));
        }
        self.event_sinks.set(current - 1);
        Ok(())
    }

    fn freeze_events(&self, freeze: bool) {
        let delta = if freeze { 1 } else { -1 };
        self.freeze_depth.set(self.freeze_depth.get() + delta);
    }

    fn on_ambient_property_change(&self, _dispid: DispId) {}

    fn get_window(&self) -> ComResult<WindowHandle> {
        self.window.get().ok_or(ComError::NotImplemented)
    }

    fn as_persist_stream(&self) -> Option<&dyn PersistStream> {
        self.caps.stream.then_some(self as &dyn PersistStream)
    }

    fn as_persist_stream_init(&self) -> Option<&dyn PersistStreamInit> {
        self.caps
            .stream_init
            .then_some(self as &dyn PersistStreamInit)
    }

    fn as_persist_storage(&self) -> Option<&dyn PersistStorage> {
        self.caps.storage.then_some(self as &dyn PersistStorage)
    }

    fn as_persist_property_bag(&self) -> Option<&dyn PersistPropertyBag> {
        self.caps.bag.then_some(self as &dyn PersistPropertyBag)
    }

    fn as_quick_activate(&self) -> Option<&dyn QuickActivate> {
        self.caps
            .quick_activate
            .then_some(self as &dyn QuickActivate)
    }

    fn as_in_place_object(&self) -> Option<&dyn crate::com::InPlaceObject> {
        Some(self)
    }
}

impl PersistStream for MockComponent {
    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn load(&self, data: &[u8]) -> ComResult<()> {
        self.load_calls.set(self.load_calls.get() + 1);
        self.restore(data)
    }

    fn save(&self, clear_dirty: bool) -> ComResult<Vec<u8>> {
        if clear_dirty {
            self.dirty.set(false);
        }
        Ok(self.snapshot())
    }
}

impl PersistStreamInit for MockComponent {
    fn init_new(&self) -> ComResult<()> {
        self.init_new_calls.set(self.init_new_calls.get() + 1);
        Ok(())
    }
}

impl PersistStorage for MockComponent {
    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn init_new(&self, storage: &mut StructuredStorage) -> ComResult<()> {
        self.init_new_calls.set(self.init_new_calls.get() + 1);
        storage.write_stream("Contents", &self.snapshot());
        Ok(())
    }

    fn load(&self, storage: &StructuredStorage) -> ComResult<()> {
        self.load_calls.set(self.load_calls.get() + 1);
        match storage.read_stream("Contents") {
            Some(bytes) => self.restore(bytes),
            None => Ok(()),
        }
    }

    fn save(&self, storage: &mut StructuredStorage, _same_as_load: bool) -> ComResult<()> {
        storage.write_stream("Contents", &self.snapshot());
        Ok(())
    }

    fn save_completed(&self) -> ComResult<()> {
        self.dirty.set(false);
        Ok(())
    }
}

impl PersistPropertyBag for MockComponent {
    fn init_new(&self) -> ComResult<()> {
        self.init_new_calls.set(self.init_new_calls.get() + 1);
        Ok(())
    }

    fn load(&self, bag: &PropertyBag, _error_log: Option<&mut dyn ErrorLog>) -> ComResult<()> {
        self.load_calls.set(self.load_calls.get() + 1);
        let mut values = self.values.borrow_mut();
        values.clear();
        for (name, value) in bag.iter() {
            values.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    fn save(&self, bag: &mut PropertyBag, clear_dirty: bool) -> ComResult<()> {
        for (name, value) in self.values.borrow().iter() {
            bag.write(name, value);
        }
        if clear_dirty {
            self.dirty.set(false);
        }
        Ok(())
    }
}

impl QuickActivate for MockComponent {
    fn quick_activate(
        &self,
        container: QuickActivateContainer,
    ) -> ComResult<QuickActivateControl> {
        if self.quick_fails.get() {
            return Err(ComError::Unexpected("quick activation rigged to fail".into()));
        }
        *self.site.borrow_mut() = Some(container.client_site);
        let cookie = container.event_sink.map(|_| {
            self.event_sinks.set(self.event_sinks.get() + 1);
            self.event_sinks.get()
        });
        self.quick_activated.set(true);
        Ok(QuickActivateControl {
            misc_status: self.misc.get(),
            view_advised: false,
            event_cookie: cookie,
        })
    }
}

impl crate::com::InPlaceObject for MockComponent {
    fn set_object_rects(&self, pos_rect: Rect, _clip_rect: Rect) -> ComResult<()> {
        if let Some(window) = self.window.get() {
            self.windows
                .set_window_bounds(window, pos_rect)
                .map_err(|e| ComError::Unexpected(e.to_string()))?;
        }
        Ok(())
    }

    fn in_place_deactivate(&self) -> ComResult<()> {
        if let Some(window) = self.window.take() {
            self.windows.destroy_window(window);
        }
        Ok(())
    }

    fn ui_deactivate(&self) -> ComResult<()> {
        Ok(())
    }
}

/*
 * Class factory double with an optional license requirement.
 */
pub(crate) struct TestFactory {
    pub component: Rc<MockComponent>,
    pub required_license: Option<String>,
    pub created: Cell<u32>,
}

impl TestFactory {
    pub(crate) fn new(component: Rc<MockComponent>) -> Self {
        Self {
            component,
            required_license: None,
            created: Cell::new(0),
        }
    }

    pub(crate) fn licensed(component: Rc<MockComponent>, key: &str) -> Self {
        Self {
            component,
            required_license: Some(key.to_string()),
            created: Cell::new(0),
        }
    }
}

impl crate::com::ComponentFactory for TestFactory {
    fn class_name(&self) -> &str {
        "Test.MockComponent"
    }

    fn create_instance(
        &self,
        license_key: Option<&str>,
    ) -> ComResult<Rc<dyn OleControl>> {
        if let Some(required) = &self.required_license
            && license_key != Some(required.as_str())
        {
            return Err(ComError::NotLicensed);
        }
        self.created.set(self.created.get() + 1);
        Ok(self.component.clone())
    }
}
