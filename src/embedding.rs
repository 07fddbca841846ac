/*
 * Control-side activation engine: makes an owned widget behave as an
 * embeddable OLE control inside a foreign container.
 *
 * The engine negotiates with the host through the site traits in `com`:
 * in-place activation reparents the widget's native window under the
 * host-provided parent, UI activation registers the widget as the host's
 * active object and takes focus, and deactivation mirrors both steps
 * idempotently. Persistence goes through the property-bag textual format
 * regardless of whether the host speaks streams or bags.
 *
 * State is a typed struct rather than packed flags; UI-active implies
 * in-place-visible implies in-place-active, never the reverse.
 */

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::accelerator::{self, AcceleratorTable};
use crate::ambient::AmbientCache;
use crate::com::{
    ActiveObject, AdviseSink, ClientSite, ComError, ComResult, ControlInfo, DrawAspect,
    FrameWindow, InPlaceObject, OleControl, PersistPropertyBag, PersistStream,
    PersistStreamInit, PropertyNotifySink, ViewObject,
};
use crate::error::{AxError, Result as AxResult};
use crate::guards::{FreezeCounter, ReentryGate, SingleThreadAffinity};
use crate::property_bag::{ErrorLog, PropertyBag};
use crate::types::{
    DispId, InputMessage, OleVerb, Rect, Size, Variant, size_from_himetric, size_to_himetric,
};
use crate::widget::{BlobCodec, DrawSurface, PropertyKind, PropertyStore, WidgetPeer};
use crate::window_system::{WindowHandle, WindowSystem};

// Accelerator-count sentinel: the table is stale and must be rebuilt on the
// next get_control_info query.
const ACCEL_STALE: i32 = -1;

/// Named activation state; grouped by concern instead of a flag soup.
#[derive(Debug, Default)]
struct EmbeddingState {
    in_place_active: Cell<bool>,
    in_place_visible: Cell<bool>,
    ui_active: Cell<bool>,
    saving: Cell<bool>,
    dirty: Cell<bool>,
}

pub struct OleEmbedding {
    this: Weak<OleEmbedding>,
    affinity: SingleThreadAffinity,
    widget: Rc<dyn WidgetPeer>,
    properties: Rc<dyn PropertyStore>,
    codec: Rc<dyn BlobCodec>,
    windows: Rc<dyn WindowSystem>,
    state: EmbeddingState,
    changing_extents: ReentryGate,
    adjusting_rect: ReentryGate,
    client_site: RefCell<Option<Rc<dyn ClientSite>>>,
    in_place_frame: RefCell<Option<Rc<dyn FrameWindow>>>,
    in_place_ui_window: RefCell<Option<Rc<dyn FrameWindow>>>,
    host_parent: Cell<WindowHandle>,
    ambients: RefCell<AmbientCache>,
    accel_count: Cell<i32>,
    accel_table: RefCell<AcceleratorTable>,
    view_sink: RefCell<Option<Rc<dyn AdviseSink>>>,
    view_aspect: Cell<DrawAspect>,
    property_sink: RefCell<Option<Rc<dyn PropertyNotifySink>>>,
    freeze: FreezeCounter,
}

impl OleEmbedding {
    pub fn new(
        widget: Rc<dyn WidgetPeer>,
        properties: Rc<dyn PropertyStore>,
        codec: Rc<dyn BlobCodec>,
        windows: Rc<dyn WindowSystem>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            affinity: SingleThreadAffinity::capture(),
            widget,
            properties,
            codec,
            windows,
            state: EmbeddingState::default(),
            changing_extents: ReentryGate::new(),
            adjusting_rect: ReentryGate::new(),
            client_site: RefCell::new(None),
            in_place_frame: RefCell::new(None),
            in_place_ui_window: RefCell::new(None),
            host_parent: Cell::new(WindowHandle::INVALID),
            ambients: RefCell::new(AmbientCache::standard()),
            accel_count: Cell::new(ACCEL_STALE),
            accel_table: RefCell::new(AcceleratorTable::default()),
            view_sink: RefCell::new(None),
            view_aspect: Cell::new(DrawAspect::Content),
            property_sink: RefCell::new(None),
            freeze: FreezeCounter::new(),
        })
    }

    pub fn widget(&self) -> &Rc<dyn WidgetPeer> {
        &self.widget
    }

    fn site(&self) -> Option<Rc<dyn ClientSite>> {
        self.client_site.borrow().clone()
    }

    pub fn set_client_site(&self, site: Option<Rc<dyn ClientSite>>) {
        log::debug!(
            "OleEmbedding: set_client_site({})",
            if site.is_some() { "site" } else { "none" }
        );
        *self.client_site.borrow_mut() = site;
        // A new host means every cached ambient is suspect.
        self.ambients.borrow_mut().invalidate(DispId::UNKNOWN);
    }

    pub fn client_site(&self) -> Option<Rc<dyn ClientSite>> {
        self.site()
    }

    pub fn set_property_notify_sink(&self, sink: Option<Rc<dyn PropertyNotifySink>>) {
        *self.property_sink.borrow_mut() = sink;
    }

    pub fn is_in_place_active(&self) -> bool {
        self.state.in_place_active.get()
    }

    pub fn is_in_place_visible(&self) -> bool {
        self.state.in_place_visible.get()
    }

    pub fn is_ui_active(&self) -> bool {
        self.state.ui_active.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty.get()
    }

    pub fn events_frozen(&self) -> bool {
        self.freeze.frozen()
    }

    pub fn host_parent(&self) -> WindowHandle {
        self.host_parent.get()
    }

    /*
     * Verb dispatch, the host-facing entry point. Activation verbs funnel
     * into `in_place_activate`; Hide withdraws visibility without leaving
     * the in-place-active state.
     */
    pub fn do_verb(&self, verb: OleVerb) -> AxResult<()> {
        self.affinity.ensure()?;
        log::debug!("OleEmbedding: do_verb({verb:?})");
        match verb {
            OleVerb::Primary | OleVerb::Show | OleVerb::UiActivate | OleVerb::InPlaceActivate => {
                self.in_place_activate(verb)
            }
            OleVerb::Hide => {
                if self.state.in_place_visible.get() {
                    self.widget.set_visible(false);
                    if let Some(window) = self.widget.handle() {
                        self.windows.show_window(window, false);
                    }
                    self.state.in_place_visible.set(false);
                }
                Ok(())
            }
            other => Err(AxError::external(
                "verb dispatch",
                ComError::Unexpected(format!("verb {other:?} is not supported")),
            )),
        }
    }

    /*
     * Brings the widget from not-active to in-place-active and, for UI
     * verbs, on to UI-active. Every step is skipped when its state is
     * already reached, so re-activation is cheap and idempotent.
     */
    pub fn in_place_activate(&self, verb: OleVerb) -> AxResult<()> {
        self.affinity.ensure()?;

        // Without an in-place-capable site there is nothing to negotiate.
        let Some(site) = self.site() else {
            return Ok(());
        };
        let Some(in_place) = site.as_in_place_site() else {
            return Ok(());
        };

        if !self.state.in_place_active.get() {
            if !in_place.can_in_place_activate() {
                return Err(AxError::external(
                    "in-place activation",
                    ComError::Unexpected("host refused in-place activation".into()),
                ));
            }
            in_place
                .on_in_place_activate()
                .map_err(|e| AxError::external("in-place activation", e))?;
            self.state.in_place_active.set(true);
        }

        if !self.state.in_place_visible.get() {
            let host_window = in_place
                .get_window()
                .map_err(|e| AxError::external("host window query", e))?;

            // Stale frame objects from a previous activation go first.
            *self.in_place_ui_window.borrow_mut() = None;
            *self.in_place_frame.borrow_mut() = None;

            let context = in_place
                .get_window_context()
                .map_err(|e| AxError::external("window context query", e))?;
            self.set_object_rects(context.pos_rect, context.clip_rect)?;
            *self.in_place_frame.borrow_mut() = Some(context.frame);
            *self.in_place_ui_window.borrow_mut() = context.ui_window;

            self.host_parent.set(host_window);
            let child = match self.widget.handle() {
                Some(handle) => handle,
                None => self.widget.create_handle()?,
            };
            self.windows.set_parent(child, host_window)?;

            site.show_object()
                .map_err(|e| AxError::external("show object", e))?;
            self.widget.set_visible(true);
            self.windows.show_window(child, true);
            self.state.in_place_visible.set(true);
        }

        if !verb.requests_ui_activation() {
            return Ok(());
        }
        if self.state.ui_active.get() {
            return Ok(());
        }

        // Flag first: the host may call back into us from the
        // notifications below and must see us as already UI-active.
        self.state.ui_active.set(true);

        in_place
            .on_ui_activate()
            .map_err(|e| AxError::external("ui activation", e))?;

        if !self.widget.contains_focus() {
            self.widget.focus();
            if let Some(window) = self.widget.handle() {
                self.windows.focus_window(window);
            }
        }

        let frame = self.in_place_frame.borrow().clone().ok_or_else(|| {
            AxError::InvalidState("ui activation without an in-place frame".into())
        })?;
        let active: Rc<dyn ActiveObject> = self
            .this
            .upgrade()
            .ok_or_else(|| AxError::InvalidState("embedding already dropped".into()))?;

        let name = self.widget.name();
        frame
            .set_active_object(Some(active.clone()), Some(&name))
            .map_err(|e| AxError::external("active object registration", e))?;
        let ui_window = self.in_place_ui_window.borrow().clone();
        if let Some(ui_window) = &ui_window {
            ui_window
                .set_active_object(Some(active), Some(&name))
                .map_err(|e| AxError::external("active object registration", e))?;
        }

        // We want no border space; "not supported" answers are fine.
        clear_border_space(frame.as_ref())?;
        if let Some(ui_window) = &ui_window {
            clear_border_space(ui_window.as_ref())?;
        }

        log::debug!("OleEmbedding: UI active");
        Ok(())
    }

    /// Withdraws UI activation. A no-op when not UI-active.
    pub fn ui_deactivate(&self) -> AxResult<()> {
        self.affinity.ensure()?;
        if !self.state.ui_active.get() {
            return Ok(());
        }
        self.state.ui_active.set(false);

        if let Some(ui_window) = self.in_place_ui_window.borrow().clone() {
            ui_window
                .set_active_object(None, None)
                .map_err(|e| AxError::external("active object withdrawal", e))?;
        }
        if let Some(frame) = self.in_place_frame.borrow().clone() {
            frame
                .set_active_object(None, None)
                .map_err(|e| AxError::external("active object withdrawal", e))?;
        }
        if let Some(site) = self.site()
            && let Some(in_place) = site.as_in_place_site()
        {
            in_place
                .on_ui_deactivate(false)
                .map_err(|e| AxError::external("ui deactivation", e))?;
        }
        Ok(())
    }

    /// Withdraws in-place activation entirely. A no-op when not active.
    pub fn in_place_deactivate(&self) -> AxResult<()> {
        self.affinity.ensure()?;
        if !self.state.in_place_active.get() {
            return Ok(());
        }
        if self.state.ui_active.get() {
            self.ui_deactivate()?;
        }

        // Containers call back in to save mid-teardown; the state bits go
        // first so that re-entry sees us already inactive.
        self.state.in_place_active.set(false);
        self.state.in_place_visible.set(false);

        if let Some(site) = self.site()
            && let Some(in_place) = site.as_in_place_site()
        {
            in_place
                .on_in_place_deactivate()
                .map_err(|e| AxError::external("in-place deactivation", e))?;
        }

        self.widget.set_visible(false);
        self.host_parent.set(WindowHandle::INVALID);
        *self.in_place_ui_window.borrow_mut() = None;
        *self.in_place_frame.borrow_mut() = None;
        Ok(())
    }

    /*
     * Full teardown in the fixed disposal order: frame window, UI window,
     * client site, advise sink. A dirty component asks its site to save
     * first when the host requested it.
     */
    pub fn close(&self, save: bool) -> AxResult<()> {
        self.affinity.ensure()?;
        if save
            && self.state.dirty.get()
            && let Some(site) = self.site()
        {
            site.save_object()
                .map_err(|e| AxError::external("save on close", e))?;
        }
        self.in_place_deactivate()?;
        *self.in_place_frame.borrow_mut() = None;
        *self.in_place_ui_window.borrow_mut() = None;
        *self.client_site.borrow_mut() = None;
        *self.view_sink.borrow_mut() = None;
        Ok(())
    }

    /// Host geometry applied to us. Guarded so the widget's resulting
    /// bounds-change notification cannot echo back out.
    pub fn set_object_rects(&self, pos_rect: Rect, _clip_rect: Rect) -> AxResult<()> {
        let Some(_token) = self.adjusting_rect.try_enter() else {
            return Ok(());
        };
        self.widget.set_bounds(pos_rect);
        Ok(())
    }

    /*
     * Called by the widget layer whenever our widget's bounds change of
     * its own accord; proposes the new geometry to the host. Skipped while
     * we are the ones adjusting, or before we are visible.
     */
    pub fn on_widget_bounds_changed(&self) -> AxResult<()> {
        if self.adjusting_rect.is_held() || !self.state.in_place_visible.get() {
            return Ok(());
        }
        let Some(site) = self.site() else {
            return Ok(());
        };
        let Some(in_place) = site.as_in_place_site() else {
            return Ok(());
        };
        let _token = self.adjusting_rect.try_enter();
        in_place
            .on_pos_rect_change(self.widget.bounds())
            .map_err(|e| AxError::external("pos-rect change", e))
    }

    /// Current extent in HIMETRIC units.
    pub fn get_extent(&self) -> AxResult<Size> {
        Ok(size_to_himetric(self.widget.bounds().size()))
    }

    /*
     * Host-proposed extent in HIMETRIC units. The changing-extents token
     * absorbs the size notification the host echoes back at us; the inner
     * call observes no change and returns the current extent. Answers with
     * the extent actually adopted (the widget may constrain it).
     */
    pub fn set_extent(&self, extent: Size) -> AxResult<Size> {
        self.affinity.ensure()?;
        let Some(_token) = self.changing_extents.try_enter() else {
            return self.get_extent();
        };
        let proposed = size_from_himetric(extent);
        let bounds = self.widget.bounds().with_size(proposed);
        self.widget.set_bounds(bounds);
        if self.state.in_place_active.get()
            && let Some(site) = self.site()
            && let Some(in_place) = site.as_in_place_site()
        {
            in_place
                .on_pos_rect_change(self.widget.bounds())
                .map_err(|e| AxError::external("extent change", e))?;
        }
        self.state.dirty.set(true);
        self.view_changed();
        Ok(size_to_himetric(self.widget.bounds().size()))
    }

    /*
     * Accelerator table query. The table is rebuilt only when the stale
     * sentinel is set; text changes anywhere in the subtree invalidate it
     * through `invalidate_accelerators`.
     */
    pub fn get_control_info(&self) -> AxResult<ControlInfo> {
        if self.accel_count.get() == ACCEL_STALE {
            let mut mnemonics = Vec::new();
            accelerator::collect_mnemonics(&self.widget, &mut mnemonics);
            let table = accelerator::build_table(&mnemonics);
            log::debug!(
                "OleEmbedding: rebuilt accelerator table, {} entries from {} mnemonics",
                table.len(),
                mnemonics.len()
            );
            self.accel_count.set(table.len() as i32);
            *self.accel_table.borrow_mut() = table;
        }
        Ok(ControlInfo {
            accelerators: self.accel_table.borrow().clone(),
        })
    }

    /// Marks the accelerator table stale; recomputed on next query.
    pub fn invalidate_accelerators(&self) {
        self.accel_count.set(ACCEL_STALE);
    }

    /*
     * Keyboard routing for the four key-input message kinds: the focused
     * widget's own pre-processing gets first refusal, a claimed-but-
     * undispatched message is translated and dispatched locally, and
     * everything else is offered to the host's control site with the live
     * modifier state. The answer is whether the message was consumed.
     */
    pub fn translate_accelerator(&self, message: &InputMessage) -> AxResult<bool> {
        self.affinity.ensure()?;
        if message.kind.is_some() && !self.ambient_ui_dead() {
            match self.widget.pre_process_input(message) {
                crate::types::PreProcessResult::Processed => return Ok(true),
                crate::types::PreProcessResult::NeedsDispatch => {
                    self.windows.translate_and_dispatch(message);
                    return Ok(true);
                }
                crate::types::PreProcessResult::NotNeeded => {}
            }
        }

        let Some(site) = self.site() else {
            return Ok(false);
        };
        let Some(control_site) = site.as_control_site() else {
            return Ok(false);
        };
        control_site
            .translate_accelerator(message, self.windows.modifier_state())
            .map_err(|e| AxError::external("accelerator forwarding", e))
    }

    pub fn on_ambient_property_change(&self, dispid: DispId) {
        self.ambients.borrow_mut().invalidate(dispid);
    }

    fn fetch_ambient(&self, dispid: DispId) -> Option<Variant> {
        let site = self.site()?;
        if let Some(hit) = self.ambients.borrow().cached(dispid) {
            return hit;
        }
        // The cache borrow must not span the host call: ambient lookups
        // are exactly where hosts like to notify back into us.
        let value = site.get_ambient_property(dispid);
        self.ambients.borrow_mut().store(dispid, value.clone());
        value
    }

    pub fn ambient_user_mode(&self) -> bool {
        self.fetch_ambient(DispId::AMBIENT_USERMODE)
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    pub fn ambient_ui_dead(&self) -> bool {
        self.fetch_ambient(DispId::AMBIENT_UIDEAD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn ambient_back_color(&self) -> Option<crate::types::OleColor> {
        self.fetch_ambient(DispId::AMBIENT_BACKCOLOR)
            .and_then(|v| v.as_color())
    }

    pub fn freeze_events(&self, freeze: bool) -> AxResult<()> {
        if freeze {
            self.freeze.freeze();
            Ok(())
        } else {
            self.freeze.thaw().map(|_| ())
        }
    }

    /// Property change entry point for the widget layer: dirties the state
    /// and notifies the container's property sink unless frozen.
    pub fn on_property_changed(&self, dispid: DispId) {
        self.state.dirty.set(true);
        if self.freeze.frozen() {
            return;
        }
        if let Some(sink) = self.property_sink.borrow().clone() {
            sink.on_changed(dispid);
        }
    }

    // --- persistence ------------------------------------------------------

    /// Fresh-state initialization; nothing to restore.
    pub fn init_new(&self) -> AxResult<()> {
        self.state.dirty.set(false);
        Ok(())
    }

    /// Stream load tunnels through the bag: full fidelity lives there.
    pub fn load_from_stream(&self, data: &[u8]) -> AxResult<()> {
        let bag = PropertyBag::from_wire(data)?;
        self.load_bag(&bag, None)
    }

    pub fn save_to_stream(&self, clear_dirty: bool) -> AxResult<Vec<u8>> {
        let mut bag = PropertyBag::new();
        self.save_bag(&mut bag, clear_dirty)?;
        Ok(bag.to_wire())
    }

    /*
     * Bag load. Individual property failures are recorded against the
     * error log with the offending name and never abort the remaining
     * properties; only a structurally broken bag is fail-fast.
     */
    pub fn load_bag(
        &self,
        bag: &PropertyBag,
        mut error_log: Option<&mut dyn ErrorLog>,
    ) -> AxResult<()> {
        self.affinity.ensure()?;
        let source = self.widget.name();
        for name in self.properties.property_names() {
            let Some(value) = bag.read(&name) else {
                continue;
            };
            let Some(kind) = self.properties.property_kind(&name) else {
                continue;
            };
            let result = self.load_one(&name, kind, value);
            if let Err(error) = result {
                log::warn!("OleEmbedding: failed to load property '{name}': {error}");
                if let Some(log) = error_log.as_deref_mut() {
                    log.add_error(&name, &source, &error.to_string());
                }
            }
        }
        self.state.dirty.set(false);
        Ok(())
    }

    fn load_one(&self, name: &str, kind: PropertyKind, value: &str) -> AxResult<()> {
        match kind {
            PropertyKind::StringRoundTrip => self.properties.write_string(name, value),
            PropertyKind::BytesRoundTrip => {
                let bytes = BASE64
                    .decode(value)
                    .map_err(|e| AxError::Persistence(format!("bad base64 in '{name}': {e}")))?;
                self.properties.write_bytes(name, &bytes)
            }
            PropertyKind::Opaque => {
                let bytes = BASE64
                    .decode(value)
                    .map_err(|e| AxError::Persistence(format!("bad base64 in '{name}': {e}")))?;
                let decoded = self.codec.decode(&bytes)?;
                self.properties.write_opaque(name, decoded)
            }
        }
    }

    /*
     * Bag save. The saving flag suppresses view-advise echo for the
     * duration: a component repainting because it is persisting is noise.
     */
    pub fn save_bag(&self, bag: &mut PropertyBag, clear_dirty: bool) -> AxResult<()> {
        self.affinity.ensure()?;
        self.state.saving.set(true);
        let result = self.save_bag_inner(bag);
        self.state.saving.set(false);
        result?;
        if clear_dirty {
            self.state.dirty.set(false);
        }
        if let Some(sink) = self.view_sink.borrow().clone() {
            sink.on_save();
        }
        Ok(())
    }

    fn save_bag_inner(&self, bag: &mut PropertyBag) -> AxResult<()> {
        for name in self.properties.property_names() {
            let Some(kind) = self.properties.property_kind(&name) else {
                continue;
            };
            let encoded = match kind {
                PropertyKind::StringRoundTrip => self.properties.read_string(&name),
                PropertyKind::BytesRoundTrip => self
                    .properties
                    .read_bytes(&name)
                    .map(|bytes| BASE64.encode(bytes)),
                PropertyKind::Opaque => self
                    .properties
                    .read_opaque(&name)
                    .and_then(|value| self.codec.encode(&value))
                    .map(|bytes| BASE64.encode(bytes)),
            };
            match encoded {
                Ok(value) => bag.write(&name, &value),
                Err(error) => {
                    // Skip, keep the batch going; symmetrical with load.
                    log::warn!("OleEmbedding: failed to save property '{name}': {error}");
                }
            }
        }
        Ok(())
    }

    // --- view object ------------------------------------------------------

    pub fn draw(&self, surface: &mut dyn DrawSurface, bounds: Rect) -> AxResult<()> {
        self.widget.paint(surface, bounds);
        Ok(())
    }

    pub fn set_view_advise(&self, aspect: DrawAspect, sink: Option<Rc<dyn AdviseSink>>) {
        self.view_aspect.set(aspect);
        *self.view_sink.borrow_mut() = sink;
    }

    pub fn get_view_advise(&self) -> Option<Rc<dyn AdviseSink>> {
        self.view_sink.borrow().clone()
    }

    /// Notifies the view advise sink unless a save is in flight.
    pub fn view_changed(&self) {
        if self.state.saving.get() {
            return;
        }
        if let Some(sink) = self.view_sink.borrow().clone() {
            sink.on_view_change(self.view_aspect.get());
        }
    }
}

impl ActiveObject for OleEmbedding {
    fn translate_accelerator(&self, message: &InputMessage) -> ComResult<bool> {
        OleEmbedding::translate_accelerator(self, message)
            .map_err(|e| ComError::Unexpected(e.to_string()))
    }

    fn on_doc_window_activate(&self, active: bool) -> ComResult<()> {
        if active && self.state.ui_active.get() {
            // Re-assert our zero border space; tolerated answers are fine.
            if let Some(ui_window) = self.in_place_ui_window.borrow().clone() {
                clear_border_space(ui_window.as_ref())
                    .map_err(|e| ComError::Unexpected(e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn clear_border_space(frame: &dyn FrameWindow) -> AxResult<()> {
    match frame.set_border_space(None) {
        Ok(()) => Ok(()),
        Err(error) if error.is_tolerated_negotiation() => Ok(()),
        Err(error) => Err(AxError::external("border space", error)),
    }
}

fn to_com(error: AxError) -> ComError {
    error.into_com()
}

/*
 * Adapter that turns an `OleEmbedding` into a hostable component: the
 * mirrored halves meet here. A toolkit registers its own widgets as
 * embeddable components by wrapping their embedding in this adapter and
 * handing it to any container engine.
 */
pub struct EmbeddedComponent {
    embedding: Rc<OleEmbedding>,
    object_sink: RefCell<Option<Rc<dyn AdviseSink>>>,
}

impl EmbeddedComponent {
    pub fn new(embedding: Rc<OleEmbedding>) -> Rc<Self> {
        Rc::new(Self {
            embedding,
            object_sink: RefCell::new(None),
        })
    }

    pub fn embedding(&self) -> &Rc<OleEmbedding> {
        &self.embedding
    }
}

impl OleControl for EmbeddedComponent {
    fn do_verb(&self, verb: OleVerb) -> ComResult<()> {
        self.embedding.do_verb(verb).map_err(to_com)
    }

    fn set_client_site(&self, site: Option<Rc<dyn ClientSite>>) -> ComResult<()> {
        self.embedding.set_client_site(site);
        Ok(())
    }

    fn client_site(&self) -> Option<Rc<dyn ClientSite>> {
        self.embedding.client_site()
    }

    fn get_extent(&self) -> ComResult<Size> {
        self.embedding.get_extent().map_err(to_com)
    }

    fn set_extent(&self, extent: Size) -> ComResult<Size> {
        self.embedding.set_extent(extent).map_err(to_com)
    }

    fn advise(&self, sink: Rc<dyn AdviseSink>) -> ComResult<u32> {
        *self.object_sink.borrow_mut() = Some(sink);
        Ok(1)
    }

    fn unadvise(&self, cookie: u32) -> ComResult<()> {
        if cookie != 1 || self.object_sink.borrow().is_none() {
            return Err(ComError::Unexpected(format!("unknown advise cookie {cookie}")));
        }
        *self.object_sink.borrow_mut() = None;
        Ok(())
    }

    fn enum_verbs(&self) -> ComResult<Vec<OleVerb>> {
        Ok(vec![
            OleVerb::Primary,
            OleVerb::Show,
            OleVerb::Hide,
            OleVerb::UiActivate,
            OleVerb::InPlaceActivate,
        ])
    }

    fn close(&self, save: bool) -> ComResult<()> {
        let result = self.embedding.close(save).map_err(to_com);
        if let Some(sink) = self.object_sink.borrow().clone() {
            sink.on_close();
        }
        result
    }

    fn freeze_events(&self, freeze: bool) {
        if let Err(error) = self.embedding.freeze_events(freeze) {
            log::warn!("EmbeddedComponent: unbalanced freeze/thaw: {error}");
        }
    }

    fn on_ambient_property_change(&self, dispid: DispId) {
        self.embedding.on_ambient_property_change(dispid);
    }

    fn get_control_info(&self) -> ComResult<ControlInfo> {
        self.embedding.get_control_info().map_err(to_com)
    }

    fn get_window(&self) -> ComResult<WindowHandle> {
        self.embedding
            .widget()
            .handle()
            .ok_or(ComError::NotImplemented)
    }

    fn as_persist_stream(&self) -> Option<&dyn PersistStream> {
        Some(self)
    }

    fn as_persist_stream_init(&self) -> Option<&dyn PersistStreamInit> {
        Some(self)
    }

    fn as_persist_property_bag(&self) -> Option<&dyn PersistPropertyBag> {
        Some(self)
    }

    fn as_in_place_object(&self) -> Option<&dyn InPlaceObject> {
        Some(self)
    }

    fn as_active_object(&self) -> Option<&dyn ActiveObject> {
        Some(self)
    }

    fn as_view_object(&self) -> Option<&dyn ViewObject> {
        Some(self)
    }
}

impl PersistStream for EmbeddedComponent {
    fn is_dirty(&self) -> bool {
        self.embedding.is_dirty()
    }

    fn load(&self, data: &[u8]) -> ComResult<()> {
        self.embedding.load_from_stream(data).map_err(to_com)
    }

    fn save(&self, clear_dirty: bool) -> ComResult<Vec<u8>> {
        self.embedding.save_to_stream(clear_dirty).map_err(to_com)
    }
}

impl PersistStreamInit for EmbeddedComponent {
    fn init_new(&self) -> ComResult<()> {
        self.embedding.init_new().map_err(to_com)
    }
}

impl PersistPropertyBag for EmbeddedComponent {
    fn init_new(&self) -> ComResult<()> {
        self.embedding.init_new().map_err(to_com)
    }

    fn load(&self, bag: &PropertyBag, error_log: Option<&mut dyn ErrorLog>) -> ComResult<()> {
        self.embedding.load_bag(bag, error_log).map_err(to_com)
    }

    fn save(&self, bag: &mut PropertyBag, clear_dirty: bool) -> ComResult<()> {
        self.embedding.save_bag(bag, clear_dirty).map_err(to_com)
    }
}

impl InPlaceObject for EmbeddedComponent {
    fn set_object_rects(&self, pos_rect: Rect, clip_rect: Rect) -> ComResult<()> {
        self.embedding
            .set_object_rects(pos_rect, clip_rect)
            .map_err(to_com)
    }

    fn in_place_deactivate(&self) -> ComResult<()> {
        self.embedding.in_place_deactivate().map_err(to_com)
    }

    fn ui_deactivate(&self) -> ComResult<()> {
        self.embedding.ui_deactivate().map_err(to_com)
    }
}

impl ActiveObject for EmbeddedComponent {
    fn translate_accelerator(&self, message: &InputMessage) -> ComResult<bool> {
        self.embedding
            .translate_accelerator(message)
            .map_err(to_com)
    }

    fn on_doc_window_activate(&self, active: bool) -> ComResult<()> {
        ActiveObject::on_doc_window_activate(self.embedding.as_ref(), active)
    }
}

impl ViewObject for EmbeddedComponent {
    fn draw(&self, surface: &mut dyn DrawSurface, bounds: Rect) -> ComResult<()> {
        self.embedding.draw(surface, bounds).map_err(to_com)
    }

    fn set_advise(&self, aspect: DrawAspect, sink: Option<Rc<dyn AdviseSink>>) -> ComResult<()> {
        self.embedding.set_view_advise(aspect, sink);
        Ok(())
    }

    fn get_advise(&self) -> ComResult<Option<Rc<dyn AdviseSink>>> {
        Ok(self.embedding.get_view_advise())
    }
}
