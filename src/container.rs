/*
 * Container-side activation engine: hosts a foreign COM component as a
 * child widget and drives it through the five-level lifecycle
 * PASSIVE → LOADED → RUNNING → INPLACE → UIACTIVE.
 *
 * Transitions move one level per loop iteration, performing the side
 * effect bound to the current level before advancing, under a transition
 * token: a component calling back into the engine mid-transition finds
 * the token held and the nested call becomes a no-op instead of
 * restarting the loop.
 *
 * The engine owns the component reference, the persisted-state object and
 * the event-sink cookie, and disposes them deterministically on the way
 * down so the component never calls back into a half-torn-down host.
 */

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::com::{
    ActiveObject, ClientSite, ComError, ComResult, ComponentFactory, ContainerFlags,
    EventSink, FrameWindow, InPlaceSite, MiscStatus, OleControl, PersistStream,
    PropertyNotifySink, QuickActivateContainer, WindowContext,
};
use crate::error::{AxError, Result as AxResult};
use crate::guards::{FreezeCounter, ReentryGate, SingleThreadAffinity};
use crate::ocx_state::{OcxState, StorageKind};
use crate::property_bag::PropertyBag;
use crate::types::{
    DispId, OleVerb, Rect, Size, Variant, size_from_himetric, size_to_himetric,
};
use crate::widget::WidgetPeer;
use crate::window_system::{WindowHandle, WindowSystem, WndProcId};

// Marker bit mixed into a window handle to form the host's own
// window-procedure identity for subclass bookkeeping.
const HOST_SUBCLASS_MARK: usize = 0x4000_0000;

/*
 * Ordered lifecycle levels. The numeric values are the legacy on-the-wire
 * ones (INPLACE and UIACTIVE skip); ordering always goes through
 * `value()`, never the enum discriminants.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcLevel {
    Passive,
    Loaded,
    Running,
    InPlace,
    UiActive,
}

impl OcLevel {
    pub fn value(self) -> i32 {
        match self {
            OcLevel::Passive => 0,
            OcLevel::Loaded => 1,
            OcLevel::Running => 2,
            OcLevel::InPlace => 4,
            OcLevel::UiActive => 8,
        }
    }
}

/// Construction-time knobs, passed the way the toolkit passes its window
/// configuration structs.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Run mode vs. design mode. Events flow only in run mode.
    pub user_mode: bool,
    pub license_key: Option<String>,
}

pub struct OcxHost {
    inner: Rc<HostInner>,
}

struct HostInner {
    affinity: SingleThreadAffinity,
    config: HostConfig,
    widget: Rc<dyn WidgetPeer>,
    windows: Rc<dyn WindowSystem>,
    factory: Rc<dyn ComponentFactory>,
    level: Cell<OcLevel>,
    in_transition: ReentryGate,
    bounds_gate: ReentryGate,
    component: RefCell<Option<Rc<dyn OleControl>>>,
    storage_kind: Cell<StorageKind>,
    ocx_state: RefCell<Option<OcxState>>,
    state_was_set: Cell<bool>,
    size_negotiated: Cell<bool>,
    site: Rc<OcxSite>,
    frame: RefCell<Option<Rc<HostFrame>>>,
    event_sink: RefCell<Option<Rc<dyn EventSink>>>,
    sink_cookie: Cell<Option<u32>>,
    misc: Cell<MiscStatus>,
    recorded_wndproc: Cell<Option<WndProcId>>,
    manual_update: Cell<bool>,
    faking_window: Cell<bool>,
    fake_window: Cell<WindowHandle>,
    component_window: Cell<WindowHandle>,
    freeze: FreezeCounter,
}

impl OcxHost {
    pub fn new(
        widget: Rc<dyn WidgetPeer>,
        windows: Rc<dyn WindowSystem>,
        factory: Rc<dyn ComponentFactory>,
        config: HostConfig,
    ) -> Self {
        let inner = Rc::new_cyclic(|host| HostInner {
            affinity: SingleThreadAffinity::capture(),
            config,
            widget,
            windows,
            factory,
            level: Cell::new(OcLevel::Passive),
            in_transition: ReentryGate::new(),
            bounds_gate: ReentryGate::new(),
            component: RefCell::new(None),
            storage_kind: Cell::new(StorageKind::Unknown),
            ocx_state: RefCell::new(None),
            state_was_set: Cell::new(false),
            size_negotiated: Cell::new(false),
            site: Rc::new(OcxSite { host: host.clone() }),
            frame: RefCell::new(None),
            event_sink: RefCell::new(None),
            sink_cookie: Cell::new(None),
            misc: Cell::new(MiscStatus::default()),
            recorded_wndproc: Cell::new(None),
            manual_update: Cell::new(false),
            faking_window: Cell::new(false),
            fake_window: Cell::new(WindowHandle::INVALID),
            component_window: Cell::new(WindowHandle::INVALID),
            freeze: FreezeCounter::new(),
        });
        Self { inner }
    }

    pub fn level(&self) -> OcLevel {
        self.inner.level.get()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.inner.storage_kind.get()
    }

    pub fn has_component(&self) -> bool {
        self.inner.component.borrow().is_some()
    }

    pub fn manual_update(&self) -> bool {
        self.inner.manual_update.get()
    }

    pub fn is_faking_window(&self) -> bool {
        self.inner.faking_window.get()
    }

    /// Event sink the engine connects when reaching RUNNING in run mode.
    pub fn set_event_sink(&self, sink: Option<Rc<dyn EventSink>>) {
        *self.inner.event_sink.borrow_mut() = sink;
    }

    pub fn transition_up_to(&self, target: OcLevel) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        self.inner.transition_up_to(target)
    }

    pub fn transition_down_to(&self, target: OcLevel) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        self.inner.transition_down_to(target)
    }

    pub fn do_verb(&self, verb: OleVerb) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        let component = self.inner.component()?;
        component
            .do_verb(verb)
            .map_err(|e| AxError::external("verb dispatch", e))
    }

    /// The component's advertised verb set; components without an
    /// enumerator advertise nothing.
    pub fn verbs(&self) -> AxResult<Vec<OleVerb>> {
        self.inner.affinity.ensure()?;
        let component = self.inner.component()?;
        match component.enum_verbs() {
            Ok(verbs) => Ok(verbs),
            Err(ComError::NotImplemented) => Ok(Vec::new()),
            Err(error) => Err(AxError::external("verb enumeration", error)),
        }
    }

    pub fn set_bounds(&self, bounds: Rect) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        self.inner.set_bounds(bounds)
    }

    /*
     * Captures the component's current persisted state through whichever
     * persistence interface the component was pinned to.
     */
    pub fn ocx_state(&self) -> AxResult<Option<OcxState>> {
        self.inner.affinity.ensure()?;
        self.inner.capture_state()?;
        Ok(self.inner.ocx_state.borrow().clone())
    }

    /*
     * Assigns persisted state for the next depersistence. Once the
     * component has been depersisted with a given kind, a state object of
     * any other kind is rejected. [ODU-StorageKindPinV1]
     */
    pub fn set_ocx_state(&self, state: OcxState) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        let pinned = self.inner.storage_kind.get();
        if pinned != StorageKind::Unknown && pinned != state.kind() {
            return Err(AxError::InvalidState(format!(
                "component is pinned to storage kind {pinned:?}; cannot accept {:?} state",
                state.kind()
            )));
        }
        *self.inner.ocx_state.borrow_mut() = Some(state);
        self.inner.state_was_set.set(true);

        // A live component re-reads the new state by bouncing through
        // LOADED and back up to where it was.
        let level = self.inner.level.get();
        if level.value() > OcLevel::Loaded.value() {
            self.inner.transition_down_to(OcLevel::Loaded)?;
            self.inner.transition_up_to(level)?;
        }
        Ok(())
    }

    pub fn freeze_events(&self, freeze: bool) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        if freeze {
            self.inner.freeze.freeze();
        } else {
            self.inner.freeze.thaw()?;
        }
        if let Some(component) = self.inner.component.borrow().clone() {
            component.freeze_events(freeze);
        }
        Ok(())
    }

    /// Tears the component all the way down and releases it.
    pub fn dispose(&self) -> AxResult<()> {
        self.inner.affinity.ensure()?;
        self.inner.transition_down_to(OcLevel::Passive)
    }
}

impl HostInner {
    fn component(&self) -> AxResult<Rc<dyn OleControl>> {
        self.component
            .borrow()
            .clone()
            .ok_or_else(|| AxError::InvalidState("no component instance".into()))
    }

    fn site_rc(&self) -> Rc<OcxSite> {
        self.site.clone()
    }

    fn transition_up_to(&self, target: OcLevel) -> AxResult<()> {
        let Some(_token) = self.in_transition.try_enter() else {
            log::debug!("OcxHost: nested transition_up_to absorbed");
            return Ok(());
        };
        while self.level.get().value() < target.value() {
            match self.level.get() {
                OcLevel::Passive => {
                    self.create_component()?;
                    self.level.set(OcLevel::Loaded);
                }
                OcLevel::Loaded => {
                    self.activate_component()?;
                    self.level.set(OcLevel::Running);
                    if self.config.user_mode {
                        self.start_events();
                    }
                }
                OcLevel::Running => {
                    if self.misc.get().invisible_at_runtime && self.config.user_mode {
                        // The component never shows a window at run time;
                        // RUNNING is as far as it goes.
                        log::debug!("OcxHost: invisible-at-runtime, staying at RUNNING");
                        return Ok(());
                    }
                    self.go_in_place()?;
                    self.level.set(OcLevel::InPlace);
                }
                OcLevel::InPlace => {
                    self.ui_activate()?;
                    self.level.set(OcLevel::UiActive);
                }
                OcLevel::UiActive => break,
            }
        }
        Ok(())
    }

    fn transition_down_to(&self, target: OcLevel) -> AxResult<()> {
        let Some(_token) = self.in_transition.try_enter() else {
            log::debug!("OcxHost: nested transition_down_to absorbed");
            return Ok(());
        };
        while self.level.get().value() > target.value() {
            match self.level.get() {
                OcLevel::UiActive => {
                    self.ui_deactivate()?;
                    self.level.set(OcLevel::InPlace);
                }
                OcLevel::InPlace => {
                    if self.faking_window.get() {
                        // Clear the flag before destroying: the teardown
                        // recurses and must not re-enter this path.
                        self.faking_window.set(false);
                        let fake = self.fake_window.get();
                        self.fake_window.set(WindowHandle::INVALID);
                        if !fake.is_invalid() {
                            self.windows.destroy_window(fake);
                        }
                    } else {
                        self.in_place_deactivate()?;
                    }
                    self.level.set(OcLevel::Running);
                }
                OcLevel::Running => {
                    self.stop_events();
                    self.close_component()?;
                    self.level.set(OcLevel::Loaded);
                }
                OcLevel::Loaded => {
                    self.release_component();
                    self.level.set(OcLevel::Passive);
                }
                OcLevel::Passive => break,
            }
        }
        Ok(())
    }

    // --- upward side effects ---------------------------------------------

    /// PASSIVE→LOADED: instantiate through the class factory. A licensing
    /// refusal surfaces as the dedicated licensing error.
    fn create_component(&self) -> AxResult<()> {
        let component = self
            .factory
            .create_instance(self.config.license_key.as_deref())
            .map_err(|error| match error {
                ComError::NotLicensed => {
                    AxError::NotLicensed(self.factory.class_name().to_string())
                }
                other => AxError::external("component creation", other),
            })?;
        log::debug!("OcxHost: created component '{}'", self.factory.class_name());
        *self.component.borrow_mut() = Some(component);
        Ok(())
    }

    /// LOADED→RUNNING: quick-activation fast path, slow path fallback,
    /// then depersistence.
    fn activate_component(&self) -> AxResult<()> {
        if !self.try_quick_activate()? {
            self.slow_activate()?;
        }
        Ok(())
    }

    /*
     * The quick-activation fast path: one batched call carrying the client
     * site, sinks and ambient values. A component without the capability,
     * or one that fails the call, falls back to the slow path.
     */
    fn try_quick_activate(&self) -> AxResult<bool> {
        let component = self.component()?;
        let Some(quick) = component.as_quick_activate() else {
            return Ok(false);
        };
        let site = self.site_rc();
        let container = QuickActivateContainer {
            client_site: site.clone() as Rc<dyn ClientSite>,
            property_notify_sink: Some(site as Rc<dyn PropertyNotifySink>),
            event_sink: self.event_sink.borrow().clone(),
            ambient_back_color: self.widget.back_color(),
            ambient_fore_color: self.widget.fore_color(),
            ambient_font: None,
            flags: ContainerFlags {
                auto_clip: true,
                message_reflect: true,
                supports_mnemonics: true,
                user_mode: self.config.user_mode,
                ui_dead: false,
            },
        };
        match quick.quick_activate(container) {
            Ok(control) => {
                self.misc.set(control.misc_status);
                if let Some(cookie) = control.event_cookie {
                    self.sink_cookie.set(Some(cookie));
                }
                self.depersist()?;
                Ok(true)
            }
            Err(error) => {
                log::warn!("OcxHost: quick activation failed ({error}), using slow path");
                Ok(false)
            }
        }
    }

    fn slow_activate(&self) -> AxResult<()> {
        let component = self.component()?;
        component
            .set_client_site(Some(self.site_rc() as Rc<dyn ClientSite>))
            .map_err(|e| AxError::external("client site assignment", e))?;
        self.depersist()
    }

    /*
     * Depersistence dispatch, under a balanced event freeze. With no prior
     * state the persistence interfaces are probed in fixed order:
     * StreamInit (explicit InitNew), Stream (no init call; re-saving
     * performs it implicitly), Storage (backing store created first),
     * PropertyBag. With prior state the state's kind dictates the
     * interface, allowing the one legal StreamInit→Stream downgrade.
     */
    fn depersist(&self) -> AxResult<()> {
        let component = self.component()?;
        component.freeze_events(true);
        self.freeze.freeze();
        let result = self.depersist_inner(&component);
        component.freeze_events(false);
        let _ = self.freeze.thaw();
        result
    }

    fn depersist_inner(&self, component: &Rc<dyn OleControl>) -> AxResult<()> {
        if self.ocx_state.borrow().is_none() {
            return self.init_fresh(component);
        }

        // Take the state out for the duration: the component must never
        // observe a half-read state object through a callback.
        let mut state = self
            .ocx_state
            .borrow_mut()
            .take()
            .ok_or_else(|| AxError::InvalidState("persisted state disappeared".into()))?;
        let result = self.load_from_state(component, &mut state);
        *self.ocx_state.borrow_mut() = Some(state);
        result
    }

    fn init_fresh(&self, component: &Rc<dyn OleControl>) -> AxResult<()> {
        if let Some(stream_init) = component.as_persist_stream_init() {
            self.storage_kind.set(StorageKind::StreamInit);
            return stream_init
                .init_new()
                .map_err(|e| AxError::external("stream-init InitNew", e));
        }
        if component.as_persist_stream().is_some() {
            self.storage_kind.set(StorageKind::Stream);
            return Ok(());
        }
        if let Some(storage) = component.as_persist_storage() {
            self.storage_kind.set(StorageKind::Storage);
            let mut state =
                OcxState::new_storage(false, self.config.license_key.clone());
            {
                let backing = state
                    .storage_mut()
                    .ok_or_else(|| AxError::InvalidState("fresh storage has no backing".into()))?;
                storage
                    .init_new(backing)
                    .map_err(|e| AxError::external("storage InitNew", e))?;
                backing.commit();
            }
            *self.ocx_state.borrow_mut() = Some(state);
            return Ok(());
        }
        if let Some(bag) = component.as_persist_property_bag() {
            self.storage_kind.set(StorageKind::PropertyBag);
            return bag
                .init_new()
                .map_err(|e| AxError::external("property-bag InitNew", e));
        }
        Err(AxError::InvalidState(
            "component implements no persistence interface".into(),
        ))
    }

    fn load_from_state(
        &self,
        component: &Rc<dyn OleControl>,
        state: &mut OcxState,
    ) -> AxResult<()> {
        loop {
            match state.kind() {
                StorageKind::Stream => {
                    let stream = persist_stream_of(component.as_ref()).ok_or_else(|| {
                        AxError::InvalidState(
                            "stream state but component has no stream persistence".into(),
                        )
                    })?;
                    let bytes = state
                        .stream_bytes()
                        .ok_or_else(|| {
                            AxError::InvalidState("stream state without buffer".into())
                        })?
                        .to_vec();
                    self.storage_kind.set(StorageKind::Stream);
                    stream
                        .load(&bytes)
                        .map_err(|e| AxError::external("stream load", e))?;
                    return Ok(());
                }
                StorageKind::StreamInit => {
                    let Some(stream_init) = component.as_persist_stream_init() else {
                        // The one legal downgrade; re-dispatch as Stream.
                        log::debug!(
                            "OcxHost: component lacks StreamInit, downgrading state to Stream"
                        );
                        state.downgrade_to_stream()?;
                        continue;
                    };
                    let bytes = state
                        .stream_bytes()
                        .ok_or_else(|| {
                            AxError::InvalidState("stream-init state without buffer".into())
                        })?
                        .to_vec();
                    self.storage_kind.set(StorageKind::StreamInit);
                    stream_init
                        .load(&bytes)
                        .map_err(|e| AxError::external("stream-init load", e))?;
                    return Ok(());
                }
                StorageKind::Storage => {
                    let storage_persist =
                        component.as_persist_storage().ok_or_else(|| {
                            AxError::InvalidState(
                                "storage state but component has no storage persistence".into(),
                            )
                        })?;
                    self.storage_kind.set(StorageKind::Storage);
                    let backing = state.storage().cloned().ok_or_else(|| {
                        AxError::InvalidState("storage state without backing".into())
                    })?;
                    if !backing.is_empty() {
                        storage_persist
                            .load(&backing)
                            .map_err(|e| AxError::external("storage load", e))?;
                    }
                    return Ok(());
                }
                StorageKind::PropertyBag => {
                    let bag_persist =
                        component.as_persist_property_bag().ok_or_else(|| {
                            AxError::InvalidState(
                                "bag state but component has no property-bag persistence".into(),
                            )
                        })?;
                    self.storage_kind.set(StorageKind::PropertyBag);
                    let bag = state.property_bag().cloned().ok_or_else(|| {
                        AxError::InvalidState("bag state without bag".into())
                    })?;
                    bag_persist
                        .load(&bag, None)
                        .map_err(|e| AxError::external("property-bag load", e))?;
                    return Ok(());
                }
                StorageKind::Unknown => {
                    return Err(AxError::InvalidState(
                        "persisted state has unknown storage kind".into(),
                    ));
                }
            }
        }
    }

    /*
     * RUNNING→INPLACE: issue the in-place-activate verb, make sure a real
     * window exists (placeholder if the component refuses to produce one),
     * record the window procedure for later reconciliation, and run the
     * one-shot default-size negotiation.
     */
    fn go_in_place(&self) -> AxResult<()> {
        let component = self.component()?;
        component
            .do_verb(OleVerb::InPlaceActivate)
            .map_err(|e| AxError::external("in-place activation verb", e))?;
        self.ensure_window_present()?;

        if let Ok(window) = self.component()?.get_window() {
            self.component_window.set(window);
            let ours = WndProcId(window.0 | HOST_SUBCLASS_MARK);
            self.windows.set_window_proc(window, ours);
            self.recorded_wndproc.set(Some(ours));
        }

        // One-shot default-size negotiation, design mode only: the
        // component's intrinsic extent wins over our untouched default.
        if !self.config.user_mode && !self.state_was_set.get() && !self.size_negotiated.get() {
            self.size_negotiated.set(true);
            let component = self.component()?;
            let extent = component
                .get_extent()
                .map_err(|e| AxError::external("extent query", e))?;
            let intrinsic = size_from_himetric(extent);
            let bounds = self.widget.bounds();
            if bounds.size() == self.widget.default_size() && bounds.size() != intrinsic {
                log::debug!(
                    "OcxHost: adopting intrinsic extent {}x{}",
                    intrinsic.width,
                    intrinsic.height
                );
                self.widget.set_bounds(bounds.with_size(intrinsic));
            }
        }
        Ok(())
    }

    fn ensure_window_present(&self) -> AxResult<()> {
        let component = self.component()?;
        if component.get_window().is_ok() {
            self.show_object()?;
            return Ok(());
        }

        // The component didn't call show_object; do it for it.
        let _ = self.show_object();
        if component.get_window().is_ok() {
            return Ok(());
        }

        log::warn!("OcxHost: component refuses to surface a window, faking one");
        let parent = self.host_window()?;
        let fake = self.windows.create_placeholder_window(parent)?;
        self.faking_window.set(true);
        self.fake_window.set(fake);
        Ok(())
    }

    fn host_window(&self) -> AxResult<WindowHandle> {
        match self.widget.handle() {
            Some(handle) => Ok(handle),
            None => self.widget.create_handle(),
        }
    }

    /// Reparents the component window under the host widget and shows it.
    fn show_object(&self) -> AxResult<()> {
        let component = self.component()?;
        let Ok(window) = component.get_window() else {
            return Ok(());
        };
        let parent = self.host_window()?;
        if window != parent {
            self.windows.set_parent(window, parent)?;
            self.windows.show_window(window, true);
        }
        Ok(())
    }

    fn ui_activate(&self) -> AxResult<()> {
        let component = self.component()?;
        component
            .do_verb(OleVerb::UiActivate)
            .map_err(|e| AxError::external("ui activation verb", e))
    }

    // --- downward side effects -------------------------------------------

    fn ui_deactivate(&self) -> AxResult<()> {
        let component = self.component()?;
        if let Some(in_place) = component.as_in_place_object() {
            in_place
                .ui_deactivate()
                .map_err(|e| AxError::external("ui deactivation", e))?;
        }
        Ok(())
    }

    fn in_place_deactivate(&self) -> AxResult<()> {
        let component = self.component()?;
        if let Some(in_place) = component.as_in_place_object() {
            in_place
                .in_place_deactivate()
                .map_err(|e| AxError::external("in-place deactivation", e))?;
        }
        self.component_window.set(WindowHandle::INVALID);
        self.recorded_wndproc.set(None);
        Ok(())
    }

    fn close_component(&self) -> AxResult<()> {
        let component = self.component()?;
        match component.close(false) {
            Ok(()) | Err(ComError::NotImplemented) => Ok(()),
            Err(error) => Err(AxError::external("component close", error)),
        }
    }

    /// Below LOADED the in-process reference itself is released.
    fn release_component(&self) {
        if let Some(component) = self.component.borrow_mut().take() {
            if let Err(error) = component.set_client_site(None) {
                log::warn!("OcxHost: clearing client site failed: {error}");
            }
        }
        // A fresh instance starts a fresh persistence lifetime.
        self.storage_kind.set(StorageKind::Unknown);
        self.recorded_wndproc.set(None);
        self.component_window.set(WindowHandle::INVALID);
        self.manual_update.set(false);
        log::debug!("OcxHost: component released");
    }

    fn start_events(&self) {
        if self.sink_cookie.get().is_some() {
            return;
        }
        let Some(sink) = self.event_sink.borrow().clone() else {
            return;
        };
        let Ok(component) = self.component() else {
            return;
        };
        match component.connect_events(sink) {
            Ok(cookie) => self.sink_cookie.set(Some(cookie)),
            Err(ComError::NotImplemented) => {}
            Err(error) => log::warn!("OcxHost: event sink connection failed: {error}"),
        }
    }

    fn stop_events(&self) {
        let Some(cookie) = self.sink_cookie.take() else {
            return;
        };
        if let Ok(component) = self.component()
            && let Err(error) = component.disconnect_events(cookie)
        {
            log::warn!("OcxHost: event sink disconnection failed: {error}");
        }
    }

    // --- bounds and subclass reconciliation ------------------------------

    /*
     * Bounds changes ask the component for constrained dimensions first,
     * notify the in-place object before committing, and are guarded
     * against re-entry: a geometry notification triggered by the change
     * itself finds the gate held and becomes a no-op.
     */
    fn set_bounds(&self, bounds: Rect) -> AxResult<()> {
        let Some(_token) = self.bounds_gate.try_enter() else {
            log::debug!("OcxHost: nested set_bounds absorbed");
            return Ok(());
        };

        if self.faking_window.get() {
            self.widget.set_bounds(bounds);
            return Ok(());
        }

        let old = self.widget.bounds();
        if old == bounds {
            return Ok(());
        }
        if self.widget.handle().is_none() {
            self.widget.set_bounds(bounds);
            return Ok(());
        }

        let mut bounds = bounds;
        if self.level.get().value() > OcLevel::Running.value() {
            self.check_subclassing();
            if bounds.size() != old.size() {
                let component = self.component()?;
                let adopted = component
                    .set_extent(size_to_himetric(bounds.size()))
                    .map_err(|e| AxError::external("extent negotiation", e))?;
                bounds = bounds.with_size(size_from_himetric(adopted));
            }
        }

        if self.level.get().value() >= OcLevel::InPlace.value() {
            let component = self.component()?;
            if let Some(in_place) = component.as_in_place_object() {
                in_place
                    .set_object_rects(bounds, bounds)
                    .map_err(|e| AxError::external("object rects", e))?;
            }
        }

        if self.manual_update.get() {
            // The window no longer moves on its own; coordinate it
            // explicitly alongside the widget.
            let window = self.component_window.get();
            if !window.is_invalid() {
                self.windows.set_window_bounds(window, bounds)?;
            }
        }
        self.widget.set_bounds(bounds);
        Ok(())
    }

    /*
     * Re-reads the component window's procedure pointer. A polite wrapper
     * that still answers our probe is adopted as the new baseline; a rude
     * one costs us the "window moves on its own" assumption: we
     * re-subclass on top and latch manual bounds/paint coordination for
     * the rest of the component's lifetime.
     */
    fn check_subclassing(&self) -> bool {
        let window = self.component_window.get();
        if window.is_invalid() {
            return true;
        }
        let Some(recorded) = self.recorded_wndproc.get() else {
            return true;
        };
        let current = self.windows.window_proc(window);
        if current == Some(recorded) {
            return true;
        }
        if self.windows.probe_subclass(window) {
            if let Some(current) = current {
                self.recorded_wndproc.set(Some(current));
            }
            return true;
        }

        log::warn!("OcxHost: foreign resubclass detected on window {}", window.0);
        let ours = WndProcId(window.0 | HOST_SUBCLASS_MARK);
        self.windows.set_window_proc(window, ours);
        self.recorded_wndproc.set(Some(ours));
        self.manual_update.set(true);
        false
    }

    // --- persistence capture ---------------------------------------------

    /*
     * Refreshes the engine's persisted-state object from the live
     * component, through the pinned persistence interface. The structured
     * storage path runs the full refresh protocol: save into the existing
     * storage, commit, hand ownership back, then snapshot the bytes.
     */
    fn capture_state(&self) -> AxResult<()> {
        if self.level.get().value() < OcLevel::Running.value() {
            return Ok(());
        }
        let component = self.component()?;
        let manual_update = self.manual_update.get();
        let license = self.config.license_key.clone();

        let new_state = match self.storage_kind.get() {
            StorageKind::Unknown => return Ok(()),
            kind @ (StorageKind::Stream | StorageKind::StreamInit) => {
                let stream = persist_stream_of(component.as_ref()).ok_or_else(|| {
                    AxError::InvalidState("pinned to stream but interface is gone".into())
                })?;
                let bytes = stream
                    .save(true)
                    .map_err(|e| AxError::external("stream save", e))?;
                OcxState::from_stream_bytes(kind, bytes, manual_update, license)?
            }
            StorageKind::Storage => {
                let storage_persist = component.as_persist_storage().ok_or_else(|| {
                    AxError::InvalidState("pinned to storage but interface is gone".into())
                })?;
                let mut state = self
                    .ocx_state
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| OcxState::new_storage(manual_update, license.clone()));
                {
                    let backing = state.storage_mut().ok_or_else(|| {
                        AxError::InvalidState("storage state without backing".into())
                    })?;
                    storage_persist
                        .save(backing, true)
                        .map_err(|e| AxError::external("storage save", e))?;
                    backing.commit();
                }
                storage_persist
                    .save_completed()
                    .map_err(|e| AxError::external("storage save-completed", e))?;
                state
            }
            StorageKind::PropertyBag => {
                let bag_persist = component.as_persist_property_bag().ok_or_else(|| {
                    AxError::InvalidState("pinned to bag but interface is gone".into())
                })?;
                let mut bag = PropertyBag::new();
                bag_persist
                    .save(&mut bag, true)
                    .map_err(|e| AxError::external("property-bag save", e))?;
                OcxState::from_property_bag(bag, manual_update, license)
            }
        };
        *self.ocx_state.borrow_mut() = Some(new_state);
        Ok(())
    }

    fn ambient_property(&self, dispid: DispId) -> Option<Variant> {
        match dispid {
            DispId::AMBIENT_BACKCOLOR => Some(Variant::Color(self.widget.back_color())),
            DispId::AMBIENT_FORECOLOR => Some(Variant::Color(self.widget.fore_color())),
            DispId::AMBIENT_USERMODE => Some(Variant::Bool(self.config.user_mode)),
            DispId::AMBIENT_UIDEAD => Some(Variant::Bool(false)),
            _ => None,
        }
    }

    fn frame_rc(&self) -> AxResult<Rc<HostFrame>> {
        if let Some(frame) = self.frame.borrow().clone() {
            return Ok(frame);
        }
        let frame = Rc::new(HostFrame {
            window: self.host_window()?,
            active: RefCell::new(None),
        });
        *self.frame.borrow_mut() = Some(frame.clone());
        Ok(frame)
    }
}

/*
 * The client site the engine hands to its component: ambient lookup,
 * save/show requests, and the in-place site surface. Holds the engine
 * weakly; a component outliving its host gets disconnect answers, never a
 * dangling reference.
 */
struct OcxSite {
    host: Weak<HostInner>,
}

impl OcxSite {
    fn host(&self) -> ComResult<Rc<HostInner>> {
        self.host
            .upgrade()
            .ok_or_else(|| ComError::Unexpected("host engine is gone".into()))
    }
}

impl ClientSite for OcxSite {
    fn save_object(&self) -> ComResult<()> {
        let host = self.host()?;
        host.capture_state().map_err(AxError::into_com)
    }

    fn show_object(&self) -> ComResult<()> {
        let host = self.host()?;
        host.show_object().map_err(AxError::into_com)
    }

    fn get_ambient_property(&self, dispid: DispId) -> Option<Variant> {
        self.host().ok()?.ambient_property(dispid)
    }

    fn as_in_place_site(&self) -> Option<&dyn InPlaceSite> {
        Some(self)
    }
}

impl InPlaceSite for OcxSite {
    fn can_in_place_activate(&self) -> bool {
        self.host().is_ok()
    }

    fn on_in_place_activate(&self) -> ComResult<()> {
        Ok(())
    }

    fn on_ui_activate(&self) -> ComResult<()> {
        Ok(())
    }

    fn get_window(&self) -> ComResult<WindowHandle> {
        let host = self.host()?;
        host.host_window().map_err(AxError::into_com)
    }

    fn get_window_context(&self) -> ComResult<WindowContext> {
        let host = self.host()?;
        let frame = host.frame_rc().map_err(AxError::into_com)?;
        let bounds = Rect::from_size(host.widget.bounds().size());
        Ok(WindowContext {
            frame: frame as Rc<dyn FrameWindow>,
            ui_window: None,
            pos_rect: bounds,
            clip_rect: bounds,
        })
    }

    fn on_ui_deactivate(&self, _undoable: bool) -> ComResult<()> {
        Ok(())
    }

    fn on_in_place_deactivate(&self) -> ComResult<()> {
        Ok(())
    }

    fn on_pos_rect_change(&self, pos_rect: Rect) -> ComResult<()> {
        let host = self.host()?;
        host.set_bounds(pos_rect).map_err(AxError::into_com)
    }
}

impl PropertyNotifySink for OcxSite {
    fn on_changed(&self, dispid: DispId) {
        log::debug!("OcxSite: component property {} changed", dispid.raw());
    }
}

/// The host-side frame object registered during the component's UI
/// activation; border space requests always succeed with zero space.
struct HostFrame {
    window: WindowHandle,
    active: RefCell<Option<Rc<dyn ActiveObject>>>,
}

impl FrameWindow for HostFrame {
    fn window(&self) -> WindowHandle {
        self.window
    }

    fn set_active_object(
        &self,
        active: Option<Rc<dyn ActiveObject>>,
        _name: Option<&str>,
    ) -> ComResult<()> {
        *self.active.borrow_mut() = active;
        Ok(())
    }

    fn set_border_space(&self, _space: Option<Rect>) -> ComResult<()> {
        Ok(())
    }
}

/// StreamInit is a superset of Stream; a component advertising only the
/// richer interface still answers plain stream saves through it.
fn persist_stream_of(component: &dyn OleControl) -> Option<&dyn PersistStream> {
    component
        .as_persist_stream()
        .or_else(|| component.as_persist_stream_init().map(|p| p as &dyn PersistStream))
}
