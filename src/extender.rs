/*
 * Extender/site bridge: exposes widget container properties through a
 * dynamic-dispatch object consumable by legacy scripting hosts.
 *
 * The bridge never keeps a widget alive. It stores a stable `(index,
 * generation)` slot into a `WidgetArena` instead of a language-level
 * reference, and every dispatch revalidates liveness first; a dead slot
 * answers with a disconnect error rather than resurrecting anything.
 *
 * Member lookup consults a host-supplied adapter before the built-in
 * table, so host overrides win over the fixed member set.
 */

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{AxError, Result as AxResult};
use crate::types::{DispId, DockStyle, SlotId, Variant};
use crate::widget::WidgetPeer;
use crate::window_system::WindowHandle;

/*
 * Slot-based widget table. Generations make stale `SlotId`s detectable:
 * removing a widget bumps the slot's generation, so an old id never
 * aliases a newcomer that reuses the index.
 */
#[derive(Default)]
pub struct WidgetArena {
    slots: RefCell<Vec<Slot>>,
}

struct Slot {
    generation: u32,
    widget: Option<Rc<dyn WidgetPeer>>,
}

impl WidgetArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, widget: Rc<dyn WidgetPeer>) -> SlotId {
        let mut slots = self.slots.borrow_mut();
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.widget.is_none() {
                slot.widget = Some(widget);
                return SlotId {
                    index: index as u32,
                    generation: slot.generation,
                };
            }
        }
        slots.push(Slot {
            generation: 0,
            widget: Some(widget),
        });
        SlotId {
            index: (slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn remove(&self, id: SlotId) -> Option<Rc<dyn WidgetPeer>> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let removed = slot.widget.take();
        if removed.is_some() {
            slot.generation += 1;
        }
        removed
    }

    pub fn get(&self, id: SlotId) -> Option<Rc<dyn WidgetPeer>> {
        let slots = self.slots.borrow();
        let slot = slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.widget.clone()
    }

    pub fn is_live(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }
}

/// Host-supplied overrides, consulted before the built-in member table.
pub trait DispatchAdapter {
    /// Name lookup; `Some` shadows the built-in mapping.
    fn dispid_of(&self, name: &str) -> Option<DispId>;

    /// Getter override; `Some` short-circuits the built-in member.
    fn get(&self, dispid: DispId, widget: &Rc<dyn WidgetPeer>) -> Option<AxResult<Variant>>;

    /// Setter override; `Some` short-circuits the built-in member.
    fn put(
        &self,
        dispid: DispId,
        value: &Variant,
        widget: &Rc<dyn WidgetPeer>,
    ) -> Option<AxResult<()>>;
}

// Fixed extender member set with stable dispatch ids.
const MEMBERS: &[(&str, i32)] = &[
    ("Align", 1),
    ("BackColor", 2),
    ("Enabled", 3),
    ("ForeColor", 4),
    ("Height", 5),
    ("Left", 6),
    ("Parent", 7),
    ("TabIndex", 8),
    ("TabStop", 9),
    ("Top", 10),
    ("Visible", 11),
    ("Width", 12),
    ("Name", 13),
    ("Hwnd", 14),
    ("Container", 15),
    ("Text", 16),
];

pub struct ExtenderBridge {
    arena: Rc<WidgetArena>,
    slot: SlotId,
    parent: Option<SlotId>,
    container: Option<SlotId>,
    adapter: Option<Rc<dyn DispatchAdapter>>,
}

impl ExtenderBridge {
    pub fn new(arena: Rc<WidgetArena>, slot: SlotId) -> Self {
        Self {
            arena,
            slot,
            parent: None,
            container: None,
            adapter: None,
        }
    }

    pub fn with_parent(mut self, parent: SlotId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_container(mut self, container: SlotId) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_adapter(mut self, adapter: Rc<dyn DispatchAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Name→dispatch-id mapping; the adapter is consulted first.
    pub fn dispid_of(&self, name: &str) -> AxResult<DispId> {
        if let Some(adapter) = &self.adapter
            && let Some(dispid) = adapter.dispid_of(name)
        {
            return Ok(dispid);
        }
        MEMBERS
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(_, id)| DispId(*id))
            .ok_or_else(|| AxError::InvalidState(format!("unknown extender member '{name}'")))
    }

    fn live_widget(&self) -> AxResult<Rc<dyn WidgetPeer>> {
        self.arena.get(self.slot).ok_or_else(|| {
            log::warn!("Extender: dispatch against dead slot {:?}", self.slot);
            AxError::InvalidState("extender target widget is disconnected".into())
        })
    }

    fn live_ref(&self, slot: Option<SlotId>, member: &str) -> AxResult<Variant> {
        match slot {
            Some(slot) if self.arena.is_live(slot) => Ok(Variant::Dispatch(slot)),
            Some(_) => Err(AxError::InvalidState(format!(
                "extender {member} is disconnected"
            ))),
            None => Ok(Variant::Empty),
        }
    }

    pub fn invoke_get(&self, dispid: DispId) -> AxResult<Variant> {
        let widget = self.live_widget()?;
        if let Some(adapter) = &self.adapter
            && let Some(result) = adapter.get(dispid, &widget)
        {
            return result;
        }
        let bounds = widget.bounds();
        Ok(match dispid.raw() {
            1 => Variant::I4(widget.dock().raw()),
            2 => Variant::Color(widget.back_color()),
            3 => Variant::Bool(widget.enabled()),
            4 => Variant::Color(widget.fore_color()),
            5 => Variant::I4(bounds.height),
            6 => Variant::I4(bounds.x),
            7 => return self.live_ref(self.parent, "parent"),
            8 => Variant::I4(widget.tab_index()),
            9 => Variant::Bool(widget.tab_stop()),
            10 => Variant::I4(bounds.y),
            11 => Variant::Bool(widget.visible()),
            12 => Variant::I4(bounds.width),
            13 => Variant::Str(widget.name()),
            14 => Variant::Window(widget.handle().unwrap_or(WindowHandle::INVALID)),
            15 => return self.live_ref(self.container, "container"),
            16 => Variant::Str(widget.text()),
            other => {
                return Err(AxError::InvalidState(format!(
                    "unknown extender dispid {other}"
                )));
            }
        })
    }

    pub fn invoke_put(&self, dispid: DispId, value: Variant) -> AxResult<()> {
        let widget = self.live_widget()?;
        if let Some(adapter) = &self.adapter
            && let Some(result) = adapter.put(dispid, &value, &widget)
        {
            return result;
        }
        let type_error = |expected: &str| {
            AxError::InvalidState(format!(
                "extender dispid {} expects {expected}",
                dispid.raw()
            ))
        };
        match dispid.raw() {
            1 => {
                let raw = value.as_i4().ok_or_else(|| type_error("an alignment"))?;
                let dock = DockStyle::from_raw(raw).ok_or_else(|| type_error("an alignment"))?;
                widget.set_dock(dock);
            }
            2 => widget.set_back_color(value.as_color().ok_or_else(|| type_error("a color"))?),
            3 => widget.set_enabled(value.as_bool().ok_or_else(|| type_error("a bool"))?),
            4 => widget.set_fore_color(value.as_color().ok_or_else(|| type_error("a color"))?),
            5 => {
                let height = value.as_i4().ok_or_else(|| type_error("an integer"))?;
                let mut bounds = widget.bounds();
                bounds.height = height;
                widget.set_bounds(bounds);
            }
            6 => {
                let x = value.as_i4().ok_or_else(|| type_error("an integer"))?;
                let mut bounds = widget.bounds();
                bounds.x = x;
                widget.set_bounds(bounds);
            }
            8 => widget.set_tab_index(value.as_i4().ok_or_else(|| type_error("an integer"))?),
            9 => widget.set_tab_stop(value.as_bool().ok_or_else(|| type_error("a bool"))?),
            10 => {
                let y = value.as_i4().ok_or_else(|| type_error("an integer"))?;
                let mut bounds = widget.bounds();
                bounds.y = y;
                widget.set_bounds(bounds);
            }
            11 => widget.set_visible(value.as_bool().ok_or_else(|| type_error("a bool"))?),
            12 => {
                let width = value.as_i4().ok_or_else(|| type_error("an integer"))?;
                let mut bounds = widget.bounds();
                bounds.width = width;
                widget.set_bounds(bounds);
            }
            16 => match value {
                Variant::Str(text) => widget.set_text(text),
                _ => return Err(type_error("a string")),
            },
            7 | 13 | 14 | 15 => {
                return Err(AxError::InvalidState(format!(
                    "extender dispid {} is read-only",
                    dispid.raw()
                )));
            }
            other => {
                return Err(AxError::InvalidState(format!(
                    "unknown extender dispid {other}"
                )));
            }
        }
        Ok(())
    }

    /// Convenience: name-based get the way scripting hosts drive it.
    pub fn get_by_name(&self, name: &str) -> AxResult<Variant> {
        self.invoke_get(self.dispid_of(name)?)
    }

    pub fn put_by_name(&self, name: &str, value: Variant) -> AxResult<()> {
        self.invoke_put(self.dispid_of(name)?, value)
    }
}
