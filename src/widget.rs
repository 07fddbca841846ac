/*
 * The widget side of the hosting boundary. The general widget system is an
 * external collaborator; the engines reach it only through these traits.
 *
 * `WidgetPeer` is what an engine drives: geometry, visibility, focus, the
 * native handle, mnemonic text, and input pre-processing. `PropertyStore`
 * is the serializer-visible property surface used by property-bag
 * persistence, and `BlobCodec` the opaque byte-stream codec that encodes
 * values no converter can round-trip textually.
 *
 * All methods take `&self`; implementations are expected to use interior
 * mutability, matching the message-loop-driven single-threaded model.
 */

use std::rc::Rc;

use crate::error::Result as AxResult;
use crate::types::{DockStyle, InputMessage, OleColor, PreProcessResult, Rect, Size, Variant};
use crate::window_system::WindowHandle;

pub trait WidgetPeer {
    fn bounds(&self) -> Rect;

    fn set_bounds(&self, bounds: Rect);

    /// The as-yet-unconfigured size a fresh widget starts with. Used by the
    /// container's one-shot default-size negotiation.
    fn default_size(&self) -> Size;

    fn visible(&self) -> bool;

    fn set_visible(&self, visible: bool);

    fn enabled(&self) -> bool {
        true
    }

    fn set_enabled(&self, _enabled: bool) {}

    /// Display text; the leading-`&` mnemonic convention applies.
    fn text(&self) -> String {
        String::new()
    }

    fn set_text(&self, _text: String) {}

    fn name(&self) -> String {
        String::new()
    }

    fn children(&self) -> Vec<Rc<dyn WidgetPeer>> {
        Vec::new()
    }

    fn handle(&self) -> Option<WindowHandle>;

    /// Create the native window if it does not exist yet.
    fn create_handle(&self) -> AxResult<WindowHandle>;

    fn destroy_handle(&self);

    fn has_focus(&self) -> bool {
        false
    }

    /// Whether this widget or any descendant owns keyboard focus.
    fn contains_focus(&self) -> bool {
        self.has_focus()
    }

    fn focus(&self) {}

    fn tab_index(&self) -> i32 {
        0
    }

    fn set_tab_index(&self, _index: i32) {}

    fn tab_stop(&self) -> bool {
        true
    }

    fn set_tab_stop(&self, _stop: bool) {}

    fn dock(&self) -> DockStyle {
        DockStyle::None
    }

    fn set_dock(&self, _dock: DockStyle) {}

    fn back_color(&self) -> OleColor {
        OleColor::default()
    }

    fn set_back_color(&self, _color: OleColor) {}

    fn fore_color(&self) -> OleColor {
        OleColor::default()
    }

    fn set_fore_color(&self, _color: OleColor) {}

    /// Offer a key-input message to the widget's own pre-processing before
    /// accelerator routing decides where it goes.
    fn pre_process_input(&self, _message: &InputMessage) -> PreProcessResult {
        PreProcessResult::NotNeeded
    }

    /// Render into a foreign device surface at the given bounds.
    fn paint(&self, _surface: &mut dyn DrawSurface, _bounds: Rect) {}
}

/// How a property's value travels through the property bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// The converter round-trips through a string. Preferred: human-diffable.
    StringRoundTrip,
    /// The converter round-trips through a byte array; base64-wrapped.
    BytesRoundTrip,
    /// No converter; the value goes through the opaque codec, base64-wrapped.
    Opaque,
}

pub trait PropertyStore {
    /// Serializer-visible property names, in a stable order.
    fn property_names(&self) -> Vec<String>;

    fn property_kind(&self, name: &str) -> Option<PropertyKind>;

    fn read_string(&self, name: &str) -> AxResult<String>;

    fn write_string(&self, name: &str, value: &str) -> AxResult<()>;

    fn read_bytes(&self, name: &str) -> AxResult<Vec<u8>>;

    fn write_bytes(&self, name: &str, value: &[u8]) -> AxResult<()>;

    fn read_opaque(&self, name: &str) -> AxResult<Variant>;

    fn write_opaque(&self, name: &str, value: Variant) -> AxResult<()>;
}

/// Opaque byte-stream codec for resource-typed values; external collaborator.
pub trait BlobCodec {
    fn encode(&self, value: &Variant) -> AxResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> AxResult<Variant>;
}

/// A foreign device surface handed to `ViewObject::draw`.
pub trait DrawSurface {
    fn fill_rect(&mut self, bounds: Rect, color: OleColor);

    fn draw_text(&mut self, text: &str, bounds: Rect, color: OleColor);
}
