/*
 * Platform-agnostic value types shared by both hosting engines: geometry,
 * OLE dispatch identifiers, verbs, variants, keyboard input descriptions,
 * and the HIMETRIC extent conversions used on the extent-negotiation wire.
 *
 * Everything here compiles on every platform so the protocol logic and its
 * tests never need a live Win32 environment.
 */

/// OLE dispatch identifier. Negative values are reserved ambient dispids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispId(pub i32);

impl DispId {
    /// Sentinel meaning "all properties" in change notifications.
    pub const UNKNOWN: DispId = DispId(-1);
    pub const AMBIENT_BACKCOLOR: DispId = DispId(-701);
    pub const AMBIENT_FONT: DispId = DispId(-703);
    pub const AMBIENT_FORECOLOR: DispId = DispId(-704);
    pub const AMBIENT_USERMODE: DispId = DispId(-709);
    pub const AMBIENT_UIDEAD: DispId = DispId(-710);

    pub fn raw(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn with_size(&self, size: Size) -> Self {
        Self::new(self.x, self.y, size.width, size.height)
    }
}

// Extents travel across the component boundary in HIMETRIC units (1/100 mm).
// Both sides assume the classic 96 DPI logical display.
const HIMETRIC_PER_INCH: i64 = 2540;
const PIXELS_PER_INCH: i64 = 96;

pub fn pixel_to_himetric(pixels: i32) -> i32 {
    ((pixels as i64 * HIMETRIC_PER_INCH) / PIXELS_PER_INCH) as i32
}

pub fn himetric_to_pixel(himetric: i32) -> i32 {
    ((himetric as i64 * PIXELS_PER_INCH) / HIMETRIC_PER_INCH) as i32
}

pub fn size_to_himetric(size: Size) -> Size {
    Size::new(pixel_to_himetric(size.width), pixel_to_himetric(size.height))
}

pub fn size_from_himetric(size: Size) -> Size {
    Size::new(himetric_to_pixel(size.width), himetric_to_pixel(size.height))
}

/// An RGB color in the 0x00BBGGRR layout OLE uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OleColor(pub u32);

impl OleColor {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self((b as u32) << 16 | (g as u32) << 8 | r as u32)
    }
}

/// Portable font description, the ambient-font payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub point_size: i32,
    pub bold: bool,
    pub italic: bool,
}

/*
 * The standard OLE verbs both engines speak. Raw values are part of the
 * protocol: hosts send them numerically and components enumerate them.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OleVerb {
    Primary,
    Show,
    Open,
    Hide,
    UiActivate,
    InPlaceActivate,
    DiscardUndoState,
    Properties,
}

impl OleVerb {
    pub fn raw(self) -> i32 {
        match self {
            OleVerb::Primary => 0,
            OleVerb::Show => -1,
            OleVerb::Open => -2,
            OleVerb::Hide => -3,
            OleVerb::UiActivate => -4,
            OleVerb::InPlaceActivate => -5,
            OleVerb::DiscardUndoState => -6,
            OleVerb::Properties => -7,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => OleVerb::Primary,
            -1 => OleVerb::Show,
            -2 => OleVerb::Open,
            -3 => OleVerb::Hide,
            -4 => OleVerb::UiActivate,
            -5 => OleVerb::InPlaceActivate,
            -6 => OleVerb::DiscardUndoState,
            -7 => OleVerb::Properties,
            _ => return None,
        })
    }

    /// Verbs that continue past in-place activation into UI activation.
    pub fn requests_ui_activation(self) -> bool {
        matches!(
            self,
            OleVerb::Primary | OleVerb::Show | OleVerb::UiActivate
        )
    }
}

/// Stable arena reference used by the extender bridge; see `extender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/*
 * Loosely-typed values crossing the dynamic-dispatch boundary: ambient
 * properties, extender members, and property-bag payloads before textual
 * encoding.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Empty,
    Bool(bool),
    I4(i32),
    Str(String),
    Color(OleColor),
    Font(FontSpec),
    Blob(Vec<u8>),
    Window(crate::window_system::WindowHandle),
    Dispatch(SlotId),
}

impl Variant {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i4(&self) -> Option<i32> {
        match self {
            Variant::I4(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<OleColor> {
        match self {
            Variant::Color(value) => Some(*value),
            _ => None,
        }
    }
}

/// The four key-input message kinds that participate in accelerator routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    KeyDown,
    SysKeyDown,
    Char,
    SysChar,
}

/// Current modifier-key state, sampled when forwarding to the host site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
}

/// A raw input message as delivered by the foreign message loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputMessage {
    pub target: crate::window_system::WindowHandle,
    pub kind: Option<InputKind>,
    pub key: u16,
}

impl InputMessage {
    pub fn key_down(target: crate::window_system::WindowHandle, key: u16) -> Self {
        Self {
            target,
            kind: Some(InputKind::KeyDown),
            key,
        }
    }
}

/// Outcome of offering an input message to a widget's own pre-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreProcessResult {
    /// Fully handled; nothing further to do.
    Processed,
    /// The widget wants the message, but it must be dispatched locally.
    NeedsDispatch,
    /// Not interesting; offer it to the host site.
    NotNeeded,
}

/// Docking alignment exposed through the extender bridge's `Align` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DockStyle {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    Fill,
}

impl DockStyle {
    pub fn raw(self) -> i32 {
        match self {
            DockStyle::None => 0,
            DockStyle::Top => 1,
            DockStyle::Bottom => 2,
            DockStyle::Left => 3,
            DockStyle::Right => 4,
            DockStyle::Fill => 5,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => DockStyle::None,
            1 => DockStyle::Top,
            2 => DockStyle::Bottom,
            3 => DockStyle::Left,
            4 => DockStyle::Right,
            5 => DockStyle::Fill,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn himetric_conversion_round_trips_typical_sizes() {
        for px in [0, 1, 23, 75, 96, 100, 640, 1920] {
            let hm = pixel_to_himetric(px);
            assert_eq!(himetric_to_pixel(hm), px, "round trip failed for {px}px");
        }
    }

    #[test]
    fn himetric_uses_hundredths_of_millimeter() {
        // One logical inch (96px) is exactly 2540 HIMETRIC units.
        assert_eq!(pixel_to_himetric(96), 2540);
    }

    #[test]
    fn verb_raw_values_round_trip() {
        for raw in -7..=0 {
            let verb = OleVerb::from_raw(raw).expect("verb");
            assert_eq!(verb.raw(), raw);
        }
        assert!(OleVerb::from_raw(1).is_none());
    }

    #[test]
    fn ui_activation_verbs_are_show_primary_and_uiactivate() {
        assert!(OleVerb::Primary.requests_ui_activation());
        assert!(OleVerb::Show.requests_ui_activation());
        assert!(OleVerb::UiActivate.requests_ui_activation());
        assert!(!OleVerb::InPlaceActivate.requests_ui_activation());
        assert!(!OleVerb::Hide.requests_ui_activation());
    }

    #[test]
    fn ole_color_packs_bgr() {
        assert_eq!(OleColor::from_rgb(0x12, 0x34, 0x56).0, 0x0056_3412);
    }
}
