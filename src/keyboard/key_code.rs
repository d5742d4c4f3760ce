//! Key identifiers and the region classifier
//!
//! Keys are identified by their usage on the USB HID Keyboard/Keypad page (0x07).
//! Every usage maps to exactly one [`Region`]: two disjoint lookup sets decide
//! left and right, the space bar is hard-wired to [`Region::Both`], everything
//! else is [`Region::None`] and gets ignored downstream.
//!
//! The sets are folded into a 256-entry table at compile time, so
//! [`classify`] is a single bounds check plus an index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest usage a keyboard reports for a real key (KeyA).
pub const MIN_USAGE: u16 = 0x04;
/// Highest usage a keyboard reports for a real key (Right GUI).
pub const MAX_USAGE: u16 = 0xE7;

/// Physical key identifier, a HID Keyboard/Keypad page usage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    // Letters (0x04-0x1D)
    pub const A: KeyCode = KeyCode(0x04);
    pub const B: KeyCode = KeyCode(0x05);
    pub const C: KeyCode = KeyCode(0x06);
    pub const D: KeyCode = KeyCode(0x07);
    pub const E: KeyCode = KeyCode(0x08);
    pub const F: KeyCode = KeyCode(0x09);
    pub const G: KeyCode = KeyCode(0x0A);
    pub const H: KeyCode = KeyCode(0x0B);
    pub const I: KeyCode = KeyCode(0x0C);
    pub const J: KeyCode = KeyCode(0x0D);
    pub const K: KeyCode = KeyCode(0x0E);
    pub const L: KeyCode = KeyCode(0x0F);
    pub const M: KeyCode = KeyCode(0x10);
    pub const N: KeyCode = KeyCode(0x11);
    pub const O: KeyCode = KeyCode(0x12);
    pub const P: KeyCode = KeyCode(0x13);
    pub const Q: KeyCode = KeyCode(0x14);
    pub const R: KeyCode = KeyCode(0x15);
    pub const S: KeyCode = KeyCode(0x16);
    pub const T: KeyCode = KeyCode(0x17);
    pub const U: KeyCode = KeyCode(0x18);
    pub const V: KeyCode = KeyCode(0x19);
    pub const W: KeyCode = KeyCode(0x1A);
    pub const X: KeyCode = KeyCode(0x1B);
    pub const Y: KeyCode = KeyCode(0x1C);
    pub const Z: KeyCode = KeyCode(0x1D);

    // Digits (0x1E-0x27)
    pub const DIGIT_1: KeyCode = KeyCode(0x1E);
    pub const DIGIT_2: KeyCode = KeyCode(0x1F);
    pub const DIGIT_3: KeyCode = KeyCode(0x20);
    pub const DIGIT_4: KeyCode = KeyCode(0x21);
    pub const DIGIT_5: KeyCode = KeyCode(0x22);
    pub const DIGIT_6: KeyCode = KeyCode(0x23);
    pub const DIGIT_7: KeyCode = KeyCode(0x24);
    pub const DIGIT_8: KeyCode = KeyCode(0x25);
    pub const DIGIT_9: KeyCode = KeyCode(0x26);
    pub const DIGIT_0: KeyCode = KeyCode(0x27);

    // Command & punctuation (0x28-0x38)
    pub const ENTER: KeyCode = KeyCode(0x28);
    pub const ESCAPE: KeyCode = KeyCode(0x29);
    pub const BACKSPACE: KeyCode = KeyCode(0x2A);
    pub const TAB: KeyCode = KeyCode(0x2B);
    pub const SPACE: KeyCode = KeyCode(0x2C);
    pub const MINUS: KeyCode = KeyCode(0x2D);
    pub const EQUAL: KeyCode = KeyCode(0x2E);
    pub const LEFT_BRACKET: KeyCode = KeyCode(0x2F);
    pub const RIGHT_BRACKET: KeyCode = KeyCode(0x30);
    pub const BACKSLASH: KeyCode = KeyCode(0x31);
    pub const SEMICOLON: KeyCode = KeyCode(0x33);
    pub const QUOTE: KeyCode = KeyCode(0x34);
    pub const GRAVE: KeyCode = KeyCode(0x35);
    pub const COMMA: KeyCode = KeyCode(0x36);
    pub const PERIOD: KeyCode = KeyCode(0x37);
    pub const SLASH: KeyCode = KeyCode(0x38);

    // Caps lock & function keys (0x39-0x45)
    pub const CAPS_LOCK: KeyCode = KeyCode(0x39);
    pub const F1: KeyCode = KeyCode(0x3A);
    pub const F2: KeyCode = KeyCode(0x3B);
    pub const F3: KeyCode = KeyCode(0x3C);
    pub const F4: KeyCode = KeyCode(0x3D);
    pub const F5: KeyCode = KeyCode(0x3E);
    pub const F6: KeyCode = KeyCode(0x3F);
    pub const F7: KeyCode = KeyCode(0x40);
    pub const F8: KeyCode = KeyCode(0x41);
    pub const F9: KeyCode = KeyCode(0x42);
    pub const F10: KeyCode = KeyCode(0x43);
    pub const F11: KeyCode = KeyCode(0x44);
    pub const F12: KeyCode = KeyCode(0x45);
    pub const PRINT_SCREEN: KeyCode = KeyCode(0x46);

    // Navigation (0x49-0x52)
    pub const INSERT: KeyCode = KeyCode(0x49);
    pub const HOME: KeyCode = KeyCode(0x4A);
    pub const PAGE_UP: KeyCode = KeyCode(0x4B);
    pub const DELETE_FORWARD: KeyCode = KeyCode(0x4C);
    pub const END: KeyCode = KeyCode(0x4D);
    pub const PAGE_DOWN: KeyCode = KeyCode(0x4E);
    pub const ARROW_RIGHT: KeyCode = KeyCode(0x4F);
    pub const ARROW_LEFT: KeyCode = KeyCode(0x50);
    pub const ARROW_DOWN: KeyCode = KeyCode(0x51);
    pub const ARROW_UP: KeyCode = KeyCode(0x52);

    // Keypad (0x53-0x63, 0x67)
    pub const KEYPAD_NUM_LOCK: KeyCode = KeyCode(0x53);
    pub const KEYPAD_SLASH: KeyCode = KeyCode(0x54);
    pub const KEYPAD_ASTERISK: KeyCode = KeyCode(0x55);
    pub const KEYPAD_MINUS: KeyCode = KeyCode(0x56);
    pub const KEYPAD_PLUS: KeyCode = KeyCode(0x57);
    pub const KEYPAD_ENTER: KeyCode = KeyCode(0x58);
    pub const KEYPAD_1: KeyCode = KeyCode(0x59);
    pub const KEYPAD_5: KeyCode = KeyCode(0x5D);
    pub const KEYPAD_9: KeyCode = KeyCode(0x61);
    pub const KEYPAD_0: KeyCode = KeyCode(0x62);
    pub const KEYPAD_PERIOD: KeyCode = KeyCode(0x63);
    pub const KEYPAD_EQUAL: KeyCode = KeyCode(0x67);

    // ISO section key
    pub const NON_US_BACKSLASH: KeyCode = KeyCode(0x64);

    // JIS / international
    pub const INTERNATIONAL_1: KeyCode = KeyCode(0x87); // ろ
    pub const INTERNATIONAL_3: KeyCode = KeyCode(0x89); // ¥
    pub const LANG_1: KeyCode = KeyCode(0x90); // かな
    pub const LANG_2: KeyCode = KeyCode(0x91); // 英数

    // Modifiers (0xE0-0xE7)
    pub const LEFT_CONTROL: KeyCode = KeyCode(0xE0);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0xE1);
    pub const LEFT_ALT: KeyCode = KeyCode(0xE2);
    pub const LEFT_GUI: KeyCode = KeyCode(0xE3);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0xE4);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0xE5);
    pub const RIGHT_ALT: KeyCode = KeyCode(0xE6);
    pub const RIGHT_GUI: KeyCode = KeyCode(0xE7);

    pub const fn usage(self) -> u16 {
        self.0
    }

    /// True for usages a physical keyboard actually reports (0x04..=0xE7)
    pub const fn is_keyboard_usage(self) -> bool {
        self.0 >= MIN_USAGE && self.0 <= MAX_USAGE
    }

    /// Region of the keyboard this key belongs to
    pub fn region(self) -> Region {
        classify(self)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Coarse spatial region of a key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    Left,
    Right,
    /// Only the space bar
    Both,
    /// Unmapped, ignored by the pipeline
    #[default]
    None,
}

impl Region {
    /// Left or Right, the regions that can take part in an alternation
    pub fn is_side(self) -> bool {
        matches!(self, Region::Left | Region::Right)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Left => write!(f, "Left"),
            Region::Right => write!(f, "Right"),
            Region::Both => write!(f, "Both"),
            Region::None => write!(f, "None"),
        }
    }
}

const LEFT_USAGES: &[u8] = &[
    // Letters A-G
    0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A,
    // Q R S T V W X Z
    0x14, 0x15, 0x16, 0x17, 0x19, 0x1A, 0x1B, 0x1D,
    // Digits 1-5
    0x1E, 0x1F, 0x20, 0x21, 0x22,
    // Grave accent
    0x35,
    // Tab, Escape, Caps Lock
    0x2B, 0x29, 0x39,
    // F1-F6
    0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F,
    // LCtrl, LShift, LAlt, LGUI
    0xE0, 0xE1, 0xE2, 0xE3,
    // ISO section key
    0x64,
    // JIS ¥ and 英数
    0x89, 0x91,
];

const RIGHT_USAGES: &[u8] = &[
    // Letters H-P, U, Y
    0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x18, 0x1C,
    // ; ' , . /
    0x33, 0x34, 0x36, 0x37, 0x38,
    // Digits 6-0
    0x23, 0x24, 0x25, 0x26, 0x27,
    // - = [ ] backslash
    0x2D, 0x2E, 0x2F, 0x30, 0x31,
    // Return, Backspace
    0x28, 0x2A,
    // F7-F12
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45,
    // RCtrl, RShift, RAlt, RGUI
    0xE4, 0xE5, 0xE6, 0xE7,
    // Arrows
    0x4F, 0x50, 0x51, 0x52,
    // Insert, Home, PgUp, DelFwd, End, PgDn
    0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E,
    // Keypad NumLock / * - + Enter
    0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    // Keypad 1-9, 0, ., =
    0x59, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, 0x60, 0x61, 0x62, 0x63, 0x67,
    // JIS ろ and かな
    0x87, 0x90,
];

const REGION_TABLE: [Region; 256] = build_region_table();

const fn build_region_table() -> [Region; 256] {
    let mut table = [Region::None; 256];

    let mut i = 0;
    while i < LEFT_USAGES.len() {
        table[LEFT_USAGES[i] as usize] = Region::Left;
        i += 1;
    }

    let mut i = 0;
    while i < RIGHT_USAGES.len() {
        // A usage listed on both sides would silently flip here
        assert!(
            matches!(table[RIGHT_USAGES[i] as usize], Region::None),
            "left and right usage sets overlap"
        );
        table[RIGHT_USAGES[i] as usize] = Region::Right;
        i += 1;
    }

    assert!(
        matches!(table[KeyCode::SPACE.0 as usize], Region::None),
        "space bar must not be listed on either side"
    );
    table[KeyCode::SPACE.0 as usize] = Region::Both;
    table
}

/// Classifies a key into its keyboard region
///
/// Total and pure: unknown identifiers are not an error, they come back as
/// [`Region::None`].
pub fn classify(key: KeyCode) -> Region {
    REGION_TABLE
        .get(key.0 as usize)
        .copied()
        .unwrap_or(Region::None)
}

/// Usages classified as [`Region::Left`]
pub fn left_usages() -> impl Iterator<Item = KeyCode> {
    LEFT_USAGES.iter().map(|&u| KeyCode(u16::from(u)))
}

/// Usages classified as [`Region::Right`]
pub fn right_usages() -> impl Iterator<Item = KeyCode> {
    RIGHT_USAGES.iter().map(|&u| KeyCode(u16::from(u)))
}
