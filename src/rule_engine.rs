//! Adapter from the platform layer's `KeyCode`/`InputEvent` to the engine's
//! `config::ScanCode` vocabulary.
//!
//! Grounded on the original's `ScanCode` encoding (`src/core/misc/scancode.h`
//! conventions -- a set-1 byte plus `E0`/`E1` extension flags) and on
//! `crate::platform`'s `KeyCode` roster.
//!
//! Real deployments populate a layout-specific table (from the active
//! keyboard's actual scancodes); the fixed table below covers the
//! US-QWERTY set-1 codes for the vocabulary `platform::KeyCode` exposes,
//! which is the same one `engine::generator::resolve_platform_key` maps
//! back from on the injection side.

use crate::config::ScanCode;
use crate::platform::{InputEvent, KeyCode, KeyState};
use crate::event_bus::EventBus;
use crate::engine::pipeline::RawEvent;

/// `extraInfo` marker the injector stamps on synthesized events so our own
/// capture can recognize and skip them (§4.5 "tolerant of synthetic
/// re-entry"). Mirrors the original's magic constant.
pub const MOUSE_EVENT_MARKER: u32 = 0x5941_4D59;

fn set1_scan_code(key: KeyCode) -> ScanCode {
    use KeyCode::*;
    let (code, e0) = match key {
        Escape => (0x01, false),
        Key1 => (0x02, false), Key2 => (0x03, false), Key3 => (0x04, false),
        Key4 => (0x05, false), Key5 => (0x06, false), Key6 => (0x07, false),
        Key7 => (0x08, false), Key8 => (0x09, false), Key9 => (0x0a, false),
        Key0 => (0x0b, false), Minus => (0x0c, false), Equal => (0x0d, false),
        Backspace => (0x0e, false), Tab => (0x0f, false),
        Q => (0x10, false), W => (0x11, false), E => (0x12, false), R => (0x13, false),
        T => (0x14, false), Y => (0x15, false), U => (0x16, false), I => (0x17, false),
        O => (0x18, false), P => (0x19, false),
        LeftBracket => (0x1a, false), RightBracket => (0x1b, false),
        Enter => (0x1c, false),
        Shift => (0x2a, false),
        A => (0x1e, false), S => (0x1f, false), D => (0x20, false), F => (0x21, false),
        G => (0x22, false), H => (0x23, false), J => (0x24, false), K => (0x25, false),
        L => (0x26, false), Semicolon => (0x27, false), Apostrophe => (0x28, false),
        Backtick => (0x29, false), Backslash => (0x2b, false),
        Z => (0x2c, false), X => (0x2d, false), C => (0x2e, false), V => (0x2f, false),
        B => (0x30, false), N => (0x31, false), M => (0x32, false),
        Comma => (0x33, false), Period => (0x34, false), Slash => (0x35, false),
        NumpadMul => (0x37, false),
        Alt => (0x38, false), Space => (0x39, false), CapsLock => (0x3a, false),
        F1 => (0x3b, false), F2 => (0x3c, false), F3 => (0x3d, false), F4 => (0x3e, false),
        F5 => (0x3f, false), F6 => (0x40, false), F7 => (0x41, false), F8 => (0x42, false),
        F9 => (0x43, false), F10 => (0x44, false),
        NumLock => (0x45, false), ScrollLock => (0x46, false),
        Numpad7 => (0x47, false), Numpad8 => (0x48, false), Numpad9 => (0x49, false),
        NumpadSub => (0x4a, false),
        Numpad4 => (0x4b, false), Numpad5 => (0x4c, false), Numpad6 => (0x4d, false),
        NumpadAdd => (0x4e, false),
        Numpad1 => (0x4f, false), Numpad2 => (0x50, false), Numpad3 => (0x51, false),
        Numpad0 => (0x52, false),
        F11 => (0x57, false), F12 => (0x58, false),
        F13 => (0x64, false), F14 => (0x65, false), F15 => (0x66, false),
        F16 => (0x67, false), F17 => (0x68, false), F18 => (0x69, false),
        F19 => (0x6a, false), F20 => (0x6b, false), F21 => (0x6c, false),
        F22 => (0x6d, false), F23 => (0x6e, false), F24 => (0x76, false),
        NumpadEnter => (0x1c, true),
        Ctrl => (0x1d, false),
        NumpadDiv => (0x35, true),
        PrintScreen => (0x37, true),
        Meta => (0x5b, true),
        Pause => (0x45, true),
        Insert => (0x52, true), Delete => (0x53, true),
        Home => (0x47, true), End => (0x4f, true),
        PageUp => (0x49, true), PageDown => (0x51, true),
        Up => (0x48, true), Down => (0x50, true),
        Left => (0x4b, true), Right => (0x4d, true),
    };
    ScanCode { code, e0, e1: false }
}

/// Translates one captured `InputEvent` into the queue's wire type,
/// classifying pointer-origin events by their marker (§4.2 step 2).
pub fn translate(event: &InputEvent, extra_info: u32) -> RawEvent {
    RawEvent {
        scan: set1_scan_code(event.key),
        is_pressed: event.state == KeyState::Down,
        is_mouse: extra_info == MOUSE_EVENT_MARKER,
    }
}

/// Wires a capture backend's callback into the queue: every physical event
/// is translated and pushed, never processed inline (§4.5 "capture ...
/// must not block").
pub fn forward_to_bus(bus: &EventBus, event: InputEvent) {
    bus.push(translate(&event, 0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Modifiers, WindowContext};

    #[test]
    fn translates_a_press_to_its_set1_scan_code() {
        let event = InputEvent {
            key: KeyCode::A,
            state: KeyState::Down,
            modifiers: Modifiers::default(),
            window: WindowContext::default(),
        };
        let raw = translate(&event, 0);
        assert_eq!(raw.scan, ScanCode { code: 0x1e, e0: false, e1: false });
        assert!(raw.is_pressed);
        assert!(!raw.is_mouse);
    }

    #[test]
    fn extended_keys_set_the_e0_flag() {
        let event = InputEvent {
            key: KeyCode::Up,
            state: KeyState::Down,
            modifiers: Modifiers::default(),
            window: WindowContext::default(),
        };
        assert!(translate(&event, 0).scan.e0);
    }

    #[test]
    fn marker_extra_info_classifies_as_mouse_origin() {
        let event = InputEvent {
            key: KeyCode::A,
            state: KeyState::Up,
            modifiers: Modifiers::default(),
            window: WindowContext::default(),
        };
        assert!(translate(&event, MOUSE_EVENT_MARKER).is_mouse);
    }
}
