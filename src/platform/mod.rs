//! Platform abstraction layer.
//!
//! Defines the `InputCapture` and `ActionExecutor` traits plus the shared
//! physical-layer types (`KeyCode`, `KeyState`, `Modifiers`, `WindowContext`,
//! `Action`) that every per-OS backend is built against. Platform-specific
//! implementations live in the `linux`/`macos`/`windows` child modules;
//! `create_input_capture`/`create_action_executor` in those modules are the
//! factory functions `rule_engine` calls at startup.

mod linux;
mod macos;
mod windows;

#[cfg(target_os = "linux")]
pub use linux::{create_action_executor, create_input_capture};
#[cfg(target_os = "macos")]
pub use macos::{create_action_executor, create_input_capture};
#[cfg(target_os = "windows")]
pub use windows::{create_action_executor, create_input_capture};

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by platform capture/injection backends.
///
/// Matches the "Capture failure" / "Injection failure" error kinds in the
/// error-handling design: capture failures abort startup, injection
/// failures are logged and the engine continues.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The OS denied the permission this backend needs (Accessibility on
    /// macOS, `input` group membership on Linux, ...).
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The requested capability is not implemented on this platform/session.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Any other platform-layer failure, with a human-readable cause.
    #[error("platform error: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Physical-layer key representation
// ---------------------------------------------------------------------------

/// A canonical, layout-independent physical key identity.
///
/// This is the physical layer's vocabulary -- separate from the engine's
/// abstract `Key`/`ScanCode` (`crate::config`), which is keyed off the
/// user's configuration. Each per-OS `keycodes` module maps native codes
/// to and from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(dead_code)]
pub enum KeyCode {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    F13, F14, F15, F16, F17, F18, F19, F20, F21, F22, F23, F24,
    Shift, Ctrl, Alt, Meta,
    Space, Enter, NumpadEnter, Tab, Escape, Backspace,
    Delete, Insert, Home, End, PageUp, PageDown,
    Up, Down, Left, Right,
    CapsLock, NumLock, ScrollLock, PrintScreen, Pause,
    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4,
    Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    NumpadAdd, NumpadSub, NumpadMul, NumpadDiv,
    Backtick, Minus, Equal, LeftBracket, RightBracket,
    Backslash, Semicolon, Apostrophe, Comma, Period, Slash,
}

/// Press/release polarity of a captured or injected key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// Live modifier-key state as observed by the capture backend.
///
/// Populated from the OS's own modifier tracking where available; the
/// engine (`crate::engine`) derives its own authoritative modifier view
/// from the configured modifier tables and does not trust this beyond a
/// capture-time hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Foreground-window context captured alongside a key event, when the
/// backend is able to supply it cheaply. Most capture backends leave this
/// at its default; `crate::engine::focus` is the authoritative source used
/// by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowContext {
    pub class_name: String,
    pub title: String,
}

/// A single physical input event delivered by a capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub key: KeyCode,
    pub state: KeyState,
    pub modifiers: Modifiers,
    pub window: WindowContext,
}

// ---------------------------------------------------------------------------
// Window/pointer manipulation capability (DI seam)
// ---------------------------------------------------------------------------

/// Coarse window placement/visibility operations invoked by the
/// `Window*` command primitives (`crate::command::builtins`).
///
/// Real per-OS window management is outside this crate's core scope (see
/// spec.md §1 "Deliberately out of scope"); `NullWindowSystem` is the only
/// implementation shipped, logging the requested operation. A real desktop
/// integration would implement this trait per platform the same way
/// `InputCapture`/`ActionExecutor` are implemented per platform.
pub trait WindowSystem: Send + Sync {
    fn raise(&self, hwnd: WindowHandle);
    fn lower(&self, hwnd: WindowHandle);
    fn minimize(&self, hwnd: WindowHandle);
    fn maximize(&self, hwnd: WindowHandle, horizontal: bool, vertical: bool);
    fn close(&self, hwnd: WindowHandle);
    fn set_alpha(&self, hwnd: WindowHandle, alpha: u8);
    fn move_by(&self, hwnd: WindowHandle, dx: i32, dy: i32);
    fn move_to(&self, hwnd: WindowHandle, x: i32, y: i32);
    fn resize_to(&self, hwnd: WindowHandle, width: i32, height: i32);
    fn set_foreground(&self, hwnd: WindowHandle);
    fn toggle_top_most(&self, hwnd: WindowHandle);
    fn identify(&self, hwnd: WindowHandle) -> WindowContext;
}

/// Opaque, platform-addressable window identity. Zero is never a valid
/// window; commands receiving it treat it as "no focused window."
pub type WindowHandle = usize;

/// `WindowSystem` implementation that logs every request and performs no
/// OS action. Used whenever no real window-system backend is configured.
#[derive(Debug, Default)]
pub struct NullWindowSystem;

impl WindowSystem for NullWindowSystem {
    fn raise(&self, hwnd: WindowHandle) {
        log::debug!("window: raise({hwnd}) [no window system configured]");
    }
    fn lower(&self, hwnd: WindowHandle) {
        log::debug!("window: lower({hwnd}) [no window system configured]");
    }
    fn minimize(&self, hwnd: WindowHandle) {
        log::debug!("window: minimize({hwnd}) [no window system configured]");
    }
    fn maximize(&self, hwnd: WindowHandle, horizontal: bool, vertical: bool) {
        log::debug!("window: maximize({hwnd}, h={horizontal}, v={vertical}) [no window system configured]");
    }
    fn close(&self, hwnd: WindowHandle) {
        log::debug!("window: close({hwnd}) [no window system configured]");
    }
    fn set_alpha(&self, hwnd: WindowHandle, alpha: u8) {
        log::debug!("window: set_alpha({hwnd}, {alpha}) [no window system configured]");
    }
    fn move_by(&self, hwnd: WindowHandle, dx: i32, dy: i32) {
        log::debug!("window: move_by({hwnd}, {dx}, {dy}) [no window system configured]");
    }
    fn move_to(&self, hwnd: WindowHandle, x: i32, y: i32) {
        log::debug!("window: move_to({hwnd}, {x}, {y}) [no window system configured]");
    }
    fn resize_to(&self, hwnd: WindowHandle, width: i32, height: i32) {
        log::debug!("window: resize_to({hwnd}, {width}, {height}) [no window system configured]");
    }
    fn set_foreground(&self, hwnd: WindowHandle) {
        log::debug!("window: set_foreground({hwnd}) [no window system configured]");
    }
    fn toggle_top_most(&self, hwnd: WindowHandle) {
        log::debug!("window: toggle_top_most({hwnd}) [no window system configured]");
    }
    fn identify(&self, _hwnd: WindowHandle) -> WindowContext {
        WindowContext::default()
    }
}

/// Pointer operations invoked by `MouseMove`/`MouseWheel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOp {
    MoveBy { dx: i32, dy: i32 },
    WheelBy { delta: i32 },
}

// ---------------------------------------------------------------------------
// Synthesized action, emitted by the engine and consumed by ActionExecutor
// ---------------------------------------------------------------------------

/// An effect the engine asks a platform backend to carry out.
///
/// `InjectKey` is the hot path (§4.6 Injector); the other variants cover
/// the non-key-injection command primitives (§2 Command Library) that
/// still need to reach an OS-level capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Inject a synthesized key event, exactly as `generateKeyEvent` would.
    InjectKey { key: KeyCode, state: KeyState },
    /// Pass the originating physical event through unmodified.
    Passthrough,
    /// Suppress the originating physical event; nothing reaches the OS.
    Suppress,
    /// Run an external command (`ShellExecute`/`DirectSSTP` commands).
    Exec { command: String },
    /// Move the pointer by a relative offset or scroll the wheel.
    Pointer(PointerOp),
}

// ---------------------------------------------------------------------------
// Capture / injection trait seams
// ---------------------------------------------------------------------------

/// Receives physical input events from the OS and forwards them to a
/// callback. `start()` must not block; it installs whatever hook/reader is
/// needed and returns once events are flowing (or once it can report a
/// definitive failure).
pub trait InputCapture: Send {
    fn start(&mut self, callback: Box<dyn Fn(InputEvent) + Send>) -> Result<(), PlatformError>;
    fn stop(&mut self) -> Result<(), PlatformError>;
}

/// Carries out a synthesized `Action` against the OS.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, action: &Action) -> Result<(), PlatformError>;
}
