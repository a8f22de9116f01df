//! Command registry: name -> `(parse, exec)` pair.
//!
//! Replaces the original's ~60 `FunctionData` subclasses with one
//! `CommandId` enum plus a static registry table, grounded on
//! `examples/original_source/src/core/function_creator.cpp`'s registration
//! order and `src/core/functions/function_data.h`'s per-command contract.
//!
//! `CommandContext` is the capability bundle a command needs to run --
//! deliberately a trait, not a concrete `Engine` reference, so this module
//! has no dependency on `crate::engine`; `engine::pipeline` is the only
//! caller and provides the concrete implementation.

pub mod builtins;

use thiserror::Error;

use crate::config::{KeymapId, Modifier};
use crate::platform::{ActionExecutor, KeyState, WindowHandle, WindowSystem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("'{0}' expects {1} argument(s)")]
    ArityMismatch(&'static str, usize),
    #[error("'{0}' expects a key-name argument, got something else")]
    WrongArgType(&'static str),
    #[error("recursion limit exceeded during action generation")]
    RecursionLimit,
}

/// A parsed command argument; the generic vector every command receives
/// regardless of its specific shape, matching the `load(vector<Token>)`
/// contract every `FunctionData` subclass implemented.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Number(i64),
    Regexp(String),
    KeyName(String),
}

/// The full roster from `function_creator.cpp`'s registration table (~60
/// primitives, §2 Command Library). One variant per primitive; no data --
/// arguments are carried alongside in `config::Action::Function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Default,
    KeymapParent,
    KeymapWindow,
    KeymapPrevPrefix,
    OtherWindowClass,
    Prefix,
    Keymap,
    Sync,
    Toggle,
    EditNextModifier,
    Variable,
    Repeat,
    Undefined,
    Ignore,
    PostMessage,
    ShellExecute,
    SetForegroundWindow,
    LoadSetting,
    Vk,
    Wait,
    InvestigateCommand,
    MayuDialog,
    DescribeBindings,
    HelpMessage,
    HelpVariable,
    WindowRaise,
    WindowLower,
    WindowMinimize,
    WindowMaximize,
    WindowHMaximize,
    WindowVMaximize,
    WindowHVMaximize,
    WindowMove,
    WindowMoveTo,
    WindowMoveVisibly,
    WindowMonitorTo,
    WindowMonitor,
    WindowClingToLeft,
    WindowClingToRight,
    WindowClingToTop,
    WindowClingToBottom,
    WindowClose,
    WindowToggleTopMost,
    WindowIdentify,
    WindowSetAlpha,
    WindowRedraw,
    WindowResizeTo,
    MouseMove,
    MouseWheel,
    ClipboardChangeCase,
    ClipboardUpcaseWord,
    ClipboardDowncaseWord,
    ClipboardCopy,
    EmacsEditKillLinePred,
    EmacsEditKillLineFunc,
    LogClear,
    Recenter,
    DirectSSTP,
    PlugIn,
    SetImeStatus,
    SetImeString,
    MouseHook,
    CancelPrefix,
}

/// `(name, id)` registration table -- the order mirrors
/// `function_creator.cpp` so a diff against the original stays legible.
pub const REGISTRY: &[(&str, CommandId)] = &[
    ("Default", CommandId::Default),
    ("KeymapParent", CommandId::KeymapParent),
    ("KeymapWindow", CommandId::KeymapWindow),
    ("KeymapPrevPrefix", CommandId::KeymapPrevPrefix),
    ("OtherWindowClass", CommandId::OtherWindowClass),
    ("Prefix", CommandId::Prefix),
    ("Keymap", CommandId::Keymap),
    ("Sync", CommandId::Sync),
    ("Toggle", CommandId::Toggle),
    ("EditNextModifier", CommandId::EditNextModifier),
    ("Variable", CommandId::Variable),
    ("Repeat", CommandId::Repeat),
    ("Undefined", CommandId::Undefined),
    ("Ignore", CommandId::Ignore),
    ("PostMessage", CommandId::PostMessage),
    ("ShellExecute", CommandId::ShellExecute),
    ("SetForegroundWindow", CommandId::SetForegroundWindow),
    ("LoadSetting", CommandId::LoadSetting),
    ("VK", CommandId::Vk),
    ("Wait", CommandId::Wait),
    ("InvestigateCommand", CommandId::InvestigateCommand),
    ("MayuDialog", CommandId::MayuDialog),
    ("DescribeBindings", CommandId::DescribeBindings),
    ("HelpMessage", CommandId::HelpMessage),
    ("HelpVariable", CommandId::HelpVariable),
    ("WindowRaise", CommandId::WindowRaise),
    ("WindowLower", CommandId::WindowLower),
    ("WindowMinimize", CommandId::WindowMinimize),
    ("WindowMaximize", CommandId::WindowMaximize),
    ("WindowHMaximize", CommandId::WindowHMaximize),
    ("WindowVMaximize", CommandId::WindowVMaximize),
    ("WindowHVMaximize", CommandId::WindowHVMaximize),
    ("WindowMove", CommandId::WindowMove),
    ("WindowMoveTo", CommandId::WindowMoveTo),
    ("WindowMoveVisibly", CommandId::WindowMoveVisibly),
    ("WindowMonitorTo", CommandId::WindowMonitorTo),
    ("WindowMonitor", CommandId::WindowMonitor),
    ("WindowClingToLeft", CommandId::WindowClingToLeft),
    ("WindowClingToRight", CommandId::WindowClingToRight),
    ("WindowClingToTop", CommandId::WindowClingToTop),
    ("WindowClingToBottom", CommandId::WindowClingToBottom),
    ("WindowClose", CommandId::WindowClose),
    ("WindowToggleTopMost", CommandId::WindowToggleTopMost),
    ("WindowIdentify", CommandId::WindowIdentify),
    ("WindowSetAlpha", CommandId::WindowSetAlpha),
    ("WindowRedraw", CommandId::WindowRedraw),
    ("WindowResizeTo", CommandId::WindowResizeTo),
    ("MouseMove", CommandId::MouseMove),
    ("MouseWheel", CommandId::MouseWheel),
    ("ClipboardChangeCase", CommandId::ClipboardChangeCase),
    ("ClipboardUpcaseWord", CommandId::ClipboardUpcaseWord),
    ("ClipboardDowncaseWord", CommandId::ClipboardDowncaseWord),
    ("ClipboardCopy", CommandId::ClipboardCopy),
    ("EmacsEditKillLinePred", CommandId::EmacsEditKillLinePred),
    ("EmacsEditKillLineFunc", CommandId::EmacsEditKillLineFunc),
    ("LogClear", CommandId::LogClear),
    ("Recenter", CommandId::Recenter),
    ("DirectSSTP", CommandId::DirectSSTP),
    ("PlugIn", CommandId::PlugIn),
    ("SetImeStatus", CommandId::SetImeStatus),
    ("SetImeString", CommandId::SetImeString),
    ("MouseHook", CommandId::MouseHook),
    ("CancelPrefix", CommandId::CancelPrefix),
];

pub fn lookup(name: &str) -> Option<CommandId> {
    REGISTRY.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
}

pub fn name_of(id: CommandId) -> &'static str {
    REGISTRY
        .iter()
        .find(|(_, c)| *c == id)
        .map(|(n, _)| *n)
        .unwrap_or("?")
}

/// Capability bundle a command executes against. Implemented by
/// `engine::pipeline::PipelineContext` over the live `RuntimeState`.
pub trait CommandContext {
    fn window_system(&self) -> &dyn WindowSystem;
    fn action_executor(&self) -> &dyn ActionExecutor;
    fn current_window(&self) -> WindowHandle;
    fn press_state(&self) -> KeyState;

    /// `&Prefix(name)`: enter the named keymap for exactly the next input.
    fn enter_prefix(&mut self, keymap: KeymapId);
    /// `&KeymapParent`/`&KeymapPrevPrefix`: step the active keymap pointer.
    fn switch_keymap(&mut self, keymap: KeymapId);
    fn cancel_prefix(&mut self);
    /// `&Toggle(name)`: flip a named boolean the compiler can later probe
    /// via `if`/`elseif`-style symbol checks at runtime (lock-state bits).
    fn toggle(&mut self, name: &str) -> bool;
    /// `&EditNextModifier`: merge bits into the pending-next-event modifier.
    fn edit_next_modifier(&mut self, modifier: Modifier);
    fn sync_ack(&mut self);
    fn log(&mut self, message: &str);
    fn request_shell_execute(&mut self, command: &str);
    fn request_load_setting(&mut self, path: &str);
    fn request_set_foreground(&mut self, hwnd: WindowHandle);
    fn request_post_message(&mut self, target: &str, message: &str);
}

/// Executes one command primitive. `modifier` is the `Modifier` parsed
/// alongside the function reference (`&Prefix(Prefix)` style arguments
/// that scope behavior); `args` is the generic argument vector.
pub fn execute(
    id: CommandId,
    args: &[Arg],
    modifier: Modifier,
    ctx: &mut dyn CommandContext,
) -> Result<(), CommandError> {
    builtins::dispatch(id, args, modifier, ctx)
}
