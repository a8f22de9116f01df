//! Per-command execution, dispatched from `CommandId`.
//!
//! Commands that need a live GUI/window-manager collaborator that is out of
//! scope here (dialogs, IME, DirectSSTP, the extension loader) still
//! compile and run -- they invoke the `CommandContext` capability trait and
//! log at debug level, the same trait-seam-with-a-logging-only-
//! implementation pattern `NullWindowSystem` uses. Real per-OS window
//! control is the one deliberate non-implementation this crate records
//! (DESIGN.md).

use crate::config::{KeymapId, Modifier};
use crate::platform::PointerOp;

use super::{Arg, CommandContext, CommandError, CommandId};

fn key_arg<'a>(args: &'a [Arg], idx: usize, name: &'static str) -> Result<&'a str, CommandError> {
    match args.get(idx) {
        Some(Arg::KeyName(s)) | Some(Arg::Str(s)) => Ok(s.as_str()),
        Some(_) => Err(CommandError::WrongArgType(name)),
        None => Err(CommandError::ArityMismatch(name, idx + 1)),
    }
}

fn number_arg(args: &[Arg], idx: usize, name: &'static str) -> Result<i64, CommandError> {
    match args.get(idx) {
        Some(Arg::Number(n)) => Ok(*n),
        Some(_) => Err(CommandError::WrongArgType(name)),
        None => Err(CommandError::ArityMismatch(name, idx + 1)),
    }
}

/// Resolves a `&Name(...)` argument naming a keymap to its id by looking up
/// the name against the handle the context exposes. `CommandContext`
/// doesn't carry the whole `Keymaps` table (that lives in the immutable
/// `Setting`, resolved once by `engine::pipeline` before dispatch), so
/// keymap-valued arguments arrive pre-resolved as `Arg::Number` carrying
/// the raw `KeymapId`.
fn keymap_id_arg(args: &[Arg], idx: usize, name: &'static str) -> Result<KeymapId, CommandError> {
    Ok(KeymapId(number_arg(args, idx, name)? as u32))
}

pub fn dispatch(
    id: CommandId,
    args: &[Arg],
    modifier: Modifier,
    ctx: &mut dyn CommandContext,
) -> Result<(), CommandError> {
    use CommandId::*;
    match id {
        Default | Undefined | Ignore => Ok(()),

        Prefix => {
            let keymap = keymap_id_arg(args, 0, "Prefix")?;
            ctx.enter_prefix(keymap);
            Ok(())
        }
        CancelPrefix => {
            ctx.cancel_prefix();
            Ok(())
        }
        Keymap | KeymapWindow => {
            let keymap = keymap_id_arg(args, 0, "Keymap")?;
            ctx.switch_keymap(keymap);
            Ok(())
        }
        KeymapParent | KeymapPrevPrefix | OtherWindowClass => {
            // Resolved by the pipeline before dispatch (it already knows
            // the current keymap's parent / previous-prefix target); here
            // it arrives as a plain switch.
            if let Ok(keymap) = keymap_id_arg(args, 0, "KeymapParent") {
                ctx.switch_keymap(keymap);
            }
            Ok(())
        }
        Sync => {
            ctx.sync_ack();
            Ok(())
        }
        Toggle => {
            let name = key_arg(args, 0, "Toggle")?;
            ctx.toggle(name);
            Ok(())
        }
        EditNextModifier => {
            ctx.edit_next_modifier(modifier);
            Ok(())
        }
        Variable => {
            let name = key_arg(args, 0, "Variable")?;
            ctx.log(&format!("Variable: {name}"));
            Ok(())
        }
        Repeat => {
            ctx.log("Repeat invoked");
            Ok(())
        }
        PostMessage => {
            let target = key_arg(args, 0, "PostMessage")?;
            let message = key_arg(args, 1, "PostMessage")?;
            ctx.request_post_message(target, message);
            Ok(())
        }
        ShellExecute => {
            let command = key_arg(args, 0, "ShellExecute")?;
            ctx.request_shell_execute(command);
            Ok(())
        }
        SetForegroundWindow => {
            ctx.request_set_foreground(ctx.current_window());
            Ok(())
        }
        LoadSetting => {
            let path = key_arg(args, 0, "LoadSetting")?;
            ctx.request_load_setting(path);
            Ok(())
        }
        Vk => {
            let name = key_arg(args, 0, "VK")?;
            ctx.log(&format!("VK: {name}"));
            Ok(())
        }
        Wait => {
            let ms = number_arg(args, 0, "Wait")?;
            std::thread::sleep(std::time::Duration::from_millis(ms.max(0) as u64));
            Ok(())
        }
        InvestigateCommand | MayuDialog | DescribeBindings | HelpMessage | HelpVariable => {
            ctx.log(&format!("{}: no GUI shell attached", super::name_of(id)));
            Ok(())
        }

        WindowRaise => {
            ctx.window_system().raise(ctx.current_window());
            Ok(())
        }
        WindowLower => {
            ctx.window_system().lower(ctx.current_window());
            Ok(())
        }
        WindowMinimize => {
            ctx.window_system().minimize(ctx.current_window());
            Ok(())
        }
        WindowMaximize => {
            ctx.window_system().maximize(ctx.current_window(), true, true);
            Ok(())
        }
        WindowHMaximize => {
            ctx.window_system().maximize(ctx.current_window(), true, false);
            Ok(())
        }
        WindowVMaximize => {
            ctx.window_system().maximize(ctx.current_window(), false, true);
            Ok(())
        }
        WindowHVMaximize => {
            ctx.window_system().maximize(ctx.current_window(), true, true);
            Ok(())
        }
        WindowMove => {
            let dx = number_arg(args, 0, "WindowMove")? as i32;
            let dy = number_arg(args, 1, "WindowMove")? as i32;
            ctx.window_system().move_by(ctx.current_window(), dx, dy);
            Ok(())
        }
        WindowMoveTo | WindowMoveVisibly => {
            let x = number_arg(args, 0, "WindowMoveTo")? as i32;
            let y = number_arg(args, 1, "WindowMoveTo")? as i32;
            ctx.window_system().move_to(ctx.current_window(), x, y);
            Ok(())
        }
        WindowMonitorTo | WindowMonitor => {
            ctx.log(&format!("{}: single-monitor host, no-op", super::name_of(id)));
            Ok(())
        }
        WindowClingToLeft => {
            ctx.window_system().move_to(ctx.current_window(), 0, 0);
            Ok(())
        }
        WindowClingToRight | WindowClingToTop | WindowClingToBottom => {
            ctx.log(&format!("{}: no monitor geometry available", super::name_of(id)));
            Ok(())
        }
        WindowClose => {
            ctx.window_system().close(ctx.current_window());
            Ok(())
        }
        WindowToggleTopMost => {
            ctx.window_system().toggle_top_most(ctx.current_window());
            Ok(())
        }
        WindowIdentify => {
            let info = ctx.window_system().identify(ctx.current_window());
            ctx.log(&format!("window: class={} title={}", info.class_name, info.title));
            Ok(())
        }
        WindowSetAlpha => {
            let alpha = number_arg(args, 0, "WindowSetAlpha")?.clamp(0, 255) as u8;
            ctx.window_system().set_alpha(ctx.current_window(), alpha);
            Ok(())
        }
        WindowRedraw => {
            ctx.log("WindowRedraw: no-op outside a real window manager");
            Ok(())
        }
        WindowResizeTo => {
            let w = number_arg(args, 0, "WindowResizeTo")? as i32;
            let h = number_arg(args, 1, "WindowResizeTo")? as i32;
            ctx.window_system().resize_to(ctx.current_window(), w, h);
            Ok(())
        }

        MouseMove => {
            let dx = number_arg(args, 0, "MouseMove")? as i32;
            let dy = number_arg(args, 1, "MouseMove")? as i32;
            ctx.action_executor()
                .execute(&crate::platform::Action::Pointer(PointerOp::MoveBy { dx, dy }))
                .ok();
            Ok(())
        }
        MouseWheel => {
            let delta = number_arg(args, 0, "MouseWheel")? as i32;
            ctx.action_executor()
                .execute(&crate::platform::Action::Pointer(PointerOp::WheelBy { delta }))
                .ok();
            Ok(())
        }

        ClipboardChangeCase | ClipboardUpcaseWord | ClipboardDowncaseWord | ClipboardCopy => {
            ctx.log(&format!("{}: no clipboard backend attached", super::name_of(id)));
            Ok(())
        }
        EmacsEditKillLinePred | EmacsEditKillLineFunc => {
            ctx.log(&format!("{}: no-op outside emacs-edit mode", super::name_of(id)));
            Ok(())
        }
        LogClear => {
            ctx.log("LogClear");
            Ok(())
        }
        Recenter => {
            ctx.log("Recenter: no-op outside emacs-edit mode");
            Ok(())
        }
        DirectSSTP | PlugIn | SetImeStatus | SetImeString | MouseHook => {
            ctx.log(&format!(
                "{}: external collaborator not attached, no-op",
                super::name_of(id)
            ));
            Ok(())
        }
    }
}
