//! `generateKeyEvent`/`generateModifierEvents`/`generateKeySeqEvents`.
//!
//! Grounded on
//! `examples/original_source/src/core/engine/engine_generator.cpp`. These
//! functions are the only place that calls into the `ActionExecutor`
//! (injection) and the `CommandContext` (command primitives); everything
//! above them in `pipeline.rs` is pure state-machine bookkeeping.

use crate::command::{self, Arg};
use crate::config::{Action, KeySeqId, ModifierType, Setting};
use crate::platform::{self, ActionExecutor, KeyState};

use super::state::RuntimeState;

/// Recursion guard cap (§4.2 step 12): generation aborts past this depth,
/// catching keymap loops.
const MAX_GENERATION_DEPTH: u32 = 64;

/// Which legs of a `KeySeq`'s actions to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Down,
    Up,
    All,
}

/// Emits a synthesized key event, tracking `isPressedOnWin32`/
/// `isPressedByAssign` and deduplicating an already-released key (unless
/// it's the designated sync key, which always gets a paired pulse).
pub fn generate_key_event(
    state: &mut RuntimeState,
    executor: &dyn ActionExecutor,
    key: crate::config::KeyId,
    do_press: bool,
    is_by_assign: bool,
) {
    let flags = &mut state.key_flags[key.0 as usize];
    let already_released = !do_press && !flags.is_pressed_on_win32;
    flags.is_pressed_on_win32 = do_press;
    if is_by_assign {
        flags.is_pressed_by_assign = do_press;
    }

    let is_sync = state.setting.keyboard.sync_key == Some(key);
    if !already_released || is_sync {
        let key_data = &state.setting.keyboard.keys[key.0 as usize];
        if let Some(platform_key) = resolve_platform_key(&key_data.name) {
            let action = platform::Action::InjectKey {
                key: platform_key,
                state: if do_press { KeyState::Down } else { KeyState::Up },
            };
            if let Err(e) = executor.execute(&action) {
                log::warn!("generator: injection failed for {}: {e}", key_data.name);
            }
        } else {
            log::trace!(
                "generator: no platform KeyCode for '{}', nothing injected",
                key_data.name
            );
        }
        state.last_generated_key = if do_press { Some(key) } else { None };
    }
}

/// Maps a config-layer key name to the physical `platform::KeyCode`. Real
/// deployments populate this from the scan-code table the user's `def key`
/// statements declare; the fixed name table below covers the common
/// single-letter/function-key vocabulary so bindings using plain key names
/// inject correctly without a per-OS scancode database.
fn resolve_platform_key(name: &str) -> Option<platform::KeyCode> {
    use platform::KeyCode::*;
    Some(match name {
        "A" => A, "B" => B, "C" => C, "D" => D, "E" => E, "F" => F, "G" => G,
        "H" => H, "I" => I, "J" => J, "K" => K, "L" => L, "M" => M, "N" => N,
        "O" => O, "P" => P, "Q" => Q, "R" => R, "S" => S, "T" => T, "U" => U,
        "V" => V, "W" => W, "X" => X, "Y" => Y, "Z" => Z,
        "LShift" | "RShift" | "Shift" => Shift,
        "LCtrl" | "RCtrl" | "Ctrl" | "Control" => Ctrl,
        "LAlt" | "RAlt" | "Alt" => Alt,
        "LWin" | "RWin" | "Windows" | "Meta" => Meta,
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "Delete" | "Del" => Delete,
        "Insert" | "Ins" => Insert,
        "Home" => Home,
        "End" => End,
        "PageUp" | "PgUp" => PageUp,
        "PageDown" | "PgDn" => PageDown,
        "Up" => Up,
        "Down" => Down,
        "Left" => Left,
        "Right" => Right,
        _ => return None,
    })
}

/// Modifier synthesis (§4.2 step 11). Walks each BASIC group in
/// declaration order, pressing/releasing the canonical key for that group
/// to reach `target`. Before releasing Alt/Windows when the last
/// generated key was itself one of those, nops a Shift (or Control, if
/// Shift is unassigned) tap first to dodge unwanted menu activation.
pub fn generate_modifier_events(
    state: &mut RuntimeState,
    executor: &dyn ActionExecutor,
    keymap: crate::config::KeymapId,
    target: crate::config::Modifier,
) {
    let km_mods = state.setting.keymaps.get(keymap).mod_assignments.clone();
    for ty in ModifierType::BASIC {
        if target.is_dontcare(ty) {
            continue;
        }
        let Some(assigns) = km_mods.get(&ty) else { continue };
        if assigns.is_empty() {
            continue;
        }
        if target.is_pressed(ty) {
            let none_pressed = assigns
                .iter()
                .all(|a| !state.key_flags[a.key.0 as usize].is_pressed_on_win32);
            if none_pressed {
                let by_assign: Vec<_> = assigns
                    .iter()
                    .filter(|a| state.key_flags[a.key.0 as usize].is_pressed_by_assign)
                    .collect();
                if by_assign.is_empty() {
                    generate_key_event(state, executor, assigns[0].key, true, false);
                } else {
                    for a in by_assign {
                        generate_key_event(state, executor, a.key, true, false);
                    }
                }
            }
        } else {
            if matches!(ty, ModifierType::Alt | ModifierType::Windows)
                && assigns.iter().any(|a| Some(a.key) == state.last_generated_key)
            {
                let nop_group = km_mods
                    .get(&ModifierType::Shift)
                    .filter(|g| !g.is_empty())
                    .or_else(|| km_mods.get(&ModifierType::Control).filter(|g| !g.is_empty()));
                if let Some(nop_group) = nop_group {
                    let nop_key = nop_group[0].key;
                    generate_key_event(state, executor, nop_key, true, false);
                    generate_key_event(state, executor, nop_key, false, false);
                }
            }
            for a in assigns {
                if state.key_flags[a.key.0 as usize].is_pressed_on_win32 {
                    generate_key_event(state, executor, a.key, false, false);
                }
            }
        }
    }
}

/// Runs the actions of a `KeySeq`, recursing through nested `KeySeq`
/// references and invoking command primitives for `function` actions.
/// `part` selects which legs of each action to run; `is_press` gates
/// `function` actions' Up/Down polarity.
///
/// Takes `pctx` rather than a standing `&mut dyn CommandContext`: a
/// `CommandContext` adapter borrows `state` for its own duration, so it is
/// constructed fresh (and dropped) inside the `Function` arm below rather
/// than held across the whole call -- holding both a live adapter and this
/// function's own `&mut RuntimeState` at once would be two overlapping
/// exclusive borrows of the same state.
pub fn generate_key_seq_events(
    state: &mut RuntimeState,
    pctx: &super::pipeline::PipelineContext<'_>,
    setting: &Setting,
    seq_id: KeySeqId,
    part: Part,
    is_press: bool,
) -> Result<(), command::CommandError> {
    state.generation_depth += 1;
    if state.generation_depth > MAX_GENERATION_DEPTH {
        state.generation_depth -= 1;
        log::error!("generator: recursion limit exceeded, aborting generation");
        return Err(command::CommandError::RecursionLimit);
    }

    let seq = setting.keyseqs.get(seq_id);
    let n = seq.actions.len();
    for (i, action) in seq.actions.iter().enumerate() {
        let is_last = i + 1 == n;
        let run_press = match part {
            Part::Down => true,
            Part::Up => false,
            Part::All => true,
        };
        let run_release = match part {
            Part::Down => !is_last,
            Part::Up => is_last,
            Part::All => true,
        };
        if !run_press && !run_release {
            continue;
        }
        match action {
            Action::Key(mk) => {
                if run_press {
                    let keymap = state.current_keymap();
                    generate_modifier_events(state, pctx.executor, keymap, mk.modifier);
                    generate_key_event(state, pctx.executor, mk.key, true, true);
                }
                if run_release {
                    generate_key_event(state, pctx.executor, mk.key, false, true);
                }
            }
            Action::KeySeq(inner) => {
                generate_key_seq_events(state, pctx, setting, *inner, part, is_press)?;
            }
            Action::Function { cmd, modifier, args } => {
                let gated = match part {
                    Part::Down => is_press,
                    Part::Up => !is_press,
                    Part::All => true,
                };
                if gated {
                    let args: Vec<Arg> = args.clone();
                    let mut ctx = super::pipeline::CommandCtx { state: &mut *state, pctx };
                    if let Err(e) = command::execute(*cmd, &args, *modifier, &mut ctx) {
                        log::warn!("generator: command {:?} failed: {e}", cmd);
                    }
                }
            }
        }
    }
    state.generation_depth -= 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Key, KeySeq, Keymap, ModifiedKey, Modifier, ScanCode};
    use crate::engine::pipeline::PipelineContext;
    use crate::platform::{Action as PAction, NullWindowSystem, PlatformError};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingExecutor {
        injected: Mutex<Vec<(String, bool)>>,
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute(&self, action: &PAction) -> Result<(), PlatformError> {
            if let PAction::InjectKey { key, state } = action {
                self.injected
                    .lock()
                    .unwrap()
                    .push((format!("{key:?}"), *state == KeyState::Down));
            }
            Ok(())
        }
    }

    fn setting_with_simple_remap() -> (Setting, KeySeqId) {
        let mut setting = Setting::default();
        let a = setting.keyboard.push_key(Key {
            name: "A".into(),
            aliases: vec![],
            scan_codes: vec![ScanCode::new(0x1e)],
            event: None,
        });
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let mut seq = KeySeq::new("");
        seq.actions.push(Action::Key(ModifiedKey::new(a, Modifier::none())));
        let seq_id = setting.keyseqs.push(seq);
        (setting, seq_id)
    }

    #[test]
    fn generate_key_seq_events_injects_key() {
        let (setting, seq_id) = setting_with_simple_remap();
        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();
        let window_system = NullWindowSystem;
        let pctx = PipelineContext {
            executor: &executor,
            window_system: &window_system,
            current_window: 0,
        };
        generate_key_seq_events(&mut state, &pctx, &setting, seq_id, Part::All, true).unwrap();
        let log = executor.injected.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].1);
        assert!(!log[1].1);
    }

    #[test]
    fn releasing_alt_after_generating_it_nops_a_shift_tap_first() {
        let mut setting = Setting::default();
        let alt = setting.keyboard.push_key(Key {
            name: "LAlt".into(),
            aliases: vec![],
            scan_codes: vec![ScanCode::new(0x38)],
            event: None,
        });
        let shift = setting.keyboard.push_key(Key {
            name: "LShift".into(),
            aliases: vec![],
            scan_codes: vec![ScanCode::new(0x2a)],
            event: None,
        });
        let mut global = Keymap::new("Global");
        global.mod_assignments.insert(
            ModifierType::Alt,
            vec![crate::config::ModAssignment {
                key: alt,
                mode: crate::config::ModAssignMode::Normal,
            }],
        );
        global.mod_assignments.insert(
            ModifierType::Shift,
            vec![crate::config::ModAssignment {
                key: shift,
                mode: crate::config::ModAssignMode::Normal,
            }],
        );
        let keymap = setting.keymaps.push(global);
        setting.keymaps.global = Some(keymap);

        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();

        // Alt was the last key the generator actually injected, and is
        // still held; asking to release it must nop-tap Shift first.
        state.key_flags[alt.0 as usize].is_pressed_on_win32 = true;
        state.last_generated_key = Some(alt);

        let mut target = Modifier::any();
        target.release(ModifierType::Alt);
        generate_modifier_events(&mut state, &executor, keymap, target);

        let log = executor.injected.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], ("Shift".to_string(), true));
        assert_eq!(log[1], ("Shift".to_string(), false));
        assert_eq!(log[2].1, false);
    }

    #[test]
    fn recursion_guard_aborts_self_referential_sequence() {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let placeholder = setting.keyseqs.push(KeySeq::new(""));
        setting.keyseqs.seqs[placeholder.0 as usize]
            .actions
            .push(Action::KeySeq(placeholder));
        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();
        let window_system = NullWindowSystem;
        let pctx = PipelineContext {
            executor: &executor,
            window_system: &window_system,
            current_window: 0,
        };
        let result =
            generate_key_seq_events(&mut state, &pctx, &setting, placeholder, Part::All, true);
        assert!(result.is_err());
    }
}
