//! The 15-step per-event pipeline (spec.md §4.2), grounded on
//! `examples/original_source/src/core/engine/engine_keyboard_handler.cpp`'s
//! `keyboardHandler()` loop body.
//!
//! `process_event` is the consumer-thread entry point: one call per event
//! popped off `event_bus`. It owns the `RuntimeState` lock for its whole
//! duration, matching the original's single `Acquire a(&m_cs)` spanning the
//! entire per-event body.

use std::time::Instant;

use crate::command::CommandContext;
use crate::config::{Modifier, ModifierType, Setting};
use crate::platform::{Action as PAction, ActionExecutor, KeyState, WindowHandle, WindowSystem};

use super::generator::{self, Part};
use super::state::{OneShotState, RuntimeState};

/// A physical event as it reaches the pipeline, already stripped of
/// transport concerns (§4.5's event bus hands these across the queue).
#[derive(Debug, Clone, Copy)]
pub struct RawEvent {
    pub scan: crate::config::ScanCode,
    pub is_pressed: bool,
    pub is_mouse: bool,
}

/// Everything `process_event` needs that isn't already inside
/// `RuntimeState`: the injector and the command-dispatch capability
/// bundle. Kept as two separate trait objects (rather than folding
/// `CommandContext` into `RuntimeState` itself) because `CommandContext`
/// also needs the `WindowSystem` and "current window" facts the pipeline
/// doesn't otherwise track.
pub struct PipelineContext<'a> {
    pub executor: &'a dyn ActionExecutor,
    pub window_system: &'a dyn WindowSystem,
    pub current_window: WindowHandle,
}

/// Adapts `RuntimeState` + `PipelineContext` to the `CommandContext` trait
/// commands execute against. Constructed fresh inside
/// `generator::generate_key_seq_events`'s `function` arm, scoped to that one
/// `command::execute` call -- never held across the generator's own
/// `&mut RuntimeState` borrow, which would alias it.
pub(crate) struct CommandCtx<'a, 'b> {
    pub(crate) state: &'a mut RuntimeState,
    pub(crate) pctx: &'a PipelineContext<'b>,
}

impl<'a, 'b> CommandContext for CommandCtx<'a, 'b> {
    fn window_system(&self) -> &dyn WindowSystem {
        self.pctx.window_system
    }
    fn action_executor(&self) -> &dyn ActionExecutor {
        self.pctx.executor
    }
    fn current_window(&self) -> WindowHandle {
        self.pctx.current_window
    }
    fn press_state(&self) -> KeyState {
        KeyState::Down
    }
    fn enter_prefix(&mut self, keymap: crate::config::KeymapId) {
        self.state.is_prefix = true;
        self.state.prefix_keymap = Some(keymap);
    }
    fn switch_keymap(&mut self, keymap: crate::config::KeymapId) {
        self.state.prefix_keymap = Some(keymap);
    }
    fn cancel_prefix(&mut self) {
        self.state.is_prefix = false;
        self.state.prefix_keymap = None;
    }
    fn toggle(&mut self, name: &str) -> bool {
        let entry = self.state.toggles.entry(name.to_string()).or_insert(false);
        *entry = !*entry;
        *entry
    }
    fn edit_next_modifier(&mut self, modifier: Modifier) {
        self.state.pending_next_modifier = modifier;
    }
    fn sync_ack(&mut self) {
        log::debug!("pipeline: sync acknowledged");
    }
    fn log(&mut self, message: &str) {
        log::info!("command: {message}");
    }
    fn request_shell_execute(&mut self, command: &str) {
        if let Err(e) = self.pctx.executor.execute(&PAction::Exec {
            command: command.to_string(),
        }) {
            log::warn!("pipeline: shell execute failed: {e}");
        }
    }
    fn request_load_setting(&mut self, path: &str) {
        log::info!("pipeline: load-setting requested for '{path}' (handled by the IPC layer)");
    }
    fn request_set_foreground(&mut self, hwnd: WindowHandle) {
        self.pctx.window_system.set_foreground(hwnd);
    }
    fn request_post_message(&mut self, target: &str, message: &str) {
        log::debug!("pipeline: post_message({target}, {message}) [no messaging backend configured]");
    }
}

/// Finds which `ModifierType` (if any) a key acts as within `keymap`,
/// along with the configured assignment mode (step 5, "fix modifier").
fn find_mod_assignment(
    setting: &Setting,
    keymap: crate::config::KeymapId,
    key: crate::config::KeyId,
) -> Option<(ModifierType, crate::config::ModAssignMode)> {
    let km = setting.keymaps.get(keymap);
    for (ty, assigns) in &km.mod_assignments {
        if let Some(a) = assigns.iter().find(|a| a.key == key) {
            return Some((*ty, a.mode));
        }
    }
    None
}

/// Runs one physical event through the full pipeline. Returns once the
/// event (and any events it synthesizes) has been fully handled.
pub fn process_event(
    state: &mut RuntimeState,
    pctx: &PipelineContext<'_>,
    event: RawEvent,
) {
    let start = Instant::now();

    // Step 1: gate.
    if !state.enabled {
        passthrough(pctx, event);
        return;
    }

    // Step 2: identify.
    let Some(key_id) = state.setting.keyboard.find_by_scan(event.scan) else {
        passthrough(pctx, event);
        return;
    };

    // Step 3: press counter.
    {
        let flags = &mut state.key_flags[key_id.0 as usize];
        if !flags.is_pressed && event.is_pressed {
            state.current_key_press_count += 1;
        } else if flags.is_pressed && !event.is_pressed {
            state.current_key_press_count -= 1;
        }
        flags.is_pressed = event.is_pressed;
    }

    let keymap = state.current_keymap_for_event(event.is_pressed);

    // Step 4: build current modifier.
    let mut modifier = state.build_current_modifier(keymap, key_id, !event.is_pressed);

    // Step 5: fix modifier.
    let assign = find_mod_assignment(&state.setting, keymap, key_id);
    if let Some((ty, _)) = assign {
        modifier.dontcare(ty);
    }
    let mode = assign.map(|(_, mode)| mode);

    // Step 6: apply pending prefix edit.
    if state.is_prefix {
        if !state.pending_next_modifier.is_dontcare(ModifierType::Shift)
            || !state.pending_next_modifier.is_dontcare(ModifierType::Control)
            || !state.pending_next_modifier.is_dontcare(ModifierType::Alt)
            || !state.pending_next_modifier.is_dontcare(ModifierType::Windows)
        {
            modifier = merge_modifier(state.pending_next_modifier, modifier);
            state.pending_next_modifier = Modifier::any();
        }
    }

    let probe = crate::config::ModifiedKey::new(key_id, modifier);

    // Step 7: dispatch on assignment mode.
    use crate::config::ModAssignMode::*;
    match mode {
        Some(True) => {
            log::trace!("pipeline: true modifier {key_id:?}");
        }
        Some(OneShot) | Some(OneShotRepeatable) => {
            dispatch_one_shot(state, pctx, probe, event.is_pressed, mode == Some(OneShotRepeatable));
        }
        Some(crate::config::ModAssignMode::Normal) | None => {
            if event.is_pressed {
                state.one_shot = None;
            }
            // Step 8: substitute.
            let probe = state.setting.keyboard.substitute(probe);
            // Step 9: prefix housekeeping.
            run_prefix_housekeeping(state, event.is_pressed);
            // Step 10: bind and generate.
            run_binding(state, pctx, keymap, key_id, probe, event.is_pressed);
        }
    }

    // Step 13: drain.
    if state.current_key_press_count <= 0 {
        generator::generate_modifier_events(state, pctx.executor, keymap, Modifier::none());
        state.current_key_press_count = 0;
        state.one_shot = None;
        if !state.lock_modifier.is_pressed(ModifierType::Touchpad) {
            state.lock_modifier.release(ModifierType::TouchpadSticky);
        }
    }

    // Step 14: update last-pressed history.
    if event.is_pressed {
        state.last_pressed.push(key_id);
    }

    // Step 15: record metric.
    crate::metrics::record_key_processing_latency(start.elapsed());
}

fn merge_modifier(edit: Modifier, base: Modifier) -> Modifier {
    let mut m = base;
    for ty in ModifierType::BASIC {
        if !edit.is_dontcare(ty) {
            if edit.is_pressed(ty) {
                m.press(ty);
            } else {
                m.release(ty);
            }
        }
    }
    m
}

fn dispatch_one_shot(
    state: &mut RuntimeState,
    pctx: &PipelineContext<'_>,
    probe: crate::config::ModifiedKey,
    is_pressed: bool,
    repeatable: bool,
) {
    if is_pressed {
        let same_key_held = repeatable
            && state
                .one_shot
                .as_ref()
                .is_some_and(|os| os.pending.key == probe.key);
        if same_key_held {
            let count = state
                .one_shot
                .as_mut()
                .map(|os| {
                    let c = os.repeat_count.unwrap_or(0);
                    os.repeat_count = Some(c + 1);
                    c
                })
                .unwrap_or(0);
            if count >= state.one_shot_repeatable_threshold().0 {
                let keymap = state.current_keymap();
                run_binding(state, pctx, keymap, probe.key, probe, true);
            }
        } else {
            state.one_shot = Some(OneShotState {
                pending: probe,
                repeat_count: repeatable.then_some(0),
            });
        }
    } else if let Some(os) = state.one_shot.take() {
        let keymap = state.current_keymap();
        tap_one_shot_modifier(state, pctx, keymap, os.pending.key);
    }
}

/// Taps the real key standing in for the `ModifierType` group `one_shot_key`
/// is fixed to: the one-shot key's own identity never reaches the OS, only
/// a press/release pulse of the modifier it was declared for
/// (`examples/original_source/src/core/engine/engine_modifier.cpp`'s
/// `fixModifierKey` likewise only ever touches the probe's modifier bit,
/// never the key identity -- the real key is resolved the same way
/// `generate_modifier_events` already does for any other modifier target).
fn tap_one_shot_modifier(
    state: &mut RuntimeState,
    pctx: &PipelineContext<'_>,
    keymap: crate::config::KeymapId,
    one_shot_key: crate::config::KeyId,
) {
    let Some((ty, _)) = find_mod_assignment(&state.setting, keymap, one_shot_key) else {
        return;
    };
    let mut down = Modifier::none();
    down.press(ty);
    generator::generate_modifier_events(state, pctx.executor, keymap, down);
    let mut up = Modifier::none();
    up.release(ty);
    generator::generate_modifier_events(state, pctx.executor, keymap, up);
}

fn run_prefix_housekeeping(state: &mut RuntimeState, is_pressed: bool) {
    if !state.is_prefix {
        return;
    }
    if is_pressed {
        state.is_prefix = false;
        state.prefix_keymap = None;
    }
}

/// Step 10: resolves the bound `KeySeq` (falling back to the keymap's
/// default) and runs it through the generator.
///
/// The binding decision is made once, on the press, and stashed on
/// `key_id`'s runtime flags; the matching release replays that same
/// decision rather than re-resolving it. A prefix/focus change between
/// the press and release of one physical key must not retarget which
/// action its release plays -- grounded on
/// `examples/original_source/src/core/engine/engine_generator.cpp`'s
/// `Current` carrying the keymap/assignment the press already resolved.
fn run_binding(
    state: &mut RuntimeState,
    pctx: &PipelineContext<'_>,
    keymap: crate::config::KeymapId,
    key_id: crate::config::KeyId,
    probe: crate::config::ModifiedKey,
    is_pressed: bool,
) {
    let setting = state.setting.clone();
    let seq_id = if is_pressed {
        let km = setting.keymaps.get(keymap);
        let seq_id = km
            .search_assignment(probe, &setting.keyboard)
            .or(km.default_keyseq);
        state.key_flags[key_id.0 as usize].pending_dispatch = seq_id;
        seq_id
    } else {
        state.key_flags[key_id.0 as usize].pending_dispatch
    };
    let Some(seq_id) = seq_id else {
        // A known key with no matching binding and no keymap default:
        // the physical keystroke reaches the OS unchanged (spec.md §8 S6).
        generator::generate_key_event(state, pctx.executor, key_id, is_pressed, false);
        return;
    };
    let part = if is_pressed { Part::Down } else { Part::Up };
    if let Err(e) =
        generator::generate_key_seq_events(state, pctx, &setting, seq_id, part, is_pressed)
    {
        log::warn!("pipeline: generation aborted: {e}");
    }
    if !is_pressed {
        // The sequence's own modifier requirements (step 11) may have forced
        // a physically-held BASIC modifier off to fire the chord; once its
        // release leg has run, resync injected modifier state to what is
        // still physically held, same as the idle-drain step (step 13) does
        // at press-count zero.
        let restore = state.build_current_modifier(keymap, key_id, true);
        generator::generate_modifier_events(state, pctx.executor, keymap, restore);
    }
}

fn passthrough(pctx: &PipelineContext<'_>, event: RawEvent) {
    let _ = event;
    if let Err(e) = pctx.executor.execute(&PAction::Passthrough) {
        log::warn!("pipeline: passthrough failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Key, KeySeq, Keymap, ModifiedKey, ScanCode, Setting};
    use crate::platform::NullWindowSystem;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingExecutor {
        actions: Mutex<Vec<PAction>>,
    }

    impl ActionExecutor for RecordingExecutor {
        fn execute(&self, action: &PAction) -> Result<(), crate::platform::PlatformError> {
            self.actions.lock().unwrap().push(action.clone());
            Ok(())
        }
    }

    fn simple_remap_setting() -> (Setting, crate::config::ScanCode) {
        let mut setting = Setting::default();
        let scan = ScanCode::new(0x1e);
        let a = setting.keyboard.push_key(Key {
            name: "A".into(),
            aliases: vec![],
            scan_codes: vec![scan],
            event: None,
        });
        let b = setting.keyboard.push_key(Key {
            name: "B".into(),
            aliases: vec![],
            scan_codes: vec![ScanCode::new(0x30)],
            event: None,
        });
        let mut seq = KeySeq::new("");
        seq.actions
            .push(crate::config::Action::Key(ModifiedKey::new(b, crate::config::Modifier::none())));
        let seq_id = setting.keyseqs.push(seq);
        let mut global = Keymap::new("Global");
        global.insert_assignment(
            crate::config::KeyAssignment {
                lhs: ModifiedKey::new(a, crate::config::Modifier::none()),
                rhs: seq_id,
            },
            &setting.keyboard,
        );
        let id = setting.keymaps.push(global);
        setting.keymaps.global = Some(id);
        (setting, scan)
    }

    #[test]
    fn remaps_a_to_b_on_press_and_release() {
        let (setting, scan) = simple_remap_setting();
        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();
        let window_system = NullWindowSystem;
        let pctx = PipelineContext {
            executor: &executor,
            window_system: &window_system,
            current_window: 0,
        };

        process_event(&mut state, &pctx, RawEvent { scan, is_pressed: true, is_mouse: false });
        process_event(&mut state, &pctx, RawEvent { scan, is_pressed: false, is_mouse: false });

        let log = executor.actions.lock().unwrap();
        let injected: Vec<_> = log
            .iter()
            .filter_map(|a| match a {
                PAction::InjectKey { key, state } => Some((*key, *state)),
                _ => None,
            })
            .collect();
        assert!(injected.contains(&(crate::platform::KeyCode::B, KeyState::Down)));
        assert!(injected.contains(&(crate::platform::KeyCode::B, KeyState::Up)));
    }

    #[test]
    fn unbound_key_passes_through() {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();
        let window_system = NullWindowSystem;
        let pctx = PipelineContext {
            executor: &executor,
            window_system: &window_system,
            current_window: 0,
        };
        process_event(
            &mut state,
            &pctx,
            RawEvent { scan: ScanCode::new(0x99), is_pressed: true, is_mouse: false },
        );
        let log = executor.actions.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0], PAction::Passthrough));
    }

    #[test]
    fn known_key_with_no_binding_injects_itself() {
        let mut setting = Setting::default();
        let scan = ScanCode::new(0x1e);
        setting.keyboard.push_key(Key {
            name: "A".into(),
            aliases: vec![],
            scan_codes: vec![scan],
            event: None,
        });
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let setting = Arc::new(setting);
        let mut state = RuntimeState::new(setting.clone());
        let executor = RecordingExecutor::default();
        let window_system = NullWindowSystem;
        let pctx = PipelineContext {
            executor: &executor,
            window_system: &window_system,
            current_window: 0,
        };

        process_event(&mut state, &pctx, RawEvent { scan, is_pressed: true, is_mouse: false });
        process_event(&mut state, &pctx, RawEvent { scan, is_pressed: false, is_mouse: false });

        let log = executor.actions.lock().unwrap();
        let injected: Vec<_> = log
            .iter()
            .filter_map(|a| match a {
                PAction::InjectKey { key, state } => Some((*key, *state)),
                _ => None,
            })
            .collect();
        assert!(injected.contains(&(crate::platform::KeyCode::A, KeyState::Down)));
        assert!(injected.contains(&(crate::platform::KeyCode::A, KeyState::Up)));
    }
}
