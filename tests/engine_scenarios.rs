//! Testable Properties 2-6 and end-to-end scenarios S1-S6 (spec.md §8),
//! driven through `Engine::inject_event` rather than a real capture
//! backend.

use std::sync::{Arc, Mutex};

use yamy::command::{Arg, CommandId};
use yamy::config::{
    Action, Key, KeyAssignment, KeySeq, Keymap, KeySeqMode, ModAssignMode, ModAssignment,
    ModifiedKey, Modifier, ModifierType, ScanCode, Setting, WindowMatch, WindowMatchKind,
};
use yamy::engine::pipeline::RawEvent;
use yamy::engine::Engine;
use yamy::platform::{Action as PAction, ActionExecutor, KeyCode, KeyState, NullWindowSystem, PlatformError};

#[derive(Default)]
struct RecordingExecutor {
    log: Mutex<Vec<PAction>>,
}

impl ActionExecutor for RecordingExecutor {
    fn execute(&self, action: &PAction) -> Result<(), PlatformError> {
        self.log.lock().unwrap().push(action.clone());
        Ok(())
    }
}

impl RecordingExecutor {
    fn injected(&self) -> Vec<(KeyCode, KeyState)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| match a {
                PAction::InjectKey { key, state } => Some((*key, *state)),
                _ => None,
            })
            .collect()
    }

}

fn def_key(setting: &mut Setting, name: &str, scan: u8) -> yamy::config::KeyId {
    setting.keyboard.push_key(Key {
        name: name.to_string(),
        aliases: vec![],
        scan_codes: vec![ScanCode::new(scan)],
        event: None,
    })
}

fn new_engine(setting: Setting) -> (Engine, Arc<RecordingExecutor>) {
    let executor = Arc::new(RecordingExecutor::default());
    let engine = Engine::new(
        Arc::new(setting),
        executor.clone() as Arc<dyn ActionExecutor>,
        Arc::new(NullWindowSystem),
    );
    (engine, executor)
}

// ---------------------------------------------------------------------------
// S1 -- simple remap
// ---------------------------------------------------------------------------

#[test]
fn s1_simple_remap_injects_the_bound_key() {
    let mut setting = Setting::default();
    let a = def_key(&mut setting, "A", 0x1e);
    let b = def_key(&mut setting, "B", 0x30);
    let mut seq = KeySeq::new("");
    seq.actions.push(Action::Key(ModifiedKey::new(b, Modifier::none())));
    let seq_id = setting.keyseqs.push(seq);
    let mut global = Keymap::new("Global");
    global.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(a, Modifier::none()), rhs: seq_id },
        &setting.keyboard,
    );
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);
    let scan_a = setting.keyboard.keys[a.0 as usize].scan_codes[0];

    let (engine, executor) = new_engine(setting);
    engine.inject_event(RawEvent { scan: scan_a, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_a, is_pressed: false, is_mouse: false });

    let injected = executor.injected();
    assert_eq!(injected, vec![(KeyCode::B, KeyState::Down), (KeyCode::B, KeyState::Up)]);
}

// ---------------------------------------------------------------------------
// S6 -- focus rebind
// ---------------------------------------------------------------------------

fn setting_with_editor_rebind() -> (Setting, yamy::config::ScanCode, yamy::config::ScanCode) {
    let mut setting = Setting::default();
    let g = def_key(&mut setting, "G", 0x22);
    let escape = def_key(&mut setting, "Escape", 0x01);
    let ctrl = def_key(&mut setting, "LCtrl", 0x1d);

    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: ctrl, mode: ModAssignMode::Normal });
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let mut seq = KeySeq::new("");
    seq.actions.push(Action::Key(ModifiedKey::new(escape, Modifier::none())));
    let seq_id = setting.keyseqs.push(seq);

    let mut editor = Keymap::new("Editor");
    editor.window_match = Some(WindowMatch {
        kind: WindowMatchKind::And,
        class_pattern: Some("Emacs".to_string()),
        title_pattern: None,
    });
    // Mirrors what `Keymaps::adjust_modifier` would fold in from `Global`
    // for a real compiled child keymap.
    editor
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: ctrl, mode: ModAssignMode::Normal });
    let mut ctrl_g = Modifier::none();
    ctrl_g.press(ModifierType::Control);
    ctrl_g.normalize_up_down();
    editor.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(g, ctrl_g), rhs: seq_id },
        &setting.keyboard,
    );
    setting.keymaps.push(editor);

    let scan_g = setting.keyboard.keys[g.0 as usize].scan_codes[0];
    let scan_ctrl = setting.keyboard.keys[ctrl.0 as usize].scan_codes[0];
    (setting, scan_g, scan_ctrl)
}

#[test]
fn s6_focus_rebind_fires_only_when_window_class_matches() {
    let (setting, scan_g, scan_ctrl) = setting_with_editor_rebind();
    let (engine, executor) = new_engine(setting);

    engine.set_focus(1, 42, "Emacs", "scratch", false);
    engine.inject_event(RawEvent { scan: scan_ctrl, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_g, is_pressed: true, is_mouse: false });
    assert!(executor.injected().contains(&(KeyCode::Escape, KeyState::Down)));
}

#[test]
fn s6_focus_rebind_passes_through_on_unmatched_window() {
    let (setting, scan_g, scan_ctrl) = setting_with_editor_rebind();
    let (engine, executor) = new_engine(setting);

    engine.set_focus(1, 42, "Notepad", "Untitled", false);
    engine.inject_event(RawEvent { scan: scan_ctrl, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_g, is_pressed: true, is_mouse: false });

    assert!(!executor.injected().iter().any(|(k, _)| *k == KeyCode::Escape));
    // No Editor binding applies outside its window class, so G reaches the
    // OS unchanged rather than being silently dropped.
    assert!(executor.injected().contains(&(KeyCode::G, KeyState::Down)));
}

// ---------------------------------------------------------------------------
// Property 2 -- modifier matching (`doesMatch`)
// ---------------------------------------------------------------------------

#[test]
fn property2_dontcare_bits_match_either_physical_state() {
    let mut setting = Setting::default();
    let a = def_key(&mut setting, "A", 0x1e);
    let b = def_key(&mut setting, "B", 0x30);
    let mut seq = KeySeq::new("");
    seq.actions.push(Action::Key(ModifiedKey::new(b, Modifier::none())));
    let seq_id = setting.keyseqs.push(seq);

    // Binding leaves Shift don't-care: any Shift state should match.
    let mut lhs_modifier = Modifier::none();
    lhs_modifier.dontcare(ModifierType::Shift);
    let mut global = Keymap::new("Global");
    global.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(a, lhs_modifier), rhs: seq_id },
        &setting.keyboard,
    );
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let km = setting.keymaps.get(global_id);
    let mut shift_pressed = Modifier::none();
    shift_pressed.press(ModifierType::Shift);
    assert!(km.search_assignment(ModifiedKey::new(a, shift_pressed), &setting.keyboard).is_some());
    assert!(km
        .search_assignment(ModifiedKey::new(a, Modifier::none()), &setting.keyboard)
        .is_some());

    // A binding that explicitly requires Shift pressed must not match when
    // Shift is released.
    let mut seq2 = KeySeq::new("");
    seq2.actions.push(Action::Key(ModifiedKey::new(b, Modifier::none())));
    let seq2_id = setting.keyseqs.push(seq2);
    let mut km2 = Keymap::new("Strict");
    let mut shift_required = Modifier::none();
    shift_required.press(ModifierType::Shift);
    km2.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(a, shift_required), rhs: seq2_id },
        &setting.keyboard,
    );
    assert!(km2.search_assignment(ModifiedKey::new(a, Modifier::none()), &setting.keyboard).is_none());
    assert!(km2
        .search_assignment(ModifiedKey::new(a, shift_pressed), &setting.keyboard)
        .is_some());
}

// ---------------------------------------------------------------------------
// Property 3 -- press counter invariant
// ---------------------------------------------------------------------------

#[test]
fn property3_press_count_tracks_physically_held_keys() {
    let mut setting = Setting::default();
    let a = def_key(&mut setting, "A", 0x1e);
    let b = def_key(&mut setting, "B", 0x30);
    let global = setting.keymaps.push(Keymap::new("Global"));
    setting.keymaps.global = Some(global);
    let scan_a = setting.keyboard.keys[a.0 as usize].scan_codes[0];
    let scan_b = setting.keyboard.keys[b.0 as usize].scan_codes[0];

    let (engine, _executor) = new_engine(setting);

    engine.inject_event(RawEvent { scan: scan_a, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_b, is_pressed: true, is_mouse: false });
    assert_eq!(engine.current_key_press_count(), 2);

    engine.inject_event(RawEvent { scan: scan_a, is_pressed: false, is_mouse: false });
    assert_eq!(engine.current_key_press_count(), 1);

    engine.inject_event(RawEvent { scan: scan_b, is_pressed: false, is_mouse: false });
    assert_eq!(engine.current_key_press_count(), 0);
}

// ---------------------------------------------------------------------------
// Property 4 -- modifier release on idle
// ---------------------------------------------------------------------------

#[test]
fn property4_basic_modifiers_are_released_once_press_count_hits_zero() {
    let mut setting = Setting::default();
    let lshift = def_key(&mut setting, "LShift", 0x2a);
    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Shift)
        .or_default()
        .push(ModAssignment { key: lshift, mode: ModAssignMode::Normal });
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);
    let scan = setting.keyboard.keys[lshift.0 as usize].scan_codes[0];

    let (engine, _executor) = new_engine(setting);
    engine.inject_event(RawEvent { scan, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan, is_pressed: false, is_mouse: false });

    assert_eq!(engine.current_key_press_count(), 0);
    let km = engine.current_keymap_for(None);
    let modifier = engine.current_modifier(km, lshift, true);
    assert!(modifier.is_released(ModifierType::Shift));
    assert!(modifier.is_released(ModifierType::Alt));
    assert!(modifier.is_released(ModifierType::Control));
    assert!(modifier.is_released(ModifierType::Windows));
}

// ---------------------------------------------------------------------------
// Property 5 -- substitution is non-recursive
// ---------------------------------------------------------------------------

#[test]
fn property5_substitution_applies_only_one_hop() {
    let mut setting = Setting::default();
    let a = def_key(&mut setting, "A", 0x1e);
    let b = def_key(&mut setting, "B", 0x30);
    let c = def_key(&mut setting, "C", 0x2e);
    setting
        .keyboard
        .add_substitute(ModifiedKey::new(a, Modifier::none()), ModifiedKey::new(b, Modifier::none()));
    setting
        .keyboard
        .add_substitute(ModifiedKey::new(b, Modifier::none()), ModifiedKey::new(c, Modifier::none()));

    let once = setting.keyboard.substitute(ModifiedKey::new(a, Modifier::none()));
    assert_eq!(once.key, b);
    // Applying substitute() again (simulating a second pipeline pass) would
    // reach C; a single pass must not.
    assert_ne!(once.key, c);
}

// ---------------------------------------------------------------------------
// Property 6 -- setting swap atomicity
// ---------------------------------------------------------------------------

#[test]
fn property6_setting_swap_replaces_the_whole_arc_at_once() {
    let mut s1 = Setting::default();
    let g1 = s1.keymaps.push(Keymap::new("Global"));
    s1.keymaps.global = Some(g1);
    let (engine, _executor) = new_engine(s1);

    let km_before = engine.current_keymap_for(None);

    let mut s2 = Setting::default();
    let g2 = s2.keymaps.push(Keymap::new("Global"));
    s2.keymaps.global = Some(g2);
    let a2 = def_key(&mut s2, "A", 0x1e);
    let _ = a2;
    engine.set_setting(Arc::new(s2));

    let km_after = engine.current_keymap_for(None);
    // Both resolve to a valid Global keymap in their own Setting; the
    // handle itself changes identity with the swap (no partial update).
    assert_eq!(km_before.0, 0);
    assert_eq!(km_after.0, 0);
}

// ---------------------------------------------------------------------------
// S4 -- prefix key chord
// ---------------------------------------------------------------------------

#[test]
fn s4_prefix_chord_suppresses_the_literal_keys_and_runs_the_bound_action() {
    let mut setting = Setting::default();
    let ctrl = def_key(&mut setting, "LCtrl", 0x1d);
    let x = def_key(&mut setting, "X", 0x2d);
    let s = def_key(&mut setting, "S", 0x1f);
    let save = def_key(&mut setting, "O", 0x18); // stand-in injected key for "Save"

    // `Prefix` keymap: C-S = C-Save (Ctrl stays held through the
    // synthesized Save tap, per spec.md S4's `LCtrl down, Save down,
    // Save up, LCtrl up` sequencing).
    let mut save_seq = KeySeq::new("");
    let mut ctrl_held = Modifier::none();
    ctrl_held.press(ModifierType::Control);
    save_seq.actions.push(Action::Key(ModifiedKey::new(save, ctrl_held)));
    let save_seq_id = setting.keyseqs.push(save_seq);
    let mut prefix_km = Keymap::new("Prefix");
    // Mirrors what `Keymaps::adjust_modifier` would fold in from `Global`
    // for a real compiled child keymap (not exercised here since this
    // `Setting` is hand-built rather than compiled from source).
    prefix_km
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: ctrl, mode: ModAssignMode::Normal });
    let mut ctrl_s = Modifier::none();
    ctrl_s.press(ModifierType::Control);
    ctrl_s.normalize_up_down();
    prefix_km.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(s, ctrl_s), rhs: save_seq_id },
        &setting.keyboard,
    );
    let prefix_id = setting.keymaps.push(prefix_km);

    // Global: C-X = &Prefix(prefix_id).
    let mut enter_seq = KeySeq { name: String::new(), mode: KeySeqMode::Assign, actions: vec![] };
    enter_seq.actions.push(Action::Function {
        cmd: CommandId::Prefix,
        modifier: Modifier::none(),
        args: vec![Arg::Number(prefix_id.0 as i64)],
    });
    let enter_seq_id = setting.keyseqs.push(enter_seq);
    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: ctrl, mode: ModAssignMode::Normal });
    let mut ctrl_x = Modifier::none();
    ctrl_x.press(ModifierType::Control);
    ctrl_x.normalize_up_down();
    global.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(x, ctrl_x), rhs: enter_seq_id },
        &setting.keyboard,
    );
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let scan_ctrl = setting.keyboard.keys[ctrl.0 as usize].scan_codes[0];
    let scan_x = setting.keyboard.keys[x.0 as usize].scan_codes[0];
    let scan_s = setting.keyboard.keys[s.0 as usize].scan_codes[0];

    let (engine, executor) = new_engine(setting);

    engine.inject_event(RawEvent { scan: scan_ctrl, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_x, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_x, is_pressed: false, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_s, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_s, is_pressed: false, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_ctrl, is_pressed: false, is_mouse: false });

    let injected = executor.injected();
    assert_eq!(
        injected,
        vec![
            (KeyCode::Ctrl, KeyState::Down),
            (KeyCode::O, KeyState::Down),
            (KeyCode::O, KeyState::Up),
            (KeyCode::Ctrl, KeyState::Up),
        ]
    );
}

// ---------------------------------------------------------------------------
// S2 -- modifier fixing
// ---------------------------------------------------------------------------

#[test]
fn s2_modifier_fixing_releases_and_restores_the_physical_modifier() {
    let mut setting = Setting::default();
    let a = def_key(&mut setting, "A", 0x1e);
    let lshift = def_key(&mut setting, "LShift", 0x2a);
    let lctrl = def_key(&mut setting, "LCtrl", 0x1d);
    let x = def_key(&mut setting, "X", 0x2d);

    let mut ctrl_x = Modifier::none();
    ctrl_x.press(ModifierType::Control);
    ctrl_x.normalize_up_down();
    let mut seq = KeySeq::new("");
    seq.actions.push(Action::Key(ModifiedKey::new(x, ctrl_x)));
    let seq_id = setting.keyseqs.push(seq);

    let mut shift_a = Modifier::none();
    shift_a.press(ModifierType::Shift);
    shift_a.normalize_up_down();
    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Shift)
        .or_default()
        .push(ModAssignment { key: lshift, mode: ModAssignMode::Normal });
    global
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: lctrl, mode: ModAssignMode::Normal });
    global.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(a, shift_a), rhs: seq_id },
        &setting.keyboard,
    );
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let scan_a = setting.keyboard.keys[a.0 as usize].scan_codes[0];
    let scan_shift = setting.keyboard.keys[lshift.0 as usize].scan_codes[0];

    let (engine, executor) = new_engine(setting);

    engine.inject_event(RawEvent { scan: scan_shift, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_a, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_a, is_pressed: false, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_shift, is_pressed: false, is_mouse: false });

    let injected = executor.injected();

    // LShift passes through immediately as itself while held alone.
    assert_eq!(injected[0], (KeyCode::Shift, KeyState::Down));

    // Pressing A fixes Shift off -- it is the binding's trigger, not part
    // of its rhs -- before firing C-X.
    let chord_start = injected
        .iter()
        .position(|e| *e == (KeyCode::Shift, KeyState::Up))
        .expect("Shift should be fixed off before the chord");
    assert_eq!(
        &injected[chord_start..chord_start + 4],
        &[
            (KeyCode::Shift, KeyState::Up),
            (KeyCode::Ctrl, KeyState::Down),
            (KeyCode::X, KeyState::Down),
            (KeyCode::X, KeyState::Up),
        ]
    );

    // Releasing A resyncs injected modifier state to what is still
    // physically held: Ctrl (never itself physically pressed) drops, and
    // Shift (still down) comes back, in whichever order.
    let tail = &injected[chord_start + 4..];
    assert!(tail.contains(&(KeyCode::Ctrl, KeyState::Up)));
    assert!(tail.contains(&(KeyCode::Shift, KeyState::Down)));

    // The real LShift release always reaches the OS.
    assert_eq!(injected.last(), Some(&(KeyCode::Shift, KeyState::Up)));
}

// ---------------------------------------------------------------------------
// S3 -- one-shot modifier
// ---------------------------------------------------------------------------

#[test]
fn s3_one_shot_modifier_taps_the_real_key_on_release() {
    let mut setting = Setting::default();
    let lshift = def_key(&mut setting, "LShift", 0x2a);
    let space = def_key(&mut setting, "Space", 0x39);

    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Shift)
        .or_default()
        .push(ModAssignment { key: lshift, mode: ModAssignMode::Normal });
    global
        .mod_assignments
        .entry(ModifierType::Shift)
        .or_default()
        .push(ModAssignment { key: space, mode: ModAssignMode::OneShot });
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let scan_space = setting.keyboard.keys[space.0 as usize].scan_codes[0];

    let (engine, executor) = new_engine(setting);

    engine.inject_event(RawEvent { scan: scan_space, is_pressed: true, is_mouse: false });
    // Nothing is injected while Space is only held, not yet released.
    assert!(executor.injected().is_empty());

    engine.inject_event(RawEvent { scan: scan_space, is_pressed: false, is_mouse: false });

    // The one-shot key's own identity never reaches the OS -- only a
    // press/release pulse of the modifier it stands in for.
    assert_eq!(
        executor.injected(),
        vec![(KeyCode::Shift, KeyState::Down), (KeyCode::Shift, KeyState::Up)]
    );
}

// ---------------------------------------------------------------------------
// S5 -- idle drain
// ---------------------------------------------------------------------------

#[test]
fn s5_modifier_pressed_by_a_remap_never_outlives_its_own_chord() {
    let mut setting = Setting::default();
    let q = def_key(&mut setting, "Q", 0x10);
    let lctrl = def_key(&mut setting, "LCtrl", 0x1d);
    let output = def_key(&mut setting, "Y", 0x15);
    let lshift = def_key(&mut setting, "LShift", 0x2a);

    let mut ctrl_mod = Modifier::none();
    ctrl_mod.press(ModifierType::Control);
    ctrl_mod.normalize_up_down();
    let mut seq = KeySeq::new("");
    seq.actions.push(Action::Key(ModifiedKey::new(output, ctrl_mod)));
    let seq_id = setting.keyseqs.push(seq);

    let mut global = Keymap::new("Global");
    global
        .mod_assignments
        .entry(ModifierType::Control)
        .or_default()
        .push(ModAssignment { key: lctrl, mode: ModAssignMode::Normal });
    global.insert_assignment(
        KeyAssignment { lhs: ModifiedKey::new(q, Modifier::none()), rhs: seq_id },
        &setting.keyboard,
    );
    let global_id = setting.keymaps.push(global);
    setting.keymaps.global = Some(global_id);

    let scan_q = setting.keyboard.keys[q.0 as usize].scan_codes[0];
    let scan_shift = setting.keyboard.keys[lshift.0 as usize].scan_codes[0];

    let (engine, executor) = new_engine(setting);

    // Q's chord presses Ctrl on the way in; LShift is held through the
    // whole chord and released only afterwards, unrelated to Q's own
    // binding.
    engine.inject_event(RawEvent { scan: scan_q, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_shift, is_pressed: true, is_mouse: false });
    engine.inject_event(RawEvent { scan: scan_q, is_pressed: false, is_mouse: false });

    // Ctrl does not outlive the chord that needed it, even with LShift
    // still physically held.
    let injected = executor.injected();
    assert!(injected.contains(&(KeyCode::Ctrl, KeyState::Down)));
    assert!(injected.contains(&(KeyCode::Ctrl, KeyState::Up)));

    engine.inject_event(RawEvent { scan: scan_shift, is_pressed: false, is_mouse: false });

    // And once everything is released, the idle drain leaves nothing
    // pressed behind.
    let km = engine.current_keymap_for(None);
    let modifier = engine.current_modifier(km, lctrl, true);
    assert!(modifier.is_released(ModifierType::Control));
}
