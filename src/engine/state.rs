//! `RuntimeState`: every piece of mutable state the engine thread owns,
//! gathered behind a single lock (`Engine::state: Mutex<RuntimeState>`).
//!
//! Runtime-mutable key flags (`isPressed`/`isPressedOnWin32`/
//! `isPressedByAssign`) live here, not inside `config::Key`, because
//! `Setting` is immutable and `Arc`-shared (§3 Invariant 1); they are
//! migrated by name+scan lookup whenever the Setting is swapped
//! (§3 "Lifecycles").

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{KeyId, KeymapId, Modifier, ModifiedKey, ModifierType, RepeatCount, Setting};
use crate::engine::focus::FocusOfThread;

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyRuntimeFlags {
    pub is_pressed: bool,
    pub is_pressed_on_win32: bool,
    pub is_pressed_by_assign: bool,
    /// The `KeySeq` step 10 resolved for this key's most recent press
    /// (`None` meaning literal passthrough). The matching release replays
    /// this same decision rather than re-resolving the binding, so a key
    /// whose press landed inside a prefix/focus keymap still has its
    /// release's `Up` leg run against the action it actually triggered,
    /// even if `current_keymap()` has since moved on.
    pub pending_dispatch: Option<crate::config::KeySeqId>,
}

/// One-shot dispatch bookkeeping (§4.2 step 7).
#[derive(Debug, Clone)]
pub struct OneShotState {
    pub pending: ModifiedKey,
    /// Present only for `oneShotRepeatable`; counts physical repeats of
    /// the held key so far.
    pub repeat_count: Option<u32>,
}

/// A 2-slot FIFO of the last physically-pressed keys (§4.2 step 14), used
/// to set the `Repeat` modifier bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastPressedHistory {
    slots: [Option<KeyId>; 2],
}

impl LastPressedHistory {
    pub fn push(&mut self, key: KeyId) {
        self.slots[1] = self.slots[0];
        self.slots[0] = Some(key);
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.slots[0] == Some(key) || self.slots[1] == Some(key)
    }
}

pub struct RuntimeState {
    pub setting: Arc<Setting>,
    pub enabled: bool,
    pub key_flags: Vec<KeyRuntimeFlags>,
    pub current_key_press_count: i64,
    pub lock_modifier: Modifier,
    pub is_prefix: bool,
    /// Keymap entered while `is_prefix` is set; `None` means the engine is
    /// resolving bindings against the focus-selected keymap directly.
    pub prefix_keymap: Option<KeymapId>,
    pub one_shot: Option<OneShotState>,
    pub last_pressed: LastPressedHistory,
    /// The key `generate_key_event` most recently actually injected a press
    /// for (`None` once that key's release goes through). Distinct from
    /// `last_pressed`, which tracks physically-pressed keys for the Repeat
    /// bit -- this tracks generated/injected keys, used by
    /// `generate_modifier_events` to dodge an `Alt`/`Windows` release that
    /// immediately follows generating that same key, which would otherwise
    /// pop a window menu.
    pub last_generated_key: Option<KeyId>,
    pub pending_next_modifier: Modifier,
    pub focus: HashMap<u64, FocusOfThread>,
    pub current_thread: Option<u64>,
    pub generation_depth: u32,
    pub touchpad_sticky: bool,
    pub emacs_kill_line_reset: bool,
    pub toggles: HashMap<String, bool>,
}

impl RuntimeState {
    pub fn new(setting: Arc<Setting>) -> Self {
        let key_flags = vec![KeyRuntimeFlags::default(); setting.keyboard.keys.len()];
        RuntimeState {
            setting,
            enabled: true,
            key_flags,
            current_key_press_count: 0,
            lock_modifier: Modifier::none(),
            is_prefix: false,
            prefix_keymap: None,
            one_shot: None,
            last_pressed: LastPressedHistory::default(),
            last_generated_key: None,
            pending_next_modifier: Modifier::any(),
            focus: HashMap::new(),
            current_thread: None,
            generation_depth: 0,
            touchpad_sticky: false,
            emacs_kill_line_reset: false,
            toggles: HashMap::new(),
        }
    }

    /// Active keymap: the prefix keymap while in prefix state, else the
    /// front of the current thread's focus-resolved keymap list, else
    /// Global (§3 Invariant 3: never null while a Setting is installed).
    pub fn current_keymap(&self) -> KeymapId {
        if self.is_prefix {
            if let Some(km) = self.prefix_keymap {
                return km;
            }
        }
        self.focus_keymap()
    }

    /// The focus-resolved keymap, ignoring any active prefix state.
    pub fn focus_keymap(&self) -> KeymapId {
        self.current_thread
            .and_then(|tid| self.focus.get(&tid))
            .and_then(|f| f.keymaps.first().copied())
            .unwrap_or_else(|| self.setting.global_keymap())
    }

    /// Active keymap for a physical event: a release always resolves
    /// against the focus keymap that was active before the prefix was
    /// entered, since `is_prefix` only flips on a press (grounded on
    /// `engine_generator.cpp::beginGeneratingKeyboardEvents`'s case (2),
    /// which swaps back to the focus keymap for the triggering key's own
    /// release). A press consults the prefix keymap, same as
    /// `current_keymap`.
    pub fn current_keymap_for_event(&self, is_pressed: bool) -> KeymapId {
        if is_pressed {
            self.current_keymap()
        } else {
            self.focus_keymap()
        }
    }

    /// Migrates per-key runtime flags to a newly installed Setting by
    /// name+scan-code lookup (§3 "Lifecycles"), then swaps the Setting
    /// pointer. Also re-resolves every thread's focus keymap list against
    /// the new Setting.
    pub fn install_setting(&mut self, new_setting: Arc<Setting>) {
        let mut new_flags = vec![KeyRuntimeFlags::default(); new_setting.keyboard.keys.len()];
        for (old_idx, old_key) in self.setting.keyboard.keys.iter().enumerate() {
            if let Some(new_id) = new_setting.keyboard.find_by_name(&old_key.name) {
                new_flags[new_id.0 as usize] = self.key_flags[old_idx];
            }
        }
        self.key_flags = new_flags;
        self.setting = new_setting;
        self.is_prefix = false;
        self.prefix_keymap = None;
        self.one_shot = None;
        let tids: Vec<u64> = self.focus.keys().copied().collect();
        for tid in tids {
            if let Some(f) = self.focus.get_mut(&tid) {
                f.keymaps = crate::engine::focus::resolve_focus_keymaps(&self.setting, &f.class, &f.title);
            }
        }
    }

    /// Builds the current-event modifier (§4.2 step 4): lock-state bits
    /// plus, for each BASIC group, pressed iff any key serving as that
    /// modifier in `keymap` is currently pressed.
    pub fn build_current_modifier(&self, keymap: KeymapId, repeat_key: KeyId, up: bool) -> Modifier {
        let mut m = self.lock_modifier;
        let km = self.setting.keymaps.get(keymap);
        for ty in ModifierType::BASIC {
            let pressed = km
                .mod_assignments
                .get(&ty)
                .map(|assigns| {
                    assigns
                        .iter()
                        .any(|a| self.key_flags[a.key.0 as usize].is_pressed)
                })
                .unwrap_or(false);
            if pressed {
                m.press(ty);
            } else {
                m.release(ty);
            }
        }
        if self.last_pressed.contains(repeat_key) {
            m.press(ModifierType::Repeat);
        } else {
            m.release(ModifierType::Repeat);
        }
        if up {
            m.press(ModifierType::Up);
            m.release(ModifierType::Down);
        } else {
            m.press(ModifierType::Down);
            m.release(ModifierType::Up);
        }
        m
    }

    pub fn one_shot_repeatable_threshold(&self) -> RepeatCount {
        self.setting.options.one_shot_repeatable_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Setting;

    #[test]
    fn fresh_state_falls_back_to_global_keymap() {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(crate::config::Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let state = RuntimeState::new(Arc::new(setting));
        assert_eq!(state.current_keymap(), global);
    }

    #[test]
    fn last_pressed_history_tracks_two_slots() {
        let mut h = LastPressedHistory::default();
        h.push(KeyId(1));
        h.push(KeyId(2));
        assert!(h.contains(KeyId(1)));
        assert!(h.contains(KeyId(2)));
        h.push(KeyId(3));
        assert!(!h.contains(KeyId(1)));
    }
}
