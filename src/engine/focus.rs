//! Focus tracker: per-thread foreground-window context -> active keymap
//! stack. Grounded on
//! `examples/original_source/src/core/engine/engine_focus.cpp`'s
//! `checkFocusWindow`/`setFocus`/`threadAttachNotify`/`threadDetachNotify`.
//!
//! The original polls `GetForegroundWindow()` directly; this crate has no
//! concrete per-OS window-system backend (out of scope per spec.md §1), so
//! focus updates arrive exclusively via `Engine::set_focus`, driven by the
//! IPC notifier (§4.7) the same way the original's focus watcher calls into
//! the engine under the lock.

use regex::Regex;

use crate::config::{KeymapId, Setting, WindowMatchKind};

/// Runtime per-thread focus record (§3).
#[derive(Debug, Clone)]
pub struct FocusOfThread {
    pub thread_id: u64,
    pub hwnd: crate::platform::WindowHandle,
    pub is_console: bool,
    pub class: String,
    pub title: String,
    pub keymaps: Vec<KeymapId>,
}

impl FocusOfThread {
    pub fn new(thread_id: u64, hwnd: crate::platform::WindowHandle) -> Self {
        FocusOfThread {
            thread_id,
            hwnd,
            is_console: false,
            class: String::new(),
            title: String::new(),
            keymaps: Vec::new(),
        }
    }
}

fn regex_matches(pattern: &str, text: &str) -> bool {
    Regex::new(&format!("(?i){pattern}"))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Resolves the per-focus keymap list (§4.4 step 5): every window-bound
/// keymap whose regexes match `(class, title)`, in insertion order.
pub fn resolve_focus_keymaps(setting: &Setting, class: &str, title: &str) -> Vec<KeymapId> {
    let mut result = Vec::new();
    for (id, km) in setting.keymaps.window_matches() {
        let Some(wm) = &km.window_match else { continue };
        let class_ok = wm
            .class_pattern
            .as_deref()
            .map(|p| regex_matches(p, class))
            .unwrap_or(true);
        let title_ok = wm
            .title_pattern
            .as_deref()
            .map(|p| regex_matches(p, title))
            .unwrap_or(true);
        let matched = match wm.kind {
            WindowMatchKind::And => class_ok && title_ok,
            WindowMatchKind::Or => {
                (wm.class_pattern.is_some() && class_ok) || (wm.title_pattern.is_some() && title_ok)
            }
        };
        if matched {
            result.push(id);
        }
    }
    if result.is_empty() {
        result.push(setting.global_keymap());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Keymap, WindowMatch};

    fn setting_with_editor_keymap() -> Setting {
        let mut setting = Setting::default();
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);
        let mut editor = Keymap::new("Editor");
        editor.window_match = Some(WindowMatch {
            kind: WindowMatchKind::And,
            class_pattern: Some("Emacs".to_string()),
            title_pattern: None,
        });
        setting.keymaps.push(editor);
        setting
    }

    #[test]
    fn matches_window_by_class_regex() {
        let setting = setting_with_editor_keymap();
        let kms = resolve_focus_keymaps(&setting, "Emacs", "scratch");
        assert_eq!(kms.len(), 1);
        assert_eq!(setting.keymaps.get(kms[0]).name, "Editor");
    }

    #[test]
    fn falls_back_to_global_when_nothing_matches() {
        let setting = setting_with_editor_keymap();
        let kms = resolve_focus_keymaps(&setting, "Notepad", "Untitled");
        assert_eq!(kms, vec![setting.global_keymap()]);
    }
}
