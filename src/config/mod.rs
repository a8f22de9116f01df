//! Compiled configuration data model.
//!
//! This is the immutable program the engine consumes: `Setting` is the
//! top-level value, reached by compiling the rewriting-language source
//! (`token`/`parser`/`compiler`). Every cross-reference that the original
//! implementation held as a raw pointer (`KeySeq*`, `Keymap*` parent,
//! `Key*`) is an index into a per-`Setting` arena here, so a `Setting` is
//! plain data and trivially shareable behind an `Arc`.

pub mod ast;
pub mod compiler;
pub mod parser;
pub mod persist;
pub mod token;

use std::collections::HashMap;

use crate::command::{Arg, CommandId};

// ---------------------------------------------------------------------------
// Arena handles
// ---------------------------------------------------------------------------

/// Index into `Keyboard::keys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u32);

/// Index into `KeySeqs::seqs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySeqId(pub u32);

/// Index into `Keymaps::maps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeymapId(pub u32);

// ---------------------------------------------------------------------------
// ScanCode / Key
// ---------------------------------------------------------------------------

/// A raw device code plus the extension flags the original encodes inline.
/// `e0`/`e1` together mark synthetic or pointer-origin events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanCode {
    pub code: u8,
    pub e0: bool,
    pub e1: bool,
}

impl ScanCode {
    pub const fn new(code: u8) -> Self {
        ScanCode {
            code,
            e0: false,
            e1: false,
        }
    }

    /// Hash bucket used by `Keymap::key_assignments`: `scan % 31`.
    pub fn bucket(self) -> usize {
        (self.code as usize) % 31
    }
}

/// A distinguished Key that never originates from capture; only reachable
/// as a `generate-event` target (`&Prefix`'s prefix arm, the emacs-kill-line
/// helper, sync acknowledgement, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    BeforeKeyDown,
    AfterKeyUp,
    Prefixed,
    Sync,
}

impl EventKey {
    pub fn name(self) -> &'static str {
        match self {
            EventKey::BeforeKeyDown => "before-key-down",
            EventKey::AfterKeyUp => "after-key-up",
            EventKey::Prefixed => "prefixed",
            EventKey::Sync => "sync",
        }
    }

    pub const ALL: [EventKey; 4] = [
        EventKey::BeforeKeyDown,
        EventKey::AfterKeyUp,
        EventKey::Prefixed,
        EventKey::Sync,
    ];
}

/// A named key: one or more `ScanCode`s (aliases notwithstanding), or an
/// event key with none. Transient press-state flags live outside `Setting`
/// (see `crate::engine::state::KeyRuntimeFlags`) because `Setting` is
/// immutable and shared.
#[derive(Debug, Clone)]
pub struct Key {
    pub name: String,
    pub aliases: Vec<String>,
    pub scan_codes: Vec<ScanCode>,
    pub event: Option<EventKey>,
}

impl Key {
    pub fn is_event(&self) -> bool {
        self.event.is_some()
    }

    pub fn matches_scan(&self, scan: ScanCode) -> bool {
        self.scan_codes.contains(&scan)
    }
}

// ---------------------------------------------------------------------------
// Modifier
// ---------------------------------------------------------------------------

/// Position within the ~40-bit modifier record. Grouped exactly as spec'd:
/// BASIC generic groups, state bits, and the virtual Lock/Mod banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModifierType {
    // BASIC
    Shift,
    Alt,
    Control,
    Windows,
    // state
    Up,
    Down,
    Repeat,
    NumLock,
    CapsLock,
    ScrollLock,
    KanaLock,
    ImeLock,
    ImeComp,
    Maximized,
    Minimized,
    MdiMaximized,
    MdiMinimized,
    Touchpad,
    TouchpadSticky,
    // virtual: Lock0..Lock9
    Lock0,
    Lock1,
    Lock2,
    Lock3,
    Lock4,
    Lock5,
    Lock6,
    Lock7,
    Lock8,
    Lock9,
    // virtual: Mod0..Mod19
    Mod0,
    Mod1,
    Mod2,
    Mod3,
    Mod4,
    Mod5,
    Mod6,
    Mod7,
    Mod8,
    Mod9,
    Mod10,
    Mod11,
    Mod12,
    Mod13,
    Mod14,
    Mod15,
    Mod16,
    Mod17,
    Mod18,
    Mod19,
}

impl ModifierType {
    pub const BASIC: [ModifierType; 4] = [
        ModifierType::Shift,
        ModifierType::Alt,
        ModifierType::Control,
        ModifierType::Windows,
    ];

    pub const VIRTUAL_MOD: [ModifierType; 20] = [
        ModifierType::Mod0,
        ModifierType::Mod1,
        ModifierType::Mod2,
        ModifierType::Mod3,
        ModifierType::Mod4,
        ModifierType::Mod5,
        ModifierType::Mod6,
        ModifierType::Mod7,
        ModifierType::Mod8,
        ModifierType::Mod9,
        ModifierType::Mod10,
        ModifierType::Mod11,
        ModifierType::Mod12,
        ModifierType::Mod13,
        ModifierType::Mod14,
        ModifierType::Mod15,
        ModifierType::Mod16,
        ModifierType::Mod17,
        ModifierType::Mod18,
        ModifierType::Mod19,
    ];

    pub const ALL: [ModifierType; 49] = [
        ModifierType::Shift,
        ModifierType::Alt,
        ModifierType::Control,
        ModifierType::Windows,
        ModifierType::Up,
        ModifierType::Down,
        ModifierType::Repeat,
        ModifierType::NumLock,
        ModifierType::CapsLock,
        ModifierType::ScrollLock,
        ModifierType::KanaLock,
        ModifierType::ImeLock,
        ModifierType::ImeComp,
        ModifierType::Maximized,
        ModifierType::Minimized,
        ModifierType::MdiMaximized,
        ModifierType::MdiMinimized,
        ModifierType::Touchpad,
        ModifierType::TouchpadSticky,
        ModifierType::Lock0,
        ModifierType::Lock1,
        ModifierType::Lock2,
        ModifierType::Lock3,
        ModifierType::Lock4,
        ModifierType::Lock5,
        ModifierType::Lock6,
        ModifierType::Lock7,
        ModifierType::Lock8,
        ModifierType::Lock9,
        ModifierType::Mod0,
        ModifierType::Mod1,
        ModifierType::Mod2,
        ModifierType::Mod3,
        ModifierType::Mod4,
        ModifierType::Mod5,
        ModifierType::Mod6,
        ModifierType::Mod7,
        ModifierType::Mod8,
        ModifierType::Mod9,
        ModifierType::Mod10,
        ModifierType::Mod11,
        ModifierType::Mod12,
        ModifierType::Mod13,
        ModifierType::Mod14,
        ModifierType::Mod15,
        ModifierType::Mod16,
        ModifierType::Mod17,
        ModifierType::Mod18,
        ModifierType::Mod19,
    ];

    fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    fn mask(types: &[ModifierType]) -> u64 {
        types.iter().fold(0u64, |acc, t| acc | t.bit())
    }
}

/// Every bit has three states: pressed, released, or don't-care.
/// Represented as two bitsets: `pressed` carries the value when the bit is
/// not don't-care; `dontcare` marks bits whose value is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifier {
    pressed: u64,
    dontcare: u64,
}

impl Modifier {
    /// Every bit don't-care: matches anything.
    pub fn any() -> Self {
        Modifier {
            pressed: 0,
            dontcare: u64::MAX,
        }
    }

    /// Every bit explicitly released.
    pub fn none() -> Self {
        Modifier {
            pressed: 0,
            dontcare: 0,
        }
    }

    pub fn press(&mut self, ty: ModifierType) -> &mut Self {
        self.pressed |= ty.bit();
        self.dontcare &= !ty.bit();
        self
    }

    pub fn release(&mut self, ty: ModifierType) -> &mut Self {
        self.pressed &= !ty.bit();
        self.dontcare &= !ty.bit();
        self
    }

    pub fn dontcare(&mut self, ty: ModifierType) -> &mut Self {
        self.dontcare |= ty.bit();
        self
    }

    pub fn is_pressed(&self, ty: ModifierType) -> bool {
        self.dontcare & ty.bit() == 0 && self.pressed & ty.bit() != 0
    }

    pub fn is_released(&self, ty: ModifierType) -> bool {
        self.dontcare & ty.bit() == 0 && self.pressed & ty.bit() == 0
    }

    pub fn is_dontcare(&self, ty: ModifierType) -> bool {
        self.dontcare & ty.bit() != 0
    }

    /// `self` is the stored assignment modifier (`m'`); `probe` is the
    /// modifier built from the live event (`m`). Matches iff for every bit,
    /// either `self` is don't-care there or the two pressed-bits agree.
    pub fn does_match(&self, probe: &Modifier) -> bool {
        let relevant = !self.dontcare;
        (self.pressed & relevant) == (probe.pressed & relevant)
    }

    /// Returns a copy with every `Mod0..Mod19` bit forced to don't-care,
    /// used by the second tier of `searchAssignment`.
    pub fn without_virtual_mods(&self) -> Modifier {
        let mask = ModifierType::mask(&ModifierType::VIRTUAL_MOD);
        Modifier {
            pressed: self.pressed & !mask,
            dontcare: self.dontcare | mask,
        }
    }

    /// `Up`/`Down` normalization (§4.1): specifying neither yields
    /// don't-care-both; specifying both with the same value yields
    /// don't-care-both; specifying exactly one implies the complement on
    /// the other.
    pub fn normalize_up_down(&mut self) {
        let up = !self.is_dontcare(ModifierType::Up);
        let down = !self.is_dontcare(ModifierType::Down);
        match (up, down) {
            (false, false) => {
                self.dontcare(ModifierType::Up);
                self.dontcare(ModifierType::Down);
            }
            (true, true) => {
                if self.is_pressed(ModifierType::Up) == self.is_pressed(ModifierType::Down) {
                    self.dontcare(ModifierType::Up);
                    self.dontcare(ModifierType::Down);
                }
            }
            (true, false) => {
                if self.is_pressed(ModifierType::Up) {
                    self.release(ModifierType::Down);
                } else {
                    self.press(ModifierType::Down);
                }
            }
            (false, true) => {
                if self.is_pressed(ModifierType::Down) {
                    self.release(ModifierType::Up);
                } else {
                    self.press(ModifierType::Up);
                }
            }
        }
    }
}

/// `(Key, Modifier)` -- the unit of input and the left-hand side of an
/// assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifiedKey {
    pub key: KeyId,
    pub modifier: Modifier,
}

impl ModifiedKey {
    pub fn new(key: KeyId, modifier: Modifier) -> Self {
        ModifiedKey { key, modifier }
    }
}

// ---------------------------------------------------------------------------
// Action / KeySeq
// ---------------------------------------------------------------------------

/// The maximal modifier range any action in a `KeySeq` uses. The compiler
/// enforces `Basic <= KeySeq <= Assign` at every reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeySeqMode {
    Basic,
    KeySeq,
    Assign,
}

/// A single step of a `KeySeq`. Tagged variant replacing the original's
/// `Action`/`ActionKey`/`ActionKeySeq`/`ActionFunction` class hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Key(ModifiedKey),
    KeySeq(KeySeqId),
    Function {
        cmd: CommandId,
        modifier: Modifier,
        args: Vec<Arg>,
    },
}

/// A named ordered sequence of actions.
#[derive(Debug, Clone)]
pub struct KeySeq {
    pub name: String,
    pub mode: KeySeqMode,
    pub actions: Vec<Action>,
}

impl KeySeq {
    pub fn new(name: impl Into<String>) -> Self {
        KeySeq {
            name: name.into(),
            mode: KeySeqMode::KeySeq,
            actions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Keymap
// ---------------------------------------------------------------------------

/// How a physical key participates in a modifier group, per `mod`
/// assignment mode prefix (`!`, `!!`, `!!!`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAssignMode {
    Normal,
    True,
    OneShot,
    OneShotRepeatable,
}

/// One physical key acting as one modifier `Type` within a keymap.
#[derive(Debug, Clone, Copy)]
pub struct ModAssignment {
    pub key: KeyId,
    pub mode: ModAssignMode,
}

/// `(ModifiedKey lhs, KeySeq rhs)`.
#[derive(Debug, Clone)]
pub struct KeyAssignment {
    pub lhs: ModifiedKey,
    pub rhs: KeySeqId,
}

/// A window-match predicate: `And` requires both regexes, `Or` either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMatchKind {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct WindowMatch {
    pub kind: WindowMatchKind,
    pub class_pattern: Option<String>,
    pub title_pattern: Option<String>,
}

/// One Keymap: a named context (optionally window-triggered), a default
/// KeySeq, optional parent for inheritance, the scan-code-bucketed
/// assignment table, and per-modifier-`Type` lists of keys acting as that
/// modifier.
#[derive(Debug, Clone)]
pub struct Keymap {
    pub name: String,
    pub parent: Option<KeymapId>,
    pub window_match: Option<WindowMatch>,
    pub default_keyseq: Option<KeySeqId>,
    /// Bucketed by `ScanCode::bucket()`; each bucket holds assignments whose
    /// lhs key's first scan code hashes there.
    pub key_assignments: Vec<Vec<KeyAssignment>>,
    pub mod_assignments: HashMap<ModifierType, Vec<ModAssignment>>,
}

impl Keymap {
    pub fn new(name: impl Into<String>) -> Self {
        Keymap {
            name: name.into(),
            parent: None,
            window_match: None,
            default_keyseq: None,
            key_assignments: (0..31).map(|_| Vec::new()).collect(),
            mod_assignments: HashMap::new(),
        }
    }

    pub fn insert_assignment(&mut self, assignment: KeyAssignment, keyboard: &Keyboard) {
        let scan = keyboard.keys[assignment.lhs.key.0 as usize]
            .scan_codes
            .first()
            .copied()
            .unwrap_or(ScanCode::new(0));
        self.key_assignments[scan.bucket()].push(assignment);
    }

    /// Three escalating relaxations per §4.3: full match, strip virtual
    /// Mod0..Mod19 from the probe, then bare key only.
    pub fn search_assignment(&self, probe: ModifiedKey, keyboard: &Keyboard) -> Option<KeySeqId> {
        let scan = keyboard.keys[probe.key.0 as usize]
            .scan_codes
            .first()
            .copied()?;
        let bucket = &self.key_assignments[scan.bucket()];

        let candidates: Vec<&KeyAssignment> = bucket
            .iter()
            .filter(|a| a.lhs.key == probe.key)
            .collect();

        for a in &candidates {
            if a.lhs.modifier.does_match(&probe.modifier) {
                return Some(a.rhs);
            }
        }
        let relaxed = probe.modifier.without_virtual_mods();
        for a in &candidates {
            if a.lhs.modifier.does_match(&relaxed) {
                return Some(a.rhs);
            }
        }
        let bare = Modifier::none();
        for a in &candidates {
            if a.lhs.modifier.does_match(&bare) {
                return Some(a.rhs);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Keymaps (plural catalog)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Keymaps {
    pub maps: Vec<Keymap>,
    /// Index of the top-level `Global` keymap; always present once compiled.
    pub global: Option<KeymapId>,
}

impl Keymaps {
    pub fn get(&self, id: KeymapId) -> &Keymap {
        &self.maps[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: KeymapId) -> &mut Keymap {
        &mut self.maps[id.0 as usize]
    }

    pub fn push(&mut self, keymap: Keymap) -> KeymapId {
        let id = KeymapId(self.maps.len() as u32);
        self.maps.push(keymap);
        id
    }

    pub fn find_by_name(&self, name: &str) -> Option<KeymapId> {
        self.maps
            .iter()
            .position(|k| k.name == name)
            .map(|i| KeymapId(i as u32))
    }

    /// Every window-bound keymap, in insertion order -- the order
    /// `resolve_focus_keymaps` in `engine::focus` scans them.
    pub fn window_matches(&self) -> impl Iterator<Item = (KeymapId, &Keymap)> {
        self.maps
            .iter()
            .enumerate()
            .filter(|(_, k)| k.window_match.is_some())
            .map(|(i, k)| (KeymapId(i as u32), k))
    }

    /// Post-compile pass (§4.1): fold modifier-assignment operators through
    /// the parent chain in reverse declaration order so each keymap ends
    /// with a materialized absolute modifier table.
    pub fn adjust_modifier(&mut self, _keyboard: &Keyboard) {
        let order: Vec<KeymapId> = (0..self.maps.len() as u32).rev().map(KeymapId).collect();
        for id in order {
            let parent = self.maps[id.0 as usize].parent;
            let Some(parent) = parent else { continue };
            let parent_assignments = self.maps[parent.0 as usize].mod_assignments.clone();
            let this = &mut self.maps[id.0 as usize];
            for (ty, assigns) in parent_assignments {
                let entry = this.mod_assignments.entry(ty).or_default();
                for a in assigns {
                    if !entry.iter().any(|e: &ModAssignment| e.key == a.key) {
                        entry.push(a);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// KeySeqs (pool)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KeySeqs {
    pub seqs: Vec<KeySeq>,
    by_name: HashMap<String, KeySeqId>,
}

impl KeySeqs {
    pub fn push(&mut self, seq: KeySeq) -> KeySeqId {
        let id = KeySeqId(self.seqs.len() as u32);
        if !seq.name.is_empty() {
            self.by_name.insert(seq.name.clone(), id);
        }
        self.seqs.push(seq);
        id
    }

    pub fn get(&self, id: KeySeqId) -> &KeySeq {
        &self.seqs[id.0 as usize]
    }

    pub fn find_by_name(&self, name: &str) -> Option<KeySeqId> {
        self.by_name.get(name).copied()
    }

    /// First modified key of a sequence, recursing through a leading
    /// `KeySeq` action, mirroring `KeySeq::getFirstModifiedKey`.
    pub fn first_modified_key(&self, id: KeySeqId) -> Option<ModifiedKey> {
        let seq = self.get(id);
        match seq.actions.first()? {
            Action::Key(mk) => Some(*mk),
            Action::KeySeq(inner) => self.first_modified_key(*inner),
            Action::Function { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Keyboard (top-level key catalog)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    pub keys: Vec<Key>,
    by_name: HashMap<String, KeyId>,
    /// Keys that serve as each modifier `Type`, independent of per-keymap
    /// mode overrides (the keymap-level table in `Keymap::mod_assignments`
    /// is what the pipeline actually consults; this is the Keyboard-wide
    /// default every Global keymap inherits from).
    pub modifier_keys: HashMap<ModifierType, Vec<KeyId>>,
    /// Non-recursive rewrite table, applied once before binding lookup.
    /// Bucketed by the left-hand key so `substitute` can scan for the first
    /// rule whose modifier `does_match`es, the same relaxed matching
    /// `Keymap::search_assignment` uses rather than exact equality.
    pub substitutions: HashMap<KeyId, Vec<(Modifier, ModifiedKey)>>,
    pub sync_key: Option<KeyId>,
    /// Per-number-key modifier override (`def numbermod`).
    pub number_mod: HashMap<KeyId, KeyId>,
    pub alias_table: HashMap<String, String>,
}

impl Keyboard {
    pub fn push_key(&mut self, key: Key) -> KeyId {
        let id = KeyId(self.keys.len() as u32);
        self.by_name.insert(key.name.clone(), id);
        for alias in &key.aliases {
            self.by_name.insert(alias.clone(), id);
        }
        self.keys.push(key);
        id
    }

    pub fn find_by_name(&self, name: &str) -> Option<KeyId> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_scan(&self, scan: ScanCode) -> Option<KeyId> {
        self.keys
            .iter()
            .position(|k| k.matches_scan(scan))
            .map(|i| KeyId(i as u32))
    }

    pub fn event_key(&self, ev: EventKey) -> Option<KeyId> {
        self.find_by_name(ev.name())
    }

    /// Registers a rewrite rule, keyed by the left-hand key.
    pub fn add_substitute(&mut self, lhs: ModifiedKey, rhs: ModifiedKey) {
        self.substitutions.entry(lhs.key).or_default().push((lhs.modifier, rhs));
    }

    /// Apply the substitution table once, non-recursively. `mk` is a live,
    /// fully-specified probe, so the lookup is `does_match`-based like
    /// `Keymap::search_assignment` rather than exact equality; any
    /// don't-care bit in the matched rule's result is then filled in from
    /// `mk`'s concrete value for that bit, so a rule that only constrains
    /// (say) Shift doesn't clobber the rest of the incoming modifier.
    pub fn substitute(&self, mk: ModifiedKey) -> ModifiedKey {
        let Some(rules) = self.substitutions.get(&mk.key) else {
            return mk;
        };
        let Some(&(_, rhs)) = rules.iter().find(|(modifier, _)| modifier.does_match(&mk.modifier)) else {
            return mk;
        };
        let mut filled = rhs.modifier;
        for ty in ModifierType::ALL {
            if filled.is_dontcare(ty) && !mk.modifier.is_dontcare(ty) {
                if mk.modifier.is_pressed(ty) {
                    filled.press(ty);
                } else {
                    filled.release(ty);
                }
            }
        }
        ModifiedKey::new(rhs.key, filled)
    }
}

// ---------------------------------------------------------------------------
// Options / Setting
// ---------------------------------------------------------------------------

/// `oneShotRepeatableDelay` is a **repeat count**, not a duration --
/// resolved Open Question, see `SPEC_FULL.md` §4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RepeatCount(pub u32);

#[derive(Debug, Clone)]
pub struct Options {
    pub correct_kana_lock_handling: bool,
    pub one_shot_repeatable_delay: RepeatCount,
    pub sts4mayu: u32,
    pub cts4mayu: u32,
    pub mouse_event: bool,
    pub drag_threshold: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            correct_kana_lock_handling: false,
            one_shot_repeatable_delay: RepeatCount(3),
            sts4mayu: 0,
            cts4mayu: 0,
            mouse_event: true,
            drag_threshold: 4,
        }
    }
}

/// The fully-compiled program. Immutable once installed; reconfiguration
/// atomically replaces the `Arc<Setting>` under the engine lock.
#[derive(Debug, Clone, Default)]
pub struct Setting {
    pub keyboard: Keyboard,
    pub keymaps: Keymaps,
    pub keyseqs: KeySeqs,
    pub options: Options,
    /// Symbols defined via `define`/`-D`, consulted by `if`/`elseif`.
    pub symbols: std::collections::HashSet<String>,
}

impl Setting {
    pub fn global_keymap(&self) -> KeymapId {
        self.keymaps
            .global
            .expect("Setting invariant: every compiled Setting has a Global keymap")
    }
}
