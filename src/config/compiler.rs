//! AST -> `Setting` compiler: conditional compilation, include resolution,
//! modifier-expression resolution, keymap scoping, and the post-compile
//! `adjustModifier` pass.
//!
//! Grounded on `examples/original_source/src/core/settings/setting_loader.cpp`
//! for statement interpretation order and on `keymap.cpp` for the modifier
//! bit semantics. Failure model follows §4.1: diagnostics accumulate,
//! compilation runs to the end of the source; a hard error (circular
//! include, include depth > 32) stops immediately.

use std::collections::HashSet;

use thiserror::Error;

use super::ast::*;
use super::parser::{self, Diagnostic};
use super::token::tokenize;
use super::{
    Action, Key, KeyAssignment, KeySeq, KeySeqMode, Keyboard, Keymap, Keymaps, KeySeqs,
    ModAssignMode, ModAssignment, Modifier, ModifierType, ModifiedKey, Options, RepeatCount,
    ScanCode, Setting, WindowMatch, WindowMatchKind,
};
use crate::command::{self, Arg, CommandId};

pub const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Syntax(Diagnostic),
    #[error("line {line}: {message}")]
    Semantic { line: usize, message: String },
    #[error("circular include: {chain}")]
    CircularInclude { chain: String },
    #[error("include depth exceeds {MAX_INCLUDE_DEPTH} at {chain}")]
    IncludeTooDeep { chain: String },
    #[error("line {line}: file not found: {path}")]
    IncludeNotFound { line: usize, path: String },
}

/// Injectable file-loader so includes can be resolved relative to the
/// including file without the compiler touching the filesystem directly.
pub trait FileLoader {
    fn load(&self, path_from_includer: &str, includer: Option<&str>) -> Option<(String, String)>;
}

/// Loader backed by the real filesystem, resolving relative to the
/// including file's parent directory.
pub struct OsFileLoader;

impl FileLoader for OsFileLoader {
    fn load(&self, path_from_includer: &str, includer: Option<&str>) -> Option<(String, String)> {
        let path = match includer {
            Some(inc) => {
                let base = std::path::Path::new(inc).parent()?;
                base.join(path_from_includer)
            }
            None => std::path::PathBuf::from(path_from_includer),
        };
        let canon = path.canonicalize().unwrap_or(path.clone());
        let text = std::fs::read_to_string(&path).ok()?;
        Some((canon.to_string_lossy().into_owned(), text))
    }
}

struct CondStack {
    /// Per-frame: (branch already taken, currently active).
    frames: Vec<(bool, bool)>,
}

impl CondStack {
    fn new() -> Self {
        CondStack { frames: Vec::new() }
    }

    fn active(&self) -> bool {
        self.frames.iter().all(|(_, active)| *active)
    }

    fn push(&mut self, cond: bool) {
        self.frames.push((cond, cond));
    }

    fn else_if(&mut self, cond: bool) -> Result<(), &'static str> {
        let frame = self.frames.last_mut().ok_or("elseif without if")?;
        if frame.0 {
            frame.1 = false;
        } else {
            frame.1 = cond;
            frame.0 = frame.0 || cond;
        }
        Ok(())
    }

    fn else_branch(&mut self) -> Result<(), &'static str> {
        let frame = self.frames.last_mut().ok_or("else without if")?;
        frame.1 = !frame.0;
        frame.0 = true;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), &'static str> {
        self.frames.pop().map(|_| ()).ok_or("endif without if")
    }
}

struct PendingStatement {
    stmt: Statement,
}

struct FlattenedLine {
    stmt: Statement,
}

/// Walks `include` statements recursively, flattening the whole program
/// (respecting conditional-compilation state at flatten time is wrong --
/// conditionals must be evaluated statement-by-statement, so instead we
/// flatten *with* include markers preserved as nested statement lists and
/// let the main compile loop recurse).
enum FlatItem {
    Stmt(Statement),
    EnterFile(String),
    ExitFile,
}

fn flatten(
    statements: Vec<Statement>,
    file_loader: &dyn FileLoader,
    current_file: Option<&str>,
    stack: &mut Vec<String>,
    errors: &mut Vec<ConfigError>,
) -> Vec<FlatItem> {
    let mut out = Vec::new();
    for stmt in statements {
        if let Statement::Include { path, line } = &stmt {
            if stack.len() >= MAX_INCLUDE_DEPTH {
                errors.push(ConfigError::IncludeTooDeep {
                    chain: stack.join(" -> "),
                });
                continue;
            }
            let Some((canon, text)) = file_loader.load(path, current_file) else {
                errors.push(ConfigError::IncludeNotFound {
                    line: *line,
                    path: path.clone(),
                });
                continue;
            };
            if stack.contains(&canon) {
                let mut chain = stack.clone();
                chain.push(canon);
                errors.push(ConfigError::CircularInclude {
                    chain: chain.join(" -> "),
                });
                continue;
            }
            let (lines, tok_errs) = tokenize(&text);
            for e in tok_errs {
                errors.push(ConfigError::Semantic {
                    line: 0,
                    message: e.to_string(),
                });
            }
            let (inner_stmts, diags) = parser::parse_lines(&lines);
            for d in diags {
                errors.push(ConfigError::Syntax(d));
            }
            stack.push(canon.clone());
            out.push(FlatItem::EnterFile(canon.clone()));
            out.extend(flatten(
                inner_stmts,
                file_loader,
                Some(&canon),
                stack,
                errors,
            ));
            out.push(FlatItem::ExitFile);
            stack.pop();
            continue;
        }
        out.push(FlatItem::Stmt(stmt));
    }
    out
}

/// Table of prefix tokens to `ModifierType`, used when resolving a
/// `ModifierExpr` to a concrete `Modifier`.
fn prefix_modifier_type(prefix: &str) -> Option<ModifierType> {
    Some(match prefix {
        "S-" => ModifierType::Shift,
        "A-" => ModifierType::Alt,
        "C-" => ModifierType::Control,
        "W-" => ModifierType::Windows,
        "U-" => ModifierType::Up,
        "D-" => ModifierType::Down,
        "R-" => ModifierType::Repeat,
        "NL-" => ModifierType::NumLock,
        "CL-" => ModifierType::CapsLock,
        "SL-" => ModifierType::ScrollLock,
        "KL-" => ModifierType::KanaLock,
        "IL-" => ModifierType::ImeLock,
        "IC-" => ModifierType::ImeComp,
        "MAX-" => ModifierType::Maximized,
        "MIN-" => ModifierType::Minimized,
        "MMAX-" => ModifierType::MdiMaximized,
        "MMIN-" => ModifierType::MdiMinimized,
        "T-" => ModifierType::Touchpad,
        "TS-" => ModifierType::TouchpadSticky,
        _ => {
            if let Some(n) = prefix.strip_prefix('L').and_then(|s| s.strip_suffix('-')) {
                if let Ok(idx) = n.parse::<u32>() {
                    return lock_n(idx);
                }
            }
            if let Some(n) = prefix.strip_prefix('M').and_then(|s| s.strip_suffix('-')) {
                if let Ok(idx) = u32::from_str_radix(n, 16).or_else(|_| n.parse::<u32>()) {
                    return mod_n(idx);
                }
            }
            return None;
        }
    })
}

fn lock_n(idx: u32) -> Option<ModifierType> {
    use ModifierType::*;
    const LOCKS: [ModifierType; 10] = [
        Lock0, Lock1, Lock2, Lock3, Lock4, Lock5, Lock6, Lock7, Lock8, Lock9,
    ];
    LOCKS.get(idx as usize).copied()
}

fn mod_n(idx: u32) -> Option<ModifierType> {
    ModifierType::VIRTUAL_MOD.get(idx as usize).copied()
}

/// Which context a `ModifierExpr` is being resolved in, per §4.1: "unspecified
/// bits take their context-default (don't-care in an assignment LHS, release
/// otherwise)." `Bind`'s and `DefSubst`'s left-hand sides are both matched
/// against a live, fully-specified probe modifier (`does_match`), so a bit
/// the config author never mentioned must default to don't-care or it would
/// spuriously require that bit released. Every other modifier expression
/// (a keyseq action's own key, a substitution's replacement, a function's
/// modifier) keeps the `Other` release default.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ModifierContext {
    AssignmentLhs,
    Other,
}

/// §4.1: a leading sequence of prefix tokens sets bits in declaration
/// order; `*` flips the mode to don't-care for what follows, `~` flips it
/// to release, until the next mode-flip token.
fn resolve_modifier_expr(me: &ModifierExpr, ctx: ModifierContext) -> Modifier {
    #[derive(Clone, Copy)]
    enum Mode {
        Press,
        Release,
        DontCare,
    }
    let mut modifier = match ctx {
        ModifierContext::AssignmentLhs => Modifier::any(),
        ModifierContext::Other => Modifier::none(),
    };
    let mut mode = Mode::Press;
    for p in &me.prefixes {
        match p.as_str() {
            "*" => mode = Mode::DontCare,
            "~" => mode = Mode::Release,
            other => {
                if let Some(ty) = prefix_modifier_type(other) {
                    match mode {
                        Mode::Press => {
                            modifier.press(ty);
                        }
                        Mode::Release => {
                            modifier.release(ty);
                        }
                        Mode::DontCare => {
                            modifier.dontcare(ty);
                        }
                    }
                }
            }
        }
    }
    modifier.normalize_up_down();
    modifier
}

pub struct Compiler<'a> {
    file_loader: &'a dyn FileLoader,
}

struct BuildState {
    setting: Setting,
    current_keymap: Option<super::KeymapId>,
    errors: Vec<ConfigError>,
}

impl BuildState {
    fn keyboard_key(&mut self, name: &str, line: usize) -> Option<super::KeyId> {
        if let Some(id) = self.setting.keyboard.find_by_name(name) {
            return Some(id);
        }
        self.errors.push(ConfigError::Semantic {
            line,
            message: format!("undefined key '{name}'"),
        });
        None
    }
}

impl<'a> Compiler<'a> {
    pub fn new(file_loader: &'a dyn FileLoader) -> Self {
        Compiler { file_loader }
    }

    pub fn compile(
        &self,
        source: &str,
        seed_symbols: HashSet<String>,
    ) -> Result<Setting, Vec<ConfigError>> {
        let (lines, tok_errors) = tokenize(source);
        let mut errors: Vec<ConfigError> = tok_errors
            .into_iter()
            .map(|e| ConfigError::Semantic {
                line: 0,
                message: e.to_string(),
            })
            .collect();
        let (statements, diags) = parser::parse_lines(&lines);
        errors.extend(diags.into_iter().map(ConfigError::Syntax));

        let mut include_stack = Vec::new();
        let flat = flatten(
            statements,
            self.file_loader,
            None,
            &mut include_stack,
            &mut errors,
        );

        if errors
            .iter()
            .any(|e| matches!(e, ConfigError::CircularInclude { .. } | ConfigError::IncludeTooDeep { .. }))
        {
            return Err(errors);
        }

        let mut setting = Setting::default();
        setting.symbols = seed_symbols;
        install_builtin_keys(&mut setting);
        let global = setting.keymaps.push(Keymap::new("Global"));
        setting.keymaps.global = Some(global);

        let mut state = BuildState {
            setting,
            current_keymap: Some(global),
            errors,
        };
        let mut cond = CondStack::new();

        for item in flat {
            match item {
                FlatItem::EnterFile(_) | FlatItem::ExitFile => {}
                FlatItem::Stmt(stmt) => {
                    if let Statement::IfPush { symbol, negate } = &stmt {
                        let v = state.setting.symbols.contains(symbol) ^ negate;
                        cond.push(v);
                        continue;
                    }
                    if let Statement::ElseIf { symbol, negate } = &stmt {
                        let v = state.setting.symbols.contains(symbol) ^ negate;
                        if let Err(msg) = cond.else_if(v) {
                            state.errors.push(ConfigError::Semantic {
                                line: 0,
                                message: msg.to_string(),
                            });
                        }
                        continue;
                    }
                    if matches!(stmt, Statement::Else) {
                        if let Err(msg) = cond.else_branch() {
                            state.errors.push(ConfigError::Semantic {
                                line: 0,
                                message: msg.to_string(),
                            });
                        }
                        continue;
                    }
                    if matches!(stmt, Statement::EndIf) {
                        if let Err(msg) = cond.pop() {
                            state.errors.push(ConfigError::Semantic {
                                line: 0,
                                message: msg.to_string(),
                            });
                        }
                        continue;
                    }
                    if !cond.active() {
                        continue;
                    }
                    apply_statement(&mut state, stmt);
                }
            }
        }

        if !cond.frames.is_empty() {
            state.errors.push(ConfigError::Semantic {
                line: 0,
                message: "unbalanced if/endif".into(),
            });
            return Err(state.errors);
        }

        state.setting.keymaps.adjust_modifier(&state.setting.keyboard);

        if state.errors.is_empty() {
            Ok(state.setting)
        } else {
            Err(state.errors)
        }
    }
}

/// Seeds the Keyboard with the distinguished event keys (§3) so `event`
/// bindings and `&Prefix`-style internal references always resolve.
fn install_builtin_keys(setting: &mut Setting) {
    for ev in super::EventKey::ALL {
        setting.keyboard.push_key(Key {
            name: ev.name().to_string(),
            aliases: Vec::new(),
            scan_codes: Vec::new(),
            event: Some(ev),
        });
    }
}

fn intern_action_list(
    state: &mut BuildState,
    name: &str,
    exprs: &[ActionExpr],
    line: usize,
) -> Option<super::KeySeqId> {
    let mut seq = KeySeq::new(name);
    for expr in exprs {
        let Some(action) = compile_action(state, expr, line) else {
            continue;
        };
        seq.actions.push(action);
    }
    seq.mode = seq
        .actions
        .iter()
        .map(action_mode)
        .max()
        .unwrap_or(KeySeqMode::Basic);
    Some(state.setting.keyseqs.push(seq))
}

fn action_mode(a: &Action) -> KeySeqMode {
    match a {
        Action::Key(_) => KeySeqMode::Basic,
        Action::KeySeq(_) => KeySeqMode::KeySeq,
        Action::Function { .. } => KeySeqMode::Assign,
    }
}

fn compile_action(state: &mut BuildState, expr: &ActionExpr, line: usize) -> Option<Action> {
    match expr {
        ActionExpr::Key(me) => {
            let key = state.keyboard_key(&me.key_name, line)?;
            let modifier = resolve_modifier_expr(me, ModifierContext::Other);
            Some(Action::Key(ModifiedKey::new(key, modifier)))
        }
        ActionExpr::KeySeqRef(name) => {
            let id = state.setting.keyseqs.find_by_name(name).or_else(|| {
                state.errors.push(ConfigError::Semantic {
                    line,
                    message: format!("undefined keyseq '${name}'"),
                });
                None
            })?;
            Some(Action::KeySeq(id))
        }
        ActionExpr::Inline(inner) => {
            let id = intern_action_list(state, "", inner, line)?;
            Some(Action::KeySeq(id))
        }
        ActionExpr::Function {
            modifiers,
            name,
            args,
        } => {
            let Some(cmd) = command::lookup(name) else {
                state.errors.push(ConfigError::Semantic {
                    line,
                    message: format!("unknown command '{name}'"),
                });
                return None;
            };
            let mut modifier = Modifier::none();
            for p in modifiers {
                if let Some(ty) = prefix_modifier_type(p) {
                    modifier.press(ty);
                }
            }
            let compiled_args = args
                .iter()
                .map(|a| match a {
                    ArgExpr::Str(s) => Arg::Str(s.clone()),
                    ArgExpr::Number(n) => Arg::Number(*n),
                    ArgExpr::Regexp(r) => Arg::Regexp(r.clone()),
                    ArgExpr::KeyName(k) => Arg::KeyName(k.clone()),
                })
                .collect();
            Some(Action::Function {
                cmd,
                modifier,
                args: compiled_args,
            })
        }
    }
}

fn apply_statement(state: &mut BuildState, stmt: Statement) {
    match stmt {
        Statement::Include { .. }
        | Statement::Define { .. }
        | Statement::IfPush { .. }
        | Statement::ElseIf { .. }
        | Statement::Else
        | Statement::EndIf => unreachable!("handled by the conditional-compile loop"),
        Statement::DefKey { names, scan_codes } => {
            let (primary, aliases) = names.split_first().unwrap();
            state.setting.keyboard.push_key(Key {
                name: primary.clone(),
                aliases: aliases.to_vec(),
                scan_codes: scan_codes
                    .into_iter()
                    .map(|c| ScanCode::new(c as u8))
                    .collect(),
                event: None,
            });
        }
        Statement::DefMod { group, keys } => {
            let Some(ty) = group_modifier_type(&group) else {
                return;
            };
            for k in keys {
                if let Some(id) = state.setting.keyboard.find_by_name(&k) {
                    state
                        .setting
                        .keyboard
                        .modifier_keys
                        .entry(ty)
                        .or_default()
                        .push(id);
                }
            }
        }
        Statement::DefSync { scan_codes } => {
            let codes: Vec<ScanCode> = scan_codes.into_iter().map(|c| ScanCode::new(c as u8)).collect();
            let id = state.setting.keyboard.push_key(Key {
                name: "sync".to_string(),
                aliases: Vec::new(),
                scan_codes: codes,
                event: None,
            });
            state.setting.keyboard.sync_key = Some(id);
        }
        Statement::DefAlias { new_name, existing } => {
            state
                .setting
                .keyboard
                .alias_table
                .insert(new_name.clone(), existing.clone());
            if let Some(id) = state.setting.keyboard.find_by_name(&existing) {
                state.setting.keyboard.keys[id.0 as usize]
                    .aliases
                    .push(new_name);
            }
        }
        Statement::DefSubst { lhs, rhs } => {
            let Some(lhs_key) = state.keyboard_key(&lhs.key_name, 0) else {
                return;
            };
            let Some(rhs_key) = state.keyboard_key(&rhs.key_name, 0) else {
                return;
            };
            let lhs_mod = resolve_modifier_expr(&lhs, ModifierContext::AssignmentLhs);
            let rhs_mod = resolve_modifier_expr(&rhs, ModifierContext::Other);
            state
                .setting
                .keyboard
                .add_substitute(ModifiedKey::new(lhs_key, lhs_mod), ModifiedKey::new(rhs_key, rhs_mod));
        }
        Statement::DefNumberMod {
            number_key,
            modifier_key,
        } => {
            let (Some(n), Some(m)) = (
                state.setting.keyboard.find_by_name(&number_key),
                state.setting.keyboard.find_by_name(&modifier_key),
            ) else {
                return;
            };
            state.setting.keyboard.number_mod.insert(n, m);
        }
        Statement::DefOption { name, value } => apply_option(state, &name, &value),
        Statement::OpenKeymap {
            name,
            parent,
            default_keyseq,
        } => {
            let mut km = Keymap::new(name.clone());
            if let Some(p) = &parent {
                km.parent = state.setting.keymaps.find_by_name(p);
            } else {
                km.parent = state.setting.keymaps.global;
            }
            let id = state.setting.keymaps.push(km);
            if let Some(exprs) = default_keyseq {
                if let Some(seq_id) = intern_action_list(state, "", &exprs, 0) {
                    state.setting.keymaps.get_mut(id).default_keyseq = Some(seq_id);
                }
            }
            state.current_keymap = Some(id);
        }
        Statement::OpenWindowKeymap { name, predicate } => {
            let (kind, class_pattern, title_pattern) = match predicate {
                WindowPredicateExpr::Single(c) => (WindowMatchKind::And, Some(c), None),
                WindowPredicateExpr::And(c, t) => (WindowMatchKind::And, Some(c), Some(t)),
                WindowPredicateExpr::Or(c, t) => (WindowMatchKind::Or, Some(c), Some(t)),
            };
            let mut km = Keymap::new(name);
            km.parent = state.setting.keymaps.global;
            km.window_match = Some(WindowMatch {
                kind,
                class_pattern,
                title_pattern,
            });
            let id = state.setting.keymaps.push(km);
            state.current_keymap = Some(id);
        }
        Statement::Bind { lhs, rhs } => {
            let Some(keymap_id) = state.current_keymap else {
                return;
            };
            let Some(rhs_id) = intern_action_list(state, "", &rhs, 0) else {
                return;
            };
            for me in &lhs {
                let Some(key) = state.keyboard_key(&me.key_name, 0) else {
                    continue;
                };
                let modifier = resolve_modifier_expr(me, ModifierContext::AssignmentLhs);
                let assignment = KeyAssignment {
                    lhs: ModifiedKey::new(key, modifier),
                    rhs: rhs_id,
                };
                let keyboard = &state.setting.keyboard;
                state
                    .setting
                    .keymaps
                    .get_mut(keymap_id)
                    .insert_assignment(assignment, keyboard);
            }
        }
        Statement::BindEvent { event_name, rhs } => {
            let Some(keymap_id) = state.current_keymap else {
                return;
            };
            let Some(ev_key) = state.setting.keyboard.find_by_name(&event_name) else {
                state.errors.push(ConfigError::Semantic {
                    line: 0,
                    message: format!("unknown event key '{event_name}'"),
                });
                return;
            };
            let Some(rhs_id) = intern_action_list(state, "", &rhs, 0) else {
                return;
            };
            let assignment = KeyAssignment {
                lhs: ModifiedKey::new(ev_key, Modifier::none()),
                rhs: rhs_id,
            };
            let keyboard = &state.setting.keyboard;
            state
                .setting
                .keymaps
                .get_mut(keymap_id)
                .insert_assignment(assignment, keyboard);
        }
        Statement::ModAdjust {
            group,
            op,
            mode_prefix,
            keys,
        } => {
            let Some(keymap_id) = state.current_keymap else {
                return;
            };
            let Some(ty) = group_modifier_type(&group) else {
                return;
            };
            let mode = match mode_prefix {
                ModePrefix::Normal => ModAssignMode::Normal,
                ModePrefix::True => ModAssignMode::True,
                ModePrefix::OneShot => ModAssignMode::OneShot,
                ModePrefix::OneShotRepeatable => ModAssignMode::OneShotRepeatable,
            };
            let mut resolved = Vec::new();
            for k in &keys {
                if let Some(id) = state.setting.keyboard.find_by_name(k) {
                    resolved.push(ModAssignment { key: id, mode });
                }
            }
            let km = state.setting.keymaps.get_mut(keymap_id);
            let entry = km.mod_assignments.entry(ty).or_default();
            match op {
                ModAdjustOp::Set => *entry = resolved,
                ModAdjustOp::Add => entry.extend(resolved),
                ModAdjustOp::Remove => {
                    let remove_keys: HashSet<_> = resolved.iter().map(|r| r.key).collect();
                    entry.retain(|e| !remove_keys.contains(&e.key));
                }
            }
        }
        Statement::ModAssign { group, tap_key } => {
            // Binds the virtual modifier key's tap output; stored as a
            // substitution-like ModifiedKey so the generator can emit it
            // on a bare tap. Modeled as a DefMod-adjacent side table; kept
            // on the Keyboard's alias table under a synthetic key name to
            // avoid growing Keyboard with a single-purpose field.
            let Some(_ty) = group_modifier_type(&group) else {
                return;
            };
            state
                .setting
                .keyboard
                .alias_table
                .insert(format!("__tap_output_{group}"), tap_key);
        }
        Statement::DefKeySeq { name, rhs } => {
            intern_action_list(state, &name, &rhs, 0);
        }
        Statement::CloseScope => {}
    }
}

fn group_modifier_type(group: &str) -> Option<ModifierType> {
    Some(match group {
        "shift" => ModifierType::Shift,
        "alt" => ModifierType::Alt,
        "control" | "ctrl" => ModifierType::Control,
        "windows" | "win" => ModifierType::Windows,
        other => {
            if let Some(n) = other.strip_prefix("mod") {
                return mod_n(n.parse().ok()?);
            }
            if let Some(n) = other.strip_prefix("lock") {
                return lock_n(n.parse().ok()?);
            }
            return None;
        }
    })
}

fn apply_option(state: &mut BuildState, name: &str, value: &str) {
    match name {
        "correctKanaLockHandling" => {
            state.setting.options.correct_kana_lock_handling = value != "0";
        }
        "oneShotRepeatableDelay" => match value.parse::<u32>() {
            Ok(n) => state.setting.options.one_shot_repeatable_delay = RepeatCount(n),
            Err(_) => state.errors.push(ConfigError::Semantic {
                line: 0,
                message: format!(
                    "oneShotRepeatableDelay must be a plain repeat count, got '{value}'"
                ),
            }),
        },
        "sts4mayu" => {
            if let Ok(n) = value.parse() {
                state.setting.options.sts4mayu = n;
            }
        }
        "cts4mayu" => {
            if let Ok(n) = value.parse() {
                state.setting.options.cts4mayu = n;
            }
        }
        "mouseEvent" => state.setting.options.mouse_event = value != "0",
        "dragThreshold" => {
            if let Ok(n) = value.parse() {
                state.setting.options.drag_threshold = n;
            }
        }
        other => state.errors.push(ConfigError::Semantic {
            line: 0,
            message: format!("unknown option '{other}'"),
        }),
    }
}

const BASIC_MODIFIER_TABLE: &[(ModifierType, &str)] = &[
    (ModifierType::Shift, "S-"),
    (ModifierType::Alt, "A-"),
    (ModifierType::Control, "C-"),
    (ModifierType::Windows, "W-"),
    (ModifierType::Up, "U-"),
    (ModifierType::Down, "D-"),
    (ModifierType::Repeat, "R-"),
    (ModifierType::NumLock, "NL-"),
    (ModifierType::CapsLock, "CL-"),
    (ModifierType::ScrollLock, "SL-"),
    (ModifierType::KanaLock, "KL-"),
    (ModifierType::ImeLock, "IL-"),
    (ModifierType::ImeComp, "IC-"),
    (ModifierType::Maximized, "MAX-"),
    (ModifierType::Minimized, "MIN-"),
    (ModifierType::MdiMaximized, "MMAX-"),
    (ModifierType::MdiMinimized, "MMIN-"),
    (ModifierType::Touchpad, "T-"),
    (ModifierType::TouchpadSticky, "TS-"),
];

const LOCK_MODIFIERS: [ModifierType; 10] = [
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
];

/// Inverse of `prefix_modifier_type`/`resolve_modifier_expr`: renders a
/// `Modifier` back into a run of prefix tokens. Which bits need a token
/// depends on `ctx`'s default, per §4.1 (see `resolve_modifier_expr`): in
/// `Other` context unmentioned bits default to released, so only pressed
/// and don't-care bits need a token (emitted as pressed, then a single `*`
/// switch and the don't-care bits); in `AssignmentLhs` context unmentioned
/// bits default to don't-care, so only pressed and released bits need one
/// (emitted as pressed, then a single `~` switch and the released bits).
/// Either way the token count stays independent of declaration order.
fn render_modifier(m: Modifier, ctx: ModifierContext) -> String {
    let mut pressed = Vec::new();
    let mut released = Vec::new();
    let mut dontcare = Vec::new();
    let mut classify = |ty: ModifierType, token: String| {
        if m.is_pressed(ty) {
            pressed.push(token);
        } else if m.is_dontcare(ty) {
            dontcare.push(token);
        } else {
            released.push(token);
        }
    };
    for &(ty, prefix) in BASIC_MODIFIER_TABLE {
        classify(ty, prefix.to_string());
    }
    for (idx, ty) in LOCK_MODIFIERS.iter().enumerate() {
        classify(*ty, format!("L{idx}-"));
    }
    for (idx, ty) in ModifierType::VIRTUAL_MOD.iter().enumerate() {
        classify(*ty, format!("M{idx:X}-"));
    }
    match ctx {
        ModifierContext::Other => {
            if !dontcare.is_empty() {
                pressed.push("*".to_string());
                pressed.extend(dontcare);
            }
        }
        ModifierContext::AssignmentLhs => {
            if !released.is_empty() {
                pressed.push("~".to_string());
                pressed.extend(released);
            }
        }
    }
    pressed.concat()
}

fn render_arg(arg: &Arg) -> String {
    match arg {
        Arg::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Arg::Number(n) => n.to_string(),
        Arg::Regexp(r) => format!("/{r}/"),
        Arg::KeyName(k) => k.clone(),
    }
}

fn render_action(action: &Action, setting: &Setting) -> String {
    match action {
        Action::Key(mk) => {
            let key = &setting.keyboard.keys[mk.key.0 as usize];
            format!("{}{}", render_modifier(mk.modifier, ModifierContext::Other), key.name)
        }
        Action::KeySeq(id) => format!("$seq{}", id.0),
        Action::Function {
            cmd,
            modifier,
            args,
        } => {
            let prefix = render_modifier(*modifier, ModifierContext::Other);
            let name = command::name_of(*cmd);
            if args.is_empty() {
                format!("&{prefix}{name}")
            } else {
                let rendered: Vec<String> = args.iter().map(render_arg).collect();
                format!("&{prefix}{name}({})", rendered.join(", "))
            }
        }
    }
}

/// Collects every `KeySeqId` a set of bindings reaches, including ids
/// reached transitively through `Action::KeySeq` references inside other
/// keyseqs, in ascending order.
fn reachable_keyseqs(setting: &Setting, roots: impl Iterator<Item = super::KeySeqId>) -> Vec<super::KeySeqId> {
    let mut seen = HashSet::new();
    let mut worklist: Vec<super::KeySeqId> = roots.collect();
    while let Some(id) = worklist.pop() {
        if !seen.insert(id) {
            continue;
        }
        for action in &setting.keyseqs.get(id).actions {
            if let Action::KeySeq(inner) = action {
                worklist.push(*inner);
            }
        }
    }
    let mut ids: Vec<super::KeySeqId> = seen.into_iter().collect();
    ids.sort_by_key(|id| id.0);
    ids
}

fn render_keymap_bindings(out: &mut String, setting: &Setting, km: &Keymap) {
    for bucket in &km.key_assignments {
        for a in bucket {
            let key = &setting.keyboard.keys[a.lhs.key.0 as usize];
            out.push_str(&format!(
                "key {}{} = $seq{}\n",
                render_modifier(a.lhs.modifier, ModifierContext::AssignmentLhs),
                key.name,
                a.rhs.0
            ));
        }
    }
}

/// Renders a compiled `Setting` back into rewriting-language source,
/// sufficient for the compile -> describe -> recompile round-trip
/// (Testable Property 1). Not a byte-for-byte pretty-printer: normalizes
/// whitespace and modifier-prefix ordering, which is all isomorphism needs.
pub fn describe(setting: &Setting) -> String {
    let mut out = String::new();
    for key in &setting.keyboard.keys {
        if key.is_event() {
            continue;
        }
        let codes: Vec<String> = key
            .scan_codes
            .iter()
            .map(|c| format!("0x{:02x}", c.code))
            .collect();
        out.push_str(&format!("def key {} = {}\n", key.name, codes.join(", ")));
    }

    let all_roots = setting
        .keymaps
        .maps
        .iter()
        .flat_map(|km| km.key_assignments.iter().flat_map(|bucket| bucket.iter().map(|a| a.rhs)));
    for id in reachable_keyseqs(setting, all_roots) {
        let seq = setting.keyseqs.get(id);
        let actions: Vec<String> = seq.actions.iter().map(|a| render_action(a, setting)).collect();
        out.push_str(&format!("keyseq $seq{} = {}\n", id.0, actions.join(" ")));
    }

    if let Some(global_id) = setting.keymaps.global {
        render_keymap_bindings(&mut out, setting, setting.keymaps.get(global_id));
    }
    for (id, km) in setting.keymaps.maps.iter().enumerate() {
        if setting.keymaps.global == Some(super::KeymapId(id as u32)) {
            continue;
        }
        out.push_str(&format!("keymap {}\n", km.name));
        render_keymap_bindings(&mut out, setting, km);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoIncludes;
    impl FileLoader for NoIncludes {
        fn load(&self, _: &str, _: Option<&str>) -> Option<(String, String)> {
            None
        }
    }

    #[test]
    fn compiles_simple_remap() {
        let src = "def key A = 0x1e\ndef key B = 0x30\nkey A = B\n";
        let compiler = Compiler::new(&NoIncludes);
        let setting = compiler.compile(src, HashSet::new()).expect("should compile");
        let a = setting.keyboard.find_by_name("A").unwrap();
        let global = setting.global_keymap();
        let km = setting.keymaps.get(global);
        let seq = km.search_assignment(
            ModifiedKey::new(a, Modifier::none()),
            &setting.keyboard,
        );
        assert!(seq.is_some());
    }

    #[test]
    fn unknown_command_is_a_diagnostic_not_a_panic() {
        let src = "def key A = 0x1e\nkey A = &Frobnicate()\n";
        let compiler = Compiler::new(&NoIncludes);
        let result = compiler.compile(src, HashSet::new());
        assert!(result.is_err());
    }

    #[test]
    fn conditional_compilation_select_branch() {
        let src = "def key A = 0x1e\ndef key B = 0x30\ndef key C = 0x2e\nif (FOO)\nkey A = B\nelse\nkey A = C\nendif\n";
        let compiler = Compiler::new(&NoIncludes);
        let setting = compiler
            .compile(src, HashSet::from(["FOO".to_string()]))
            .unwrap();
        let a = setting.keyboard.find_by_name("A").unwrap();
        let b = setting.keyboard.find_by_name("B").unwrap();
        let global = setting.global_keymap();
        let km = setting.keymaps.get(global);
        let seq_id = km
            .search_assignment(ModifiedKey::new(a, Modifier::none()), &setting.keyboard)
            .unwrap();
        let seq = setting.keyseqs.get(seq_id);
        assert!(matches!(seq.actions[0], Action::Key(mk) if mk.key == b));
    }

    #[test]
    fn modifier_prefixed_binding_resolves_shift() {
        let src = "def key A = 0x1e\ndef key X = 0x2d\nmod shift = A\nkey S-X = X\n";
        let compiler = Compiler::new(&NoIncludes);
        let setting = compiler.compile(src, HashSet::new()).unwrap();
        let x = setting.keyboard.find_by_name("X").unwrap();
        let global = setting.global_keymap();
        let km = setting.keymaps.get(global);
        let mut probe = Modifier::none();
        probe.press(ModifierType::Shift);
        assert!(km
            .search_assignment(ModifiedKey::new(x, probe), &setting.keyboard)
            .is_some());
    }

    #[test]
    fn describe_then_recompile_round_trips_simple_remap() {
        let src = "def key A = 0x1e\ndef key B = 0x30\nkey A = B\n";
        let compiler = Compiler::new(&NoIncludes);
        let setting = compiler.compile(src, HashSet::new()).expect("should compile");
        let described = describe(&setting);

        let recompiled = Compiler::new(&NoIncludes)
            .compile(&described, HashSet::new())
            .unwrap_or_else(|e| panic!("describe() output failed to recompile: {e:?}\n---\n{described}"));

        let a = recompiled.keyboard.find_by_name("A").unwrap();
        let b = recompiled.keyboard.find_by_name("B").unwrap();
        let global = recompiled.global_keymap();
        let km = recompiled.keymaps.get(global);
        let seq_id = km
            .search_assignment(ModifiedKey::new(a, Modifier::none()), &recompiled.keyboard)
            .expect("A should still be bound after round-tripping");
        let seq = recompiled.keyseqs.get(seq_id);
        assert!(matches!(seq.actions[0], Action::Key(mk) if mk.key == b));
    }

    #[test]
    fn describe_then_recompile_round_trips_modifier_prefix_and_function() {
        let src = "def key A = 0x1e\ndef key X = 0x2d\nmod shift = A\nkey S-X = &Wait(100)\n";
        let compiler = Compiler::new(&NoIncludes);
        let setting = compiler.compile(src, HashSet::new()).expect("should compile");
        let described = describe(&setting);

        let recompiled = Compiler::new(&NoIncludes)
            .compile(&described, HashSet::new())
            .unwrap_or_else(|e| panic!("describe() output failed to recompile: {e:?}\n---\n{described}"));

        let x = recompiled.keyboard.find_by_name("X").unwrap();
        let global = recompiled.global_keymap();
        let km = recompiled.keymaps.get(global);
        let mut probe = Modifier::none();
        probe.press(ModifierType::Shift);
        let seq_id = km
            .search_assignment(ModifiedKey::new(x, probe), &recompiled.keyboard)
            .expect("S-X should still be bound after round-tripping");
        let seq = recompiled.keyseqs.get(seq_id);
        assert!(matches!(
            seq.actions[0],
            Action::Function { cmd: CommandId::Wait, .. }
        ));
    }
}
