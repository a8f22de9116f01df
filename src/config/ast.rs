//! Parsed-statement AST, produced by `parser` and consumed by `compiler`.
//!
//! One variant per top-level statement kind enumerated in spec.md §4.1's
//! grammar. Modifier expressions (`S-C-A`) are kept as an ordered list of
//! prefix tokens plus the base key name; `compiler` resolves prefixes to
//! `ModifierType` bits and applies Up/Down normalization, since that
//! resolution needs the seed symbol table the parser doesn't carry.

#[derive(Debug, Clone)]
pub struct ModifierExpr {
    pub prefixes: Vec<String>,
    pub key_name: String,
}

#[derive(Debug, Clone)]
pub enum ActionExpr {
    /// Bare key name with its own modifier prefixes: `C-X`.
    Key(ModifierExpr),
    /// `$name` reference into the keyseq pool.
    KeySeqRef(String),
    /// `&Name(args...)` command invocation, optionally prefixed with
    /// modifiers that scope the command (`&Prefix(Prefix)`).
    Function {
        modifiers: Vec<String>,
        name: String,
        args: Vec<ArgExpr>,
    },
    /// Parenthesized inline sequence, interned with an empty name.
    Inline(Vec<ActionExpr>),
}

#[derive(Debug, Clone)]
pub enum ArgExpr {
    Str(String),
    Number(i64),
    Regexp(String),
    KeyName(String),
}

#[derive(Debug, Clone)]
pub enum WindowPredicateExpr {
    Single(String),
    And(String, String),
    Or(String, String),
}

#[derive(Debug, Clone)]
pub enum Statement {
    Include {
        path: String,
        line: usize,
    },
    Define {
        symbol: String,
    },
    IfPush {
        symbol: String,
        negate: bool,
    },
    ElseIf {
        symbol: String,
        negate: bool,
    },
    Else,
    EndIf,
    DefKey {
        names: Vec<String>,
        scan_codes: Vec<i64>,
    },
    DefMod {
        group: String,
        keys: Vec<String>,
    },
    DefSync {
        scan_codes: Vec<i64>,
    },
    DefAlias {
        new_name: String,
        existing: String,
    },
    DefSubst {
        lhs: ModifierExpr,
        rhs: ModifierExpr,
    },
    DefNumberMod {
        number_key: String,
        modifier_key: String,
    },
    DefOption {
        name: String,
        value: String,
    },
    OpenKeymap {
        name: String,
        parent: Option<String>,
        default_keyseq: Option<Vec<ActionExpr>>,
    },
    OpenWindowKeymap {
        name: String,
        predicate: WindowPredicateExpr,
    },
    Bind {
        lhs: Vec<ModifierExpr>,
        rhs: Vec<ActionExpr>,
    },
    BindEvent {
        event_name: String,
        rhs: Vec<ActionExpr>,
    },
    ModAdjust {
        group: String,
        op: ModAdjustOp,
        mode_prefix: ModePrefix,
        keys: Vec<String>,
    },
    ModAssign {
        group: String,
        tap_key: String,
    },
    DefKeySeq {
        name: String,
        rhs: Vec<ActionExpr>,
    },
    CloseScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAdjustOp {
    Set,
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePrefix {
    Normal,
    True,
    OneShot,
    OneShotRepeatable,
}

impl ModePrefix {
    pub fn from_bangs(bangs: usize) -> Self {
        match bangs {
            0 => ModePrefix::Normal,
            1 => ModePrefix::True,
            2 => ModePrefix::OneShot,
            _ => ModePrefix::OneShotRepeatable,
        }
    }
}
