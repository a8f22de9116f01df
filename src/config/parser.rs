//! Statement-level parser: tokenized lines -> `ast::Statement`.
//!
//! Grounded on `examples/original_source/src/core/settings/setting_loader.cpp`'s
//! per-line dispatch. Diagnostics are accumulated (`Diagnostic`) rather than
//! thrown, so the parser keeps going on recoverable errors and hands the
//! whole list back.

use thiserror::Error;

use super::ast::*;
use super::token::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{line}: {message}")]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            message: message.into(),
        }
    }
}

struct Line<'a> {
    tokens: &'a [Token],
    pos: usize,
    line_no: usize,
}

impl<'a> Line<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Line {
            tokens,
            pos: 0,
            line_no: tokens.first().map(|t| t.line).unwrap_or(0),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect_str(&mut self) -> Result<String, Diagnostic> {
        match self.bump().map(|t| &t.kind) {
            Some(TokenKind::Str { value, .. }) => Ok(value.clone()),
            other => Err(Diagnostic::new(
                self.line_no,
                format!("expected a name, found {other:?}"),
            )),
        }
    }

    fn expect_number(&mut self) -> Result<i64, Diagnostic> {
        match self.bump().map(|t| &t.kind) {
            Some(TokenKind::Number(n)) => Ok(*n),
            other => Err(Diagnostic::new(
                self.line_no,
                format!("expected a number, found {other:?}"),
            )),
        }
    }

    fn eat_prefix(&mut self, p: &str) -> bool {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Prefix(s)) if s == p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn keyword_is(&self, kw: &str) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Str{value, ..}) if value == kw)
    }
}

/// Parses a leading run of prefix tokens plus a trailing key-name string
/// into a `ModifierExpr` (§4.1 "Modifier expression parsing").
fn parse_modifier_expr(line: &mut Line) -> Result<ModifierExpr, Diagnostic> {
    let mut prefixes = Vec::new();
    while let Some(Token {
        kind: TokenKind::Prefix(p),
        ..
    }) = line.peek()
    {
        prefixes.push(p.clone());
        line.bump();
    }
    let key_name = line.expect_str()?;
    Ok(ModifierExpr { prefixes, key_name })
}

fn parse_action_list(line: &mut Line) -> Result<Vec<ActionExpr>, Diagnostic> {
    let mut actions = Vec::new();
    while !line.at_end() {
        actions.push(parse_action(line)?);
    }
    Ok(actions)
}

fn parse_action(line: &mut Line) -> Result<ActionExpr, Diagnostic> {
    if line.eat_prefix("$") {
        let name = line.expect_str()?;
        return Ok(ActionExpr::KeySeqRef(name));
    }
    if line.eat_prefix("&") {
        let mut modifiers = Vec::new();
        while let Some(Token {
            kind: TokenKind::Prefix(p),
            ..
        }) = line.peek()
        {
            if p == "&" {
                break;
            }
            modifiers.push(p.clone());
            line.bump();
        }
        let name = line.expect_str()?;
        let mut args = Vec::new();
        if matches!(line.peek().map(|t| &t.kind), Some(TokenKind::OpenParen)) {
            line.bump();
            loop {
                match line.peek().map(|t| &t.kind) {
                    Some(TokenKind::CloseParen) => {
                        line.bump();
                        break;
                    }
                    Some(TokenKind::Comma) => {
                        line.bump();
                    }
                    Some(TokenKind::Str { value, .. }) => {
                        args.push(ArgExpr::KeyName(value.clone()));
                        line.bump();
                    }
                    Some(TokenKind::Number(n)) => {
                        args.push(ArgExpr::Number(*n));
                        line.bump();
                    }
                    Some(TokenKind::Regexp(r)) => {
                        args.push(ArgExpr::Regexp(r.clone()));
                        line.bump();
                    }
                    other => {
                        return Err(Diagnostic::new(
                            line.line_no,
                            format!("unexpected token in argument list: {other:?}"),
                        ))
                    }
                }
            }
        }
        return Ok(ActionExpr::Function {
            modifiers,
            name,
            args,
        });
    }
    if matches!(line.peek().map(|t| &t.kind), Some(TokenKind::OpenParen)) {
        line.bump();
        let mut inner = Vec::new();
        while !matches!(line.peek().map(|t| &t.kind), Some(TokenKind::CloseParen)) {
            if line.at_end() {
                return Err(Diagnostic::new(line.line_no, "unterminated parenthesized sequence"));
            }
            inner.push(parse_action(line)?);
        }
        line.bump();
        return Ok(ActionExpr::Inline(inner));
    }
    let me = parse_modifier_expr(line)?;
    Ok(ActionExpr::Key(me))
}

fn parse_window_predicate(line: &mut Line) -> Result<WindowPredicateExpr, Diagnostic> {
    if !matches!(line.peek().map(|t| &t.kind), Some(TokenKind::OpenParen)) {
        // bare /class/
        return match line.bump().map(|t| &t.kind) {
            Some(TokenKind::Regexp(r)) => Ok(WindowPredicateExpr::Single(r.clone())),
            other => Err(Diagnostic::new(
                line.line_no,
                format!("expected window predicate, found {other:?}"),
            )),
        };
    }
    line.bump(); // (
    let a = match line.bump().map(|t| &t.kind) {
        Some(TokenKind::Regexp(r)) => r.clone(),
        other => {
            return Err(Diagnostic::new(
                line.line_no,
                format!("expected /regex/, found {other:?}"),
            ))
        }
    };
    let is_and = line.eat_prefix("&&");
    let is_or = !is_and && line.eat_prefix("||");
    let result = if is_and || is_or {
        let b = match line.bump().map(|t| &t.kind) {
            Some(TokenKind::Regexp(r)) => r.clone(),
            other => {
                return Err(Diagnostic::new(
                    line.line_no,
                    format!("expected /regex/, found {other:?}"),
                ))
            }
        };
        if is_and {
            WindowPredicateExpr::And(a, b)
        } else {
            WindowPredicateExpr::Or(a, b)
        }
    } else {
        WindowPredicateExpr::Single(a)
    };
    if !matches!(line.peek().map(|t| &t.kind), Some(TokenKind::CloseParen)) {
        return Err(Diagnostic::new(line.line_no, "expected ')'"));
    }
    line.bump();
    Ok(result)
}

/// Parses one logical line (already split into tokens) into a `Statement`.
/// Returns `Ok(None)` for a blank line.
pub fn parse_line(tokens: &[Token]) -> Result<Option<Statement>, Diagnostic> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut line = Line::new(tokens);
    let keyword = line.expect_str()?;

    let stmt = match keyword.as_str() {
        "include" => {
            let path = line.expect_str()?;
            Statement::Include {
                path,
                line: line.line_no,
            }
        }
        "define" => Statement::Define {
            symbol: line.expect_str()?,
        },
        "if" | "elseif" | "elif" => {
            let negate = line.eat_prefix("!");
            let sym = line.expect_str()?;
            if keyword == "if" {
                Statement::IfPush { symbol: sym, negate }
            } else {
                Statement::ElseIf { symbol: sym, negate }
            }
        }
        "else" => Statement::Else,
        "endif" => Statement::EndIf,
        "def" => {
            let sub = line.expect_str()?;
            match sub.as_str() {
                "key" => {
                    let mut names = vec![line.expect_str()?];
                    while matches!(line.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                        line.bump();
                        names.push(line.expect_str()?);
                    }
                    if !line.eat_prefix("=") {
                        return Err(Diagnostic::new(line.line_no, "expected '=' in def key"));
                    }
                    let mut scan_codes = vec![line.expect_number()?];
                    while matches!(line.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                        line.bump();
                        scan_codes.push(line.expect_number()?);
                    }
                    Statement::DefKey { names, scan_codes }
                }
                "mod" => {
                    let group = line.expect_str()?;
                    line.eat_prefix("=");
                    let mut keys = Vec::new();
                    while !line.at_end() {
                        keys.push(line.expect_str()?);
                    }
                    Statement::DefMod { group, keys }
                }
                "sync" => {
                    line.eat_prefix("=");
                    let mut scan_codes = vec![line.expect_number()?];
                    while matches!(line.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                        line.bump();
                        scan_codes.push(line.expect_number()?);
                    }
                    Statement::DefSync { scan_codes }
                }
                "alias" => {
                    let new_name = line.expect_str()?;
                    line.eat_prefix("=");
                    let existing = line.expect_str()?;
                    Statement::DefAlias { new_name, existing }
                }
                "subst" => {
                    let lhs = parse_modifier_expr(&mut line)?;
                    if !line.eat_prefix("=>") {
                        return Err(Diagnostic::new(line.line_no, "expected '=>' in def subst"));
                    }
                    let rhs = parse_modifier_expr(&mut line)?;
                    Statement::DefSubst { lhs, rhs }
                }
                "numbermod" => {
                    let number_key = line.expect_str()?;
                    line.eat_prefix("=");
                    let modifier_key = line.expect_str()?;
                    Statement::DefNumberMod {
                        number_key,
                        modifier_key,
                    }
                }
                "option" => {
                    let name = line.expect_str()?;
                    line.eat_prefix("=");
                    let value = line.expect_str()?;
                    Statement::DefOption { name, value }
                }
                other => {
                    return Err(Diagnostic::new(
                        line.line_no,
                        format!("unknown 'def {other}' statement"),
                    ))
                }
            }
        }
        "keymap" | "keymap2" => {
            let name = line.expect_str()?;
            let parent = if line.eat_prefix(":") {
                Some(line.expect_str()?)
            } else {
                None
            };
            let default_keyseq = if line.eat_prefix("=") {
                Some(parse_action_list(&mut line)?)
            } else {
                None
            };
            Statement::OpenKeymap {
                name,
                parent,
                default_keyseq,
            }
        }
        "window" => {
            let name = line.expect_str()?;
            let predicate = parse_window_predicate(&mut line)?;
            Statement::OpenWindowKeymap { name, predicate }
        }
        "key" => {
            let mut lhs = vec![parse_modifier_expr(&mut line)?];
            while matches!(line.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                line.bump();
                lhs.push(parse_modifier_expr(&mut line)?);
            }
            if !line.eat_prefix("=") {
                return Err(Diagnostic::new(line.line_no, "expected '=' in key binding"));
            }
            let rhs = parse_action_list(&mut line)?;
            Statement::Bind { lhs, rhs }
        }
        "event" => {
            let event_name = line.expect_str()?;
            if !line.eat_prefix("=") {
                return Err(Diagnostic::new(line.line_no, "expected '=' in event binding"));
            }
            let rhs = parse_action_list(&mut line)?;
            Statement::BindEvent { event_name, rhs }
        }
        "mod" => {
            let group = line.expect_str()?;
            if line.keyword_is("assign") {
                line.bump();
                line.eat_prefix("=");
                line.eat_prefix("*");
                let tap_key = line.expect_str()?;
                return Ok(Some(Statement::ModAssign { group, tap_key }));
            }
            let bangs = [(); 3]
                .iter()
                .take_while(|_| line.eat_prefix("!"))
                .count();
            let mode_prefix = ModePrefix::from_bangs(bangs);
            let op = if line.eat_prefix("+=") {
                ModAdjustOp::Add
            } else if line.eat_prefix("-=") {
                ModAdjustOp::Remove
            } else if line.eat_prefix("=") {
                ModAdjustOp::Set
            } else {
                ModAdjustOp::Set
            };
            let mut keys = Vec::new();
            while !line.at_end() {
                keys.push(line.expect_str()?);
            }
            Statement::ModAdjust {
                group,
                op,
                mode_prefix,
                keys,
            }
        }
        "keyseq" => {
            if !line.eat_prefix("$") {
                return Err(Diagnostic::new(line.line_no, "expected '$name' in keyseq"));
            }
            let name = line.expect_str()?;
            if !line.eat_prefix("=") {
                return Err(Diagnostic::new(line.line_no, "expected '=' in keyseq"));
            }
            let rhs = parse_action_list(&mut line)?;
            Statement::DefKeySeq { name, rhs }
        }
        other => {
            return Err(Diagnostic::new(
                line.line_no,
                format!("unknown statement '{other}'"),
            ))
        }
    };
    Ok(Some(stmt))
}

/// Parses every tokenized line, accumulating diagnostics rather than
/// aborting on the first error.
pub fn parse_lines(lines: &[Vec<Token>]) -> (Vec<Statement>, Vec<Diagnostic>) {
    let mut statements = Vec::new();
    let mut diagnostics = Vec::new();
    for line in lines {
        match parse_line(line) {
            Ok(Some(stmt)) => statements.push(stmt),
            Ok(None) => {}
            Err(d) => diagnostics.push(d),
        }
    }
    (statements, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::token::tokenize;

    fn parse(src: &str) -> (Vec<Statement>, Vec<Diagnostic>) {
        let (lines, errs) = tokenize(src);
        assert!(errs.is_empty(), "tokenizer errors: {errs:?}");
        parse_lines(&lines)
    }

    #[test]
    fn parses_def_key() {
        let (stmts, diags) = parse("def key A = 0x1e\n");
        assert!(diags.is_empty());
        assert!(matches!(stmts[0], Statement::DefKey { .. }));
    }

    #[test]
    fn parses_simple_binding() {
        let (stmts, diags) = parse("key A = B\n");
        assert!(diags.is_empty());
        match &stmts[0] {
            Statement::Bind { lhs, rhs } => {
                assert_eq!(lhs.len(), 1);
                assert_eq!(rhs.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_modifier_prefixed_binding() {
        let (stmts, diags) = parse("key S-A = C-X\n");
        assert!(diags.is_empty());
        match &stmts[0] {
            Statement::Bind { lhs, .. } => assert_eq!(lhs[0].prefixes, vec!["S-".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_window_and_predicate() {
        let (stmts, diags) = parse("window Editor ( /Emacs/ && /scratch/ )\n");
        assert!(diags.is_empty());
        assert!(matches!(
            stmts[0],
            Statement::OpenWindowKeymap {
                predicate: WindowPredicateExpr::And(..),
                ..
            }
        ));
    }

    #[test]
    fn parses_function_call_with_args() {
        let (stmts, diags) = parse("key C-X = &Prefix(Prefix)\n");
        assert!(diags.is_empty());
        match &stmts[0] {
            Statement::Bind { rhs, .. } => {
                assert!(matches!(rhs[0], ActionExpr::Function { .. }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_diagnostic_on_unknown_statement() {
        let (_, diags) = parse("frobnicate A = B\n");
        assert_eq!(diags.len(), 1);
    }
}
