//! The driving scanner: turns source text into `Token`s on demand (spec
//! §4.3). Context-sensitivity (is `/` a division operator or a regexp
//! literal's opener? is `await`/`yield` a keyword here?) is the parser's
//! call, threaded in through `LexerContext` before each `next_token`.

use std::collections::HashSet;

use jjs_literal::{LiteralPool, PoolIndex};

use crate::error::{LexError, LexErrorKind, LexResult};
use crate::keyword;
use crate::numbers::scan_number;
use crate::span::{ByteRange, LineTracker, Position};
use crate::strings::{scan_body, Delimiter};
use crate::token::{Punctuator, Radix, Token, TokenFlags, TokenKind};

pub const MAX_IDENTIFIER_LEN: usize = 1 << 16;
pub const MAX_STRING_LEN: usize = 1 << 24;
pub const MAX_NUMBER_LEN: usize = 1 << 12;

/// Parser-controlled scanning context (spec: "`await` and `yield` promote
/// from identifier to keyword only inside async/generator bodies or
/// modules; `let` is a keyword in strict mode").
#[derive(Debug, Clone, Copy, Default)]
pub struct LexerContext {
    pub strict_mode: bool,
    pub in_async_scope: bool,
    pub in_generator_scope: bool,
    pub in_module: bool,
    /// Whether a `/` at the current position should be scanned as a
    /// regexp literal opener rather than a division/assign operator.
    pub regexp_allowed: bool,
}

pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    tracker: LineTracker,
    preceded_by_newline: bool,
    pool: LiteralPool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Lexer<'src> {
        Lexer { source, pos: 0, tracker: LineTracker::new(), preceded_by_newline: false, pool: LiteralPool::new() }
    }

    /// Consumes the lexer, returning its accumulated literal pool. The
    /// lexer only ever pushes owned bytes (never `SourceSlice` entries),
    /// so `finish` is infallible here -- it exists to satisfy the pool's
    /// general late-init contract when other producers share it.
    pub fn into_pool(self) -> LiteralPool {
        let mut pool = self.pool;
        pool.finish(self.source).expect("lexer never defers literal bytes to a source slice");
        pool
    }

    /// Borrows the pool mid-parse, before `into_pool` is called. Useful
    /// for a caller (e.g. the regexp-literal primary expression) that
    /// needs a token's raw bytes immediately rather than waiting for the
    /// whole-source finalisation pass.
    pub fn pool(&self) -> &LiteralPool {
        &self.pool
    }

    /// Borrows the pool mutably mid-parse, for a producer that needs to
    /// push a fresh entry that never came from a lexed token -- a class
    /// member name read out of an identifier/keyword token's text, for
    /// instance, which `GetProp`/`SetProp` need as a literal-table string
    /// rather than the program-text slice a real string literal would get.
    pub fn pool_mut(&mut self) -> &mut LiteralPool {
        &mut self.pool
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn position(&self) -> Position {
        self.tracker.position()
    }

    fn error_at(&self, _byte_pos: usize, kind: LexErrorKind) -> LexError {
        LexError { kind, at: self.position() }
    }

    fn advance_bytes(&mut self, n: usize) {
        for ch in self.source[self.pos..self.pos + n].chars() {
            self.tracker.advance(ch);
        }
        self.pos += n;
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return;
            }
            let mut chars = rest.char_indices();
            match chars.next() {
                Some((_, c)) if c.is_whitespace() => {
                    if matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
                        self.preceded_by_newline = true;
                    }
                    self.advance_bytes(c.len_utf8());
                }
                Some((_, '/')) if rest.as_bytes().get(1) == Some(&b'/') => {
                    let end = rest.find(['\n', '\r', '\u{2028}', '\u{2029}']).unwrap_or(rest.len());
                    self.advance_bytes(end);
                }
                Some((_, '/')) if rest.as_bytes().get(1) == Some(&b'*') => {
                    if let Some(end) = rest[2..].find("*/") {
                        if rest[..end + 4].contains(['\n', '\r']) {
                            self.preceded_by_newline = true;
                        }
                        self.advance_bytes(end + 4);
                    } else {
                        self.advance_bytes(rest.len());
                    }
                }
                _ => return,
            }
        }
    }

    pub fn next_token(&mut self, ctx: LexerContext) -> LexResult<Token> {
        self.skip_trivia();
        let start = self.pos;
        let start_pos = self.position();
        let had_newline = self.preceded_by_newline;
        self.preceded_by_newline = false;

        let rest = self.rest();
        if rest.is_empty() {
            return Ok(self.finish(TokenKind::Eof, start, had_newline));
        }

        let first = rest.chars().next().unwrap();
        if first.is_ascii_digit() || (first == '.' && rest.as_bytes().get(1).is_some_and(u8::is_ascii_digit)) {
            return self.scan_number_token(ctx, start, start_pos, had_newline);
        }
        if first == '\'' || first == '"' {
            return self.scan_string_token(ctx, first, start, had_newline);
        }
        if first == '`' {
            return self.scan_template_token(ctx, start, had_newline);
        }
        if first == '#' {
            return self.scan_private_identifier(start, had_newline);
        }
        if is_identifier_start(first) || first == '\\' {
            return self.scan_identifier_or_keyword(ctx, start, start_pos, had_newline);
        }
        if first == '/' && ctx.regexp_allowed {
            return self.scan_regexp_token(start, had_newline);
        }
        self.scan_punctuator(start, had_newline)
    }

    fn finish(&self, kind: TokenKind, start: usize, had_newline: bool) -> Token {
        let mut flags = TokenFlags::empty();
        if had_newline {
            flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }
        Token { kind, range: ByteRange { start: start as u32, end: self.pos as u32 }, flags }
    }

    fn scan_number_token(
        &mut self,
        _ctx: LexerContext,
        start: usize,
        start_pos: Position,
        had_newline: bool,
    ) -> LexResult<Token> {
        let scanned = scan_number(self.rest()).map_err(|kind| LexError { kind, at: start_pos })?;
        if scanned.byte_len > MAX_NUMBER_LEN {
            return Err(LexError { kind: LexErrorKind::NumberTooLong, at: start_pos });
        }
        let literal = if scanned.is_bigint {
            let digits = parse_bigint_digits(&scanned.digits, scanned.radix)
                .ok_or(LexError { kind: LexErrorKind::InvalidBigint, at: start_pos })?;
            self.pool.push_bigint(false, digits)
        } else {
            let value = parse_numeric(&scanned.digits, scanned.radix)
                .ok_or(LexError { kind: LexErrorKind::InvalidBigint, at: start_pos })?;
            self.pool.push_number(value)
        };
        self.advance_bytes(scanned.byte_len);
        let mut flags = if scanned.is_bigint { TokenFlags::IS_BIGINT } else { TokenFlags::empty() };
        if had_newline {
            flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }
        Ok(Token {
            kind: TokenKind::NumericLiteral { radix: scanned.radix, literal },
            range: ByteRange { start: start as u32, end: self.pos as u32 },
            flags,
        })
    }

    fn scan_string_token(
        &mut self,
        _ctx: LexerContext,
        quote: char,
        start: usize,
        had_newline: bool,
    ) -> LexResult<Token> {
        let start_pos = self.position();
        self.advance_bytes(quote.len_utf8());
        let delim = if quote == '\'' { Delimiter::Single } else { Delimiter::Double };
        let body = scan_body(self.rest(), delim, false).map_err(|kind| LexError { kind, at: start_pos })?;
        if body.byte_len > MAX_STRING_LEN {
            return Err(LexError { kind: LexErrorKind::StringTooLong, at: start_pos });
        }
        self.advance_bytes(body.byte_len);
        self.advance_bytes(quote.len_utf8());
        let literal = self.pool.push_owned_string(body.cooked.into_bytes());
        let mut flags = TokenFlags::IS_STRING_LITERAL;
        if body.had_escape {
            flags |= TokenFlags::HAD_ESCAPE;
        }
        if had_newline {
            flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }
        Ok(Token {
            kind: TokenKind::StringLiteral { literal },
            range: ByteRange { start: start as u32, end: self.pos as u32 },
            flags,
        })
    }

    fn scan_template_token(&mut self, start: usize, had_newline: bool) -> LexResult<Token> {
        let start_pos = self.position();
        self.advance_bytes(1);
        let body =
            scan_body(self.rest(), Delimiter::Template, false).map_err(|kind| LexError { kind, at: start_pos })?;
        self.advance_bytes(body.byte_len);
        let tail = self.rest().starts_with('`');
        self.advance_bytes(1);
        let literal = self.pool.push_owned_string(body.cooked.into_bytes());
        let mut flags = TokenFlags::IS_STRING_LITERAL;
        if body.had_escape {
            flags |= TokenFlags::HAD_ESCAPE;
        }
        if had_newline {
            flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }
        Ok(Token {
            kind: TokenKind::TemplateSpan { literal, tail },
            range: ByteRange { start: start as u32, end: self.pos as u32 },
            flags,
        })
    }

    fn scan_private_identifier(&mut self, start: usize, had_newline: bool) -> LexResult<Token> {
        self.advance_bytes(1);
        let start_pos = self.position();
        let (name, consumed) = scan_identifier_name(self.rest());
        if name.is_empty() {
            return Err(LexError { kind: LexErrorKind::InvalidCharacter, at: start_pos });
        }
        self.advance_bytes(consumed);
        Ok(self.finish(TokenKind::PrivateIdentifier, start, had_newline))
    }

    fn scan_identifier_or_keyword(
        &mut self,
        ctx: LexerContext,
        start: usize,
        start_pos: Position,
        had_newline: bool,
    ) -> LexResult<Token> {
        let (name, consumed, had_escape) = scan_identifier_canonicalized(self.rest(), start_pos)?;
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(LexError { kind: LexErrorKind::IdentifierTooLong, at: start_pos });
        }
        self.advance_bytes(consumed);
        let mut flags = TokenFlags::empty();
        if had_escape {
            flags |= TokenFlags::HAD_ESCAPE;
        }
        if had_newline {
            flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }

        let kind = match keyword::classify(&name) {
            Some(_) if had_escape => {
                return Err(LexError { kind: LexErrorKind::InvalidKeyword, at: start_pos });
            }
            Some(kw) if kw.is_unconditionally_reserved() => TokenKind::Keyword(kw),
            Some(kw) if kw.is_strict_mode_reserved() => {
                if ctx.strict_mode {
                    TokenKind::Keyword(kw)
                } else {
                    TokenKind::Identifier
                }
            }
            Some(keyword::Keyword::Await) if ctx.in_async_scope || ctx.in_module => {
                TokenKind::Keyword(keyword::Keyword::Await)
            }
            Some(keyword::Keyword::Yield) if ctx.in_generator_scope || ctx.strict_mode => {
                TokenKind::Keyword(keyword::Keyword::Yield)
            }
            _ => TokenKind::Identifier,
        };
        Ok(Token { kind, range: ByteRange { start: start as u32, end: self.pos as u32 }, flags })
    }

    fn scan_regexp_token(&mut self, start: usize, had_newline: bool) -> LexResult<Token> {
        let start_pos = self.position();
        self.advance_bytes(1);
        let mut in_class = false;
        let pattern_start = self.pos;
        loop {
            let rest = self.rest();
            let mut chars = rest.char_indices();
            match chars.next() {
                None => return Err(LexError { kind: LexErrorKind::UnterminatedString, at: start_pos }),
                Some((_, '\n')) => return Err(LexError { kind: LexErrorKind::NewlineNotAllowed, at: start_pos }),
                Some((_, '\\')) => {
                    let escaped = chars.next().map(|(_, c)| c.len_utf8()).unwrap_or(0);
                    self.advance_bytes(1 + escaped);
                }
                Some((_, '[')) => {
                    in_class = true;
                    self.advance_bytes(1);
                }
                Some((_, ']')) => {
                    in_class = false;
                    self.advance_bytes(1);
                }
                Some((_, '/')) if !in_class => {
                    break;
                }
                Some((_, c)) => self.advance_bytes(c.len_utf8()),
            }
        }
        let pattern_bytes = self.source[pattern_start..self.pos].as_bytes().to_vec();
        self.advance_bytes(1);

        let flags_start = self.pos;
        let (flags_name, consumed) = scan_identifier_name(self.rest());
        let mut seen = HashSet::new();
        for c in flags_name.chars() {
            if !"gimuys".contains(c) {
                return Err(LexError { kind: LexErrorKind::InvalidCharacter, at: start_pos });
            }
            if !seen.insert(c) {
                return Err(LexError { kind: LexErrorKind::DuplicatedRegexpFlag, at: self.position() });
            }
        }
        self.advance_bytes(consumed);
        let _ = flags_start;

        let pattern = self.pool.push_owned_string(pattern_bytes);
        let flags = self.pool.push_owned_string(flags_name.into_bytes());
        let mut token_flags = TokenFlags::empty();
        if had_newline {
            token_flags |= TokenFlags::PRECEDED_BY_NEWLINE;
        }
        Ok(Token {
            kind: TokenKind::RegexpLiteral { pattern, flags },
            range: ByteRange { start: start as u32, end: self.pos as u32 },
            flags: token_flags,
        })
    }

    fn scan_punctuator(&mut self, start: usize, had_newline: bool) -> LexResult<Token> {
        let start_pos = self.position();
        let rest = self.rest();
        let (punct, len) = match_punctuator(rest).ok_or(LexError { kind: LexErrorKind::InvalidCharacter, at: start_pos })?;
        self.advance_bytes(len);
        Ok(self.finish(TokenKind::Punctuator(punct), start, had_newline))
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphanumeric() || c == '\u{200c}' || c == '\u{200d}'
}

fn scan_identifier_name(input: &str) -> (String, usize) {
    let mut out = String::new();
    let mut len = 0;
    let mut chars = input.char_indices();
    if let Some((_, c)) = chars.clone().next() {
        if is_identifier_start(c) {
            out.push(c);
            len += c.len_utf8();
            chars.next();
        }
    }
    for (_, c) in chars {
        if is_identifier_continue(c) {
            out.push(c);
            len += c.len_utf8();
        } else {
            break;
        }
    }
    (out, len)
}

/// Scans an identifier, decoding any `\uXXXX`/`\u{...}` escapes into the
/// canonical spelling so that keyword classification (and the
/// `escape-in-keyword` check) operates on the unescaped form (spec:
/// "escape-bearing identifiers are canonicalised into a temporary buffer
/// before the memcmp").
fn scan_identifier_canonicalized(input: &str, at: Position) -> LexResult<(String, usize, bool)> {
    let mut out = String::new();
    let mut len = 0;
    let mut had_escape = false;
    let mut first = true;

    loop {
        let rest = &input[len..];
        let Some(c) = rest.chars().next() else { break };
        if c == '\\' && rest.as_bytes().get(1) == Some(&b'u') {
            had_escape = true;
            let (decoded, consumed) = crate::strings::scan_identifier_unicode_escape(rest)
                .map_err(|kind| LexError { kind, at })?;
            let ok = if first { is_identifier_start(decoded) } else { is_identifier_continue(decoded) };
            if !ok {
                break;
            }
            out.push(decoded);
            len += consumed;
        } else if (first && is_identifier_start(c)) || (!first && is_identifier_continue(c)) {
            out.push(c);
            len += c.len_utf8();
        } else {
            break;
        }
        first = false;
    }
    Ok((out, len, had_escape))
}

fn parse_numeric(digits: &str, radix: Radix) -> Option<f64> {
    match radix {
        Radix::Decimal => digits.parse::<f64>().ok(),
        Radix::Hex => u64::from_str_radix(digits, 16).ok().map(|v| v as f64),
        Radix::Octal => u64::from_str_radix(digits, 8).ok().map(|v| v as f64),
        Radix::Binary => u64::from_str_radix(digits, 2).ok().map(|v| v as f64),
    }
}

fn parse_bigint_digits(digits: &str, radix: Radix) -> Option<Vec<u32>> {
    let base: u32 = match radix {
        Radix::Decimal => 10,
        Radix::Hex => 16,
        Radix::Octal => 8,
        Radix::Binary => 2,
    };
    let mut acc: Vec<u32> = vec![0];
    for c in digits.chars() {
        let d = c.to_digit(base)?;
        let mut carry = d;
        for limb in acc.iter_mut() {
            let wide = (*limb as u64) * (base as u64) + carry as u64;
            *limb = wide as u32;
            carry = (wide >> 32) as u32;
        }
        if carry != 0 {
            acc.push(carry);
        }
    }
    Some(acc)
}

macro_rules! punct_table {
    ($rest:expr, [$(($lit:literal, $variant:expr)),+ $(,)?]) => {
        $(if $rest.starts_with($lit) { return Some(($variant, $lit.len())); })+
    };
}

fn match_punctuator(rest: &str) -> Option<(Punctuator, usize)> {
    punct_table!(rest, [
        ("...", Punctuator::DotDotDot),
        ("=>", Punctuator::Arrow),
        ("===", Punctuator::EqEqEq),
        ("!==", Punctuator::NotEqEq),
        ("**=", Punctuator::StarStarEq),
        ("<<=", Punctuator::ShlEq),
        (">>>", Punctuator::Sar),
        (">>=", Punctuator::ShrEq),
        ("&&=", Punctuator::AmpAmpEq),
        ("||=", Punctuator::PipePipeEq),
        ("??=", Punctuator::QuestionQuestionEq),
    ]);
    punct_table!(rest, [
        ("==", Punctuator::EqEq),
        ("!=", Punctuator::NotEq),
        ("<=", Punctuator::LtEq),
        (">=", Punctuator::GtEq),
        ("**", Punctuator::StarStar),
        ("++", Punctuator::PlusPlus),
        ("--", Punctuator::MinusMinus),
        ("<<", Punctuator::Shl),
        (">>", Punctuator::Shr),
        ("&&", Punctuator::AmpAmp),
        ("||", Punctuator::PipePipe),
        ("??", Punctuator::QuestionQuestion),
        ("?.", Punctuator::QuestionDot),
        ("+=", Punctuator::PlusEq),
        ("-=", Punctuator::MinusEq),
        ("*=", Punctuator::StarEq),
        ("%=", Punctuator::PercentEq),
        ("&=", Punctuator::AmpEq),
        ("|=", Punctuator::PipeEq),
        ("^=", Punctuator::CaretEq),
        ("/=", Punctuator::SlashEq),
    ]);
    punct_table!(rest, [
        ("{", Punctuator::LBrace),
        ("}", Punctuator::RBrace),
        ("(", Punctuator::LParen),
        (")", Punctuator::RParen),
        ("[", Punctuator::LBracket),
        ("]", Punctuator::RBracket),
        (".", Punctuator::Dot),
        (";", Punctuator::Semicolon),
        (",", Punctuator::Comma),
        ("<", Punctuator::Lt),
        (">", Punctuator::Gt),
        ("+", Punctuator::Plus),
        ("-", Punctuator::Minus),
        ("*", Punctuator::Star),
        ("%", Punctuator::Percent),
        ("&", Punctuator::Amp),
        ("|", Punctuator::Pipe),
        ("^", Punctuator::Caret),
        ("!", Punctuator::Bang),
        ("~", Punctuator::Tilde),
        ("?", Punctuator::Question),
        (":", Punctuator::Colon),
        ("=", Punctuator::Eq),
        ("/", Punctuator::Slash),
        ("@", Punctuator::At),
    ]);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str, ctx: LexerContext) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(ctx).unwrap();
            let eof = tok.is_eof();
            out.push(tok);
            if eof {
                break;
            }
        }
        out
    }

    #[test]
    fn identifiers_and_keywords() {
        let toks = lex_all("let x = foo", LexerContext::default());
        assert_eq!(toks[0].kind, TokenKind::Keyword(keyword::Keyword::Let));
        assert_eq!(toks[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn await_is_identifier_outside_async_scope() {
        let toks = lex_all("await", LexerContext::default());
        assert_eq!(toks[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn await_is_keyword_inside_async_scope() {
        let ctx = LexerContext { in_async_scope: true, ..Default::default() };
        let toks = lex_all("await", ctx);
        assert_eq!(toks[0].kind, TokenKind::Keyword(keyword::Keyword::Await));
    }

    #[test]
    fn maximal_munch_picks_longest_punctuator() {
        let toks = lex_all(">>>", LexerContext::default());
        assert_eq!(toks[0].kind, TokenKind::Punctuator(Punctuator::Sar));
    }

    #[test]
    fn regexp_literal_with_character_class_containing_slash() {
        let ctx = LexerContext { regexp_allowed: true, ..Default::default() };
        let toks = lex_all("/[a/b]/gi", ctx);
        match &toks[0].kind {
            TokenKind::RegexpLiteral { .. } => {}
            other => panic!("expected regexp literal, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_regexp_flags_are_rejected() {
        let ctx = LexerContext { regexp_allowed: true, ..Default::default() };
        let mut lexer = Lexer::new("/abc/gg");
        let err = lexer.next_token(ctx).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::DuplicatedRegexpFlag);
    }

    #[test]
    fn private_identifier_token() {
        let toks = lex_all("#field", LexerContext::default());
        assert_eq!(toks[0].kind, TokenKind::PrivateIdentifier);
    }

    #[test]
    fn escape_in_keyword_spelling_is_rejected() {
        let mut lexer = Lexer::new("\\u0069f"); // "if" with escaped 'i'
        let err = lexer.next_token(LexerContext::default()).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidKeyword);
    }

    #[test]
    fn line_comment_is_skipped() {
        let toks = lex_all("// hi\nx", LexerContext::default());
        assert_eq!(toks[0].kind, TokenKind::Identifier);
        assert!(toks[0].flags.contains(TokenFlags::PRECEDED_BY_NEWLINE));
    }

    #[test]
    fn block_comment_spanning_lines_sets_newline_flag() {
        let toks = lex_all("/* a\nb */ x", LexerContext::default());
        assert!(toks[0].flags.contains(TokenFlags::PRECEDED_BY_NEWLINE));
    }
}
