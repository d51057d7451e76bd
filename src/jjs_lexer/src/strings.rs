//! String and template literal body scanning (spec §4.3): `\xHH`,
//! `\uHHHH`, `\u{...}`, octal escapes (sloppy mode only, always rejected
//! in templates), and line continuations (`\` immediately followed by a
//! line terminator, which is elided).

use crate::error::LexErrorKind;

pub struct ScannedBody {
    /// Cooked (escape-decoded) text.
    pub cooked: String,
    /// Number of bytes consumed from the input, not including the
    /// closing delimiter.
    pub byte_len: usize,
    pub had_escape: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Single,
    Double,
    /// Backtick (template literal span); newlines are allowed raw and
    /// octal escapes are always an error.
    Template,
}

/// Scans the body of a string/template literal up to (not including) the
/// closing delimiter or, for templates, up to `` ` `` or `${`. All
/// position bookkeeping is in bytes, never chars, so escape handling
/// can't trip over multi-byte boundaries.
pub fn scan_body(input: &str, delim: Delimiter, strict: bool) -> Result<ScannedBody, LexErrorKind> {
    let bytes = input.as_bytes();
    let mut cooked = String::new();
    let mut had_escape = false;
    let mut i = 0;

    while i < bytes.len() {
        let ch = input[i..].chars().next().unwrap();
        match (ch, delim) {
            ('\'', Delimiter::Single) | ('"', Delimiter::Double) => {
                return Ok(ScannedBody { cooked, byte_len: i, had_escape });
            }
            ('`', Delimiter::Template) => {
                return Ok(ScannedBody { cooked, byte_len: i, had_escape });
            }
            ('$', Delimiter::Template) if bytes.get(i + 1) == Some(&b'{') => {
                return Ok(ScannedBody { cooked, byte_len: i, had_escape });
            }
            ('\n', Delimiter::Single) | ('\n', Delimiter::Double) => {
                return Err(LexErrorKind::NewlineNotAllowed);
            }
            ('\\', _) => {
                had_escape = true;
                let (decoded, escape_len) = scan_escape(&input[i + 1..], delim, strict)?;
                if let Some(c) = decoded {
                    cooked.push(c);
                }
                i += 1 + escape_len;
            }
            _ => {
                cooked.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    Err(LexErrorKind::UnterminatedString)
}

/// Decodes one escape sequence starting just after the backslash.
/// Returns the decoded character (`None` for a line continuation, which
/// contributes nothing to the cooked string) and the number of bytes
/// consumed from `rest`, i.e. the escape's length *excluding* the
/// backslash itself.
fn scan_escape(
    rest: &str,
    delim: Delimiter,
    strict: bool,
) -> Result<(Option<char>, usize), LexErrorKind> {
    let bytes = rest.as_bytes();
    let first = rest.chars().next().ok_or(LexErrorKind::UnterminatedString)?;
    match first {
        '\n' | '\u{2028}' | '\u{2029}' => Ok((None, first.len_utf8())),
        '\r' => {
            let extra = if bytes.get(1) == Some(&b'\n') { 1 } else { 0 };
            Ok((None, 1 + extra))
        }
        'n' => Ok((Some('\n'), 1)),
        't' => Ok((Some('\t'), 1)),
        'r' => Ok((Some('\r'), 1)),
        'b' => Ok((Some('\u{8}'), 1)),
        'f' => Ok((Some('\u{c}'), 1)),
        'v' => Ok((Some('\u{b}'), 1)),
        '0' if !matches!(bytes.get(1), Some(b'0'..=b'9')) => Ok((Some('\0'), 1)),
        'x' => {
            let hex: String = rest[1..].chars().take(2).collect();
            if hex.len() != 2 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(LexErrorKind::InvalidHexDigit);
            }
            let code = u32::from_str_radix(&hex, 16).unwrap();
            Ok((Some(char::from_u32(code).unwrap_or('\u{fffd}')), 1 + hex.len()))
        }
        'u' => {
            let (ch, len) = scan_unicode_escape(rest)?;
            Ok((Some(ch), len))
        }
        '1'..='7' => {
            if delim == Delimiter::Template {
                return Err(LexErrorKind::TemplateOctalEscape);
            }
            if strict {
                return Err(LexErrorKind::InvalidOctalDigit);
            }
            let max_len = if first <= '3' { 3 } else { 2 };
            let mut digits = String::new();
            digits.push(first);
            let mut len = 1;
            for c in rest[1..].chars() {
                if digits.len() >= max_len || !('0'..='7').contains(&c) {
                    break;
                }
                digits.push(c);
                len += 1;
            }
            let code = u32::from_str_radix(&digits, 8).unwrap();
            Ok((Some(char::from_u32(code).unwrap_or('\u{fffd}')), len))
        }
        '8' | '9' => {
            if delim == Delimiter::Template {
                return Err(LexErrorKind::TemplateOctalEscape);
            }
            if strict {
                return Err(LexErrorKind::InvalidOctalDigit);
            }
            Ok((Some(first), 1))
        }
        other => Ok((Some(other), other.len_utf8())),
    }
}

/// `rest` starts with `u`. Returns the decoded character and the total
/// byte length of the escape, including the leading `u`.
fn scan_unicode_escape(rest: &str) -> Result<(char, usize), LexErrorKind> {
    let after_u = &rest[1..];
    if after_u.starts_with('{') {
        let close = after_u.find('}').ok_or(LexErrorKind::InvalidUnicodeEscapeSequence)?;
        let hex = &after_u[1..close];
        if hex.is_empty() || hex.len() > 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LexErrorKind::InvalidUnicodeEscapeSequence);
        }
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| LexErrorKind::InvalidUnicodeEscapeSequence)?;
        let ch = char::from_u32(code).ok_or(LexErrorKind::InvalidUnicodeEscapeSequence)?;
        Ok((ch, 1 + close + 1))
    } else {
        let hex: String = after_u.chars().take(4).collect();
        if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LexErrorKind::InvalidUnicodeEscapeSequence);
        }
        let code = u32::from_str_radix(&hex, 16).unwrap();
        let ch = char::from_u32(code).ok_or(LexErrorKind::InvalidUnicodeEscapeSequence)?;
        Ok((ch, 1 + 4))
    }
}

/// Entry point used by the identifier scanner for `\uXXXX`/`\u{...}`
/// escapes only (identifiers never contain the other escape forms).
/// `input` must start with `\u`. Returns the decoded character and the
/// total byte length of the escape, including the backslash.
pub fn scan_identifier_unicode_escape(input: &str) -> Result<(char, usize), LexErrorKind> {
    if !input.starts_with("\\u") {
        return Err(LexErrorKind::InvalidUnicodeEscapeSequence);
    }
    let (ch, len) = scan_unicode_escape(&input[1..])?;
    Ok((ch, 1 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_body() {
        let b = scan_body("hello'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "hello");
        assert!(!b.had_escape);
        assert_eq!(b.byte_len, 5);
    }

    #[test]
    fn hex_escape() {
        let b = scan_body("\\x41'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "A");
        assert_eq!(b.byte_len, 4);
    }

    #[test]
    fn unicode_brace_escape() {
        let b = scan_body("\\u{1F600}'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "\u{1F600}");
    }

    #[test]
    fn unicode_fixed_width_escape() {
        let b = scan_body("\\u0041'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "A");
        assert_eq!(b.byte_len, 6);
    }

    #[test]
    fn line_continuation_is_elided() {
        let b = scan_body("a\\\nb'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "ab");
    }

    #[test]
    fn octal_escape_rejected_in_strict_mode() {
        let err = scan_body("\\101'", Delimiter::Single, true).unwrap_err();
        assert_eq!(err, LexErrorKind::InvalidOctalDigit);
    }

    #[test]
    fn octal_escape_allowed_in_sloppy_mode() {
        let b = scan_body("\\101'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "A");
    }

    #[test]
    fn octal_escape_always_rejected_in_templates() {
        let err = scan_body("\\101`", Delimiter::Template, false).unwrap_err();
        assert_eq!(err, LexErrorKind::TemplateOctalEscape);
    }

    #[test]
    fn newline_rejected_in_quoted_string() {
        let err = scan_body("abc\ndef'", Delimiter::Single, false).unwrap_err();
        assert_eq!(err, LexErrorKind::NewlineNotAllowed);
    }

    #[test]
    fn raw_newline_allowed_in_template() {
        let b = scan_body("abc\ndef`", Delimiter::Template, false).unwrap();
        assert_eq!(b.cooked, "abc\ndef");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let err = scan_body("abc", Delimiter::Single, false).unwrap_err();
        assert_eq!(err, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn multibyte_text_is_copied_through_untouched() {
        let b = scan_body("caf\u{e9}'", Delimiter::Single, false).unwrap();
        assert_eq!(b.cooked, "caf\u{e9}");
    }

    #[test]
    fn identifier_unicode_escape_reports_full_byte_length() {
        let (ch, len) = scan_identifier_unicode_escape("\\u0041rest").unwrap();
        assert_eq!(ch, 'A');
        assert_eq!(len, 6);
    }
}
