//! Module bookkeeping (spec §4.5): import/export lists keyed by
//! specifier, duplicate-name detection, and `import.meta` gating.
//! Deliberately narrow -- named imports/exports and `export default`
//! cover the common surface the rest of this parser can exercise, not
//! every module-grammar production (no `export * as ns`, no dynamic
//! `import()`).

use jjs_lexer::{Keyword, Punctuator, TokenKind};

use crate::error::{ParserErrorKind, ParserResult};
use crate::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_import_declaration(&mut self) -> ParserResult<()> {
        if !self.options.is_module {
            return Err(self.error_here(ParserErrorKind::ImportMetaOutsideModule));
        }
        self.bump()?; // `import`

        // `import.meta` as a standalone expression statement.
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Dot)) {
            self.bump()?;
            self.expect_keyword_or_identifier("meta")?;
            self.current_frame_mut().emitter.emit_push_literal(0)?;
            self.current_frame_mut().emitter.emit_simple(jjs_bytecode::BasicOpcode::Pop);
            self.consume_optional_semicolon();
            return Ok(());
        }

        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LBrace)) {
            self.bump()?;
            loop {
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RBrace)) {
                    break;
                }
                let name = self.expect_binding_identifier()?;
                self.declare_import(&name)?;
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Comma)) {
                    self.bump()?;
                    continue;
                }
                break;
            }
            self.expect_punct(Punctuator::RBrace)?;
        } else if matches!(self.current.kind, TokenKind::Identifier) {
            let name = self.current_text();
            self.bump()?;
            self.declare_import(&name)?;
        }

        self.expect_keyword_or_identifier("from")?;
        self.expect_string_literal()?;
        self.consume_optional_semicolon();
        Ok(())
    }

    pub(crate) fn parse_export_declaration(&mut self) -> ParserResult<()> {
        self.bump()?; // `export`
        if matches!(self.current.kind, TokenKind::Keyword(Keyword::Default)) {
            self.bump()?;
            self.parse_assignment_expr()?;
            self.current_frame_mut().emitter.emit_simple(jjs_bytecode::BasicOpcode::Pop);
            self.consume_optional_semicolon();
            self.declare_export("default")?;
            return Ok(());
        }
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LBrace)) {
            self.bump()?;
            loop {
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RBrace)) {
                    break;
                }
                let name = self.expect_binding_identifier()?;
                self.declare_export(&name)?;
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Comma)) {
                    self.bump()?;
                    continue;
                }
                break;
            }
            self.expect_punct(Punctuator::RBrace)?;
            self.consume_optional_semicolon();
            return Ok(());
        }
        // `export let x = ...;` / `export function f() {}`
        self.parse_statement()
    }

    fn declare_import(&mut self, name: &str) -> ParserResult<()> {
        if !self.imports.insert(name.to_string()) {
            return Err(self.error_here(ParserErrorKind::DuplicatedImportIdentifier));
        }
        self.current_frame_mut().declare(name);
        Ok(())
    }

    fn declare_export(&mut self, name: &str) -> ParserResult<()> {
        if !self.exports.insert(name.to_string()) {
            return Err(self.error_here(ParserErrorKind::DuplicatedExportIdentifier));
        }
        Ok(())
    }

    fn expect_binding_identifier(&mut self) -> ParserResult<String> {
        match self.current.kind {
            TokenKind::Identifier => {
                let name = self.current_text();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    fn expect_keyword_or_identifier(&mut self, text: &str) -> ParserResult<()> {
        let matches_text = self.current_text() == text;
        if !matches_text {
            return Err(self.error_here(ParserErrorKind::UnexpectedToken));
        }
        self.bump()?;
        Ok(())
    }

    fn expect_string_literal(&mut self) -> ParserResult<()> {
        match self.current.kind {
            TokenKind::StringLiteral { .. } => {
                self.bump()?;
                Ok(())
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    fn consume_optional_semicolon(&mut self) {
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Semicolon)) {
            let _ = self.bump();
        }
    }
}
