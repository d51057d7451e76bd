//! Statement parsing: declarations, blocks, and control flow, each
//! consulting the scanner queue the way `parser_post_processing`'s
//! step 2 ("assign final dense indices") presumes the pre-pass already
//! ran (spec §4.5).

use jjs_bytecode::BasicOpcode;
use jjs_lexer::{Keyword, Punctuator, TokenKind};

use crate::error::{ParserErrorKind, ParserResult};
use crate::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_statement_list(&mut self, terminator: Option<Punctuator>) -> ParserResult<()> {
        loop {
            if matches!(self.current.kind, TokenKind::Eof) {
                break;
            }
            if let Some(term) = terminator {
                if matches!(self.current.kind, TokenKind::Punctuator(p) if p == term) {
                    break;
                }
            }
            self.parse_statement()?;
        }
        Ok(())
    }

    pub(crate) fn parse_statement(&mut self) -> ParserResult<()> {
        match self.current.kind {
            TokenKind::Punctuator(Punctuator::Semicolon) => {
                self.bump()?;
                Ok(())
            }
            TokenKind::Punctuator(Punctuator::LBrace) => self.parse_block_statement(),
            TokenKind::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => self.parse_variable_statement(),
            TokenKind::Keyword(Keyword::Function) => self.parse_function_declaration(),
            TokenKind::Keyword(Keyword::Class) => self.parse_class_declaration(),
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Import) => self.parse_import_declaration(),
            TokenKind::Keyword(Keyword::Export) => self.parse_export_declaration(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block_statement(&mut self) -> ParserResult<()> {
        self.expect_punct(Punctuator::LBrace)?;
        self.current_frame_mut().push_block();
        let result = self.parse_statement_list(Some(Punctuator::RBrace));
        self.current_frame_mut().pop_block();
        result?;
        self.expect_punct(Punctuator::RBrace)?;
        Ok(())
    }

    fn parse_variable_statement(&mut self) -> ParserResult<()> {
        self.bump()?; // `var` | `let` | `const`
        loop {
            let name = match self.current.kind {
                TokenKind::Identifier => self.current_text(),
                _ => return Err(self.error_here(ParserErrorKind::UnexpectedToken)),
            };
            self.bump()?;
            let first_binding_of_scope = !self.current_frame().declared_in_current_scope(&name);
            if !first_binding_of_scope {
                return Err(self.error_here(ParserErrorKind::DuplicatedLexicalDeclaration));
            }
            let register = self.current_frame_mut().declare(&name);
            self.scanner_note_declaration(&name)?;
            if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Eq)) {
                self.bump()?;
                self.parse_assignment_expr()?;
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::MovIdent, register as u8);
            }
            if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Comma)) {
                self.bump()?;
                continue;
            }
            break;
        }
        self.consume_semicolon()?;
        Ok(())
    }

    fn parse_if_statement(&mut self) -> ParserResult<()> {
        self.bump()?;
        self.expect_punct(Punctuator::LParen)?;
        self.parse_assignment_expr()?;
        self.expect_punct(Punctuator::RParen)?;
        let else_label = self.current_frame_mut().emitter.new_label();
        self.current_frame_mut().emitter.emit_forward_branch(BasicOpcode::JumpIfFalse, else_label)?;
        self.parse_statement()?;
        if matches!(self.current.kind, TokenKind::Keyword(Keyword::Else)) {
            let end_label = self.current_frame_mut().emitter.new_label();
            self.current_frame_mut().emitter.emit_forward_branch(BasicOpcode::Jump, end_label)?;
            self.current_frame_mut().emitter.bind_label(else_label);
            self.bump()?;
            self.parse_statement()?;
            self.current_frame_mut().emitter.bind_label(end_label);
        } else {
            self.current_frame_mut().emitter.bind_label(else_label);
        }
        Ok(())
    }

    fn parse_while_statement(&mut self) -> ParserResult<()> {
        self.bump()?;
        let top_label = self.current_frame_mut().emitter.new_label();
        self.current_frame_mut().emitter.bind_label(top_label);
        self.expect_punct(Punctuator::LParen)?;
        self.parse_assignment_expr()?;
        self.expect_punct(Punctuator::RParen)?;
        let end_label = self.current_frame_mut().emitter.new_label();
        self.current_frame_mut().emitter.emit_forward_branch(BasicOpcode::JumpIfFalse, end_label)?;
        self.parse_statement()?;
        self.current_frame_mut().emitter.emit_backward_branch(BasicOpcode::JumpBackward, top_label)?;
        self.current_frame_mut().emitter.bind_label(end_label);
        Ok(())
    }

    fn parse_return_statement(&mut self) -> ParserResult<()> {
        self.bump()?;
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Semicolon) | TokenKind::Eof)
            || matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RBrace))
        {
            self.current_frame_mut().emitter.emit_push_literal(0)?;
        } else {
            self.parse_assignment_expr()?;
        }
        self.current_frame_mut().emitter.emit_simple(BasicOpcode::Return);
        self.consume_semicolon()?;
        Ok(())
    }

    fn parse_expression_statement(&mut self) -> ParserResult<()> {
        self.parse_assignment_expr()?;
        self.current_frame_mut().emitter.rewrite_post_to_pre_if_unused();
        self.current_frame_mut().emitter.emit_simple(BasicOpcode::Pop);
        self.consume_semicolon()?;
        Ok(())
    }

    fn consume_semicolon(&mut self) -> ParserResult<()> {
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Semicolon)) {
            self.bump()?;
        }
        // ASI: a newline, `}`, or EOF also terminates a statement (spec
        // §4.3's `PRECEDED_BY_NEWLINE` flag drives this in the real
        // grammar); accepted permissively here.
        Ok(())
    }
}
