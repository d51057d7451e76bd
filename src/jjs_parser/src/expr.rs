//! Expression parsing: precedence-climbing over a representative subset
//! of operators, emitting directly into the active frame's
//! [`jjs_bytecode::FunctionEmitter`] rather than building an
//! intermediate expression tree -- the teacher's own expression parsers
//! (e.g. `logical_expression_parser.rs`, `postfix_expression_parser.rs`)
//! are similarly organised one precedence tier per function, each
//! calling the next-tighter tier for its operands.

use jjs_bytecode::BasicOpcode;
use jjs_lexer::{Keyword, Punctuator, TokenKind};

use crate::error::{ParserErrorKind, ParserResult};
use crate::Parser;

#[cfg(feature = "builtin-regexp")]
use jjs_bytecode::{CompiledCodeRecord, CompiledCodeTail, ExtOpcode, FunctionKind, RegexpMeta, StatusFlags};
#[cfg(feature = "builtin-regexp")]
use jjs_literal::LiteralPoolEntry;

/// Binding power of a binary operator; `None` if the token doesn't start
/// one.
fn binary_op(punct: Punctuator) -> Option<(u8, BasicOpcode)> {
    use Punctuator::*;
    match punct {
        EqEqEq => Some((3, BasicOpcode::StrictEq)),
        EqEq => Some((3, BasicOpcode::Eq)),
        Lt => Some((4, BasicOpcode::Lt)),
        Gt => Some((4, BasicOpcode::Gt)),
        Plus => Some((5, BasicOpcode::Add)),
        Minus => Some((5, BasicOpcode::Sub)),
        Star => Some((6, BasicOpcode::Mul)),
        Slash => Some((6, BasicOpcode::Div)),
        Percent => Some((6, BasicOpcode::Mod)),
        _ => None,
    }
}

/// Every pool entry the lexer pushes for a regexp token is `Owned` bytes,
/// never a deferred `SourceSlice` -- see `Lexer::pool`'s doc comment.
#[cfg(feature = "builtin-regexp")]
fn pool_entry_as_string(entry: &LiteralPoolEntry) -> String {
    match entry {
        LiteralPoolEntry::Owned(bytes) => {
            String::from_utf8(bytes.to_vec()).expect("regexp source text is valid utf-8")
        }
        other => unreachable!("regexp pool entries are always Owned, got {other:?}"),
    }
}

impl<'src> Parser<'src> {
    /// Parses an assignment expression: the widest tier, covering plain
    /// `=` onto an identifier target (spec's register/ident write path
    /// via `AssignSetIdent`/`MovIdent`) before falling through to
    /// binary expressions.
    pub(crate) fn parse_assignment_expr(&mut self) -> ParserResult<()> {
        if let TokenKind::Identifier = self.current.kind {
            if self.peek_is_assignment_start()? {
                let name = self.current_text();
                self.bump()?;
                self.expect_punct(Punctuator::Eq)?;
                self.parse_assignment_expr()?;
                let register = self.declare_or_resolve(&name);
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::MovIdent, register as u8);
                return Ok(());
            }
        }
        self.parse_binary_expr(0)
    }

    /// Disambiguates `a = b` from `a + b` with the one-token-of-extra-
    /// lookahead buffer `Parser::peek` provides, without consuming the
    /// identifier itself.
    fn peek_is_assignment_start(&mut self) -> ParserResult<bool> {
        Ok(matches!(self.peek()?.kind, TokenKind::Punctuator(Punctuator::Eq)))
    }

    fn parse_binary_expr(&mut self, min_power: u8) -> ParserResult<()> {
        self.parse_unary_expr()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Punctuator(p) => binary_op(p),
                _ => None,
            };
            let Some((power, opcode)) = op else { break };
            if power < min_power {
                break;
            }
            self.bump()?;
            self.parse_binary_expr(power + 1)?;
            self.current_frame_mut().emitter.emit_simple(opcode);
        }
        Ok(())
    }

    fn parse_unary_expr(&mut self) -> ParserResult<()> {
        match self.current.kind {
            TokenKind::Punctuator(Punctuator::Bang) => {
                self.bump()?;
                self.parse_unary_expr()?;
                self.current_frame_mut().emitter.emit_simple(BasicOpcode::Not);
                Ok(())
            }
            TokenKind::Punctuator(Punctuator::Minus) => {
                self.bump()?;
                self.parse_unary_expr()?;
                self.current_frame_mut().emitter.emit_simple(BasicOpcode::Neg);
                Ok(())
            }
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> ParserResult<()> {
        self.parse_call_expr()?;
        match self.current.kind {
            TokenKind::Punctuator(Punctuator::PlusPlus) => {
                self.bump()?;
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::PostIncr, 0);
            }
            TokenKind::Punctuator(Punctuator::MinusMinus) => {
                self.bump()?;
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::PostDecr, 0);
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_call_expr(&mut self) -> ParserResult<()> {
        self.parse_primary_expr()?;
        while matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LParen)) {
            self.bump()?;
            let mut argc: u32 = 0;
            if !matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RParen)) {
                loop {
                    self.parse_assignment_expr()?;
                    argc += 1;
                    if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Comma)) {
                        self.bump()?;
                        continue;
                    }
                    break;
                }
            }
            self.expect_punct(Punctuator::RParen)?;
            if argc > u8::MAX as u32 {
                return Err(self.error_here(ParserErrorKind::from(jjs_bytecode::EmitError::ArgumentLimitReached)));
            }
            self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::Call, argc as u8);
        }
        Ok(())
    }

    fn parse_primary_expr(&mut self) -> ParserResult<()> {
        match self.current.kind.clone() {
            TokenKind::NumericLiteral { literal, .. } => {
                self.bump()?;
                self.current_frame_mut().emitter.emit_push_literal(literal.0 as u16)?;
                Ok(())
            }
            TokenKind::StringLiteral { literal } => {
                self.bump()?;
                self.current_frame_mut().emitter.emit_push_literal(literal.0 as u16)?;
                Ok(())
            }
            TokenKind::Identifier => {
                let name = self.current_text();
                self.bump()?;
                let register = self.declare_or_resolve(&name);
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::PushRegister, register as u8);
                Ok(())
            }
            TokenKind::Punctuator(Punctuator::LParen) => {
                self.bump()?;
                self.parse_assignment_expr()?;
                self.expect_punct(Punctuator::RParen)?;
                Ok(())
            }
            TokenKind::RegexpLiteral { pattern, flags } => {
                self.bump()?;
                self.parse_regexp_literal(pattern, flags)
            }
            TokenKind::PrivateIdentifier => {
                // Checked before consuming the token so a rejection's
                // span underlines the private name itself, not whatever
                // follows it.
                let name = self.current_text();
                if !self.privates.is_declared(&name) {
                    return Err(self.error_here(ParserErrorKind::UndeclaredPrivateField));
                }
                self.bump()?;
                // No member-access grammar exists in this parser to
                // attach the private reference to a receiver (`obj.#x`),
                // so a validated reference just pushes a placeholder
                // value -- the private name's *existence* is what this
                // parser's byte-code can express, not its resolution
                // against a concrete object.
                self.current_frame_mut().emitter.emit_simple(BasicOpcode::PushUndefined);
                Ok(())
            }
            TokenKind::Keyword(Keyword::Class) => self.parse_class_expression(),
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    /// Compiles a regexp literal token into its own leaf record (spec
    /// §4.6/§4.7: a regexp leaf is a `compiled_code` whose `regexp` field
    /// is set rather than `None`) and pushes a reference to it, the same
    /// way a closure literal would push `EXT_PUSH_CLOSURE` onto the
    /// evaluation stack.
    #[cfg(feature = "builtin-regexp")]
    fn parse_regexp_literal(&mut self, pattern: jjs_literal::PoolIndex, flags: jjs_literal::PoolIndex) -> ParserResult<()> {
        let pattern_text = pool_entry_as_string(self.lexer.pool().get(pattern));
        let flags_text = pool_entry_as_string(self.lexer.pool().get(flags));

        let compiled = jjs_regexp::compile_pattern(&pattern_text, &flags_text)
            .map_err(|e| self.error_here(ParserErrorKind::from(e)))?;

        let record = CompiledCodeRecord {
            kind: FunctionKind::Normal,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 0,
            regexp: Some(RegexpMeta {
                // Patched once the pattern text is interned in `finalize_literals`.
                pattern: jjs_literal::StringId(u32::MAX),
                flags: compiled.flags.bits(),
            }),
            literals: Vec::new(),
            bytecode: compiled.bytecode,
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let idx = self.script.push_function(record);
        self.pending_regexps.insert(idx.0, pattern_text);
        self.current_frame_mut().nested.push(idx);
        self.current_frame_mut().emitter.emit_ext_literal(ExtOpcode::PushClosure, idx);
        Ok(())
    }

    #[cfg(not(feature = "builtin-regexp"))]
    fn parse_regexp_literal(
        &mut self,
        _pattern: jjs_literal::PoolIndex,
        _flags: jjs_literal::PoolIndex,
    ) -> ParserResult<()> {
        Err(self.error_here(ParserErrorKind::NotSupported { feature: "regexp literals" }))
    }

    /// Resolves `name` against the active frame's scope stack, declaring
    /// it in the function's outermost scope if unbound -- modelling the
    /// sloppy-mode "first reference creates a binding" dynamic-global
    /// case without a separate global-lookup opcode.
    fn declare_or_resolve(&mut self, name: &str) -> u16 {
        if let Some(register) = self.current_frame().resolve(name) {
            return register;
        }
        let frame = self.current_frame_mut();
        let outer = frame.scopes.first_mut().expect("frame always has an outer scope");
        if let Some(register) = outer.get(name) {
            return register;
        }
        let register = frame.emitter.new_register();
        frame.scopes[0].declare(name, register.0);
        register.0
    }
}
