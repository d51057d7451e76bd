//! Function compilation (spec §4.5): saves the outer emission state,
//! installs a fresh `ParserFrame`, parses parameters then body, and
//! hands the finished `CompiledCodeRecord` back to the caller as a
//! nested-function literal slot.

use jjs_bytecode::{BasicOpcode, CompiledCodeRecord, CompiledCodeTail, FunctionKind, StatusFlags};
use jjs_lexer::{Punctuator, TokenKind};

use crate::context::ParserFrame;
use crate::error::{ParserErrorKind, ParserResult};
use crate::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_function_declaration(&mut self) -> ParserResult<()> {
        self.parse_function_declaration_impl(false)
    }

    /// Entry point for `async function name(...) {}`, reached after the
    /// `async` keyword has already been peeked (not yet consumed) by the
    /// statement dispatcher.
    pub(crate) fn parse_async_function_declaration(&mut self) -> ParserResult<()> {
        self.bump()?; // `async`
        self.parse_function_declaration_impl(true)
    }

    fn parse_function_declaration_impl(&mut self, is_async: bool) -> ParserResult<()> {
        self.bump()?; // `function`
        self.scanner_expect_function_boundary()?;
        let is_generator = matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Star));
        if is_generator {
            self.bump()?;
        }
        let name = match self.current.kind {
            TokenKind::Identifier => {
                let n = self.current_text();
                self.bump()?;
                Some(n)
            }
            _ => None,
        };
        // The declaration's own name binds a register in the *enclosing*
        // frame before the body is parsed, so recursive references and
        // forward calls within a sibling statement resolve.
        if let Some(ref n) = name {
            self.current_frame_mut().declare(n);
        }
        let kind = match (is_async, is_generator) {
            (true, true) => FunctionKind::AsyncGenerator,
            (true, false) => FunctionKind::Async,
            (false, true) => FunctionKind::Generator,
            (false, false) => FunctionKind::Normal,
        };
        let func_index = self.parse_function_rest(kind, name)?;
        self.current_frame_mut().nested.push(func_index);
        Ok(())
    }

    /// Parses an arrow function's `(params)` or single bare identifier
    /// head plus `=> body`, where `body` is either a block (scanned and
    /// emitted exactly like an ordinary function body) or a single
    /// expression whose value is implicitly returned. The caller has
    /// already determined this is an arrow (by lookahead past a
    /// parenthesised parameter list, or a bare identifier immediately
    /// followed by `=>`) before calling in.
    pub(crate) fn parse_arrow_function(&mut self, is_async: bool, single_param: Option<String>) -> ParserResult<jjs_bytecode::FuncIndex> {
        let kind = if is_async { FunctionKind::Async } else { FunctionKind::Arrow };
        self.frames.push(ParserFrame::new(kind, StatusFlags::empty()));
        if let Some(name) = single_param {
            self.declare_parameter(&name, false)?;
        } else {
            self.parse_parameter_list()?;
        }
        self.expect_punct(Punctuator::Arrow)?;
        // Async functions wrap the whole body in an implicit try/finally
        // so that synchronous exceptions become rejected promises (spec
        // §4.5): `EXT_TRY_CREATE_CONTEXT` prefix here, `EXT_ASYNC_EXIT`
        // suffix once the body's `RETURN_FUNCTION_END` is emitted below.
        if is_async {
            self.current_frame_mut().emitter.emit_ext(jjs_bytecode::ExtOpcode::TryCreateContext);
        }
        if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::LBrace)) {
            self.bump()?;
            self.scanner_rescan_current_frame(self.current.range.start)?;
            self.parse_statement_list(Some(Punctuator::RBrace))?;
            self.expect_punct(Punctuator::RBrace)?;
        } else {
            self.parse_assignment_expr()?;
            self.current_frame_mut().emitter.emit_simple(BasicOpcode::Return);
        }

        let mut frame = self.frames.pop().expect("parse_arrow_function always pushed a frame");
        frame.emitter.emit_simple(BasicOpcode::ReturnFunctionEnd);
        if is_async {
            frame.emitter.emit_ext(jjs_bytecode::ExtOpcode::AsyncExit);
        }
        let register_end = frame.emitter.register_count();
        let (bytecode, literal_patches) =
            frame.emitter.resolve_branches().map_err(|e| self.error_here(ParserErrorKind::from(e)))?;
        let record = CompiledCodeRecord {
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
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let idx = self.script.push_function(record);
        self.nested_by_func.insert(idx.0, frame.nested);
        self.pending_names.insert(idx.0, None);
        self.literal_patch_offsets.insert(idx.0, literal_patches);
        Ok(idx)
    }

    /// Parses `(params) { body }` with a fresh frame already installed
    /// by the caller's `function`/`=>` keyword handling, returning the
    /// finished record's arena index.
    pub(crate) fn parse_function_rest(
        &mut self,
        kind: FunctionKind,
        name: Option<String>,
    ) -> ParserResult<jjs_bytecode::FuncIndex> {
        let is_async = matches!(kind, FunctionKind::Async | FunctionKind::AsyncGenerator);
        self.frames.push(ParserFrame::new(kind, StatusFlags::empty()));
        self.parse_parameter_list()?;
        self.expect_punct(Punctuator::LBrace)?;
        self.scanner_rescan_current_frame(self.current.range.start)?;
        // Async functions wrap the whole body in an implicit try/finally
        // so that synchronous exceptions become rejected promises (spec
        // §4.5).
        if is_async {
            self.current_frame_mut().emitter.emit_ext(jjs_bytecode::ExtOpcode::TryCreateContext);
        }
        self.parse_statement_list(Some(Punctuator::RBrace))?;
        self.expect_punct(Punctuator::RBrace)?;

        let mut frame = self.frames.pop().expect("parse_function_rest always pushed a frame");
        frame.emitter.emit_simple(BasicOpcode::ReturnFunctionEnd);
        if is_async {
            frame.emitter.emit_ext(jjs_bytecode::ExtOpcode::AsyncExit);
        }
        let register_end = frame.emitter.register_count();
        let (bytecode, literal_patches) =
            frame.emitter.resolve_branches().map_err(|e| self.error_here(ParserErrorKind::from(e)))?;

        let record = CompiledCodeRecord {
            kind: frame.kind,
            flags: frame.flags,
            stack_limit: 0,
            register_end,
            argument_end: register_end,
            ident_end: register_end,
            // Patched in the finalisation pass once the whole source has
            // been scanned and the literal pool is complete (see
            // `Parser::finish`).
            const_literal_end: 0,
            literal_end: 0,
            regexp: None,
            literals: Vec::new(),
            bytecode,
            tail: CompiledCodeTail { function_name: None, ..CompiledCodeTail::default() },
            refs: 1,
        };
        let idx = self.script.push_function(record);
        self.nested_by_func.insert(idx.0, frame.nested);
        self.pending_names.insert(idx.0, name);
        self.literal_patch_offsets.insert(idx.0, literal_patches);
        Ok(idx)
    }

    fn parse_parameter_list(&mut self) -> ParserResult<()> {
        self.expect_punct(Punctuator::LParen)?;
        let mut has_complex = false;
        if !matches!(self.current.kind, TokenKind::Punctuator(Punctuator::RParen)) {
            loop {
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::DotDotDot)) {
                    self.bump()?;
                    has_complex = true;
                    let name = self.expect_identifier()?;
                    self.declare_parameter(&name, has_complex)?;
                    let register = self.current_frame().resolve(&name).expect("just declared");
                    self.current_frame_mut().emitter.emit_simple(BasicOpcode::PushRestObject);
                    self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::MovIdent, register as u8);
                    break;
                }
                let name = self.expect_identifier()?;
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Eq)) {
                    has_complex = true;
                    self.bump()?;
                    self.parse_assignment_expr()?;
                    let register = self.declare_parameter(&name, true)?;
                    self.current_frame_mut().emitter.emit_byte_arg(BasicOpcode::MovIdent, register as u8);
                } else {
                    self.declare_parameter(&name, has_complex)?;
                }
                if matches!(self.current.kind, TokenKind::Punctuator(Punctuator::Comma)) {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect_punct(Punctuator::RParen)?;
        if has_complex {
            self.current_frame_mut().flags |= StatusFlags::LEXICAL_BLOCK_NEEDED;
            self.current_frame_mut().has_complex_params = true;
        }
        Ok(())
    }

    fn declare_parameter(&mut self, name: &str, complex_so_far: bool) -> ParserResult<u16> {
        let strict = self.options.strict || self.current_frame().flags.contains(StatusFlags::STRICT);
        let frame = self.current_frame_mut();
        let is_duplicate = !frame.param_names.insert(name.to_string());
        if is_duplicate && (complex_so_far || frame.has_complex_params || strict) {
            return Err(self.error_here(ParserErrorKind::DuplicatedParameterName));
        }
        Ok(frame.declare(name))
    }

    fn expect_identifier(&mut self) -> ParserResult<String> {
        match self.current.kind {
            TokenKind::Identifier => {
                let name = self.current_text();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }
}
