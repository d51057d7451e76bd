//! Parser (spec §4.5): drives the lexer, emits byte-code, and manages
//! the compile-time symbol environment. Generalises the teacher's
//! `bsharp_parser::facade::Parser` -- there, a thin wrapper over a
//! `nom` grammar producing an AST; here, an emitting recursive-descent
//! parser producing byte-code directly, saving/restoring per-function
//! state the way `bsharp_parser::parse_mode` saves/restores its own
//! thread-local flag across nested parses.

mod class;
mod context;
mod expr;
mod function;
mod module;
pub mod options;
mod scanner;
mod stmt;

pub mod error;

use std::collections::HashMap;

use jjs_bytecode::{FuncIndex, FunctionKind, LiteralSlot, ScriptRecord, StatusFlags};
use jjs_lexer::{Lexer, LexerContext, Punctuator, Token, TokenKind};
use jjs_literal::{LiteralPoolEntry, LiteralStorage};

use context::{LoopLabelStack, ParserFrame, PrivateContextStack};
use error::{ParserError, ParserErrorKind, ParserResult};
pub use options::ParseOptions;

pub struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    current: Token,
    peeked: Option<Token>,
    options: ParseOptions,
    frames: Vec<ParserFrame>,
    script: ScriptRecord,
    imports: std::collections::HashSet<String>,
    exports: std::collections::HashSet<String>,
    nested_by_func: HashMap<u32, Vec<FuncIndex>>,
    pending_names: HashMap<u32, Option<String>>,
    /// Regexp leaves pushed during expression parsing (spec §4.6):
    /// pattern source text, keyed by the leaf's own arena index. Flags
    /// are already baked into the leaf's `regexp` field at push time;
    /// only the pattern still needs interning into the shared
    /// `LiteralStorage`, which doesn't exist until `finalize_literals`.
    pending_regexps: HashMap<u32, String>,
    /// `(byte offset, nested arena index)` pairs for each record's
    /// `emit_ext_literal` patch sites (spec §4.4), keyed by the record's
    /// own arena index. Patched into `bytecode` by `finalize_literals`
    /// once the nested slot's final literal-table index is known.
    literal_patch_offsets: HashMap<u32, Vec<(usize, FuncIndex)>>,
    /// `#name`s visible to the private-field reference currently being
    /// parsed, one frame per enclosing class body.
    privates: PrivateContextStack,
    /// Enclosing iteration/switch/labeled statements, searched by
    /// `break`/`continue` to find their jump target.
    loop_labels: LoopLabelStack,
}

/// A finished parse: the compiled-code tree plus the engine-global
/// [`LiteralStorage`] its `literals` slots were interned into (spec
/// §3: literal storage outlives any single script record, so it
/// travels alongside rather than inside one).
pub struct ParsedScript {
    pub script: ScriptRecord,
    pub storage: LiteralStorage,
}

/// Parses a whole program, returning its compiled-code tree and literal
/// storage. The one public entry point this crate exposes; `jjs_parser::parse`
/// is the function the root `jjs` crate's `parse` API wraps directly.
pub fn parse(source: &str, options: ParseOptions) -> ParserResult<ParsedScript> {
    let mut parser = Parser::new(source, options)?;
    parser.run()
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, options: ParseOptions) -> ParserResult<Parser<'src>> {
        let mut lexer = Lexer::new(source);
        let ctx = LexerContext { strict_mode: options.strict, in_module: options.is_module, ..Default::default() };
        let current = lexer.next_token(ctx).map_err(|e| ParserError {
            kind: ParserErrorKind::from(e),
            span: (0usize, 0).into(),
        })?;
        let mut root = ParserFrame::new(FunctionKind::Script, StatusFlags::empty());
        let infos = scanner::scan(source, 0, ctx)?;
        root.scanner = scanner::ScannerQueue::new(infos);
        Ok(Parser {
            source,
            lexer,
            current,
            peeked: None,
            options,
            frames: vec![root],
            script: ScriptRecord::default(),
            imports: Default::default(),
            exports: Default::default(),
            nested_by_func: HashMap::new(),
            pending_names: HashMap::new(),
            pending_regexps: HashMap::new(),
            literal_patch_offsets: HashMap::new(),
            privates: PrivateContextStack::default(),
            loop_labels: LoopLabelStack::default(),
        })
    }

    fn run(mut self) -> ParserResult<ParsedScript> {
        self.parse_statement_list(None)?;
        let mut frame = self.frames.pop().expect("the root frame is always present");
        frame.emitter.emit_simple(jjs_bytecode::BasicOpcode::ReturnFunctionEnd);
        let register_end = frame.emitter.register_count();
        let (bytecode, literal_patches) = frame.emitter.resolve_branches().map_err(|e| ParserError {
            kind: ParserErrorKind::from(e),
            span: (0usize, 0).into(),
        })?;
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
        let entry = self.script.push_function(record);
        self.nested_by_func.insert(entry.0, frame.nested);
        self.literal_patch_offsets.insert(entry.0, literal_patches);
        let mut script = self.script;
        script.entry = entry;
        let storage = finalize_literals(
            &mut script,
            self.lexer.into_pool(),
            self.source,
            &self.nested_by_func,
            &self.pending_names,
            &self.pending_regexps,
            &self.literal_patch_offsets,
        )?;
        Ok(ParsedScript { script, storage })
    }

    // -- token cursor --------------------------------------------------

    fn lexer_ctx(&self) -> LexerContext {
        let frame = self.frames.last().expect("at least one frame is always active");
        LexerContext {
            strict_mode: self.options.strict || frame.flags.contains(StatusFlags::STRICT),
            in_async_scope: matches!(frame.kind, FunctionKind::Async | FunctionKind::AsyncGenerator),
            in_generator_scope: matches!(frame.kind, FunctionKind::Generator | FunctionKind::AsyncGenerator),
            in_module: self.options.is_module,
            regexp_allowed: !matches!(
                self.current.kind,
                TokenKind::Identifier
                    | TokenKind::NumericLiteral { .. }
                    | TokenKind::StringLiteral { .. }
                    | TokenKind::Punctuator(Punctuator::RParen)
                    | TokenKind::Punctuator(Punctuator::RBracket)
            ),
        }
    }

    fn lex_next(&mut self, ctx: LexerContext) -> ParserResult<Token> {
        self.lexer.next_token(ctx).map_err(|e| self.error_here(ParserErrorKind::from(e)))
    }

    fn bump(&mut self) -> ParserResult<Token> {
        let next = match self.peeked.take() {
            Some(t) => t,
            None => {
                let ctx = self.lexer_ctx();
                self.lex_next(ctx)?
            }
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek(&mut self) -> ParserResult<&Token> {
        if self.peeked.is_none() {
            let ctx = self.lexer_ctx();
            let t = self.lex_next(ctx)?;
            self.peeked = Some(t);
        }
        Ok(self.peeked.as_ref().expect("just inserted"))
    }

    fn current_text(&self) -> String {
        self.current.range.slice(self.source).to_string()
    }

    fn expect_punct(&mut self, punct: Punctuator) -> ParserResult<()> {
        match self.current.kind {
            TokenKind::Punctuator(p) if p == punct => {
                self.bump()?;
                Ok(())
            }
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken)),
        }
    }

    fn error_here(&self, kind: ParserErrorKind) -> ParserError {
        let start = self.current.range.start as usize;
        let len = self.current.range.len() as usize;
        ParserError { kind, span: (start, len).into() }
    }

    fn current_frame(&self) -> &ParserFrame {
        self.frames.last().expect("at least one frame is always active")
    }

    fn current_frame_mut(&mut self) -> &mut ParserFrame {
        self.frames.last_mut().expect("at least one frame is always active")
    }

    fn scanner_expect_function_boundary(&mut self) -> ParserResult<()> {
        self.current_frame_mut().scanner.expect_function_boundary()
    }

    fn scanner_expect_class_boundary(&mut self) -> ParserResult<()> {
        self.current_frame_mut().scanner.expect_class_boundary()
    }

    fn scanner_note_declaration(&mut self, name: &str) -> ParserResult<()> {
        self.current_frame_mut().scanner.note_declaration(name)
    }

    /// Runs the scanner pre-pass over a freshly pushed frame's own body,
    /// starting right after its opening `{` -- `scanner::scan`'s
    /// brace-depth tracking then matches the function's own closing
    /// brace the same way the root frame's scan matches end of input.
    /// Without this, every nested frame would start with an empty queue
    /// and its first `function` declaration would immediately mismatch.
    fn scanner_rescan_current_frame(&mut self, body_start: u32) -> ParserResult<()> {
        let ctx = self.lexer_ctx();
        let infos = scanner::scan(self.source, body_start, ctx)?;
        self.current_frame_mut().scanner = scanner::ScannerQueue::new(infos);
        Ok(())
    }
}

/// Post-processing step 3 (spec §4.5): "assign final dense indices to
/// identifiers, constants, and nested compiled-code". Runs once, after
/// the whole source has been consumed and the lexer's literal pool is
/// final, patching every record pushed during parsing with its literal
/// table.
fn finalize_literals(
    script: &mut ScriptRecord,
    mut pool: jjs_literal::LiteralPool,
    source: &str,
    nested_by_func: &HashMap<u32, Vec<FuncIndex>>,
    pending_names: &HashMap<u32, Option<String>>,
    pending_regexps: &HashMap<u32, String>,
    literal_patch_offsets: &HashMap<u32, Vec<(usize, FuncIndex)>>,
) -> ParserResult<LiteralStorage> {
    pool.finish(source).map_err(|e| ParserError {
        kind: ParserErrorKind::Lex(e.to_string()),
        span: (0usize, 0).into(),
    })?;
    let mut storage = LiteralStorage::new();
    let mut shared = Vec::with_capacity(pool.len());
    for entry in pool.entries() {
        let slot = match entry {
            LiteralPoolEntry::Owned(bytes) => {
                LiteralSlot::String(storage.find_or_create_string(bytes).expect("interning never fails here"))
            }
            LiteralPoolEntry::SourceSlice { .. } => {
                unreachable!("pool.finish() resolved every source slice above")
            }
            LiteralPoolEntry::Number(n) => match storage.find_or_create_number(*n) {
                jjs_literal::NumberLiteral::Direct(v) => LiteralSlot::SmallInt(v),
                jjs_literal::NumberLiteral::Heap(v) => {
                    LiteralSlot::HeapNumber(storage.number_id_of(v).expect("just interned"))
                }
            },
            LiteralPoolEntry::Bigint { negative, digits } => {
                LiteralSlot::BigInt(storage.find_or_create_bigint(*negative, digits.clone()))
            }
        };
        shared.push(slot);
    }

    // Precomputed before the mutable iteration below so a nested slot's
    // kind (ordinary function vs. regexp leaf) can be read without
    // fighting the borrow checker over the same `functions` vec.
    let regexp_leaves: std::collections::HashSet<u32> = script
        .functions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.regexp.is_some())
        .map(|(i, _)| i as u32)
        .collect();

    let const_literal_end = shared.len() as u16;
    for (idx, record) in script.functions.iter_mut().enumerate() {
        if let Some(pattern) = pending_regexps.get(&(idx as u32)) {
            if let Some(meta) = record.regexp.as_mut() {
                meta.pattern =
                    storage.find_or_create_string(pattern.as_bytes()).expect("interning never fails here");
            }
        }
        record.literals = shared.clone();
        record.const_literal_end = const_literal_end;
        if let Some(nested) = nested_by_func.get(&(idx as u32)) {
            for func in nested {
                let slot = if regexp_leaves.contains(&func.0) {
                    LiteralSlot::Regexp(*func)
                } else {
                    LiteralSlot::CompiledCode(*func)
                };
                record.literals.push(slot);
            }
        }
        record.literal_end = record.literals.len() as u16;
        if let Some(Some(name)) = pending_names.get(&(idx as u32)) {
            record.tail.function_name =
                Some(storage.find_or_create_string(name.as_bytes()).expect("interning never fails here"));
        }
        if let Some(patches) = literal_patch_offsets.get(&(idx as u32)) {
            let nested = nested_by_func.get(&(idx as u32)).map(Vec::as_slice).unwrap_or_default();
            for &(byte_offset, target) in patches {
                let position = nested
                    .iter()
                    .position(|n| *n == target)
                    .expect("emit_ext_literal's target is always pushed into this frame's nested list");
                let literal_index = const_literal_end + position as u16;
                record.bytecode[byte_offset] = (literal_index >> 8) as u8;
                record.bytecode[byte_offset + 1] = (literal_index & 0xff) as u8;
            }
        }
    }
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use error::ParserErrorKind;

    fn parse_ok(source: &str) -> ScriptRecord {
        parse(source, ParseOptions::default()).expect("expected source to parse").script
    }

    #[test]
    fn declaration_and_arithmetic_emit_a_non_empty_entry_record() {
        let script = parse_ok("let x = 1 + 2;");
        let entry = &script.functions[script.entry.0 as usize];
        assert!(!entry.bytecode.is_empty());
        assert_eq!(entry.kind, FunctionKind::Script);
    }

    #[test]
    fn nested_function_declaration_is_recorded_in_the_arena() {
        let script = parse_ok("function add(a, b) { return a + b; } add(1, 2);");
        assert_eq!(script.functions.len(), 2);
        let entry = &script.functions[script.entry.0 as usize];
        assert_eq!(entry.nested_function_slots().count(), 1);
    }

    #[test]
    fn if_else_and_while_round_trip_through_branch_resolution() {
        let script = parse_ok("let i = 0; while (i) { if (i) { i = i - 1; } else { i = i + 1; } }");
        let entry = &script.functions[script.entry.0 as usize];
        assert!(!entry.bytecode.is_empty());
    }

    #[test]
    fn string_and_number_literals_are_reachable_through_the_returned_storage() {
        let parsed = parse(r#"let s = "hi"; let n = 42;"#, ParseOptions::default()).expect("should parse");
        let entry = &parsed.script.functions[parsed.script.entry.0 as usize];
        let has_string_literal = entry.literals[..entry.const_literal_end as usize]
            .iter()
            .any(|slot| matches!(slot, jjs_bytecode::LiteralSlot::String(id) if parsed.storage.get_string(*id) == "hi"));
        assert!(has_string_literal);
    }

    #[test]
    fn async_function_body_is_wrapped_in_try_create_context_and_async_exit() {
        let script = parse_ok("async function f() { return 1; }");
        assert_eq!(script.functions.len(), 2);
        let leaf = script.functions.iter().find(|f| f.kind == FunctionKind::Async).expect("async leaf");
        assert!(contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::TryCreateContext));
        assert!(contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::AsyncExit));
        // TryCreateContext must come before the body, AsyncExit after
        // RETURN_FUNCTION_END (spec §4.5 "implicit try/finally").
        let try_pos = ext_position(&leaf.bytecode, jjs_bytecode::ExtOpcode::TryCreateContext).unwrap();
        let exit_pos = ext_position(&leaf.bytecode, jjs_bytecode::ExtOpcode::AsyncExit).unwrap();
        assert!(try_pos < exit_pos);
    }

    #[test]
    fn async_arrow_function_body_is_wrapped_in_try_create_context_and_async_exit() {
        let script = parse_ok("let f = async () => 1;");
        let leaf = script.functions.iter().find(|f| f.kind == FunctionKind::Async).expect("async leaf");
        assert!(contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::TryCreateContext));
        assert!(contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::AsyncExit));
    }

    #[test]
    fn non_async_function_body_has_no_try_create_context_or_async_exit() {
        let script = parse_ok("function f() { return 1; }");
        let leaf = script.functions.iter().find(|f| f.kind == FunctionKind::Normal).expect("normal leaf");
        assert!(!contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::TryCreateContext));
        assert!(!contains_ext_pair(&leaf.bytecode, jjs_bytecode::ExtOpcode::AsyncExit));
    }

    fn ext_position(bytecode: &[u8], ext: jjs_bytecode::ExtOpcode) -> Option<usize> {
        let target: u8 = ext.into();
        bytecode.windows(2).position(|w| w[0] == jjs_bytecode::EXT_OPCODE_PREFIX && w[1] == target)
    }

    fn contains_ext_pair(bytecode: &[u8], ext: jjs_bytecode::ExtOpcode) -> bool {
        ext_position(bytecode, ext).is_some()
    }

    #[test]
    #[cfg(feature = "builtin-regexp")]
    fn regexp_literal_is_recorded_as_a_nested_leaf_with_a_resolved_literal_index() {
        let parsed = parse(r#"let r = /ab+c/gi;"#, ParseOptions::default()).expect("should parse");
        let entry = &parsed.script.functions[parsed.script.entry.0 as usize];
        assert_eq!(entry.nested_function_slots().count(), 1);
        let leaf_idx = entry.nested_function_slots().next().unwrap();
        let leaf = &parsed.script.functions[leaf_idx.0 as usize];
        let meta = leaf.regexp.as_ref().expect("leaf should carry regexp metadata");
        assert_eq!(parsed.storage.get_string(meta.pattern), "ab+c");
        assert!(!leaf.bytecode.is_empty());

        // The `EXT_PUSH_CLOSURE` reference emitted into the owning
        // function's byte-code must have been patched to the leaf's real,
        // post-const-pool literal-table index rather than left at its
        // placeholder value.
        let has_patched_push_closure = entry
            .bytecode
            .windows(4)
            .any(|w| w[0] == jjs_bytecode::EXT_OPCODE_PREFIX && w[1] == jjs_bytecode::ExtOpcode::PushClosure as u8);
        assert!(has_patched_push_closure);
    }

    #[test]
    #[cfg(not(feature = "builtin-regexp"))]
    fn regexp_literal_is_rejected_without_the_builtin_regexp_feature() {
        let err = parse(r#"let r = /ab+c/gi;"#, ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::NotSupported { feature: "regexp literals" }));
    }

    #[test]
    fn duplicated_complex_parameter_name_is_rejected() {
        let err = parse("function f(a = 1, a) {}", ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicatedParameterName);
    }

    #[test]
    fn duplicated_let_declaration_in_the_same_scope_is_rejected() {
        let err = parse("let x = 1; let x = 2;", ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicatedLexicalDeclaration);
    }

    #[test]
    fn var_is_allowed_to_redeclare_across_nested_blocks() {
        // `var` resolves against the whole function, not just the block,
        // but redeclaring it is still legal -- only the narrower
        // `declared_in_current_scope` check (used for let/const) rejects.
        parse_ok("var x = 1; { var x = 2; }");
    }

    #[test]
    fn duplicated_import_identifier_is_rejected() {
        let err = parse(
            "import { a, a } from \"mod\";",
            ParseOptions::module("<test>"),
        )
        .unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicatedImportIdentifier);
    }

    #[test]
    fn import_meta_outside_a_module_is_rejected() {
        let err = parse("import.meta;", ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::ImportMetaOutsideModule);
    }

    #[test]
    fn import_meta_inside_a_module_is_accepted() {
        parse("import.meta;", ParseOptions::module("<test>")).expect("import.meta is valid in a module");
    }

    #[test]
    fn named_export_declaration_is_accepted() {
        parse_ok_module("let x = 1; export { x };");
    }

    fn parse_ok_module(source: &str) -> ScriptRecord {
        parse(source, ParseOptions::module("<test>")).expect("expected module source to parse").script
    }
}
