//! Compile-time symbol environment (spec §4.5): the saved-context stack
//! `parser_parse_function` pushes across nested function boundaries, and
//! the private-field visibility stack class bodies push independently.
//!
//! Grounded on `bsharp_parser`'s save/restore of its `ParseMode`/scope
//! state across nested parse calls (`bsharp_parser::parse_mode`,
//! `bsharp_parser::facade`): there, a thread-local flag is saved and
//! restored around a recursive call; here, the full emission state
//! (literal pool position, scope stack, byte-code stream, status flags)
//! moves with it, so a `Vec<ParserFrame>` plays the role of the
//! teacher's single saved flag, scaled up to the bigger state a real
//! byte-code emitter carries.

use std::collections::{HashMap, HashSet};

use jjs_bytecode::{FuncIndex, FunctionEmitter, FunctionKind, LabelId, StatusFlags};

use crate::scanner::ScannerQueue;

/// One lexical block's identifier-to-register bindings.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, u16>,
}

impl Scope {
    pub fn declare(&mut self, name: &str, register: u16) -> bool {
        self.bindings.insert(name.to_string(), register).is_none()
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.bindings.get(name).copied()
    }
}

/// Per-function emission state, saved across a nested function boundary
/// (spec: "saves the outer parser state ... into a saved context linked
/// list, installs a fresh inner context").
pub struct ParserFrame {
    pub emitter: FunctionEmitter,
    pub scopes: Vec<Scope>,
    pub kind: FunctionKind,
    pub flags: StatusFlags,
    pub param_names: HashSet<String>,
    pub has_complex_params: bool,
    /// Arena indices of function declarations completed directly inside
    /// this frame, destined for the record's `[const_literal_end,
    /// literal_end)` nested-function slots once the literal table is
    /// finalised (spec §3).
    pub nested: Vec<FuncIndex>,
    /// This frame's scanner pre-pass queue (spec §4.5's "scanner_info
    /// queue"), popped by the emission pass as matching declarations are
    /// reached.
    pub scanner: ScannerQueue,
}

impl ParserFrame {
    pub fn new(kind: FunctionKind, flags: StatusFlags) -> ParserFrame {
        let mut emitter = FunctionEmitter::new();
        emitter.push_function_boundary();
        ParserFrame {
            emitter,
            scopes: vec![Scope::default()],
            kind,
            flags,
            param_names: HashSet::new(),
            has_complex_params: false,
            nested: Vec::new(),
            scanner: ScannerQueue::default(),
        }
    }

    pub fn push_block(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_block(&mut self) {
        self.scopes.pop();
    }

    pub fn declare(&mut self, name: &str) -> u16 {
        if let Some(existing) = self.resolve(name) {
            return existing;
        }
        let register = self.emitter.new_register();
        self.scopes.last_mut().expect("a function frame always has at least one scope").declare(name, register.0);
        register.0
    }

    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Whether `name` is already bound in the *innermost* lexical block,
    /// the scope a `let`/`const` redeclaration is checked against --
    /// distinct from `resolve`, which also sees outer/function-level
    /// bindings that `var` is allowed to shadow.
    pub fn declared_in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().expect("a function frame always has at least one scope").get(name).is_some()
    }
}

/// Tracks `#name`s visible to the current private-field reference (spec:
/// "a stack of `private_context` frames"). Pushed per class body,
/// independent of the function saved-context stack above since a method
/// body is itself a nested function frame inside the class's private
/// scope.
#[derive(Debug, Default)]
pub struct PrivateContextStack {
    frames: Vec<HashSet<String>>,
}

impl PrivateContextStack {
    pub fn push(&mut self) {
        self.frames.push(HashSet::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn declare(&mut self, name: &str) {
        if let Some(top) = self.frames.last_mut() {
            top.insert(name.to_string());
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|frame| frame.contains(name))
    }
}

/// One breakable/continuable statement's jump targets, plus whatever
/// labels a run of `label:` prefixes attached to it.
#[derive(Debug)]
pub struct LoopLabelEntry {
    pub labels: HashSet<String>,
    pub break_label: LabelId,
    /// `None` for plain labeled statements and `switch`, which accept
    /// `break` but have nothing for `continue` to target.
    pub continue_label: Option<LabelId>,
}

/// Tracks enclosing iteration/switch/labeled statements so `break` and
/// `continue` -- bare or with a label -- can resolve their jump target
/// without the emitter itself knowing about statement nesting (spec:
/// loop/switch statements push their break/continue targets onto a
/// stack that jump statements search, innermost first).
#[derive(Debug, Default)]
pub struct LoopLabelStack {
    entries: Vec<LoopLabelEntry>,
}

impl LoopLabelStack {
    pub fn push(&mut self, labels: HashSet<String>, break_label: LabelId, continue_label: Option<LabelId>) {
        self.entries.push(LoopLabelEntry { labels, break_label, continue_label });
    }

    pub fn pop(&mut self) {
        self.entries.pop();
    }

    pub fn resolve_break(&self, label: Option<&str>) -> Option<LabelId> {
        match label {
            None => self.entries.last().map(|e| e.break_label),
            Some(name) => self.entries.iter().rev().find(|e| e.labels.contains(name)).map(|e| e.break_label),
        }
    }

    pub fn resolve_continue(&self, label: Option<&str>) -> Option<LabelId> {
        match label {
            None => self.entries.iter().rev().find_map(|e| e.continue_label),
            Some(name) => self.entries.iter().rev().find(|e| e.labels.contains(name)).and_then(|e| e.continue_label),
        }
    }
}
