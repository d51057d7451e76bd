//! Lowers a [`RegexAst`] into the flat regexp byte-code (spec §4.6).

use crate::ast::{Alternative, Assertion, ClassAtom, ClassEscape, Node, QuantifierKind, RegexAst};
use crate::flags::RegexpFlags;
use crate::opcode::{encode_int, encode_offset, encode_qmax, RegexOpcode};

/// A compiled pattern: opcode stream plus the number of capturing
/// groups it references (needed by callers to size the capture array).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRegexp {
    pub bytecode: Vec<u8>,
    pub capture_count: u32,
    pub flags: RegexpFlags,
}

pub fn emit(ast: &RegexAst, flags: RegexpFlags) -> CompiledRegexp {
    let mut emitter = Emitter { out: Vec::new(), next_capture: 1 };
    emitter.emit_alternatives(&ast.alternatives);
    emitter.out.push(RegexOpcode::Match as u8);
    CompiledRegexp { bytecode: emitter.out, capture_count: emitter.next_capture - 1, flags }
}

struct Emitter {
    out: Vec<u8>,
    next_capture: u32,
}

impl Emitter {
    fn emit_alternatives(&mut self, alts: &[Alternative]) {
        if alts.len() == 1 {
            self.emit_sequence(&alts[0].0);
            return;
        }
        // Each branch but the last is preceded by an `Alternative` opcode
        // carrying a forward jump past the rest of the branches, and ends
        // with a `Jump` past the remaining branches.
        let mut jump_fixups = Vec::new();
        for (idx, alt) in alts.iter().enumerate() {
            let is_last = idx + 1 == alts.len();
            if !is_last {
                self.out.push(RegexOpcode::Alternative as u8);
                let patch_at = self.out.len();
                encode_offset(0, &mut self.out);
                self.emit_sequence(&alt.0);
                self.out.push(RegexOpcode::Jump as u8);
                jump_fixups.push(self.out.len());
                encode_offset(0, &mut self.out);
                self.patch_offset(patch_at, self.out.len());
            } else {
                self.emit_sequence(&alt.0);
            }
        }
        let end = self.out.len();
        for at in jump_fixups {
            self.patch_offset(at, end);
        }
    }

    fn patch_offset(&mut self, field_at: usize, target: usize) {
        let delta = target as i32 - (field_at as i32 + 4);
        let bytes = delta.to_be_bytes();
        self.out[field_at..field_at + 4].copy_from_slice(&bytes);
    }

    fn emit_sequence(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.emit_node(node);
        }
    }

    fn emit_node(&mut self, node: &Node) {
        match node {
            Node::Char(c) => {
                self.out.push(RegexOpcode::Char as u8);
                encode_int(*c as u32, &mut self.out);
            }
            Node::Period => self.out.push(RegexOpcode::Period as u8),
            Node::Class { negated, atoms } => self.emit_class(*negated, atoms),
            Node::ClassEscape(escape) => self.emit_class_escape(*escape),
            Node::Assertion(assertion) => self.emit_assertion(assertion),
            Node::Group { capturing, body, .. } => self.emit_group(*capturing, body),
            Node::Backreference(index) => {
                self.out.push(RegexOpcode::Backreference as u8);
                encode_int(*index, &mut self.out);
            }
            Node::Quantified { node, quantifier } => self.emit_quantified(node, quantifier),
        }
    }

    fn emit_class(&mut self, negated: bool, atoms: &[ClassAtom]) {
        self.out.push(RegexOpcode::Class as u8);
        self.out.push(negated as u8);
        encode_int(atoms.len() as u32, &mut self.out);
        for atom in atoms {
            match atom {
                ClassAtom::Char(c) => {
                    self.out.push(0);
                    encode_int(*c as u32, &mut self.out);
                }
                ClassAtom::Range(lo, hi) => {
                    self.out.push(1);
                    encode_int(*lo as u32, &mut self.out);
                    encode_int(*hi as u32, &mut self.out);
                }
                ClassAtom::Escape(escape) => {
                    self.out.push(2);
                    self.out.push(class_escape_tag(*escape));
                }
            }
        }
    }

    fn emit_class_escape(&mut self, escape: ClassEscape) {
        self.out.push(RegexOpcode::ClassEscape as u8);
        self.out.push(class_escape_tag(escape));
    }

    fn emit_assertion(&mut self, assertion: &Assertion) {
        match assertion {
            Assertion::StartOfInput => self.out.push(RegexOpcode::StartOfInput as u8),
            Assertion::EndOfInput => self.out.push(RegexOpcode::EndOfInput as u8),
            Assertion::WordBoundary => self.out.push(RegexOpcode::WordBoundary as u8),
            Assertion::NotWordBoundary => self.out.push(RegexOpcode::NotWordBoundary as u8),
            Assertion::Lookahead { negative, body } => {
                self.out.push(if *negative { RegexOpcode::NegLookahead as u8 } else { RegexOpcode::Lookahead as u8 });
                let patch_at = self.out.len();
                encode_offset(0, &mut self.out);
                self.emit_alternatives(&body.alternatives);
                let end = self.out.len();
                self.patch_offset(patch_at, end);
            }
        }
    }

    fn emit_group(&mut self, capturing: bool, body: &RegexAst) {
        let index = if capturing {
            let idx = self.next_capture;
            self.next_capture += 1;
            Some(idx)
        } else {
            None
        };
        if let Some(idx) = index {
            self.out.push(RegexOpcode::SaveStart as u8);
            encode_int(idx, &mut self.out);
        }
        self.emit_alternatives(&body.alternatives);
        if let Some(idx) = index {
            self.out.push(RegexOpcode::SaveEnd as u8);
            encode_int(idx, &mut self.out);
        }
    }

    fn emit_quantified(&mut self, node: &Node, quantifier: &crate::ast::Quantifier) {
        let (min, max) = match quantifier.kind {
            QuantifierKind::ZeroOrMore => (0, None),
            QuantifierKind::OneOrMore => (1, None),
            QuantifierKind::ZeroOrOne => (0, Some(1)),
            QuantifierKind::Range { min, max } => (min, max),
        };
        self.out.push(if quantifier.lazy { RegexOpcode::QuantifierLazy as u8 } else { RegexOpcode::Quantifier as u8 });
        encode_int(min, &mut self.out);
        encode_qmax(max, &mut self.out);
        let body_len_at = self.out.len();
        encode_offset(0, &mut self.out);
        self.emit_node(node);
        let end = self.out.len();
        self.patch_offset(body_len_at, end);
    }
}

fn class_escape_tag(escape: ClassEscape) -> u8 {
    match escape {
        ClassEscape::Digit => 0,
        ClassEscape::NotDigit => 1,
        ClassEscape::Word => 2,
        ClassEscape::NotWord => 3,
        ClassEscape::Space => 4,
        ClassEscape::NotSpace => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_pattern;

    #[test]
    fn single_char_emits_char_opcode_and_match() {
        let ast = parse_pattern("a").unwrap();
        let compiled = emit(&ast, RegexpFlags::empty());
        assert_eq!(compiled.bytecode[0], RegexOpcode::Char as u8);
        assert_eq!(*compiled.bytecode.last().unwrap(), RegexOpcode::Match as u8);
    }

    #[test]
    fn capturing_group_increments_capture_count() {
        let ast = parse_pattern("(a)(b)").unwrap();
        let compiled = emit(&ast, RegexpFlags::empty());
        assert_eq!(compiled.capture_count, 2);
    }

    #[test]
    fn non_capturing_group_does_not_consume_a_capture_slot() {
        let ast = parse_pattern("(?:a)(b)").unwrap();
        let compiled = emit(&ast, RegexpFlags::empty());
        assert_eq!(compiled.capture_count, 1);
    }
}
