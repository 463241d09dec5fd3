/*!
Lowers a parsed pattern into flat bytecode.

Compilation is a single post-order walk of the AST. Forward references are
handled by reserving an offset slot at emit time and back-patching it once
the target position is known, in the manner of a one-pass assembler.
*/

use std::cmp;

use crate::ast::{AstKind, AstNode, ClassItem, ParsedRegex};
use crate::prog::{Inst, Program, OFFSET_SIZE, SEARCH_PREFIX_SIZE};

/// Compile a parsed pattern into an executable program. Compilation cannot
/// fail on a well-formed tree.
pub fn compile(parsed: &ParsedRegex) -> Program {
    Compiler::new().compile(parsed)
}

/// A single-use bytecode emitter.
#[derive(Clone, Debug)]
pub struct Compiler {
    code: Vec<u8>,
}

impl Compiler {
    /// Create a fresh compiler.
    pub fn new() -> Compiler {
        Compiler { code: vec![] }
    }

    /// Emit the program for `parsed`: the search prefix, the pattern body,
    /// and the final `Match`.
    pub fn compile(mut self, parsed: &ParsedRegex) -> Program {
        self.search_prefix();
        self.c(parsed, &parsed.ast);
        self.push(Inst::Match);
        Program::new(self.code, 2 * parsed.capture_count as usize)
    }

    /// The implicit `.*?` every program starts with, so that search-mode
    /// execution can begin a match at any position. Both splits prefer
    /// entering the pattern body over consuming another prefix character,
    /// which keeps match starts leftmost.
    fn search_prefix(&mut self) {
        debug_assert!(self.code.is_empty());
        self.push(Inst::SplitPreferTarget);
        let hole = self.alloc_offset();
        self.fill(hole, SEARCH_PREFIX_SIZE);
        self.push(Inst::AnyChar);
        self.push(Inst::SplitPreferNext);
        let hole = self.alloc_offset();
        self.fill(hole, 1 + OFFSET_SIZE);
    }

    /// Emit `node` with its quantifier applied. Returns the position of its
    /// first byte.
    ///
    /// The lowering: a quantifier that allows zero matches gets a leading
    /// `SplitPreferNext` whose target is the end, so skipping stays the
    /// lower priority branch; the required minimum is unrolled; an
    /// unbounded tail is a `SplitPreferTarget` looping back to the last
    /// copy; a bounded tail is a chain of optional copies each guarded by
    /// its own skip split.
    fn c(&mut self, parsed: &ParsedRegex, node: &AstNode) -> usize {
        let start = self.code.len();
        let quantifier = node.quantifier;
        let mut end_holes = vec![];
        if quantifier.allows_none() {
            self.push(Inst::SplitPreferNext);
            end_holes.push(self.alloc_offset());
        }
        let mut inner_pos = self.c_inner(parsed, node);
        for _ in 1..quantifier.min_repeats() {
            inner_pos = self.c_inner(parsed, node);
        }
        if quantifier.allows_infinite_repeat() {
            self.push(Inst::SplitPreferTarget);
            let hole = self.alloc_offset();
            self.fill(hole, inner_pos);
        } else {
            let emitted = cmp::max(1, quantifier.min_repeats());
            for _ in emitted..quantifier.max_repeats() {
                self.push(Inst::SplitPreferNext);
                end_holes.push(self.alloc_offset());
                self.c_inner(parsed, node);
            }
        }
        self.fill_to_next(end_holes);
        start
    }

    /// Emit one bare copy of `node`, bracketed by its capture saves when it
    /// has a capture index. Returns the position of its first byte.
    fn c_inner(&mut self, parsed: &ParsedRegex, node: &AstNode) -> usize {
        let start = self.code.len();
        let capture = node.capture();
        if let Some(group) = capture {
            self.push_save(2 * group);
        }
        let mut inner_end_holes = vec![];
        match node.kind {
            AstKind::Literal(ch) => {
                self.push(Inst::Literal);
                self.push_codepoint(ch);
            }
            AstKind::AnyChar => self.push(Inst::AnyChar),
            AstKind::CharRange(index) | AstKind::NegativeCharRange(index) => {
                self.push(match node.kind {
                    AstKind::CharRange(_) => Inst::CharRange,
                    _ => Inst::NegativeCharRange,
                });
                let items = &parsed.ranges[index];
                let singles = items
                    .iter()
                    .filter(|item| matches!(item, ClassItem::Single(_)))
                    .count();
                self.push_class_count(singles);
                self.push_class_count(items.len() - singles);
                for item in items {
                    if let ClassItem::Single(ch) = *item {
                        self.push_codepoint(ch);
                    }
                }
                for item in items {
                    if let ClassItem::Range(min, max) = *item {
                        self.push_codepoint(min);
                        self.push_codepoint(max);
                    }
                }
            }
            AstKind::Sequence(_) => {
                for child in &node.children {
                    self.c(parsed, child);
                }
            }
            AstKind::Alternation(_) => {
                debug_assert_eq!(2, node.children.len());
                self.push(Inst::SplitPreferNext);
                let split = self.alloc_offset();
                self.c(parsed, &node.children[0]);
                self.push(Inst::Jump);
                inner_end_holes.push(self.alloc_offset());
                let rhs = self.c(parsed, &node.children[1]);
                self.fill(split, rhs);
            }
            AstKind::LineStart => self.push(Inst::LineStart),
            AstKind::LineEnd => self.push(Inst::LineEnd),
            AstKind::WordBoundary => self.push(Inst::WordBoundary),
            AstKind::NotWordBoundary => self.push(Inst::NotWordBoundary),
            AstKind::SubjectBegin => self.push(Inst::SubjectBegin),
            AstKind::SubjectEnd => self.push(Inst::SubjectEnd),
        }
        self.fill_to_next(inner_end_holes);
        if let Some(group) = capture {
            self.push_save(2 * group + 1);
        }
        start
    }

    fn push(&mut self, inst: Inst) {
        self.code.push(inst as u8);
    }

    fn push_codepoint(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.code.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }

    fn push_save(&mut self, slot: u32) {
        assert!(slot <= u8::MAX as u32, "capture slot exceeds save operand");
        self.push(Inst::Save);
        self.code.push(slot as u8);
    }

    fn push_class_count(&mut self, count: usize) {
        assert!(count <= u16::MAX as usize, "character class too large");
        self.code.extend_from_slice(&(count as u16).to_le_bytes());
    }

    /// Reserve an offset slot and return its position for later filling.
    fn alloc_offset(&mut self) -> usize {
        let pos = self.code.len();
        self.code.extend_from_slice(&[0; OFFSET_SIZE]);
        pos
    }

    /// Back-patch the offset slot at `hole` to point at `target`.
    fn fill(&mut self, hole: usize, target: usize) {
        let bytes = (target as u32).to_le_bytes();
        self.code[hole..hole + OFFSET_SIZE].copy_from_slice(&bytes);
    }

    /// Back-patch every hole to the next instruction to be emitted.
    fn fill_to_next(&mut self, holes: Vec<usize>) {
        let next = self.code.len();
        for hole in holes {
            self.fill(hole, next);
        }
    }
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn program(pattern: &str) -> Program {
        compile(&parse(pattern.as_bytes()).unwrap())
    }

    #[test]
    fn single_literal_layout() {
        let prog = program("a");
        #[rustfmt::skip]
        let expected = vec![
            // The search prefix: prefer starting the pattern at 11, fall
            // back to consuming one character and looping to 5.
            Inst::SplitPreferTarget as u8, 11, 0, 0, 0,
            Inst::AnyChar as u8,
            Inst::SplitPreferNext as u8, 5, 0, 0, 0,
            // The pattern body, bracketed by group 0.
            Inst::Save as u8, 0,
            Inst::Literal as u8, b'a',
            Inst::Save as u8, 1,
            Inst::Match as u8,
        ];
        assert_eq!(expected, prog.bytecode());
        assert_eq!(2, prog.save_count());
    }

    #[test]
    fn compilation_is_deterministic() {
        let pattern = b"^(foo|qux|baz)+(bar)?baz$";
        let one = compile(&parse(pattern).unwrap());
        let two = compile(&parse(pattern).unwrap());
        assert_eq!(one.bytecode(), two.bytecode());
    }

    #[test]
    fn class_payload_layout() {
        let prog = program("[àb-d]");
        let listing = format!("{:?}", prog);
        assert!(listing.contains("CharRange 'à', 'b'-'d'"), "{}", listing);
        // Opcode, two u16 counts, the single 'à' (2 bytes), then the range
        // endpoints.
        let body = &prog.bytecode()[13..];
        assert_eq!(Inst::CharRange as u8, body[0]);
        assert_eq!([1, 0, 1, 0], body[1..5]);
        assert_eq!([0xC3, 0xA0, b'b', b'd'], body[5..9]);
    }

    #[test]
    fn counted_repetition_unrolls() {
        let listing = format!("{:?}", program(r"\`a{2,4}\'"));
        let literals = listing.matches("Literal 'a'").count();
        let splits = listing.matches("SplitPreferNext").count();
        // Two required copies, two optional copies each with a skip split,
        // plus the one split in the search prefix.
        assert_eq!(4, literals);
        assert_eq!(2 + 1, splits);
    }

    #[test]
    fn unbounded_repetition_loops_back() {
        let listing = format!("{:?}", program("a+"));
        assert!(listing.contains("SplitPreferTarget (goto: 0013)"), "{}", listing);
    }

    #[test]
    fn alternation_prefers_left() {
        let prog = program("a|b");
        // Body: Save(0), split to the right branch, 'a', jump over 'b',
        // 'b', Save(1), Match.
        let listing = format!("{:?}", prog);
        let body: Vec<&str> = listing
            .lines()
            .filter(|line| line.starts_with("00") && !line.starts_with("0000"))
            .skip(2)
            .collect();
        assert!(body[0].contains("Save(0)"));
        assert!(body[1].contains("SplitPreferNext"));
        assert!(body[2].contains("Literal 'a'"));
        assert!(body[3].contains("Jump"));
        assert!(body[4].contains("Literal 'b'"));
        assert!(body[5].contains("Save(1)"));
        assert!(body[6].contains("Match"));
    }
}
