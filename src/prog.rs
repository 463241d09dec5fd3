/*!
The compiled program representation.

A program is a flat byte sequence: each instruction is an opcode byte
followed by its operands. Jump and split operands are absolute bytecode
positions stored as little-endian `u32`; codepoint operands are UTF-8
encoded in place. Every program begins with a fixed-size search prefix and
ends with a single `Match`.
*/

use std::fmt;

use crate::utf8;

/// The width in bytes of a jump/split offset operand. Offsets are absolute
/// bytecode positions stored little-endian.
pub(crate) const OFFSET_SIZE: usize = 4;

/// The width in bytes of a character class count operand.
pub(crate) const CLASS_COUNT_SIZE: usize = 2;

/// The size of the search prefix every program begins with: a split, an
/// `AnyChar` and a second split looping back to it. Anchored execution
/// starts at this position, search execution at 0.
pub(crate) const SEARCH_PREFIX_SIZE: usize = 3 + 2 * OFFSET_SIZE;

/// An instruction opcode. Each occupies one byte of bytecode, followed by
/// that opcode's operands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Inst {
    /// The program has reached a match state.
    Match = 0,
    /// Consume the current character if it equals the UTF-8 encoded
    /// codepoint operand.
    Literal = 1,
    /// Consume any one character.
    AnyChar = 2,
    /// Consume the current character if it is in the class described by the
    /// operands: a count of single codepoints, a count of ranges, then the
    /// singles and the range endpoint pairs, all UTF-8 encoded.
    CharRange = 3,
    /// Like `CharRange`, but consumes when the character is in none of the
    /// listed entries.
    NegativeCharRange = 4,
    /// Continue at the offset operand. A thread reaching a position another
    /// live thread already occupies is redundant and dies here.
    Jump = 5,
    /// Fork. The current thread continues past the operand; a new, lower
    /// priority thread is queued at the offset. This makes the fall-through
    /// path the preferred one.
    SplitPreferNext = 6,
    /// Fork. The current thread continues at the offset; a new, lower
    /// priority thread is queued past the operand. This makes the target
    /// path the preferred one.
    SplitPreferTarget = 7,
    /// Record the current input position in the save slot named by the one
    /// byte operand.
    Save = 8,
    /// Zero-width: at the start of the subject or just after a `\n`.
    LineStart = 9,
    /// Zero-width: at the end of the subject or just before a `\n`.
    LineEnd = 10,
    /// Zero-width: at a word boundary.
    WordBoundary = 11,
    /// Zero-width: not at a word boundary.
    NotWordBoundary = 12,
    /// Zero-width: at the absolute start of the subject.
    SubjectBegin = 13,
    /// Zero-width: at the absolute end of the subject.
    SubjectEnd = 14,
}

impl Inst {
    pub(crate) fn from_byte(byte: u8) -> Inst {
        match byte {
            0 => Inst::Match,
            1 => Inst::Literal,
            2 => Inst::AnyChar,
            3 => Inst::CharRange,
            4 => Inst::NegativeCharRange,
            5 => Inst::Jump,
            6 => Inst::SplitPreferNext,
            7 => Inst::SplitPreferTarget,
            8 => Inst::Save,
            9 => Inst::LineStart,
            10 => Inst::LineEnd,
            11 => Inst::WordBoundary,
            12 => Inst::NotWordBoundary,
            13 => Inst::SubjectBegin,
            14 => Inst::SubjectEnd,
            _ => unreachable!("invalid opcode byte: {}", byte),
        }
    }
}

/// A compiled program: the flat instruction stream plus the number of save
/// slots its `Save` instructions address.
///
/// A program is immutable once compiled and may be shared between any
/// number of executions, each of which owns its private
/// [`PikeVm`](crate::PikeVm) state. Its `Debug` rendering is a full
/// disassembly listing.
#[derive(Clone)]
pub struct Program {
    bytecode: Vec<u8>,
    save_count: usize,
}

impl Program {
    pub(crate) fn new(bytecode: Vec<u8>, save_count: usize) -> Program {
        Program { bytecode, save_count }
    }

    /// The raw instruction stream.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// The number of save slots. Each capture group contributes a start and
    /// an end slot, so this is twice the capture count.
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    /// The number of capture groups, including the implicit group 0.
    pub fn capture_count(&self) -> usize {
        self.save_count / 2
    }

    pub(crate) fn byte(&self, at: usize) -> u8 {
        self.bytecode[at]
    }

    pub(crate) fn inst(&self, pc: usize) -> Inst {
        Inst::from_byte(self.bytecode[pc])
    }

    /// Read the offset operand stored at `at`.
    pub(crate) fn offset(&self, at: usize) -> usize {
        let mut buf = [0u8; OFFSET_SIZE];
        buf.copy_from_slice(&self.bytecode[at..at + OFFSET_SIZE]);
        u32::from_le_bytes(buf) as usize
    }

    /// Read a character class count operand stored at `at`.
    pub(crate) fn class_count(&self, at: usize) -> usize {
        let mut buf = [0u8; CLASS_COUNT_SIZE];
        buf.copy_from_slice(&self.bytecode[at..at + CLASS_COUNT_SIZE]);
        u16::from_le_bytes(buf) as usize
    }

    /// Decode the codepoint operand stored at `at`, returning it along with
    /// its encoded length.
    pub(crate) fn codepoint(&self, at: usize) -> (char, usize) {
        utf8::decode_lossy(&self.bytecode[at..])
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "--------------------------------")?;
        let mut pc = 0;
        while pc < self.bytecode.len() {
            let inst = self.inst(pc);
            let at = pc + 1;
            match inst {
                Inst::Match => {
                    writeln!(f, "{:04} Match", pc)?;
                    pc = at;
                }
                Inst::Literal => {
                    let (ch, len) = self.codepoint(at);
                    writeln!(f, "{:04} Literal {:?}", pc, ch)?;
                    pc = at + len;
                }
                Inst::AnyChar => {
                    writeln!(f, "{:04} AnyChar", pc)?;
                    pc = at;
                }
                Inst::CharRange | Inst::NegativeCharRange => {
                    let singles = self.class_count(at);
                    let ranges = self.class_count(at + CLASS_COUNT_SIZE);
                    let mut cursor = at + 2 * CLASS_COUNT_SIZE;
                    let mut entries = Vec::with_capacity(singles + ranges);
                    for _ in 0..singles {
                        let (ch, len) = self.codepoint(cursor);
                        cursor += len;
                        entries.push(format!("{:?}", ch));
                    }
                    for _ in 0..ranges {
                        let (min, len) = self.codepoint(cursor);
                        cursor += len;
                        let (max, len) = self.codepoint(cursor);
                        cursor += len;
                        entries.push(format!("{:?}-{:?}", min, max));
                    }
                    let name = match inst {
                        Inst::CharRange => "CharRange",
                        _ => "NegativeCharRange",
                    };
                    writeln!(f, "{:04} {} {}", pc, name, entries.join(", "))?;
                    pc = cursor;
                }
                Inst::Jump => {
                    writeln!(f, "{:04} Jump (goto: {:04})", pc, self.offset(at))?;
                    pc = at + OFFSET_SIZE;
                }
                Inst::SplitPreferNext | Inst::SplitPreferTarget => {
                    let name = match inst {
                        Inst::SplitPreferNext => "SplitPreferNext",
                        _ => "SplitPreferTarget",
                    };
                    writeln!(
                        f,
                        "{:04} {} (goto: {:04})",
                        pc,
                        name,
                        self.offset(at)
                    )?;
                    pc = at + OFFSET_SIZE;
                }
                Inst::Save => {
                    writeln!(f, "{:04} Save({})", pc, self.byte(at))?;
                    pc = at + 1;
                }
                Inst::LineStart
                | Inst::LineEnd
                | Inst::WordBoundary
                | Inst::NotWordBoundary
                | Inst::SubjectBegin
                | Inst::SubjectEnd => {
                    writeln!(f, "{:04} {:?}", pc, inst)?;
                    pc = at;
                }
            }
        }
        writeln!(f, "--------------------------------")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::compile;
    use crate::parse::parse;

    #[test]
    fn disassembly_is_operand_complete() {
        let prog = compile(&parse(b"^(foo|ba[r-t]){1,2}$").unwrap());
        let listing = format!("{:?}", prog);
        // Every offset operand printed must name a listed instruction
        // boundary.
        let pcs: Vec<String> = listing
            .lines()
            .filter(|line| line.len() >= 4 && line.as_bytes()[0].is_ascii_digit())
            .map(|line| line[..4].to_string())
            .collect();
        for (i, _) in listing.match_indices("(goto: ") {
            let target = &listing[i + "(goto: ".len()..][..4];
            assert!(
                pcs.iter().any(|pc| pc == target),
                "goto {} does not name an instruction in:\n{}",
                target,
                listing
            );
        }
        assert!(listing.contains("Literal 'f'"));
        assert!(listing.contains("CharRange 'r'-'t'"));
        assert!(listing.contains("LineStart"));
        assert!(listing.contains("Match"));
    }

    #[test]
    fn counts() {
        let prog = compile(&parse(b"(a)(b)").unwrap());
        assert_eq!(6, prog.save_count());
        assert_eq!(3, prog.capture_count());
    }
}
