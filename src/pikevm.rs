/*!
A breadth-first NFA simulation over compiled bytecode.

The machine keeps a priority-ordered vector of threads, each a program
counter plus a snapshot of capture slots, and advances all of them in
lockstep across the input, one codepoint per outer iteration. Splits insert
the new thread immediately after the current one, so vector order *is*
match priority: the first thread to reach `Match` wins, which yields
leftmost-first semantics. Two live threads never occupy the same program
counter; insertion and `Jump` both check, which bounds the live set by the
program length.
*/

use std::mem;

use log::trace;

use crate::prog::{Inst, Program, OFFSET_SIZE, SEARCH_PREFIX_SIZE};
use crate::utf8;

/// Whether the whole input must match, or any substring of it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The pattern must consume the entire input.
    Match,
    /// The pattern may match any substring. Execution enters through the
    /// program's search prefix.
    Search,
}

/// Which of several possible matches is reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchKind {
    /// Stop at the first match in priority order: leftmost start,
    /// leftmost alternative, greediest repetition.
    First,
    /// Among matches starting at the earliest position, keep extending and
    /// report the one ending last.
    Longest,
}

/// A capture slot: the byte offset recorded by a `Save` instruction, or
/// `None` when the slot's group did not participate in the match.
pub type Slot = Option<usize>;

/// The program counter value marking a dead thread awaiting compaction.
const DEAD: usize = usize::MAX;

/// One branch of the simulation: a program counter and its capture
/// snapshot. A thread's priority is its index in the live vector.
#[derive(Clone, Debug)]
struct Thread {
    pc: usize,
    saves: Vec<Slot>,
}

/// The outcome of running one thread up to its next consuming instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StepResult {
    /// The thread consumed the current character and waits for the next.
    Consumed,
    /// The thread reached `Match`.
    Matched,
    /// The thread failed a comparison or an assertion and is dead.
    Failed,
}

/// An executor for one compiled program.
///
/// The program itself is immutable and shareable; all mutable state (the
/// thread vector and the captures of the most recent match) lives here, so
/// concurrent executions each need their own `PikeVm`. The thread vector is
/// retained across calls to [`exec`](PikeVm::exec) to avoid reallocation.
#[derive(Clone, Debug)]
pub struct PikeVm<'r> {
    prog: &'r Program,
    threads: Vec<Thread>,
    captures: Vec<Slot>,
}

impl<'r> PikeVm<'r> {
    /// Create an executor for `prog`.
    pub fn new(prog: &'r Program) -> PikeVm<'r> {
        PikeVm { prog, threads: vec![], captures: vec![] }
    }

    /// The capture slots of the most recent successful [`exec`], in pairs:
    /// slot `2k` is the start offset of group `k` and slot `2k+1` its end.
    /// Empty if no execution has matched yet.
    pub fn captures(&self) -> &[Slot] {
        &self.captures
    }

    /// Run the program over `haystack`. Returns true iff a match was found;
    /// its capture offsets are then available from
    /// [`captures`](PikeVm::captures).
    pub fn exec(
        &mut self,
        haystack: &[u8],
        mode: Mode,
        kind: MatchKind,
    ) -> bool {
        trace!(
            "exec mode={:?} kind={:?} haystack.len()={}",
            mode,
            kind,
            haystack.len()
        );
        self.threads.clear();
        self.captures.clear();
        let start = match mode {
            Mode::Match => SEARCH_PREFIX_SIZE,
            Mode::Search => 0,
        };
        let saves = vec![None; self.prog.save_count()];
        self.add_thread(0, start, saves);

        let mut found = false;
        let mut at = 0;
        while at < haystack.len() {
            let (ch, len) = utf8::decode_lossy(&haystack[at..]);
            let mut i = 0;
            while i < self.threads.len() {
                match self.step(i, haystack, at, Some(ch)) {
                    StepResult::Consumed => {}
                    StepResult::Failed => self.threads[i].pc = DEAD,
                    StepResult::Matched => {
                        // In whole-input mode a match before the end is no
                        // match at all; the thread is already dead.
                        if mode == Mode::Search {
                            self.record_match(i);
                            found = true;
                            if kind == MatchKind::First {
                                return true;
                            }
                        }
                    }
                }
                i += 1;
            }
            self.threads.retain(|thread| thread.pc != DEAD);
            if self.threads.is_empty() {
                return found;
            }
            at += len;
        }

        // One more pass at the end position, so that trailing zero-width
        // assertions and `Match` can fire.
        let mut i = 0;
        while i < self.threads.len() {
            if self.step(i, haystack, at, None) == StepResult::Matched {
                self.record_match(i);
                found = true;
                if kind == MatchKind::First {
                    return true;
                }
            }
            i += 1;
        }
        found
    }

    /// Keep the saves of the matched thread at `i` and discard it along
    /// with every lower priority thread.
    fn record_match(&mut self, i: usize) {
        self.captures = mem::take(&mut self.threads[i].saves);
        self.threads.truncate(i);
        trace!("matched, captures={:?}", self.captures);
    }

    /// Run the thread at `i` until it consumes a character, matches, or
    /// dies. `at` is the byte offset of the current position and `cur` the
    /// character there, `None` at the end of the haystack.
    ///
    /// Splits insert their new thread at `i + 1`, directly after the
    /// current one, which is exactly the lower priority slot.
    fn step(
        &mut self,
        i: usize,
        haystack: &[u8],
        at: usize,
        cur: Option<char>,
    ) -> StepResult {
        loop {
            let pc = self.threads[i].pc;
            let operands = pc + 1;
            match self.prog.inst(pc) {
                Inst::Literal => {
                    let (ch, len) = self.prog.codepoint(operands);
                    self.threads[i].pc = operands + len;
                    return if cur == Some(ch) {
                        StepResult::Consumed
                    } else {
                        StepResult::Failed
                    };
                }
                Inst::AnyChar => {
                    self.threads[i].pc = operands;
                    return StepResult::Consumed;
                }
                Inst::CharRange => return self.step_class(i, pc, false, cur),
                Inst::NegativeCharRange => {
                    return self.step_class(i, pc, true, cur)
                }
                Inst::Jump => {
                    let target = self.prog.offset(operands);
                    // If the target is already covered by a live thread,
                    // this thread is redundant.
                    if self.threads.iter().any(|t| t.pc == target) {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = target;
                }
                Inst::SplitPreferNext => {
                    let target = self.prog.offset(operands);
                    let saves = self.threads[i].saves.clone();
                    self.add_thread(i + 1, target, saves);
                    self.threads[i].pc = operands + OFFSET_SIZE;
                }
                Inst::SplitPreferTarget => {
                    let next = operands + OFFSET_SIZE;
                    let saves = self.threads[i].saves.clone();
                    self.add_thread(i + 1, next, saves);
                    self.threads[i].pc = self.prog.offset(operands);
                }
                Inst::Save => {
                    let slot = self.prog.byte(operands) as usize;
                    self.threads[i].saves[slot] = Some(at);
                    self.threads[i].pc = operands + 1;
                }
                Inst::LineStart => {
                    if !is_line_start(haystack, at) {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::LineEnd => {
                    if !is_line_end(haystack, at) {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::WordBoundary => {
                    if !is_word_boundary(haystack, at) {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::NotWordBoundary => {
                    if is_word_boundary(haystack, at) {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::SubjectBegin => {
                    if at != 0 {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::SubjectEnd => {
                    if at != haystack.len() {
                        return StepResult::Failed;
                    }
                    self.threads[i].pc = operands;
                }
                Inst::Match => {
                    self.threads[i].pc = DEAD;
                    return StepResult::Matched;
                }
            }
        }
    }

    /// Test `cur` against a class instruction at `pc`. The thread's program
    /// counter is moved past the whole payload whatever the outcome, so the
    /// thread is well positioned for its next step.
    fn step_class(
        &mut self,
        i: usize,
        pc: usize,
        negative: bool,
        cur: Option<char>,
    ) -> StepResult {
        let singles = self.prog.class_count(pc + 1);
        let ranges = self.prog.class_count(pc + 3);
        let mut cursor = pc + 5;
        let mut in_class = false;
        for _ in 0..singles {
            let (ch, len) = self.prog.codepoint(cursor);
            cursor += len;
            if cur == Some(ch) {
                in_class = true;
            }
        }
        for _ in 0..ranges {
            let (min, len) = self.prog.codepoint(cursor);
            cursor += len;
            let (max, len) = self.prog.codepoint(cursor);
            cursor += len;
            if cur.map_or(false, |c| min <= c && c <= max) {
                in_class = true;
            }
        }
        self.threads[i].pc = cursor;
        if in_class != negative {
            StepResult::Consumed
        } else {
            StepResult::Failed
        }
    }

    /// Queue a thread at `pc`, inserted at `index` in priority order,
    /// unless a live thread already occupies that program counter.
    fn add_thread(&mut self, index: usize, pc: usize, saves: Vec<Slot>) {
        if self.threads.iter().any(|t| t.pc == pc) {
            return;
        }
        self.threads.insert(index, Thread { pc, saves });
    }
}

fn is_line_start(haystack: &[u8], at: usize) -> bool {
    at == 0 || haystack[at - 1] == b'\n'
}

fn is_line_end(haystack: &[u8], at: usize) -> bool {
    at == haystack.len() || haystack[at] == b'\n'
}

/// The subject edges always count as boundaries; in between, a boundary is
/// a word/non-word transition.
fn is_word_boundary(haystack: &[u8], at: usize) -> bool {
    if at == 0 || at == haystack.len() {
        return true;
    }
    let prev = utf8::decode_last(&haystack[..at]);
    let cur = utf8::decode(&haystack[at..]).0;
    is_word_char(prev) != is_word_char(cur)
}

/// A word character is an alphanumeric or an underscore. An absent or
/// undecodable character is not one.
fn is_word_char(ch: Option<char>) -> bool {
    ch.map_or(false, |c| c == '_' || c.is_alphanumeric())
}
