/*!
A small regular expression engine built as a classic three-stage pipeline: a
recursive descent parser producing a syntax tree, a compiler lowering that
tree into flat bytecode, and a threaded virtual machine executing the
bytecode against UTF-8 input. The VM is a breadth-first NFA simulation in
the style of Thompson and Pike: it never backtracks, so matching runs in
time proportional to `program length × input length` while still tracking
capture group positions.

The pattern dialect is a deliberate subset of ECMAScript regular
expressions. Notably absent: backreferences, lookaround, named captures,
Unicode property classes, case-insensitive matching and non-greedy
quantifiers.

# Example

```
use regex_vm::Regex;

let re = Regex::new("([a-z]+) ([a-z]+)").unwrap();
let caps = re.captures("hello world").unwrap();
assert_eq!(Some("hello"), caps.at(1));
assert_eq!(Some("world"), caps.at(2));
```

Every search position is a byte offset into the haystack, and the haystack
is read as UTF-8, so offsets always land on codepoint boundaries of the
matched text.

# Supported syntax

| Syntax | Meaning |
|---|---|
| `a` | literal codepoint (anything outside `^$.*+?()[]{}\|`) |
| `.` | any codepoint |
| `[ab-d]`, `[^ab-d]` | character class, negated with a leading `^`; `-` outside a range position is literal |
| `(...)` | capturing group, numbered by opening parenthesis from 1 |
| `x\|y` | alternation, preferring the left branch |
| `x*`, `x+`, `x?` | greedy repetition |
| `x{m,n}`, `x{m,}`, `x{,n}`, `x{m}` | counted repetition; omitted `m` is 0, omitted `n` is unbounded, `{m}` is exact |
| `^`, `$` | line start/end (subject edges and around `\n`) |
| `\b`, `\B` | word boundary and its negation |
| ``\` ``, `\'` | absolute subject start/end |
| `\f \n \r \t \v` | control escapes |
| `\.` etc. | any syntax character escaped to a literal |

# Modes

Execution is parameterized by [`Mode`] — whole-input matching versus
substring search — and [`MatchKind`] — first match in priority order versus
leftmost-longest. The search mode works by entering through a short
bytecode prefix equivalent to a non-greedy `.*`, so the machinery is the
same either way.

For most uses, [`Regex`] is the whole story. The lower layers are exposed
for callers that want to inspect the pipeline: [`parse()`] yields the
syntax tree, [`compile()`] the bytecode [`Program`] (whose `Debug` output
is a disassembly listing), and [`PikeVm`] drives a program by hand.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

pub use crate::compile::compile;
pub use crate::error::{Error, ErrorKind};
pub use crate::parse::parse;
pub use crate::pikevm::{MatchKind, Mode, PikeVm, Slot};
pub use crate::prog::{Inst, Program};
pub use crate::re::{Captures, Regex};

pub mod ast;
pub mod compile;
mod error;
pub mod parse;
pub mod pikevm;
pub mod prog;
mod re;
mod utf8;
