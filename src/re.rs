use std::fmt;

use crate::compile;
use crate::error::Error;
use crate::parse;
use crate::pikevm::{MatchKind, Mode, PikeVm, Slot};
use crate::prog::Program;

/// A compiled regular expression.
///
/// This is the convenience surface over the engine: construction parses and
/// compiles the pattern, and each search method runs a fresh
/// [`PikeVm`](crate::PikeVm) over the compiled program. The program is
/// immutable, so a `Regex` can be used from many places at once.
///
/// All positions reported by a `Regex` are byte offsets into the haystack.
#[derive(Clone)]
pub struct Regex {
    program: Program,
    pattern: String,
}

impl fmt::Display for Regex {
    /// Shows the original pattern.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Regex({:?})", self.pattern)
    }
}

impl Regex {
    /// Parse and compile a pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use regex_vm::Regex;
    ///
    /// let re = Regex::new("[0-9]{4}-[0-9]{2}").unwrap();
    /// assert!(re.is_match("released 2014-01, give or take"));
    /// ```
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        let parsed = parse::parse(pattern.as_bytes())?;
        let program = compile::compile(&parsed);
        Ok(Regex { program, pattern: pattern.to_owned() })
    }

    /// Returns true iff any substring of `haystack` matches.
    pub fn is_match(&self, haystack: &str) -> bool {
        let mut vm = PikeVm::new(&self.program);
        vm.exec(haystack.as_bytes(), Mode::Search, MatchKind::First)
    }

    /// Returns true iff the whole of `haystack` matches.
    ///
    /// # Example
    ///
    /// ```
    /// use regex_vm::Regex;
    ///
    /// let re = Regex::new("[0-9]+").unwrap();
    /// assert!(re.is_full_match("12345"));
    /// assert!(!re.is_full_match("12345 "));
    /// ```
    pub fn is_full_match(&self, haystack: &str) -> bool {
        let mut vm = PikeVm::new(&self.program);
        vm.exec(haystack.as_bytes(), Mode::Match, MatchKind::First)
    }

    /// Returns the byte range of the first match in `haystack`.
    ///
    /// # Example
    ///
    /// ```
    /// use regex_vm::Regex;
    ///
    /// let re = Regex::new("f[a-z]+").unwrap();
    /// assert_eq!(Some((4, 9)), re.find("the flood came"));
    /// ```
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        self.exec(haystack, Mode::Search, MatchKind::First)
            .and_then(|caps| caps.pos(0))
    }

    /// Searches `haystack` and returns the capture groups of the first
    /// match.
    ///
    /// # Example
    ///
    /// ```
    /// use regex_vm::Regex;
    ///
    /// let re = Regex::new("([a-z]+)-([0-9]+)").unwrap();
    /// let caps = re.captures("see file-123 for details").unwrap();
    /// assert_eq!(Some("file"), caps.at(1));
    /// assert_eq!(Some("123"), caps.at(2));
    /// ```
    pub fn captures<'t>(&self, haystack: &'t str) -> Option<Captures<'t>> {
        self.exec(haystack, Mode::Search, MatchKind::First)
    }

    /// Run the engine with explicit mode and match kind, returning the
    /// capture groups on a match.
    ///
    /// # Example
    ///
    /// ```
    /// use regex_vm::{MatchKind, Mode, Regex};
    ///
    /// let re = Regex::new("f.*a(.*o)").unwrap();
    /// let caps = re
    ///     .exec("blahfoobarfoobaz", Mode::Search, MatchKind::Longest)
    ///     .unwrap();
    /// assert_eq!(Some("foobarfoo"), caps.at(0));
    /// assert_eq!(Some("rfoo"), caps.at(1));
    /// ```
    pub fn exec<'t>(
        &self,
        haystack: &'t str,
        mode: Mode,
        kind: MatchKind,
    ) -> Option<Captures<'t>> {
        let mut vm = PikeVm::new(&self.program);
        if vm.exec(haystack.as_bytes(), mode, kind) {
            Some(Captures { text: haystack, locs: vm.captures().to_vec() })
        } else {
            None
        }
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// The compiled program. Its `Debug` rendering is a disassembly.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The number of capture groups, including the implicit group 0 that
    /// spans the whole match.
    pub fn captures_len(&self) -> usize {
        self.program.capture_count()
    }
}

/// The capture groups of a single match.
///
/// Group 0 spans the whole match. A group inside an alternation branch that
/// was not taken, or inside a repetition that matched zero times, has no
/// position. For a group under a repetition that matched several times, the
/// recorded span is the last iteration's.
#[derive(Clone, Debug)]
pub struct Captures<'t> {
    text: &'t str,
    locs: Vec<Slot>,
}

impl<'t> Captures<'t> {
    /// The byte range of group `i`, if it participated in the match.
    pub fn pos(&self, i: usize) -> Option<(usize, usize)> {
        if 2 * i + 1 >= self.locs.len() {
            return None;
        }
        match (self.locs[2 * i], self.locs[2 * i + 1]) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// The text of group `i`, if it participated in the match.
    pub fn at(&self, i: usize) -> Option<&'t str> {
        self.pos(i).map(|(start, end)| &self.text[start..end])
    }

    /// The number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.locs.len() / 2
    }

    /// Returns true iff there are no groups, which cannot happen for a
    /// `Captures` produced by a match.
    pub fn is_empty(&self) -> bool {
        self.locs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Regex;

    #[test]
    fn pattern_round_trips() {
        let re = Regex::new("a|b").unwrap();
        assert_eq!("a|b", re.as_str());
        assert_eq!("a|b", format!("{}", re));
        assert_eq!(r#"Regex("a|b")"#, format!("{:?}", re));
    }

    #[test]
    fn out_of_range_group_is_none() {
        let re = Regex::new("(a)").unwrap();
        let caps = re.captures("a").unwrap();
        assert_eq!(2, caps.len());
        assert_eq!(None, caps.pos(2));
        assert_eq!(None, caps.at(9));
    }
}
