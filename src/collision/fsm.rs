//! A hand-rolled finite-state automaton over a fixed printable-ASCII
//! alphabet, built from `regex_syntax::Hir` via Thompson construction and
//! subset construction. No published crate exposes automaton
//! union/intersection/complement over an explicit alphabet (the capability
//! the collision engine is built on), so this mirrors what `greenery.lego`
//! does in the original implementation, grounded on `regex_syntax`'s `Hir`
//! as the parse layer (the crate `BurntSushi-rebar` uses for the same job).
//!
//! Every pattern is matched whole-string; look-around assertions (`^`, `$`)
//! are treated as no-ops rather than parsed out, since whole-string
//! acceptance already implies them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use regex_syntax::hir::{Hir, HirKind};
use regex_syntax::ParserBuilder;
use thiserror::Error;

const ALPHABET_START: u32 = 0x20;
const ALPHABET_END: u32 = 0x7E;
const ALPHABET_LEN: usize = (ALPHABET_END - ALPHABET_START + 1) as usize;

fn alphabet_index(c: char) -> Option<usize> {
    let code = c as u32;
    if (ALPHABET_START..=ALPHABET_END).contains(&code) {
        Some((code - ALPHABET_START) as usize)
    } else {
        None
    }
}

fn alphabet_char(i: usize) -> char {
    char::from_u32(ALPHABET_START + i as u32).unwrap()
}

#[derive(Debug, Error)]
pub enum FsmError {
    #[error("invalid path-matching regex: {0}")]
    Parse(#[from] regex_syntax::Error),
    #[error("unsupported regex construct for collision analysis: {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Eps(usize),
    Char(usize, usize),
}

#[derive(Default)]
struct Builder {
    states: Vec<Vec<Edge>>,
}

impl Builder {
    fn new_state(&mut self) -> usize {
        self.states.push(Vec::new());
        self.states.len() - 1
    }

    fn eps(&mut self, from: usize, to: usize) {
        self.states[from].push(Edge::Eps(to));
    }

    fn on_char(&mut self, from: usize, symbol: usize, to: usize) {
        self.states[from].push(Edge::Char(symbol, to));
    }
}

struct Nfa {
    states: Vec<Vec<Edge>>,
    start: usize,
    accept: usize,
}

fn compile_hir(b: &mut Builder, hir: &Hir) -> Result<(usize, usize), FsmError> {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {
            let s = b.new_state();
            let a = b.new_state();
            b.eps(s, a);
            Ok((s, a))
        }
        HirKind::Literal(lit) => {
            let text = std::str::from_utf8(&lit.0)
                .map_err(|_| FsmError::Unsupported("non-UTF-8 literal"))?;
            let mut iter = text.chars();
            let Some(first) = iter.next() else {
                let s = b.new_state();
                let a = b.new_state();
                b.eps(s, a);
                return Ok((s, a));
            };
            let (s, mut a) = compile_char(b, first)?;
            for c in iter {
                let (s2, a2) = compile_char(b, c)?;
                b.eps(a, s2);
                a = a2;
            }
            Ok((s, a))
        }
        HirKind::Class(class) => compile_class(b, class),
        HirKind::Repetition(rep) => {
            let min = rep.min;
            let max = rep.max;
            let sub = &rep.sub;
            if min == 0 && max.is_none() {
                let (si, ai) = compile_hir(b, sub)?;
                let s = b.new_state();
                let a = b.new_state();
                b.eps(s, si);
                b.eps(ai, a);
                b.eps(s, a);
                b.eps(ai, si);
                Ok((s, a))
            } else if min == 0 && max == Some(1) {
                let (si, ai) = compile_hir(b, sub)?;
                let s = b.new_state();
                let a = b.new_state();
                b.eps(s, si);
                b.eps(ai, a);
                b.eps(s, a);
                Ok((s, a))
            } else {
                let mut parts = Vec::new();
                for _ in 0..min {
                    parts.push(compile_hir(b, sub)?);
                }
                match max {
                    None => {
                        let (si, ai) = compile_hir(b, sub)?;
                        let star_s = b.new_state();
                        let star_a = b.new_state();
                        b.eps(star_s, si);
                        b.eps(ai, star_a);
                        b.eps(star_s, star_a);
                        b.eps(ai, si);
                        parts.push((star_s, star_a));
                    }
                    Some(max) => {
                        for _ in min..max {
                            let (si, ai) = compile_hir(b, sub)?;
                            let s = b.new_state();
                            let a = b.new_state();
                            b.eps(s, si);
                            b.eps(ai, a);
                            b.eps(s, a);
                            parts.push((s, a));
                        }
                    }
                }
                concat_parts(b, parts)
            }
        }
        HirKind::Capture(cap) => compile_hir(b, &cap.sub),
        HirKind::Concat(subs) => {
            let mut parts = Vec::with_capacity(subs.len());
            for sub in subs {
                parts.push(compile_hir(b, sub)?);
            }
            concat_parts(b, parts)
        }
        HirKind::Alternation(subs) => {
            let s = b.new_state();
            let a = b.new_state();
            for sub in subs {
                let (si, ai) = compile_hir(b, sub)?;
                b.eps(s, si);
                b.eps(ai, a);
            }
            Ok((s, a))
        }
    }
}

fn concat_parts(
    b: &mut Builder,
    parts: Vec<(usize, usize)>,
) -> Result<(usize, usize), FsmError> {
    let mut iter = parts.into_iter();
    let Some((s, mut a)) = iter.next() else {
        let s = b.new_state();
        let a = b.new_state();
        b.eps(s, a);
        return Ok((s, a));
    };
    for (si, ai) in iter {
        b.eps(a, si);
        a = ai;
    }
    Ok((s, a))
}

fn compile_char(b: &mut Builder, c: char) -> Result<(usize, usize), FsmError> {
    let s = b.new_state();
    let a = b.new_state();
    if let Some(i) = alphabet_index(c) {
        b.on_char(s, i, a);
    }
    Ok((s, a))
}

fn compile_class(b: &mut Builder, class: &regex_syntax::hir::Class) -> Result<(usize, usize), FsmError> {
    let s = b.new_state();
    let a = b.new_state();
    match class {
        regex_syntax::hir::Class::Unicode(u) => {
            for range in u.ranges() {
                let lo = range.start() as u32;
                let hi = range.end() as u32;
                for code in lo.max(ALPHABET_START)..=hi.min(ALPHABET_END) {
                    if let Some(c) = char::from_u32(code) {
                        if let Some(i) = alphabet_index(c) {
                            b.on_char(s, i, a);
                        }
                    }
                }
            }
        }
        regex_syntax::hir::Class::Bytes(bc) => {
            for range in bc.ranges() {
                for byte in range.start()..=range.end() {
                    if (ALPHABET_START..=ALPHABET_END).contains(&(byte as u32)) {
                        b.on_char(s, (byte as u32 - ALPHABET_START) as usize, a);
                    }
                }
            }
        }
    }
    Ok((s, a))
}

fn epsilon_closure(states: &[Vec<Edge>], seeds: &BTreeSet<usize>) -> BTreeSet<usize> {
    let mut closure = seeds.clone();
    let mut stack: Vec<usize> = seeds.iter().copied().collect();
    while let Some(state) = stack.pop() {
        for edge in &states[state] {
            if let Edge::Eps(to) = edge {
                if closure.insert(*to) {
                    stack.push(*to);
                }
            }
        }
    }
    closure
}

fn move_set(states: &[Vec<Edge>], set: &BTreeSet<usize>, symbol: usize) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    for &state in set {
        for edge in &states[state] {
            if let Edge::Char(sym, to) = edge {
                if *sym == symbol {
                    out.insert(*to);
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
struct DfaState {
    accept: bool,
    trans: Vec<Option<usize>>,
}

/// A deterministic finite automaton over the printable-ASCII alphabet,
/// always total once produced by `totalize` (every state has a transition
/// for every symbol, possibly into a dead state).
#[derive(Debug, Clone)]
pub struct Fsm {
    states: Vec<DfaState>,
    start: usize,
}

impl Fsm {
    /// Compile a regex pattern representing a `regex` or escaped-literal
    /// match, producing the corresponding whole-string-acceptance automaton.
    pub fn from_pattern(pattern: &str, ignore_case: bool) -> Result<Self, FsmError> {
        let hir = ParserBuilder::new()
            .case_insensitive(ignore_case)
            .unicode(true)
            .utf8(true)
            .build()
            .parse(pattern)?;
        let mut builder = Builder::default();
        let (start, accept) = compile_hir(&mut builder, &hir)?;
        let nfa = Nfa {
            states: builder.states,
            start,
            accept,
        };
        Ok(Self::from_nfa(&nfa))
    }

    /// The automaton accepting every string over the alphabet.
    pub fn everything() -> Self {
        Fsm {
            states: vec![DfaState {
                accept: true,
                trans: vec![Some(0); ALPHABET_LEN],
            }],
            start: 0,
        }
    }

    fn from_nfa(nfa: &Nfa) -> Self {
        let mut state_index: BTreeMap<BTreeSet<usize>, usize> = BTreeMap::new();
        let mut dfa_states = Vec::new();
        let start_set = epsilon_closure(&nfa.states, &BTreeSet::from([nfa.start]));
        state_index.insert(start_set.clone(), 0);
        dfa_states.push(DfaState {
            accept: start_set.contains(&nfa.accept),
            trans: vec![None; ALPHABET_LEN],
        });
        let mut queue = VecDeque::from([start_set]);
        while let Some(set) = queue.pop_front() {
            let from_idx = state_index[&set];
            for symbol in 0..ALPHABET_LEN {
                let moved = move_set(&nfa.states, &set, symbol);
                if moved.is_empty() {
                    continue;
                }
                let closed = epsilon_closure(&nfa.states, &moved);
                let to_idx = *state_index.entry(closed.clone()).or_insert_with(|| {
                    dfa_states.push(DfaState {
                        accept: closed.contains(&nfa.accept),
                        trans: vec![None; ALPHABET_LEN],
                    });
                    queue.push_back(closed.clone());
                    dfa_states.len() - 1
                });
                dfa_states[from_idx].trans[symbol] = Some(to_idx);
            }
        }
        Fsm {
            states: dfa_states,
            start: 0,
        }
        .totalize()
    }

    /// Add an explicit dead (non-accepting, self-looping) state and route
    /// every missing transition into it, so product constructions never see
    /// a `None`.
    fn totalize(mut self) -> Self {
        if self
            .states
            .iter()
            .all(|s| s.trans.iter().all(Option::is_some))
        {
            return self;
        }
        let dead = self.states.len();
        self.states.push(DfaState {
            accept: false,
            trans: vec![Some(dead); ALPHABET_LEN],
        });
        for state in &mut self.states[..dead] {
            for slot in &mut state.trans {
                if slot.is_none() {
                    *slot = Some(dead);
                }
            }
        }
        self
    }

    fn product(a: &Fsm, b: &Fsm, accept: impl Fn(bool, bool) -> bool) -> Fsm {
        let mut index: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        let mut states = Vec::new();
        let start_pair = (a.start, b.start);
        index.insert(start_pair, 0);
        states.push(DfaState {
            accept: accept(a.states[a.start].accept, b.states[b.start].accept),
            trans: vec![None; ALPHABET_LEN],
        });
        let mut queue = VecDeque::from([start_pair]);
        while let Some((ai, bi)) = queue.pop_front() {
            let from_idx = index[&(ai, bi)];
            for symbol in 0..ALPHABET_LEN {
                let a_to = a.states[ai].trans[symbol].expect("totalized");
                let b_to = b.states[bi].trans[symbol].expect("totalized");
                let pair = (a_to, b_to);
                let to_idx = *index.entry(pair).or_insert_with(|| {
                    states.push(DfaState {
                        accept: accept(a.states[a_to].accept, b.states[b_to].accept),
                        trans: vec![None; ALPHABET_LEN],
                    });
                    queue.push_back(pair);
                    states.len() - 1
                });
                states[from_idx].trans[symbol] = Some(to_idx);
            }
        }
        Fsm { states, start: 0 }
    }

    pub fn union(a: &Fsm, b: &Fsm) -> Fsm {
        Fsm::product(a, b, |x, y| x || y)
    }

    pub fn intersect(a: &Fsm, b: &Fsm) -> Fsm {
        Fsm::product(a, b, |x, y| x && y)
    }

    pub fn complement(&self) -> Fsm {
        let mut out = self.clone();
        for state in &mut out.states {
            state.accept = !state.accept;
        }
        out
    }

    /// True if no string is accepted (no accepting state is reachable from
    /// the start state).
    pub fn is_empty(&self) -> bool {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![self.start];
        seen[self.start] = true;
        while let Some(s) = stack.pop() {
            if self.states[s].accept {
                return false;
            }
            for &next in self.states[s].trans.iter().flatten() {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        true
    }

    /// A short witness string accepted by this automaton, used only in
    /// diagnostic messages; `None` for the empty language. BFS guarantees
    /// the shortest witness.
    pub fn witness(&self) -> Option<String> {
        let mut seen = vec![false; self.states.len()];
        let mut queue = VecDeque::new();
        queue.push_back((self.start, String::new()));
        seen[self.start] = true;
        while let Some((state, path)) = queue.pop_front() {
            if self.states[state].accept {
                return Some(path);
            }
            if path.len() > 256 {
                continue;
            }
            for symbol in 0..ALPHABET_LEN {
                if let Some(next) = self.states[state].trans[symbol] {
                    if !seen[next] {
                        seen[next] = true;
                        let mut next_path = path.clone();
                        next_path.push(alphabet_char(symbol));
                        queue.push_back((next, next_path));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_accepts_only_itself() {
        let fsm = Fsm::from_pattern("/foo", false).unwrap();
        assert!(!fsm.is_empty());
        let other = Fsm::from_pattern("/bar", false).unwrap();
        assert!(Fsm::intersect(&fsm, &other).is_empty());
    }

    #[test]
    fn prefix_overlap_is_detected() {
        let a = Fsm::from_pattern("/foo.*", false).unwrap();
        let b = Fsm::from_pattern("/foobar", false).unwrap();
        assert!(!Fsm::intersect(&a, &b).is_empty());
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = Fsm::from_pattern("/a.*", false).unwrap();
        let b = Fsm::from_pattern(".*x", false).unwrap();
        assert_eq!(
            Fsm::intersect(&a, &b).is_empty(),
            Fsm::intersect(&b, &a).is_empty()
        );
    }

    #[test]
    fn ignore_case_widens_acceptance() {
        let case_sensitive = Fsm::from_pattern("/Foo", false).unwrap();
        let folded = Fsm::from_pattern("/Foo", true).unwrap();
        let lower = Fsm::from_pattern("/foo", false).unwrap();
        assert!(Fsm::intersect(&case_sensitive, &lower).is_empty());
        assert!(!Fsm::intersect(&folded, &lower).is_empty());
    }

    #[test]
    fn complement_of_everything_is_empty() {
        assert!(Fsm::everything().complement().is_empty());
    }

    #[test]
    fn union_accepts_either_side() {
        let a = Fsm::from_pattern("/a", false).unwrap();
        let b = Fsm::from_pattern("/b", false).unwrap();
        let u = Fsm::union(&a, &b);
        assert!(!Fsm::intersect(&u, &a).is_empty());
        assert!(!Fsm::intersect(&u, &b).is_empty());
        let c = Fsm::from_pattern("/c", false).unwrap();
        assert!(Fsm::intersect(&u, &c).is_empty());
    }
}
