//! The canonical match tree — the boolean IR shared by the rule parser, the
//! collision engine, and both config emitters.

use std::fmt::Write as _;

/// Source of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Path,
    Domain,
    Query,
    Method,
}

impl Source {
    fn as_str(&self) -> &'static str {
        match self {
            Source::Path => "path",
            Source::Domain => "domain",
            Source::Query => "query",
            Source::Method => "method",
        }
    }
}

/// Per-source match function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Function {
    Exact,
    Regex,
    BeginsWith,
    EndsWith,
    Contains,
    Exist,
}

impl Function {
    fn as_str(&self) -> &'static str {
        match self {
            Function::Exact => "exact",
            Function::Regex => "regex",
            Function::BeginsWith => "begins_with",
            Function::EndsWith => "ends_with",
            Function::Contains => "contains",
            Function::Exist => "exist",
        }
    }
}

/// Function-dependent input carried by a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInput {
    /// The literal/regex value being matched; absent only for `query.exist`.
    pub value: Option<String>,
    /// Present only for `query` leaves.
    pub parameter: Option<String>,
    pub ignore_case: bool,
}

impl MatchInput {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            parameter: None,
            ignore_case: false,
        }
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    fn canonical_into(&self, out: &mut String) {
        if let Some(p) = &self.parameter {
            let _ = write!(out, "param={p};");
        }
        if let Some(v) = &self.value {
            let _ = write!(out, "value={v};");
        }
        if self.ignore_case {
            out.push_str("ic;");
        }
    }
}

/// Boolean operator for condition-list nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    All,
    Any,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::All => "and",
            Op::Any => "or",
        }
    }
}

/// A minified, canonical boolean match tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTree {
    List {
        op: Op,
        children: Vec<MatchTree>,
    },
    Not(Box<MatchTree>),
    Match {
        source: Source,
        function: Function,
        input: MatchInput,
    },
}

impl MatchTree {
    pub fn leaf(source: Source, function: Function, input: MatchInput) -> Self {
        MatchTree::Match {
            source,
            function,
            input,
        }
    }

    pub fn list(op: Op, children: Vec<MatchTree>) -> Self {
        MatchTree::List { op, children }
    }

    pub fn not(child: MatchTree) -> Self {
        MatchTree::Not(Box::new(child))
    }

    /// Bottom-up minification: collapses arity-1 `all`/`any`, cancels
    /// adjacent `not`s, and flattens nested same-operator condition lists.
    ///
    /// Invariants enforced on the result: I2 (non-empty lists), I3 (no
    /// `not(not(_))`), I5 (no arity-1 lists, no nested same-op lists).
    pub fn minify(self) -> MatchTree {
        match self {
            MatchTree::Not(inner) => {
                let inner = inner.minify();
                match inner {
                    MatchTree::Not(grandchild) => *grandchild,
                    other => MatchTree::Not(Box::new(other)),
                }
            }
            MatchTree::List { op, children } => {
                let mut flattened = Vec::with_capacity(children.len());
                for child in children {
                    let child = child.minify();
                    match child {
                        MatchTree::List {
                            op: child_op,
                            children: grandchildren,
                        } if child_op == op => flattened.extend(grandchildren),
                        other => flattened.push(other),
                    }
                }
                if flattened.len() == 1 {
                    flattened.into_iter().next().unwrap()
                } else {
                    MatchTree::List {
                        op,
                        children: flattened,
                    }
                }
            }
            leaf @ MatchTree::Match { .. } => leaf,
        }
    }

    /// Generic depth-first fold. `on_match(source, function, input, negate)`
    /// is invoked at leaves; `on_list(results, op, negate)` combines the
    /// folded results of a condition list's children. `not` nodes vanish —
    /// their effect surfaces as the flipped `negate` flag at the next call.
    pub fn fold<T>(
        &self,
        on_match: &mut dyn FnMut(Source, Function, &MatchInput, bool) -> T,
        on_list: &mut dyn FnMut(Vec<T>, Op, bool) -> T,
    ) -> T {
        self.fold_inner(on_match, on_list, false)
    }

    fn fold_inner<T>(
        &self,
        on_match: &mut dyn FnMut(Source, Function, &MatchInput, bool) -> T,
        on_list: &mut dyn FnMut(Vec<T>, Op, bool) -> T,
        negate: bool,
    ) -> T {
        match self {
            MatchTree::Not(inner) => inner.fold_inner(on_match, on_list, !negate),
            MatchTree::List { op, children } => {
                let results = children
                    .iter()
                    .map(|c| c.fold_inner(on_match, on_list, false))
                    .collect();
                on_list(results, *op, negate)
            }
            MatchTree::Match {
                source,
                function,
                input,
            } => on_match(*source, *function, input, negate),
        }
    }

    /// Deterministic string serialization used as the collision-cache key
    /// and for `P2`-style idempotence tests. Only meaningful on a minified
    /// tree — it does not itself re-minify.
    pub fn canonical_key(&self) -> String {
        let mut out = String::new();
        self.canonical_into(&mut out);
        out
    }

    fn canonical_into(&self, out: &mut String) {
        match self {
            MatchTree::Not(inner) => {
                out.push_str("not(");
                inner.canonical_into(out);
                out.push(')');
            }
            MatchTree::List { op, children } => {
                out.push_str(op.as_str());
                out.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    child.canonical_into(out);
                }
                out.push(')');
            }
            MatchTree::Match {
                source,
                function,
                input,
            } => {
                out.push_str(source.as_str());
                out.push(':');
                out.push_str(function.as_str());
                out.push('[');
                input.canonical_into(out);
                out.push(']');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: &str) -> MatchTree {
        MatchTree::leaf(Source::Path, Function::Exact, MatchInput::value(v))
    }

    #[test]
    fn minify_collapses_arity_one_lists() {
        let tree = MatchTree::list(Op::All, vec![leaf("/a")]);
        assert_eq!(tree.minify(), leaf("/a"));
    }

    #[test]
    fn minify_cancels_double_negation() {
        let tree = MatchTree::not(MatchTree::not(leaf("/a")));
        assert_eq!(tree.minify(), leaf("/a"));
    }

    #[test]
    fn minify_flattens_nested_same_operator() {
        let tree = MatchTree::list(
            Op::All,
            vec![MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]), leaf("/c")],
        );
        let minified = tree.minify();
        match minified {
            MatchTree::List { op, children } => {
                assert_eq!(op, Op::All);
                assert_eq!(children.len(), 3);
            }
            _ => panic!("expected flattened list"),
        }
    }

    #[test]
    fn minify_is_idempotent() {
        let trees = vec![
            MatchTree::list(Op::Any, vec![leaf("/a")]),
            MatchTree::not(MatchTree::not(MatchTree::not(leaf("/a")))),
            MatchTree::list(
                Op::All,
                vec![
                    MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]),
                    MatchTree::list(Op::All, vec![leaf("/c")]),
                ],
            ),
        ];
        for tree in trees {
            let once = tree.minify();
            let twice = once.clone().minify();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn canonical_key_is_deterministic() {
        let a = MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]);
        let b = MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_distinguishes_order() {
        let a = MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]);
        let b = MatchTree::list(Op::All, vec![leaf("/b"), leaf("/a")]);
        assert_ne!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn fold_counts_leaves_and_tracks_negation() {
        let tree = MatchTree::not(MatchTree::list(Op::All, vec![leaf("/a"), leaf("/b")]));
        let mut on_match = |_src: Source, _fun: Function, _inp: &MatchInput, negate: bool| negate;
        let mut on_list = |results: Vec<bool>, _op: Op, negate: bool| {
            assert!(results.iter().all(|r| !r));
            negate
        };
        let result = tree.fold(&mut on_match, &mut on_list);
        assert!(result, "negate flag should have surfaced at the list node");
    }
}
