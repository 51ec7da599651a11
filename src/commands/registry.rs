//! Verb registry: which verbs exist and how many tokens each accepts.
//!
//! The registry is built once at startup and shared by reference; tests build
//! their own, so no verb table lives in global mutable state.

use std::collections::HashMap;

/// Every operation the bridge can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Ping,
    Quit,
    Get,
    Set,
    Del,
    Ttl,
    Pttl,
    Expire,
    Exists,
    Rename,
}

/// Allowed token counts, verb included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    OneOf(&'static [usize]),
}

impl Arity {
    pub fn accepts(&self, tokens: usize) -> bool {
        match self {
            Arity::Exact(n) => tokens == *n,
            Arity::AtLeast(n) => tokens >= *n,
            Arity::OneOf(allowed) => allowed.contains(&tokens),
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbSpec {
    /// Lowercase verb as clients send it.
    pub name: &'static str,
    pub verb: Verb,
    pub arity: Arity,
}

impl VerbSpec {
    pub const fn new(name: &'static str, verb: Verb, arity: Arity) -> Self {
        Self { name, verb, arity }
    }
}

/// The verbs served by default.
pub const STANDARD_VERBS: &[VerbSpec] = &[
    VerbSpec::new("ping", Verb::Ping, Arity::AtLeast(1)),
    VerbSpec::new("quit", Verb::Quit, Arity::Exact(1)),
    VerbSpec::new("get", Verb::Get, Arity::Exact(2)),
    VerbSpec::new("set", Verb::Set, Arity::OneOf(&[3, 5])),
    VerbSpec::new("del", Verb::Del, Arity::AtLeast(2)),
    VerbSpec::new("unlink", Verb::Del, Arity::AtLeast(2)),
    VerbSpec::new("ttl", Verb::Ttl, Arity::Exact(2)),
    VerbSpec::new("pttl", Verb::Pttl, Arity::Exact(2)),
    VerbSpec::new("expire", Verb::Expire, Arity::Exact(3)),
    VerbSpec::new("exists", Verb::Exists, Arity::AtLeast(2)),
    VerbSpec::new("rename", Verb::Rename, Arity::Exact(3)),
];

/// Capability probes answered with "unknown command" before any lookup.
///
/// Clients such as `redis-cli` send these on connect; answering them here
/// keeps them out of the unknown-command warnings.
pub const PROBE_VERBS: &[&str] = &["info", "command"];

/// Lookup table from lowercase verb to its [`VerbSpec`].
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    verbs: HashMap<&'static str, VerbSpec>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with [`STANDARD_VERBS`].
    pub fn new() -> Self {
        Self::with_verbs(STANDARD_VERBS)
    }

    /// Registry with an explicit verb list. Later entries win on duplicates.
    pub fn with_verbs(specs: &[VerbSpec]) -> Self {
        Self {
            verbs: specs.iter().map(|spec| (spec.name, *spec)).collect(),
        }
    }

    /// Looks up a verb that is already lowercased.
    pub fn lookup(&self, verb: &str) -> Option<&VerbSpec> {
        self.verbs.get(verb)
    }

    pub fn is_probe(verb: &str) -> bool {
        PROBE_VERBS.contains(&verb)
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Registered verb names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.verbs.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
