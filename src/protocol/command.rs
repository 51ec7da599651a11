//! Parsed command: a lowercased verb plus its ordered arguments.

use bytes::Bytes;

/// A framed request after the verb has been split off.
///
/// Verbs are matched case-insensitively, so the verb is stored lowercased;
/// arguments are kept byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(verb: impl AsRef<[u8]>, args: Vec<Bytes>) -> Self {
        Self {
            verb: String::from_utf8_lossy(verb.as_ref()).to_lowercase(),
            args,
        }
    }

    /// Builds a command from framed tokens. Returns `None` for an empty request.
    pub fn from_tokens(mut tokens: Vec<Bytes>) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        let verb = tokens.remove(0);
        Some(Self::new(verb, tokens))
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Arguments after the verb.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Token count including the verb, which is what arity rules count.
    pub fn token_count(&self) -> usize {
        self.args.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_is_lowercased() {
        let cmd = Command::new("GeT", vec![Bytes::from("Key")]);
        assert_eq!(cmd.verb(), "get");
        assert_eq!(cmd.args(), &[Bytes::from("Key")]);
        assert_eq!(cmd.token_count(), 2);
    }

    #[test]
    fn test_from_tokens() {
        assert!(Command::from_tokens(Vec::new()).is_none());

        let cmd = Command::from_tokens(vec![Bytes::from("PING")]).unwrap();
        assert_eq!(cmd.verb(), "ping");
        assert!(cmd.args().is_empty());
    }
}
