//! Command Dispatcher
//!
//! Validates a [`Command`] against the [`CommandRegistry`], runs exactly one
//! engine operation, and encodes the outcome as a RESP reply.
//!
//! ```text
//! Command ──> probe? ──> lookup ──> arity ──> parse args ──> engine ──> reply
//!               │          │          │            │            │
//!               └──────────┴──────────┴────────────┴────────────┴──> -ERR ...
//! ```
//!
//! Validation failures never reach storage. The dispatcher keeps no state
//! between calls beyond its shared registry and storage handles, so cloning
//! it per connection is cheap.

use crate::commands::engine;
use crate::commands::error::{CommandError, CommandResult, ErrorKind};
use crate::commands::registry::{CommandRegistry, Verb, VerbSpec};
use crate::protocol::{Command, RespValue};
use crate::storage::{Expiry, Storage};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn, Level};

/// What the connection should do after writing the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: RespValue,
    /// Close the connection once `reply` is flushed.
    pub close: bool,
}

impl Response {
    pub fn reply(reply: RespValue) -> Self {
        Self { reply, close: false }
    }

    pub fn reply_and_close(reply: RespValue) -> Self {
        Self { reply, close: true }
    }
}

/// Routes commands to the engine. One clone per connection.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("verbs", &self.registry.names())
            .field("backend", &self.storage.backend_tag())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, storage: Arc<dyn Storage>) -> Self {
        Self { registry, storage }
    }

    /// Dispatcher over the standard verb set.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Self::new(Arc::new(CommandRegistry::new()), storage)
    }

    /// Runs one framed request. `None` is a request with no tokens.
    pub async fn dispatch(&self, command: Option<Command>) -> Response {
        match command {
            Some(command) => self.dispatch_command(&command).await,
            None => Response::reply(CommandError::EmptyCommand.to_reply()),
        }
    }

    /// Runs one command and encodes any error as `-ERR ...`.
    pub async fn dispatch_command(&self, command: &Command) -> Response {
        if tracing::enabled!(Level::DEBUG) {
            debug!(
                command = command.verb(),
                args = ?printable(command.args()),
                "request"
            );
        }

        match self.try_dispatch(command).await {
            Ok(response) => response,
            Err(e) => {
                match e.kind() {
                    ErrorKind::UnknownCommand => {
                        warn!(command = command.verb(), "unknown command")
                    }
                    _ => warn!(command = command.verb(), error = %e, "command failed"),
                }
                Response::reply(e.to_reply())
            }
        }
    }

    async fn try_dispatch(&self, command: &Command) -> CommandResult<Response> {
        let verb = command.verb();

        // Probes are answered before lookup, and without a warning.
        if CommandRegistry::is_probe(verb) {
            return Ok(Response::reply(
                CommandError::UnknownCommand(verb.to_string()).to_reply(),
            ));
        }

        let spec = self
            .registry
            .lookup(verb)
            .ok_or_else(|| CommandError::UnknownCommand(verb.to_string()))?;

        if !spec.arity.accepts(command.token_count()) {
            return Err(CommandError::WrongArity(spec.name.to_string()));
        }

        execute(spec, self.storage.as_ref(), command.args()).await
    }
}

/// Runs a command against `store`.
///
/// `args` excludes the verb. Arguments that do not fit the verb's shape are
/// answered with the arity error for `spec.name`.
pub async fn execute(spec: &VerbSpec, store: &dyn Storage, args: &[Bytes]) -> CommandResult<Response> {
    let wrong_arity = || CommandError::WrongArity(spec.name.to_string());

    let reply = match (spec.verb, args) {
        (Verb::Ping, _) => RespValue::pong(),
        (Verb::Quit, []) => return Ok(Response::reply_and_close(RespValue::ok())),
        (Verb::Get, [key]) => match engine::get(store, key).await? {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        },
        (Verb::Set, [key, value, options @ ..]) => {
            let expiry = parse_set_expiry(options)?;
            engine::set(store, key, value, expiry).await?;
            RespValue::ok()
        }
        (Verb::Del, [_, ..]) => RespValue::integer(engine::del(store, args).await?),
        (Verb::Ttl, [key]) => RespValue::integer(engine::ttl(store, key).await?),
        (Verb::Pttl, [key]) => RespValue::integer(engine::pttl(store, key).await?),
        (Verb::Expire, [key, secs]) => {
            let expiry = parse_expiry(secs)?;
            RespValue::integer(engine::expire(store, key, expiry).await?)
        }
        (Verb::Exists, [_, ..]) => RespValue::integer(engine::exists(store, args).await?),
        (Verb::Rename, [from, to]) => {
            engine::rename(store, from, to).await?;
            RespValue::ok()
        }
        _ => return Err(wrong_arity()),
    };

    Ok(Response::reply(reply))
}

/// Parses the optional `EX seconds` tail of `SET`.
fn parse_set_expiry(options: &[Bytes]) -> CommandResult<Expiry> {
    match options {
        [] => Ok(Expiry::NONE),
        [keyword, secs] => {
            if !keyword.eq_ignore_ascii_case(b"ex") {
                return Err(CommandError::Syntax);
            }
            parse_expiry(secs)
        }
        _ => Err(CommandError::Syntax),
    }
}

/// Parses an expiry in seconds within `[0, MAX_EXPIRY_SECS]`.
///
/// Only plain decimal digits are accepted, so `+10` is rejected.
fn parse_expiry(token: &[u8]) -> CommandResult<Expiry> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return Err(CommandError::InvalidInteger);
    }
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .and_then(Expiry::from_secs)
        .ok_or(CommandError::InvalidInteger)
}

fn printable(args: &[Bytes]) -> Vec<std::borrow::Cow<'_, str>> {
    args.iter().map(|a| String::from_utf8_lossy(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::{Arity, VerbSpec};
    use crate::storage::{MemoryStore, StorageOp};
    use crate::testing::RecordingStore;

    fn command(parts: &[&str]) -> Option<Command> {
        Command::from_tokens(crate::testing::args(parts))
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        (Dispatcher::with_storage(store.clone()), store)
    }

    async fn run(d: &Dispatcher, parts: &[&str]) -> RespValue {
        d.dispatch(command(parts)).await.reply
    }

    async fn run_integer(d: &Dispatcher, parts: &[&str]) -> i64 {
        match run(d, parts).await {
            RespValue::Integer(n) => n,
            other => panic!("expected an integer reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_and_quit() {
        let (d, _) = dispatcher();

        assert_eq!(d.dispatch(command(&["PING"])).await, Response::reply(RespValue::pong()));
        assert_eq!(run(&d, &["ping", "hello"]).await, RespValue::pong());

        let quit = d.dispatch(command(&["QUIT"])).await;
        assert_eq!(quit, Response::reply_and_close(RespValue::ok()));
    }

    #[tokio::test]
    async fn test_verbs_are_case_insensitive() {
        let (d, _) = dispatcher();
        assert_eq!(run(&d, &["SeT", "k", "v"]).await, RespValue::ok());
        assert_eq!(run(&d, &["GET", "k"]).await, RespValue::bulk_string(Bytes::from("v")));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (d, store) = dispatcher();
        assert_eq!(
            run(&d, &["foo"]).await,
            RespValue::error("ERR unknown command: foo")
        );
        assert_eq!(
            run(&d, &["FOO", "bar"]).await,
            RespValue::error("ERR unknown command: foo")
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe_verbs_rejected() {
        let (d, store) = dispatcher();
        assert_eq!(
            run(&d, &["INFO"]).await,
            RespValue::error("ERR unknown command: info")
        );
        assert_eq!(
            run(&d, &["command", "docs"]).await,
            RespValue::error("ERR unknown command: command")
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe_verbs_rejected_even_if_registered() {
        let registry = CommandRegistry::with_verbs(&[VerbSpec::new(
            "info",
            Verb::Ping,
            Arity::AtLeast(1),
        )]);
        let d = Dispatcher::new(Arc::new(registry), Arc::new(MemoryStore::new()));
        assert_eq!(
            run(&d, &["info"]).await,
            RespValue::error("ERR unknown command: info")
        );
    }

    #[tokio::test]
    async fn test_empty_request() {
        let (d, _) = dispatcher();
        assert_eq!(
            d.dispatch(None).await.reply,
            RespValue::error("ERR wrong number of arguments")
        );
    }

    #[tokio::test]
    async fn test_arity_errors_never_touch_storage() {
        let (d, store) = dispatcher();
        let cases: &[(&[&str], &str)] = &[
            (&["get"], "get"),
            (&["get", "a", "b"], "get"),
            (&["set", "k"], "set"),
            (&["set", "k", "v", "EX"], "set"),
            (&["set", "k", "v", "EX", "1", "NX"], "set"),
            (&["del"], "del"),
            (&["unlink"], "unlink"),
            (&["exists"], "exists"),
            (&["ttl"], "ttl"),
            (&["pttl", "a", "b"], "pttl"),
            (&["expire", "k"], "expire"),
            (&["rename", "a"], "rename"),
            (&["quit", "now"], "quit"),
        ];

        for (parts, name) in cases {
            assert_eq!(
                run(&d, parts).await,
                RespValue::error(format!(
                    "ERR wrong number of arguments for '{}' command",
                    name
                )),
                "{:?}",
                parts
            );
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_expiry_validation() {
        let (d, store) = dispatcher();

        assert_eq!(
            run(&d, &["set", "k", "v", "EX", "630720001"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["set", "k", "v", "EX", "-1"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["set", "k", "v", "EX", "+10"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["set", "k", "v", "EX", "ten"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["set", "k", "v", "EXX", "10"]).await,
            RespValue::error("ERR syntax error")
        );
        assert!(store.calls().is_empty());

        assert_eq!(run(&d, &["set", "k", "v", "ex", "630720000"]).await, RespValue::ok());
        assert_eq!(run(&d, &["ttl", "k"]).await, RespValue::integer(630_720_000));
    }

    #[tokio::test]
    async fn test_set_ex_zero_means_no_expiry() {
        let (d, _) = dispatcher();
        assert_eq!(run(&d, &["set", "k", "v", "EX", "0"]).await, RespValue::ok());
        assert_eq!(run(&d, &["ttl", "k"]).await, RespValue::integer(-1));
        assert_eq!(run(&d, &["pttl", "k"]).await, RespValue::integer(-1));
    }

    #[tokio::test]
    async fn test_ttl_and_pttl() {
        let (d, _) = dispatcher();
        assert_eq!(run(&d, &["ttl", "missing"]).await, RespValue::integer(-2));
        assert_eq!(run(&d, &["pttl", "missing"]).await, RespValue::integer(-2));

        run(&d, &["set", "k", "v", "EX", "100"]).await;
        let secs = run_integer(&d, &["ttl", "k"]).await;
        assert!(secs > 0 && secs <= 100);
        assert_eq!(run(&d, &["pttl", "k"]).await, RespValue::integer(secs * 1000));
    }

    #[tokio::test]
    async fn test_get_missing_is_null() {
        let (d, _) = dispatcher();
        assert_eq!(run(&d, &["get", "nope"]).await, RespValue::null());
    }

    #[tokio::test]
    async fn test_del_and_unlink_reply_requested_count() {
        let (d, _) = dispatcher();
        run(&d, &["set", "a", "1"]).await;

        assert_eq!(run(&d, &["del", "a", "b", "c"]).await, RespValue::integer(3));
        assert_eq!(run(&d, &["unlink", "x", "y"]).await, RespValue::integer(2));
        assert_eq!(run(&d, &["get", "a"]).await, RespValue::null());
    }

    #[tokio::test]
    async fn test_exists() {
        let (d, store) = dispatcher();
        run(&d, &["set", "a", "1"]).await;
        run(&d, &["set", "c", "3"]).await;
        store.clear_calls();

        assert_eq!(run(&d, &["exists", "a", "b", "c"]).await, RespValue::integer(2));
        assert_eq!(store.calls(), vec![StorageOp::Count]);
    }

    #[tokio::test]
    async fn test_expire() {
        let (d, _) = dispatcher();
        assert_eq!(run(&d, &["expire", "missing", "10"]).await, RespValue::integer(0));

        run(&d, &["set", "k", "v"]).await;
        assert_eq!(run(&d, &["expire", "k", "10"]).await, RespValue::integer(1));
        assert_eq!(run(&d, &["expire", "k", "10"]).await, RespValue::integer(1));
        assert_eq!(run(&d, &["get", "k"]).await, RespValue::bulk_string(Bytes::from("v")));

        assert_eq!(
            run(&d, &["expire", "k", "630720001"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["expire", "k", "+5"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&d, &["expire", "k", "-5"]).await,
            RespValue::error("ERR value is not an integer or out of range")
        );
    }

    #[tokio::test]
    async fn test_rename() {
        let (d, _) = dispatcher();
        assert_eq!(
            run(&d, &["rename", "old", "new"]).await,
            RespValue::error("ERR no such key")
        );

        run(&d, &["set", "old", "v", "EX", "100"]).await;
        assert_eq!(run(&d, &["rename", "old", "new"]).await, RespValue::ok());
        assert_eq!(run(&d, &["get", "old"]).await, RespValue::null());
        assert_eq!(run(&d, &["get", "new"]).await, RespValue::bulk_string(Bytes::from("v")));

        let secs = run_integer(&d, &["ttl", "new"]).await;
        assert!(secs > 98 && secs <= 100);
    }

    #[tokio::test]
    async fn test_storage_error_reply() {
        let (d, store) = dispatcher();
        store.fail_on(StorageOp::Get);

        assert_eq!(
            run(&d, &["get", "k"]).await,
            RespValue::error("ERR storage query: get failed: injected failure")
        );

        // The next command on the same dispatcher still runs.
        assert_eq!(run(&d, &["set", "k", "v"]).await, RespValue::ok());
    }

    #[test]
    fn test_parse_expiry() {
        assert_eq!(parse_expiry(b"0").unwrap(), Expiry::NONE);
        assert_eq!(parse_expiry(b"630720000").unwrap().secs(), 630_720_000);
        assert!(matches!(parse_expiry(b"630720001"), Err(CommandError::InvalidInteger)));
        assert!(matches!(parse_expiry(b""), Err(CommandError::InvalidInteger)));
        assert!(matches!(parse_expiry(b"1.5"), Err(CommandError::InvalidInteger)));
        assert!(matches!(parse_expiry(b"+10"), Err(CommandError::InvalidInteger)));
        assert!(matches!(parse_expiry(b" 10"), Err(CommandError::InvalidInteger)));
    }

    #[tokio::test]
    async fn test_misregistered_arity_is_rejected_not_panicking() {
        let registry = CommandRegistry::with_verbs(&[
            VerbSpec::new("get", Verb::Get, Arity::AtLeast(1)),
            VerbSpec::new("rename", Verb::Rename, Arity::AtLeast(1)),
            VerbSpec::new("set", Verb::Set, Arity::AtLeast(1)),
            VerbSpec::new("del", Verb::Del, Arity::AtLeast(1)),
        ]);
        let store = Arc::new(RecordingStore::new());
        let d = Dispatcher::new(Arc::new(registry), store.clone());

        for (parts, name) in [
            (&["get"][..], "get"),
            (&["get", "a", "b"][..], "get"),
            (&["rename", "a"][..], "rename"),
            (&["set", "k"][..], "set"),
            (&["del"][..], "del"),
        ] {
            assert_eq!(
                run(&d, parts).await,
                RespValue::error(format!("ERR wrong number of arguments for '{}' command", name))
            );
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_execute_checks_argument_shape() {
        let store = MemoryStore::new();
        let spec = VerbSpec::new("expire", Verb::Expire, Arity::Exact(3));
        let result = execute(&spec, &store, &crate::testing::args(&["k"])).await;
        assert!(matches!(result, Err(CommandError::WrongArity(name)) if name == "expire"));
    }
}
