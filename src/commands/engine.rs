//! Semantics Engine
//!
//! Turns each key/value command into the smallest sequence of storage calls
//! that yields the reply a Redis client expects. The store underneath has no
//! transactions, no compare-and-swap and reports no affected-row counts, so
//! some replies are reconstructed here:
//!
//! | Command   | Storage calls                     | Reply                          |
//! |-----------|-----------------------------------|--------------------------------|
//! | `GET`     | get                               | value or nil                   |
//! | `SET`     | set                               | OK                             |
//! | `DEL`     | delete                            | number of keys *requested*     |
//! | `TTL`     | get                               | -2 / -1 / seconds              |
//! | `PTTL`    | get                               | -2 / -1 / milliseconds         |
//! | `EXPIRE`  | get, then set unless unchanged    | 0 or 1                         |
//! | `EXISTS`  | count                             | keys present                   |
//! | `RENAME`  | get, then set + delete            | OK or `no such key`            |
//!
//! ## Read-Modify-Write
//!
//! `EXPIRE` and `RENAME` read a row and then write based on what they read.
//! The two halves are exposed separately ([`plan_expire`] /
//! [`ExpirePlan::commit`], [`plan_rename`] / [`RenamePlan::commit`]) because
//! nothing holds the row between them: a concurrent writer to the same key
//! can land in the gap and the last write, by storage timestamp, wins.
//! `RENAME` is also not atomic across its two keys. If deleting the source
//! fails after the target was written, both keys hold the value and the
//! failure is returned to the caller.

use crate::commands::error::{CommandError, CommandResult};
use crate::storage::{ttl_sentinel, Expiry, RemainingTtl, Storage};
use bytes::Bytes;
use tracing::warn;

/// `GET key`
pub async fn get(store: &dyn Storage, key: &[u8]) -> CommandResult<Option<Bytes>> {
    Ok(store.get(key).await?.map(|record| record.value))
}

/// `SET key value [EX seconds]`
pub async fn set(store: &dyn Storage, key: &[u8], value: &[u8], expiry: Expiry) -> CommandResult<()> {
    store.set(key, value, expiry).await?;
    Ok(())
}

/// `DEL key [key ...]`
///
/// The store does not say how many rows it removed, so the reply is the
/// number of keys asked for.
pub async fn del(store: &dyn Storage, keys: &[Bytes]) -> CommandResult<i64> {
    store.delete(keys).await?;
    Ok(keys.len() as i64)
}

/// `TTL key`: remaining seconds, `-1` without expiry, `-2` when absent.
pub async fn ttl(store: &dyn Storage, key: &[u8]) -> CommandResult<i64> {
    let record = store.get(key).await?;
    Ok(ttl_sentinel(record.as_ref()))
}

/// `PTTL key`: like [`ttl`] in milliseconds. Sentinels are not scaled.
pub async fn pttl(store: &dyn Storage, key: &[u8]) -> CommandResult<i64> {
    let secs = ttl(store, key).await?;
    Ok(if secs >= 0 { secs * 1000 } else { secs })
}

/// `EXISTS key [key ...]`
pub async fn exists(store: &dyn Storage, keys: &[Bytes]) -> CommandResult<i64> {
    Ok(store.count(keys).await? as i64)
}

/// What the read half of `EXPIRE` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpireStep {
    /// The key does not exist. Reply 0.
    Missing,
    /// The row already carries the requested expiry. Reply 1, write nothing.
    Unchanged,
    /// The row must be rewritten with the new expiry.
    Rewrite(ExpirePlan),
}

/// Pending rewrite for `EXPIRE`, holding the value that was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirePlan {
    key: Bytes,
    value: Bytes,
    expiry: Expiry,
}

impl ExpirePlan {
    /// Rewrites the row with the value read earlier and the new expiry.
    pub async fn commit(self, store: &dyn Storage) -> CommandResult<()> {
        store.set(&self.key, &self.value, self.expiry).await?;
        Ok(())
    }
}

/// Read half of `EXPIRE`.
///
/// An expiry of zero clears the expiry; it counts as unchanged on a row
/// that has none.
pub async fn plan_expire(store: &dyn Storage, key: &Bytes, expiry: Expiry) -> CommandResult<ExpireStep> {
    let record = match store.get(key).await? {
        Some(record) => record,
        None => return Ok(ExpireStep::Missing),
    };

    if record.ttl == expiry.as_remaining() {
        return Ok(ExpireStep::Unchanged);
    }

    Ok(ExpireStep::Rewrite(ExpirePlan {
        key: key.clone(),
        value: record.value,
        expiry,
    }))
}

/// `EXPIRE key seconds`
pub async fn expire(store: &dyn Storage, key: &Bytes, expiry: Expiry) -> CommandResult<i64> {
    match plan_expire(store, key, expiry).await? {
        ExpireStep::Missing => Ok(0),
        ExpireStep::Unchanged => Ok(1),
        ExpireStep::Rewrite(plan) => {
            plan.commit(store).await?;
            Ok(1)
        }
    }
}

/// Pending `RENAME`, holding the source row as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    from: Bytes,
    to: Bytes,
    value: Bytes,
    ttl: RemainingTtl,
}

impl RenamePlan {
    /// Remaining lifetime the target will be written with.
    pub fn ttl(&self) -> RemainingTtl {
        self.ttl
    }

    /// Writes the target, then deletes the source.
    pub async fn commit(self, store: &dyn Storage) -> CommandResult<()> {
        if self.from == self.to {
            return Ok(());
        }

        store.set(&self.to, &self.value, self.ttl.as_expiry()).await?;

        if let Err(e) = store.delete(std::slice::from_ref(&self.from)).await {
            warn!(
                from = %String::from_utf8_lossy(&self.from),
                to = %String::from_utf8_lossy(&self.to),
                error = %e,
                "rename wrote the new key but could not delete the old one"
            );
            return Err(e.into());
        }

        Ok(())
    }
}

/// Read half of `RENAME`: fails with `no such key` when the source is absent.
pub async fn plan_rename(store: &dyn Storage, from: &Bytes, to: &Bytes) -> CommandResult<RenamePlan> {
    let record = store.get(from).await?.ok_or(CommandError::NoSuchKey)?;

    Ok(RenamePlan {
        from: from.clone(),
        to: to.clone(),
        value: record.value,
        ttl: record.ttl,
    })
}

/// `RENAME key newkey`
///
/// The target keeps the source's *remaining* lifetime at the time of the read.
pub async fn rename(store: &dyn Storage, from: &Bytes, to: &Bytes) -> CommandResult<()> {
    plan_rename(store, from, to).await?.commit(store).await
}
