//! Durable request store.
//!
//! Requests live in the `media` database of an LMDB environment, keyed by
//! their normalized link and mapped to a one byte status flag. Iteration is
//! key ordered. Ordinals are a view over the pending subset and are
//! recomputed inside the transaction of every call that uses them.

use std::path::{Path, PathBuf};

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use log::{debug, info};

use crate::core::error::{StoreError, StoreResult};

mod status;

pub use status::Status;

pub const MEDIA_DB: &str = "media";

const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub map_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

/// A pending request as shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub ordinal: i64,
    pub identifier: String,
}

pub struct RequestStore {
    env: Env,
    media: Database<Str, Bytes>,
    path: PathBuf,
}

impl RequestStore {
    /// Opens (creating if needed) the environment at `path` and the `media`
    /// database inside it.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment directory is owned by this process and is
        // opened exactly once per `RequestStore`.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let media = env.create_database::<Str, Bytes>(&mut wtxn, Some(MEDIA_DB))?;
        wtxn.commit()?;

        info!("Request store opened at {}", path.display());
        Ok(Self {
            env,
            media,
            path: path.to_path_buf(),
        })
    }

    /// Releases the environment and waits until LMDB has closed it.
    pub fn close(self) {
        let path = self.path;
        self.env.prepare_for_closing().wait();
        info!("Request store at {} closed", path.display());
    }

    /// Pending requests in store order, numbered from 1.
    pub fn list(&self) -> StoreResult<Vec<PendingRequest>> {
        let rtxn = self.env.read_txn()?;
        let mut pending = Vec::new();
        for entry in self.media.iter(&rtxn)? {
            let (identifier, value) = entry?;
            if Status::decode(identifier, value)?.is_pending() {
                pending.push(PendingRequest {
                    ordinal: pending.len() as i64 + 1,
                    identifier: identifier.to_string(),
                });
            }
        }
        Ok(pending)
    }

    /// Upserts `identifier` as pending. The caller is responsible for having
    /// normalized and validated it.
    pub fn add(&self, identifier: &str) -> StoreResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.media
            .put(&mut wtxn, identifier, &[Status::Pending.to_byte()][..])?;
        wtxn.commit()?;
        debug!("Stored pending request {identifier}");
        Ok(())
    }

    /// Deletes the pending request at `ordinal` and returns its identifier.
    pub fn remove(&self, ordinal: i64) -> StoreResult<String> {
        let mut wtxn = self.env.write_txn()?;
        let identifier = self
            .resolve(&wtxn, ordinal)?
            .ok_or(StoreError::NotFound(ordinal))?;
        self.media.delete(&mut wtxn, identifier.as_str())?;
        wtxn.commit()?;
        debug!("Dropped request {identifier}");
        Ok(identifier)
    }

    /// Marks the pending request at `ordinal` done and returns its identifier.
    pub fn complete(&self, ordinal: i64) -> StoreResult<String> {
        let mut wtxn = self.env.write_txn()?;
        let identifier = self
            .resolve(&wtxn, ordinal)?
            .ok_or(StoreError::NotFound(ordinal))?;
        self.media
            .put(&mut wtxn, identifier.as_str(), &[Status::Done.to_byte()][..])?;
        wtxn.commit()?;
        debug!("Completed request {identifier}");
        Ok(identifier)
    }

    /// Direct lookup, regardless of status.
    pub fn get(&self, identifier: &str) -> StoreResult<Option<Status>> {
        let rtxn = self.env.read_txn()?;
        match self.media.get(&rtxn, identifier)? {
            Some(value) => Ok(Some(Status::decode(identifier, value)?)),
            None => Ok(None),
        }
    }

    /// Raw stored bytes for `identifier`.
    pub fn raw(&self, identifier: &str) -> StoreResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.media.get(&rtxn, identifier)?.map(<[u8]>::to_vec))
    }

    // Must run on the same transaction as the mutation that follows it.
    fn resolve(&self, txn: &RoTxn, ordinal: i64) -> StoreResult<Option<String>> {
        if ordinal < 1 {
            return Ok(None);
        }
        let mut seen = 0i64;
        for entry in self.media.iter(txn)? {
            let (identifier, value) = entry?;
            if Status::decode(identifier, value)?.is_pending() {
                seen += 1;
                if seen == ordinal {
                    return Ok(Some(identifier.to_string()));
                }
            }
        }
        Ok(None)
    }
}
