//! Durable range reservation.
//!
//! Every kind owns a pool of identifiers starting at `1`. Identifiers are
//! handed out from an in-memory cursor that may only move inside the range
//! already covered by the kind's persisted high-water mark (the exclusive
//! `ceiling`). When a request needs identifiers past the ceiling, enough whole
//! blocks are reserved by writing the new ceiling to the [`StateFile`] first;
//! only after that write succeeds are identifiers from the new range returned.
//!
//! On startup cursors resume at the persisted ceilings. Anything between the
//! last issued identifier and the ceiling is skipped, never reissued.

use crate::server::telemetry::increment_blocks_reserved;
use idalloc_tonic_core::Error;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Identifiers cannot be zero.
const FIRST_ID: i64 = 1;

const STATE_VERSION: u32 = 1;

/// On-disk form of the high-water marks.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    ceilings: BTreeMap<String, i64>,
}

/// JSON file holding each kind's high-water mark.
///
/// Writes go to a sibling temporary file which is synced and then renamed
/// over the previous state. The containing directory is synced after the
/// rename, so once [`StateFile::store`] returns the new state survives a
/// crash or power loss.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted ceilings. A missing file is an empty state.
    pub fn load(&self) -> anyhow::Result<BTreeMap<String, i64>> {
        use anyhow::Context;

        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let state: PersistedState = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        if state.version != STATE_VERSION {
            anyhow::bail!(
                "{} has state version {}, expected {}",
                self.path.display(),
                state.version,
                STATE_VERSION
            );
        }
        if let Some((kind, ceiling)) = state.ceilings.iter().find(|(_, c)| **c < FIRST_ID) {
            anyhow::bail!(
                "{} has an invalid ceiling {} for kind `{}`",
                self.path.display(),
                ceiling,
                kind
            );
        }
        Ok(state.ceilings)
    }

    /// Durably replaces the persisted ceilings.
    pub fn store(&self, ceilings: &BTreeMap<String, i64>) -> std::io::Result<()> {
        let state = PersistedState {
            version: STATE_VERSION,
            ceilings: ceilings.clone(),
        };
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, &state)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        sync_parent_dir(&self.path)
    }
}

/// Flushes the directory entry of `path` so a completed rename is durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

// Directory handles cannot be synced on this platform.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[derive(Debug, Default)]
struct Pools {
    /// Persisted exclusive upper bound per kind.
    ceilings: BTreeMap<String, i64>,
    /// Next identifier to hand out per kind. Always `<= ceiling`.
    cursors: HashMap<String, i64>,
}

/// Per-kind identifier pools backed by block reservations.
#[derive(Debug)]
pub struct Reservations {
    pools: Mutex<Pools>,
    block_size: i64,
    store: Option<StateFile>,
}

impl Reservations {
    /// Pools that live only as long as the process.
    pub fn in_memory(block_size: i64) -> Self {
        Self {
            pools: Mutex::new(Pools::default()),
            block_size: block_size.max(1),
            store: None,
        }
    }

    /// Pools resumed from, and reserved through, `store`.
    pub fn open(block_size: i64, store: StateFile) -> anyhow::Result<Self> {
        let ceilings = store.load()?;
        let cursors = ceilings
            .iter()
            .map(|(kind, ceiling)| (kind.clone(), *ceiling))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %store.path().display(),
            kinds = ceilings.len(),
            "resumed allocation state"
        );

        Ok(Self {
            pools: Mutex::new(Pools { ceilings, cursors }),
            block_size: block_size.max(1),
            store: Some(store),
        })
    }

    /// Hands out `count` consecutive identifiers from `kind`.
    ///
    /// Either every identifier in the answer is covered by a persisted
    /// reservation, or nothing is returned and the pool is unchanged.
    pub fn allocate(&self, kind: &str, count: u32) -> Result<Vec<i64>, Error> {
        let mut pools = self.pools.lock();

        let ceiling = pools.ceilings.get(kind).copied().unwrap_or(FIRST_ID);
        let start = pools.cursors.get(kind).copied().unwrap_or(ceiling);
        let end = start
            .checked_add(i64::from(count))
            .ok_or_else(|| Error::Exhausted {
                kind: kind.to_owned(),
            })?;

        if end > ceiling {
            let new_ceiling = self.next_ceiling(ceiling, end);
            self.reserve(&mut pools, kind, new_ceiling)?;
        }

        pools.cursors.insert(kind.to_owned(), end);
        Ok((start..end).collect())
    }

    /// Smallest ceiling past `end` made of whole blocks above `ceiling`,
    /// capped at `i64::MAX` near the top of the space.
    fn next_ceiling(&self, ceiling: i64, end: i64) -> i64 {
        let shortfall = end - ceiling;
        let blocks = shortfall / self.block_size + i64::from(shortfall % self.block_size != 0);
        blocks
            .checked_mul(self.block_size)
            .and_then(|span| ceiling.checked_add(span))
            .unwrap_or(i64::MAX)
    }

    fn reserve(&self, pools: &mut Pools, kind: &str, new_ceiling: i64) -> Result<(), Error> {
        if let Some(store) = &self.store {
            let mut ceilings = pools.ceilings.clone();
            ceilings.insert(kind.to_owned(), new_ceiling);
            store.store(&ceilings).map_err(|e| Error::Storage {
                context: format!("persisting {}: {e}", store.path().display()),
            })?;
            pools.ceilings = ceilings;
        } else {
            pools.ceilings.insert(kind.to_owned(), new_ceiling);
        }

        increment_blocks_reserved();
        #[cfg(feature = "tracing")]
        tracing::debug!(kind, new_ceiling, "reserved identifier block");
        Ok(())
    }

    /// The next identifier `kind` would hand out.
    #[cfg(test)]
    pub fn peek(&self, kind: &str) -> i64 {
        let pools = self.pools.lock();
        let ceiling = pools.ceilings.get(kind).copied().unwrap_or(FIRST_ID);
        pools.cursors.get(kind).copied().unwrap_or(ceiling)
    }
}
