//! Reassembly of chunked GELF datagrams.
//!
//! [`Defragmenter`] keeps one [`ChunkSet`] per in-flight message id in a
//! table behind a single mutex. The lock is held only while a chunk is merged
//! or a set is evicted; decompression and decoding of completed payloads
//! happen in the caller after the lock is released. A reaper thread removes
//! sets that have not completed within the expiry window so lost chunks
//! cannot pin memory.

use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::ProtocolError;

use super::chunk::{ChunkHeader, MessageId, is_chunked};

/// How long a partial message may wait for its remaining chunks.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(5);
/// How often the reaper scans for expired sets.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on concurrently pending reassemblies.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Tuning for [`Defragmenter`].
#[derive(Clone, Debug)]
pub struct ReassemblyConfig {
    pub expiry: Duration,
    pub reap_interval: Duration,
    pub max_pending: usize,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_EXPIRY,
            reap_interval: DEFAULT_REAP_INTERVAL,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Partial message collected from chunks sharing one id.
#[derive(Debug)]
pub struct ChunkSet {
    slices: Vec<Option<Vec<u8>>>,
    total: u8,
    received: usize,
    first_seen: Instant,
}

impl ChunkSet {
    fn new(total: u8, now: Instant) -> Self {
        Self {
            slices: vec![None; usize::from(total)],
            total,
            received: 0,
            first_seen: now,
        }
    }

    /// Store a slice. Re-delivering a sequence overwrites it without counting
    /// twice.
    fn insert(&mut self, sequence: u8, slice: &[u8]) {
        let slot = &mut self.slices[usize::from(sequence)];
        if slot.is_none() {
            self.received += 1;
        }
        *slot = Some(slice.to_vec());
    }

    fn is_complete(&self) -> bool {
        self.received == usize::from(self.total)
    }

    fn assemble(self) -> Vec<u8> {
        let len = self.slices.iter().flatten().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(len);
        for slice in self.slices.into_iter().flatten() {
            payload.extend_from_slice(&slice);
        }
        payload
    }

    fn is_expired(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.first_seen) >= expiry
    }
}

type ChunkTable = HashMap<MessageId, ChunkSet>;

/// Routes datagrams and rebuilds chunked payloads.
pub struct Defragmenter {
    table: Arc<Mutex<ChunkTable>>,
    config: ReassemblyConfig,
    shutdown: Option<Sender<()>>,
    reaper: Option<JoinHandle<()>>,
}

impl Defragmenter {
    /// Create a defragmenter and start its reaper thread.
    pub fn new(config: ReassemblyConfig) -> Self {
        let table = Arc::new(Mutex::new(ChunkTable::new()));
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let reaper = spawn_reaper(
            Arc::clone(&table),
            shutdown_rx,
            config.expiry,
            config.reap_interval,
        );
        Self {
            table,
            config,
            shutdown: Some(shutdown_tx),
            reaper: Some(reaper),
        }
    }

    /// Feed one datagram.
    ///
    /// Returns the complete payload when the datagram finishes a message, or
    /// `None` while chunks are still outstanding. Bare datagrams are complete
    /// on arrival.
    pub fn accept(&self, datagram: &[u8]) -> Result<Option<Vec<u8>>, ProtocolError> {
        if !is_chunked(datagram) {
            return Ok(Some(datagram.to_vec()));
        }
        let (header, slice) = ChunkHeader::parse(datagram)?;
        self.merge(header, slice, Instant::now())
    }

    fn merge(
        &self,
        header: ChunkHeader,
        slice: &[u8],
        now: Instant,
    ) -> Result<Option<Vec<u8>>, ProtocolError> {
        let mut table = self.table.lock();
        match table.get(&header.id).map(|set| set.total) {
            Some(existing) if existing != header.total => {
                table.remove(&header.id);
                return Err(ProtocolError::ConflictingTotal {
                    existing,
                    received: header.total,
                });
            }
            Some(_) => {}
            None if table.len() >= self.config.max_pending => {
                return Err(ProtocolError::TooManyPending {
                    limit: self.config.max_pending,
                });
            }
            None => {}
        }
        let set = table
            .entry(header.id)
            .or_insert_with(|| ChunkSet::new(header.total, now));
        set.insert(header.sequence, slice);
        if !set.is_complete() {
            return Ok(None);
        }
        Ok(table.remove(&header.id).map(ChunkSet::assemble))
    }

    /// Drop every partial message older than the expiry window at `now`.
    ///
    /// Returns how many sets were evicted. The reaper thread calls this on its
    /// own schedule; it is public so callers can reap deterministically.
    pub fn evict_expired(&self, now: Instant) -> usize {
        evict(&self.table, now, self.config.expiry)
    }

    /// Number of partial messages currently held.
    pub fn pending(&self) -> usize {
        self.table.lock().len()
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }
}

impl Default for Defragmenter {
    fn default() -> Self {
        Self::new(ReassemblyConfig::default())
    }
}

impl Drop for Defragmenter {
    fn drop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.reaper.take()
            && handle.join().is_err()
        {
            warn!("Defragmenter: reaper thread panicked");
        }
    }
}

impl std::fmt::Debug for Defragmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defragmenter")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}

fn evict(table: &Mutex<ChunkTable>, now: Instant, expiry: Duration) -> usize {
    let mut table = table.lock();
    let before = table.len();
    table.retain(|_, set| !set.is_expired(now, expiry));
    before - table.len()
}

fn spawn_reaper(
    table: Arc<Mutex<ChunkTable>>,
    shutdown: Receiver<()>,
    expiry: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let evicted = evict(&table, Instant::now(), expiry);
                    if evicted > 0 {
                        debug!("Defragmenter evicted {evicted} incomplete messages");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}
