use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

struct PartialTransmission {
    range_end: u64,
    chunks: BTreeMap<u64, Vec<u8>>,
    last_activity: Instant,
}

/// Reassembles chunked `BigData` transmissions.
///
/// Chunks belonging to one transmission share a `(range_start, range_end)`
/// sequence-id range. Reassembly fires once the number of stored chunks
/// equals the range length; the chunks are concatenated in sequence order.
///
/// There is no duplicate guard beyond map semantics (re-inserting a chunk id
/// overwrites silently). The sorter de-duplicates reliable ids before chunks
/// reach the assembler.
#[derive(Default)]
pub struct PacketAssembler {
    partial: HashMap<u64, PartialTransmission>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transmissions currently awaiting more chunks.
    pub fn pending_transmissions(&self) -> usize {
        self.partial.len()
    }

    /// Stores one chunk. Returns the full payload once every chunk in the
    /// range has arrived.
    pub fn process(
        &mut self,
        range_start: u64,
        range_end: u64,
        id: u64,
        body: Vec<u8>,
        now: Instant,
    ) -> Option<Vec<u8>> {
        if range_end < range_start || id < range_start || id > range_end {
            debug!("dropping chunk {id} with invalid range {range_start}..={range_end}");
            return None;
        }

        let partial = self
            .partial
            .entry(range_start)
            .or_insert_with(|| PartialTransmission {
                range_end,
                chunks: BTreeMap::new(),
                last_activity: now,
            });

        // the first chunk fixes the range; later chunks cannot renegotiate
        // the completion count
        if partial.range_end != range_end {
            debug!(
                "dropping chunk {id}: range end {range_end} conflicts with {}",
                partial.range_end
            );
            return None;
        }

        partial.chunks.insert(id, body);
        partial.last_activity = now;

        let expected = partial.range_end - range_start + 1;

        if partial.chunks.len() as u64 != expected {
            return None;
        }

        let partial = self.partial.remove(&range_start).unwrap();
        let total_len = partial.chunks.values().map(Vec::len).sum();

        let mut payload = Vec::with_capacity(total_len);

        for chunk in partial.chunks.into_values() {
            payload.extend_from_slice(&chunk);
        }

        Some(payload)
    }

    /// Discards transmissions that have not seen a chunk within `max_age`.
    /// A range that old has lost its sender or its remaining retries.
    pub fn prune(&mut self, now: Instant, max_age: Duration) {
        self.partial.retain(|range_start, partial| {
            let keep = now.duration_since(partial.last_activity) <= max_age;

            if !keep {
                debug!(
                    "discarding incomplete transmission starting at {range_start} ({} chunks)",
                    partial.chunks.len()
                );
            }

            keep
        });
    }
}
