//! Bounded buffer of recent GNSS log entries feeding the packet builder.
//!
//! Entries are keyed by a monotonically increasing insertion index; the
//! oldest entry is evicted once the pile exceeds [`DEPTH_PILE_MAX`]. Each
//! entry carries a remaining-burst counter: once it reaches zero the entry
//! no longer makes a slot eligible for transmission.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::constants::{DEPTH_PILE_MAX, MAX_GPS_ENTRIES_IN_PACKET};
use crate::logging::GpsLogEntry;

struct PileEntry {
    entry: GpsLogEntry,
    burst_counter: u32,
}

#[derive(Default)]
pub struct GpsDepthPile {
    entries: BTreeMap<u32, PileEntry>,
    num_seen: u32,
    msg_index: u32,
}

impl GpsDepthPile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.num_seen = 0;
        self.msg_index = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry; evicts the oldest once the pile is full.
    pub fn store(&mut self, entry: GpsLogEntry, burst_counter: u32) {
        let index = self.num_seen;
        self.entries.insert(
            index,
            PileEntry {
                entry,
                burst_counter,
            },
        );
        self.num_seen += 1;
        if self.entries.len() > DEPTH_PILE_MAX {
            let oldest = self.num_seen - DEPTH_PILE_MAX as u32 - 1;
            trace!(index = oldest, "evicting oldest depth pile entry");
            self.entries.remove(&oldest);
        }
        debug!(
            held = self.entries.len(),
            seen = self.num_seen,
            "depth pile updated"
        );
    }

    /// Number of entries still eligible for transmission.
    pub fn eligible(&self) -> usize {
        self.entries.values().filter(|e| e.burst_counter > 0).count()
    }

    /// Most recent entry with a non-zero burst counter.
    pub fn retrieve_latest(&self) -> Option<GpsLogEntry> {
        self.entries
            .values()
            .rev()
            .find(|e| e.burst_counter > 0)
            .map(|e| e.entry)
    }

    /// Select the next transmission slot and hand out its entries in
    /// time-descending order, decrementing the burst counter of every entry
    /// used (floored at zero).
    ///
    /// The pile is divided into slots of up to [`MAX_GPS_ENTRIES_IN_PACKET`]
    /// entries counted back from the most recent; the slot cursor rotates
    /// over `ceil(depth_pile_size / 4)` slots and settles on the first slot
    /// holding at least one eligible entry. A slot with a single eligible
    /// entry degrades to that one entry (short packet); otherwise the whole
    /// slot is used (long packet).
    pub fn retrieve(&mut self, depth_pile_size: usize) -> Vec<GpsLogEntry> {
        let max_index = (depth_pile_size + MAX_GPS_ENTRIES_IN_PACKET - 1)
            / MAX_GPS_ENTRIES_IN_PACKET;
        let mut span = MAX_GPS_ENTRIES_IN_PACKET.min(depth_pile_size) as u32;
        if self.num_seen < span {
            span = self.num_seen;
        }
        if span == 0 || max_index == 0 {
            return Vec::new();
        }

        let mut eligible_count = 0u32;
        let mut first_eligible: Option<u32> = None;
        let mut slot = 0u32;
        let max_msg_index = self.msg_index + max_index as u32;

        // Find the first slot with at least one eligible entry
        while self.msg_index < max_msg_index {
            slot = self.msg_index % max_index as u32;
            for k in 0..span {
                let base = i64::from(self.num_seen) - i64::from(span * (slot + 1));
                let idx = base + i64::from(k);
                if idx < 0 {
                    break;
                }
                match self.entries.get(&(idx as u32)) {
                    Some(e) => {
                        if e.burst_counter > 0 {
                            eligible_count += 1;
                            if first_eligible.is_none() {
                                first_eligible = Some(idx as u32);
                            }
                        }
                    },
                    None => break,
                }
            }
            if eligible_count > 0 {
                trace!(slot, eligible_count, "found eligible depth pile slot");
                break;
            }
            self.msg_index += 1;
        }

        if self.msg_index == max_msg_index {
            debug!("no eligible depth pile slot found");
            return Vec::new();
        }

        let mut out = Vec::new();
        if eligible_count == 1 {
            let idx = first_eligible.unwrap_or(0);
            if let Some(e) = self.entries.get_mut(&idx) {
                e.burst_counter = e.burst_counter.saturating_sub(1);
                out.push(e.entry);
            }
        } else {
            for k in 0..span {
                let idx = self.num_seen - span * (slot + 1) + k;
                if let Some(e) = self.entries.get_mut(&idx) {
                    e.burst_counter = e.burst_counter.saturating_sub(1);
                    out.push(e.entry);
                }
            }
            // Latest first
            out.reverse();
        }

        self.msg_index += 1;
        out
    }
}
