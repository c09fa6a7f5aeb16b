// content store for the cache: block-addressed, owned line buffers

use std::collections::HashMap;

use crate::packet::{Addr, Packet};

/// Block-sized lines keyed by block address. Presence means valid; lines
/// accumulate for the lifetime of the store (no eviction). Every line
/// buffer is exclusively owned here and never aliased to a packet payload.
pub struct CacheStore {
    block_size: u64,
    lines: HashMap<Addr, Box<[u8]>>,
}

impl CacheStore {
    pub fn new(block_size: u64) -> CacheStore {
        assert!(block_size.is_power_of_two());
        CacheStore {
            block_size,
            lines: HashMap::new(),
        }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.lines.contains_key(&crate::packet::block_align(addr, self.block_size))
    }

    /// Apply `pkt` against its line in place. Returns whether it hit.
    /// Writes update the cached copy, reads fill the payload from it.
    pub fn access(&mut self, pkt: &mut Packet) -> bool {
        let block = pkt.block_addr(self.block_size);
        let Some(line) = self.lines.get_mut(&block) else {
            return false;
        };
        if pkt.is_write() {
            pkt.copy_to_block(line, self.block_size);
        } else if pkt.is_read() {
            pkt.copy_from_block(line, self.block_size);
        } else {
            panic!("unknown packet type: {}", pkt);
        }
        true
    }

    /// Allocate a line from a block-sized fetch response. Returns the block
    /// address the line was stored under.
    pub fn fill(&mut self, resp: &Packet) -> Addr {
        assert_eq!(
            resp.size as u64, self.block_size,
            "fill from a non-block-sized response: {}",
            resp
        );
        let block = resp.block_addr(self.block_size);
        let mut line = vec![0u8; self.block_size as usize].into_boxed_slice();
        line.copy_from_slice(&resp.data);
        self.lines.insert(block, line);
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_store() -> CacheStore {
        let mut store = CacheStore::new(64);
        let mut fetch = Packet::read(0x40, 64);
        fetch.data = (0..64).collect();
        fetch.make_response();
        store.fill(&fetch);
        store
    }

    #[test]
    fn absent_block_misses() {
        let mut store = CacheStore::new(64);
        let mut pkt = Packet::read(0x40, 4);
        assert!(!store.access(&mut pkt));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn fill_makes_reads_hit() {
        let mut store = filled_store();
        assert!(store.contains(0x7f));
        assert!(!store.contains(0x80));

        let mut rd = Packet::read(0x42, 2);
        assert!(store.access(&mut rd));
        assert_eq!(rd.data, vec![2, 3]);
    }

    #[test]
    fn write_hit_updates_line_in_place() {
        let mut store = filled_store();
        let mut wr = Packet::write(0x44, vec![0xde, 0xad]);
        assert!(store.access(&mut wr));

        let mut rd = Packet::read(0x44, 2);
        store.access(&mut rd);
        assert_eq!(rd.data, vec![0xde, 0xad]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn line_is_a_copy_of_the_response() {
        let mut store = CacheStore::new(64);
        let mut fetch = Packet::read(0x0, 64);
        fetch.data = vec![7; 64];
        fetch.make_response();
        store.fill(&fetch);
        // mutating the response afterwards must not affect the line
        fetch.data = vec![0; 64];
        let mut rd = Packet::read(0x0, 1);
        store.access(&mut rd);
        assert_eq!(rd.data, vec![7]);
    }

    #[test]
    #[should_panic]
    fn short_fill_is_fatal() {
        let mut store = CacheStore::new(64);
        let mut fetch = Packet::read(0x0, 16);
        fetch.make_response();
        store.fill(&fetch);
    }
}
