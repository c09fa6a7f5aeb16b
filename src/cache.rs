// single-block blocking cache: accepts one request at a time, looks it up
// after a fixed latency, fetches the whole block from downstream on a miss

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, info, trace};

use crate::config::SimConfig;
use crate::event_queue::{schedule, EventSender};
use crate::packet::{AddrRange, Packet};
use crate::port::{CpuSidePort, Downstream, MemSidePort, Upstream};
use crate::stats::CacheStats;
use crate::store::CacheStore;

pub struct BlockingCache {
    pub cpu_side: CpuSidePort,
    pub mem_side: MemSidePort,
    latency: u64,
    store: CacheStore,
    blocked: bool,
    /// The request a miss fetch is outstanding for.
    origin: Option<Packet>,
    stats: CacheStats,
    tx: EventSender,
    self_ref: Weak<RefCell<BlockingCache>>,
}

impl BlockingCache {
    pub fn new(cfg: &SimConfig, tx: EventSender) -> Rc<RefCell<BlockingCache>> {
        let cache = Rc::new(RefCell::new(BlockingCache {
            cpu_side: CpuSidePort::new("cache.cpu_side", tx.clone()),
            mem_side: MemSidePort::new("cache.mem_side"),
            latency: cfg.cache_latency,
            store: CacheStore::new(cfg.block_size),
            blocked: false,
            origin: None,
            stats: CacheStats::default(),
            tx,
            self_ref: Weak::new(),
        }));
        cache.borrow_mut().self_ref = Rc::downgrade(&cache);
        cache
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn schedule_access(&self, pkt: Packet) {
        let this = self.self_ref.clone();
        schedule(&self.tx, self.latency, move || {
            let this = this.upgrade().expect("cache dropped with access pending");
            this.borrow_mut().access(pkt);
        });
    }

    /// Latency-deferred lookup of an accepted request.
    fn access(&mut self, mut pkt: Packet) {
        if !pkt.is_cacheable() {
            debug!("cache: uncacheable, forwarding {}", pkt);
            self.mem_side.send_request(pkt);
            return;
        }
        if self.store.access(&mut pkt) {
            self.stats.record_hit();
            info!("cache: hit {}", pkt);
            pkt.make_response();
            self.respond(pkt);
        } else {
            self.stats.record_miss();
            info!("cache: miss {}", pkt);
            let fetch = Packet::read(
                pkt.block_addr(self.store.block_size()),
                self.store.block_size() as usize,
            );
            self.origin = Some(pkt);
            self.mem_side.send_request(fetch);
        }
    }

    fn handle_response(&mut self, pkt: Packet) {
        trace!("cache: response {}", pkt);
        if let Some(mut origin) = self.origin.take() {
            let block = self.store.fill(&pkt);
            let hit = self.store.access(&mut origin);
            assert!(hit, "cache: miss after filling block 0x{:x}", block);
            origin.make_response();
            self.respond(origin);
        } else {
            // uncacheable pass-through, already a response
            self.respond(pkt);
        }
    }

    fn respond(&mut self, pkt: Packet) {
        assert!(self.blocked, "cache: response while not blocked");
        self.blocked = false;
        self.cpu_side.send_response(pkt);
        self.cpu_side.send_retry_req();
    }
}

impl Downstream for BlockingCache {
    fn try_recv_request(&mut self, pkt: Packet) -> Result<(), Packet> {
        trace!("cache: request {}", pkt);
        if self.cpu_side.has_retained() || self.cpu_side.needs_retry || self.blocked {
            debug!("cache: busy, rejecting {}", pkt);
            self.cpu_side.needs_retry = true;
            return Err(pkt);
        }
        self.blocked = true;
        self.schedule_access(pkt);
        Ok(())
    }

    fn recv_resp_retry(&mut self) {
        self.cpu_side.retry_resp();
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        if !pkt.is_cacheable() {
            self.mem_side.send_functional(pkt);
            return;
        }
        if self.store.access(pkt) {
            pkt.make_response();
        } else {
            self.mem_side.send_functional(pkt);
        }
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        self.mem_side.addr_ranges()
    }
}

impl Upstream for BlockingCache {
    fn try_recv_response(&mut self, pkt: Packet) -> Result<(), Packet> {
        self.handle_response(pkt);
        Ok(())
    }

    fn recv_req_retry(&mut self) {
        self.mem_side.retry_req();
    }

    fn recv_range_change(&mut self) {
        self.cpu_side.send_range_change();
    }
}
