// pass-through sibling of the cache: same single-request blocking
// discipline, no store. Every accepted request is forwarded downstream
// verbatim after a fixed delay; responses route back to the instruction
// or data port by the request's inst_fetch flag.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::config::SimConfig;
use crate::event_queue::{schedule, EventSender};
use crate::packet::{AddrRange, Packet};
use crate::port::{CpuSidePort, Downstream, MemSidePort, Upstream};

pub struct BlockingProxy {
    pub iport: CpuSidePort,
    pub dport: CpuSidePort,
    pub mem_side: MemSidePort,
    delay: u64,
    blocked: bool,
    tx: EventSender,
    self_ref: Weak<RefCell<BlockingProxy>>,
}

impl BlockingProxy {
    pub fn new(cfg: &SimConfig, tx: EventSender) -> Rc<RefCell<BlockingProxy>> {
        let proxy = Rc::new(RefCell::new(BlockingProxy {
            iport: CpuSidePort::new("proxy.iport", tx.clone()),
            dport: CpuSidePort::new("proxy.dport", tx.clone()),
            mem_side: MemSidePort::new("proxy.mem_side"),
            delay: cfg.proxy_delay,
            blocked: false,
            tx,
            self_ref: Weak::new(),
        }));
        proxy.borrow_mut().self_ref = Rc::downgrade(&proxy);
        proxy
    }

    fn upstream_port(&mut self, pkt: &Packet) -> &mut CpuSidePort {
        if pkt.flags.inst_fetch {
            &mut self.iport
        } else {
            &mut self.dport
        }
    }
}

impl Downstream for BlockingProxy {
    fn try_recv_request(&mut self, pkt: Packet) -> Result<(), Packet> {
        trace!("proxy: request {}", pkt);
        let blocked = self.blocked;
        let port = self.upstream_port(&pkt);
        if port.has_retained() || port.needs_retry || blocked {
            debug!("proxy: busy, rejecting {}", pkt);
            port.needs_retry = true;
            return Err(pkt);
        }
        self.blocked = true;
        let this = self.self_ref.clone();
        schedule(&self.tx, self.delay, move || {
            let this = this.upgrade().expect("proxy dropped with forward pending");
            this.borrow_mut().mem_side.send_request(pkt);
        });
        Ok(())
    }

    fn recv_resp_retry(&mut self) {
        // only one response can be in flight, so only one port can hold it
        if self.iport.has_retained() {
            self.iport.retry_resp();
        } else {
            self.dport.retry_resp();
        }
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.mem_side.send_functional(pkt);
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        self.mem_side.addr_ranges()
    }
}

impl Upstream for BlockingProxy {
    fn try_recv_response(&mut self, pkt: Packet) -> Result<(), Packet> {
        trace!("proxy: response {}", pkt);
        assert!(self.blocked, "proxy: response while not blocked");
        self.blocked = false;
        self.upstream_port(&pkt).send_response(pkt);
        self.iport.send_retry_req();
        self.dport.send_retry_req();
        Ok(())
    }

    fn recv_req_retry(&mut self) {
        self.mem_side.retry_req();
    }

    fn recv_range_change(&mut self) {
        self.iport.send_range_change();
        self.dport.send_range_change();
    }
}
