// backing store terminus: flat zero-filled buffer behind one timing port,
// one request in service at a time

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::config::SimConfig;
use crate::event_queue::{schedule, EventSender};
use crate::packet::{AddrRange, Packet};
use crate::port::{CpuSidePort, Downstream};

pub struct SimMemory {
    pub cpu_side: CpuSidePort,
    range: AddrRange,
    data: Vec<u8>,
    latency: u64,
    busy: bool,
    served: u64,
    tx: EventSender,
    self_ref: Weak<RefCell<SimMemory>>,
}

impl SimMemory {
    pub fn new(cfg: &SimConfig, tx: EventSender) -> Rc<RefCell<SimMemory>> {
        let mem = Rc::new(RefCell::new(SimMemory {
            cpu_side: CpuSidePort::new("memory.cpu_side", tx.clone()),
            range: AddrRange { start: 0, end: cfg.mem_size },
            data: vec![0; cfg.mem_size as usize],
            latency: cfg.mem_latency,
            busy: false,
            served: 0,
            tx,
            self_ref: Weak::new(),
        }));
        mem.borrow_mut().self_ref = Rc::downgrade(&mem);
        mem
    }

    /// Requests answered so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    fn apply(&mut self, pkt: &mut Packet) {
        assert!(
            self.range.contains(pkt.addr),
            "memory: access outside range: {}",
            pkt
        );
        let off = (pkt.addr - self.range.start) as usize;
        if pkt.flags.swap {
            // old bytes travel back, new bytes land in memory
            let old = self.data[off..off + pkt.size].to_vec();
            self.data[off..off + pkt.size].copy_from_slice(&pkt.data);
            pkt.data = old;
        } else if pkt.is_write() {
            self.data[off..off + pkt.size].copy_from_slice(&pkt.data);
        } else if pkt.is_read() {
            pkt.data.copy_from_slice(&self.data[off..off + pkt.size]);
        } else {
            panic!("unknown packet type: {}", pkt);
        }
    }

    fn respond(&mut self, mut pkt: Packet) {
        trace!("memory: serving {}", pkt);
        self.apply(&mut pkt);
        pkt.make_response();
        self.served += 1;
        self.busy = false;
        self.cpu_side.send_response(pkt);
        self.cpu_side.send_retry_req();
    }
}

impl Downstream for SimMemory {
    fn try_recv_request(&mut self, pkt: Packet) -> Result<(), Packet> {
        if self.cpu_side.has_retained() || self.cpu_side.needs_retry || self.busy {
            debug!("memory: busy, rejecting {}", pkt);
            self.cpu_side.needs_retry = true;
            return Err(pkt);
        }
        self.busy = true;
        let this = self.self_ref.clone();
        schedule(&self.tx, self.latency, move || {
            let this = this.upgrade().expect("memory dropped with request in service");
            this.borrow_mut().respond(pkt);
        });
        Ok(())
    }

    fn recv_resp_retry(&mut self) {
        self.cpu_side.retry_resp();
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.apply(pkt);
        pkt.make_response();
    }

    fn addr_ranges(&self) -> Vec<AddrRange> {
        vec![self.range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_queue::EventQueue;
    use crate::packet::MemCmd;

    fn memory() -> (EventQueue, Rc<RefCell<SimMemory>>) {
        let cfg = SimConfig { mem_latency: 10, mem_size: 0x1000, ..Default::default() };
        let (evq, tx) = EventQueue::new();
        (evq, SimMemory::new(&cfg, tx))
    }

    #[derive(Default)]
    struct Sink {
        responses: Vec<Packet>,
        retries: u32,
    }

    impl crate::port::Upstream for Sink {
        fn try_recv_response(&mut self, pkt: Packet) -> Result<(), Packet> {
            self.responses.push(pkt);
            Ok(())
        }
        fn recv_req_retry(&mut self) {
            self.retries += 1;
        }
        fn recv_range_change(&mut self) {}
    }

    #[test]
    fn write_then_read_round_trips() {
        let (mut evq, mem) = memory();
        let sink = Rc::new(RefCell::new(Sink::default()));
        mem.borrow_mut().cpu_side.bind(sink.clone());

        mem.borrow_mut()
            .try_recv_request(Packet::write(0x20, vec![1, 2, 3]))
            .unwrap();
        evq.run();
        mem.borrow_mut()
            .try_recv_request(Packet::read(0x21, 2))
            .unwrap();
        evq.run();

        let sink = sink.borrow();
        assert_eq!(sink.responses[0].cmd, MemCmd::WriteResp);
        assert_eq!(sink.responses[1].cmd, MemCmd::ReadResp);
        assert_eq!(sink.responses[1].data, vec![2, 3]);
        assert_eq!(mem.borrow().served(), 2);
    }

    #[test]
    fn busy_memory_rejects_then_notifies_retry() {
        let (mut evq, mem) = memory();
        let sink = Rc::new(RefCell::new(Sink::default()));
        mem.borrow_mut().cpu_side.bind(sink.clone());

        let first = Packet::read(0x0, 4);
        let second = Packet::read(0x40, 4);
        assert!(mem.borrow_mut().try_recv_request(first).is_ok());
        let rejected = mem.borrow_mut().try_recv_request(second.clone()).unwrap_err();
        assert_eq!(rejected, second);

        evq.run();
        // the response went out and the owed retry notification fired
        assert_eq!(sink.borrow().responses.len(), 1);
        assert_eq!(sink.borrow().retries, 1);
    }

    #[test]
    fn functional_access_is_synchronous() {
        let (_evq, mem) = memory();
        let mut wr = Packet::write(0x8, vec![0x42]);
        mem.borrow_mut().recv_functional(&mut wr);
        assert!(wr.is_response());
        let mut rd = Packet::read(0x8, 1);
        mem.borrow_mut().recv_functional(&mut rd);
        assert_eq!(rd.data, vec![0x42]);
        assert_eq!(mem.borrow().served(), 0);
    }

    #[test]
    fn announces_its_range() {
        let (_evq, mem) = memory();
        assert_eq!(
            mem.borrow().addr_ranges(),
            vec![AddrRange { start: 0, end: 0x1000 }]
        );
    }
}
