// duplex timing ports with explicit backpressure
//
// requester -> try_recv_request(recv_req_retry)    -> downstream component
//           <- try_recv_response(recv_resp_retry)  <-
//
// A rejected send hands the packet back (Err) and the sending port retains
// it until the peer notifies a retry. At most one packet may be retained
// per direction; a second retention is a contract violation of the caller.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};

use crate::event_queue::{schedule, EventSender};
use crate::packet::{AddrRange, Packet};

/// The face a requester-side component shows to the component below it.
pub trait Upstream {
    fn try_recv_response(&mut self, pkt: Packet) -> Result<(), Packet>;
    fn recv_req_retry(&mut self);
    fn recv_range_change(&mut self);
}

/// The face a store-side component shows to the component above it.
pub trait Downstream {
    fn try_recv_request(&mut self, pkt: Packet) -> Result<(), Packet>;
    fn recv_resp_retry(&mut self);
    fn recv_functional(&mut self, pkt: &mut Packet);
    fn addr_ranges(&self) -> Vec<AddrRange>;
}

/// Upstream-facing port: sends responses, owes retries to rejected peers.
pub struct CpuSidePort {
    label: &'static str,
    peer: Option<Rc<RefCell<dyn Upstream>>>,
    retained: Option<Packet>,
    pub needs_retry: bool,
    tx: EventSender,
}

impl CpuSidePort {
    pub fn new(label: &'static str, tx: EventSender) -> CpuSidePort {
        CpuSidePort {
            label,
            peer: None,
            retained: None,
            needs_retry: false,
            tx,
        }
    }

    pub fn bind(&mut self, peer: Rc<RefCell<dyn Upstream>>) {
        self.peer = Some(peer);
    }

    fn peer(&self) -> Rc<RefCell<dyn Upstream>> {
        self.peer.clone().unwrap_or_else(|| panic!("{}: port not bound", self.label))
    }

    pub fn has_retained(&self) -> bool {
        self.retained.is_some()
    }

    pub fn send_response(&mut self, pkt: Packet) {
        trace!("{}: send {}", self.label, pkt);
        if let Err(pkt) = self.peer().borrow_mut().try_recv_response(pkt) {
            debug!("{}: backpressured, retaining {}", self.label, pkt);
            assert!(
                self.retained.is_none(),
                "{}: a second packet rejected while one is retained",
                self.label
            );
            self.retained = Some(pkt);
        }
    }

    /// Resend the one retained response. The peer told us it can accept now.
    pub fn retry_resp(&mut self) {
        let pkt = self
            .retained
            .take()
            .unwrap_or_else(|| panic!("{}: resp retry with nothing retained", self.label));
        self.send_response(pkt);
    }

    /// Advisory retry notification: fires only if a retry is owed and no
    /// response is retained, and is delivered as a zero-delay event so the
    /// peer's resend never re-enters the caller.
    pub fn send_retry_req(&mut self) {
        if self.needs_retry && self.retained.is_none() {
            self.needs_retry = false;
            trace!("{}: notifying req retry", self.label);
            let peer = self.peer();
            schedule(&self.tx, 0, move || peer.borrow_mut().recv_req_retry());
        }
    }

    pub fn send_range_change(&self) {
        let peer = self.peer();
        schedule(&self.tx, 0, move || peer.borrow_mut().recv_range_change());
    }
}

/// Downstream-facing port: sends requests, forwards functional and range traffic.
pub struct MemSidePort {
    label: &'static str,
    peer: Option<Rc<RefCell<dyn Downstream>>>,
    retained: Option<Packet>,
}

impl MemSidePort {
    pub fn new(label: &'static str) -> MemSidePort {
        MemSidePort {
            label,
            peer: None,
            retained: None,
        }
    }

    pub fn bind(&mut self, peer: Rc<RefCell<dyn Downstream>>) {
        self.peer = Some(peer);
    }

    fn peer(&self) -> Rc<RefCell<dyn Downstream>> {
        self.peer.clone().unwrap_or_else(|| panic!("{}: port not bound", self.label))
    }

    pub fn has_retained(&self) -> bool {
        self.retained.is_some()
    }

    pub fn send_request(&mut self, pkt: Packet) {
        trace!("{}: send {}", self.label, pkt);
        if let Err(pkt) = self.peer().borrow_mut().try_recv_request(pkt) {
            debug!("{}: backpressured, retaining {}", self.label, pkt);
            assert!(
                self.retained.is_none(),
                "{}: a second packet rejected while one is retained",
                self.label
            );
            self.retained = Some(pkt);
        }
    }

    /// Resend the one retained request.
    pub fn retry_req(&mut self) {
        let pkt = self
            .retained
            .take()
            .unwrap_or_else(|| panic!("{}: req retry with nothing retained", self.label));
        self.send_request(pkt);
    }

    pub fn send_functional(&self, pkt: &mut Packet) {
        self.peer().borrow_mut().recv_functional(pkt);
    }

    pub fn addr_ranges(&self) -> Vec<AddrRange> {
        self.peer().borrow().addr_ranges()
    }
}
