// scripted requester: plays a list of request packets against whatever sits
// below it, one response awaited per issue slot

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use log::info;

use crate::event_queue::{schedule, Clock, EventSender};
use crate::packet::Packet;
use crate::port::{MemSidePort, Upstream};

pub struct Requester {
    name: &'static str,
    pub mem_side: MemSidePort,
    script: VecDeque<Packet>,
    /// Requests launched per issue step. More than one makes issues race
    /// against a busy component below (the extra ones get rejected and ride
    /// the retry path).
    pub issue_width: usize,
    inflight: usize,
    /// Completion log: (time, response).
    pub completed: Vec<(u64, Packet)>,
    clock: Clock,
    tx: EventSender,
    self_ref: Weak<RefCell<Requester>>,
}

impl Requester {
    pub fn new(
        name: &'static str,
        script: Vec<Packet>,
        clock: Clock,
        tx: EventSender,
    ) -> Rc<RefCell<Requester>> {
        let req = Rc::new(RefCell::new(Requester {
            name,
            mem_side: MemSidePort::new("requester.mem_side"),
            script: script.into(),
            issue_width: 1,
            inflight: 0,
            completed: Vec::new(),
            clock,
            tx,
            self_ref: Weak::new(),
        }));
        req.borrow_mut().self_ref = Rc::downgrade(&req);
        req
    }

    /// Kick off the script once the queue starts running.
    pub fn start(&self) {
        self.schedule_issue();
    }

    fn schedule_issue(&self) {
        let this = self.self_ref.clone();
        schedule(&self.tx, 0, move || {
            if let Some(this) = this.upgrade() {
                this.borrow_mut().issue_next();
            }
        });
    }

    fn issue_next(&mut self) {
        while self.inflight < self.issue_width && !self.mem_side.has_retained() {
            let Some(pkt) = self.script.pop_front() else {
                break;
            };
            info!("{}: issuing {}", self.name, pkt);
            self.inflight += 1;
            self.mem_side.send_request(pkt);
        }
    }

    pub fn done(&self) -> bool {
        self.script.is_empty() && self.inflight == 0
    }
}

impl Upstream for Requester {
    fn try_recv_response(&mut self, pkt: Packet) -> Result<(), Packet> {
        info!("{}: completed {} @ {}", self.name, pkt, self.clock.now());
        self.completed.push((self.clock.now(), pkt));
        self.inflight -= 1;
        // next issue is decoupled from the delivery call chain
        self.schedule_issue();
        Ok(())
    }

    fn recv_req_retry(&mut self) {
        if self.mem_side.has_retained() {
            self.mem_side.retry_req();
        }
    }

    fn recv_range_change(&mut self) {
        info!("{}: address ranges below changed", self.name);
    }
}
