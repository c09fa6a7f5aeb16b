// implements a simulated-time event queue with discrete delays, based on std::sync::mpsc

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::sync::mpsc;

pub type Event = Box<dyn FnOnce()>;

// delayed event type

pub struct DelayedEvent {
    pub delay: u64,
    pub event: Event,
}

pub type EventSender = mpsc::Sender<DelayedEvent>;

/// Schedule `f` to run `delay` time units from now.
pub fn schedule(tx: &EventSender, delay: u64, f: impl FnOnce() + 'static) {
    tx.send(DelayedEvent {
        delay,
        event: Box::new(f),
    })
    .expect("event queue dropped while components still scheduling");
}

// timed event type

/*
    to avoid having to mutate every element in the queue, the queue does not
    decrease a delay, but instead stamps each event with its absolute fire
    time on arrival. seq is monotonically increased, so events scheduled for
    the same instant fire in scheduling order.
 */

struct TimedEvent {
    t: u64,
    seq: u64,
    event: Event,
}

impl Eq for TimedEvent {}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        (self.t, self.seq) == (other.t, other.seq)
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // lexicographically, reversed for the max-heap
        (other.t, other.seq).cmp(&(self.t, self.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Read-only handle on the current simulated time.
#[derive(Clone)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }
}

// event queue

pub struct EventQueue {
    q: BinaryHeap<TimedEvent>,
    rx: mpsc::Receiver<DelayedEvent>,
    time: Rc<Cell<u64>>,
    seq: u64,
}

impl EventQueue {
    pub fn new() -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel();
        (
            EventQueue {
                q: BinaryHeap::new(),
                rx,
                time: Rc::new(Cell::new(0)),
                seq: 0,
            },
            tx,
        )
    }

    pub fn clock(&self) -> Clock {
        Clock(self.time.clone())
    }

    pub fn now(&self) -> u64 {
        self.time.get()
    }

    fn pull(&mut self) {
        while let Ok(DelayedEvent { delay, event }) = self.rx.try_recv() {
            // transform delay into timestamp
            self.q.push(TimedEvent {
                t: self.time.get() + delay,
                seq: self.seq,
                event,
            });
            self.seq += 1;
        }
    }

    /// Run events in nondecreasing time order until none are left.
    pub fn run(&mut self) {
        self.pull();
        while let Some(ev) = self.q.pop() {
            assert!(ev.t >= self.time.get(), "event queue is out of sync: missed event");
            self.time.set(ev.t);
            (ev.event)();
            self.pull();
        }
    }
}
