use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::scheduler::Simulator;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignalId(pub(crate) usize);

impl SignalId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Bit 0 goes from 0 to 1.
    Rising,
    /// Bit 0 goes from 1 to 0.
    Falling,
    /// Any change of value.
    Any,
}

impl Edge {
    pub fn matches(&self, old: u64, new: u64) -> bool {
        match self {
            Edge::Rising => old & 1 == 0 && new & 1 == 1,
            Edge::Falling => old & 1 == 1 && new & 1 == 0,
            Edge::Any => old != new,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalEvent {
    pub time: SimTime,
    pub signal: SignalId,
    pub value: u64,
}

struct EdgeWaiter {
    edge: Edge,
    fired: Rc<Cell<bool>>,
    waker: Waker,
}

struct SignalSlot {
    name: String,
    width: u32,
    value: u64,
    pending: Option<u64>,
    waiters: Vec<EdgeWaiter>,
}

struct Subscriber {
    signals: Vec<SignalId>,
    tx: Sender<SignalEvent>,
}

#[derive(Default)]
pub(crate) struct SignalArena {
    slots: Vec<SignalSlot>,
    dirty: Vec<SignalId>,
    subscribers: Vec<Subscriber>,
}

pub(crate) fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl SignalArena {
    pub(crate) fn add(&mut self, name: &str, width: u32, init: u64) -> SignalId {
        let id = SignalId(self.slots.len());
        self.slots.push(SignalSlot {
            name: name.to_string(),
            width,
            value: init & width_mask(width),
            pending: None,
            waiters: Vec::new(),
        });
        id
    }

    pub(crate) fn value(&self, id: SignalId) -> u64 {
        self.slots[id.0].value
    }

    pub(crate) fn name(&self, id: SignalId) -> &str {
        &self.slots[id.0].name
    }

    pub(crate) fn width(&self, id: SignalId) -> u32 {
        self.slots[id.0].width
    }

    pub(crate) fn schedule(&mut self, id: SignalId, value: u64) {
        let slot = &mut self.slots[id.0];
        assert!(
            value & !width_mask(slot.width) == 0,
            "value {value:#x} does not fit {}-bit signal `{}`",
            slot.width,
            slot.name
        );
        if slot.pending.replace(value).is_none() {
            self.dirty.push(id);
        }
    }

    pub(crate) fn watch(&mut self, id: SignalId, edge: Edge, fired: Rc<Cell<bool>>, waker: Waker) {
        self.slots[id.0].waiters.push(EdgeWaiter { edge, fired, waker });
    }

    fn unwatch(&mut self, id: SignalId, fired: &Rc<Cell<bool>>) {
        self.slots[id.0].waiters.retain(|w| !Rc::ptr_eq(&w.fired, fired));
    }

    pub(crate) fn subscribe(&mut self, signals: Vec<SignalId>, tx: Sender<SignalEvent>) {
        self.subscribers.push(Subscriber { signals, tx });
    }

    /// Applies every write of the finished delta and returns the wakers of
    /// processes whose edge condition was met.
    pub(crate) fn commit(&mut self, now: SimTime) -> Vec<Waker> {
        let mut woken = Vec::new();
        for id in std::mem::take(&mut self.dirty) {
            let slot = &mut self.slots[id.0];
            let Some(new) = slot.pending.take() else { continue };
            let old = slot.value;
            if old == new {
                continue;
            }
            slot.value = new;

            let mut i = 0;
            while i < slot.waiters.len() {
                // owner already dropped
                if Rc::strong_count(&slot.waiters[i].fired) == 1 {
                    slot.waiters.swap_remove(i);
                } else if slot.waiters[i].edge.matches(old, new) {
                    let waiter = slot.waiters.swap_remove(i);
                    waiter.fired.set(true);
                    woken.push(waiter.waker);
                } else {
                    i += 1;
                }
            }

            let event = SignalEvent { time: now, signal: id, value: new };
            self.subscribers.retain(|sub| {
                !sub.signals.contains(&id) || sub.tx.send(event).is_ok()
            });
        }
        woken
    }

    pub(crate) fn clear_waiters(&mut self) {
        for slot in &mut self.slots {
            slot.waiters.clear();
            slot.pending = None;
        }
        self.dirty.clear();
    }
}

#[derive(Clone)]
pub struct SignalReader {
    pub(crate) sim: Simulator,
    pub(crate) id: SignalId,
}

impl SignalReader {
    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn name(&self) -> String {
        self.sim.inner().signals.borrow().name(self.id).to_string()
    }

    pub fn width(&self) -> u32 {
        self.sim.inner().signals.borrow().width(self.id)
    }

    /// The value committed at the end of the last delta cycle.
    pub fn value(&self) -> u64 {
        self.sim.inner().signals.borrow().value(self.id)
    }

    pub fn is_high(&self) -> bool {
        self.value() & 1 == 1
    }

    pub fn edge(&self, edge: Edge) -> EdgeWait<'_> {
        EdgeWait { signal: self, edge, fired: None }
    }

    pub fn rising_edge(&self) -> EdgeWait<'_> {
        self.edge(Edge::Rising)
    }

    pub fn falling_edge(&self) -> EdgeWait<'_> {
        self.edge(Edge::Falling)
    }

    pub fn changed(&self) -> EdgeWait<'_> {
        self.edge(Edge::Any)
    }
}

impl std::fmt::Debug for SignalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalReader")
            .field("name", &self.name())
            .field("value", &self.value())
            .finish()
    }
}

pub struct SignalWriter {
    reader: SignalReader,
}

impl SignalWriter {
    pub(crate) fn new(reader: SignalReader) -> Self {
        Self { reader }
    }

    /// Takes effect at the end of the current delta. Panics if `value` has
    /// bits set above the signal's width.
    pub fn set(&self, value: u64) {
        self.reader.sim.inner().signals.borrow_mut().schedule(self.reader.id, value);
    }

    pub fn set_bool(&self, level: bool) {
        self.set(u64::from(level));
    }

    pub fn set_high(&self) {
        self.set(1);
    }

    pub fn set_low(&self) {
        self.set(0);
    }

    pub fn reader(&self) -> SignalReader {
        self.reader.clone()
    }

    pub fn id(&self) -> SignalId {
        self.reader.id
    }

    pub fn value(&self) -> u64 {
        self.reader.value()
    }
}

impl std::fmt::Debug for SignalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SignalWriter").field(&self.reader).finish()
    }
}

/// Future returned by [`SignalReader::edge`].
///
/// Resolves on the first committed transition matching the edge after the
/// future was first polled; the current level alone never satisfies it.
pub struct EdgeWait<'a> {
    signal: &'a SignalReader,
    edge: Edge,
    fired: Option<Rc<Cell<bool>>>,
}

impl Future for EdgeWait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(fired) = &self.fired {
            return if fired.get() { Poll::Ready(()) } else { Poll::Pending };
        }
        let fired = Rc::new(Cell::new(false));
        self.signal.sim.inner().signals.borrow_mut().watch(
            self.signal.id,
            self.edge,
            Rc::clone(&fired),
            cx.waker().clone(),
        );
        self.fired = Some(fired);
        Poll::Pending
    }
}

impl Drop for EdgeWait<'_> {
    fn drop(&mut self) {
        let Some(fired) = &self.fired else { return };
        if fired.get() {
            return;
        }
        // while the arena is borrowed, commit prunes the entry instead
        if let Ok(mut signals) = self.signal.sim.inner().signals.try_borrow_mut() {
            signals.unwatch(self.signal.id, fired);
        }
    }
}
