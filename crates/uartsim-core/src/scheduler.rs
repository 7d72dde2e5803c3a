//! Single-threaded discrete-event scheduler.
//!
//! Processes are ordinary futures. They suspend on [`Simulator::delay`] or on
//! a signal edge ([`SignalReader::edge`](crate::SignalReader::edge)) and are
//! woken through a ready channel. One time step runs as a series of delta
//! cycles: poll every ready process, commit the writes they made, wake the
//! processes whose edge fired, repeat. Time advances to the earliest pending
//! timer only once no process is ready.

use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::SimError;
use crate::signal::{SignalArena, SignalEvent, SignalId, SignalReader, SignalWriter};
use crate::time::SimTime;

/// Maximum delta cycles per time step before the run is aborted.
pub const MAX_DELTAS_PER_STEP: u32 = 10_000;

struct TaskWaker {
    id: usize,
    ready: Sender<usize>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let _ = self.ready.send(self.id);
    }
}

struct Task {
    future: Pin<Box<dyn Future<Output = ()>>>,
    waker: Waker,
}

struct Timer {
    at: SimTime,
    seq: u64,
    waker: Waker,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

pub(crate) struct Inner {
    now: Cell<SimTime>,
    seq: Cell<u64>,
    time_limit: Cell<Option<SimTime>>,
    total_deltas: Cell<u64>,
    pub(crate) signals: RefCell<SignalArena>,
    timers: RefCell<BinaryHeap<Reverse<Timer>>>,
    tasks: RefCell<Vec<Option<Task>>>,
    ready_tx: Sender<usize>,
    ready_rx: Receiver<usize>,
}

/// Handle to a simulation. Cloning yields another handle to the same run.
#[derive(Clone)]
pub struct Simulator {
    inner: Rc<Inner>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = unbounded();
        Self {
            inner: Rc::new(Inner {
                now: Cell::new(0),
                seq: Cell::new(0),
                time_limit: Cell::new(None),
                total_deltas: Cell::new(0),
                signals: RefCell::new(SignalArena::default()),
                timers: RefCell::new(BinaryHeap::new()),
                tasks: RefCell::new(Vec::new()),
                ready_tx,
                ready_rx,
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    pub fn now(&self) -> SimTime {
        self.inner.now.get()
    }

    pub fn total_deltas(&self) -> u64 {
        self.inner.total_deltas.get()
    }

    /// Fails any run that would advance past `limit`.
    pub fn set_time_limit(&self, limit: Option<SimTime>) {
        self.inner.time_limit.set(limit);
    }

    pub fn signal(&self, name: &str, width: u32, init: u64) -> Result<SignalWriter, SimError> {
        if width == 0 || width > 64 {
            return Err(SimError::InvalidWidth(width));
        }
        let id = self.inner.signals.borrow_mut().add(name, width, init);
        Ok(SignalWriter::new(SignalReader { sim: self.clone(), id }))
    }

    pub fn signal_name(&self, id: SignalId) -> String {
        self.inner.signals.borrow().name(id).to_string()
    }

    pub fn signal_width(&self, id: SignalId) -> u32 {
        self.inner.signals.borrow().width(id)
    }

    pub fn signal_value(&self, id: SignalId) -> u64 {
        self.inner.signals.borrow().value(id)
    }

    /// Delivers every committed change of `signals` to the returned channel.
    pub fn subscribe(&self, signals: &[SignalId]) -> Receiver<SignalEvent> {
        let (tx, rx) = unbounded();
        self.inner.signals.borrow_mut().subscribe(signals.to_vec(), tx);
        rx
    }

    /// Registers a process. It is first polled in the current delta.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let mut tasks = self.inner.tasks.borrow_mut();
        let id = tasks.len();
        let waker = Waker::from(Arc::new(TaskWaker { id, ready: self.inner.ready_tx.clone() }));
        waker.wake_by_ref();
        tasks.push(Some(Task { future: Box::pin(future), waker }));
        log::trace!("spawned process #{id} at {} ns", self.now());
    }

    pub fn delay(&self, units: SimTime) -> Delay<'_> {
        Delay { sim: self, deadline: self.now().saturating_add(units), armed: false }
    }

    /// Runs the simulation until `future` completes and returns its output.
    ///
    /// Writes made in the final delta are committed before returning. Other
    /// processes are left suspended; see [`halt`](Self::halt).
    pub fn run_until<F, T>(&self, future: F) -> Result<T, SimError>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let out = Rc::clone(&slot);
        self.spawn(async move {
            let value = future.await;
            *out.borrow_mut() = Some(value);
        });
        self.run_loop(None, || slot.borrow().is_some())?;
        let value = slot.borrow_mut().take();
        value.ok_or(SimError::Stalled(self.now()))
    }

    /// Runs every event scheduled up to and including `now + duration`.
    pub fn run_for(&self, duration: SimTime) -> Result<(), SimError> {
        let end = self.now().saturating_add(duration);
        self.run_loop(Some(end), || false)
    }

    /// Drops every process, pending timer and edge registration. Signal
    /// values are kept.
    pub fn halt(&self) {
        let tasks = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        let abandoned = tasks.iter().filter(|t| t.is_some()).count();
        drop(tasks);
        self.inner.timers.borrow_mut().clear();
        self.inner.signals.borrow_mut().clear_waiters();
        while self.inner.ready_rx.try_recv().is_ok() {}
        log::debug!("halted at {} ns, abandoned {abandoned} process(es)", self.now());
    }

    fn schedule_wake(&self, at: SimTime, waker: Waker) {
        let seq = self.inner.seq.get();
        self.inner.seq.set(seq + 1);
        self.inner.timers.borrow_mut().push(Reverse(Timer { at, seq, waker }));
    }

    fn poll_ready(&self) {
        while let Ok(id) = self.inner.ready_rx.try_recv() {
            let task = self.inner.tasks.borrow_mut().get_mut(id).and_then(Option::take);
            let Some(mut task) = task else { continue };
            let waker = task.waker.clone();
            let mut cx = Context::from_waker(&waker);
            if task.future.as_mut().poll(&mut cx).is_pending() {
                if let Some(slot) = self.inner.tasks.borrow_mut().get_mut(id) {
                    *slot = Some(task);
                }
            }
        }
    }

    fn commit(&self) {
        let woken = self.inner.signals.borrow_mut().commit(self.now());
        for waker in woken {
            waker.wake();
        }
    }

    fn run_loop(&self, deadline: Option<SimTime>, done: impl Fn() -> bool) -> Result<(), SimError> {
        loop {
            let mut deltas = 0u32;
            loop {
                self.poll_ready();
                self.commit();
                if done() {
                    return Ok(());
                }
                if self.inner.ready_rx.is_empty() {
                    break;
                }
                deltas += 1;
                self.inner.total_deltas.set(self.inner.total_deltas.get() + 1);
                if deltas >= MAX_DELTAS_PER_STEP {
                    return Err(SimError::DeltaOverflow {
                        time: self.now(),
                        max: MAX_DELTAS_PER_STEP,
                    });
                }
            }

            let next = self.inner.timers.borrow().peek().map(|Reverse(t)| t.at);
            let Some(at) = next else {
                return match deadline {
                    Some(end) => {
                        self.inner.now.set(end);
                        Ok(())
                    }
                    None => {
                        log::warn!("no pending events at {} ns", self.now());
                        Err(SimError::Stalled(self.now()))
                    }
                };
            };
            if let Some(end) = deadline {
                if at > end {
                    self.inner.now.set(end);
                    return Ok(());
                }
            }
            if let Some(limit) = self.inner.time_limit.get() {
                if at > limit {
                    return Err(SimError::TimeLimit { limit });
                }
            }

            self.inner.now.set(at);
            loop {
                let due = {
                    let mut timers = self.inner.timers.borrow_mut();
                    if timers.peek().is_some_and(|Reverse(t)| t.at == at) {
                        timers.pop()
                    } else {
                        None
                    }
                };
                match due {
                    Some(Reverse(timer)) => timer.waker.wake(),
                    None => break,
                }
            }
        }
    }
}

pub struct Delay<'a> {
    sim: &'a Simulator,
    deadline: SimTime,
    armed: bool,
}

impl Future for Delay<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.sim.now() >= self.deadline {
            return Poll::Ready(());
        }
        if !self.armed {
            self.sim.schedule_wake(self.deadline, cx.waker().clone());
            self.armed = true;
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_advances_virtual_time() {
        let sim = Simulator::new();
        let probe = sim.clone();
        let finished_at = sim
            .run_until(async move {
                probe.delay(104_167).await;
                probe.delay(3).await;
                probe.now()
            })
            .unwrap();
        assert_eq!(finished_at, 104_170);
        assert_eq!(sim.now(), 104_170);
    }

    #[test]
    fn zero_delay_does_not_suspend() {
        let sim = Simulator::new();
        let probe = sim.clone();
        let t = sim
            .run_until(async move {
                probe.delay(0).await;
                probe.now()
            })
            .unwrap();
        assert_eq!(t, 0);
    }

    #[test]
    fn processes_interleave_in_time_order() {
        let sim = Simulator::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, step) in [("a", 30u64), ("b", 20u64)] {
            let sim2 = sim.clone();
            let log = Rc::clone(&log);
            sim.spawn(async move {
                for _ in 0..3 {
                    sim2.delay(step).await;
                    log.borrow_mut().push((sim2.now(), name));
                }
            });
        }
        sim.run_for(100).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![(20, "b"), (30, "a"), (40, "b"), (60, "a"), (60, "b"), (90, "a")]
        );
    }

    #[test]
    fn edge_wait_resumes_on_transition() {
        let sim = Simulator::new();
        let line = sim.signal("line", 1, 1).unwrap();
        let watched = line.reader();

        let sim2 = sim.clone();
        sim.spawn(async move {
            sim2.delay(50).await;
            line.set_low();
            sim2.delay(50).await;
            line.set_high();
        });

        let sim3 = sim.clone();
        let (fell, rose) = sim
            .run_until(async move {
                watched.falling_edge().await;
                let fell = sim3.now();
                watched.rising_edge().await;
                (fell, sim3.now())
            })
            .unwrap();
        assert_eq!((fell, rose), (50, 100));
    }

    #[test]
    fn edge_woken_processes_sample_pre_edge_values() {
        let sim = Simulator::new();
        let clk = sim.signal("clk", 1, 0).unwrap();
        let q = sim.signal("q", 8, 0).unwrap();
        let clk_r = clk.reader();
        let q_r = q.reader();

        let sim2 = sim.clone();
        sim.spawn(async move {
            loop {
                sim2.delay(10).await;
                clk.set_high();
                sim2.delay(10).await;
                clk.set_low();
            }
        });

        // Behaves like a register: q takes a new value on every rising edge.
        let clk_dev = clk_r.clone();
        sim.spawn(async move {
            let mut next = 1u64;
            loop {
                clk_dev.rising_edge().await;
                q.set(next);
                next += 1;
            }
        });

        let samples = sim
            .run_until(async move {
                let mut seen = Vec::new();
                for _ in 0..3 {
                    clk_r.rising_edge().await;
                    seen.push(q_r.value());
                }
                seen
            })
            .unwrap();
        assert_eq!(samples, vec![0, 1, 2]);
        assert_eq!(sim.now(), 50);
    }

    #[test]
    fn stalled_run_is_reported() {
        let sim = Simulator::new();
        let line = sim.signal("line", 1, 0).unwrap();
        let r = line.reader();
        let result = sim.run_until(async move { r.rising_edge().await });
        assert_eq!(result, Err(SimError::Stalled(0)));
    }

    #[test]
    fn time_limit_stops_the_run() {
        let sim = Simulator::new();
        sim.set_time_limit(Some(1_000));
        let probe = sim.clone();
        let result = sim.run_until(async move { probe.delay(2_000).await });
        assert_eq!(result, Err(SimError::TimeLimit { limit: 1_000 }));
    }

    #[test]
    fn run_for_stops_at_the_deadline() {
        let sim = Simulator::new();
        let ticks = Rc::new(Cell::new(0u32));
        let sim2 = sim.clone();
        let counter = Rc::clone(&ticks);
        sim.spawn(async move {
            loop {
                sim2.delay(10).await;
                counter.set(counter.get() + 1);
            }
        });
        sim.run_for(95).unwrap();
        assert_eq!(sim.now(), 95);
        assert_eq!(ticks.get(), 9);
        sim.run_for(5).unwrap();
        assert_eq!(ticks.get(), 10);
    }

    #[test]
    fn halt_abandons_free_running_processes() {
        let sim = Simulator::new();
        let sim2 = sim.clone();
        sim.spawn(async move {
            loop {
                sim2.delay(10).await;
            }
        });
        sim.run_for(100).unwrap();
        sim.halt();
        let probe = sim.clone();
        let result = sim.run_until(async move { probe.delay(0).await });
        assert_eq!(result, Ok(()));
        assert_eq!(sim.run_for(50), Ok(()));
        assert_eq!(sim.now(), 150);
    }

    #[test]
    fn zero_time_loop_overflows_delta_budget() {
        let sim = Simulator::new();
        let a = sim.signal("a", 1, 0).unwrap();
        let a_r = a.reader();
        sim.spawn(async move {
            loop {
                a.set(1 - a_r.value());
                a_r.changed().await;
            }
        });
        let result = sim.run_for(10);
        assert_eq!(
            result,
            Err(SimError::DeltaOverflow { time: 0, max: MAX_DELTAS_PER_STEP })
        );
    }

    #[test]
    fn invalid_width_is_rejected() {
        let sim = Simulator::new();
        assert_eq!(sim.signal("w", 0, 0).unwrap_err(), SimError::InvalidWidth(0));
        assert_eq!(sim.signal("w", 65, 0).unwrap_err(), SimError::InvalidWidth(65));
    }
}
