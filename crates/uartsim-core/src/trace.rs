use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::scheduler::Simulator;
use crate::signal::{SignalEvent, SignalId, SignalReader};
use crate::time::SimTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub time: SimTime,
    pub signal: String,
    pub value: u64,
}

#[derive(Debug, Clone)]
struct Probe {
    id: SignalId,
    name: String,
    width: u32,
}

/// Waveform recorder for a fixed set of signals.
///
/// Changes arrive over a subscription channel and are pulled in by
/// [`sync`](Self::sync). The initial value of every probed signal is recorded
/// when the store is attached.
pub struct TraceStore {
    entries: Vec<TraceEntry>,
    max_entries: usize,
    probes: Vec<Probe>,
    events: Receiver<SignalEvent>,
}

impl TraceStore {
    pub fn attach(sim: &Simulator, signals: &[&SignalReader], max_entries: usize) -> Self {
        let probes: Vec<Probe> = signals
            .iter()
            .map(|s| Probe { id: s.id(), name: s.name(), width: s.width() })
            .collect();
        let ids: Vec<SignalId> = probes.iter().map(|p| p.id).collect();
        let events = sim.subscribe(&ids);

        let mut store = Self { entries: Vec::new(), max_entries, probes, events };
        let now = sim.now();
        for signal in signals {
            store.push(now, signal.id(), signal.value());
        }
        store
    }

    pub fn sync(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.push(event.time, event.signal, event.value);
        }
    }

    fn push(&mut self, time: SimTime, id: SignalId, value: u64) {
        let Some(probe) = self.probes.iter().find(|p| p.id == id) else { return };
        self.entries.push(TraceEntry { time, signal: probe.name.clone(), value });

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `(time, value)` transitions of one signal, oldest first.
    pub fn waveform(&self, signal: &str) -> Vec<(SimTime, u64)> {
        self.entries
            .iter()
            .filter(|e| e.signal == signal)
            .map(|e| (e.time, e.value))
            .collect()
    }

    pub fn to_text(&self, show_hex: bool) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            let wide = self
                .probes
                .iter()
                .find(|p| p.name == entry.signal)
                .is_some_and(|p| p.width > 1);

            result.push_str(&format!("[{:>12} ns] {}: ", entry.time, entry.signal));
            if show_hex && wide {
                result.push_str(&format!("0x{:02X}", entry.value));
            } else {
                result.push_str(&entry.value.to_string());
            }
            result.push('\n');
        }
        result
    }
}
