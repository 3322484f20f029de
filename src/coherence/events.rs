// Change notifications. Every component can hand its mutations to one
// listener over a channel; without a listener nothing is sent.

use std::sync::mpsc::Sender;

use super::common::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Load { cpu: CpuId, addr: usize },
    Store { cpu: CpuId, addr: usize, word: Word },
    ReadMiss { cache: CacheId, tag: Tag },
    WriteMiss { cache: CacheId, tag: Tag },
    WriteBack { cache: CacheId, tag: Tag, data: Vec<Word> },
    Invalidate { cache: CacheId, tag: Tag },
    CacheResponse { cache: CacheId, data: Vec<Word> },
    MemoryResponse { data: Vec<Word> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ClockChanged { time: u64 },
    MemoryCellChanged { addr: usize },
    MemoryRangeRead { base: usize, count: usize },
    Bus(BusEvent),
    LineStateChanged { cache: CacheId, line: usize },
    LineTagChanged { cache: CacheId, line: usize },
    LineTimeChanged { cache: CacheId, line: usize },
    LineValueChanged { cache: CacheId, line: usize, index: usize },
    LineBulkRead { cache: CacheId, line: usize },
}

pub type EventSender = Sender<Event>;

/// A component's single listener slot.
#[derive(Clone, Default, Debug)]
pub struct Listener(Option<EventSender>);

impl Listener {
    pub fn register(&mut self, tx: EventSender) {
        self.0 = Some(tx);
    }

    pub fn is_registered(&self) -> bool {
        self.0.is_some()
    }

    /// the event is only built when someone listens
    pub fn notify<F: FnOnce() -> Event>(&self, event: F) {
        if let Some(ref tx) = self.0 {
            // a dropped receiver must not change engine behaviour
            tx.send(event()).ok();
        }
    }
}
