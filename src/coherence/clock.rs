use super::events::{Event, EventSender, Listener};

/// extra time a memory access costs compared to an ordinary operation
pub const MEMORY_TICKS: u64 = 5;

/// Logical time shared by the bus and the caches.
#[derive(Default, Debug)]
pub struct Clock {
    time: u64,
    listener: Listener,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_listener(&mut self, tx: EventSender) {
        self.listener.register(tx);
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn tick(&mut self) {
        self.advance(1);
    }

    pub fn memory_tick(&mut self) {
        self.advance(MEMORY_TICKS);
    }

    pub fn reset(&mut self) {
        self.time = 0;
        self.changed();
    }

    fn advance(&mut self, d: u64) {
        self.time += d;
        self.changed();
    }

    fn changed(&self) {
        let time = self.time;
        self.listener.notify(|| Event::ClockChanged { time });
    }
}
