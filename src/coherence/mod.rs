mod bus;
mod cache;
mod clock;
mod common;
mod controller;
mod error;
mod events;
mod memory;
mod processor;
mod protocol;
mod system;

pub use bus::{Bus, BusCounters, Response};
pub use cache::{Cache, CacheLine, LineState};
pub use clock::{Clock, MEMORY_TICKS};
pub use common::*;
pub use error::{Result, SimError};
pub use events::{BusEvent, Event, EventSender, Listener};
pub use memory::Memory;
pub use processor::{Cpu, DataSource};
pub use protocol::{Protocol, SnoopAction, Source};
pub use system::{Hardware, System};
