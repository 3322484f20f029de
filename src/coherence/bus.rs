// The bus is the only way between caches and memory. Its primitives run on
// the hardware arena because a broadcast has to reach the peer caches, and
// a peer may answer by placing a write back of its own.

use log::{debug, info, warn};

use super::common::*;
use super::error::Result;
use super::events::{BusEvent, Event, EventSender, Listener};
use super::protocol::Source;
use super::system::Hardware;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BusCounters {
    pub load: u64,
    pub store: u64,
    pub read_miss: u64,
    pub write_miss: u64,
    pub write_back: u64,
    pub invalidate: u64,
    pub memory_response: u64,
    pub cache_response: u64,
}

impl BusCounters {
    /// transfers that touch memory
    pub fn memory(&self) -> u64 {
        self.load + self.store + self.write_back + self.memory_response
    }

    /// every bus transaction except cache-to-cache responses
    pub fn total(&self) -> u64 {
        self.memory() + self.read_miss + self.write_miss + self.invalidate
    }

    /// requests placed on the bus
    pub fn operations(&self) -> u64 {
        self.load + self.store + self.read_miss + self.write_miss + self.write_back + self.invalidate
    }
}

/// answer to a read miss
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub source: Source,
    pub data: Vec<Word>,
}

#[derive(Default, Debug)]
pub struct Bus {
    counters: BusCounters,
    caches: Vec<CacheId>,
    listener: Listener,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_listener(&mut self, tx: EventSender) {
        self.listener.register(tx);
    }

    /// the caches that receive snoop broadcasts, in broadcast order
    pub fn connect_caches(&mut self, caches: Vec<CacheId>) {
        debug!("bus connected to {} caches", caches.len());
        self.caches = caches;
    }

    pub fn caches(&self) -> &[CacheId] {
        &self.caches
    }

    pub fn counters(&self) -> &BusCounters {
        &self.counters
    }

    fn notify(&self, ev: BusEvent) {
        self.listener.notify(|| Event::Bus(ev));
    }

    /// registered caches other than `from`
    fn peers(&self, from: CacheId) -> Vec<CacheId> {
        self.caches.iter().copied().filter(|&c| c != from).collect()
    }
}

/// keeps the last block any peer answered with
fn collect(answers: &mut Option<Vec<Word>>, tag: Tag, answer: Vec<Word>) {
    if let Some(prev) = answers {
        if *prev != answer {
            warn!("peers answered differently for tag {}", tag);
        }
    }
    *answers = Some(answer);
}

impl Hardware {
    // direct access, processors without caches

    pub fn direct_load(&mut self, cpu: CpuId, addr: usize) -> Result<Word> {
        self.memory.check_range(addr, 1)?;
        debug!("bus load by cpu {} at {}", cpu, addr);
        self.bus.counters.load += 1;
        self.clock.memory_tick();
        let word = self.memory.load(addr)?;
        self.bus.notify(BusEvent::Load { cpu, addr });
        self.clock.memory_tick();
        self.bus.notify(BusEvent::MemoryResponse { data: vec![word] });
        Ok(word)
    }

    pub fn direct_store(&mut self, cpu: CpuId, addr: usize, word: Word) -> Result<()> {
        self.memory.check_range(addr, 1)?;
        debug!("bus store by cpu {} at {}: {}", cpu, addr, word);
        self.bus.counters.store += 1;
        self.clock.memory_tick();
        self.memory.store(addr, word)?;
        self.bus.notify(BusEvent::Store { cpu, addr, word });
        Ok(())
    }

    // coherence primitives

    /// Flush a block to memory. Peers holding the tag learn that memory
    /// has a newer copy.
    pub fn place_write_back(&mut self, writer: CacheId, tag: Tag, data: Vec<Word>) -> Result<()> {
        let base = Addr::base(tag, self.offset_bits).0;
        self.memory.check_range(base, data.len())?;
        info!("cache {} writes back tag {}", writer, tag);
        self.bus.counters.write_back += 1;
        self.clock.memory_tick();
        self.memory.write(base, &data)?;
        self.bus.notify(BusEvent::WriteBack { cache: writer, tag, data });
        for peer in self.bus.peers(writer) {
            self.snoop_write_back(peer, tag);
        }
        Ok(())
    }

    /// upgrade of a shared copy, every other copy has to go
    pub fn place_invalidate(&mut self, writer: CacheId, tag: Tag) -> Result<()> {
        info!("cache {} invalidates tag {}", writer, tag);
        self.bus.counters.invalidate += 1;
        self.clock.tick();
        self.bus.notify(BusEvent::Invalidate { cache: writer, tag });
        for peer in self.bus.peers(writer) {
            self.snoop_invalidate(peer, tag)?;
        }
        Ok(())
    }

    pub fn place_write_miss(&mut self, writer: CacheId, tag: Tag) -> Result<Vec<Word>> {
        let (base, count) = self.block_range(tag);
        self.memory.check_range(base, count)?;
        info!("cache {} write miss on tag {}", writer, tag);
        self.bus.counters.write_miss += 1;
        self.bus.notify(BusEvent::WriteMiss { cache: writer, tag });

        let mut answer = None;
        for peer in self.bus.peers(writer) {
            if let Some(data) = self.snoop_write_miss(peer, tag) {
                self.bus.notify(BusEvent::CacheResponse { cache: peer, data: data.clone() });
                collect(&mut answer, tag, data);
            }
        }

        match answer {
            Some(data) => {
                self.bus.counters.cache_response += 1;
                self.clock.tick();
                Ok(data)
            }
            None => {
                self.bus.counters.memory_response += 1;
                self.clock.memory_tick();
                let data = self.memory.read(base, count)?;
                self.clock.tick();
                self.bus.notify(BusEvent::MemoryResponse { data: data.clone() });
                Ok(data)
            }
        }
    }

    pub fn place_read_miss(&mut self, reader: CacheId, tag: Tag) -> Result<Response> {
        let (base, count) = self.block_range(tag);
        self.memory.check_range(base, count)?;
        info!("cache {} read miss on tag {}", reader, tag);
        self.bus.counters.read_miss += 1;
        self.bus.notify(BusEvent::ReadMiss { cache: reader, tag });

        let mut answer = None;
        for peer in self.bus.peers(reader) {
            if let Some(data) = self.snoop_read_miss(peer, tag)? {
                self.bus.notify(BusEvent::CacheResponse { cache: peer, data: data.clone() });
                collect(&mut answer, tag, data);
            }
        }

        let response = match answer {
            Some(data) => {
                self.bus.counters.cache_response += 1;
                self.clock.tick();
                Response { source: Source::Cache, data }
            }
            None => {
                self.bus.counters.memory_response += 1;
                self.clock.memory_tick();
                let data = self.memory.read(base, count)?;
                self.bus.notify(BusEvent::MemoryResponse { data: data.clone() });
                Response { source: Source::Memory, data }
            }
        };
        debug!("read miss on tag {} served from {:?}", tag, response.source);
        Ok(response)
    }

    fn block_range(&self, tag: Tag) -> (usize, usize) {
        (Addr::base(tag, self.offset_bits).0, 1 << self.offset_bits)
    }
}
