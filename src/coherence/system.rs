use log::{info, warn};

use super::bus::{Bus, BusCounters};
use super::cache::Cache;
use super::clock::Clock;
use super::common::*;
use super::error::{Result, SimError};
use super::events::EventSender;
use super::memory::Memory;
use super::processor::{Cpu, DataSource};
use super::protocol::Protocol;

/// Everything the processors talk to. Components refer to each other by
/// index into this arena, never by reference.
#[derive(Debug)]
pub struct Hardware {
    pub(crate) clock: Clock,
    pub(crate) memory: Memory,
    pub(crate) bus: Bus,
    pub(crate) caches: Vec<Cache>,
    pub(crate) offset_bits: u32,
}

impl Hardware {
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn caches(&self) -> &[Cache] {
        &self.caches
    }

    pub fn cache(&self, id: CacheId) -> Option<&Cache> {
        self.caches.get(id)
    }

    pub fn counters(&self) -> &BusCounters {
        self.bus.counters()
    }
}

/// An assembled multiprocessor. Reconfiguring means building a new one.
#[derive(Debug)]
pub struct System {
    spec: SystemSpec,
    hw: Hardware,
    cpus: Vec<Cpu>,
}

impl System {
    pub fn new(spec: SystemSpec) -> Result<Self> {
        spec.validate()?;
        for mismatch in spec.mismatches() {
            warn!("{}", mismatch);
        }

        let caches: Vec<Cache> = match spec.protocol {
            Some(protocol) => (0..spec.num_cpus)
                .map(|id| Cache::new(id, protocol, spec.cache_lines, spec.offset_bits))
                .collect(),
            None => Vec::new(),
        };
        let cpus: Vec<Cpu> = (0..spec.num_cpus)
            .map(|id| match spec.protocol {
                Some(_) => Cpu::new(id, DataSource::Cache(id)),
                None => Cpu::new(id, DataSource::Bus),
            })
            .collect();

        // snoops go to the registered caches, so this happens before any request
        let mut bus = Bus::new();
        bus.connect_caches(caches.iter().map(|c| c.id).collect());

        match spec.protocol {
            Some(p) => info!(
                "built {} system: {} cpus, {} lines of {} words per cache, {} memory words",
                p,
                spec.num_cpus,
                spec.cache_lines,
                spec.block_size(),
                spec.memory_size
            ),
            None => info!(
                "built system without caches: {} cpus, {} memory words",
                spec.num_cpus, spec.memory_size
            ),
        }

        let hw = Hardware {
            clock: Clock::new(),
            memory: Memory::new(spec.memory_size),
            bus,
            caches,
            offset_bits: spec.offset_bits,
        };
        Ok(System { spec, hw, cpus })
    }

    /// every processor directly on the bus
    pub fn no_caches(memory_size: usize, num_cpus: usize) -> Result<Self> {
        System::new(SystemSpec {
            protocol: None,
            num_cpus,
            memory_size,
            ..Default::default()
        })
    }

    /// one cache per processor, all running `protocol`
    pub fn with_caches(
        protocol: Protocol,
        memory_size: usize,
        num_cpus: usize,
        offset_bits: u32,
        cache_lines: usize,
    ) -> Result<Self> {
        System::new(SystemSpec {
            protocol: Some(protocol),
            num_cpus,
            offset_bits,
            cache_lines,
            memory_size,
        })
    }

    pub fn load(&mut self, cpu: CpuId, addr: usize) -> Result<Word> {
        let cpu = self.cpus.get(cpu).ok_or(SimError::UnknownCpu(cpu))?;
        cpu.load(&mut self.hw, addr)
    }

    pub fn store(&mut self, cpu: CpuId, addr: usize, word: Word) -> Result<()> {
        let cpu = self.cpus.get(cpu).ok_or(SimError::UnknownCpu(cpu))?;
        cpu.store(&mut self.hw, addr, word)
    }

    /// hand one sender to every component
    pub fn register_listener(&mut self, tx: EventSender) {
        self.hw.clock.register_listener(tx.clone());
        self.hw.memory.register_listener(tx.clone());
        self.hw.bus.register_listener(tx.clone());
        for cache in self.hw.caches.iter_mut() {
            cache.register_listener(tx.clone());
        }
    }

    pub fn reset_clock(&mut self) {
        self.hw.clock.reset();
    }

    pub fn spec(&self) -> &SystemSpec {
        &self.spec
    }

    pub fn cpus(&self) -> &[Cpu] {
        &self.cpus
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut Hardware {
        &mut self.hw
    }

    pub fn counters(&self) -> &BusCounters {
        self.hw.counters()
    }

    pub fn time(&self) -> u64 {
        self.hw.clock.time()
    }
}
