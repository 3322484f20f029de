// Scripted regression run: stores and asserted loads on named cpus, with a
// textual log of every outcome. It only drives the public engine surface.

use std::fmt;

use log::debug;

use crate::coherence::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    Write { cpu: CpuId, addr: usize, word: Word },
    ReadAssert { cpu: CpuId, addr: usize, expected: Word },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Written,
    Read { value: Word, ok: bool },
    Failed(SimError),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Written | Outcome::Read { ok: true, .. })
    }
}

fn w(cpu: CpuId, addr: usize, c: char) -> Step {
    Step::Write { cpu, addr, word: c as Word }
}

fn r(cpu: CpuId, addr: usize, c: char) -> Step {
    Step::ReadAssert { cpu, addr, expected: c as Word }
}

/// The configuration the default script is written for: 3 cpus, 2 offset
/// bits, 3 lines per cache and 12 memory lines, the `SystemSpec` defaults.
pub fn default_spec(protocol: Option<Protocol>) -> SystemSpec {
    SystemSpec { protocol, ..Default::default() }
}

/// Exercises hits, cache-to-cache transfers, upgrades and evictions with
/// dirty victims on every cache.
pub fn default_script() -> Vec<Step> {
    vec![
        r(1, 24, '\0'),
        w(1, 24, '.'),
        r(0, 0, '\0'),
        w(0, 0, 'a'),
        r(0, 0, 'a'),
        w(0, 0, 'b'),
        r(0, 0, 'b'),
        w(1, 0, 'c'),
        r(2, 0, 'c'),
        w(2, 1, 'd'),
        w(2, 2, 'e'),
        w(2, 10, 'f'),
        w(2, 16, 'g'),
        r(2, 0, 'c'),
        r(2, 2, 'e'),
        r(2, 10, 'f'),
        r(2, 16, 'g'),
        r(1, 16, 'g'),
        r(1, 10, 'f'),
        r(0, 0, 'c'),
        r(1, 0, 'c'),
        w(1, 8, 'h'),
        w(2, 9, 'i'),
        r(2, 8, 'h'),
        r(0, 8, 'h'),
        r(1, 9, 'i'),
        r(1, 0, 'c'),
        r(1, 10, 'f'),
        r(1, 16, 'g'),
        r(1, 2, 'e'),
        w(1, 0, 'j'),
        w(1, 4, 'k'),
        w(1, 8, 'L'),
        w(1, 12, 'm'),
        w(1, 16, 'n'),
        w(1, 20, 'o'),
        r(1, 0, 'j'),
        r(1, 4, 'k'),
        r(2, 4, 'k'),
        r(0, 0, 'j'),
        r(1, 8, 'L'),
        w(1, 8, 'p'),
        r(1, 8, 'p'),
        r(2, 8, 'p'),
        w(2, 8, 'q'),
        r(2, 8, 'q'),
    ]
}

#[derive(Clone, Debug)]
pub struct Report {
    pub title: String,
    pub steps: Vec<(Step, Outcome)>,
    pub counters: BusCounters,
    pub time: u64,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|(_, o)| o.is_ok())
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|(_, o)| !o.is_ok()).count()
    }
}

pub fn run(system: &mut System, steps: &[Step]) -> Report {
    let title = match system.spec().protocol {
        Some(p) => p.to_string(),
        None => "no cache".to_string(),
    };
    let mut done = Vec::with_capacity(steps.len());
    for &step in steps {
        let outcome = match step {
            Step::Write { cpu, addr, word } => match system.store(cpu, addr, word) {
                Ok(()) => Outcome::Written,
                Err(e) => Outcome::Failed(e),
            },
            Step::ReadAssert { cpu, addr, expected } => match system.load(cpu, addr) {
                Ok(value) => Outcome::Read { value, ok: value == expected },
                Err(e) => Outcome::Failed(e),
            },
        };
        for cache in system.hardware().caches() {
            debug!("\n{}", cache);
        }
        done.push((step, outcome));
    }
    Report {
        title,
        steps: done,
        counters: *system.counters(),
        time: system.time(),
    }
}

/// printable words as characters, anything else as a number
struct Shown(Word);

impl fmt::Display for Shown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32(self.0) {
            Some(c) if c.is_ascii_graphic() => write!(f, "{}", c),
            _ => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " = {} = ", self.title)?;
        for (step, outcome) in &self.steps {
            match (step, outcome) {
                (Step::Write { cpu, addr, word }, Outcome::Written) => {
                    writeln!(f, "write cpuNum={}, adr={}, value={}", cpu, addr, Shown(*word))?
                }
                (Step::ReadAssert { cpu, addr, expected }, Outcome::Read { value, ok }) => writeln!(
                    f,
                    "read cpuNum={}, adr={}, expected={}, value={}, test result={}",
                    cpu,
                    addr,
                    Shown(*expected),
                    Shown(*value),
                    if *ok { "ok" } else { "!!! E R R O R !!!" }
                )?,
                (step, Outcome::Failed(e)) => writeln!(f, "{:?} failed: {}", step, e)?,
                (step, outcome) => writeln!(f, "{:?} {:?}", step, outcome)?,
            }
        }
        let c = &self.counters;
        writeln!(f, "bus counterLoad={}", c.load)?;
        writeln!(f, "bus counterStore={}", c.store)?;
        writeln!(f, "bus counterReadMiss={}", c.read_miss)?;
        writeln!(f, "bus counterWriteMiss={}", c.write_miss)?;
        writeln!(f, "bus counterWriteBack={}", c.write_back)?;
        writeln!(f, "bus counterInvalidate={}", c.invalidate)?;
        writeln!(f, "bus counterMemoryResponse={}", c.memory_response)?;
        writeln!(f, "bus counterCacheResponse={}", c.cache_response)?;
        writeln!(f, "bus counterMemory={}", c.memory())?;
        writeln!(f, "bus counterTotal={}", c.total())?;
        write!(f, "time={}", self.time)
    }
}
