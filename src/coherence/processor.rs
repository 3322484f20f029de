use super::common::*;
use super::error::Result;
use super::system::Hardware;

/// where a processor sends its requests
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DataSource {
    Bus,
    Cache(CacheId),
}

/// A processor. It does not interpret anything, requests go verbatim to
/// the bound data source.
#[derive(Clone, Debug)]
pub struct Cpu {
    pub id: CpuId,
    source: DataSource,
}

impl Cpu {
    pub fn new(id: CpuId, source: DataSource) -> Self {
        Cpu { id, source }
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn load(&self, hw: &mut Hardware, addr: usize) -> Result<Word> {
        match self.source {
            DataSource::Bus => hw.direct_load(self.id, addr),
            DataSource::Cache(cache) => hw.cache_load(cache, addr),
        }
    }

    pub fn store(&self, hw: &mut Hardware, addr: usize, word: Word) -> Result<()> {
        match self.source {
            DataSource::Bus => hw.direct_store(self.id, addr, word),
            DataSource::Cache(cache) => hw.cache_store(cache, addr, word),
        }
    }
}
