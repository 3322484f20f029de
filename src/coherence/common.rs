use super::error::{Result, SimError};
use super::protocol::Protocol;

pub type Word = u32;
pub type Tag = usize;
pub type CacheId = usize;
pub type CpuId = usize;

#[derive(Clone, Debug, PartialEq)]
pub struct SystemSpec {                 // unit         defaults
    pub protocol: Option<Protocol>,     // None = cpus on the bus   MSI
    pub num_cpus: usize,                // processors   3
    pub offset_bits: u32,               // bits         2
    pub cache_lines: usize,             // lines/cache  3
    pub memory_size: usize,             // words        48
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            protocol: Some(Protocol::MSI),
            num_cpus: 3,
            offset_bits: 2,
            cache_lines: 3,
            memory_size: 12 << 2,
        }
    }
}

impl SystemSpec {
    /// words per cache line
    pub fn block_size(&self) -> usize {
        1 << self.offset_bits
    }

    pub fn memory_lines(&self) -> usize {
        self.memory_size >> self.offset_bits
    }

    /// set the memory size in blocks instead of words
    pub fn with_memory_lines(mut self, lines: usize) -> Result<Self> {
        self.memory_size = lines
            .checked_mul(self.block_size_checked()?)
            .ok_or_else(|| {
                SimError::InvalidConfiguration(format!(
                    "{} lines of {} offset bits do not fit an address",
                    lines, self.offset_bits
                ))
            })?;
        Ok(self)
    }

    /// block size, or an error if the offset does not fit an address
    fn block_size_checked(&self) -> Result<usize> {
        if self.offset_bits >= usize::BITS - 1 {
            return Err(SimError::InvalidConfiguration(format!(
                "{} offset bits do not fit an address",
                self.offset_bits
            )));
        }
        Ok(1 << self.offset_bits)
    }

    /// configuration problems that do not prevent building a system
    pub fn mismatches(&self) -> Vec<SimError> {
        let mut found = Vec::new();
        if self.protocol.is_none() {
            return found;
        }
        if self.memory_lines() < self.cache_lines {
            found.push(SimError::ConfigurationMismatch(format!(
                "{} memory lines but {} lines per cache",
                self.memory_lines(),
                self.cache_lines
            )));
        }
        if self.memory_size % self.block_size() != 0 {
            found.push(SimError::ConfigurationMismatch(format!(
                "memory size {} is not a multiple of the block size {}",
                self.memory_size,
                self.block_size()
            )));
        }
        found
    }

    /// configuration problems that make a system impossible to build
    pub fn validate(&self) -> Result<()> {
        let block_size = self.block_size_checked()?;
        if self.protocol.is_none() {
            return Ok(());
        }
        if self.cache_lines == 0 {
            return Err(SimError::InvalidConfiguration(
                "a cache needs at least one line".into(),
            ));
        }
        // no address of such a block is ever in range
        if block_size > self.memory_size {
            return Err(SimError::InvalidConfiguration(format!(
                "blocks of {} words do not fit {} memory words",
                block_size, self.memory_size
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Addr(pub usize);

impl Addr {
    /// get tag and word index of this address for blocks of 2^offset_bits words
    pub fn pos(&self, offset_bits: u32) -> (Tag, usize) {
        let mask = (1 << offset_bits) - 1;
        (self.0 >> offset_bits, self.0 & mask)
    }

    /// first address of the block holding `tag`
    pub fn base(tag: Tag, offset_bits: u32) -> Addr {
        Addr(tag << offset_bits)
    }
}
