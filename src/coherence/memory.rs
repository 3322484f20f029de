use log::trace;

use super::common::Word;
use super::error::{Result, SimError};
use super::events::{Event, EventSender, Listener};

/// Flat backing store, passive: only the bus talks to it.
#[derive(Debug)]
pub struct Memory {
    words: Vec<Word>,
    listener: Listener,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Memory {
            words: vec![0; size],
            listener: Listener::default(),
        }
    }

    pub fn register_listener(&mut self, tx: EventSender) {
        self.listener.register(tx);
    }

    pub fn size(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// fails unless `base..base+count` lies inside memory
    pub fn check_range(&self, base: usize, count: usize) -> Result<()> {
        match base.checked_add(count) {
            Some(end) if end <= self.words.len() => Ok(()),
            _ => Err(SimError::OutOfRange { base, count, size: self.words.len() }),
        }
    }

    /// read a block of `count` words starting at `base`
    pub fn read(&self, base: usize, count: usize) -> Result<Vec<Word>> {
        self.check_range(base, count)?;
        trace!("memory read {}..{}", base, base + count);
        self.listener.notify(|| Event::MemoryRangeRead { base, count });
        Ok(self.words[base..base + count].to_vec())
    }

    /// overwrite memory with `block` starting at `base` (a flush)
    pub fn write(&mut self, base: usize, block: &[Word]) -> Result<()> {
        self.check_range(base, block.len())?;
        trace!("memory write {}..{}", base, base + block.len());
        for (i, word) in block.iter().enumerate() {
            self.words[base + i] = *word;
            self.listener.notify(|| Event::MemoryCellChanged { addr: base + i });
        }
        Ok(())
    }

    pub fn load(&self, addr: usize) -> Result<Word> {
        self.check_range(addr, 1)?;
        self.listener.notify(|| Event::MemoryRangeRead { base: addr, count: 1 });
        Ok(self.words[addr])
    }

    pub fn store(&mut self, addr: usize, word: Word) -> Result<()> {
        self.check_range(addr, 1)?;
        self.words[addr] = word;
        self.listener.notify(|| Event::MemoryCellChanged { addr });
        Ok(())
    }
}
