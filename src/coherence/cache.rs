use std::fmt;

use log::trace;

use super::common::*;
use super::events::{Event, EventSender, Listener};
use super::protocol::Protocol;

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum LineState {
    #[default]
    Invalid,
    Valid,
    Shared,
    Modified,
    Exclusive,
    Owned,
}

impl LineState {
    pub fn to_letter(&self) -> &str {
        match self {
            LineState::Invalid => "I",
            LineState::Valid => "V",
            LineState::Shared => "S",
            LineState::Modified => "M",
            LineState::Exclusive => "E",
            LineState::Owned => "O",
        }
    }
}

/// One slot of a fully-associative cache. Tag, time and data only mean
/// something while the state is not Invalid.
#[derive(Clone, Debug)]
pub struct CacheLine {
    pub state: LineState,
    pub tag: Tag,
    pub time_used: u64,
    pub data: Vec<Word>,
}

impl CacheLine {
    pub fn new_cold(block_size: usize) -> Self {
        Self {
            state: LineState::Invalid,
            tag: 0,
            time_used: 0,
            data: vec![0; block_size],
        }
    }

    pub fn is_resident(&self) -> bool {
        self.state != LineState::Invalid
    }
}

/// Private cache of one processor. This type only manages its own lines;
/// the coherence flows that involve the bus live in the controller.
#[derive(Debug)]
pub struct Cache {
    pub id: CacheId,
    protocol: Protocol,
    offset_bits: u32,
    lines: Vec<CacheLine>,
    listener: Listener,
}

impl Cache {
    pub fn new(id: CacheId, protocol: Protocol, num_lines: usize, offset_bits: u32) -> Self {
        Self {
            id,
            protocol,
            offset_bits,
            lines: vec![CacheLine::new_cold(1 << offset_bits); num_lines],
            listener: Listener::default(),
        }
    }

    pub fn register_listener(&mut self, tx: EventSender) {
        self.listener.register(tx);
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn block_size(&self) -> usize {
        1 << self.offset_bits
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    pub(crate) fn line(&self, line: usize) -> &CacheLine {
        &self.lines[line]
    }

    pub(crate) fn state(&self, line: usize) -> LineState {
        self.lines[line].state
    }

    /// tag and word index of `addr`
    pub fn pos(&self, addr: Addr) -> (Tag, usize) {
        addr.pos(self.offset_bits)
    }

    // lookup

    /// resident line holding `tag`, if any
    pub fn line_for(&self, tag: Tag) -> Option<usize> {
        self.lines.iter().position(|l| l.is_resident() && l.tag == tag)
    }

    pub fn find_free_line(&self) -> Option<usize> {
        self.lines.iter().position(|l| !l.is_resident())
    }

    /// Least recently used resident line. On equal times the lowest index wins.
    pub fn find_lru_line(&self) -> Option<usize> {
        let mut lru: Option<usize> = None;
        for (i, line) in self.lines.iter().enumerate() {
            if !line.is_resident() {
                continue;
            }
            match lru {
                Some(j) if self.lines[j].time_used <= line.time_used => (),
                _ => lru = Some(i),
            }
        }
        lru
    }

    /// the resident tags and their states
    pub fn resident(&self) -> impl Iterator<Item = (Tag, LineState)> + '_ {
        self.lines.iter().filter(|l| l.is_resident()).map(|l| (l.tag, l.state))
    }

    // mutators, each reports what it changed

    pub(crate) fn set_state(&mut self, line: usize, state: LineState) {
        if self.lines[line].state == state {
            return;
        }
        trace!("cache {} line {}: {:?} -> {:?}", self.id, line, self.lines[line].state, state);
        self.lines[line].state = state;
        let cache = self.id;
        self.listener.notify(|| Event::LineStateChanged { cache, line });
    }

    pub(crate) fn set_tag(&mut self, line: usize, tag: Tag) {
        if self.lines[line].tag == tag {
            return;
        }
        self.lines[line].tag = tag;
        let cache = self.id;
        self.listener.notify(|| Event::LineTagChanged { cache, line });
    }

    pub(crate) fn touch(&mut self, line: usize, now: u64) {
        if self.lines[line].time_used == now {
            return;
        }
        self.lines[line].time_used = now;
        let cache = self.id;
        self.listener.notify(|| Event::LineTimeChanged { cache, line });
    }

    pub(crate) fn read_word(&mut self, line: usize, index: usize, now: u64) -> Word {
        self.touch(line, now);
        self.lines[line].data[index]
    }

    /// copy of the whole block, counts as an access
    pub(crate) fn read_block(&mut self, line: usize, now: u64) -> Vec<Word> {
        self.touch(line, now);
        let cache = self.id;
        self.listener.notify(|| Event::LineBulkRead { cache, line });
        self.lines[line].data.clone()
    }

    pub(crate) fn write_word(&mut self, line: usize, index: usize, word: Word, now: u64) {
        self.touch(line, now);
        self.lines[line].data[index] = word;
        let cache = self.id;
        self.listener.notify(|| Event::LineValueChanged { cache, line, index });
    }

    pub(crate) fn write_block(&mut self, line: usize, data: Vec<Word>, now: u64) {
        self.touch(line, now);
        debug_assert_eq!(data.len(), self.block_size());
        self.lines[line].data = data;
        let cache = self.id;
        for index in 0..self.block_size() {
            self.listener.notify(|| Event::LineValueChanged { cache, line, index });
        }
    }
}

impl fmt::Display for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} cache #{}", self.protocol, self.id)?;
        for (i, line) in self.lines.iter().enumerate() {
            write!(f, "{:3} {} {:4} {:6}", i, line.state.to_letter(), line.tag, line.time_used)?;
            for word in &line.data {
                write!(f, " {}", word)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
