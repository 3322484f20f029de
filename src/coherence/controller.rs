// Cache controllers: processor requests coming down into a cache, and
// snoop broadcasts coming up from the bus. The protocol table decides the
// transitions; this module sequences them against the bus.

use log::{debug, trace};

use super::cache::LineState;
use super::common::*;
use super::error::Result;
use super::system::Hardware;

impl Hardware {
    // processor side

    pub fn cache_load(&mut self, id: CacheId, addr: usize) -> Result<Word> {
        let (tag, index) = self.caches[id].pos(Addr(addr));
        self.check_block(tag)?;
        self.clock.tick();

        let line = match self.caches[id].line_for(tag) {
            Some(line) => {
                trace!("cache {} read hit on tag {}", id, tag);
                line
            }
            None => {
                debug!("cache {} read miss on tag {}", id, tag);
                let line = self.allocate(id, tag)?;
                let response = self.place_read_miss(id, tag)?;
                let state = self.caches[id].protocol().fill_state(response.source);
                let now = self.clock.time();
                let cache = &mut self.caches[id];
                cache.write_block(line, response.data, now);
                cache.set_state(line, state);
                line
            }
        };
        let now = self.clock.time();
        Ok(self.caches[id].read_word(line, index, now))
    }

    pub fn cache_store(&mut self, id: CacheId, addr: usize, word: Word) -> Result<()> {
        let (tag, index) = self.caches[id].pos(Addr(addr));
        self.check_block(tag)?;
        self.clock.tick();
        let protocol = self.caches[id].protocol();

        let line = match self.caches[id].line_for(tag) {
            Some(line) => {
                trace!("cache {} write hit on tag {}", id, tag);
                if protocol.store_needs_invalidate(self.caches[id].state(line)) {
                    self.place_invalidate(id, tag)?;
                }
                line
            }
            None => {
                debug!("cache {} write miss on tag {}", id, tag);
                let line = self.allocate(id, tag)?;
                let data = self.place_write_miss(id, tag)?;
                let now = self.clock.time();
                self.caches[id].write_block(line, data, now);
                line
            }
        };

        let now = self.clock.time();
        let cache = &mut self.caches[id];
        cache.set_state(line, protocol.store_state());
        cache.write_word(line, index, word, now);
        if protocol.write_through() {
            let data = cache.read_block(line, now);
            self.place_write_back(id, tag, data)?;
        }
        Ok(())
    }

    /// a line for `tag`, evicting the least recently used one if the cache is full
    fn allocate(&mut self, id: CacheId, tag: Tag) -> Result<usize> {
        let line = match self.caches[id].find_free_line() {
            Some(line) => line,
            None => self.evict(id)?,
        };
        self.caches[id].set_tag(line, tag);
        Ok(line)
    }

    fn evict(&mut self, id: CacheId) -> Result<usize> {
        let cache = &self.caches[id];
        // a cache without free lines has at least one resident line
        let line = match cache.find_lru_line() {
            Some(line) => line,
            None => unreachable!("cache {} has neither free nor resident lines", id),
        };
        let victim = cache.line(line);
        debug!("cache {} evicts line {} (tag {}, {:?})", id, line, victim.tag, victim.state);
        if cache.protocol().is_dirty(victim.state) {
            let (tag, data) = (victim.tag, victim.data.clone());
            self.place_write_back(id, tag, data)?;
        }
        self.caches[id].set_state(line, LineState::Invalid);
        Ok(line)
    }

    // bus side, `id` is the snooping cache

    pub(crate) fn snoop_read_miss(&mut self, id: CacheId, tag: Tag) -> Result<Option<Vec<Word>>> {
        let line = match self.caches[id].line_for(tag) {
            Some(line) => line,
            None => return Ok(None),
        };
        let now = self.clock.time();
        let cache = &mut self.caches[id];
        let data = cache.read_block(line, now);
        let action = cache.protocol().on_snoop_read_miss(cache.state(line));
        trace!("cache {} snoops read miss on tag {}: {:?}", id, tag, action);
        cache.set_state(line, action.next);
        if action.write_back {
            self.place_write_back(id, tag, data.clone())?;
        }
        Ok(Some(data))
    }

    pub(crate) fn snoop_write_miss(&mut self, id: CacheId, tag: Tag) -> Option<Vec<Word>> {
        let line = self.caches[id].line_for(tag)?;
        let now = self.clock.time();
        let cache = &mut self.caches[id];
        let data = cache.read_block(line, now);
        let action = cache.protocol().on_snoop_write_miss(cache.state(line));
        trace!("cache {} snoops write miss on tag {}: {:?}", id, tag, action);
        cache.set_state(line, action.next);
        Some(data)
    }

    pub(crate) fn snoop_invalidate(&mut self, id: CacheId, tag: Tag) -> Result<()> {
        let line = match self.caches[id].line_for(tag) {
            Some(line) => line,
            None => return Ok(()),
        };
        let cache = &self.caches[id];
        let action = cache.protocol().on_snoop_invalidate(cache.state(line));
        trace!("cache {} snoops invalidate on tag {}: {:?}", id, tag, action);
        if action.write_back {
            let now = self.clock.time();
            let data = self.caches[id].read_block(line, now);
            self.place_write_back(id, tag, data)?;
        }
        self.caches[id].set_state(line, action.next);
        Ok(())
    }

    pub(crate) fn snoop_write_back(&mut self, id: CacheId, tag: Tag) {
        if let Some(line) = self.caches[id].line_for(tag) {
            let cache = &mut self.caches[id];
            let action = cache.protocol().on_snoop_write_back(cache.state(line));
            trace!("cache {} snoops write back on tag {}: {:?}", id, tag, action);
            cache.set_state(line, action.next);
        }
    }

    /// the whole block of `tag` has to exist before a cache may touch it
    fn check_block(&self, tag: Tag) -> Result<()> {
        let base = Addr::base(tag, self.offset_bits).0;
        self.memory.check_range(base, 1 << self.offset_bits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;
    use crate::coherence::events::{BusEvent, Event};
    use crate::coherence::protocol::Protocol;
    use crate::coherence::system::System;
    use crate::coherence::SystemSpec;

    fn system(protocol: Protocol) -> System {
        System::new(SystemSpec { protocol: Some(protocol), ..Default::default() }).unwrap()
    }

    fn write_backs(events: &[Event]) -> Vec<(CacheId, Tag)> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Bus(BusEvent::WriteBack { cache, tag, .. }) => Some((*cache, *tag)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn invalidate_write_back_is_attributed_to_the_flushing_cache() {
        let mut sys = system(Protocol::MSI);
        sys.store(1, 8, 42).unwrap();

        // force a modified copy next to a shared one to reach the flush path
        let hw = sys.hardware_mut();
        let line = hw.caches[1].line_for(2).unwrap();
        hw.caches[1].set_state(line, LineState::Modified);
        let free = hw.caches[0].find_free_line().unwrap();
        hw.caches[0].set_tag(free, 2);
        hw.caches[0].set_state(free, LineState::Shared);

        let (tx, rx) = channel();
        sys.register_listener(tx);
        sys.hardware_mut().place_invalidate(0, 2).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(write_backs(&events), vec![(1, 2)]);
        assert_eq!(sys.hardware().memory().words()[8], 42);
        assert_eq!(sys.hardware().caches()[1].line_for(2), None);
    }

    #[test]
    fn read_miss_flush_is_attributed_to_the_owner() {
        let mut sys = system(Protocol::MESI);
        sys.store(2, 4, 7).unwrap();
        let (tx, rx) = channel();
        sys.register_listener(tx);
        assert_eq!(sys.load(0, 4).unwrap(), 7);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(write_backs(&events), vec![(2, 1)]);
        assert!(events.contains(&Event::Bus(BusEvent::CacheResponse { cache: 2, data: vec![7, 0, 0, 0] })));
    }

    #[test]
    fn snoops_never_reach_the_requester() {
        let mut sys = system(Protocol::MOESI);
        sys.store(0, 0, 1).unwrap();
        sys.load(0, 0).unwrap();
        let hw = sys.hardware_mut();
        let before = hw.caches[0].state(hw.caches[0].line_for(0).unwrap());
        hw.place_invalidate(0, 0).unwrap();
        let after = hw.caches[0].state(hw.caches[0].line_for(0).unwrap());
        assert_eq!(before, LineState::Modified);
        assert_eq!(after, LineState::Modified);
    }

    #[test]
    fn eviction_of_clean_line_is_silent() {
        let mut sys = system(Protocol::MESI);
        for tag in 0..4 {
            sys.load(0, tag * 4).unwrap();
        }
        assert_eq!(sys.counters().write_back, 0);
        assert_eq!(sys.hardware().caches()[0].line_for(0), None);
    }
}
