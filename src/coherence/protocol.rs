// The five snooping protocols. Each protocol is a row of the transition
// table below; the controller asks the table what to do and never matches
// on the protocol itself.

use std::fmt;

use super::cache::LineState;
use super::error::{Result, SimError};

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Protocol {
    VI,
    MSI,
    MESI,
    MOSI,
    MOESI,
}

/// where the data of a read miss came from
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
    Cache,
    Memory,
}

/// reaction of a snooping cache that holds the line
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SnoopAction {
    pub next: LineState,
    pub write_back: bool,
}

impl SnoopAction {
    fn to(next: LineState) -> Self {
        SnoopAction { next, write_back: false }
    }
    fn flush_to(next: LineState) -> Self {
        SnoopAction { next, write_back: true }
    }
}

impl Protocol {
    pub const ALL: [Protocol; 5] = [
        Protocol::VI,
        Protocol::MSI,
        Protocol::MESI,
        Protocol::MOSI,
        Protocol::MOESI,
    ];

    /// Parse a protocol selector. `Ok(None)` selects a system without caches.
    /// Accepts the protocol names in any case and the numeric selectors 1..=6.
    pub fn from_selector(sel: &str) -> Result<Option<Protocol>> {
        match sel.trim().to_ascii_uppercase().as_str() {
            "NONE" | "NO_CACHE" | "1" => Ok(None),
            "VI" | "2" => Ok(Some(Protocol::VI)),
            "MSI" | "3" => Ok(Some(Protocol::MSI)),
            "MESI" | "4" => Ok(Some(Protocol::MESI)),
            "MOSI" | "5" => Ok(Some(Protocol::MOSI)),
            "MOESI" | "6" => Ok(Some(Protocol::MOESI)),
            _ => Err(SimError::UnknownProtocol(sel.to_string())),
        }
    }

    /// states a line can hold under this protocol, besides Invalid
    pub fn states(&self) -> &'static [LineState] {
        use LineState::*;
        match self {
            Protocol::VI => &[Valid],
            Protocol::MSI => &[Shared, Modified],
            Protocol::MESI => &[Shared, Exclusive, Modified],
            Protocol::MOSI => &[Shared, Modified, Owned],
            Protocol::MOESI => &[Shared, Exclusive, Modified, Owned],
        }
    }

    /// every store goes straight to memory
    pub fn write_through(&self) -> bool {
        *self == Protocol::VI
    }

    /// state of a line after a store to it
    pub fn store_state(&self) -> LineState {
        match self {
            Protocol::VI => LineState::Valid,
            _ => LineState::Modified,
        }
    }

    /// A store hit in `state` must invalidate the other copies first.
    /// An owned line may still have shared copies in other caches.
    pub fn store_needs_invalidate(&self, state: LineState) -> bool {
        !self.write_through() && matches!(state, LineState::Shared | LineState::Owned)
    }

    /// state of a line filled by a read miss
    pub fn fill_state(&self, source: Source) -> LineState {
        match (self, source) {
            (Protocol::VI, _) => LineState::Valid,
            (Protocol::MESI | Protocol::MOESI, Source::Memory) => LineState::Exclusive,
            _ => LineState::Shared,
        }
    }

    /// an evicted line in `state` has to be written back
    pub fn is_dirty(&self, state: LineState) -> bool {
        match self {
            Protocol::VI => false,
            Protocol::MSI | Protocol::MESI => state == LineState::Modified,
            Protocol::MOSI | Protocol::MOESI => {
                matches!(state, LineState::Modified | LineState::Owned)
            }
        }
    }

    /// another cache missed on a read of a line we hold
    pub fn on_snoop_read_miss(&self, state: LineState) -> SnoopAction {
        use LineState::*;
        match (self, state) {
            (Protocol::MSI | Protocol::MESI, Modified) => SnoopAction::flush_to(Shared),
            (Protocol::MESI | Protocol::MOESI, Exclusive) => SnoopAction::to(Shared),
            // owner keeps supplying the line, write back is deferred to eviction
            (Protocol::MOSI | Protocol::MOESI, Modified) => SnoopAction::to(Owned),
            _ => SnoopAction::to(state),
        }
    }

    /// another cache missed on a write of a line we hold; the data moves to the writer
    pub fn on_snoop_write_miss(&self, _state: LineState) -> SnoopAction {
        SnoopAction::to(LineState::Invalid)
    }

    /// another cache upgrades its shared copy
    pub fn on_snoop_invalidate(&self, state: LineState) -> SnoopAction {
        match (self, state) {
            (Protocol::VI, _) => SnoopAction::to(LineState::Invalid),
            (_, LineState::Modified) => SnoopAction::flush_to(LineState::Invalid),
            _ => SnoopAction::to(LineState::Invalid),
        }
    }

    /// memory now holds a newer copy than ours
    pub fn on_snoop_write_back(&self, _state: LineState) -> SnoopAction {
        SnoopAction::to(LineState::Invalid)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::VI => "VI",
            Protocol::MSI => "MSI",
            Protocol::MESI => "MESI",
            Protocol::MOSI => "MOSI",
            Protocol::MOESI => "MOESI",
        };
        f.write_str(name)
    }
}
