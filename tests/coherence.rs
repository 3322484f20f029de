use std::collections::HashMap;
use std::sync::mpsc::channel;

use cachesim_coherence::*;

fn system(protocol: Option<Protocol>) -> System {
    System::new(SystemSpec { protocol, ..Default::default() }).unwrap()
}

fn all_selectors() -> Vec<Option<Protocol>> {
    let mut v = vec![None];
    v.extend(Protocol::ALL.iter().copied().map(Some));
    v
}

/// Check the sharing rules for every tag across all caches.
fn assert_coherent(sys: &System) {
    let mut holders: HashMap<Tag, Vec<LineState>> = HashMap::new();
    for cache in sys.hardware().caches() {
        let mut seen = Vec::new();
        for (tag, state) in cache.resident() {
            assert!(!seen.contains(&tag), "cache {} holds tag {} twice", cache.id, tag);
            seen.push(tag);
            holders.entry(tag).or_default().push(state);
        }
    }
    for (tag, states) in holders {
        let count = |s: LineState| states.iter().filter(|&&x| x == s).count();
        let modified = count(LineState::Modified);
        let exclusive = count(LineState::Exclusive);
        let owned = count(LineState::Owned);
        assert!(modified + exclusive <= 1, "tag {}: {:?}", tag, states);
        if modified + exclusive == 1 {
            assert_eq!(states.len(), 1, "tag {}: {:?}", tag, states);
        }
        assert!(owned <= 1, "tag {}: {:?}", tag, states);
        if owned == 1 {
            assert_eq!(count(LineState::Shared), states.len() - 1, "tag {}: {:?}", tag, states);
        }
    }
}

#[test]
fn store_then_load_round_trips_everywhere() {
    for protocol in all_selectors() {
        let mut sys = system(protocol);
        let size = sys.hardware().memory().size();
        for addr in 0..size {
            let cpu = addr % 3;
            sys.store(cpu, addr, 1000 + addr as Word).unwrap();
            assert_eq!(sys.load(cpu, addr).unwrap(), 1000 + addr as Word, "{:?} at {}", protocol, addr);
        }
    }
}

#[test]
fn stores_are_seen_by_every_other_cpu() {
    for protocol in all_selectors() {
        for a in 0..3 {
            for b in 0..3 {
                if a == b {
                    continue;
                }
                let mut sys = system(protocol);
                let word = (10 * a + b) as Word;
                sys.store(a, 13, word).unwrap();
                assert_eq!(sys.load(b, 13).unwrap(), word, "{:?} {} -> {}", protocol, a, b);
                assert_coherent(&sys);
            }
        }
    }
}

#[test]
fn msi_transfers_between_caches() {
    let mut sys = system(Some(Protocol::MSI));
    sys.store(1, 0, 'c' as Word).unwrap();
    let before = *sys.counters();
    assert_eq!(sys.load(2, 0).unwrap(), 'c' as Word);
    let after = *sys.counters();
    assert_eq!(after.cache_response, before.cache_response + 1);
    assert_eq!(after.memory_response, before.memory_response);

    sys.store(1, 8, 'L' as Word).unwrap();
    sys.store(1, 8, 'p' as Word).unwrap();
    assert_eq!(sys.load(2, 8).unwrap(), 'p' as Word);
}

#[test]
fn cpus_without_caches_use_the_bus() {
    let mut sys = System::no_caches(48, 3).unwrap();
    sys.store(0, 5, 'x' as Word).unwrap();
    assert_eq!(sys.load(0, 5).unwrap(), 'x' as Word);
    assert_eq!(sys.counters().load, 1);
    assert_eq!(sys.counters().store, 1);
    assert_eq!(sys.time(), 3 * MEMORY_TICKS);
}

#[test]
fn clock_costs() {
    let mut sys = system(Some(Protocol::MSI));
    sys.load(0, 0).unwrap();
    assert_eq!(sys.time(), 1 + MEMORY_TICKS);
    sys.load(0, 1).unwrap();
    assert_eq!(sys.time(), 2 + MEMORY_TICKS);
    // write miss served by memory ticks once more afterwards
    sys.store(1, 4, 9).unwrap();
    assert_eq!(sys.time(), 4 + 2 * MEMORY_TICKS);
}

#[test]
fn eviction_writes_back_dirty_victim_once() {
    let mut sys = system(Some(Protocol::MSI));
    for tag in 0..3 {
        sys.store(0, tag * 4, 50 + tag as Word).unwrap();
    }
    assert_eq!(sys.counters().write_back, 0);
    sys.store(0, 12, 53).unwrap();
    assert_eq!(sys.counters().write_back, 1);
    assert_eq!(sys.hardware().memory().words()[0], 50);
    let cache = sys.hardware().cache(0).unwrap();
    let tags: Vec<Tag> = cache.resident().map(|(t, _)| t).collect();
    assert_eq!(tags, vec![3, 1, 2]);
}

#[test]
fn owned_victim_is_written_back() {
    for protocol in [Protocol::MOSI, Protocol::MOESI] {
        let mut sys = system(Some(protocol));
        sys.store(0, 0, 5).unwrap();
        assert_eq!(sys.load(1, 0).unwrap(), 5);
        assert_eq!(sys.counters().write_back, 0);
        assert_eq!(sys.hardware().memory().words()[0], 0);

        for tag in 1..4 {
            sys.load(0, tag * 4).unwrap();
        }
        assert_eq!(sys.counters().write_back, 1);
        assert_eq!(sys.hardware().memory().words()[0], 5);
        assert_eq!(sys.load(1, 0).unwrap(), 5);
        assert_coherent(&sys);
    }
}

#[test]
fn owner_store_invalidates_shared_copies() {
    for protocol in [Protocol::MOSI, Protocol::MOESI] {
        let mut sys = system(Some(protocol));
        sys.store(0, 0, 1).unwrap();
        sys.load(1, 0).unwrap();
        sys.store(0, 0, 2).unwrap();
        assert_eq!(sys.counters().invalidate, 1);
        assert_coherent(&sys);
        assert_eq!(sys.load(1, 0).unwrap(), 2);
    }
}

#[test]
fn exclusive_line_upgrades_silently() {
    for protocol in [Protocol::MESI, Protocol::MOESI] {
        let mut sys = system(Some(protocol));
        sys.load(2, 20).unwrap();
        let cache = sys.hardware().cache(2).unwrap();
        assert_eq!(cache.resident().collect::<Vec<_>>(), vec![(5, LineState::Exclusive)]);
        sys.store(2, 21, 8).unwrap();
        assert_eq!(sys.counters().invalidate, 0);
        assert_eq!(sys.counters().write_miss, 0);
        let cache = sys.hardware().cache(2).unwrap();
        assert_eq!(cache.resident().collect::<Vec<_>>(), vec![(5, LineState::Modified)]);
    }
}

#[test]
fn vi_writes_through() {
    let mut sys = system(Some(Protocol::VI));
    sys.store(0, 6, 4).unwrap();
    assert_eq!(sys.hardware().memory().words()[6], 4);
    sys.load(1, 6).unwrap();
    sys.store(0, 6, 4).unwrap();
    assert_eq!(sys.counters().write_back, 2);
    // the write back is the only way a VI copy goes away
    assert_eq!(sys.hardware().cache(1).unwrap().resident().count(), 0);
}

#[test]
fn random_traffic_stays_coherent() {
    let mut x: u64 = 0x2545_f491_4f6c_dd1d;
    for protocol in all_selectors() {
        let mut sys = system(protocol);
        let mut shadow = vec![0 as Word; sys.hardware().memory().size()];
        for i in 0..2000 {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let cpu = ((x >> 33) % 3) as usize;
            let addr = ((x >> 40) % shadow.len() as u64) as usize;
            if (x >> 20) & 1 == 0 {
                sys.store(cpu, addr, i).unwrap();
                shadow[addr] = i;
            } else {
                assert_eq!(sys.load(cpu, addr).unwrap(), shadow[addr], "{:?} step {}", protocol, i);
            }
            assert_coherent(&sys);
        }
        let c = sys.counters();
        assert_eq!(c.memory_response + c.cache_response, c.read_miss + c.write_miss);
    }
}

#[test]
fn counter_identities_after_script() {
    for protocol in all_selectors() {
        let mut sys = System::new(regression::default_spec(protocol)).unwrap();
        regression::run(&mut sys, &regression::default_script());
        let c = *sys.counters();
        assert_eq!(
            c.operations(),
            c.load + c.store + c.read_miss + c.write_miss + c.write_back + c.invalidate
        );
        assert_eq!(c.memory_response + c.cache_response, c.read_miss + c.write_miss);
        assert_eq!(c.total(), c.operations() + c.memory_response);
        assert_coherent(&sys);
    }
}

#[test]
fn load_miss_event_stream() {
    let mut sys = system(Some(Protocol::MSI));
    let (tx, rx) = channel();
    sys.register_listener(tx);
    sys.load(0, 2).unwrap();
    let events: Vec<Event> = rx.try_iter().collect();
    let mut expected = vec![
        Event::ClockChanged { time: 1 },
        Event::Bus(BusEvent::ReadMiss { cache: 0, tag: 0 }),
        Event::ClockChanged { time: 1 + MEMORY_TICKS },
        Event::MemoryRangeRead { base: 0, count: 4 },
        Event::Bus(BusEvent::MemoryResponse { data: vec![0; 4] }),
        Event::LineTimeChanged { cache: 0, line: 0 },
    ];
    for index in 0..4 {
        expected.push(Event::LineValueChanged { cache: 0, line: 0, index });
    }
    expected.push(Event::LineStateChanged { cache: 0, line: 0 });
    assert_eq!(events, expected);

    // a hit only moves the clock and the line time
    sys.load(0, 3).unwrap();
    let events: Vec<Event> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            Event::ClockChanged { time: 2 + MEMORY_TICKS },
            Event::LineTimeChanged { cache: 0, line: 0 },
        ]
    );
}

#[test]
fn engine_ignores_a_dropped_listener() {
    let mut with = system(Some(Protocol::MOESI));
    let mut without = system(Some(Protocol::MOESI));
    let (tx, rx) = channel();
    with.register_listener(tx);
    drop(rx);
    for sys in [&mut with, &mut without] {
        regression::run(sys, &regression::default_script());
    }
    assert_eq!(with.counters(), without.counters());
    assert_eq!(with.time(), without.time());
}

#[test]
fn out_of_range_has_no_side_effects() {
    for protocol in all_selectors() {
        let mut sys = System::new(SystemSpec { protocol, memory_size: 46, ..Default::default() }).unwrap();
        let err = sys.load(0, 48).unwrap_err();
        assert!(matches!(err, SimError::OutOfRange { .. }), "{:?}", protocol);
        assert!(sys.store(1, 100, 1).is_err());
        if protocol.is_some() {
            // the word exists but its block does not fit
            assert_eq!(
                sys.load(2, 44),
                Err(SimError::OutOfRange { base: 44, count: 4, size: 46 })
            );
        }
        assert_eq!(sys.time(), 0);
        assert_eq!(sys.counters().operations(), 0);
        for cache in sys.hardware().caches() {
            assert_eq!(cache.resident().count(), 0);
        }
    }
}

#[test]
fn unknown_protocol_is_rejected() {
    assert_eq!(
        Protocol::from_selector("Firefly"),
        Err(SimError::UnknownProtocol("Firefly".into()))
    );
    assert_eq!(Protocol::from_selector("no_cache"), Ok(None));
}

#[test]
fn cache_dump_lists_lines() {
    let mut sys = system(Some(Protocol::MESI));
    sys.load(1, 4).unwrap();
    let dump = sys.hardware().cache(1).unwrap().to_string();
    let mut lines = dump.lines();
    assert_eq!(lines.next(), Some("MESI cache #1"));
    assert!(lines.next().unwrap().starts_with("  0 E    1"));
    assert_eq!(dump.lines().count(), 4);
}
