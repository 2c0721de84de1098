use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::{
    addr::{Addr, Decoder},
    error::CacheError,
    geometry::Geometry,
    memory::Memory,
    replace::{MakeS, Outcome, Replace},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub reads: u64,
    pub writes: u64,
    pub evictions: u64,
    pub write_backs: u64,
    pub miss_rate: f64,
}

/// One way of one set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tag: u64,
    pub valid: bool,
    /// Set only while `valid`; the data differs from memory.
    pub dirty: bool,
    /// Touched since the last not-recently-used sweep.
    pub recently_used: bool,
    pub data: Box<[u8]>,
}

impl Line {
    pub fn new(block_size: usize) -> Self {
        Line {
            tag: 0,
            valid: false,
            dirty: false,
            recently_used: false,
            data: vec![0; block_size].into_boxed_slice(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    accesses: u64,
    misses: u64,
    reads: u64,
    writes: u64,
    evictions: u64,
    write_backs: u64,
}

/// A write-back, write-allocate set-associative cache in front of its own memory.
pub struct Cache<R: Replace> {
    name: String,
    geometry: Geometry,
    decoder: Decoder,
    lines: Vec<Line>,
    set_data: Vec<R::Set>,
    memory: Memory,
    repl: R,
    stats: Counters,
}

impl<R: Replace> Cache<R> {
    /// Fails with [`CacheError::InvalidGeometry`] rather than truncating a bad shape.
    pub fn new(name: String, geometry: Geometry, repl: R) -> Result<Self, CacheError> {
        geometry.validate()?;

        Ok(Cache {
            name,
            decoder: Decoder::new(&geometry),
            lines: vec![Line::new(geometry.block_size); geometry.sets * geometry.ways],
            set_data: std::iter::repeat_with(|| <R::Set as MakeS>::new(geometry.ways))
                .take(geometry.sets)
                .collect(),
            memory: Memory::new(geometry.memory_size)?,
            geometry,
            repl,
            stats: Counters::default(),
        })
    }

    fn get_set(&self, set: usize) -> Range<usize> {
        set * self.geometry.ways..(set + 1) * self.geometry.ways
    }

    fn check(&self, addr: u64) -> Result<(), CacheError> {
        let limit = self.geometry.address_space();
        if addr >= limit {
            return Err(CacheError::OutOfRange {
                address: i128::from(addr),
                limit,
            });
        }
        Ok(())
    }

    /// Resolves `addr` to a resident line, filling on a miss. Returns the
    /// line's index into `lines` and whether it was already present.
    fn access(&mut self, addr: Addr) -> Result<(usize, Outcome), CacheError> {
        let range = self.get_set(addr.set);
        let hit = self.lines[range.clone()]
            .iter()
            .position(|l| l.valid && l.tag == addr.tag);

        let (way, outcome) = match hit {
            Some(way) => (way, Outcome::Hit),
            None => (self.fill(addr)?, Outcome::Miss),
        };

        let idx = range.start + way;
        self.lines[idx].recently_used = true;
        self.repl
            .touch(&mut self.set_data[addr.set], &mut self.lines[range], way);

        self.stats.accesses += 1;
        if outcome == Outcome::Miss {
            self.stats.misses += 1;
        }
        Ok((idx, outcome))
    }

    /// Brings the block holding `addr` into its set and returns the way used.
    fn fill(&mut self, addr: Addr) -> Result<usize, CacheError> {
        let range = self.get_set(addr.set);

        let way = match self.lines[range.clone()].iter().position(|l| !l.valid) {
            Some(way) => way,
            None => {
                let way = self
                    .repl
                    .victim(&mut self.set_data[addr.set], &mut self.lines[range.clone()]);
                let victim = &self.lines[range.start + way];
                debug!(
                    set = addr.set,
                    way,
                    tag = victim.tag,
                    dirty = victim.dirty,
                    "evicting"
                );
                self.stats.evictions += 1;
                if victim.dirty {
                    self.write_back(range.start + way, addr.set)?;
                }
                way
            }
        };

        let base = self.decoder.block_base(addr.set, addr.tag);
        let line = &mut self.lines[range.start + way];
        for (i, byte) in line.data.iter_mut().enumerate() {
            *byte = self.memory.load(base + i as u64)?;
        }
        line.tag = addr.tag;
        line.valid = true;
        line.dirty = false;
        line.recently_used = true;
        debug!(set = addr.set, way, base, "filled");

        Ok(way)
    }

    fn write_back(&mut self, idx: usize, set: usize) -> Result<(), CacheError> {
        let line = &mut self.lines[idx];
        let base = self.decoder.block_base(set, line.tag);
        for (i, &byte) in line.data.iter().enumerate() {
            self.memory.store(base + i as u64, byte)?;
        }
        line.dirty = false;
        self.stats.write_backs += 1;
        debug!(set, base, "wrote back");
        Ok(())
    }
}

/// The engine as seen by the trace runner, independent of replacement policy.
pub trait IsCache {
    fn name(&self) -> &str;
    fn geometry(&self) -> &Geometry;
    fn read(&mut self, addr: u64) -> Result<(u8, Outcome), CacheError>;
    fn write(&mut self, addr: u64, value: u8) -> Result<Outcome, CacheError>;
    fn miss_rate(&self) -> f64;
    /// Writes every dirty line back to memory. Returns how many were written.
    fn flush(&mut self) -> Result<usize, CacheError>;
    /// Zeroes the counters. Lines and memory are left alone.
    fn clear_stats(&mut self);
    fn make_stats(&self) -> CacheStats;
    fn memory(&self) -> &Memory;
    fn set_lines(&self, set: usize) -> &[Line];
}

impl<R: Replace> IsCache for Cache<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn read(&mut self, addr: u64) -> Result<(u8, Outcome), CacheError> {
        self.check(addr)?;
        let addr = self.decoder.split(addr);
        let (idx, outcome) = self.access(addr)?;
        self.stats.reads += 1;
        Ok((self.lines[idx].data[addr.offset], outcome))
    }

    fn write(&mut self, addr: u64, value: u8) -> Result<Outcome, CacheError> {
        self.check(addr)?;
        let addr = self.decoder.split(addr);
        let (idx, outcome) = self.access(addr)?;
        self.stats.writes += 1;
        let line = &mut self.lines[idx];
        line.data[addr.offset] = value;
        line.dirty = true;
        Ok(outcome)
    }

    fn miss_rate(&self) -> f64 {
        if self.stats.accesses == 0 {
            return 0.0;
        }
        self.stats.misses as f64 / self.stats.accesses as f64
    }

    fn flush(&mut self) -> Result<usize, CacheError> {
        let mut flushed = 0;
        for idx in 0..self.lines.len() {
            if self.lines[idx].dirty {
                self.write_back(idx, idx / self.geometry.ways)?;
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    fn clear_stats(&mut self) {
        self.stats = Counters::default();
    }

    fn make_stats(&self) -> CacheStats {
        let c = self.stats;
        CacheStats {
            name: self.name.clone(),
            accesses: c.accesses,
            hits: c.accesses - c.misses,
            misses: c.misses,
            reads: c.reads,
            writes: c.writes,
            evictions: c.evictions,
            write_backs: c.write_backs,
            miss_rate: self.miss_rate(),
        }
    }

    fn memory(&self) -> &Memory {
        &self.memory
    }

    fn set_lines(&self, set: usize) -> &[Line] {
        &self.lines[self.get_set(set)]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::replace::{lru::Lru, nru::Nru};

    fn nru_cache() -> Cache<Nru> {
        Cache::new("L1D".to_string(), Geometry::default(), Nru::new()).unwrap()
    }

    /// Address of byte `offset` in the block with `tag` in `set`, default geometry.
    fn at(tag: u64, set: u64, offset: u64) -> u64 {
        (tag << 11) | (set << 5) | offset
    }

    #[test]
    fn read_write_read_scenario() {
        let mut c = nru_cache();
        assert_eq!(c.read(0), Ok((0, Outcome::Miss)));
        assert_eq!(c.write(0, b'A'), Ok(Outcome::Hit));
        assert!(c.set_lines(0)[0].dirty);
        assert_eq!(c.read(0), Ok((b'A', Outcome::Hit)));
        assert!((c.miss_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn miss_rate_is_zero_before_any_access() {
        assert_eq!(nru_cache().miss_rate(), 0.0);
    }

    #[test]
    fn whole_block_is_filled() {
        let mut c = nru_cache();
        assert_eq!(c.read(at(1, 4, 0)).unwrap().1, Outcome::Miss);
        for offset in 1..32 {
            assert_eq!(c.read(at(1, 4, offset)).unwrap().1, Outcome::Hit);
        }
    }

    #[test]
    fn write_miss_allocates_dirty_line() {
        let mut c = nru_cache();
        assert_eq!(c.write(at(3, 9, 5), 0x7F), Ok(Outcome::Miss));
        let line = &c.set_lines(9)[0];
        assert!(line.valid && line.dirty && line.recently_used);
        assert_eq!(line.tag, 3);
        assert_eq!(line.data[5], 0x7F);
        // memory untouched until eviction
        assert_eq!(c.memory().load(at(3, 9, 5)), Ok(0));
    }

    #[test]
    fn nru_victim_order() {
        let mut c = nru_cache();
        c.read(at(0, 2, 0)).unwrap();
        c.read(at(1, 2, 0)).unwrap();
        // both ways touched: sweep, way 0 goes
        assert_eq!(c.read(at(2, 2, 0)).unwrap().1, Outcome::Miss);
        let tags: Vec<_> = c.set_lines(2).iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec![2, 1]);
        // way 1 was cleared by the sweep, so it is next
        c.read(at(3, 2, 0)).unwrap();
        let tags: Vec<_> = c.set_lines(2).iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec![2, 3]);
        assert_eq!(c.make_stats().evictions, 2);
    }

    #[test]
    fn one_extra_tag_evicts_exactly_once() {
        let g = Geometry {
            ways: 4,
            sets: 16,
            ..Geometry::default()
        };
        let mut c = Cache::new("L1D".to_string(), g, Nru::new()).unwrap();
        let addr = |tag: u64| (tag << 9) | (5 << 5);
        for tag in 0..5 {
            assert_eq!(c.read(addr(tag)).unwrap().1, Outcome::Miss);
        }
        assert_eq!(c.make_stats().evictions, 1);
        let tags: Vec<_> = c.set_lines(5).iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec![4, 1, 2, 3]);
    }

    #[test]
    fn dirty_victim_written_back_and_reloaded() {
        let mut c = nru_cache();
        c.write(at(0, 7, 3), b'x').unwrap();
        c.write(at(0, 7, 31), b'y').unwrap();
        c.read(at(1, 7, 0)).unwrap();
        // evicts tag 0
        c.read(at(2, 7, 0)).unwrap();
        assert_eq!(c.make_stats().write_backs, 1);
        assert_eq!(c.memory().load(at(0, 7, 3)), Ok(b'x'));
        assert_eq!(c.memory().load(at(0, 7, 31)), Ok(b'y'));
        assert_eq!(c.read(at(0, 7, 3)), Ok((b'x', Outcome::Miss)));
        assert_eq!(c.read(at(0, 7, 31)), Ok((b'y', Outcome::Hit)));
    }

    #[test]
    fn clean_victim_not_written_back() {
        let mut c = nru_cache();
        for tag in 0..3 {
            c.read(at(tag, 1, 0)).unwrap();
        }
        let stats = c.make_stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.write_backs, 0);
    }

    #[test]
    fn out_of_range_leaves_state_alone() {
        let mut c = nru_cache();
        c.write(0, 1).unwrap();
        let before = c.make_stats();
        let err = CacheError::OutOfRange {
            address: 65536,
            limit: 65536,
        };
        assert_eq!(c.read(65536), Err(err.clone()));
        assert_eq!(c.write(65536, 9), Err(err));
        assert_eq!(c.make_stats(), before);
        assert!(c.set_lines(0)[0].dirty);
    }

    #[test]
    fn flush_writes_dirty_lines_once() {
        let mut c = nru_cache();
        c.write(at(4, 0, 0), 1).unwrap();
        c.write(at(5, 63, 0), 2).unwrap();
        c.read(at(6, 10, 0)).unwrap();
        assert_eq!(c.flush(), Ok(2));
        assert_eq!(c.memory().load(at(4, 0, 0)), Ok(1));
        assert_eq!(c.memory().load(at(5, 63, 0)), Ok(2));
        assert_eq!(c.flush(), Ok(0));
        // flushing is not an access
        assert_eq!(c.make_stats().accesses, 3);
        assert!(c.set_lines(0)[0].valid);
    }

    #[test]
    fn clear_stats_keeps_contents() {
        let mut c = nru_cache();
        c.read(0).unwrap();
        c.clear_stats();
        assert_eq!(c.make_stats().accesses, 0);
        assert_eq!(c.read(0).unwrap().1, Outcome::Hit);
    }

    #[test]
    fn lru_keeps_recent_block() {
        let mut c = Cache::new("L1D".to_string(), Geometry::default(), Lru::new()).unwrap();
        c.read(at(0, 3, 0)).unwrap();
        c.read(at(1, 3, 0)).unwrap();
        c.read(at(0, 3, 0)).unwrap();
        c.read(at(2, 3, 0)).unwrap();
        assert_eq!(c.read(at(0, 3, 0)).unwrap().1, Outcome::Hit);
        assert_eq!(c.read(at(1, 3, 0)).unwrap().1, Outcome::Miss);
    }

    #[test]
    fn rejects_invalid_geometry() {
        let g = Geometry {
            sets: 3,
            ..Geometry::default()
        };
        assert!(matches!(
            Cache::new("bad".to_string(), g, Nru::new()),
            Err(CacheError::InvalidGeometry(_))
        ));
    }
}
