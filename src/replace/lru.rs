use std::collections::VecDeque;

use crate::cache::Line;

use super::{MakeS, Replace};

/// True least-recently-used replacement. Front of the queue is the MRU way.
#[derive(Debug, Default)]
pub struct Lru {}

impl Lru {
    pub fn new() -> Self {
        Lru {}
    }
}

impl Replace for Lru {
    type Set = LruSetData;

    fn touch(&mut self, set: &mut LruSetData, _lines: &mut [Line], way: usize) {
        let way = way as u16;
        if let Some(idx) = set.ru_order.iter().position(|&w| w == way) {
            let _ = set.ru_order.remove(idx);
        }
        set.ru_order.push_front(way);
    }

    fn victim(&mut self, set: &mut LruSetData, _lines: &mut [Line]) -> usize {
        // Every way of a full set has been filled, so the queue holds them all.
        set.ru_order.back().map_or(0, |&w| usize::from(w))
    }
}

#[derive(Debug, Default)]
pub struct LruSetData {
    ru_order: VecDeque<u16>,
}

impl MakeS for LruSetData {
    fn new(n_ways: usize) -> Self {
        LruSetData {
            ru_order: VecDeque::with_capacity(n_ways),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_recent_is_victim() {
        let mut lru = Lru::new();
        let mut set = LruSetData::new(4);
        let mut lines = vec![Line::new(4); 4];
        for way in [0, 1, 2, 3, 0, 2] {
            lru.touch(&mut set, &mut lines, way);
        }
        assert_eq!(lru.victim(&mut set, &mut lines), 1);
        lru.touch(&mut set, &mut lines, 1);
        assert_eq!(lru.victim(&mut set, &mut lines), 3);
    }
}
