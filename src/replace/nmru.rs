use crate::cache::Line;

use super::{MakeS, Replace};

/// Random replacement that never evicts the most recently touched way.
#[derive(Debug)]
pub struct Nmru {
    rng: fastrand::Rng,
}

impl Nmru {
    /// Runs with the same seed pick the same victims.
    pub fn new(seed: u64) -> Self {
        Nmru {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Replace for Nmru {
    type Set = NmruSetData;

    fn touch(&mut self, set: &mut NmruSetData, _lines: &mut [Line], way: usize) {
        set.mru_way = way;
    }

    fn victim(&mut self, set: &mut NmruSetData, lines: &mut [Line]) -> usize {
        let n_ways = lines.len();
        if n_ways < 2 {
            return 0;
        }
        let mut victim_way = self.rng.usize(0..(n_ways - 1));
        if victim_way >= set.mru_way {
            victim_way += 1;
        }
        victim_way
    }
}

#[derive(Debug)]
pub struct NmruSetData {
    mru_way: usize,
}

impl MakeS for NmruSetData {
    fn new(_n_ways: usize) -> Self {
        NmruSetData { mru_way: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_picks_mru() {
        let mut nmru = Nmru::new(7);
        let mut set = NmruSetData::new(4);
        let mut lines = vec![Line::new(4); 4];
        nmru.touch(&mut set, &mut lines, 2);
        for _ in 0..200 {
            let v = nmru.victim(&mut set, &mut lines);
            assert!(v < 4 && v != 2);
        }
    }

    #[test]
    fn direct_mapped_has_one_choice() {
        let mut nmru = Nmru::new(0);
        let mut set = NmruSetData::new(1);
        let mut lines = vec![Line::new(4); 1];
        assert_eq!(nmru.victim(&mut set, &mut lines), 0);
    }

    #[test]
    fn seeded_runs_agree() {
        let lines = vec![Line::new(4); 8];
        let picks = |seed| {
            let mut nmru = Nmru::new(seed);
            let mut set = NmruSetData::new(8);
            (0..32)
                .map(|_| nmru.victim(&mut set, &mut lines.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }
}
