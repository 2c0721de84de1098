use crate::cache::Line;

use super::{MakeS, Replace};

/// One-bit not-recently-used sweep.
///
/// The victim is the first way whose `recently_used` bit is clear. When every
/// way has been touched since the last sweep, all bits are cleared and way 0
/// is taken.
#[derive(Debug, Default)]
pub struct Nru {}

impl Nru {
    pub fn new() -> Self {
        Nru {}
    }
}

impl MakeS for () {
    fn new(_n_ways: usize) -> Self {}
}

impl Replace for Nru {
    type Set = ();

    fn touch(&mut self, _set: &mut (), _lines: &mut [Line], _way: usize) {}

    fn victim(&mut self, _set: &mut (), lines: &mut [Line]) -> usize {
        if let Some(way) = lines.iter().position(|l| !l.recently_used) {
            return way;
        }
        for line in lines.iter_mut() {
            line.recently_used = false;
        }
        0
    }
}
