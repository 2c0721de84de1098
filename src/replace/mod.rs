pub mod lru;
pub mod nmru;
pub mod nru;

use crate::cache::Line;

/// Per-set bookkeeping a policy keeps alongside the lines.
pub trait MakeS {
    fn new(n_ways: usize) -> Self;
}

/// Victim selection for a full set.
///
/// The engine owns the lines and keeps their `recently_used` bit current; a
/// policy is told about every touch (hit or fill) and asked for a victim only
/// when every way in the set is valid.
pub trait Replace {
    type Set: MakeS;

    fn touch(&mut self, set: &mut Self::Set, lines: &mut [Line], way: usize);

    fn victim(&mut self, set: &mut Self::Set, lines: &mut [Line]) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
}

impl Outcome {
    pub fn is_hit(self) -> bool {
        self == Outcome::Hit
    }
}
