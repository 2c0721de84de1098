use crate::geometry::Geometry;

/// An address split into the fields the cache indexes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub offset: usize,
    pub set: usize,
    pub tag: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct BitSection {
    shift: u32,
    mask: u64,
}

impl BitSection {
    fn apply(&self, num: u64) -> u64 {
        (num >> self.shift) & self.mask
    }

    fn place(&self, field: u64) -> u64 {
        (field & self.mask) << self.shift
    }
}

/// Maps linear addresses to `(offset, set, tag)` and back. Shifts and masks only.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    offset_sec: BitSection,
    set_sec: BitSection,
    tag_sec: BitSection,
}

impl Decoder {
    /// `geometry` is expected to have passed [`Geometry::validate`].
    pub fn new(geometry: &Geometry) -> Self {
        let offset_sec = BitSection {
            shift: 0,
            mask: geometry.block_size as u64 - 1,
        };

        let set_shift = geometry.offset_bits();
        let set_sec = BitSection {
            shift: set_shift,
            mask: geometry.sets as u64 - 1,
        };

        let tag_shift = geometry.index_bits() + set_shift;
        let tag_sec = BitSection {
            shift: tag_shift,
            mask: (1u64 << geometry.tag_bits()) - 1,
        };

        Decoder {
            offset_sec,
            set_sec,
            tag_sec,
        }
    }

    pub fn split(&self, addr: u64) -> Addr {
        Addr {
            offset: self.offset_sec.apply(addr) as usize,
            set: self.set_sec.apply(addr) as usize,
            tag: self.tag_sec.apply(addr),
        }
    }

    pub fn join(&self, addr: Addr) -> u64 {
        self.tag_sec.place(addr.tag)
            | self.set_sec.place(addr.set as u64)
            | self.offset_sec.place(addr.offset as u64)
    }

    /// First address of the block holding `tag` in `set`.
    pub fn block_base(&self, set: usize, tag: u64) -> u64 {
        self.join(Addr { offset: 0, set, tag })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn splits_default_geometry() {
        let d = Decoder::new(&Geometry::default());
        // tag 0b10110, set 0b000011, offset 0b00111
        let addr = 0b10110_000011_00111;
        assert_eq!(
            d.split(addr),
            Addr {
                offset: 7,
                set: 3,
                tag: 0b10110
            }
        );
    }

    #[test]
    fn block_base_clears_offset() {
        let d = Decoder::new(&Geometry::default());
        let a = d.split(0x1234);
        assert_eq!(d.block_base(a.set, a.tag), 0x1234 & !31);
    }

    proptest! {
        #[test]
        fn join_inverts_split(addr in 0u64..(1 << 16)) {
            let d = Decoder::new(&Geometry::default());
            prop_assert_eq!(d.join(d.split(addr)), addr);
        }

        #[test]
        fn join_inverts_split_any_geometry(
            offset_bits in 0u32..6,
            index_bits in 0u32..6,
            tag_bits in 0u32..8,
            seed in any::<u64>(),
        ) {
            let address_bits = offset_bits + index_bits + tag_bits;
            prop_assume!(address_bits >= 1);
            let g = Geometry {
                block_size: 1 << offset_bits,
                sets: 1 << index_bits,
                ways: 1,
                address_bits,
                memory_size: 1 << address_bits,
            };
            prop_assert!(g.validate().is_ok());
            let d = Decoder::new(&g);
            let addr = seed & (g.address_space() - 1);
            let a = d.split(addr);
            prop_assert!(a.offset < g.block_size);
            prop_assert!(a.set < g.sets);
            prop_assert_eq!(d.join(a), addr);
        }
    }
}
