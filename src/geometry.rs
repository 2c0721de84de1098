use crate::error::CacheError;

/// Widest address the simulator will back with real memory (4 GiB).
pub const MAX_ADDRESS_BITS: u32 = 32;

/// Shape of the cache and the memory behind it. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per line.
    pub block_size: usize,
    pub sets: usize,
    /// Lines per set.
    pub ways: usize,
    pub address_bits: u32,
    /// Bytes of backing memory.
    pub memory_size: usize,
}

impl Default for Geometry {
    /// 4 KiB, 2-way, 32-byte lines in front of 64 KiB of memory with 16-bit addresses.
    fn default() -> Self {
        Geometry {
            block_size: 32,
            sets: 64,
            ways: 2,
            address_bits: 16,
            memory_size: 65536,
        }
    }
}

impl Geometry {
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(invalid(format!(
                "block size {} is not a power of two",
                self.block_size
            )));
        }
        if self.sets == 0 || !self.sets.is_power_of_two() {
            return Err(invalid(format!(
                "set count {} is not a power of two",
                self.sets
            )));
        }
        if self.ways == 0 {
            return Err(invalid("a set needs at least one way".to_string()));
        }
        if self.ways > usize::from(u16::MAX) {
            return Err(invalid(format!("{} ways is too many", self.ways)));
        }
        if !(1..=MAX_ADDRESS_BITS).contains(&self.address_bits) {
            return Err(invalid(format!(
                "address width {} must be between 1 and {MAX_ADDRESS_BITS} bits",
                self.address_bits
            )));
        }
        let used = self.offset_bits() + self.index_bits();
        if used > self.address_bits {
            return Err(invalid(format!(
                "offset and index need {used} bits but addresses are {} bits wide",
                self.address_bits
            )));
        }
        if (self.memory_size as u64) < self.address_space() {
            return Err(invalid(format!(
                "memory of {} bytes cannot back a {}-bit address space",
                self.memory_size, self.address_bits
            )));
        }
        if self.memory_size as u64 > 1u64 << MAX_ADDRESS_BITS {
            return Err(invalid(format!(
                "memory of {} bytes exceeds the {MAX_ADDRESS_BITS}-bit limit",
                self.memory_size
            )));
        }
        Ok(())
    }

    pub fn offset_bits(&self) -> u32 {
        self.block_size.ilog2()
    }

    pub fn index_bits(&self) -> u32 {
        self.sets.ilog2()
    }

    pub fn tag_bits(&self) -> u32 {
        self.address_bits - self.offset_bits() - self.index_bits()
    }

    /// Number of distinct addresses, `2^address_bits`.
    pub fn address_space(&self) -> u64 {
        1u64 << self.address_bits
    }
}

fn invalid(reason: String) -> CacheError {
    CacheError::InvalidGeometry(reason)
}
