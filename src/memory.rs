use crate::error::CacheError;

/// Flat, zero-initialised main memory.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Fails with [`CacheError::InvalidGeometry`] when `size` bytes cannot be allocated.
    pub fn new(size: usize) -> Result<Self, CacheError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size).map_err(|e| {
            CacheError::InvalidGeometry(format!("cannot allocate {size} bytes of memory: {e}"))
        })?;
        bytes.resize(size, 0);
        Ok(Memory { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn load(&self, addr: u64) -> Result<u8, CacheError> {
        let i = self.index(addr)?;
        Ok(self.bytes[i])
    }

    pub fn store(&mut self, addr: u64, value: u8) -> Result<(), CacheError> {
        let i = self.index(addr)?;
        self.bytes[i] = value;
        Ok(())
    }

    fn index(&self, addr: u64) -> Result<usize, CacheError> {
        usize::try_from(addr)
            .ok()
            .filter(|&i| i < self.bytes.len())
            .ok_or(CacheError::OutOfRange {
                address: i128::from(addr),
                limit: self.bytes.len() as u64,
            })
    }
}
