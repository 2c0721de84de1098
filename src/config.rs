use serde::Deserialize;

use crate::{
    cache::{Cache, IsCache},
    error::CacheError,
    geometry::Geometry,
    replace::{lru::Lru, nmru::Nmru, nru::Nru},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub name: String,
    pub block_size: usize,
    pub sets: usize,
    pub ways: usize,
    pub address_bits: u32,
    pub memory_size: usize,
    pub repl: String,
    /// Only used by `nmru`.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        let g = Geometry::default();
        Config {
            name: "L1D".to_string(),
            block_size: g.block_size,
            sets: g.sets,
            ways: g.ways,
            address_bits: g.address_bits,
            memory_size: g.memory_size,
            repl: "nru".to_string(),
            seed: 0,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.block_size,
            sets: self.sets,
            ways: self.ways,
            address_bits: self.address_bits,
            memory_size: self.memory_size,
        }
    }

    pub fn to_cache(self) -> Result<Box<dyn IsCache>, CacheError> {
        let geometry = self.geometry();
        let cache = match self.repl.as_str() {
            "nru" => Box::new(Cache::new(self.name, geometry, Nru::new())?) as Box<dyn IsCache>,
            "lru" => Box::new(Cache::new(self.name, geometry, Lru::new())?) as Box<dyn IsCache>,
            "nmru" => Box::new(Cache::new(self.name, geometry, Nmru::new(self.seed))?)
                as Box<dyn IsCache>,
            _ => return Err(CacheError::UnknownPolicy(self.repl)),
        };
        Ok(cache)
    }
}
