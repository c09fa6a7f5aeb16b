use serde::Serialize;

#[derive(Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn record_hit(&mut self) {
        self.accesses += 1;
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.accesses += 1;
        self.misses += 1;
    }

    pub fn miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}
