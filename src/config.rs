use serde::Deserialize;

// simulation parameters, overridable from a json config file

#[derive(Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cache_latency: u64, // time units before a lookup fires
    pub block_size: u64,    // bytes
    pub proxy_delay: u64,   // time units before the proxy forwards
    pub mem_latency: u64,   // time units per memory access
    pub mem_size: u64,      // bytes
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            cache_latency: 1,
            block_size: 64,
            proxy_delay: 1000,
            mem_latency: 100,
            mem_size: 0x1_0000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"cache_latency": 2, "mem_latency": 10}"#).unwrap();
        assert_eq!(cfg.cache_latency, 2);
        assert_eq!(cfg.mem_latency, 10);
        assert_eq!(cfg.block_size, 64);
        assert_eq!(cfg.proxy_delay, 1000);
    }
}
