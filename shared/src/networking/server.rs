use serde::{Deserialize, Serialize};

use super::DEFAULT_PORT;

/// Where the master listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub address: String,
    pub port: u16,
}

impl Server {
    pub fn new(address: String, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new("0.0.0.0".to_string(), DEFAULT_PORT)
    }
}
