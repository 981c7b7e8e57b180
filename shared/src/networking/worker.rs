use serde::{Deserialize, Serialize};

/// A bootstrap client: which master to pull from and how many sessions to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub threads: u8,
}

pub const DEFAULT_THREADS: u8 = 2;

impl Worker {
    pub fn new(name: String, address: String, port: u16, threads: u8) -> Self {
        Self {
            name,
            address,
            port,
            threads,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
