use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_max_request_size")]
    max_request_size: usize,
    #[serde(default = "default_read_timeout_ms")]
    read_timeout_ms: u64,
}

fn default_max_request_size() -> usize {
    1048576 // 1MB
}

fn default_read_timeout_ms() -> u64 {
    5000
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 7878,
            worker_threads: num_cpus::get(),
            local: true,
            max_request_size: default_max_request_size(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename).map_err(|e| {
            error!("无法打开配置文件{}：{}", filename, e);
            Exception::ConfigUnreadable
        })?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val).map_err(|e| {
            error!("无法读取配置文件{}：{}", filename, e);
            Exception::ConfigUnreadable
        })?;

        let mut raw_config: Config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.max_request_size == 0 {
            warn!("max_request_size被设置为0，这将拒绝所有请求，因此该值将被改为默认的1MB。");
            raw_config.max_request_size = default_max_request_size();
        }
        Ok(raw_config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }
}
