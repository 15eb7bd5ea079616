use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::protocol::WireFormat;

/// Main configuration structure for the apnsd service
///
/// Contains the gateway endpoint, the TLS material used for both the gateway
/// and feedback connections, and daemon runtime options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub tls: TlsFilesConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Push gateway endpoint and dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: WireFormat,
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Certificate and key files, treated as opaque connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsFilesConfig {
    pub local_cert_file: PathBuf,
    pub root_cert_file: PathBuf,
    pub private_key_file: PathBuf,
    pub private_key_passphrase: String,
}

/// Daemon runtime options. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
    pub log_level: String,
    pub log_path: Option<PathBuf>,
}

fn default_dispatch_interval_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            socket_path: None,
            log_level: "info".to_string(),
            log_path: None, // Console logging unless set
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayConfig {
                host: "gateway.sandbox.push.apple.com".to_string(),
                port: 2195,
                protocol: WireFormat::Simple,
                dispatch_interval_ms: default_dispatch_interval_ms(),
                connect_timeout_secs: default_connect_timeout_secs(),
            },
            tls: TlsFilesConfig {
                local_cert_file: PathBuf::from("/sslcerts/cert.pem"),
                root_cert_file: PathBuf::from("/sslcerts/entrust_2048_ca.cer"),
                private_key_file: PathBuf::from("/sslcerts/pk.pem"),
                private_key_passphrase: "1234".to_string(),
            },
            daemon: DaemonConfig::default(),
        }
    }
}
