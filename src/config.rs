// File: src/config.rs
use crate::error::RelayError;
use std::env;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub public_ip: IpAddr,
    pub public_port: u16,
    pub http_port: u16,
    pub audit_log_path: String,
    pub env: String,
    pub service_version: String,
    pub git_commit: String,
    pub build_date: String,
}

impl AppConfig {
    pub fn load_from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let env = env::var("ENV").unwrap_or_else(|_| "production".to_string());
        let listen_port = env::var("SIP_RELAY_LISTEN_PORT")
            .unwrap_or_else(|_| "5060".to_string())
            .parse::<u16>()
            .map_err(|_| RelayError::Config("invalid SIP_RELAY_LISTEN_PORT".to_string()))?;

        let public_ip_str = env::var("PUBLIC_IP")
            .map_err(|_| RelayError::Config("required: PUBLIC_IP (the relay's advertised address) is missing".to_string()))?;
        let public_ip = public_ip_str
            .parse::<IpAddr>()
            .map_err(|_| RelayError::Config(format!("invalid PUBLIC_IP address: {}", public_ip_str)))?;

        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| RelayError::Config("invalid HTTP_PORT".to_string()))?;

        let audit_log_path = env::var("AUDIT_LOG_PATH").unwrap_or_else(|_| "call.log".to_string());

        let listen_addr_str = format!("0.0.0.0:{}", listen_port);
        let listen_addr = listen_addr_str
            .parse::<SocketAddr>()
            .map_err(|_| RelayError::Config(format!("invalid listen address: {}", listen_addr_str)))?;

        let service_version = env::var("SERVICE_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let git_commit = env::var("GIT_COMMIT").unwrap_or_else(|_| "unknown".to_string());
        let build_date = env::var("BUILD_DATE").unwrap_or_else(|_| "unknown".to_string());

        Ok(AppConfig {
            listen_addr,
            public_ip,
            public_port: listen_port,
            http_port,
            audit_log_path,
            env,
            service_version,
            git_commit,
            build_date,
        })
    }

    /// The via entry this relay stacks onto every forwarded request.
    /// Derived once from the advertised address; immutable for the
    /// process lifetime.
    pub fn own_via_prefix(&self) -> String {
        format!("Via: SIP/2.0/UDP {}:{}", self.public_ip, self.public_port)
    }

    /// The Record-Route line inserted so in-dialog requests keep routing
    /// through this relay.
    pub fn record_route(&self) -> String {
        format!("Record-Route: <sip:{}:{};lr>", self.public_ip, self.public_port)
    }
}
