// File: src/error.rs
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    SocketBind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("error reading from UDP socket: {0}")]
    SocketRead(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("datagram is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}
