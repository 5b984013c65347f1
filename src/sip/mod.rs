// File: src/sip/mod.rs
pub mod call_tracker;
pub mod message;
pub mod registrar;
pub mod response;
pub mod rewrite;
pub mod router;
