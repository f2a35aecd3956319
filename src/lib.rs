//! Spire Relay Library
//!
//! Quorum-based price relayer for on-chain median oracle contracts

pub mod config;
pub mod oracle;
pub mod price;
pub mod relayer;
pub mod transport;
pub mod types;
