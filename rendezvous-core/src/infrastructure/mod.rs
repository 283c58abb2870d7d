//! Infrastructure layer: crypto, storage engines, transport, external
//! service adapters, configuration, logging.

pub mod adapters;
pub mod config;
pub mod crypto;
pub mod logging;
pub mod storage;
pub mod transport;
