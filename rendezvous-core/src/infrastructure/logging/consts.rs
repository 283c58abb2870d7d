pub const LOG_FILE_NAME: &str = "rendezvous.log";

pub const LOG_FILE_MAX_SIZE: u64 = 16 * 1024 * 1024;
pub const LOG_FILE_MAX_ROLLS: u32 = 8;

pub const LOG_LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f%:z)} [{({l}):5.5}] {m}{n}";
pub const LOG_LINE_PATTERN_COLORED: &str = "{d(%Y-%m-%d %H:%M:%S%.3f%:z)} [{h({({l}):5.5})}] {m}{n}";

/// Crates logged at the requested app level; everything else is opt-in.
pub const WHITELISTED_CRATES: &[&str] = &["rendezvous_core", "rendezvous_service"];
