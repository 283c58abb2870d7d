/// Helper to build storage keys consistently.
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn sep(mut self) -> Self {
        self.buf.push(b':');
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const CF_METADATA: &str = "metadata";
pub const CF_POOL: &str = "pool";
pub const CF_PARTICIPANT: &str = "participant";
pub const CF_PREFERENCE: &str = "preference";
pub const CF_MATCH_RESULT: &str = "match_result";
pub const CF_PSI_SETUP: &str = "psi_setup";
pub const CF_PSI_REQUEST: &str = "psi_request";
pub const CF_PSI_RESPONSE: &str = "psi_response";

pub const ALL_CFS: &[&str] =
    &[CF_METADATA, CF_POOL, CF_PARTICIPANT, CF_PREFERENCE, CF_MATCH_RESULT, CF_PSI_SETUP, CF_PSI_REQUEST, CF_PSI_RESPONSE];
