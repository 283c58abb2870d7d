use crate::foundation::RendezvousError;

pub fn decode_hex_prefixed(value: &str) -> Result<Vec<u8>, RendezvousError> {
    let stripped = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    hex::decode(stripped).map_err(|err| RendezvousError::InvalidInput(format!("invalid hex: {err}")))
}

pub fn parse_hex_fixed<const N: usize>(value: &str) -> Result<[u8; N], RendezvousError> {
    let bytes = decode_hex_prefixed(value)?;
    if bytes.len() != N {
        return Err(RendezvousError::InvalidInput(format!("expected {N} bytes, got {}", bytes.len())));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn parse_hex_32bytes(value: &str) -> Result<[u8; 32], RendezvousError> {
    parse_hex_fixed::<32>(value)
}
