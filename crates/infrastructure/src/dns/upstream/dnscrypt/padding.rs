//! ISO/IEC 7816-4 padding used by DNSCrypt payloads.

use danse_domain::DomainError;

pub const PADDING_BLOCK: usize = 64;
const PAD_MARKER: u8 = 0x80;

/// Pads to at least `min_len` bytes, rounded up to a 64-byte boundary.
pub fn pad(message: &[u8], min_len: usize) -> Vec<u8> {
    let unpadded = (message.len() + 1).max(min_len);
    let target = unpadded.div_ceil(PADDING_BLOCK) * PADDING_BLOCK;

    let mut padded = Vec::with_capacity(target);
    padded.extend_from_slice(message);
    padded.push(PAD_MARKER);
    padded.resize(target, 0);
    padded
}

pub fn unpad(padded: &[u8]) -> Result<&[u8], DomainError> {
    let marker = padded
        .iter()
        .rposition(|&b| b != 0)
        .ok_or_else(|| DomainError::DnscryptProtocol("Padding marker missing".into()))?;

    if padded[marker] != PAD_MARKER {
        return Err(DomainError::DnscryptProtocol("Invalid padding".into()));
    }
    Ok(&padded[..marker])
}
