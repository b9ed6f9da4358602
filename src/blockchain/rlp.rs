//! Decoding of the RLP-packed hash lists accepted by `GET /eth/{rlphex}`.
//!
//! The payload is a hex string of an RLP list whose items are the ASCII
//! bytes of each hash string (`"0x5c50…"`), not the 32 raw hash bytes.
//! Existing callers encode it this way, so the format is kept as is.

use rlp::{DecoderError, Rlp};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid RLP: {0}")]
    Rlp(String),

    #[error("Invalid RLP data: expected an array of transaction hashes")]
    NotAList,

    #[error("Invalid transaction hash in RLP data")]
    InvalidHash,
}

impl From<DecoderError> for DecodeError {
    fn from(err: DecoderError) -> Self {
        DecodeError::Rlp(err.to_string())
    }
}

/// Decodes `rlphex` into the list of hash strings it carries.
pub fn decode_hash_list(rlphex: &str) -> Result<Vec<String>, DecodeError> {
    let bytes = hex::decode(rlphex)?;
    debug!("RLP buffer length: {}", bytes.len());

    let rlp = Rlp::new(&bytes);
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != bytes.len() {
        return Err(DecodeError::Rlp(format!(
            "payload is {} bytes but the buffer holds {}",
            info.header_len + info.value_len,
            bytes.len()
        )));
    }

    if !rlp.is_list() {
        return Err(DecodeError::NotAList);
    }

    let count = rlp.item_count()?;
    let mut hashes = Vec::with_capacity(count);
    for index in 0..count {
        let item = rlp.at(index)?;
        if item.is_list() {
            return Err(DecodeError::InvalidHash);
        }
        hashes.push(hash_text(item.data()?));
    }

    debug!("Decoded {} transaction hashes from RLP", hashes.len());
    Ok(hashes)
}

/// Item bytes are the UTF-8 text of the hash; invalid sequences are replaced
/// rather than rejected, matching how existing clients were served.
fn hash_text(item: &[u8]) -> String {
    String::from_utf8_lossy(item).into_owned()
}
