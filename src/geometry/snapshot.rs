//! Loop-table snapshot codec.
//!
//! The persistence component stores the definition table as an opaque
//! blob; this module owns its encoding (postcard).  Runtime state is never
//! part of a snapshot.

use heapless::Vec;

use super::{LoopDef, MAX_LOOPS};
use crate::error::ConfigError;

/// Encode the definition table.
pub fn encode_snapshot(defs: &[LoopDef]) -> Result<std::vec::Vec<u8>, ConfigError> {
    if defs.len() > MAX_LOOPS {
        return Err(ConfigError::LoopSlotOutOfRange(defs.len() - 1));
    }
    postcard::to_allocvec(defs).map_err(|_| ConfigError::CorruptedSnapshot)
}

/// Decode a definition table.  Anything that does not decode to at most
/// [`MAX_LOOPS`] definitions, or leaves bytes over, is reported as
/// corrupted.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<LoopDef, MAX_LOOPS>, ConfigError> {
    let (defs, rest) =
        postcard::take_from_bytes(bytes).map_err(|_| ConfigError::CorruptedSnapshot)?;
    if !rest.is_empty() {
        return Err(ConfigError::CorruptedSnapshot);
    }
    Ok(defs)
}
