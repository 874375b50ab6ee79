//! Byte buffer -> generic element tree, for both FBX dialects.

pub(crate) mod binary;
pub(crate) mod text;

use crate::error::Error;
use crate::tree::Tree;

/// Magic signature opening every binary FBX document.
pub(crate) const MAGIC: &[u8; 21] = b"Kaydara FBX Binary  \x00";

/// True if the buffer leads with the binary container signature.
pub fn is_binary(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Sniffs the format and runs the matching tokenizer.
pub(crate) fn tokenize(data: &[u8]) -> Result<Tree<'_>, Error> {
    if is_binary(data) {
        binary::tokenize(data)
    } else {
        text::tokenize(data)
    }
}
