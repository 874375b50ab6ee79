use thiserror::Error;

/// Failure of a whole document load.
///
/// The first error hit at any depth aborts the load; no partial scene is
/// ever returned. Soft cases (unresolved connection endpoints, out-of-range
/// attribute indices, unknown object identifiers) are handled locally and
/// never surface here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("read past the end of the input buffer")]
    OutOfRange,

    #[error("syntax error in text document at byte {0}")]
    MalformedSyntax(usize),

    #[error("unknown property type 0x{0:02x}")]
    UnknownPropertyType(u8),

    #[error("unsupported connection tag")]
    UnsupportedConnection,

    #[error("unsupported attribute mapping")]
    UnsupportedMapping,

    #[error("object id is not an integer property")]
    InvalidObjectId,

    #[error("model element is missing its class tag")]
    InvalidModel,

    #[error("animation curve key and value counts differ")]
    InvalidCurve,

    #[error("required element or property missing: {0}")]
    MissingData(&'static str),

    #[error("mesh is connected to more than one geometry")]
    DuplicateGeometry,

    #[error("cluster is already owned by another skin")]
    DuplicateOwner,

    #[error("cluster is linked to more than one node")]
    DuplicateLink,

    #[error("object has more than one node attribute")]
    DuplicateAttribute,

    #[error("animation curve node has more than three curves")]
    TooManyCurves,

    #[error("cluster postprocessing failed: {0}")]
    PostprocessFailed(&'static str),

    #[error("array payload does not match its declared element count")]
    BufferTooSmall,

    #[error("failed to inflate a compressed array")]
    Decompress,
}
