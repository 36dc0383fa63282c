/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carries a type octet this codec does not know.
    #[error("invalid frame type {0}")]
    InvalidFrameType(u8),

    /// The byte after the payload is not the frame-end octet.
    #[error("missing frame end (expected 0xCE, got 0x{0:02X})")]
    MissingFrameEnd(u8),

    /// The frame exceeds the negotiated maximum frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame or method payload is shorter or shaped differently than its type requires.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
