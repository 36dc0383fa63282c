use std::fmt;
use std::io;

use amqpmux_frame::FrameError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const NOT_FOUND: i32 = 66;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidFrameType(_)
        | FrameError::MissingFrameEnd(_)
        | FrameError::FrameTooLarge { .. }
        | FrameError::Malformed(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = io_error("read capture", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, NOT_FOUND);
        assert!(err.message.starts_with("read capture: "));
    }

    #[test]
    fn corrupt_frames_map_to_data_invalid() {
        assert_eq!(frame_error("decode", FrameError::MissingFrameEnd(0)).code, DATA_INVALID);
        assert_eq!(
            frame_error("decode", FrameError::FrameTooLarge { size: 10, max: 5 }).code,
            DATA_INVALID
        );
        assert_eq!(frame_error("decode", FrameError::ConnectionClosed).code, FAILURE);
    }
}
