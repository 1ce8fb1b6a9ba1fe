use thiserror::Error;

use crate::frame_control::FrameType;

/// Everything that can go wrong while decoding a captured buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{what} too short: needed {needed} bytes, got {got}")]
    TooShort {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("wrong frame type: expected {expected}, got {actual}")]
    WrongFrameType {
        expected: FrameType,
        actual: FrameType,
    },

    #[error("wrong frame subtype: expected {expected}, got {actual}")]
    WrongSubtype { expected: u8, actual: u8 },

    #[error("invalid information element: {0}")]
    InvalidInformationElement(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn ensure_len(what: &'static str, data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(Error::TooShort {
            what,
            needed,
            got: data.len(),
        });
    }
    Ok(())
}
