//! XBee API frame layer.
//!
//! Every API frame on the wire is:
//! - A start delimiter (`0x7E`) for stream synchronization
//! - A 2-byte big-endian payload length
//! - The payload, whose first byte is the API type tag
//! - A 1-byte checksum: `0xFF - (sum(payload) & 0xFF)`
//!
//! In escaped API mode the reserved bytes `0x7E 0x7D 0x11 0x13` are stuffed
//! everywhere after the start delimiter. The [`StreamReassembler`] turns an
//! unbounded, possibly noisy byte stream back into checksummed frames and
//! resynchronizes on its own after corruption.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod escape;
pub mod reader;
pub mod reassembler;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_frame, encode, encode_frame, try_extract, Frame, FrameConfig, FrameExtraction,
    FRAME_OVERHEAD, HEADER_SIZE, MAX_PAYLOAD, START_DELIMITER,
};
pub use error::{FrameError, Result};
pub use escape::EscapeMode;
pub use reader::FrameReader;
pub use reassembler::{ReassemblerStats, StreamReassembler};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::XBeeCodec;
