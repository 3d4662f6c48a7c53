//! Command frames packed inside transport packet payloads.
//!
//! A payload carries zero or more frames back-to-back with no padding:
//!
//! ```text
//! length:u16be | reserved(2) | name: 4 ASCII bytes | data: length - 8 bytes
//! ```
//!
//! Parsing is best-effort: a frame whose declared length is undersized or
//! runs past the end of the buffer ends iteration silently. The switcher may
//! pad payloads, and bulk dumps can span datagrams that are not reassembled
//! here, so a truncated trailing frame is expected traffic, not an error.

/// Bytes occupied by a frame's length/reserved/name preamble.
pub const FRAME_HEADER_LEN: usize = 8;

/// Command names the session layer reacts to.
pub mod names {
    /// Program bus assignment for one mix-effect.
    pub const PROGRAM_INPUT: [u8; 4] = *b"PrgI";
    /// Preview bus assignment for one mix-effect.
    pub const PREVIEW_INPUT: [u8; 4] = *b"PrvI";
    /// Product identification string.
    pub const PRODUCT_ID: [u8; 4] = *b"_pin";
    /// Device topology dump. Announced by every unit; not consumed here.
    pub const TOPOLOGY: [u8; 4] = *b"_top";
}

/// One named command extracted from a payload.
///
/// Borrows its data from the payload buffer; copy out what needs to outlive
/// the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    /// Raw 4-byte command name.
    pub name: [u8; 4],
    /// Frame contents past the 8-byte frame header.
    pub data: &'a [u8],
}

impl CommandFrame<'_> {
    /// The command name as ASCII text, or `""` if the name bytes are not
    /// valid text.
    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.name).unwrap_or("")
    }
}

/// Iterator over the command frames of one payload.
///
/// Restartable and stateless across calls: construct a new one to walk the
/// same payload again.
#[derive(Debug, Clone)]
pub struct CommandFrames<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> CommandFrames<'a> {
    /// Walk the frames of `payload`.
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, offset: 0 }
    }
}

impl<'a> Iterator for CommandFrames<'a> {
    type Item = CommandFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + FRAME_HEADER_LEN > self.payload.len() {
            return None;
        }

        let length =
            u16::from_be_bytes([self.payload[self.offset], self.payload[self.offset + 1]]) as usize;

        // An undersized or overrunning declared length ends the walk; the
        // remainder of the payload is unusable without the declared bounds.
        if length < FRAME_HEADER_LEN || self.offset + length > self.payload.len() {
            self.offset = self.payload.len();
            return None;
        }

        let name_start = self.offset + 4;
        let mut name = [0u8; 4];
        name.copy_from_slice(&self.payload[name_start..name_start + 4]);

        let data = &self.payload[self.offset + FRAME_HEADER_LEN..self.offset + length];
        self.offset += length;

        Some(CommandFrame { name, data })
    }
}
