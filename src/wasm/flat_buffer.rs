//! Flat buffer protocol for zero-copy decoration reads
//!
//! Binary format for a decoration set:
//!
//! ## u32 Buffer Layout:
//! ```text
//! Header:
//! [0]     MAGIC (0x5352464C = "SRFL" for validation)
//! [1]     SCHEMA_VERSION (protocol version, currently 1)
//! [2]     generation_lo
//! [3]     generation_hi
//! [4]     doc_version_lo
//! [5]     doc_version_hi
//! [6]     decoration_count
//! [7]     text_buffer_len
//! [8..]   decorations...
//!
//! Per-decoration:
//!   [kind, side, position, text_offset, text_len, text_utf16_offset, text_utf16_len]
//!     kind: KIND_* opcode
//!     side: SIDE_BEFORE or SIDE_AFTER
//!     text: only read if text_len > 0 (spacers carry no text)
//! ```
//!
//! ## f32 Buffer Layout:
//! ```text
//! Per-decoration: [height] (spacer height, 0 for markers)
//! ```

use crate::render::{Decoration, DecorationKind, DecorationSet, Side};

/// Magic number for format validation: "SRFL" (Screenplay ReFLow)
pub const MAGIC: u32 = 0x5352464C;

/// Schema version for protocol compatibility checking
pub const SCHEMA_VERSION: u32 = 1;

/// Header size in u32 elements
pub const HEADER_SIZE: usize = 8;

/// Opcodes for decoration kinds
pub const KIND_SPACER: u32 = 0;
pub const KIND_MORE: u32 = 1;
pub const KIND_CONTD: u32 = 2;

pub const SIDE_BEFORE: u32 = 0;
pub const SIDE_AFTER: u32 = 1;

/// Number of u32 values per decoration
pub const U32_PER_DECORATION: usize = 7;

/// Number of f32 values per decoration
pub const F32_PER_DECORATION: usize = 1;

/// Decoration buffer for zero-copy WASM transfer
pub struct DecorationBuffer {
    /// Integer data (header, opcodes, positions, text offsets)
    pub u32_data: Vec<u32>,
    /// Float data (spacer heights)
    pub f32_data: Vec<f32>,
    /// UTF-8 marker text
    pub text_data: Vec<u8>,

    // Cumulative UTF-16 offset so JS can slice after a single decode
    utf16_text_offset: usize,
}

impl Default for DecorationBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DecorationBuffer {
    pub fn new() -> Self {
        Self {
            u32_data: Vec::with_capacity(256),
            f32_data: Vec::with_capacity(32),
            text_data: Vec::with_capacity(512),
            utf16_text_offset: 0,
        }
    }

    pub fn clear(&mut self) {
        self.u32_data.clear();
        self.f32_data.clear();
        self.text_data.clear();
        self.utf16_text_offset = 0;
    }

    /// Pre-allocate so JS-held pointers stay valid while the buffer is written.
    /// Existing capacity is reused when large enough.
    pub fn prepare(&mut self, decoration_count: usize, text_needed: usize) {
        let u32_target = HEADER_SIZE + decoration_count * U32_PER_DECORATION + 32;
        let f32_target = decoration_count * F32_PER_DECORATION + 32;
        let text_target = text_needed + 256;

        if self.u32_data.capacity() < u32_target {
            self.u32_data = Vec::with_capacity(u32_target);
        } else {
            self.u32_data.clear();
        }

        if self.f32_data.capacity() < f32_target {
            self.f32_data = Vec::with_capacity(f32_target);
        } else {
            self.f32_data.clear();
        }

        if self.text_data.capacity() < text_target {
            self.text_data = Vec::with_capacity(text_target);
        } else {
            self.text_data.clear();
        }

        self.utf16_text_offset = 0;
    }

    pub fn write_header(&mut self, generation: u64, doc_version: u64) {
        self.u32_data.push(MAGIC); //                               [0]
        self.u32_data.push(SCHEMA_VERSION); //                      [1]
        self.u32_data.push((generation & 0xFFFFFFFF) as u32); //    [2]
        self.u32_data.push((generation >> 32) as u32); //           [3]
        self.u32_data.push((doc_version & 0xFFFFFFFF) as u32); //   [4]
        self.u32_data.push((doc_version >> 32) as u32); //          [5]
        self.u32_data.push(0); // [6] decoration_count (placeholder)
        self.u32_data.push(0); // [7] text_buffer_len (placeholder)
    }

    pub fn write_decoration(&mut self, decoration: &Decoration) {
        let (kind, height) = match decoration.kind {
            DecorationKind::Spacer { height } => (KIND_SPACER, height),
            DecorationKind::MoreMarker { .. } => (KIND_MORE, 0.0),
            DecorationKind::ContdMarker { .. } => (KIND_CONTD, 0.0),
        };
        let side = match decoration.side {
            Side::Before => SIDE_BEFORE,
            Side::After => SIDE_AFTER,
        };

        let text = decoration.text().unwrap_or_default();
        let text_offset = self.text_data.len();
        let utf16_offset = self.utf16_text_offset;
        let utf16_len = text.encode_utf16().count();
        self.text_data.extend_from_slice(text.as_bytes());
        self.utf16_text_offset += utf16_len;

        self.u32_data.push(kind);
        self.u32_data.push(side);
        self.u32_data.push(decoration.position as u32);
        self.u32_data.push(text_offset as u32);
        self.u32_data.push(text.len() as u32);
        self.u32_data.push(utf16_offset as u32);
        self.u32_data.push(utf16_len as u32);

        self.f32_data.push(height);
    }

    /// Synchronize header counts. Must run after the last decoration.
    pub fn finalize(&mut self) {
        if self.u32_data.len() < HEADER_SIZE {
            return;
        }
        self.u32_data[6] = ((self.u32_data.len() - HEADER_SIZE) / U32_PER_DECORATION) as u32;
        self.u32_data[7] = self.text_data.len() as u32;

        debug_assert_eq!(
            (self.u32_data.len() - HEADER_SIZE) % U32_PER_DECORATION,
            0,
            "partial decoration record"
        );
    }

    /// Write a whole set: prepare, header, records, finalize
    pub fn write_set(&mut self, set: &DecorationSet) {
        let text_needed = set
            .iter()
            .filter_map(Decoration::text)
            .map(|t| t.len())
            .sum();
        self.prepare(set.len(), text_needed);
        self.write_header(set.generation(), set.doc_version());
        for decoration in set.iter() {
            self.write_decoration(decoration);
        }
        self.finalize();
    }

    // Accessors for WASM
    // Return u32 instead of usize for explicit WASM contract (wasm32 linear memory uses u32 offsets)

    pub fn u32_ptr(&self) -> u32 {
        self.u32_data.as_ptr() as u32
    }

    pub fn u32_len(&self) -> u32 {
        self.u32_data.len() as u32
    }

    pub fn f32_ptr(&self) -> u32 {
        self.f32_data.as_ptr() as u32
    }

    pub fn f32_len(&self) -> u32 {
        self.f32_data.len() as u32
    }

    pub fn text_ptr(&self) -> u32 {
        self.text_data.as_ptr() as u32
    }

    pub fn text_len(&self) -> u32 {
        self.text_data.len() as u32
    }
}
