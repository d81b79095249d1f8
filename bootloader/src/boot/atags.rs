//! Linux/ARM boot tags (ATAGs)
//!
//! The kernel finds its memory size, command line and initrd through a list
//! of tags placed at RAM start + 256:
//!
//! ```text
//! ┌──────────┬──────────┬───────────────────────────────┐
//! │ size (w) │ tag id   │ payload (size - 2 words)      │
//! └──────────┴──────────┴───────────────────────────────┘
//!   CORE     5 words   flags, pagesize, rootdev
//!   CMDLINE  n words   NUL terminated string, word padded
//!   MEM      4 words   size, start
//!   INITRD2  4 words   start, size            (only with an initrd)
//!   NONE     0         terminator (header only)
//! ```
//!
//! All words are little-endian.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use linboot_core::PhysAddr;

use super::error::{BootError, BootResult};

pub const ATAG_NONE: u32 = 0x0000_0000;
pub const ATAG_CORE: u32 = 0x5441_0001;
pub const ATAG_MEM: u32 = 0x5441_0002;
pub const ATAG_CMDLINE: u32 = 0x5441_0009;
pub const ATAG_INITRD2: u32 = 0x5442_0005;

const HEADER_WORDS: usize = 2;
const CORE_WORDS: usize = 5;
const MEM_WORDS: usize = 4;
const INITRD_WORDS: usize = 4;

const CORE_PAGE_SIZE: u32 = 0x1000;

/// Size in words of a CMDLINE tag carrying `len` bytes of text.
#[inline]
pub const fn cmdline_words(len: usize) -> usize {
    (HEADER_WORDS * 4 + len + 1 + 3) >> 2
}

/// Encoded size in bytes of a tag list.
pub const fn encoded_len(cmdline_len: usize, with_initrd: bool) -> usize {
    let initrd = if with_initrd { INITRD_WORDS } else { 0 };
    (CORE_WORDS + cmdline_words(cmdline_len) + MEM_WORDS + initrd + HEADER_WORDS) * 4
}

struct TagWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl TagWriter<'_> {
    fn word(&mut self, value: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    fn header(&mut self, words: usize, tag: u32) {
        self.word(words as u32);
        self.word(tag);
    }

    fn string(&mut self, text: &str, words: usize) {
        let payload = (words - HEADER_WORDS) * 4;
        let dst = &mut self.buf[self.pos..self.pos + payload];
        dst.fill(0);
        dst[..text.len()].copy_from_slice(text.as_bytes());
        self.pos += payload;
    }
}

/// Encode a tag list into `buf`, returning the number of bytes written.
pub fn encode_into(
    buf: &mut [u8],
    ram_start: PhysAddr,
    ram_size: u32,
    cmdline: &str,
    initrd_start: PhysAddr,
    initrd_size: u32,
) -> BootResult<usize> {
    // The kernel reads the command line up to its first NUL
    if let Some(nul_at) = cmdline.bytes().position(|b| b == 0) {
        log::error!("CMDLINE has a NUL byte at offset {}", nul_at);
        return Err(BootError::InvalidCmdline { nul_at });
    }

    let needed = encoded_len(cmdline.len(), initrd_size > 0);
    if needed > buf.len() {
        return Err(BootError::TagEncodingTooLarge {
            needed,
            available: buf.len(),
        });
    }

    let mut w = TagWriter { buf, pos: 0 };

    w.header(CORE_WORDS, ATAG_CORE);
    w.word(0);
    w.word(CORE_PAGE_SIZE);
    // rootdev unused, the command line names the root device
    w.word(0);

    let words = cmdline_words(cmdline.len());
    w.header(words, ATAG_CMDLINE);
    w.string(cmdline, words);

    w.header(MEM_WORDS, ATAG_MEM);
    w.word(ram_size);
    w.word(ram_start.as_u32());

    if initrd_size > 0 {
        w.header(INITRD_WORDS, ATAG_INITRD2);
        w.word(initrd_start.as_u32());
        w.word(initrd_size);
    }

    w.header(0, ATAG_NONE);

    Ok(w.pos)
}

/// Encode a tag list into a fresh buffer.
pub fn encode(
    ram_start: PhysAddr,
    ram_size: u32,
    cmdline: &str,
    initrd_start: PhysAddr,
    initrd_size: u32,
) -> BootResult<Vec<u8>> {
    let mut buf = vec![0u8; encoded_len(cmdline.len(), initrd_size > 0)];
    let len = encode_into(&mut buf, ram_start, ram_size, cmdline, initrd_start, initrd_size)?;
    buf.truncate(len);
    Ok(buf)
}

// ═══════════════════════════════════════════════════════════════════════════
// DECODING
// ═══════════════════════════════════════════════════════════════════════════

/// A decoded tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    Core {
        flags: u32,
        page_size: u32,
        root_dev: u32,
    },
    Mem {
        size: u32,
        start: PhysAddr,
    },
    Cmdline(&'a str),
    Initrd2 {
        start: PhysAddr,
        size: u32,
    },
    Unknown {
        tag: u32,
        words: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDecodeError {
    /// Tag header or payload runs past the buffer
    Truncated { offset: usize },
    /// Non-terminal tag declares fewer words than its header
    BadSize { offset: usize, words: usize },
    /// Command line is not UTF-8
    InvalidCmdline { offset: usize },
}

impl fmt::Display for TagDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagDecodeError::Truncated { offset } => write!(f, "truncated tag at {:#x}", offset),
            TagDecodeError::BadSize { offset, words } => {
                write!(f, "bad tag size {} at {:#x}", words, offset)
            }
            TagDecodeError::InvalidCmdline { offset } => {
                write!(f, "invalid command line at {:#x}", offset)
            }
        }
    }
}

/// Iterator over an encoded tag list. Stops after `ATAG_NONE`.
pub struct TagIter<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

pub fn decode(data: &[u8]) -> TagIter<'_> {
    TagIter {
        data,
        offset: 0,
        done: false,
    }
}

impl<'a> TagIter<'a> {
    fn word_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.data.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn next_tag(&mut self) -> Result<Option<Tag<'a>>, TagDecodeError> {
        let at = self.offset;
        let truncated = TagDecodeError::Truncated { offset: at };

        let words = self.word_at(at).ok_or(truncated)? as usize;
        let tag = self.word_at(at + 4).ok_or(truncated)?;

        if tag == ATAG_NONE {
            return Ok(None);
        }
        if words < HEADER_WORDS {
            return Err(TagDecodeError::BadSize { offset: at, words });
        }

        let end = words
            .checked_mul(4)
            .and_then(|n| at.checked_add(n))
            .ok_or(truncated)?;
        if end > self.data.len() {
            return Err(truncated);
        }
        let payload = &self.data[at + HEADER_WORDS * 4..end];
        let word = |i: usize| {
            let b = payload.get(i * 4..i * 4 + 4).ok_or(truncated)?;
            Ok::<u32, TagDecodeError>(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        };

        let decoded = match tag {
            ATAG_CORE => Tag::Core {
                flags: word(0)?,
                page_size: word(1)?,
                root_dev: word(2)?,
            },
            ATAG_MEM => Tag::Mem {
                size: word(0)?,
                start: PhysAddr::new(word(1)?),
            },
            ATAG_INITRD2 => Tag::Initrd2 {
                start: PhysAddr::new(word(0)?),
                size: word(1)?,
            },
            ATAG_CMDLINE => {
                let len = payload.iter().position(|&b| b == 0).ok_or(truncated)?;
                let text = core::str::from_utf8(&payload[..len])
                    .map_err(|_| TagDecodeError::InvalidCmdline { offset: at })?;
                Tag::Cmdline(text)
            }
            _ => Tag::Unknown { tag, words },
        };

        self.offset = end;
        Ok(Some(decoded))
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = Result<Tag<'a>, TagDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_tag() {
            Ok(Some(tag)) => Some(Ok(tag)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
