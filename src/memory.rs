//! Memory access over a logical, byte-addressable address space.
//!
//! Parsers never touch a byte slice directly: every read goes through a
//! [`MemoryAccess`] implementation so the same code can walk an on-disk file,
//! a memory-mapped module or a debugger's view of a live process.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{ImageError, Result};

/// Byte order used for typed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Byte/string reads over an address space.
pub trait MemoryAccess {
    /// Fill `buf` with the bytes at `address`. Partial reads are failures.
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Read a NUL-terminated string of at most `max_len` characters.
    ///
    /// `wide` selects UTF-16LE. A string that runs into the end of the
    /// readable region is returned truncated; only an unreadable first
    /// character is an error.
    fn read_string(&self, address: u64, max_len: usize, wide: bool) -> Result<String> {
        let unit = if wide { 2 } else { 1 };
        let mut raw = Vec::new();
        let mut buf = [0u8; 2];
        for i in 0..max_len {
            let Some(at) = address.checked_add((i * unit) as u64) else {
                break;
            };
            if let Err(err) = self.read_into(at, &mut buf[..unit]) {
                if i == 0 {
                    return Err(err);
                }
                break;
            }
            if buf[..unit].iter().all(|&b| b == 0) {
                break;
            }
            raw.extend_from_slice(&buf[..unit]);
        }
        Ok(decode_string(&raw, wide))
    }

    fn read_uint(&self, address: u64, size: usize, endian: Endian) -> Result<u64> {
        let mut buf = [0u8; 8];
        if size == 0 || size > 8 {
            return Err(ImageError::unreadable(address, size as u64));
        }
        self.read_into(address, &mut buf[..size])?;
        Ok(decode_uint(&buf[..size], endian))
    }

    fn read_u8(&self, address: u64) -> Result<u8> {
        self.read_uint(address, 1, Endian::Little).map(|v| v as u8)
    }

    fn read_u16(&self, address: u64, endian: Endian) -> Result<u16> {
        self.read_uint(address, 2, endian).map(|v| v as u16)
    }

    fn read_u32(&self, address: u64, endian: Endian) -> Result<u32> {
        self.read_uint(address, 4, endian).map(|v| v as u32)
    }

    fn read_u64(&self, address: u64, endian: Endian) -> Result<u64> {
        self.read_uint(address, 8, endian)
    }
}

/// Decode up to eight bytes as an unsigned integer.
pub fn decode_uint(bytes: &[u8], endian: Endian) -> u64 {
    match endian {
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        Endian::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
    }
}

fn decode_string(raw: &[u8], wide: bool) -> String {
    if wide {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Scan a slice for a NUL-terminated string, bounded by `max_len` characters.
fn scan_string(slice: &[u8], max_len: usize, wide: bool) -> String {
    if wide {
        let limit = slice.len().min(max_len.saturating_mul(2)) & !1;
        let end = slice[..limit]
            .chunks_exact(2)
            .position(|c| c == [0, 0])
            .map(|p| p * 2)
            .unwrap_or(limit);
        decode_string(&slice[..end], true)
    } else {
        let limit = slice.len().min(max_len);
        let end = memchr::memchr(0, &slice[..limit]).unwrap_or(limit);
        decode_string(&slice[..end], false)
    }
}

fn slice_at(data: &[u8], base: u64, address: u64, len: usize) -> Result<&[u8]> {
    let start = address
        .checked_sub(base)
        .and_then(|off| usize::try_from(off).ok())
        .ok_or(ImageError::unreadable(address, len as u64))?;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(ImageError::unreadable(address, len as u64))?;
    Ok(&data[start..end])
}

fn tail_at(data: &[u8], base: u64, address: u64) -> Result<&[u8]> {
    let start = address
        .checked_sub(base)
        .and_then(|off| usize::try_from(off).ok())
        .filter(|&start| start < data.len())
        .ok_or(ImageError::unreadable(address, 1))?;
    Ok(&data[start..])
}

/// Bytes placed at a base address.
#[derive(Debug, Clone)]
pub struct SliceMemory<'a> {
    base: u64,
    data: Cow<'a, [u8]>,
}

impl<'a> SliceMemory<'a> {
    pub fn new(base: u64, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            base,
            data: data.into(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// An address-space context covering the whole slice.
    pub fn image(&self, layout: ImageLayout) -> Image<'_> {
        Image::new(self, self.base, self.len()).with_layout(layout)
    }
}

impl MemoryAccess for SliceMemory<'_> {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(slice_at(&self.data, self.base, address, buf.len())?);
        Ok(())
    }

    fn read_string(&self, address: u64, max_len: usize, wide: bool) -> Result<String> {
        Ok(scan_string(tail_at(&self.data, self.base, address)?, max_len, wide))
    }
}

/// A file mapped read-only and placed at a base address.
pub struct MappedFile {
    base: u64,
    // None when the file is empty; memmap cannot map empty files.
    mmap: Option<Mmap>,
}

impl MappedFile {
    pub fn open<P: AsRef<Path>>(path: P, base: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        debug!(path = %path.display(), size, base, "Mapping image file");

        let mmap = if size == 0 {
            None
        } else {
            // Safety: read-only map of a regular file; callers must not truncate
            // the file while the map is alive.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self { base, mmap })
    }

    fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> u64 {
        self.data().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn image(&self, layout: ImageLayout) -> Image<'_> {
        Image::new(self, self.base, self.len()).with_layout(layout)
    }
}

impl MemoryAccess for MappedFile {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(slice_at(self.data(), self.base, address, buf.len())?);
        Ok(())
    }

    fn read_string(&self, address: u64, max_len: usize, wide: bool) -> Result<String> {
        Ok(scan_string(tail_at(self.data(), self.base, address)?, max_len, wide))
    }
}

/// How relative addresses inside the image map onto the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageLayout {
    /// Loaded layout: RVAs and virtual addresses are applied to the base.
    #[default]
    Mapped,
    /// Raw on-disk layout: relative addresses go through the section or
    /// segment tables to find file offsets.
    File,
}

/// Address-space context for one image.
#[derive(Clone, Copy)]
pub struct Image<'m> {
    memory: &'m dyn MemoryAccess,
    base: u64,
    size: u64,
    layout: ImageLayout,
}

impl<'m> Image<'m> {
    pub fn new(memory: &'m dyn MemoryAccess, base: u64, size: u64) -> Self {
        Self {
            memory,
            base,
            size,
            layout: ImageLayout::Mapped,
        }
    }

    pub fn with_layout(mut self, layout: ImageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn memory(&self) -> &'m dyn MemoryAccess {
        self.memory
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    /// True when `address` lies inside `[base, base + size)`.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }
}

impl std::fmt::Debug for Image<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &format_args!("{:#x}", self.size))
            .field("layout", &self.layout)
            .finish()
    }
}
