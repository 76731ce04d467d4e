//! Byte sources and field decoding.
//!
//! The parser reads every structure with a seek followed by an exact read, so any
//! [`embedded_io::Read`] + [`embedded_io::Seek`] implementor can back an
//! [`ElfFile`](crate::ElfFile). [`SliceSource`] covers the common bootloader case
//! where the whole image is already in memory.

use alloc::vec::Vec;

use embedded_io::{ErrorType, Read, ReadExactError, Seek, SeekFrom};

use crate::error::{io_error, ElfError, Result};
use crate::header::{ElfClass, ElfData};

/// Seek to `offset` and fill `buf` completely.
pub(crate) fn read_at<S: Read + Seek>(source: &mut S, offset: u64, buf: &mut [u8]) -> Result<()> {
    log::trace!("read {:#x} bytes at {:#x}", buf.len(), offset);
    source.seek(SeekFrom::Start(offset)).map_err(io_error)?;
    source.read_exact(buf).map_err(|error| match error {
        ReadExactError::UnexpectedEof => ElfError::UnexpectedEof,
        ReadExactError::Other(error) => io_error(error),
    })
}

/// Total length of `source` in bytes.
pub(crate) fn source_len<S: Seek>(source: &mut S) -> Result<u64> {
    source.seek(SeekFrom::End(0)).map_err(io_error)
}

/// Fail with `UnexpectedEof` unless `size` bytes at `offset` lie inside `source`.
pub(crate) fn check_extent<S: Seek>(source: &mut S, offset: u64, size: u64) -> Result<()> {
    let end = offset.checked_add(size).ok_or(ElfError::ArithmeticOverflow)?;
    let len = source_len(source)?;
    if end > len {
        log::error!("{:#x} bytes at {:#x} run past end of file ({:#x} bytes)", size, offset, len);
        return Err(ElfError::UnexpectedEof);
    }
    Ok(())
}

/// Read `size` bytes at `offset` into a freshly allocated buffer.
///
/// The extent is checked against the source before anything is allocated.
pub(crate) fn read_vec<S: Read + Seek>(source: &mut S, offset: u64, size: u64) -> Result<Vec<u8>> {
    check_extent(source, offset, size)?;
    let len = usize::try_from(size).map_err(|_| ElfError::ArithmeticOverflow)?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ElfError::AllocationFailed { size })?;
    buf.resize(len, 0);
    read_at(source, offset, &mut buf)?;
    Ok(buf)
}

/// File offset of entry `index` in a table at `base` with stride `stride`.
pub(crate) fn table_offset(base: u64, index: usize, stride: u64) -> Result<u64> {
    (index as u64)
        .checked_mul(stride)
        .and_then(|relative| base.checked_add(relative))
        .ok_or(ElfError::ArithmeticOverflow)
}

/// Decodes fixed-layout fields according to the file's class and byte order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoder {
    class: ElfClass,
    little_endian: bool,
}

impl Decoder {
    pub(crate) fn new(class: ElfClass, data: ElfData) -> Self {
        Self {
            class,
            little_endian: data == ElfData::LittleEndian,
        }
    }

    pub(crate) fn is_64bit(&self) -> bool {
        self.class == ElfClass::Elf64
    }

    pub(crate) fn u16(&self, data: &[u8], offset: usize) -> u16 {
        let bytes = [data[offset], data[offset + 1]];
        if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        }
    }

    pub(crate) fn u32(&self, data: &[u8], offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&data[offset..offset + 4]);
        if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        }
    }

    pub(crate) fn u64(&self, data: &[u8], offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[offset..offset + 8]);
        if self.little_endian {
            u64::from_le_bytes(bytes)
        } else {
            u64::from_be_bytes(bytes)
        }
    }

    /// Address-sized unsigned field (`Elf32_Addr`/`Elf64_Addr`, `Off`, `Xword`).
    pub(crate) fn word(&self, data: &[u8], offset: usize) -> u64 {
        match self.class {
            ElfClass::Elf32 => self.u32(data, offset) as u64,
            ElfClass::Elf64 => self.u64(data, offset),
        }
    }

    /// Address-sized signed field (`Elf32_Sword`/`Elf64_Sxword`).
    pub(crate) fn sword(&self, data: &[u8], offset: usize) -> i64 {
        match self.class {
            ElfClass::Elf32 => self.u32(data, offset) as i32 as i64,
            ElfClass::Elf64 => self.u64(data, offset) as i64,
        }
    }
}

/// Seekable reader over an in-memory ELF image.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: u64,
}

impl<'a> SliceSource<'a> {
    /// Create a source positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// The underlying bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl ErrorType for SliceSource<'_> {
    type Error = embedded_io::ErrorKind;
}

impl Read for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        let start = usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let remaining = &self.data[start..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for SliceSource<'_> {
    fn seek(&mut self, pos: SeekFrom) -> core::result::Result<u64, Self::Error> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::End(delta) => (self.data.len() as u64, delta),
            SeekFrom::Current(delta) => (self.position, delta),
        };

        // Seeking past the end is allowed, seeking before the start is not.
        let target = base
            .checked_add_signed(delta)
            .ok_or(embedded_io::ErrorKind::InvalidInput)?;
        self.position = target;
        Ok(target)
    }
}
