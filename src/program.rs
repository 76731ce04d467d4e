//! ELF program header parsing.

use alloc::vec::Vec;

use bitflags::bitflags;
use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::file::ElfFile;
use crate::source::{read_at, table_offset, Decoder};

/// Program header types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramType {
    /// Unused entry
    Null,
    /// Loadable program segment
    Load,
    /// Dynamic linking information
    Dynamic,
    /// Program interpreter
    Interp,
    /// Auxiliary information
    Note,
    /// Reserved
    Shlib,
    /// Entry for header table itself
    Phdr,
    /// Thread-local storage template
    Tls,
    /// GCC .eh_frame_hdr segment
    GnuEhFrame,
    /// Indicates stack executability
    GnuStack,
    /// Read-only after relocation
    GnuRelRo,
    /// OS- or processor-specific type
    Other(u32),
}

impl ProgramType {
    /// Decode `p_type`.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ProgramType::Null,
            1 => ProgramType::Load,
            2 => ProgramType::Dynamic,
            3 => ProgramType::Interp,
            4 => ProgramType::Note,
            5 => ProgramType::Shlib,
            6 => ProgramType::Phdr,
            7 => ProgramType::Tls,
            0x6474e550 => ProgramType::GnuEhFrame,
            0x6474e551 => ProgramType::GnuStack,
            0x6474e552 => ProgramType::GnuRelRo,
            other => ProgramType::Other(other),
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            ProgramType::Null => "NULL",
            ProgramType::Load => "LOAD",
            ProgramType::Dynamic => "DYNAMIC",
            ProgramType::Interp => "INTERP",
            ProgramType::Note => "NOTE",
            ProgramType::Shlib => "SHLIB",
            ProgramType::Phdr => "PHDR",
            ProgramType::Tls => "TLS",
            ProgramType::GnuEhFrame => "EH_FRAME",
            ProgramType::GnuStack => "STACK",
            ProgramType::GnuRelRo => "RELRO",
            ProgramType::Other(_) => "OTHER",
        }
    }
}

bitflags! {
    /// Segment permission flags (`p_flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Segment is executable
        const EXECUTE = 1 << 0;
        /// Segment is writable
        const WRITE = 1 << 1;
        /// Segment is readable
        const READ = 1 << 2;
    }
}

impl SegmentFlags {
    /// `rwx`-style rendering of the permission bits.
    pub const fn permissions(self) -> &'static str {
        const TABLE: [&str; 8] = ["---", "--x", "-w-", "-wx", "r--", "r-x", "rw-", "rwx"];
        let r = (self.bits() >> 2) & 1;
        let w = (self.bits() >> 1) & 1;
        let x = self.bits() & 1;
        TABLE[((r << 2) | (w << 1) | x) as usize]
    }
}

/// ELF program header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEntry {
    /// Segment type
    pub segment_type: ProgramType,
    /// Segment flags
    pub flags: SegmentFlags,
    /// Segment file offset
    pub offset: u64,
    /// Segment virtual address
    pub vaddr: u64,
    /// Segment physical address
    pub paddr: u64,
    /// Segment size in file
    pub filesz: u64,
    /// Segment size in memory
    pub memsz: u64,
    /// Segment alignment
    pub align: u64,
}

impl ProgramEntry {
    /// On-disk size of one entry.
    pub(crate) const fn raw_size(is_64bit: bool) -> usize {
        if is_64bit {
            56
        } else {
            32
        }
    }

    /// Decode one entry; `data` holds exactly one raw entry.
    pub(crate) fn parse(data: &[u8], decoder: Decoder) -> Self {
        let segment_type = ProgramType::from_raw(decoder.u32(data, 0));

        if decoder.is_64bit() {
            ProgramEntry {
                segment_type,
                flags: SegmentFlags::from_bits_retain(decoder.u32(data, 4)),
                offset: decoder.u64(data, 8),
                vaddr: decoder.u64(data, 16),
                paddr: decoder.u64(data, 24),
                filesz: decoder.u64(data, 32),
                memsz: decoder.u64(data, 40),
                align: decoder.u64(data, 48),
            }
        } else {
            ProgramEntry {
                segment_type,
                offset: decoder.word(data, 4),
                vaddr: decoder.word(data, 8),
                paddr: decoder.word(data, 12),
                filesz: decoder.word(data, 16),
                memsz: decoder.word(data, 20),
                flags: SegmentFlags::from_bits_retain(decoder.u32(data, 24)),
                align: decoder.word(data, 28),
            }
        }
    }

    /// Check if this is a loadable segment
    pub fn is_loadable(&self) -> bool {
        self.segment_type == ProgramType::Load
    }

    /// Get the virtual address range for this segment
    pub fn virtual_range(&self) -> Option<(u64, u64)> {
        Some((self.vaddr, self.vaddr.checked_add(self.memsz)?))
    }
}

impl<S: Read + Seek> ElfFile<S> {
    /// Read the program header table.
    ///
    /// Entries are read one at a time at `e_phoff + i * e_phentsize`.
    pub fn read_programs(&mut self) -> Result<&[ProgramEntry]> {
        self.programs.clear();

        let decoder = self.header.decoder();
        let raw_size = ProgramEntry::raw_size(decoder.is_64bit());
        let count = usize::from(self.header.phnum);
        let stride = u64::from(self.header.phentsize);

        if count > 0 && (stride as usize) < raw_size {
            log::error!("ELF file invalid (e_phentsize = {})", stride);
            return Err(ElfError::InvalidEntrySize {
                table: "e_phentsize",
                size: stride,
            });
        }

        let mut table = Vec::with_capacity(count);
        let mut raw = [0u8; 56];
        for index in 0..count {
            let offset = table_offset(self.header.phoff, index, stride)?;
            read_at(&mut self.source, offset, &mut raw[..raw_size])?;
            table.push(ProgramEntry::parse(&raw[..raw_size], decoder));
        }

        self.programs = table;
        Ok(&self.programs)
    }
}

/// Last `PT_DYNAMIC` entry in `programs`, if any.
pub(crate) fn find_dynamic(programs: &[ProgramEntry]) -> Option<&ProgramEntry> {
    let mut found = programs
        .iter()
        .filter(|program| program.segment_type == ProgramType::Dynamic);
    let last = found.next_back();
    if found.next_back().is_some() {
        log::debug!("multiple PT_DYNAMIC entries, using the last one");
    }
    last
}
