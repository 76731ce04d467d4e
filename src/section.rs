//! ELF section header parsing and name resolution.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bitflags::bitflags;
use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::file::ElfFile;
use crate::source::{read_at, read_vec, table_offset, Decoder};

/// Section types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    /// Inactive section
    Null,
    /// Program data
    ProgBits,
    /// Symbol table
    SymTab,
    /// String table
    StrTab,
    /// Relocation entries with addends
    Rela,
    /// Symbol hash table
    Hash,
    /// Dynamic linking information
    Dynamic,
    /// Notes
    Note,
    /// Program space with no data (bss)
    NoBits,
    /// Relocation entries, no addends
    Rel,
    /// Reserved
    ShLib,
    /// Dynamic linker symbol table
    DynSym,
    /// Array of constructors
    InitArray,
    /// Array of destructors
    FiniArray,
    /// Array of pre-constructors
    PreInitArray,
    /// Section group
    Group,
    /// Extended section indices
    SymTabShndx,
    /// GNU-style hash table
    GnuHash,
    /// GNU version definitions
    GnuVerDef,
    /// GNU version needs
    GnuVerNeed,
    /// GNU version symbol table
    GnuVerSym,
    /// OS- or processor-specific type
    Other(u32),
}

impl SectionType {
    /// Decode `sh_type`.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SectionType::Null,
            1 => SectionType::ProgBits,
            2 => SectionType::SymTab,
            3 => SectionType::StrTab,
            4 => SectionType::Rela,
            5 => SectionType::Hash,
            6 => SectionType::Dynamic,
            7 => SectionType::Note,
            8 => SectionType::NoBits,
            9 => SectionType::Rel,
            10 => SectionType::ShLib,
            11 => SectionType::DynSym,
            14 => SectionType::InitArray,
            15 => SectionType::FiniArray,
            16 => SectionType::PreInitArray,
            17 => SectionType::Group,
            18 => SectionType::SymTabShndx,
            0x6ffffff6 => SectionType::GnuHash,
            0x6ffffffd => SectionType::GnuVerDef,
            0x6ffffffe => SectionType::GnuVerNeed,
            0x6fffffff => SectionType::GnuVerSym,
            other => SectionType::Other(other),
        }
    }

    /// Raw `sh_type` value.
    pub const fn raw(self) -> u32 {
        match self {
            SectionType::Null => 0,
            SectionType::ProgBits => 1,
            SectionType::SymTab => 2,
            SectionType::StrTab => 3,
            SectionType::Rela => 4,
            SectionType::Hash => 5,
            SectionType::Dynamic => 6,
            SectionType::Note => 7,
            SectionType::NoBits => 8,
            SectionType::Rel => 9,
            SectionType::ShLib => 10,
            SectionType::DynSym => 11,
            SectionType::InitArray => 14,
            SectionType::FiniArray => 15,
            SectionType::PreInitArray => 16,
            SectionType::Group => 17,
            SectionType::SymTabShndx => 18,
            SectionType::GnuHash => 0x6ffffff6,
            SectionType::GnuVerDef => 0x6ffffffd,
            SectionType::GnuVerNeed => 0x6ffffffe,
            SectionType::GnuVerSym => 0x6fffffff,
            SectionType::Other(other) => other,
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            SectionType::Null => "NULL",
            SectionType::ProgBits => "PROGBITS",
            SectionType::SymTab => "SYMTAB",
            SectionType::StrTab => "STRTAB",
            SectionType::Rela => "RELA",
            SectionType::Hash => "HASH",
            SectionType::Dynamic => "DYNAMIC",
            SectionType::Note => "NOTE",
            SectionType::NoBits => "NOBITS",
            SectionType::Rel => "REL",
            SectionType::ShLib => "SHLIB",
            SectionType::DynSym => "DYNSYM",
            SectionType::InitArray => "INIT_ARRAY",
            SectionType::FiniArray => "FINI_ARRAY",
            SectionType::PreInitArray => "PREINIT",
            SectionType::Group => "GROUP",
            SectionType::SymTabShndx => "SHNDX",
            SectionType::GnuHash => "GNU_HASH",
            SectionType::GnuVerDef => "VERDEF",
            SectionType::GnuVerNeed => "VERNEED",
            SectionType::GnuVerSym => "VERSYM",
            SectionType::Other(_) => "OTHER",
        }
    }
}

bitflags! {
    /// Section header flags (`sh_flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u64 {
        /// Section contains writable data
        const WRITE = 0x1;
        /// Section occupies memory during execution
        const ALLOC = 0x2;
        /// Section contains executable machine instructions
        const EXECINSTR = 0x4;
        /// Section may be merged
        const MERGE = 0x10;
        /// Section contains null-terminated strings
        const STRINGS = 0x20;
        /// `sh_info` holds a section header table index
        const INFO_LINK = 0x40;
        /// Special ordering requirement
        const LINK_ORDER = 0x80;
        /// Section requires special OS handling
        const OS_NONCONFORMING = 0x100;
        /// Section is a member of a group
        const GROUP = 0x200;
        /// Section holds thread-local storage
        const TLS = 0x400;
        /// Section is compressed
        const COMPRESSED = 0x800;
    }
}

/// ELF section header with its resolved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry {
    /// Section name, resolved through `.shstrtab`
    pub name: String,
    /// Offset of the name in `.shstrtab`
    pub name_offset: u32,
    /// Section type
    pub section_type: SectionType,
    /// Section flags
    pub flags: SectionFlags,
    /// Section virtual address at execution
    pub addr: u64,
    /// Section file offset
    pub offset: u64,
    /// Section size in bytes
    pub size: u64,
    /// Section header table index link
    pub link: u32,
    /// Extra information
    pub info: u32,
    /// Section alignment
    pub addralign: u64,
    /// Entry size if section holds table
    pub entsize: u64,
}

impl SectionEntry {
    /// On-disk size of one entry.
    pub(crate) const fn raw_size(is_64bit: bool) -> usize {
        if is_64bit {
            64
        } else {
            40
        }
    }

    /// Decode one entry; `data` holds exactly one raw entry. The name is left
    /// empty until the string table pass.
    pub(crate) fn parse(data: &[u8], decoder: Decoder) -> Self {
        let name_offset = decoder.u32(data, 0);
        let section_type = SectionType::from_raw(decoder.u32(data, 4));

        if decoder.is_64bit() {
            SectionEntry {
                name: String::new(),
                name_offset,
                section_type,
                flags: SectionFlags::from_bits_retain(decoder.u64(data, 8)),
                addr: decoder.u64(data, 16),
                offset: decoder.u64(data, 24),
                size: decoder.u64(data, 32),
                link: decoder.u32(data, 40),
                info: decoder.u32(data, 44),
                addralign: decoder.u64(data, 48),
                entsize: decoder.u64(data, 56),
            }
        } else {
            SectionEntry {
                name: String::new(),
                name_offset,
                section_type,
                flags: SectionFlags::from_bits_retain(decoder.word(data, 8)),
                addr: decoder.word(data, 12),
                offset: decoder.word(data, 16),
                size: decoder.word(data, 20),
                link: decoder.u32(data, 24),
                info: decoder.u32(data, 28),
                addralign: decoder.word(data, 32),
                entsize: decoder.word(data, 36),
            }
        }
    }

    /// Check if section is allocatable
    pub fn is_alloc(&self) -> bool {
        self.flags.contains(SectionFlags::ALLOC)
    }

    /// Check if section contains strings
    pub fn is_string_table(&self) -> bool {
        self.section_type == SectionType::StrTab
    }

    /// Check if section contains symbols
    pub fn is_symbol_table(&self) -> bool {
        matches!(self.section_type, SectionType::SymTab | SectionType::DynSym)
    }
}

/// Cached copy of a string table's bytes
#[derive(Debug)]
pub struct StringTable {
    data: Vec<u8>,
}

impl StringTable {
    /// Create a new string table from section data
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Read the contents of `section` from `source`.
    pub(crate) fn read<S: Read + Seek>(source: &mut S, section: &SectionEntry) -> Result<Self> {
        Ok(Self::new(read_vec(source, section.offset, section.size)?))
    }

    /// Size of the table in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the table holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the NUL-terminated string starting at `offset`.
    ///
    /// An offset at or past the end of the table is an error. A string with no
    /// terminator runs to the end of the table.
    pub fn get_string(&self, offset: u64) -> Result<&str> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start < self.data.len())
            .ok_or(ElfError::StringOutOfBounds {
                offset,
                size: self.data.len() as u64,
            })?;

        let end = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(self.data.len(), |pos| start + pos);

        core::str::from_utf8(&self.data[start..end]).map_err(|_| ElfError::InvalidStringTable)
    }

    /// Like [`get_string`](Self::get_string), but logs a failure against `field`.
    pub(crate) fn resolve(&self, offset: u64, field: &str) -> Result<String> {
        self.get_string(offset).map(ToString::to_string).map_err(|error| {
            log::error!("ELF file invalid ({} = {:#x}): {}", field, offset, error);
            error
        })
    }
}

impl<S: Read + Seek> ElfFile<S> {
    /// Read the section header table and resolve section names.
    ///
    /// `e_shstrndx` must name a section other than the null section.
    pub fn read_sections(&mut self) -> Result<&[SectionEntry]> {
        self.sections.clear();

        let decoder = self.header.decoder();
        let raw_size = SectionEntry::raw_size(decoder.is_64bit());
        let count = usize::from(self.header.shnum);
        let stride = u64::from(self.header.shentsize);

        if count > 0 && (stride as usize) < raw_size {
            log::error!("ELF file invalid (e_shentsize = {})", stride);
            return Err(ElfError::InvalidEntrySize {
                table: "e_shentsize",
                size: stride,
            });
        }

        let mut table = Vec::with_capacity(count);
        let mut raw = [0u8; 64];
        for index in 0..count {
            let offset = table_offset(self.header.shoff, index, stride)?;
            read_at(&mut self.source, offset, &mut raw[..raw_size])?;
            table.push(SectionEntry::parse(&raw[..raw_size], decoder));
        }

        let shstrndx = usize::from(self.header.shstrndx);
        if shstrndx == 0 || shstrndx >= table.len() {
            log::error!("ELF file invalid (e_shstrndx = {})", shstrndx);
            return Err(ElfError::InvalidSectionIndex {
                field: "e_shstrndx",
                index: u32::from(self.header.shstrndx),
            });
        }

        let names = StringTable::read(&mut self.source, &table[shstrndx])?;
        for section in &mut table {
            section.name = names.resolve(u64::from(section.name_offset), "sh_name")?;
        }

        self.sections = table;
        Ok(&self.sections)
    }
}
