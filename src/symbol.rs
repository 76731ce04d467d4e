//! ELF symbol table parsing.
//!
//! `.symtab` and `.dynsym` share one reader, parameterized by [`SymbolTableKind`].
//! Both tables are optional: a missing section reads as `Ok(None)`, while a
//! present but malformed one is an error.

use alloc::string::String;
use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::file::ElfFile;
use crate::section::{SectionType, StringTable};
use crate::source::{check_extent, read_at, table_offset, Decoder};

/// First reserved section index (`SHN_LORESERVE`).
pub const SHN_LORESERVE: u16 = 0xff00;

/// Symbol binding types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBinding {
    /// Local symbol
    Local,
    /// Global symbol
    Global,
    /// Weak symbol
    Weak,
    /// OS- or processor-specific binding
    Other(u8),
}

/// Symbol types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    /// No type
    NoType,
    /// Data object
    Object,
    /// Function
    Func,
    /// Section
    Section,
    /// File name
    File,
    /// Common symbol
    Common,
    /// Thread-local storage
    Tls,
    /// OS- or processor-specific type
    Other(u8),
}

/// Symbol visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolVisibility {
    /// Default visibility
    Default,
    /// Internal visibility
    Internal,
    /// Hidden visibility
    Hidden,
    /// Protected visibility
    Protected,
}

/// Section a symbol is defined relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSection {
    /// Undefined section
    Undefined,
    /// Absolute value
    Absolute,
    /// Common symbol
    Common,
    /// Some other reserved index (`>= SHN_LORESERVE`)
    Reserved(u16),
    /// Index in section header table
    Index(u16),
}

impl SymbolSection {
    /// Create from raw section index
    pub const fn from_raw(index: u16) -> Self {
        match index {
            0 => SymbolSection::Undefined,
            0xfff1 => SymbolSection::Absolute,
            0xfff2 => SymbolSection::Common,
            idx if idx >= SHN_LORESERVE => SymbolSection::Reserved(idx),
            idx => SymbolSection::Index(idx),
        }
    }

    /// Get raw section index
    pub const fn raw(self) -> u16 {
        match self {
            SymbolSection::Undefined => 0,
            SymbolSection::Absolute => 0xfff1,
            SymbolSection::Common => 0xfff2,
            SymbolSection::Reserved(idx) | SymbolSection::Index(idx) => idx,
        }
    }
}

/// ELF symbol table entry with its resolved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Symbol name, resolved through the linked string table
    pub name: String,
    /// Offset of the name in the linked string table
    pub name_offset: u32,
    /// Symbol value
    pub value: u64,
    /// Symbol size
    pub size: u64,
    /// Raw `st_info` (binding and type)
    pub info: u8,
    /// Raw `st_other` (visibility)
    pub other: u8,
    /// Defining section
    pub section: SymbolSection,
}

impl SymbolEntry {
    pub(crate) const fn raw_size(is_64bit: bool) -> usize {
        if is_64bit {
            24
        } else {
            16
        }
    }

    pub(crate) fn parse(data: &[u8], decoder: Decoder) -> Self {
        let name_offset = decoder.u32(data, 0);

        let (value, size, info, other, shndx) = if decoder.is_64bit() {
            (
                decoder.u64(data, 8),
                decoder.u64(data, 16),
                data[4],
                data[5],
                decoder.u16(data, 6),
            )
        } else {
            (
                decoder.word(data, 4),
                decoder.word(data, 8),
                data[12],
                data[13],
                decoder.u16(data, 14),
            )
        };

        SymbolEntry {
            name: String::new(),
            name_offset,
            value,
            size,
            info,
            other,
            section: SymbolSection::from_raw(shndx),
        }
    }

    /// Symbol binding
    pub fn binding(&self) -> SymbolBinding {
        match self.info >> 4 {
            0 => SymbolBinding::Local,
            1 => SymbolBinding::Global,
            2 => SymbolBinding::Weak,
            other => SymbolBinding::Other(other),
        }
    }

    /// Symbol type
    pub fn symbol_type(&self) -> SymbolType {
        match self.info & 0xf {
            0 => SymbolType::NoType,
            1 => SymbolType::Object,
            2 => SymbolType::Func,
            3 => SymbolType::Section,
            4 => SymbolType::File,
            5 => SymbolType::Common,
            6 => SymbolType::Tls,
            other => SymbolType::Other(other),
        }
    }

    /// Symbol visibility
    pub fn visibility(&self) -> SymbolVisibility {
        match self.other & 0x3 {
            0 => SymbolVisibility::Default,
            1 => SymbolVisibility::Internal,
            2 => SymbolVisibility::Hidden,
            _ => SymbolVisibility::Protected,
        }
    }

    /// Check if symbol is undefined
    pub fn is_undefined(&self) -> bool {
        self.section == SymbolSection::Undefined
    }

    /// Check if symbol is global
    pub fn is_global(&self) -> bool {
        self.binding() == SymbolBinding::Global
    }

    /// Check if symbol is a function
    pub fn is_function(&self) -> bool {
        self.symbol_type() == SymbolType::Func
    }
}

/// Which of the two symbol tables to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTableKind {
    /// `.symtab`, names in `.strtab`
    Static,
    /// `.dynsym`, names in `.dynstr`
    Dynamic,
}

impl SymbolTableKind {
    /// Name of the symbol table section.
    pub const fn section_name(self) -> &'static str {
        match self {
            SymbolTableKind::Static => ".symtab",
            SymbolTableKind::Dynamic => ".dynsym",
        }
    }

    /// Type the symbol table section must have.
    pub const fn section_type(self) -> SectionType {
        match self {
            SymbolTableKind::Static => SectionType::SymTab,
            SymbolTableKind::Dynamic => SectionType::DynSym,
        }
    }
}

impl<S: Read + Seek> ElfFile<S> {
    /// Read `.symtab`. Returns `Ok(None)` if the image has no such section.
    pub fn read_symbols(&mut self) -> Result<Option<&[SymbolEntry]>> {
        self.symbols.clear();
        match self.read_symbol_table(SymbolTableKind::Static)? {
            Some(table) => {
                self.symbols = table;
                Ok(Some(&self.symbols))
            }
            None => Ok(None),
        }
    }

    /// Read `.dynsym`. Returns `Ok(None)` if the image has no such section.
    pub fn read_dynamic_symbols(&mut self) -> Result<Option<&[SymbolEntry]>> {
        self.dynamic_symbols.clear();
        match self.read_symbol_table(SymbolTableKind::Dynamic)? {
            Some(table) => {
                self.dynamic_symbols = table;
                Ok(Some(&self.dynamic_symbols))
            }
            None => Ok(None),
        }
    }

    fn read_symbol_table(&mut self, kind: SymbolTableKind) -> Result<Option<Vec<SymbolEntry>>> {
        if self.sections.is_empty() {
            self.read_sections()?;
        }

        let name = kind.section_name();
        let Some(symtab) = self.find_section(name).cloned() else {
            log::debug!("no `{}` section", name);
            return Ok(None);
        };

        if symtab.section_type != kind.section_type() {
            log::error!("ELF file invalid (`{}`: sh_type = {:#010x})", name, symtab.section_type.raw());
            return Err(ElfError::InvalidSectionType {
                section: name,
                found: symtab.section_type.raw(),
            });
        }

        let section_count = self.sections.len();
        let link = symtab.link as usize;
        if link == 0 || link >= section_count {
            log::error!("ELF file invalid (`{}`: sh_link = {:#010x})", name, symtab.link);
            return Err(ElfError::InvalidSectionIndex {
                field: "sh_link",
                index: symtab.link,
            });
        }

        let decoder = self.header.decoder();
        let raw_size = SymbolEntry::raw_size(decoder.is_64bit());
        if symtab.entsize < raw_size as u64 {
            log::error!("ELF file invalid (`{}`: sh_entsize = {})", name, symtab.entsize);
            return Err(ElfError::InvalidEntrySize {
                table: name,
                size: symtab.entsize,
            });
        }

        check_extent(&mut self.source, symtab.offset, symtab.size)?;
        let count = usize::try_from(symtab.size / symtab.entsize).map_err(|_| ElfError::ArithmeticOverflow)?;
        let mut table = Vec::new();
        let mut raw = [0u8; 24];
        for index in 0..count {
            let offset = table_offset(symtab.offset, index, symtab.entsize)?;
            read_at(&mut self.source, offset, &mut raw[..raw_size])?;
            let symbol = SymbolEntry::parse(&raw[..raw_size], decoder);

            let shndx = symbol.section.raw();
            if shndx < SHN_LORESERVE && usize::from(shndx) >= section_count {
                log::error!("ELF file invalid (st_shndx = {:#06x})", shndx);
                return Err(ElfError::InvalidSymbolSection(shndx));
            }

            table.push(symbol);
        }

        let strtab = &self.sections[link];
        let names = StringTable::read(&mut self.source, strtab)?;
        for symbol in &mut table {
            symbol.name = names.resolve(u64::from(symbol.name_offset), "st_name")?;
        }

        log::debug!("read {} symbols from `{}`", table.len(), name);
        Ok(Some(table))
    }
}
