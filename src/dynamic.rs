//! Dynamic segment introspection.
//!
//! Walks the `PT_DYNAMIC` tag/value pairs up to `DT_NULL` and resolves the
//! string-valued entries (`DT_NEEDED`, `DT_SONAME`, `DT_RPATH`, `DT_RUNPATH`)
//! through `.dynstr`. Nothing here links or relocates anything.

use alloc::string::String;
use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::file::ElfFile;
use crate::program::find_dynamic;
use crate::section::StringTable;
use crate::source::{read_at, table_offset};

/// Dynamic entry tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicTag {
    /// End of dynamic section
    Null,
    /// Name of needed library
    Needed,
    /// Size of PLT relocs
    PltRelSz,
    /// Processor-defined value (GOT/PLT)
    PltGot,
    /// Address of symbol hash table
    Hash,
    /// Address of string table
    StrTab,
    /// Address of symbol table
    SymTab,
    /// Address of RELA relocs
    Rela,
    /// Total size of RELA relocs
    RelaSz,
    /// Size of one RELA reloc
    RelaEnt,
    /// Size of string table
    StrSz,
    /// Size of one symbol table entry
    SymEnt,
    /// Address of init function
    Init,
    /// Address of fini function
    Fini,
    /// Name of shared object
    SoName,
    /// Library search path (deprecated)
    RPath,
    /// Start symbol search here
    Symbolic,
    /// Address of REL relocs
    Rel,
    /// Total size of REL relocs
    RelSz,
    /// Size of one REL reloc
    RelEnt,
    /// Type of reloc in PLT
    PltRel,
    /// For debugging
    Debug,
    /// Reloc might modify text segment
    TextRel,
    /// Address of PLT relocs
    JmpRel,
    /// Process relocations of object eagerly
    BindNow,
    /// Array of constructors
    InitArray,
    /// Array of destructors
    FiniArray,
    /// Size of the constructor array
    InitArraySz,
    /// Size of the destructor array
    FiniArraySz,
    /// Library search path
    RunPath,
    /// Flags for the object being loaded
    Flags,
    /// Any other tag
    Other(i64),
}

impl DynamicTag {
    /// Decode `d_tag`.
    pub const fn from_raw(raw: i64) -> Self {
        match raw {
            0 => DynamicTag::Null,
            1 => DynamicTag::Needed,
            2 => DynamicTag::PltRelSz,
            3 => DynamicTag::PltGot,
            4 => DynamicTag::Hash,
            5 => DynamicTag::StrTab,
            6 => DynamicTag::SymTab,
            7 => DynamicTag::Rela,
            8 => DynamicTag::RelaSz,
            9 => DynamicTag::RelaEnt,
            10 => DynamicTag::StrSz,
            11 => DynamicTag::SymEnt,
            12 => DynamicTag::Init,
            13 => DynamicTag::Fini,
            14 => DynamicTag::SoName,
            15 => DynamicTag::RPath,
            16 => DynamicTag::Symbolic,
            17 => DynamicTag::Rel,
            18 => DynamicTag::RelSz,
            19 => DynamicTag::RelEnt,
            20 => DynamicTag::PltRel,
            21 => DynamicTag::Debug,
            22 => DynamicTag::TextRel,
            23 => DynamicTag::JmpRel,
            24 => DynamicTag::BindNow,
            25 => DynamicTag::InitArray,
            26 => DynamicTag::FiniArray,
            27 => DynamicTag::InitArraySz,
            28 => DynamicTag::FiniArraySz,
            29 => DynamicTag::RunPath,
            30 => DynamicTag::Flags,
            other => DynamicTag::Other(other),
        }
    }

    /// Whether `d_val` is an offset into `.dynstr`.
    pub const fn is_string(self) -> bool {
        matches!(
            self,
            DynamicTag::Needed | DynamicTag::SoName | DynamicTag::RPath | DynamicTag::RunPath
        )
    }
}

/// One `(d_tag, d_val)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    /// Entry tag
    pub tag: DynamicTag,
    /// Integer value or `.dynstr` offset, depending on the tag
    pub value: u64,
}

/// Decoded contents of the dynamic segment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    /// Entries before the `DT_NULL` terminator, in file order
    pub entries: Vec<DynamicEntry>,
    /// `DT_NEEDED` library names, in file order
    pub needed: Vec<String>,
    /// `DT_SONAME`
    pub soname: Option<String>,
    /// `DT_RPATH`
    pub rpath: Option<String>,
    /// `DT_RUNPATH`
    pub runpath: Option<String>,
}

impl DynamicInfo {
    /// First entry with the given tag.
    pub fn find(&self, tag: DynamicTag) -> Option<&DynamicEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }
}

impl<S: Read + Seek> ElfFile<S> {
    /// Read the dynamic segment and resolve the libraries it names.
    ///
    /// Returns `Ok(None)` if the image has no `PT_DYNAMIC` entry. When several
    /// exist the last one is used. `.dynstr` must be present, and every string
    /// offset must fall inside it.
    pub fn read_dynamic(&mut self) -> Result<Option<&DynamicInfo>> {
        self.dynamic = None;

        if self.programs.is_empty() {
            self.read_programs()?;
        }
        if self.sections.is_empty() {
            self.read_sections()?;
        }

        let Some(segment) = find_dynamic(&self.programs).cloned() else {
            log::debug!("no PT_DYNAMIC segment");
            return Ok(None);
        };

        let Some(dynstr) = self.find_section(".dynstr").cloned() else {
            log::error!("ELF file invalid (missing `.dynstr`)");
            return Err(ElfError::MissingSection(".dynstr"));
        };
        let strings = StringTable::read(&mut self.source, &dynstr)?;

        let decoder = self.header.decoder();
        let field_size = if decoder.is_64bit() { 8 } else { 4 };
        let entry_size = 2 * field_size;
        let count = segment.filesz / entry_size as u64;

        let mut info = DynamicInfo::default();
        let mut raw = [0u8; 16];
        for index in 0..count as usize {
            let offset = table_offset(segment.offset, index, entry_size as u64)?;
            read_at(&mut self.source, offset, &mut raw[..entry_size])?;

            let tag = DynamicTag::from_raw(decoder.sword(&raw, 0));
            let value = decoder.word(&raw, field_size);
            if tag == DynamicTag::Null {
                break;
            }

            if tag.is_string() {
                let name = strings.resolve(value, "d_val")?;
                match tag {
                    DynamicTag::Needed => {
                        log::debug!("needs {}", name);
                        info.needed.push(name);
                    }
                    DynamicTag::SoName => info.soname = Some(name),
                    DynamicTag::RPath => info.rpath = Some(name),
                    _ => info.runpath = Some(name),
                }
            }

            info.entries.push(DynamicEntry { tag, value });
        }

        Ok(Some(self.dynamic.insert(info)))
    }
}
