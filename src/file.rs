//! The parser: an ELF image bound to its byte source.

use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use crate::dynamic::DynamicInfo;
use crate::error::Result;
use crate::header::ElfHeader;
use crate::profile::TargetProfile;
use crate::program::ProgramEntry;
use crate::section::SectionEntry;
use crate::symbol::{SymbolEntry, SymbolSection};

/// An ELF image bound to a readable, seekable byte source.
///
/// An `ElfFile` only exists once its header has been validated against a
/// [`TargetProfile`]. The program, section, symbol and dynamic tables are read
/// on demand by the `read_*` methods; each of those clears and repopulates its
/// table, and leaves it empty if the read fails.
#[derive(Debug)]
pub struct ElfFile<S> {
    pub(crate) source: S,
    pub(crate) header: ElfHeader,
    pub(crate) programs: Vec<ProgramEntry>,
    pub(crate) sections: Vec<SectionEntry>,
    pub(crate) symbols: Vec<SymbolEntry>,
    pub(crate) dynamic_symbols: Vec<SymbolEntry>,
    pub(crate) dynamic: Option<DynamicInfo>,
}

impl<S: Read + Seek> ElfFile<S> {
    /// Bind to `source` and validate the file header against `profile`.
    pub fn open(mut source: S, profile: &TargetProfile) -> Result<Self> {
        let header = ElfHeader::read(&mut source, profile)?;
        log::debug!(
            "ELF header ok: {}-bit, machine {:#06x}, entry {:#x}",
            header.ident.class.bits(),
            header.machine.0,
            header.entry
        );

        Ok(Self {
            source,
            header,
            programs: Vec::new(),
            sections: Vec::new(),
            symbols: Vec::new(),
            dynamic_symbols: Vec::new(),
            dynamic: None,
        })
    }

    /// Read program headers, sections, and both symbol tables.
    pub fn read_all(&mut self) -> Result<()> {
        self.read_programs()?;
        self.read_sections()?;
        self.read_symbols()?;
        self.read_dynamic_symbols()?;
        Ok(())
    }

    /// Read everything needed to load the image and list its dependencies:
    /// program headers, sections, dynamic symbols, and the dynamic segment.
    pub fn read_for_load(&mut self) -> Result<()> {
        self.read_programs()?;
        self.read_sections()?;
        self.read_dynamic_symbols()?;
        self.read_dynamic()?;
        Ok(())
    }
}

impl<S> ElfFile<S> {
    /// The validated file header.
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Program headers from the last successful [`read_programs`](Self::read_programs).
    pub fn programs(&self) -> &[ProgramEntry] {
        &self.programs
    }

    /// Sections from the last successful [`read_sections`](Self::read_sections).
    pub fn sections(&self) -> &[SectionEntry] {
        &self.sections
    }

    /// Entries of `.symtab`, empty if absent or not yet read.
    pub fn symbols(&self) -> &[SymbolEntry] {
        &self.symbols
    }

    /// Entries of `.dynsym`, empty if absent or not yet read.
    pub fn dynamic_symbols(&self) -> &[SymbolEntry] {
        &self.dynamic_symbols
    }

    /// Contents of the dynamic segment, if read and present.
    pub fn dynamic(&self) -> Option<&DynamicInfo> {
        self.dynamic.as_ref()
    }

    /// Names of the shared libraries this image depends on.
    pub fn needed_libraries(&self) -> &[alloc::string::String] {
        self.dynamic
            .as_ref()
            .map_or(&[][..], |dynamic| dynamic.needed.as_slice())
    }

    /// Find a section by name.
    pub fn find_section(&self, name: &str) -> Option<&SectionEntry> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Index of the section called `name`.
    pub fn find_section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|section| section.name == name)
    }

    /// Find a `.symtab` symbol by name.
    pub fn find_symbol(&self, name: &str) -> Option<&SymbolEntry> {
        self.symbols.iter().find(|symbol| symbol.name == name)
    }

    /// Find a `.dynsym` symbol by name.
    pub fn find_dynamic_symbol(&self, name: &str) -> Option<&SymbolEntry> {
        self.dynamic_symbols.iter().find(|symbol| symbol.name == name)
    }

    /// The section a symbol is defined in, if it names an ordinary section.
    pub fn section_of(&self, symbol: &SymbolEntry) -> Option<&SectionEntry> {
        match symbol.section {
            SymbolSection::Index(index) => self.sections.get(usize::from(index)),
            _ => None,
        }
    }

    /// Give back the byte source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Dump the parsed tables through the `log` facade at info level.
    pub fn log_summary(&self) {
        log::info!("Program headers:");
        log::info!("  TYPE        ADDR              FILE OFF  SIZE      FLAGS");
        for program in &self.programs {
            log::info!(
                "  {:<10}  {:016x}  {:8x}  {:8x}  {}",
                program.segment_type.name(),
                program.vaddr,
                program.offset,
                program.memsz,
                program.flags.permissions()
            );
        }

        log::info!("Sections:");
        log::info!("  TYPE        ADDR              FILE OFF  SIZE      NAME");
        for section in &self.sections {
            log::info!(
                "  {:<10}  {:016x}  {:8x}  {:8x}  {}",
                section.section_type.name(),
                section.addr,
                section.offset,
                section.size,
                section.name
            );
        }

        log::info!("Symbols:");
        log::info!("  VALUE             NAME");
        for symbol in &self.symbols {
            log::info!("  {:016x}  {}", symbol.value, symbol.name);
        }

        log::info!("Dynamic symbols:");
        log::info!("  VALUE             NAME");
        for symbol in &self.dynamic_symbols {
            log::info!("  {:016x}  {}", symbol.value, symbol.name);
        }

        for library in self.needed_libraries() {
            log::info!("Needs: {}", library);
        }
    }
}
