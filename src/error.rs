//! Error types and result handling for the Statue ELF loader.

use core::fmt;

use crate::header::{ElfClass, ElfData};

/// Result type alias for Statue operations.
pub type Result<T> = core::result::Result<T, ElfError>;

/// Broad classes of failure, used by callers that only care about what went wrong
/// at the level of "bad file" versus "wrong target" versus "bad environment".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is not a well-formed ELF image
    Format,
    /// The file is well-formed but built for a different target profile
    ArchitectureMismatch,
    /// An index or offset points outside the table it refers to
    StructuralBounds,
    /// A section needed by the requested operation is not present
    MissingRequiredSection,
    /// The allocator could not provide memory for the image
    Allocation,
    /// The byte source could not deliver the requested data
    Io,
}

/// Error types for ELF parsing and loading operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// Invalid or corrupted ELF magic number
    InvalidMagic,
    /// `e_ident[EI_CLASS]` is neither 32- nor 64-bit
    InvalidClass(u8),
    /// `e_ident[EI_DATA]` is neither little- nor big-endian
    InvalidEncoding(u8),
    /// `e_ident[EI_VERSION]` or `e_version` is not the current version
    UnsupportedVersion(u32),
    /// `e_ehsize` does not match the header layout for the file's class
    InvalidHeaderSize(u16),
    /// A table declares an entry size too small to hold its entries
    InvalidEntrySize {
        /// Table whose entry size is wrong
        table: &'static str,
        /// Declared entry size
        size: u64,
    },
    /// A named section does not have the type its name implies
    InvalidSectionType {
        /// Section name
        section: &'static str,
        /// Declared `sh_type`
        found: u32,
    },
    /// A string in a string table is not valid UTF-8
    InvalidStringTable,
    /// File word size differs from the target profile
    ClassMismatch {
        /// Class declared by the file
        file: ElfClass,
        /// Class required by the profile
        expected: ElfClass,
    },
    /// File byte order differs from the target profile
    EncodingMismatch {
        /// Encoding declared by the file
        file: ElfData,
        /// Encoding required by the profile
        expected: ElfData,
    },
    /// File machine type differs from the target profile
    MachineMismatch {
        /// Machine declared by the file
        file: u16,
        /// Machine required by the profile
        expected: u16,
    },
    /// A header field indexes past the end of the section table
    InvalidSectionIndex {
        /// Field holding the index
        field: &'static str,
        /// The offending index
        index: u32,
    },
    /// A symbol references a section that does not exist
    InvalidSymbolSection(u16),
    /// A string-table offset lies outside the string table
    StringOutOfBounds {
        /// Offset into the string table
        offset: u64,
        /// Size of the string table
        size: u64,
    },
    /// A segment is larger in the file than in memory
    SegmentSizeMismatch {
        /// Segment virtual address
        vaddr: u64,
        /// `p_filesz`
        filesz: u64,
        /// `p_memsz`
        memsz: u64,
    },
    /// The dynamic segment is not covered by the loaded window
    DynamicOutsideImage {
        /// Dynamic segment virtual address
        vaddr: u64,
        /// Dynamic segment size in memory
        memsz: u64,
    },
    /// Arithmetic overflow while computing an offset or address
    ArithmeticOverflow,
    /// Missing required section
    MissingSection(&'static str),
    /// The image has no `PT_LOAD` segments to place in memory
    NoLoadableSegments,
    /// Memory allocation failure
    AllocationFailed {
        /// Number of bytes requested
        size: u64,
    },
    /// The source ended before a read was satisfied
    UnexpectedEof,
    /// The source reported an I/O error
    Io(embedded_io::ErrorKind),
}

impl ElfError {
    /// Returns a human-readable description of the error.
    pub const fn description(self) -> &'static str {
        match self {
            ElfError::InvalidMagic => "Invalid ELF magic number",
            ElfError::InvalidClass(_) => "Invalid ELF class",
            ElfError::InvalidEncoding(_) => "Invalid data encoding",
            ElfError::UnsupportedVersion(_) => "Unsupported ELF version",
            ElfError::InvalidHeaderSize(_) => "Invalid ELF header size",
            ElfError::InvalidEntrySize { .. } => "Invalid table entry size",
            ElfError::InvalidSectionType { .. } => "Section has unexpected type",
            ElfError::InvalidStringTable => "Invalid string table",
            ElfError::ClassMismatch { .. } => "ELF class does not match target",
            ElfError::EncodingMismatch { .. } => "Data encoding does not match target",
            ElfError::MachineMismatch { .. } => "Machine type does not match target",
            ElfError::InvalidSectionIndex { .. } => "Section index out of bounds",
            ElfError::InvalidSymbolSection(_) => "Symbol section index out of bounds",
            ElfError::StringOutOfBounds { .. } => "String offset out of bounds",
            ElfError::SegmentSizeMismatch { .. } => "Segment file size exceeds memory size",
            ElfError::DynamicOutsideImage { .. } => "Dynamic segment outside loaded memory",
            ElfError::ArithmeticOverflow => "Arithmetic overflow",
            ElfError::MissingSection(_) => "Missing required section",
            ElfError::NoLoadableSegments => "No loadable segments",
            ElfError::AllocationFailed { .. } => "Memory allocation failure",
            ElfError::UnexpectedEof => "Unexpected end of file",
            ElfError::Io(_) => "I/O error",
        }
    }

    /// Returns the broad class this error belongs to.
    pub const fn kind(self) -> ErrorKind {
        match self {
            ElfError::InvalidMagic
            | ElfError::InvalidClass(_)
            | ElfError::InvalidEncoding(_)
            | ElfError::UnsupportedVersion(_)
            | ElfError::InvalidHeaderSize(_)
            | ElfError::InvalidEntrySize { .. }
            | ElfError::InvalidSectionType { .. }
            | ElfError::InvalidStringTable
            | ElfError::NoLoadableSegments => ErrorKind::Format,
            ElfError::ClassMismatch { .. }
            | ElfError::EncodingMismatch { .. }
            | ElfError::MachineMismatch { .. } => ErrorKind::ArchitectureMismatch,
            ElfError::InvalidSectionIndex { .. }
            | ElfError::InvalidSymbolSection(_)
            | ElfError::StringOutOfBounds { .. }
            | ElfError::SegmentSizeMismatch { .. }
            | ElfError::DynamicOutsideImage { .. }
            | ElfError::ArithmeticOverflow => ErrorKind::StructuralBounds,
            ElfError::MissingSection(_) => ErrorKind::MissingRequiredSection,
            ElfError::AllocationFailed { .. } => ErrorKind::Allocation,
            ElfError::UnexpectedEof | ElfError::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ElfError::InvalidClass(class) => write!(f, "{} (e_ident[EI_CLASS] = {})", self.description(), class),
            ElfError::InvalidEncoding(data) => write!(f, "{} (e_ident[EI_DATA] = {})", self.description(), data),
            ElfError::UnsupportedVersion(version) => write!(f, "{} ({})", self.description(), version),
            ElfError::InvalidHeaderSize(size) => write!(f, "{} (e_ehsize = {})", self.description(), size),
            ElfError::InvalidEntrySize { table, size } => write!(f, "{} ({}: {})", self.description(), table, size),
            ElfError::InvalidSectionType { section, found } => {
                write!(f, "{} (`{}`: sh_type = {:#010x})", self.description(), section, found)
            }
            ElfError::ClassMismatch { file, expected } => {
                write!(f, "ELF file is {}-bit, target is {}-bit", file.bits(), expected.bits())
            }
            ElfError::EncodingMismatch { file, expected } => {
                write!(f, "ELF file is {}, target is {}", file.name(), expected.name())
            }
            ElfError::MachineMismatch { file, expected } => {
                write!(f, "ELF file has machine type {:#06x}, target has machine type {:#06x}", file, expected)
            }
            ElfError::InvalidSectionIndex { field, index } => write!(f, "{} ({} = {})", self.description(), field, index),
            ElfError::InvalidSymbolSection(index) => write!(f, "{} (st_shndx = {:#06x})", self.description(), index),
            ElfError::StringOutOfBounds { offset, size } => {
                write!(f, "{} (offset {:#x}, table size {:#x})", self.description(), offset, size)
            }
            ElfError::SegmentSizeMismatch { vaddr, filesz, memsz } => write!(
                f,
                "{} (vaddr {:#x}: p_filesz {:#x} > p_memsz {:#x})",
                self.description(),
                vaddr,
                filesz,
                memsz
            ),
            ElfError::DynamicOutsideImage { vaddr, memsz } => {
                write!(f, "{} ({:#x}..{:#x})", self.description(), vaddr, vaddr.wrapping_add(memsz))
            }
            ElfError::MissingSection(name) => write!(f, "{} (`{}`)", self.description(), name),
            ElfError::AllocationFailed { size } => write!(f, "Unable to allocate {} bytes for loading", size),
            ElfError::Io(kind) => write!(f, "{} ({:?})", self.description(), kind),
            _ => f.write_str(self.description()),
        }
    }
}

/// Map an `embedded-io` error into an [`ElfError`].
pub(crate) fn io_error<E: embedded_io::Error>(error: E) -> ElfError {
    ElfError::Io(error.kind())
}
