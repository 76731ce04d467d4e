//! ELF header parsing and validation.

use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::profile::{Machine, TargetProfile};
use crate::source::{read_at, Decoder};

/// ELF magic number bytes
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Current value of `e_ident[EI_VERSION]` and `e_version`
pub const EV_CURRENT: u32 = 1;

/// Size of `e_ident`
const EI_NIDENT: usize = 16;

/// ELF class constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    /// 32-bit ELF
    Elf32 = 1,
    /// 64-bit ELF
    Elf64 = 2,
}

impl ElfClass {
    /// Decode `e_ident[EI_CLASS]`.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ElfClass::Elf32),
            2 => Some(ElfClass::Elf64),
            _ => None,
        }
    }

    /// Word size in bits.
    pub const fn bits(self) -> u32 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }

    /// Size of the file header for this class.
    pub const fn header_size(self) -> u16 {
        match self {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }
}

/// ELF data encoding constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfData {
    /// Little-endian
    LittleEndian = 1,
    /// Big-endian
    BigEndian = 2,
}

impl ElfData {
    /// Decode `e_ident[EI_DATA]`.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ElfData::LittleEndian),
            2 => Some(ElfData::BigEndian),
            _ => None,
        }
    }

    /// Byte order of the machine running this code.
    pub const fn host() -> Self {
        if cfg!(target_endian = "little") {
            ElfData::LittleEndian
        } else {
            ElfData::BigEndian
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            ElfData::LittleEndian => "little-endian",
            ElfData::BigEndian => "big-endian",
        }
    }
}

/// ELF file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    /// No file type
    None,
    /// Relocatable file
    Relocatable,
    /// Executable file
    Executable,
    /// Shared object file
    SharedObject,
    /// Core file
    Core,
    /// OS- or processor-specific type
    Other(u16),
}

impl ElfType {
    /// Decode `e_type`.
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => ElfType::None,
            1 => ElfType::Relocatable,
            2 => ElfType::Executable,
            3 => ElfType::SharedObject,
            4 => ElfType::Core,
            other => ElfType::Other(other),
        }
    }
}

/// ELF identification bytes
#[derive(Debug, Clone, Copy)]
pub struct ElfIdent {
    /// File class
    pub class: ElfClass,
    /// Data encoding
    pub data: ElfData,
    /// File version
    pub version: u8,
    /// OS/ABI identification
    pub osabi: u8,
    /// ABI version
    pub abiversion: u8,
}

/// ELF header structure
#[derive(Debug, Clone)]
pub struct ElfHeader {
    /// ELF identification
    pub ident: ElfIdent,
    /// Object file type
    pub file_type: ElfType,
    /// Architecture
    pub machine: Machine,
    /// Object file version
    pub version: u32,
    /// Entry point virtual address
    pub entry: u64,
    /// Program header table file offset
    pub phoff: u64,
    /// Section header table file offset
    pub shoff: u64,
    /// Processor-specific flags
    pub flags: u32,
    /// ELF header size in bytes
    pub ehsize: u16,
    /// Program header table entry size
    pub phentsize: u16,
    /// Program header table entry count
    pub phnum: u16,
    /// Section header table entry size
    pub shentsize: u16,
    /// Section header table entry count
    pub shnum: u16,
    /// Section header string table index
    pub shstrndx: u16,
}

impl ElfHeader {
    /// Read the file header from `source` and validate it against `profile`.
    ///
    /// Checks run in a fixed order: magic, class, byte order, machine, header
    /// size, then both version fields. The first failure is logged and returned.
    pub fn read<S: Read + Seek>(source: &mut S, profile: &TargetProfile) -> Result<Self> {
        let mut raw = [0u8; 64];

        read_at(source, 0, &mut raw[..ELF_MAGIC.len()])?;
        if raw[..ELF_MAGIC.len()] != ELF_MAGIC {
            log::error!("ELF file invalid (bad magic)");
            return Err(ElfError::InvalidMagic);
        }

        read_at(source, 0, &mut raw[..EI_NIDENT])?;

        let class = ElfClass::from_raw(raw[4]).ok_or_else(|| {
            log::error!("ELF file invalid (e_ident[EI_CLASS] = {})", raw[4]);
            ElfError::InvalidClass(raw[4])
        })?;
        if class != profile.class {
            log::error!("ELF file is {}-bit, target is {}-bit", class.bits(), profile.class.bits());
            return Err(ElfError::ClassMismatch {
                file: class,
                expected: profile.class,
            });
        }

        let data = ElfData::from_raw(raw[5]).ok_or_else(|| {
            log::error!("ELF file invalid (e_ident[EI_DATA] = {})", raw[5]);
            ElfError::InvalidEncoding(raw[5])
        })?;
        if data != profile.encoding {
            log::error!("ELF file is {}, target is {}", data.name(), profile.encoding.name());
            return Err(ElfError::EncodingMismatch {
                file: data,
                expected: profile.encoding,
            });
        }

        let ident = ElfIdent {
            class,
            data,
            version: raw[6],
            osabi: raw[7],
            abiversion: raw[8],
        };

        let size = class.header_size() as usize;
        read_at(source, 0, &mut raw[..size])?;
        let header = Self::parse(&raw[..size], ident);

        if let Some(expected) = profile.machine {
            if header.machine != expected {
                log::error!(
                    "ELF file has machine type {:#06x}, target has machine type {:#06x}",
                    header.machine.0,
                    expected.0
                );
                return Err(ElfError::MachineMismatch {
                    file: header.machine.0,
                    expected: expected.0,
                });
            }
        }

        if header.ehsize != class.header_size() {
            log::error!("ELF file invalid (e_ehsize = {})", header.ehsize);
            return Err(ElfError::InvalidHeaderSize(header.ehsize));
        }
        if u32::from(ident.version) != EV_CURRENT {
            log::error!("ELF file invalid (e_ident[EI_VERSION] = {})", ident.version);
            return Err(ElfError::UnsupportedVersion(u32::from(ident.version)));
        }
        if header.version != EV_CURRENT {
            log::error!("ELF file invalid (e_version = {})", header.version);
            return Err(ElfError::UnsupportedVersion(header.version));
        }

        Ok(header)
    }

    /// Decode the fields following `e_ident`. `data` holds the whole header.
    fn parse(data: &[u8], ident: ElfIdent) -> Self {
        let decoder = Decoder::new(ident.class, ident.data);

        let file_type = ElfType::from_raw(decoder.u16(data, 16));
        let machine = Machine(decoder.u16(data, 18));
        let version = decoder.u32(data, 20);

        let (entry, phoff, shoff, flags_offset) = match ident.class {
            ElfClass::Elf32 => (
                decoder.word(data, 24),
                decoder.word(data, 28),
                decoder.word(data, 32),
                36,
            ),
            ElfClass::Elf64 => (
                decoder.word(data, 24),
                decoder.word(data, 32),
                decoder.word(data, 40),
                48,
            ),
        };

        ElfHeader {
            ident,
            file_type,
            machine,
            version,
            entry,
            phoff,
            shoff,
            flags: decoder.u32(data, flags_offset),
            ehsize: decoder.u16(data, flags_offset + 4),
            phentsize: decoder.u16(data, flags_offset + 6),
            phnum: decoder.u16(data, flags_offset + 8),
            shentsize: decoder.u16(data, flags_offset + 10),
            shnum: decoder.u16(data, flags_offset + 12),
            shstrndx: decoder.u16(data, flags_offset + 14),
        }
    }

    /// Check if this is a 64-bit ELF
    pub fn is_64bit(&self) -> bool {
        self.ident.class == ElfClass::Elf64
    }

    /// Check if this uses little-endian encoding
    pub fn is_little_endian(&self) -> bool {
        self.ident.data == ElfData::LittleEndian
    }

    pub(crate) fn decoder(&self) -> Decoder {
        Decoder::new(self.ident.class, self.ident.data)
    }
}
