//! File header validation against target profiles.

mod common;

use common::{elf64, ElfBuilder};
use statue_loader::*;

fn minimal_x86_64() -> Vec<u8> {
    ElfBuilder::elf64().entry(0x401000).build()
}

fn open<'a>(image: &'a [u8], profile: &TargetProfile) -> Result<ElfFile<SliceSource<'a>>> {
    ElfFile::open(SliceSource::new(image), profile)
}

fn open_err(image: &[u8], profile: &TargetProfile) -> ElfError {
    open(image, profile).expect_err("header should have been rejected")
}

#[test]
fn test_valid_header_fields() {
    let image = minimal_x86_64();
    let elf = open(&image, &TargetProfile::x86_64()).expect("Failed to open test ELF");
    let header = elf.header();

    assert_eq!(header.ident.class, ElfClass::Elf64);
    assert_eq!(header.ident.data, ElfData::LittleEndian);
    assert_eq!(header.ident.version, 1);
    assert_eq!(header.file_type, ElfType::Executable);
    assert_eq!(header.machine, Machine::X86_64);
    assert_eq!(header.version, 1);
    assert_eq!(header.entry, 0x401000);
    assert_eq!(header.ehsize, 64);
    assert_eq!(header.phentsize, 56);
    assert_eq!(header.phnum, 0);
    assert_eq!(header.shentsize, 64);
    assert_eq!(header.shnum, 2);
    assert_eq!(header.shstrndx, 1);

    let raw_u64 = |offset: usize| u64::from_le_bytes(image[offset..offset + 8].try_into().unwrap());
    assert_eq!(header.entry, raw_u64(24));
    assert_eq!(header.phoff, raw_u64(32));
    assert_eq!(header.shoff, raw_u64(40));
    assert!(header.is_64bit());
    assert!(header.is_little_endian());
}

#[test]
fn test_valid_elf32_header() {
    let image = ElfBuilder::elf32().entry(0x8048000).build();
    let elf = open(&image, &TargetProfile::x86()).expect("Failed to open 32-bit ELF");
    let header = elf.header();

    assert_eq!(header.ident.class, ElfClass::Elf32);
    assert_eq!(header.machine, Machine::X86);
    assert_eq!(header.entry, 0x8048000);
    assert_eq!(header.ehsize, 52);
    assert_eq!(header.phentsize, 32);
    assert_eq!(header.shentsize, 40);
    assert!(!header.is_64bit());
}

#[test]
fn test_corrupt_magic_is_format_error() {
    for index in 0..4 {
        let mut image = minimal_x86_64();
        image[index] ^= 0xff;

        let error = open_err(&image, &TargetProfile::x86_64());
        assert_eq!(error, ElfError::InvalidMagic);
        assert_eq!(error.kind(), ErrorKind::Format);
    }
}

#[test]
fn test_corrupt_magic_wins_over_other_faults() {
    let mut image = minimal_x86_64();
    image[0] = 0;
    image[elf64::EI_CLASS] = 9;
    image[elf64::EI_DATA] = 9;
    image[elf64::E_MACHINE] = 0xff;

    assert_eq!(open_err(&image, &TargetProfile::x86_64()), ElfError::InvalidMagic);
    assert_eq!(open_err(&image[..4], &TargetProfile::x86_64()), ElfError::InvalidMagic);
}

#[test]
fn test_opposite_word_size_is_architecture_mismatch() {
    let elf32 = ElfBuilder::elf32().build();
    let error = open_err(&elf32, &TargetProfile::x86_64().any_machine());
    assert_eq!(
        error,
        ElfError::ClassMismatch {
            file: ElfClass::Elf32,
            expected: ElfClass::Elf64,
        }
    );
    assert_eq!(error.kind(), ErrorKind::ArchitectureMismatch);
    assert_eq!(error.to_string(), "ELF file is 32-bit, target is 64-bit");

    let elf64 = minimal_x86_64();
    let error = open_err(&elf64, &TargetProfile::x86().any_machine());
    assert_eq!(
        error,
        ElfError::ClassMismatch {
            file: ElfClass::Elf64,
            expected: ElfClass::Elf32,
        }
    );
}

#[test]
fn test_class_checked_before_machine() {
    let image = ElfBuilder::elf32().machine(0x28).build();
    assert!(matches!(
        open_err(&image, &TargetProfile::x86_64()),
        ElfError::ClassMismatch { .. }
    ));
}

#[test]
fn test_invalid_class_byte() {
    let mut image = minimal_x86_64();
    image[elf64::EI_CLASS] = 3;

    let error = open_err(&image, &TargetProfile::x86_64());
    assert_eq!(error, ElfError::InvalidClass(3));
    assert_eq!(error.kind(), ErrorKind::Format);
}

#[test]
fn test_byte_order_mismatch() {
    let mut image = minimal_x86_64();
    image[elf64::EI_DATA] = 2;

    let error = open_err(&image, &TargetProfile::x86_64());
    assert_eq!(
        error,
        ElfError::EncodingMismatch {
            file: ElfData::BigEndian,
            expected: ElfData::LittleEndian,
        }
    );
    assert_eq!(error.kind(), ErrorKind::ArchitectureMismatch);

    image[elf64::EI_DATA] = 0;
    assert_eq!(open_err(&image, &TargetProfile::x86_64()), ElfError::InvalidEncoding(0));
}

#[test]
fn test_machine_mismatch() {
    let image = ElfBuilder::elf64().machine(0xb7).build();

    let error = open_err(&image, &TargetProfile::x86_64());
    assert_eq!(
        error,
        ElfError::MachineMismatch {
            file: 0xb7,
            expected: 0x3e,
        }
    );
    assert_eq!(error.kind(), ErrorKind::ArchitectureMismatch);

    assert!(open(&image, &TargetProfile::aarch64()).is_ok());
    assert!(open(&image, &TargetProfile::x86_64().any_machine()).is_ok());
}

#[test]
fn test_header_size_must_match_class() {
    let mut image = minimal_x86_64();
    image[elf64::E_EHSIZE] = 56;

    let error = open_err(&image, &TargetProfile::x86_64());
    assert_eq!(error, ElfError::InvalidHeaderSize(56));
    assert_eq!(error.kind(), ErrorKind::Format);
}

#[test]
fn test_both_versions_checked() {
    let mut image = minimal_x86_64();
    image[elf64::EI_VERSION] = 2;
    assert_eq!(open_err(&image, &TargetProfile::x86_64()), ElfError::UnsupportedVersion(2));

    let mut image = minimal_x86_64();
    image[elf64::E_VERSION] = 5;
    assert_eq!(open_err(&image, &TargetProfile::x86_64()), ElfError::UnsupportedVersion(5));
}

#[test]
fn test_truncated_header_is_io_failure() {
    let image = minimal_x86_64();

    let error = open_err(&image[..10], &TargetProfile::x86_64());
    assert_eq!(error, ElfError::UnexpectedEof);
    assert_eq!(error.kind(), ErrorKind::Io);

    assert_eq!(open_err(&image[..40], &TargetProfile::x86_64()), ElfError::UnexpectedEof);
}

#[test]
fn test_host_profile() {
    let profile = TargetProfile::host();
    let expected_class = if cfg!(target_pointer_width = "64") {
        ElfClass::Elf64
    } else {
        ElfClass::Elf32
    };
    assert_eq!(profile.class, expected_class);
    assert_eq!(profile.encoding, ElfData::host());
    assert_eq!(TargetProfile::default(), profile);

    if cfg!(target_arch = "x86_64") {
        assert_eq!(profile.machine, Some(Machine::X86_64));
    }
}

#[test]
fn test_open_through_mutable_reference() {
    let image = minimal_x86_64();
    let mut source = SliceSource::new(&image);
    {
        let elf = ElfFile::open(&mut source, &TargetProfile::x86_64()).expect("Failed to open via &mut");
        assert_eq!(elf.header().entry, 0x401000);
    }
    assert!(source.position() > 0);
}
