//! # Statue Loader - A no-std ELF parser and segment loader
//!
//! This library validates ELF (32- or 64-bit) executables and loads their
//! `PT_LOAD` segments into caller-provided memory, for bootloaders, embedded
//! kernels and bare-metal runtimes that have no dynamic linker to lean on.
//!
//! ## Features
//!
//! - **No-std compatible**: needs only `alloc`
//! - **Any byte source**: reads through `embedded-io` `Read + Seek`
//! - **Runtime target profiles**: word size, byte order and machine are checked
//!   against a [`TargetProfile`] chosen at run time
//! - **Table parsing**: program headers, sections, `.symtab`, `.dynsym`, and the
//!   dynamic segment's library dependencies
//! - **Relocatable placement**: the allocator decides where the image lands;
//!   the entry point and dynamic segment address follow it
//!
//! Relocation processing and symbol resolution against other objects are out
//! of scope: the dynamic segment is only inspected for the names it carries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use statue_loader::{ElfFile, SliceSource, TargetProfile, VecAllocator};
//!
//! # fn run(image: &[u8]) -> statue_loader::Result<()> {
//! let mut elf = ElfFile::open(SliceSource::new(image), &TargetProfile::x86_64())?;
//! elf.read_for_load()?;
//! for library in elf.needed_libraries() {
//!     log::info!("depends on {}", library);
//! }
//!
//! let loaded = elf.load(&mut VecAllocator::new())?;
//! log::info!("entry point at {:#x}", loaded.entry);
//! # Ok(())
//! # }
//! ```

#![no_std]
#![deny(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod dynamic;
pub mod error;
pub mod file;
pub mod header;
pub mod loader;
pub mod memory;
pub mod profile;
pub mod program;
pub mod section;
pub mod source;
pub mod symbol;

pub use dynamic::{DynamicEntry, DynamicInfo, DynamicTag};
pub use error::{ElfError, ErrorKind, Result};
pub use file::ElfFile;
pub use header::{ElfClass, ElfData, ElfHeader, ElfType};
pub use loader::LoadedImage;
pub use memory::{HeapRegion, ImageAllocator, ImageRegion, SliceAllocator, SliceRegion, VecAllocator};
pub use profile::{Machine, TargetProfile};
pub use program::{ProgramEntry, ProgramType, SegmentFlags};
pub use section::{SectionEntry, SectionFlags, SectionType, StringTable};
pub use source::SliceSource;
pub use symbol::{SymbolEntry, SymbolSection, SymbolTableKind};
