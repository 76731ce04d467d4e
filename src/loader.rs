//! Segment loader.
//!
//! Computes the address window spanned by the `PT_LOAD` segments, obtains a
//! region for it from an [`ImageAllocator`], copies each segment's file bytes
//! and zero-fills its BSS tail. The region may be placed at a different base
//! than requested; the entry point and dynamic segment address are rebased by
//! the same amount.

use embedded_io::{Read, Seek};

use crate::error::{ElfError, Result};
use crate::file::ElfFile;
use crate::memory::{ImageAllocator, ImageRegion};
use crate::program::{ProgramEntry, ProgramType};
use crate::source::read_at;

/// Minimum alignment requested for an image's region.
pub const MIN_IMAGE_ALIGNMENT: usize = 32;

/// An image placed in memory.
#[derive(Debug)]
pub struct LoadedImage<R> {
    /// Lowest virtual address of the image as linked
    pub requested_base: u64,
    /// Address the image was actually placed at
    pub actual_base: u64,
    /// Size of the address window in bytes
    pub size: u64,
    /// Rebased entry point
    pub entry: u64,
    /// Rebased address of the dynamic segment, if the image has one
    pub dynamic: Option<u64>,
    /// Memory holding the image, owned by the caller
    pub region: R,
}

impl<R: ImageRegion> LoadedImage<R> {
    /// Difference between where the image was placed and where it was linked.
    pub fn load_offset(&self) -> u64 {
        self.actual_base.wrapping_sub(self.requested_base)
    }

    /// Whether the image was placed somewhere other than its linked address.
    pub fn is_relocated(&self) -> bool {
        self.actual_base != self.requested_base
    }

    /// The loaded image's bytes, starting at `actual_base`.
    pub fn bytes(&self) -> &[u8] {
        &self.region.as_slice()[..self.size as usize]
    }

    /// `len` bytes at the rebased address `address`.
    pub fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(address.checked_sub(self.actual_base)?).ok()?;
        self.bytes().get(start..start.checked_add(len)?)
    }

    /// `len` bytes at the linked (not rebased) virtual address `vaddr`.
    pub fn read_linked(&self, vaddr: u64, len: usize) -> Option<&[u8]> {
        self.read(vaddr.wrapping_add(self.load_offset()), len)
    }

    /// Hand the region back to the caller.
    pub fn into_region(self) -> R {
        self.region
    }
}

/// Address window `[min, max)` covered by the `PT_LOAD` segments.
pub fn load_window(programs: &[ProgramEntry]) -> Result<Option<(u64, u64)>> {
    let mut window: Option<(u64, u64)> = None;

    for program in programs.iter().filter(|program| program.is_loadable()) {
        if program.filesz > program.memsz {
            log::error!(
                "ELF file invalid (p_filesz = {:#x} > p_memsz = {:#x})",
                program.filesz,
                program.memsz
            );
            return Err(ElfError::SegmentSizeMismatch {
                vaddr: program.vaddr,
                filesz: program.filesz,
                memsz: program.memsz,
            });
        }

        let (low, high) = program.virtual_range().ok_or(ElfError::ArithmeticOverflow)?;
        window = Some(match window {
            Some((min, max)) => (min.min(low), max.max(high)),
            None => (low, high),
        });
    }

    Ok(window)
}

/// Alignment to request for an image: the largest power-of-two `p_align` of
/// its `PT_LOAD` segments, but at least [`MIN_IMAGE_ALIGNMENT`].
pub fn load_alignment(programs: &[ProgramEntry]) -> usize {
    programs
        .iter()
        .filter(|program| program.is_loadable() && program.align.is_power_of_two())
        .filter_map(|program| usize::try_from(program.align).ok())
        .fold(MIN_IMAGE_ALIGNMENT, usize::max)
}

impl<S: Read + Seek> ElfFile<S> {
    /// Load the image's `PT_LOAD` segments into memory from `allocator`.
    ///
    /// Re-reads the program header table first. The rebased dynamic address
    /// comes from the first `PT_DYNAMIC` entry, unlike
    /// [`read_dynamic`](Self::read_dynamic) which parses the last. On failure
    /// no image is returned; any region already obtained is dropped.
    pub fn load<A: ImageAllocator>(&mut self, allocator: &mut A) -> Result<LoadedImage<A::Region>> {
        self.read_programs()?;

        let Some((addr_min, addr_max)) = load_window(&self.programs)? else {
            log::error!("ELF file has no loadable segments");
            return Err(ElfError::NoLoadableSegments);
        };
        let size = addr_max - addr_min;
        let alignment = load_alignment(&self.programs);

        let mut region = usize::try_from(size)
            .ok()
            .and_then(|len| allocator.allocate(addr_min, len, alignment))
            .filter(|region| region.len() as u64 >= size)
            .ok_or_else(|| {
                log::error!("Unable to allocate {} bytes for loading", size);
                ElfError::AllocationFailed { size }
            })?;

        let actual_base = region.base();
        let offset = actual_base.wrapping_sub(addr_min);
        let entry = self.header.entry.wrapping_add(offset);
        log::debug!(
            "image {:#x}..{:#x} placed at {:#x}, entry {:#x}",
            addr_min,
            addr_max,
            actual_base,
            entry
        );

        let memory = region.as_mut_slice();
        for program in self.programs.iter().filter(|program| program.is_loadable()) {
            // In range: load_window checked filesz <= memsz and vaddr + memsz <= addr_max.
            let start = (program.vaddr - addr_min) as usize;
            let file_end = start + program.filesz as usize;
            let mem_end = start + program.memsz as usize;

            read_at(&mut self.source, program.offset, &mut memory[start..file_end])?;
            memory[file_end..mem_end].fill(0);

            log::debug!(
                "segment {:#x} bytes at {:#x} {}",
                program.memsz,
                program.vaddr.wrapping_add(offset),
                program.flags.permissions()
            );
        }

        let dynamic = match self
            .programs
            .iter()
            .find(|program| program.segment_type == ProgramType::Dynamic)
        {
            Some(segment) => {
                let inside = segment
                    .virtual_range()
                    .is_some_and(|(low, high)| low >= addr_min && high <= addr_max);
                if !inside {
                    log::error!("Dynamic segment does not fall within loaded memory");
                    return Err(ElfError::DynamicOutsideImage {
                        vaddr: segment.vaddr,
                        memsz: segment.memsz,
                    });
                }
                Some(segment.vaddr.wrapping_add(offset))
            }
            None => None,
        };

        Ok(LoadedImage {
            requested_base: addr_min,
            actual_base,
            size,
            entry,
            dynamic,
            region,
        })
    }
}
