//! Memory for loaded images.
//!
//! The loader never owns the memory it writes into. It asks an
//! [`ImageAllocator`] for a region covering the image's address window and hands
//! that region back to the caller inside the [`LoadedImage`](crate::LoadedImage).
//! The allocator may place the region somewhere other than the requested base;
//! the loader rebases every derived address accordingly.

use alloc::vec::Vec;

/// A block of memory holding one loaded image.
pub trait ImageRegion {
    /// Address the first byte of the region is mapped at.
    fn base(&self) -> u64;

    /// The region's bytes.
    fn as_slice(&self) -> &[u8];

    /// The region's bytes, writable.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Size of the region in bytes.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Check if the region is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of memory for loaded images.
///
/// `allocate` is called once per load with the lowest virtual address of the
/// image, the size of its address window, and the required alignment. It
/// returns `None` if the request cannot be satisfied. Regions returned by
/// separate calls must not overlap.
pub trait ImageAllocator {
    /// Region type handed back to the caller.
    type Region: ImageRegion;

    /// Provide at least `size` bytes, preferably mapped at `requested_base`.
    fn allocate(&mut self, requested_base: u64, size: usize, alignment: usize) -> Option<Self::Region>;
}

/// Align an address up to the required boundary. `alignment` must be a power of two.
pub(crate) fn align_up(address: usize, alignment: usize) -> Option<usize> {
    let mask = alignment.checked_sub(1)?;
    Some(address.checked_add(mask)? & !mask)
}

/// Region carved out of a caller-provided buffer.
#[derive(Debug)]
pub struct SliceRegion<'a> {
    base: u64,
    bytes: &'a mut [u8],
}

impl ImageRegion for SliceRegion<'_> {
    fn base(&self) -> u64 {
        self.base
    }

    fn as_slice(&self) -> &[u8] {
        self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// Bump allocator over a caller-provided buffer.
///
/// Regions are placed wherever the buffer has room, so images are always
/// rebased to the buffer's real address. Memory is never reclaimed.
#[derive(Debug)]
pub struct SliceAllocator<'a> {
    remaining: &'a mut [u8],
}

impl<'a> SliceAllocator<'a> {
    /// Create a new allocator handing out pieces of `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { remaining: buffer }
    }

    /// Bytes still available, ignoring alignment padding.
    pub fn available(&self) -> usize {
        self.remaining.len()
    }
}

impl<'a> ImageAllocator for SliceAllocator<'a> {
    type Region = SliceRegion<'a>;

    fn allocate(&mut self, _requested_base: u64, size: usize, alignment: usize) -> Option<SliceRegion<'a>> {
        let start = self.remaining.as_ptr() as usize;
        let padding = align_up(start, alignment)? - start;
        if padding.checked_add(size)? > self.remaining.len() {
            return None;
        }

        let buffer = core::mem::take(&mut self.remaining);
        let (region, rest) = buffer[padding..].split_at_mut(size);
        self.remaining = rest;

        Some(SliceRegion {
            base: region.as_ptr() as u64,
            bytes: region,
        })
    }
}

/// Heap-backed region with a nominal base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapRegion {
    base: u64,
    alignment: usize,
    bytes: Vec<u8>,
}

impl HeapRegion {
    /// Alignment the region was requested with.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Take the region's bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl ImageRegion for HeapRegion {
    fn base(&self) -> u64 {
        self.base
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Allocator backed by the global heap.
///
/// The returned region's base is a nominal address, not where the bytes live:
/// the requested base by default, or a fixed base set with [`at`](Self::at).
/// This suits staging an image for later copying, and exercising relocated
/// placement.
#[derive(Debug, Clone, Default)]
pub struct VecAllocator {
    base: Option<u64>,
    limit: Option<usize>,
}

impl VecAllocator {
    /// Allocator that places images at their requested base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that places every image at `base`.
    pub fn at(base: u64) -> Self {
        Self {
            base: Some(base),
            limit: None,
        }
    }

    /// Refuse requests larger than `limit` bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl ImageAllocator for VecAllocator {
    type Region = HeapRegion;

    fn allocate(&mut self, requested_base: u64, size: usize, alignment: usize) -> Option<HeapRegion> {
        if self.limit.is_some_and(|limit| size > limit) {
            return None;
        }

        let base = self.base.unwrap_or(requested_base);
        if align_up(base as usize, alignment)? as u64 != base {
            log::warn!("base {:#x} is not aligned to {:#x}", base, alignment);
        }

        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(size).is_err() {
            log::warn!("heap cannot provide {:#x} bytes", size);
            return None;
        }
        bytes.resize(size, 0);

        Some(HeapRegion { base, alignment, bytes })
    }
}
