//! # Physical memory inventory
//!
//! The allocator learns about installed RAM through the [`MemoryMap`] trait:
//! a total limit plus a cursor over the regions reported as usable. The
//! boot-info reader implements it directly; [`MemoryRegionTable`] is a ready
//! made implementation over a slice of multiboot-style descriptors.

use kernel_memory_addresses::PhysicalAddress;

/// A physical range reported as usable RAM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FreeRegion {
    pub start: PhysicalAddress,
    /// Length in bytes.
    pub size: u64,
}

impl FreeRegion {
    #[must_use]
    pub const fn new(start: PhysicalAddress, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end address, saturating at the top of the address space.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.start.as_u64().saturating_add(self.size))
    }

    /// The part of this region inside `[floor, ceiling)`, if any.
    #[must_use]
    pub fn clip(&self, floor: PhysicalAddress, ceiling: PhysicalAddress) -> Option<Self> {
        let start = self.start.max(floor);
        let end = self.end().min(ceiling);
        (start < end).then(|| Self::new(start, end.as_u64() - start.as_u64()))
    }
}

/// Source of the physical memory layout.
pub trait MemoryMap {
    /// One past the highest usable physical address.
    fn memory_limit(&self) -> PhysicalAddress;

    /// Restarts the region cursor and returns the first usable region.
    fn first_free_region(&mut self) -> Option<FreeRegion>;

    /// Advances the region cursor.
    fn next_free_region(&mut self) -> Option<FreeRegion>;
}

/// Iterates all usable regions of `map`, restarting its cursor.
pub fn free_regions<M: MemoryMap + ?Sized>(map: &mut M) -> FreeRegions<'_, M> {
    FreeRegions { map, started: false }
}

/// Iterator returned by [`free_regions`].
pub struct FreeRegions<'m, M: MemoryMap + ?Sized> {
    map: &'m mut M,
    started: bool,
}

impl<M: MemoryMap + ?Sized> Iterator for FreeRegions<'_, M> {
    type Item = FreeRegion;

    fn next(&mut self) -> Option<FreeRegion> {
        if self.started {
            self.map.next_free_region()
        } else {
            self.started = true;
            self.map.first_free_region()
        }
    }
}

/// Region types of a multiboot memory map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum RegionKind {
    Available = 1,
    Reserved = 2,
    AcpiReclaimable = 3,
    Nvs = 4,
    BadMemory = 5,
}

impl RegionKind {
    /// Maps a raw multiboot type; unknown types are treated as reserved.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Available,
            3 => Self::AcpiReclaimable,
            4 => Self::Nvs,
            5 => Self::BadMemory,
            _ => Self::Reserved,
        }
    }
}

/// One entry of the boot memory map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: PhysicalAddress,
    pub size: u64,
    pub kind: RegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(start: u64, size: u64, kind: RegionKind) -> Self {
        Self {
            start: PhysicalAddress::new(start),
            size,
            kind,
        }
    }

    #[must_use]
    pub const fn available(start: u64, size: u64) -> Self {
        Self::new(start, size, RegionKind::Available)
    }
}

/// A [`MemoryMap`] over a slice of [`MemoryRegion`] descriptors.
///
/// The memory limit is the highest end address of any available region;
/// reserved ranges above the last usable RAM (MMIO holes, firmware) do not
/// inflate the bitmap.
pub struct MemoryRegionTable<'a> {
    regions: &'a [MemoryRegion],
    cursor: usize,
}

impl<'a> MemoryRegionTable<'a> {
    #[must_use]
    pub const fn new(regions: &'a [MemoryRegion]) -> Self {
        Self { regions, cursor: 0 }
    }

    fn available_from(&mut self, index: usize) -> Option<FreeRegion> {
        let offset = self.regions[index.min(self.regions.len())..]
            .iter()
            .position(|r| r.kind == RegionKind::Available && r.size != 0)?;
        let region = &self.regions[index + offset];
        self.cursor = index + offset + 1;
        Some(FreeRegion::new(region.start, region.size))
    }
}

impl MemoryMap for MemoryRegionTable<'_> {
    fn memory_limit(&self) -> PhysicalAddress {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Available)
            .map(|r| PhysicalAddress::new(r.start.as_u64().saturating_add(r.size)))
            .max()
            .unwrap_or_default()
    }

    fn first_free_region(&mut self) -> Option<FreeRegion> {
        self.cursor = 0;
        self.available_from(0)
    }

    fn next_free_region(&mut self) -> Option<FreeRegion> {
        self.available_from(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [MemoryRegion; 4] = [
        MemoryRegion::available(0, 0x9_F000),
        MemoryRegion::new(0x9_F000, 0x6_1000, RegionKind::Reserved),
        MemoryRegion::available(0x10_0000, 0x3F0_0000),
        MemoryRegion::new(0xFEC0_0000, 0x1000, RegionKind::Reserved),
    ];

    #[test]
    fn limit_ignores_reserved_tail() {
        let table = MemoryRegionTable::new(&TABLE);
        assert_eq!(table.memory_limit(), PhysicalAddress::new(0x400_0000));
    }

    #[test]
    fn iterates_available_regions_only() {
        let mut table = MemoryRegionTable::new(&TABLE);
        let regions: Vec<_> = free_regions(&mut table).collect();
        assert_eq!(
            regions,
            [
                FreeRegion::new(PhysicalAddress::new(0), 0x9_F000),
                FreeRegion::new(PhysicalAddress::new(0x10_0000), 0x3F0_0000),
            ]
        );

        // A second pass restarts the cursor.
        assert_eq!(free_regions(&mut table).count(), 2);
    }

    #[test]
    fn empty_table_has_no_memory() {
        let mut table = MemoryRegionTable::new(&[]);
        assert_eq!(table.memory_limit(), PhysicalAddress::zero());
        assert!(table.first_free_region().is_none());
        assert!(table.next_free_region().is_none());
    }

    #[test]
    fn clipping() {
        let r = FreeRegion::new(PhysicalAddress::new(0x1000), 0x4000);
        assert_eq!(
            r.clip(PhysicalAddress::new(0x2000), PhysicalAddress::new(0x3000)),
            Some(FreeRegion::new(PhysicalAddress::new(0x2000), 0x1000))
        );
        assert_eq!(
            r.clip(PhysicalAddress::new(0x5000), PhysicalAddress::new(0x9000)),
            None
        );
        assert_eq!(
            r.clip(PhysicalAddress::zero(), PhysicalAddress::new(u64::MAX)),
            Some(r)
        );
    }

    #[test]
    fn raw_kinds() {
        assert_eq!(RegionKind::from_raw(1), RegionKind::Available);
        assert_eq!(RegionKind::from_raw(4), RegionKind::Nvs);
        assert_eq!(RegionKind::from_raw(99), RegionKind::Reserved);
    }
}
