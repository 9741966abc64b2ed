mod common;

use common::{PanicOnFault, RecordingMapper, TestPmm, bytes, fault_message, irq, window};
use kernel_memory_addresses::{FRAME_SIZE, PhysicalAddress};
use kernel_pmm::{MemoryRegion, MemoryRegionTable, PhysicalMemoryManager, PmmConfig, RegionKind};

/// 256 MiB ceiling: two bitmap pages.
const CONFIG: PmmConfig = PmmConfig::new(65_536);
const CEILING_WORDS: usize = 1024;

const MIB: u64 = 1 << 20;
const BOOT_CURSOR: PhysicalAddress = PhysicalAddress::new(2 * MIB);

const SMALL_MACHINE: [MemoryRegion; 4] = [
    MemoryRegion::available(0, 0x9_F000),
    MemoryRegion::new(0x9_F000, 0x6_1000, RegionKind::Reserved),
    MemoryRegion::available(MIB, 63 * MIB),
    MemoryRegion::new(0xFEC0_0000, 0x1000, RegionKind::Reserved),
];

const EXACT_MACHINE: [MemoryRegion; 2] = [
    MemoryRegion::new(0, MIB, RegionKind::Reserved),
    MemoryRegion::available(MIB, 255 * MIB),
];

/// 1 GiB; the second region straddles the 256 MiB ceiling.
const LARGE_MACHINE: [MemoryRegion; 3] = [
    MemoryRegion::available(0, 0x9_F000),
    MemoryRegion::new(0xE_0000, 0x2_0000, RegionKind::Reserved),
    MemoryRegion::available(MIB, 1023 * MIB),
];

fn bootstrap(regions: &[MemoryRegion], window_words: usize) -> TestPmm {
    PhysicalMemoryManager::bootstrap(
        CONFIG,
        window(window_words),
        &mut MemoryRegionTable::new(regions),
        BOOT_CURSOR,
        irq(),
        PanicOnFault,
    )
}

#[test]
fn phase_one_on_a_small_machine() {
    let pmm = bootstrap(&SMALL_MACHINE, CEILING_WORDS);
    let cb = pmm.control();

    assert_eq!(cb.sys_frames, 16_384);
    assert_eq!(cb.cur_frames, 16_384);
    assert_eq!(cb.bm_frames, 1);
    assert_eq!(cb.max_index, 512);
    assert_eq!(cb.search_idx, 8, "boot cursor 2 MiB lands in word 8");

    // Everything from the boot cursor to 64 MiB is free, nothing below.
    assert_eq!(cb.free_frames, 16_384 - 512);
    assert!(!pmm.is_free(PhysicalAddress::new(0x1000)));
    assert!(!pmm.is_free(PhysicalAddress::new(2 * MIB - FRAME_SIZE)));
    assert!(pmm.is_free(BOOT_CURSOR));
    assert!(pmm.verify_accounting());
}

#[test]
fn phase_one_first_allocation_follows_the_boot_cursor() {
    let mut pmm = bootstrap(&SMALL_MACHINE, CEILING_WORDS);
    assert_eq!(
        pmm.allocate().map(|f| f.start_address()),
        Some(BOOT_CURSOR)
    );
}

#[test]
fn phase_one_caps_at_the_ceiling() {
    let pmm = bootstrap(&LARGE_MACHINE, 4096);
    let cb = pmm.control();

    assert_eq!(cb.sys_frames, 262_144);
    assert_eq!(cb.cur_frames, 65_536);
    assert_eq!(cb.bm_frames, 2);
    assert_eq!(cb.max_index, CEILING_WORDS);
    assert_eq!(cb.free_frames, 65_536 - 512);
    assert!(!pmm.is_free(PhysicalAddress::new(bytes(65_536))));
    assert!(pmm.verify_accounting());
}

#[test]
fn phase_one_truncates_a_partial_last_frame() {
    let regions = [MemoryRegion::available(MIB, 63 * MIB + 0x800)];
    let pmm = bootstrap(&regions, CEILING_WORDS);
    assert_eq!(pmm.control().sys_frames, 16_384);
    assert_eq!(pmm.free_frames(), 16_384 - 512);
}

#[test]
fn boot_cursor_at_the_end_of_memory() {
    let regions = [MemoryRegion::available(0, 128 * MIB)];
    let pmm = PhysicalMemoryManager::bootstrap(
        CONFIG,
        window(CEILING_WORDS),
        &mut MemoryRegionTable::new(&regions),
        PhysicalAddress::new(128 * MIB),
        irq(),
        PanicOnFault,
    );

    assert_eq!(pmm.control().max_index, 512);
    assert_eq!(pmm.control().search_idx, 0);
    assert_eq!(pmm.free_frames(), 0);
}

#[test]
fn phase_one_faults() {
    let message = fault_message(|| {
        let _ = bootstrap(&[], CEILING_WORDS);
    });
    assert!(message.contains("NoMemory"), "{message}");

    let reserved_only = [MemoryRegion::new(0, 64 * MIB, RegionKind::Reserved)];
    let message = fault_message(|| {
        let _ = bootstrap(&reserved_only, CEILING_WORDS);
    });
    assert!(message.contains("NoMemory"), "{message}");

    let message = fault_message(|| {
        let _ = bootstrap(&SMALL_MACHINE, CEILING_WORDS / 2);
    });
    assert!(
        message.contains("WindowTooSmall { required: 1024, capacity: 512 }"),
        "{message}"
    );
}

#[test]
fn phase_two_exact() {
    let mut pmm = bootstrap(&EXACT_MACHINE, CEILING_WORDS);
    let before = pmm.control();
    assert_eq!(before.sys_frames, 65_536);

    let mut mapper = RecordingMapper::default();
    pmm.extend(&mut MemoryRegionTable::new(&EXACT_MACHINE), &mut mapper);

    assert!(mapper.mapped.is_empty());
    assert!(mapper.unmapped.is_empty());
    assert_eq!(pmm.control(), before);
}

#[test]
fn phase_two_releases_spare_bitmap_pages() {
    let mut pmm = bootstrap(&SMALL_MACHINE, CEILING_WORDS);

    // The frame that backed the second pre-mapped bitmap page.
    let backing = pmm.allocate().unwrap();
    let free_before = pmm.free_frames();

    let mut mapper = RecordingMapper::backed_by([backing]);
    pmm.extend(&mut MemoryRegionTable::new(&SMALL_MACHINE), &mut mapper);

    let base = pmm.control().bitmap;
    assert_eq!(mapper.unmapped, [(base + FRAME_SIZE, 1)]);
    assert!(mapper.mapped.is_empty());
    assert!(pmm.is_free(backing.start_address()));
    assert_eq!(pmm.free_frames(), free_before + 1);
    assert_eq!(pmm.control().cur_frames, 16_384);
    assert!(pmm.verify_accounting());
}

#[test]
fn phase_two_grows_to_installed_memory() {
    let mut pmm = bootstrap(&LARGE_MACHINE, 4096);
    let free_before = pmm.free_frames();

    let mut mapper = RecordingMapper::default();
    pmm.extend(&mut MemoryRegionTable::new(&LARGE_MACHINE), &mut mapper);

    let cb = pmm.control();
    assert_eq!(cb.cur_frames, 262_144);
    assert_eq!(cb.bm_frames, 8);
    assert_eq!(cb.max_index, 4096);
    assert_eq!(mapper.mapped, [(cb.bitmap + 2 * FRAME_SIZE, 6)]);

    // Backing frames came out of the phase-1 range.
    assert_eq!(mapper.backing.len(), 6);
    assert!(mapper.backing.iter().all(|f| f.index() < 65_536));

    assert_eq!(cb.free_frames, free_before - 6 + (262_144 - 65_536));
    assert!(pmm.is_free(PhysicalAddress::new(bytes(65_536))));
    assert!(pmm.is_free(PhysicalAddress::new(bytes(262_143))));
    assert!(pmm.verify_accounting());

    let top = pmm
        .allocate_below(PhysicalAddress::new(u64::MAX))
        .unwrap();
    assert!(top.index() < 262_144);
}

#[test]
fn phase_two_runs_once() {
    let mut pmm = bootstrap(&EXACT_MACHINE, CEILING_WORDS);
    let mut map = MemoryRegionTable::new(&EXACT_MACHINE);
    pmm.extend(&mut map, &mut RecordingMapper::default());

    let message = fault_message(|| pmm.extend(&mut map, &mut RecordingMapper::default()));
    assert!(message.contains("AlreadyExtended"), "{message}");
}

#[test]
fn phase_two_on_a_bare_instance_is_rejected() {
    let mut pmm = common::pmm(128);
    let message = fault_message(|| {
        pmm.extend(
            &mut MemoryRegionTable::new(&SMALL_MACHINE),
            &mut RecordingMapper::default(),
        );
    });
    assert!(message.contains("AlreadyExtended"), "{message}");
}

#[test]
fn phase_two_mapper_failure_is_fatal() {
    let mut pmm = bootstrap(&LARGE_MACHINE, 4096);
    let mut mapper = RecordingMapper {
        fail_after: Some(2),
        ..RecordingMapper::default()
    };

    let message = fault_message(|| {
        pmm.extend(&mut MemoryRegionTable::new(&LARGE_MACHINE), &mut mapper);
    });
    assert!(message.contains("BitmapMapFailed(OutOfMemory)"), "{message}");
}

#[test]
fn phase_two_needs_room_in_the_window() {
    let mut pmm = bootstrap(&LARGE_MACHINE, CEILING_WORDS);
    let message = fault_message(|| {
        pmm.extend(
            &mut MemoryRegionTable::new(&LARGE_MACHINE),
            &mut RecordingMapper::default(),
        );
    });
    assert!(
        message.contains("WindowTooSmall { required: 4096, capacity: 1024 }"),
        "{message}"
    );
}
