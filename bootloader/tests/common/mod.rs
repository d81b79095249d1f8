//! Common test utilities: a fake host address space, a recording CPU and
//! machine, and helpers to build plans without real hardware.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use linboot_bootloader::boot::atags::{self, Tag};
use linboot_bootloader::{
    GlobalScratch, PlanBuilder, Platform, PreloadPackage, ScratchAllocator,
};
use linboot_core::{PhysAddr, VirtAddr, PAGE_SIZE};
use linboot_hwinit::{
    AddressSpace, CacheFlavor, Clock, CodeRange, Cpu, Machine, PlatformId, RamRegion,
    ShutdownError,
};

pub const RAM_BASE: u32 = 0x1000_0000;
pub const RAM_SIZE: u32 = 128 * 1024 * 1024;

/// Fake scratch pages start here and grow down.
pub const SAFE_TOP: u32 = RAM_BASE + 0x0100_0000;

pub const TRAMPOLINE_VIRT: usize = 0x0004_0000;
pub const TRAMPOLINE_PHYS: u32 = RAM_BASE + 0x0200_0040;
pub const TABLE_PHYS: u32 = RAM_BASE + 0x4000;
pub const RESUME_PHYS: u32 = 0xa004_0000;

// ═══════════════════════════════════════════════════════════════════════════
// JOURNAL
// ═══════════════════════════════════════════════════════════════════════════

/// Hardware calls in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    DisableIrq,
    EnableIrq,
    TouchPages,
    Trampoline {
        phys: PhysAddr,
        table: VirtAddr,
        entry: PhysAddr,
    },
    PreShutdown,
    HardwareShutdown,
    FlushCache,
    Sleep(u32),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: Event) -> bool {
        self.events().contains(&event)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESS SPACE
// ═══════════════════════════════════════════════════════════════════════════

/// Hands out synthetic physical addresses to host pages on first lookup.
pub struct FakeSpace {
    ram: RamRegion,
    assigned: RefCell<BTreeMap<usize, u32>>,
    scripted: RefCell<Vec<u32>>,
    next_phys: Cell<u32>,
    map_limit: Cell<Option<usize>>,
    windows: RefCell<Vec<(u32, usize, usize)>>,
}

impl FakeSpace {
    /// Pages get descending addresses starting at `top`.
    pub fn descending_from(top: u32) -> Self {
        let space = Self {
            ram: RamRegion::new(PhysAddr::new(RAM_BASE), RAM_SIZE),
            assigned: RefCell::new(BTreeMap::new()),
            scripted: RefCell::new(Vec::new()),
            next_phys: Cell::new(top),
            map_limit: Cell::new(None),
            windows: RefCell::new(Vec::new()),
        };
        space.pin(VirtAddr::new(TRAMPOLINE_VIRT), PhysAddr::new(TRAMPOLINE_PHYS));
        space
    }

    pub fn new() -> Self {
        Self::descending_from(SAFE_TOP)
    }

    /// Pages get these addresses, in lookup order.
    pub fn with_pages(pages: Vec<u32>) -> Self {
        let space = Self::new();
        *space.scripted.borrow_mut() = pages.into_iter().rev().collect();
        space
    }

    /// Fail lookups once `count` scratch pages have been mapped.
    pub fn limit_mapped(self, count: usize) -> Self {
        self.map_limit.set(Some(count));
        self
    }

    /// Fix the physical address of a virtual page.
    pub fn pin(&self, virt: VirtAddr, phys: PhysAddr) {
        self.assigned
            .borrow_mut()
            .insert(virt.page_number(), phys.page_align_down().as_u32());
    }

    /// Make `len` bytes at `virt` reachable through `phys_to_virt(phys)`.
    pub fn map_window(&self, phys: PhysAddr, virt: VirtAddr, len: usize) {
        self.windows.borrow_mut().push((phys.as_u32(), virt.as_usize(), len));
    }

    fn next_page(&self) -> u32 {
        if let Some(phys) = self.scripted.borrow_mut().pop() {
            return phys;
        }
        let phys = self.next_phys.get();
        self.next_phys.set(phys.wrapping_sub(PAGE_SIZE as u32));
        phys
    }
}

impl AddressSpace for FakeSpace {
    fn ram(&self) -> RamRegion {
        self.ram
    }

    fn virt_to_phys(&self, virt: VirtAddr) -> Option<PhysAddr> {
        let page = virt.page_number();
        let offset = (virt.as_usize() % PAGE_SIZE) as u32;
        let mut assigned = self.assigned.borrow_mut();
        if let Some(&phys) = assigned.get(&page) {
            return Some(PhysAddr::new(phys + offset));
        }
        if let Some(limit) = self.map_limit.get() {
            // The pinned trampoline page is not scratch
            if assigned.len() > limit {
                return None;
            }
        }
        let phys = self.next_page();
        assigned.insert(page, phys);
        Some(PhysAddr::new(phys + offset))
    }

    fn phys_to_virt(&self, phys: PhysAddr) -> Option<VirtAddr> {
        let phys = phys.as_u32();
        self.windows
            .borrow()
            .iter()
            .find(|&&(base, _, len)| phys >= base && ((phys - base) as usize) < len)
            .map(|&(base, virt, _)| VirtAddr::new(virt + (phys - base) as usize))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CPU / MACHINE / CLOCK
// ═══════════════════════════════════════════════════════════════════════════

pub struct RecordingCpu {
    journal: Journal,
    irq_enabled: Cell<bool>,
    routine: CodeRange,
    table: PhysAddr,
}

impl RecordingCpu {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            irq_enabled: Cell::new(true),
            routine: CodeRange::new(
                VirtAddr::new(TRAMPOLINE_VIRT + 0x40),
                VirtAddr::new(TRAMPOLINE_VIRT + 0xc0),
            ),
            table: PhysAddr::new(TABLE_PHYS),
        }
    }

    pub fn with_routine(mut self, start: usize, end: usize) -> Self {
        self.routine = CodeRange::new(VirtAddr::new(start), VirtAddr::new(end));
        self
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.irq_enabled.get()
    }
}

impl Cpu for RecordingCpu {
    fn disable_interrupts(&self) -> bool {
        self.journal.push(Event::DisableIrq);
        self.irq_enabled.replace(false)
    }

    fn enable_interrupts(&self) {
        self.journal.push(Event::EnableIrq);
        self.irq_enabled.set(true);
    }

    fn translation_table(&self) -> PhysAddr {
        self.table
    }

    fn touch_app_pages(&self) {
        self.journal.push(Event::TouchPages);
    }

    fn trampoline_routine(&self) -> CodeRange {
        self.routine
    }

    unsafe fn mmu_trampoline(&self, phys: PhysAddr, table: VirtAddr, entry: PhysAddr) {
        self.journal.push(Event::Trampoline { phys, table, entry });
    }
}

pub struct ScriptedMachine {
    journal: Journal,
    pub machine_type: u32,
    pub pre_shutdown: Result<(), ShutdownError>,
    pub framebuffer_active: bool,
}

impl ScriptedMachine {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            machine_type: 0,
            pre_shutdown: Ok(()),
            framebuffer_active: true,
        }
    }
}

impl Machine for ScriptedMachine {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn machine_type(&self) -> u32 {
        self.machine_type
    }

    fn ram_base(&self) -> PhysAddr {
        PhysAddr::new(RAM_BASE)
    }

    fn default_ram_size(&self) -> u32 {
        RAM_SIZE
    }

    fn cache_flavor(&self) -> CacheFlavor {
        CacheFlavor::Arm6
    }

    fn flush_cache(&self) {
        self.journal.push(Event::FlushCache);
    }

    fn pre_hardware_shutdown(&self) -> Result<(), ShutdownError> {
        self.journal.push(Event::PreShutdown);
        self.pre_shutdown
    }

    fn hardware_shutdown(&self) {
        self.journal.push(Event::HardwareShutdown);
    }

    fn framebuffer_active_during_boot(&self) -> bool {
        self.framebuffer_active
    }

    fn detect(&self, _id: &PlatformId<'_>) -> bool {
        false
    }
}

/// Records sleeps, and what the resume vector held while asleep.
pub struct FakeClock {
    journal: Journal,
    probe: Cell<Option<*const u32>>,
    seen: Cell<Option<[u32; 2]>>,
}

impl FakeClock {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            probe: Cell::new(None),
            seen: Cell::new(None),
        }
    }

    pub fn watch(&self, words: *const u32) {
        self.probe.set(Some(words));
    }

    pub fn seen(&self) -> Option<[u32; 2]> {
        self.seen.get()
    }
}

impl Clock for FakeClock {
    fn sleep_ms(&self, ms: u32) {
        self.journal.push(Event::Sleep(ms));
        if let Some(words) = self.probe.get() {
            // SAFETY: tests point the probe at a live two-word buffer.
            let seen = unsafe { [words.read_volatile(), words.add(1).read_volatile()] };
            self.seen.set(Some(seen));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ALLOCATION
// ═══════════════════════════════════════════════════════════════════════════

/// Global allocator that counts live blocks.
#[derive(Default)]
pub struct CountingScratch {
    allocations: Cell<usize>,
    live: Cell<usize>,
}

impl CountingScratch {
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }
}

impl ScratchAllocator for CountingScratch {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = GlobalScratch.allocate_zeroed(size)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live.set(self.live.get() + 1);
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        self.live.set(self.live.get() - 1);
        GlobalScratch.release(ptr, size);
    }
}

pub struct NoMemory;

impl ScratchAllocator for NoMemory {
    fn allocate_zeroed(&self, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn release(&self, _ptr: NonNull<u8>, _size: usize) {}
}

// ═══════════════════════════════════════════════════════════════════════════
// PRELOADER / FIXTURE
// ═══════════════════════════════════════════════════════════════════════════

pub const ENTRY_OFFSET: usize = 0x40;
pub const HANDOFF_OFFSET: usize = 0x80;

pub static PRELOAD_CODE: [u8; 256] = [0xa5; 256];

pub fn fake_package() -> PreloadPackage<'static> {
    PreloadPackage::new(&PRELOAD_CODE, ENTRY_OFFSET, HANDOFF_OFFSET)
}

/// Everything a boot attempt needs, with recording fakes.
pub struct Rig {
    pub journal: Journal,
    pub space: FakeSpace,
    pub cpu: RecordingCpu,
    pub machine: ScriptedMachine,
    pub clock: FakeClock,
    pub scratch: CountingScratch,
    /// Backing for the translation table window
    pub table: Vec<u32>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_space(FakeSpace::new())
    }

    pub fn with_space(space: FakeSpace) -> Self {
        let journal = Journal::default();
        let table = vec![0u32; 4096];
        space.map_window(
            PhysAddr::new(TABLE_PHYS),
            VirtAddr::from_ptr(table.as_ptr()),
            table.len() * 4,
        );
        Self {
            cpu: RecordingCpu::new(&journal),
            machine: ScriptedMachine::new(&journal),
            clock: FakeClock::new(&journal),
            scratch: CountingScratch::default(),
            journal,
            space,
            table,
        }
    }

    pub fn platform(&self) -> Platform<'_> {
        Platform::new(&self.space, &self.cpu, &self.machine, &self.clock)
    }

    pub fn builder<'a>(&'a self, cmdline: &'a str) -> PlanBuilder<'a> {
        PlanBuilder::new(self.platform(), &self.scratch, fake_package()).cmdline(cmdline)
    }

    pub fn table_virt(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.table.as_ptr())
    }
}

/// Decode a tag area, panicking on malformed tags.
pub fn tags(bytes: &[u8]) -> Vec<Tag<'_>> {
    atags::decode(bytes).map(|t| t.unwrap()).collect()
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
