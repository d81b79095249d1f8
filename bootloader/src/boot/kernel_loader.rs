//! Kernel and initrd loaders
//!
//! Two producers fill the image pages of a freshly prepared [`BootPlan`]:
//!
//! - [`load_from_store`] opens named images from an [`ImageStore`] and
//!   reads them page by page.
//! - [`load_from_memory`] copies images already held in RAM.
//!
//! Both return a [`LoadedPlan`], the only thing a launcher accepts.

use alloc::boxed::Box;
use alloc::string::String;

use linboot_core::PAGE_SIZE;

use super::error::{BootError, BootResult};
use super::memory::{BootPlan, ImageKind, LoadedPlan, PlanBuilder};
use super::progress::Progress;

// ═══════════════════════════════════════════════════════════════════════════
// SOURCES
// ═══════════════════════════════════════════════════════════════════════════

/// A sequential image source with a known size.
pub trait ImageStream {
    /// Total size in bytes.
    fn size(&self) -> usize;

    /// Read into `buf`, returning the number of bytes read. 0 means end of
    /// stream or a read failure.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Opens images by name.
pub trait ImageStore {
    fn open(&self, name: &str) -> Option<Box<dyn ImageStream + '_>>;
}

/// Stream over a byte slice.
pub struct SliceStream<'d> {
    data: &'d [u8],
    pos: usize,
}

impl<'d> SliceStream<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ImageStream for SliceStream<'_> {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

#[cfg(feature = "std")]
pub use fs::FsImageStore;

#[cfg(feature = "std")]
mod fs {
    use std::fs::File;
    use std::io::Read;
    use std::path::{Path, PathBuf};

    use super::{Box, ImageStore, ImageStream};

    /// Images in a directory. Relative names resolve against `base`.
    pub struct FsImageStore {
        base: PathBuf,
    }

    impl FsImageStore {
        pub fn new(base: impl Into<PathBuf>) -> Self {
            Self { base: base.into() }
        }

        pub fn resolve(&self, name: &str) -> PathBuf {
            let path = Path::new(name);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.base.join(path)
            }
        }
    }

    struct FileStream {
        file: File,
        size: usize,
    }

    impl ImageStream for FileStream {
        fn size(&self) -> usize {
            self.size
        }

        fn read(&mut self, buf: &mut [u8]) -> usize {
            match self.file.read(buf) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("read failed: {}", e);
                    0
                }
            }
        }
    }

    impl ImageStore for FsImageStore {
        fn open(&self, name: &str) -> Option<Box<dyn ImageStream + '_>> {
            let path = self.resolve(name);
            log::info!("Opening file {}", path.display());
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    log::error!("Failed to load file {}: {}", path.display(), e);
                    return None;
                }
            };
            let size = file.metadata().ok()?.len() as usize;
            Some(Box::new(FileStream { file, size }))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE LOADER
// ═══════════════════════════════════════════════════════════════════════════

/// Fill `buf` with as many reads as it takes.
fn read_full(stream: &mut dyn ImageStream, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]);
        if n == 0 {
            break;
        }
        filled += n;
    }
    filled
}

fn read_image(
    plan: &mut BootPlan<'_>,
    kind: ImageKind,
    stream: &mut dyn ImageStream,
    size: usize,
    progress: &mut dyn Progress,
) -> BootResult<()> {
    log::debug!("Reading {} bytes...", size);
    let mut remaining = size;
    let mut index = 0;
    while remaining > 0 {
        let chunk = remaining.min(PAGE_SIZE);
        let page = plan
            .image_page_mut(kind, index)
            .ok_or(BootError::ReadError {
                expected: chunk,
                got: 0,
            })?;
        let got = read_full(stream, &mut page[..chunk]);
        if got != chunk {
            log::error!("Error reading file.  Expected {} got {}", chunk, got);
            return Err(BootError::ReadError {
                expected: chunk,
                got,
            });
        }
        progress.advance(chunk);
        remaining -= chunk;
        index += 1;
    }
    log::debug!("Read complete");
    Ok(())
}

/// Kernel and initrd streams, opened and sized before a plan exists.
pub struct OpenedImages<'s> {
    kernel: Box<dyn ImageStream + 's>,
    initrd: Option<Box<dyn ImageStream + 's>>,
}

impl<'s> OpenedImages<'s> {
    /// Open the kernel, which must exist, and the initrd, which may be
    /// skipped. An empty or absent initrd name means no initrd.
    pub fn open(store: &'s dyn ImageStore, kernel: &str, initrd: Option<&str>) -> BootResult<Self> {
        let initrd = initrd.filter(|name| !name.is_empty());
        log::info!("boot KERNEL={} INITRD={}", kernel, initrd.unwrap_or(""));

        let kernel_stream = store.open(kernel).ok_or_else(|| BootError::OpenFailed {
            name: String::from(kernel),
        })?;

        let initrd_stream = initrd.and_then(|name| {
            let stream = store.open(name);
            if stream.is_none() {
                log::warn!("initrd {} not found, booting without it", name);
            }
            stream
        });

        Ok(Self {
            kernel: kernel_stream,
            initrd: initrd_stream,
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.size()
    }

    pub fn initrd_size(&self) -> usize {
        self.initrd.as_ref().map_or(0, |s| s.size())
    }

    /// Read both images into a plan prepared for their sizes.
    pub fn read_into<'a>(
        mut self,
        mut plan: BootPlan<'a>,
        progress: &mut dyn Progress,
    ) -> BootResult<LoadedPlan<'a>> {
        let kernel_size = self.kernel_size();
        let initrd_size = self.initrd_size();

        progress.begin(kernel_size + initrd_size);
        let mut result = read_image(
            &mut plan,
            ImageKind::Kernel,
            self.kernel.as_mut(),
            kernel_size,
            progress,
        );
        if let (true, Some(initrd)) = (result.is_ok(), self.initrd.as_mut()) {
            result = read_image(&mut plan, ImageKind::Initrd, initrd.as_mut(), initrd_size, progress);
        }
        progress.finish();

        result.map(|()| plan.into_loaded())
    }
}

/// Load kernel and initrd by name.
pub fn load_from_store<'a>(
    builder: &PlanBuilder<'a>,
    store: &dyn ImageStore,
    kernel: &str,
    initrd: Option<&str>,
    machine_type: u32,
    progress: &mut dyn Progress,
) -> BootResult<LoadedPlan<'a>> {
    let images = OpenedImages::open(store, kernel, initrd)?;
    let plan = builder.prepare(images.kernel_size(), images.initrd_size(), machine_type)?;
    images.read_into(plan, progress)
}

// ═══════════════════════════════════════════════════════════════════════════
// MEMORY LOADER
// ═══════════════════════════════════════════════════════════════════════════

/// An image already in RAM.
#[derive(Debug, Clone, Copy)]
pub struct RamImage<'d> {
    data: &'d [u8],
    declared_size: usize,
}

impl<'d> RamImage<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self {
            data,
            declared_size: data.len(),
        }
    }

    /// Use the first `declared_size` bytes of `data`.
    pub fn with_size(data: &'d [u8], declared_size: usize) -> Self {
        Self {
            data,
            declared_size,
        }
    }

    pub fn size(&self) -> usize {
        self.declared_size
    }

    /// The declared bytes, or `SourceTooShort` if the buffer ends early.
    pub fn bytes(&self) -> BootResult<&'d [u8]> {
        self.data
            .get(..self.declared_size)
            .ok_or(BootError::SourceTooShort {
                declared: self.declared_size,
                available: self.data.len(),
            })
    }
}

fn copy_image(
    plan: &mut BootPlan<'_>,
    kind: ImageKind,
    src: &[u8],
    progress: &mut dyn Progress,
) -> BootResult<()> {
    for (index, chunk) in src.chunks(PAGE_SIZE).enumerate() {
        let page = plan
            .image_page_mut(kind, index)
            .ok_or(BootError::ReadError {
                expected: chunk.len(),
                got: 0,
            })?;
        page[..chunk.len()].copy_from_slice(chunk);
        progress.advance(chunk.len());
    }
    Ok(())
}

/// The plan must have been prepared for exactly `src.len()` bytes.
fn check_length(declared: usize, src: &[u8]) -> BootResult<()> {
    if src.len() != declared {
        log::error!("Image buffer holds {} bytes, plan expects {}", src.len(), declared);
        return Err(BootError::SourceTooShort {
            declared,
            available: src.len(),
        });
    }
    Ok(())
}

/// Copy image bytes into a plan prepared for their sizes.
pub fn copy_into<'a>(
    mut plan: BootPlan<'a>,
    kernel: &[u8],
    initrd: &[u8],
    progress: &mut dyn Progress,
) -> BootResult<LoadedPlan<'a>> {
    check_length(plan.kernel_size(), kernel)?;
    check_length(plan.initrd_size(), initrd)?;

    progress.begin(kernel.len() + initrd.len());
    let result = copy_image(&mut plan, ImageKind::Kernel, kernel, progress)
        .and_then(|()| copy_image(&mut plan, ImageKind::Initrd, initrd, progress));
    progress.finish();

    result.map(|()| plan.into_loaded())
}

/// Load images held in RAM. Buffer lengths are checked before anything is
/// allocated.
pub fn load_from_memory<'a>(
    builder: &PlanBuilder<'a>,
    kernel: RamImage<'_>,
    initrd: Option<RamImage<'_>>,
    machine_type: u32,
    progress: &mut dyn Progress,
) -> BootResult<LoadedPlan<'a>> {
    let kernel = kernel.bytes()?;
    let initrd = match initrd {
        Some(image) => image.bytes()?,
        None => &[],
    };

    let plan = builder.prepare(kernel.len(), initrd.len(), machine_type)?;
    copy_into(plan, kernel, initrd, progress)
}
