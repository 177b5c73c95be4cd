#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod descriptor;
pub mod errors;
pub mod format;
pub mod memory;
pub mod readback;
pub mod settings;
pub mod store;

pub use backend::{SurfaceBackend, SurfaceInfo};
pub use descriptor::{MEMORY_TAG_SAMPLE_COUNT, MemoryTagSample, SurfaceDescriptor};
pub use errors::{Result, StoreError};
pub use format::{
    AntialiasMode, ColorFormat, DepthFormat, MrtLayout, SurfaceFormat, rtt_indexes,
};
pub use memory::GuestMemory;
pub use readback::{
    PackMode, download_color_surface, download_depth_surface, download_stencil_surface,
};
pub use settings::StoreSettings;
pub use store::{
    AddressRange, COLOR_TARGET_SLOTS, MemoryTreeBlock, MemoryTreeRecord, StoredSurface,
    SurfaceOverlap, SurfaceStore,
};
