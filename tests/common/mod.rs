//! Shared test fixtures: an instrumented mock backend and a sparse guest
//! memory window.
#![allow(dead_code)]

use std::collections::HashMap;

use rsx_surface_store::{
    AntialiasMode, ColorFormat, DepthFormat, GuestMemory, MrtLayout, SurfaceBackend, SurfaceFormat,
    SurfaceInfo, SurfaceStore,
};

/// Copyable borrow token handed out by the mock backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle(pub u32);

/// Owned mock surface. Shape fields are fixed at creation; the mutable
/// pitch lives in the backend's info table so `invalidate_surface_contents`
/// can rebase it.
pub struct MockStorage {
    pub id: u32,
    pub format: SurfaceFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Default)]
pub struct MockContext;

pub struct MockDownload {
    pub data: Vec<u8>,
}

/// Everything the backend was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created {
        id: u32,
        address: u32,
        prior: Option<u32>,
    },
    Invalidated {
        id: u32,
    },
    Persisted {
        id: u32,
    },
    PrepareRttDraw {
        id: u32,
    },
    PrepareRttSample {
        id: u32,
    },
    PrepareDsDraw {
        id: u32,
    },
    PrepareDsSample {
        id: u32,
    },
    InvalidateContents {
        id: u32,
        source: Option<u32>,
        address: u32,
        pitch: u32,
    },
    ReadBarrier {
        id: u32,
    },
}

#[derive(Default)]
pub struct MockBackend {
    next_id: u32,
    pub infos: HashMap<u32, SurfaceInfo>,
    pub events: Vec<Event>,
    /// Pitched payload served for downloads, keyed by handle id.
    pub download_data: HashMap<u32, Vec<u8>>,
    /// Force `map_downloaded_buffer` to fail.
    pub fail_map: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn created_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, Event::Created { .. }))
            .count()
    }
}

impl SurfaceBackend for MockBackend {
    type SurfaceStorage = MockStorage;
    type SurfaceHandle = MockHandle;
    type CommandContext = MockContext;
    type DownloadObject = MockDownload;

    fn get(storage: &MockStorage) -> MockHandle {
        MockHandle(storage.id)
    }

    fn create_new_surface(
        &mut self,
        _ctx: &mut MockContext,
        address: u32,
        format: SurfaceFormat,
        width: u32,
        height: u32,
        pitch: u32,
        _antialias: AntialiasMode,
        prior_contents: Option<MockHandle>,
    ) -> MockStorage {
        self.next_id += 1;
        let id = self.next_id;
        let bpp = format.bytes_per_pixel();
        self.infos.insert(
            id,
            SurfaceInfo {
                surface_width: width,
                surface_height: height,
                native_pitch: width * bpp,
                rsx_pitch: pitch,
                bpp,
            },
        );
        self.events.push(Event::Created {
            id,
            address,
            prior: prior_contents.map(|handle| handle.0),
        });
        MockStorage {
            id,
            format,
            width,
            height,
        }
    }

    fn rtt_has_format_width_height(
        &self,
        storage: &MockStorage,
        format: ColorFormat,
        width: u32,
        height: u32,
        lenient: bool,
    ) -> bool {
        if storage.format != SurfaceFormat::Color(format) {
            return false;
        }
        if lenient {
            storage.width >= width && storage.height >= height
        } else {
            storage.width == width && storage.height == height
        }
    }

    fn ds_has_format_width_height(
        &self,
        storage: &MockStorage,
        format: DepthFormat,
        width: u32,
        height: u32,
        lenient: bool,
    ) -> bool {
        if storage.format != SurfaceFormat::Depth(format) {
            return false;
        }
        if lenient {
            storage.width >= width && storage.height >= height
        } else {
            storage.width == width && storage.height == height
        }
    }

    fn surface_is_pitch_compatible(&self, storage: &MockStorage, pitch: u32) -> bool {
        self.infos[&storage.id].rsx_pitch == pitch
    }

    fn prepare_rtt_for_drawing(&mut self, _ctx: &mut MockContext, handle: MockHandle) {
        self.events.push(Event::PrepareRttDraw { id: handle.0 });
    }

    fn prepare_rtt_for_sampling(&mut self, _ctx: &mut MockContext, handle: MockHandle) {
        self.events.push(Event::PrepareRttSample { id: handle.0 });
    }

    fn prepare_ds_for_drawing(&mut self, _ctx: &mut MockContext, handle: MockHandle) {
        self.events.push(Event::PrepareDsDraw { id: handle.0 });
    }

    fn prepare_ds_for_sampling(&mut self, _ctx: &mut MockContext, handle: MockHandle) {
        self.events.push(Event::PrepareDsSample { id: handle.0 });
    }

    fn notify_surface_invalidated(&mut self, storage: &MockStorage) {
        self.events.push(Event::Invalidated { id: storage.id });
    }

    fn notify_surface_persist(&mut self, storage: &MockStorage) {
        self.events.push(Event::Persisted { id: storage.id });
    }

    fn invalidate_surface_contents(
        &mut self,
        _ctx: &mut MockContext,
        handle: MockHandle,
        source: Option<MockHandle>,
        address: u32,
        pitch: u32,
    ) {
        if let Some(info) = self.infos.get_mut(&handle.0) {
            info.rsx_pitch = pitch;
        }
        self.events.push(Event::InvalidateContents {
            id: handle.0,
            source: source.map(|handle| handle.0),
            address,
            pitch,
        });
    }

    fn get_surface_info(&self, handle: MockHandle) -> SurfaceInfo {
        self.infos[&handle.0]
    }

    fn surface_read_barrier(&mut self, _ctx: &mut MockContext, handle: MockHandle) {
        self.events.push(Event::ReadBarrier { id: handle.0 });
    }

    fn issue_download_command(
        &mut self,
        _ctx: &mut MockContext,
        handle: MockHandle,
        _format: ColorFormat,
        _width: u32,
        _height: u32,
    ) -> MockDownload {
        MockDownload {
            data: self.download_data.get(&handle.0).cloned().unwrap_or_default(),
        }
    }

    fn issue_depth_download_command(
        &mut self,
        _ctx: &mut MockContext,
        handle: MockHandle,
        _format: DepthFormat,
        _width: u32,
        _height: u32,
    ) -> MockDownload {
        MockDownload {
            data: self.download_data.get(&handle.0).cloned().unwrap_or_default(),
        }
    }

    fn issue_stencil_download_command(
        &mut self,
        _ctx: &mut MockContext,
        handle: MockHandle,
        _width: u32,
        _height: u32,
    ) -> MockDownload {
        MockDownload {
            data: self.download_data.get(&handle.0).cloned().unwrap_or_default(),
        }
    }

    fn map_downloaded_buffer<'a>(&mut self, object: &'a mut MockDownload) -> Option<&'a [u8]> {
        if self.fail_map {
            None
        } else {
            Some(&object.data)
        }
    }

    fn unmap_downloaded_buffer(&mut self, _object: &mut MockDownload) {}
}

/// Sparse byte-addressable guest memory; unwritten bytes read as zero.
#[derive(Default)]
pub struct SparseMemory {
    bytes: HashMap<u32, u8>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_qword(&mut self, address: u32, value: u64) {
        for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.bytes.insert(address + offset as u32, byte);
        }
    }
}

impl GuestMemory for SparseMemory {
    fn read_qword(&self, address: u32) -> u64 {
        let mut word = [0u8; 8];
        for (offset, byte) in word.iter_mut().enumerate() {
            *byte = self
                .bytes
                .get(&(address + offset as u32))
                .copied()
                .unwrap_or(0);
        }
        u64::from_le_bytes(word)
    }
}

/// Store, backend, context, and memory wired together.
pub struct Harness {
    pub store: SurfaceStore<MockBackend>,
    pub backend: MockBackend,
    pub ctx: MockContext,
    pub mem: SparseMemory,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: SurfaceStore::new(),
            backend: MockBackend::new(),
            ctx: MockContext,
            mem: SparseMemory::new(),
        }
    }

    /// Bind a single color target at slot 0, the way the S-scenarios set
    /// their stage.
    pub fn prepare_single_color(
        &mut self,
        address: u32,
        format: ColorFormat,
        width: u32,
        height: u32,
        pitch: u32,
    ) {
        self.store.prepare_render_target(
            &mut self.backend,
            &mut self.ctx,
            format,
            DepthFormat::Z24S8,
            width,
            height,
            MrtLayout::Surface0,
            AntialiasMode::Center1Sample,
            [address, 0, 0, 0],
            [pitch, 0, 0, 0],
            0,
            0,
        );
    }
}
