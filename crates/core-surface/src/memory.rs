//! Headless surface used by tests and by the `gridwin` driver.
//!
//! Slots are owned by the caller; the surface only tracks which slot ids are
//! attached to which pane, plus header scroll offsets and content extents.

use crate::{Pane, RenderSurface, SurfaceSize, VisualSlot};
use ahash::{AHashMap, AHashSet};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySlot {
    id: SlotId,
    pane: Pane,
    position: (u64, u64),
    content: String,
    /// Number of `set_content` calls, used to measure rebinding work.
    writes: u64,
}

impl MemorySlot {
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn position(&self) -> (u64, u64) {
        self.position
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl VisualSlot for MemorySlot {
    fn set_position(&mut self, x: u64, y: u64) {
        self.position = (x, y);
    }

    fn set_content(&mut self, label: &str) {
        self.content.clear();
        self.content.push_str(label);
        self.writes += 1;
    }
}

#[derive(Debug, Default)]
pub struct MemorySurface {
    size: SurfaceSize,
    next_id: u64,
    attached: AHashMap<Pane, AHashSet<SlotId>>,
    header_scroll: AHashMap<Pane, f64>,
    content_extent: AHashMap<Pane, (u64, u64)>,
    detached_total: u64,
}

impl MemorySurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Simulate the host resizing the visible area.
    pub fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    pub fn attached_count(&self, pane: Pane) -> usize {
        self.attached.get(&pane).map_or(0, |set| set.len())
    }

    pub fn is_attached(&self, pane: Pane, id: SlotId) -> bool {
        self.attached.get(&pane).is_some_and(|set| set.contains(&id))
    }

    pub fn slots_created(&self) -> u64 {
        self.next_id
    }

    pub fn slots_detached(&self) -> u64 {
        self.detached_total
    }

    pub fn header_scroll(&self, pane: Pane) -> f64 {
        self.header_scroll.get(&pane).copied().unwrap_or(0.0)
    }

    pub fn content_extent(&self, pane: Pane) -> Option<(u64, u64)> {
        self.content_extent.get(&pane).copied()
    }
}

impl RenderSurface for MemorySurface {
    type Slot = MemorySlot;

    fn measure(&self) -> SurfaceSize {
        self.size
    }

    fn create_slot(&mut self, pane: Pane) -> MemorySlot {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        MemorySlot {
            id,
            pane,
            position: (0, 0),
            content: String::new(),
            writes: 0,
        }
    }

    fn attach(&mut self, pane: Pane, slot: &MemorySlot) {
        if !self.attached.entry(pane).or_default().insert(slot.id) {
            warn!(target: "surface.memory", pane = pane.as_str(), slot = slot.id.0, "slot_already_attached");
        }
    }

    fn detach(&mut self, pane: Pane, slot: &MemorySlot) {
        let removed = self
            .attached
            .get_mut(&pane)
            .is_some_and(|set| set.remove(&slot.id));
        if removed {
            self.detached_total += 1;
        } else {
            warn!(target: "surface.memory", pane = pane.as_str(), slot = slot.id.0, "slot_not_attached");
        }
    }

    fn mirror_header_scroll(&mut self, pane: Pane, offset: f64) {
        self.header_scroll.insert(pane, offset);
    }

    fn set_content_extent(&mut self, pane: Pane, width: u64, height: u64) {
        self.content_extent.insert(pane, (width, height));
    }
}
