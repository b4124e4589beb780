//! Render surface abstraction and a headless in-memory implementation.
//!
//! The windowing core never creates display elements itself. It asks a
//! [`RenderSurface`] for slots, attaches and detaches them per [`Pane`], and
//! drives each [`VisualSlot`] only through `set_position` / `set_content`.
//! Measuring the visible area and mirroring header scroll offsets also go
//! through the surface, so a DOM, GPU or terminal backend plugs in here.

pub mod memory;
pub use memory::{MemorySlot, MemorySurface, SlotId};

/// The three containers a grid renders into. Row headers track the body on the
/// vertical axis, column headers on the horizontal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    Body,
    RowHeader,
    ColumnHeader,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Body => "body",
            Pane::RowHeader => "row_header",
            Pane::ColumnHeader => "column_header",
        }
    }
}

/// Visible body area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A reusable rendering unit. Bound to exactly one logical cell (or header) at
/// a time; rebinding is just a new position plus new content.
pub trait VisualSlot {
    fn set_position(&mut self, x: u64, y: u64);
    fn set_content(&mut self, label: &str);
}

pub trait RenderSurface {
    type Slot: VisualSlot;

    /// Current size of the visible body area.
    fn measure(&self) -> SurfaceSize;
    /// Acquire a fresh, detached slot for `pane`.
    fn create_slot(&mut self, pane: Pane) -> Self::Slot;
    fn attach(&mut self, pane: Pane, slot: &Self::Slot);
    fn detach(&mut self, pane: Pane, slot: &Self::Slot);
    /// Mirror a body scroll offset onto a header pane (`left` for column
    /// headers, `top` for row headers).
    fn mirror_header_scroll(&mut self, pane: Pane, offset: f64);
    /// Size the scrollable content of `pane` so native scrollbars span the
    /// whole logical grid.
    fn set_content_extent(&mut self, pane: Pane, width: u64, height: u64);
}
