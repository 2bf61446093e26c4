//! Windowed rendering math.
//!
//! Given a scroll offset, a container height and an item sizing model, the
//! viewport window derives the inclusive index range a host needs to render
//! plus the total scrollable height for spacer sizing. The computation is a
//! pure synchronous function of its inputs and is cheap enough to run on
//! every scroll event; throttling is the caller's concern.

use std::collections::HashMap;

/// Inclusive index range of items the host should instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }
}

/// Extra rows accumulated past the viewport edges in dynamic mode, so a
/// slightly mis-estimated row does not pop in at the boundary.
const DYNAMIC_LOOKBACK: usize = 2;
const DYNAMIC_LOOKAHEAD: usize = 2;

/// Heights at or below zero would make the range math spin; clamp instead.
const MIN_ITEM_HEIGHT: f64 = 1.0;

/// Item height model.
pub enum ItemSizing {
    /// Every item is exactly this tall.
    Fixed(f64),
    /// Per-index measured heights, with an estimate standing in until an
    /// item has actually been measured.
    Dynamic {
        measured: HashMap<usize, f64>,
        estimate: f64,
    },
}

impl ItemSizing {
    pub fn fixed(height: f64) -> Self {
        Self::Fixed(height.max(MIN_ITEM_HEIGHT))
    }

    pub fn dynamic(estimate: f64) -> Self {
        Self::Dynamic {
            measured: HashMap::new(),
            estimate: estimate.max(MIN_ITEM_HEIGHT),
        }
    }

    fn height_of(&self, index: usize) -> f64 {
        match self {
            Self::Fixed(height) => *height,
            Self::Dynamic { measured, estimate } => {
                measured.get(&index).copied().unwrap_or(*estimate)
            }
        }
    }
}

/// Scroll viewport over a list of `item_count` items.
pub struct ViewportWindow {
    sizing: ItemSizing,
    overscan: usize,
    scroll_offset: f64,
    container_height: f64,
}

impl ViewportWindow {
    pub fn new(sizing: ItemSizing, overscan: usize, container_height: f64) -> Self {
        Self {
            sizing,
            overscan,
            scroll_offset: 0.0,
            container_height: container_height.max(0.0),
        }
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset.max(0.0);
    }

    pub fn set_container_height(&mut self, height: f64) {
        self.container_height = height.max(0.0);
    }

    /// Record a measured height for one item. Only meaningful in dynamic
    /// mode; a fixed-height window ignores measurements.
    pub fn measure(&mut self, index: usize, height: f64) {
        if let ItemSizing::Dynamic { measured, .. } = &mut self.sizing {
            measured.insert(index, height.max(MIN_ITEM_HEIGHT));
        }
    }

    /// Total scrollable height across `item_count` items, for sizing the
    /// spacer that keeps native scrollbar proportions honest.
    pub fn total_height(&self, item_count: usize) -> f64 {
        match &self.sizing {
            ItemSizing::Fixed(height) => item_count as f64 * height,
            ItemSizing::Dynamic { .. } => {
                (0..item_count).map(|i| self.sizing.height_of(i)).sum()
            }
        }
    }

    /// The inclusive index range currently worth rendering.
    ///
    /// Returns `None` only for an empty list; for any `item_count > 0` the
    /// range is non-empty and every index lies in `[0, item_count - 1]`.
    pub fn visible_range(&self, item_count: usize) -> Option<VisibleRange> {
        if item_count == 0 {
            return None;
        }
        let last = item_count - 1;
        let (start, end) = match &self.sizing {
            ItemSizing::Fixed(height) => self.fixed_range(*height, last),
            ItemSizing::Dynamic { .. } => self.dynamic_range(item_count, last),
        };
        Some(VisibleRange {
            start: start.min(last),
            end: end.min(last).max(start.min(last)),
        })
    }

    fn fixed_range(&self, height: f64, last: usize) -> (usize, usize) {
        let first_visible = (self.scroll_offset / height).floor() as usize;
        let last_visible = ((self.scroll_offset + self.container_height) / height).ceil() as usize;

        let start = first_visible.saturating_sub(self.overscan);
        let end = last_visible.saturating_add(self.overscan).min(last);
        (start, end)
    }

    fn dynamic_range(&self, item_count: usize, last: usize) -> (usize, usize) {
        let bottom = self.scroll_offset + self.container_height;
        let mut running = 0.0;
        let mut start = last;
        let mut end = last;
        let mut start_found = false;

        for index in 0..item_count {
            running += self.sizing.height_of(index);
            if !start_found && running > self.scroll_offset {
                start = index;
                start_found = true;
            }
            if running >= bottom {
                end = index;
                break;
            }
        }

        (
            start.saturating_sub(DYNAMIC_LOOKBACK),
            end.saturating_add(DYNAMIC_LOOKAHEAD).min(last),
        )
    }
}
