// # Surface Sizing
//
// Tracks the size of the render surface from the host's layout passes. The
// backing raster is only reallocated when the content box actually changes;
// resizing a raster clears it.

/// Host padding in surface pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    pub fn uniform(value: u32) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }
}

/// Current surface size and how often it changed.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSizer {
    padding: Padding,
    size: (u32, u32),
    resizes: u64,
}

impl SurfaceSizer {
    pub fn new(padding: Padding) -> Self {
        Self {
            padding,
            ..Self::default()
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    /// Measure the host box. Returns the new content size when it differs
    /// from the current one, `None` when nothing needs to be reallocated.
    pub fn layout(&mut self, host_width: u32, host_height: u32) -> Option<(u32, u32)> {
        let width = host_width.saturating_sub(self.padding.left + self.padding.right);
        let height = host_height.saturating_sub(self.padding.top + self.padding.bottom);
        if (width, height) == self.size {
            return None;
        }
        self.size = (width, height);
        self.resizes += 1;
        Some(self.size)
    }
}
