//! Dirty-rectangle bookkeeping for the back buffer.

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DirtyRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl DirtyRect {
    pub const fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn contains_point(self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn union(self, other: DirtyRect) -> DirtyRect {
        DirtyRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn clip(self, max_x: usize, max_y: usize) -> DirtyRect {
        DirtyRect {
            x0: self.x0.min(max_x),
            y0: self.y0.min(max_y),
            x1: self.x1.min(max_x),
            y1: self.y1.min(max_y),
        }
    }
}

/// One enclosing rectangle of everything written since the last flush.
#[derive(Debug, Copy, Clone, Default)]
pub struct DirtyRegion {
    rect: Option<DirtyRect>,
}

impl DirtyRegion {
    pub const fn new() -> Self {
        Self { rect: None }
    }

    pub fn is_dirty(&self) -> bool {
        self.rect.is_some()
    }

    pub fn rect(&self) -> Option<DirtyRect> {
        self.rect
    }

    pub fn clear(&mut self) {
        self.rect = None;
    }

    pub fn take(&mut self) -> Option<DirtyRect> {
        self.rect.take()
    }

    /// Unions `(x, y, w, h)` into the region, clipped to `max_x × max_y`.
    pub fn mark(&mut self, x: usize, y: usize, w: usize, h: usize, max_x: usize, max_y: usize) {
        let rect = DirtyRect::new(x, y, x.saturating_add(w), y.saturating_add(h)).clip(max_x, max_y);
        if rect.is_empty() {
            return;
        }
        self.rect = Some(match self.rect {
            Some(current) => current.union(rect),
            None => rect,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_sets_rect() {
        let mut region = DirtyRegion::new();
        assert!(!region.is_dirty());
        region.mark(10, 20, 9, 16, 100, 100);
        assert_eq!(region.rect(), Some(DirtyRect::new(10, 20, 19, 36)));
    }

    #[test]
    fn marks_union() {
        let mut region = DirtyRegion::new();
        region.mark(10, 10, 5, 5, 100, 100);
        region.mark(40, 2, 5, 5, 100, 100);
        assert_eq!(region.rect(), Some(DirtyRect::new(10, 2, 45, 15)));
    }

    #[test]
    fn clips_to_screen() {
        let mut region = DirtyRegion::new();
        region.mark(95, 90, 20, 20, 100, 100);
        assert_eq!(region.rect(), Some(DirtyRect::new(95, 90, 100, 100)));
    }

    #[test]
    fn ignores_empty_and_offscreen() {
        let mut region = DirtyRegion::new();
        region.mark(3, 3, 0, 10, 100, 100);
        region.mark(150, 3, 10, 10, 100, 100);
        assert!(!region.is_dirty());
    }

    #[test]
    fn take_cleans() {
        let mut region = DirtyRegion::new();
        region.mark(0, 0, 1, 1, 10, 10);
        assert_eq!(region.take(), Some(DirtyRect::new(0, 0, 1, 1)));
        assert!(!region.is_dirty());
        assert_eq!(region.take(), None);
    }
}
