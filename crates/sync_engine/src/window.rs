//! Window grid arithmetic.
//!
//! The grid is anchored at the first admitted timestamp and only moves
//! forward, in multiples of the window size.

/// Position of the open release window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowGrid {
    window_size: u64,
    /// Lower edge of the open window; `None` until the first admission
    floor: Option<u64>,
}

impl WindowGrid {
    pub fn new(window_size: u64) -> Self {
        Self {
            window_size,
            floor: None,
        }
    }

    #[inline]
    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    #[inline]
    pub fn floor(&self) -> Option<u64> {
        self.floor
    }

    /// Anchor the grid at `origin` unless it is already anchored
    #[inline]
    pub fn start_at(&mut self, origin: u64) {
        if self.floor.is_none() {
            self.floor = Some(origin);
        }
    }

    /// Upper edge of the open window (`floor + window_size`, saturating)
    #[inline]
    pub fn horizon(&self) -> Option<u64> {
        self.floor.map(|floor| floor.saturating_add(self.window_size))
    }

    /// Move one window forward and return the new floor.
    ///
    /// Returns `None` (and leaves the floor alone) when the grid is not
    /// anchored, the window size is zero, or the floor would overflow.
    #[inline]
    pub fn advance(&mut self) -> Option<u64> {
        if self.window_size == 0 {
            return None;
        }
        let next = self.floor?.checked_add(self.window_size)?;
        self.floor = Some(next);
        Some(next)
    }

    /// Number of advances until the floor lies strictly above `cursor`
    pub fn steps_through(&self, cursor: u64) -> u64 {
        match self.floor {
            Some(floor) if self.window_size > 0 && floor <= cursor => {
                (cursor - floor) / self.window_size + 1
            }
            _ => 0,
        }
    }

    /// Number of advances whose new floor stays at or below `oldest`.
    ///
    /// Flushing any of those boundaries releases nothing when `oldest` is the
    /// smallest buffered front timestamp.
    pub fn idle_steps(&self, oldest: u64) -> u64 {
        match self.floor {
            Some(floor) if self.window_size > 0 && oldest > floor => {
                (oldest - floor) / self.window_size
            }
            _ => 0,
        }
    }

    /// Jump `steps` windows forward without flushing in between
    pub fn skip(&mut self, steps: u64) {
        if let Some(floor) = self.floor {
            let offset = steps.saturating_mul(self.window_size);
            self.floor = Some(floor.saturating_add(offset));
        }
    }

    /// Forget the anchor (back to uninitialized)
    #[inline]
    pub fn reset(&mut self) {
        self.floor = None;
    }
}
