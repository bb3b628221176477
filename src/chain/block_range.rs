//! Stateful iterator over half-open block-number windows with adaptive sizing.

/// Iterates `[from, to]` in windows of `step_size` blocks, adapting the
/// window size to converge on `target_time` seconds per window.
#[derive(Debug, Clone)]
pub struct BlockRange {
    from: u64,
    to: Option<u64>,
    cursor: u64,
    step_size: u64,
    min_size: u64,
    max_size: u64,
    reverse: bool,
    target_time: f64,
    /// Bounds of the window most recently returned by `next()`, needed by
    /// `retry()` to reposition the cursor.
    last_window: Option<(u64, u64)>,
    finished: bool,
}

impl BlockRange {
    pub fn new(
        from: u64,
        to: Option<u64>,
        start_size: u64,
        min_size: u64,
        max_size: u64,
        reverse: bool,
        target_time: f64,
    ) -> Self {
        let cursor = if reverse { to.unwrap_or(from) } else { from };
        Self {
            from,
            to,
            cursor,
            step_size: start_size,
            min_size,
            max_size,
            reverse,
            target_time,
            last_window: None,
            finished: false,
        }
    }

    pub fn step_size(&self) -> u64 {
        self.step_size
    }

    /// Clip the open end of the range to the current chain head.
    pub fn clip_to_head(&mut self, head: u64) {
        if !self.reverse && self.to.is_none() {
            self.to = Some(head);
        }
    }

    /// Produce the next `[from, to]` window, or `None` if the range is
    /// exhausted (bounded `to` reached, or reverse iteration reached `from`).
    pub fn next_window(&mut self) -> Option<(u64, u64)> {
        if self.finished {
            return None;
        }

        let (from, to) = if self.reverse {
            let to = self.cursor;
            if to < self.from {
                self.finished = true;
                return None;
            }
            let span = self.step_size.saturating_sub(1);
            let from = to.saturating_sub(span).max(self.from);
            (from, to)
        } else {
            let from = self.cursor;
            if let Some(bound) = self.to {
                if from > bound {
                    self.finished = true;
                    return None;
                }
            }
            let span = self.step_size.saturating_sub(1);
            let mut to = from + span;
            if let Some(bound) = self.to {
                to = to.min(bound);
            }
            (from, to)
        };

        self.last_window = Some((from, to));

        if self.reverse {
            if from == self.from {
                self.finished = true;
            } else {
                self.cursor = from - 1;
            }
        } else {
            self.cursor = to + 1;
            if let Some(bound) = self.to {
                if to >= bound {
                    self.finished = true;
                }
            }
        }

        Some((from, to))
    }

    /// Re-request the last window with a halved step size (floored at
    /// `min_size`), undoing the cursor advance performed by `next_window`.
    pub fn retry(&mut self) {
        if let Some((from, _)) = self.last_window {
            self.cursor = from;
            self.finished = false;
        }
        self.step_size = (self.step_size / 2).max(self.min_size);
    }

    /// Record how long the last window took and rescale `step_size` toward
    /// `target_time`.
    pub fn record_time(&mut self, seconds: f64) -> u64 {
        let scale = (self.target_time / seconds).clamp(0.5, 2.0);
        let scaled = (self.step_size as f64 * scale).ceil() as u64;
        self.step_size = scaled.clamp(self.min_size, self.max_size);
        self.step_size
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn to_bound(&self) -> Option<u64> {
        self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_range_exactly_with_no_retries() {
        let mut range = BlockRange::new(0, Some(9), 4, 1, 100, false, 10.0);
        let mut windows = Vec::new();
        while let Some(w) = range.next_window() {
            windows.push(w);
        }
        assert_eq!(windows, vec![(0, 3), (4, 7), (8, 9)]);
    }

    #[test]
    fn retry_halves_step_and_redoes_window() {
        let mut range = BlockRange::new(0, Some(99), 100, 1, 1000, false, 10.0);
        let first = range.next_window().unwrap();
        assert_eq!(first, (0, 99));
        range.retry();
        assert_eq!(range.step_size(), 50);
        let redo = range.next_window().unwrap();
        assert_eq!(redo.0, 0);
    }

    #[test]
    fn adaptive_window_converges_toward_target_time() {
        let mut range = BlockRange::new(0, None, 100, 1, 1000, false, 10.0);
        assert_eq!(range.record_time(20.0), 50);
        assert_eq!(range.record_time(2.5), 100);
    }

    #[test]
    fn retry_from_hundred_yields_fifty() {
        let mut range = BlockRange::new(0, Some(999), 100, 1, 1000, false, 10.0);
        range.next_window();
        range.retry();
        assert_eq!(range.step_size(), 50);
    }

    #[test]
    fn reverse_iteration_reaches_origin_and_stops() {
        let mut range = BlockRange::new(0, Some(9), 4, 1, 100, true, 10.0);
        let mut windows = Vec::new();
        while let Some(w) = range.next_window() {
            windows.push(w);
        }
        assert_eq!(windows, vec![(6, 9), (2, 5), (0, 1)]);
    }
}
