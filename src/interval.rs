//! Half-open pixel intervals.

/// A half-open pixel range `[start, end)` along one scan axis.
///
/// Intervals are the currency of tile negotiation. Mid-negotiation an
/// interval may exist as a single point (`start == end`) before its end
/// is known; the start pass only ever widens the start leftward and the
/// end pass only ever tightens the end.
///
/// Coordinates are signed: filter support can momentarily reach left of
/// the image origin before a stage clamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    /// First pixel covered.
    pub start: i32,
    /// One past the last pixel covered.
    pub end: i32,
}

impl Interval {
    /// Create a fully resolved interval.
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Create a degenerate single-point interval at `offset`.
    ///
    /// Used mid-negotiation, before the end is known.
    pub fn point(offset: i32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Widen the interval leftward: `start = min(start, offset)`.
    pub fn union_left(&mut self, offset: i32) {
        self.start = self.start.min(offset);
    }

    /// Tighten the end: `end = min(end, candidate)`. Never widens.
    pub fn clamp_end(&mut self, candidate: i32) {
        self.end = self.end.min(candidate);
    }

    /// Set the end unconditionally.
    pub fn set_end(&mut self, end: i32) {
        self.end = end;
    }

    /// True iff this interval is a superset of (or equal to) `other`.
    ///
    /// Used to enforce that crop intervals only ever grow across
    /// successive negotiation rounds within one frame's propagation.
    pub fn extends(&self, other: &Interval) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// Number of pixels covered, zero for degenerate intervals.
    pub fn len(&self) -> i32 {
        (self.end - self.start).max(0)
    }

    /// True iff the interval covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The interval translated by `delta` pixels.
    pub fn shift(&self, delta: i32) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_is_empty() {
        let i = Interval::point(7);
        assert_eq!(i.start, 7);
        assert_eq!(i.end, 7);
        assert!(i.is_empty());
        assert_eq!(i.len(), 0);
    }

    #[test]
    fn test_union_left_only_widens() {
        let mut i = Interval::point(10);
        i.union_left(4);
        assert_eq!(i.start, 4);
        i.union_left(8);
        assert_eq!(i.start, 4);
    }

    #[test]
    fn test_clamp_end_never_widens() {
        let mut i = Interval::new(0, 100);
        i.clamp_end(80);
        assert_eq!(i.end, 80);
        i.clamp_end(95);
        assert_eq!(i.end, 80);
    }

    #[test]
    fn test_extends() {
        let wide = Interval::new(4, 80);
        let narrow = Interval::new(10, 70);
        assert!(wide.extends(&narrow));
        assert!(!narrow.extends(&wide));
        assert!(wide.extends(&wide));
    }

    #[test]
    fn test_shift() {
        assert_eq!(Interval::new(4, 80).shift(16), Interval::new(20, 96));
        assert_eq!(Interval::new(4, 80).shift(-4), Interval::new(0, 76));
    }

    #[test]
    fn test_len_degenerate() {
        assert_eq!(Interval::new(50, 40).len(), 0);
        assert!(Interval::new(50, 40).is_empty());
    }
}
