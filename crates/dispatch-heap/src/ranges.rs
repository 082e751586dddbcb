//! Compression of ascending indices into contiguous ranges.
//!
//! Bulk removal marks every matching slot of the backing vector, then
//! deletes them a range at a time. A run of adjacent matches costs one
//! splice instead of one splice per element.

/// Accumulates ascending indices as closed `(start, end)` ranges.
///
/// Indices must be pushed in strictly increasing order. An index equal to
/// the previous range's end plus one extends that range; anything else opens
/// a new single-element range. The buffer is reused across passes via
/// [`clear`](Self::clear).
#[derive(Debug, Default, Clone)]
pub struct IndexRanges {
    ranges: Vec<(usize, usize)>,
}

impl IndexRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one index.
    pub fn push(&mut self, index: usize) {
        if let Some((_, end)) = self.ranges.last_mut() {
            debug_assert!(index > *end, "indices must be pushed in ascending order");
            if index == *end + 1 {
                *end = index;
                return;
            }
        }
        self.ranges.push((index, index));
    }

    /// Closed ranges covering every pushed index, in ascending order.
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    /// Total number of indices covered.
    pub fn covered(&self) -> usize {
        self.ranges.iter().map(|(start, end)| end - start + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Forgets all ranges, keeping the allocation.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl Extend<usize> for IndexRanges {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.push(index);
        }
    }
}

impl FromIterator<usize> for IndexRanges {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut ranges = Self::new();
        ranges.extend(iter);
        ranges
    }
}

/// Splices every range out of `items` and returns the removed elements in
/// their original order.
///
/// Ranges refer to positions in the original vector; each splice shifts the
/// following positions left, so the running count of removed elements is
/// subtracted before each range is applied.
pub(crate) fn splice_out<T>(items: &mut Vec<T>, ranges: &IndexRanges) -> Vec<T> {
    let mut removed = Vec::with_capacity(ranges.covered());
    let mut shift = 0;
    for &(start, end) in ranges.ranges() {
        removed.extend(items.drain(start - shift..=end - shift));
        shift += end - start + 1;
    }
    removed
}
