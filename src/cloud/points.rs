//! Fixed-capacity point array.
//!
//! Points are stored row-major in one flat buffer with stride `width`.
//! Component 0 of every row is the mass. The buffer is sized for
//! `capacity` rows up front and only re-strided when a dimension is added.

/// Flat storage for up to `capacity` points of `width` components each.
#[derive(Debug, Clone, PartialEq)]
pub struct PointStore {
    data: Vec<f64>,
    width: usize,
    len: usize,
    capacity: usize,
}

impl PointStore {
    pub fn new(capacity: usize, width: usize) -> Self {
        PointStore {
            data: Vec::with_capacity(capacity * width),
            width,
            len: 0,
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Components per point (mass included).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn get(&self, index: usize) -> &[f64] {
        let start = index * self.width;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut [f64] {
        let start = index * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Component `axis` of point `index`.
    #[inline]
    pub fn value(&self, index: usize, axis: usize) -> f64 {
        self.data[index * self.width + axis]
    }

    #[inline]
    pub fn mass(&self, index: usize) -> f64 {
        self.value(index, 0)
    }

    /// Live points in slot order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.data[..self.len * self.width].chunks_exact(self.width)
    }

    /// Append a point and return its slot. `None` when full.
    pub fn push(&mut self, point: &[f64]) -> Option<usize> {
        debug_assert_eq!(point.len(), self.width);
        if self.is_full() {
            return None;
        }
        self.data.extend_from_slice(point);
        self.len += 1;
        Some(self.len - 1)
    }

    /// Vacate `index` by moving the last live point into it.
    ///
    /// Returns the slot the moved point came from, or `None` when `index` was
    /// already the last slot and nothing moved. Callers holding per-slot state
    /// must re-key the returned slot as `index`.
    pub fn swap_remove(&mut self, index: usize) -> Option<usize> {
        debug_assert!(index < self.len);
        let last = self.len - 1;
        if index != last {
            let (head, tail) = self.data.split_at_mut(last * self.width);
            let start = index * self.width;
            head[start..start + self.width].copy_from_slice(&tail[..self.width]);
        }
        self.data.truncate(last * self.width);
        self.len = last;
        (index != last).then_some(last)
    }

    /// Zero-extend every point by one component.
    pub fn widen(&mut self) {
        let old = self.width;
        let new = old + 1;
        let mut data = Vec::with_capacity(self.capacity * new);
        for row in self.data.chunks_exact(old) {
            data.extend_from_slice(row);
            data.push(0.0);
        }
        self.data = data;
        self.width = new;
    }

    /// Owned copy of every live point.
    pub fn to_vec(&self) -> Vec<Vec<f64>> {
        self.iter().map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full() {
        let mut s = PointStore::new(2, 3);
        assert_eq!(s.push(&[1.0, 2.0, 3.0]), Some(0));
        assert_eq!(s.push(&[4.0, 5.0, 6.0]), Some(1));
        assert!(s.is_full());
        assert_eq!(s.push(&[7.0, 8.0, 9.0]), None);
        assert_eq!(s.get(1), &[4.0, 5.0, 6.0]);
        assert_eq!(s.value(0, 2), 3.0);
        assert_eq!(s.mass(1), 4.0);
    }

    #[test]
    fn swap_remove_reports_moved_slot() {
        let mut s = PointStore::new(4, 2);
        for i in 0..4 {
            s.push(&[i as f64, 10.0 * i as f64]);
        }
        assert_eq!(s.swap_remove(1), Some(3));
        assert_eq!(s.get(1), &[3.0, 30.0]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.swap_remove(2), None);
        assert_eq!(s.to_vec(), vec![vec![0.0, 0.0], vec![3.0, 30.0]]);
    }

    #[test]
    fn widen_zero_extends() {
        let mut s = PointStore::new(3, 2);
        s.push(&[1.0, 2.0]);
        s.push(&[3.0, 4.0]);
        s.widen();
        assert_eq!(s.width(), 3);
        assert_eq!(s.to_vec(), vec![vec![1.0, 2.0, 0.0], vec![3.0, 4.0, 0.0]]);
        assert_eq!(s.push(&[5.0, 6.0, 7.0]), Some(2));
    }
}
