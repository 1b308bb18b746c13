//! Lists of `(x, y, z)` points.
//!
//! The `z` slot carries whatever ranks the points in context: flux for
//! detected objects, squared distance to the frame centre for anchor points.

use crate::algo::stats::cmp_f64;

/// Sort direction for [`PointList::sort_by_z`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Growable list of `(x, y, z)` triples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointList {
    points: Vec<(f64, f64, f64)>,
}

impl PointList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.points.push((x, y, z));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point `i` as `(x, y, z)`.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn get(&self, i: usize) -> (f64, f64, f64) {
        self.points[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64, f64)> + '_ {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[(f64, f64, f64)] {
        &self.points
    }

    pub fn truncate(&mut self, n: usize) {
        self.points.truncate(n);
    }

    pub fn retain(&mut self, keep: impl FnMut(&(f64, f64, f64)) -> bool) {
        self.points.retain(keep);
    }

    /// Stable sort on `z`; NaN sorts last in either direction.
    pub fn sort_by_z(&mut self, order: SortOrder) {
        match order {
            SortOrder::Ascending => self.points.sort_by(|a, b| cmp_f64(&a.2, &b.2)),
            SortOrder::Descending => self.points.sort_by(|a, b| match (a.2.is_nan(), b.2.is_nan()) {
                (false, false) => cmp_f64(&b.2, &a.2),
                _ => cmp_f64(&a.2, &b.2),
            }),
        }
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.0).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.1).collect()
    }

    pub fn zs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.2).collect()
    }
}

impl FromIterator<(f64, f64, f64)> for PointList {
    fn from_iter<I: IntoIterator<Item = (f64, f64, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_is_stable_with_nan_last() {
        let mut list: PointList = [
            (0.0, 0.0, 2.0),
            (1.0, 0.0, f64::NAN),
            (2.0, 0.0, 1.0),
            (3.0, 0.0, 2.0),
        ]
        .into_iter()
        .collect();

        list.sort_by_z(SortOrder::Ascending);
        assert_eq!(list.xs(), vec![2.0, 0.0, 3.0, 1.0]);

        list.sort_by_z(SortOrder::Descending);
        assert_eq!(list.xs(), vec![0.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_truncate_and_retain() {
        let mut list = PointList::new();
        for i in 0..5 {
            list.push(i as f64, 2.0 * i as f64, 0.0);
        }
        list.retain(|p| p.0 >= 1.0);
        list.truncate(2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), (1.0, 2.0, 0.0));
        assert_eq!(list.ys(), vec![2.0, 4.0]);
    }
}
