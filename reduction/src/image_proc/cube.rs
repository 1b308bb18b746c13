//! Ordered stack of equally sized images.

use crate::algo::stats;
use crate::error::{ReductionError, Result};
use crate::image_proc::image::Image;
use ndarray::Array2;
use shared::image_size::ImageSize;

/// Stack of planes sharing one width and height.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    size: ImageSize,
    planes: Vec<Image>,
}

impl Cube {
    /// `n` zero-filled planes.
    pub fn new(width: usize, height: usize, n: usize) -> Self {
        Self {
            size: ImageSize::from_width_height(width, height),
            planes: (0..n).map(|_| Image::new(width, height)).collect(),
        }
    }

    /// Take ownership of `planes`; all must share the size of the first.
    pub fn from_planes(planes: Vec<Image>) -> Result<Self> {
        let size = planes
            .first()
            .map(Image::size)
            .ok_or_else(|| ReductionError::invalid("cube needs at least one plane"))?;
        if let Some((i, bad)) = planes.iter().enumerate().find(|(_, p)| p.size() != size) {
            return Err(ReductionError::ShapeMismatch {
                expected: size.to_string(),
                actual: format!("{} (plane {i})", bad.size()),
            });
        }
        Ok(Self { size, planes })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn plane(&self, i: usize) -> &Image {
        &self.planes[i]
    }

    pub fn plane_mut(&mut self, i: usize) -> &mut Image {
        &mut self.planes[i]
    }

    pub fn planes(&self) -> &[Image] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Image] {
        &mut self.planes
    }

    pub fn into_planes(self) -> Vec<Image> {
        self.planes
    }

    /// Append a plane of matching size.
    pub fn push(&mut self, plane: Image) -> Result<()> {
        if plane.size() != self.size {
            return Err(ReductionError::ShapeMismatch {
                expected: self.size.to_string(),
                actual: plane.size().to_string(),
            });
        }
        self.planes.push(plane);
        Ok(())
    }

    /// Per-pixel median across planes.
    ///
    /// For an even plane count the two middle values are averaged.
    pub fn median_image(&self) -> Result<Image> {
        let n = self.planes.len();
        if n == 0 {
            return Err(ReductionError::invalid("median of an empty cube"));
        }
        let mut column = vec![0.0; n];
        let data = Array2::from_shape_fn(self.size.shape(), |(y, x)| {
            for (slot, plane) in column.iter_mut().zip(&self.planes) {
                *slot = plane.get(x, y);
            }
            if n % 2 == 1 {
                stats::kth_smallest(&mut column, n / 2)
            } else {
                let hi = stats::kth_smallest(&mut column, n / 2);
                let lo = column[..n / 2]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max);
                0.5 * (lo + hi)
            }
        });
        Ok(Image::from_array(data))
    }

    /// Sub-cube over the inclusive rectangle `[x0, x1] × [y0, y1]`.
    pub fn extract(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Result<Cube> {
        let planes = self
            .planes
            .iter()
            .map(|p| p.extract(x0, y0, x1, y1))
            .collect::<Result<Vec<_>>>()?;
        Cube::from_planes(planes)
    }

    /// Paste every plane of `sub` at `(x0, y0)` into the matching plane.
    pub fn paste(&mut self, sub: &Cube, x0: usize, y0: usize) -> Result<()> {
        if sub.len() != self.len() {
            return Err(ReductionError::ShapeMismatch {
                expected: format!("{} planes", self.len()),
                actual: format!("{} planes", sub.len()),
            });
        }
        for (dst, src) in self.planes.iter_mut().zip(sub.planes()) {
            dst.paste(src, x0, y0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_planes_checks_sizes() {
        assert!(Cube::from_planes(vec![]).is_err());
        let err = Cube::from_planes(vec![Image::new(4, 4), Image::new(4, 5)]);
        assert!(matches!(err, Err(ReductionError::ShapeMismatch { .. })));

        let mut cube = Cube::from_planes(vec![Image::new(4, 4); 2]).unwrap();
        assert_eq!(cube.len(), 2);
        assert!(cube.push(Image::new(3, 4)).is_err());
        cube.push(Image::new(4, 4)).unwrap();
        assert_eq!(cube.len(), 3);
    }

    #[test]
    fn test_median_image() {
        let planes: Vec<Image> = [1.0, 9.0, 3.0]
            .iter()
            .map(|&v| Image::from_fn(2, 2, move |_, _| v))
            .collect();
        let cube = Cube::from_planes(planes).unwrap();
        assert_eq!(cube.median_image().unwrap().get(1, 1), 3.0);

        let planes: Vec<Image> = [1.0, 9.0, 3.0, 5.0]
            .iter()
            .map(|&v| Image::from_fn(2, 2, move |_, _| v))
            .collect();
        let cube = Cube::from_planes(planes).unwrap();
        assert_eq!(cube.median_image().unwrap().get(0, 0), 4.0);
    }

    #[test]
    fn test_extract_paste_roundtrip() {
        let planes: Vec<Image> = (0..3)
            .map(|p| Image::from_fn(8, 6, move |x, y| (p * 100 + y * 10 + x) as f64))
            .collect();
        let cube = Cube::from_planes(planes).unwrap();
        let sub = cube.extract(4, 3, 7, 5).unwrap();
        assert_eq!(sub.size(), ImageSize::from_width_height(4, 3));
        assert_eq!(sub.plane(2).get(0, 0), 234.0);

        let mut blank = Cube::new(8, 6, 3);
        blank.paste(&sub, 4, 3).unwrap();
        assert_eq!(blank.plane(1).get(7, 5), 157.0);
        assert_eq!(blank.plane(1).get(0, 0), 0.0);
    }
}
