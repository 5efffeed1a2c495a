//! Reduced 2-D slice of the manifold
//!
//! A [`Projection`] keeps two axes of the full space and pins the rest to
//! fixed coordinates. The [`Slice`] mirrors every center through it with an
//! identity 2-D metric.

use num_complex::Complex32;

use crate::center::Center;
use crate::error::{FieldError, FieldResult};
use crate::kernel::Kernel;
use crate::point::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis selection for the 2-D slice.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Projection {
    axis1: usize,
    axis2: usize,
    /// Values of the `dims - 2` hidden axes, in axis order.
    slice_coords: Vec<f32>,
    /// Refresh the slice after every structural change or evolution step.
    pub auto_update: bool,
}

impl Projection {
    /// Project onto `axis1`/`axis2` of a `dims`-dimensional space.
    pub fn new(dims: usize, axis1: usize, axis2: usize, slice_coords: Vec<f32>) -> FieldResult<Self> {
        if axis1 >= dims || axis2 >= dims {
            return Err(FieldError::InvalidArgument(format!(
                "projection axes ({axis1}, {axis2}) out of range for dimension {dims}"
            )));
        }
        if axis1 == axis2 {
            return Err(FieldError::InvalidArgument(format!(
                "projection axes must differ, got {axis1} twice"
            )));
        }
        if slice_coords.len() != dims - 2 {
            return Err(FieldError::InvalidArgument(format!(
                "expected {} slice coordinates, got {}",
                dims - 2,
                slice_coords.len()
            )));
        }
        if slice_coords.iter().any(|c| !c.is_finite()) {
            return Err(FieldError::InvalidArgument(
                "slice coordinates must be finite".to_string(),
            ));
        }
        Ok(Self {
            axis1,
            axis2,
            slice_coords,
            auto_update: true,
        })
    }

    /// The x-y plane through the origin.
    pub fn xy(dims: usize) -> Self {
        Self {
            axis1: 0,
            axis2: 1,
            slice_coords: vec![0.0; dims.saturating_sub(2)],
            auto_update: true,
        }
    }

    pub fn axis1(&self) -> usize {
        self.axis1
    }

    pub fn axis2(&self) -> usize {
        self.axis2
    }

    pub fn slice_coords(&self) -> &[f32] {
        &self.slice_coords
    }

    /// Drop to the two projected axes.
    pub fn project(&self, point: &Point) -> Point {
        Point::new(vec![point.get(self.axis1), point.get(self.axis2)])
    }

    /// Embed a 2-D point back into the full space at the slice coordinates.
    pub fn lift(&self, point: &Point) -> Point {
        let dims = self.slice_coords.len() + 2;
        let mut hidden = self.slice_coords.iter();
        let coords = (0..dims)
            .map(|axis| {
                if axis == self.axis1 {
                    point.get(0)
                } else if axis == self.axis2 {
                    point.get(1)
                } else {
                    hidden.next().copied().unwrap_or(0.0)
                }
            })
            .collect();
        Point::new(coords)
    }
}

/// Centers projected through a [`Projection`].
#[derive(Clone, Debug)]
pub struct Slice {
    projection: Projection,
    centers: Vec<Center>,
}

impl Slice {
    pub(crate) fn new(projection: Projection) -> Self {
        Self {
            projection,
            centers: Vec::new(),
        }
    }

    /// Rebuild from the full-space centers.
    pub(crate) fn rebuild(&mut self, centers: &[Center]) {
        self.centers.clear();
        self.centers.extend(centers.iter().map(|c| {
            Center::new(self.projection.project(c.position()), c.coefficient(), c.epsilon())
        }));
    }

    pub(crate) fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    pub(crate) fn projection_mut(&mut self) -> &mut Projection {
        &mut self.projection
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn centers(&self) -> &[Center] {
        &self.centers
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Kernel sum over the slice centers at a 2-D point.
    pub fn evaluate(&self, kernel: Kernel, point: &Point) -> Complex32 {
        self.centers
            .iter()
            .map(|c| c.contribution(kernel, point))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_axes() {
        assert!(Projection::new(6, 0, 0, vec![0.0; 4]).is_err());
        assert!(Projection::new(6, 0, 6, vec![0.0; 4]).is_err());
        assert!(Projection::new(6, 0, 1, vec![0.0; 3]).is_err());
        assert!(Projection::new(6, 0, 1, vec![0.0, f32::NAN, 0.0, 0.0]).is_err());
        assert!(Projection::new(6, 4, 2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_project_then_lift() {
        let proj = Projection::new(5, 3, 1, vec![7.0, 8.0, 9.0]).unwrap();
        let p = Point::new(vec![0.1, 0.2, 0.3, 0.4, 0.5]);

        let flat = proj.project(&p);
        assert_eq!(flat.coords(), &[0.4, 0.2]);

        let lifted = proj.lift(&flat);
        assert_eq!(lifted.coords(), &[7.0, 0.2, 8.0, 0.4, 9.0]);
        assert_eq!(proj.project(&lifted), flat);
    }

    #[test]
    fn test_slice_mirrors_centers() {
        let centers = vec![
            Center::new(Point::new(vec![1.0, 2.0, 3.0]), Complex32::new(1.0, 0.0), 0.5),
            Center::new(Point::new(vec![4.0, 5.0, 6.0]), Complex32::new(0.0, 1.0), 0.5),
        ];
        let mut slice = Slice::new(Projection::xy(3));
        slice.rebuild(&centers);

        assert_eq!(slice.len(), 2);
        assert_eq!(slice.centers()[1].position().coords(), &[4.0, 5.0]);
        assert!(slice.centers()[1].metric().is_identity(0.0));

        let v = slice.evaluate(Kernel::Gaussian, &Point::new(vec![1.0, 2.0]));
        assert!((v.re - 1.0).abs() < 1e-6);
    }
}
