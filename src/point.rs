//! Point - n-dimensional coordinate vector
//!
//! The atomic unit of position in a field. A point is immutable once built;
//! modified copies come from [`Point::with_coord`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinates in an n-dimensional space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    coords: Vec<f32>,
}

impl Point {
    /// Create from owned coordinates.
    pub fn new(coords: Vec<f32>) -> Self {
        Self { coords }
    }

    /// Create from a coordinate slice (copied).
    pub fn from_slice(coords: &[f32]) -> Self {
        Self {
            coords: coords.to_vec(),
        }
    }

    /// Create the origin of a `dims`-dimensional space.
    pub fn zeros(dims: usize) -> Self {
        Self {
            coords: vec![0.0; dims],
        }
    }

    /// Get dimensions.
    #[inline]
    pub fn dims(&self) -> usize {
        self.coords.len()
    }

    /// Get coordinate at index.
    #[inline]
    pub fn get(&self, idx: usize) -> f32 {
        self.coords[idx]
    }

    /// Borrow all coordinates.
    #[inline]
    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    /// Copy of this point with one coordinate replaced.
    pub fn with_coord(&self, idx: usize, value: f32) -> Self {
        let mut coords = self.coords.clone();
        coords[idx] = value;
        Self { coords }
    }

    /// True when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }

    /// Displacement `self - other`.
    pub fn delta(&self, other: &Point) -> Vec<f32> {
        debug_assert_eq!(self.dims(), other.dims());
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| a - b)
            .collect()
    }

    /// Squared Euclidean distance.
    pub fn euclidean_distance_sq(&self, other: &Point) -> f32 {
        debug_assert_eq!(self.dims(), other.dims());
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum()
    }

    /// Euclidean distance.
    pub fn euclidean_distance(&self, other: &Point) -> f32 {
        self.euclidean_distance_sq(other).sqrt()
    }

    /// Compute L2 norm.
    pub fn norm(&self) -> f32 {
        self.coords.iter().map(|c| c * c).sum::<f32>().sqrt()
    }
}

impl From<Vec<f32>> for Point {
    fn from(coords: Vec<f32>) -> Self {
        Self::new(coords)
    }
}

impl From<&[f32]> for Point {
    fn from(coords: &[f32]) -> Self {
        Self::from_slice(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let p = Point::zeros(6);
        assert_eq!(p.dims(), 6);
        assert_eq!(p.norm(), 0.0);
    }

    #[test]
    fn test_with_coord_copies() {
        let p = Point::new(vec![1.0, 2.0, 3.0]);
        let q = p.with_coord(1, 5.0);

        assert_eq!(p.get(1), 2.0);
        assert_eq!(q.get(1), 5.0);
        assert_eq!(q.get(0), 1.0);
    }

    #[test]
    fn test_distance() {
        let a = Point::new(vec![0.0, 0.0]);
        let b = Point::new(vec![3.0, 4.0]);

        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(b.delta(&a), vec![3.0, 4.0]);
    }

    #[test]
    fn test_finite() {
        assert!(Point::new(vec![0.5, -1.0]).is_finite());
        assert!(!Point::new(vec![f32::NAN, 0.0]).is_finite());
        assert!(!Point::new(vec![f32::INFINITY]).is_finite());
    }
}
