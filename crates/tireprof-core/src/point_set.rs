//! Immutable vertex container for a loaded scan.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Pt3, Real, Vec3};

/// Raw vertex positions of a scan, in scan space.
///
/// No topology is kept; the pipeline only needs positions. The set is never
/// mutated after construction; derived sets (e.g. downsampled) are new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointSet {
    points: Vec<Pt3>,
}

impl PointSet {
    pub fn new(points: Vec<Pt3>) -> Self {
        Self { points }
    }

    pub fn from_coords(coords: &[[Real; 3]]) -> Self {
        Self {
            points: coords.iter().map(|c| Pt3::new(c[0], c[1], c[2])).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Pt3] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pt3> {
        self.points.iter()
    }

    /// Axis-aligned bounding box `(min, max)`, `None` when empty.
    pub fn bounds(&self) -> Option<(Pt3, Pt3)> {
        let first = self.points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.points[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    pub fn centroid(&self) -> Option<Pt3> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vec3::zeros(), |acc, p| acc + p.coords);
        Some(Pt3::from(sum / self.points.len() as Real))
    }

    /// Average all points falling into the same cubic voxel of edge `voxel_size`.
    ///
    /// Output order follows voxel index order, so the result is deterministic.
    /// A non-positive size returns an unchanged copy.
    pub fn voxel_downsample(&self, voxel_size: Real) -> PointSet {
        if self.is_empty() || voxel_size.is_nan() || voxel_size <= 0.0 {
            return self.clone();
        }
        let Some((min_bound, _)) = self.bounds() else {
            return self.clone();
        };

        let mut voxels: BTreeMap<(i64, i64, i64), (Vec3, usize)> = BTreeMap::new();
        for p in &self.points {
            let key = (
                ((p.x - min_bound.x) / voxel_size).floor() as i64,
                ((p.y - min_bound.y) / voxel_size).floor() as i64,
                ((p.z - min_bound.z) / voxel_size).floor() as i64,
            );
            let entry = voxels.entry(key).or_insert((Vec3::zeros(), 0));
            entry.0 += p.coords;
            entry.1 += 1;
        }

        let points: Vec<Pt3> = voxels
            .values()
            .map(|(sum, count)| Pt3::from(sum / *count as Real))
            .collect();

        debug!(
            "voxel downsample: {} -> {} points (voxel={})",
            self.len(),
            points.len(),
            voxel_size
        );
        PointSet::new(points)
    }

    /// Unoriented unit normals from PCA over each point's `k` nearest neighbours.
    ///
    /// `k` is clamped to `[3, len]`. Points whose neighbourhood is degenerate
    /// get a zero vector so callers can skip them.
    pub fn estimate_normals(&self, k: usize) -> Vec<Vec3> {
        let n = self.len();
        if n < 3 {
            return vec![Vec3::zeros(); n];
        }
        let k = k.clamp(3, n);

        // Mesh vertices repeat coordinates on whole rings and seams; the
        // balanced tree accepts any number of equal split values.
        let coords: Vec<[Real; 3]> = self.points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let kdtree = kiddo::ImmutableKdTree::<Real, 3>::new_from_slice(&coords);

        let mut normals = Vec::with_capacity(n);
        let mut degenerate = 0usize;
        for q in &coords {
            let neighbours = kdtree.nearest_n::<kiddo::SquaredEuclidean>(q, k);

            let centroid = neighbours
                .iter()
                .fold(Vec3::zeros(), |acc, nb| acc + self.points[nb.item as usize].coords)
                / neighbours.len() as Real;

            let mut cov = nalgebra::Matrix3::zeros();
            for nb in &neighbours {
                let d = self.points[nb.item as usize].coords - centroid;
                cov += d * d.transpose();
            }

            let eig = cov.symmetric_eigen();
            let mut order = [0usize, 1, 2];
            order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
            let (min_idx, mid_idx) = (order[0], order[1]);

            // A neighbourhood spread along a single line has no defined normal.
            let largest = eig.eigenvalues[order[2]];
            if largest <= 0.0 || eig.eigenvalues[mid_idx] <= 1e-12 * largest {
                degenerate += 1;
                normals.push(Vec3::zeros());
                continue;
            }

            let normal = eig.eigenvectors.column(min_idx).into_owned();
            let norm = normal.norm();
            if norm > 1e-10 {
                normals.push(normal / norm);
            } else {
                degenerate += 1;
                normals.push(Vec3::zeros());
            }
        }

        debug!("estimated {} normals (k={}, degenerate={})", n, k, degenerate);
        normals
    }
}

impl From<Vec<Pt3>> for PointSet {
    fn from(points: Vec<Pt3>) -> Self {
        Self::new(points)
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Pt3;
    type IntoIter = std::slice::Iter<'a, Pt3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
