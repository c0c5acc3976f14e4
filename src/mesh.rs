use crate::types::{Point, Value, Vector, Vertex};

/// Triangle soup read back from an extraction run.
///
/// Vertices are stored flat: every group of three consecutive vertices forms one
/// triangle, and `indices` is simply `0..vertex_count`. Duplicate and degenerate
/// triangles are kept exactly as marching cubes produced them.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "bevy", derive(bevy::prelude::Component))]
pub struct Isosurface {
    /// Vertex positions: `[[x, y, z], ...]`
    pub vertices: Vec<[Value; 3]>,

    /// Unit vertex normals pointing towards increasing density: `[[nx, ny, nz], ...]`
    pub normals: Vec<[Value; 3]>,

    /// Sequential triangle-list indices.
    pub indices: Vec<u32>,
}

impl Isosurface {
    /// Creates an empty surface with no vertices, triangles, or normals.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Copies parallel position / normal buffers into a surface.
    ///
    /// # Panics
    /// Panics if the buffers differ in length.
    pub fn from_buffers(positions: &[Point], normals: &[Vector]) -> Self {
        assert_eq!(positions.len(), normals.len());
        Self {
            vertices: positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
            normals: normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
            indices: (0..positions.len() as u32).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn vertex(&self, i: usize) -> Vertex {
        Vertex {
            position: Point::from(self.vertices[i]),
            normal: Vector::from(self.normals[i]),
        }
    }

    /// Returns the three vertex positions of triangle `tri`.
    pub fn tri_coords(&self, tri: usize) -> [Point; 3] {
        [0, 1, 2].map(|k| Point::from(self.vertices[self.indices[3 * tri + k] as usize]))
    }

    /// Computes the face normal for triangle `tri` from its winding.
    ///
    /// Returns the zero vector if the triangle is degenerate.
    pub fn tri_normal(&self, tri: usize) -> Vector {
        let [a, b, c] = self.tri_coords(tri);

        let v_a_b = b - a;
        let v_b_c = c - b;

        let cross = v_a_b.cross(&v_b_c);

        let nrm = cross.norm();
        if nrm == 0.0 {
            Vector::zeros()
        } else {
            cross / nrm
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn quad() -> Isosurface {
        let positions = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
        ];
        let normals = [Vector::z(); 6];
        Isosurface::from_buffers(&positions, &normals)
    }

    #[test]
    fn indices_are_sequential() {
        let surface = quad();
        assert_eq!(surface.vertex_count(), 6);
        assert_eq!(surface.triangle_count(), 2);
        assert_eq!(surface.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(surface.vertex(1).position, Point::new(1.0, 0.0, 0.0));
        assert!(Isosurface::new_empty().is_empty());
    }

    #[test]
    fn face_normals() {
        let surface = quad();
        assert_relative_eq!(surface.tri_normal(0), Vector::z());
        // The second triangle collapses to a point.
        assert_eq!(surface.tri_normal(1), Vector::zeros());
    }
}
