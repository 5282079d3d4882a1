//! Cartesian mesh builder.

use nalgebra::Point2;

use crate::error::MeshResult;
use crate::mesh::{BoundaryElement, Element, Mesh, Side};
use crate::validate;

/// Builder for a structured quadrilateral mesh of a rectangle.
///
/// Element attributes default to 1; boundary attributes follow
/// [`Side::default_attribute`].
#[derive(Debug, Clone)]
pub struct CartesianMeshBuilder {
    nx: usize,
    ny: usize,
    sx: f64,
    sy: f64,
}

impl CartesianMeshBuilder {
    /// `nx` by `ny` cells on the unit square.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            sx: 1.0,
            sy: 1.0,
        }
    }

    /// Domain extent `[0, sx] x [0, sy]`.
    pub fn size(mut self, sx: f64, sy: f64) -> Self {
        self.sx = sx;
        self.sy = sy;
        self
    }

    /// Validate the parameters and build the mesh.
    pub fn build(self) -> MeshResult<Mesh> {
        validate::validate_grid(self.nx, self.ny, self.sx, self.sy)?;
        let mesh = self.build_unchecked();
        validate::validate_connectivity(&mesh)?;
        Ok(mesh)
    }

    pub(crate) fn build_unchecked(self) -> Mesh {
        let Self { nx, ny, sx, sy } = self;
        let vid = |i: usize, j: usize| j * (nx + 1) + i;

        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.push(Point2::new(
                    sx * i as f64 / nx as f64,
                    sy * j as f64 / ny as f64,
                ));
            }
        }

        let mut elements = Vec::with_capacity(nx * ny);
        for ey in 0..ny {
            for ex in 0..nx {
                elements.push(Element {
                    vertices: [
                        vid(ex, ey),
                        vid(ex + 1, ey),
                        vid(ex + 1, ey + 1),
                        vid(ex, ey + 1),
                    ],
                    attribute: 1,
                });
            }
        }

        let mut boundary = Vec::with_capacity(2 * (nx + ny));
        let mut push = |v0: usize, v1: usize, side: Side| {
            boundary.push(BoundaryElement {
                vertices: [v0, v1],
                attribute: side.default_attribute(),
            });
        };
        for i in 0..nx {
            push(vid(i, 0), vid(i + 1, 0), Side::Bottom);
        }
        for j in 0..ny {
            push(vid(nx, j), vid(nx, j + 1), Side::Right);
        }
        for i in (0..nx).rev() {
            push(vid(i + 1, ny), vid(i, ny), Side::Top);
        }
        for j in (0..ny).rev() {
            push(vid(0, j + 1), vid(0, j), Side::Left);
        }

        let mut mesh = Mesh {
            nx,
            ny,
            extent: [sx, sy],
            vertices,
            elements,
            boundary,
            bdr_attributes: Vec::new(),
            attributes: Vec::new(),
        };
        mesh.set_attributes();
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeshError;

    #[test]
    fn builds_expected_counts() {
        let mesh = CartesianMeshBuilder::new(3, 2).size(3.0, 1.0).build().unwrap();
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_elements(), 6);
        assert_eq!(mesh.num_boundary_elements(), 10);
        assert_eq!(mesh.cell_size(), (1.0, 0.5));
        assert_eq!(mesh.attributes(), &[1]);
    }

    #[test]
    fn element_vertices_are_counter_clockwise() {
        let mesh = CartesianMeshBuilder::new(2, 2).build().unwrap();
        let el = mesh.element(3);
        let p: Vec<_> = el.vertices.iter().map(|&v| *mesh.vertex(v)).collect();
        assert_eq!(p[0], Point2::new(0.5, 0.5));
        assert_eq!(p[1], Point2::new(1.0, 0.5));
        assert_eq!(p[2], Point2::new(1.0, 1.0));
        assert_eq!(p[3], Point2::new(0.5, 1.0));
    }

    #[test]
    fn rejects_empty_and_degenerate_grids() {
        assert!(matches!(
            CartesianMeshBuilder::new(0, 2).build(),
            Err(MeshError::EmptyGrid { .. })
        ));
        assert!(matches!(
            CartesianMeshBuilder::new(2, 2).size(-1.0, 1.0).build(),
            Err(MeshError::InvalidExtent { .. })
        ));
        assert!(CartesianMeshBuilder::new(2, 2)
            .size(1.0, f64::NAN)
            .build()
            .is_err());
    }
}
