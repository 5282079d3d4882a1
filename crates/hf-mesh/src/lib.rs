//! hf-mesh: structured quadrilateral meshes for heatflow.
//!
//! Provides:
//! - Cartesian mesh builder with validation
//! - Uniform refinement that preserves element and boundary attributes
//! - Boundary marking by midpoint predicate and essential-boundary markers
//!
//! # Example
//!
//! ```
//! use hf_mesh::CartesianMeshBuilder;
//!
//! let mut mesh = CartesianMeshBuilder::new(2, 2).build().unwrap();
//! mesh.uniform_refinement();
//!
//! assert_eq!(mesh.num_elements(), 16);
//! assert_eq!(mesh.num_boundary_elements(), 16);
//! assert_eq!(mesh.bdr_attributes(), &[1, 2, 3, 4]);
//! ```

pub mod builder;
pub mod error;
pub mod marker;
pub mod mesh;
pub(crate) mod validate;

pub use builder::CartesianMeshBuilder;
pub use error::{MeshError, MeshResult};
pub use marker::BoundaryMarker;
pub use mesh::{BoundaryElement, Element, Mesh, Side};
