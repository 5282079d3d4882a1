//! Mesh construction and marking errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Mesh must have at least one element per direction (nx={nx}, ny={ny})")]
    EmptyGrid { nx: usize, ny: usize },

    #[error("Invalid domain extent {what}: {value}")]
    InvalidExtent { what: &'static str, value: f64 },

    #[error("Attributes must be positive, got {attr}")]
    InvalidAttribute { attr: i32 },

    #[error("Boundary element {index} out of range ({count} boundary elements)")]
    BoundaryIndexOutOfRange { index: usize, count: usize },

    #[error("Boundary attribute {attr} does not exist on the mesh (max {max})")]
    UnknownBoundaryAttribute { attr: i32, max: i32 },

    #[error("Element {element} has inconsistent vertex {vertex}")]
    InconsistentElement { element: usize, vertex: usize },
}

pub type MeshResult<T> = Result<T, MeshError>;
