//! Continuous Lagrange finite elements on structured quadrilateral meshes.
//!
//! This crate turns a mesh and a set of integrators into the sparse matrices
//! and vectors the time-stepping core consumes:
//! - `FiniteElementSpace`: H1 dofs of any order on the mesh lattice
//! - `BilinearForm` / `LinearForm`: element integration and global assembly,
//!   either into CSR storage or as a matrix-free element operator
//! - `GridFunction`: projection of coefficients and L2 error
//! - `LinearSystem`: essential-dof elimination and static condensation, with
//!   recovery of the full solution afterwards

pub mod basis;
pub mod bilinear;
pub mod coefficient;
pub mod error;
pub mod grid_function;
pub mod integrators;
pub mod linear;
pub mod quadrature;
pub mod space;
pub mod system;

pub use basis::{LagrangeBasis1D, ReferenceElement};
pub use bilinear::{AssemblyLevel, BilinearForm, ElementOperator};
pub use coefficient::{
    Coefficient, ConstantCoefficient, ConstantVectorCoefficient, FunctionCoefficient,
    VectorCoefficient,
};
pub use error::{FemError, FemResult};
pub use grid_function::GridFunction;
pub use integrators::{
    BilinearIntegrator, ConvectionIntegrator, DiffusionIntegrator, DomainLoadIntegrator,
    ElementContext, LinearIntegrator, MassIntegrator,
};
pub use linear::LinearForm;
pub use quadrature::GaussLegendre;
pub use space::FiniteElementSpace;
pub use system::{LinearSystem, SystemOperator};
