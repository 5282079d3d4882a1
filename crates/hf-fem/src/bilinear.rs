//! Bilinear forms: element integration plus global assembly.

use std::sync::Arc;

use hf_core::timing::{Timer, phase_timing};
use hf_solver::{LinearOperator, spmv_add};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use tracing::debug;

use crate::basis::ReferenceElement;
use crate::error::{FemError, FemResult};
use crate::integrators::{BilinearIntegrator, ElementContext};
use crate::space::FiniteElementSpace;

/// How `assemble` stores the operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssemblyLevel {
    /// Global CSR matrix.
    #[default]
    Full,
    /// Element matrices only, applied matrix-free.
    Partial,
}

/// Sum of bilinear integrators over a finite element space.
pub struct BilinearForm {
    space: Arc<FiniteElementSpace>,
    reference: ReferenceElement,
    integrators: Vec<Box<dyn BilinearIntegrator>>,
    level: AssemblyLevel,
    static_condensation: bool,
    element_matrices: Option<Arc<Vec<DMatrix<f64>>>>,
    matrix: Option<Arc<CsrMatrix<f64>>>,
    assembly_count: usize,
    generation: u64,
    time: f64,
}

impl BilinearForm {
    pub fn new(space: Arc<FiniteElementSpace>) -> Self {
        // Two extra points per direction cover variable coefficients.
        let reference = ReferenceElement::new(space.order(), space.order() + 2);
        Self {
            space,
            reference,
            integrators: Vec::new(),
            level: AssemblyLevel::Full,
            static_condensation: false,
            element_matrices: None,
            matrix: None,
            assembly_count: 0,
            generation: 0,
            time: 0.0,
        }
    }

    pub fn add_domain_integrator(&mut self, integrator: impl BilinearIntegrator + 'static) {
        self.integrators.push(Box::new(integrator));
    }

    pub fn set_assembly_level(&mut self, level: AssemblyLevel) {
        self.level = level;
    }

    pub fn assembly_level(&self) -> AssemblyLevel {
        self.level
    }

    /// Eliminate element-interior dofs when forming linear systems.
    pub fn enable_static_condensation(&mut self) {
        self.static_condensation = true;
    }

    pub fn static_condensation(&self) -> bool {
        self.static_condensation
    }

    pub fn space(&self) -> &Arc<FiniteElementSpace> {
        &self.space
    }

    pub fn size(&self) -> usize {
        self.space.ndofs()
    }

    pub fn is_symmetric(&self) -> bool {
        self.integrators.iter().all(|i| i.is_symmetric())
    }

    /// Number of completed `assemble` calls.
    pub fn assembly_count(&self) -> usize {
        self.assembly_count
    }

    /// Changes whenever the assembled operator is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time of the last assembly.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Integrate every element at time `t` and store the result at the
    /// configured assembly level.
    pub fn assemble(&mut self, t: f64) -> FemResult<()> {
        if self.static_condensation && self.level == AssemblyLevel::Partial {
            return Err(FemError::InvalidConfig {
                what: "static condensation requires full assembly",
            });
        }

        let timer = Timer::start("element matrices");
        let element_matrices = self.compute_element_matrices(t);
        timer.stop_into(&phase_timing::ELEMENT_MATRICES);

        match self.level {
            AssemblyLevel::Full => {
                let timer = Timer::start("sparse assembly");
                let matrix = scatter(&self.space, &element_matrices);
                timer.stop_into(&phase_timing::SPARSE_ASSEMBLY);
                self.matrix = Some(Arc::new(matrix));
                self.element_matrices = self
                    .static_condensation
                    .then(|| Arc::new(element_matrices));
            }
            AssemblyLevel::Partial => {
                self.matrix = None;
                self.element_matrices = Some(Arc::new(element_matrices));
            }
        }

        self.assembly_count += 1;
        self.generation += 1;
        self.time = t;
        debug!(
            t,
            level = ?self.level,
            dofs = self.size(),
            generation = self.generation,
            "bilinear form assembled"
        );
        Ok(())
    }

    /// Assembled CSR matrix (full assembly only).
    pub fn matrix(&self) -> FemResult<&Arc<CsrMatrix<f64>>> {
        self.matrix.as_ref().ok_or(FemError::NotAssembled {
            what: "sparse matrix",
        })
    }

    pub fn element_matrices(&self) -> Option<&Arc<Vec<DMatrix<f64>>>> {
        self.element_matrices.as_ref()
    }

    /// Matrix-free operator over the stored element matrices.
    pub fn element_operator(&self) -> FemResult<ElementOperator> {
        let element_matrices = self.element_matrices.clone().ok_or(FemError::NotAssembled {
            what: "element matrices",
        })?;
        Ok(ElementOperator {
            space: Arc::clone(&self.space),
            element_matrices,
        })
    }

    /// `y = A x` at whichever level the form was assembled.
    pub fn mult(&self, x: &DVector<f64>, y: &mut DVector<f64>) -> FemResult<()> {
        if x.len() != self.size() {
            return Err(FemError::DimensionMismatch {
                what: "bilinear form input",
                expected: self.size(),
                actual: x.len(),
            });
        }
        if y.len() != self.size() {
            *y = DVector::zeros(self.size());
        }
        match &self.matrix {
            Some(a) => {
                y.fill(0.0);
                spmv_add(1.0, a, x, y);
            }
            None => self.element_operator()?.apply(x, y),
        }
        Ok(())
    }

    pub(crate) fn reference(&self) -> &ReferenceElement {
        &self.reference
    }

    fn compute_element_matrices(&self, t: f64) -> Vec<DMatrix<f64>> {
        let mesh = self.space.mesh();
        let h = mesh.cell_size();
        let nd = self.reference.num_dofs();
        (0..self.space.num_elements())
            .into_par_iter()
            .map(|e| {
                let ctx = ElementContext {
                    element: e,
                    origin: mesh.element_origin(e),
                    h,
                    reference: &self.reference,
                    time: t,
                };
                let mut elmat = DMatrix::zeros(nd, nd);
                for integrator in &self.integrators {
                    integrator.assemble_element(&ctx, &mut elmat);
                }
                elmat
            })
            .collect()
    }
}

fn scatter(space: &FiniteElementSpace, element_matrices: &[DMatrix<f64>]) -> CsrMatrix<f64> {
    let n = space.ndofs();
    let mut coo = CooMatrix::new(n, n);
    for (e, elmat) in element_matrices.iter().enumerate() {
        let dofs = space.element_dofs(e);
        for (a, &row) in dofs.iter().enumerate() {
            for (b, &col) in dofs.iter().enumerate() {
                coo.push(row, col, elmat[(a, b)]);
            }
        }
    }
    CsrMatrix::from(&coo)
}

/// Matrix-free action of a partially assembled form.
#[derive(Clone)]
pub struct ElementOperator {
    space: Arc<FiniteElementSpace>,
    element_matrices: Arc<Vec<DMatrix<f64>>>,
}

impl LinearOperator for ElementOperator {
    fn nrows(&self) -> usize {
        self.space.ndofs()
    }

    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        y.fill(0.0);
        for (e, elmat) in self.element_matrices.iter().enumerate() {
            let dofs = self.space.element_dofs(e);
            let xe = DVector::from_iterator(dofs.len(), dofs.iter().map(|&d| x[d]));
            let ye = elmat * xe;
            for (a, &d) in dofs.iter().enumerate() {
                y[d] += ye[a];
            }
        }
    }

    fn diagonal(&self) -> DVector<f64> {
        let mut diag = DVector::zeros(self.nrows());
        for (e, elmat) in self.element_matrices.iter().enumerate() {
            for (a, d) in self.space.element_dofs(e).into_iter().enumerate() {
                diag[d] += elmat[(a, a)];
            }
        }
        diag
    }
}
