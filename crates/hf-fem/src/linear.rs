//! Linear forms (right-hand sides).

use std::sync::Arc;

use hf_core::timing::{Timer, phase_timing};
use nalgebra::DVector;
use rayon::prelude::*;
use tracing::trace;

use crate::basis::ReferenceElement;
use crate::integrators::{ElementContext, LinearIntegrator};
use crate::space::FiniteElementSpace;

pub struct LinearForm {
    space: Arc<FiniteElementSpace>,
    reference: ReferenceElement,
    integrators: Vec<Box<dyn LinearIntegrator>>,
    vector: DVector<f64>,
    assembly_count: usize,
    time: f64,
}

impl LinearForm {
    pub fn new(space: Arc<FiniteElementSpace>) -> Self {
        let reference = ReferenceElement::new(space.order(), space.order() + 2);
        let vector = DVector::zeros(space.ndofs());
        Self {
            space,
            reference,
            integrators: Vec::new(),
            vector,
            assembly_count: 0,
            time: 0.0,
        }
    }

    pub fn add_domain_integrator(&mut self, integrator: impl LinearIntegrator + 'static) {
        self.integrators.push(Box::new(integrator));
    }

    pub fn space(&self) -> &Arc<FiniteElementSpace> {
        &self.space
    }

    pub fn size(&self) -> usize {
        self.vector.len()
    }

    /// Recompute the vector at time `t`. Without integrators it stays zero.
    pub fn assemble(&mut self, t: f64) {
        let timer = Timer::start("load assembly");
        let mesh = self.space.mesh();
        let h = mesh.cell_size();
        let nd = self.reference.num_dofs();
        let element_vectors: Vec<DVector<f64>> = (0..self.space.num_elements())
            .into_par_iter()
            .map(|e| {
                let ctx = ElementContext {
                    element: e,
                    origin: mesh.element_origin(e),
                    h,
                    reference: &self.reference,
                    time: t,
                };
                let mut elvec = DVector::zeros(nd);
                for integrator in &self.integrators {
                    integrator.assemble_element(&ctx, &mut elvec);
                }
                elvec
            })
            .collect();

        self.vector.fill(0.0);
        for (e, elvec) in element_vectors.iter().enumerate() {
            for (a, d) in self.space.element_dofs(e).into_iter().enumerate() {
                self.vector[d] += elvec[a];
            }
        }
        timer.stop_into(&phase_timing::LOAD_ASSEMBLY);

        self.assembly_count += 1;
        self.time = t;
        trace!(t, "linear form assembled");
    }

    pub fn vector(&self) -> &DVector<f64> {
        &self.vector
    }

    pub fn assembly_count(&self) -> usize {
        self.assembly_count
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}
