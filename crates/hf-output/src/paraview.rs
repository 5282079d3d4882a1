//! ParaView output: one VTU file per cycle and a PVD index over all cycles.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf_fem::{FiniteElementSpace, GridFunction};
use nalgebra::DVector;
use tracing::debug;

use crate::{OutputError, OutputResult};

/// VTK cell type for a linear quadrilateral.
const VTK_QUAD: u8 = 9;

/// Data collection written as `<prefix>/<name>/CycleNNNNNN/data.vtu`, indexed
/// by `<prefix>/<name>.pvd`.
pub struct ParaViewCollection {
    name: String,
    prefix: PathBuf,
    cycle: u64,
    time: f64,
    levels_of_detail: usize,
    fields: Vec<(String, DVector<f64>)>,
    saved: Vec<(f64, String)>,
}

impl ParaViewCollection {
    pub fn new(name: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            cycle: 0,
            time: 0.0,
            levels_of_detail: 1,
            fields: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Sub-cells per element edge.
    pub fn set_levels_of_detail(&mut self, levels: usize) {
        self.levels_of_detail = levels.max(1);
    }

    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Register or replace a field's dof values.
    pub fn register_field(&mut self, name: &str, values: DVector<f64>) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = values,
            None => self.fields.push((name.to_string(), values)),
        }
    }

    pub fn pvd_path(&self) -> PathBuf {
        self.prefix.join(format!("{}.pvd", self.name))
    }

    /// Write the current cycle and refresh the PVD index. Returns the VTU path.
    pub fn save(&mut self, space: &Arc<FiniteElementSpace>) -> OutputResult<PathBuf> {
        let mut functions = Vec::with_capacity(self.fields.len());
        for (name, values) in &self.fields {
            let gf = GridFunction::from_values(Arc::clone(space), values.clone()).map_err(|_| {
                OutputError::FieldSize {
                    name: name.clone(),
                    expected: space.ndofs(),
                    actual: values.len(),
                }
            })?;
            functions.push((name.as_str(), gf));
        }

        let relative = format!("{}/Cycle{:06}/data.vtu", self.name, self.cycle);
        let vtu_path = self.prefix.join(&relative);
        if let Some(dir) = vtu_path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&vtu_path, self.render_vtu(space, &functions))?;

        self.saved.retain(|(_, path)| *path != relative);
        self.saved.push((self.time, relative));
        write_pvd(&self.pvd_path(), &self.saved)?;
        debug!(path = %vtu_path.display(), cycle = self.cycle, time = self.time, "ParaView cycle written");
        Ok(vtu_path)
    }

    fn render_vtu(&self, space: &FiniteElementSpace, functions: &[(&str, GridFunction)]) -> String {
        let lod = self.levels_of_detail;
        let mesh = space.mesh();
        let (hx, hy) = mesh.cell_size();
        let per_element = (lod + 1) * (lod + 1);
        let n_points = mesh.num_elements() * per_element;
        let n_cells = mesh.num_elements() * lod * lod;
        let sample = |k: usize| k as f64 / lod as f64;

        let mut out = String::new();
        let _ = writeln!(out, r#"<?xml version="1.0"?>"#);
        let _ = writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        );
        let _ = writeln!(out, "<UnstructuredGrid>");
        let _ = writeln!(
            out,
            r#"<Piece NumberOfPoints="{n_points}" NumberOfCells="{n_cells}">"#
        );

        let _ = writeln!(out, "<Points>");
        let _ = writeln!(
            out,
            r#"<DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        );
        for e in 0..mesh.num_elements() {
            let origin = mesh.element_origin(e);
            for j in 0..=lod {
                for i in 0..=lod {
                    let x = origin[0] + sample(i) * hx;
                    let y = origin[1] + sample(j) * hy;
                    let _ = writeln!(out, "{x} {y} 0");
                }
            }
        }
        let _ = writeln!(out, "</DataArray>");
        let _ = writeln!(out, "</Points>");

        let _ = writeln!(out, "<Cells>");
        let _ = writeln!(out, r#"<DataArray type="Int32" Name="connectivity" format="ascii">"#);
        for e in 0..mesh.num_elements() {
            let base = e * per_element;
            for j in 0..lod {
                for i in 0..lod {
                    let p = |ii: usize, jj: usize| base + jj * (lod + 1) + ii;
                    let _ = writeln!(out, "{} {} {} {}", p(i, j), p(i + 1, j), p(i + 1, j + 1), p(i, j + 1));
                }
            }
        }
        let _ = writeln!(out, "</DataArray>");
        let _ = writeln!(out, r#"<DataArray type="Int32" Name="offsets" format="ascii">"#);
        for c in 1..=n_cells {
            let _ = writeln!(out, "{}", 4 * c);
        }
        let _ = writeln!(out, "</DataArray>");
        let _ = writeln!(out, r#"<DataArray type="UInt8" Name="types" format="ascii">"#);
        for _ in 0..n_cells {
            let _ = writeln!(out, "{VTK_QUAD}");
        }
        let _ = writeln!(out, "</DataArray>");
        let _ = writeln!(out, "</Cells>");

        let _ = writeln!(out, "<PointData>");
        for (name, gf) in functions {
            let _ = writeln!(
                out,
                r#"<DataArray type="Float64" Name="{name}" NumberOfComponents="1" format="ascii">"#
            );
            for e in 0..mesh.num_elements() {
                for j in 0..=lod {
                    for i in 0..=lod {
                        let _ = writeln!(out, "{}", gf.value_in_element(e, sample(i), sample(j)));
                    }
                }
            }
            let _ = writeln!(out, "</DataArray>");
        }
        let _ = writeln!(out, "</PointData>");
        let _ = writeln!(out, "</Piece>");
        let _ = writeln!(out, "</UnstructuredGrid>");
        let _ = writeln!(out, "</VTKFile>");
        out
    }
}

fn write_pvd(path: &Path, saved: &[(f64, String)]) -> OutputResult<()> {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0"?>"#);
    let _ = writeln!(
        out,
        r#"<VTKFile type="Collection" version="0.1" byte_order="LittleEndian">"#
    );
    let _ = writeln!(out, "<Collection>");
    for (time, file) in saved {
        let _ = writeln!(
            out,
            r#"<DataSet timestep="{time}" group="" part="0" file="{file}"/>"#
        );
    }
    let _ = writeln!(out, "</Collection>");
    let _ = writeln!(out, "</VTKFile>");
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, out)?;
    Ok(())
}
