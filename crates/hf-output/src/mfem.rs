//! MFEM ASCII mesh (v1.0) and grid-function formats, as read by GLVis.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use hf_mesh::Mesh;

use crate::OutputResult;

/// MFEM geometry ids.
const GEOMETRY_SEGMENT: u8 = 1;
const GEOMETRY_SQUARE: u8 = 3;

pub fn write_mesh<W: Write>(w: &mut W, mesh: &Mesh) -> std::io::Result<()> {
    writeln!(w, "MFEM mesh v1.0")?;
    writeln!(w)?;
    writeln!(w, "dimension")?;
    writeln!(w, "{}", mesh.dimension())?;
    writeln!(w)?;
    writeln!(w, "elements")?;
    writeln!(w, "{}", mesh.num_elements())?;
    for el in mesh.elements() {
        let [a, b, c, d] = el.vertices;
        writeln!(w, "{} {GEOMETRY_SQUARE} {a} {b} {c} {d}", el.attribute)?;
    }
    writeln!(w)?;
    writeln!(w, "boundary")?;
    writeln!(w, "{}", mesh.num_boundary_elements())?;
    for be in mesh.boundary_elements() {
        let [a, b] = be.vertices;
        writeln!(w, "{} {GEOMETRY_SEGMENT} {a} {b}", be.attribute)?;
    }
    writeln!(w)?;
    writeln!(w, "vertices")?;
    writeln!(w, "{}", mesh.num_vertices())?;
    writeln!(w, "{}", mesh.dimension())?;
    for v in mesh.vertices() {
        writeln!(w, "{} {}", v[0], v[1])?;
    }
    Ok(())
}

/// Linear (vertex-valued) grid function. Higher-order fields are sampled at
/// the vertices by the caller.
pub fn write_vertex_field<W: Write>(w: &mut W, vertex_values: &[f64]) -> std::io::Result<()> {
    writeln!(w, "FiniteElementSpace")?;
    writeln!(w, "FiniteElementCollection: H1_2D_P1")?;
    writeln!(w, "VDim: 1")?;
    writeln!(w, "Ordering: 0")?;
    writeln!(w)?;
    for v in vertex_values {
        writeln!(w, "{v}")?;
    }
    Ok(())
}

/// Write `<dir>/refined.mesh` and `<dir>/sol.gf`.
pub fn save_solution(dir: &Path, mesh: &Mesh, vertex_values: &[f64]) -> OutputResult<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let mesh_path = dir.join("refined.mesh");
    let mut buf = Vec::new();
    write_mesh(&mut buf, mesh)?;
    fs::write(&mesh_path, buf)?;

    let sol_path = dir.join("sol.gf");
    let mut buf = Vec::new();
    write_vertex_field(&mut buf, vertex_values)?;
    fs::write(&sol_path, buf)?;
    Ok((mesh_path, sol_path))
}
