//! Streaming sink for a GLVis visualization server.
//!
//! A failed connection or write never aborts the run: the stream logs one
//! warning and turns itself off.

use std::io::{BufWriter, Write};
use std::net::TcpStream;

use hf_fem::GridFunction;
use hf_mesh::Mesh;
use tracing::{debug, warn};

use crate::mfem::{write_mesh, write_vertex_field};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 19916;

/// Scoped GLVis connection. Dropping the stream flushes it.
pub struct GlvisStream<W: Write = BufWriter<TcpStream>> {
    writer: Option<W>,
}

impl GlvisStream {
    /// Connect to `host:port`. Failure yields an inactive stream.
    pub fn connect(host: &str, port: u16) -> Self {
        match TcpStream::connect((host, port)) {
            Ok(stream) => {
                debug!(host, port, "connected to GLVis server");
                Self::from_writer(BufWriter::new(stream))
            }
            Err(e) => {
                warn!(host, port, error = %e, "GLVis server unavailable, visualization disabled");
                Self::inactive()
            }
        }
    }
}

impl<W: Write> GlvisStream<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    pub fn inactive() -> Self {
        Self { writer: None }
    }

    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    /// First frame: mesh, field and window title.
    pub fn append(&mut self, mesh: &Mesh, field: &GridFunction, title: &str) {
        let values = field.values_at_vertices();
        self.send(|w| {
            writeln!(w, "solution")?;
            write_mesh(w, mesh)?;
            write_vertex_field(w, &values)?;
            writeln!(w, "window_title '{title}'")
        });
    }

    /// Replace the displayed field.
    pub fn update(&mut self, mesh: &Mesh, field: &GridFunction) {
        let values = field.values_at_vertices();
        self.send(|w| {
            writeln!(w, "solution")?;
            write_mesh(w, mesh)?;
            write_vertex_field(w, &values)
        });
    }

    /// Fix the color range.
    pub fn set_bounds(&mut self, lo: f64, hi: f64) {
        self.send(|w| writeln!(w, "valuerange {lo} {hi}"));
    }

    /// Ask the viewer to pause until the user resumes.
    pub fn pause(&mut self) {
        self.send(|w| writeln!(w, "pause"));
    }

    fn send<F>(&mut self, frame: F)
    where
        F: FnOnce(&mut W) -> std::io::Result<()>,
    {
        let Some(w) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = frame(&mut *w).and_then(|()| w.flush()) {
            warn!(error = %e, "GLVis stream closed, visualization disabled");
            self.writer = None;
        }
    }
}

impl<W: Write> Drop for GlvisStream<W> {
    fn drop(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }
}
