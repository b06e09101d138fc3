//! Plain-text curve format.
//!
//! ```text
//! # comment
//! closed
//! 0.0 0.0
//! 1.0 0.0 0.0 -1.0
//! ```
//!
//! The first non-comment line is `closed` or `open`. Every following line
//! holds one vertex, `x y`, optionally followed by a normal `nx ny`. Normals
//! are all-or-nothing: either every vertex has one (they become custom
//! normals) or none does (they are estimated).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use conisub::curve::Curve;
use conisub::error::CurveError;
use nalgebra::{Point2, Vector2};
use thiserror::Error;

/// Errors reading or writing a curve file.
#[derive(Error, Debug)]
pub enum TextError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Well-formed file describing an invalid curve.
    #[error("{path}: {source}")]
    Curve {
        path: PathBuf,
        source: CurveError,
    },
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Curve, TextError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse(&text, path)
}

pub fn save<P: AsRef<Path>>(curve: &Curve, path: P) -> Result<(), TextError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(curve, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn parse(text: &str, path: &Path) -> Result<Curve, TextError> {
    let parse_error = |line: usize, message: String| TextError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").trim()))
        .filter(|(_, l)| !l.is_empty());

    let closed = match lines.next() {
        Some((_, "closed")) => true,
        Some((_, "open")) => false,
        Some((line, other)) => {
            return Err(parse_error(line, format!("expected 'closed' or 'open', found '{}'", other)))
        }
        None => return Err(parse_error(1, "empty curve file".to_string())),
    };

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut with_normals = None;

    for (line, content) in lines {
        let values = content
            .split_whitespace()
            .map(|t| t.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| parse_error(line, e.to_string()))?;

        let has_normal = match values.len() {
            2 => false,
            4 => true,
            n => return Err(parse_error(line, format!("expected 2 or 4 numbers, found {}", n))),
        };
        if *with_normals.get_or_insert(has_normal) != has_normal {
            return Err(parse_error(line, "normals must be given for all vertices or none".to_string()));
        }

        vertices.push(Point2::new(values[0], values[1]));
        if has_normal {
            normals.push(Vector2::new(values[2], values[3]));
        }
    }

    let curve_error = |source| TextError::Curve {
        path: path.to_path_buf(),
        source,
    };

    if with_normals == Some(true) {
        Curve::from_parts(vertices, normals, closed).map_err(curve_error)
    } else {
        if let Some(index) = vertices.iter().position(|v| !(v.x.is_finite() && v.y.is_finite())) {
            return Err(curve_error(CurveError::NonFiniteVertex { index }));
        }
        Ok(Curve::from_vertices(vertices, closed))
    }
}

fn write<W: Write>(curve: &Curve, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "# {} vertices", curve.len())?;
    writeln!(out, "{}", if curve.is_closed() { "closed" } else { "open" })?;
    for (p, n) in curve.vertices().iter().zip(curve.normals()) {
        writeln!(out, "{} {} {} {}", p.x, p.y, n.x, n.y)?;
    }
    Ok(())
}
