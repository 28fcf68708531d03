//! Two-dimensional lookup table with clamped reads.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Offset below the upper axis edge used when clamping, keeping reads out of
/// the overflow bin.
pub const CLAMP_EPSILON: f64 = 1e-4;

/// Binned 2-D table, `contents[ix][iy]` for x bin `ix` and y bin `iy`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Histogram2D {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub contents: Vec<Vec<f64>>,
}

impl Histogram2D {
    pub fn new(x_edges: Vec<f64>, y_edges: Vec<f64>, contents: Vec<Vec<f64>>) -> Result<Self> {
        let hist = Self {
            x_edges,
            y_edges,
            contents,
        };
        hist.validate()?;
        Ok(hist)
    }

    /// Check edge monotonicity, clamp headroom and content shape.
    pub fn validate(&self) -> Result<()> {
        for (axis, edges) in [("x", &self.x_edges), ("y", &self.y_edges)] {
            if edges.len() < 2 {
                return Err(Error::Config(format!(
                    "histogram {axis} axis needs at least two edges"
                )));
            }
            if edges.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(Error::Config(format!(
                    "histogram {axis} edges must be strictly increasing"
                )));
            }
            let max = edges[edges.len() - 1];
            if find_bin(edges, max - CLAMP_EPSILON).is_none() {
                return Err(Error::Config(format!(
                    "histogram {axis} axis [{}, {max}] cannot be clamped {CLAMP_EPSILON} below its maximum",
                    edges[0]
                )));
            }
        }
        let nx = self.x_edges.len() - 1;
        let ny = self.y_edges.len() - 1;
        if self.contents.len() != nx || self.contents.iter().any(|row| row.len() != ny) {
            return Err(Error::Config(format!(
                "histogram contents must have shape {nx}x{ny}"
            )));
        }
        Ok(())
    }

    pub fn x_max(&self) -> f64 {
        self.x_edges[self.x_edges.len() - 1]
    }
    pub fn y_max(&self) -> f64 {
        self.y_edges[self.y_edges.len() - 1]
    }

    /// Content of the bin holding `(x, y)`, `None` outside the table.
    pub fn lookup(&self, x: f64, y: f64) -> Option<f64> {
        let ix = find_bin(&self.x_edges, x)?;
        let iy = find_bin(&self.y_edges, y)?;
        Some(self.contents[ix][iy])
    }

    /// Lookup with inputs clamped into the table: values at or above an axis
    /// maximum read at `max - CLAMP_EPSILON`, values below the first edge read
    /// the first bin.
    pub fn lookup_clamped(&self, x: f64, y: f64) -> f64 {
        self.contents[clamped_bin(&self.x_edges, x)][clamped_bin(&self.y_edges, y)]
    }
}

fn clamped_bin(edges: &[f64], value: f64) -> usize {
    let last = edges.len() - 2;
    let max = edges[edges.len() - 1];
    if value >= max || value.is_nan() {
        find_bin(edges, max - CLAMP_EPSILON).unwrap_or(last)
    } else if value < edges[0] {
        0
    } else {
        find_bin(edges, value).unwrap_or(last)
    }
}

/// Bin index of `value` for half-open bins `[edges[i], edges[i+1])`.
pub fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    if edges.len() < 2 || !(value >= edges[0]) || value >= edges[edges.len() - 1] {
        return None;
    }
    Some(edges.partition_point(|&edge| edge <= value) - 1)
}
