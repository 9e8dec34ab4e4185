//! Exact Euclidean distance transform
//!
//! Separable lower-envelope-of-parabolas algorithm (Felzenszwalb &
//! Huttenlocher): one 1D pass down every column, then one along every row,
//! on squared distances.

use ndarray::{Array2, ArrayView2, Axis};

/// Euclidean distance from every pixel to the nearest `true` pixel
///
/// Foreground pixels get 0. Every pixel is `f64::INFINITY` when there is no
/// foreground at all.
pub fn distance_to_foreground(foreground: ArrayView2<'_, bool>) -> Array2<f64> {
    let mut squared = foreground.mapv(|fg| if fg { 0.0 } else { f64::INFINITY });

    let mut scratch = Scratch::default();
    for axis in [Axis(0), Axis(1)] {
        for mut lane in squared.lanes_mut(axis) {
            let input: Vec<f64> = lane.iter().copied().collect();
            scratch.transform(&input);
            for (dst, &src) in lane.iter_mut().zip(scratch.output.iter()) {
                *dst = src;
            }
        }
    }

    squared.mapv_inplace(f64::sqrt);
    squared
}

/// Reusable buffers for the 1D transform
#[derive(Default)]
struct Scratch {
    /// Positions of parabolas in the lower envelope
    vertices: Vec<usize>,
    /// Left boundary of each envelope parabola
    bounds: Vec<f64>,
    output: Vec<f64>,
}

impl Scratch {
    /// Squared-distance transform of one lane; infinite samples never
    /// contribute a parabola
    fn transform(&mut self, f: &[f64]) {
        let n = f.len();
        self.vertices.clear();
        self.bounds.clear();
        self.output.clear();
        self.output.resize(n, f64::INFINITY);

        for q in 0..n {
            if !f[q].is_finite() {
                continue;
            }

            let mut boundary = f64::NEG_INFINITY;
            while let Some(&p) = self.vertices.last() {
                let s = intersection(f, p, q);
                if s <= self.bounds[self.bounds.len() - 1] {
                    self.vertices.pop();
                    self.bounds.pop();
                    boundary = f64::NEG_INFINITY;
                } else {
                    boundary = s;
                    break;
                }
            }
            self.vertices.push(q);
            self.bounds.push(boundary);
        }

        if self.vertices.is_empty() {
            return;
        }

        let mut k = 0;
        for q in 0..n {
            while k + 1 < self.vertices.len() && self.bounds[k + 1] < q as f64 {
                k += 1;
            }
            let p = self.vertices[k];
            let d = q as f64 - p as f64;
            self.output[q] = d * d + f[p];
        }
    }
}

/// Abscissa where the parabolas rooted at `p` and `q` (p < q) intersect
fn intersection(f: &[f64], p: usize, q: usize) -> f64 {
    let (pf, qf) = (p as f64, q as f64);
    ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * (qf - pf))
}
