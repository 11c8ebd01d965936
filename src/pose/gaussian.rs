use ndarray::prelude::*;
use crate::error::Error;

///
/// Quantized 2-D Gaussian smoothing kernel.
///
/// The outer product of a sampled 1-D Gaussian is divided by its own sum and
/// by its corner sample, then floored, so every weight is a small integer
/// (`size = 5, sigma = 2.5` gives a 2/3/4 pyramid). Filtered values are
/// divided by the total weight, which keeps flat regions flat.
///
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    weights: Array2<f32>,
    total: f32,
}

impl GaussianKernel {
    pub fn new(size: usize, sigma: f64) -> Result<Self, Error> {
        if size == 0 || size % 2 == 0 {
            return Err(Error::InvalidConfig(format!("gaussian kernel size must be odd, got {}", size)));
        }

        if !(sigma > 0.0) {
            return Err(Error::InvalidConfig(format!("gaussian sigma must be positive, got {}", sigma)));
        }

        let half = (size / 2) as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let coeff = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * sigma);

        let kern1d: Array1<f64> = (-half..=half)
            .map(|i| coeff * (-((i * i) as f64) / two_sigma_sq).exp())
            .collect();

        let kern2d = Array2::from_shape_fn((size, size), |(i, j)| kern1d[i] * kern1d[j]);

        let sum: f64 = kern2d.iter().sum();
        let scalar = 1.0 / kern2d[(0, 0)];

        let weights = kern2d.mapv(|v| ((v / sum) * scalar).floor() as f32);
        let total: f32 = weights.iter().sum();

        if total <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "gaussian kernel {}x{} with sigma {} quantizes to zero", size, size, sigma)));
        }

        Ok(Self { weights, total })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.weights.nrows()
    }

    #[inline]
    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    #[inline]
    pub fn total(&self) -> f32 {
        self.total
    }

    /// Smooth every channel of a `[channel][row][col]` stack.
    ///
    /// Cells closer than `size / 2` to any border are copied unchanged.
    pub fn apply(&self, maps: ArrayView3<'_, f32>) -> Array3<f32> {
        let (channels, rows, cols) = maps.dim();
        let half = self.size() / 2;
        let mut out = maps.to_owned();

        if rows <= 2 * half || cols <= 2 * half {
            return out;
        }

        for c in 0..channels {
            let plane = maps.index_axis(Axis(0), c);
            let mut target = out.index_axis_mut(Axis(0), c);

            for y in half..rows - half {
                for x in half..cols - half {
                    let window = plane.slice(s![y - half..y + half + 1, x - half..x + half + 1]);
                    let sum = window
                        .iter()
                        .zip(self.weights.iter())
                        .fold(0.0f32, |acc, (v, w)| acc + v * w);

                    target[(y, x)] = sum / self.total;
                }
            }
        }

        out
    }
}

#[test]
fn quantized_kernel_test() {
    let kernel = GaussianKernel::new(5, 2.5).unwrap();
    let expected = arr2(&[
        [2.0f32, 2., 2., 2., 2.],
        [2., 3., 3., 3., 2.],
        [2., 3., 4., 3., 2.],
        [2., 3., 3., 3., 2.],
        [2., 2., 2., 2., 2.],
    ]);

    assert_eq!(kernel.weights(), expected.view());
    assert_eq!(kernel.total(), 60.0);

    let kernel = GaussianKernel::new(3, 1.0).unwrap();
    assert_eq!(kernel.weights(), arr2(&[[1.0f32, 2., 1.], [2., 3., 2.], [1., 2., 1.]]).view());
}

#[test]
fn invalid_kernel_test() {
    assert!(GaussianKernel::new(4, 2.5).is_err());
    assert!(GaussianKernel::new(0, 2.5).is_err());
    assert!(GaussianKernel::new(5, 0.0).is_err());
    assert!(GaussianKernel::new(5, -1.0).is_err());
}

#[test]
fn uniform_input_test() {
    let kernel = GaussianKernel::new(5, 2.5).unwrap();
    let maps = Array3::from_elem((2, 12, 10), 0.5f32);
    let out = kernel.apply(maps.view());

    assert_eq!(out.dim(), maps.dim());
    for ((_, y, x), &v) in out.indexed_iter() {
        if y < 2 || y >= 10 || x < 2 || x >= 8 {
            assert_eq!(v, 0.5, "border cell ({}, {}) changed", y, x);
        } else {
            assert!((v - 0.5).abs() < 1e-6, "interior cell ({}, {}) = {}", y, x, v);
        }
    }
}

#[test]
fn spike_is_spread_test() {
    let kernel = GaussianKernel::new(5, 2.5).unwrap();
    let mut maps = Array3::zeros((1, 9, 9));
    maps[(0, 4, 4)] = 60.0f32;

    let out = kernel.apply(maps.view());

    assert_eq!(out[(0, 4, 4)], 4.0);
    assert_eq!(out[(0, 3, 4)], 3.0);
    assert_eq!(out[(0, 2, 2)], 2.0);
    assert_eq!(out[(0, 1, 1)], 0.0);
    // the input is left untouched
    assert_eq!(maps[(0, 4, 4)], 60.0);
}

#[test]
fn map_smaller_than_kernel_test() {
    let kernel = GaussianKernel::new(5, 2.5).unwrap();
    let maps = Array3::from_shape_fn((1, 3, 3), |(_, y, x)| (y * 3 + x) as f32);

    assert_eq!(kernel.apply(maps.view()), maps);
}
