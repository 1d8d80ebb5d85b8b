use crate::enums::Interpolation;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

pub(crate) struct Interpolator;

impl Interpolator {
    /// `spacing` is (row, column, slice) in mm, `original_dim` is
    /// (depth, height, width). Returns the same axes scaled to the finest
    /// spacing.
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f32, f32, f32),
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        let (y_spacing, x_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        if !(min_spacing > 0.0) {
            return original_dim;
        }
        let inv_min_spacing = 1.0 / min_spacing;

        let new_x = (original_dim.2 as f32 * x_spacing * inv_min_spacing) as usize;
        let new_y = (original_dim.1 as f32 * y_spacing * inv_min_spacing) as usize;
        let new_z = (original_dim.0 as f32 * z_spacing * inv_min_spacing) as usize;

        (new_z.max(1), new_y.max(1), new_x.max(1))
    }

    /// Resample `source` to `(height, width)`.
    pub(crate) fn resample(
        source: &ArrayView2<'_, u8>,
        (height, width): (usize, usize),
        interpolation: Interpolation,
    ) -> Array2<u8> {
        if source.dim() == (height, width) {
            return source.to_owned();
        }
        if source.is_empty() || height == 0 || width == 0 {
            return Array2::zeros((height, width));
        }

        match interpolation {
            Interpolation::Area => Self::area_resample(source, height, width),
            Interpolation::Bilinear => Self::bilinear_resample(source, height, width),
            Interpolation::None => Self::nearest_resample(source, height, width),
        }
    }

    /// For each output cell along one axis, the source cells it covers and
    /// the covered fraction of the output cell. Weights of a cell sum to 1.
    fn area_weights(source_len: usize, target_len: usize) -> Vec<Vec<(usize, f32)>> {
        let scale = source_len as f64 / target_len as f64;
        (0..target_len)
            .map(|out| {
                let start = out as f64 * scale;
                let end = start + scale;
                let first = start.floor() as usize;
                let last = (end.ceil() as usize).min(source_len);
                (first..last)
                    .filter_map(|src| {
                        let covered = end.min((src + 1) as f64) - start.max(src as f64);
                        (covered > 1e-12).then(|| (src, (covered / scale) as f32))
                    })
                    .collect()
            })
            .collect()
    }

    // Separable: rows first, then columns.
    fn area_resample(source: &ArrayView2<'_, u8>, height: usize, width: usize) -> Array2<u8> {
        let (source_height, source_width) = source.dim();
        let x_weights = Self::area_weights(source_width, width);
        let y_weights = Self::area_weights(source_height, height);

        let rows: Vec<Vec<f32>> = (0..source_height)
            .into_par_iter()
            .map(|y| {
                let row = source.row(y);
                x_weights
                    .iter()
                    .map(|taps| taps.iter().map(|&(x, w)| row[x] as f32 * w).sum())
                    .collect()
            })
            .collect();

        let pixel_data: Vec<u8> = y_weights
            .par_iter()
            .flat_map_iter(|taps| {
                let rows = &rows;
                (0..width).map(move |x| {
                    let value: f32 = taps.iter().map(|&(y, w)| rows[y][x] * w).sum();
                    value.round().clamp(0.0, 255.0) as u8
                })
            })
            .collect();

        Array2::from_shape_vec((height, width), pixel_data)
            .unwrap_or_else(|_| Array2::zeros((height, width)))
    }

    fn bilinear_resample(source: &ArrayView2<'_, u8>, height: usize, width: usize) -> Array2<u8> {
        let (slice_height, slice_width) = source.dim();
        let slice = source.mapv(f32::from);
        let slice = slice.view();

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        // Normalized coordinates with half-pixel offset
                        let norm_x = (x as f32 + 0.5) / width as f32;
                        let norm_y = (y as f32 + 0.5) / height as f32;

                        let src_x = norm_x * slice_width as f32 - 0.5;
                        let src_y = norm_y * slice_height as f32 - 0.5;

                        let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

                        let value = Self::bilinear_interpolate(&slice, src_y, src_x);
                        value.round().clamp(0.0, 255.0) as u8
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        Array2::from_shape_vec((height, width), pixel_data)
            .unwrap_or_else(|_| Array2::zeros((height, width)))
    }

    fn nearest_resample(source: &ArrayView2<'_, u8>, height: usize, width: usize) -> Array2<u8> {
        let (source_height, source_width) = source.dim();
        Array2::from_shape_fn((height, width), |(y, x)| {
            let src_y = (y * source_height / height).min(source_height - 1);
            let src_x = (x * source_width / width).min(source_width - 1);
            source[[src_y, src_x]]
        })
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}
