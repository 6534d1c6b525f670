//! Orthonormal DCT over the spectral bands
//!
//! The split VQ tables quantise log band magnitudes; the synthesizer wants
//! cepstral coefficients. `dct` is the forward transform used by the
//! feature analysis, `idct` its inverse.

use once_cell::sync::Lazy;

use crate::features::NB_BANDS;

/// `DCT_TABLE[i * NB_BANDS + j] = cos((i + 0.5) * j * pi / NB_BANDS)`, first
/// column scaled by sqrt(1/2)
static DCT_TABLE: Lazy<[f32; NB_BANDS * NB_BANDS]> = Lazy::new(|| {
    let mut table = [0.0f32; NB_BANDS * NB_BANDS];
    let nb_bands = NB_BANDS as f32;
    let scale = 0.5f32.sqrt();
    for i in 0..NB_BANDS {
        for j in 0..NB_BANDS {
            let mut value = ((i as f32 + 0.5) * j as f32 * std::f32::consts::PI / nb_bands).cos();
            if j == 0 {
                value *= scale;
            }
            table[i * NB_BANDS + j] = value;
        }
    }
    table
});

fn output_scale() -> f32 {
    (2.0 / NB_BANDS as f32).sqrt()
}

/// Forward transform: log band magnitudes to cepstrum
pub fn dct(input: &[f32; NB_BANDS]) -> [f32; NB_BANDS] {
    let table = &*DCT_TABLE;
    let scale = output_scale();
    let mut out = [0.0f32; NB_BANDS];
    for i in 0..NB_BANDS {
        let mut sum = 0.0f32;
        for j in 0..NB_BANDS {
            sum += input[j] * table[j * NB_BANDS + i];
        }
        out[i] = sum * scale;
    }
    out
}

/// Inverse transform: cepstrum to log band magnitudes
pub fn idct(input: &[f32; NB_BANDS]) -> [f32; NB_BANDS] {
    let table = &*DCT_TABLE;
    let scale = output_scale();
    let mut out = [0.0f32; NB_BANDS];
    for i in 0..NB_BANDS {
        let mut sum = 0.0f32;
        for j in 0..NB_BANDS {
            sum += input[j] * table[i * NB_BANDS + j];
        }
        out[i] = sum * scale;
    }
    out
}

/// Replace `bands` with its forward transform
pub fn dct_in_place(bands: &mut [f32; NB_BANDS]) {
    *bands = dct(bands);
}
