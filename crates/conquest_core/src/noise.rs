//! Seeded value noise summed over octaves.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const LACUNARITY: f32 = 2.0;
const PERSISTENCE: f32 = 0.5;

/// One layer of the fractal sum: its own lattice key and a sub-cell shift
/// so octaves don't share grid lines.
#[derive(Debug, Clone, Copy)]
struct Octave {
    key: u64,
    shift: (f32, f32),
    scale: f32,
    weight: f32,
}

/// One independent noise field. Fields built from the same match seed with
/// different salts are uncorrelated.
#[derive(Debug, Clone)]
pub struct NoiseField {
    octaves: Vec<Octave>,
    feature_size: f32,
    total_weight: f32,
}

impl NoiseField {
    pub fn new(match_seed: u64, salt: u32, octaves: u32, feature_size: f32) -> Self {
        let salt = u64::from(salt);
        let mut rng = ChaCha8Rng::seed_from_u64(match_seed ^ ((salt << 32) | salt));
        let mut scale = 1.0;
        let mut weight = 1.0;
        let octaves: Vec<Octave> = (0..octaves.max(1))
            .map(|_| {
                let octave = Octave {
                    key: rng.gen(),
                    shift: (rng.gen(), rng.gen()),
                    scale,
                    weight,
                };
                scale *= LACUNARITY;
                weight *= PERSISTENCE;
                octave
            })
            .collect();
        let total_weight = octaves.iter().map(|o| o.weight).sum();
        Self {
            octaves,
            feature_size: feature_size.max(1.0),
            total_weight,
        }
    }

    /// Fractal value in `[0, 1]` at a grid cell.
    pub fn sample(&self, x: i32, y: i32) -> f32 {
        let u = x as f32 / self.feature_size;
        let v = y as f32 / self.feature_size;
        let sum: f32 = self
            .octaves
            .iter()
            .map(|o| {
                let (du, dv) = o.shift;
                o.weight * lattice(o.key, u * o.scale + du, v * o.scale + dv)
            })
            .sum();
        (sum / self.total_weight).clamp(0.0, 1.0)
    }
}

/// Samples `field` over a `width × height` grid and stretches the result to `[0, 1]`.
pub fn normalised_grid(field: &NoiseField, width: i32, height: i32) -> Vec<f32> {
    let mut values: Vec<f32> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| field.sample(x, y))
        .collect();
    let (lo, hi) = values
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if hi - lo > f32::EPSILON {
        values.iter_mut().for_each(|v| *v = (*v - lo) / (hi - lo));
    }
    values
}

/// Bilinear blend of the four corner values around `(u, v)` with a quintic fade.
fn lattice(key: u64, u: f32, v: f32) -> f32 {
    let (cx, cy) = (u.floor(), v.floor());
    let (fx, fy) = (fade(u - cx), fade(v - cy));
    let (cx, cy) = (cx as i64, cy as i64);
    let corner = |dx: i64, dy: i64| unit_interval(splitmix(key ^ cell_bits(cx + dx, cy + dy)));

    let top = corner(0, 0) + (corner(1, 0) - corner(0, 0)) * fx;
    let bottom = corner(0, 1) + (corner(1, 1) - corner(0, 1)) * fx;
    top + (bottom - top) * fy
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[allow(clippy::cast_sign_loss)]
fn cell_bits(x: i64, y: i64) -> u64 {
    (x as u64).rotate_left(32) ^ (y as u64)
}

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Top 24 bits as a float in `[0, 1]`.
fn unit_interval(bits: u64) -> f32 {
    (bits >> 40) as f32 / ((1u64 << 24) - 1) as f32
}
