use std::f32::consts::TAU;
use std::ops::RangeBounds;

use nalgebra::Vector3;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::{Error, Rng, RngCore, SeedableRng};

pub fn random_vec<T, R, G>(range: R, rng: &mut G) -> Vector3<T>
where
    T: SampleUniform + nalgebra::Scalar,
    R: RangeBounds<T> + SampleRange<T> + Clone,
    G: Rng + ?Sized,
{
    Vector3::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}

pub fn random_unit_vector<G: Rng + ?Sized>(rng: &mut G) -> Vector3<f32> {
    let z = 1.0 - 2.0 * rng.gen::<f32>();
    let phi = TAU * rng.gen::<f32>();
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Counter-based random stream keyed by pixel and frame.
///
/// Every draw re-hashes the state, so each bounce of a path consumes the next
/// values of the same stream. The WGSL kernel derives its seed the same way.
#[derive(Debug, Clone)]
pub struct PixelRng {
    state: u32,
}

impl PixelRng {
    pub fn for_sample(pixel_index: u32, frame_index: u32) -> Self {
        Self {
            state: pcg_hash(pixel_index.wrapping_add(pcg_hash(frame_index))),
        }
    }
}

impl RngCore for PixelRng {
    fn next_u32(&mut self) -> u32 {
        self.state = pcg_hash(self.state);
        self.state
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for PixelRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u32::from_le_bytes(seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn test_unit_vector_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_unit_vector(&mut rng);
            assert!((v.magnitude() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_unit_vector_is_centered() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let sum: Vector3<f32> = (0..n).map(|_| random_unit_vector(&mut rng)).sum();
        let mean = sum / n as f32;
        assert!(mean.magnitude() < 0.05, "mean = {mean:?}");
    }

    #[test]
    fn test_random_vec_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = random_vec(-0.5f32..0.5, &mut rng);
            assert!(v.iter().all(|c| (-0.5..0.5).contains(c)));
        }
    }

    #[test]
    fn test_pixel_rng_streams_differ() {
        let a: Vec<u32> = {
            let mut rng = PixelRng::for_sample(10, 1);
            (0..4).map(|_| rng.next_u32()).collect()
        };
        let b: Vec<u32> = {
            let mut rng = PixelRng::for_sample(10, 2);
            (0..4).map(|_| rng.next_u32()).collect()
        };
        let c: Vec<u32> = {
            let mut rng = PixelRng::for_sample(11, 1);
            (0..4).map(|_| rng.next_u32()).collect()
        };
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_pixel_rng_is_deterministic() {
        let mut a = PixelRng::for_sample(42, 9);
        let mut b = PixelRng::for_sample(42, 9);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_pixel_rng_floats_in_unit_interval() {
        let mut rng = PixelRng::for_sample(5, 5);
        for _ in 0..1000 {
            let f: f32 = rng.gen();
            assert!((0.0..1.0).contains(&f));
        }
    }
}
