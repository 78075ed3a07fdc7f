use rand::Rng;

/// Upper bound (exclusive) for randomly drawn seeds.
pub const RANDOM_SEED_BOUND: u64 = 1 << 32;

/// Seed for variant `index` of a `count`-variant job.
///
/// A negative `base_seed` means "random": every call draws a fresh value.
/// Otherwise the result is pure: the base itself for single-variant jobs,
/// `base + index` for batches.
pub fn allocate_seed(base_seed: i64, index: u32, count: u32) -> u64 {
    allocate_seed_with(&mut rand::rng(), base_seed, index, count)
}

pub fn allocate_seed_with<R: Rng + ?Sized>(
    rng: &mut R,
    base_seed: i64,
    index: u32,
    count: u32,
) -> u64 {
    if base_seed < 0 {
        return rng.random_range(0..RANDOM_SEED_BOUND);
    }

    let base = base_seed as u64;
    if count > 1 {
        base + u64::from(index)
    } else {
        base
    }
}
