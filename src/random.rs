//! Deterministic 15-bit linear-congruential generator.
//!
//! Not suitable for cryptography. The shared state is read and written
//! without a read-modify-write, so concurrent callers may observe repeated
//! values; threads that care should carry their own state with `rand_r`.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::constants::{RAND_DEFAULT_SEED, RAND_INCREMENT, RAND_MAX_EXCLUSIVE, RAND_MULTIPLIER};

static STATE: AtomicU32 = AtomicU32::new(RAND_DEFAULT_SEED);

#[inline]
fn step(state: u32) -> (u32, u32) {
    let next = state
        .wrapping_mul(RAND_MULTIPLIER)
        .wrapping_add(RAND_INCREMENT);
    (next, (next / 65_536) % RAND_MAX_EXCLUSIVE)
}

/// Replace the shared state
pub fn seed(value: u32) {
    STATE.store(value, Ordering::Relaxed);
}

/// Next value in `[0, 32768)` from the shared state
pub fn rand() -> u32 {
    let (next, out) = step(STATE.load(Ordering::Relaxed));
    STATE.store(next, Ordering::Relaxed);
    out
}

/// Next value in `[0, 32768)` from caller-owned state
pub fn rand_r(state: &mut u32) -> u32 {
    let (next, out) = step(*state);
    *state = next;
    out
}

/// 32 bits assembled from three draws of the shared state
pub fn random_u32() -> u32 {
    let hi = rand();
    let mid = rand();
    let lo = rand();
    (hi << 30) ^ (mid << 15) ^ lo
}

/// 64 bits assembled from two 32-bit values
pub fn random_u64() -> u64 {
    ((random_u32() as u64) << 32) | random_u32() as u64
}
