use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, RngCore};

/// Bit width of the range random shares are drawn from.
pub const SHARE_BITS: usize = 256;

/// Exclusive upper bound for random shares, 2^256.
pub fn share_upper_bound() -> BigUint {
    BigUint::one() << SHARE_BITS
}

/// Draws a share uniformly from [1, 2^256 - 1].
pub fn random_share<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> BigUint {
    rng.gen_biguint_range(&BigUint::one(), &share_upper_bound())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn shares_stay_in_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let upper = share_upper_bound();
        for _ in 0..256 {
            let share = random_share(&mut rng);
            assert!(!share.is_zero());
            assert!(share < upper);
            assert!(share.bits() <= SHARE_BITS as u64);
        }
    }

    #[test]
    fn os_rng_shares_differ() {
        let mut rng = rand::rngs::OsRng;
        assert_ne!(random_share(&mut rng), random_share(&mut rng));
    }
}
