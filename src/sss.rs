//! XOR secret splitting.
//!
//! A secret is split into `n` shares where the first `n - 1` are uniformly random
//! 256-bit values and the last one is the secret XORed with all of them. Every
//! share is required to reconstruct; there is no threshold and no integrity check,
//! so a missing or altered share silently produces a different value.

use num_bigint::BigUint;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::debug;

use crate::error::{QrShareError, Result};
use crate::generator::random_share;

pub struct XorSS {
    shares: Vec<BigUint>,
}

impl XorSS {
    pub fn create(secret: &BigUint, num_shares: usize) -> Result<Self> {
        Self::create_with_rng(secret, num_shares, &mut OsRng)
    }

    pub fn create_with_rng<R: RngCore + CryptoRng + ?Sized>(
        secret: &BigUint,
        num_shares: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if num_shares < 1 {
            return Err(QrShareError::InvalidArgument(format!(
                "share count must be at least 1, got {}",
                num_shares
            )));
        }

        let mut acc = secret.clone();
        let mut shares = Vec::with_capacity(num_shares);
        for index in 1..num_shares {
            let share = random_share(rng);
            acc ^= &share;
            shares.push(share);
            debug!(index, "generated random share");
        }
        shares.push(acc);

        Ok(Self { shares })
    }

    pub fn shares(&self) -> &[BigUint] {
        &self.shares
    }

    pub fn into_shares(self) -> Vec<BigUint> {
        self.shares
    }

    pub fn reconstruct(&self) -> BigUint {
        combine(&self.shares)
    }
}

/// Splits `secret` into `num_shares` shares using the OS random source.
pub fn split(secret: &BigUint, num_shares: usize) -> Result<Vec<BigUint>> {
    XorSS::create(secret, num_shares).map(XorSS::into_shares)
}

pub fn split_with_rng<R: RngCore + CryptoRng + ?Sized>(
    secret: &BigUint,
    num_shares: usize,
    rng: &mut R,
) -> Result<Vec<BigUint>> {
    XorSS::create_with_rng(secret, num_shares, rng).map(XorSS::into_shares)
}

/// XOR-folds shares starting from zero. An empty input yields zero.
pub fn combine<'a, I>(shares: I) -> BigUint
where
    I: IntoIterator<Item = &'a BigUint>,
{
    shares.into_iter().fold(BigUint::default(), |mut acc, share| {
        acc ^= share;
        acc
    })
}
