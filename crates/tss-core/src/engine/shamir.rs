//! Shamir sharing over the Ed25519 scalar field

use crate::{Error, Result};
use curve25519_dalek::{constants::ED25519_BASEPOINT_POINT, EdwardsPoint, Scalar};
use std::collections::BTreeMap;

/// Evaluate the polynomial with the given coefficients at `x`
pub fn evaluate(coefficients: &[Scalar], x: u8) -> Scalar {
    let x_scalar = Scalar::from(u64::from(x));
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;

    for coef in coefficients {
        result += coef * x_power;
        x_power *= x_scalar;
    }

    result
}

/// Split `secret` at `indices` with a degree `threshold - 1` polynomial.
///
/// `coefficients` supplies the non-constant terms; returns the shares and
/// the Feldman commitments to those terms.
pub fn split(
    secret: Scalar,
    coefficients: &[Scalar],
    indices: &[u8],
) -> (BTreeMap<u8, Scalar>, Vec<EdwardsPoint>) {
    let mut poly = Vec::with_capacity(coefficients.len() + 1);
    poly.push(secret);
    poly.extend_from_slice(coefficients);

    let shares = indices.iter().map(|&x| (x, evaluate(&poly, x))).collect();
    let commitments = coefficients
        .iter()
        .map(|a| ED25519_BASEPOINT_POINT * a)
        .collect();

    (shares, commitments)
}

/// Check `share` against the public constant term and coefficient commitments
pub fn verify(share: Scalar, y: &EdwardsPoint, commitments: &[EdwardsPoint], index: u8) -> bool {
    let x_scalar = Scalar::from(u64::from(index));
    let mut expected = *y;
    let mut x_power = x_scalar;

    for v in commitments {
        expected += v * x_power;
        x_power *= x_scalar;
    }

    ED25519_BASEPOINT_POINT * share == expected
}

/// Lagrange coefficient of `index` for interpolation at zero over `indices`
pub fn lagrange_coefficient(index: u8, indices: &[u8]) -> Result<Scalar> {
    if index == 0 || indices.contains(&0) {
        return Err(Error::Crypto("Share index 0 holds the secret itself".into()));
    }

    let i = Scalar::from(u64::from(index));
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for &j_index in indices {
        if j_index == index {
            continue;
        }
        let j = Scalar::from(u64::from(j_index));
        numerator *= j;
        denominator *= j - i;
    }

    Ok(numerator * denominator.invert())
}

/// Interpolate the shared secret from `(index, share)` pairs
pub fn combine(shares: &BTreeMap<u8, Scalar>) -> Result<Scalar> {
    let indices: Vec<u8> = shares.keys().copied().collect();
    let mut secret = Scalar::ZERO;

    for (&index, share) in shares {
        secret += share * lagrange_coefficient(index, &indices)?;
    }

    Ok(secret)
}
