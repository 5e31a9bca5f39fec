//! Univariate and bivariate standard normal distribution functions.
//!
//! The univariate CDF goes through `statrs`' `erfc`, good to about 1e-11
//! in the tails. The bivariate CDF follows Genz's Gauss–Legendre scheme
//! (Drezner & Wesolowsky with the Genz refinements for high correlations),
//! whose quadrature error is around 1e-15 on top of the univariate terms.

use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::{PI, SQRT_2};

/// Standard normal CDF.
pub fn pnorm(x: f64) -> f64 {
    if x == f64::INFINITY {
        return 1.0;
    }
    if x == f64::NEG_INFINITY {
        return 0.0;
    }
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal quantile function.
///
/// Returns `-inf` for `p <= 0` and `+inf` for `p >= 1`.
pub fn qnorm(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

const GL6_W: [f64; 3] = [0.1713244923791705, 0.3607615730481384, 0.4679139345726904];
const GL6_X: [f64; 3] = [0.9324695142031522, 0.6612093864662647, 0.2386191860831970];

const GL12_W: [f64; 6] = [
    0.04717533638651177,
    0.1069393259953183,
    0.1600783285433464,
    0.2031674267230659,
    0.2334925365383547,
    0.2491470458134029,
];
const GL12_X: [f64; 6] = [
    0.9815606342467191,
    0.9041172563704750,
    0.7699026741943050,
    0.5873179542866171,
    0.3678314989981802,
    0.1252334085114692,
];

const GL20_W: [f64; 10] = [
    0.01761400713915212,
    0.04060142980038694,
    0.06267204833410906,
    0.08327674157670475,
    0.1019301198172404,
    0.1181945319615184,
    0.1316886384491766,
    0.1420961093183821,
    0.1491729864726037,
    0.1527533871307259,
];
const GL20_X: [f64; 10] = [
    0.9931285991850949,
    0.9639719272779138,
    0.9122344282513259,
    0.8391169718222188,
    0.7463319064601508,
    0.6360536807265150,
    0.5108670019508271,
    0.3737060887154196,
    0.2277858511416451,
    0.07652652113349733,
];

/// Nodes on [0, 2] and weights for the rule selected by |r|.
fn quadrature(r: f64) -> (Vec<f64>, Vec<f64>) {
    let (w, x): (&[f64], &[f64]) = if r.abs() < 0.3 {
        (&GL6_W, &GL6_X)
    } else if r.abs() < 0.75 {
        (&GL12_W, &GL12_X)
    } else {
        (&GL20_W, &GL20_X)
    };

    let nodes = x
        .iter()
        .map(|xi| 1.0 - xi)
        .chain(x.iter().map(|xi| 1.0 + xi))
        .collect();
    let weights = w.iter().chain(w.iter()).copied().collect();
    (nodes, weights)
}

/// Upper orthant probability `P(X > h, Y > k)` for a standard bivariate
/// normal with correlation `r`.
pub fn bvn_upper(h: f64, k: f64, r: f64) -> f64 {
    if h == f64::INFINITY || k == f64::INFINITY {
        return 0.0;
    }
    if h == f64::NEG_INFINITY {
        return if k == f64::NEG_INFINITY { 1.0 } else { pnorm(-k) };
    }
    if k == f64::NEG_INFINITY {
        return pnorm(-h);
    }
    if r == 0.0 {
        return pnorm(-h) * pnorm(-k);
    }

    let two_pi = 2.0 * PI;
    let (x, w) = quadrature(r);
    let mut k = k;
    let mut hk = h * k;
    let mut bvn = 0.0;

    if r.abs() < 0.925 {
        let hs = (h * h + k * k) / 2.0;
        let asr = r.asin() / 2.0;
        for (xi, wi) in x.iter().zip(&w) {
            let sn = (asr * xi).sin();
            bvn += wi * ((sn * hk - hs) / (1.0 - sn * sn)).exp();
        }
        bvn = bvn * asr / two_pi + pnorm(-h) * pnorm(-k);
    } else {
        if r < 0.0 {
            k = -k;
            hk = -hk;
        }
        if r.abs() < 1.0 {
            let as_ = 1.0 - r * r;
            let mut a = as_.sqrt();
            let bs = (h - k) * (h - k);
            let c = (4.0 - hk) / 8.0;
            let d = (12.0 - hk) / 80.0;
            let asr = -(bs / as_ + hk) / 2.0;
            if asr > -100.0 {
                bvn = a
                    * asr.exp()
                    * (1.0 - c * (bs - as_) * (1.0 - d * bs) / 3.0 + c * d * as_ * as_);
            }
            if hk > -100.0 {
                let b = bs.sqrt();
                let sp = two_pi.sqrt() * pnorm(-b / a);
                bvn -= (-hk / 2.0).exp() * sp * b * (1.0 - c * bs * (1.0 - d * bs) / 3.0);
            }
            a /= 2.0;
            let mut sum = 0.0;
            for (xi, wi) in x.iter().zip(&w) {
                let xs = (a * xi) * (a * xi);
                let asr = -(bs / xs + hk) / 2.0;
                if asr > -100.0 {
                    let sp = 1.0 + c * xs * (1.0 + 5.0 * d * xs);
                    let rs = (1.0 - xs).sqrt();
                    let ep = (-(hk / 2.0) * xs / ((1.0 + rs) * (1.0 + rs))).exp() / rs;
                    sum += wi * asr.exp() * (sp - ep);
                }
            }
            bvn = (a * sum - bvn) / two_pi;
        }
        if r > 0.0 {
            bvn += pnorm(-h.max(k));
        } else if h >= k {
            bvn = -bvn;
        } else {
            let l = if h < 0.0 {
                pnorm(k) - pnorm(h)
            } else {
                pnorm(-h) - pnorm(-k)
            };
            bvn = l - bvn;
        }
    }

    bvn.clamp(0.0, 1.0)
}

/// Bivariate standard normal CDF `P(X <= h, Y <= k)` with correlation `r`.
pub fn bvn_cdf(h: f64, k: f64, r: f64) -> f64 {
    bvn_upper(-h, -k, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_pnorm_known_values() {
        assert!(close(pnorm(0.0), 0.5, 1e-15));
        assert!(close(pnorm(1.959963984540054), 0.975, 1e-10));
        assert!(close(pnorm(-1.0), 0.15865525393145707, 1e-10));
    }

    #[test]
    fn test_qnorm_inverts_pnorm() {
        for p in [0.01, 0.1, 0.3, 0.5, 0.77, 0.99] {
            assert!(close(pnorm(qnorm(p)), p, 1e-10));
        }
        assert_eq!(qnorm(0.0), f64::NEG_INFINITY);
        assert_eq!(qnorm(1.0), f64::INFINITY);
    }

    #[test]
    fn test_bvn_independent_is_product() {
        let p = bvn_cdf(0.3, -0.4, 0.0);
        assert!(close(p, pnorm(0.3) * pnorm(-0.4), 1e-14));
    }

    #[test]
    fn test_bvn_origin_closed_form() {
        // P(X<=0, Y<=0) = 1/4 + asin(r)/(2 pi)
        for r in [-0.95_f64, -0.5, 0.2, 0.6, 0.8, 0.95] {
            let expected = 0.25 + r.asin() / (2.0 * PI);
            assert!(close(bvn_cdf(0.0, 0.0, r), expected, 1e-12), "r = {}", r);
        }
    }

    #[test]
    fn test_bvn_infinite_limits() {
        assert!(close(bvn_cdf(f64::INFINITY, 0.7, 0.5), pnorm(0.7), 1e-14));
        assert!(close(bvn_cdf(-0.2, f64::INFINITY, 0.5), pnorm(-0.2), 1e-14));
        assert_eq!(bvn_cdf(f64::NEG_INFINITY, 0.7, 0.5), 0.0);
        assert!(close(bvn_cdf(f64::INFINITY, f64::INFINITY, 0.3), 1.0, 1e-14));
    }

    #[test]
    fn test_bvn_symmetry_in_arguments() {
        let a = bvn_cdf(0.4, -1.1, 0.93);
        let b = bvn_cdf(-1.1, 0.4, 0.93);
        assert!(close(a, b, 1e-12));
    }
}
