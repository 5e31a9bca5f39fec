//! One-dimensional minimisation.

const GOLDEN: f64 = 0.381_966_011_250_105;

/// Result of a bracketed scalar minimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
}

/// Brent's method on `[lower, upper]`: golden-section steps with parabolic
/// interpolation when it is safe.
pub fn brent_minimize<F>(f: F, lower: f64, upper: f64, tol: f64, max_iter: usize) -> Minimum
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (lower, upper);
    let mut x = a + GOLDEN * (b - a);
    let mut w = x;
    let mut v = x;
    let mut fx = f(x);
    let mut fw = fx;
    let mut fv = fx;
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for iter in 0..max_iter {
        let mid = 0.5 * (a + b);
        let tol1 = tol * x.abs() + 1e-12;
        let tol2 = 2.0 * tol1;
        if (x - mid).abs() <= tol2 - 0.5 * (b - a) {
            return Minimum {
                x,
                value: fx,
                iterations: iter,
            };
        }

        let mut golden_step = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                e = d;
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = if mid >= x { tol1 } else { -tol1 };
                }
                golden_step = false;
            }
        }
        if golden_step {
            e = if x >= mid { a - x } else { b - x };
            d = GOLDEN * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else if d > 0.0 {
            x + tol1
        } else {
            x - tol1
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    Minimum {
        x,
        value: fx,
        iterations: max_iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_minimum() {
        let m = brent_minimize(|x| (x - 0.37) * (x - 0.37) + 2.0, -1.0, 1.0, 1e-10, 200);
        assert!((m.x - 0.37).abs() < 1e-7);
        assert!((m.value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_at_boundary_region() {
        let m = brent_minimize(|x| -x, -1.0, 1.0, 1e-10, 200);
        assert!(m.x > 0.999);
    }

    #[test]
    fn test_non_quadratic() {
        let m = brent_minimize(|x: f64| (x - 0.5).powi(4) + x.cosh(), -1.0, 1.0, 1e-10, 500);
        // derivative 4(x-0.5)^3 + sinh(x) = 0
        let g = 4.0 * (m.x - 0.5f64).powi(3) + m.x.sinh();
        assert!(g.abs() < 1e-5);
    }
}
