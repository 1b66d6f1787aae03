use std::f64::consts::{FRAC_PI_2, PI};

/// Rounds half away from zero, saturating to the `i32` range.
pub fn round_to_int(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    x.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Sine easing used by the sphere distortion; identity outside `(-1, 1)` and at zero.
pub fn spherify(f: f64) -> f64 {
    if f > 0.0 && f < 1.0 {
        (f * FRAC_PI_2).sin()
    } else if f < 0.0 && f > -1.0 {
        -((-f) * FRAC_PI_2).sin()
    } else {
        f
    }
}

/// Inverse of [`spherify`].
pub fn unspherify(f: f64) -> f64 {
    if f > 0.0 && f < 1.0 {
        f.asin() / FRAC_PI_2
    } else if f < 0.0 && f > -1.0 {
        -((-f).asin() / FRAC_PI_2)
    } else {
        f
    }
}

/// Normal distribution density with standard deviation `r`.
pub fn gauss(x: f64, r: f64) -> f64 {
    let k = 1.0 / (2.0 * PI).sqrt();
    k * (-0.5 * x * x / (r * r)).exp() / r
}
