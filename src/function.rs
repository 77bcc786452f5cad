/// Scalar function `h` underlying a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// h(u) = 0
    Zero,
    /// h(u) = u
    Identity,
    /// h(u) = u^2 / 2
    Square,
    /// h(u) = |u|
    Abs,
    /// h(u) = u^2 / 2 for |u| <= 1, |u| - 1/2 otherwise
    Huber,
    /// h(u) = max(0, u)
    MaxPos0,
    /// h(u) = max(0, -u)
    MaxNeg0,
    /// Indicator of u >= 0.
    IndGe0,
    /// Indicator of u <= 0.
    IndLe0,
    /// Indicator of u = 0.
    IndEq0,
    /// Indicator of 0 <= u <= 1.
    IndBox01,
}

/// Separable scalar term `scale * h(t - offset)`.
///
/// One descriptor per matrix row describes the loss on the fitted value `y_i`,
/// and one per column describes the penalty on the coefficient `x_j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionDescriptor {
    pub kind: FunctionKind,
    /// Positive multiplier on `h`.
    pub scale: f64,
    /// Shift applied to the argument before evaluating `h`.
    pub offset: f64,
}

impl FunctionDescriptor {
    pub fn new(kind: FunctionKind) -> Self {
        Self {
            kind,
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Evaluates `scale * h(t - offset)`; indicators give 0 or `+inf`.
    pub fn eval(&self, t: f64) -> f64 {
        let u = t - self.offset;
        let indicator = |inside: bool| if inside { 0.0 } else { f64::INFINITY };
        match self.kind {
            FunctionKind::Zero => 0.0,
            FunctionKind::Identity => self.scale * u,
            FunctionKind::Square => self.scale * 0.5 * u * u,
            FunctionKind::Abs => self.scale * u.abs(),
            FunctionKind::Huber => {
                let a = u.abs();
                if a <= 1.0 {
                    self.scale * 0.5 * u * u
                } else {
                    self.scale * (a - 0.5)
                }
            }
            FunctionKind::MaxPos0 => self.scale * u.max(0.0),
            FunctionKind::MaxNeg0 => self.scale * (-u).max(0.0),
            FunctionKind::IndGe0 => indicator(u >= 0.0),
            FunctionKind::IndLe0 => indicator(u <= 0.0),
            FunctionKind::IndEq0 => indicator(u == 0.0),
            FunctionKind::IndBox01 => indicator((0.0..=1.0).contains(&u)),
        }
    }

    /// Proximal operator `argmin_t scale * h(t - offset) + (rho / 2) (t - v)^2`.
    pub fn prox(&self, v: f64, rho: f64) -> f64 {
        let u = v - self.offset;
        let s = self.scale / rho;
        let p = match self.kind {
            FunctionKind::Zero => u,
            FunctionKind::Identity => u - s,
            FunctionKind::Square => u / (1.0 + s),
            FunctionKind::Abs => soft_threshold(u, s),
            FunctionKind::Huber => {
                if u.abs() <= 1.0 + s {
                    u / (1.0 + s)
                } else {
                    u - s * u.signum()
                }
            }
            FunctionKind::MaxPos0 => {
                if u > s {
                    u - s
                } else if u < 0.0 {
                    u
                } else {
                    0.0
                }
            }
            FunctionKind::MaxNeg0 => {
                if u < -s {
                    u + s
                } else if u > 0.0 {
                    u
                } else {
                    0.0
                }
            }
            FunctionKind::IndGe0 => u.max(0.0),
            FunctionKind::IndLe0 => u.min(0.0),
            FunctionKind::IndEq0 => 0.0,
            FunctionKind::IndBox01 => u.clamp(0.0, 1.0),
        };
        p + self.offset
    }
}

fn soft_threshold(u: f64, s: f64) -> f64 {
    if u > s {
        u - s
    } else if u < -s {
        u + s
    } else {
        0.0
    }
}

/// Row loss terms `(1/2)(y_i - b_i)^2`, one per observation.
pub fn squared_loss(b: &[f64]) -> Vec<FunctionDescriptor> {
    b.iter()
        .map(|&bi| FunctionDescriptor::new(FunctionKind::Square).with_offset(bi))
        .collect()
}

/// Column penalty terms `weight * |x_j|`.
///
/// The weight is a placeholder; the path overwrites it before every solve.
pub fn l1_penalty(ncols: usize, weight: f64) -> Vec<FunctionDescriptor> {
    vec![FunctionDescriptor::new(FunctionKind::Abs).with_scale(weight); ncols]
}

/// Overwrites the scale of every penalty term with `weight`.
pub fn set_penalty_weight(penalty: &mut [FunctionDescriptor], weight: f64) {
    for term in penalty.iter_mut() {
        term.scale = weight;
    }
}

/// Sum of `terms[i].eval(values[i])`.
pub fn separable_sum(terms: &[FunctionDescriptor], values: &[f64]) -> f64 {
    terms
        .iter()
        .zip(values.iter())
        .map(|(term, &v)| term.eval(v))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [FunctionKind; 11] = [
        FunctionKind::Zero,
        FunctionKind::Identity,
        FunctionKind::Square,
        FunctionKind::Abs,
        FunctionKind::Huber,
        FunctionKind::MaxPos0,
        FunctionKind::MaxNeg0,
        FunctionKind::IndGe0,
        FunctionKind::IndLe0,
        FunctionKind::IndEq0,
        FunctionKind::IndBox01,
    ];

    fn prox_objective(term: &FunctionDescriptor, t: f64, v: f64, rho: f64) -> f64 {
        term.eval(t) + 0.5 * rho * (t - v) * (t - v)
    }

    #[test]
    fn square_loss_prox_matches_closed_form() {
        let term = FunctionDescriptor::new(FunctionKind::Square).with_offset(2.0);
        // argmin (1/2)(t - 2)^2 + (1/2)(t - 4)^2 = 3
        assert!((term.prox(4.0, 1.0) - 3.0).abs() < 1e-12);
        assert_eq!(term.eval(4.0), 2.0);
    }

    #[test]
    fn abs_prox_soft_thresholds() {
        let term = FunctionDescriptor::new(FunctionKind::Abs).with_scale(0.5);
        assert_eq!(term.prox(0.3, 1.0), 0.0);
        assert_eq!(term.prox(-0.5, 1.0), 0.0);
        assert!((term.prox(2.0, 1.0) - 1.5).abs() < 1e-12);
        assert!((term.prox(-2.0, 2.0) + 1.75).abs() < 1e-12);
    }

    #[test]
    fn prox_is_a_local_minimizer_for_every_kind() {
        let rho = 1.7;
        for kind in KINDS {
            let term = FunctionDescriptor::new(kind).with_scale(0.8).with_offset(0.25);
            for &v in &[-3.0, -0.9, -0.1, 0.0, 0.3, 0.7, 1.2, 2.5, 4.0] {
                let p = term.prox(v, rho);
                let at = prox_objective(&term, p, v, rho);
                assert!(at.is_finite(), "{kind:?} prox left the domain at v={v}");
                for delta in [1e-3, -1e-3, 1e-1, -1e-1] {
                    let nearby = prox_objective(&term, p + delta, v, rho);
                    assert!(
                        at <= nearby + 1e-12,
                        "{kind:?}: prox({v}) = {p} is not optimal ({at} > {nearby})"
                    );
                }
            }
        }
    }

    #[test]
    fn lasso_descriptors() {
        let loss = squared_loss(&[1.0, -2.0]);
        assert_eq!(loss.len(), 2);
        assert_eq!(loss[1].kind, FunctionKind::Square);
        assert_eq!(loss[1].scale, 1.0);
        assert_eq!(loss[1].offset, -2.0);

        let mut penalty = l1_penalty(3, 0.0);
        set_penalty_weight(&mut penalty, 0.25);
        assert!(penalty.iter().all(|t| t.kind == FunctionKind::Abs && t.scale == 0.25));
        assert_eq!(separable_sum(&penalty, &[1.0, -2.0, 0.0]), 0.75);
    }
}
