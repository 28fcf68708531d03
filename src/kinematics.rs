//! Minimal Lorentz four-vector used by the kinematic post-processing.

use std::iter::Sum;
use std::ops::Add;

/// Nominal tau lepton mass in GeV.
pub const TAU_MASS: f64 = 1.776;

/// Cartesian four-momentum `(px, py, pz, e)` in GeV.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FourVector {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl FourVector {
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        Self::new(px, py, pz, (p2 + m * m).sqrt())
    }

    pub fn from_px_py_pz_m(px: f64, py: f64, pz: f64, m: f64) -> Self {
        let p2 = px * px + py * py + pz * pz;
        Self::new(px, py, pz, (p2 + m * m).sqrt())
    }

    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Pseudorapidity. Vectors along the beam axis map to `±1e10`, zero
    /// vectors to `0`.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0.0 {
            (self.pz / pt).asinh()
        } else if self.pz == 0.0 {
            0.0
        } else {
            1e10_f64.copysign(self.pz)
        }
    }

    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 {
            0.0
        } else {
            self.py.atan2(self.px)
        }
    }

    pub fn m2(&self) -> f64 {
        self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz)
    }

    /// Invariant mass; space-like vectors report `-sqrt(-m²)`.
    pub fn mass(&self) -> f64 {
        let m2 = self.m2();
        if m2 >= 0.0 {
            m2.sqrt()
        } else {
            -(-m2).sqrt()
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.px * factor,
            self.py * factor,
            self.pz * factor,
            self.e * factor,
        )
    }
}

impl Add for FourVector {
    type Output = FourVector;
    fn add(self, rhs: Self) -> Self::Output {
        FourVector::new(
            self.px + rhs.px,
            self.py + rhs.py,
            self.pz + rhs.pz,
            self.e + rhs.e,
        )
    }
}

impl Sum for FourVector {
    fn sum<I: Iterator<Item = FourVector>>(iter: I) -> Self {
        iter.fold(FourVector::default(), |acc, v| acc + v)
    }
}

/// Transverse vector `(x, y)` from polar coordinates.
pub fn polar_xy(r: f64, phi: f64) -> (f64, f64) {
    (r * phi.cos(), r * phi.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn pt_eta_phi_m_round_trip() {
        let v = FourVector::from_pt_eta_phi_m(35.0, 1.2, -2.1, 0.13957);
        assert!((v.pt() - 35.0).abs() < EPS);
        assert!((v.eta() - 1.2).abs() < EPS);
        assert!((v.phi() + 2.1).abs() < EPS);
        assert!((v.mass() - 0.13957).abs() < 1e-6);
    }

    #[test]
    fn back_to_back_taus_have_expected_mass() {
        let t1 = FourVector::from_px_py_pz_m(40.0, 0.0, 0.0, TAU_MASS);
        let t2 = FourVector::from_px_py_pz_m(-40.0, 0.0, 0.0, TAU_MASS);
        let sum: FourVector = [t1, t2].into_iter().sum();
        assert!(sum.pt().abs() < EPS);
        let expected = 2.0 * (40.0f64 * 40.0 + TAU_MASS * TAU_MASS).sqrt();
        assert!((sum.mass() - expected).abs() < 1e-9);
    }

    #[test]
    fn spacelike_mass_is_negative() {
        let v = FourVector::new(3.0, 0.0, 0.0, 1.0);
        assert!(v.mass() < 0.0);
    }

    #[test]
    fn degenerate_angles_are_finite() {
        assert_eq!(FourVector::default().eta(), 0.0);
        assert_eq!(FourVector::default().phi(), 0.0);
        assert!(FourVector::new(0.0, 0.0, 5.0, 5.0).eta() > 1e9);
    }
}
