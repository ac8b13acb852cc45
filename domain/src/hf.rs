//! Health Factor: a rational ratio of weighted collateral to debt, scaled to
//! 18 fractional digits so it can be compared and ordered exactly without
//! floating-point drift near the liquidation boundary.

const SCALE: i128 = 1_000_000_000_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hf(i128);

impl Hf {
    pub const ONE: Hf = Hf(SCALE);

    /// Builds an `Hf` from its already-1e18-scaled on-chain representation.
    pub fn from_scaled_1e18(scaled: i128) -> Self {
        Hf(scaled)
    }

    pub fn scaled_1e18(self) -> i128 {
        self.0
    }

    /// Convenience constructor for tests and literal scenario inputs.
    pub fn from_f64(v: f64) -> Self {
        Hf((v * SCALE as f64).round() as i128)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_liquidatable(self) -> bool {
        self.0 < SCALE
    }

    /// `|self - 1|` as a fraction, used by the near-band filter.
    pub fn distance_from_one(self) -> f64 {
        (self.as_f64() - 1.0).abs()
    }

    /// Floor of `hf * 1e4`, used as the primary key of the queue priority
    /// tuple so entries compare lexicographically without re-deriving HF.
    pub fn priority_bucket(self) -> i128 {
        // hf * 1e4 == (hf_scaled_1e18 * 1e4) / 1e18 == hf_scaled_1e18 / 1e14
        self.0.div_euclid(100_000_000_000_000)
    }
}

impl std::ops::Sub for Hf {
    type Output = f64;
    fn sub(self, rhs: Hf) -> f64 {
        self.as_f64() - rhs.as_f64()
    }
}

impl std::fmt::Display for Hf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.as_f64())
    }
}
