use std::str::FromStr;

use derive_more::Display;

use crate::{
    error::{ConfigError, Result},
    types::{Value, Vector},
};

/// One of the six anatomical viewing directions rays are cast from.
///
/// `R`, `A` and `S` look along the positive x, y and z axes; `L`, `P` and `I`
/// along the negative ones. Rays start on the side the direction names and
/// travel through the structure towards the opposite side.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CastDirection {
    R,
    #[default]
    L,
    A,
    P,
    S,
    I,
}

impl CastDirection {
    pub const ALL: [CastDirection; 6] = [Self::R, Self::L, Self::A, Self::P, Self::S, Self::I];

    /// Resolves the direction to `(axis index, sign)`.
    pub fn resolve(self) -> (usize, Value) {
        match self {
            Self::R => (0, 1.0),
            Self::L => (0, -1.0),
            Self::A => (1, 1.0),
            Self::P => (1, -1.0),
            Self::S => (2, 1.0),
            Self::I => (2, -1.0),
        }
    }

    /// Unit vector pointing from the structure back towards the ray source.
    pub fn cast_vector(self) -> Vector {
        let (axis, sign) = self.resolve();
        let mut v = Vector::zeros();
        v[axis] = sign;
        v
    }
}

impl FromStr for CastDirection {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim() {
            "R" | "r" => Ok(Self::R),
            "L" | "l" => Ok(Self::L),
            "A" | "a" => Ok(Self::A),
            "P" | "p" => Ok(Self::P),
            "S" | "s" => Ok(Self::S),
            "I" | "i" => Ok(Self::I),
            other => Err(format!("unknown cast direction `{other}`")),
        }
    }
}

/// Grid spacing presets, in mesh units per ray.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingQuality {
    #[display("very low (ray every 4 units)")]
    VeryLow,
    #[display("low (ray every 2 units)")]
    Low,
    #[default]
    #[display("medium (ray every unit)")]
    Medium,
    #[display("high (ray every 0.5 units)")]
    High,
    #[display("very high (ray every 0.25 units)")]
    VeryHigh,
}

impl SamplingQuality {
    pub fn precision(self) -> Value {
        match self {
            Self::VeryLow => 4.0,
            Self::Low => 2.0,
            Self::Medium => 1.0,
            Self::High => 0.5,
            Self::VeryHigh => 0.25,
        }
    }
}

/// The two scalar fields produced by a run.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarKind {
    #[default]
    #[display("Thickness to dura")]
    Thickness,
    #[display("Distance to first air cell")]
    CavityDepth,
}

/// A sub-range of the hue circle, as fractions of a full turn.
///
/// Position `t ∈ [0, 1)` along a color table maps to hue `start + t * span`.
/// A negative `span` sweeps backwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueArc {
    pub start: Value,
    pub span: Value,
}

impl HueArc {
    /// Red through yellow towards green.
    pub const THICKNESS: HueArc = HueArc {
        start: 0.0,
        span: 0.278,
    };
    /// Blue backwards through green towards orange.
    pub const CAVITY_DEPTH: HueArc = HueArc {
        start: 0.696,
        span: -0.571,
    };

    pub fn hue_at(&self, t: Value) -> Value {
        crate::interp::lerp(self.start, self.start + self.span, t)
    }
}

/// How a HitPoint that anchors several 2×2 blocks picks its normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalPolicy {
    /// The last block in row-major order overwrites earlier estimates.
    #[default]
    LastWriteWins,
    /// All valid block estimates for the point are summed and renormalized.
    Average,
}

/// Inclusive `[min, max]` range of scalar values a color table covers, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: Value,
    pub max: Value,
}

impl DisplayRange {
    pub const fn new(min: Value, max: Value) -> Self {
        Self { min, max }
    }
}

/// Immutable parameters of one thickness run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessConfig {
    /// Side the grid rays are cast from.
    pub direction: CastDirection,
    /// Grid spacing in mesh units.
    pub precision: Value,
    /// Accepted `[lo, hi)` window of hit coordinates along the cast axis.
    pub region_of_interest: [Value; 2],
    /// Quads whose normal leans further than this from the cast vector are not rendered. Degrees.
    pub grazing_cutoff: Value,
    /// Distance the rendered top layer is raised towards the ray source.
    pub visibility_offset: Value,
    /// Multiplier from mesh-unit distances to scalar values and color-table bins.
    pub gradient_scale: Value,
    pub normal_policy: NormalPolicy,
    pub thickness_range: DisplayRange,
    pub cavity_range: DisplayRange,
    pub thickness_hues: HueArc,
    pub cavity_hues: HueArc,
    /// Number of probe rays between two progress reports of the normal cast.
    pub report_every: usize,
}

impl Default for ThicknessConfig {
    fn default() -> Self {
        Self {
            direction: CastDirection::L,
            precision: SamplingQuality::Medium.precision(),
            region_of_interest: [-100.0, 100.0],
            grazing_cutoff: 80.0,
            visibility_offset: 0.3,
            gradient_scale: 10.0,
            normal_policy: NormalPolicy::LastWriteWins,
            thickness_range: DisplayRange::new(0.0, 8.7),
            cavity_range: DisplayRange::new(0.0, 4.0),
            thickness_hues: HueArc::THICKNESS,
            cavity_hues: HueArc::CAVITY_DEPTH,
            report_every: 200,
        }
    }
}

impl ThicknessConfig {
    pub fn with_direction(mut self, direction: CastDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_precision(mut self, precision: Value) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_quality(self, quality: SamplingQuality) -> Self {
        self.with_precision(quality.precision())
    }

    pub fn with_region_of_interest(mut self, lo: Value, hi: Value) -> Self {
        self.region_of_interest = [lo, hi];
        self
    }

    pub fn with_grazing_cutoff(mut self, degrees: Value) -> Self {
        self.grazing_cutoff = degrees;
        self
    }

    pub fn with_gradient_scale(mut self, scale: Value) -> Self {
        self.gradient_scale = scale;
        self
    }

    pub fn with_normal_policy(mut self, policy: NormalPolicy) -> Self {
        self.normal_policy = policy;
        self
    }

    pub fn with_thickness_range(mut self, min: Value, max: Value) -> Self {
        self.thickness_range = DisplayRange::new(min, max);
        self
    }

    pub fn with_cavity_range(mut self, min: Value, max: Value) -> Self {
        self.cavity_range = DisplayRange::new(min, max);
        self
    }

    pub fn with_hue_arcs(mut self, thickness: HueArc, cavity: HueArc) -> Self {
        self.thickness_hues = thickness;
        self.cavity_hues = cavity;
        self
    }

    pub fn display_range(&self, kind: ScalarKind) -> DisplayRange {
        match kind {
            ScalarKind::Thickness => self.thickness_range,
            ScalarKind::CavityDepth => self.cavity_range,
        }
    }

    pub fn hue_arc(&self, kind: ScalarKind) -> HueArc {
        match kind {
            ScalarKind::Thickness => self.thickness_hues,
            ScalarKind::CavityDepth => self.cavity_hues,
        }
    }

    /// Checks every parameter; nothing is cast when this fails.
    pub fn validate(&self) -> Result<()> {
        if !(self.precision > 0.0 && self.precision.is_finite()) {
            return Err(ConfigError::InvalidPrecision(self.precision).into());
        }
        if !(self.gradient_scale > 0.0 && self.gradient_scale.is_finite()) {
            return Err(ConfigError::InvalidScale(self.gradient_scale).into());
        }
        if !(self.grazing_cutoff > 0.0 && self.grazing_cutoff <= 180.0) {
            return Err(ConfigError::InvalidCutoff(self.grazing_cutoff).into());
        }
        let [lo, hi] = self.region_of_interest;
        if !(lo < hi) {
            return Err(ConfigError::InvalidRegion { lo, hi }.into());
        }
        for kind in [ScalarKind::Thickness, ScalarKind::CavityDepth] {
            let DisplayRange { min, max } = self.display_range(kind);
            if !(min < max) || !min.is_finite() || !max.is_finite() {
                return Err(ConfigError::InvalidRange { kind, min, max }.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThicknessError;

    #[test]
    fn directions_resolve_to_signed_axes() {
        assert_eq!(CastDirection::R.resolve(), (0, 1.0));
        assert_eq!(CastDirection::L.resolve(), (0, -1.0));
        assert_eq!(CastDirection::P.resolve(), (1, -1.0));
        assert_eq!(CastDirection::S.resolve(), (2, 1.0));
        assert_eq!(CastDirection::I.cast_vector(), Vector::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn directions_parse_from_their_symbol() {
        for direction in CastDirection::ALL {
            let parsed: CastDirection = direction.to_string().parse().unwrap();
            assert_eq!(parsed, direction);
        }
        assert!("X".parse::<CastDirection>().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = ThicknessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.direction, CastDirection::L);
        assert_eq!(config.thickness_range, DisplayRange::new(0.0, 8.7));
    }

    #[test]
    fn non_positive_precision_is_rejected() {
        let err = ThicknessConfig::default()
            .with_precision(0.0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ThicknessError::Config(ConfigError::InvalidPrecision(0.0))
        );
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let err = ThicknessConfig::default()
            .with_cavity_range(2.0, 2.0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ThicknessError::Config(ConfigError::InvalidRange {
                kind: ScalarKind::CavityDepth,
                ..
            })
        ));

        let err = ThicknessConfig::default()
            .with_region_of_interest(5.0, -5.0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ThicknessError::Config(ConfigError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn quality_presets_set_precision() {
        let config = ThicknessConfig::default().with_quality(SamplingQuality::VeryHigh);
        assert_eq!(config.precision, 0.25);
    }

    #[test]
    fn hue_arcs_sweep_in_their_own_direction() {
        assert!(HueArc::THICKNESS.hue_at(0.5) > HueArc::THICKNESS.hue_at(0.0));
        assert!(HueArc::CAVITY_DEPTH.hue_at(0.5) < HueArc::CAVITY_DEPTH.hue_at(0.0));
    }
}
