//! Discrete color lookup tables for the two scalar fields.

use bevy::color::{ColorToComponents, Hsva, LinearRgba, Srgba};
use tracing::debug;

use crate::{
    config::{DisplayRange, HueArc, ScalarKind, ThicknessConfig},
    interp::bin_position,
    types::{Rgb, Value},
};

/// Fixed saturation of every table color.
pub const SATURATION: f32 = 0.9;
/// Fixed value (brightness) of every table color.
pub const BRIGHTNESS: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct ColorEntry {
    pub bin: i64,
    /// sRGB channels in `[0, 1]`.
    pub rgb: Rgb,
    /// Real-world value of the bin, e.g. `"0.5 mm"`.
    pub label: String,
}

/// Contiguous table of colors covering bins `[bin_lo, bin_hi)`.
///
/// Bin `i` stands for the scaled scalar value `i`, i.e. `i / scale` millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    pub kind: ScalarKind,
    pub name: &'static str,
    pub scale: Value,
    pub bin_lo: i64,
    pub bin_hi: i64,
    entries: Vec<ColorEntry>,
}

impl ColorTable {
    /// Builds the table for `range` with hues swept along `arc`.
    pub fn build(kind: ScalarKind, range: DisplayRange, scale: Value, arc: HueArc) -> Self {
        let bin_lo = (range.min * scale).floor() as i64;
        let bin_hi = (range.max * scale).floor() as i64 + 1;
        let decimals = scale.log10().ceil().max(0.0) as usize;

        let entries = (bin_lo..bin_hi)
            .map(|bin| {
                let hue = arc.hue_at(bin_position(bin, bin_lo, bin_hi));
                ColorEntry {
                    bin,
                    rgb: hsv_to_rgb(hue),
                    label: format!("{:.*} mm", decimals, bin as Value / scale),
                }
            })
            .collect::<Vec<_>>();
        debug!(%kind, bins = entries.len(), "built color table");

        Self {
            kind,
            name: table_name(kind),
            scale,
            bin_lo,
            bin_hi,
            entries,
        }
    }

    /// Number of slots a lookup table needs so every bin is addressable by index.
    ///
    /// Slots below `bin_lo` exist but carry no color.
    pub fn capacity(&self) -> usize {
        self.bin_hi.max(0) as usize
    }

    /// Number of colored bins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ColorEntry] {
        &self.entries
    }

    pub fn get(&self, bin: i64) -> Option<&ColorEntry> {
        if bin < self.bin_lo || bin >= self.bin_hi {
            return None;
        }
        self.entries.get((bin - self.bin_lo) as usize)
    }

    /// Color of an already scaled scalar value, clamped into the table.
    pub fn color_for(&self, scaled: Value) -> Rgb {
        let bin = (scaled.round() as i64).clamp(self.bin_lo, self.bin_hi - 1);
        self.get(bin).map(|e| e.rgb).unwrap_or([0.0; 3])
    }

    /// Linear RGBA vertex color for a scaled scalar value.
    pub fn vertex_color(&self, scaled: Value) -> [f32; 4] {
        let [r, g, b] = self.color_for(scaled);
        LinearRgba::from(Srgba::rgb(r, g, b)).to_f32_array()
    }
}

/// Both tables of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTables {
    pub thickness: ColorTable,
    pub cavity_depth: ColorTable,
}

impl ColorTables {
    pub fn build(config: &ThicknessConfig) -> Self {
        let _span = tracing::info_span!("color_tables").entered();
        let table = |kind| {
            ColorTable::build(
                kind,
                config.display_range(kind),
                config.gradient_scale,
                config.hue_arc(kind),
            )
        };
        Self {
            thickness: table(ScalarKind::Thickness),
            cavity_depth: table(ScalarKind::CavityDepth),
        }
    }

    pub fn get(&self, kind: ScalarKind) -> &ColorTable {
        match kind {
            ScalarKind::Thickness => &self.thickness,
            ScalarKind::CavityDepth => &self.cavity_depth,
        }
    }
}

fn table_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Thickness => "ThicknessColorMap",
        ScalarKind::CavityDepth => "AirCellColorMap",
    }
}

/// Hue as a fraction of a turn to sRGB at the fixed saturation and value.
fn hsv_to_rgb(hue: Value) -> Rgb {
    let degrees = (hue.rem_euclid(1.0) * 360.0) as f32;
    let rgb = Srgba::from(Hsva::new(degrees, SATURATION, BRIGHTNESS, 1.0));
    [rgb.red, rgb.green, rgb.blue]
}
