//! Colors of the descent.
//!
//! The background walks through six atmosphere stages as progress rises. Tile
//! values map to hues from cool blue (small tiles) to hot red (large tiles).

use reentry_gameplay::{tile_rank, AtmosphereStage};
use serde::{Deserialize, Serialize};

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
}

impl Rgb {
    /// Black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    /// White.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    /// Creates a color from float components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from a `0xRRGGBB` literal.
    #[must_use]
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
        }
    }

    /// Linear blend, `t = 0` gives `self`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    /// Multiplies every component.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: (self.r * factor).clamp(0.0, 1.0),
            g: (self.g * factor).clamp(0.0, 1.0),
            b: (self.b * factor).clamp(0.0, 1.0),
        }
    }

    /// Components as `[r, g, b, a]`.
    #[must_use]
    pub const fn to_rgba(self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }

    /// Components as 8-bit values.
    #[must_use]
    pub fn to_u8(self) -> [u8; 3] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// Color from hue (degrees), saturation and lightness.
    #[must_use]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = l - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Self::new(r + m, g + m, b + m)
    }
}

/// Color the scene fades to after a win.
pub const OCEAN_BLUE: Rgb = Rgb::from_hex(0x0B_4F_8A);

/// Color the scene flashes to on game over.
pub const EXPLOSION_RED: Rgb = Rgb::from_hex(0xD9_3A_12);

/// Background anchor at the start of each stage, plus one at full progress.
const STAGE_ANCHORS: [Rgb; 7] = [
    Rgb::from_hex(0x05_06_12), // space
    Rgb::from_hex(0x0C_12_33), // thermosphere
    Rgb::from_hex(0x24_16_4A), // mesosphere
    Rgb::from_hex(0x4A_15_3E), // stratosphere
    Rgb::from_hex(0x7A_22_18), // ionization
    Rgb::from_hex(0xB3_3A_0C), // re-entry
    Rgb::from_hex(0xE8_6A_10), // peak heating
];

/// Background color for a progress factor.
///
/// Blends linearly between the anchors of the stage that contains `progress`.
#[must_use]
pub fn background_for_progress(progress: f32) -> Rgb {
    let stage = AtmosphereStage::from_progress(progress);
    let i = stage.index();
    STAGE_ANCHORS[i].lerp(STAGE_ANCHORS[i + 1], stage.local_t(progress))
}

/// Hue (degrees) for a tile value: 220 (blue) for 2 down to 0 (red) for 2048.
#[must_use]
pub fn tier_hue(value: u32) -> f32 {
    let rank = tile_rank(value).max(1) as f32;
    (220.0 - (rank - 1.0) * 22.0).max(0.0)
}

/// Saturated color for a tile value.
#[must_use]
pub fn tier_color(value: u32) -> Rgb {
    Rgb::from_hsl(tier_hue(value), 0.85, 0.58)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < EPS && (a.g - b.g).abs() < EPS && (a.b - b.b).abs() < EPS
    }

    #[test]
    fn test_from_hex() {
        let c = Rgb::from_hex(0xFF_80_00);
        assert!((c.r - 1.0).abs() < EPS);
        assert!((c.g - 128.0 / 255.0).abs() < EPS);
        assert!(c.b.abs() < EPS);
    }

    #[test]
    fn test_hsl_primaries() {
        assert!(close(Rgb::from_hsl(0.0, 1.0, 0.5), Rgb::new(1.0, 0.0, 0.0)));
        assert!(close(Rgb::from_hsl(120.0, 1.0, 0.5), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(Rgb::from_hsl(240.0, 1.0, 0.5), Rgb::new(0.0, 0.0, 1.0)));
        assert!(close(Rgb::from_hsl(42.0, 0.0, 1.0), Rgb::WHITE));
    }

    #[test]
    fn test_background_hits_anchors() {
        assert!(close(background_for_progress(0.0), STAGE_ANCHORS[0]));
        assert!(close(background_for_progress(0.30), STAGE_ANCHORS[2]));
        assert!(close(background_for_progress(1.0), STAGE_ANCHORS[6]));
    }

    #[test]
    fn test_background_blends_within_stage() {
        let mid = background_for_progress(0.075);
        let expected = STAGE_ANCHORS[0].lerp(STAGE_ANCHORS[1], 0.5);
        assert!(close(mid, expected));
    }

    #[test]
    fn test_tier_hue_cools_to_hot() {
        assert!((tier_hue(2) - 220.0).abs() < EPS);
        assert!(tier_hue(64) < tier_hue(8));
        assert!(tier_hue(2048).abs() < EPS);
        assert!(tier_hue(65536).abs() < EPS);
    }

    #[test]
    fn test_lerp_clamps() {
        assert!(close(Rgb::BLACK.lerp(Rgb::WHITE, 2.0), Rgb::WHITE));
    }
}
