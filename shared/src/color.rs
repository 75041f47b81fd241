use crate::error::GameError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color used by the info displays when a player has no tank
pub const NEUTRAL: Rgb = Rgb {
    r: 50,
    g: 50,
    b: 50,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Converts hue, saturation and value, each in `0.0..=1.0`
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let h = (hue.rem_euclid(1.0)) * 6.0;
        let s = saturation.clamp(0.0, 1.0);
        let v = value.clamp(0.0, 1.0);

        let c = v * s;
        let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let to_byte = |channel: f32| ((channel + m) * 255.0).round() as u8;
        Self::new(to_byte(r), to_byte(g), to_byte(b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// How tank colors are chosen when players are spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorPolicy {
    /// Any hue at full saturation and value
    #[default]
    RandomHue,
}

impl ColorPolicy {
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Rgb {
        match self {
            ColorPolicy::RandomHue => Rgb::from_hsv(rng.gen_range(0.0..1.0), 1.0, 1.0),
        }
    }
}

impl FromStr for ColorPolicy {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "random-hue" => Ok(ColorPolicy::RandomHue),
            other => Err(GameError::InvalidPolicy(other.to_string())),
        }
    }
}
