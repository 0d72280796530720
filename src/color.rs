//! Hex color parsing into normalized RGBA

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid hex length {1} in color \"{0}\"")]
    InvalidLength(String, usize),

    #[error("Invalid hex digit in color \"{0}\"")]
    InvalidDigit(String),
}

/// Color with channels in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Accepts `#RGB`, `#RGBA`, `#RRGGBB` and `#RRGGBBAA`; the `#` is optional.
    pub fn from_hex(input: &str) -> Result<Self, ColorError> {
        let hex = input.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit(input.to_string()));
        }

        let expanded: String = match hex.len() {
            3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => hex.to_string(),
            n => return Err(ColorError::InvalidLength(input.to_string(), n)),
        };

        let channel = |i: usize| -> Result<f64, ColorError> {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map(|v| v as f64 / 255.0)
                .map_err(|_| ColorError::InvalidDigit(input.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if expanded.len() == 8 { channel(6)? } else { 1.0 },
        })
    }
}
