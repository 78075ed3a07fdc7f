//! Aspect ratio to output resolution mapping.

use serde::Serialize;

/// Output size handed to the engine. Both sides are multiples of 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn quotient(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Named ratios in lookup order. Fuzzy matches take the first entry within
/// tolerance, so order matters.
pub const ASPECT_RATIOS: [(&str, Resolution); 11] = [
    ("1:1", Resolution::new(1024, 1024)),
    ("16:9", Resolution::new(1344, 768)),
    ("9:16", Resolution::new(768, 1344)),
    ("4:3", Resolution::new(1152, 896)),
    ("3:4", Resolution::new(896, 1152)),
    ("21:9", Resolution::new(1280, 800)),
    ("9:21", Resolution::new(800, 1280)),
    ("5:4", Resolution::new(1088, 960)),
    ("4:5", Resolution::new(960, 1088)),
    ("3:2", Resolution::new(1216, 832)),
    ("2:3", Resolution::new(832, 1216)),
];

pub const DEFAULT_RESOLUTION: Resolution = ASPECT_RATIOS[0].1;

const RATIO_TOLERANCE: f64 = 0.1;

/// Maps an aspect ratio token to a catalog resolution. Never fails: anything
/// unrecognised resolves to the square default.
pub fn resolve(aspect_ratio: Option<&str>) -> Resolution {
    let Some(token) = aspect_ratio.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_RESOLUTION;
    };

    if let Some((_, resolution)) = ASPECT_RATIOS.iter().find(|(name, _)| *name == token) {
        return *resolution;
    }

    let Some((width, height)) = parse_dimensions(token) else {
        return DEFAULT_RESOLUTION;
    };
    let requested = f64::from(width) / f64::from(height);

    ASPECT_RATIOS
        .iter()
        .map(|(_, resolution)| *resolution)
        .find(|resolution| (requested - resolution.quotient()).abs() < RATIO_TOLERANCE)
        .unwrap_or(DEFAULT_RESOLUTION)
}

/// Parses `W:H` or `WxH` into two positive integers.
fn parse_dimensions(token: &str) -> Option<(u32, u32)> {
    let normalized = token.replace('x', ":");
    let mut parts = normalized.split(':');
    let (width, height) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}
