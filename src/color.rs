use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// An 8-bit sRGB colour shared by the SVG renderer and the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GRAY: Rgb = Rgb(160, 160, 160);
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            Rgb(rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

/// Parse a CSS colour name (`"darkorange"`) or a hex code (`"#1f77b4"`).
pub fn parse_color(spec: &str) -> Option<Rgb> {
    let spec = spec.trim();
    if let Some(named) = palette::named::from_str(&spec.to_ascii_lowercase()) {
        return Some(Rgb(named.red, named.green, named.blue));
    }
    spec.parse::<Srgb<u8>>()
        .ok()
        .map(|c| Rgb(c.red, c.green, c.blue))
}

// ---------------------------------------------------------------------------
// Color mapping: treatment → Rgb
// ---------------------------------------------------------------------------

/// Maps treatment labels to colours. Explicit colours win; the rest are
/// drawn from [`generate_palette`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    mapping: BTreeMap<String, Rgb>,
}

impl ColorMap {
    /// Build a colour map for `labels`, honouring any `explicit` entries
    /// whose colour spec parses.
    pub fn new<'a>(
        labels: impl IntoIterator<Item = &'a str>,
        explicit: &BTreeMap<String, String>,
    ) -> Self {
        let labels: Vec<&str> = labels.into_iter().collect();
        let mut mapping = BTreeMap::new();
        let mut missing = Vec::new();

        for label in &labels {
            match explicit.get(*label).and_then(|spec| {
                let parsed = parse_color(spec);
                if parsed.is_none() {
                    log::warn!("unrecognised colour '{spec}' for '{label}', using palette");
                }
                parsed
            }) {
                Some(rgb) => {
                    mapping.insert(label.to_string(), rgb);
                }
                None => missing.push(*label),
            }
        }

        for (label, rgb) in missing.iter().zip(generate_palette(missing.len())) {
            mapping.insert(label.to_string(), rgb);
        }

        ColorMap { mapping }
    }

    /// Look up the colour for a treatment.
    pub fn color_for(&self, label: &str) -> Rgb {
        self.mapping.get(label).copied().unwrap_or(Rgb::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_hex() {
        assert_eq!(parse_color("black"), Some(Rgb(0, 0, 0)));
        assert_eq!(parse_color("DarkOrange"), Some(Rgb(255, 140, 0)));
        assert_eq!(parse_color("#ff0000"), Some(Rgb(255, 0, 0)));
        assert_eq!(parse_color("not-a-colour"), None);
    }

    #[test]
    fn palette_fills_unnamed_treatments() {
        let explicit = BTreeMap::from([("Native".to_string(), "black".to_string())]);
        let map = ColorMap::new(["Native", "ATP", "ADP"], &explicit);
        assert_eq!(map.color_for("Native"), Rgb(0, 0, 0));
        assert_ne!(map.color_for("ATP"), map.color_for("ADP"));
        assert_eq!(map.color_for("unknown"), Rgb::GRAY);
    }

    #[test]
    fn palette_size() {
        assert!(generate_palette(0).is_empty());
        assert_eq!(generate_palette(5).len(), 5);
    }
}
