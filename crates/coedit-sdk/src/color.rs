//! Participant colors.

use rand::seq::SliceRandom;
use rand::Rng;

/// Default participant colors.
pub const PALETTE: [&str; 8] = [
    "#30bced", "#6eeb83", "#ffbc42", "#ecd444", "#ee6352", "#9ac2c9", "#8acb88", "#1be7ff",
];

/// Pick a color from `palette`, falling back to the first default color for
/// an empty palette.
pub fn pick_color<R: Rng + ?Sized>(palette: &[String], rng: &mut R) -> String {
    palette
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| PALETTE[0].to_string())
}

/// Convert a `#rrggbb` color to a CSS `rgba()` string with the given alpha.
///
/// Useful for semi-transparent selection highlights. Returns `None` for
/// anything that is not a six-digit hex color.
pub fn selection_css(hex: &str, alpha: f32) -> Option<String> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    let r = (value >> 16) & 0xFF;
    let g = (value >> 8) & 0xFF;
    let b = value & 0xFF;
    Some(format!("rgba({}, {}, {}, {})", r, g, b, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pick_color_from_palette() {
        let palette: Vec<String> = PALETTE.iter().map(|c| c.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let color = pick_color(&palette, &mut rng);
        assert!(palette.contains(&color));
    }

    #[test]
    fn test_pick_color_empty_palette() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_color(&[], &mut rng), "#30bced");
    }

    #[test]
    fn test_selection_css() {
        assert_eq!(
            selection_css("#ff0000", 0.25).as_deref(),
            Some("rgba(255, 0, 0, 0.25)")
        );
        assert_eq!(
            selection_css("#30bced", 1.0).as_deref(),
            Some("rgba(48, 188, 237, 1)")
        );
        assert_eq!(selection_css("red", 0.5), None);
        assert_eq!(selection_css("#fff", 0.5), None);
    }
}
