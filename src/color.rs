use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Categorical palette
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
/// Chart series (years, species, months, conditions) are coloured by their
/// position in the series list.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            hsl_to_color32(Hsl::new(hue, 0.70, 0.50))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sequential colormap for heatmap cells
// ---------------------------------------------------------------------------

/// Map a normalized count in [0, 1] onto a light-yellow → deep-blue ramp
/// (low counts pale, high counts dark).
pub fn heat_color(t: f64) -> Color32 {
    let t = t.clamp(0.0, 1.0) as f32;
    // Anchors in HSL; hue walks yellow→green→blue as counts grow.
    let hue = 60.0 + t * 170.0;
    let saturation = 0.55 + t * 0.30;
    let lightness = 0.92 - t * 0.62;
    hsl_to_color32(Hsl::new(hue, saturation, lightness))
}

fn hsl_to_color32(hsl: Hsl) -> Color32 {
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size_and_distinct_entries() {
        assert!(generate_palette(0).is_empty());
        let palette = generate_palette(8);
        assert_eq!(palette.len(), 8);
        let mut seen = std::collections::BTreeSet::new();
        for c in &palette {
            seen.insert((c.r(), c.g(), c.b()));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn heat_ramp_darkens_with_count() {
        let low = heat_color(0.0);
        let high = heat_color(1.0);
        let brightness = |c: Color32| c.r() as u32 + c.g() as u32 + c.b() as u32;
        assert!(brightness(low) > brightness(high));
    }
}
