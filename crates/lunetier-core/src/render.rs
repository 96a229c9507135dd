//! Deterministic projections of configurator state onto the scene.
//!
//! Every function here is a pure write of derived attributes; none of them
//! read anything back from the scene except the cached lens bounding box.

use crate::model::{ConfiguratorState, FrameShape};
use crate::palette::hex_to_rgba;
use crate::scene::{SvgScene, VAR_BRANCHES, VAR_FRAME, VAR_LENSES};

/// Fixed lens tint opacity; the translucency is what makes the tint read as
/// glass rather than opaque plastic.
pub const LENS_ALPHA: f64 = 0.45;

/// Slider value at which the lenses render at their drawn size.
pub const LENS_BASELINE_MM: f64 = 50.0;

/// Narrowest stroke the frame may render with, so a zero bridge width still
/// leaves a visible outline.
pub const MIN_STROKE_WIDTH: f64 = 0.5;

/// Frame stroke width for a bridge width: `max(0.5, bridge/4)`. A non-finite
/// bridge lands on the floor.
pub fn stroke_width_for_bridge(bridge_mm: f64) -> f64 {
    (bridge_mm / 4.0).max(MIN_STROKE_WIDTH)
}

/// Horizontal and vertical lens scale for a slider value and shape.
pub fn lens_scale_factors(lens_size_mm: f64, shape: &FrameShape) -> (f64, f64) {
    let base = lens_size_mm / LENS_BASELINE_MM;
    let (shape_x, shape_y) = shape.scale_factors();
    (base * shape_x, base * shape_y)
}

/// Branch tint goes through the scene's custom property; branch paths are
/// never written directly.
pub fn apply_branches_color(state: &ConfiguratorState, scene: &mut SvgScene) {
    scene.set_css_var(VAR_BRANCHES, state.branches.value.clone());
}

/// Writes fill, stroke, and stroke width onto every frame path. The fill is
/// the active texture's pattern reference when one is set, else the flat
/// frame color; the stroke is always the frame color.
pub fn apply_frame_style(state: &ConfiguratorState, scene: &mut SvgScene) {
    let fill = state.frame_texture.as_ref().map_or_else(
        || state.frame.value.clone(),
        |texture| format!("url(#{})", texture.pattern_id),
    );
    scene.set_css_var(VAR_FRAME, state.frame.value.clone());
    let stroke_width = stroke_width_for_bridge(state.bridge_mm);
    for path in &mut scene.frame_group_mut().paths {
        path.fill = Some(fill.clone());
        path.stroke = Some(state.frame.value.clone());
        path.stroke_width = Some(stroke_width);
    }
}

/// Lens tint: the selected hex at the fixed translucent alpha. A malformed
/// hex leaves the previous tint in place.
pub fn apply_lens_color(state: &ConfiguratorState, scene: &mut SvgScene) {
    if let Some(rgba) = hex_to_rgba(&state.lenses.value, LENS_ALPHA) {
        scene.set_css_var(VAR_LENSES, rgba);
    }
}

/// Scales the lens group about the center of its cached pre-transform
/// bounding box, composing after the base transform. Non-finite factors
/// leave the transform untouched.
pub fn apply_lens_scale(state: &ConfiguratorState, scene: &mut SvgScene) {
    let (scale_x, scale_y) = lens_scale_factors(state.lens_size_mm, &state.shape);
    if !scale_x.is_finite() || !scale_y.is_finite() {
        return;
    }
    let center = scene.lens_bbox().center();
    let translate_x = center.x - center.x * scale_x;
    let translate_y = center.y - center.y * scale_y;
    let transform = format!(
        "{} translate({translate_x} {translate_y}) scale({scale_x} {scale_y})",
        scene.lens_base_transform()
    );
    scene.set_lens_transform(transform.trim().to_string());
}

/// Whole-state re-render: all four visual aspects in one pass.
pub fn apply_all(state: &ConfiguratorState, scene: &mut SvgScene) {
    apply_branches_color(state, scene);
    apply_frame_style(state, scene);
    apply_lens_color(state, scene);
    apply_lens_scale(state, scene);
}

/// Human-readable recap of the current selections. The frame label prefers
/// the active texture over the flat color.
pub fn summary_line(state: &ConfiguratorState) -> String {
    let cerclage = state
        .frame_texture
        .as_ref()
        .map_or(state.frame.label.as_str(), |texture| texture.label.as_str());
    format!(
        "Matériau : {} • Branches : {} • Cerclage : {} • Verres : {} • Forme : {}",
        state.material_label,
        state.branches.label,
        cerclage,
        state.lenses.label,
        state.shape.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrameTexture;
    use crate::palette::PaletteColor;
    use crate::scene::FrameTemplate;

    fn scene() -> SvgScene {
        SvgScene::from_template(&FrameTemplate::classic()).expect("scene")
    }

    #[test]
    fn stroke_width_is_quarter_bridge_with_floor() {
        assert_eq!(stroke_width_for_bridge(23.0), 5.75);
        assert_eq!(stroke_width_for_bridge(2.0), 0.5);
        assert_eq!(stroke_width_for_bridge(0.0), 0.5);
        assert_eq!(stroke_width_for_bridge(f64::NAN), 0.5);
    }

    #[test]
    fn scale_factors_follow_shape() {
        let (x, y) = lens_scale_factors(55.0, &FrameShape::Rectangulaire);
        assert!((x - 1.1 * 1.1).abs() < 1e-12);
        assert!((y - 1.1 * 0.9).abs() < 1e-12);
        let (x, y) = lens_scale_factors(40.0, &FrameShape::Papillon);
        assert!((x - 0.8 * 1.15).abs() < 1e-12);
        assert!((y - 0.8 * 0.85).abs() < 1e-12);
        assert_eq!(
            lens_scale_factors(60.0, &FrameShape::Autre("Ronde".into())),
            (1.2, 1.2)
        );
    }

    #[test]
    fn frame_style_prefers_pattern_fill_but_keeps_color_stroke() {
        let mut scene = scene();
        let mut state = ConfiguratorState::default();
        state.frame = PaletteColor {
            value: "#d4c5a0".to_string(),
            label: "Beige".to_string(),
        };
        state.frame_texture = Some(FrameTexture {
            pattern_id: "materiau-abc".to_string(),
            label: "Bois".to_string(),
        });
        state.bridge_mm = 18.0;
        apply_frame_style(&state, &mut scene);
        for path in &scene.frame_group().paths {
            assert_eq!(path.fill.as_deref(), Some("url(#materiau-abc)"));
            assert_eq!(path.stroke.as_deref(), Some("#d4c5a0"));
            assert_eq!(path.stroke_width, Some(4.5));
        }
        assert_eq!(scene.css_var(VAR_FRAME), Some("#d4c5a0"));
    }

    #[test]
    fn lens_color_sets_translucent_custom_property() {
        let mut scene = scene();
        let mut state = ConfiguratorState::default();
        state.lenses = PaletteColor {
            value: "#5678ff".to_string(),
            label: "Bleu".to_string(),
        };
        apply_lens_color(&state, &mut scene);
        assert_eq!(scene.css_var(VAR_LENSES), Some("rgba(86, 120, 255, 0.45)"));

        // A malformed hex keeps the previous tint.
        state.lenses.value = "oops".to_string();
        apply_lens_color(&state, &mut scene);
        assert_eq!(scene.css_var(VAR_LENSES), Some("rgba(86, 120, 255, 0.45)"));
    }

    #[test]
    fn lens_scale_composes_translate_about_cached_center() {
        let mut scene = scene();
        let mut state = ConfiguratorState::default();
        state.lens_size_mm = 60.0;
        state.shape = FrameShape::Autre("Ronde".to_string());
        apply_lens_scale(&state, &mut scene);

        let center = scene.lens_bbox().center();
        let expected_tx = center.x - center.x * 1.2;
        let expected_ty = center.y - center.y * 1.2;
        let expected = format!("translate({expected_tx} {expected_ty}) scale(1.2 1.2)");
        assert_eq!(scene.lens_transform(), Some(expected.as_str()));
    }

    #[test]
    fn repeated_scaling_does_not_compound() {
        let mut scene = scene();
        let mut state = ConfiguratorState::default();
        state.lens_size_mm = 62.0;
        apply_lens_scale(&state, &mut scene);
        let first = scene.lens_transform().map(str::to_string);
        apply_lens_scale(&state, &mut scene);
        apply_lens_scale(&state, &mut scene);
        assert_eq!(scene.lens_transform().map(str::to_string), first);
    }

    #[test]
    fn non_finite_lens_size_leaves_transform_untouched() {
        let mut scene = scene();
        let mut state = ConfiguratorState::default();
        state.lens_size_mm = 55.0;
        apply_lens_scale(&state, &mut scene);
        let before = scene.lens_transform().map(str::to_string);
        state.lens_size_mm = f64::NAN;
        apply_lens_scale(&state, &mut scene);
        assert_eq!(scene.lens_transform().map(str::to_string), before);
    }

    #[test]
    fn summary_prefers_texture_label_for_cerclage() {
        let mut state = ConfiguratorState::default();
        state.material_label = "Acétate".to_string();
        state.shape = FrameShape::Papillon;
        assert_eq!(
            summary_line(&state),
            "Matériau : Acétate • Branches : Noir • Cerclage : Noir • Verres : Noir • Forme : Papillon"
        );
        state.frame_texture = Some(FrameTexture {
            pattern_id: "materiau-abc".to_string(),
            label: "Bois clair".to_string(),
        });
        assert!(summary_line(&state).contains("Cerclage : Bois clair"));
    }
}
