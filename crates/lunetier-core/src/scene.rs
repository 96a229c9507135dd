//! SVG scene graph: three fixed groups (branches, frame front, lenses),
//! pattern definitions, and serialization of the whole document to markup.
//!
//! Geometry is parsed once at construction so the lens group's untransformed
//! bounding box can be cached. All scale math runs against that cached box;
//! recomputing it after a transform has been applied would compound the
//! factors on every slider event.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use kurbo::{BezPath, Rect, Shape as _};

use crate::error::SceneError;

/// Group id of the temple arms.
pub const GROUP_BRANCHES: &str = "branches";
/// Group id of the frame front (rims and bridge).
pub const GROUP_FRAME: &str = "monture";
/// Group id of the lenses.
pub const GROUP_LENSES: &str = "verres";

/// Custom property consumed by the branch paths' fill.
pub const VAR_BRANCHES: &str = "--color-branches";
/// Custom property mirroring the frame color (the stroke source).
pub const VAR_FRAME: &str = "--color-frame";
/// Custom property consumed by the lens paths' fill.
pub const VAR_LENSES: &str = "--color-lenses";

/// One `<path>` element with the presentation attributes the renderer
/// touches.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePath {
    pub d: String,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
}

impl ScenePath {
    pub fn new(d: impl Into<String>) -> Self {
        Self {
            d: d.into(),
            fill: None,
            stroke: None,
            stroke_width: None,
        }
    }

    fn with_fill(mut self, fill: &str) -> Self {
        self.fill = Some(fill.to_string());
        self
    }
}

/// One `<g>` element and its paths.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGroup {
    pub id: &'static str,
    pub paths: Vec<ScenePath>,
    pub transform: Option<String>,
}

/// An image-backed fill pattern registered under `<defs>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDef {
    pub id: String,
    pub image_url: String,
}

/// Static artwork a scene is built from: path data per group plus the lens
/// group's base transform (usually empty, kept verbatim when not).
#[derive(Debug, Clone)]
pub struct FrameTemplate {
    pub view_box: String,
    pub branches: Vec<String>,
    pub frame: Vec<String>,
    pub lenses: Vec<String>,
    pub lens_base_transform: String,
}

impl FrameTemplate {
    /// The stock frame shipped with the configurator: two cubic-spline lens
    /// ovals, slightly larger rims, a bridge, and two tapered temples.
    pub fn classic() -> Self {
        Self {
            view_box: "0 0 240 120".to_string(),
            branches: vec![
                "M28 52L6 46C3.8 45.4 2 47 2 49.2L2 54.8C2 57 3.8 58.6 6 58L28 64Z".to_string(),
                "M212 52L234 46C236.2 45.4 238 47 238 49.2L238 54.8C238 57 236.2 58.6 234 58L212 64Z"
                    .to_string(),
            ],
            frame: vec![
                "M28 62C28 45.4 45 32 66 32C87 32 104 45.4 104 62C104 78.6 87 92 66 92C45 92 28 78.6 28 62Z"
                    .to_string(),
                "M136 62C136 45.4 153 32 174 32C195 32 212 45.4 212 62C212 78.6 195 92 174 92C153 92 136 78.6 136 62Z"
                    .to_string(),
                "M104 56C110 48 130 48 136 56L136 66C130 60 110 60 104 66Z".to_string(),
            ],
            lenses: vec![
                "M32 62C32 47.6 47.2 36 66 36C84.8 36 100 47.6 100 62C100 76.4 84.8 88 66 88C47.2 88 32 76.4 32 62Z"
                    .to_string(),
                "M140 62C140 47.6 155.2 36 174 36C192.8 36 208 47.6 208 62C208 76.4 192.8 88 174 88C155.2 88 140 76.4 140 62Z"
                    .to_string(),
            ],
            lens_base_transform: String::new(),
        }
    }
}

/// The in-memory SVG document the renderer projects configurator state onto.
#[derive(Debug, Clone)]
pub struct SvgScene {
    view_box: String,
    css_vars: BTreeMap<&'static str, String>,
    defs: Vec<PatternDef>,
    branches: SceneGroup,
    frame: SceneGroup,
    lenses: SceneGroup,
    lens_base_transform: String,
    lens_bbox: Rect,
}

impl SvgScene {
    /// Builds a scene, validating every path and caching the lens group's
    /// pre-transform bounding box.
    pub fn from_template(template: &FrameTemplate) -> Result<Self, SceneError> {
        let lens_bbox = group_bbox(GROUP_LENSES, &template.lenses)?;
        validate_paths(GROUP_BRANCHES, &template.branches)?;
        validate_paths(GROUP_FRAME, &template.frame)?;
        if template.branches.is_empty() {
            return Err(SceneError::EmptyGroup {
                group: GROUP_BRANCHES,
            });
        }
        if template.frame.is_empty() {
            return Err(SceneError::EmptyGroup { group: GROUP_FRAME });
        }

        let branches = SceneGroup {
            id: GROUP_BRANCHES,
            paths: template
                .branches
                .iter()
                .map(|d| ScenePath::new(d).with_fill(&format!("var({VAR_BRANCHES})")))
                .collect(),
            transform: None,
        };
        let frame = SceneGroup {
            id: GROUP_FRAME,
            paths: template.frame.iter().map(ScenePath::new).collect(),
            transform: None,
        };
        let lenses = SceneGroup {
            id: GROUP_LENSES,
            paths: template
                .lenses
                .iter()
                .map(|d| ScenePath::new(d).with_fill(&format!("var({VAR_LENSES})")))
                .collect(),
            transform: if template.lens_base_transform.is_empty() {
                None
            } else {
                Some(template.lens_base_transform.clone())
            },
        };

        Ok(Self {
            view_box: template.view_box.clone(),
            css_vars: BTreeMap::new(),
            defs: Vec::new(),
            branches,
            frame,
            lenses,
            lens_base_transform: template.lens_base_transform.clone(),
            lens_bbox,
        })
    }

    pub fn set_css_var(&mut self, name: &'static str, value: String) {
        self.css_vars.insert(name, value);
    }

    pub fn css_var(&self, name: &str) -> Option<&str> {
        self.css_vars.get(name).map(String::as_str)
    }

    pub fn branches_group(&self) -> &SceneGroup {
        &self.branches
    }

    pub fn frame_group(&self) -> &SceneGroup {
        &self.frame
    }

    pub fn frame_group_mut(&mut self) -> &mut SceneGroup {
        &mut self.frame
    }

    pub fn lenses_group(&self) -> &SceneGroup {
        &self.lenses
    }

    /// Base transform captured at construction; scale transforms are
    /// composed after it.
    pub fn lens_base_transform(&self) -> &str {
        &self.lens_base_transform
    }

    /// The lens group's untransformed bounding box, cached at construction.
    pub fn lens_bbox(&self) -> Rect {
        self.lens_bbox
    }

    pub fn set_lens_transform(&mut self, transform: String) {
        self.lenses.transform = if transform.is_empty() {
            None
        } else {
            Some(transform)
        };
    }

    pub fn lens_transform(&self) -> Option<&str> {
        self.lenses.transform.as_deref()
    }

    /// Registers an image pattern, creating it on first use and only
    /// refreshing the image reference afterwards.
    pub fn ensure_pattern(&mut self, id: &str, image_url: &str) {
        if let Some(existing) = self.defs.iter_mut().find(|pattern| pattern.id == id) {
            existing.image_url = image_url.to_string();
            return;
        }
        self.defs.push(PatternDef {
            id: id.to_string(),
            image_url: image_url.to_string(),
        });
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternDef> {
        self.defs.iter().find(|pattern| pattern.id == id)
    }

    pub fn patterns(&self) -> &[PatternDef] {
        &self.defs
    }

    /// Serializes the whole document, defs first, then the groups back to
    /// front (branches, frame, lenses) so the translucent lenses paint on
    /// top of the frame.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" viewBox=\"{}\"",
            xml_escape(&self.view_box)
        );
        if !self.css_vars.is_empty() {
            let style = self
                .css_vars
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", xml_escape(&style));
        }
        out.push('>');
        if !self.defs.is_empty() {
            out.push_str("<defs>");
            for pattern in &self.defs {
                let href = xml_escape(&pattern.image_url);
                let _ = write!(
                    out,
                    "<pattern id=\"{}\" patternUnits=\"objectBoundingBox\" patternContentUnits=\"objectBoundingBox\" width=\"1\" height=\"1\">",
                    xml_escape(&pattern.id)
                );
                let _ = write!(
                    out,
                    "<image preserveAspectRatio=\"xMidYMid slice\" width=\"100%\" height=\"100%\" href=\"{href}\" xlink:href=\"{href}\"/>"
                );
                out.push_str("</pattern>");
            }
            out.push_str("</defs>");
        }
        for group in [&self.branches, &self.frame, &self.lenses] {
            write_group(&mut out, group);
        }
        out.push_str("</svg>");
        out
    }
}

fn validate_paths(group: &'static str, paths: &[String]) -> Result<(), SceneError> {
    for d in paths {
        BezPath::from_svg(d).map_err(|err| SceneError::InvalidPath {
            group,
            detail: err.to_string(),
        })?;
    }
    Ok(())
}

fn group_bbox(group: &'static str, paths: &[String]) -> Result<Rect, SceneError> {
    let mut bbox: Option<Rect> = None;
    for d in paths {
        let path = BezPath::from_svg(d).map_err(|err| SceneError::InvalidPath {
            group,
            detail: err.to_string(),
        })?;
        let path_bbox = path.bounding_box();
        bbox = Some(match bbox {
            Some(acc) => acc.union(path_bbox),
            None => path_bbox,
        });
    }
    bbox.ok_or(SceneError::EmptyGroup { group })
}

fn write_group(out: &mut String, group: &SceneGroup) {
    let _ = write!(out, "<g id=\"{}\"", group.id);
    if let Some(transform) = group.transform.as_deref() {
        let _ = write!(out, " transform=\"{}\"", xml_escape(transform));
    }
    out.push('>');
    for path in &group.paths {
        let _ = write!(out, "<path d=\"{}\"", xml_escape(&path.d));
        if let Some(fill) = &path.fill {
            let _ = write!(out, " fill=\"{}\"", xml_escape(fill));
        }
        if let Some(stroke) = &path.stroke {
            let _ = write!(out, " stroke=\"{}\"", xml_escape(stroke));
        }
        if let Some(width) = path.stroke_width {
            let _ = write!(out, " stroke-width=\"{width}\"");
        }
        out.push_str("/>");
    }
    out.push_str("</g>");
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
