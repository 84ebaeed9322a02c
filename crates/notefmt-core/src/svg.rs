//! Image-occlusion SVG canonicalizer.
//!
//! The document is read into a typed label/mask model, numbers are rounded (half to even) and
//! mask positions clamped into the canvas, then the model is written back with a fixed
//! attribute order and layout.

use crate::error::{Error, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const CREATED_WITH: &str = "<!-- Created with Image Occlusion Enhanced -->";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrokeConfig {
    pub active: bool,
    pub color: String,
    pub width: f64,
    /// Inactive masks carry the stroke too.
    pub inactive_masks: bool,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            active: true,
            color: "#2D2D2D".to_string(),
            width: 1.0,
            inactive_masks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SvgConfig {
    pub background_active: String,
    pub background_inactive: String,
    pub stroke: StrokeConfig,
    /// Class marking an active mask.
    pub active_class: String,
    pub label_font_family: String,
    pub label_font_size: f64,
    pub label_fill: String,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            background_active: "#FF7E7E".to_string(),
            background_inactive: "#FFEBA2".to_string(),
            stroke: StrokeConfig::default(),
            active_class: "qshape".to_string(),
            label_font_family: "Arial".to_string(),
            label_font_size: 20.0,
            label_fill: "#000000".to_string(),
        }
    }
}

impl SvgConfig {
    /// Allowed `[lower, upper]` range for a mask origin on one axis.
    fn origin_bounds(&self, canvas: f64, extent: f64) -> (f64, f64) {
        if self.stroke.active {
            let half = self.stroke.width / 2.0;
            (half, canvas - extent - half)
        } else {
            (0.0, canvas - extent)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
    /// Any other value, written back as found.
    Other(String),
}

impl Anchor {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "start" => Anchor::Start,
            "middle" => Anchor::Middle,
            "end" => Anchor::End,
            _ => Anchor::Other(value.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
            Anchor::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub x: f64,
    pub y: f64,
    pub anchor: Anchor,
    pub font_size: f64,
    pub fill: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelItem {
    Label(Label),
    Group(LabelGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    pub id: Option<String>,
    pub title: Option<String>,
    pub items: Vec<LabelItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub id: Option<String>,
    pub active: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaskItem {
    Mask(Mask),
    Group(MaskGroup),
}

impl MaskItem {
    fn id(&self) -> Option<&str> {
        match self {
            MaskItem::Mask(m) => m.id.as_deref(),
            MaskItem::Group(g) => g.id.as_deref(),
        }
    }

    /// Integer after the second `-` of the id; 0 when missing.
    fn sort_key(&self) -> i64 {
        self.id()
            .and_then(|id| id.split('-').nth(2))
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskGroup {
    pub id: Option<String>,
    pub title: Option<String>,
    pub active: bool,
    pub items: Vec<MaskItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    pub width: f64,
    pub height: f64,
    pub labels: LabelGroup,
    pub masks: MaskGroup,
}

/// Round half to even; the single rounding rule for every coordinate.
pub fn round_number(v: f64) -> f64 {
    v.round_ties_even()
}

fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn parse_number(node: Node<'_, '_>, name: &str, default: Option<f64>) -> Result<f64> {
    let tag = node.tag_name().name();
    match node.attribute(name) {
        Some(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
            Error::malformed_svg(format!("<{tag}> attribute `{name}` is not a number: `{raw}`"))
        }),
        None => default.ok_or_else(|| Error::malformed_svg(format!("<{tag}> is missing `{name}`"))),
    }
}

fn has_class(node: Node<'_, '_>, class: &str) -> bool {
    node.attribute("class")
        .is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

fn element_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn title_of(node: Node<'_, '_>) -> Option<String> {
    element_children(node)
        .find(|c| c.has_tag_name("title"))
        .map(|t| text_of(t).trim().to_string())
}

fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

impl SvgDocument {
    pub fn parse(src: &str, config: &SvgConfig) -> Result<Self> {
        let doc = Document::parse(src)?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(Error::malformed_svg(format!(
                "root element is <{}>, expected <svg>",
                root.tag_name().name()
            )));
        }
        let width = round_number(parse_number(root, "width", None)?);
        let height = round_number(parse_number(root, "height", None)?);

        let mut labels = None;
        let mut masks = None;
        for child in element_children(root) {
            if child.tag_name().name() != "g" {
                return Err(Error::malformed_svg(format!(
                    "unexpected <{}> at top level",
                    child.tag_name().name()
                )));
            }
            match title_of(child).as_deref() {
                Some("Labels") if labels.is_none() => {
                    labels = Some(LabelGroup::parse(child, config, true)?);
                }
                Some("Masks") if masks.is_none() => {
                    masks = Some(MaskGroup::parse(child, config, width, height, true)?);
                }
                Some(title @ ("Labels" | "Masks")) => {
                    return Err(Error::malformed_svg(format!("duplicate `{title}` group")));
                }
                Some(other) => {
                    return Err(Error::malformed_svg(format!("unknown group title `{other}`")));
                }
                None => return Err(Error::malformed_svg("top-level group without a title")),
            }
        }

        Ok(Self {
            width,
            height,
            labels: labels.ok_or_else(|| Error::malformed_svg("missing `Labels` group"))?,
            masks: masks.ok_or_else(|| Error::malformed_svg("missing `Masks` group"))?,
        })
    }

    pub fn render(&self, config: &SvgConfig) -> String {
        let mut w = SvgWriter::default();
        w.open(
            "svg",
            &[
                ("width", fmt_number(self.width)),
                ("height", fmt_number(self.height)),
                ("xmlns", SVG_NS.to_string()),
            ],
        );
        w.line(CREATED_WITH.to_string());
        self.labels.render(&mut w, config);
        self.masks.render(&mut w, config);
        w.close("svg");
        w.finish()
    }
}

impl LabelGroup {
    fn parse(node: Node<'_, '_>, config: &SvgConfig, main: bool) -> Result<Self> {
        let mut items = Vec::new();
        for child in element_children(node) {
            match child.tag_name().name() {
                "title" => {}
                "text" => items.push(LabelItem::Label(Label::parse(child, config)?)),
                "g" => items.push(LabelItem::Group(LabelGroup::parse(child, config, false)?)),
                other => {
                    return Err(Error::malformed_svg(format!("unexpected <{other}> in labels")));
                }
            }
        }
        Ok(Self {
            id: main.then(|| "labels".to_string()),
            title: main.then(|| "Labels".to_string()),
            items,
        })
    }

    fn render(&self, w: &mut SvgWriter, config: &SvgConfig) {
        w.open("g", &[("id", self.id.clone().unwrap_or_default())]);
        if let Some(title) = &self.title {
            w.inline("title", &[], title);
        }
        for item in &self.items {
            match item {
                LabelItem::Label(label) => label.render(w, config),
                LabelItem::Group(group) => group.render(w, config),
            }
        }
        w.close("g");
    }
}

impl Label {
    fn parse(node: Node<'_, '_>, config: &SvgConfig) -> Result<Self> {
        Ok(Self {
            x: round_number(parse_number(node, "x", Some(0.0))?),
            y: round_number(parse_number(node, "y", Some(0.0))?),
            anchor: node
                .attribute("text-anchor")
                .map_or(Anchor::Middle, Anchor::parse),
            font_size: round_number(parse_number(node, "font-size", Some(config.label_font_size))?),
            fill: node
                .attribute("fill")
                .unwrap_or(config.label_fill.as_str())
                .to_string(),
            text: text_of(node),
        })
    }

    fn render(&self, w: &mut SvgWriter, config: &SvgConfig) {
        w.inline(
            "text",
            &[
                ("x", fmt_number(self.x)),
                ("y", fmt_number(self.y)),
                ("text-anchor", self.anchor.as_str().to_string()),
                ("font-family", config.label_font_family.clone()),
                ("font-size", fmt_number(self.font_size)),
                ("fill", self.fill.clone()),
            ],
            &self.text,
        );
    }
}

impl MaskGroup {
    fn parse(
        node: Node<'_, '_>,
        config: &SvgConfig,
        canvas_width: f64,
        canvas_height: f64,
        main: bool,
    ) -> Result<Self> {
        let mut items = Vec::new();
        for child in element_children(node) {
            match child.tag_name().name() {
                "title" => {}
                "rect" => items.push(MaskItem::Mask(Mask::parse(
                    child,
                    config,
                    canvas_width,
                    canvas_height,
                )?)),
                "g" => items.push(MaskItem::Group(MaskGroup::parse(
                    child,
                    config,
                    canvas_width,
                    canvas_height,
                    false,
                )?)),
                other => {
                    return Err(Error::malformed_svg(format!("unexpected <{other}> in masks")));
                }
            }
        }
        // Stable: equal keys keep document order.
        items.sort_by_key(MaskItem::sort_key);
        Ok(Self {
            id: if main {
                Some("masks".to_string())
            } else {
                node.attribute("id").map(str::to_string)
            },
            title: main.then(|| "Masks".to_string()),
            active: has_class(node, &config.active_class),
            items,
        })
    }

    fn render(&self, w: &mut SvgWriter, config: &SvgConfig) {
        let class = if self.active {
            config.active_class.clone()
        } else {
            String::new()
        };
        w.open(
            "g",
            &[("id", self.id.clone().unwrap_or_default()), ("class", class)],
        );
        if let Some(title) = &self.title {
            w.inline("title", &[], title);
        }
        for item in &self.items {
            match item {
                MaskItem::Mask(mask) => mask.render(w, config),
                MaskItem::Group(group) => group.render(w, config),
            }
        }
        w.close("g");
    }
}

impl Mask {
    fn parse(
        node: Node<'_, '_>,
        config: &SvgConfig,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<Self> {
        let width = round_number(parse_number(node, "width", None)?);
        let height = round_number(parse_number(node, "height", None)?);
        let (x_min, x_max) = config.origin_bounds(canvas_width, width);
        let (y_min, y_max) = config.origin_bounds(canvas_height, height);
        let x = parse_number(node, "x", Some(0.0))?;
        let y = parse_number(node, "y", Some(0.0))?;
        Ok(Self {
            id: node.attribute("id").map(str::to_string),
            active: has_class(node, &config.active_class),
            // min/max rather than clamp: bounds cross when a mask is larger than the canvas.
            x: round_number(x.min(x_max).max(x_min)),
            y: round_number(y.min(y_max).max(y_min)),
            width,
            height,
        })
    }

    fn render(&self, w: &mut SvgWriter, config: &SvgConfig) {
        let stroke = &config.stroke;
        let stroked = stroke.active && (self.active || stroke.inactive_masks);
        let fill = if self.active {
            &config.background_active
        } else {
            &config.background_inactive
        };
        let mut attrs = vec![
            ("id", self.id.clone().unwrap_or_default()),
            ("x", fmt_number(self.x)),
            ("y", fmt_number(self.y)),
            ("width", fmt_number(self.width)),
            ("height", fmt_number(self.height)),
            ("fill", fill.clone()),
        ];
        if stroked {
            attrs.push(("stroke", stroke.color.clone()));
            attrs.push(("stroke-width", fmt_number(stroke.width)));
        }
        if self.active {
            attrs.push(("class", config.active_class.clone()));
        }
        w.empty("rect", &attrs);
    }
}

/// Indented, single-quoted SVG output. Empty attribute values are omitted.
#[derive(Default)]
struct SvgWriter {
    lines: Vec<String>,
    depth: usize,
}

impl SvgWriter {
    fn tag(name: &str, attrs: &[(&str, String)]) -> String {
        let mut out = format!("<{name}");
        for (key, value) in attrs {
            if value.is_empty() {
                continue;
            }
            out.push(' ');
            out.push_str(key);
            out.push_str("='");
            escape_into(&mut out, value);
            out.push('\'');
        }
        out
    }

    fn line(&mut self, text: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), text));
    }

    fn open(&mut self, name: &str, attrs: &[(&str, String)]) {
        let tag = Self::tag(name, attrs) + ">";
        self.line(tag);
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        self.line(format!("</{name}>"));
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) {
        let tag = Self::tag(name, attrs) + "/>";
        self.line(tag);
    }

    fn inline(&mut self, name: &str, attrs: &[(&str, String)], text: &str) {
        let mut out = Self::tag(name, attrs);
        out.push('>');
        escape_into(&mut out, text);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
        self.line(out);
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

fn escape_into(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
}

pub fn format_svg(src: &str) -> Result<String> {
    format_svg_with(src, &SvgConfig::default())
}

pub fn format_svg_with(src: &str, config: &SvgConfig) -> Result<String> {
    Ok(SvgDocument::parse(src, config)?.render(config))
}
