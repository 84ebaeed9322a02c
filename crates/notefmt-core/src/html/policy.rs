//! Declarative tag/attribute allow-list consulted by the sanitizer and the formatter.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a tag participates in line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    /// Opens and closes on lines of its own; children are indented.
    Block,
    /// Occupies exactly one line (list items, table cells, captions).
    Line,
    /// Stays on the current line.
    #[default]
    Inline,
    /// Void line break: stays on the current line and ends it outside line tags.
    Break,
    /// Void element that starts a new line outside line tags.
    Void,
}

impl TagKind {
    pub fn is_void(self) -> bool {
        matches!(self, TagKind::Break | TagKind::Void)
    }
}

/// Accepted values for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttrRule {
    Any,
    Digits,
    OneOf(Vec<String>),
    /// Allowed style properties mapped to allowed values (`*` accepts anything).
    Style(IndexMap<String, Vec<String>>),
}

impl AttrRule {
    fn accepts(&self, value: &str) -> bool {
        match self {
            AttrRule::Any => true,
            AttrRule::Digits => !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            AttrRule::OneOf(values) => values.iter().any(|v| v == value.trim()),
            AttrRule::Style(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagRule {
    pub kind: TagKind,
    /// Allowed attributes, in output order.
    pub attributes: IndexMap<String, AttrRule>,
    /// Attributes injected regardless of the source. `style` entries are merged per property.
    pub required: IndexMap<String, String>,
    /// Adjacent identical siblings are merged and same-tag nesting is flattened.
    pub merge: bool,
    /// Whitespace before the opening tag is dropped.
    pub tight: bool,
    /// Kept even without content.
    pub keep_empty: bool,
}

impl TagRule {
    fn new(kind: TagKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    fn attr(mut self, name: &str, rule: AttrRule) -> Self {
        self.attributes.insert(name.to_string(), rule);
        self
    }

    fn require(mut self, name: &str, value: &str) -> Self {
        self.required.insert(name.to_string(), value.to_string());
        self
    }

    fn formatting(mut self) -> Self {
        self.merge = true;
        self
    }

    fn tight(mut self) -> Self {
        self.tight = true;
        self
    }

    fn keep_empty(mut self) -> Self {
        self.keep_empty = true;
        self
    }

    /// Keeps allowed attributes (in rule order) and injects required ones.
    pub fn filter_attrs(&self, attrs: &IndexMap<String, String>) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for (name, rule) in &self.attributes {
            let source = attrs.get(name);
            let required = self.required.get(name);
            let value = match rule {
                AttrRule::Style(allowed) => {
                    let mut decls: IndexMap<String, String> = source
                        .map(|s| parse_style(s))
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|(prop, value)| {
                            allowed
                                .get(prop)
                                .is_some_and(|vals| vals.iter().any(|v| v == "*" || v == value))
                        })
                        .collect();
                    for (prop, value) in required.map(|s| parse_style(s)).unwrap_or_default() {
                        decls.insert(prop, value);
                    }
                    (!decls.is_empty()).then(|| render_style(&decls))
                }
                _ => required
                    .cloned()
                    .or_else(|| source.filter(|v| rule.accepts(v)).cloned()),
            };
            if let Some(value) = value {
                out.insert(name.clone(), value);
            }
        }
        for (name, value) in &self.required {
            if !out.contains_key(name) {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            (!prop.is_empty() && !value.is_empty()).then(|| (prop, value.to_string()))
        })
        .collect()
}

fn render_style(decls: &IndexMap<String, String>) -> String {
    decls
        .iter()
        .map(|(prop, value)| format!("{prop}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output names for the emphasis tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmphasisStyle {
    /// `strong` / `em`
    #[default]
    Semantic,
    /// `b` / `i`
    Presentational,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HtmlPolicy {
    pub tags: IndexMap<String, TagRule>,
    /// Alternative spellings mapped to the key used in `tags`.
    pub synonyms: IndexMap<String, String>,
    pub emphasis: EmphasisStyle,
    /// Disallowed tags removed together with their content.
    pub drop_with_content: Vec<String>,
    /// Text starting with one of these directly after a closing tag loses its leading space.
    pub no_space_before: Vec<String>,
    /// Text ending with one of these directly before an opening tag loses its trailing space.
    pub no_space_after: Vec<String>,
    pub indent: usize,
}

impl Default for HtmlPolicy {
    fn default() -> Self {
        use AttrRule::*;
        use TagKind::*;

        let style = |pairs: &[(&str, &[&str])]| {
            Style(
                pairs
                    .iter()
                    .map(|(prop, values)| {
                        (
                            prop.to_string(),
                            values.iter().map(|v| v.to_string()).collect(),
                        )
                    })
                    .collect(),
            )
        };
        let cell = || {
            TagRule::new(Line)
                .attr("colspan", Digits)
                .attr("rowspan", Digits)
                .attr("style", style(&[("text-align", &["left", "center", "right"])]))
                .keep_empty()
        };

        let tags = [
            ("section", TagRule::new(Block)),
            ("ul", TagRule::new(Block)),
            ("ol", TagRule::new(Block).attr("start", Digits)),
            ("li", TagRule::new(Line)),
            (
                "table",
                TagRule::new(Block)
                    .attr("border", OneOf(vec!["1".to_string()]))
                    .attr("style", style(&[("border-collapse", &["collapse"])]))
                    .require("border", "1")
                    .require("style", "border-collapse: collapse"),
            ),
            ("caption", TagRule::new(Line)),
            ("colgroup", TagRule::new(Block)),
            ("col", TagRule::new(Void).attr("style", style(&[("width", &["*"])]))),
            ("thead", TagRule::new(Block)),
            ("tbody", TagRule::new(Block)),
            ("tfoot", TagRule::new(Block)),
            ("tr", TagRule::new(Block)),
            ("td", cell()),
            ("th", cell()),
            ("strong", TagRule::new(Inline).formatting()),
            ("em", TagRule::new(Inline).formatting()),
            ("u", TagRule::new(Inline).formatting()),
            ("ins", TagRule::new(Inline).formatting()),
            ("sub", TagRule::new(Inline).formatting().tight()),
            ("sup", TagRule::new(Inline).formatting().tight()),
            (
                "anki-mathjax",
                TagRule::new(Inline).attr("block", OneOf(vec!["true".to_string()])),
            ),
            ("br", TagRule::new(Break)),
            ("img", TagRule::new(Void).attr("src", Any)),
        ];

        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            tags: tags
                .into_iter()
                .map(|(name, rule)| (name.to_string(), rule))
                .collect(),
            synonyms: [("b", "strong"), ("i", "em")]
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            emphasis: EmphasisStyle::default(),
            drop_with_content: strings(&["script", "style"]),
            no_space_before: strings(&[".", ",", "!", "?", ":", "}}", "::"]),
            no_space_after: strings(&["{{", "::"]),
            indent: 2,
        }
    }
}

impl HtmlPolicy {
    /// Lower-cased name with synonyms resolved.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.synonyms.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn rule(&self, canonical: &str) -> Option<&TagRule> {
        self.tags.get(canonical)
    }

    pub fn kind(&self, canonical: &str) -> TagKind {
        self.rule(canonical).map(|r| r.kind).unwrap_or_default()
    }

    /// Name written to the output for a canonical tag.
    pub fn output_name<'a>(&self, canonical: &'a str) -> &'a str {
        match (self.emphasis, canonical) {
            (EmphasisStyle::Presentational, "strong") => "b",
            (EmphasisStyle::Presentational, "em") => "i",
            _ => canonical,
        }
    }

    pub fn presentational() -> Self {
        Self {
            emphasis: EmphasisStyle::Presentational,
            ..Self::default()
        }
    }
}
