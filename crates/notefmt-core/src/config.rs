//! Deployment configuration: allow-lists, symbol tables, SVG styling, and the lookup tables
//! used by the field transformers.

use crate::error::{Error, Result};
use crate::html::HtmlPolicy;
use crate::svg::SvgConfig;
use crate::symbols::SymbolTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A link domain: hrefs containing `pattern` get their subject from `title_regex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSite {
    pub pattern: String,
    /// Capture group 1 is the subject.
    pub title_regex: String,
    pub site_name: String,
}

impl LinkSite {
    fn new(pattern: &str, title_regex: &str, site_name: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            title_regex: title_regex.to_string(),
            site_name: site_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeditricksConfig {
    pub class: String,
}

impl Default for MeditricksConfig {
    fn default() -> Self {
        Self {
            class: "mt-anki-iframe-src".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatterConfig {
    pub html: HtmlPolicy,
    pub symbols: SymbolTable,
    #[serde(rename = "imageOcclusionSVG")]
    pub image_occlusion_svg: SvgConfig,
    pub sources: Vec<String>,
    pub links: Vec<LinkSite>,
    pub meditricks: MeditricksConfig,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            html: HtmlPolicy::default(),
            symbols: SymbolTable::default(),
            image_occlusion_svg: SvgConfig::default(),
            sources: ["AMBOSS", "DocCheck", "Wikipedia", "via medici"]
                .into_iter()
                .map(String::from)
                .collect(),
            links: vec![
                LinkSite::new("wikipedia.org/wiki", r"^(.*) – Wikipedia$", "Wikipedia"),
                LinkSite::new(
                    "flexikon.doccheck.com",
                    r"^(.*) - DocCheck Flexikon$",
                    "DocCheck Flexikon",
                ),
                LinkSite::new(
                    "gelbe-liste.de/wirkstoffe",
                    r"^(.*) - Anwendung, Wirkung, Nebenwirkungen \| Gelbe Liste$",
                    "Gelbe Liste",
                ),
                LinkSite::new("gelbe-liste.de/produkte", r"^(.*) \| Gelbe Liste$", "Gelbe Liste"),
                LinkSite::new("embryotox.de/arzneimittel", r"^Embryotox - (.*)$", "Embryotox"),
            ],
            meditricks: MeditricksConfig::default(),
        }
    }
}

impl FormatterConfig {
    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// First link rule whose pattern occurs in `href`.
    pub fn link_site(&self, href: &str) -> Option<&LinkSite> {
        self.links.iter().find(|site| href.contains(site.pattern.as_str()))
    }
}
