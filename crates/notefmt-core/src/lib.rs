#![forbid(unsafe_code)]

//! Canonical formatting for hand-authored note fields.
//!
//! Each field is run through a named transformer (`html`, `date`, `source`, ...) that maps
//! its value to a byte-stable canonical form. Transformers are idempotent: feeding their
//! output back in reports `changed = false`.

pub mod config;
pub mod error;
pub mod html;
pub mod links;
pub mod media;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod svg;
pub mod symbols;
pub mod templates;
pub mod transformers;

pub use config::{FormatterConfig, LinkSite, MeditricksConfig};
pub use error::{Error, Result};
pub use html::{HtmlPolicy, format_html, format_html_with};
pub use links::{NoTitles, StaticTitles, TitleError, TitleLookup, extract_title};
pub use media::{MediaDir, MediaStore, MemoryMedia, NoMedia};
pub use orchestrator::{Record, RecordStore, Summary, run};
pub use registry::{Context, Transformer, TransformerRegistry};
pub use report::{FieldReporter, RecordingReporter, Report, Reporter, Severity, TracingReporter};
pub use svg::{SvgConfig, SvgDocument, format_svg, format_svg_with};
pub use symbols::{SymbolMode, SymbolTable, fix_encoding, replace_symbols};
pub use templates::{TransformerConfig, TypeConfig};

/// A transformer result: the canonical value and whether it differs from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub value: String,
    pub changed: bool,
}

impl Formatted {
    pub fn compare(original: &str, value: String) -> Self {
        let changed = original != value;
        Self { value, changed }
    }

    pub fn unchanged(original: &str) -> Self {
        Self {
            value: original.to_string(),
            changed: false,
        }
    }
}
