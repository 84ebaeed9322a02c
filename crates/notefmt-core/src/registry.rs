//! Transformer dispatch table.

use crate::config::FormatterConfig;
use crate::links::TitleLookup;
use crate::media::MediaStore;
use crate::report::Reporter;
use crate::transformers;
use crate::{Formatted, Result};
use rustc_hash::FxHashMap;

/// Everything a transformer may consult besides the field value.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub minimized: bool,
    pub config: &'a FormatterConfig,
    pub reporter: &'a dyn Reporter,
    pub titles: &'a dyn TitleLookup,
    pub media: &'a dyn MediaStore,
}

impl<'a> Context<'a> {
    pub fn with_reporter(self, reporter: &'a dyn Reporter) -> Self {
        Self { reporter, ..self }
    }
}

/// Field-local problems go to `ctx.reporter`; an `Err` aborts the whole batch.
pub type Transformer = fn(value: &str, ctx: &Context<'_>) -> Result<Formatted>;

#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    transformers: FxHashMap<&'static str, Transformer>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, transformer: Transformer) {
        self.transformers.insert(name, transformer);
    }

    pub fn get(&self, name: &str) -> Option<Transformer> {
        self.transformers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transformers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.transformers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn default_transformers() -> Self {
        let mut reg = Self::new();

        reg.insert("clear", transformers::format_clear);
        reg.insert("skip", transformers::format_skip);
        reg.insert("plaintext", transformers::format_plaintext);
        reg.insert("html", transformers::format_html_field);

        reg.insert("date", transformers::date::format_date);
        reg.insert("source", transformers::source::format_source);
        reg.insert("occlusion", transformers::occlusion::format_occlusion);
        reg.insert("meditricks", transformers::meditricks::format_meditricks);
        reg.insert("links", transformers::links::format_links);
        reg.insert(
            "imageOcclusionSVG",
            transformers::image_occlusion::format_image_occlusion,
        );

        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_every_transformer() {
        let reg = TransformerRegistry::default_transformers();
        assert_eq!(
            reg.names(),
            vec![
                "clear",
                "date",
                "html",
                "imageOcclusionSVG",
                "links",
                "meditricks",
                "occlusion",
                "plaintext",
                "skip",
                "source",
            ]
        );
    }
}
