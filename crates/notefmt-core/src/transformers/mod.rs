//! Field transformers. Every transformer maps `(value, ctx)` to a [`Formatted`] and is
//! idempotent on its own output.

pub mod date;
pub mod image_occlusion;
pub mod links;
pub mod meditricks;
pub mod occlusion;
pub mod source;

use crate::html::{format_html_with, strip_markup};
use crate::registry::Context;
use crate::symbols::{SymbolMode, fix_encoding};
use crate::{Formatted, Result};

/// Erases the field.
pub fn format_clear(value: &str, _ctx: &Context<'_>) -> Result<Formatted> {
    Ok(Formatted::compare(value, String::new()))
}

pub fn format_skip(value: &str, _ctx: &Context<'_>) -> Result<Formatted> {
    Ok(Formatted::unchanged(value))
}

pub fn format_html_field(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    format_html_with(value, &ctx.config.html, &ctx.config.symbols, ctx.minimized)
}

pub fn format_plaintext(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    Ok(Formatted::compare(value, plaintext(value, ctx)))
}

/// Text content of `value` with entities decoded and symbols normalized.
pub(crate) fn plaintext(value: &str, ctx: &Context<'_>) -> String {
    let symbols = &ctx.config.symbols;
    let fixed = fix_encoding(value);
    let markup = symbols.replace(&fixed, SymbolMode::Plain, true);
    let text = strip_markup(&markup);
    let text = htmlize::unescape(text.as_str());
    symbols.replace(&text, SymbolMode::Plain, false).trim().to_string()
}

/// Shared front end of the single-line transformers.
pub(crate) fn clean_line(value: &str, ctx: &Context<'_>) -> String {
    let fixed = fix_encoding(value);
    ctx.config
        .symbols
        .replace(&fixed, SymbolMode::Plain, false)
        .trim()
        .to_string()
}
