//! `source`: comma-separated source list, sorted.

use super::clean_line;
use crate::registry::Context;
use crate::{Formatted, Result};

pub fn format_source(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let cleaned = clean_line(value, ctx);
    if cleaned.is_empty() {
        return Ok(Formatted::compare(value, cleaned));
    }

    let mut sources: Vec<&str> = cleaned.split(", ").collect();
    for source in &sources {
        if !ctx.config.sources.iter().any(|known| known == source) {
            ctx.reporter.critical(&format!("Unknown source: {source}"));
        }
    }
    sources.sort_unstable();
    Ok(Formatted::compare(value, sources.join(", ")))
}
