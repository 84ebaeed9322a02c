//! `meditricks`: a single embed container `<div class="..." data-src="<digits>"></div>`.

use crate::html::{Element, GenericHtml, MarkupNode, parse_fragment};
use crate::registry::Context;
use crate::symbols::{SymbolMode, fix_encoding, strip_whitespace_between_tags};
use crate::{Formatted, Result};

pub fn format_meditricks(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let fixed = fix_encoding(value);
    let markup = ctx.config.symbols.replace(&fixed, SymbolMode::Plain, true);
    let markup = strip_whitespace_between_tags(markup.trim());
    if markup.is_empty() {
        return Ok(Formatted::compare(value, markup));
    }

    let class = ctx.config.meditricks.class.as_str();
    let Some(id) = embed_id(&markup, class) else {
        ctx.reporter.critical(&format!("Invalid meditricks: {value}"));
        return Ok(Formatted::unchanged(value));
    };
    Ok(Formatted::compare(
        value,
        format!(r#"<div class="{class}" data-src="{id}"></div>"#),
    ))
}

fn embed_id(markup: &str, class: &str) -> Option<String> {
    let nodes = parse_fragment(markup, &GenericHtml).ok()?;
    let [MarkupNode::Element(el)] = nodes.as_slice() else {
        return None;
    };
    if !is_container(el, class) {
        return None;
    }
    let id = el.attr("data-src")?.trim();
    let numeric = !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit());
    numeric.then(|| id.to_string())
}

fn is_container(el: &Element, class: &str) -> bool {
    el.name == "div" && el.classes() == [class]
}
