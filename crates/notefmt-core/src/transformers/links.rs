//! `links`: a list of anchors relabelled as `Subject – Site` from the linked page's title.

use crate::html::tree::{escape_text, push_attr};
use crate::html::{GenericHtml, MarkupNode, parse_fragment};
use crate::registry::Context;
use crate::symbols::{SymbolMode, fix_encoding};
use crate::{Formatted, Result};
use regex::Regex;

pub fn format_links(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let fixed = fix_encoding(value);
    let markup = ctx.config.symbols.replace(&fixed, SymbolMode::Plain, true);
    let markup = markup.trim();
    if markup.is_empty() {
        return Ok(Formatted::compare(value, String::new()));
    }

    let nodes = match parse_fragment(markup, &GenericHtml) {
        Ok(nodes) => nodes,
        Err(err) => {
            ctx.reporter.critical(&format!("Invalid links: {err}"));
            return Ok(Formatted::unchanged(value));
        }
    };

    let mut links = Vec::new();
    for node in &nodes {
        match node {
            MarkupNode::Element(el) if el.name == "br" => continue,
            MarkupNode::Comment(_) => continue,
            node if node.is_blank_text() => continue,
            MarkupNode::Element(el) if el.name == "a" => {
                let Some(href) = el.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
                    ctx.reporter.critical("Invalid link: anchor without href");
                    return Ok(Formatted::unchanged(value));
                };
                match relabel(href, ctx) {
                    Some(link) => links.push(link),
                    None => return Ok(Formatted::unchanged(value)),
                }
            }
            other => {
                ctx.reporter.critical(&format!("Invalid link: {}", describe(other)));
                return Ok(Formatted::unchanged(value));
            }
        }
    }

    let separator = if ctx.minimized { "<br>" } else { "<br>\n" };
    Ok(Formatted::compare(value, links.join(separator)))
}

/// Canonical anchor for `href`, or `None` after reporting why it could not be built.
fn relabel(href: &str, ctx: &Context<'_>) -> Option<String> {
    if let Err(err) = url::Url::parse(href) {
        ctx.reporter.critical(&format!("Invalid link target {href}: {err}"));
        return None;
    }
    let Some(site) = ctx.config.link_site(href) else {
        ctx.reporter.info(&format!("Unknown website: {href}"));
        return None;
    };
    let title = match ctx.titles.title(href) {
        Ok(title) => title,
        Err(err) => {
            ctx.reporter.critical(&format!("Could not fetch title of {href}: {err}"));
            return None;
        }
    };
    let subject = match Regex::new(&site.title_regex) {
        Ok(re) => re
            .captures(&title)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string()),
        Err(err) => {
            ctx.reporter.critical(&format!("Invalid title pattern for {}: {err}", site.pattern));
            return None;
        }
    };
    let Some(subject) = subject else {
        ctx.reporter.critical(&format!("Could not parse website title: {title} ({href})"));
        return None;
    };

    let mut out = String::from("<a");
    push_attr(&mut out, "href", href);
    out.push('>');
    out.push_str(&escape_text(&format!("{subject} – {}", site.site_name)));
    out.push_str("</a>");
    Some(out)
}

fn describe(node: &MarkupNode) -> String {
    match node {
        MarkupNode::Element(el) => format!("<{}>", el.name),
        MarkupNode::Text(t) => t.trim().to_string(),
        MarkupNode::Comment(_) => "comment".to_string(),
    }
}
