//! `occlusion`: the cloze list of an image-occlusion note, ordered by cloze number.

use super::plaintext;
use crate::registry::Context;
use crate::{Formatted, Result};
use regex::Regex;
use std::sync::OnceLock;

fn cloze_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{c(\d+)::(.+?)\}\}").expect("valid regex"))
}

/// `minimized` has no effect: the output is always a single line.
pub fn format_occlusion(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let text = plaintext(value, ctx);

    let mut clozes: Vec<(u64, &str)> = cloze_regex()
        .captures_iter(&text)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str().parse().ok()?;
            Some((number, caps.get(2)?.as_str()))
        })
        .collect();
    clozes.sort_by_key(|(number, _)| *number);

    let joined = clozes
        .iter()
        .map(|(number, body)| format!("{{{{c{number}::{body}}}}}"))
        .collect::<String>();
    Ok(Formatted::compare(value, joined))
}
