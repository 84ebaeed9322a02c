//! Encoding repair and symbol substitution shared by every field transformer.
//!
//! Substitution is table-driven ([`SymbolTable`]) so deployments can extend the glyph alphabet
//! without code changes. MathJax segments (`\[...\]` and `\(...\)`) are never rewritten.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Which direction script characters are mapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolMode {
    /// Unicode sub/superscripts become `<sub>`/`<sup>` markup.
    Html,
    /// `<sub>`/`<sup>` markup collapses back into Unicode sub/superscripts.
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Raw `<`/`>` belong to tag syntax when operating on unparsed markup.
    fn touches_markup(&self) -> bool {
        self.from.contains(['<', '>'])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SymbolTable {
    /// Arrow/equivalence digraphs, applied in order (longest sources first).
    pub arrows: Vec<Replacement>,
    /// Typographic quotes and non-breaking spaces.
    pub quotes: Vec<Replacement>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let arrows = [
            ("&lt;-&gt;", "↔"),
            ("&lt;=&gt;", "⇔"),
            ("<->", "↔"),
            ("<=>", "⇔"),
            ("-&gt;", "→"),
            ("&lt;-", "←"),
            ("=&gt;", "⇒"),
            ("&lt;=", "⇐"),
            ("->", "→"),
            ("<-", "←"),
            ("=>", "⇒"),
            ("<=", "⇐"),
        ];
        let quotes = [
            ("&nbsp;", " "),
            ("\u{a0}", " "),
            ("“", "\""),
            ("”", "\""),
            ("„", "\""),
            ("‟", "\""),
        ];
        Self {
            arrows: arrows
                .iter()
                .map(|(from, to)| Replacement::new(from, to))
                .collect(),
            quotes: quotes
                .iter()
                .map(|(from, to)| Replacement::new(from, to))
                .collect(),
        }
    }
}

impl SymbolTable {
    /// Applies the table to `text`.
    ///
    /// With `tags_only` set, only the arrow group is applied and only entries that cannot collide
    /// with tag syntax, so the result is still safe to hand to a markup parser.
    pub fn replace(&self, text: &str, mode: SymbolMode, tags_only: bool) -> String {
        map_outside_math(text, |segment| {
            let out = self.glyphs(segment, tags_only);
            match mode {
                SymbolMode::Html => scripts_to_markup(&out),
                SymbolMode::Plain => markup_to_scripts(&out).into_owned(),
            }
        })
    }

    /// Arrow and quote substitution only; script characters are left as they are.
    pub fn replace_glyphs(&self, text: &str, tags_only: bool) -> String {
        map_outside_math(text, |segment| self.glyphs(segment, tags_only))
    }

    fn glyphs(&self, segment: &str, tags_only: bool) -> String {
        let mut out = segment.to_string();
        let quotes: &[Replacement] = if tags_only { &[] } else { &self.quotes };
        for r in self.arrows.iter().chain(quotes) {
            if tags_only && r.touches_markup() {
                continue;
            }
            if out.contains(r.from.as_str()) {
                out = out.replace(r.from.as_str(), &r.to);
            }
        }
        out
    }
}

fn default_table() -> &'static SymbolTable {
    static TABLE: OnceLock<SymbolTable> = OnceLock::new();
    TABLE.get_or_init(SymbolTable::default)
}

/// [`SymbolTable::replace`] with the built-in table.
pub fn replace_symbols(text: &str, mode: SymbolMode, tags_only: bool) -> String {
    default_table().replace(text, mode, tags_only)
}

/// Drops byte-order marks and soft hyphens.
pub fn fix_encoding(text: &str) -> Cow<'_, str> {
    if !text.contains(['\u{feff}', '\u{ad}']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace(['\u{feff}', '\u{ad}'], ""))
}

/// Lossy decode: invalid UTF-8 sequences are discarded, not replaced.
pub fn fix_encoding_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    fix_encoding(&out).into_owned()
}

/// Removes whitespace runs that touch a `>` or `<`, leaving surrounding text alone.
pub fn strip_whitespace_between_tags(text: &str) -> String {
    static AFTER: OnceLock<Regex> = OnceLock::new();
    static BEFORE: OnceLock<Regex> = OnceLock::new();
    let after = AFTER.get_or_init(|| Regex::new(r">\s+").expect("valid regex"));
    let before = BEFORE.get_or_init(|| Regex::new(r"\s+<").expect("valid regex"));
    let text = after.replace_all(text, ">");
    before.replace_all(&text, "<").into_owned()
}

fn math_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\\\[.*?\\\]|\\\(.*?\\\)").expect("valid regex"))
}

/// Rewrites every part of `text` that is not a MathJax segment.
pub(crate) fn map_outside_math(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in math_regex().find_iter(text) {
        out.push_str(&f(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&f(&text[last..]));
    out
}

/// Splits `text` into MathJax and non-MathJax parts, in order. `true` marks math.
pub(crate) fn split_math(text: &str) -> Vec<(bool, &str)> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in math_regex().find_iter(text) {
        if m.start() > last {
            parts.push((false, &text[last..m.start()]));
        }
        parts.push((true, m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        parts.push((false, &text[last..]));
    }
    parts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Sub,
    Sup,
}

impl Script {
    pub fn tag(self) -> &'static str {
        match self {
            Script::Sub => "sub",
            Script::Sup => "sup",
        }
    }
}

const SUPERSCRIPTS: &[(char, char)] = &[
    ('⁰', '0'),
    ('¹', '1'),
    ('²', '2'),
    ('³', '3'),
    ('⁴', '4'),
    ('⁵', '5'),
    ('⁶', '6'),
    ('⁷', '7'),
    ('⁸', '8'),
    ('⁹', '9'),
    ('⁺', '+'),
    ('⁻', '-'),
    ('⁼', '='),
    ('⁽', '('),
    ('⁾', ')'),
    ('ⁱ', 'i'),
    ('ⁿ', 'n'),
];

const SUBSCRIPTS: &[(char, char)] = &[
    ('₀', '0'),
    ('₁', '1'),
    ('₂', '2'),
    ('₃', '3'),
    ('₄', '4'),
    ('₅', '5'),
    ('₆', '6'),
    ('₇', '7'),
    ('₈', '8'),
    ('₉', '9'),
    ('₊', '+'),
    ('₋', '-'),
    ('₌', '='),
    ('₍', '('),
    ('₎', ')'),
    ('ₐ', 'a'),
    ('ₑ', 'e'),
    ('ₒ', 'o'),
    ('ₓ', 'x'),
    ('ₕ', 'h'),
    ('ₖ', 'k'),
    ('ₗ', 'l'),
    ('ₘ', 'm'),
    ('ₙ', 'n'),
    ('ₚ', 'p'),
    ('ₛ', 's'),
    ('ₜ', 't'),
    ('ᵢ', 'i'),
    ('ⱼ', 'j'),
    ('ᵣ', 'r'),
    ('ᵤ', 'u'),
    ('ᵥ', 'v'),
];

fn script_of(c: char) -> Option<(Script, char)> {
    if let Some((_, ascii)) = SUPERSCRIPTS.iter().find(|(s, _)| *s == c) {
        return Some((Script::Sup, *ascii));
    }
    SUBSCRIPTS
        .iter()
        .find(|(s, _)| *s == c)
        .map(|(_, ascii)| (Script::Sub, *ascii))
}

fn to_script(script: Script, c: char) -> Option<char> {
    // En dash is how word processors tend to type a charge sign.
    let c = if c == '–' { '-' } else { c };
    let table = match script {
        Script::Sub => SUBSCRIPTS,
        Script::Sup => SUPERSCRIPTS,
    };
    table.iter().find(|(_, a)| *a == c).map(|(s, _)| *s)
}

/// A run of text that is either ordinary or a sub/superscript (already mapped to ASCII).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRun {
    Text(String),
    Script(Script, String),
}

/// Splits `text` into ordinary runs and maximal sub/superscript runs.
pub fn split_scripts(text: &str) -> Vec<ScriptRun> {
    let mut runs: Vec<ScriptRun> = Vec::new();
    for c in text.chars() {
        match (script_of(c), runs.last_mut()) {
            (Some((script, ascii)), Some(ScriptRun::Script(last, buf))) if *last == script => {
                buf.push(ascii);
            }
            (Some((script, ascii)), _) => runs.push(ScriptRun::Script(script, ascii.to_string())),
            (None, Some(ScriptRun::Text(buf))) => buf.push(c),
            (None, _) => runs.push(ScriptRun::Text(c.to_string())),
        }
    }
    runs
}

fn scripts_to_markup(text: &str) -> String {
    if !text.chars().any(|c| script_of(c).is_some()) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 16);
    for run in split_scripts(text) {
        match run {
            ScriptRun::Text(t) => out.push_str(&t),
            ScriptRun::Script(script, t) => {
                out.push('<');
                out.push_str(script.tag());
                out.push('>');
                out.push_str(&t);
                out.push_str("</");
                out.push_str(script.tag());
                out.push('>');
            }
        }
    }
    out
}

fn markup_to_scripts(text: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"<(sub|sup)>([^<]*)</(sub|sup)>").expect("valid regex")
    });
    re.replace_all(text, |caps: &regex::Captures<'_>| {
        let whole = caps[0].to_string();
        if caps[1] != caps[3] {
            return whole;
        }
        let script = if &caps[1] == "sub" {
            Script::Sub
        } else {
            Script::Sup
        };
        let inner = &caps[2];
        if inner.is_empty() {
            return whole;
        }
        inner
            .chars()
            .map(|c| to_script(script, c))
            .collect::<Option<String>>()
            .unwrap_or(whole)
    })
}
