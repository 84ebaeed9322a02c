//! HTML fragment tree builder on top of the `html5ever` tokenizer.
//!
//! The tokenizer decodes entities; text is re-escaped only where a character would otherwise be
//! read back as markup, so a formatted tree parses to the same text again. Attribute values are
//! kept decoded and escaped by [`push_attr`] on output.

use crate::error::{Error, Result};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<MarkupNode>) -> Self {
        Self {
            children,
            ..Self::new(name)
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whitespace-separated `class` tokens.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

impl MarkupNode {
    pub fn is_blank_text(&self) -> bool {
        matches!(self, MarkupNode::Text(t) if t.trim().is_empty())
    }
}

pub fn collect_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(t) => out.push_str(t),
            MarkupNode::Element(el) => collect_text(&el.children, out),
            MarkupNode::Comment(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Start {
        name: String,
        attrs: IndexMap<String, String>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    /// Already escaped for output.
    Text(String),
    Comment(String),
}

/// Content of these elements is tokenized as raw text.
const RAW_TEXT: &[&str] = &["script", "style"];

/// Token sink that records events with their line numbers.
#[derive(Default)]
struct Collector {
    events: RefCell<Vec<(Event, u64)>>,
    text: RefCell<String>,
    text_line: Cell<u64>,
    raw: Cell<bool>,
    truncated: Cell<bool>,
}

struct Tokens {
    events: Vec<(Event, u64)>,
    truncated: bool,
}

impl Collector {
    fn run(src: &str) -> Tokens {
        let tokenizer = Tokenizer::new(Collector::default(), TokenizerOpts::default());
        let input = BufferQueue::default();
        input.push_back(StrTendril::from_slice(src));
        let _ = tokenizer.feed(&input);
        tokenizer.end();
        tokenizer.sink.flush_text();
        Tokens {
            events: tokenizer.sink.events.take(),
            truncated: tokenizer.sink.truncated.get(),
        }
    }

    fn push(&self, event: Event, line: u64) {
        self.flush_text();
        self.events.borrow_mut().push((event, line));
    }

    fn flush_text(&self) {
        let text = self.text.take();
        if text.is_empty() {
            return;
        }
        let text = if self.raw.get() {
            text
        } else {
            escape_stray_markup(&text)
        };
        self.events
            .borrow_mut()
            .push((Event::Text(text), self.text_line.get()));
    }
}

impl TokenSink for Collector {
    type Handle = ();

    fn process_token(&self, token: Token, line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(chars) => {
                let mut text = self.text.borrow_mut();
                if text.is_empty() {
                    self.text_line.set(line_number);
                }
                text.push_str(&chars);
            }
            Token::TagToken(tag) => {
                let name = tag.name.to_string();
                match tag.kind {
                    TagKind::StartTag => {
                        let mut attrs = IndexMap::new();
                        for attr in &tag.attrs {
                            attrs
                                .entry(attr.name.local.to_string())
                                .or_insert_with(|| attr.value.to_string());
                        }
                        let raw = !tag.self_closing && RAW_TEXT.contains(&name.as_str());
                        let kind = if name == "script" {
                            RawKind::ScriptData
                        } else {
                            RawKind::Rawtext
                        };
                        self.push(
                            Event::Start {
                                name,
                                attrs,
                                self_closing: tag.self_closing,
                            },
                            line_number,
                        );
                        if raw {
                            self.raw.set(true);
                            return TokenSinkResult::RawData(kind);
                        }
                    }
                    TagKind::EndTag => {
                        self.push(Event::End { name }, line_number);
                        self.raw.set(false);
                    }
                }
            }
            Token::CommentToken(comment) => self.push(Event::Comment(comment.to_string()), line_number),
            // Raised when the input ends inside a tag, comment or declaration.
            Token::ParseError(message)
                if message.starts_with("Unexpected EOF") || message.starts_with("Saw EOF") =>
            {
                self.truncated.set(true)
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

/// Tokenizes `src`. A tag or comment left open at the end of the input is kept as text.
fn tokenize(src: &str) -> Vec<(Event, u64)> {
    let run = Collector::run(src);
    if !run.truncated {
        return run.events;
    }
    for (start, _) in src.match_indices('<').rev() {
        let head = Collector::run(&src[..start]);
        if head.truncated {
            continue;
        }
        let mut events = head.events;
        let line = events.last().map_or(1, |(_, line)| *line);
        let tail = htmlize::unescape(&src[start..]);
        events.push((Event::Text(escape_stray_markup(&tail)), line));
        return events;
    }
    run.events
}

/// Escapes `&` and `<` where they would start a character reference or a tag.
fn escape_stray_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let next = chars.peek().copied();
        match ch {
            '&' if next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '#') => {
                out.push_str("&amp;")
            }
            '<' if next.is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')) => {
                out.push_str("&lt;")
            }
            _ => out.push(ch),
        }
    }
    out
}

/// `<name attr="value">` as it would appear in text.
fn literal_tag(name: &str, attrs: &IndexMap<String, String>, self_closing: bool) -> String {
    let mut out = format!("<{name}");
    for (attr, value) in attrs {
        out.push(' ');
        out.push_str(attr);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

const HTML_ELEMENTS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo", "big",
    "blockquote", "body", "br", "button", "canvas", "caption", "center", "cite", "code", "col",
    "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt",
    "em", "embed", "fieldset", "figcaption", "figure", "font", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input",
    "ins", "kbd", "label", "legend", "li", "link", "main", "map", "mark", "math", "menu", "meta",
    "meter", "nav", "noscript", "object", "ol", "optgroup", "option", "output", "p", "param",
    "picture", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "search",
    "section", "select", "slot", "small", "source", "span", "strike", "strong", "style", "sub",
    "summary", "sup", "svg", "table", "tbody", "td", "template", "textarea", "tfoot", "th",
    "thead", "time", "title", "tr", "track", "tt", "u", "ul", "var", "video", "wbr",
];

/// Standard HTML element names, custom elements (`anki-mathjax`) and namespaced tags (`o:p`).
/// Anything else after a `<` is text that happens to look like a tag.
pub fn is_element_name(name: &str) -> bool {
    HTML_ELEMENTS.contains(&name) || name.contains(['-', ':'])
}

/// What the tree builder does with a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTreatment {
    /// Ordinary element; start and end tags must balance.
    Keep,
    /// No content and no end tag.
    Void,
    /// Tags are dropped, content is spliced into the parent.
    Unwrap,
    /// Tags and content are dropped.
    Drop,
    /// Not markup: the tag is kept as literal text.
    Text,
}

pub trait ParsePolicy {
    fn treatment(&self, name: &str) -> TagTreatment;
}

/// Keeps every element, using the HTML void-element set.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericHtml;

const HTML_VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl ParsePolicy for GenericHtml {
    fn treatment(&self, name: &str) -> TagTreatment {
        if HTML_VOID.contains(&name) {
            TagTreatment::Void
        } else if is_element_name(name) {
            TagTreatment::Keep
        } else {
            TagTreatment::Text
        }
    }
}

/// Unwraps every element and drops raw-text content.
struct TextOnly;

impl ParsePolicy for TextOnly {
    fn treatment(&self, name: &str) -> TagTreatment {
        if RAW_TEXT.contains(&name) {
            TagTreatment::Drop
        } else if is_element_name(name) {
            TagTreatment::Unwrap
        } else {
            TagTreatment::Text
        }
    }
}

/// Parses a fragment into a node list.
///
/// Unbalanced kept tags and self-closing syntax on kept non-void tags are errors.
pub fn parse_fragment(src: &str, policy: &dyn ParsePolicy) -> Result<Vec<MarkupNode>> {
    let mut root: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<(Element, u64)> = Vec::new();
    // Open dropped element name and nesting depth.
    let mut dropping: Option<(String, usize)> = None;

    fn push(stack: &mut [(Element, u64)], root: &mut Vec<MarkupNode>, node: MarkupNode) {
        let siblings = match stack.last_mut() {
            Some((parent, _)) => &mut parent.children,
            None => root,
        };
        if let (MarkupNode::Text(text), Some(MarkupNode::Text(prev))) = (&node, siblings.last_mut()) {
            prev.push_str(text);
            return;
        }
        siblings.push(node);
    }

    for (event, line) in tokenize(src) {
        if let Some((name, depth)) = dropping.as_mut() {
            match &event {
                Event::Start {
                    name: n,
                    self_closing: false,
                    ..
                } if n.as_str() == name.as_str() => *depth += 1,
                Event::End { name: n } if n.as_str() == name.as_str() => {
                    if *depth == 0 {
                        dropping = None;
                    } else {
                        *depth -= 1;
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Text(t) => push(&mut stack, &mut root, MarkupNode::Text(t)),
            Event::Comment(c) => push(&mut stack, &mut root, MarkupNode::Comment(c)),
            Event::Start {
                name,
                attrs,
                self_closing,
            } => match policy.treatment(&name) {
                TagTreatment::Unwrap => {}
                TagTreatment::Text => {
                    let text = escape_stray_markup(&literal_tag(&name, &attrs, self_closing));
                    push(&mut stack, &mut root, MarkupNode::Text(text));
                }
                TagTreatment::Drop => {
                    if !self_closing {
                        dropping = Some((name, 0));
                    }
                }
                TagTreatment::Void => {
                    let el = Element {
                        attrs,
                        ..Element::new(name)
                    };
                    push(&mut stack, &mut root, MarkupNode::Element(el));
                }
                TagTreatment::Keep => {
                    if self_closing {
                        return Err(Error::malformed_html(
                            line,
                            format!("<{name}/> is not a void element"),
                        ));
                    }
                    let el = Element {
                        attrs,
                        ..Element::new(name)
                    };
                    stack.push((el, line));
                }
            },
            Event::End { name } => match policy.treatment(&name) {
                TagTreatment::Unwrap | TagTreatment::Void | TagTreatment::Drop => {}
                TagTreatment::Text => {
                    let text = escape_stray_markup(&format!("</{name}>"));
                    push(&mut stack, &mut root, MarkupNode::Text(text));
                }
                TagTreatment::Keep => match stack.pop() {
                    Some((el, _)) if el.name == name => {
                        push(&mut stack, &mut root, MarkupNode::Element(el));
                    }
                    Some((el, _)) => {
                        return Err(Error::malformed_html(
                            line,
                            format!("</{name}> closes <{}>", el.name),
                        ));
                    }
                    None => {
                        return Err(Error::malformed_html(line, format!("unexpected </{name}>")));
                    }
                },
            },
        }
    }

    if let Some((el, line)) = stack.pop() {
        return Err(Error::malformed_html(line, format!("<{}> is never closed", el.name)));
    }
    Ok(root)
}

/// Text content of a fragment with all markup removed. Entities stay escaped.
pub fn strip_markup(src: &str) -> String {
    let mut out = String::new();
    // Unwrapping never checks balance, so parsing cannot fail.
    if let Ok(nodes) = parse_fragment(src, &TextOnly) {
        collect_text(&nodes, &mut out);
    }
    out
}

/// Double-quoted attribute value.
pub(crate) fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    out.push('"');
}

/// Minimal text escaping for values that did not come from markup.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(src: &str) -> Vec<MarkupNode> {
        parse_fragment(src, &GenericHtml).unwrap()
    }

    fn text(t: &str) -> MarkupNode {
        MarkupNode::Text(t.to_string())
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        assert_eq!(generic("a <=> b < c"), vec![text("a <=> b < c")]);
        assert_eq!(generic("1<2 & 3>2"), vec![text("1<2 & 3>2")]);
    }

    #[test]
    fn tag_like_text_is_kept_escaped() {
        assert_eq!(generic("x<y and y>z"), vec![text("x&lt;y and y>z")]);
        assert_eq!(generic("a</y>b"), vec![text("a&lt;/y>b")]);
        assert_eq!(strip_markup("x<y and y>z"), "x&lt;y and y>z");
    }

    #[test]
    fn unterminated_markup_at_the_end_is_text() {
        assert_eq!(generic("if a<b then"), vec![text("if a&lt;b then")]);
        assert_eq!(
            generic("<b>x</b> foo <b class=\"y"),
            vec![
                MarkupNode::Element(Element::with_children("b", vec![text("x")])),
                text(" foo &lt;b class=\"y"),
            ]
        );
        assert_eq!(generic("<!-- x"), vec![text("&lt;!-- x")]);
    }

    #[test]
    fn entities_are_decoded_and_ambiguous_characters_re_escaped() {
        assert_eq!(generic("a &amp; b &amp;c &lt;i&gt;"), vec![text("a & b &amp;c &lt;i>")]);
        assert_eq!(generic("x&nbsp;y"), vec![text("x\u{a0}y")]);
    }

    #[test]
    fn attributes_are_decoded() {
        let nodes = generic(r#"<IMG src='a"b' alt=x data-x="&amp;" hidden/>"#);
        let [MarkupNode::Element(img)] = nodes.as_slice() else {
            panic!("expected one element, got {nodes:?}");
        };
        assert_eq!(img.name, "img");
        assert_eq!(img.attr("src"), Some("a\"b"));
        assert_eq!(img.attr("alt"), Some("x"));
        assert_eq!(img.attr("data-x"), Some("&"));
        assert_eq!(img.attr("hidden"), Some(""));

        let mut out = String::new();
        push_attr(&mut out, "src", "a\"b&c");
        assert_eq!(out, " src=\"a&quot;b&amp;c\"");
    }

    #[test]
    fn script_content_is_raw_text() {
        let nodes = generic("<script>if (a<b) {}</script>x");
        assert_eq!(
            nodes,
            vec![
                MarkupNode::Element(Element::with_children("script", vec![text("if (a<b) {}")])),
                text("x"),
            ]
        );
        assert_eq!(strip_markup("foo<script>if (a<b) {}</script> bar"), "foo bar");
    }

    #[test]
    fn generic_parse_builds_nested_tree() {
        let nodes = generic("<div class=\"a b\">x<br>y<!-- c --></div>");
        let [MarkupNode::Element(div)] = nodes.as_slice() else {
            panic!("expected one element, got {nodes:?}");
        };
        assert_eq!(div.classes(), vec!["a", "b"]);
        assert_eq!(div.children.len(), 4);
        assert_eq!(div.text_content(), "xy");
    }

    #[test]
    fn custom_and_namespaced_tags_are_elements() {
        assert!(is_element_name("anki-mathjax"));
        assert!(is_element_name("o:p"));
        assert!(!is_element_name("y"));
    }

    #[test]
    fn unbalanced_tags_are_errors() {
        for src in ["<b>foo", "foo</b>", "<b><i>x</b></i>", "<b/>"] {
            assert!(
                matches!(parse_fragment(src, &GenericHtml), Err(Error::MalformedHtml { .. })),
                "{src}"
            );
        }
        let err = parse_fragment("<ul>\n<li>x\n</ul>", &GenericHtml).unwrap_err();
        assert!(matches!(err, Error::MalformedHtml { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn strip_markup_keeps_text_only() {
        assert_eq!(
            strip_markup("<b>foo</b> bar<style>p {}</style><!-- c -->"),
            "foo bar"
        );
    }

    #[test]
    fn escape_text_escapes_markup_characters() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
    }
}
