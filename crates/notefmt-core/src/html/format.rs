//! Streaming line formatter for sanitized trees.
//!
//! Each node visit appends [`Piece`]s to the current line; whitespace is carried as explicit
//! [`Piece::Space`] tokens so join rules can drop or keep it at tag boundaries without
//! inspecting rendered text.

use super::policy::{HtmlPolicy, TagKind};
use super::tree::{Element, MarkupNode, push_attr};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Space,
    Word(String),
    Open { markup: String, tight: bool },
    Close(String),
    Break(String),
    Void(String),
}

/// Lines written so far, the open line, and the indent level.
pub(crate) struct LineBuffer<'p> {
    policy: &'p HtmlPolicy,
    lines: Vec<String>,
    current: Vec<Piece>,
    indent: usize,
    /// Number of enclosing line tags (`li`, `td`, ...).
    in_line: usize,
}

impl<'p> LineBuffer<'p> {
    pub(crate) fn new(policy: &'p HtmlPolicy) -> Self {
        Self {
            policy,
            lines: Vec::new(),
            current: Vec::new(),
            indent: 0,
            in_line: 0,
        }
    }

    pub(crate) fn write_nodes(&mut self, nodes: &[MarkupNode]) {
        for node in nodes {
            match node {
                MarkupNode::Text(text) => self.write_text(text),
                MarkupNode::Element(el) => self.write_element(el),
                MarkupNode::Comment(_) => {}
            }
        }
    }

    fn write_text(&mut self, text: &str) {
        let mut word = String::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !word.is_empty() {
                    self.current.push(Piece::Word(std::mem::take(&mut word)));
                }
                if self.current.last() != Some(&Piece::Space) {
                    self.current.push(Piece::Space);
                }
            } else {
                word.push(ch);
            }
        }
        if !word.is_empty() {
            self.current.push(Piece::Word(word));
        }
    }

    fn write_element(&mut self, el: &Element) {
        let rule = self.policy.rule(&el.name);
        let kind = rule.map(|r| r.kind).unwrap_or_default();
        let open = self.open_tag(el);
        match kind {
            TagKind::Block => {
                self.flush();
                self.push_line(open);
                self.indent += 1;
                self.write_nodes(&el.children);
                self.flush();
                debug_assert!(self.indent > 0, "closing a block that was never opened");
                self.indent -= 1;
                let close = self.close_tag(el);
                self.push_line(close);
            }
            TagKind::Line => {
                self.flush();
                self.in_line += 1;
                self.current.push(Piece::Open {
                    markup: open,
                    tight: false,
                });
                self.write_nodes(&el.children);
                self.current.push(Piece::Close(self.close_tag(el)));
                self.in_line -= 1;
                self.flush();
            }
            TagKind::Inline => {
                self.current.push(Piece::Open {
                    markup: open,
                    tight: rule.is_some_and(|r| r.tight),
                });
                self.write_nodes(&el.children);
                self.current.push(Piece::Close(self.close_tag(el)));
            }
            TagKind::Break => {
                self.current.push(Piece::Break(open));
                if self.in_line == 0 {
                    self.flush();
                }
            }
            TagKind::Void => {
                if self.in_line == 0 {
                    self.flush();
                }
                self.current.push(Piece::Void(open));
            }
        }
    }

    fn open_tag(&self, el: &Element) -> String {
        let mut out = String::from("<");
        out.push_str(self.policy.output_name(&el.name));
        for (name, value) in &el.attrs {
            push_attr(&mut out, name, value);
        }
        out.push('>');
        out
    }

    fn close_tag(&self, el: &Element) -> String {
        format!("</{}>", self.policy.output_name(&el.name))
    }

    fn push_line(&mut self, text: String) {
        let indent = " ".repeat(self.policy.indent * self.indent);
        self.lines.push(indent + &text);
    }

    fn flush(&mut self) {
        let pieces = std::mem::take(&mut self.current);
        let line = render_line(pieces, self.policy);
        if !line.is_empty() {
            self.push_line(line);
        }
    }

    pub(crate) fn finish(mut self, minimized: bool) -> String {
        self.flush();
        debug_assert_eq!(self.indent, 0);
        let out = if minimized {
            self.lines
                .iter()
                .map(|line| line.trim_start())
                .collect::<String>()
        } else {
            self.lines.join("\n")
        };
        out.trim_end().to_string()
    }
}

/// Moves spaces out of inline tags: `<b>foo </b>` renders like `<b>foo</b> `.
fn hoist_spaces(pieces: &mut [Piece]) {
    let mut changed = true;
    while changed {
        changed = false;
        for i in 1..pieces.len() {
            let swap = matches!(
                (&pieces[i - 1], &pieces[i]),
                (Piece::Space, Piece::Close(_)) | (Piece::Open { .. }, Piece::Space)
            );
            if swap {
                pieces.swap(i - 1, i);
                changed = true;
            }
        }
    }
}

fn render_line(mut pieces: Vec<Piece>, policy: &HtmlPolicy) -> String {
    hoist_spaces(&mut pieces);

    let mut kept: Vec<&Piece> = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.iter().enumerate() {
        if *piece == Piece::Space && !keep_space(kept.last().copied(), &pieces[i + 1..], policy) {
            continue;
        }
        kept.push(piece);
    }

    let mut out = String::new();
    for piece in kept {
        match piece {
            Piece::Space => out.push(' '),
            Piece::Word(s) | Piece::Close(s) | Piece::Break(s) | Piece::Void(s) => out.push_str(s),
            Piece::Open { markup, .. } => out.push_str(markup),
        }
    }
    out
}

fn keep_space(prev: Option<&Piece>, rest: &[Piece], policy: &HtmlPolicy) -> bool {
    let next = rest.iter().find(|p| **p != Piece::Space);
    let (Some(prev), Some(next)) = (prev, next) else {
        // Line edges.
        return false;
    };
    match prev {
        Piece::Space | Piece::Break(_) | Piece::Open { .. } => return false,
        Piece::Word(w) if matches!(next, Piece::Open { .. }) => {
            if policy.no_space_after.iter().any(|s| w.ends_with(s.as_str())) {
                return false;
            }
        }
        Piece::Close(_) => {
            if let Piece::Word(w) = next {
                if policy.no_space_before.iter().any(|s| w.starts_with(s.as_str())) {
                    return false;
                }
            }
        }
        _ => {}
    }
    match next {
        Piece::Break(_) | Piece::Close(_) => false,
        Piece::Open { tight, .. } => !tight,
        _ => true,
    }
}
