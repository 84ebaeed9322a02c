//! Tree rewrite passes run between parsing and formatting.
//!
//! Order matters: symbol substitution can introduce `sub`/`sup` elements that the nesting and
//! merge passes must see, and empty-element removal must run before adjacent tags are merged.

use super::policy::{HtmlPolicy, TagKind};
use super::tree::{Element, MarkupNode, ParsePolicy, TagTreatment, is_element_name};
use crate::symbols::{ScriptRun, SymbolTable, split_math, split_scripts};

impl ParsePolicy for HtmlPolicy {
    fn treatment(&self, name: &str) -> TagTreatment {
        match self.rule(self.canonical_name(name)) {
            Some(rule) if rule.kind.is_void() => TagTreatment::Void,
            Some(_) => TagTreatment::Keep,
            None if self.drop_with_content.iter().any(|t| t == name) => TagTreatment::Drop,
            None if is_element_name(name) => TagTreatment::Unwrap,
            None => TagTreatment::Text,
        }
    }
}

pub fn sanitize(nodes: Vec<MarkupNode>, policy: &HtmlPolicy, symbols: &SymbolTable) -> Vec<MarkupNode> {
    let nodes = normalize(nodes, policy, symbols);
    let nodes = flatten_nesting(nodes, policy, &mut Vec::new());
    let nodes = concat_text(nodes);
    let nodes = trim_line_ends(nodes, policy);
    let nodes = drop_empty(nodes, policy);
    let nodes = merge_siblings(nodes, policy);
    concat_text(nodes)
}

/// Canonical names, filtered attributes, substituted symbols; comments go.
fn normalize(nodes: Vec<MarkupNode>, policy: &HtmlPolicy, symbols: &SymbolTable) -> Vec<MarkupNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MarkupNode::Comment(_) => {}
            MarkupNode::Text(text) => out.extend(normalize_text(&text, symbols)),
            MarkupNode::Element(el) => {
                let name = policy.canonical_name(&el.name).to_string();
                let Some(rule) = policy.rule(&name) else {
                    // Only reachable for trees not built with this policy.
                    out.extend(normalize(el.children, policy, symbols));
                    continue;
                };
                let attrs = rule.filter_attrs(&el.attrs);
                let children = if rule.kind.is_void() {
                    Vec::new()
                } else {
                    normalize(el.children, policy, symbols)
                };
                out.push(MarkupNode::Element(Element {
                    name,
                    attrs,
                    children,
                }));
            }
        }
    }
    out
}

fn normalize_text(text: &str, symbols: &SymbolTable) -> Vec<MarkupNode> {
    let text = symbols.replace_glyphs(text, false);
    let mut out = Vec::new();
    for (math, part) in split_math(&text) {
        if math {
            out.push(MarkupNode::Text(part.to_string()));
            continue;
        }
        for run in split_scripts(part) {
            match run {
                ScriptRun::Text(t) => out.push(MarkupNode::Text(t)),
                ScriptRun::Script(script, t) => out.push(MarkupNode::Element(
                    Element::with_children(script.tag(), vec![MarkupNode::Text(t)]),
                )),
            }
        }
    }
    out
}

/// Unwraps formatting tags nested inside a tag of the same name.
fn flatten_nesting(
    nodes: Vec<MarkupNode>,
    policy: &HtmlPolicy,
    open: &mut Vec<String>,
) -> Vec<MarkupNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let MarkupNode::Element(mut el) = node else {
            out.push(node);
            continue;
        };
        let merge = policy.rule(&el.name).is_some_and(|r| r.merge);
        let nested = merge && open.contains(&el.name);
        if merge && !nested {
            open.push(el.name.clone());
        }
        let children = flatten_nesting(std::mem::take(&mut el.children), policy, open);
        if merge && !nested {
            open.pop();
        }
        if nested {
            out.extend(children);
        } else {
            el.children = children;
            out.push(MarkupNode::Element(el));
        }
    }
    out
}

fn concat_text(nodes: Vec<MarkupNode>) -> Vec<MarkupNode> {
    let mut out: Vec<MarkupNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MarkupNode::Text(t) => {
                if t.is_empty() {
                    continue;
                }
                if let Some(MarkupNode::Text(prev)) = out.last_mut() {
                    prev.push_str(&t);
                } else {
                    out.push(MarkupNode::Text(t));
                }
            }
            MarkupNode::Element(mut el) => {
                el.children = concat_text(std::mem::take(&mut el.children));
                out.push(MarkupNode::Element(el));
            }
            MarkupNode::Comment(_) => out.push(node),
        }
    }
    out
}

/// Line breaks and whitespace at the end of a line tag carry no meaning.
fn trim_line_ends(nodes: Vec<MarkupNode>, policy: &HtmlPolicy) -> Vec<MarkupNode> {
    nodes
        .into_iter()
        .map(|node| match node {
            MarkupNode::Element(mut el) => {
                let mut children = trim_line_ends(std::mem::take(&mut el.children), policy);
                if policy.kind(&el.name) == TagKind::Line {
                    while children.last().is_some_and(|last| {
                        last.is_blank_text()
                            || matches!(last, MarkupNode::Element(e) if policy.kind(&e.name) == TagKind::Break)
                    }) {
                        children.pop();
                    }
                }
                el.children = children;
                MarkupNode::Element(el)
            }
            other => other,
        })
        .collect()
}

/// Removes elements without content. A removed element that held whitespace leaves a single
/// space behind so neighbouring words stay apart.
fn drop_empty(nodes: Vec<MarkupNode>, policy: &HtmlPolicy) -> Vec<MarkupNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let MarkupNode::Element(mut el) = node else {
            out.push(node);
            continue;
        };
        let rule = policy.rule(&el.name);
        if rule.is_some_and(|r| r.kind.is_void()) {
            out.push(MarkupNode::Element(el));
            continue;
        }
        el.children = drop_empty(std::mem::take(&mut el.children), policy);
        let keep = rule.is_some_and(|r| r.keep_empty);
        if !keep && el.children.iter().all(MarkupNode::is_blank_text) {
            if !el.children.is_empty() {
                out.push(MarkupNode::Text(" ".to_string()));
            }
            continue;
        }
        out.push(MarkupNode::Element(el));
    }
    out
}

/// Merges runs of identical formatting siblings separated by nothing or by whitespace only.
fn merge_siblings(nodes: Vec<MarkupNode>, policy: &HtmlPolicy) -> Vec<MarkupNode> {
    let mut out: Vec<MarkupNode> = Vec::with_capacity(nodes.len());
    // Whitespace seen since the last node pushed to `out`.
    let mut gap: Option<String> = None;

    for node in nodes {
        match node {
            MarkupNode::Text(t) if t.trim().is_empty() => match gap.as_mut() {
                Some(prev) => prev.push_str(&t),
                None => gap = Some(t),
            },
            MarkupNode::Element(el) => {
                let mergeable = policy.rule(&el.name).is_some_and(|r| r.merge);
                if let Some(MarkupNode::Element(prev)) = out.last_mut() {
                    if mergeable && prev.name == el.name && prev.attrs == el.attrs {
                        if gap.take().is_some() {
                            prev.children.push(MarkupNode::Text(" ".to_string()));
                        }
                        prev.children.extend(el.children);
                        continue;
                    }
                }
                out.extend(gap.take().map(MarkupNode::Text));
                out.push(MarkupNode::Element(el));
            }
            other => {
                out.extend(gap.take().map(MarkupNode::Text));
                out.push(other);
            }
        }
    }
    out.extend(gap.map(MarkupNode::Text));

    out.into_iter()
        .map(|node| match node {
            MarkupNode::Element(mut el) => {
                el.children = merge_siblings(std::mem::take(&mut el.children), policy);
                MarkupNode::Element(el)
            }
            other => other,
        })
        .collect()
}
