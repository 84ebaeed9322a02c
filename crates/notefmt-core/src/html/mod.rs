//! Constrained HTML canonicalizer.
//!
//! `parse -> sanitize -> format`: the fragment is parsed with the allow-list deciding which
//! tags are structural, rewritten by [`sanitize::sanitize`], then re-serialized line by line.

pub mod format;
pub mod policy;
pub mod sanitize;
pub mod tree;

pub use policy::{AttrRule, EmphasisStyle, HtmlPolicy, TagKind, TagRule};
pub use tree::{Element, GenericHtml, MarkupNode, ParsePolicy, TagTreatment, parse_fragment, strip_markup};

use crate::Formatted;
use crate::error::Result;
use crate::symbols::{SymbolTable, fix_encoding};

/// Canonicalizes `markup` with the built-in allow-list and symbol table.
pub fn format_html(markup: &str, minimized: bool) -> Result<Formatted> {
    format_html_with(markup, &HtmlPolicy::default(), &SymbolTable::default(), minimized)
}

pub fn format_html_with(
    markup: &str,
    policy: &HtmlPolicy,
    symbols: &SymbolTable,
    minimized: bool,
) -> Result<Formatted> {
    let fixed = fix_encoding(markup);
    let nodes = parse_fragment(&fixed, policy)?;
    let nodes = sanitize::sanitize(nodes, policy, symbols);

    let mut buf = format::LineBuffer::new(policy);
    buf.write_nodes(&nodes);
    let value = buf.finish(minimized);
    Ok(Formatted::compare(markup, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Formats with `b`/`i` output names and checks idempotence.
    fn check(input: &str, expected: &str) {
        check_with(&HtmlPolicy::presentational(), input, expected, false);
    }

    fn check_with(policy: &HtmlPolicy, input: &str, expected: &str, minimized: bool) {
        let symbols = SymbolTable::default();
        let first = format_html_with(input, policy, &symbols, minimized).unwrap();
        assert_eq!(first.value, expected, "input: {input:?}");
        assert_eq!(first.changed, input != expected, "input: {input:?}");
        let second = format_html_with(&first.value, policy, &symbols, minimized).unwrap();
        assert_eq!(second.value, expected, "second pass of {input:?}");
        assert!(!second.changed, "second pass of {input:?}");
    }

    #[test]
    fn semantic_emphasis_is_the_default() {
        let out = format_html("<b>foo</b> bar", false).unwrap();
        assert_eq!(out.value, "<strong>foo</strong> bar");
        assert!(out.changed);
        let out = format_html("<em>x</em> and <i>y</i>", false).unwrap();
        assert_eq!(out.value, "<em>x</em> and <em>y</em>");
    }

    #[test]
    fn line_breaks_and_blocks() {
        let cases = [
            ("foobar", "foobar"),
            ("line1<br>line2", "line1<br>\nline2"),
            ("<img src=\"foo.jpg\"><br>bar", "<img src=\"foo.jpg\"><br>\nbar"),
            ("<li>foo<br>bar</li>", "<li>foo<br>bar</li>"),
            ("<li>foo<br></li>", "<li>foo</li>"),
            ("<div>text</div>", "text"),
            ("<ul><li>foo</li><li>bar</li></ul>", "<ul>\n  <li>foo</li>\n  <li>bar</li>\n</ul>"),
            (
                "<ul><li>foo</li><ul><li>foo</li><li>bar</li></ul></ul>",
                "<ul>\n  <li>foo</li>\n  <ul>\n    <li>foo</li>\n    <li>bar</li>\n  </ul>\n</ul>",
            ),
            ("text with <b>important</b> part.", "text with <b>important</b> part."),
            (
                "<section><img src=\"foo.jpg\"><img src=\"foo.jpg\"></section>",
                "<section>\n  <img src=\"foo.jpg\">\n  <img src=\"foo.jpg\">\n</section>",
            ),
            (
                "<section>text <b>with important</b> part!</section>",
                "<section>\n  text <b>with important</b> part!\n</section>",
            ),
            (
                "<section><img src=\"foo.jpg\"><br><img src=\"bar.jpg\"></section>",
                "<section>\n  <img src=\"foo.jpg\"><br>\n  <img src=\"bar.jpg\">\n</section>",
            ),
            (
                "<section><img src=\"foo.jpg\"><br><b>important</b> info</section>",
                "<section>\n  <img src=\"foo.jpg\"><br>\n  <b>important</b> info\n</section>",
            ),
            ("foo<br><b>bar</b>", "foo<br>\n<b>bar</b>"),
            ("foo<br> <b>bar</b>", "foo<br>\n<b>bar</b>"),
            (
                "<section>foo<br> <b>bar</b></section>",
                "<section>\n  foo<br>\n  <b>bar</b>\n</section>",
            ),
            ("<ol start=\"2\">\n  <li>foo</li>\n</ol>", "<ol start=\"2\">\n  <li>foo</li>\n</ol>"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn whitespace_at_inline_boundaries() {
        let cases = [
            ("<li><b>foo</b> bar</li>", "<li><b>foo</b> bar</li>"),
            ("<li><b>a</b> foo\nbar</li>", "<li><b>a</b> foo bar</li>"),
            ("<b>foo</b>?", "<b>foo</b>?"),
            ("{{c1:: <b>foo</b> }} bar", "{{c1::<b>foo</b>}} bar"),
            ("{{c1::<b>foo</b>}} bar", "{{c1::<b>foo</b>}} bar"),
            ("<b>foo</b>bar", "<b>foo</b>bar"),
            ("<b>foo</b>-bar", "<b>foo</b>-bar"),
            ("<b>foo</b> -bar", "<b>foo</b> -bar"),
            ("foo<b>bar</b>", "foo<b>bar</b>"),
            ("foo-<b>bar</b>", "foo-<b>bar</b>"),
            ("foo- <b>bar</b>", "foo- <b>bar</b>"),
            ("foo&nbsp;<b>bar</b>", "foo <b>bar</b>"),
            ("foo<b>&nbsp;bar</b>", "foo <b>bar</b>"),
            ("<b>foo</b>&nbsp;<i>bar</i>", "<b>foo</b> <i>bar</i>"),
            ("foo <i>bar</i> foobar", "foo <i>bar</i> foobar"),
            ("<li><b>foo</b><br></li>", "<li><b>foo</b></li>"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn sub_and_sup_attach_tightly() {
        let cases = [
            ("A <sub>B</sub> C", "A<sub>B</sub> C"),
            ("A<sub>B</sub> C", "A<sub>B</sub> C"),
            ("A<sub>B</sub>-C", "A<sub>B</sub>-C"),
            ("<li>foobar bar<sub>foo</sub></li>", "<li>foobar bar<sub>foo</sub></li>"),
            ("<li>foo <sub>bar</sub></li>", "<li>foo<sub>bar</sub></li>"),
            ("<li>foo<sub>bar</sub> </li>", "<li>foo<sub>bar</sub></li>"),
            ("<li>foo <sub>bar</sub> </li>", "<li>foo<sub>bar</sub></li>"),
            ("foo<sub>bar</sub>&nbsp;foo", "foo<sub>bar</sub> foo"),
            ("NAD⁺ + Pᵢ", "NAD<sup>+</sup> + P<sub>i</sub>"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn adjacent_identical_tags_merge() {
        let cases = [
            ("<b>foo</b><b>bar</b>", "<b>foobar</b>"),
            ("<b>foo</b> <b>bar</b>", "<b>foo bar</b>"),
            ("<b>foo</b>  <b>bar</b>", "<b>foo bar</b>"),
            ("<b>foo </b><b>bar</b>", "<b>foo bar</b>"),
            ("<b>foo </b>\n<b>bar</b>", "<b>foo bar</b>"),
            ("<li><u>foo</u><u>bar</u></li>", "<li><u>foobar</u></li>"),
            ("<li><u>foo</u><b>bar</b></li>", "<li><u>foo</u><b>bar</b></li>"),
            ("<li><u>foo</u><br><u>bar</u></li>", "<li><u>foo</u><br><u>bar</u></li>"),
            ("<li><u>foo</u><br><b>bar</b></li>", "<li><u>foo</u><br><b>bar</b></li>"),
            ("<u>foo<b>bas</b>    bar</u>", "<u>foo<b>bas</b> bar</u>"),
            ("<u>foo   bar</u>", "<u>foo bar</u>"),
            ("<u>foo <u>bar</u></u>", "<u>foo bar</u>"),
            ("<u>foo <ins>bar</ins></u>", "<u>foo <ins>bar</ins></u>"),
            ("<u>foo <u>bar</u> <b>bas</b></u>", "<u>foo bar <b>bas</b></u>"),
            ("<u>foo<b>bas</b> <u>bar</u></u>", "<u>foo<b>bas</b> bar</u>"),
            ("<u>foo<b>bas</b>  <u>bar</u></u>", "<u>foo<b>bas</b> bar</u>"),
            ("<u>foo<b>bas</b> <u> bar</u></u>", "<u>foo<b>bas</b> bar</u>"),
            ("<u>foo<b>bas </b> <b>  bar</b></u>", "<u>foo<b>bas bar</b></u>"),
            ("<u>foo<b>bas </b> <u>  bar</u></u>", "<u>foo<b>bas</b> bar</u>"),
            ("<strong>foobar</strong>", "<b>foobar</b>"),
            ("<em>foobar</em>", "<i>foobar</i>"),
            ("foo <strong>foobar</strong> bar", "foo <b>foobar</b> bar"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn quotes_symbols_and_empty_elements() {
        let cases = [
            ("„foo“", "\"foo\""),
            ("<img src=\"„foo“\">", "<img src=\"„foo“\">"),
            ("<li>„foo“</li>", "<li>\"foo\"</li>"),
            ("<li>foo</li><li></li>", "<li>foo</li>"),
            ("<ul>\n  <li>foo</li>\n  <li>\n    \n  </li>\n</ul>", "<ul>\n  <li>foo</li>\n</ul>"),
            ("<li>foo =&gt; foo&nbsp;bar</li>", "<li>foo ⇒ foo bar</li>"),
            (r"\[A <=> B\]", r"\[A <=> B\]"),
            (r"\(A <=> B\)", r"\(A <=> B\)"),
            (r"foo <=> bar \[A <=> B\]", r"foo ⇔ bar \[A <=> B\]"),
            (r"\(A <=> B\) foo <=> bar", r"\(A <=> B\) foo ⇔ bar"),
            (r"foo <=> bar \(A <=> B\) foo <=> bar", r"foo ⇔ bar \(A <=> B\) foo ⇔ bar"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn tables_keep_whitelisted_attributes() {
        check(
            "<table style='border-collapse: collapse'><caption>foobar</caption><colgroup><col style='width: 20%'><col style='width: 80%; height: 32px'></colgroup><tbody><tr><td style='text-align: center;'>foo</td><td style='text-align: center;'>bar</td></tr><tr><td>foo<br>bar</td><td>foo<br>bar</td></tr><tr><td><u>foo</u><br><u>bar</u></td><td><u>foo</u><br><b>bar</b></td></tr></tbody></table>",
            "<table border=\"1\" style=\"border-collapse: collapse;\">\n  <caption>foobar</caption>\n  <colgroup>\n    <col style=\"width: 20%;\">\n    <col style=\"width: 80%;\">\n  </colgroup>\n  <tbody>\n    <tr>\n      <td style=\"text-align: center;\">foo</td>\n      <td style=\"text-align: center;\">bar</td>\n    </tr>\n    <tr>\n      <td>foo<br>bar</td>\n      <td>foo<br>bar</td>\n    </tr>\n    <tr>\n      <td><u>foo</u><br><u>bar</u></td>\n      <td><u>foo</u><br><b>bar</b></td>\n    </tr>\n  </tbody>\n</table>",
        );
        check("<td style=\"foo: bar\">foobar</td>", "<td>foobar</td>");
    }

    #[test]
    fn minimized_output_is_single_line() {
        check_with(
            &HtmlPolicy::presentational(),
            "<section>\n  foo<br>\n  <b>bar</b>\n</section>",
            "<section>foo<br><b>bar</b></section>",
            true,
        );
    }

    #[test]
    fn structural_errors_are_fatal() {
        for input in ["<b>foo", "<li>foo</b>", "<ul/>", "</section>"] {
            assert!(
                matches!(format_html(input, false), Err(Error::MalformedHtml { .. })),
                "{input}"
            );
        }
        // Disallowed tags never need to balance.
        assert_eq!(format_html("<p>foo", false).unwrap().value, "foo");
    }

    #[test]
    fn comparisons_in_text_survive() {
        let cases = [
            ("if a<b then", "if a&lt;b then"),
            ("x<y and y>z", "x&lt;y and y>z"),
            ("1 < 2", "1 < 2"),
            ("a &amp; b", "a & b"),
            ("a&amp;b", "a&amp;b"),
        ];
        for (input, expected) in cases {
            check(input, expected);
        }
    }

    #[test]
    fn empty_input_is_unchanged() {
        let out = format_html("", false).unwrap();
        assert_eq!(out.value, "");
        assert!(!out.changed);
    }
}
