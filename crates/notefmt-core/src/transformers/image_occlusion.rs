//! `imageOcclusionSVG`: canonicalizes the `<img>` field and the SVG side file it points to.

use crate::error::Error;
use crate::html::{GenericHtml, MarkupNode, format_html_with, parse_fragment};
use crate::registry::Context;
use crate::svg::format_svg_with;
use crate::symbols::fix_encoding_bytes;
use crate::{Formatted, Result};

pub fn format_image_occlusion(value: &str, ctx: &Context<'_>) -> Result<Formatted> {
    let field = format_html_with(value, &ctx.config.html, &ctx.config.symbols, ctx.minimized)?;
    let name = image_source(&field.value)?;

    let svg = fix_encoding_bytes(&ctx.media.read(&name)?);
    let formatted = format_svg_with(&svg, &ctx.config.image_occlusion_svg)?;
    let svg_changed = svg != formatted;
    if svg_changed {
        tracing::debug!(file = %name, "rewriting occlusion SVG");
        ctx.media.write(&name, &formatted)?;
    }

    Ok(Formatted {
        changed: field.changed || svg_changed,
        value: field.value,
    })
}

/// `src` of the single `<img>` the field must consist of.
fn image_source(markup: &str) -> Result<String> {
    let invalid = |message: &str| Error::InvalidOcclusionField {
        message: format!("{message}: {markup:?}"),
    };
    let nodes = parse_fragment(markup, &GenericHtml)?;
    let [MarkupNode::Element(img)] = nodes.as_slice() else {
        return Err(invalid("expected a single image"));
    };
    if img.name != "img" {
        return Err(invalid("expected a single image"));
    }
    let src = img
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("image without src"))?;
    Ok(src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::NoTitles;
    use crate::media::MemoryMedia;
    use crate::svg::format_svg;
    use crate::transformers::testing::Harness;

    const RAW: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"500\" height=\"400\">\
        <g><title>Masks</title>\
        <rect id=\"m-ao-2\" class=\"qshape\" x=\"10.4\" y=\"20\" width=\"30\" height=\"40\" \
          fill=\"#FF7E7E\" stroke=\"#2D2D2D\"/>\
        <rect id=\"m-ao-1\" x=\"-2\" y=\"5\" width=\"260.7\" height=\"12\" fill=\"#FFEBA2\"/>\
        </g><g><title>Labels</title></g></svg>";

    #[test]
    fn field_and_side_file_are_canonicalized() {
        let h = Harness::new();
        let media = MemoryMedia::new();
        media.insert("mask.svg", RAW);
        let ctx = h.ctx_with(false, &NoTitles, &media);

        let out = format_image_occlusion("<img src=\"mask.svg\" />", &ctx).unwrap();
        assert_eq!(out.value, "<img src=\"mask.svg\">");
        assert!(out.changed);
        let written = String::from_utf8(media.get("mask.svg").unwrap()).unwrap();
        assert_eq!(written, format_svg(RAW).unwrap());
        assert_eq!(media.writes(), 1);

        let again = format_image_occlusion(&out.value, &ctx).unwrap();
        assert!(!again.changed);
        assert_eq!(media.writes(), 1);
    }

    #[test]
    fn canonical_field_with_stale_svg_is_changed() {
        let h = Harness::new();
        let media = MemoryMedia::new();
        media.insert("mask.svg", RAW);
        let ctx = h.ctx_with(false, &NoTitles, &media);
        let out = format_image_occlusion("<img src=\"mask.svg\">", &ctx).unwrap();
        assert_eq!(out.value, "<img src=\"mask.svg\">");
        assert!(out.changed);
    }

    #[test]
    fn anything_but_one_image_is_fatal() {
        let h = Harness::new();
        let media = MemoryMedia::new();
        let ctx = h.ctx_with(false, &NoTitles, &media);
        for input in ["text", "<img src=\"a.svg\"><img src=\"b.svg\">", "<img>"] {
            assert!(
                matches!(
                    format_image_occlusion(input, &ctx),
                    Err(Error::InvalidOcclusionField { .. })
                ),
                "{input}"
            );
        }
        assert!(matches!(
            format_image_occlusion("<img src=\"missing.svg\">", &ctx),
            Err(Error::Media { .. })
        ));
        assert!(matches!(
            format_image_occlusion("<img src=\"../x.svg\">", &ctx),
            Err(Error::Media { .. })
        ));
    }
}
