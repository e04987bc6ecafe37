use ncd_parser::{apply_splices, parse_html, ParseError, Selector, Span, Splice, Stylesheet};

const MESSY: &str = "<!-- generated -->\n<div CLASS = 'card  featured' data-x=1>\n  <p>One<br>Two &amp; three</p>\n  <script>if (a < b) { render('<p>'); }</script>\n  <img src=a.png alt=\"\">\n</div>\n";

#[test]
fn test_attribute_value_splice_keeps_surroundings() {
    let doc = parse_html(MESSY);
    let div = doc
        .select_first(&Selector::parse("div.featured").unwrap())
        .unwrap();
    let attr = doc.element(div).unwrap().attribute("data-x").unwrap();
    let value = attr.value.as_ref().unwrap();

    let out = apply_splices(MESSY, &[Splice::replace(value.span, "\"2\"")]).unwrap();
    assert_eq!(out, MESSY.replacen("data-x=1", "data-x=\"2\"", 1));
}

#[test]
fn test_script_content_is_not_markup() {
    let doc = parse_html(MESSY);
    let paragraphs = doc.select(&Selector::parse("p").unwrap());
    assert_eq!(paragraphs.len(), 1);
    assert_eq!(doc.text_content(paragraphs[0]), "One Two &amp; three");
}

#[test]
fn test_multiple_splices_apply_in_source_order() {
    let doc = parse_html(MESSY);
    let p = doc.select_first(&Selector::parse("p").unwrap()).unwrap();
    let img = doc.select_first(&Selector::parse("img").unwrap()).unwrap();
    let first = doc.direct_text(p).unwrap();

    // Given out of order on purpose
    let out = apply_splices(
        MESSY,
        &[
            Splice::insert(doc.element(img).unwrap().name_span.end, " loading=\"lazy\""),
            Splice::replace(first, "Uno"),
        ],
    )
    .unwrap();
    assert!(out.contains("<p>Uno<br>Two"));
    assert!(out.contains("<img loading=\"lazy\" src=a.png alt=\"\">"));

    let overlap = apply_splices(
        MESSY,
        &[Splice::replace(Span::new(5, 10), "x"), Splice::delete(Span::new(8, 12))],
    );
    assert!(matches!(overlap, Err(ParseError::OverlappingEdit { .. })));
}

#[test]
fn test_stylesheet_rule_spans() {
    let css = "/* theme */\n.card , .featured {\n  color: red;\n  margin: 0 auto\n}\n@media print { .card { color: black; } }\n";
    let sheet = Stylesheet::parse(css).unwrap();

    let rule = sheet.rules_for(".card, .featured").next().unwrap();
    assert!(rule.open_declaration);
    let margin = rule.declaration("margin").unwrap();
    assert_eq!(margin.value_span.slice(css), "0 auto");

    // The print rule is nested and never a target
    let target = sheet.target_rule(".card", "color");
    assert!(target.is_none());
}
