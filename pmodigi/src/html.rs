//! HTML helpers

use scraper::{Html, Selector};

/// Returns the value of the first element carrying `name="<field>"`
///
/// Matches `<input>`, `<meta>` or any other element with a `value` (or,
/// for meta tags, a `content`) attribute. Empty values count as missing.
pub fn extract_form_field(html: &str, field: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"[name="{}"]"#, field)).ok()?;
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|element| {
            let attrs = element.value();
            attrs.attr("value").or_else(|| attrs.attr("content"))
        })
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
