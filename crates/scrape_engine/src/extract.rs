use scraper::{ElementRef, Html};
use url::Url;

use crate::decode::{decode_text, DecodeError};
use crate::selector::{SelectorRule, SelectorSpec};
use crate::types::FieldValue;

/// Attributes whose values are URLs and get resolved against the page URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "poster", "data-src"];

/// Decodes `content` and applies every rule of `spec` to it.
///
/// Only decoding can fail; markup defects are recovered by the HTML5 parser.
pub fn extract(
    content: &[u8],
    content_type: &str,
    spec: &SelectorSpec,
) -> Result<Vec<(String, FieldValue)>, DecodeError> {
    let decoded = decode_text(content, content_type)?;
    Ok(extract_document(&decoded.text, None, spec))
}

/// Applies `spec` to already decoded markup.
///
/// With `base_url`, URL-bearing attribute values are made absolute.
pub fn extract_document(
    html: &str,
    base_url: Option<&str>,
    spec: &SelectorSpec,
) -> Vec<(String, FieldValue)> {
    let document = Html::parse_document(html);
    let base = base_url.and_then(|b| Url::parse(b).ok());
    spec.fields()
        .map(|(name, rule)| (name.to_string(), apply_rule(&document, rule, base.as_ref())))
        .collect()
}

fn apply_rule(document: &Html, rule: &SelectorRule, base: Option<&Url>) -> FieldValue {
    let mut values: Vec<String> = document
        .select(rule.selector())
        .map(|element| node_value(element, rule.attribute(), base))
        .collect();
    match values.len() {
        0 => FieldValue::empty(),
        1 => FieldValue::Single(values.remove(0)),
        _ => FieldValue::Multiple(values),
    }
}

fn node_value(element: ElementRef<'_>, attribute: Option<&str>, base: Option<&Url>) -> String {
    match attribute {
        Some(name) => {
            let raw = element.value().attr(name).unwrap_or_default().trim();
            match base {
                Some(base) if !raw.is_empty() && URL_ATTRIBUTES.contains(&name) => base
                    .join(raw)
                    .map(|resolved| resolved.to_string())
                    .unwrap_or_else(|_| raw.to_string()),
                _ => raw.to_string(),
            }
        }
        None => collapse_whitespace(&element.text().collect::<String>()),
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
