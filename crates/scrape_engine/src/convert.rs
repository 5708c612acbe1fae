use scraper::{Html, Selector};

/// Elements dropped before conversion: page chrome and non-content markup.
const BOILERPLATE: &str = "header, footer, nav, script, style, noscript";

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// Strips page chrome with `scraper`, then converts the rest with `html2md`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(&strip_boilerplate(html))
    }
}

/// Removes header/footer/nav and script-like elements from a document.
pub fn strip_boilerplate(html: &str) -> String {
    let mut document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(BOILERPLATE) else {
        return html.to_string();
    };
    let doomed: Vec<ego_tree::NodeId> = document.select(&selector).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    document.root_element().html()
}

/// Plain visible text of a document, whitespace-collapsed.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(&strip_boilerplate(html));
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    crate::extract::collapse_whitespace(&text)
}
