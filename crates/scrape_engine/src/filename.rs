use sha2::{Digest, Sha256};
use url::Url;

const MAX_SLUG_LEN: usize = 80;

/// Stable, filesystem-safe name for a page snapshot:
/// `{host}_{path-slug}--{short_hash(url)}.md`.
///
/// The hash keeps names unique when two URLs slug to the same text.
pub fn page_filename(url: &str) -> String {
    let readable = match Url::parse(url) {
        Ok(parsed) => format!(
            "{}_{}",
            parsed.host_str().unwrap_or("page"),
            parsed.path()
        ),
        Err(_) => url.to_string(),
    };
    format!("{}--{}.md", slugify(&readable), short_hash(url))
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            slug.push(c.to_ascii_lowercase());
            pending_sep = false;
        } else {
            pending_sep = true;
        }
    }
    let mut slug = slug.trim_matches(&['.', '-'][..]).to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
    }
    if slug.is_empty() {
        slug.push_str("page");
    }
    slug
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
