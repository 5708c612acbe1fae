use std::collections::HashSet;
use std::fmt;

use scraper::Selector;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("selector spec has no fields")]
    Empty,
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("field `{0}` is defined more than once")]
    DuplicateField(String),
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("invalid attribute name `{0}`")]
    InvalidAttribute(String),
    #[error("malformed field definition `{0}`, expected name=selector[@attribute]")]
    MalformedDefinition(String),
}

/// A compiled CSS selector plus the attribute to read from matches.
///
/// Without an attribute the match's text content is used.
#[derive(Clone)]
pub struct SelectorRule {
    source: String,
    selector: Selector,
    attribute: Option<String>,
}

impl SelectorRule {
    pub fn new(selector: &str, attribute: Option<&str>) -> Result<Self, SpecError> {
        let source = selector.trim();
        let compiled = Selector::parse(source).map_err(|err| SpecError::InvalidSelector {
            selector: source.to_string(),
            message: err.to_string(),
        })?;
        let attribute = match attribute.map(str::trim) {
            Some(name) if is_attribute_name(name) => Some(name.to_ascii_lowercase()),
            Some(name) => return Err(SpecError::InvalidAttribute(name.to_string())),
            None => None,
        };
        Ok(Self {
            source: source.to_string(),
            selector: compiled,
            attribute,
        })
    }

    /// Parses `css` or `css@attribute`.
    ///
    /// An `@` only splits off an attribute when what follows is a bare
    /// attribute name and the selector part has balanced brackets, so
    /// `a[href^="mailto:x@y"]` stays a plain selector.
    pub fn from_shorthand(text: &str) -> Result<Self, SpecError> {
        if let Some((css, attr)) = text.rsplit_once('@') {
            if !css.trim().is_empty() && is_attribute_name(attr.trim()) && brackets_balanced(css) {
                return Self::new(css, Some(attr));
            }
        }
        Self::new(text, None)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub(crate) fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Debug for SelectorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorRule")
            .field("selector", &self.source)
            .field("attribute", &self.attribute)
            .finish()
    }
}

impl PartialEq for SelectorRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.attribute == other.attribute
    }
}

/// Ordered mapping of unique field names to extraction rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorSpec {
    fields: Vec<(String, SelectorRule)>,
}

impl SelectorSpec {
    pub fn new<I, S>(fields: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = (S, SelectorRule)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for (name, rule) in fields {
            let name: String = name.into();
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(SpecError::EmptyFieldName);
            }
            if !seen.insert(name.clone()) {
                return Err(SpecError::DuplicateField(name));
            }
            ordered.push((name, rule));
        }
        if ordered.is_empty() {
            return Err(SpecError::Empty);
        }
        Ok(Self { fields: ordered })
    }

    /// Builds a spec from `name=css[@attribute]` definitions.
    pub fn from_definitions<I, S>(definitions: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = definitions
            .into_iter()
            .map(|definition| Self::parse_definition(definition.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    /// Splits one `name=css[@attribute]` definition into its trimmed field
    /// name and compiled rule.
    pub fn parse_definition(definition: &str) -> Result<(String, SelectorRule), SpecError> {
        let (name, rule) = definition
            .split_once('=')
            .ok_or_else(|| SpecError::MalformedDefinition(definition.to_string()))?;
        Ok((name.trim().to_string(), SelectorRule::from_shorthand(rule)?))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SelectorRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn brackets_balanced(css: &str) -> bool {
    css.matches('[').count() == css.matches(']').count()
}
