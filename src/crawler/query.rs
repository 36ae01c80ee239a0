//! A small typed query over a parsed document
//!
//! Element lookups in the extractor are expressed as a tag name plus attribute
//! conditions, evaluated over the document in tree order.

use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy)]
enum Condition<'q> {
    /// Attribute equals the value exactly
    Equals(&'q str, &'q str),

    /// Attribute is a space-separated list containing the token (ASCII case-insensitive)
    HasToken(&'q str, &'q str),

    /// Attribute is present with non-whitespace content
    NonBlank(&'q str),

    /// Attribute is absent
    Absent(&'q str),
}

impl Condition<'_> {
    fn matches(&self, element: &ElementRef) -> bool {
        let attr = |name: &str| element.value().attr(name);
        match *self {
            Self::Equals(name, value) => attr(name) == Some(value),
            Self::HasToken(name, token) => attr(name).is_some_and(|v| {
                v.split_ascii_whitespace()
                    .any(|t| t.eq_ignore_ascii_case(token))
            }),
            Self::NonBlank(name) => attr(name).is_some_and(|v| !v.trim().is_empty()),
            Self::Absent(name) => attr(name).is_none(),
        }
    }
}

/// Matches elements by tag name and attribute conditions
#[derive(Debug, Clone)]
pub struct Query<'q> {
    tag: Option<&'q str>,
    conditions: Vec<Condition<'q>>,
}

impl<'q> Query<'q> {
    /// Elements with the given tag name
    pub fn tag(name: &'q str) -> Self {
        Self {
            tag: Some(name),
            conditions: Vec::new(),
        }
    }

    /// Elements of any tag
    pub fn any() -> Self {
        Self {
            tag: None,
            conditions: Vec::new(),
        }
    }

    pub fn attr_eq(mut self, name: &'q str, value: &'q str) -> Self {
        self.conditions.push(Condition::Equals(name, value));
        self
    }

    pub fn attr_has_token(mut self, name: &'q str, token: &'q str) -> Self {
        self.conditions.push(Condition::HasToken(name, token));
        self
    }

    pub fn attr_non_blank(mut self, name: &'q str) -> Self {
        self.conditions.push(Condition::NonBlank(name));
        self
    }

    pub fn without_attr(mut self, name: &'q str) -> Self {
        self.conditions.push(Condition::Absent(name));
        self
    }

    pub fn matches(&self, element: &ElementRef) -> bool {
        let tag_matches = self
            .tag
            .map_or(true, |tag| element.value().name().eq_ignore_ascii_case(tag));
        tag_matches && self.conditions.iter().all(|c| c.matches(element))
    }

    /// All matching elements in document order
    pub fn all<'d>(&'q self, document: &'d Html) -> impl Iterator<Item = ElementRef<'d>> + 'q
    where
        'd: 'q,
    {
        document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(move |element| self.matches(element))
    }

    /// The first matching element in document order
    pub fn first<'d>(&self, document: &'d Html) -> Option<ElementRef<'d>> {
        document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|element| self.matches(element))
    }

    /// The trimmed value of `attr` on the first matching element whose value is
    /// not blank
    pub fn first_attr<'d>(&self, document: &'d Html, attr: &str) -> Option<&'d str> {
        document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|element| self.matches(element))
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}
