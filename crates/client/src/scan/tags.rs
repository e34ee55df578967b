//! The recognized image-declaring tags and their priority.

use std::collections::HashMap;

use super::StartTag;

/// Path used when a head declares no image at all.
pub const DEFAULT_CANDIDATE: &str = "favicon.ico";

/// Category of an image-declaring head tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    /// `<link rel="apple-touch-icon" href=...>`
    Apple,
    /// `<meta property="og:image" content=...>`
    OpenGraph,
    /// `<meta property="twitter:image" content=...>`
    Twitter,
    /// `<meta property="twitter:image:src" content=...>`
    Twitter2,
    /// `<link rel="shortcut icon" href=...>`
    Favicon,
}

impl TagCategory {
    /// Selection order, best first.
    pub const PRIORITY: [TagCategory; 5] =
        [TagCategory::Apple, TagCategory::OpenGraph, TagCategory::Twitter, TagCategory::Twitter2, TagCategory::Favicon];

    pub fn name(self) -> &'static str {
        match self {
            TagCategory::Apple => "apple",
            TagCategory::OpenGraph => "opengraph",
            TagCategory::Twitter => "twitter",
            TagCategory::Twitter2 => "twitter2",
            TagCategory::Favicon => "favicon",
        }
    }
}

/// One row of the tag table: a tag is recognized when its name is `tag` and
/// its `match_attr` equals `match_value` (ASCII case-insensitive). The
/// candidate URL is read from `url_attr`.
#[derive(Debug)]
pub(crate) struct TagShape {
    pub category: TagCategory,
    pub tag: &'static str,
    pub match_attr: &'static str,
    pub match_value: &'static str,
    pub url_attr: &'static str,
}

pub(crate) static TAG_TABLE: [TagShape; 5] = [
    TagShape {
        category: TagCategory::Apple,
        tag: "link",
        match_attr: "rel",
        match_value: "apple-touch-icon",
        url_attr: "href",
    },
    TagShape {
        category: TagCategory::OpenGraph,
        tag: "meta",
        match_attr: "property",
        match_value: "og:image",
        url_attr: "content",
    },
    TagShape {
        category: TagCategory::Twitter,
        tag: "meta",
        match_attr: "property",
        match_value: "twitter:image",
        url_attr: "content",
    },
    TagShape {
        category: TagCategory::Twitter2,
        tag: "meta",
        match_attr: "property",
        match_value: "twitter:image:src",
        url_attr: "content",
    },
    TagShape {
        category: TagCategory::Favicon,
        tag: "link",
        match_attr: "rel",
        match_value: "shortcut icon",
        url_attr: "href",
    },
];

impl TagShape {
    fn matches(&self, tag: &StartTag) -> bool {
        tag.name == self.tag && tag.attr(self.match_attr).is_some_and(|v| v.eq_ignore_ascii_case(self.match_value))
    }
}

/// Classify a start tag against [`TAG_TABLE`].
///
/// Returns the category and its URL value; the value is `None` when the URL
/// attribute is missing or blank.
pub(crate) fn classify(tag: &StartTag) -> Option<(TagCategory, Option<String>)> {
    let shape = TAG_TABLE.iter().find(|shape| shape.matches(tag))?;
    let url = tag.attr(shape.url_attr).map(str::trim).filter(|v| !v.is_empty()).map(String::from);
    Some((shape.category, url))
}

/// URLs discovered in one document, at most one per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    urls: HashMap<TagCategory, String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence of `category`.
    ///
    /// Later occurrences overwrite earlier ones; an occurrence without a URL
    /// clears the category.
    pub fn observe(&mut self, category: TagCategory, url: Option<String>) {
        match url {
            Some(url) => {
                self.urls.insert(category, url);
            }
            None => {
                self.urls.remove(&category);
            }
        }
    }

    pub fn get(&self, category: TagCategory) -> Option<&str> {
        self.urls.get(&category).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Highest-priority category that produced a URL.
    pub fn select(&self) -> Option<(TagCategory, &str)> {
        TagCategory::PRIORITY.iter().find_map(|&category| self.get(category).map(|url| (category, url)))
    }

    /// The chosen candidate, or [`DEFAULT_CANDIDATE`] when nothing matched.
    pub fn candidate(&self) -> &str {
        self.select().map_or(DEFAULT_CANDIDATE, |(_, url)| url)
    }
}
