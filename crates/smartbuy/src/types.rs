use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Links found for a single keyword, in the order the anchors appear on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub keyword: String,
    pub links: Vec<String>,
}

impl Display for ProductMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "── {} ({} link(s))", self.keyword, self.links.len())?;
        for link in &self.links {
            writeln!(f, "   {}", link)?;
        }
        Ok(())
    }
}

/// Keyword to links grouping produced by one matching pass.
///
/// Keywords keep the order in which they first matched. An empty set is never
/// handed out by the matcher; "no matches" is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSet {
    matches: Vec<ProductMatch>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `link` to the group for `keyword`, creating the group if absent.
    pub fn add(&mut self, keyword: &str, link: impl Into<String>) {
        match self.matches.iter_mut().find(|m| m.keyword == keyword) {
            Some(existing) => existing.links.push(link.into()),
            None => self.matches.push(ProductMatch {
                keyword: keyword.to_string(),
                links: vec![link.into()],
            }),
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&[String]> {
        self.matches
            .iter()
            .find(|m| m.keyword == keyword)
            .map(|m| m.links.as_slice())
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.keyword.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProductMatch> {
        self.matches.iter()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn total_links(&self) -> usize {
        self.matches.iter().map(|m| m.links.len()).sum()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a ProductMatch;
    type IntoIter = std::slice::Iter<'a, ProductMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, L> FromIterator<(K, Vec<L>)> for MatchSet
where
    K: AsRef<str>,
    L: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<L>)>>(iter: I) -> Self {
        let mut set = MatchSet::new();
        for (keyword, links) in iter {
            for link in links {
                set.add(keyword.as_ref(), link);
            }
        }
        set
    }
}

impl Display for MatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "┌─ {} keyword(s) matched, {} link(s)",
            self.len(),
            self.total_links()
        )?;
        for product in &self.matches {
            write!(f, "{}", product)?;
        }
        Ok(())
    }
}
