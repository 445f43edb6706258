use std::fmt::Display;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

use crate::types::MatchSet;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Page structure changed near '{href}': {step} not found")]
    PageStructureChanged { href: String, step: Step },
}

/// One hop of a relative path through the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Walk up this many ancestor levels (1 is the parent).
    Up(usize),
    /// Take the child node at this zero-based index, text nodes included.
    Child(usize),
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Up(levels) => write!(f, "ancestor {} level(s) up", levels),
            Step::Child(index) => write!(f, "child node #{}", index),
        }
    }
}

/// Where the "posted N ago" label sits relative to a product link on the deals page.
///
/// The link and its label only share an ancestor five levels up; the label is the
/// 2nd child of the 4th child of that ancestor's 4th child.
pub const FRESHNESS_PATH: [Step; 4] = [Step::Up(5), Step::Child(3), Step::Child(3), Step::Child(1)];

const HOURS_MARKER: &str = "שעות";
// Only the literal singular form counts, "2 ימים" is stale.
const ONE_DAY_MARKER: &str = "1 ימים";

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("invalid selector: anchor"));

/// Finds links whose text contains one of `products` and whose posted label
/// says they went up within the last day.
///
/// Returns `Ok(None)` when nothing matched. A matching link without the expected
/// surrounding markup is an error: the page layout has changed.
pub fn search_for_products(
    html: &str,
    products: &[impl AsRef<str>],
) -> Result<Option<MatchSet>, ParseError> {
    let document = Html::parse_document(html);
    let anchors: Vec<ElementRef> = document.select(&ANCHOR_SELECTOR).collect();
    log::debug!("Found {} anchor(s) on the page", anchors.len());

    let keywords: Vec<String> = products
        .iter()
        .map(|p| p.as_ref().to_lowercase())
        .collect();

    let mut matches = MatchSet::new();

    for keyword in &keywords {
        for anchor in &anchors {
            let Some(text) = direct_string(*anchor) else {
                continue;
            };
            let href = anchor.value().attr("href").unwrap_or("");
            if href.is_empty() || !text.to_lowercase().contains(keyword.as_str()) {
                continue;
            }

            let posted = freshness_text(*anchor, href)?;
            if is_fresh(&posted) {
                log::debug!("'{}' matched {} (posted: {})", keyword, href, posted.trim());
                matches.add(keyword, href);
            } else {
                log::debug!("'{}' matched {} but it is stale", keyword, href);
            }
        }
    }

    if matches.is_empty() {
        Ok(None)
    } else {
        Ok(Some(matches))
    }
}

/// Whether a posted label means "within the last day".
pub fn is_fresh(posted: &str) -> bool {
    posted.contains(HOURS_MARKER) || posted.contains(ONE_DAY_MARKER)
}

/// The anchor's text when it has exactly one child that is either text or an
/// element with a single text descendant chain. Mixed content yields `None`.
fn direct_string(anchor: ElementRef) -> Option<String> {
    let mut node = *anchor;
    loop {
        let mut children = node.children();
        let only = children.next()?;
        if children.next().is_some() {
            return None;
        }
        match only.value() {
            Node::Text(text) => {
                let text: &str = text;
                return Some(text.to_owned());
            }
            Node::Element(_) => node = only,
            _ => return None,
        }
    }
}

fn freshness_text(anchor: ElementRef, href: &str) -> Result<String, ParseError> {
    let mut node = *anchor;
    for step in FRESHNESS_PATH {
        let next = match step {
            Step::Up(levels) => node.ancestors().nth(levels.saturating_sub(1)),
            Step::Child(index) => node.children().nth(index),
        };
        node = next.ok_or_else(|| ParseError::PageStructureChanged {
            href: href.to_string(),
            step,
        })?;
    }

    Ok(node
        .descendants()
        .filter_map(|n| n.value().as_text())
        .map(|t| &**t)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn deal(title: &str, href: &str, posted: &str) -> String {
        format!(
            r#"<div class="deal"><div class="card"><div class="body"><div class="title"><h3><a href="{href}">{title}</a></h3></div></div></div><span>price</span><span>store</span><div class="meta"><span>a</span><span>b</span><span>c</span><div class="posted"><span class="icon">*</span><span>{posted}</span></div></div></div>"#
        )
    }

    fn page(deals: &[String]) -> String {
        format!("<html><body>{}</body></html>", deals.concat())
    }

    #[test]
    fn test_fresh_match_maps_keyword_to_link() {
        let html = page(&[deal("Widget Pro", "http://x/1", "לפני 5 שעות")]);

        let matches = search_for_products(&html, &["widget"])
            .expect("Failed to search")
            .expect("Should match");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get("widget"), Some(&["http://x/1".to_string()][..]));
    }

    #[test]
    fn test_stale_match_is_no_matches() {
        let html = page(&[deal("Widget Pro", "http://x/1", "לפני 3 ימים")]);

        let matches = search_for_products(&html, &["widget"]).expect("Failed to search");
        assert!(matches.is_none());
    }

    #[test]
    fn test_freshness_markers() {
        assert!(is_fresh("5 שעות"));
        assert!(is_fresh("לפני 1 ימים"));
        assert!(!is_fresh("2 ימים"));
        assert!(!is_fresh("3 ימים"));
        assert!(!is_fresh(""));
    }

    #[test]
    fn test_matching_is_case_insensitive_on_both_sides() {
        let html = page(&[deal("wIdGeT pro", "http://x/1", "2 שעות")]);

        let matches = search_for_products(&html, &["WIDGET"])
            .expect("Failed to search")
            .expect("Should match");

        assert_eq!(matches.keywords().collect::<Vec<_>>(), vec!["widget"]);
    }

    #[test]
    fn test_empty_or_missing_href_is_skipped() {
        let html = page(&[
            deal("Widget Pro", "", "5 שעות"),
            r#"<div><a>Widget Max</a></div>"#.to_string(),
        ]);

        let matches = search_for_products(&html, &["widget"]).expect("Failed to search");
        assert!(matches.is_none());
    }

    #[test]
    fn test_mixed_content_anchor_is_skipped() {
        let html = page(&[deal("Widget <b>Pro</b>", "http://x/1", "5 שעות")]);

        let matches = search_for_products(&html, &["widget"]).expect("Failed to search");
        assert!(matches.is_none());
    }

    #[test]
    fn test_single_nested_element_counts_as_direct_text() {
        let html = page(&[deal("<b>Widget Pro</b>", "http://x/1", "5 שעות")]);

        let matches = search_for_products(&html, &["widget"])
            .expect("Failed to search")
            .expect("Should match");
        assert_eq!(matches.total_links(), 1);
    }

    #[test]
    fn test_groups_follow_keyword_order_and_links_follow_document_order() {
        let html = page(&[
            deal("Fridge XL", "http://x/1", "3 שעות"),
            deal("Smart TV 55", "http://x/2", "1 ימים"),
            deal("Fridge Mini", "http://x/3", "10 שעות"),
            deal("Smart TV 65", "http://x/4", "4 ימים"),
        ]);

        let matches = search_for_products(&html, &["TV", "fridge", "vacuum"])
            .expect("Failed to search")
            .expect("Should match");

        assert_eq!(matches.keywords().collect::<Vec<_>>(), vec!["tv", "fridge"]);
        assert_eq!(matches.get("tv"), Some(&["http://x/2".to_string()][..]));
        assert_eq!(
            matches.get("fridge"),
            Some(&["http://x/1".to_string(), "http://x/3".to_string()][..])
        );
    }

    #[test]
    fn test_unmatched_anchor_outside_layout_is_ignored() {
        let html = page(&[
            r#"<a href="/about">About us</a>"#.to_string(),
            deal("Widget Pro", "http://x/1", "5 שעות"),
        ]);

        let matches = search_for_products(&html, &["widget"])
            .expect("Failed to search")
            .expect("Should match");
        assert_eq!(matches.total_links(), 1);
    }

    #[test]
    fn test_matched_anchor_outside_layout_is_structure_error() {
        let html = r#"<html><body><a href="http://x/1">Widget Pro</a></body></html>"#;

        let err = search_for_products(html, &["widget"]).expect_err("Should fail");
        match err {
            ParseError::PageStructureChanged { href, step } => {
                assert_eq!(href, "http://x/1");
                assert_eq!(step, Step::Up(5));
            }
        }
    }

    #[test]
    fn test_missing_child_is_structure_error() {
        let html = r#"<html><body><div><div><div><div><h3><a href="http://x/1">Widget Pro</a></h3></div></div></div><span>only</span></div></body></html>"#;

        let err = search_for_products(html, &["widget"]).expect_err("Should fail");
        assert!(matches!(
            err,
            ParseError::PageStructureChanged {
                step: Step::Child(3),
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_keywords_append_to_the_same_group() {
        let html = page(&[deal("Widget Pro", "http://x/1", "5 שעות")]);

        let matches = search_for_products(&html, &["widget", "Widget"])
            .expect("Failed to search")
            .expect("Should match");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get("widget").map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_search_deals_page_fixture() {
        let html = fs::read_to_string("fixtures/smartbuy_deals.html")
            .expect("Failed to read fixture");

        let matches = search_for_products(&html, &["TV", "Fridge", "Vacuum"])
            .expect("Failed to search")
            .expect("Should match");

        println!("{}", matches);

        assert_eq!(matches.keywords().collect::<Vec<_>>(), vec!["tv", "fridge"]);
        assert_eq!(
            matches.get("tv"),
            Some(
                &[
                    "https://smartbuy.example/deals/101".to_string(),
                    "https://smartbuy.example/deals/105".to_string(),
                ][..]
            )
        );
        assert_eq!(
            matches.get("fridge"),
            Some(&["https://smartbuy.example/deals/102".to_string()][..])
        );
    }
}
