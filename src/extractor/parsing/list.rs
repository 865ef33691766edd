//! Listing-page parser
//!
//! Extracts product summary entries and the next-page link from one
//! listing page. Entries missing a usable link or title are skipped with a
//! warning; the page itself never fails on individual entries.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{ParseResult, clean_text, resolve_url, selector};

/// Product summary parsed from a listing entry, before the detail fetch.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub title: String,
    pub detail_url: String,
    pub price_text: Option<String>,
    pub rating_token: Option<String>,
    pub availability_text: Option<String>,
}

/// One parsed listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub next_url: Option<String>,
}

/// Parser for product listing pages, selectors compiled once.
pub struct ListingParser {
    entry: Selector,
    link: Selector,
    price: Selector,
    rating: Selector,
    availability: Selector,
    next_link: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            entry: selector("article.product_pod")?,
            link: selector("h3 a")?,
            price: selector(".price_color")?,
            rating: selector(".star-rating")?,
            availability: selector(".availability")?,
            next_link: selector(".pager .next a, li.next a")?,
        })
    }

    pub fn parse(&self, html: &Html, page_url: &str) -> ParseResult<ListingPage> {
        let mut entries = Vec::new();

        for (index, element) in html.select(&self.entry).enumerate() {
            match self.parse_entry(&element, page_url) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(index, page_url, error = %e, "skipping listing entry");
                }
            }
        }

        let next_url = html
            .select(&self.next_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_url(page_url, href).ok());

        debug!(
            page_url,
            entries = entries.len(),
            has_next = next_url.is_some(),
            "parsed listing page"
        );

        Ok(ListingPage { entries, next_url })
    }

    fn parse_entry(&self, element: &ElementRef, page_url: &str) -> ParseResult<ListingEntry> {
        let link = element
            .select(&self.link)
            .next()
            .ok_or(super::ParseError::MissingField {
                field: "detail_link",
                context: "listing entry",
            })?;

        let href = link
            .value()
            .attr("href")
            .ok_or(super::ParseError::MissingField {
                field: "href",
                context: "listing entry",
            })?;
        let detail_url = resolve_url(page_url, href)?;

        // The anchor's title attribute carries the full name; the anchor
        // text is truncated on the listing page.
        let title = link
            .value()
            .attr("title")
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                let text = clean_text(&link.text().collect::<String>());
                (!text.is_empty()).then_some(text)
            })
            .ok_or(super::ParseError::MissingField {
                field: "title",
                context: "listing entry",
            })?;

        let price_text = element
            .select(&self.price)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let rating_token = element
            .select(&self.rating)
            .next()
            .and_then(|e| star_token(&e));

        let availability_text = element
            .select(&self.availability)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        Ok(ListingEntry {
            title,
            detail_url,
            price_text,
            rating_token,
            availability_text,
        })
    }
}

/// The star count is encoded as a class next to `star-rating`,
/// e.g. `class="star-rating Three"`.
pub(crate) fn star_token(element: &ElementRef) -> Option<String> {
    element
        .value()
        .classes()
        .find(|class| *class != "star-rating")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <ol class="row">
          <li><article class="product_pod">
            <h3><a href="catalogue/a-light-in-the-attic_1000/index.html"
                   title="A Light in the Attic">A Light in the ...</a></h3>
            <p class="star-rating Three"></p>
            <div class="product_price">
              <p class="price_color">£51.77</p>
              <p class="instock availability">In stock</p>
            </div>
          </article></li>
          <li><article class="product_pod">
            <h3><a href="catalogue/tipping-the-velvet_999/index.html"
                   title="Tipping the Velvet">Tipping the ...</a></h3>
            <p class="star-rating One"></p>
            <div class="product_price">
              <p class="price_color">£53.74</p>
              <p class="instock availability">In stock</p>
            </div>
          </article></li>
        </ol>
        <ul class="pager"><li class="next"><a href="catalogue/page-2.html">next</a></li></ul>
        </body></html>
    "#;

    #[test]
    fn parses_entries_and_next_link() {
        let parser = ListingParser::new().unwrap();
        let html = Html::parse_document(LISTING);
        let page = parser.parse(&html, "https://books.example/index.html").unwrap();

        assert_eq!(page.entries.len(), 2);
        let first = &page.entries[0];
        assert_eq!(first.title, "A Light in the Attic");
        assert_eq!(
            first.detail_url,
            "https://books.example/catalogue/a-light-in-the-attic_1000/index.html"
        );
        assert_eq!(first.price_text.as_deref(), Some("£51.77"));
        assert_eq!(first.rating_token.as_deref(), Some("Three"));
        assert_eq!(first.availability_text.as_deref(), Some("In stock"));
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://books.example/catalogue/page-2.html")
        );
    }

    #[test]
    fn entry_without_link_is_skipped() {
        let parser = ListingParser::new().unwrap();
        let html = Html::parse_document(
            r#"<article class="product_pod"><h3>No link here</h3></article>"#,
        );
        let page = parser.parse(&html, "https://books.example/").unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next_url.is_none());
    }
}
