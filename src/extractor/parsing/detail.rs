//! Detail-page parser
//!
//! Extracts the full attribute set from one product detail page:
//! description, category breadcrumb, review count, availability, image
//! URL. Only the title is required; everything else degrades to `None`.

use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::list::star_token;
use super::{ParseError, ParseResult, clean_text, resolve_url, selector};

/// Attributes parsed from a product detail page.
#[derive(Debug, Clone, Default)]
pub struct DetailPage {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub rating_token: Option<String>,
    pub availability_text: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub review_count: Option<u32>,
}

/// Parser for product detail pages, selectors compiled once.
pub struct DetailParser {
    title: Selector,
    price: Selector,
    rating: Selector,
    availability: Selector,
    description: Selector,
    breadcrumb: Selector,
    image: Selector,
    info_row: Selector,
    cell: Selector,
    count_re: Regex,
}

impl DetailParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: selector(".product_main h1")?,
            price: selector(".product_main .price_color")?,
            rating: selector(".product_main .star-rating")?,
            availability: selector(".product_main .availability")?,
            description: selector("#product_description + p")?,
            breadcrumb: selector(".breadcrumb li a")?,
            image: selector(".item.active img, #product_gallery img")?,
            info_row: selector("table.table-striped tr")?,
            cell: selector("th, td")?,
            count_re: Regex::new(r"(\d+)")?,
        })
    }

    pub fn parse(&self, html: &Html, page_url: &str) -> ParseResult<DetailPage> {
        // A page without the main product block is not a product page at
        // all; surface that instead of returning an all-None record.
        let title = html
            .select(&self.title)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingField {
                field: "title",
                context: "product detail page",
            })?;

        let price_text = html
            .select(&self.price)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let rating_token = html.select(&self.rating).next().and_then(|e| star_token(&e));

        let availability_text = html
            .select(&self.availability)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let description = html
            .select(&self.description)
            .next()
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        // Breadcrumb reads Home / Books / <category> / <title>; the third
        // crumb is the category.
        let category = html
            .select(&self.breadcrumb)
            .nth(2)
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let image_url = html
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| resolve_url(page_url, src).ok());

        let review_count = self.extract_review_count(html);

        debug!(page_url, title = %title, "parsed detail page");

        Ok(DetailPage {
            title: Some(title),
            price_text,
            rating_token,
            availability_text,
            description,
            category,
            image_url,
            review_count,
        })
    }

    /// Review count lives in the product information table.
    fn extract_review_count(&self, html: &Html) -> Option<u32> {
        for row in html.select(&self.info_row) {
            let cells: Vec<_> = row.select(&self.cell).collect();
            if cells.len() < 2 {
                continue;
            }
            let key = clean_text(&cells[0].text().collect::<String>()).to_lowercase();
            if key.contains("review") {
                let value = clean_text(&cells[1].text().collect::<String>());
                return self
                    .count_re
                    .captures(&value)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"
        <html><body>
        <ul class="breadcrumb">
          <li><a href="/">Home</a></li>
          <li><a href="/books">Books</a></li>
          <li><a href="/books/poetry">Poetry</a></li>
          <li class="active">A Light in the Attic</li>
        </ul>
        <div id="product_gallery">
          <div class="item active"><img src="../../media/cache/fe/72/cover.jpg"/></div>
        </div>
        <div class="product_main">
          <h1>A Light in the Attic</h1>
          <p class="price_color">£51.77</p>
          <p class="instock availability"><i class="icon-ok"></i> In stock (22 available)</p>
          <p class="star-rating Three"></p>
        </div>
        <div id="product_description"><h2>Product Description</h2></div>
        <p>It's hard to imagine a world without A Light in the Attic.</p>
        <table class="table table-striped">
          <tr><th>UPC</th><td>a897fe39b1053632</td></tr>
          <tr><th>Availability</th><td>In stock (22 available)</td></tr>
          <tr><th>Number of reviews</th><td>0</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn parses_full_detail_page() {
        let parser = DetailParser::new().unwrap();
        let html = Html::parse_document(DETAIL);
        let page = parser
            .parse(&html, "https://books.example/catalogue/a_1000/index.html")
            .unwrap();

        assert_eq!(page.title.as_deref(), Some("A Light in the Attic"));
        assert_eq!(page.price_text.as_deref(), Some("£51.77"));
        assert_eq!(page.rating_token.as_deref(), Some("Three"));
        assert_eq!(
            page.availability_text.as_deref(),
            Some("In stock (22 available)")
        );
        assert_eq!(page.category.as_deref(), Some("Poetry"));
        assert!(
            page.description
                .as_deref()
                .is_some_and(|d| d.starts_with("It's hard to imagine"))
        );
        assert_eq!(
            page.image_url.as_deref(),
            Some("https://books.example/media/cache/fe/72/cover.jpg")
        );
        assert_eq!(page.review_count, Some(0));
    }

    #[test]
    fn page_without_product_block_is_an_error() {
        let parser = DetailParser::new().unwrap();
        let html = Html::parse_document("<html><body><h1></h1></body></html>");
        let err = parser.parse(&html, "https://books.example/x").unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "title", .. }));
    }
}
