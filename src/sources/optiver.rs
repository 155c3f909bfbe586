use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, fetch_paginated, merge_pages, SourceAdapter};

const CAREERS_URL: &str = "https://optiver.com/working-at-optiver/career-opportunities/";
const ORIGIN: &str = "https://optiver.com";

/// Optiver career opportunities (WordPress, paginated)
///
/// - Page count: numeric `div.pagination a.page-numbers` links
/// - Page n:     `{CAREERS_URL}page/{n}/`
/// - Container:  `ul.result-list` inside `div.result.items`, one `li` per job
///
/// The location paragraph reads "Department • City"; a missing
/// location paragraph drops the job.
pub struct OptiverAdapter;

struct ItemSelectors {
    title_link: Selector,
    location: Selector,
    role_type: Selector,
    summary: Selector,
    footer: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for OptiverAdapter {

    fn name(&self) -> &'static str {
        "optiver"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        fetch_paginated(
            http,
            self.name(),
            CAREERS_URL,
            "div.pagination a.page-numbers",
            |page| format!("{CAREERS_URL}page/{page}/"),
        )
        .await
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let container = util::selector("div.result.items ul.result-list")?;
        let items = util::selector("li")?;
        let sel = ItemSelectors {
            title_link: util::selector("h5 a")?,
            location: util::selector("p.text-s")?,
            role_type: util::selector("p.text-term")?,
            summary: util::selector("main span")?,
            footer: util::selector("footer")?,
        };

        let mut pages = Vec::new();
        for body in raw.pages() {
            let doc = Html::parse_document(body);
            let list = doc
                .select(&container)
                .next()
                .ok_or(ParseError::MissingContainer("ul.result-list"))?;

            // direct children only: nested lists inside a card are not jobs
            let jobs = list
                .select(&items)
                .filter(|li| li.parent().map(|p| p.id()) == Some(list.id()));

            pages.push(collect_listings(self.name(), jobs, |li| parse_item(li, &sel)));
        }

        Ok(merge_pages(pages))
    }
}

fn parse_item(item: ElementRef<'_>, sel: &ItemSelectors) -> Result<ListingDraft, RecordFieldError> {
    let link = item
        .select(&sel.title_link)
        .next()
        .ok_or(RecordFieldError::Missing("title"))?;
    let title = util::element_text(link);
    if title.is_empty() {
        return Err(RecordFieldError::Missing("title"));
    }
    let href = link
        .value()
        .attr("href")
        .filter(|h| !h.trim().is_empty())
        .ok_or(RecordFieldError::Missing("url"))?;

    let location_line = util::select_text(item, &sel.location)
        .ok_or(RecordFieldError::Missing("location"))?;
    let mut parts = location_line.split('•').map(str::trim);
    let department = parts.next().unwrap_or_default().to_string();
    let location = parts.next().unwrap_or_default().to_string();

    let mut description = Vec::new();
    if let Some(role_type) = util::select_text(item, &sel.role_type).filter(|r| !r.is_empty()) {
        description.push(format!("{role_type}: {department}"));
    }
    description.extend(
        [&sel.summary, &sel.footer]
            .into_iter()
            .filter_map(|s| util::select_text(item, s))
            .filter(|t| !t.is_empty()),
    );

    Ok(ListingDraft {
        title,
        description: description.join("\n"),
        url: util::absolute_url(ORIGIN, href),
        location,
        posted_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: &str) -> String {
        format!(
            r#"<html><body>
               <div class="result items items-viewmode-list">
                 <ul class="result-list">{items}</ul>
               </div>
               </body></html>"#
        )
    }

    const TRADER: &str = r#"
        <li class="php-result-item"><div>
          <p class="text-term">Graduate</p>
          <h5 class="h5"><a href="https://optiver.com/working-at-optiver/career-opportunities/123/">Graduate Trader</a></h5>
          <p class="text-s">Trading • Amsterdam</p>
          <main><span>Start your career on the trading floor</span></main>
          <footer>Apply by March</footer>
        </div></li>"#;

    const BROKEN: &str = r#"
        <li class="php-result-item"><div>
          <h5 class="h5"><a href="/x/">No location</a></h5>
        </div></li>"#;

    const ENGINEER: &str = r#"
        <li class="php-result-item"><div>
          <h5 class="h5"><a href="/working-at-optiver/career-opportunities/456/">Software Engineer</a></h5>
          <p class="text-s">Technology • Sydney</p>
        </div></li>"#;

    #[test]
    fn parses_all_pages() {
        let raw = RawPayload::Pages(vec![
            page(&format!("{TRADER}{BROKEN}")),
            page(ENGINEER),
        ]);

        let parsed = OptiverAdapter.parse(&raw).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.dropped, 1);

        let trader = &parsed.records[0];
        assert_eq!(trader.location, "Amsterdam");
        assert_eq!(
            trader.description,
            "Graduate: Trading\nStart your career on the trading floor\nApply by March"
        );

        let engineer = &parsed.records[1];
        assert_eq!(
            engineer.url,
            "https://optiver.com/working-at-optiver/career-opportunities/456/"
        );
        assert_eq!(engineer.description, "");
    }

    #[test]
    fn page_without_result_list_is_structural_error() {
        let raw = RawPayload::Pages(vec![page(ENGINEER), "<html><body></body></html>".into()]);

        assert!(matches!(
            OptiverAdapter.parse(&raw),
            Err(ParseError::MissingContainer("ul.result-list"))
        ));
    }
}
