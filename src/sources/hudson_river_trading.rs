use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const CAREERS_URL: &str = "https://www.hudsonrivertrading.com/careers/";
const ORIGIN: &str = "https://www.hudsonrivertrading.com";

/// Hudson River Trading careers page (server-rendered HTML)
///
/// Container: `table.jobs-container`, one `tr.job-row` per job.
/// Links are frequently protocol-relative ("//...").
pub struct HudsonRiverTradingAdapter;

struct RowSelectors {
    title: Selector,
    link: Selector,
    location: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for HudsonRiverTradingAdapter {

    fn name(&self) -> &'static str {
        "hudson_river_trading"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(CAREERS_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let doc = Html::parse_document(raw.text()?);

        let table = doc
            .select(&util::selector("table.jobs-container")?)
            .next()
            .ok_or(ParseError::MissingContainer("table.jobs-container"))?;

        let sel = RowSelectors {
            title: util::selector("span.job-title")?,
            link: util::selector("a.job-url")?,
            location: util::selector("span.job-location-name")?,
        };
        let row_sel = util::selector("tr.job-row")?;
        let rows = table.select(&row_sel);

        Ok(collect_listings(self.name(), rows, |row| parse_row(row, &sel)))
    }
}

fn parse_row(row: ElementRef<'_>, sel: &RowSelectors) -> Result<ListingDraft, RecordFieldError> {
    let title = util::require_text(row, &sel.title, "title")?;
    let location = util::require_text(row, &sel.location, "location")?;
    let href = row
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.trim().is_empty())
        .ok_or(RecordFieldError::Missing("url"))?;

    Ok(ListingDraft {
        description: title.clone(),
        title,
        url: util::absolute_url(ORIGIN, href),
        location,
        posted_at: None,
    })
}
