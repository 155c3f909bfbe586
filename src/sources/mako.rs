use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const OPPORTUNITIES_URL: &str = "https://www.mako.com/opportunities";
const ORIGIN: &str = "https://www.mako.com";

/// Mako opportunities page
///
/// One `div.job-entry` per opening. A page with no entries is a
/// legitimate "no open roles" state and clears the source.
pub struct MakoAdapter;

struct EntrySelectors {
    title: Selector,
    link: Selector,
    location: Selector,
    department: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for MakoAdapter {

    fn name(&self) -> &'static str {
        "mako"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(OPPORTUNITIES_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let doc = Html::parse_document(raw.text()?);

        let sel = EntrySelectors {
            title: util::selector("h3.job-heading")?,
            link: util::selector("div.job-button a")?,
            location: util::selector(".is_location")?,
            department: util::selector(".is_dept")?,
        };
        let entry_sel = util::selector("div.job-entry")?;
        let entries = doc.select(&entry_sel);

        Ok(collect_listings(self.name(), entries, |entry| parse_entry(entry, &sel)))
    }
}

fn parse_entry(entry: ElementRef<'_>, sel: &EntrySelectors) -> Result<ListingDraft, RecordFieldError> {
    let title = util::require_text(entry, &sel.title, "title")?;
    let href = entry
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.trim().is_empty())
        .ok_or(RecordFieldError::Missing("url"))?;

    let department = util::select_text(entry, &sel.department)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "Not specified".to_string());

    Ok(ListingDraft {
        title,
        description: format!("Department: {department}"),
        url: util::absolute_url(ORIGIN, href),
        location: util::select_text(entry, &sel.location).unwrap_or_default(),
        posted_at: None,
    })
}
