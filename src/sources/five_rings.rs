use chrono::{NaiveDate, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const CAREERS_URL: &str = "https://fiverings.com/careers/";
const ORIGIN: &str = "https://fiverings.com";

/// Five Rings careers page (Greenhouse items rendered server side)
///
/// One `div.gh-item` per opening. Location, department and level
/// are `data-*` attributes on the item; the subheading carries
/// "Posted 05-Jan-2025".
pub struct FiveRingsAdapter;

struct ItemSelectors {
    heading_link: Selector,
    subheading_spans: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for FiveRingsAdapter {

    fn name(&self) -> &'static str {
        "five_rings"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(CAREERS_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let doc = Html::parse_document(raw.text()?);

        let sel = ItemSelectors {
            heading_link: util::selector(".gh-item_heading a")?,
            subheading_spans: util::selector(".gh-item_subheading span")?,
        };
        let item_sel = util::selector("div.gh-item")?;
        let items = doc.select(&item_sel);

        Ok(collect_listings(self.name(), items, |item| parse_item(item, &sel)))
    }
}

fn parse_item(item: ElementRef<'_>, sel: &ItemSelectors) -> Result<ListingDraft, RecordFieldError> {
    let link = item
        .select(&sel.heading_link)
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

    let attr = |name: &str| util::clean_text(item.value().attr(name).unwrap_or_default());

    let posted_at = item
        .select(&sel.subheading_spans)
        .map(util::element_text)
        .find_map(|text| text.strip_prefix("Posted").map(|d| d.trim().to_string()))
        .map(|date| parse_posted(&date))
        .transpose()?;

    Ok(ListingDraft {
        title,
        description: format!(
            "Department: {} | Level: {}",
            attr("data-department"),
            attr("data-level")
        ),
        url: util::absolute_url(ORIGIN, href),
        location: attr("data-location"),
        posted_at,
    })
}

fn parse_posted(date: &str) -> Result<chrono::DateTime<Utc>, RecordFieldError> {
    let day = NaiveDate::parse_from_str(date, "%d-%b-%Y").map_err(|e| RecordFieldError::Invalid {
        field: "posted_at",
        reason: format!("{date:?}: {e}"),
    })?;

    Ok(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default()))
}
