use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const CAREERS_URL: &str = "https://www.deshaw.com/careers/choose-your-path";
const ORIGIN: &str = "https://www.deshaw.com";

/// D. E. Shaw "choose your path" page
///
/// One `div.job` card per opening. The page always lists at least
/// one role, so a page without cards means the markup changed.
pub struct DeShawAdapter;

struct CardSelectors {
    title: Selector,
    category: Selector,
    location: Selector,
    link: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for DeShawAdapter {

    fn name(&self) -> &'static str {
        "deshaw"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(CAREERS_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let doc = Html::parse_document(raw.text()?);
        let cards: Vec<ElementRef<'_>> = doc.select(&util::selector("div.job")?).collect();

        if cards.is_empty() {
            return Err(ParseError::MissingContainer("div.job"));
        }

        let sel = CardSelectors {
            title: util::selector("span.job-display-name")?,
            category: util::selector("p.category")?,
            location: util::selector("span.location")?,
            link: util::selector("a.parent-arrow-long")?,
        };

        Ok(collect_listings(self.name(), cards, |card| parse_card(card, &sel)))
    }
}

fn parse_card(card: ElementRef<'_>, sel: &CardSelectors) -> Result<ListingDraft, RecordFieldError> {
    let title = util::require_text(card, &sel.title, "title")?;
    let href = card
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.trim().is_empty())
        .ok_or(RecordFieldError::Missing("url"))?;

    let category = util::select_text(card, &sel.category).unwrap_or_default();
    let location = util::select_text(card, &sel.location)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Remote".to_string());

    Ok(ListingDraft {
        description: format!("{category} - {title}"),
        title,
        url: util::absolute_url(ORIGIN, href),
        location,
        posted_at: None,
    })
}
