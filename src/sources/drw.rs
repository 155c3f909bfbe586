use serde_json::Value;

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

/// Next.js data route. The build id in the path changes on every
/// site deploy, which surfaces as a 404 fetch failure.
const DATA_URL: &str =
    "https://www.drw.com/_next/data/1yGTclpSCHJEPY4c5Gt8q/en/work-at-drw/listings.json";
const LISTING_URL: &str = "https://www.drw.com/work-at-drw/listings";

/// DRW (Next.js page data)
///
/// Payload: `{ "pageProps": { "jobData": { "en": [ ... ] } } }`
///
/// Required per entry: `slug`, `job_title`.
pub struct DrwAdapter;

#[async_trait::async_trait]
impl SourceAdapter for DrwAdapter {

    fn name(&self) -> &'static str {
        "drw"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(DATA_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let v = raw.json()?;
        let jobs = v
            .pointer("/pageProps/jobData/en")
            .and_then(|j| j.as_array())
            .ok_or(ParseError::MissingContainer("pageProps.jobData.en"))?;

        Ok(collect_listings(self.name(), jobs, parse_job))
    }
}

fn parse_job(job: &Value) -> Result<ListingDraft, RecordFieldError> {
    let slug = util::require_str(job, "slug")?;
    let title = util::clean_text(util::require_str(job, "job_title")?);

    let category = job
        .get("career_categories")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.as_str())
        .unwrap_or_default();

    let description = if category.is_empty() {
        title.clone()
    } else {
        format!("{category} - {title}")
    };

    Ok(ListingDraft {
        title,
        description,
        url: format!("{LISTING_URL}/{slug}"),
        location: util::join_str_array(job, "locations", ", "),
        posted_at: None,
    })
}
