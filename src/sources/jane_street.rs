use serde_json::Value;

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const FEED_URL: &str = "https://www.janestreet.com/jobs/main.json";
const POSITION_URL: &str = "https://www.janestreet.com/join-jane-street/position";

/// Jane Street careers feed
///
/// Payload: a top-level JSON array of positions.
///
/// Required per entry: `position`, `id`.
/// `overview` is an HTML fragment. No posting dates are published.
pub struct JaneStreetAdapter;

#[async_trait::async_trait]
impl SourceAdapter for JaneStreetAdapter {

    fn name(&self) -> &'static str {
        "jane_street"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(FEED_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let v = raw.json()?;
        let positions = v
            .as_array()
            .ok_or(ParseError::MissingContainer("top-level position array"))?;

        Ok(collect_listings(self.name(), positions, parse_position))
    }
}

fn parse_position(job: &Value) -> Result<ListingDraft, RecordFieldError> {
    let title = util::require_str(job, "position")?;

    // ids are published as numbers or strings depending on the feed version
    let id = match job.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(RecordFieldError::Missing("id")),
    };

    Ok(ListingDraft {
        title: util::clean_text(title),
        description: util::html_to_text(util::optional_str(job, "overview")),
        url: format!("{POSITION_URL}/{id}"),
        location: util::clean_text(util::optional_str(job, "city")),
        posted_at: None,
    })
}
