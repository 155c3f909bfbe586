use chrono::DateTime;
use serde_json::Value;

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const API_URL: &str = "https://mlp.eightfold.ai/api/apply/v2/jobs/755942822827/jobs?domain=mlp.com";

/// Millennium (Eightfold ATS API)
///
/// Payload: `{ "positions": [ ... ] }`
///
/// Required per entry: `name`, `canonicalPositionUrl`.
/// `t_create` is a Unix timestamp in seconds.
pub struct MillenniumAdapter;

#[async_trait::async_trait]
impl SourceAdapter for MillenniumAdapter {

    fn name(&self) -> &'static str {
        "millennium"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(API_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let v = raw.json()?;
        let positions = v
            .get("positions")
            .and_then(|p| p.as_array())
            .ok_or(ParseError::MissingContainer("positions"))?;

        Ok(collect_listings(self.name(), positions, parse_position))
    }
}

fn parse_position(pos: &Value) -> Result<ListingDraft, RecordFieldError> {
    let title = util::require_str(pos, "name")?;
    let url = util::require_str(pos, "canonicalPositionUrl")?;

    let posted_at = match pos.get("t_create") {
        None | Some(Value::Null) => None,
        Some(t) => {
            let secs = t.as_i64().ok_or_else(|| RecordFieldError::Invalid {
                field: "t_create",
                reason: format!("not an integer timestamp: {t}"),
            })?;
            Some(DateTime::from_timestamp(secs, 0).ok_or_else(|| RecordFieldError::Invalid {
                field: "t_create",
                reason: format!("timestamp out of range: {secs}"),
            })?)
        }
    };

    Ok(ListingDraft {
        title: util::clean_text(title),
        description: util::html_to_text(util::optional_str(pos, "job_description")),
        url: url.to_string(),
        location: util::clean_text(util::optional_str(pos, "location")),
        posted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positions_with_creation_time() {
        let raw = RawPayload::Text(
            r#"{
                "positions": [
                    {
                        "name": "Portfolio Manager",
                        "canonicalPositionUrl": "https://mlp.eightfold.ai/careers/job/1",
                        "location": "New York, NY",
                        "job_description": "<div>Manage risk</div>",
                        "t_create": 1736035200
                    },
                    {
                        "name": "Bad timestamp",
                        "canonicalPositionUrl": "https://mlp.eightfold.ai/careers/job/2",
                        "t_create": "yesterday"
                    },
                    {
                        "name": "No date",
                        "canonicalPositionUrl": "https://mlp.eightfold.ai/careers/job/3"
                    }
                ]
            }"#
            .into(),
        );

        let parsed = MillenniumAdapter.parse(&raw).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.dropped, 1);
        assert_eq!(parsed.records[0].description, "Manage risk");
        assert_eq!(
            parsed.records[0].posted_at.map(|t| t.timestamp()),
            Some(1_736_035_200)
        );
        assert_eq!(parsed.records[1].posted_at, None);
    }
}
