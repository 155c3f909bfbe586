use serde_json::Value;

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, SourceAdapter};

const FEED_URL: &str = "https://akunacapital.com/wp-admin/admin-ajax.php\
                        ?action=gh_ajax_request&experience=&department=&location=&search_term=";
const DETAIL_URL: &str = "https://akunacapital.com/job-details?gh_jid=";

/// Akuna Capital (Greenhouse proxied through WordPress AJAX)
///
/// Payload: `{ "matched_jobs": [ ... ] }`
///
/// Required per entry: `id`, `name`.
/// `location` is an array; the first element is used.
pub struct AkunaCapitalAdapter;

#[async_trait::async_trait]
impl SourceAdapter for AkunaCapitalAdapter {

    fn name(&self) -> &'static str {
        "akuna_capital"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        Ok(RawPayload::Text(http.get_text(FEED_URL).await?))
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let v = raw.json()?;
        let jobs = v
            .get("matched_jobs")
            .and_then(|j| j.as_array())
            .ok_or(ParseError::MissingContainer("matched_jobs"))?;

        Ok(collect_listings(self.name(), jobs, parse_job))
    }
}

fn parse_job(job: &Value) -> Result<ListingDraft, RecordFieldError> {
    let id = match job.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(RecordFieldError::Missing("id")),
    };
    let title = util::require_str(job, "name")?;

    let location = job
        .get("location")
        .and_then(|l| l.as_array())
        .and_then(|l| l.first())
        .and_then(|l| l.as_str())
        .unwrap_or_default();

    Ok(ListingDraft {
        title: util::clean_text(title),
        description: format!(
            "Departments: {}\nSpecialties: {}",
            util::join_str_array(job, "department", ", "),
            util::join_str_array(job, "specialties", ", "),
        ),
        url: format!("{DETAIL_URL}{id}"),
        location: util::clean_text(location),
        posted_at: None,
    })
}
