use scraper::{ElementRef, Html, Selector};

use crate::{
    error::{FetchError, ParseError, RecordFieldError},
    http_client::HttpFetcher,
    schema::{ListingDraft, ParsedListings, RawPayload},
    util,
};

use super::adapter::{collect_listings, fetch_paginated, merge_pages, SourceAdapter};

const BOARD_URL: &str = "https://job-boards.greenhouse.io/embed/job_board?for=towerresearchcapital";

/// Tower Research Capital (Greenhouse embedded job board)
///
/// - Page count: buttons inside `div.pagination-wrapper`
/// - Page n:     `{BOARD_URL}&page={n}`
/// - Jobs are grouped per department: `div.job-posts--table--department`
///   with an `h3` name and one `tr.job-post` per job
pub struct TowerResearchAdapter;

struct PostSelectors {
    link: Selector,
    title: Selector,
    location: Selector,
}

#[async_trait::async_trait]
impl SourceAdapter for TowerResearchAdapter {

    fn name(&self) -> &'static str {
        "tower_research"
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<RawPayload, FetchError> {
        fetch_paginated(
            http,
            self.name(),
            BOARD_URL,
            "div.pagination-wrapper li button",
            |page| format!("{BOARD_URL}&page={page}"),
        )
        .await
    }

    fn parse(&self, raw: &RawPayload) -> Result<ParsedListings, ParseError> {
        let departments = util::selector("div.job-posts--table--department")?;
        let heading = util::selector("h3")?;
        let posts = util::selector("tr.job-post")?;
        let sel = PostSelectors {
            link: util::selector("a")?,
            title: util::selector("p.body--medium")?,
            location: util::selector("p.body__secondary")?,
        };

        let mut pages = Vec::new();
        for body in raw.pages() {
            let doc = Html::parse_document(body);

            for department in doc.select(&departments) {
                let name = util::select_text(department, &heading).unwrap_or_default();
                let jobs = department.select(&posts);
                pages.push(collect_listings(self.name(), jobs, |post| {
                    parse_post(post, &name, &sel)
                }));
            }
        }

        Ok(merge_pages(pages))
    }
}

fn parse_post(
    post: ElementRef<'_>,
    department: &str,
    sel: &PostSelectors,
) -> Result<ListingDraft, RecordFieldError> {
    let link = post
        .select(&sel.link)
        .next()
        .ok_or(RecordFieldError::Missing("url"))?;
    let href = link
        .value()
        .attr("href")
        .filter(|h| !h.trim().is_empty())
        .ok_or(RecordFieldError::Missing("url"))?;
    let title = util::require_text(link, &sel.title, "title")?;
    let location = util::select_text(link, &sel.location).unwrap_or_default();

    Ok(ListingDraft {
        description: format!("{department}: {title}"),
        title,
        url: href.trim().to_string(),
        location,
        posted_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_departments_across_pages() {
        let first = r#"
            <div class="job-posts--table--department">
              <h3>Engineering</h3>
              <table>
                <tr class="job-post"><td>
                  <a href="https://job-boards.greenhouse.io/towerresearchcapital/jobs/1">
                    <p class="body--medium">C++ Developer</p>
                    <p class="body__secondary">New York</p>
                  </a>
                </td></tr>
                <tr class="job-post"><td><p class="body--medium">Orphan</p></td></tr>
              </table>
            </div>"#;
        let second = r#"
            <div class="job-posts--table--department">
              <h3>Trading</h3>
              <table>
                <tr class="job-post"><td>
                  <a href="https://job-boards.greenhouse.io/towerresearchcapital/jobs/2">
                    <p class="body--medium">Quant Trader</p>
                    <p class="body__secondary">Singapore</p>
                  </a>
                </td></tr>
              </table>
            </div>"#;

        let parsed = TowerResearchAdapter
            .parse(&RawPayload::Pages(vec![first.into(), second.into()]))
            .unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.dropped, 1);
        assert_eq!(parsed.records[0].description, "Engineering: C++ Developer");
        assert_eq!(parsed.records[1].location, "Singapore");
    }
}
