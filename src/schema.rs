use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ------------------------------------------------------------
// Listing draft
// ------------------------------------------------------------
//
// What an adapter produces for a single posting.
//
// Ownership (`source_id`) and freshness (`last_seen_at`) are
// deliberately absent: the store stamps both when the draft is
// persisted, overriding anything an adapter might believe.
//
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ListingDraft {
    /// Job title as displayed by the source
    pub title: String,

    /// Free-form description (may be long)
    pub description: String,

    /// Canonical posting URL
    ///
    /// IMPORTANT:
    /// - Unique across the whole store
    /// - A second draft with the same URL overwrites the first
    pub url: String,

    /// Location text as published by the source
    pub location: String,

    /// Publication time, when the source exposes one
    pub posted_at: Option<DateTime<Utc>>,
}

// ------------------------------------------------------------
// Listing record
// ------------------------------------------------------------
//
// A persisted posting. Only the store creates these.
//
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub title: String,
    pub description: String,

    /// Id of the source that most recently wrote this URL
    pub source_id: String,

    pub url: String,
    pub location: String,
    pub posted_at: Option<DateTime<Utc>>,

    /// Ingestion time of the most recent write, never decreases per URL
    pub last_seen_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn stamp(draft: &ListingDraft, source_id: &str, last_seen_at: DateTime<Utc>) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            source_id: source_id.to_string(),
            url: draft.url.clone(),
            location: draft.location.clone(),
            posted_at: draft.posted_at,
            last_seen_at,
        }
    }
}

// ------------------------------------------------------------
// Raw payload
// ------------------------------------------------------------
//
// Opaque result of `SourceAdapter::fetch`, handed unchanged to
// `SourceAdapter::parse`.
//
// - Text:  one response body (HTML or JSON)
// - Pages: several bodies, for sources that paginate
//
#[derive(Debug, Clone)]
pub enum RawPayload {
    Text(String),
    Pages(Vec<String>),
}

impl RawPayload {
    /// Returns the single body of a `Text` payload.
    pub fn text(&self) -> Result<&str, ParseError> {
        match self {
            RawPayload::Text(body) => Ok(body),
            RawPayload::Pages(_) => Err(ParseError::UnexpectedPayload {
                expected: "single document",
            }),
        }
    }

    /// Iterates over every body, whatever the variant.
    pub fn pages(&self) -> impl Iterator<Item = &str> {
        let bodies: &[String] = match self {
            RawPayload::Text(body) => std::slice::from_ref(body),
            RawPayload::Pages(pages) => pages,
        };
        bodies.iter().map(String::as_str)
    }

    /// Decodes a `Text` payload as JSON.
    pub fn json(&self) -> Result<serde_json::Value, ParseError> {
        Ok(serde_json::from_str(self.text()?)?)
    }
}

// ------------------------------------------------------------
// Parsed listings
// ------------------------------------------------------------
//
// Result of a structurally successful parse. `dropped` counts
// entries that were skipped because a required field was
// missing or malformed.
//
#[derive(Debug, Default, Clone)]
pub struct ParsedListings {
    pub records: Vec<ListingDraft>,
    pub dropped: usize,
}
