use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use redis::aio::MultiplexedConnection;
use redis::Script;
use serde::Serialize;

use crate::error::StorageError;
use crate::schema::{ListingDraft, ListingRecord};

use super::ListingStore;

/// ============================================================
/// Key layout
/// ============================================================
///
/// {prefix}:listing:{url}        HASH  one listing, unique per URL
/// {prefix}:source:{id}:seen     ZSET  URLs owned by a source,
///                                     scored by last_seen_at (ms)
/// {prefix}:sources              SET   every source id ever written
///
/// The sorted set makes the freshness query a single ZRANGE 0 0.

/// Replace protocol as one server-side script.
///
/// Redis runs a script to completion without interleaving other
/// commands, so no client ever sees a half-replaced source. The
/// batch is validated before the first write; a rejected batch
/// leaves the store untouched.
///
/// ARGV: prefix, source_id, now_ms, JSON array of listings
const REPLACE_SCRIPT: &str = r#"
local prefix = ARGV[1]
local source = ARGV[2]
local now = tonumber(ARGV[3])
local ok, records = pcall(cjson.decode, ARGV[4])
if not ok or type(records) ~= 'table' then
  return redis.error_reply('invalid listing batch')
end
for i, rec in ipairs(records) do
  if type(rec.url) ~= 'string' or rec.url == '' then
    return redis.error_reply('listing ' .. i .. ' has no url')
  end
end

local function listing_key(url) return prefix .. ':listing:' .. url end
local function seen_key(id) return prefix .. ':source:' .. id .. ':seen' end

local previous = {}
for _, rec in ipairs(records) do
  local found = redis.call('HMGET', listing_key(rec.url), 'source_id', 'last_seen_at')
  if found[1] then
    previous[rec.url] = { owner = found[1], stamp = tonumber(found[2]) }
  end
end

local mine = seen_key(source)
for _, url in ipairs(redis.call('ZRANGE', mine, 0, -1)) do
  redis.call('DEL', listing_key(url))
end
redis.call('DEL', mine)

for _, rec in ipairs(records) do
  local stamp = now
  local prev = previous[rec.url]
  if prev then
    if prev.owner ~= source then
      redis.call('ZREM', seen_key(prev.owner), rec.url)
    end
    if prev.stamp and prev.stamp > stamp then
      stamp = prev.stamp
    end
  end
  local stamp_str = string.format('%d', stamp)
  redis.call('HSET', listing_key(rec.url),
    'title', rec.title,
    'description', rec.description,
    'source_id', source,
    'url', rec.url,
    'location', rec.location,
    'posted_at', rec.posted_at,
    'last_seen_at', stamp_str)
  redis.call('ZADD', mine, stamp_str, rec.url)
end

redis.call('SADD', prefix .. ':sources', source)
return #records
"#;

/// Bulk delete of every listing of every source.
///
/// ARGV: prefix
const PURGE_SCRIPT: &str = r#"
local prefix = ARGV[1]
local sources_key = prefix .. ':sources'
local removed = 0
for _, id in ipairs(redis.call('SMEMBERS', sources_key)) do
  local seen = prefix .. ':source:' .. id .. ':seen'
  for _, url in ipairs(redis.call('ZRANGE', seen, 0, -1)) do
    removed = removed + redis.call('DEL', prefix .. ':listing:' .. url)
  end
  redis.call('DEL', seen)
end
redis.call('DEL', sources_key)
return removed
"#;

/// Listing as shipped to the replace script.
///
/// Every field is a plain string: Lua's cjson turns JSON null into
/// a sentinel that HSET rejects, so a missing `posted_at` is "".
#[derive(Debug, Serialize)]
struct WireListing<'a> {
    title: &'a str,
    description: &'a str,
    url: &'a str,
    location: &'a str,
    posted_at: String,
}

impl<'a> From<&'a ListingDraft> for WireListing<'a> {
    fn from(draft: &'a ListingDraft) -> Self {
        Self {
            title: &draft.title,
            description: &draft.description,
            url: &draft.url,
            location: &draft.location,
            posted_at: draft
                .posted_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

fn encode_batch(drafts: &[ListingDraft]) -> Result<String, StorageError> {
    let batch: Vec<WireListing<'_>> = drafts.iter().map(WireListing::from).collect();
    Ok(serde_json::to_string(&batch)?)
}

/// Rebuilds a record from its HGETALL map.
fn decode_listing(url: &str, mut fields: HashMap<String, String>) -> Result<ListingRecord, StorageError> {
    let corrupt = |reason: &str| StorageError::Corrupt {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let last_seen_ms: i64 = fields
        .get("last_seen_at")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| corrupt("missing last_seen_at"))?;
    let last_seen_at =
        DateTime::from_timestamp_millis(last_seen_ms).ok_or_else(|| corrupt("last_seen_at out of range"))?;

    let posted_at = match fields.get("posted_at").map(String::as_str) {
        None | Some("") => None,
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| corrupt("invalid posted_at"))?
                .with_timezone(&Utc),
        ),
    };

    let source_id = fields
        .remove("source_id")
        .ok_or_else(|| corrupt("missing source_id"))?;

    Ok(ListingRecord {
        title: fields.remove("title").unwrap_or_default(),
        description: fields.remove("description").unwrap_or_default(),
        source_id,
        url: url.to_string(),
        location: fields.remove("location").unwrap_or_default(),
        posted_at,
        last_seen_at,
    })
}

/// ============================================================
/// RedisListingStore
/// ============================================================
///
/// Production listing store.
///
/// THREADING:
/// - The multiplexed connection is cloned per call; clones share
///   one socket and are safe to use from concurrent tasks
/// - Replaces of different sources never touch the same keys,
///   except when a URL moves between sources (handled in-script)
pub struct RedisListingStore {
    con: MultiplexedConnection,
    prefix: String,
    replace_script: Script,
    purge_script: Script,
}

impl RedisListingStore {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let con = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            con,
            prefix: prefix.to_string(),
            replace_script: Script::new(REPLACE_SCRIPT),
            purge_script: Script::new(PURGE_SCRIPT),
        })
    }

    fn listing_key(&self, url: &str) -> String {
        format!("{}:listing:{}", self.prefix, url)
    }

    fn seen_key(&self, source_id: &str) -> String {
        format!("{}:source:{}:seen", self.prefix, source_id)
    }
}

#[async_trait::async_trait]
impl ListingStore for RedisListingStore {
    async fn replace(
        &self,
        source_id: &str,
        drafts: &[ListingDraft],
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let payload = encode_batch(drafts)?;
        let mut con = self.con.clone();

        let written: usize = self
            .replace_script
            .arg(&self.prefix)
            .arg(source_id)
            .arg(now.timestamp_millis())
            .arg(payload)
            .invoke_async(&mut con)
            .await?;

        debug!("[{}] replaced stored set with {} listings", source_id, written);
        Ok(written)
    }

    async fn oldest_seen(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let mut con = self.con.clone();

        let oldest: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(self.seen_key(source_id))
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .query_async(&mut con)
            .await?;

        Ok(oldest
            .first()
            .and_then(|(_, score)| DateTime::from_timestamp_millis(*score as i64)))
    }

    async fn listings_for(&self, source_id: &str) -> Result<Vec<ListingRecord>, StorageError> {
        let mut con = self.con.clone();

        let mut urls: Vec<String> = redis::cmd("ZRANGE")
            .arg(self.seen_key(source_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut con)
            .await?;
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        urls.sort();

        let mut pipe = redis::pipe();
        for url in &urls {
            pipe.cmd("HGETALL").arg(self.listing_key(url));
        }
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut con).await?;

        urls.iter()
            .zip(hashes)
            .map(|(url, fields)| decode_listing(url, fields))
            .collect()
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        let mut con = self.con.clone();

        let removed: usize = self
            .purge_script
            .arg(&self.prefix)
            .invoke_async(&mut con)
            .await?;

        Ok(removed)
    }
}
