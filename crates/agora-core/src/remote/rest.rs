//! REST client for the hosted backend.
//!
//! Tables are addressed as `{base}/rest/v1/{table}` with PostgREST query
//! conventions: `select=` for projections (including nested relations),
//! `col=eq.value` filters, and upserts as `POST` with a merge preference.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::rows::{
    AssociationHeaderRow, AssociationRecord, AssociationRow, AssociationTagLink, EventRecord,
    EventRow, EventTagLink, ParticipantLink, ParticipationRow, TagRow, UserRow, ASSOCIATIONS,
    ASSOCIATION_SELECT, ASSOCIATION_TAGS, EVENTS, EVENT_PARTICIPANTS, EVENT_SELECT, EVENT_TAGS,
    TAGS, USERS,
};
use super::source::{RemoteResult, RemoteSource};
use super::RemoteError;
use crate::models::{Association, AssociationHeader, Event, Tag, UserProfile};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Timeouts surface as `RemoteError::Timeout`, which callers treat as offline.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upsert by primary key, skip echoing the rows back.
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// Insert link rows, ignoring ones that already exist.
const PREFER_INSERT_IGNORE: &str = "resolution=ignore-duplicates,return=minimal";

/// API client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestRemote {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRemote {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, RemoteError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteError::Unauthorized)?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RemoteError::Unauthorized)?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    /// Send a request, retrying rate-limited responses with exponential
    /// backoff. Any other non-success status becomes a `RemoteError`.
    async fn send(&self, request: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let attempt = request.try_clone().ok_or_else(|| {
                RemoteError::InvalidResponse(format!("{} request cannot be retried", what))
            })?;
            let response = attempt.headers(self.auth_headers()?).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }
            if status.as_u16() != 429 {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::from_status(status, &body));
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(RemoteError::RateLimited);
            }
            warn!(request = what, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        filters: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", select)])
            .query(filters);
        let text = self.send(request, table).await?.text().await?;
        debug!(table = table, bytes = text.len(), "Select response received");
        Ok(serde_json::from_str(&text)?)
    }

    async fn select_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        id: &str,
    ) -> RemoteResult<T> {
        let rows: Vec<T> = self
            .select(table, select, &[("id", eq(id)), ("limit", "1".to_string())])
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("{} {}", table, id)))
    }

    fn insert_request<B: Serialize + ?Sized>(
        &self,
        table: &str,
        rows: &B,
        prefer: &'static str,
        on_conflict: Option<&str>,
    ) -> RequestBuilder {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", prefer)
            .json(rows);
        match on_conflict {
            Some(columns) => request.query(&[("on_conflict", columns)]),
            None => request,
        }
    }

    fn delete_request(&self, table: &str, filters: &[(&str, String)]) -> RequestBuilder {
        self.client.delete(self.table_url(table)).query(filters)
    }

    async fn upsert<B: Serialize + Sync + ?Sized>(&self, table: &str, rows: &B) -> RemoteResult<()> {
        self.send(self.insert_request(table, rows, PREFER_UPSERT, None), table)
            .await?;
        Ok(())
    }

    /// Requests that make the link rows owned by `owner_id` match `tag_ids`
    /// exactly: insert the missing links, then delete every link not in
    /// the set (all of them when the set is empty).
    fn tag_link_requests<L: Serialize>(
        &self,
        table: &str,
        owner_column: &str,
        owner_id: &str,
        tag_ids: &[&str],
        links: &[L],
    ) -> Vec<RequestBuilder> {
        let mut requests = Vec::with_capacity(2);
        if !links.is_empty() {
            let on_conflict = format!("{},tag_id", owner_column);
            requests.push(self.insert_request(table, links, PREFER_INSERT_IGNORE, Some(&on_conflict)));
        }

        let mut filters = vec![(owner_column, eq(owner_id))];
        if !tag_ids.is_empty() {
            filters.push(("tag_id", not_in(tag_ids)));
        }
        requests.push(self.delete_request(table, &filters));
        requests
    }

    async fn reconcile_tag_links<L: Serialize + Sync>(
        &self,
        table: &str,
        owner_column: &str,
        owner_id: &str,
        tag_ids: &[&str],
        links: &[L],
    ) -> RemoteResult<()> {
        for request in self.tag_link_requests(table, owner_column, owner_id, tag_ids, links) {
            self.send(request, table).await?;
        }
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// `not.in.("a","b")` filter; values are quoted so commas in ids survive.
fn not_in(values: &[&str]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("not.in.({})", quoted.join(","))
}

#[async_trait]
impl RemoteSource for RestRemote {
    async fn get_event(&self, id: &str) -> RemoteResult<Event> {
        self.select_by_id::<EventRow>(EVENTS, EVENT_SELECT, id)
            .await?
            .into_domain()
    }

    async fn get_all_events(&self) -> RemoteResult<Vec<Event>> {
        let rows: Vec<EventRow> = self.select(EVENTS, EVENT_SELECT, &[]).await?;
        rows.into_iter().map(EventRow::into_domain).collect()
    }

    async fn set_event(&self, event: &Event) -> RemoteResult<()> {
        self.upsert(EVENTS, &[EventRecord::from(event)]).await?;

        let tag_ids = event.tag_ids();
        let links: Vec<EventTagLink> = tag_ids
            .iter()
            .map(|tag_id| EventTagLink {
                event_id: &event.id,
                tag_id: *tag_id,
            })
            .collect();
        self.reconcile_tag_links(EVENT_TAGS, "event_id", &event.id, &tag_ids, &links)
            .await
    }

    async fn get_association(&self, id: &str) -> RemoteResult<Association> {
        self.select_by_id::<AssociationRow>(ASSOCIATIONS, ASSOCIATION_SELECT, id)
            .await?
            .into_domain()
    }

    async fn get_all_associations(&self) -> RemoteResult<Vec<Association>> {
        let rows: Vec<AssociationRow> = self.select(ASSOCIATIONS, ASSOCIATION_SELECT, &[]).await?;
        rows.into_iter().map(AssociationRow::into_domain).collect()
    }

    async fn get_association_headers(&self) -> RemoteResult<Vec<AssociationHeader>> {
        let rows: Vec<AssociationHeaderRow> = self.select(ASSOCIATIONS, "id,name", &[]).await?;
        Ok(rows.into_iter().map(AssociationHeader::from).collect())
    }

    async fn set_association(&self, association: &Association) -> RemoteResult<()> {
        self.upsert(ASSOCIATIONS, &[AssociationRecord::from(association)])
            .await?;

        let tag_ids: Vec<&str> = association.tags.iter().map(|t| t.id.as_str()).collect();
        let links: Vec<AssociationTagLink> = tag_ids
            .iter()
            .map(|tag_id| AssociationTagLink {
                association_id: &association.id,
                tag_id: *tag_id,
            })
            .collect();
        self.reconcile_tag_links(
            ASSOCIATION_TAGS,
            "association_id",
            &association.id,
            &tag_ids,
            &links,
        )
        .await
    }

    async fn get_tag(&self, id: &str) -> RemoteResult<Tag> {
        Ok(self.select_by_id::<TagRow>(TAGS, "*", id).await?.into())
    }

    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>> {
        let rows: Vec<TagRow> = self.select(TAGS, "*", &[]).await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn get_sub_tags(&self, parent_id: &str) -> RemoteResult<Vec<Tag>> {
        let rows: Vec<TagRow> = self
            .select(TAGS, "*", &[("parent_id", eq(parent_id))])
            .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn set_tag(&self, tag: &Tag) -> RemoteResult<()> {
        self.upsert(TAGS, &[TagRow::from(tag)]).await
    }

    async fn get_user(&self, id: &str) -> RemoteResult<UserProfile> {
        Ok(self.select_by_id::<UserRow>(USERS, "*", id).await?.into())
    }

    async fn get_all_users(&self) -> RemoteResult<Vec<UserProfile>> {
        let rows: Vec<UserRow> = self.select(USERS, "*", &[]).await?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn set_user(&self, user: &UserProfile) -> RemoteResult<()> {
        self.upsert(USERS, &[UserRow::from(user)]).await
    }

    async fn get_joined_events(&self, user_id: &str) -> RemoteResult<Vec<Event>> {
        let select = format!("event:events({})", EVENT_SELECT);
        let rows: Vec<ParticipationRow> = self
            .select(EVENT_PARTICIPANTS, &select, &[("user_id", eq(user_id))])
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match row.event {
                Some(event) => events.push(event.into_domain()?),
                None => warn!(user = user_id, "Skipping participation with no event"),
            }
        }
        Ok(events)
    }

    async fn add_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()> {
        let request = self.insert_request(
            EVENT_PARTICIPANTS,
            &[ParticipantLink { user_id, event_id }],
            PREFER_INSERT_IGNORE,
            Some("user_id,event_id"),
        );
        self.send(request, EVENT_PARTICIPANTS).await?;
        Ok(())
    }

    async fn remove_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()> {
        let request = self.delete_request(
            EVENT_PARTICIPANTS,
            &[("user_id", eq(user_id)), ("event_id", eq(event_id))],
        );
        self.send(request, EVENT_PARTICIPANTS).await?;
        Ok(())
    }
}
