//! Collection traversal.

use crate::api::{CollectionPage, DeviantArtApi, RetryPolicy};
use crate::auth::{TokenManager, TokenStore};
use crate::config::MAX_PAGE_LIMIT;
use crate::download::outcome::PageFailure;
use crate::error::Result;
use crate::media::{parse_collection_item, CollectionItem};

/// Skipped pages in a row after which traversal gives up.
const MAX_CONSECUTIVE_SKIPS: u32 = 3;

/// Position in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    offset: u32,
    has_more: bool,
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self {
            offset: 0,
            has_more: true,
        }
    }
}

impl PaginationCursor {
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Move past a fetched page.
    ///
    /// Uses the service's `next_offset` when given, else `offset + limit`.
    /// An offset that does not move forward ends the traversal.
    pub fn advance(&mut self, has_more: bool, next_offset: Option<u32>, limit: u32) {
        let next = next_offset.unwrap_or_else(|| self.offset.saturating_add(limit));

        if has_more && next <= self.offset {
            tracing::warn!(
                "Collection cursor did not advance (offset {} -> {}), stopping",
                self.offset,
                next
            );
            self.has_more = false;
            return;
        }

        self.offset = next;
        self.has_more = has_more;
    }

    /// Move past a page that could not be fetched.
    pub fn skip(&mut self, limit: u32) {
        self.offset = self.offset.saturating_add(limit);
    }

    pub fn finish(&mut self) {
        self.has_more = false;
    }
}

/// Walks a user's favourites page by page.
///
/// Pages are fetched lazily: each [`next_page`](Self::next_page) call makes
/// the requests for exactly one page.
pub struct CollectionPaginator<'a, S: TokenStore> {
    api: &'a DeviantArtApi,
    tokens: &'a mut TokenManager<S>,
    username: String,
    limit: u32,
    mature_content: bool,
    retry: RetryPolicy,
    cursor: PaginationCursor,
    fetched_any: bool,
    consecutive_skips: u32,
    page_failures: Vec<PageFailure>,
}

impl<'a, S: TokenStore> CollectionPaginator<'a, S> {
    pub fn new(
        api: &'a DeviantArtApi,
        tokens: &'a mut TokenManager<S>,
        username: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            tokens,
            username: username.into(),
            limit: MAX_PAGE_LIMIT,
            mature_content: true,
            retry,
            cursor: PaginationCursor::default(),
            fetched_any: false,
            consecutive_skips: 0,
            page_failures: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn with_mature_content(mut self, mature_content: bool) -> Self {
        self.mature_content = mature_content;
        self
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    /// Failures recorded since the last call.
    pub fn take_page_failures(&mut self) -> Vec<PageFailure> {
        std::mem::take(&mut self.page_failures)
    }

    /// Fetch the next page of items; `None` once the collection is exhausted.
    ///
    /// Failing to fetch the first page is an error. Later pages that keep
    /// failing are recorded and skipped, up to a few in a row. Authorization
    /// failures always end the traversal with an error. An empty page ends
    /// the traversal whatever its `has_more` says.
    pub async fn next_page(&mut self) -> Result<Option<Vec<CollectionItem>>> {
        loop {
            if !self.cursor.has_more() {
                return Ok(None);
            }

            let offset = self.cursor.offset();
            match self.fetch_page(offset).await {
                Ok(page) => {
                    self.fetched_any = true;
                    self.consecutive_skips = 0;

                    let items = self.decode(offset, &page);
                    if page.results.is_empty() {
                        if page.has_more {
                            tracing::warn!(
                                "Empty collection page at offset {} claims more results, stopping",
                                offset
                            );
                        }
                        self.cursor.finish();
                    } else {
                        self.cursor
                            .advance(page.has_more, page.next_offset, self.limit);
                    }
                    return Ok(Some(items));
                }
                Err(e) if e.is_auth() || !self.fetched_any => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping collection page at offset {}: {}", offset, e);
                    self.page_failures.push(PageFailure {
                        offset,
                        detail: e.to_string(),
                    });
                    self.cursor.skip(self.limit);
                    self.consecutive_skips += 1;

                    if self.consecutive_skips >= MAX_CONSECUTIVE_SKIPS {
                        tracing::warn!(
                            "{} pages in a row failed, stopping traversal",
                            self.consecutive_skips
                        );
                        self.cursor.finish();
                    }
                }
            }
        }
    }

    fn decode(&mut self, offset: u32, page: &CollectionPage) -> Vec<CollectionItem> {
        let mut items = Vec::with_capacity(page.results.len());

        for (index, entry) in page.results.iter().enumerate() {
            match parse_collection_item(entry) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Undecodable entry {} at offset {}: {}", index, offset, e);
                    self.page_failures.push(PageFailure {
                        offset,
                        detail: format!("entry {} could not be decoded: {}", index, e),
                    });
                }
            }
        }

        items
    }

    /// Fetch one page, refreshing the token once on 401 and backing off on
    /// transient failures.
    async fn fetch_page(&mut self, offset: u32) -> Result<CollectionPage> {
        let api = self.api;
        let username = self.username.as_str();
        let limit = self.limit;
        let mature_content = self.mature_content;

        self.tokens
            .authorized(
                api,
                &self.retry,
                &format!("Collection page at offset {}", offset),
                move |token| async move {
                    api.get_collection_page(&token, username, offset, limit, mature_content)
                        .await
                },
            )
            .await
    }
}
