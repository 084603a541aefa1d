use crate::Collection;
use crate::Error;
use crate::Resource;
use crate::SoundcloudClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// A search query for finding content in the SoundCloud catalog.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchQuery<'a> {
    /// The search query string
    pub query: &'a str,
    /// Number of results to skip (for pagination)
    pub offset: Option<u32>,
    /// Maximum number of results to return, 20 by default
    pub limit: Option<u32>,
}

impl<'a> SearchQuery<'a> {
    /// Create a new search query with the specified search string.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use soundcloudrs::SearchQuery;
    ///
    /// let search = SearchQuery::new("mt. marcy");
    /// ```
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            offset: None,
            limit: None,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Results of a catalog search.
///
/// Tracks, playlists and users are mixed in relevance order. Containers are
/// returned as received, so their listings may still contain stubs; pass
/// them to [`SoundcloudClient::reconcile_playlist`] or
/// [`SoundcloudClient::reconcile_user`] when the tracks are needed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub collection: Vec<Resource>,
    /// Total number of matches across all pages
    pub total_results: Option<u64>,
    /// URL of the next page, without credentials
    pub next_href: Option<String>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    // Results of kinds this library does not model are dropped.
    pub(crate) fn from_page(page: Collection<Value>) -> Result<Self, Error> {
        let mut collection = Vec::with_capacity(page.collection.len());
        for item in page.collection {
            match Resource::from_value(item) {
                Ok(resource) => collection.push(resource),
                Err(Error::UnresolvedKind(kind)) => {
                    log::debug!("Skipping search result of kind {:?}", kind);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            collection,
            total_results: page.total_results,
            next_href: page.next_href,
        })
    }
}

impl SoundcloudClient {
    /// Search for tracks, playlists and users.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: soundcloudrs::SoundcloudClient) -> Result<(), soundcloudrs::Error> {
    /// let search_query = soundcloudrs::SearchQuery::new("cold nights").with_limit(5);
    /// let results = client.search(search_query).await?;
    ///
    /// for resource in results.collection {
    ///     println!("{}: {}", resource.kind(), resource.id());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search<'a>(&self, search: SearchQuery<'a>) -> Result<SearchResults, Error> {
        let client_id = self.client_id().await?;
        let url = self.endpoints.search_url(
            search.query,
            search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            search.offset.unwrap_or(0),
            &client_id,
        )?;

        let page: Collection<Value> = self.get_json(&url).await?;
        SearchResults::from_page(page)
    }
}
