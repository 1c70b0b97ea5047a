use std::time::Duration;

use radar_core::{Producer, Release, ReleaseDate, ReleaseKind, Track, TrackUri};
use radar_logging::{radar_debug, radar_warn};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{Credentials, TokenCache};
use crate::catalog::{
    CatalogClient, APPEND_BATCH_LIMIT, PRODUCER_PAGE_CAP, RELEASE_PAGE_CAP, TRACK_PAGE_CAP,
};
use crate::{CatalogError, CatalogErrorKind};

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub api_base_url: String,
    pub token_url: String,
    /// Market passed to release listings, e.g. `UA`.
    pub market: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Used when a 429 carries no usable `Retry-After`.
    pub default_retry_after: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            market: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            default_retry_after: 60,
        }
    }
}

mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize)]
    pub struct FollowedArtists {
        pub artists: CursorPage<Artist>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CursorPage<T> {
        pub items: Vec<T>,
        #[serde(default)]
        pub cursors: Option<Cursors>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Cursors {
        #[serde(default)]
        pub after: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OffsetPage<T> {
        pub items: Vec<T>,
        #[serde(default)]
        pub next: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Artist {
        pub id: String,
        pub name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Album {
        pub id: String,
        pub name: String,
        #[serde(default)]
        pub album_type: Option<String>,
        #[serde(default)]
        pub release_date: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AlbumTrack {
        #[serde(default)]
        pub id: Option<String>,
        pub uri: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Playlist {
        pub id: String,
    }

    #[derive(Debug, Serialize)]
    pub struct AppendItems<'a> {
        pub uris: Vec<&'a str>,
    }

    #[derive(Debug, Serialize)]
    pub struct NewPlaylist<'a> {
        pub name: &'a str,
        pub public: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<&'a str>,
    }
}

/// Catalog client over the Spotify Web API.
pub struct HttpCatalog {
    client: reqwest::Client,
    settings: CatalogSettings,
    tokens: TokenCache,
}

impl HttpCatalog {
    pub fn new(settings: CatalogSettings, credentials: Credentials) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| CatalogError::new(CatalogErrorKind::Network, err.to_string()))?;
        let tokens = TokenCache::new(credentials, settings.token_url.clone());
        Ok(Self {
            client,
            settings,
            tokens,
        })
    }

    /// Creates a collection owned by the current user and returns its id.
    pub async fn create_collection(
        &self,
        name: &str,
        public: bool,
        description: Option<&str>,
    ) -> Result<String, CatalogError> {
        let body = encode_json(&wire::NewPlaylist {
            name,
            public,
            description,
        })?;
        let url = self.endpoint("me/playlists", &[])?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let playlist: wire::Playlist = decode_json(self.send(request).await?).await?;
        Ok(playlist.id)
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, CatalogError> {
        let raw = format!(
            "{}/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|err| CatalogError::new(CatalogErrorKind::InvalidRequest, err.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, CatalogError> {
        let token = self.tokens.access_token(&self.client).await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let seconds = retry_after(response.headers(), self.settings.default_retry_after);
            return Err(CatalogError::throttled(seconds));
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate();
            return Err(CatalogError::new(CatalogErrorKind::Unauthorized, message));
        }
        Err(CatalogError::new(
            CatalogErrorKind::HttpStatus(status.as_u16()),
            message,
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        radar_debug!("GET {}", url);
        decode_json(self.send(self.client.get(url)).await?).await
    }

    /// Follows offset pagination until `limit` items or the last page.
    async fn offset_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        limit: usize,
        page_cap: usize,
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        while items.len() < limit {
            let page_size = (limit - items.len()).min(page_cap);
            let mut page_query = query.to_vec();
            page_query.push(("limit", page_size.to_string()));
            page_query.push(("offset", items.len().to_string()));

            let page: wire::OffsetPage<T> = self.get_json(self.endpoint(path, &page_query)?).await?;
            let last_page = page.next.is_none() || page.items.is_empty();
            items.extend(page.items);
            if last_page {
                break;
            }
        }
        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalog {
    async fn list_followed_producers(&self) -> Result<Vec<Producer>, CatalogError> {
        let mut producers = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut query = vec![
                ("type", "artist".to_string()),
                ("limit", PRODUCER_PAGE_CAP.to_string()),
            ];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }
            let page: wire::FollowedArtists =
                self.get_json(self.endpoint("me/following", &query)?).await?;
            let count = page.artists.items.len();
            producers.extend(page.artists.items.into_iter().map(|artist| Producer {
                id: artist.id,
                name: artist.name,
            }));

            after = page.artists.cursors.and_then(|cursors| cursors.after);
            if after.is_none() || count == 0 {
                break;
            }
        }
        Ok(producers)
    }

    async fn list_releases(
        &self,
        producer_id: &str,
        kinds: &[ReleaseKind],
        limit: usize,
    ) -> Result<Vec<Release>, CatalogError> {
        let path = format!("artists/{producer_id}/albums");
        let mut releases = Vec::new();
        // Results come grouped by type, albums first; each group gets its own limit.
        for kind in kinds.iter().filter(|kind| **kind != ReleaseKind::Other) {
            let mut query = vec![("include_groups", kind.as_api_str().to_string())];
            if let Some(market) = &self.settings.market {
                query.push(("market", market.clone()));
            }
            let albums: Vec<wire::Album> = self
                .offset_pages(&path, &query, limit, RELEASE_PAGE_CAP)
                .await?;
            releases.extend(albums.into_iter().filter_map(into_release));
        }
        Ok(releases)
    }

    async fn list_tracks(
        &self,
        release_id: &str,
        limit: usize,
    ) -> Result<Vec<Track>, CatalogError> {
        let path = format!("albums/{release_id}/tracks");
        let tracks: Vec<wire::AlbumTrack> =
            self.offset_pages(&path, &[], limit, TRACK_PAGE_CAP).await?;
        Ok(tracks
            .into_iter()
            .filter_map(|track| {
                // Local files have no catalog id and cannot be appended.
                let id = track.id?;
                Some(Track {
                    id,
                    uri: TrackUri::new(track.uri),
                })
            })
            .collect())
    }

    async fn append_tracks(
        &self,
        collection_id: &str,
        uris: &[TrackUri],
    ) -> Result<(), CatalogError> {
        if uris.len() > APPEND_BATCH_LIMIT {
            return Err(CatalogError::new(
                CatalogErrorKind::InvalidRequest,
                format!(
                    "{} tracks exceed the batch limit of {}",
                    uris.len(),
                    APPEND_BATCH_LIMIT
                ),
            ));
        }
        let body = encode_json(&wire::AppendItems {
            uris: uris.iter().map(TrackUri::as_str).collect(),
        })?;
        let url = self.endpoint(&format!("playlists/{collection_id}/items"), &[])?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await?;
        Ok(())
    }
}

fn into_release(album: wire::Album) -> Option<Release> {
    let raw_date = album.release_date.unwrap_or_default();
    match ReleaseDate::parse(&raw_date) {
        Ok(release_date) => Some(Release {
            kind: ReleaseKind::from_api(album.album_type.as_deref().unwrap_or_default()),
            id: album.id,
            name: album.name,
            release_date,
        }),
        Err(err) => {
            radar_warn!("Dropping release {} ({}): {}", album.name, album.id, err);
            None
        }
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CatalogError> {
    serde_json::to_vec(value)
        .map_err(|err| CatalogError::new(CatalogErrorKind::InvalidRequest, err.to_string()))
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CatalogError::new(CatalogErrorKind::Decode, err.to_string()))
}

/// Seconds from a `Retry-After` header, or `default` when absent or not an integer.
pub(crate) fn retry_after(headers: &HeaderMap, default: u64) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        return CatalogError::new(CatalogErrorKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return CatalogError::new(CatalogErrorKind::Decode, err.to_string());
    }
    CatalogError::new(CatalogErrorKind::Network, err.to_string())
}
