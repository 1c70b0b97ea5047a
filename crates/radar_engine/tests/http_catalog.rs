mod common;

use std::time::Duration;

use common::{monitoring_state, test_config, MemoryStore};
use radar_core::{ReleaseKind, RunOutcome, TrackUri};
use radar_engine::{
    CatalogClient, CatalogErrorKind, CatalogSettings, Credentials, HttpCatalog, ScanEngine,
};
use serde_json::json;
use wiremock::matchers::{
    body_json, body_string_contains, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> CatalogSettings {
    CatalogSettings {
        api_base_url: server.uri(),
        token_url: format!("{}/api/token", server.uri()),
        market: Some("UA".to_string()),
        request_timeout: Duration::from_secs(5),
        ..CatalogSettings::default()
    }
}

fn bearer_catalog(server: &MockServer) -> HttpCatalog {
    HttpCatalog::new(
        settings(server),
        Credentials::Bearer("test-token".to_string()),
    )
    .expect("client builds")
}

#[tokio::test]
async fn followed_producers_follow_the_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .and(query_param("type", "artist"))
        .and(query_param_is_missing("after"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {
                "items": [{"id": "a1", "name": "First"}, {"id": "a2", "name": "Second"}],
                "cursors": {"after": "a2"}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .and(query_param("after", "a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {
                "items": [{"id": "a3", "name": "Third"}],
                "cursors": {"after": null}
            }
        })))
        .mount(&server)
        .await;

    let producers = bearer_catalog(&server)
        .list_followed_producers()
        .await
        .expect("listing ok");

    let ids: Vec<_> = producers.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
    assert_eq!(producers[2].name, "Third");
}

#[tokio::test]
async fn releases_are_validated_at_the_boundary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/a1/albums"))
        .and(query_param("include_groups", "album"))
        .and(query_param("market", "UA"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "x1", "name": "Year only", "album_type": "album", "release_date": "2019"},
                {"id": "x3", "name": "Broken", "album_type": "album", "release_date": "soon"},
                {"id": "x4", "name": "Comp", "album_type": "compilation", "release_date": "2022-10-07"}
            ],
            "next": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/a1/albums"))
        .and(query_param("include_groups", "single"))
        .and(query_param("market", "UA"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "x2", "name": "Month", "album_type": "single", "release_date": "2021-04"}
            ],
            "next": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let releases = bearer_catalog(&server)
        .list_releases("a1", &ReleaseKind::TRACKED, 5)
        .await
        .expect("releases ok");

    let summary: Vec<_> = releases
        .iter()
        .map(|r| (r.id.as_str(), r.kind, r.release_date.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("x1", ReleaseKind::Album, "2019-01-01"),
            ("x4", ReleaseKind::Other, "2022-10-07"),
            ("x2", ReleaseKind::Single, "2021-04-01"),
        ]
    );
}

fn album_page(releases: &[(&str, &str)], kind: &str, next: Option<&str>) -> serde_json::Value {
    let items: Vec<_> = releases
        .iter()
        .map(|(id, date)| {
            json!({"id": id, "name": format!("Release {id}"), "album_type": kind, "release_date": date})
        })
        .collect();
    json!({"items": items, "next": next})
}

/// Mounts an artist with a full page of old albums and one new single behind them.
async fn mount_prolific_artist(server: &MockServer) {
    let albums = [
        ("al0", "2010-01-01"),
        ("al1", "2011-01-01"),
        ("al2", "2012-01-01"),
        ("al3", "2013-01-01"),
        ("al4", "2014-01-01"),
    ];
    Mock::given(method("GET"))
        .and(path("/artists/p/albums"))
        .and(query_param("include_groups", "album"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(album_page(&albums, "album", Some("more"))),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/p/albums"))
        .and(query_param("include_groups", "single"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(album_page(
            &[("new-single", "2026-03-01")],
            "single",
            None,
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/p/albums"))
        .and(query_param("offset", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(album_page(&[], "album", None)))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn singles_are_listed_even_behind_a_full_page_of_albums() {
    let server = MockServer::start().await;
    mount_prolific_artist(&server).await;

    let releases = bearer_catalog(&server)
        .list_releases("p", &ReleaseKind::TRACKED, 5)
        .await
        .expect("releases ok");

    assert_eq!(releases.len(), 6);
    let single = releases
        .iter()
        .find(|release| release.kind == ReleaseKind::Single)
        .expect("single listed");
    assert_eq!(single.id, "new-single");
    assert_eq!(single.release_date.as_str(), "2026-03-01");
}

#[tokio::test]
async fn monitoring_picks_up_a_new_single_from_a_prolific_artist() {
    common::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {"items": [{"id": "p", "name": "Prolific"}], "cursors": {"after": null}}
        })))
        .mount(&server)
        .await;
    mount_prolific_artist(&server).await;
    Mock::given(method("GET"))
        .and(path("/albums/new-single/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "s1", "uri": "spotify:track:s1"}],
            "next": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/playlists/playlist-1/items"))
        .and(body_json(json!({"uris": ["spotify:track:s1"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"snapshot_id": "s"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::with_state(monitoring_state(&[("p", "2025-01-01")]));
    let mut engine = ScanEngine::new(bearer_catalog(&server), store.clone(), test_config());

    let outcome = engine.run_once().await.expect("run succeeds");

    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run, got {outcome:?}");
    };
    assert_eq!(report.tracks_added, 1);
    assert_eq!(
        store.current().producer_watermark("p").map(|d| d.as_str()),
        Some("2026-03-01")
    );
}

#[tokio::test]
async fn tracks_paginate_by_offset_up_to_limit() {
    let server = MockServer::start().await;
    let page = |start: usize, count: usize, next: Option<&str>| {
        let items: Vec<_> = (start..start + count)
            .map(|n| json!({"id": format!("t{n}"), "uri": format!("spotify:track:t{n}")}))
            .collect();
        json!({"items": items, "next": next})
    };
    Mock::given(method("GET"))
        .and(path("/albums/r1/tracks"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 50, Some("more"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums/r1/tracks"))
        .and(query_param("offset", "50"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(50, 12, None)))
        .expect(1)
        .mount(&server)
        .await;

    let tracks = bearer_catalog(&server)
        .list_tracks("r1", usize::MAX)
        .await
        .expect("tracks ok");

    assert_eq!(tracks.len(), 62);
    assert_eq!(tracks[61].uri.as_str(), "spotify:track:t61");
}

#[tokio::test]
async fn local_tracks_without_id_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/albums/r1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": null, "uri": "spotify:local:a:b:c:1"},
                {"id": "t1", "uri": "spotify:track:t1"}
            ],
            "next": null
        })))
        .mount(&server)
        .await;

    let tracks = bearer_catalog(&server).list_tracks("r1", 1).await.unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].id, "t1");
}

#[tokio::test]
async fn too_many_requests_becomes_a_throttle_signal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/slow/albums"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/bare/albums"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    let catalog = bearer_catalog(&server);

    let err = catalog
        .list_releases("slow", &ReleaseKind::TRACKED, 5)
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        CatalogErrorKind::Throttled {
            retry_after_seconds: 30
        }
    );
    assert_eq!(err.retry_after(), Some(30));

    let err = catalog
        .list_releases("bare", &ReleaseKind::TRACKED, 5)
        .await
        .unwrap_err();
    assert_eq!(err.retry_after(), Some(60));
}

#[tokio::test]
async fn other_failures_carry_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artists/gone/albums"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such artist"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists/garbled/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    let catalog = bearer_catalog(&server);

    let err = catalog
        .list_releases("gone", &ReleaseKind::TRACKED, 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind, CatalogErrorKind::HttpStatus(404));
    assert_eq!(err.message, "no such artist");
    assert_eq!(err.retry_after(), None);

    let err = catalog
        .list_releases("garbled", &ReleaseKind::TRACKED, 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind, CatalogErrorKind::Decode);
}

#[tokio::test]
async fn append_posts_uris_to_the_items_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/playlists/pl1/items"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"uris": ["spotify:track:1", "spotify:track:2"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"snapshot_id": "s"})))
        .expect(1)
        .mount(&server)
        .await;

    bearer_catalog(&server)
        .append_tracks(
            "pl1",
            &[
                TrackUri::new("spotify:track:1"),
                TrackUri::new("spotify:track:2"),
            ],
        )
        .await
        .expect("append ok");
}

#[tokio::test]
async fn oversized_append_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let uris: Vec<_> = (0..51)
        .map(|n| TrackUri::new(format!("spotify:track:{n}")))
        .collect();

    let err = bearer_catalog(&server)
        .append_tracks("pl1", &uris)
        .await
        .unwrap_err();

    assert_eq!(err.kind, CatalogErrorKind::InvalidRequest);
}

#[tokio::test]
async fn refresh_token_is_exchanged_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-me"))
        .and(header("authorization", "Basic aWQ6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums/r1/tracks"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "next": null})))
        .expect(2)
        .mount(&server)
        .await;

    let catalog = HttpCatalog::new(
        settings(&server),
        Credentials::RefreshToken {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh-me".to_string(),
        },
    )
    .unwrap();

    catalog.list_tracks("r1", 5).await.unwrap();
    catalog.list_tracks("r1", 5).await.unwrap();
}

#[tokio::test]
async fn rejected_refresh_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let catalog = HttpCatalog::new(
        settings(&server),
        Credentials::RefreshToken {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "revoked".to_string(),
        },
    )
    .unwrap();

    let err = catalog.list_followed_producers().await.unwrap_err();
    assert_eq!(err.kind, CatalogErrorKind::Unauthorized);
}

#[tokio::test]
async fn create_collection_returns_new_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/playlists"))
        .and(body_json(json!({"name": "Radar", "public": false})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new-pl"})))
        .mount(&server)
        .await;

    let id = bearer_catalog(&server)
        .create_collection("Radar", false, None)
        .await
        .unwrap();

    assert_eq!(id, "new-pl");
}
