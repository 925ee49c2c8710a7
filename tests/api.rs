//! End-to-end tests of the HTTP boundary against the in-memory store and
//! fake aggregation sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::macros::datetime;
use tower::ServiceExt;

use skillbridge::application::rank::RankService;
use skillbridge::application::shortage::ShortageService;
use skillbridge::application::sources::{
    OccupationAnzsco, OccupationMatch, RankSource, ShortageSections, ShortageSource, SourceError,
    StateLatest,
};
use skillbridge::cache::{Cache, CacheAdmin, CacheTuning, InMemoryStore, SharedStore, SingleFlight};
use skillbridge::infra::http::{AdminState, ApiState, build_router};

const ADMIN_SECRET: &str = "test-secret";

struct FakeShortageSource {
    calls: AtomicUsize,
}

#[async_trait]
impl ShortageSource for FakeShortageSource {
    async fn sections(&self, _prefix4: &str) -> Result<ShortageSections, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ShortageSections {
            latest_by_state: vec![StateLatest {
                state: "New South Wales".to_string(),
                date: datetime!(2025-08-14 14:00 UTC),
                nsc_emp: 1332.0,
            }],
            stats_by_state: vec![],
            yearly_trend: vec![],
        })
    }

    async fn distinct_prefixes(&self) -> Result<Vec<String>, SourceError> {
        Ok(vec!["1111".to_string(), "2613".to_string()])
    }
}

struct FakeRankSource;

#[async_trait]
impl RankSource for FakeRankSource {
    async fn ability_titles(
        &self,
        _kind: &str,
        codes: &[String],
    ) -> Result<HashMap<String, Option<String>>, SourceError> {
        Ok(codes.iter().map(|c| (c.clone(), None)).collect())
    }

    async fn occupation_matches(
        &self,
        _kind: &str,
        codes: &[String],
    ) -> Result<Vec<OccupationMatch>, SourceError> {
        Ok(codes
            .iter()
            .map(|code| OccupationMatch {
                occupation_code: "15-2031.00".to_string(),
                occupation_title: "Operations Research Analysts".to_string(),
                code: code.clone(),
            })
            .collect())
    }

    async fn anzsco_for_occupations(
        &self,
        occupation_codes: &[String],
        _industry: Option<&str>,
    ) -> Result<Vec<OccupationAnzsco>, SourceError> {
        Ok(occupation_codes
            .iter()
            .map(|code| OccupationAnzsco {
                occupation_code: code.clone(),
                code: "261313".to_string(),
                title: Some("Software Engineer".to_string()),
                description: None,
            })
            .collect())
    }
}

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    shortage_source: Arc<FakeShortageSource>,
}

fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();
    let cache = Cache::new(shared.clone());
    let single_flight = SingleFlight::new(cache.clone(), CacheTuning::default());

    let shortage_source = Arc::new(FakeShortageSource {
        calls: AtomicUsize::new(0),
    });
    let shortage = Arc::new(ShortageService::new(
        cache.clone(),
        single_flight,
        shortage_source.clone(),
    ));
    let rank = Arc::new(RankService::new(cache, Arc::new(FakeRankSource)));

    let api = ApiState {
        shortage: shortage.clone(),
        rank,
    };
    let admin = AdminState {
        cache_admin: CacheAdmin::new(shared),
        shortage,
        secret: Some(Arc::from(ADMIN_SECRET)),
        purge_batch: 100,
    };

    TestApp {
        router: build_router(api, admin),
        store,
        shortage_source,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn post_json_admin(uri: &str, body: Value, secret: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header("x-admin-secret", secret)
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is json")
}

#[tokio::test]
async fn shortage_endpoint_caches_by_prefix() {
    let app = test_app();

    let first = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "261313"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = json_body(first).await;
    assert_eq!(body["query"]["match_prefix4"], "2613");
    assert_eq!(body["latest_by_state"][0]["state"], "New South Wales");

    // A different code in the same 4-digit group is a cache hit.
    let second = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "261399"}),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(app.shortage_source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shortage_endpoint_validates_the_code() {
    let app = test_app();

    let response = app
        .router
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "26x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn rank_endpoint_reports_cache_state() {
    let app = test_app();
    let body = json!({
        "selections": [
            {"type": "knowledge", "code": "2.C.1.a"},
            {"type": "skill", "code": "2.A.1.a"}
        ]
    });

    let first = app
        .router
        .clone()
        .oneshot(post_json("/api/occupations/rank-by-codes", body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = json_body(first).await;
    assert_eq!(first_body["cached"], false);
    assert_eq!(first_body["items"][0]["occupation_code"], "15-2031.00");

    let second = app
        .router
        .clone()
        .oneshot(post_json("/api/occupations/rank-by-codes", body.clone()))
        .await
        .unwrap();
    let second_body = json_body(second).await;
    assert_eq!(second_body["cached"], true);

    let refreshed = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/occupations/rank-by-codes?refresh=1",
            body,
        ))
        .await
        .unwrap();
    let refreshed_body = json_body(refreshed).await;
    assert_eq!(refreshed_body["cached"], false);
}

#[tokio::test]
async fn rank_endpoint_rejects_empty_selections() {
    let app = test_app();

    let response = app
        .router
        .oneshot(post_json(
            "/api/occupations/rank-by-codes",
            json!({"selections": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_purge_requires_the_secret() {
    let app = test_app();

    let denied = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/admin/cache/purge",
            json!({"pattern": "sb:shortage:*"}),
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .router
        .clone()
        .oneshot(post_json_admin(
            "/api/admin/cache/purge",
            json!({"pattern": "sb:shortage:*"}),
            "wrong",
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_purge_deletes_only_the_requested_namespace() {
    let app = test_app();

    // Populate one shortage entry plus an unrelated key.
    app.router
        .clone()
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "261313"}),
        ))
        .await
        .unwrap();
    app.store.set("session:abc", "x", None).await.unwrap();

    let purge = app
        .router
        .clone()
        .oneshot(post_json_admin(
            "/api/admin/cache/purge",
            json!({"pattern": "sb:shortage:*"}),
            ADMIN_SECRET,
        ))
        .await
        .unwrap();
    assert_eq!(purge.status(), StatusCode::OK);
    let body = json_body(purge).await;
    assert_eq!(body["deleted"], 1);

    assert_eq!(
        app.store.get("session:abc").await.unwrap().as_deref(),
        Some("x")
    );

    // The next shortage lookup recomputes.
    app.router
        .clone()
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "261313"}),
        ))
        .await
        .unwrap();
    assert_eq!(app.shortage_source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn admin_flush_wipes_everything() {
    let app = test_app();

    app.store.set("session:abc", "x", None).await.unwrap();
    app.store.set("sb:shortage:by-anzsco:v1:1111", "{}", None)
        .await
        .unwrap();

    let flush = app
        .router
        .clone()
        .oneshot(post_json_admin(
            "/api/admin/cache/flush-all",
            json!({}),
            ADMIN_SECRET,
        ))
        .await
        .unwrap();
    assert_eq!(flush.status(), StatusCode::OK);
    let body = json_body(flush).await;
    assert_eq!(body["flushed"], "ALL");

    let remaining = app.store.scan("*", None, 100).await.unwrap();
    assert!(remaining.keys.is_empty());
}

#[tokio::test]
async fn admin_prewarm_warms_known_prefixes() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_json_admin(
            "/api/admin/shortage/prewarm",
            json!({"only_miss": true}),
            ADMIN_SECRET,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["written"], 2);

    // Both prefixes now hit the cache.
    app.router
        .clone()
        .oneshot(post_json(
            "/api/shortage/by-anzsco",
            json!({"anzsco_code": "1111"}),
        ))
        .await
        .unwrap();
    assert_eq!(app.shortage_source.calls.load(Ordering::SeqCst), 2);
}
