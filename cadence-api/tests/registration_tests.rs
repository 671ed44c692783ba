//! Organization registration flow tests

mod helpers;

use cadence_api::db::{calendar_keywords, calendars, content_items, organizations};
use cadence_api::services::{
    ContentScheduler, KeywordDiscovery, RegistrationRequest, RegistrationService, SchedulingPolicy,
};
use cadence_common::Error;
use helpers::db_utils::{count_rows, create_org_with_calendar, create_test_db, insert_keyword};
use helpers::fakes::{Failure, FakeMetricsProvider, FakeTextGenerator};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn service(
    pool: &SqlitePool,
    text_generator: Arc<FakeTextGenerator>,
    metrics: Arc<FakeMetricsProvider>,
) -> RegistrationService {
    let discovery = KeywordDiscovery::new(text_generator.clone(), metrics);
    let scheduler = ContentScheduler::new(text_generator, SchedulingPolicy::default());
    RegistrationService::new(pool.clone(), discovery, scheduler, 2000)
}

fn request(domain: &str) -> RegistrationRequest {
    RegistrationRequest {
        domain: domain.to_string(),
        title: Some("Acme Widgets".to_string()),
        description: "Acme sells widgets and gizmos".to_string(),
        keyword_ids: Vec::new(),
    }
}

fn widget_fakes() -> (Arc<FakeTextGenerator>, Arc<FakeMetricsProvider>) {
    (
        Arc::new(FakeTextGenerator::new().with_keywords(&["Widgets", "gizmos"])),
        Arc::new(
            FakeMetricsProvider::new()
                .knowing("widgets", 5400)
                .knowing("gizmos", 880),
        ),
    )
}

#[tokio::test]
async fn test_register_creates_calendar_keywords_and_items() {
    let (_dir, pool) = create_test_db().await;
    let (generator, metrics) = widget_fakes();

    let org_id = service(&pool, generator.clone(), metrics)
        .register(&request("https://acme-widgets.com"), "user-42")
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let org = organizations::find_by_id(&mut conn, org_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org.slug, "acme-widgets");
    assert_eq!(org.name, "acme widgets");
    assert_eq!(org.domain, "https://acme-widgets.com");
    assert_eq!(org.created_by, "user-42");

    let calendar = calendars::find_by_organization(&mut conn, org_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(calendar.name, calendars::DEFAULT_CALENDAR_NAME);

    let keywords: Vec<String> = calendar_keywords::keywords_for_calendar(&mut conn, calendar.id)
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.keyword)
        .collect();
    assert_eq!(keywords, vec!["widgets", "gizmos"]);

    let items = content_items::list_by_calendar(&mut conn, calendar.id)
        .await
        .unwrap();
    assert_eq!(items.len(), 30);

    // Topics are generated from the keywords linked during registration
    let requests = generator.topic_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, keywords);
}

#[tokio::test]
async fn test_supplied_keyword_ids_are_linked() {
    let (_dir, pool) = create_test_db().await;
    let extra = insert_keyword(&pool, "industrial supplies", 320).await;
    let (generator, metrics) = widget_fakes();

    let mut req = request("acme.com");
    req.keyword_ids = vec![extra];
    let org_id = service(&pool, generator, metrics)
        .register(&req, "user-42")
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let calendar = calendars::find_by_organization(&mut conn, org_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        calendar_keywords::keyword_count(&mut conn, calendar.id)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_collaborator_failure_rolls_back_everything() {
    let (_dir, pool) = create_test_db().await;
    let generator = Arc::new(FakeTextGenerator::new().with_keywords(&["widgets"]));
    let metrics = Arc::new(FakeMetricsProvider::new().failing(Failure::Api));

    let result = service(&pool, generator, metrics)
        .register(&request("acme.com"), "user-42")
        .await;

    assert!(matches!(result, Err(Error::Collaborator(op)) if op == "keyword discovery"));
    assert_eq!(count_rows(&pool, "organizations").await, 0);
    assert_eq!(count_rows(&pool, "content_calendars").await, 0);
    assert_eq!(count_rows(&pool, "keywords").await, 0);
}

#[tokio::test]
async fn test_topic_failure_creates_no_organization() {
    let (_dir, pool) = create_test_db().await;
    let generator = Arc::new(
        FakeTextGenerator::new()
            .with_keywords(&["widgets"])
            .failing_topics(Failure::Timeout),
    );
    let metrics = Arc::new(FakeMetricsProvider::new().knowing("widgets", 5400));

    let err = service(&pool, generator, metrics.clone())
        .register(&request("acme.com"), "user-42")
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(count_rows(&pool, "organizations").await, 0);
    assert_eq!(count_rows(&pool, "content_calendars").await, 0);
    assert_eq!(count_rows(&pool, "content_items").await, 0);
    // Enriched keywords are kept, so a retry skips the metrics call
    assert_eq!(count_rows(&pool, "keywords").await, 1);
    assert_eq!(metrics.requests().len(), 1);
}

#[tokio::test]
async fn test_unknown_supplied_keyword_rolls_back() {
    let (_dir, pool) = create_test_db().await;
    let (generator, metrics) = widget_fakes();

    let mut req = request("acme.com");
    req.keyword_ids = vec![Uuid::new_v4()];
    let result = service(&pool, generator.clone(), metrics)
        .register(&req, "user-42")
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(count_rows(&pool, "organizations").await, 0);
    // Rejected before any topics are generated
    assert!(generator.topic_requests().is_empty());
}

#[tokio::test]
async fn test_duplicate_slug_is_conflict() {
    let (_dir, pool) = create_test_db().await;
    let (generator, metrics) = widget_fakes();
    let service = service(&pool, generator.clone(), metrics);

    service
        .register(&request("https://acme.com"), "user-1")
        .await
        .unwrap();
    let result = service.register(&request("acme.io"), "user-2").await;

    assert!(matches!(result, Err(Error::Conflict(_))));
    assert_eq!(count_rows(&pool, "organizations").await, 1);
    // Conflict is detected before any collaborator call
    assert_eq!(generator.keyword_calls(), 1);
}

#[tokio::test]
async fn test_invalid_input_makes_no_calls() {
    let (_dir, pool) = create_test_db().await;
    let (generator, metrics) = widget_fakes();
    let service = service(&pool, generator.clone(), metrics);

    let mut blank_description = request("acme.com");
    blank_description.description = "  ".to_string();

    assert!(matches!(
        service.register(&request("https://"), "user-1").await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        service.register(&blank_description, "user-1").await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(generator.keyword_calls(), 0);
    assert_eq!(count_rows(&pool, "organizations").await, 0);
}

#[tokio::test]
async fn test_concurrent_registrations_with_slow_generator() {
    let (_dir, pool) = create_test_db().await;
    let generator = Arc::new(
        FakeTextGenerator::new()
            .with_keywords(&["widgets"])
            .with_delay(Duration::from_millis(800)),
    );
    let metrics = Arc::new(FakeMetricsProvider::new().knowing("widgets", 5400));
    let service = service(&pool, generator, metrics);

    let alpha_req = request("alpha.com");
    let beta_req = request("beta.com");
    let (alpha, beta) = tokio::join!(
        service.register(&alpha_req, "user-1"),
        service.register(&beta_req, "user-2"),
    );

    alpha.unwrap();
    beta.unwrap();
    assert_eq!(count_rows(&pool, "organizations").await, 2);
    assert_eq!(count_rows(&pool, "content_items").await, 60);
    assert_eq!(count_rows(&pool, "keywords").await, 1);
}

#[tokio::test]
async fn test_other_writes_proceed_while_registration_waits_on_generator() {
    let (_dir, pool) = create_test_db().await;
    let generator = Arc::new(
        FakeTextGenerator::new()
            .with_keywords(&["widgets"])
            .with_delay(Duration::from_millis(800)),
    );
    let metrics = Arc::new(FakeMetricsProvider::new().knowing("widgets", 5400));
    let service = service(&pool, generator, metrics);

    let acme_req = request("acme.com");
    let (registered, _) = tokio::join!(
        service.register(&acme_req, "user-1"),
        async {
            // Lands while the generator is still working
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut conn = pool.acquire().await.unwrap();
            create_org_with_calendar(&mut conn, "other-tenant").await;
        },
    );

    registered.unwrap();
    assert_eq!(count_rows(&pool, "organizations").await, 2);
}
