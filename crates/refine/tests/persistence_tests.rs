//! Persistence integration tests.
//!
//! Each test runs several refinements against one shared driver, the way a
//! host would across consecutive requests of one user.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};

use common::*;
use helios_refine::prelude::*;
use helios_refine::sql::{SqlParam, SqlQuery};
use helios_refine::store::{Cookie, Store};

fn stored(driver: &dyn StoreDriver, key: &str) -> Option<Value> {
    driver
        .read(key)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

// ============================================================================
// Session Round Trip Tests
// ============================================================================

#[test]
fn test_selections_are_persisted() {
    init_tracing();
    let session = SessionStore::new();
    let mut refinement = persisted_refinement("search=Foo&price=50&sort=-price", &session);
    refinement.refine().unwrap();

    assert_eq!(
        stored(&session, "refine_search"),
        Some(json!({"term": "Foo", "cols": null}))
    );
    assert_eq!(stored(&session, "refine_filters"), Some(json!({"price": 50})));
    assert_eq!(
        stored(&session, "refine_sort"),
        Some(json!({"col": "price", "dir": "desc"}))
    );
}

#[test]
fn test_absent_keys_restore_selections() {
    let session = SessionStore::new();
    persisted_refinement("search=foo&price=50&sort=-price", &session)
        .refine()
        .unwrap();

    let mut next = persisted_refinement("", &session);
    next.refine().unwrap();

    assert_where(
        &next,
        "(LOWER(products.name) LIKE ? OR LOWER(products.description) LIKE ?) AND price >= ?",
    );
    assert_orders(&next, &["products.price DESC"]);

    // restored selections are written back
    assert_eq!(stored(&session, "refine_filters"), Some(json!({"price": 50})));
}

#[test]
fn test_restored_sort_from_store() {
    let session = SessionStore::new();
    session
        .write("refine_sort", r#"{"col":"name","dir":"desc"}"#.to_string())
        .unwrap();

    let mut refinement = persisted_refinement("", &session);
    refinement.refine().unwrap();

    assert_orders(&refinement, &["products.name DESC"]);
}

#[test]
fn test_empty_keys_clear_selections() {
    let session = SessionStore::new();
    persisted_refinement("search=foo&price=50&sort=-price", &session)
        .refine()
        .unwrap();

    let mut cleared = persisted_refinement("search=&price=&sort=", &session);
    cleared.refine().unwrap();

    assert_unfiltered(&cleared);
    assert_orders(&cleared, &["products.name ASC"]);
    assert!(session.is_empty());
}

#[test]
fn test_default_sort_is_not_persisted() {
    let session = SessionStore::new();
    persisted_refinement("", &session).refine().unwrap();

    assert!(stored(&session, "refine_sort").is_none());
}

#[test]
fn test_persisted_match_list() {
    let session = SessionStore::new();
    let config = RefineConfig {
        matches: true,
        ..Default::default()
    };
    persisted_refinement("search=foo&match=description", &session)
        .config(config.clone())
        .refine()
        .unwrap();
    assert_eq!(
        stored(&session, "refine_search"),
        Some(json!({"term": "foo", "cols": ["description"]}))
    );

    let mut next = persisted_refinement("", &session).config(config);
    next.refine().unwrap();
    assert_where(&next, "(LOWER(products.description) LIKE ?)");
}

#[test]
fn test_stored_match_list_needs_toggle() {
    let session = SessionStore::new();
    session
        .write("refine_search", r#"{"term":"foo","cols":["description"]}"#.to_string())
        .unwrap();

    let mut refinement = persisted_refinement("", &session);
    refinement.refine().unwrap();

    assert_where(
        &refinement,
        "(LOWER(products.name) LIKE ? OR LOWER(products.description) LIKE ?)",
    );
    assert_eq!(
        stored(&session, "refine_search"),
        Some(json!({"term": "foo", "cols": null}))
    );
}

#[test]
fn test_malformed_payload_is_ignored() {
    let session = SessionStore::new();
    session.write("refine_filters", "[1,2,3]".to_string()).unwrap();
    session.write("refine_sort", "{broken".to_string()).unwrap();

    let mut refinement = persisted_refinement("", &session);
    refinement.refine().unwrap();

    assert_unfiltered(&refinement);
    assert_orders(&refinement, &["products.name ASC"]);
    assert!(stored(&session, "refine_filters").is_none());
}

#[test]
fn test_stored_filter_values_are_coerced() {
    let session = SessionStore::new();
    session
        .write("refine_filters", r#"{"price":"abc","stock":"12"}"#.to_string())
        .unwrap();

    let mut refinement = Refinement::new(params(""))
        .builder(SqlQuery::new(TABLE))
        .filters(
            Filters::new()
                .with(Filter::new("price").operator(Operator::Gte).kind(ValueKind::Integer))
                .with(Filter::new("stock").operator(Operator::Gt).kind(ValueKind::Integer))
                .persist(StoreKind::Transient),
        )
        .store(Arc::new(session.clone()));
    refinement.refine().unwrap();

    assert_where(&refinement, "stock > ?");
    assert_params(&refinement, &[SqlParam::Integer(12)]);
    assert!(!refinement.filter_list().get("price").unwrap().is_active());
    assert_eq!(stored(&session, "refine_filters"), Some(json!({"stock": 12})));
}

#[test]
fn test_nullable_filter_persists_null() {
    let session = SessionStore::new();
    let refinement = |query: &str| {
        Refinement::new(params(query))
            .builder(SqlQuery::new(TABLE))
            .filters(
                Filters::new()
                    .with(Filter::new("deleted_at").nullable())
                    .persist(StoreKind::Transient),
            )
            .store(Arc::new(session.clone()))
    };

    let mut first = refinement("deleted_at=");
    first.refine().unwrap();
    assert_where(&first, "deleted_at IS NULL");
    assert_eq!(stored(&session, "refine_filters"), Some(json!({"deleted_at": null})));

    let mut second = refinement("");
    second.refine().unwrap();
    assert_where(&second, "deleted_at IS NULL");
}

// ============================================================================
// Scoped Store Tests
// ============================================================================

#[test]
fn test_scopes_use_separate_entries() {
    let session = SessionStore::new();
    persisted_refinement("users%5Bsort%5D=-price", &session)
        .scope("users")
        .refine()
        .unwrap();
    persisted_refinement("orders_sort=name", &session)
        .scope("orders")
        .refine()
        .unwrap();

    assert_eq!(
        stored(&session, "refine_users_sort"),
        Some(json!({"col": "price", "dir": "desc"}))
    );
    assert_eq!(
        stored(&session, "refine_orders_sort"),
        Some(json!({"col": "name", "dir": null}))
    );
    assert!(stored(&session, "refine_sort").is_none());
}

#[test]
fn test_explicit_store_key_and_prefix() {
    let session = SessionStore::new();
    let config = RefineConfig {
        store_prefix: "catalog".to_string(),
        ..Default::default()
    };
    let mut refinement = Refinement::new(params("price=10&sort=price"))
        .builder(SqlQuery::new(TABLE))
        .config(config)
        .filters(product_filters().persist(StoreKind::Transient))
        .sorts(product_sorts().persist_as(StoreKind::Transient, "last_sort"))
        .store(Arc::new(session.clone()));
    refinement.refine().unwrap();

    assert_eq!(session.keys(), vec!["catalog_filters", "last_sort"]);
}

// ============================================================================
// Cookie Store Tests
// ============================================================================

#[test]
fn test_cookie_round_trip() {
    let jar = CookieStore::new(Duration::days(30));
    let refinement = |query: &str, jar: &CookieStore| {
        Refinement::new(params(query))
            .builder(SqlQuery::new(TABLE))
            .filters(product_filters().persist(StoreKind::Durable))
            .store(Arc::new(jar.clone()))
    };

    refinement("status=open", &jar).refine().unwrap();
    let headers: Vec<String> = jar.cookies().iter().map(Cookie::to_header).collect();
    assert_eq!(headers.len(), 1);
    assert!(headers[0].starts_with("refine_filters=%7B%22status%22%3A%5B%22open%22%5D%7D;"));

    // next request arrives with the cookie the client kept
    let next_jar = CookieStore::new(Duration::days(30)).with_request_cookies(
        jar.cookies()
            .into_iter()
            .map(|c| (c.name, c.value)),
    );
    let mut next = refinement("", &next_jar);
    next.refine().unwrap();
    assert_where(&next, "status IN (?)");
    assert_params(&next, &[SqlParam::string("open")]);
}

#[test]
fn test_expired_cookie_is_absent() {
    let jar = CookieStore::default();
    jar.insert(Cookie::new(
        "refine_sort",
        r#"{"col":"price","dir":"desc"}"#,
        Utc::now() - Duration::minutes(1),
    ));

    let mut refinement = Refinement::new(params(""))
        .builder(SqlQuery::new(TABLE))
        .sorts(product_sorts().persist(StoreKind::Durable))
        .store(Arc::new(jar.clone()));
    refinement.refine().unwrap();

    assert_orders(&refinement, &["products.name ASC"]);
}

// ============================================================================
// Store Buffer Tests
// ============================================================================

#[test]
fn test_store_round_trip_through_driver() {
    let session = SessionStore::new();
    let driver: Arc<dyn StoreDriver> = Arc::new(session.clone());

    let mut store = Store::new("refine_filters", Arc::clone(&driver));
    store.put("price", json!(20));
    store.put("status", json!(["open"]));
    store.persist().unwrap();

    let mut fresh = Store::new("refine_filters", Arc::clone(&driver));
    assert_eq!(
        fresh.all().unwrap().map(Value::Object),
        Some(json!({"price": 20, "status": ["open"]}))
    );

    fresh.persist().unwrap();
    assert!(Store::new("refine_filters", driver).resolve().unwrap().is_none());

    session.clear();
    assert!(session.is_empty());
}
