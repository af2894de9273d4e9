use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use routemeter::server::service;
use routemeter::{
    Handler, InstrumentOpts, InstrumentedRouter, MockRegistry, PrometheusRegistry,
    RouteLabelMode, handler_fn,
};

fn not_found() -> impl Handler {
    handler_fn(|_ctx, w, _req| {
        Box::pin(async move {
            w.set_status(StatusCode::NOT_FOUND);
            let _ = w.write(b"not found!").await;
        })
    })
}

fn slow(body: &'static [u8], delay: Duration) -> impl Handler {
    handler_fn(move |_ctx, w, _req| {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            let _ = w.write(body).await;
        })
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "shop.example.com")
        .body(Body::empty())
        .unwrap()
}

fn find_line<'a>(text: &'a str, prefix: &str, needles: &[&str]) -> Option<&'a str> {
    text.lines()
        .find(|line| line.starts_with(prefix) && needles.iter().all(|n| line.contains(n)))
}

#[tokio::test]
async fn test_not_found_route_end_to_end() {
    let registry = Arc::new(PrometheusRegistry::new());
    let mut router = InstrumentedRouter::with_opts(registry.clone(), InstrumentOpts::default());
    router.get("/items/{id}", not_found()).unwrap();
    let app = service(&router);

    let response = app.oneshot(get("/items/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"not found!");

    let text = registry.gather_text().unwrap();
    let counter = find_line(
        &text,
        "http_requests_total{",
        &["method=\"get\"", "code=\"404\"", "route=\"/items/{id}\""],
    )
    .unwrap();
    assert!(counter.ends_with(" 1"), "{counter}");

    let response_size = find_line(
        &text,
        "http_response_size_bytes_sum{",
        &["route=\"/items/{id}\""],
    )
    .unwrap();
    assert!(response_size.ends_with(" 10"), "{response_size}");

    let duration = find_line(
        &text,
        "http_request_duration_microseconds_count{",
        &["route=\"/items/{id}\""],
    )
    .unwrap();
    assert!(duration.ends_with(" 1"), "{duration}");

    assert!(find_line(&text, "http_request_size_bytes_count{", &["route=\"/items/{id}\""]).is_some());
}

#[tokio::test]
async fn test_unknown_path_answers_404_without_metrics() {
    let registry = Arc::new(MockRegistry::new());
    let mut router = InstrumentedRouter::with_opts(registry.clone(), InstrumentOpts::default());
    router.get("/known", not_found()).unwrap();

    let response = service(&router).oneshot(get("/elsewhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(registry.counter_value("http_requests_total", &["get", "404", "/elsewhere"]), 0.0);
    assert!(registry.families("http_requests_total")[0].samples().is_empty());
}

#[tokio::test]
async fn test_wrong_method_answers_405_with_allow() {
    let registry = Arc::new(MockRegistry::new());
    let mut router = InstrumentedRouter::with_opts(registry.clone(), InstrumentOpts::default());
    router.get("/items/{id}", not_found()).unwrap();
    router.put("/items/{id}", not_found()).unwrap();

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/items/1")
        .body(Body::empty())
        .unwrap();
    let response = service(&router).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = response.headers()[header::ALLOW].to_str().unwrap();
    assert!(allow.contains("GET") && allow.contains("PUT"), "{allow}");
    assert!(registry.families("http_requests_total")[0].samples().is_empty());
}

#[tokio::test]
async fn test_concurrent_routes_are_independent() {
    let registry = Arc::new(MockRegistry::new());
    let mut router = InstrumentedRouter::with_opts(registry.clone(), InstrumentOpts::default());
    router
        .get("/fast", slow(b"f", Duration::from_millis(1)))
        .unwrap();
    router
        .get("/slow", slow(b"slow body", Duration::from_millis(20)))
        .unwrap();
    let app = service(&router);

    let (fast, slow) = tokio::join!(
        app.clone().oneshot(get("/fast")),
        app.clone().oneshot(get("/slow")),
    );
    assert_eq!(fast.unwrap().status(), StatusCode::OK);
    assert_eq!(slow.unwrap().status(), StatusCode::OK);

    assert_eq!(registry.counter_value("http_requests_total", &["get", "200", "/fast"]), 1.0);
    assert_eq!(registry.counter_value("http_requests_total", &["get", "200", "/slow"]), 1.0);
    assert_eq!(registry.observations("http_response_size_bytes", &["/fast"]), vec![1.0]);
    assert_eq!(registry.observations("http_response_size_bytes", &["/slow"]), vec![9.0]);

    let slow_us = registry.observations("http_request_duration_microseconds", &["/slow"]);
    assert_eq!(slow_us.len(), 1);
    assert!(slow_us[0] >= 20_000.0, "{slow_us:?}");
}

#[tokio::test]
async fn test_duplicate_registration_keeps_one_descriptor_set() {
    let registry = Arc::new(PrometheusRegistry::new());
    let mut router = InstrumentedRouter::with_opts(registry.clone(), InstrumentOpts::default());
    router.get("/dup", not_found()).unwrap();
    router.get("/dup", not_found()).unwrap();
    router.put("/dup", not_found()).unwrap();

    let app = service(&router);
    app.clone().oneshot(get("/dup")).await.unwrap();

    let text = registry.gather_text().unwrap();
    let type_lines = text
        .lines()
        .filter(|l| l.starts_with("# TYPE http_requests_total "))
        .count();
    assert_eq!(type_lines, 1);
}

#[tokio::test]
async fn test_const_label_routes_through_prometheus() {
    let registry = Arc::new(PrometheusRegistry::new());
    let opts = InstrumentOpts::default()
        .with_namespace("shop")
        .with_route_label(RouteLabelMode::ConstLabel);
    let mut router = InstrumentedRouter::with_opts(registry.clone(), opts);
    router.get("/cart", not_found()).unwrap();
    router.get("/checkout", not_found()).unwrap();
    let app = service(&router);

    app.clone().oneshot(get("/cart")).await.unwrap();
    app.clone().oneshot(get("/checkout")).await.unwrap();

    let text = registry.gather_text().unwrap();
    for route in ["/cart", "/checkout"] {
        let label = format!("route=\"{route}\"");
        let line = find_line(&text, "shop_http_requests_total{", &[label.as_str(), "code=\"404\""]).unwrap();
        assert!(line.ends_with(" 1"), "{line}");
    }
}
