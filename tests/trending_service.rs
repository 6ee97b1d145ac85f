use github_trending::error::TrendingError;
use github_trending::trending::{Period, TrendingParser, TrendingQuery};
use github_trending::App;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

mod common;
use common::test_helpers::*;

#[test]
fn test_parses_full_page_with_missing_description() {
    let parser = TrendingParser::new().unwrap();
    let repos = parser.parse(&trending_page(25, &[7]), Period::Weekly).unwrap();

    assert_eq!(repos.len(), 25);
    for (i, repo) in repos.iter().enumerate() {
        let n = i as u64 + 1;
        assert_eq!(repo.full_name(), format!("owner{}/repo{}", n, n));
        assert_eq!(repo.stars, n * 1000);
        assert_eq!(repo.forks, n * 10);
        assert_eq!(repo.stars_in_period, n);
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert_eq!(repo.period, Period::Weekly);
        assert_eq!(repo.contributors.len(), 1);
    }
    assert_eq!(repos[6].description, "");
    assert_eq!(repos[5].description, "Project number 6 does things.");
    assert_eq!(repos[0].url, "https://github.com/owner1/repo1");
}

#[test]
fn test_unrecognized_page_is_parse_error() {
    let parser = TrendingParser::new().unwrap();
    let err = parser
        .parse("<html><body><h1>Are you a robot?</h1></body></html>", Period::Daily)
        .unwrap_err();
    assert!(matches!(err, TrendingError::Parse(_)));
}

#[tokio::test]
async fn test_fetch_then_cache_hit() {
    setup_test_logger();
    let temp_dir = TempDir::new().unwrap();
    let mut server = setup_test_server().await;
    let config = create_test_config(&server.url(), temp_dir.path());

    let page = server
        .mock("GET", "/trending/rust")
        .match_query(mockito::Matcher::UrlEncoded("since".into(), "daily".into()))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(trending_page(25, &[]))
        .expect(1)
        .create_async()
        .await;

    let app = App::from_config(&config).unwrap();
    let query = TrendingQuery::new(Some("Rust"), Period::Daily, 10);

    let first = app.trending.fetch(&query, false).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.repositories.len(), 10);
    assert_eq!(first.repositories[0].url, format!("{}/owner1/repo1", server.url()));

    let equivalent = TrendingQuery::new(Some(" rust "), Period::Daily, 10);
    let second = app.trending.fetch(&equivalent, false).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.repositories, first.repositories);

    page.assert_async().await;
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let temp_dir = TempDir::new().unwrap();
    let mut server = setup_test_server().await;
    let config = create_test_config(&server.url(), temp_dir.path());

    let page = server
        .mock("GET", "/trending")
        .match_query(mockito::Matcher::UrlEncoded("since".into(), "monthly".into()))
        .with_status(200)
        .with_body(trending_page(3, &[]))
        .expect(2)
        .create_async()
        .await;

    let app = App::from_config(&config).unwrap();
    let query = TrendingQuery::new(None, Period::Monthly, 0);

    app.trending.fetch(&query, false).await.unwrap();
    let refreshed = app.trending.fetch(&query, true).await.unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.repositories.len(), 3);

    // The refetched listing was written back
    let cached = app.trending.fetch(&query, false).await.unwrap();
    assert!(cached.from_cache);

    page.assert_async().await;
}

#[tokio::test]
async fn test_empty_listing_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut server = setup_test_server().await;
    let config = create_test_config(&server.url(), temp_dir.path());

    let _page = server
        .mock("GET", "/trending/zig")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(empty_trending_page())
        .create_async()
        .await;

    let app = App::from_config(&config).unwrap();
    let result = app
        .trending
        .fetch(&TrendingQuery::new(Some("zig"), Period::Daily, 25), false)
        .await
        .unwrap();
    assert!(result.repositories.is_empty());
}

#[tokio::test]
async fn test_not_found_surfaces_fetch_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut server = setup_test_server().await;
    let config = create_test_config(&server.url(), temp_dir.path());

    let missing = server
        .mock("GET", "/trending/no-such-language")
        .match_query(mockito::Matcher::Any)
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let app = App::from_config(&config).unwrap();
    let err = app
        .trending
        .fetch(&TrendingQuery::new(Some("no such language"), Period::Daily, 25), false)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    missing.assert_async().await;
}
