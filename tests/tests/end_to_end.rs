use sitecrawl_crawler::{crawl, fetch_robots, CrawlConfig, Crawler};
use sitecrawl_tests::{http_capabilities, url, MockSite};
use std::collections::BTreeSet;
use std::sync::Arc;
use wiremock::ResponseTemplate;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(site: &MockSite) -> CrawlConfig {
    CrawlConfig {
        ignore_robots_txt: true,
        max_parallel_requests: 4,
        ..CrawlConfig::for_seed(site.url("/"))
    }
}

#[tokio::test]
async fn crawls_whole_site_once() {
    init_logging();
    let site = MockSite::start().await;
    site.page(
        "/",
        r#"<a href="/a">A</a> <a href="b">B</a> <a href="http://other.tld/">Out</a>"#,
    )
    .await;
    site.page("/a", r#"<a href="/b">B</a> <a href="/a#top">Self</a> <a href="/">Home</a>"#)
        .await;
    site.page("/b", r#"<a href="/missing">Gone</a> <a href="//a">Odd</a>"#)
        .await;

    let (_, capabilities) = http_capabilities();
    let report = crawl(&config(&site), capabilities).await.unwrap();

    let crawled: BTreeSet<String> = report.pages.keys().cloned().collect();
    let expected: BTreeSet<String> = ["/", "/a", "/b", "/missing"]
        .iter()
        .map(|p| site.url(p))
        .collect();
    assert_eq!(crawled, expected);

    assert!(report.pages[&site.url("/missing")].error.is_some());
    // Discovered links are kept as resolved, fragments included
    assert!(report.pages[&site.url("/a")]
        .links
        .contains(&site.url("/a#top")));
    assert_eq!(report.stats.pages_crawled, 4);
    assert_eq!(report.stats.pages_failed, 1);

    for route in ["/", "/a", "/b"] {
        assert_eq!(site.hits("GET", route).await, 1, "{}", route);
    }
}

#[tokio::test]
async fn respects_robots_txt() {
    init_logging();
    let site = MockSite::start().await;
    site.robots("User-agent: *\nDisallow: /private\n").await;
    site.page("/", r#"<a href="/private/data">P</a> <a href="/open">O</a>"#)
        .await;
    site.page("/open", "<p>nothing here</p>").await;
    site.page("/private/data", "<p>secret</p>").await;

    let (fetcher, capabilities) = http_capabilities();
    let robots = fetch_robots(fetcher.client(), &url(&site.url("/")))
        .await
        .expect("robots.txt is served");
    let config = CrawlConfig {
        ignore_robots_txt: false,
        ..config(&site)
    };
    let settings = config.validate().unwrap();
    let report = Crawler::new(settings, capabilities.with_robots(Arc::new(robots)))
        .run()
        .await;

    assert!(report.pages.contains_key(&site.url("/open")));
    assert!(!report.pages.contains_key(&site.url("/private/data")));
    assert_eq!(site.hits("GET", "/private/data").await, 0);
}

#[tokio::test]
async fn stops_at_page_budget() {
    init_logging();
    let site = MockSite::start().await;
    for i in 0..10 {
        let links: String = (0..10)
            .map(|j| format!(r#"<a href="/p{}">p{}</a>"#, j, j))
            .collect();
        site.page(&format!("/p{}", i), &links).await;
    }
    site.page("/", r#"<a href="/p0">start</a>"#).await;

    let config = CrawlConfig {
        max_pages: 3,
        ..config(&site)
    };
    let (_, capabilities) = http_capabilities();
    let report = crawl(&config, capabilities).await.unwrap();

    assert_eq!(report.pages.len(), 3);
    assert!(report.pages.contains_key(&site.url("/")));
    assert!(report.pages.contains_key(&site.url("/p0")));
}

#[tokio::test]
async fn head_probe_skips_non_html() {
    init_logging();
    let site = MockSite::start().await;
    site.page("/", r#"<a href="/report.pdf">PDF</a>"#).await;
    site.respond(
        "HEAD",
        "/",
        ResponseTemplate::new(200).insert_header("content-type", "text/html"),
    )
    .await;
    site.respond(
        "HEAD",
        "/report.pdf",
        ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
    )
    .await;
    site.respond(
        "GET",
        "/report.pdf",
        ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"),
    )
    .await;

    let config = CrawlConfig {
        do_head_requests: true,
        ..config(&site)
    };
    let (_, capabilities) = http_capabilities();
    let report = crawl(&config, capabilities).await.unwrap();

    let pdf = &report.pages[&site.url("/report.pdf")];
    assert!(pdf.links.is_empty());
    assert!(pdf.error.as_deref().unwrap_or_default().contains("content type"));
    assert_eq!(site.hits("GET", "/report.pdf").await, 0);
    assert_eq!(site.hits("HEAD", "/").await, 1);
}

#[tokio::test]
async fn report_serializes_to_json() {
    init_logging();
    let site = MockSite::start().await;
    site.page(
        "/",
        r#"<link rel="canonical" href="/home"><a href="/gone">x</a>"#,
    )
    .await;

    let (_, capabilities) = http_capabilities();
    let report = crawl(&config(&site), capabilities).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["seed"], site.url("/"));
    assert_eq!(json["pages"][site.url("/")]["canonical"], "/home");
    assert_eq!(
        json["pages"][site.url("/gone")]["error"],
        "got status code 404"
    );
    assert_eq!(json["stats"]["pages_crawled"], 2);
}
