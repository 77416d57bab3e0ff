//! CNN Lite article scraper.
//!
//! This module scrapes articles from [CNN Lite](https://lite.cnn.com), a text-only
//! version of CNN designed for low-bandwidth connections. The HTML is minimal and
//! consistent, which keeps the selectors short.
//!
//! # URL Pattern
//!
//! Articles are linked from the homepage with relative URLs that are resolved
//! to absolute URLs like `https://lite.cnn.com/2025/05/06/article-slug`.

use super::{Discover, MIN_TITLE_CHARS, USER_AGENT, normalize_whitespace};
use crate::error::DiscoveryError;
use crate::models::Candidate;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const CNN_LITE_URL: &str = "https://lite.cnn.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static STORY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card--lite a[href]").expect("static selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".article--lite p").expect("static selector"));
static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".article--lite").expect("static selector"));

/// A headline link found on the front page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub title: String,
    pub link: String,
}

/// Extract headline links from the CNN Lite front page.
///
/// Links are resolved against `base`, headlines shorter than
/// [`MIN_TITLE_CHARS`] are dropped, and repeated links keep their first
/// occurrence.
pub fn parse_index(html: &str, base: &Url) -> Vec<IndexEntry> {
    let document = Html::parse_document(html);

    document
        .select(&STORY_SELECTOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let link = base.join(href).ok()?;
            let title = normalize_whitespace(&element.text().collect::<String>());
            if title.chars().count() < MIN_TITLE_CHARS {
                debug!(%title, %link, "Skipping short headline");
                return None;
            }
            Some(IndexEntry {
                title,
                link: link.to_string(),
            })
        })
        .unique_by(|entry| entry.link.clone())
        .collect()
}

/// Extract the article text from a CNN Lite article page.
///
/// Paragraphs are separated by blank lines. Pages without paragraph markup
/// fall back to the text of the article container. Returns an empty string
/// when nothing is found.
pub fn parse_article(html: &str) -> String {
    let document = Html::parse_document(html);

    let paragraphs = document
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| normalize_whitespace(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>();

    if !paragraphs.is_empty() {
        return paragraphs.join("\n\n");
    }

    document
        .select(&ARTICLE_SELECTOR)
        .map(|element| normalize_whitespace(&element.text().join(" ")))
        .filter(|text| !text.is_empty())
        .join("\n\n")
}

/// Discovery source backed by CNN Lite.
#[derive(Debug, Clone)]
pub struct CnnLite {
    client: Client,
    base: Url,
}

impl CnnLite {
    pub fn new() -> Result<Self, DiscoveryError> {
        Self::with_base(CNN_LITE_URL)
    }

    /// Scrape a CNN Lite-shaped site rooted at `base`.
    pub fn with_base(base: &str) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: Url::parse(base)?,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, DiscoveryError> {
        let text = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// Index the front page for headline links.
    #[instrument(level = "info", skip(self), fields(source = %self.base))]
    pub async fn index_articles(&self) -> Result<Vec<IndexEntry>, DiscoveryError> {
        let html = self.get_text(self.base.as_str()).await?;
        let entries = parse_index(&html, &self.base);

        info!(count = entries.len(), "Indexed CNN article URLs");
        debug!(urls = ?entries.iter().map(|e| &e.link).collect::<Vec<_>>(), "CNN URLs");
        Ok(entries)
    }

    /// Fetch indexed articles one at a time, skipping failures and empty bodies.
    #[instrument(level = "info", skip_all)]
    pub async fn fetch_articles(&self, entries: Vec<IndexEntry>) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = stream::iter(entries)
            .then(|entry| async move {
                let link = entry.link.clone();
                match self.fetch_article(entry).await {
                    Ok(Some(candidate)) => {
                        info!(title = %candidate.title, "[+] Found");
                        Some(candidate)
                    }
                    Ok(None) => {
                        warn!(%link, "CNN fetch produced no content");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, %link, "[-] Could not extract body");
                        None
                    }
                }
            })
            .filter_map(std::future::ready)
            .collect()
            .await;

        info!(count = candidates.len(), "Fetched CNN article contents");
        candidates
    }

    #[instrument(level = "debug", skip_all, fields(link = %entry.link))]
    async fn fetch_article(&self, entry: IndexEntry) -> Result<Option<Candidate>, DiscoveryError> {
        let html = self.get_text(&entry.link).await?;
        let body = parse_article(&html);
        debug!(bytes = body.len(), "Parsed CNN article");

        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(Candidate {
            title: entry.title,
            link: entry.link,
            body,
        }))
    }
}

impl Discover for CnnLite {
    #[instrument(level = "info", skip_all)]
    async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        let entries = self.index_articles().await?;
        Ok(self.fetch_articles(entries).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};

    const FRONT_PAGE: &str = r#"
        <html><body>
          <ul>
            <li class="card--lite"><a href="/2025/05/06/politics/senate-vote">
                Senate passes   sweeping budget bill
            </a></li>
            <li class="card--lite">
              <a href="/2025/05/06/politics/senate-vote">
                Senate passes sweeping budget bill (dup)
              </a>
            </li>
            <li class="card--lite"><a href="/video">Video</a></li>
            <li class="card--lite">
              <a href="https://lite.cnn.com/2025/05/06/world/summit">
                Leaders gather for climate summit
              </a>
            </li>
            <li class="card--lite"><a>Headline without a link at all</a></li>
            <li class="other"><a href="/2025/05/06/ignored">Not a lite card headline</a></li>
          </ul>
        </body></html>
    "#;

    const ARTICLE_PAGE: &str = r#"
        <html><body>
          <h2 class="headline--lite">Senate passes sweeping budget bill</h2>
          <div class="article--lite">
            <p class="paragraph--lite">  The Senate voted 51-49
               on Tuesday. </p>
            <p class="paragraph--lite"></p>
            <p class="paragraph--lite">The bill now goes to the <b>House</b>.</p>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_index_resolves_filters_and_dedupes() {
        let base = Url::parse(CNN_LITE_URL).unwrap();
        let entries = parse_index(FRONT_PAGE, &base);

        assert_eq!(
            entries,
            vec![
                IndexEntry {
                    title: "Senate passes sweeping budget bill".to_string(),
                    link: "https://lite.cnn.com/2025/05/06/politics/senate-vote".to_string(),
                },
                IndexEntry {
                    title: "Leaders gather for climate summit".to_string(),
                    link: "https://lite.cnn.com/2025/05/06/world/summit".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_article_joins_paragraphs() {
        assert_eq!(
            parse_article(ARTICLE_PAGE),
            "The Senate voted 51-49 on Tuesday.\n\nThe bill now goes to the House."
        );
    }

    #[test]
    fn test_parse_article_falls_back_to_container_text() {
        let html = r#"<div class="article--lite">Plain   text body</div>"#;
        assert_eq!(parse_article(html), "Plain text body");
    }

    #[test]
    fn test_parse_article_empty_page() {
        assert_eq!(parse_article("<html><body><p>menu</p></body></html>"), "");
    }

    #[tokio::test]
    async fn test_discover_against_local_site() {
        let front = r#"
            <div class="card--lite"><a href="/a/full">A story with a real body</a></div>
            <div class="card--lite"><a href="/a/empty">A story with nothing in it</a></div>
            <div class="card--lite"><a href="/a/missing">A story that returns 404</a></div>
        "#;
        let app = Router::new()
            .route("/", get(move || async move { front }))
            .route(
                "/a/full",
                get(|| async { r#"<div class="article--lite"><p>Body text.</p></div>"# }),
            )
            .route("/a/empty", get(|| async { "<html></html>" }))
            .route("/a/missing", get(|| async { StatusCode::NOT_FOUND }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let scraper = CnnLite::with_base(&format!("http://{addr}/")).unwrap();
        let candidates = scraper.discover().await.unwrap();

        assert_eq!(
            candidates,
            vec![Candidate {
                title: "A story with a real body".to_string(),
                link: format!("http://{addr}/a/full"),
                body: "Body text.".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_discover_fails_when_front_page_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let scraper = CnnLite::with_base(&format!("http://{addr}/")).unwrap();
        assert!(matches!(
            scraper.discover().await,
            Err(DiscoveryError::Http(_))
        ));
    }
}
