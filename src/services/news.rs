//! Headline provider
//!
//! Fetches a news front page and extracts the first N headline/link pairs.
//! The selectors are site-specific; anything implementing [`NewsProvider`]
//! can stand in for the default scraper.

use crate::error::{MathRpcError, Result};
use crate::types::Headline;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

/// Link text used when a headline has no resolvable anchor
pub const NO_LINK: &str = "Sem link";

static HEADLINE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h3.title__element.headlineSub__content__title")
        .expect("valid headline selector")
});

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("valid anchor selector"));

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Return up to `count` headlines, newest page order
    async fn fetch_headlines(&self, count: usize) -> Result<Vec<Headline>>;
}

/// Scraper for the UOL front page
pub struct UolNewsProvider {
    url: String,
    client: reqwest::Client,
}

impl UolNewsProvider {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl NewsProvider for UolNewsProvider {
    async fn fetch_headlines(&self, count: usize) -> Result<Vec<Headline>> {
        debug!("Fetching headlines from {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(MathRpcError::News(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response.text().await?;
        let headlines = parse_headlines(&body, &self.url, count);
        info!("Extracted {} headlines", headlines.len());
        Ok(headlines)
    }
}

fn anchor_href<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    if let Some(anchor) = element.select(&ANCHOR_SELECTOR).next() {
        if let Some(href) = anchor.value().attr("href") {
            return Some(href);
        }
    }

    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

fn resolve_link(href: &str, base_url: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// Extract up to `count` headlines from a front-page document
pub fn parse_headlines(html: &str, base_url: &str, count: usize) -> Vec<Headline> {
    let document = Html::parse_document(html);

    document
        .select(&HEADLINE_SELECTOR)
        .filter_map(|h3| {
            let title = h3
                .text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if title.is_empty() {
                return None;
            }

            let link = anchor_href(h3)
                .filter(|href| !href.is_empty())
                .map(|href| resolve_link(href, base_url))
                .unwrap_or_else(|| NO_LINK.to_string());

            Some(Headline { title, link })
        })
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <a href="https://www.uol.com.br/a"><h3 class="title__element headlineSub__content__title">Primeira</h3></a>
          <h3 class="title__element headlineSub__content__title"><a href="/b">Segunda</a></h3>
          <h3 class="title__element headlineSub__content__title">   </h3>
          <h3 class="title__element headlineSub__content__title">Sem âncora</h3>
          <h3 class="other">Ignorada</h3>
        </body></html>
    "#;

    #[test]
    fn test_parse_headlines() {
        let headlines = parse_headlines(PAGE, "https://www.uol.com.br/", 10);

        assert_eq!(headlines.len(), 3);
        assert_eq!(headlines[0].title, "Primeira");
        assert_eq!(headlines[0].link, "https://www.uol.com.br/a");
        assert_eq!(headlines[1].link, "https://www.uol.com.br/b");
        assert_eq!(headlines[2].title, "Sem âncora");
        assert_eq!(headlines[2].link, NO_LINK);
    }

    #[test]
    fn test_parse_headlines_respects_count() {
        let headlines = parse_headlines(PAGE, "https://www.uol.com.br/", 1);
        assert_eq!(headlines.len(), 1);
        assert!(parse_headlines(PAGE, "https://www.uol.com.br/", 0).is_empty());
    }

    #[test]
    fn test_parse_headlines_empty_page() {
        assert!(parse_headlines("<html></html>", "https://x/", 5).is_empty());
    }
}
