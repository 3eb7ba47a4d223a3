//! The remote site under test
//!
//! A [`Target`] owns the homepage response (fetched at most once per
//! run), the server capability slot, and the WordPress fingerprinting
//! used by the gate. Per-path [`RemoteResource`] objects share the
//! target's client and capability slot.

use crate::error::{Error, Result};
use crate::server::{ServerKind, ServerModule};
use regex::Regex;
use reqwest::header::{HeaderMap, SERVER, SET_COOKIE};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// User agent for requests (standard Chrome on Windows)
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Request timeout in seconds
const TIMEOUT_SECS: u64 = 30;

/// Hosted-blogging domain that is out of scope for scanning
const HOSTED_DOMAIN: &str = "wordpress.com";

/// WordPress cookie prefixes
const WP_COOKIE_PREFIXES: &[&str] = &["wordpress_", "wp-"];
const WP_LANG_COOKIE: &str = "wp_lang";

/// rel target advertised by the WordPress REST API
const WP_REST_LINK: &str = "https://api.w.org/";

/// Build the HTTP client used for all gate requests
pub fn default_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .danger_accept_invalid_certs(false)
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

/// Homepage response retained for the lifetime of the run
#[derive(Debug, Clone)]
pub struct HomepageResponse {
    /// URL after following any redirects
    pub effective_url: Url,
    /// Final response status
    pub status: StatusCode,
    /// Final response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: String,
}

impl HomepageResponse {
    /// Value of the `Server` header, if readable
    pub fn server_header(&self) -> Option<&str> {
        self.headers.get(SERVER)?.to_str().ok()
    }

    fn set_cookie_values(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }
}

/// The remote site a scan was requested against
#[derive(Debug)]
pub struct Target {
    url: Url,
    client: Client,
    homepage: OnceCell<HomepageResponse>,
    server: ServerModule,
}

impl Target {
    /// Create a target for the given URL
    pub fn new(url: Url, client: Client) -> Self {
        Self {
            url,
            client,
            homepage: OnceCell::new(),
            server: ServerModule::new(),
        }
    }

    /// URL the scan was requested against
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP client shared with resources
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Capability slot shared with resources
    pub fn server_module(&self) -> &ServerModule {
        &self.server
    }

    /// The homepage response, fetched on first use and cached
    ///
    /// Every later inspection reuses the cached response; no second
    /// network round trip happens for the homepage within a run.
    pub async fn homepage(&self) -> Result<&HomepageResponse> {
        self.homepage
            .get_or_try_init(|| async {
                debug!(url = %self.url, "fetching homepage");
                fetch(&self.client, &self.url).await
            })
            .await
    }

    /// Probe the server family from the homepage `Server` header
    pub async fn detected_server(&self) -> Result<ServerKind> {
        let homepage = self.homepage().await?;
        Ok(ServerKind::from_server_header(homepage.server_header()))
    }

    /// Attach the resolved server capability; first attachment wins
    pub fn attach_server(&self, kind: ServerKind) -> ServerKind {
        self.server.attach(kind)
    }

    /// The attached server family, if resolved
    pub fn server(&self) -> Option<ServerKind> {
        self.server.kind()
    }

    /// Whether the target is a wordpress.com hosted blog
    pub fn wordpress_hosted(&self) -> bool {
        match self.url.host_str() {
            Some(host) => {
                let host = host.to_lowercase();
                host == HOSTED_DOMAIN || host.ends_with(&format!(".{HOSTED_DOMAIN}"))
            }
            None => false,
        }
    }

    /// Whether the site fingerprints as WordPress
    pub async fn wordpress(&self) -> Result<bool> {
        let homepage = self.homepage().await?;
        Ok(looks_like_wordpress(homepage))
    }

    /// Create a resource for a path below the target
    pub fn resource(&self, path: &str) -> Result<RemoteResource> {
        let url = self
            .url
            .join(path)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(RemoteResource::new(url, self))
    }
}

/// A single remote path checked against the target
///
/// Holds a clone of the target's capability slot, so resolving the
/// server family after the resource was created still gives it the
/// directory-listing operations.
#[derive(Debug)]
pub struct RemoteResource {
    url: Url,
    client: Client,
    server: ServerModule,
}

impl RemoteResource {
    /// Create a resource sharing the target's client and capability slot
    pub fn new(url: Url, target: &Target) -> Self {
        Self {
            url,
            client: target.client().clone(),
            server: target.server_module().clone(),
        }
    }

    /// Resource URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Server family attached to the owning target, if resolved
    pub fn server(&self) -> Option<ServerKind> {
        self.server.kind()
    }

    /// Whether the resource serves a directory index page
    ///
    /// False when the server family has not been resolved yet or the
    /// resource does not answer with a success status.
    pub async fn directory_listing(&self) -> Result<bool> {
        let Some(capability) = self.server.capability() else {
            return Ok(false);
        };

        let response = fetch(&self.client, &self.url).await?;
        if !response.status.is_success() {
            return Ok(false);
        }

        Ok(capability.is_listing(&response.body))
    }

    /// Entries of the directory index page, if the resource serves one
    pub async fn directory_listing_entries(&self) -> Result<Vec<String>> {
        let Some(capability) = self.server.capability() else {
            return Ok(Vec::new());
        };

        let response = fetch(&self.client, &self.url).await?;
        if !response.status.is_success() || !capability.is_listing(&response.body) {
            return Ok(Vec::new());
        }

        Ok(capability.entries(&response.body))
    }
}

/// Fetch a URL, following redirects, keeping the effective URL
async fn fetch(client: &Client, url: &Url) -> Result<HomepageResponse> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| Error::HttpRequest(e.to_string()))?;

    let effective_url = response.url().clone();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| Error::HttpRequest(e.to_string()))?;

    Ok(HomepageResponse {
        effective_url,
        status,
        headers,
        body,
    })
}

/// WordPress identity fingerprint over the cached homepage
fn looks_like_wordpress(homepage: &HomepageResponse) -> bool {
    has_wp_meta_generator(&homepage.body)
        || has_wp_asset_paths(&homepage.body)
        || has_wp_rest_link(&homepage.body)
        || has_wp_cookies(homepage)
}

/// Meta generator tag starting with "WordPress"
fn has_wp_meta_generator(body: &str) -> bool {
    let Ok(selector) = Selector::parse("meta[name='generator']") else {
        return false;
    };

    Html::parse_document(body).select(&selector).any(|element| {
        element
            .value()
            .attr("content")
            .is_some_and(|content| content.starts_with("WordPress"))
    })
}

/// Links into wp-content/ or wp-includes/
fn has_wp_asset_paths(body: &str) -> bool {
    let re = Regex::new(r"/wp-(?:content|includes)/").expect("static regex");
    re.is_match(body)
}

/// REST API discovery link
fn has_wp_rest_link(body: &str) -> bool {
    body.contains(WP_REST_LINK)
}

/// WordPress-specific cookies in the response
fn has_wp_cookies(homepage: &HomepageResponse) -> bool {
    homepage.set_cookie_values().any(|cookie| {
        WP_COOKIE_PREFIXES.iter().any(|p| cookie.starts_with(p))
            || cookie.starts_with(WP_LANG_COOKIE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WP_HOMEPAGE: &str = r#"<html><head>
<meta name="generator" content="WordPress 6.4.3" />
<link rel="stylesheet" href="/wp-content/themes/astra/style.css?ver=4.1" />
</head><body>Hello</body></html>"#;

    const PLAIN_HOMEPAGE: &str = "<html><head><title>Shop</title></head><body>Hi</body></html>";

    fn target_for(server: &MockServer) -> Target {
        let url = Url::parse(&server.uri()).unwrap();
        Target::new(url, default_client().unwrap())
    }

    #[tokio::test]
    async fn homepage_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WP_HOMEPAGE))
            .expect(1)
            .mount(&server)
            .await;

        let target = target_for(&server);
        let first = target.homepage().await.unwrap().effective_url.clone();
        let second = target.homepage().await.unwrap().effective_url.clone();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn effective_url_follows_redirects() {
        let server = MockServer::start().await;
        let install_url = format!("{}/wp-admin/install.php", server.uri());

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", install_url.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-admin/install.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("install"))
            .mount(&server)
            .await;

        let target = target_for(&server);
        let homepage = target.homepage().await.unwrap();
        assert_eq!(homepage.effective_url.path(), "/wp-admin/install.php");
    }

    #[tokio::test]
    async fn fingerprints_wordpress_from_meta_and_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WP_HOMEPAGE))
            .mount(&server)
            .await;

        let target = target_for(&server);
        assert!(target.wordpress().await.unwrap());
    }

    #[tokio::test]
    async fn plain_site_is_not_wordpress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAIN_HOMEPAGE))
            .mount(&server)
            .await;

        let target = target_for(&server);
        assert!(!target.wordpress().await.unwrap());
    }

    #[tokio::test]
    async fn wordpress_cookie_counts_as_fingerprint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PLAIN_HOMEPAGE)
                    .insert_header("Set-Cookie", "wordpress_test_cookie=WP+Cookie+check"),
            )
            .mount(&server)
            .await;

        let target = target_for(&server);
        assert!(target.wordpress().await.unwrap());
    }

    #[tokio::test]
    async fn detects_server_from_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PLAIN_HOMEPAGE)
                    .insert_header("Server", "nginx/1.25.3"),
            )
            .mount(&server)
            .await;

        let target = target_for(&server);
        assert_eq!(target.detected_server().await.unwrap(), ServerKind::Nginx);
    }

    #[test]
    fn hosted_detection() {
        let client = default_client().unwrap();

        let hosted = Target::new(Url::parse("http://ex.wordpress.com").unwrap(), client.clone());
        assert!(hosted.wordpress_hosted());

        let apex = Target::new(Url::parse("http://wordpress.com").unwrap(), client.clone());
        assert!(apex.wordpress_hosted());

        let self_hosted = Target::new(Url::parse("http://ex.lo/").unwrap(), client.clone());
        assert!(!self_hosted.wordpress_hosted());

        // Not a subdomain, just a similar name
        let lookalike = Target::new(Url::parse("http://notwordpress.com").unwrap(), client);
        assert!(!lookalike.wordpress_hosted());
    }

    #[tokio::test]
    async fn resource_created_before_resolution_gains_capability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-content/uploads/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Index of /wp-content/uploads/</title></head>
<body><pre><a href="../">../</a>
<a href="dump.sql">dump.sql</a>
</pre></body></html>"#,
            ))
            .mount(&server)
            .await;

        let target = target_for(&server);
        let resource = target.resource("/wp-content/uploads/").unwrap();
        assert!(resource.server().is_none());
        assert!(!resource.directory_listing().await.unwrap());

        target.attach_server(ServerKind::Nginx);

        assert_eq!(resource.server(), Some(ServerKind::Nginx));
        assert!(resource.directory_listing().await.unwrap());
        assert_eq!(
            resource.directory_listing_entries().await.unwrap(),
            vec!["dump.sql"]
        );
    }
}
