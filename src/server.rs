//! Server families and their directory-listing capabilities
//!
//! A target gains a [`DirectoryListing`] capability once its server
//! family is resolved. The capability lives in an attach-once slot
//! shared between the target and every resource created against it.

use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::error::Error;

/// IIS marker line for the parent directory link
const IIS_PARENT_ENTRY: &str = "[To Parent Directory]";

/// Server families the gate knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// Apache httpd
    Apache,
    /// Microsoft IIS
    Iis,
    /// nginx
    Nginx,
}

impl ServerKind {
    /// Canonical rendering: `Apache`, `IIS`, `Nginx`
    pub fn name(self) -> &'static str {
        match self {
            Self::Apache => "Apache",
            Self::Iis => "IIS",
            Self::Nginx => "Nginx",
        }
    }

    /// The directory-listing capability for this family
    pub fn capability(self) -> &'static dyn DirectoryListing {
        match self {
            Self::Apache => &ApacheListing,
            Self::Iis => &IisListing,
            Self::Nginx => &NginxListing,
        }
    }

    /// Guess the family from a `Server` response header value
    ///
    /// Unrecognized or missing product names fall back to Apache so a
    /// capability is always attached.
    pub fn from_server_header(header: Option<&str>) -> Self {
        let Some(value) = header else {
            return Self::Apache;
        };
        let value = value.to_lowercase();

        if value.contains("iis") {
            Self::Iis
        } else if value.contains("nginx") {
            Self::Nginx
        } else {
            Self::Apache
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "apache" => Ok(Self::Apache),
            "iis" => Ok(Self::Iis),
            "nginx" => Ok(Self::Nginx),
            _ => Err(Error::InvalidServer(s.to_string())),
        }
    }
}

/// Operations a target or resource gains once its server family is known
pub trait DirectoryListing: Send + Sync {
    /// Family this capability belongs to
    fn kind(&self) -> ServerKind;

    /// Whether the body is a server-generated index page
    fn is_listing(&self, body: &str) -> bool;

    /// Entry names linked from an index page
    fn entries(&self, body: &str) -> Vec<String>;
}

/// Attach-once capability slot
///
/// The slot is cloned into every resource created against a target, so
/// a resolution performed after a resource was constructed is still
/// visible to it. Only the first attachment takes effect.
#[derive(Debug, Clone, Default)]
pub struct ServerModule {
    slot: Arc<OnceLock<ServerKind>>,
}

impl ServerModule {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the capability for `kind`, returning the attached family
    ///
    /// A later attach attempt leaves the original in place.
    pub fn attach(&self, kind: ServerKind) -> ServerKind {
        *self.slot.get_or_init(|| kind)
    }

    /// The attached family, if resolution has happened
    pub fn kind(&self) -> Option<ServerKind> {
        self.slot.get().copied()
    }

    /// The attached capability, if resolution has happened
    pub fn capability(&self) -> Option<&'static dyn DirectoryListing> {
        self.kind().map(ServerKind::capability)
    }
}

/// Apache `mod_autoindex` pages
pub struct ApacheListing;

impl DirectoryListing for ApacheListing {
    fn kind(&self) -> ServerKind {
        ServerKind::Apache
    }

    fn is_listing(&self, body: &str) -> bool {
        page_title(body).is_some_and(|t| t.starts_with("Index of"))
    }

    fn entries(&self, body: &str) -> Vec<String> {
        anchor_hrefs(body)
            .into_iter()
            .filter(|href| !is_index_chrome_link(href))
            .collect()
    }
}

/// nginx `autoindex` pages
pub struct NginxListing;

impl DirectoryListing for NginxListing {
    fn kind(&self) -> ServerKind {
        ServerKind::Nginx
    }

    fn is_listing(&self, body: &str) -> bool {
        page_title(body).is_some_and(|t| t.starts_with("Index of"))
    }

    fn entries(&self, body: &str) -> Vec<String> {
        anchor_hrefs(body)
            .into_iter()
            .filter(|href| !is_index_chrome_link(href))
            .collect()
    }
}

/// IIS directory-browsing pages
pub struct IisListing;

impl DirectoryListing for IisListing {
    fn kind(&self) -> ServerKind {
        ServerKind::Iis
    }

    fn is_listing(&self, body: &str) -> bool {
        // IIS titles the page "<host> - <path>"; the parent marker is a
        // stronger signal when present.
        if body.contains(IIS_PARENT_ENTRY) {
            return true;
        }
        let re = Regex::new(r"(?i)<title>[^<]+ - /[^<]*</title>").expect("static regex");
        re.is_match(body)
    }

    fn entries(&self, body: &str) -> Vec<String> {
        // IIS hrefs are absolute paths; the anchor text carries the
        // plain entry name.
        let Ok(selector) = Selector::parse("a") else {
            return Vec::new();
        };

        Html::parse_document(body)
            .select(&selector)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty() && text != IIS_PARENT_ENTRY)
            .collect()
    }
}

/// Extract the page title, if any
fn page_title(body: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(body);
    let title = document.select(&selector).next()?;
    Some(title.text().collect::<String>().trim().to_string())
}

/// All anchor href values in the document
fn anchor_hrefs(body: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };

    Html::parse_document(body)
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Links an index page adds around the entries: column sorting, parent
/// directory, fragments
fn is_index_chrome_link(href: &str) -> bool {
    href.is_empty()
        || href.starts_with('?')
        || href.starts_with('#')
        || href.starts_with('/')
        || href == "../"
        || href == "./"
}
