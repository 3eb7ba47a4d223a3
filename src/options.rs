//! Run configuration and the declared option contract

use crate::error::{Error, Result};
use crate::server::ServerKind;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Allowed URL schemes for targets
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Output mode for gate events
///
/// `Cli` is the interactive session marker: it is the only mode in which
/// the operator may be prompted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable CLI output (interactive)
    #[default]
    Cli,
    /// JSON event lines (non-interactive)
    Json,
}

impl Format {
    /// Whether this mode allows prompting the operator
    pub fn interactive(self) -> bool {
        matches!(self, Self::Cli)
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "json" => Ok(Self::Json),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

/// Requiredness rule carried by a declared option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// May be omitted
    Optional,
    /// Mandatory unless one of the named options is present
    RequiredUnless(&'static [&'static str]),
}

/// One entry of the option contract
#[derive(Debug, Clone, Copy)]
pub struct DeclaredOption {
    /// Symbolic option name
    pub name: &'static str,
    /// Requiredness rule
    pub requirement: Requirement,
}

/// The options recognized by the gate, in declaration order
///
/// The target URL comes first and is mandatory unless an explicit
/// database-update run is requested. The CLI surface in `main.rs`
/// mirrors this table; [`OptionsBuilder::build`] re-enforces it for
/// library callers.
pub const DECLARED_OPTIONS: &[DeclaredOption] = &[
    DeclaredOption {
        name: "url",
        requirement: Requirement::RequiredUnless(&["update"]),
    },
    DeclaredOption {
        name: "server",
        requirement: Requirement::Optional,
    },
    DeclaredOption {
        name: "force",
        requirement: Requirement::Optional,
    },
    DeclaredOption {
        name: "update",
        requirement: Requirement::Optional,
    },
    DeclaredOption {
        name: "format",
        requirement: Requirement::Optional,
    },
];

/// Immutable configuration for one gate run
#[derive(Debug, Clone)]
pub struct ParsedOptions {
    /// Target URL; absent only for update-only runs
    pub url: Option<Url>,
    /// Explicit server family override
    pub server: Option<ServerKind>,
    /// Proceed even if the target fails the WordPress identity check
    pub force: bool,
    /// Database update request: explicit yes, explicit no, or unset
    pub update: Option<bool>,
    /// Output mode
    pub format: Format,
    /// Verbose diagnostics
    pub verbose: bool,
    /// Directory holding the local vulnerability database
    pub data_dir: PathBuf,
}

impl ParsedOptions {
    /// Create a builder for run options
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Whether the operator may be prompted during this run
    pub fn interactive(&self) -> bool {
        self.format.interactive()
    }
}

/// Builder for [`ParsedOptions`]
#[derive(Debug, Default)]
pub struct OptionsBuilder {
    url: Option<String>,
    server: Option<ServerKind>,
    force: bool,
    update: Option<bool>,
    format: Format,
    verbose: bool,
    data_dir: Option<PathBuf>,
}

impl OptionsBuilder {
    /// Create a builder with all options unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target URL or domain
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Override the server family instead of probing for it
    pub fn server(mut self, server: ServerKind) -> Self {
        self.server = Some(server);
        self
    }

    /// Scan even if the target does not look like WordPress
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Explicitly request (`Some(true)`) or refuse (`Some(false)`) a
    /// database update; `None` leaves the decision to the gate
    pub fn update(mut self, update: Option<bool>) -> Self {
        self.update = update;
        self
    }

    /// Set the output mode
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Enable verbose diagnostics
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the local database directory
    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// Validate the cross-field constraints and build the options
    ///
    /// Enforces the contract that the URL may only be omitted when an
    /// update run was explicitly requested.
    pub fn build(self) -> Result<ParsedOptions> {
        let url = match self.url {
            Some(raw) => Some(parse_target_url(&raw)?),
            None => {
                if self.update != Some(true) {
                    return Err(Error::MissingUrl);
                }
                None
            }
        };

        Ok(ParsedOptions {
            url,
            server: self.server,
            force: self.force,
            update: self.update,
            format: self.format,
            verbose: self.verbose,
            data_dir: self.data_dir.unwrap_or_else(default_data_dir),
        })
    }
}

/// Parse a target URL, auto-adding https:// if no scheme was provided
fn parse_target_url(raw: &str) -> Result<Url> {
    let with_scheme = if !raw.contains("://") {
        format!("https://{raw}")
    } else {
        raw.to_string()
    };

    let url = Url::parse(&with_scheme).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(Error::InvalidUrl(format!(
            "scheme '{}' not allowed (use http or https)",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(Error::InvalidUrl("missing host".to_string()));
    }

    Ok(url)
}

/// Platform data directory for the vulnerability database
pub fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("com", "robdotec", env!("CARGO_PKG_NAME")) {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => PathBuf::from(".").join(".data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_declared_first_and_required_unless_update() {
        let first = &DECLARED_OPTIONS[0];
        assert_eq!(first.name, "url");
        assert_eq!(
            first.requirement,
            Requirement::RequiredUnless(&["update"])
        );
    }

    #[test]
    fn contract_declares_the_gate_options() {
        let names: Vec<&str> = DECLARED_OPTIONS.iter().map(|o| o.name).collect();
        for expected in ["url", "server", "force", "update"] {
            assert!(names.contains(&expected), "missing option {expected}");
        }
    }

    #[test]
    fn build_without_url_requires_explicit_update() {
        let err = ParsedOptions::builder().build().unwrap_err();
        assert!(matches!(err, Error::MissingUrl));

        let err = ParsedOptions::builder()
            .update(Some(false))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingUrl));

        let options = ParsedOptions::builder()
            .update(Some(true))
            .build()
            .unwrap();
        assert!(options.url.is_none());
    }

    #[test]
    fn build_adds_https_scheme() {
        let options = ParsedOptions::builder().url("ex.lo").build().unwrap();
        assert_eq!(options.url.unwrap().as_str(), "https://ex.lo/");
    }

    #[test]
    fn build_rejects_other_schemes() {
        let err = ParsedOptions::builder()
            .url("ftp://ex.lo")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn cli_format_is_interactive() {
        assert!(Format::Cli.interactive());
        assert!(!Format::Json.interactive());
    }

    #[test]
    fn format_from_str() {
        assert_eq!("cli".parse::<Format>().unwrap(), Format::Cli);
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!("xml".parse::<Format>().is_err());
    }
}
