//! The pre-scan gate
//!
//! Top-level decision sequence run once per scan attempt: banner,
//! database freshness, optional update, server module resolution,
//! redirect triage, and the WordPress identity precondition.

use crate::db::{Updater, VulnDatabase};
use crate::error::{Error, Result};
use crate::options::ParsedOptions;
use crate::output::{CORE_SOURCE, Event, EventSink, Prompt};
use crate::server::ServerKind;
use crate::target::{Target, default_client};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Install page a half-configured WordPress redirects to
const INSTALL_PATH: &str = "wp-admin/install.php";

/// Notice introducing the update confirmation prompt
const OUTDATED_NOTICE: &str = "It seems like you have not updated the database for some time.";

/// Question asked when the database is stale
const UPDATE_QUESTION: &str = "[?] Do you want to update it now? [Y]es [N]o, default: [N]";

/// Terminal states of a successful gate run
///
/// The two graceful early exits are successes, not errors; the binary
/// maps them to a success exit code.
#[derive(Debug)]
pub enum Outcome {
    /// Every check passed; the scan may proceed against the target
    ReadyToScan(Target),
    /// Update-only run completed; there is nothing left to do
    UpdateOnly,
    /// The site still serves the install page; scanning is pointless
    NotFullyConfigured(Url),
}

/// The pre-scan gate and its collaborators
///
/// One gate instance serves one scan attempt. The target is created by
/// the gate from the configured URL; collaborators are injected so
/// tests can script them.
pub struct Gate<D, U, S, P> {
    options: ParsedOptions,
    client: Client,
    db: D,
    updater: U,
    sink: S,
    prompt: P,
}

impl<D, U, S, P> Gate<D, U, S, P>
where
    D: VulnDatabase,
    U: Updater,
    S: EventSink,
    P: Prompt,
{
    /// Create a gate with a default HTTP client
    pub fn new(options: ParsedOptions, db: D, updater: U, sink: S, prompt: P) -> Result<Self> {
        Ok(Self {
            options,
            client: default_client()?,
            db,
            updater,
            sink,
            prompt,
        })
    }

    /// Replace the HTTP client used for target requests
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Run options for this gate
    pub fn options(&self) -> &ParsedOptions {
        &self.options
    }

    /// Whether the local database must be refreshed before scanning
    ///
    /// Fails with [`Error::MissingDatabaseFile`] when required data is
    /// absent and the operator explicitly forbade fetching it. In
    /// interactive sessions a stale database triggers a one-line
    /// confirmation prompt; non-interactive sessions silently accept
    /// stale-but-present data.
    pub fn update_required(&mut self) -> Result<bool> {
        if self.db.missing_files() {
            return match self.options.update {
                Some(false) => Err(Error::MissingDatabaseFile),
                _ => Ok(true),
            };
        }

        match self.options.update {
            Some(true) => Ok(true),
            Some(false) => Ok(false),
            None => {
                if !self.options.interactive() || !self.db.outdated() {
                    return Ok(false);
                }

                self.sink.output(
                    Event::Notice {
                        msg: OUTDATED_NOTICE.to_string(),
                    },
                    CORE_SOURCE,
                )?;
                let answer = self.prompt.ask(UPDATE_QUESTION)?;
                Ok(is_yes(&answer))
            }
        }
    }

    /// Resolve the server module for the target
    ///
    /// An explicit override is used without probing; otherwise the
    /// family is probed from the homepage `Server` header. Either way
    /// the capability is attached to the target, visible to every
    /// resource created against it.
    pub async fn resolve_server(&self, target: &Target) -> Result<ServerKind> {
        let kind = match self.options.server {
            Some(kind) => kind,
            None => target.detected_server().await?,
        };
        debug!(server = %kind, "server module resolved");
        Ok(target.attach_server(kind))
    }

    /// Run every pre-scan check, in order
    ///
    /// Returns the terminal state of the gate; errors abort the scan
    /// attempt and are mapped to a failure exit by the caller.
    pub async fn before_scan(&mut self) -> Result<Outcome> {
        self.sink.output(
            Event::Banner {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            CORE_SOURCE,
        )?;

        // An explicit --update never re-queries freshness
        let needs_update = self.options.update == Some(true) || self.update_required()?;

        if needs_update {
            self.sink.output(Event::DbUpdateStarted, CORE_SOURCE)?;
            self.updater.update().await?;
            self.sink.output(Event::DbUpdateFinished, CORE_SOURCE)?;

            if self.options.url.is_none() {
                return Ok(Outcome::UpdateOnly);
            }
        }

        let url = self.options.url.clone().ok_or(Error::MissingUrl)?;
        let target = Target::new(url, self.client.clone());

        self.resolve_server(&target).await?;

        if let Some(outcome) = self.triage_redirect(&target).await? {
            return Ok(outcome);
        }

        if target.wordpress_hosted() {
            return Err(Error::WordPressHosted);
        }

        if !target.wordpress().await? && !self.options.force {
            return Err(Error::NotWordPress);
        }

        Ok(Outcome::ReadyToScan(target))
    }

    /// Triage a homepage redirect
    ///
    /// Landing on the install page is an expected terminal state. A
    /// redirect that carries the install path only in its query string
    /// is left to the identity check. Any other location change is a
    /// hard failure: result provenance cannot be trusted once location
    /// has shifted arbitrarily.
    async fn triage_redirect(&mut self, target: &Target) -> Result<Option<Outcome>> {
        let homepage = target.homepage().await?;
        let effective = homepage.effective_url.clone();

        if &effective == target.url() {
            return Ok(None);
        }

        if effective.path().ends_with(INSTALL_PATH) {
            self.sink.output(
                Event::NotFullyConfigured {
                    url: effective.to_string(),
                },
                CORE_SOURCE,
            )?;
            return Ok(Some(Outcome::NotFullyConfigured(effective)));
        }

        if effective.as_str().contains(INSTALL_PATH) {
            // Install path only in the query; the identity check decides
            return Ok(None);
        }

        Err(Error::HttpRedirect {
            expected: target.url().clone(),
            actual: effective,
        })
    }
}

/// Interpret the operator's answer; anything not starting with `y` is no
fn is_yes(answer: &str) -> bool {
    answer.trim_start().to_lowercase().starts_with('y')
}
