use std::sync::Arc;
use std::time::Duration;

use crate::command::server::Error;
use crate::configuration::Configuration;
use crate::gate::{AuthenticationGate, ConstraintTable, Realms, ResourcePath, StrategyFactory};

/// Percent-decoded request path with empty and `.` segments removed and `..` resolved.
///
/// A trailing `/` is kept. Paths that are not valid UTF-8 once decoded, contain NUL, or
/// climb above the root are rejected.
pub fn canonical_path(raw: &str) -> Result<String, Error> {
    let decoded = urlencoding::decode(raw)
        .map_err(|_| Error::BadRequest(format!("Undecodable request path '{raw}'")))?;
    if decoded.contains('\0') {
        return Err(Error::BadRequest(format!("Invalid request path '{raw}'")));
    }

    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::BadRequest(format!(
                        "Request path '{raw}' escapes the root"
                    )));
                }
            }
            segment => segments.push(segment),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    let directory = decoded.ends_with('/') || decoded.ends_with("/.") || decoded.ends_with("/..");
    if directory && !segments.is_empty() {
        path.push('/');
    }
    Ok(path)
}

/// An application mounted under its context path, with its own constraint table.
pub struct Application {
    pub name: String,
    pub context_path: String,
    pub gate: AuthenticationGate,
}

impl Application {
    /// Resource path of `path` inside this application, if the application serves it.
    pub fn resource_path(&self, path: &str) -> Option<ResourcePath> {
        let remainder = path.strip_prefix(&self.context_path)?;
        if remainder.is_empty() {
            return Some(ResourcePath::new("/", None));
        }
        remainder
            .starts_with('/')
            .then(|| ResourcePath::new(remainder, None))
    }
}

/// Everything a request needs, published as a whole and replaced on configuration reload.
pub struct ServerContext {
    applications: Vec<Application>,
    pub authentication_timeout: Duration,
    pub metrics_path: Option<String>,
}

impl ServerContext {
    pub fn new(config: &Configuration) -> Self {
        let realms = Arc::new(Realms::from_config(&config.realm));
        let strategies = Arc::new(StrategyFactory::with_builtins(realms));

        let mut applications: Vec<_> = config
            .application
            .iter()
            .map(|(name, application)| Application {
                name: name.clone(),
                context_path: application.context_path.clone(),
                gate: AuthenticationGate::new(
                    Arc::new(ConstraintTable::from_config(&application.constraint)),
                    Arc::clone(&strategies),
                ),
            })
            .collect();
        // longest context path first, so nested applications take precedence
        applications.sort_by(|a, b| b.context_path.len().cmp(&a.context_path.len()));

        Self {
            applications,
            authentication_timeout: Duration::from_secs(config.global.authentication_timeout),
            metrics_path: config.server.metrics_path.clone(),
        }
    }

    pub fn resolve(&self, path: &str) -> Option<(&Application, ResourcePath)> {
        self.applications.iter().find_map(|application| {
            application
                .resource_path(path)
                .map(|resource| (application, resource))
        })
    }

    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.iter()
    }
}
