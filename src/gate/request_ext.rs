use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AsHeaderName, AUTHORIZATION};
use hyper::http::request::Parts;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static AUTH_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[A-Za-z0-9_-]+)\s*=\s*(?:"(?P<quoted>(?:[^"\\]|\\.)*)"|(?P<token>[^\s,]+))"#)
        .unwrap()
});

static BASIC_SCHEME: &str = "Basic";
static DIGEST_SCHEME: &str = "Digest";

/// Resource path of a request relative to its application, as resolved by the dispatcher.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourcePath {
    pub servlet_path: String,
    pub path_info: Option<String>,
}

impl ResourcePath {
    pub fn new(servlet_path: &str, path_info: Option<&str>) -> Self {
        Self {
            servlet_path: servlet_path.to_string(),
            path_info: path_info.map(ToString::to_string),
        }
    }

    pub fn to_path(&self) -> String {
        match &self.path_info {
            Some(path_info) => format!("{}{path_info}", self.servlet_path),
            None => self.servlet_path.clone(),
        }
    }
}

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    fn basic_auth(&self) -> Option<(String, String)>;
    fn digest_auth(&self) -> Option<HashMap<String, String>>;
}

pub trait ServletRequestExt {
    fn servlet_path(&self) -> String;
    fn path_info(&self) -> Option<String>;

    /// Servlet path concatenated with the path info, the path constraints are matched against.
    fn resource_path(&self) -> String {
        let mut path = self.servlet_path();
        if let Some(path_info) = self.path_info() {
            path.push_str(&path_info);
        }
        path
    }
}

/// Credentials following `scheme` in an authorization header; the scheme token is case-insensitive.
fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (token, credentials) = value.split_once(' ')?;
    token.eq_ignore_ascii_case(scheme).then_some(credentials)
}

fn unescape_quoted(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                unescaped.push(escaped);
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

/// Parses the comma separated `key=value` / `key="value"` list of an authorization header.
pub fn parse_auth_params(value: &str) -> HashMap<String, String> {
    AUTH_PARAM_RE
        .captures_iter(value)
        .filter_map(|captures| {
            let key = captures.name("key")?.as_str().to_lowercase();
            let value = match (captures.name("quoted"), captures.name("token")) {
                (Some(quoted), _) => unescape_quoted(quoted.as_str()),
                (None, Some(token)) => token.as_str().to_string(),
                (None, None) => return None,
            };
            Some((key, value))
        })
        .collect()
}

impl HeaderExt for Parts {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.headers
            .get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        let authorization = self.get_header(AUTHORIZATION)?;

        let value = strip_scheme(&authorization, BASIC_SCHEME)?;
        let value = BASE64_STANDARD.decode(value.trim()).ok()?;
        let value = String::from_utf8(value).ok()?;

        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }

    fn digest_auth(&self) -> Option<HashMap<String, String>> {
        let authorization = self.get_header(AUTHORIZATION)?;

        let value = strip_scheme(&authorization, DIGEST_SCHEME)?;
        Some(parse_auth_params(value))
    }
}

impl ServletRequestExt for Parts {
    fn servlet_path(&self) -> String {
        match self.extensions.get::<ResourcePath>() {
            Some(resource) => resource.servlet_path.clone(),
            None => self.uri.path().to_string(),
        }
    }

    fn path_info(&self) -> Option<String> {
        self.extensions
            .get::<ResourcePath>()
            .and_then(|resource| resource.path_info.clone())
    }
}
