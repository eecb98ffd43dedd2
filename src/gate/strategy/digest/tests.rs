use std::sync::Arc;

use chrono::Utc;
use hyper::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use hyper::http::{request, response};
use hyper::{Method, Request, Response, StatusCode};

use crate::gate::constraint::SecuredUrlConstraint;
use crate::gate::realm::{CredentialStore, MockCredentialStore};
use crate::gate::request_ext::parse_auth_params;
use crate::gate::scheme::AuthScheme;
use crate::gate::strategy::digest::{
    digest_eq, ha1, sha256_hex, DigestAuthentication, DigestCredentials, NonceIssuer,
};
use crate::gate::strategy::{AuthenticationContext, AuthenticationStrategy};
use crate::gate::Error;

const REALM: &str = "R";
const OPAQUE: &str = "5ccc069c403ebaf9f0171e9517f40e41";
const URI: &str = "/admin/public?page=1";

struct DigestHeader<'a> {
    username: &'a str,
    password: &'a str,
    realm: &'a str,
    nonce: &'a str,
    uri: &'a str,
    opaque: &'a str,
}

impl DigestHeader<'_> {
    fn render(&self, method: &Method) -> String {
        let ha1 = ha1(self.username, self.realm, self.password);
        let ha2 = sha256_hex(&format!("{method}:{}", self.uri));
        let response = sha256_hex(&format!(
            "{ha1}:{}:00000001:0a4f113b:auth:{ha2}",
            self.nonce
        ));
        format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm=SHA-256, qop=auth, nc=00000001, cnonce="0a4f113b", response="{response}", opaque="{}""#,
            self.username, self.realm, self.nonce, self.uri, self.opaque
        )
    }
}

fn build_store() -> Arc<dyn CredentialStore> {
    let mut store = MockCredentialStore::new();
    store
        .expect_digest_ha1()
        .returning(|username| (username == "alice").then(|| ha1("alice", REALM, "secret")));
    Arc::new(store)
}

fn build_strategy() -> DigestAuthentication {
    DigestAuthentication::new(build_store(), NonceIssuer::new(REALM, "secret", 300), OPAQUE)
}

fn build_test_parts(
    method: &Method,
    authorization: Option<String>,
) -> (request::Parts, response::Parts) {
    let mut builder = Request::builder().method(method.clone()).uri(URI);
    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }
    let (request, ()) = builder.body(()).unwrap().into_parts();
    let (response, ()) = Response::new(()).into_parts();
    (request, response)
}

async fn run(
    strategy: &mut DigestAuthentication,
    request: &request::Parts,
    response: &mut response::Parts,
) -> bool {
    let constraint = SecuredUrlConstraint::new("/admin/*", AuthScheme::Digest, REALM);
    let mut context = AuthenticationContext {
        request,
        response,
        constraint: &constraint,
    };
    strategy.initialize(&context);
    strategy.authenticate(&mut context).await
}

fn challenge_params(response: &response::Parts) -> std::collections::HashMap<String, String> {
    let challenge = response
        .headers
        .get(WWW_AUTHENTICATE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Digest "));
    parse_auth_params(challenge.trim_start_matches("Digest "))
}

#[tokio::test]
async fn test_valid_response_is_accepted() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue();
    let header = DigestHeader {
        username: "alice",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) = build_test_parts(&Method::POST, Some(header.render(&Method::POST)));

    assert!(run(&mut strategy, &request, &mut response).await);
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.is_empty());
}

#[tokio::test]
async fn test_missing_credentials_get_a_full_challenge() {
    let mut strategy = build_strategy();
    let (request, mut response) = build_test_parts(&Method::GET, None);

    assert!(!run(&mut strategy, &request, &mut response).await);
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let params = challenge_params(&response);
    assert_eq!(params.get("realm").unwrap(), REALM);
    assert_eq!(params.get("qop").unwrap(), "auth");
    assert_eq!(params.get("algorithm").unwrap(), "SHA-256");
    assert_eq!(params.get("opaque").unwrap(), OPAQUE);
    assert!(params.contains_key("nonce"));
    assert!(!params.contains_key("stale"));

    let nonce = params.get("nonce").unwrap();
    assert_eq!(
        strategy.nonces.validate(nonce),
        crate::gate::strategy::digest::NonceStatus::Valid
    );
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue();
    let header = DigestHeader {
        username: "alice",
        password: "wrong",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) = build_test_parts(&Method::GET, Some(header.render(&Method::GET)));

    assert!(!run(&mut strategy, &request, &mut response).await);
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(!challenge_params(&response).contains_key("stale"));
}

#[tokio::test]
async fn test_response_differing_in_one_digit_is_rejected() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue();
    let header = DigestHeader {
        username: "alice",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    }
    .render(&Method::GET);

    let mut params = parse_auth_params(header.trim_start_matches("Digest "));
    let valid = params.remove("response").unwrap();
    let first = if valid.starts_with('0') { "1" } else { "0" };
    let tampered = format!("{first}{}", &valid[1..]);
    assert_eq!(tampered.len(), valid.len());
    let header = header.replace(&valid, &tampered);

    let (request, mut response) = build_test_parts(&Method::GET, Some(header));

    assert!(!run(&mut strategy, &request, &mut response).await);
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[test]
fn test_digest_eq() {
    assert!(digest_eq("abc123", "abc123"));
    assert!(!digest_eq("abc123", "abc124"));
    assert!(!digest_eq("abc123", "abc12"));
    assert!(digest_eq("", ""));
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue();
    let header = DigestHeader {
        username: "mallory",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) = build_test_parts(&Method::GET, Some(header.render(&Method::GET)));

    assert!(!run(&mut strategy, &request, &mut response).await);
}

#[tokio::test]
async fn test_method_is_part_of_the_response() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue();
    let header = DigestHeader {
        username: "alice",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) =
        build_test_parts(&Method::DELETE, Some(header.render(&Method::GET)));

    assert!(!run(&mut strategy, &request, &mut response).await);
}

#[tokio::test]
async fn test_stale_nonce_with_correct_password_is_flagged_stale() {
    let mut strategy = build_strategy();
    let nonce = strategy.nonces.issue_at(Utc::now().timestamp() - 3_600);
    let header = DigestHeader {
        username: "alice",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) = build_test_parts(&Method::GET, Some(header.render(&Method::GET)));

    assert!(!run(&mut strategy, &request, &mut response).await);
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge_params(&response).get("stale").unwrap(), "true");
}

#[tokio::test]
async fn test_forged_nonce_is_rejected() {
    let mut strategy = build_strategy();
    let nonce = NonceIssuer::new(REALM, "attacker", 300).issue();
    let header = DigestHeader {
        username: "alice",
        password: "secret",
        realm: REALM,
        nonce: &nonce,
        uri: URI,
        opaque: OPAQUE,
    };
    let (request, mut response) = build_test_parts(&Method::GET, Some(header.render(&Method::GET)));

    assert!(!run(&mut strategy, &request, &mut response).await);
    assert!(!challenge_params(&response).contains_key("stale"));
}

#[tokio::test]
async fn test_realm_uri_and_opaque_must_match() {
    let cases = [
        ("Other", URI, OPAQUE),
        (REALM, "/admin/other", OPAQUE),
        (REALM, URI, "tampered"),
    ];

    for (realm, uri, opaque) in cases {
        let mut strategy = build_strategy();
        let nonce = strategy.nonces.issue();
        let header = DigestHeader {
            username: "alice",
            password: "secret",
            realm,
            nonce: &nonce,
            uri,
            opaque,
        };
        let (request, mut response) =
            build_test_parts(&Method::GET, Some(header.render(&Method::GET)));

        assert!(!run(&mut strategy, &request, &mut response).await);
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
}

#[test]
fn test_response_without_qop() {
    let credentials = DigestCredentials {
        username: "alice".to_string(),
        realm: REALM.to_string(),
        nonce: "n".to_string(),
        uri: "/".to_string(),
        response: String::new(),
        algorithm: None,
        qop: None,
        nc: None,
        cnonce: None,
        opaque: None,
    };

    let ha2 = sha256_hex("GET:/");
    assert_eq!(
        credentials.expected_response("h", "GET"),
        Some(sha256_hex(&format!("h:n:{ha2}")))
    );

    let incomplete = DigestCredentials {
        qop: Some("auth".to_string()),
        ..credentials
    };
    assert_eq!(incomplete.expected_response("h", "GET"), None);
}

#[test]
fn test_from_constraint_parameters() {
    let constraint = SecuredUrlConstraint::new("/*", AuthScheme::Digest, REALM)
        .with_scheme_param("nonce_lifetime", "60")
        .with_scheme_param("nonce_secret", "shared")
        .with_scheme_param("opaque", "fixed");
    let strategy = DigestAuthentication::from_constraint(build_store(), &constraint, "default")
        .unwrap_or_else(|_| panic!("valid parameters"));

    assert_eq!(strategy.opaque, "fixed");
    let nonce = NonceIssuer::new(REALM, "shared", 60).issue();
    assert_eq!(
        strategy.nonces.validate(&nonce),
        crate::gate::strategy::digest::NonceStatus::Valid
    );

    let invalid = SecuredUrlConstraint::new("/*", AuthScheme::Digest, REALM)
        .with_scheme_param("nonce_lifetime", "soon");
    match DigestAuthentication::from_constraint(build_store(), &invalid, "default") {
        Err(Error::Configuration(msg)) => assert!(msg.contains("soon")),
        _ => panic!("Expected a configuration error"),
    }
}

#[test]
fn test_ha1_is_sha256_of_user_realm_password() {
    assert_eq!(ha1("alice", "R", "secret"), sha256_hex("alice:R:secret"));
    assert_eq!(ha1("alice", "R", "secret").len(), 64);
}
