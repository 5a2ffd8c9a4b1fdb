//! `WWW-Authenticate` challenges and the bearer token exchange.

use crate::error::CharmError;
use http_auth::parser::ChallengeParser;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Bearer(BearerChallenge),
    /// Any other scheme, kept by name only.
    Other(String),
}

/// Picks the bearer challenge out of a `WWW-Authenticate` header such as
/// `Bearer realm="https://auth.example.com/token",service="registry"`.
/// When no bearer challenge is offered, the first scheme is kept by name.
pub fn parse_challenge(header: &str) -> Option<Challenge> {
    let mut first_scheme = None;
    for challenge in ChallengeParser::new(header) {
        let challenge = match challenge {
            Ok(challenge) => challenge,
            Err(err) => {
                debug!("malformed WWW-Authenticate header {header:?}: {err:?}");
                break;
            }
        };
        if !challenge.scheme.eq_ignore_ascii_case("bearer") {
            first_scheme.get_or_insert_with(|| challenge.scheme.to_string());
            continue;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in &challenge.params {
            if key.eq_ignore_ascii_case("realm") {
                realm = Some(value.to_unescaped());
            } else if key.eq_ignore_ascii_case("service") {
                service = Some(value.to_unescaped());
            } else if key.eq_ignore_ascii_case("scope") {
                scope = Some(value.to_unescaped());
            }
        }
        if let Some(realm) = realm {
            return Some(Challenge::Bearer(BearerChallenge {
                realm,
                service,
                scope,
            }));
        }
    }
    first_scheme.map(Challenge::Other)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges a bearer challenge for a token allowed to pull `repository_path`.
pub async fn fetch_token(
    client: &Client,
    challenge: &BearerChallenge,
    repository_path: &str,
) -> Result<String, CharmError> {
    let scope = format!("repository:{repository_path}:pull");
    let mut query = vec![("scope", scope.as_str())];
    if let Some(service) = challenge.service.as_deref() {
        query.push(("service", service));
    }

    debug!("GET {} scope={scope}", challenge.realm);
    let response = client.get(&challenge.realm).query(&query).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CharmError::AuthenticationFailed(format!(
            "cannot get registry token: {status}"
        )));
    }

    let body = response.bytes().await?;
    let token: TokenResponse = serde_json::from_slice(&body)?;
    token
        .token
        .or(token.access_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| CharmError::Protocol("no token in registry token response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = parse_challenge(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/ubuntu:pull,push""#,
        )
        .unwrap();
        assert_eq!(
            challenge,
            Challenge::Bearer(BearerChallenge {
                realm: "https://auth.docker.io/token".to_string(),
                service: Some("registry.docker.io".to_string()),
                scope: Some("repository:library/ubuntu:pull,push".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_unquoted_and_mixed_case() {
        let challenge = parse_challenge(r#"bearer Realm="http://h/token", service=reg"#).unwrap();
        assert_eq!(
            challenge,
            Challenge::Bearer(BearerChallenge {
                realm: "http://h/token".to_string(),
                service: Some("reg".to_string()),
                scope: None,
            })
        );
    }

    #[test]
    fn test_bearer_without_realm_is_rejected() {
        assert_eq!(parse_challenge(r#"Bearer service="reg""#), None);
    }

    #[test]
    fn test_other_scheme() {
        assert_eq!(
            parse_challenge(r#"Basic realm="registry""#),
            Some(Challenge::Other("Basic".to_string()))
        );
        assert_eq!(parse_challenge(""), None);
    }

    #[test]
    fn test_bearer_preferred_over_earlier_scheme() {
        let challenge =
            parse_challenge(r#"Basic realm="registry", Bearer realm="https://h/token""#).unwrap();
        assert!(matches!(challenge, Challenge::Bearer(ref bearer) if bearer.realm == "https://h/token"));
    }

    #[tokio::test]
    async fn test_fetch_token_accepts_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/token")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("service".into(), "reg".into()),
                mockito::Matcher::UrlEncoded("scope".into(), "repository:my/repo:pull".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "tok"}"#)
            .create_async()
            .await;

        let challenge = BearerChallenge {
            realm: format!("{}/token", server.url()),
            service: Some("reg".to_string()),
            scope: None,
        };
        let token = fetch_token(&Client::new(), &challenge, "my/repo")
            .await
            .unwrap();

        assert_eq!(token, "tok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_token_rejects_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/token")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let challenge = BearerChallenge {
            realm: format!("{}/token", server.url()),
            service: None,
            scope: None,
        };
        let err = fetch_token(&Client::new(), &challenge, "my/repo")
            .await
            .unwrap_err();
        assert!(matches!(err, CharmError::Protocol(_)));
    }
}
