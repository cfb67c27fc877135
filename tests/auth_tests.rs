// Session token tests: issuing, verifying and subprotocol selection

use chrono::Utc;
use flux_proxy::{ProxyError, SessionClaims, TokenIssuer, TokenVerifier, ACCESS_TOKEN_PREFIX};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

const SECRET: &str = "unit-test-secret";

fn sign(claims: &SessionClaims, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn protocol(token: &str) -> String {
    format!("{}{}", ACCESS_TOKEN_PREFIX, token)
}

#[test]
fn test_issue_and_authorize() {
    let issuer = TokenIssuer::new(SECRET, 3600);
    let verifier = TokenVerifier::new(SECRET);

    let offered = protocol(&issuer.issue().unwrap());
    let accepted = verifier
        .authorize(["chat", offered.as_str(), "json"])
        .unwrap();

    assert_eq!(accepted, offered);
}

#[test]
fn test_expired_token_rejected() {
    let now = Utc::now().timestamp();
    let token = sign(
        &SessionClaims {
            iat: now - 120,
            exp: now - 60,
        },
        SECRET,
    );

    let verifier = TokenVerifier::new(SECRET);
    let err = verifier.authorize([protocol(&token).as_str()]).unwrap_err();

    assert!(matches!(err, ProxyError::InvalidToken(_)));
}

#[test]
fn test_wrong_secret_rejected() {
    let issuer = TokenIssuer::new("some-other-secret", 3600);
    let verifier = TokenVerifier::new(SECRET);

    let token = issuer.issue().unwrap();
    assert!(verifier.verify(&token).is_err());
}

#[test]
fn test_garbage_token_rejected() {
    let verifier = TokenVerifier::new(SECRET);
    let err = verifier.authorize(["access_token.not-a-jwt"]).unwrap_err();
    assert!(matches!(err, ProxyError::InvalidToken(_)));
}

#[test]
fn test_no_token_entry() {
    let verifier = TokenVerifier::new(SECRET);

    let err = verifier.authorize(["chat", "access_token", "json"]).unwrap_err();
    assert!(matches!(err, ProxyError::MissingToken));

    let err = verifier.authorize(Vec::<&str>::new()).unwrap_err();
    assert!(matches!(err, ProxyError::MissingToken));
}

#[test]
fn test_first_token_entry_decides() {
    let issuer = TokenIssuer::new(SECRET, 3600);
    let verifier = TokenVerifier::new(SECRET);
    let valid = protocol(&issuer.issue().unwrap());

    // A later valid token does not rescue an invalid first one
    let err = verifier
        .authorize(["access_token.bogus", valid.as_str()])
        .unwrap_err();
    assert!(matches!(err, ProxyError::InvalidToken(_)));
}

#[test]
fn test_token_without_expiry_rejected() {
    #[derive(serde::Serialize)]
    struct NoExp {
        iat: i64,
    }

    let token = encode(
        &Header::new(Algorithm::HS256),
        &NoExp {
            iat: Utc::now().timestamp(),
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert!(TokenVerifier::new(SECRET).verify(&token).is_err());
}
