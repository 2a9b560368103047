use config::Config;
use cvmaker_auth::config::{AppConfig, SigningAlgorithm, load_config_from};
use std::env;
use std::fs;

const SECRET: &str = "24D77EF9C1A85B3E6F0D42A97C13E58B0F6A2D94E7B15C38A60F29D4E71CBD8B";

fn yaml(signing: &str) -> String {
    format!(
        r#"
database_url: "postgres://localhost/cvmaker"
oauth2:
  client_id: "cvmaker"
  client_secret: "cvmaker-secret"
  signing:
{signing}
github:
  client_id: "gh-client"
  client_secret: "gh-secret"
"#
    )
}

fn hs256_yaml() -> String {
    yaml(&format!(
        "    signing_key: \"{SECRET}\"\n    verifier_key: \"{SECRET}\""
    ))
}

fn parse(content: &str) -> AppConfig {
    Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config")
}

#[test]
fn test_app_config_defaults() {
    let app_config = parse(&hs256_yaml());

    assert_eq!(app_config.database_url, "postgres://localhost/cvmaker");
    assert_eq!(app_config.listen_addr, "0.0.0.0:8080");
    assert_eq!(app_config.oauth2.access_token_lifetime, 43200);
    assert_eq!(app_config.oauth2.refresh_token_lifetime, 2592000);
    assert_eq!(app_config.oauth2.signing.algorithm, SigningAlgorithm::HS256);
    assert_eq!(
        app_config.github.token_url,
        "https://github.com/login/oauth/access_token"
    );
    assert_eq!(app_config.github.api_url, "https://api.github.com");
    assert_eq!(app_config.github.timeout_secs, 10);
    assert!(app_config.validate().is_ok());
}

#[test]
fn test_rs256_keys_are_distinct() {
    let private = include_str!("fixtures/jwt_rs256_private.pem");
    let public = include_str!("fixtures/jwt_rs256_public.pem");
    let indent = |pem: &str| {
        pem.lines()
            .map(|l| format!("      {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let signing = format!(
        "    algorithm: RS256\n    signing_key: |\n{}\n    verifier_key: |\n{}",
        indent(private),
        indent(public)
    );

    let app_config = parse(&yaml(&signing));
    assert_eq!(app_config.oauth2.signing.algorithm, SigningAlgorithm::RS256);
    assert!(app_config.validate().is_ok());

    let mut same_keys = app_config.clone();
    same_keys.oauth2.signing.verifier_key = same_keys.oauth2.signing.signing_key.clone();
    assert!(same_keys.validate().is_err());
}

#[test]
fn test_hs256_rejects_short_or_mismatched_secrets() {
    let mut app_config = parse(&hs256_yaml());
    app_config.oauth2.signing.verifier_key = "00".repeat(32);
    assert!(app_config.validate().is_err());

    app_config.oauth2.signing.signing_key = "abcd".to_string();
    app_config.oauth2.signing.verifier_key = "abcd".to_string();
    assert!(app_config.validate().is_err());

    app_config.oauth2.signing.signing_key = "not hex".to_string();
    assert!(app_config.validate().is_err());
}

#[test]
fn test_load_config_with_environment_overrides() {
    let config_path = env::temp_dir().join("cvmaker_auth_test_config.yaml");
    fs::write(&config_path, hs256_yaml()).expect("Failed to write temp config");

    // Environment variables override file values, nested keys use `__`
    unsafe {
        env::set_var("DATABASE_URL", "postgres://env/cvmaker");
        env::set_var("OAUTH2__ACCESS_TOKEN_LIFETIME", "600");
    }

    let loaded = load_config_from(config_path.to_str().unwrap());

    unsafe {
        env::remove_var("DATABASE_URL");
        env::remove_var("OAUTH2__ACCESS_TOKEN_LIFETIME");
    }
    let _ = fs::remove_file(&config_path);

    let app_config = loaded.expect("config should load");
    assert_eq!(app_config.database_url, "postgres://env/cvmaker");
    assert_eq!(app_config.oauth2.access_token_lifetime, 600);
    assert_eq!(app_config.oauth2.client_id, "cvmaker");
}

#[test]
fn test_config_partial_structure() {
    let invalid_yaml = r#"
database_url: "postgres://localhost/test"
# Missing oauth2 and github sections
"#;

    let config = Config::builder()
        .add_source(config::File::from_str(
            invalid_yaml,
            config::FileFormat::Yaml,
        ))
        .build()
        .expect("Failed to build config");

    let result: Result<AppConfig, _> = config.try_deserialize();
    assert!(
        result.is_err(),
        "Should fail when required fields are missing"
    );
}
