//! Behavior-driven tests for layered screener configuration
//!
//! These tests verify how a TOML file, environment overrides, and rubric
//! overrides combine into one validated configuration.

use std::io::Write;
use std::time::Duration;

use capscreen_core::config::{ENV_BATCH_TIMEOUT_MS, ENV_MAX_CONCURRENCY, ENV_QUOTA_LIMIT};
use capscreen_core::{ConfigError, Factor, RubricConfig, ScreenerConfig, DEFAULT_UNIVERSE};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

// =============================================================================
// Config: Loading Files
// =============================================================================

#[test]
fn when_file_sets_some_sections_others_keep_defaults() {
    // Given: A file that only tunes the batch and throttle
    let file = config_file(
        r#"
universe = ["AAON", "ABCB", "AMWD"]

[batch]
max_concurrency = 3
batch_timeout_ms = 15000

[throttle]
quota_limit = 20
"#,
    );

    // When: It is loaded
    let config = ScreenerConfig::load(file.path()).expect("valid config");

    // Then: Set values win and unset values fall back
    assert_eq!(config.universe, vec!["AAON", "ABCB", "AMWD"]);
    assert_eq!(config.batch.max_concurrency, 3);
    assert_eq!(config.batch.unit_timeout_ms, 10_000);
    assert_eq!(config.throttle.quota_limit, 20);
    assert_eq!(config.throttle.quota_window_secs, 60);
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.rubric, RubricConfig::default());

    let batch = config.batch_config();
    assert_eq!(batch.max_concurrency, 3);
    assert_eq!(batch.batch_timeout, Some(Duration::from_secs(15)));
}

#[test]
fn when_file_omits_universe_default_list_is_used() {
    // Given: An empty file
    let file = config_file("");

    // When: It is loaded
    let config = ScreenerConfig::load(file.path()).expect("valid config");

    // Then: The built-in universe applies
    assert_eq!(config.universe.len(), DEFAULT_UNIVERSE.len());
    assert_eq!(config.universe[0], DEFAULT_UNIVERSE[0]);
}

#[test]
fn when_file_is_missing_error_names_the_path() {
    // Given: A path inside an empty directory
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("capscreen.toml");

    // When: It is loaded
    let err = ScreenerConfig::load(&path).expect_err("missing file");

    // Then: A read error carries the path
    assert!(matches!(&err, ConfigError::Read { path: reported, .. } if reported == &path));
    assert!(err.to_string().contains("capscreen.toml"));
}

#[test]
fn when_file_is_not_toml_parse_error_is_returned() {
    // Given: Garbage contents
    let file = config_file("[batch\nmax_concurrency = ");

    // When: It is loaded
    let err = ScreenerConfig::load(file.path()).expect_err("bad toml");

    // Then: It is reported as a parse failure
    assert!(matches!(err, ConfigError::Parse(_)));
}

// =============================================================================
// Config: Validation
// =============================================================================

#[test]
fn when_concurrency_is_zero_config_is_rejected() {
    // Given: A file disabling all workers
    let toml = "[batch]\nmax_concurrency = 0\n";

    // When: It is parsed
    let err = ScreenerConfig::from_toml_str(toml).expect_err("zero concurrency");

    // Then: The offending field is named
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            field: "batch.max_concurrency",
            ..
        }
    ));
}

#[test]
fn when_universe_repeats_a_symbol_config_is_rejected() {
    // Given: A universe listing the same ticker twice in different case
    let toml = "universe = [\"AAON\", \"aaon\"]\n";

    // When: It is parsed
    let err = ScreenerConfig::from_toml_str(toml).expect_err("duplicate symbol");

    // Then: The universe is reported as invalid
    assert!(matches!(err, ConfigError::InvalidValue { field: "universe", .. }));
}

#[test]
fn when_retry_delays_are_inverted_config_is_rejected() {
    // Given: A cap below the base delay
    let toml = "[retry]\nbase_delay_ms = 500\nmax_delay_ms = 100\n";

    // When: It is parsed
    let err = ScreenerConfig::from_toml_str(toml).expect_err("inverted delays");

    // Then: The cap is named
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            field: "retry.max_delay_ms",
            ..
        }
    ));
}

// =============================================================================
// Config: Rubric Overrides
// =============================================================================

#[test]
fn when_rubric_section_overrides_one_edge_rest_of_curve_is_kept() {
    // Given: A file widening the market cap band only
    let toml = "[rubric.market_cap]\nupper_full = 2.5e9\nupper_zero = 4e9\n";

    // When: It is parsed
    let config = ScreenerConfig::from_toml_str(toml).expect("valid rubric");

    // Then: The overridden edges move and everything else stays default
    let curve = config.rubric.curve(Factor::MarketCap);
    assert_eq!(curve.upper_full, Some(2.5e9));
    assert_eq!(curve.upper_zero, Some(4.0e9));
    assert_eq!(curve.max_points, 20.0);
    assert_eq!(config.rubric.pe_ratio, RubricConfig::default().pe_ratio);
}

#[test]
fn when_rubric_weight_exceeds_factor_cap_config_is_rejected() {
    // Given: A margin weight above twenty points
    let toml = "[rubric.profit_margin]\nmax_points = 35.0\n";

    // When: It is parsed
    let err = ScreenerConfig::from_toml_str(toml).expect_err("weight out of range");

    // Then: It is reported as a rubric error
    assert!(matches!(err, ConfigError::Rubric(_)));
}

#[test]
fn when_rubric_names_unknown_factor_config_is_rejected() {
    // Given: A section for a factor the rubric does not have
    let toml = "[rubric.dividend_yield]\nmax_points = 5.0\n";

    // When: It is parsed
    let err = ScreenerConfig::from_toml_str(toml).expect_err("unknown factor");

    // Then: Parsing fails
    assert!(matches!(err, ConfigError::Parse(_)));
}

// =============================================================================
// Config: Environment Precedence
// =============================================================================

#[test]
fn environment_overrides_take_precedence_over_file_values() {
    // Given: A file and an environment that disagree
    let config = ScreenerConfig::from_toml_str(
        "[batch]\nmax_concurrency = 2\nbatch_timeout_ms = 5000\n[throttle]\nquota_limit = 10\n",
    )
    .expect("valid config");

    // When: The environment is applied
    let config = config
        .with_overrides_from(|name| match name {
            ENV_MAX_CONCURRENCY => Some(String::from("9")),
            ENV_BATCH_TIMEOUT_MS => Some(String::from("0")),
            ENV_QUOTA_LIMIT => Some(String::from("120")),
            _ => None,
        })
        .expect("valid overrides");

    // Then: Every overridden value comes from the environment
    assert_eq!(config.batch.max_concurrency, 9);
    assert_eq!(config.batch_config().batch_timeout, None);
    assert_eq!(config.throttle.quota_limit, 120);
}

#[test]
fn when_environment_sets_zero_concurrency_override_is_rejected() {
    // Given: Defaults
    let config = ScreenerConfig::default();

    // When: The environment asks for zero workers
    let err = config
        .with_overrides_from(|name| (name == ENV_MAX_CONCURRENCY).then(|| String::from("0")))
        .expect_err("zero concurrency");

    // Then: Validation runs after the overrides
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}
