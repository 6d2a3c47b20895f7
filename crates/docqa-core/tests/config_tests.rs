use docqa_core::config::{expand_path, Config, Settings};
use docqa_core::error::Error;
use docqa_core::types::{ResponseLength, SearchMode};

#[test]
fn defaults_apply_without_any_file() {
    let settings = Config::from_toml_str("").settings().expect("defaults are valid");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.top_k, 3);
    assert_eq!(settings.chunk_size, 500);
    assert_eq!(settings.overlap, 100);
    assert_eq!(settings.mode, SearchMode::Auto);
    assert_eq!(settings.max_response_tokens(), 400);
    assert!((settings.semantic_weight - 0.7).abs() < f32::EPSILON);
    assert!((settings.keyword_weight - 0.3).abs() < f32::EPSILON);
}

#[test]
fn toml_overrides_selected_keys() {
    let config = Config::from_toml_str(
        r#"
        [rag]
        top_k = 5
        mode = "keyword"
        response_length = "long"
        provider_order = ["hosted"]

        [data]
        snapshot_path = "~/docqa/index.snap"
        "#,
    );
    let settings = config.settings().expect("valid settings");
    assert_eq!(settings.top_k, 5);
    assert_eq!(settings.mode, SearchMode::Keyword);
    assert_eq!(settings.response_length, ResponseLength::Long);
    assert_eq!(settings.max_response_tokens(), 800);
    assert_eq!(settings.provider_order, vec!["hosted".to_string()]);
    assert_eq!(settings.chunk_size, 500, "untouched keys keep their defaults");

    let path: String = config.get("data.snapshot_path").expect("data table");
    assert_eq!(path, "~/docqa/index.snap");
}

#[test]
fn unknown_option_is_rejected() {
    let err = Config::from_toml_str("[rag]\nchunk_sise = 300\n").settings().expect_err("typo must fail");
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
}

#[test]
fn out_of_range_options_are_rejected() {
    for toml in [
        "[rag]\ntop_k = 0",
        "[rag]\ntop_k = 11",
        "[rag]\nchunk_size = 100\noverlap = 100",
        "[rag]\nsemantic_weight = 0.0\nkeyword_weight = 0.0",
        "[rag]\nkeyword_weight = -1.0",
        "[rag]\nprovider_order = []",
        "[rag]\nprovider_order = [\"local\", \"local\"]",
        "[rag]\ncontext_budget = 0",
        "[rag]\nmode = \"fuzzy\"",
    ] {
        let result = Config::from_toml_str(toml).settings();
        assert!(matches!(result, Err(Error::InvalidConfig(_))), "{toml:?} should be rejected");
    }
}

#[test]
fn chunking_config_follows_settings() {
    let settings = Settings { chunk_size: 300, overlap: 30, ..Settings::default() };
    let chunking = settings.chunking();
    assert_eq!(chunking.chunk_size, 300);
    assert_eq!(chunking.overlap, 30);
    assert!(chunking.carry_dates);
}

#[test]
fn expand_path_handles_tilde_and_env() {
    let Some(home) = std::env::var_os("HOME") else { return };
    let home = std::path::PathBuf::from(home);
    assert_eq!(expand_path("~/docs"), home.join("docs"));
    assert_eq!(expand_path("$HOME/docs"), home.join("docs"));
    assert_eq!(expand_path("/abs/path"), std::path::PathBuf::from("/abs/path"));
}

#[test]
fn contains_sees_nested_tables() {
    let config = Config::from_toml_str("[providers.gpu]\nkind = \"local\"\n");
    assert!(config.contains("providers.gpu"));
    assert!(config.contains("rag.top_k"));
    assert!(!config.contains("providers.hosted"));
}
