use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test mutates the environment concurrently.
unsafe fn clear_pitbox_env() {
    unsafe {
        std::env::remove_var("PITBOX_SUPABASE_URL");
        std::env::remove_var("PITBOX_SUPABASE_KEY");
        std::env::remove_var("PITBOX_SESSION_PATH");
        std::env::remove_var("PITBOX_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("PITBOX_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("PITBOX_REFRESH_MARGIN_SECS");
        std::env::remove_var("PITBOX_QUERY_STALE_SECS");
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_pitbox_env();
        std::env::set_var("PITBOX_SUPABASE_URL", "https://abc.supabase.co/");
        std::env::set_var("PITBOX_SUPABASE_KEY", "anon");
    }

    let cfg = BackendConfig::from_env().unwrap();
    assert_eq!(cfg.url, "https://abc.supabase.co");
    assert_eq!(cfg.anon_key, "anon");
    assert_eq!(cfg.session_path, PathBuf::from(DEFAULT_SESSION_FILE));
    assert_eq!(
        cfg.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.refresh_margin_secs, DEFAULT_REFRESH_MARGIN_SECS);
    assert_eq!(cfg.query_stale_secs, DEFAULT_QUERY_STALE_SECS);

    unsafe { clear_pitbox_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_pitbox_env();
        std::env::set_var("PITBOX_SUPABASE_URL", "http://localhost:54321");
        std::env::set_var("PITBOX_SUPABASE_KEY", "anon");
        std::env::set_var("PITBOX_SESSION_PATH", "/tmp/pitbox.json");
        std::env::set_var("PITBOX_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("PITBOX_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("PITBOX_REFRESH_MARGIN_SECS", "120");
        std::env::set_var("PITBOX_QUERY_STALE_SECS", "0");
    }

    let cfg = BackendConfig::from_env().unwrap();
    assert_eq!(cfg.url, "http://localhost:54321");
    assert_eq!(cfg.session_path, PathBuf::from("/tmp/pitbox.json"));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.refresh_margin_secs, 120);
    assert_eq!(cfg.query_stale_secs, 0);

    unsafe { clear_pitbox_env() };
}

#[test]
fn from_env_requires_url_and_key() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe { clear_pitbox_env() };
    assert!(matches!(BackendConfig::from_env(), Err(ConfigError::Missing { var: "PITBOX_SUPABASE_URL" })));

    unsafe { std::env::set_var("PITBOX_SUPABASE_URL", "https://abc.supabase.co") };
    assert!(matches!(BackendConfig::from_env(), Err(ConfigError::Missing { var: "PITBOX_SUPABASE_KEY" })));

    unsafe { clear_pitbox_env() };
}

#[test]
fn invalid_numeric_override_falls_back_to_default() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        clear_pitbox_env();
        std::env::set_var("PITBOX_SUPABASE_URL", "https://abc.supabase.co");
        std::env::set_var("PITBOX_SUPABASE_KEY", "anon");
        std::env::set_var("PITBOX_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = BackendConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_pitbox_env() };
}

#[test]
fn new_rejects_non_http_url() {
    assert!(matches!(BackendConfig::new("ftp://abc", "k"), Err(ConfigError::Parse(_))));
}

#[test]
fn new_trims_whitespace_and_trailing_slashes() {
    let cfg = BackendConfig::new("  https://abc.supabase.co//  ", "k").unwrap();
    assert_eq!(cfg.url, "https://abc.supabase.co");
}
