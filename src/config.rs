use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::error::Error;

pub(crate) const DEFAULT_CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1";
pub(crate) const DEFAULT_TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
pub(crate) const DEFAULT_DOWNLOAD_URL: &str = "https://zipper.dataspace.copernicus.eu/odata/v1";

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    username: Option<String>,
    password: Option<String>,
    catalog_url: Option<String>,
    token_url: Option<String>,
    download_url: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(username: Option<String>, password: Option<String>) -> Result<ClientConfig> {
    resolve_config(
        username,
        password,
        |name| std::env::var(name).ok(),
        &rc_candidates(),
    )
}

fn resolve_config<E>(
    username: Option<String>,
    password: Option<String>,
    env: E,
    rc_candidates: &[PathBuf],
) -> Result<ClientConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let mut username = username.or_else(|| env("CDSE_USERNAME"));
    let mut password = password.or_else(|| env("CDSE_PASSWORD"));
    let mut catalog_url = env("CDSE_CATALOG_URL");
    let mut token_url = env("CDSE_TOKEN_URL");
    let mut download_url = env("CDSE_DOWNLOAD_URL");
    let mut verify: Option<bool> = None;

    for rc_path in rc_candidates {
        if rc_path.exists() {
            let cfg = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;

            username = username.or(cfg.username);
            password = password.or(cfg.password);
            catalog_url = catalog_url.or(cfg.catalog_url);
            token_url = token_url.or(cfg.token_url);
            download_url = download_url.or(cfg.download_url);
            verify = cfg.verify;
            break;
        }
    }

    let where_to_look = if rc_candidates.is_empty() {
        ".cdserc".to_string()
    } else {
        rc_candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let username = username.ok_or_else(|| {
        Error::Config(format!(
            "username (set CDSE_USERNAME or put `username:` in one of: {})",
            where_to_look
        ))
    })?;
    let password = password.ok_or_else(|| {
        Error::Config(format!(
            "password (set CDSE_PASSWORD or put `password:` in one of: {})",
            where_to_look
        ))
    })?;

    Ok(ClientConfig {
        username,
        password,
        catalog_url: catalog_url.unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
        token_url: token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        download_url: download_url.unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_string()),
        verify: verify.unwrap_or(true),
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // A bare `key:` takes its value from the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !is_key_line(line) {
                set_rc_value(&mut cfg, pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                set_rc_value(&mut cfg, k, v);
            }
        }
    }

    cfg
}

const RC_KEYS: [&str; 6] = [
    "username",
    "password",
    "catalog_url",
    "token_url",
    "download_url",
    "verify",
];

fn is_key_line(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(k, _)| RC_KEYS.contains(&k.trim()))
}

fn set_rc_value(cfg: &mut RcConfig, key: &str, value: &str) {
    match key {
        "username" => cfg.username = Some(value.to_string()),
        "password" => cfg.password = Some(value.to_string()),
        "catalog_url" => cfg.catalog_url = Some(value.to_string()),
        "token_url" => cfg.token_url = Some(value.to_string()),
        "download_url" => cfg.download_url = Some(value.to_string()),
        "verify" => cfg.verify = Some(value != "0"),
        _ => {}
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) CDSE_RC (explicit)
    // 2) ./.cdserc
    // 3) ~/.cdserc
    if let Ok(p) = std::env::var("CDSE_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".cdserc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".cdserc"));
    }
    v
}
