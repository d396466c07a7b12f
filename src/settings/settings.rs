use crate::application_port::ClientConfig;
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    #[serde(default)]
    pub auth: Auth,
    pub credential: Credential,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub login_path: String,
    pub signup_path: String,
    pub logout_path: String,
    pub refresh_path: String,
    pub csrf_path: String,
    pub csrf_code_prefix: String,
    pub refresh_ratio: f64,
}

impl Default for Auth {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            login_path: defaults.login_path,
            signup_path: defaults.signup_path,
            logout_path: defaults.logout_path,
            refresh_path: defaults.refresh_path,
            csrf_path: defaults.csrf_path,
            csrf_code_prefix: defaults.csrf_code_prefix,
            refresh_ratio: defaults.refresh_ratio,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Credential {
    pub backend: String, // "memory" or "file"
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            login_path: self.auth.login_path.clone(),
            signup_path: self.auth.signup_path.clone(),
            logout_path: self.auth.logout_path.clone(),
            refresh_path: self.auth.refresh_path.clone(),
            csrf_path: self.auth.csrf_path.clone(),
            csrf_code_prefix: self.auth.csrf_code_prefix.clone(),
            refresh_ratio: self.auth.refresh_ratio,
        }
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn auth_section_is_optional() {
        let settings = from_toml(
            r#"
            [api]
            base_url = "https://crm.example.com/api"
            timeout_secs = 15

            [credential]
            backend = "memory"

            [log]
            filter = "info"
            "#,
        );
        let config = settings.client_config();
        assert_eq!(config.base_url, "https://crm.example.com/api");
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.refresh_ratio, 0.8);
    }

    #[test]
    fn auth_paths_can_be_overridden() {
        let settings = from_toml(
            r#"
            [api]
            base_url = "http://localhost"
            timeout_secs = 5

            [auth]
            refresh_path = "/session/renew"
            csrf_code_prefix = "EBADCSRF"

            [credential]
            backend = "file"
            path = "/tmp/session.json"

            [log]
            filter = "debug"
            "#,
        );
        let config = settings.client_config();
        assert_eq!(config.refresh_path, "/session/renew");
        assert_eq!(config.login_path, "/auth/login");
        assert!(config.is_csrf_code("EBADCSRFTOKEN"));
        assert_eq!(settings.credential.path.as_deref(), Some("/tmp/session.json"));
    }
}
