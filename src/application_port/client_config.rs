/// Endpoint layout and tuning knobs of one API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub login_path: String,
    pub signup_path: String,
    pub logout_path: String,
    pub refresh_path: String,
    pub csrf_path: String,
    /// `code` prefix that marks a 403 body as a CSRF rejection.
    pub csrf_code_prefix: String,
    /// Fraction of the token lifetime after which a proactive refresh fires.
    pub refresh_ratio: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_owned(),
            login_path: "/auth/login".to_owned(),
            signup_path: "/auth/signup".to_owned(),
            logout_path: "/auth/logout".to_owned(),
            refresh_path: "/auth/refresh".to_owned(),
            csrf_path: "/csrf-token".to_owned(),
            csrf_code_prefix: "CSRF_".to_owned(),
            refresh_ratio: 0.8,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Login, signup and refresh never trigger a refresh on 401.
    pub fn is_auth_bootstrap(&self, route: &str) -> bool {
        route == self.login_path || route == self.signup_path || route == self.refresh_path
    }

    pub fn is_csrf_code(&self, code: &str) -> bool {
        code.starts_with(&self.csrf_code_prefix)
    }
}
