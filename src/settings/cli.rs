use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// API path to fetch once the session is ready.
    #[arg(long, default_value = "/auth/me")]
    pub path: String,
    /// Log in as this user first; the password is read from TOKENPIPE_PASSWORD.
    #[arg(long)]
    pub username: Option<String>,
}
