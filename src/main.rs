use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokenpipe::application_impl::SessionContext;
use tokenpipe::application_port::{LoginInput, TerminationReason};
use tokenpipe::domain_model::ApiRequest;
use tokenpipe::domain_port::KeyValueStore;
use tokenpipe::infra::*;
use tokenpipe::logger::*;
use tokenpipe::settings::*;

const DEFAULT_CREDENTIAL_PATH: &str = "session.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
        project_settings.api.timeout_secs,
    ))?);
    let store: Arc<dyn KeyValueStore> = match project_settings.credential.backend.as_str() {
        "memory" => Arc::new(MemoryKeyValueStore::new()),
        "file" => Arc::new(FileKeyValueStore::open(
            project_settings
                .credential
                .path
                .as_deref()
                .unwrap_or(DEFAULT_CREDENTIAL_PATH),
        )?),
        other => return Err(anyhow!("Unknown credential backend: {}", other)),
    };

    let ctx = SessionContext::new(project_settings.client_config(), transport, store)?;
    ctx.on_session_terminated(|reason: &TerminationReason| {
        warn!(%reason, "session terminated, login required");
    });

    ctx.auth().restore().await?;
    if let Some(username) = cli.username {
        let password = std::env::var("TOKENPIPE_PASSWORD")
            .map_err(|_| anyhow!("TOKENPIPE_PASSWORD is not set"))?;
        let session = ctx.auth().login(&LoginInput { username, password }).await?;
        info!(user = ?session.user.map(|u| u.id), "logged in");
    }

    let payload = ctx.pipeline().execute(&ApiRequest::get(cli.path)).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}
