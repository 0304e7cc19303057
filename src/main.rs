use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;

use account_server::{
    auth::bootstrap::seed_admin,
    config::AppConfig,
    db::{connection, dao::DaoContext},
    logging::init_tracing,
    routes::router,
    services::mailer::{EmailSender, LogMailer, SmtpMailer},
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.logging.rust_log);

    let db = connection::connect(&cfg).await?;
    let mailer: Arc<dyn EmailSender> = if cfg.mail.enabled {
        Arc::new(SmtpMailer::new(&cfg.mail)?)
    } else {
        tracing::warn!("mail delivery disabled; reset e-mails will only be logged");
        Arc::new(LogMailer::new(&cfg.mail))
    };
    let state = AppState::new(cfg, db, mailer)?;

    if seed_admin(&DaoContext::new(&state.db).user(), &state.auth).await? {
        tracing::info!(email = %state.auth.admin_email, "seeded admin account");
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.general.host, state.config.general.port
    )
    .parse()
    .context("invalid host/port")?;
    tracing::info!("listening on http://{}", addr);

    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
