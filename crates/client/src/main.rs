use anyhow::{Context, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use zhex_auth::{LoginOutcome, LoginRequest};
use zhex_client::{ChannelEvent, ClientConfig, Dashboard};
use zhex_core::CompanyId;

const ENV_EMAIL: &str = "ZHEX_EMAIL";
const ENV_PASSWORD: &str = "ZHEX_PASSWORD";
const ENV_COMPANY_ID: &str = "ZHEX_COMPANY_ID";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    zhex_observability::init();

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    let dashboard = Dashboard::open(config).await.context("failed to open dashboard")?;

    if !dashboard.client().has_session().await? {
        sign_in(&dashboard).await?;
    } else {
        info!("using stored session");
    }

    let profile = dashboard.profile().get().await.context("failed to load profile")?;
    info!(name = %profile.name, email = %profile.email, "profile loaded");

    let companies = dashboard.companies().list().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to list companies; company rooms will not be joined");
        Vec::new()
    });

    let channel = dashboard.realtime().await?;
    let mut events = channel.subscribe();
    channel.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::Connected) => {
                    for company in &companies {
                        if let Err(e) = channel.join_company_room(&company.id) {
                            warn!(company_id = %company.id, error = %e, "failed to join company room");
                        }
                    }
                }
                Ok(ChannelEvent::Server(event)) => info!(event = event.name(), ?event, "realtime event"),
                Ok(ChannelEvent::Disconnected(reason)) => info!(?reason, "realtime channel down"),
                Ok(ChannelEvent::Failed) => {
                    warn!("realtime channel gave up reconnecting");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "realtime events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    channel.disconnect().await;
    Ok(())
}

async fn sign_in(dashboard: &Dashboard) -> anyhow::Result<()> {
    let email = std::env::var(ENV_EMAIL).with_context(|| format!("no stored session and {ENV_EMAIL} is not set"))?;
    let password = std::env::var(ENV_PASSWORD).with_context(|| format!("{ENV_PASSWORD} is not set"))?;
    let request = LoginRequest::new(&email, &password)?;

    let outcome = match dashboard.auth().login(&request).await? {
        LoginOutcome::CompanySelection { companies } => {
            let chosen = match std::env::var(ENV_COMPANY_ID) {
                Ok(id) => CompanyId::new(id)?,
                Err(_) => match companies.first() {
                    Some(company) => {
                        info!(company = %company.name, "no {ENV_COMPANY_ID} set, using the first company");
                        company.id.clone()
                    }
                    None => bail!("login requires a company but none was offered"),
                },
            };
            dashboard.auth().login_with_company(request, chosen).await?
        }
        other => other,
    };

    match outcome {
        LoginOutcome::Authenticated { user } => {
            info!(name = ?user.name, "signed in");
            Ok(())
        }
        LoginOutcome::Rejected { message } => bail!("login rejected: {message}"),
        LoginOutcome::CompanySelection { .. } => bail!("login still requires a company selection"),
    }
}
