//src/main.rs

use std::pin::pin;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use stock_ledger::{config::AppState, db::MIGRATOR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG sobrescreve o filtro padrão)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stock_ledger=info,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .context("Falha ao inicializar o estado da aplicação.")?;

    MIGRATOR
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // --- Loop de manutenção: recalcula a projeção de suprimentos ---
    let every = app_state.settings.summary_refresh_interval;
    tracing::info!(interval_secs = every.as_secs(), "🚀 Atualização periódica dos resumos iniciada");

    let mut ticker = tokio::time::interval(every);
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = app_state.supply_chain_service.refresh_all().await {
                    let report = e.report();
                    tracing::warn!(code = report.code, message = %report.message, "Atualização dos resumos falhou");
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Falha ao escutar o sinal de encerramento");
                }
                break;
            }
        }
    }

    tracing::info!("Encerrando...");
    app_state.db_pool.close().await;
    Ok(())
}
