use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use tcr_core::{
    config::Config,
    dispatch::Dispatcher,
    monitor::{Monitor, MonitorSettings},
    ports::StdinPrompter,
    translate::{Translator, TranslatorConfig},
};
use tcr_openai::OpenAiClient;
use tcr_telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<(), tcr_core::Error> {
    let cfg = Config::load()?;
    tcr_core::logging::init("tcr", &cfg.log_file)?;

    let telegram = Arc::new(
        TelegramClient::connect(cfg.api_id, &cfg.api_hash, cfg.session_file()).await?,
    );

    let openai = OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_base_url.clone(),
        cfg.translation_timeout,
    )?;
    let translator = Arc::new(Translator::new(
        Arc::new(openai),
        TranslatorConfig {
            model: cfg.openai_model.clone(),
            max_tokens: cfg.translation_max_tokens,
            temperature: cfg.translation_temperature,
            attribution_tag: cfg.attribution_tag.clone(),
        },
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        telegram.clone(),
        translator,
        cfg.relay_mode,
        cfg.source_channel.clone(),
        cfg.destination_channel.clone(),
    ));

    let monitor = Monitor::new(
        telegram.clone(),
        telegram,
        dispatcher,
        Arc::new(StdinPrompter),
        MonitorSettings {
            phone_number: cfg.phone_number.clone(),
            source_channel: cfg.source_channel.clone(),
            album_debounce: cfg.album_debounce,
        },
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    monitor.run(shutdown).await?;
    info!("Disconnected from Telegram");
    Ok(())
}
