use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use petbot_daemon::{
    bot::PetBot,
    bridge::Bridge,
    cat::CatPlugin,
    config::AppConfig,
    pet::{ActionTable, StdDice},
    registry::Registry,
    storage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!("Starting petbot");

    let store = storage::connect(&config.storage).await?;
    let actions = ActionTable::load(&config.pets.actions_path)?;
    let cat = CatPlugin::load(&config.cat)?;

    let mut registry = Registry::new(
        actions,
        store,
        Box::new(StdDice::from_entropy()),
        config.irc.nickname.clone(),
    );
    registry.load().await?;

    let mut bridge = Bridge::connect(&config.irc).await?;
    let bridge_handle = bridge.handle();

    let mut bot = PetBot::new(
        registry,
        cat,
        Box::new(StdDice::from_entropy()),
        config.pets.clone(),
        config.irc.command_prefix.clone(),
    );

    let tick_interval = config.pets.tick_interval();
    // The next tick is scheduled once the current one is done, so ticks never overlap.
    let mut next_tick = tokio::time::Instant::now() + tick_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_tick) => {
                let lines = bot.tick();
                if !lines.is_empty() {
                    info!("Tick produced {} lines", lines.len());
                }
                bridge_handle.send_all(lines);
                next_tick = tokio::time::Instant::now() + tick_interval;
            }
            next = bridge.next_event() => {
                match next {
                    Ok(Some(event)) => {
                        let nick = bridge.current_nickname().to_string();
                        if nick != bot.registry().bot_nick() {
                            info!("Server gave us nickname {nick}");
                            bot.registry_mut().set_bot_nick(nick);
                        }
                        let lines = bot.handle(event).await;
                        bridge_handle.send_all(lines);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        error!(?err, "Lost IRC connection");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
