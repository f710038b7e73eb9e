mod analysis;
mod app;
mod audio;
mod config;
mod coordinator;
mod error;
mod media;
mod session;
mod ui;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "diamond_player=info".into()))
        .with(fmt::layer())
        .init();

    app::run()
}
