use anyhow::Result;
use babelcast::{
    create_router, AppState, Config, DeepgramStt, DeepgramTts, GroqTranslator, LocalRoomBus,
    NatsRoomBus, RoomBus, SessionContext,
};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "babelcast", about = "Live speech relay with per-listener translation")]
struct Args {
    /// Config file to load (without extension)
    #[arg(long, default_value = "config/babelcast")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let bus: Arc<dyn RoomBus> = match &cfg.nats.url {
        Some(url) => Arc::new(NatsRoomBus::connect(url).await?),
        None => {
            info!("No NATS URL configured, using in-process room fan-out");
            Arc::new(LocalRoomBus::new())
        }
    };

    let ctx = SessionContext {
        bus,
        stt: Arc::new(DeepgramStt::new(cfg.deepgram.api_key.clone())),
        translator: Arc::new(GroqTranslator::new(cfg.groq.api_key.clone())),
        synthesizer: Arc::new(DeepgramTts::new(cfg.deepgram.api_key.clone())),
    };

    let app = create_router(AppState::new(ctx));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
