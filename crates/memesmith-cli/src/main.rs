use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use memesmith_channels::{ChannelLifecycle, TelegramChannel, TelegramSender};
use memesmith_config::{AppConfig, ConfigLoader};
use memesmith_gateway::{build_runtime, serve_metrics};
use memesmith_media::{HttpImageSource, MemeFont, OverlayRenderer};
use memesmith_security::RedactingWriter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memesmith")]
#[command(about = "Turns chat reactions into captioned meme replies", version)]
struct Cli {
    /// Path to a YAML config file. Environment variables override it.
    #[arg(short, long, env = "MEMESMITH_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "MEMESMITH_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Connect to Telegram and serve memes (default)
    Run,
    /// Validate configuration and print it with secrets masked
    CheckConfig,
    /// Caption a local image without any network calls
    Render {
        /// Template image (PNG or JPEG)
        #[arg(long)]
        template: PathBuf,
        #[arg(long, default_value = "")]
        top: String,
        #[arg(long, default_value = "")]
        bottom: String,
        /// Output file; the extension picks the format
        #[arg(short, long, default_value = "meme.jpg")]
        output: PathBuf,
        /// TrueType font overriding `media.font_path`
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ConfigLoader::new(cli.config.clone())
        .load()
        .context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config).await,
        Commands::CheckConfig => check_config(&config),
        Commands::Render {
            template,
            top,
            bottom,
            output,
            font,
        } => render_local(&config, template, &top, &bottom, output, font),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingWriter::stderr());

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_bot(config: AppConfig) -> anyhow::Result<()> {
    config
        .validate_for_bot()
        .context("configuration is not usable")?;

    let Some(token) = config.telegram.bot_token.clone() else {
        bail!("telegram.bot_token is required");
    };

    let sink = Arc::new(TelegramSender::new(&token));
    let runtime = build_runtime(&config, sink)?;

    if config.metrics.enabled {
        let addr: SocketAddr = format!("{}:{}", config.metrics.host, config.metrics.port)
            .parse()
            .context("invalid metrics.host / metrics.port")?;
        let metrics = Arc::clone(&runtime.metrics);
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(addr, metrics).await {
                error!("metrics server stopped: {e}");
            }
        });
    }

    let mut channel = TelegramChannel::new(token, runtime.dispatcher.clone());
    channel.connect().await?;
    info!(
        "{} is up, history window {} messages, {} trigger reactions",
        channel.display_name(),
        runtime.history.capacity(),
        config.triggers.reactions.len()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Err(e) = channel.disconnect().await {
        warn!("telegram disconnect failed: {e}");
    }
    Ok(())
}

fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    let summary = serde_yaml::to_string(&masked(config))?;
    println!("{summary}");

    match config.validate_for_bot() {
        Ok(()) => {
            println!("configuration OK");
            Ok(())
        }
        Err(e) => bail!("configuration invalid: {e}"),
    }
}

/// Copy of the config safe to print.
fn masked(config: &AppConfig) -> AppConfig {
    fn mask(value: &mut Option<String>) {
        if value.as_deref().is_some_and(|v| !v.is_empty()) {
            *value = Some("***".to_string());
        }
    }

    let mut copy = config.clone();
    mask(&mut copy.telegram.bot_token);
    mask(&mut copy.llm.api_key);
    mask(&mut copy.search.api_key);
    copy
}

fn render_local(
    config: &AppConfig,
    template: PathBuf,
    top: &str,
    bottom: &str,
    output: PathBuf,
    font: Option<PathBuf>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&template)
        .with_context(|| format!("failed to read {}", template.display()))?;

    let font_path = font.or_else(|| config.media.font_path.clone());
    let renderer = OverlayRenderer::new(
        Arc::new(MemeFont::load_or_builtin(font_path.as_deref())),
        Arc::new(HttpImageSource::new(
            config.media.max_download_bytes,
            Duration::from_secs(config.media.download_timeout_secs),
        )),
    );

    let written = renderer.render(&bytes, top, bottom, &output)?;
    println!("{}", written.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run_with_text_logs() {
        let cli = Cli::try_parse_from(["memesmith"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn parses_render_arguments() {
        let cli = Cli::try_parse_from([
            "memesmith",
            "--log-format",
            "json",
            "render",
            "--template",
            "cat.png",
            "--top",
            "hello",
            "-o",
            "out.png",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Some(Commands::Render {
                template,
                top,
                bottom,
                output,
                font,
            }) => {
                assert_eq!(template, PathBuf::from("cat.png"));
                assert_eq!(top, "hello");
                assert_eq!(bottom, "");
                assert_eq!(output, PathBuf::from("out.png"));
                assert!(font.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn masked_config_hides_credentials() {
        let mut config = AppConfig::default();
        config.telegram.bot_token = Some("123456:ABCdef".into());
        config.llm.api_key = Some("sk-or-secret".into());

        let copy = masked(&config);
        assert_eq!(copy.telegram.bot_token.as_deref(), Some("***"));
        assert_eq!(copy.llm.api_key.as_deref(), Some("***"));
        assert!(copy.search.api_key.is_none());

        let yaml = serde_yaml::to_string(&copy).unwrap();
        assert!(!yaml.contains("sk-or-secret"));
        assert!(!yaml.contains("ABCdef"));
    }

    #[test]
    fn renders_local_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.png");
        let output = dir.path().join("m.png");
        image::RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]))
            .save(&template)
            .unwrap();

        render_local(
            &AppConfig::default(),
            template,
            "top",
            "bottom",
            output.clone(),
            None,
        )
        .unwrap();

        let rendered = image::open(&output).unwrap();
        assert_eq!(rendered.width(), 64);
    }

    #[test]
    fn missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_local(
            &AppConfig::default(),
            dir.path().join("nope.png"),
            "a",
            "b",
            dir.path().join("out.png"),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }
}
