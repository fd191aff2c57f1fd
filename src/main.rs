use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use music_cdn_gateway::cdn::{AwsCdnClient, CdnBackend, MockCdnBackend};
use music_cdn_gateway::models::{AudioFormat, Config, Quality, StreamingOptions};
use music_cdn_gateway::CdnGateway;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "music-cdn-gateway")]
#[command(about = "Upload, sign and invalidate audio tracks on the CDN")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file under an explicit storage key.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Upload a file as a track variant.
    UploadTrack {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        track: String,
        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Print a signed, time-limited streaming URL.
    Sign {
        #[arg(value_name = "TRACK")]
        track: String,
        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Print the public CDN URL.
    Url {
        #[arg(value_name = "TRACK")]
        track: String,
        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Invalidate paths in the CDN cache.
    Invalidate {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },
    /// Print distribution download metrics for the last 24 hours.
    Metrics {
        #[arg(value_name = "TRACK")]
        track: String,
    },
}

#[derive(Debug, Args)]
struct VariantArgs {
    #[arg(long, value_parser = parse_quality_arg)]
    quality: Option<Quality>,
    #[arg(long, value_parser = parse_format_arg)]
    format: Option<AudioFormat>,
    #[arg(long)]
    bitrate: Option<u32>,
}

impl VariantArgs {
    fn options(&self) -> StreamingOptions {
        StreamingOptions {
            quality: self.quality,
            format: self.format,
            bitrate: self.bitrate,
        }
    }
}

fn parse_quality_arg(input: &str) -> std::result::Result<Quality, String> {
    input.parse()
}

fn parse_format_arg(input: &str) -> std::result::Result<AudioFormat, String> {
    input.parse()
}

async fn read_payload(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_gateway(config: Config) -> CdnGateway {
    let backend: Box<dyn CdnBackend> = if config.dry_run {
        info!("DRY_RUN enabled, requests are recorded in memory only");
        Box::new(MockCdnBackend::new())
    } else {
        Box::new(AwsCdnClient::new(&config).await)
    };
    CdnGateway::new(backend, config)
}

async fn run(gateway: &CdnGateway, command: Command) -> Result<()> {
    match command {
        Command::Upload {
            file,
            key,
            content_type,
        } => {
            let data = read_payload(&file).await?;
            let result = gateway
                .upload_audio_file(&data, &key, content_type.as_deref())
                .await?;
            print_json(&result)
        }
        Command::UploadTrack {
            file,
            track,
            variant,
        } => {
            let data = read_payload(&file).await?;
            let result = gateway
                .upload_track_variant(&track, &variant.options(), &data)
                .await?;
            print_json(&result)
        }
        Command::Sign { track, variant } => {
            let url = gateway
                .generate_streaming_url(&track, &variant.options())
                .await?;
            println!("{}", url);
            Ok(())
        }
        Command::Url { track, variant } => {
            println!(
                "{}",
                gateway.generate_cdn_streaming_url(&track, &variant.options())
            );
            Ok(())
        }
        Command::Invalidate { paths } => {
            let receipt = gateway.invalidate_cdn_cache(&paths).await?;
            println!("{} {}", receipt.id, receipt.status);
            Ok(())
        }
        Command::Metrics { track } => match gateway.get_streaming_metrics(&track).await {
            Some(metrics) => print_json(&metrics),
            None => {
                println!("null");
                Ok(())
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "music_cdn_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let gateway = match Config::from_env() {
        Ok(config) => build_gateway(config).await,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&gateway, args.command).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
