mod producer;
mod renderer;
mod stats;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use producer::ProducerSettings;
use render_stream::{IncomingVideoStream, StreamConfig, StreamId, StreamStats};
use renderer::RecordingRenderer;
use serde::Serialize;
use stats::IntervalSummary;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 运行结果汇总
#[derive(Debug, Serialize)]
struct SimulationSummary {
    config: StreamConfig,
    fps: u32,
    jitter_ms: u64,
    frames_sent: u64,
    /// 流拒收的帧数
    frames_refused: u64,
    /// 缓冲区因渲染时间越界丢弃的帧数
    frames_rejected: u64,
    frames_rendered: usize,
    out_of_order: u64,
    stream: StreamStats,
    arrivals: IntervalSummary,
    deliveries: IntervalSummary,
}

fn cli() -> Command {
    Command::new("Incoming Stream Simulator")
        .version("1.0")
        .author("Video Streaming Team")
        .about("Drives an incoming video stream with a jittery producer and reports render smoothness")
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Nominal producer frame rate")
                .value_parser(clap::value_parser!(u32).range(1..=240))
                .default_value("30"),
        )
        .arg(
            Arg::new("jitter-ms")
                .long("jitter-ms")
                .value_name("MS")
                .help("Upper bound of random arrival jitter per frame")
                .value_parser(clap::value_parser!(u64))
                .default_value("20"),
        )
        .arg(
            Arg::new("duration-secs")
                .long("duration-secs")
                .value_name("SECS")
                .help("How long the producer runs")
                .value_parser(clap::value_parser!(u64))
                .default_value("5"),
        )
        .arg(
            Arg::new("render-delay-ms")
                .long("render-delay-ms")
                .value_name("MS")
                .help("Expected render delay applied to the frame queue")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("disable-smoothing")
                .long("disable-smoothing")
                .help("Deliver frames on the producer thread without buffering")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Stream configuration file (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the summary as JSON")
                .action(ArgAction::SetTrue),
        )
}

/// 配置文件 → 环境变量 → 命令行，后者覆盖前者
fn build_config(matches: &ArgMatches) -> Result<StreamConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => StreamConfig::load(path)
            .with_context(|| format!("Failed to load stream config from {}", path))?,
        None => StreamConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(delay) = matches.get_one::<u32>("render-delay-ms") {
        config.render_delay_ms = *delay;
    }
    if matches.get_flag("disable-smoothing") {
        config.disable_prerenderer_smoothing = true;
    }

    config.validate().context("Invalid stream configuration")?;
    Ok(config)
}

fn print_summary(summary: &SimulationSummary) {
    println!("\n--- Simulation Summary ---");
    println!(
        "Mode: {}",
        if summary.stream.smoothing_enabled { "smoothing" } else { "direct" }
    );
    println!("Producer: {} fps, up to {}ms jitter", summary.fps, summary.jitter_ms);
    println!(
        "Frames: sent={} refused={} rejected={} rendered={} out_of_order={}",
        summary.frames_sent,
        summary.frames_refused,
        summary.frames_rejected,
        summary.frames_rendered,
        summary.out_of_order
    );
    println!("Incoming rate: {} fps", summary.stream.incoming_rate);
    println!(
        "Arrival interval:  mean={:.2}ms jitter={:.2}ms max={:.2}ms",
        summary.arrivals.mean_ms, summary.arrivals.jitter_ms, summary.arrivals.max_ms
    );
    println!(
        "Delivery interval: mean={:.2}ms jitter={:.2}ms max={:.2}ms",
        summary.deliveries.mean_ms, summary.deliveries.jitter_ms, summary.deliveries.max_ms
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志 - 使用环境变量 RUST_LOG 控制级别
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let matches = cli().get_matches();
    let config = build_config(&matches)?;

    let settings = ProducerSettings {
        fps: *matches.get_one::<u32>("fps").context("missing --fps")?,
        jitter_ms: *matches.get_one::<u64>("jitter-ms").context("missing --jitter-ms")?,
        duration: Duration::from_secs(
            *matches
                .get_one::<u64>("duration-secs")
                .context("missing --duration-secs")?,
        ),
        render_delay_ms: config.render_delay_ms,
        width: 1280,
        height: 720,
    };

    info!("🎥 Stream simulator starting...");
    info!(
        "  Smoothing: {}, render delay: {}ms",
        !config.disable_prerenderer_smoothing, config.render_delay_ms
    );

    let stream = Arc::new(IncomingVideoStream::with_config(StreamId::new(1), config.clone())?);
    let renderer = Arc::new(RecordingRenderer::new());
    stream.set_render_callback(Some(renderer.clone()));
    stream.start()?;

    let report = producer::run(stream.clone(), settings.clone()).await;

    // 留出时间让缓冲区中的剩余帧投递完
    tokio::time::sleep(Duration::from_millis(
        settings.jitter_ms + settings.render_delay_ms as u64 + config.delivery.max_wait_ms,
    ))
    .await;

    // stop 会阻塞等待投递线程退出
    let stopping = stream.clone();
    tokio::task::spawn_blocking(move || stopping.stop())
        .await
        .context("Stop task failed")??;
    info!("✓ Stream stopped");

    let stream_stats = stream.stats();
    let summary = SimulationSummary {
        config,
        fps: settings.fps,
        jitter_ms: settings.jitter_ms,
        frames_sent: report.frames_sent,
        frames_refused: report.frames_refused,
        frames_rejected: stream_stats.frames_rejected,
        frames_rendered: renderer.frames_rendered(),
        out_of_order: renderer.out_of_order(),
        stream: stream_stats,
        arrivals: report.arrivals,
        deliveries: renderer.summary(),
    };

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}
