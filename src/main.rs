//! avcplay CLI
//!
//! Inspect H.264 streams and simulate playback against the recording
//! accelerator.

use avcplay_lib::codec::h264::{Pps, Sps};
use avcplay_lib::config::PlayerConfig;
use avcplay_lib::format::{open_source, VideoTrackInfo};
use avcplay_lib::hwaccel::{DecodeAccelerator, RecordingAccelerator};
use avcplay_lib::player::{load_stream, FrameDescriptor, Player};
use avcplay_lib::{init, Config};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Submissions the dry-run player keeps for inspection
const PLAY_HISTORY: usize = 64;

#[derive(Parser)]
#[command(name = "avcplay")]
#[command(about = "avcplay - H.264 decode orchestration", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream and parameter set information
    Info {
        /// Input file path
        input: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List per-frame decode metadata
    Frames {
        /// Input file path
        input: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Simulate playback against the recording accelerator
    Play {
        /// Input file path
        input: PathBuf,

        /// Seconds per host tick (overrides the config file)
        #[arg(long)]
        tick: Option<f64>,

        /// Player configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    init(config)?;

    info!("avcplay v{}", avcplay_lib::VERSION);

    match cli.command {
        Commands::Info { input, json } => cmd_info(&input, json)?,
        Commands::Frames { input, json } => cmd_frames(&input, json)?,
        Commands::Play {
            input,
            tick,
            config,
            max_ticks,
        } => cmd_play(&input, tick, config.as_deref(), max_ticks)?,
    }

    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct InfoResult<'a> {
        file: String,
        track: &'a VideoTrackInfo,
        frames: usize,
        duration_seconds: f64,
        frame_rate: Option<f64>,
        num_dpb_slots: u32,
        coded_width: u32,
        coded_height: u32,
        sps: Vec<Sps>,
        pps: Vec<Pps>,
    }

    let source = open_source(input)?;
    let stream = load_stream(&source)?;
    let (coded_width, coded_height) = stream.params.coded_dimensions().unwrap_or_default();
    let frame_rate = stream
        .params
        .primary_sps()
        .and_then(|sps| sps.vui.as_ref())
        .and_then(|vui| vui.frame_rate())
        .or_else(|| {
            (stream.total_duration > 0.0)
                .then(|| stream.frame_count() as f64 / stream.total_duration)
        });

    let result = InfoResult {
        file: input.display().to_string(),
        track: &stream.track,
        frames: stream.frame_count(),
        duration_seconds: stream.total_duration,
        frame_rate,
        num_dpb_slots: stream.params.num_dpb_slots(),
        coded_width,
        coded_height,
        sps: stream.params.sps_list(),
        pps: stream.params.pps_list(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("File: {}", result.file);
    println!();
    println!("Track:");
    println!("  Codec: {}", result.track.codec);
    println!("  Resolution: {}x{}", result.track.width, result.track.height);
    println!("  Coded Size: {}x{}", coded_width, coded_height);
    println!("  Timescale: {}", result.track.timescale);
    println!("  Frames: {}", result.frames);
    println!("  Duration: {:.3}s", result.duration_seconds);
    if let Some(fps) = result.frame_rate {
        println!("  Frame Rate: {:.3}", fps);
    }
    println!("  DPB Slots: {}", result.num_dpb_slots);
    println!();

    for sps in &result.sps {
        println!("SPS #{}:", sps.seq_parameter_set_id);
        println!("  Profile: {} Level: {}", sps.profile_idc, sps.level_idc);
        println!("  Chroma Format: {}", sps.chroma_format_idc);
        println!("  POC Type: {}", sps.pic_order_cnt_type);
        println!("  Max Ref Frames: {}", sps.max_num_ref_frames);
        println!("  Size: {}x{}", sps.width(), sps.height());
    }
    for pps in &result.pps {
        println!("PPS #{} -> SPS #{}:", pps.pic_parameter_set_id, pps.seq_parameter_set_id);
        println!(
            "  Entropy: {}",
            if pps.entropy_coding_mode { "CABAC" } else { "CAVLC" }
        );
        println!("  Transform 8x8: {}", pps.transform_8x8_mode);
    }

    Ok(())
}

fn cmd_frames(input: &Path, json: bool) -> anyhow::Result<()> {
    let source = open_source(input)?;
    let stream = load_stream(&source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stream.frames)?);
        return Ok(());
    }

    println!(
        "{:>6} {:>6} {:>5} {:>6} {:>4} {:>3} {:>6} {:>9} {:>8} {:>8}",
        "decode", "disp", "type", "poc", "gop", "ref", "fnum", "size", "pts", "dur"
    );
    for frame in &stream.frames {
        print_frame(frame);
    }
    Ok(())
}

fn print_frame(frame: &FrameDescriptor) {
    let kind = if frame.is_idr() { "IDR" } else { "P" };
    println!(
        "{:>6} {:>6} {:>5} {:>6} {:>4} {:>3} {:>6} {:>9} {:>8.3} {:>8.3}",
        frame.decode_order,
        frame.display_order,
        kind,
        frame.poc,
        frame.gop_cycle,
        frame.reference_priority,
        frame.frame_num,
        frame.src_byte_size,
        frame.pts_seconds,
        frame.duration_seconds
    );
}

fn cmd_play(
    input: &Path,
    tick: Option<f64>,
    config_path: Option<&Path>,
    max_ticks: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    if let Some(tick) = tick {
        config.tick_seconds = tick;
    }
    config.validate()?;
    let tick_seconds = config.tick_seconds;

    let source = open_source(input)?;
    let accelerator = RecordingAccelerator::new().with_history_limit(PLAY_HISTORY);
    let mut player = Player::open(source, accelerator, config)?;

    println!(
        "Playing {} frames ({:.3}s) at {:.4}s per tick",
        player.last_frame_number() + 1,
        player.total_duration(),
        tick_seconds
    );

    let mut ticks = 0u64;
    while !player.is_stopped() {
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }

        let result = player.update(tick_seconds)?;
        if let Some(sync) = player.presentation_sync() {
            player.accelerator_mut().submit(&sync, &[])?;
        }
        ticks += 1;

        debug!(
            "tick {}: decode {} display {} surface {:?} advanced {} throttled {}",
            ticks,
            player.decode_frame_number(),
            player.display_frame_number(),
            player.current_display_surface(),
            result.advanced,
            result.throttled
        );
    }

    let accelerator = player.accelerator();
    println!("Ticks: {}", ticks);
    println!("Decoded: {}", player.decode_frame_number());
    println!("Displayed up to: {}", player.display_frame_number());
    println!("Submissions: {}", accelerator.accepted_count());
    println!("Decode requests: {}", accelerator.decode_count());
    println!("Stopped: {}", player.is_stopped());

    Ok(())
}
