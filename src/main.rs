mod cli;

use splitpoint::config;
use splitpoint_format::{
    AudioMetadata, FileSource, FormatDetails, FormatStrategyManager, MediaSource, ParseOutcome,
    SplitPlan,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "splitpoint=trace,splitpoint_format=trace".to_string()
        } else {
            "splitpoint=info,splitpoint_format=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, &config, json))
        }
        Commands::Plan {
            file,
            segment_secs,
            max_bytes,
            json,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(secs) = segment_secs {
                config.split.target_duration_secs = secs;
            }
            if max_bytes.is_some() {
                config.split.max_segment_bytes = max_bytes;
            }
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan_file(&file, &config, json))
        }
        Commands::Extract {
            file,
            start,
            end,
            output,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(extract_segment(&file, &config, start, end, &output))
        }
        Commands::Formats => list_formats(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("splitpoint {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn open_and_parse(
    file: &Path,
    manager: &FormatStrategyManager,
) -> Result<(FileSource, ParseOutcome)> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let source = FileSource::open(file)
        .await
        .with_context(|| format!("Failed to open {:?}", file))?;
    let outcome = manager
        .parse_file(&source)
        .await
        .with_context(|| format!("Failed to parse {:?}", file))?;

    if let Some(error) = outcome.error() {
        tracing::warn!("Metadata for {:?} is incomplete: {}", file, error);
    }

    Ok((source, outcome))
}

async fn probe_file(file: &Path, config: &config::Config, json: bool) -> Result<()> {
    let manager = splitpoint::manager_from_config(config);
    let (source, outcome) = open_and_parse(file, &manager).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let meta = outcome.metadata();
    println!("File: {}", source.path().display());
    println!(
        "Format: {} ({})",
        meta.format(),
        meta.parser.as_deref().unwrap_or("unknown parser")
    );
    println!("Size: {} bytes", meta.file_size);
    match meta.duration {
        Some(secs) => println!("Duration: {} ({:.3} s)", format_time(secs), secs),
        None => println!("Duration: unknown"),
    }
    if let Some(bitrate) = meta.bitrate {
        println!("Bitrate: {} kbps", bitrate / 1000);
    }
    if let Some(rate) = meta.sample_rate {
        println!("Sample rate: {} Hz", rate);
    }
    if let Some(channels) = meta.channels {
        println!("Channels: {}", channels);
    }

    match &meta.details {
        FormatDetails::Mp3(mp3) => {
            println!("\nMPEG: {:?} {:?} {:?}", mp3.version, mp3.layer, mp3.channel_mode);
            println!("  First frame: byte {}", mp3.first_frame_offset);
            println!("  Frame size: {} bytes", mp3.frame_size);
            if let Some(id3) = &mp3.id3 {
                println!("  ID3v2.{} tag: {} bytes", id3.major_version, id3.total_size());
            }
            match &mp3.vbr_info {
                Some(tag) => {
                    print!("  {:?} tag", tag.kind);
                    if let Some(frames) = tag.frames {
                        print!(", {} frames", frames);
                    }
                    println!("{}", if mp3.vbr { " [VBR]" } else { "" });
                }
                None => println!("  No VBR tag"),
            }
        }
        FormatDetails::Wav(wav) => {
            if let Some(format) = wav.audio_format {
                print!("\nWAVE format: 0x{:04X}", format);
                if let Some(bits) = wav.bits_per_sample {
                    print!(", {} bit", bits);
                }
                if let Some(align) = wav.block_align {
                    print!(", block align {}", align);
                }
                println!();
            }
            if let (Some(offset), Some(size)) = (wav.data_chunk_offset, wav.data_chunk_size) {
                println!("  Data: {} bytes at byte {}", size, offset);
            }
            println!("  Chunks: {}", wav.chunks.len());
            for chunk in &wav.chunks {
                println!("    '{}' {} bytes at {}", chunk.id, chunk.size, chunk.offset);
            }
            if let Some(info) = &wav.list_info {
                for (key, value) in info {
                    println!("  {}: {}", key, value);
                }
            }
        }
        FormatDetails::Unparsed => {}
    }

    if let Some(error) = outcome.error() {
        println!("\nWarning: {}", error);
    }

    Ok(())
}

async fn plan_file(file: &Path, config: &config::Config, json: bool) -> Result<()> {
    let manager = splitpoint::manager_from_config(config);
    let (source, outcome) = open_and_parse(file, &manager).await?;
    let meta = outcome.metadata();

    let plan = SplitPlan::builder()
        .target_duration(config.split.target_duration_secs)
        .max_segment_bytes(config.split.max_segment_bytes)
        .build(&manager, &source, meta)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{}: {} segments, audio bytes {}..{}",
        source.name(),
        plan.segment_count(),
        plan.audio_start,
        plan.audio_end
    );
    for seg in &plan.segments {
        println!(
            "  [{}] {} - {}  bytes {}..{} ({} bytes)",
            seg.index,
            format_time(seg.start_time_secs),
            format_time(seg.start_time_secs + seg.duration_secs),
            seg.start,
            seg.end,
            seg.len()
        );
    }

    Ok(())
}

/// Snap a time to the nearest boundary inside the audio payload.
async fn boundary_at(
    manager: &FormatStrategyManager,
    source: &dyn MediaSource,
    meta: &AudioMetadata,
    secs: f64,
) -> u64 {
    let (first, last) = (meta.audio_start(), meta.audio_end());
    let pos = manager.position_from_time(secs, meta).clamp(first, last);
    if pos == first || pos == last {
        return pos;
    }
    manager.find_best_split_point(source, pos, meta).await
}

async fn extract_segment(
    file: &Path,
    config: &config::Config,
    start: f64,
    end: f64,
    output: &Path,
) -> Result<()> {
    if !(start >= 0.0 && end > start) {
        anyhow::bail!("Invalid time range: {}..{}", start, end);
    }

    let manager = splitpoint::manager_from_config(config);
    let (source, outcome) = open_and_parse(file, &manager).await?;
    let meta = outcome.metadata();

    let start_pos = boundary_at(&manager, &source, meta, start).await;
    let end_pos = boundary_at(&manager, &source, meta, end).await;
    if end_pos <= start_pos {
        anyhow::bail!(
            "Time range {}..{} maps to an empty byte range in {:?}",
            start,
            end,
            file
        );
    }

    let segment = manager
        .create_segment(&source, start_pos, end_pos, meta)
        .await
        .context("Failed to read segment")?;

    tokio::fs::write(output, &segment.data)
        .await
        .with_context(|| format!("Failed to write {:?}", output))?;

    tracing::info!(
        "Extracted bytes {}..{} of {:?} into {:?}",
        start_pos,
        end_pos,
        file,
        output
    );
    println!(
        "Wrote {} bytes ({} header + {} audio) to {}",
        segment.len(),
        segment.header_len,
        segment.len() - segment.header_len,
        output.display()
    );

    Ok(())
}

fn list_formats() -> Result<()> {
    let manager = FormatStrategyManager::default();

    println!("Formats in detection order:\n");
    for (i, format) in manager.supported_formats().iter().enumerate() {
        if let Some(strategy) = manager.get_strategy(format) {
            println!(
                "  {}. {} ({}) - .{}",
                i + 1,
                format,
                strategy.name(),
                strategy.extensions().join(", .")
            );
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let limits = &config.limits;
    println!("  Header window: {} bytes", limits.header_window);
    println!("  Frame search window: {} bytes", limits.frame_search_window);
    println!("  WAV scan limit: {} bytes", limits.wav_scan_limit);
    println!("  Split window radius: {} bytes", limits.split_window_radius);
    println!("  Boundary search range: {} bytes", limits.boundary_search_range);
    println!(
        "  Target segment duration: {} s",
        config.split.target_duration_secs
    );
    if let Some(max) = config.split.max_segment_bytes {
        println!("  Max segment size: {} bytes", max);
    }

    Ok(())
}

fn format_time(secs: f64) -> String {
    let millis = (secs.max(0.0) * 1000.0).round() as u64;
    let total = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        millis % 1000
    )
}
