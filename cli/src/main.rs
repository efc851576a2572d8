use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use slowscan_core::{modes, read_wav, Decoder, DecoderOptions, Encoder, Mode, SAMPLE_RATE};

#[derive(Parser)]
#[command(name = "slowscan")]
#[command(about = "SSTV encoder/decoder: images to audio and back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input image (encode) or WAV file (decode)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output WAV file (encode) or image (decode)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// SSTV mode for encoding (ROBOT36, MARTIN1, SCOTTIE1, PD120)
    #[arg(short, long, default_value = "ROBOT36")]
    mode: String,

    /// Start web server on port 8000
    #[arg(long)]
    server: bool,

    /// Port for web server
    #[arg(long, default_value = "8000")]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image to an SSTV WAV file
    Encode {
        /// Input image (PNG, JPEG, ...)
        #[arg(value_name = "INPUT.PNG")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// SSTV mode (ROBOT36, MARTIN1, SCOTTIE1, PD120)
        #[arg(short, long, default_value = "ROBOT36")]
        mode: String,
    },

    /// Decode an SSTV WAV file to an image
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output image (PNG)
        #[arg(value_name = "OUTPUT.PNG")]
        output: PathBuf,

        /// Force a mode instead of trusting VIS detection
        #[arg(short, long)]
        mode: Option<String>,

        /// Disable sync re-acquisition and carrier offset calibration
        #[arg(long)]
        no_calibrate: bool,
    },

    /// Start web server for encode/decode operations
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.server {
        return start_web_server(cli.port);
    }

    if let Some(command) = cli.command {
        match command {
            Commands::Encode {
                input,
                output,
                mode,
            } => encode_command(&input, &output, &mode)?,
            Commands::Decode {
                input,
                output,
                mode,
                no_calibrate,
            } => decode_command(&input, &output, mode.as_deref(), !no_calibrate)?,
            Commands::Serve { port } => return start_web_server(port),
        }
        return Ok(());
    }

    // Positional fallback: pick the operation from the input extension.
    if let (Some(input), Some(output)) = (cli.input, cli.output) {
        match input.extension().and_then(|s| s.to_str()) {
            Some("wav") => decode_command(&input, &output, None, true)?,
            Some(_) => encode_command(&input, &output, &cli.mode)?,
            None => {
                eprintln!("Error: cannot tell encode from decode; use a subcommand");
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("Error: no operation specified. Use 'slowscan --help' for usage");
        std::process::exit(1);
    }

    Ok(())
}

fn lookup_mode(key: &str) -> Result<&'static Mode, Box<dyn std::error::Error>> {
    modes::from_key(key).ok_or_else(|| format!("unknown mode '{key}', expected one of ROBOT36, MARTIN1, SCOTTIE1, PD120").into())
}

/// Scale to the mode's raster, preserving aspect ratio with black bars.
fn letterbox(image: &image::DynamicImage, mode: &Mode) -> Vec<u8> {
    let (tw, th) = (mode.width as u32, mode.lines as u32);
    let scaled = image.resize(tw, th, image::imageops::FilterType::Lanczos3);
    let mut canvas = image::RgbaImage::from_pixel(tw, th, image::Rgba([0, 0, 0, 255]));
    let ox = (tw - scaled.width()) / 2;
    let oy = (th - scaled.height()) / 2;
    image::imageops::overlay(&mut canvas, &scaled.to_rgba8(), ox as i64, oy as i64);
    canvas.into_raw()
}

fn encode_command(
    input: &Path,
    output: &Path,
    mode_key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = lookup_mode(mode_key)?;
    let source = image::open(input)?;
    println!(
        "Read {}x{} image from {}",
        source.width(),
        source.height(),
        input.display()
    );

    let pixels = letterbox(&source, mode);
    let wav = Encoder::new(SAMPLE_RATE).encode_to_wav(&pixels, mode.width, mode.lines, mode)?;
    std::fs::write(output, &wav)?;

    println!(
        "Encoded as {} ({}x{}), wrote {} bytes to {}",
        mode.name,
        mode.width,
        mode.lines,
        wav.len(),
        output.display()
    );
    Ok(())
}

fn decode_command(
    input: &Path,
    output: &Path,
    mode_key: Option<&str>,
    calibrate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(input)?;
    let (samples, sample_rate) = read_wav(&bytes)?;
    println!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        input.display()
    );

    let options = DecoderOptions {
        auto_calibrate: calibrate,
        mode_hint: match mode_key {
            Some(key) => Some(lookup_mode(key)?),
            None => None,
        },
    };
    let image = Decoder::with_options(sample_rate, options).decode(&samples)?;

    let diag = &image.diagnostics;
    println!("Mode: {} (VIS {:?})", diag.mode_name, diag.vis_code);
    println!(
        "Duration: {:.1}s, first sync at sample {}, decoded in {} ms",
        diag.duration_secs, diag.first_sync, diag.decode_ms
    );
    if diag.freq_offset != 0.0 {
        println!("Carrier offset: {:.0} Hz (auto-calibration applied)", diag.freq_offset);
    }
    println!(
        "Quality: {:?} (R {:.0}, G {:.0}, B {:.0}, brightness {:.0})",
        diag.quality.verdict,
        diag.quality.r_avg,
        diag.quality.g_avg,
        diag.quality.b_avg,
        diag.quality.brightness
    );
    for warning in &diag.quality.warnings {
        println!("Warning: {warning}");
    }

    let raster =
        image::RgbaImage::from_raw(image.width as u32, image.height as u32, image.pixels)
            .ok_or("decoded raster has unexpected size")?;
    raster.save(output)?;
    println!(
        "Wrote {}x{} image to {}",
        image.width,
        image.height,
        output.display()
    );
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct EncodeRequest {
    image_base64: String,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "ROBOT36".to_string()
}

#[derive(Serialize, Deserialize)]
struct EncodeResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wav_base64: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct DecodeRequest {
    wav_base64: String,
    #[serde(default)]
    no_calibrate: bool,
}

#[derive(Serialize, Deserialize)]
struct DecodeResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    png_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<serde_json::Value>,
}

#[tokio::main]
async fn start_web_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting slowscan server on http://localhost:{port}");
    println!("Endpoints:");
    println!("  POST /encode - image to SSTV WAV");
    println!("  POST /decode - SSTV WAV to image plus diagnostics");
    println!("  GET / - server status");

    let app = Router::new()
        .route("/", get(handler_status))
        .route("/encode", post(handler_encode))
        .route("/decode", post(handler_decode))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handler_status() -> &'static str {
    "slowscan SSTV encoder/decoder - Ready"
}

fn encode_error(status: StatusCode, message: String) -> (StatusCode, Json<EncodeResponse>) {
    (
        status,
        Json(EncodeResponse {
            success: false,
            message,
            wav_base64: None,
        }),
    )
}

async fn handler_encode(
    Json(req): Json<EncodeRequest>,
) -> Result<Json<EncodeResponse>, (StatusCode, Json<EncodeResponse>)> {
    let mode = modes::from_key(&req.mode).ok_or_else(|| {
        encode_error(
            StatusCode::BAD_REQUEST,
            format!("unknown mode '{}'", req.mode),
        )
    })?;

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.image_base64)
        .map_err(|e| encode_error(StatusCode::BAD_REQUEST, format!("invalid base64 image: {e}")))?;
    let source = image::load_from_memory(&image_bytes)
        .map_err(|e| encode_error(StatusCode::BAD_REQUEST, format!("cannot read image: {e}")))?;

    let pixels = letterbox(&source, mode);
    let wav = Encoder::new(SAMPLE_RATE)
        .encode_to_wav(&pixels, mode.width, mode.lines, mode)
        .map_err(|e| encode_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(EncodeResponse {
        success: true,
        message: format!(
            "Encoded {}x{} as {} into {} samples",
            mode.width,
            mode.lines,
            mode.name,
            (wav.len() - 44) / 2
        ),
        wav_base64: Some(base64::engine::general_purpose::STANDARD.encode(&wav)),
    }))
}

fn decode_error(status: StatusCode, message: String) -> (StatusCode, Json<DecodeResponse>) {
    (
        status,
        Json(DecodeResponse {
            success: false,
            message,
            png_base64: None,
            diagnostics: None,
        }),
    )
}

async fn handler_decode(
    Json(req): Json<DecodeRequest>,
) -> Result<Json<DecodeResponse>, (StatusCode, Json<DecodeResponse>)> {
    let wav_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.wav_base64)
        .map_err(|e| decode_error(StatusCode::BAD_REQUEST, format!("invalid base64 WAV: {e}")))?;
    let (samples, sample_rate) = read_wav(&wav_bytes)
        .map_err(|e| decode_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let options = DecoderOptions {
        auto_calibrate: !req.no_calibrate,
        mode_hint: None,
    };
    let image = Decoder::with_options(sample_rate, options)
        .decode(&samples)
        .map_err(|e| decode_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut png = Vec::new();
    {
        let raster =
            image::RgbaImage::from_raw(image.width as u32, image.height as u32, image.pixels)
                .ok_or_else(|| {
                    decode_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "decoded raster has unexpected size".to_string(),
                    )
                })?;
        raster
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| decode_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }

    let diag = &image.diagnostics;
    let diagnostics = serde_json::json!({
        "mode": diag.mode_name,
        "vis_code": diag.vis_code,
        "sample_rate": diag.sample_rate,
        "duration_secs": diag.duration_secs,
        "freq_offset": diag.freq_offset,
        "auto_calibrated": diag.auto_calibrated,
        "first_sync": diag.first_sync,
        "decode_ms": diag.decode_ms,
        "quality": {
            "r_avg": diag.quality.r_avg,
            "g_avg": diag.quality.g_avg,
            "b_avg": diag.quality.b_avg,
            "brightness": diag.quality.brightness,
            "verdict": format!("{:?}", diag.quality.verdict),
            "warnings": diag.quality.warnings,
        },
    });

    Ok(Json(DecodeResponse {
        success: true,
        message: format!("Decoded {}x{} {}", image.width, image.height, diag.mode_name),
        png_base64: Some(base64::engine::general_purpose::STANDARD.encode(&png)),
        diagnostics: Some(diagnostics),
    }))
}
