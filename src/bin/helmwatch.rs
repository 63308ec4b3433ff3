//! helmwatch - helmet detection CLI
//!
//! Runs one detection session over an image, video file, image directory,
//! or live camera, writing annotated frames to a PNG directory (or, with
//! the display-minifb feature, a live window). Ctrl-C requests a
//! cooperative stop; the current frame finishes, handles are released, and
//! a summary is printed.

use std::io::IsTerminal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use helmwatch::detect::backends::StubBackend;
use helmwatch::ui::Ui;
use helmwatch::{
    camera_device, CameraConfig, CameraSource, DetectorBackend, DirectorySource, FrameSource,
    HelmwatchConfig, NoopPump, PngDirSink, RenderPolicy, SessionController, SingleImageSource,
    SourceKind, VideoConfig, VideoSource,
};

#[derive(Parser, Debug)]
#[command(name = "helmwatch", about = "Helmet detection over images, video, directories, cameras")]
struct Args {
    /// Source kind: image | video | directory | camera
    #[arg(long)]
    source: Option<String>,

    /// Input path, directory, camera index, or stub:// origin
    #[arg(long)]
    input: Option<String>,

    /// Confidence threshold in (0, 1]
    #[arg(long)]
    threshold: Option<f32>,

    /// Presentation size for annotated frames, e.g. 1280x720
    #[arg(long)]
    display_size: Option<String>,

    /// Detector backend: stub | tract
    #[arg(long)]
    backend: Option<String>,

    /// ONNX model path (tract backend)
    #[arg(long)]
    model: Option<String>,

    /// Output directory for annotated PNG frames
    #[arg(long)]
    output: Option<String>,

    /// Show annotated frames in a window instead of writing PNGs
    #[cfg(feature = "display-minifb")]
    #[arg(long)]
    display: bool,

    /// Progress rendering: auto | plain | pretty
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = resolve_config(&args)?;
    let ui = Ui::from_flag(args.ui.as_deref(), std::io::stderr().is_terminal());

    log::info!(
        "helmwatch starting: source={:?} input={} backend={} threshold={}",
        cfg.source_kind,
        cfg.input,
        cfg.backend,
        cfg.confidence_threshold
    );

    let policy = RenderPolicy::default().with_threshold(cfg.confidence_threshold);
    let mut source = build_source(&cfg);
    let mut backend = build_backend(&cfg, &ui)?;

    let mut controller = SessionController::new(cfg.display_size);
    let handle = controller.handle();
    ctrlc::set_handler(move || {
        log::info!("stop requested (Ctrl-C)");
        handle.request_stop();
    })
    .context("could not install Ctrl-C handler")?;

    let summary;
    #[cfg(feature = "display-minifb")]
    {
        if args.display {
            let (w, h) = cfg.display_size.unwrap_or((1280, 720));
            let window = helmwatch::display::DisplayWindow::open(
                "helmwatch",
                w,
                h,
                controller.handle().cancel_token(),
            )?;
            let shared = helmwatch::SharedHost::new(window);
            let mut sink = shared.clone();
            let mut pump = shared;
            summary = controller.start(
                source.as_mut(),
                backend.as_mut(),
                &policy,
                &mut sink,
                &mut pump,
            )?;
        } else {
            summary = run_to_png(
                &cfg,
                &mut controller,
                source.as_mut(),
                backend.as_mut(),
                &policy,
                &ui,
            )?;
        }
    }
    #[cfg(not(feature = "display-minifb"))]
    {
        summary = run_to_png(
            &cfg,
            &mut controller,
            source.as_mut(),
            backend.as_mut(),
            &policy,
            &ui,
        )?;
    }

    let stats = source.stats();
    log::info!(
        "source {} produced {} frames",
        stats.origin,
        stats.frames_produced
    );
    println!(
        "processed {} frames, emitted {}, {} detect failures{}",
        summary.frames_processed,
        summary.frames_emitted,
        summary.detect_failures,
        if summary.stopped_by_user {
            " (stopped by user)"
        } else {
            ""
        }
    );
    Ok(())
}

fn run_to_png(
    cfg: &HelmwatchConfig,
    controller: &mut SessionController,
    source: &mut dyn FrameSource,
    backend: &mut dyn DetectorBackend,
    policy: &RenderPolicy,
    ui: &Ui,
) -> Result<helmwatch::SessionSummary> {
    let mut sink = PngDirSink::new(&cfg.output)?;
    let _stage = ui.stage(&format!("processing {}", cfg.input));
    Ok(controller.start(source, backend, policy, &mut sink, &mut NoopPump)?)
}

fn resolve_config(args: &Args) -> Result<HelmwatchConfig> {
    let mut cfg = HelmwatchConfig::load()?;
    if let Some(source) = &args.source {
        cfg.source_kind = source.parse()?;
    }
    if let Some(input) = &args.input {
        cfg.input = input.clone();
    }
    if let Some(threshold) = args.threshold {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(anyhow!("--threshold {} out of range (0, 1]", threshold));
        }
        cfg.confidence_threshold = threshold;
    }
    if let Some(size) = &args.display_size {
        cfg.display_size = Some(helmwatch::config::parse_display_size(size)?);
    }
    if let Some(backend) = &args.backend {
        cfg.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.model_path = Some(model.clone());
    }
    if let Some(output) = &args.output {
        cfg.output = output.clone();
    }
    Ok(cfg)
}

fn build_source(cfg: &HelmwatchConfig) -> Box<dyn FrameSource> {
    match cfg.source_kind {
        SourceKind::Image => Box::new(SingleImageSource::new(&cfg.input)),
        SourceKind::Directory => Box::new(DirectorySource::new(&cfg.input)),
        SourceKind::Video => Box::new(VideoSource::new(VideoConfig {
            path: cfg.input.clone(),
        })),
        SourceKind::Camera => Box::new(CameraSource::new(CameraConfig {
            device: camera_device(&cfg.input),
        })),
    }
}

fn build_backend(cfg: &HelmwatchConfig, ui: &Ui) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match cfg.backend.as_str() {
        "stub" => Box::new(StubBackend::new()),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                let model_path = cfg
                    .model_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("backend 'tract' requires --model"))?;
                let _stage = ui.stage("loading model");
                let (w, h) = cfg.model_input;
                Box::new(helmwatch::detect::backends::TractBackend::new(
                    model_path, w, h,
                )?)
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                return Err(anyhow!(
                    "backend 'tract' requires building with the backend-tract feature"
                ));
            }
        }
        other => return Err(anyhow!("unknown backend '{}'", other)),
    };

    let _stage = ui.stage("warming up detector");
    backend
        .warm_up()
        .with_context(|| format!("backend '{}' failed to warm up", backend.name()))?;
    Ok(backend)
}
