mod capture;
mod classifier;
mod inference;
mod presentation;
mod render;

use anyhow::Result;
use capture::{CameraBackend, FacingMode, NokhwaBackend, SyntheticBackend};
use clap::Parser;
use classifier::{ModelSource, OnnxLoader, TensorLayout, DEFAULT_MODEL_BASE};
use inference::{DisplayClock, InferenceLoop, LoopState, RefreshClock};
use presentation::{spawn_command_reader, Command, ConsolePresenter, DISPLAY_THRESHOLD};
use render::{PlatformChoice, PlatformProfile, RenderTargetSelector};
use std::sync::mpsc::{Receiver, TryRecvError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL or directory holding model.onnx and metadata.json.
    ///
    /// The model must be an ONNX export. The default Teachable Machine
    /// location only serves the TensorFlow.js model.json, so point this at a
    /// converted model.onnx to classify anything.
    #[arg(long, default_value = DEFAULT_MODEL_BASE)]
    model_url: String,

    /// Explicit metadata location, overriding the one derived from --model-url
    #[arg(long)]
    metadata_url: Option<String>,

    /// Input tensor layout of the model
    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,

    /// Use a generated test pattern instead of a real camera
    #[arg(long)]
    synthetic: bool,

    /// Camera to request on Start
    #[arg(long, value_enum, default_value_t = FacingMode::Front)]
    facing: FacingMode,

    /// Platform profile; auto inspects --user-agent
    #[arg(long, value_enum, default_value_t = PlatformChoice::Auto)]
    platform: PlatformChoice,

    /// User agent string used for platform detection
    #[arg(long)]
    user_agent: Option<String>,

    /// Display refresh rate the loop is paced to
    #[arg(long, default_value_t = 60)]
    refresh_hz: u32,

    /// Only predictions above this probability are shown
    #[arg(long, default_value_t = DISPLAY_THRESHOLD)]
    threshold: f32,

    /// Classify frames as captured instead of mirrored
    #[arg(long)]
    no_mirror: bool,

    /// Start capturing immediately
    #[arg(long)]
    autostart: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("camclassify starting");

    let profile = PlatformProfile::detect(args.platform, args.user_agent.as_deref());

    let mut source = ModelSource::from_base(&args.model_url);
    if let Some(metadata_url) = &args.metadata_url {
        source.metadata_url = metadata_url.clone();
    }
    tracing::info!("Model: {}", source.model_url);

    let backend: Box<dyn CameraBackend> = if args.synthetic {
        tracing::info!("Using synthetic camera");
        Box::new(SyntheticBackend::with_default_devices())
    } else {
        Box::new(NokhwaBackend::new())
    };

    let mut inference = InferenceLoop::new(
        backend,
        Box::new(OnnxLoader::new(args.layout)),
        source,
        RenderTargetSelector::new(profile),
        Box::new(ConsolePresenter::new(args.threshold)),
    )
    .with_preference(args.facing)
    .with_mirrored(!args.no_mirror);

    let commands = spawn_command_reader();
    if args.autostart {
        handle_command(&mut inference, Command::Start);
    }

    tracing::info!("Commands: start, stop, camera <label>, devices, quit");
    run_controller(&mut inference, &commands, &mut RefreshClock::new(args.refresh_hz));

    inference.stop();
    tracing::info!("camclassify exiting");
    Ok(())
}

/// Apply a user command. Returns false when the program should exit.
fn handle_command(inference: &mut InferenceLoop, command: Command) -> bool {
    match command {
        Command::Start => {
            if let Err(e) = inference.start() {
                tracing::error!("Start failed: {}", e);
            }
        }
        Command::Stop => inference.stop(),
        Command::Camera(label) => {
            if inference.permission_granted()
                && !inference.camera_options().iter().any(|d| d.label == label)
            {
                tracing::warn!("'{}' is not among the listed cameras", label);
            }
            inference.select_camera(&label);
        }
        Command::Devices => inference.refresh_camera_options(),
        Command::Quit => return false,
    }
    true
}

/// Drive the loop: commands are applied between cycles, and cycles run
/// at most once per display frame while a session is active.
///
/// Returns on `quit`, or once input has closed and the loop is idle.
fn run_controller<C: DisplayClock>(
    inference: &mut InferenceLoop,
    commands: &Receiver<Command>,
    clock: &mut C,
) {
    let mut input_open = true;

    loop {
        let running = inference.state() == LoopState::Running;
        let next = match (input_open, running) {
            (false, false) => return,
            (false, true) => None,
            (true, true) => match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    input_open = false;
                    None
                }
            },
            (true, false) => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            },
        };

        if let Some(command) = next {
            if !handle_command(inference, command) {
                return;
            }
            continue;
        }

        clock.wait_for_frame();
        if let Err(e) = inference.tick() {
            tracing::error!("Loop halted, start again to resume: {:#}", e);
        }
    }
}
