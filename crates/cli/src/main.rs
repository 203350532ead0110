use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use enrollment_core::camera::domain::camera_device::CameraDevice;
use enrollment_core::camera::domain::camera_session::CameraSession;
use enrollment_core::camera::domain::camera_state::CameraState;
use enrollment_core::camera::infrastructure::png_frame_encoder::PngFrameEncoder;
use enrollment_core::camera::infrastructure::still_image_camera::StillImageCamera;
use enrollment_core::enrollment::domain::upload_coordinator::UploadCoordinator;
use enrollment_core::persons::domain::person_registry::{DeletionConfirmed, PersonRegistry};
use enrollment_core::recognition::domain::recognition_session::RecognitionSession;
use enrollment_core::service::domain::face_service::FaceService;
use enrollment_core::service::infrastructure::http_face_service::HttpFaceService;
use enrollment_core::shared::cancel_token::CancelToken;
use enrollment_core::shared::constants::IMAGE_EXTENSIONS;
use enrollment_core::shared::settings::Settings;
use enrollment_core::staging::domain::capture_buffer::CaptureBuffer;
use enrollment_core::training::domain::training_controller::TrainingController;
use enrollment_core::workers::background_submission::RequestStatus;

/// Enroll, train and recognize faces against a remote recognition service.
#[derive(Parser)]
#[command(name = "face-enroll")]
struct Cli {
    /// Service base URL (overrides FACE_ENROLL_API_URL and the settings file).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage enrolled persons.
    Persons {
        #[command(subcommand)]
        action: PersonsAction,
    },
    /// Upload images of a person, from files and/or the camera.
    Enroll {
        name: String,

        /// Image files or directories of images.
        paths: Vec<PathBuf>,

        #[command(flatten)]
        camera: CameraArgs,
    },
    /// Train a person's face model from the uploaded images.
    Train { name: String },
    /// Identify who appears in the given images.
    Recognize {
        /// Image files or directories of images.
        paths: Vec<PathBuf>,

        #[command(flatten)]
        camera: CameraArgs,

        /// Seconds to wait for the result before cancelling.
        #[arg(long, default_value = "60")]
        wait: u64,
    },
}

#[derive(Subcommand)]
enum PersonsAction {
    /// List persons and their training state.
    List,
    /// Create a person.
    Add { name: String },
    /// Delete a person and their uploaded images.
    Delete {
        name: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct CameraArgs {
    /// Still image served as a camera stream.
    #[arg(long, conflicts_with = "camera_device")]
    camera_image: Option<PathBuf>,

    /// Capture device (e.g. /dev/video0). Requires the device-camera feature.
    #[arg(long)]
    camera_device: Option<String>,

    /// Number of frames to capture when a camera is given.
    #[arg(long, default_value = "1")]
    captures: usize,
}

struct Workflow {
    service: Arc<dyn FaceService>,
    registry: Arc<PersonRegistry>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_api_url(cli.api_url);
    if cli.timeout.is_some() {
        settings.request_timeout_secs = cli.timeout;
    }
    log::debug!("Using service at {}", settings.api_url);

    let service: Arc<dyn FaceService> = Arc::new(HttpFaceService::from_settings(&settings)?);
    let workflow = Workflow {
        registry: Arc::new(PersonRegistry::new(service.clone(), settings.refresh)),
        service,
    };

    match cli.command {
        Command::Persons { action } => run_persons(&workflow, action),
        Command::Enroll {
            name,
            paths,
            camera,
        } => run_enroll(&workflow, &name, &paths, &camera),
        Command::Train { name } => run_train(&workflow, &name),
        Command::Recognize {
            paths,
            camera,
            wait,
        } => run_recognize(&workflow, &paths, &camera, Duration::from_secs(wait)),
    }
}

fn run_persons(workflow: &Workflow, action: PersonsAction) -> Result<(), Box<dyn std::error::Error>> {
    let registry = &workflow.registry;
    match action {
        PersonsAction::List => {
            let persons = registry.list()?;
            if persons.is_empty() {
                println!("No persons enrolled.");
            }
            for person in persons {
                let state = if person.trained { "trained" } else { "untrained" };
                println!("{}\t{state}", person.name);
            }
        }
        PersonsAction::Add { name } => {
            let person = registry.create(&name)?;
            println!("Created {}", person.name);
        }
        PersonsAction::Delete { name, yes } => {
            if !yes && !confirm(&format!("Delete {name} and all of their images?"))? {
                println!("Aborted.");
                return Ok(());
            }
            registry.delete(DeletionConfirmed::new(name.as_str()))?;
            println!("Deleted {name}");
        }
    }
    Ok(())
}

fn run_enroll(
    workflow: &Workflow,
    name: &str,
    paths: &[PathBuf],
    camera: &CameraArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = stage_inputs(paths, camera)?;
    let coordinator = UploadCoordinator::new(workflow.service.clone(), workflow.registry.clone());
    let receipt = coordinator.submit(name, &mut buffer, &CancelToken::new())?;
    println!(
        "Uploaded {} image(s) for {}",
        receipt.image_count, receipt.person
    );
    Ok(())
}

fn run_train(workflow: &Workflow, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let controller = TrainingController::new(workflow.service.clone(), workflow.registry.clone());
    controller.train_named(name, &CancelToken::new())?;
    println!("Trained {name}");
    Ok(())
}

fn run_recognize(
    workflow: &Workflow,
    paths: &[PathBuf],
    camera: &CameraArgs,
    wait: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = stage_inputs(paths, camera)?;
    let session = Arc::new(RecognitionSession::new(workflow.service.clone()));
    let mut request = session.recognize_in_background(buffer.begin_submission()?);

    match request.wait_timeout(wait) {
        RequestStatus::Pending => {
            request.cancel();
            Err(format!("no result after {}s, request cancelled", wait.as_secs()).into())
        }
        RequestStatus::Failed(e) => Err(e.into()),
        RequestStatus::Succeeded => {
            for label in request.wait()? {
                println!("{label}");
            }
            Ok(())
        }
    }
}

fn stage_inputs(
    paths: &[PathBuf],
    camera: &CameraArgs,
) -> Result<CaptureBuffer, Box<dyn std::error::Error>> {
    let mut buffer = CaptureBuffer::new();

    for path in expand_inputs(paths)? {
        let payload = fs::read(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        buffer.add_file(payload, &name)?;
    }

    if let Some(device) = open_camera(camera)? {
        let mut session = CameraSession::new(device, Box::new(PngFrameEncoder::new()))
            .with_observer(Box::new(|state: CameraState| log::debug!("Camera {state}")));
        session.start()?;
        for _ in 0..camera.captures {
            let png = session.capture_frame()?;
            buffer.add_capture(png)?;
        }
        session.stop();
    }

    for image in buffer.iter() {
        log::info!("Staged {}", image.preview());
    }
    Ok(buffer)
}

fn open_camera(
    camera: &CameraArgs,
) -> Result<Option<Box<dyn CameraDevice>>, Box<dyn std::error::Error>> {
    if let Some(path) = &camera.camera_image {
        return Ok(Some(Box::new(StillImageCamera::new(path.clone()))));
    }
    match &camera.camera_device {
        Some(device) => open_device_camera(device).map(Some),
        None => Ok(None),
    }
}

#[cfg(feature = "device-camera")]
fn open_device_camera(device: &str) -> Result<Box<dyn CameraDevice>, Box<dyn std::error::Error>> {
    use enrollment_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;
    Ok(Box::new(FfmpegCamera::new(device)))
}

#[cfg(not(feature = "device-camera"))]
fn open_device_camera(device: &str) -> Result<Box<dyn CameraDevice>, Box<dyn std::error::Error>> {
    Err(format!("Cannot open {device}: built without the device-camera feature").into())
}

/// Files as given, directories expanded to their images in name order.
fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(format!("Input not found: {}", path.display()).into());
        }
        if path.is_dir() {
            let mut images: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            images.sort();
            files.extend(images);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn confirm(prompt: &str) -> io::Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
