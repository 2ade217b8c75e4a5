//! The capture loop: frames in, annotated display out, attendance rows
//! to the sink, with an explicit enrollment phase on operator request.

use crate::annotate::Annotator;
use crate::config::Config;
use crate::display::{Command, Display};
use crate::enroll;
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::RgbImage;
use rollcall_core::{EmbeddingSource, OnnxEmbeddingSource};
use rollcall_hw::Camera;
use rollcall_sheets::{AttendanceSink, SheetsClient, SheetsConfig};
use rollcall_store::GalleryStore;

pub fn run(config: Config) -> Result<()> {
    let store = GalleryStore::new(&config.faces_dir);
    let gallery = store.load().context("failed to load gallery")?;

    let mut source =
        OnnxEmbeddingSource::load(&config.detector_model_path(), &config.embedder_model_path())
            .context("failed to load face models")?;

    if config.spreadsheet_id.is_empty() {
        tracing::warn!("ROLLCALL_SPREADSHEET_ID is not set; attendance appends will fail");
    }
    let mut sink = SheetsClient::new(SheetsConfig {
        base_url: config.sheets_base_url.clone(),
        spreadsheet_id: config.spreadsheet_id.clone(),
        range: config.sheet_range.clone(),
        token: config.sheets_token.clone(),
    });
    // Written every startup; repeated runs stack duplicate headers.
    if let Err(e) = sink.write_header() {
        tracing::warn!(error = %e, "header append failed");
    }

    // Camera unavailable is fatal at startup.
    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("could not open video device {}", config.camera_device))?;
    let mut stream = camera.stream().context("could not start capture stream")?;

    let mut display = Display::open(camera.width, camera.height)
        .map_err(|e| anyhow!("could not open display window: {e}"))?;
    let annotator = Annotator::load(&config.font_path);
    let mut session = Session::new(gallery, config.match_threshold);

    tracing::info!(
        device = %config.camera_device,
        identities = session.gallery().len(),
        threshold = config.match_threshold,
        "attendance loop started; press Q to quit, E to enroll a pending unknown face"
    );

    while display.is_open() {
        // A failed read mid-loop is fatal; no retry.
        let frame = camera
            .read_frame(&mut stream)
            .context("failed to grab frame")?;

        let detections = source
            .detect(&frame.data, frame.width, frame.height)
            .context("face detection failed")?;
        tracing::debug!(seq = frame.sequence, faces = detections.len(), "frame processed");
        let labels = session.observe(&detections, &mut sink, Local::now());

        let mut image = RgbImage::from_raw(frame.width, frame.height, frame.data)
            .context("frame buffer size mismatch")?;
        annotator.annotate(&mut image, &labels);

        let command = display
            .show(&image)
            .map_err(|e| anyhow!("display update failed: {e}"))?;

        match command {
            Command::Quit => break,
            Command::Enroll if session.has_pending_unknown() => {
                // Distinct synchronous phase: capture pauses while the
                // operator types.
                println!("Unknown person detected. Please enter their details.");
                let details = enroll::prompt_details().context("failed to read details")?;
                match session.enroll(details, &store, &mut sink, Local::now()) {
                    Ok(()) => match image.save(&config.snapshot_path) {
                        Ok(()) => {
                            tracing::info!(path = %config.snapshot_path.display(), "snapshot saved")
                        }
                        Err(e) => tracing::warn!(
                            path = %config.snapshot_path.display(),
                            error = %e,
                            "snapshot save failed"
                        ),
                    },
                    Err(e) => tracing::error!(error = %e, "enrollment failed"),
                }
            }
            Command::Enroll | Command::None => {}
        }
    }

    tracing::info!("attendance loop stopped");
    Ok(())
}
