use rollcall_core::DEFAULT_MATCH_THRESHOLD;
use std::path::PathBuf;

/// Tool configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory of persisted identity records.
    pub faces_dir: PathBuf,
    /// Euclidean distance threshold for a positive match.
    pub match_threshold: f32,
    /// Spreadsheet API origin.
    pub sheets_base_url: String,
    /// Target spreadsheet ID.
    pub spreadsheet_id: String,
    /// A1-notation range rows are appended to.
    pub sheet_range: String,
    /// Bearer token for the spreadsheet API.
    pub sheets_token: String,
    /// Where the enrollment snapshot image is written (overwritten each time).
    pub snapshot_path: PathBuf,
    /// TrueType font used for box labels; missing font degrades to
    /// box-only annotation.
    pub font_path: PathBuf,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("models"));

        Self {
            camera_device: env_string("ROLLCALL_CAMERA_DEVICE", "/dev/video0"),
            model_dir,
            faces_dir: std::env::var("ROLLCALL_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("known_faces")),
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            sheets_base_url: env_string("ROLLCALL_SHEETS_BASE_URL", "https://sheets.googleapis.com"),
            spreadsheet_id: env_string("ROLLCALL_SPREADSHEET_ID", ""),
            sheet_range: env_string("ROLLCALL_SHEET_RANGE", "Sheet1!A1:D1"),
            sheets_token: env_string("ROLLCALL_SHEETS_TOKEN", ""),
            snapshot_path: std::env::var("ROLLCALL_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("attendance_snapshot.png")),
            font_path: std::env::var("ROLLCALL_FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
                }),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
