use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    pub mongodb: MongoSettings,
    pub imagekit: ImageKitSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_inactivity_hours")]
    pub session_inactivity_hours: i64,
}

fn default_session_inactivity_hours() -> i64 {
    24
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP/gRPC collector, e.g. `http://tempo:4317`. Spans are not exported when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImageKitSettings {
    /// Public API key sent with every upload.
    pub public_key: String,
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    /// Endpoint returning `{signature, expire, token}` for a single upload.
    pub auth_url: String,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_upload_url() -> String {
    "https://upload.imagekit.io/api/v1/files/upload".to_string()
}

fn default_max_file_size() -> u64 {
    crate::upload::MAX_FILE_SIZE
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;

    // Running from the workspace root or from inside media-portal/
    let configuration_directory = if base_path.ends_with("media-portal") {
        base_path.join("config")
    } else {
        base_path.join("media-portal").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
