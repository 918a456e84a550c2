/// Default configuration file, relative to the build context
pub const DEFAULT_CONFIG_FILE: &str = "dashboot.yml";

/// Deployment target used when none is supplied anywhere
pub const CANONICAL_TARGET: &str = "generic-host";

/// Environment variable naming the deployment target
pub const TARGET_ENV_VAR: &str = "DASHBOOT_TARGET";

/// Port the dashboard framework listens on by default
pub const DEFAULT_PORT: u16 = 8501;

/// Alternate port used by the second bare container host variant
pub const ALTERNATE_PORT: u16 = 8502;

/// Wildcard bind address so traffic from outside the container reaches the app
pub const WILDCARD_ADDRESS: &str = "0.0.0.0";

/// Fixed liveness path served by the dashboard framework
pub const HEALTH_PATH: &str = "/_stcore/health";

/// Runtime root inside the image
pub const DEFAULT_APP_ROOT: &str = "/app";

/// Base image for rendered container definitions
pub const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim";

/// State directory written into the runtime root
pub const STATE_DIR: &str = ".dashboot";

/// Build record inside the state directory
pub const BUILD_RECORD_FILE: &str = "build.json";

/// Dependency fingerprint stamp inside the state directory
pub const DEPS_STAMP_FILE: &str = "deps.sha256";

/// Runtime manifest consumed by the runtime-tier installer
pub const DEFAULT_RUNTIME_MANIFEST: &str = "requirements.txt";

/// Entrypoint script of the dashboard application
pub const DEFAULT_ENTRYPOINT: &str = "app.py";

/// Workbook names the application looks for, in order
pub const DEFAULT_DATA_ARTIFACTS: [&str; 4] =
    ["Excel.xlsm", "Excel.xlsx", "excel.xlsm", "excel.xlsx"];

/// OS packages every image needs: a compiler toolchain for native
/// extensions and an HTTP client for health polling
pub const REQUIRED_OS_PACKAGES: [&str; 2] = ["build-essential", "curl"];

/// Package manager cache removed after OS installs
pub const APT_LISTS_DIR: &str = "/var/lib/apt/lists";

/// Request timeout for a single health probe, in seconds
pub const PROBE_TIMEOUT_SECS: u64 = 5;
