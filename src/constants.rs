//! Directory names, defaults and enumerations shared by every pipeline.

pub const CONFIG_FILE: &str = "oraclejetconfig.json";
pub const PATH_MAPPING_FILE: &str = "path_mapping.json";
pub const COMPONENT_JSON: &str = "component.json";
pub const HOOKS_CONFIG: &str = "scripts/hooks/hooks.json";
pub const GITIGNORE: &str = ".gitignore";
pub const EXCHANGE_URL_KEY: &str = "exchange-url";

pub const PATH_TO_ORACLEJET: &str = "node_modules/@oracle/oraclejet/dist";
pub const ORACLEJET_PACKAGE_JSON: &str = "node_modules/@oracle/oraclejet/package.json";
pub const NODE_MODULES: &str = "node_modules";
pub const JET_COMPONENTS: &str = "jet_components";
pub const JET_COMPOSITES: &str = "jet-composites";
pub const MAIN_JS: &str = "main.js";
pub const MAIN_TEMP_JS: &str = "main-temp.js";
pub const INDEX_HTML: &str = "index.html";
pub const RJS_BUILD_FILE: &str = "rjs-build.json";
pub const VERSION_TOKEN: &str = "#{version}";

pub const DEFAULT_THEME: &str = "alta";
pub const COMMON_THEME_DIR: &str = "common";
pub const RESERVED_ALL: &str = "all";
pub const DEFAULT_BROWSER: &str = "chrome";
pub const DEFAULT_PACK_VERSION: &str = "1.0.0";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LIVERELOAD_PORT: u16 = 35729;
pub const WATCH_DEBOUNCE_MS: u64 = 300;

pub const SUPPORTED_PLATFORMS: &[&str] = &["android", "ios", "web", "windows"];
pub const SUPPORTED_HYBRID_PLATFORMS: &[&str] = &["android", "ios", "windows"];
pub const SUPPORTED_THEME_PLATFORMS: &[&str] = &["android", "ios", "web", "windows", "common"];
pub const SUPPORTED_BROWSERS: &[&str] = &["chrome", "firefox", "edge", "ie", "safari"];

pub const BUILD_DESTINATIONS: &[&str] = &["emulator", "device"];
pub const DEFAULT_BUILD_DESTINATION: &str = "emulator";
pub const SERVE_HYBRID_DESTINATIONS: &[&str] = &["browser", "emulator", "device", "server-only"];
pub const SERVE_WEB_DESTINATIONS: &[&str] = &["server-only"];

pub const DEBUG_FLAG: &str = "--debug";
pub const RELEASE_FLAG: &str = "--release";

pub const INJECT_THEME_START: &str = "<!-- injector:theme -->";
pub const INJECT_THEME_END: &str = "<!-- endinjector -->";
pub const INJECT_PATHS_START: &str = "//injector:mainReleasePaths";
pub const INJECT_PATHS_END: &str = "//endinjector";

/// Require.js loader plugins; never mapped to a CDN in release optimizer runs.
pub const REQUIRE_PLUGINS: &[&str] = &["text", "css", "normalize", "css-builder", "ojL10n"];

pub const NOT_IN_CONFIG_NOTE: &str =
    "Local component or installed as dependency. Not found in the config file.";
pub const NOT_INSTALLED_NOTE: &str =
    "Warning: found in the config file but not installed. Please restore.";
pub const NO_COMPONENTS_FOUND: &str = "No components found.";
