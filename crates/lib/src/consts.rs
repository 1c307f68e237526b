/// Application name, used in generated file headers and log targets.
pub const APP_NAME: &str = "fbtools";

/// Default host manifest file name, looked up in the current directory.
pub const MANIFEST_FILENAME: &str = "fbtools.toml";

/// File extension of build-description documents.
pub const BFF_EXTENSION: &str = "bff";

/// Configuration used when none is given, as `<configuration>|<platform>`.
pub const DEFAULT_CONFIGURATION: &str = "Debug|x64";
