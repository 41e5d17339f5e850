/// Environment variable selecting the log level (`debug`, `info`, `warn`, `error`)
pub const ENV_LOG_LEVEL: &str = "PIPEWRIGHT_LOG_LEVEL";
/// Environment variable that disables the self-rebuild check when non-empty
pub const ENV_REBUILD_DISABLE: &str = "PIPEWRIGHT_REBUILD_DISABLE";
/// Chunk size used when fanning a stream out to several consumers
pub const TEE_BUFFER_SIZE: usize = 8 * 1024;
/// Exit code reported when no real one is available (not yet waited, killed by a signal)
pub const EXIT_CODE_UNKNOWN: i32 = -1;
