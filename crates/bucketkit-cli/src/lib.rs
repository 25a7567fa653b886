use std::path::Path;

/// Object key for an uploaded file when none is given: the file name.
pub fn default_key_for(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_is_file_name() {
        assert_eq!(
            default_key_for(Path::new("/tmp/uploads/report.pdf")).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(default_key_for(Path::new("notes.txt")).as_deref(), Some("notes.txt"));
    }

    #[test]
    fn default_key_needs_a_file_name() {
        assert_eq!(default_key_for(Path::new("/")), None);
        assert_eq!(default_key_for(Path::new("dir/..")), None);
    }
}

/// Initialize tracing for CLI binaries. Logs go to stderr so `cat` output stays clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
