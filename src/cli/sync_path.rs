use std::path::PathBuf;

/// Path of the `fieldtrack-sync` binary installed next to `path`.
pub fn to_sync_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("fieldtrack-sync");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::to_sync_path;

    #[test]
    fn sibling_of_the_cli() {
        let path = to_sync_path(PathBuf::from("/opt/fieldtrack/bin/fieldtrack"));
        assert_eq!(path.parent(), Some(PathBuf::from("/opt/fieldtrack/bin").as_path()));
        assert!(path
            .file_name()
            .is_some_and(|v| v.to_string_lossy().starts_with("fieldtrack-sync")));
    }
}
