use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::Stdio;

use crate::error::Error;

/// Open (create or truncate) the file a task's stdout/stderr should be redirected to.
/// A task without a configured path discards its output.
pub fn open_sink<P: AsRef<Path>>(path: &Option<P>) -> Result<Stdio, Error> {
    match path {
        Some(path) => {
            let file: File = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path.as_ref())
                .map_err(|err| Error::LogWrite(format!("{}: {}", path.as_ref().display(), err)))?;
            Ok(Stdio::from(file))
        }
        None => Ok(Stdio::null()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_open_sink_creates_and_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, b"stale content").unwrap();

        let sink = open_sink(&Some(&path)).expect("sink should open");
        drop(sink);

        // Truncated by OpenOptions, then nothing was written through the Stdio handle.
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "");
    }

    #[test]
    fn test_open_sink_none_is_null() {
        let sink: Stdio = open_sink::<&Path>(&None).expect("null sink should open");
        // Can't introspect a Stdio directly; just assert construction succeeds.
        let _ = sink;
    }

    #[test]
    fn test_open_sink_rejects_unwritable_dir() {
        let missing = Path::new("/definitely/does/not/exist/out.log");
        let result = open_sink(&Some(missing));
        assert!(result.is_err());
        let mut buf = Vec::new();
        write!(buf, "{}", result.unwrap_err()).unwrap();
    }
}
