//! The parser seam: turns a science file into its identifying metadata.

use std::path::Path;

use tracker_common::ScienceFileMetadata;

/// Extracts science metadata from a file (by name, content, or both).
///
/// Any failure is reported back to the caller of `track` as a parser error
/// and is never retried.
pub trait ScienceFileParser: Send + Sync {
    fn parse(&self, path: &Path) -> anyhow::Result<ScienceFileMetadata>;
}

impl<F> ScienceFileParser for F
where
    F: Fn(&Path) -> anyhow::Result<ScienceFileMetadata> + Send + Sync,
{
    fn parse(&self, path: &Path) -> anyhow::Result<ScienceFileMetadata> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_is_a_parser() {
        let parser: Arc<dyn ScienceFileParser> = Arc::new(|_: &Path| -> anyhow::Result<_> {
            Ok(ScienceFileMetadata {
                instrument: "eea".to_string(),
                mode: String::new(),
                level: "l0".to_string(),
                version: "01".to_string(),
                time: None,
            })
        });
        let meta = parser.parse(Path::new("/tmp/x.bin")).unwrap();
        assert_eq!(meta.instrument, "eea");
    }

    #[test]
    fn test_closure_error_propagates() {
        let parser = |path: &Path| -> anyhow::Result<ScienceFileMetadata> {
            anyhow::bail!("cannot parse {}", path.display())
        };
        let err = parser.parse(Path::new("bad.bin")).unwrap_err();
        assert!(err.to_string().contains("bad.bin"));
    }
}
