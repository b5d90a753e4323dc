use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use vcfdb_core::{Result, VcfdbError};

///
/// Tuning of one import run. Every field may be left out of a config file.
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Documents per bulk write.
    pub chunk_size: usize,
    pub merger_workers: usize,
    pub loader_workers: usize,
    pub parser_buffer_size: usize,
    pub merger_buffer_size: usize,
    pub loader_buffer_size: usize,
    /// Skip groups that fail to merge instead of aborting the import.
    pub drop_bad_records: bool,
    pub show_progress: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            chunk_size: 500,
            merger_workers: 1,
            loader_workers: 2,
            parser_buffer_size: 1000,
            merger_buffer_size: 1000,
            loader_buffer_size: 1000,
            drop_bad_records: false,
            show_progress: true,
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("chunk_size", self.chunk_size),
            ("merger_workers", self.merger_workers),
            ("loader_workers", self.loader_workers),
            ("parser_buffer_size", self.parser_buffer_size),
            ("merger_buffer_size", self.merger_buffer_size),
            ("loader_buffer_size", self.loader_buffer_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(VcfdbError::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

impl TryFrom<&Path> for ImportConfig {
    type Error = VcfdbError;

    fn try_from(path: &Path) -> Result<Self> {
        let toml_str = read_to_string(path)?;
        let config: ImportConfig = toml::from_str(&toml_str)
            .map_err(|e| VcfdbError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vcfdb_core::ErrorKind;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[rstest]
    fn test_partial_file_keeps_defaults() {
        let file = config_file("chunk_size = 50\nloader_workers = 4\n");
        let config = ImportConfig::try_from(file.path()).unwrap();

        assert_eq!(
            config,
            ImportConfig {
                chunk_size: 50,
                loader_workers: 4,
                ..Default::default()
            }
        );
    }

    #[rstest]
    #[case("not_a_key = 1\n")]
    #[case("chunk_size = \"big\"\n")]
    #[case("merger_workers = 0\n")]
    fn test_bad_files_are_config_errors(#[case] content: &str) {
        let file = config_file(content);
        let err = ImportConfig::try_from(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[rstest]
    fn test_missing_file() {
        let err = ImportConfig::try_from(Path::new("/nonexistent/import.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
