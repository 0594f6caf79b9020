use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::AddressSpace;

/// File name searched for by [`CodegenOptions::find`].
pub const CONFIG_FILE: &str = "kernelgen.toml";

/// Kernel generation options, read from the `[kernel]` table of
/// `kernelgen.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Name of the emitted `__kernel` function.
    pub kernel_name: String,
    /// Loop index variable.
    pub index_variable: String,
    /// Trailing element-count parameter.
    pub size_argument: String,
    /// Address space of pointer arguments.
    pub address_space: AddressSpace,
    /// Work-group size assumed by reduction kernels.
    pub local_size: usize,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            kernel_name: "kernel_0".to_string(),
            index_variable: "i".to_string(),
            size_argument: "N".to_string(),
            address_space: AddressSpace::Global,
            local_size: 128,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    kernel: CodegenOptions,
}

impl CodegenOptions {
    /// Load options from a config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<CodegenOptions, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded options from {}", path.display());
        Ok(file.kernel)
    }

    /// Try to find a `kernelgen.toml` in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let opts = CodegenOptions::default();
        assert_eq!(opts.kernel_name, "kernel_0");
        assert_eq!(opts.index_variable, "i");
        assert_eq!(opts.size_argument, "N");
        assert_eq!(opts.address_space, AddressSpace::Global);
        assert_eq!(opts.local_size, 128);
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"[kernel]
kernel_name = "saxpy"
address_space = "constant"
local_size = 256
"#,
        )
        .unwrap();

        let opts = CodegenOptions::load(&path).unwrap();
        assert_eq!(opts.kernel_name, "saxpy");
        assert_eq!(opts.address_space, AddressSpace::Constant);
        assert_eq!(opts.local_size, 256);
        assert_eq!(opts.index_variable, "i");
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "").unwrap();
        assert_eq!(CodegenOptions::load(&path).unwrap(), CodegenOptions::default());
    }

    #[test]
    fn test_load_rejects_bad_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[kernel]\naddress_space = \"private\"\n").unwrap();
        assert!(matches!(
            CodegenOptions::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CodegenOptions::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_find_walks_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let found = CodegenOptions::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }
}
