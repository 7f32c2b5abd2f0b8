use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::BiaError;

pub const DEFAULT_CONFIG_FILE: &str = "bia-tools.json";
pub const DEFAULT_NFS_BASE: &str = "/nfs/biostudies/.adm/databases/prod/submissions/";
pub const DEFAULT_BIOSTUDIES_API: &str = "https://www.ebi.ac.uk/biostudies/api/v1";
pub const DEFAULT_FIRE_FTP_ENDPOINT: &str = "https://ftp.ebi.ac.uk/biostudies/fire";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub biostudies_api: Option<String>,
    #[serde(default)]
    pub fire_ftp_endpoint: Option<String>,
    #[serde(default)]
    pub image_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub store_root: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default)]
    pub primary_base: Option<String>,
    #[serde(default)]
    pub secondary_bases: Option<Vec<String>>,
}

/// Storage roots searched when resolving a declared file to a real path.
///
/// `primary_base` is tried first, then `secondary_bases` in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub primary_base: Option<PathBuf>,
    pub secondary_bases: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub storage: StorageConfig,
    pub biostudies_api: String,
    pub fire_ftp_endpoint: String,
    pub image_extensions: Vec<String>,
    pub store_root: Utf8PathBuf,
    pub cache_dir: Utf8PathBuf,
    pub http_timeout: Duration,
}

/// Values taken from the process environment, captured once at start-up.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub nfs_base: Option<String>,
    pub goofys_base: Option<String>,
    pub store_root: Option<String>,
    pub cache_dir: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            nfs_base: read("BIA_NFS_BASE"),
            goofys_base: read("BIA_GOOFYS_BASE"),
            store_root: read("BIA_STORE_ROOT"),
            cache_dir: read("BIA_CACHE_DIR"),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, or `bia-tools.json` from the working directory when no path
    /// is given. A missing default file means built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, BiaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| BiaError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| BiaError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, EnvOverrides::from_env())
    }

    pub fn resolve_config(
        config: Config,
        env: EnvOverrides,
    ) -> Result<ResolvedConfig, BiaError> {
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| BiaError::Filesystem("unable to resolve home directory".to_string()))?;

        let storage_section = config.storage.unwrap_or_default();
        let secondary_bases = match storage_section.secondary_bases {
            Some(bases) => bases.into_iter().map(PathBuf::from).collect(),
            None => {
                let nfs = env
                    .nfs_base
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_NFS_BASE));
                let goofys = env
                    .goofys_base
                    .map(PathBuf::from)
                    .unwrap_or_else(|| home.join("temp").join("goofys").join("biostudies-pub"));
                vec![nfs, goofys]
            }
        };
        let storage = StorageConfig {
            primary_base: storage_section.primary_base.map(PathBuf::from),
            secondary_bases,
        };

        let store_root = match env.store_root.or(config.store_root) {
            Some(root) => Utf8PathBuf::from(root),
            None => utf8(home.join(".bia-integrator-data"))?,
        };
        let cache_dir = match env.cache_dir.or(config.cache_dir) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => utf8(home.join(".cache").join("bia-converter"))?,
        };

        let image_extensions = config
            .image_extensions
            .unwrap_or_else(default_image_extensions)
            .into_iter()
            .map(|ext| normalize_extension(&ext))
            .collect();

        Ok(ResolvedConfig {
            storage,
            biostudies_api: config
                .biostudies_api
                .unwrap_or_else(|| DEFAULT_BIOSTUDIES_API.to_string()),
            fire_ftp_endpoint: config
                .fire_ftp_endpoint
                .unwrap_or_else(|| DEFAULT_FIRE_FTP_ENDPOINT.to_string()),
            image_extensions,
            store_root,
            cache_dir,
            http_timeout: Duration::from_secs(
                config.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }
}

/// Suffixes treated as images when splitting archives.
pub fn default_image_extensions() -> Vec<String> {
    [
        ".tif", ".tiff", ".TIF", ".TIFF", ".btf", ".czi", ".lif", ".lsm", ".nd2", ".oib", ".oif",
        ".ims", ".dv", ".r3d", ".vsi", ".svs", ".ndpi", ".scn", ".mrc", ".dm3", ".dm4", ".zvi",
        ".lei", ".stk", ".png", ".jpg", ".jpeg", ".bmp", ".gif",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn normalize_extension(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf, BiaError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| BiaError::Filesystem(format!("non-utf8 path: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_list_network_archive_before_fuse_view() {
        let resolved = ConfigLoader::resolve_config(Config::default(), EnvOverrides::default())
            .unwrap();
        assert_eq!(resolved.storage.primary_base, None);
        assert_eq!(resolved.storage.secondary_bases.len(), 2);
        assert_eq!(
            resolved.storage.secondary_bases[0],
            PathBuf::from(DEFAULT_NFS_BASE)
        );
        assert!(
            resolved.storage.secondary_bases[1].ends_with("temp/goofys/biostudies-pub")
        );
        assert!(resolved.cache_dir.ends_with(".cache/bia-converter"));
        assert_eq!(resolved.http_timeout, Duration::from_secs(60));
        assert!(resolved.image_extensions.contains(&".tif".to_string()));
    }

    #[test]
    fn env_overrides_take_effect() {
        let env = EnvOverrides {
            nfs_base: Some("/mnt/nfs".to_string()),
            goofys_base: Some("/mnt/goofys".to_string()),
            store_root: Some("/data/store".to_string()),
            cache_dir: None,
        };
        let resolved = ConfigLoader::resolve_config(Config::default(), env).unwrap();
        assert_eq!(
            resolved.storage.secondary_bases,
            vec![PathBuf::from("/mnt/nfs"), PathBuf::from("/mnt/goofys")]
        );
        assert_eq!(resolved.store_root, Utf8PathBuf::from("/data/store"));
    }

    #[test]
    fn image_extensions_gain_leading_dot() {
        let config = Config {
            image_extensions: Some(vec!["tif".to_string(), ".czi".to_string()]),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config, EnvOverrides::default()).unwrap();
        assert_eq!(resolved.image_extensions, vec![".tif", ".czi"]);
    }
}
