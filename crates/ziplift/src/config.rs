use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use ziplift_archive::{DEFAULT_MAX_DEPTH, DEFAULT_NESTED_SUFFIX, ExtractOptions, PermissionStrategy};

pub const DEFAULT_CONFIG_FILE: &str = "ziplift.toml";
pub const ENV_PREFIX: &str = "ZIPLIFT_";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub archive: Option<PathBuf>,
    pub extract_dir: PathBuf,
    pub extract: ExtractConfig,
    pub upload: UploadConfig,
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    pub max_depth: usize,
    pub nested_suffixes: Vec<String>,
    pub permissions: Permissions,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Permissions {
    #[default]
    Preserve,
    Standard,
    ReadOnly,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: Option<String>,
    pub prefix: String,
    pub timeout_secs: Option<u64>,
}

/// Where uploaded objects go.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Mirror objects into `root/<bucket>/<key>`.
    Fs { root: PathBuf },
    /// HTTP `PUT` to `<endpoint>/<bucket>/<key>`; without an endpoint the
    /// regional S3 endpoint is used.
    Http {
        endpoint: Option<String>,
        region: Option<String>,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive: None,
            extract_dir: PathBuf::from("extracted"),
            extract: ExtractConfig::default(),
            upload: UploadConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            nested_suffixes: vec![DEFAULT_NESTED_SUFFIX.to_string()],
            permissions: Permissions::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: "uploads/".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Fs {
            root: PathBuf::from("objects"),
        }
    }
}

impl From<Permissions> for PermissionStrategy {
    fn from(value: Permissions) -> Self {
        match value {
            Permissions::Preserve => Self::Preserve,
            Permissions::Standard => Self::Standard,
            Permissions::ReadOnly => Self::ReadOnly,
        }
    }
}

/// Command-line values layered over every other source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub archive: Option<PathBuf>,
    pub extract_dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub max_depth: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, figment: Figment) -> Figment {
        let mut figment = figment;
        if let Some(archive) = self.archive {
            figment = figment.merge(Serialized::default("archive", archive));
        }
        if let Some(dir) = self.extract_dir {
            figment = figment.merge(Serialized::default("extract_dir", dir));
        }
        if let Some(bucket) = self.bucket {
            figment = figment.merge(Serialized::default("upload.bucket", bucket));
        }
        if let Some(prefix) = self.prefix {
            figment = figment.merge(Serialized::default("upload.prefix", prefix));
        }
        if let Some(depth) = self.max_depth {
            figment = figment.merge(Serialized::default("extract.max_depth", depth));
        }
        if let Some(secs) = self.timeout_secs {
            figment = figment.merge(Serialized::default("upload.timeout_secs", secs));
        }
        figment
    }
}

impl Config {
    /// Merge defaults, the TOML file, `ZIPLIFT_*` environment variables
    /// (nested keys split on `__`) and `overrides`, in rising priority.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> figment::Result<Self> {
        let toml = match file {
            Some(path) if !path.is_file() => {
                return Err(figment::Error::from(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
            Some(path) => Toml::file(path),
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(toml)
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        overrides.apply(figment).extract()
    }

    pub fn archive(&self) -> anyhow::Result<&Path> {
        self.archive
            .as_deref()
            .context("no archive configured (set `archive` or pass --archive)")
    }

    pub fn bucket(&self) -> anyhow::Result<&str> {
        self.upload
            .bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .context("no bucket configured (set `upload.bucket` or pass --bucket)")
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload.timeout_secs.map(Duration::from_secs)
    }

    pub fn extract_options(&self, cancel: CancellationToken) -> ExtractOptions {
        ExtractOptions::default()
            .permission_strategy(self.extract.permissions.into())
            .max_depth(self.extract.max_depth)
            .nested_suffixes(self.extract.nested_suffixes.iter().cloned())
            .cancel_token(cancel)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None, Overrides::default())?;
            assert_eq!(config, Config::default());
            assert_eq!(config.upload.prefix, "uploads/");
            assert_eq!(config.extract.max_depth, DEFAULT_MAX_DEPTH);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_flags() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    archive = "bundle.zip"
                    extract_dir = "out"

                    [extract]
                    max_depth = 4
                    permissions = "read-only"

                    [upload]
                    bucket = "from-file"
                    prefix = "file/"

                    [store]
                    kind = "http"
                    region = "eu-west-1"
                "#,
            )?;
            jail.set_env("ZIPLIFT_UPLOAD__BUCKET", "from-env");
            jail.set_env("ZIPLIFT_UPLOAD__TIMEOUT_SECS", "30");

            let overrides = Overrides {
                prefix: Some("flag/".into()),
                ..Overrides::default()
            };
            let config = Config::load(None, overrides)?;

            assert_eq!(config.archive, Some(PathBuf::from("bundle.zip")));
            assert_eq!(config.extract_dir, PathBuf::from("out"));
            assert_eq!(config.extract.max_depth, 4);
            assert_eq!(config.extract.permissions, Permissions::ReadOnly);
            assert_eq!(config.upload.bucket.as_deref(), Some("from-env"));
            assert_eq!(config.upload.prefix, "flag/");
            assert_eq!(config.upload_timeout(), Some(Duration::from_secs(30)));
            assert_eq!(
                config.store,
                StoreConfig::Http {
                    endpoint: None,
                    region: Some("eu-west-1".into())
                }
            );
            Ok(())
        });
    }

    #[test]
    fn fs_store_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("alt.toml", "[store]\nkind = \"fs\"\nroot = \"mirror\"\n")?;
            let config = Config::load(Some(Path::new("alt.toml")), Overrides::default())?;
            assert_eq!(
                config.store,
                StoreConfig::Fs {
                    root: PathBuf::from("mirror")
                }
            );
            Ok(())
        });
    }

    #[test]
    fn named_file_must_exist() {
        Jail::expect_with(|_jail| {
            assert!(Config::load(Some(Path::new("missing.toml")), Overrides::default()).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_values_are_reported() {
        let config = Config::default();
        assert!(config.archive().is_err());
        assert!(config.bucket().is_err());
    }

    #[test]
    fn extract_options_follow_config() {
        let mut config = Config::default();
        config.extract.max_depth = 2;
        config.extract.permissions = Permissions::Standard;
        let options = config.extract_options(CancellationToken::new());
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.perm_strategy, PermissionStrategy::Standard);
        assert_eq!(options.nested_suffixes, vec![".zip".to_string()]);
    }
}
