use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

#[derive(Clone, Debug, Parser)]
#[command(name = "ziplift", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Configuration file. Defaults to `ziplift.toml` when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(name = "run", about = "Extract the configured archive, print its tree and upload it")]
    Run(RunArgs),
    #[command(alias = "x", name = "extract", about = "Extract an archive and its nested archives")]
    Extract(ExtractArgs),
    #[command(name = "tree", about = "Print the directory tree below a path")]
    Tree(TreeArgs),
    #[command(alias = "up", name = "upload", about = "Upload directories to the object store")]
    Upload(UploadArgs),
}

#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub archive: Option<PathBuf>,
    #[arg(long)]
    pub extract_dir: Option<PathBuf>,
    #[arg(long)]
    pub bucket: Option<String>,
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ExtractArgs {
    pub archive: PathBuf,
    pub destination: PathBuf,
    /// Deepest nested archive level to unpack.
    #[arg(long)]
    pub max_depth: Option<usize>,
}

#[derive(Clone, Debug, Args)]
pub struct TreeArgs {
    pub directory: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,
    #[arg(long)]
    pub bucket: Option<String>,
    /// Key prefix. With several directories each one is uploaded under
    /// `<prefix><directory name>/`.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Per-file upload deadline in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Commands {
    /// Flags that take precedence over the config file and environment.
    pub fn overrides(&self) -> Overrides {
        match self {
            Self::Run(args) => Overrides {
                archive: args.archive.clone(),
                extract_dir: args.extract_dir.clone(),
                bucket: args.bucket.clone(),
                prefix: args.prefix.clone(),
                ..Overrides::default()
            },
            Self::Extract(args) => Overrides {
                max_depth: args.max_depth,
                ..Overrides::default()
            },
            Self::Tree(_) => Overrides::default(),
            Self::Upload(args) => Overrides {
                bucket: args.bucket.clone(),
                prefix: args.prefix.clone(),
                timeout_secs: args.timeout_secs,
                ..Overrides::default()
            },
        }
    }
}
