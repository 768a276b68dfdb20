//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "vodsync: HLS packaging and object-storage sync",
    long_about = "Transcodes uploaded videos into adaptive-bitrate HLS renditions and \
                  publishes them to a B2-compatible bucket."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file.
    #[arg(long, global = true, env = "VODSYNC_CONFIG", default_value = "vodsync.toml")]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Print metrics in Prometheus text format after the command.
    #[arg(long, global = true, default_value_t = false)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a source and print the rendition plan
    Probe {
        /// Source video file
        input: PathBuf,
    },
    /// Transcode a source into an HLS tree under the output root
    Transcode(TranscodeArgs),
    /// Transcode a source and upload the result
    Publish(PublishArgs),
    /// Print an authorized download URL for a stored key
    Url {
        /// Remote key
        remote_key: String,
        /// Bucket name (defaults to storage.default_bucket_name)
        #[arg(long)]
        bucket: Option<String>,
    },
    /// List files, one page at a time
    Ls(ListArgs),
    /// List the direct children of a pseudo-folder
    Folder {
        /// Folder path ("" for the bucket root)
        #[arg(default_value = "")]
        path: String,
        #[command(flatten)]
        bucket: BucketArg,
    },
    /// Case-insensitive substring search over every key
    Search {
        /// Substring to look for
        substring: String,
        #[command(flatten)]
        bucket: BucketArg,
    },
    /// List uploaded master manifests
    Manifests {
        /// Maximum number of entries
        #[arg(long, default_value_t = 100)]
        max: u32,
        #[command(flatten)]
        bucket: BucketArg,
    },
}

#[derive(Args, Debug)]
pub struct BucketArg {
    /// Bucket id (defaults to storage.default_bucket_id)
    #[arg(long = "bucket-id")]
    pub bucket_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct TranscodeArgs {
    /// Source video file
    pub input: PathBuf,
    /// Video identifier (a random one when omitted)
    #[arg(long)]
    pub video_id: Option<String>,
    /// Prefix substituted for {basePath} in URL templates
    #[arg(long)]
    pub base_path: Option<String>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub transcode: TranscodeArgs,
    #[command(flatten)]
    pub bucket: BucketArg,
    /// Leave the input file in place even if output.remove_input_after_run is set
    #[arg(long, default_value_t = false)]
    pub keep_input: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only keys beginning with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
    /// Cursor returned by a previous page
    #[arg(long)]
    pub cursor: Option<String>,
    /// Page size
    #[arg(long, default_value_t = 100)]
    pub max: u32,
    #[command(flatten)]
    pub bucket: BucketArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish() {
        let cli = Cli::parse_from([
            "vodsync",
            "publish",
            "clip.mp4",
            "--video-id",
            "v1",
            "--bucket-id",
            "b-1",
            "--verbose",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Publish(args) => {
                assert_eq!(args.transcode.input, PathBuf::from("clip.mp4"));
                assert_eq!(args.transcode.video_id.as_deref(), Some("v1"));
                assert_eq!(args.bucket.bucket_id.as_deref(), Some("b-1"));
                assert!(!args.keep_input);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_folder_defaults_to_root() {
        let cli = Cli::parse_from(["vodsync", "--config", "/etc/vodsync.toml", "folder"]);
        assert_eq!(cli.config, PathBuf::from("/etc/vodsync.toml"));
        match cli.command {
            Commands::Folder { path, bucket } => {
                assert_eq!(path, "");
                assert!(bucket.bucket_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
