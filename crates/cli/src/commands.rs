//! Command implementations.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vodsync_core::storage::ObjectStorage;
use vodsync_core::transcoder::EncodeProgress;
use vodsync_core::{
    B2Client, Config, FfmpegTranscoder, PublishRequest, StorageError, TranscodeOptions, Transcoder,
    VideoPublisher,
};

use crate::cli::{BucketArg, Commands, ListArgs, PublishArgs, TranscodeArgs};

type Publisher = VideoPublisher<FfmpegTranscoder, B2Client>;

/// Runs one command.
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Probe { input } => {
            let publisher = build_publisher(config, false)?;
            let (probe, plan) = publisher
                .inspect(&input)
                .await
                .with_context(|| format!("Failed to plan {:?}", input))?;
            print_json(&serde_json::json!({ "probe": probe, "plan": plan }))
        }
        Commands::Transcode(args) => transcode(config, args).await,
        Commands::Publish(args) => publish(config, args).await,
        Commands::Url { remote_key, bucket } => {
            let publisher = build_publisher(config, true)?;
            let url = publisher
                .get_authorized_download_url(&remote_key, bucket.as_deref())
                .await
                .context("Failed to build download URL")?;
            println!("{}", url);
            Ok(())
        }
        Commands::Ls(args) => list(config, args).await,
        Commands::Folder { path, bucket } => {
            let (storage, bucket_id) = storage_and_bucket(config, &bucket)?;
            let listing = storage
                .list_folder(&bucket_id, &path)
                .await
                .context("Failed to list folder")?;
            print_json(&listing)
        }
        Commands::Search { substring, bucket } => {
            let (storage, bucket_id) = storage_and_bucket(config, &bucket)?;
            let files = storage
                .search_by_name(&bucket_id, &substring)
                .await
                .context("Search failed")?;
            print_json(&files)
        }
        Commands::Manifests { max, bucket } => {
            let (storage, bucket_id) = storage_and_bucket(config, &bucket)?;
            let files = storage
                .list_video_files(&bucket_id, None, max, Some(config.output.manifest_name.as_str()))
                .await
                .context("Failed to list manifests")?;
            print_json(&files)
        }
    }
}

async fn transcode(config: &Config, args: TranscodeArgs) -> Result<()> {
    let publisher = build_publisher(config, false)?;
    publisher
        .transcoder()
        .validate()
        .await
        .context("Transcoder is not usable")?;

    let video_id = args.video_id.unwrap_or_else(new_video_id);
    let options = watch_options();

    let output = publisher
        .transcode_with(&args.input, &video_id, args.base_path.as_deref(), options)
        .await
        .with_context(|| format!("Failed to transcode {:?}", args.input))?;

    print_json(&serde_json::json!({ "video_id": video_id, "output": output }))
}

async fn publish(config: &Config, args: PublishArgs) -> Result<()> {
    let mut config = config.clone();
    if args.keep_input {
        config.output.remove_input_after_run = false;
    }

    let publisher = build_publisher(&config, true)?;
    publisher
        .transcoder()
        .validate()
        .await
        .context("Transcoder is not usable")?;

    let video_id = args.transcode.video_id.unwrap_or_else(new_video_id);
    let mut request = PublishRequest::new(&args.transcode.input, &video_id).with_options(watch_options());
    if let Some(bucket_id) = args.bucket.bucket_id {
        request = request.with_bucket(bucket_id);
    }
    if let Some(base_path) = args.transcode.base_path {
        request = request.with_base_path(base_path);
    }

    let report = publisher
        .process(request)
        .await
        .with_context(|| format!("Failed to publish {:?}", args.transcode.input))?;

    print_json(&report)?;

    if !report.sync.success {
        bail!(
            "{} of {} uploads failed",
            report.sync.failed_uploads.len(),
            report.sync.failed_uploads.len() + report.sync.successful_uploads.len()
        );
    }
    Ok(())
}

async fn list(config: &Config, args: ListArgs) -> Result<()> {
    let (storage, bucket_id) = storage_and_bucket(config, &args.bucket)?;

    match args.prefix {
        Some(prefix) => {
            let files = storage
                .search_by_prefix(&bucket_id, &prefix, args.max)
                .await
                .context("Prefix listing failed")?;
            print_json(&files)
        }
        None => {
            let page = storage
                .list_files(&bucket_id, args.cursor.as_deref(), args.max)
                .await
                .context("Listing failed")?;
            print_json(&page)
        }
    }
}

fn build_storage(config: &Config) -> Result<Arc<B2Client>> {
    let storage_config = config
        .storage
        .clone()
        .ok_or(StorageError::NotConfigured)
        .context("This command needs a [storage] section")?;
    Ok(Arc::new(B2Client::new(storage_config)?))
}

fn build_publisher(config: &Config, with_storage: bool) -> Result<Publisher> {
    let transcoder = Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));
    let publisher = VideoPublisher::new(transcoder, config.renditions.clone(), config.output.clone());

    if !with_storage {
        return Ok(publisher);
    }

    let storage = build_storage(config)?;
    let defaults = config.storage.as_ref();
    Ok(publisher.with_storage(
        storage,
        defaults.and_then(|s| s.default_bucket_id.clone()),
        defaults.and_then(|s| s.default_bucket_name.clone()),
    ))
}

fn storage_and_bucket(config: &Config, bucket: &BucketArg) -> Result<(Arc<B2Client>, String)> {
    let storage = build_storage(config)?;
    let bucket_id = bucket
        .bucket_id
        .clone()
        .or_else(|| storage.config().default_bucket_id.clone())
        .context("No --bucket-id given and storage.default_bucket_id is not set")?;
    Ok((storage, bucket_id))
}

fn new_video_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Progress logging plus Ctrl-C cancellation for a transcode.
fn watch_options() -> TranscodeOptions {
    let options = TranscodeOptions::default();

    let (tx, mut rx) = mpsc::channel::<EncodeProgress>(64);
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            debug!(
                rendition = %progress.rendition,
                percent = progress.percent,
                speed = progress.speed.as_deref().unwrap_or("-"),
                "Encoding"
            );
        }
    });

    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling transcode");
            cancel.cancel();
        }
    });

    info!("Press Ctrl-C to cancel");
    TranscodeOptions {
        progress_tx: Some(tx),
        ..options
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
