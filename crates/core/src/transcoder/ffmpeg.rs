//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::bitrate;
use crate::directory::ensure_directory;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{EncodeProgress, EncodeResult, RenditionJob, SourceProbe};

/// Number of trailing diagnostic lines kept from ffmpeg's stderr.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for one HLS rendition.
    ///
    /// A source-copy rendition only re-segments; every other rendition is
    /// scaled and re-encoded with keyframes pinned to segment boundaries.
    fn build_hls_args(&self, job: &RenditionJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        if job.spec.is_source_copy {
            args.extend([
                "-c:v".to_string(),
                "copy".to_string(),
                "-c:a".to_string(),
                "copy".to_string(),
            ]);
        } else {
            let gop = self.config.gop_size(job.frame_rate).to_string();

            args.extend([
                "-vf".to_string(),
                format!("scale={}:{}", job.spec.width, job.spec.height),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-profile:v".to_string(),
                self.config.video_profile.clone(),
                "-crf".to_string(),
                self.config.crf.to_string(),
                "-sc_threshold".to_string(),
                "0".to_string(),
                "-g".to_string(),
                gop.clone(),
                "-keyint_min".to_string(),
                gop,
            ]);

            // Cap the rate at the target; the buffer allows two seconds of it
            if let Some(bps) = bitrate::parse_bitrate(&job.spec.target_bitrate) {
                args.extend([
                    "-maxrate".to_string(),
                    bps.to_string(),
                    "-bufsize".to_string(),
                    (bps * 2).to_string(),
                ]);
            }

            if job.has_audio {
                args.extend([
                    "-c:a".to_string(),
                    "aac".to_string(),
                    "-ar".to_string(),
                    self.config.audio_sample_rate_hz.to_string(),
                    "-b:a".to_string(),
                    self.config.audio_bitrate.clone(),
                ]);
            } else {
                args.push("-an".to_string());
            }
        }

        // Segmenting
        args.extend([
            "-hls_time".to_string(),
            self.config.segment_duration_secs.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_segment_filename".to_string(),
            job.segment_path_pattern().to_string_lossy().to_string(),
            "-f".to_string(),
            "hls".to_string(),
        ]);

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(job.playlist_path().to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output into a SourceProbe.
    fn parse_probe_output(path: &Path, output: &str) -> Result<SourceProbe, TranscodeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
            size: Option<String>,
            bit_rate: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            avg_frame_rate: Option<String>,
            r_frame_rate: Option<String>,
            disposition: Option<ProbeDisposition>,
        }

        #[derive(Deserialize)]
        struct ProbeDisposition {
            #[serde(default)]
            attached_pic: u8,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscodeError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        // Cover art shows up as a video stream; skip it
        let video_stream = probe
            .streams
            .iter()
            .filter(|s| s.codec_type == "video")
            .find(|s| s.disposition.as_ref().map_or(true, |d| d.attached_pic == 0))
            .ok_or_else(|| TranscodeError::NoVideoStream {
                path: path.to_path_buf(),
            })?;

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let (width, height) = match (video_stream.width, video_stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(TranscodeError::MissingDimensions {
                    path: path.to_path_buf(),
                })
            }
        };

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let bitrate_bps = bitrate::resolve_source_bitrate(
            video_stream.bit_rate.as_deref(),
            probe.format.bit_rate.as_deref(),
        );

        let frame_rate = video_stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

        Ok(SourceProbe {
            path: path.to_path_buf(),
            width,
            height,
            duration_secs,
            bitrate_bps,
            video_codec: video_stream
                .codec_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            frame_rate,
            has_audio: audio_stream.is_some(),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            size_bytes,
        })
    }

    /// Counts media segments written next to the playlist.
    async fn count_segments(dir: &Path) -> Result<usize, TranscodeError> {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_segment = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "ts" | "m4s"));
            if is_segment {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Runs one rendition encode with optional progress reporting.
    async fn run_encode(
        &self,
        job: &RenditionJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeResult, TranscodeError> {
        let start = Instant::now();

        ensure_directory(&job.output_dir).await?;

        let args = self.build_hls_args(job);
        debug!(job_id = %job.job_id, rendition = %job.spec.name, ?args, "Starting ffmpeg");

        // Dropping the encode future (cancellation) kills the child
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscodeError::encode_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Track progress
        let mut current_time = 0.0;
        let mut current_speed = None;
        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=\s*(\d+\.?\d*)x").ok();
        let progress_key_regex = Regex::new(r"^[a-z_0-9]+=").ok();

        let work = async {
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                let is_progress_line = progress_key_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(&line));

                // Keep diagnostics, not the progress key/value stream
                if !is_progress_line && !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                }

                if let Some(ref re) = time_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(us_str) = caps.get(1) {
                            if let Ok(us) = us_str.as_str().parse::<f64>() {
                                // out_time_ms is reported in microseconds
                                current_time = us / 1_000_000.0;
                            }
                        }
                    }
                }

                if let Some(ref re) = speed_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(speed_str) = caps.get(1) {
                            current_speed = Some(format!("{}x", speed_str.as_str()));
                        }
                    }
                }

                if let Some(ref tx) = progress_tx {
                    if last_progress_send.elapsed() >= progress_interval {
                        let percent = match job.duration_secs {
                            Some(dur) if dur > 0.0 => (current_time / dur * 100.0).min(100.0) as f32,
                            _ => 0.0,
                        };

                        let progress = EncodeProgress {
                            job_id: job.job_id.clone(),
                            rendition: job.spec.name.clone(),
                            percent,
                            time_secs: current_time,
                            duration_secs: job.duration_secs,
                            speed: current_speed.clone(),
                        };

                        // Non-blocking send
                        let _ = tx.try_send(progress);
                        last_progress_send = Instant::now();
                    }
                }
            }

            let status = child.wait().await?;
            let tail: Vec<String> = tail.into_iter().collect();
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, tail.join("\n")))
        };

        let result = match self.config.encode_timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), work).await.ok(),
            None => Some(work.await),
        };

        let diagnostics = match result {
            Some(Ok((status, diagnostics))) => {
                if !status.success() {
                    return Err(TranscodeError::encode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if diagnostics.is_empty() {
                            None
                        } else {
                            Some(diagnostics)
                        },
                    ));
                }
                diagnostics
            }
            Some(Err(e)) => return Err(TranscodeError::Io(e)),
            None => {
                // Kill the process on timeout
                let _ = child.kill().await;
                return Err(TranscodeError::Timeout {
                    timeout_secs: self.config.encode_timeout_secs.unwrap_or_default(),
                });
            }
        };

        let playlist_path = job.playlist_path();
        if tokio::fs::metadata(&playlist_path).await.is_err() {
            return Err(TranscodeError::encode_failed(
                "Playlist not created",
                if diagnostics.is_empty() {
                    None
                } else {
                    Some(diagnostics)
                },
            ));
        }

        let segment_count = Self::count_segments(&job.output_dir).await?;

        Ok(EncodeResult {
            job_id: job.job_id.clone(),
            rendition: job.spec.name.clone(),
            playlist_path,
            segment_count,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Parses an ffprobe frame rate like "24000/1001" or "30".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            if den > 0.0 {
                num / den
            } else {
                return None;
            }
        }
        None => rate.parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<SourceProbe, TranscodeError> {
        if !path.exists() {
            return Err(TranscodeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn encode(&self, job: RenditionJob) -> Result<EncodeResult, TranscodeError> {
        self.run_encode(&job, None).await
    }

    async fn encode_with_progress(
        &self,
        job: RenditionJob,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeResult, TranscodeError> {
        self.run_encode(&job, Some(progress_tx)).await
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        Ok(())
    }
}
