//! Audio transcription through S3 and Amazon Transcribe
//!
//! A local media file is uploaded to `<client>/media/<file>`, a Transcribe
//! job writes its result to `<client>/transcribe/<file>.json` in the same
//! bucket, and the job is polled until it finishes.

pub mod transcript;

pub use transcript::*;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_transcribe::{
    error::DisplayErrorContext,
    types::{LanguageCode, Media, MediaFormat, TranscriptionJobStatus},
};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{debug, info};

/// Media containers Amazon Transcribe accepts
pub const SUPPORTED_MEDIA_FORMATS: &[&str] = &["mp3", "mp4", "wav", "flac", "ogg", "amr", "webm", "m4a"];

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Unsupported media file {path}: {reason}")]
    InvalidMedia { path: String, reason: String },

    #[error("Upload to s3://{bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Transcription service error: {0}")]
    Service(String),

    #[error("Transcription job {job_name} failed: {reason}")]
    JobFailed { job_name: String, reason: String },

    #[error("Transcription job {job_name} did not finish within {}", humantime::format_duration(*waited))]
    Timeout { job_name: String, waited: Duration },

    #[error("Download of s3://{bucket}/{key} failed: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Malformed transcript: {0}")]
    MalformedTranscript(String),
}

pub type TranscribeResult<T> = Result<T, TranscribeError>;

/// Job name for a client at a given unix time
pub fn job_name(client_name: &str, unix_secs: u64) -> String {
    format!("{}-{}", client_name, unix_secs)
}

/// S3 key the media file is uploaded to
pub fn media_key(client_name: &str, file_name: &str) -> String {
    format!("{}/media/{}", client_name, file_name)
}

/// S3 key the transcript is written to
pub fn output_key(client_name: &str, file_name: &str) -> String {
    format!("{}/transcribe/{}.json", client_name, file_name)
}

/// Media format from the file extension
pub fn media_format(path: &Path) -> TranscribeResult<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| TranscribeError::InvalidMedia {
            path: path.display().to_string(),
            reason: "file has no extension".to_string(),
        })?;

    SUPPORTED_MEDIA_FORMATS
        .iter()
        .find(|format| **format == extension)
        .copied()
        .ok_or_else(|| TranscribeError::InvalidMedia {
            path: path.display().to_string(),
            reason: format!(
                "'{}' is not one of {}",
                extension,
                SUPPORTED_MEDIA_FORMATS.join(", ")
            ),
        })
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub media_path: PathBuf,
    pub bucket: String,
    pub client_name: String,
    pub language_code: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionOutput {
    pub job_name: String,
    pub bucket: String,
    pub output_key: String,
    pub transcript_uri: String,
}

/// State of a transcription job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed { transcript_uri: String },
    Failed { reason: String },
}

/// Source of job status, polled by [`wait_for_job`]
#[async_trait]
pub trait JobMonitor: Send + Sync {
    async fn job_status(&self, job_name: &str) -> TranscribeResult<JobStatus>;
}

/// Poll until the job completes or fails
pub async fn wait_for_job(
    monitor: &dyn JobMonitor,
    job_name: &str,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> TranscribeResult<String> {
    let started = Instant::now();
    loop {
        match monitor.job_status(job_name).await? {
            JobStatus::Completed { transcript_uri } => return Ok(transcript_uri),
            JobStatus::Failed { reason } => {
                return Err(TranscribeError::JobFailed {
                    job_name: job_name.to_string(),
                    reason,
                })
            }
            JobStatus::Pending => {}
        }

        if let Some(timeout) = timeout {
            if started.elapsed() + poll_interval > timeout {
                return Err(TranscribeError::Timeout {
                    job_name: job_name.to_string(),
                    waited: started.elapsed(),
                });
            }
        }

        debug!("Waiting for transcription job {} to complete", job_name);
        tokio::time::sleep(poll_interval).await;
    }
}

/// S3 and Transcribe clients for one region
#[derive(Debug, Clone)]
pub struct Transcriber {
    s3: aws_sdk_s3::Client,
    transcribe: aws_sdk_transcribe::Client,
}

impl Transcriber {
    pub fn from_config(sdk_config: &SdkConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(sdk_config),
            transcribe: aws_sdk_transcribe::Client::new(sdk_config),
        }
    }

    /// Upload, start the job and wait for it
    pub async fn run(&self, request: &TranscriptionRequest) -> TranscribeResult<TranscriptionOutput> {
        let format = media_format(&request.media_path)?;
        let file_name = request
            .media_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TranscribeError::InvalidMedia {
                path: request.media_path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;

        let media_key = media_key(&request.client_name, file_name);
        self.upload(&request.media_path, &request.bucket, &media_key)
            .await?;

        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let job_name = job_name(&request.client_name, unix_secs);
        let output_key = output_key(&request.client_name, file_name);
        let media_uri = format!("s3://{}/{}", request.bucket, media_key);

        self.transcribe
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media(Media::builder().media_file_uri(&media_uri).build())
            .media_format(MediaFormat::from(format))
            .language_code(LanguageCode::from(request.language_code.as_str()))
            .output_bucket_name(&request.bucket)
            .output_key(&output_key)
            .send()
            .await
            .map_err(|e| TranscribeError::Service(DisplayErrorContext(&e).to_string()))?;
        info!("Started transcription job {} for {}", job_name, media_uri);

        let transcript_uri =
            wait_for_job(self, &job_name, request.poll_interval, request.timeout).await?;
        info!("Transcription job {} completed: {}", job_name, transcript_uri);

        Ok(TranscriptionOutput {
            job_name,
            bucket: request.bucket.clone(),
            output_key,
            transcript_uri,
        })
    }

    async fn upload(&self, path: &Path, bucket: &str, key: &str) -> TranscribeResult<()> {
        info!("Uploading {} to s3://{}/{}", path.display(), bucket, key);
        let upload_error = |message: String| TranscribeError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| upload_error(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    /// Fetch a transcript document from S3 and convert it to plain text
    pub async fn download_transcript(&self, bucket: &str, key: &str) -> TranscribeResult<String> {
        let download_error = |message: String| TranscribeError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let output = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| download_error(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| download_error(e.to_string()))?
            .into_bytes();
        let json = String::from_utf8(bytes.to_vec())
            .map_err(|e| TranscribeError::MalformedTranscript(e.to_string()))?;

        transcript_text(&json)
    }
}

#[async_trait]
impl JobMonitor for Transcriber {
    async fn job_status(&self, job_name: &str) -> TranscribeResult<JobStatus> {
        let output = self
            .transcribe
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .map_err(|e| TranscribeError::Service(DisplayErrorContext(&e).to_string()))?;

        let job = output.transcription_job().ok_or_else(|| {
            TranscribeError::Service(format!("job {} missing from response", job_name))
        })?;

        status_from_job(
            job_name,
            job.transcription_job_status(),
            job.transcript()
                .and_then(|transcript| transcript.transcript_file_uri()),
            job.failure_reason(),
        )
    }
}

/// Map the fields of a `GetTranscriptionJob` response onto a [`JobStatus`]
fn status_from_job(
    job_name: &str,
    status: Option<&TranscriptionJobStatus>,
    transcript_uri: Option<&str>,
    failure_reason: Option<&str>,
) -> TranscribeResult<JobStatus> {
    match status {
        Some(TranscriptionJobStatus::Completed) => match transcript_uri {
            Some(uri) if !uri.is_empty() => Ok(JobStatus::Completed {
                transcript_uri: uri.to_string(),
            }),
            _ => Err(TranscribeError::Service(format!(
                "completed job {} has no transcript URI",
                job_name
            ))),
        },
        Some(TranscriptionJobStatus::Failed) => Ok(JobStatus::Failed {
            reason: failure_reason.unwrap_or("unknown reason").to_string(),
        }),
        _ => Ok(JobStatus::Pending),
    }
}
