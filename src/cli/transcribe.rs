use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::{
    config::{parse_duration, Config},
    credentials::AwsSession,
    transcribe::{transcript_text, Transcriber, TranscriptionRequest},
    utils::fs::{read_file_safe, write_file_safe},
};

/// Transcribe a media file with Amazon Transcribe
#[derive(Args, Debug)]
pub struct TranscribeCommand {
    /// Local media file (mp3, mp4, wav, flac, ogg, amr, webm, m4a)
    pub media: PathBuf,

    /// S3 bucket for the upload and the transcript (defaults to transcription.bucket)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Prefix for S3 keys and the job name
    #[arg(long = "client-name")]
    pub client_name: String,

    /// Language of the recording (defaults to transcription.language_code)
    #[arg(long = "language-code")]
    pub language_code: Option<String>,

    /// Job status polling interval, e.g. 10s
    #[arg(long = "poll-interval")]
    pub poll_interval: Option<String>,

    /// Give up waiting after this long, e.g. 30m
    #[arg(long)]
    pub timeout: Option<String>,

    /// Also download the transcript and write it as plain text
    #[arg(long = "text-out")]
    pub text_out: Option<PathBuf>,
}

impl TranscribeCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let request = self.request(config)?;
        debug!("Transcription request: {:?}", request);

        let transcriber = transcriber(config).await?;
        let output = transcriber.run(&request).await?;

        println!("Job: {}", output.job_name);
        println!("Transcript: s3://{}/{}", output.bucket, output.output_key);

        if let Some(path) = &self.text_out {
            let text = transcriber
                .download_transcript(&output.bucket, &output.output_key)
                .await?;
            write_file_safe(path, text)?;
            info!("Transcript text written to {}", path.display());
            println!("Text: {}", path.display());
        }

        Ok(())
    }

    fn request(&self, config: &Config) -> Result<TranscriptionRequest> {
        let settings = &config.transcription;
        let bucket = self
            .bucket
            .clone()
            .or_else(|| settings.bucket.clone())
            .ok_or_else(|| anyhow!("No bucket given. Use --bucket or set transcription.bucket"))?;

        let poll_interval = match &self.poll_interval {
            Some(value) => parse_duration("--poll-interval", value)?,
            None => settings.poll_interval()?,
        };
        let timeout = match &self.timeout {
            Some(value) => Some(parse_duration("--timeout", value)?),
            None => settings.timeout()?,
        };

        Ok(TranscriptionRequest {
            media_path: self.media.clone(),
            bucket,
            client_name: self.client_name.clone(),
            language_code: self
                .language_code
                .clone()
                .unwrap_or_else(|| settings.language_code.clone()),
            poll_interval,
            timeout,
        })
    }
}

/// Convert a Transcribe result document to plain text
#[derive(Args, Debug)]
pub struct TranscriptCommand {
    /// Local JSON file or s3://bucket/key
    pub source: String,

    /// Write the text here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl TranscriptCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let text = match parse_s3_uri(&self.source) {
            Some((bucket, key)) => {
                transcriber(config)
                    .await?
                    .download_transcript(bucket, key)
                    .await?
            }
            None => {
                let json = read_file_safe(&self.source)?;
                transcript_text(&json)?
            }
        };

        match &self.output {
            Some(path) => {
                write_file_safe(path, &text)?;
                println!("Transcript written to: {}", path.display());
            }
            None => println!("{}", text),
        }
        Ok(())
    }
}

async fn transcriber(config: &Config) -> Result<Transcriber> {
    let aws = AwsSession::from_process(config.credential_settings());
    let sdk_config = aws
        .sdk_config()
        .await
        .context("Failed to resolve AWS credentials")?;
    Ok(Transcriber::from_config(sdk_config))
}

/// Split `s3://bucket/key` into bucket and key
pub fn parse_s3_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn command(bucket: Option<&str>) -> TranscribeCommand {
        TranscribeCommand {
            media: PathBuf::from("talk.mp3"),
            bucket: bucket.map(str::to_string),
            client_name: "sat".to_string(),
            language_code: None,
            poll_interval: None,
            timeout: None,
            text_out: None,
        }
    }

    #[test]
    fn test_parse_s3_uri() {
        assert_eq!(
            parse_s3_uri("s3://sat-aime/sat/transcribe/talk.mp3.json"),
            Some(("sat-aime", "sat/transcribe/talk.mp3.json"))
        );
        assert_eq!(parse_s3_uri("s3://bucket"), None);
        assert_eq!(parse_s3_uri("s3:///key"), None);
        assert_eq!(parse_s3_uri("transcript.json"), None);
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let mut config = Config::default();
        config.transcription.bucket = Some("configured".to_string());
        config.transcription.timeout = Some("1h".to_string());

        let request = command(None).request(&config).unwrap();
        assert_eq!(request.bucket, "configured");
        assert_eq!(request.language_code, "en-US");
        assert_eq!(request.poll_interval, Duration::from_secs(10));
        assert_eq!(request.timeout, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.transcription.bucket = Some("configured".to_string());

        let mut cmd = command(Some("flag"));
        cmd.language_code = Some("pt-BR".to_string());
        cmd.poll_interval = Some("2s".to_string());

        let request = cmd.request(&config).unwrap();
        assert_eq!(request.bucket, "flag");
        assert_eq!(request.language_code, "pt-BR");
        assert_eq!(request.poll_interval, Duration::from_secs(2));
        assert_eq!(request.timeout, None);
    }

    #[test]
    fn test_request_requires_bucket() {
        let err = command(None).request(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--bucket"));
    }

    #[test]
    fn test_rejects_bad_interval() {
        let mut cmd = command(Some("b"));
        cmd.poll_interval = Some("0s".to_string());
        let err = cmd.request(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--poll-interval must be positive"));

        cmd.poll_interval = Some("soon".to_string());
        let err = cmd.request(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--poll-interval 'soon'"));

        cmd.poll_interval = None;
        cmd.timeout = Some("0m".to_string());
        let err = cmd.request(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--timeout must be positive"));
    }

    #[tokio::test]
    async fn test_transcript_from_local_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("talk.json");
        let output = dir.path().join("talk.txt");
        std::fs::write(
            &input,
            r#"{"results": {"transcripts": [{"transcript": "hello there"}]}}"#,
        )
        .unwrap();

        let cmd = TranscriptCommand {
            source: input.display().to_string(),
            output: Some(output.clone()),
        };
        cmd.execute(&Config::default()).await.unwrap();

        assert_eq!(std::fs::read_to_string(output).unwrap(), "hello there");
    }
}
