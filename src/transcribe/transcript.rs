//! Plain text from Amazon Transcribe result documents

use serde::Deserialize;

use crate::transcribe::{TranscribeError, TranscribeResult};

#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    transcript: String,
}

/// Extract the transcript strings of a result document, one per line
pub fn transcript_text(json: &str) -> TranscribeResult<String> {
    let document: TranscriptDocument = serde_json::from_str(json)
        .map_err(|e| TranscribeError::MalformedTranscript(e.to_string()))?;

    if document.results.transcripts.is_empty() {
        return Err(TranscribeError::MalformedTranscript(
            "document has no transcripts".to_string(),
        ));
    }

    Ok(document
        .results
        .transcripts
        .into_iter()
        .map(|entry| entry.transcript)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_transcript() {
        let document = json!({
            "jobName": "sat-1700000000",
            "accountId": "123456789012",
            "results": {
                "transcripts": [{"transcript": "Welcome to the keynote."}],
                "items": [
                    {"start_time": "0.0", "end_time": "0.5", "type": "pronunciation",
                     "alternatives": [{"confidence": "0.99", "content": "Welcome"}]}
                ]
            },
            "status": "COMPLETED"
        });
        assert_eq!(
            transcript_text(&document.to_string()).unwrap(),
            "Welcome to the keynote."
        );
    }

    #[test]
    fn test_multiple_transcripts() {
        let document = json!({
            "results": {"transcripts": [{"transcript": "one"}, {"transcript": "two"}]}
        });
        assert_eq!(transcript_text(&document.to_string()).unwrap(), "one\ntwo");
    }

    #[test]
    fn test_malformed_documents() {
        for raw in [
            "not json",
            r#"{"results": {}}"#,
            r#"{"results": {"transcripts": []}}"#,
            r#"{"results": {"transcripts": [{"text": "x"}]}}"#,
        ] {
            assert!(
                matches!(
                    transcript_text(raw),
                    Err(TranscribeError::MalformedTranscript(_))
                ),
                "expected failure for {raw}"
            );
        }
    }
}
