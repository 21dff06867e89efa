//! Messages exchanged with the image queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product's image list, as published to the broker
///
/// `job_id` survives follow-up publishes so every attempt of the same job can
/// be correlated in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageJob {
    pub job_id: Uuid,
    pub product_id: Option<i64>,
    pub urls: Vec<String>,
    #[serde(default)]
    pub attempt: u32,
    /// URLs that failed for good on earlier attempts of this job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permanent_failures: Vec<FailedImage>,
}

impl ImageJob {
    pub fn new(product_id: i64, urls: Vec<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            product_id: Some(product_id),
            urls,
            attempt: 0,
            permanent_failures: Vec::new(),
        }
    }

    /// Next attempt of this job, restricted to `urls`
    ///
    /// `permanent` is added to the failures already carried by this job.
    pub fn follow_up(&self, urls: Vec<String>, permanent: &[FailedImage]) -> Self {
        let mut permanent_failures = self.permanent_failures.clone();
        permanent_failures.extend_from_slice(permanent);

        Self {
            job_id: self.job_id,
            product_id: self.product_id,
            urls,
            attempt: self.attempt + 1,
            permanent_failures,
        }
    }

    /// Decode a queue payload.
    ///
    /// Accepts the envelope form and the bare JSON array of URLs; the latter
    /// yields a job with no product linkage.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<ImageJob>(payload) {
            Ok(job) => Ok(job),
            Err(envelope_err) => match serde_json::from_slice::<Vec<String>>(payload) {
                Ok(urls) => Ok(Self {
                    job_id: Uuid::new_v4(),
                    product_id: None,
                    urls,
                    attempt: 0,
                    permanent_failures: Vec::new(),
                }),
                Err(_) => Err(envelope_err),
            },
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A single image that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedImage {
    pub url: String,
    pub stage: String,
    pub reason: String,
}

/// Record parked on the dead-letter topic for manual inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub job_id: Option<Uuid>,
    pub product_id: Option<i64>,
    pub attempt: u32,
    pub reason: String,
    #[serde(default)]
    pub failures: Vec<FailedImage>,
    /// Raw payload, kept when the message could not be decoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Message that could not be decoded at all
    pub fn poison(payload: &[u8], reason: impl Into<String>) -> Self {
        Self {
            job_id: None,
            product_id: None,
            attempt: 0,
            reason: reason.into(),
            failures: Vec::new(),
            payload: Some(String::from_utf8_lossy(payload).into_owned()),
            dead_lettered_at: Utc::now(),
        }
    }

    /// Images still failing after the redelivery budget is spent
    pub fn exhausted(job: &ImageJob, failures: Vec<FailedImage>) -> Self {
        Self {
            job_id: Some(job.job_id),
            product_id: job.product_id,
            attempt: job.attempt,
            reason: "redelivery budget exhausted".to_string(),
            failures,
            payload: None,
            dead_lettered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        let job = ImageJob::new(42, vec!["http://x/a.jpg".into()]);
        let decoded = ImageJob::decode(&job.encode().unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_decode_envelope_without_attempt() {
        let payload = br#"{"job_id":"6f1c2a4e-3b9d-4c55-9a51-1d2f0e7c8b90","product_id":3,"urls":[]}"#;
        let job = ImageJob::decode(payload).unwrap();
        assert_eq!(job.attempt, 0);
        assert_eq!(job.product_id, Some(3));
    }

    #[test]
    fn test_decode_legacy_array() {
        let job = ImageJob::decode(br#"["http://x/a.jpg","http://x/b.png"]"#).unwrap();
        assert_eq!(job.product_id, None);
        assert_eq!(job.urls.len(), 2);
        assert_eq!(job.attempt, 0);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ImageJob::decode(b"not json").is_err());
        assert!(ImageJob::decode(br#"{"urls": 5}"#).is_err());
    }

    #[test]
    fn test_follow_up_keeps_identity() {
        let job = ImageJob::new(1, vec!["a".into(), "b".into()]);
        let next = job.follow_up(vec!["b".into()], &[]);
        assert_eq!(next.job_id, job.job_id);
        assert_eq!(next.product_id, Some(1));
        assert_eq!(next.attempt, 1);
        assert_eq!(next.urls, vec!["b".to_string()]);
    }

    #[test]
    fn test_follow_up_accumulates_permanent_failures() {
        let gone = FailedImage {
            url: "a".into(),
            stage: "downloading".into(),
            reason: "HTTP 404".into(),
        };
        let job = ImageJob::new(1, vec!["a".into(), "b".into(), "c".into()]);
        let second = job.follow_up(vec!["b".into(), "c".into()], std::slice::from_ref(&gone));
        let third = second.follow_up(vec!["c".into()], &[]);

        assert_eq!(third.permanent_failures, vec![gone]);

        // Carried across the wire
        let decoded = ImageJob::decode(&third.encode().unwrap()).unwrap();
        assert_eq!(decoded.permanent_failures.len(), 1);
    }

    #[test]
    fn test_poison_keeps_payload() {
        let letter = DeadLetter::poison(b"{broken", "invalid json");
        assert_eq!(letter.payload.as_deref(), Some("{broken"));
        assert!(letter.job_id.is_none());
    }
}
