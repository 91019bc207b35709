use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStatus {
    #[default]
    Pending,
    Loading,
    Completed,
    Error,
}

/// Per-item fetch progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadProgress {
    pub content_id: String,
    pub status: PreloadStatus,
    pub loaded_bytes: u64,
    /// `None` when the server sent no content length.
    pub total_bytes: Option<u64>,
    /// 0..=100
    pub percent_complete: f64,
    pub speed_bytes_per_sec: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl PreloadProgress {
    pub fn pending(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn update(&mut self, chunk: FetchProgress) {
        self.status = PreloadStatus::Loading;
        self.loaded_bytes = chunk.loaded_bytes;
        self.total_bytes = chunk.total_bytes;
        self.speed_bytes_per_sec = chunk.speed_bytes_per_sec;
        self.percent_complete = match chunk.total_bytes {
            Some(total) if total > 0 => (chunk.loaded_bytes as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        };
    }

    pub(crate) fn complete(&mut self) {
        self.status = PreloadStatus::Completed;
        self.percent_complete = 100.0;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = PreloadStatus::Error;
        self.percent_complete = 0.0;
        self.error = Some(message);
    }
}

/// What a fetcher reports after each chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchProgress {
    pub loaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed_bytes_per_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_tracks_known_length() {
        let mut progress = PreloadProgress::pending("a");
        progress.update(FetchProgress {
            loaded_bytes: 250,
            total_bytes: Some(1000),
            speed_bytes_per_sec: 500.0,
        });
        assert_eq!(progress.status, PreloadStatus::Loading);
        assert_eq!(progress.percent_complete, 25.0);

        progress.update(FetchProgress {
            loaded_bytes: 300,
            total_bytes: None,
            speed_bytes_per_sec: 500.0,
        });
        assert_eq!(progress.percent_complete, 0.0);

        progress.complete();
        assert_eq!(progress.percent_complete, 100.0);
    }

    #[test]
    fn failure_zeroes_percent() {
        let mut progress = PreloadProgress::pending("a");
        progress.fail("HTTP error! status: 404".into());
        assert_eq!(progress.status, PreloadStatus::Error);
        assert_eq!(progress.percent_complete, 0.0);
        assert!(progress.error.unwrap().contains("404"));
    }
}
