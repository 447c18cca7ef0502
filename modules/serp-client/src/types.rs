use serde::Deserialize;

/// Top-level response from the provider's Google Jobs engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub jobs_results: Vec<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One structured job listing from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResult {
    pub title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub share_link: Option<String>,
    #[serde(default)]
    pub detected_extensions: Option<DetectedExtensions>,
    #[serde(default)]
    pub apply_options: Vec<ApplyOption>,
}

/// Structured metadata the provider detects on a listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectedExtensions {
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub schedule_type: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub work_from_home: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyOption {
    #[serde(default)]
    pub title: Option<String>,
    pub link: String,
}

impl JobResult {
    /// Best canonical URL for the listing: first apply link, else share link.
    pub fn canonical_url(&self) -> Option<String> {
        self.apply_options
            .first()
            .map(|opt| opt.link.clone())
            .or_else(|| self.share_link.clone())
    }
}
