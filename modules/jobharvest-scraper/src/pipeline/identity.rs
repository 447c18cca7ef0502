//! Content-addressed job identity: a 16-hex-char digest over the
//! normalized (title, company, location) triple. Identical roles from
//! different sources collapse to the same id.

use sha2::{Digest, Sha256};

use jobharvest_common::Job;

const ID_HEX_LEN: usize = 16;

/// Deterministic identity for a (title, company, location) triple.
/// Invariant under surrounding whitespace and case.
pub fn identity(title: &str, company: &str, location: &str) -> String {
    let key = format!(
        "{}_{}_{}",
        title.trim().to_lowercase(),
        company.trim().to_lowercase(),
        location.trim().to_lowercase()
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..ID_HEX_LEN].to_string()
}

pub fn job_identity(job: &Job) -> String {
    identity(&job.title, &job.company.name, &job.location)
}
