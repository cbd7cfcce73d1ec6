use std::path::PathBuf;

use hf_hub::api::tokio::Api;

/// Prefix marking a file hosted on the Hugging Face Hub, as `hf://<owner>/<repo>/<file>`
pub static HF_PREFIX: &str = "hf://";

/// Resolve a local path or a Hugging Face Hub reference to a file on disk
/// If the file exists in the hub cache, it will not be downloaded again
pub async fn cached_path(path: &str) -> anyhow::Result<PathBuf> {
    let Some(reference) = path.strip_prefix(HF_PREFIX) else {
        let local = PathBuf::from(path);
        if !local.exists() {
            return Err(anyhow!("File not found: {}", path));
        }

        return Ok(local);
    };

    let (repo, file) = split_reference(reference)
        .ok_or_else(|| anyhow!("Expected hf://<owner>/<repo>/<file>, got {}", path))?;

    log::info!("Fetching {} from {} on the Hugging Face Hub", file, repo);

    let api = Api::new().map_err(|e| anyhow!("Unable to reach the Hugging Face Hub: {}", e))?;

    api.model(repo.to_string())
        .get(file)
        .await
        .map_err(|e| anyhow!("Failed to download {} from {}: {}", file, repo, e))
}

/// Split `<owner>/<repo>/<file...>` into the repo id and the file within it
fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let owner_end = reference.find('/')?;
    let repo_end = owner_end + 1 + reference[owner_end + 1..].find('/')?;

    let (repo, file) = (&reference[..repo_end], &reference[repo_end + 1..]);
    if file.is_empty() || repo.ends_with('/') {
        return None;
    }

    Some((repo, file))
}
