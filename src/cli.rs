//! Maintenance commands that run outside the server.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

const HF_BASE: &str = "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Files the local provider needs, relative to the repo root on the hub.
const ARTIFACTS: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
];

/// Fetch the ONNX embedding model and tokenizer into the cache directory.
/// Artifacts already on disk are skipped; partial downloads never become
/// visible under the final name.
pub async fn model_download(config: &crate::config::LocalProviderConfig) -> Result<()> {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (file_name, remote_path) in ARTIFACTS {
        let dest = cache_dir.join(file_name);
        if dest.exists() {
            println!("{file_name} already present at {}", dest.display());
            continue;
        }
        println!("Fetching {file_name}...");
        fetch_artifact(&format!("{HF_BASE}/{remote_path}"), &dest).await?;
        println!("  -> {}", dest.display());
    }

    println!("Local provider assets ready in {}", cache_dir.display());
    Ok(())
}

/// Stream a remote file to disk chunk by chunk, writing through a `.tmp`
/// sibling that is renamed into place only once the body is complete.
async fn fetch_artifact(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("request failed for {url}"))?;
    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let bar = match response.content_length() {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} ({eta})")
                    .expect("valid template")
                    .progress_chars("##-"),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("error reading response body")?
    {
        file.write_all(&chunk).await.context("error writing chunk")?;
        bar.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .with_context(|| format!("failed to move {} into place", tmp_path.display()))?;

    bar.finish_and_clear();
    Ok(())
}
