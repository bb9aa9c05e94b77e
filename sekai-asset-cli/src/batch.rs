//! Concurrent per-file processing

use anyhow::{Result, anyhow};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub concurrency: usize,
    pub progress: bool,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub written: usize,
}

impl BatchSummary {
    pub fn into_result(self, total: usize) -> Result<()> {
        if self.failed > 0 {
            return Err(anyhow!("{} of {} inputs failed", self.failed, total));
        }
        Ok(())
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Run `job` over every input on the blocking pool, at most `concurrency` at a time
pub async fn run<F>(inputs: Vec<PathBuf>, options: BatchOptions, job: F) -> Result<BatchSummary>
where
    F: Fn(&Path) -> Result<Vec<PathBuf>> + Send + Sync + 'static,
{
    let start_time = Instant::now();
    let total = inputs.len();
    let progress = if options.progress {
        Some(progress_bar(total)?)
    } else {
        None
    };
    let job = Arc::new(job);

    let results = stream::iter(inputs)
        .map(|path| {
            let job = Arc::clone(&job);
            let progress = progress.clone();
            async move {
                let task_path = path.clone();
                let result = match tokio::task::spawn_blocking(move || (*job)(&task_path)).await {
                    Ok(result) => result,
                    Err(e) => Err(anyhow!("worker task failed: {}", e)),
                };
                if let Some(ref pb) = progress {
                    pb.inc(1);
                }
                (path, result)
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    let mut summary = BatchSummary::default();
    for (path, result) in results {
        match result {
            Ok(written) => {
                summary.succeeded += 1;
                summary.written += written.len();
                tracing::debug!(input = %path.display(), files = written.len(), "processed");
                if !options.progress {
                    println!("✅ {}: {} files", path.display(), written.len());
                }
            }
            Err(e) => {
                summary.failed += 1;
                eprintln!("❌ {}: {:#}", path.display(), e);
            }
        }
    }

    println!(
        "📊 {} succeeded, {} failed, {} files written in {:.2?}",
        summary.succeeded,
        summary.failed,
        summary.written,
        start_time.elapsed()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_counts_outcomes() {
        let inputs = vec![PathBuf::from("a.ok"), PathBuf::from("b.bad"), PathBuf::from("c.ok")];
        let options = BatchOptions {
            concurrency: 2,
            progress: false,
        };
        let summary = run(inputs, options, |path| {
            if path.extension().is_some_and(|e| e == "ok") {
                Ok(vec![path.to_path_buf(), path.with_extension("out")])
            } else {
                Err(anyhow!("broken input"))
            }
        })
        .await
        .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.written, 4);
        assert!(summary.into_result(3).is_err());
    }
}
