// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use maxims_app::{FetchOutcome, FetchRequest, Maxim, MaximContent};
use maxims_llm::ContentFetcher;
use maxims_tui::{ExplorerRuntime, InternalEvent};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

/// Runs each fetch on its own thread. There is no cancellation: a thread whose
/// request has been superseded still finishes, and the explorer drops its
/// outcome by token.
pub struct ThreadedRuntime {
    fetcher: Arc<dyn ContentFetcher>,
}

impl ThreadedRuntime {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }
}

impl ExplorerRuntime for ThreadedRuntime {
    fn fetch_content(&mut self, maxim: &Maxim) -> Result<MaximContent> {
        Ok(self.fetcher.fetch(maxim.as_str())?)
    }

    fn spawn_fetch(&mut self, request: FetchRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let name = format!("fetch-{}", request.token.get());
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let FetchRequest { token, maxim } = request;
                let outcome = match fetcher.fetch(maxim.as_str()) {
                    Ok(content) => FetchOutcome::Succeeded { token, content },
                    Err(error) => {
                        warn!(%error, token = %token, maxim = %maxim, "fetch failed");
                        FetchOutcome::Failed {
                            token,
                            message: error.to_string(),
                        }
                    }
                };
                if tx.send(InternalEvent::Fetch(outcome)).is_err() {
                    debug!(token = %token, "explorer closed before fetch settled");
                }
            })
            .context("spawn fetch thread")?;
        Ok(())
    }
}
