// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

use crate::{FetchOutcome, FetchRequest, Maxim, MaximContent, RequestToken};

/// Selection, fetch and retry state behind the explorer. The caller runs the
/// fetches announced by [`ExplorerEvent::FetchStarted`] and feeds their
/// outcomes back through [`ExplorerCommand::Settle`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExplorerState {
    selected: Option<Maxim>,
    content: Option<MaximContent>,
    loading: bool,
    error: Option<String>,
    attempt: u64,
    live: Option<RequestToken>,
    last_issued: RequestToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerCommand {
    Select(Maxim),
    Settle(FetchOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyLoading,
    AlreadyLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerEvent {
    Ignored { maxim: Maxim, reason: IgnoreReason },
    SelectionChanged(Maxim),
    RetryRequested { maxim: Maxim, attempt: u64 },
    FetchStarted(FetchRequest),
    ContentLoaded { token: RequestToken },
    FetchFailed { token: RequestToken, message: String },
    StaleOutcomeDiscarded { token: RequestToken },
}

/// What the detail pane shows, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailView<'a> {
    Loading,
    Failed(&'a str),
    Welcome,
    Content(&'a MaximContent),
}

impl ExplorerState {
    pub fn dispatch(&mut self, command: ExplorerCommand) -> Vec<ExplorerEvent> {
        match command {
            ExplorerCommand::Select(maxim) => self.select(maxim),
            ExplorerCommand::Settle(outcome) => vec![self.settle(outcome)],
        }
    }

    pub fn selected(&self) -> Option<&Maxim> {
        self.selected.as_ref()
    }

    pub fn content(&self) -> Option<&MaximContent> {
        self.content.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub const fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Token of the fetch whose outcome may still update state.
    pub const fn live_token(&self) -> Option<RequestToken> {
        self.live
    }

    pub fn is_selected(&self, maxim: &Maxim) -> bool {
        self.selected.as_ref() == Some(maxim)
    }

    pub fn is_item_loading(&self, maxim: &Maxim) -> bool {
        self.loading && self.is_selected(maxim)
    }

    pub fn detail(&self) -> DetailView<'_> {
        if self.loading {
            return DetailView::Loading;
        }
        if let Some(error) = &self.error {
            return DetailView::Failed(error);
        }
        match &self.content {
            Some(content) => DetailView::Content(content),
            None => DetailView::Welcome,
        }
    }

    fn select(&mut self, maxim: Maxim) -> Vec<ExplorerEvent> {
        let same = self.is_selected(&maxim);

        if same && self.loading {
            debug!(maxim = %maxim, "ignoring select; fetch already in flight");
            return vec![ExplorerEvent::Ignored {
                maxim,
                reason: IgnoreReason::AlreadyLoading,
            }];
        }

        if same && self.content.is_some() {
            debug!(maxim = %maxim, "ignoring select; content already loaded");
            return vec![ExplorerEvent::Ignored {
                maxim,
                reason: IgnoreReason::AlreadyLoaded,
            }];
        }

        let mut events = Vec::with_capacity(2);
        if same {
            self.attempt = self.attempt.wrapping_add(1);
            events.push(ExplorerEvent::RetryRequested {
                maxim,
                attempt: self.attempt,
            });
        } else {
            self.selected = Some(maxim.clone());
            events.push(ExplorerEvent::SelectionChanged(maxim));
        }

        if let Some(request) = self.begin_fetch() {
            events.push(ExplorerEvent::FetchStarted(request));
        }
        events
    }

    // Stale content stays on screen until the new fetch settles.
    fn begin_fetch(&mut self) -> Option<FetchRequest> {
        let maxim = self.selected.clone()?;
        self.last_issued = self.last_issued.next();
        self.live = Some(self.last_issued);
        self.loading = true;
        self.error = None;
        debug!(maxim = %maxim, token = %self.last_issued, "fetch issued");
        Some(FetchRequest {
            token: self.last_issued,
            maxim,
        })
    }

    fn settle(&mut self, outcome: FetchOutcome) -> ExplorerEvent {
        let token = outcome.token();
        if self.live != Some(token) {
            debug!(token = %token, live = ?self.live, "discarding stale fetch outcome");
            return ExplorerEvent::StaleOutcomeDiscarded { token };
        }

        self.live = None;
        self.loading = false;
        match outcome {
            FetchOutcome::Succeeded { content, .. } => {
                self.content = Some(content);
                ExplorerEvent::ContentLoaded { token }
            }
            FetchOutcome::Failed { message, .. } => {
                self.error = Some(message.clone());
                self.content = None;
                ExplorerEvent::FetchFailed { token, message }
            }
        }
    }
}
