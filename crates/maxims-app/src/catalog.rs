// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;

use crate::model::Maxim;

pub const BOOK_TITLE: &str = "The Culture Code";
pub const BOOK_AUTHOR: &str = "Daniel Coyle";

/// Ideas for action from the three skills of the book: build safety, share
/// vulnerability, establish purpose.
pub const DEFAULT_MAXIMS: [&str; 24] = [
    "Overcommunicate your listening",
    "Spotlight your fallibility early on",
    "Embrace the messenger",
    "Preview future connection",
    "Overdo thank-yous",
    "Be painstaking in the hiring process",
    "Eliminate bad apples",
    "Create safe, collaborative spaces",
    "Make sure everyone has a voice",
    "Pick up trash",
    "Capitalize on threshold moments",
    "Avoid giving sandwich feedback",
    "Embrace fun",
    "Make sure the leader is vulnerable first and often",
    "Overcommunicate expectations",
    "Deliver the negative stuff in person",
    "Listen like a trampoline",
    "Resist the temptation to reflexively add value",
    "Aim for candor; avoid brutal honesty",
    "Embrace the discomfort",
    "Name and rank your priorities",
    "Be ten times as clear about your priorities as you think you should be",
    "Embrace catchphrases",
    "Measure what really matters",
];

/// Ordered, duplicate-free list of maxims shown in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    maxims: Vec<Maxim>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            maxims: DEFAULT_MAXIMS.iter().copied().map(Maxim::from).collect(),
        }
    }
}

impl Catalog {
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let mut maxims = Vec::new();
        for entry in entries {
            let text: String = entry.into();
            if text.trim().is_empty() {
                bail!(
                    "catalog entry {} is blank; every maxim needs some text",
                    maxims.len() + 1
                );
            }
            if !seen.insert(text.clone()) {
                bail!("catalog lists {text:?} more than once; maxims must be unique");
            }
            maxims.push(Maxim::new(text));
        }

        if maxims.is_empty() {
            bail!("catalog is empty; list at least one maxim or drop the override");
        }

        Ok(Self { maxims })
    }

    pub fn maxims(&self) -> &[Maxim] {
        &self.maxims
    }

    pub fn len(&self) -> usize {
        self.maxims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maxims.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Maxim> {
        self.maxims.get(index)
    }

    pub fn position(&self, maxim: &Maxim) -> Option<usize> {
        self.maxims.iter().position(|entry| entry == maxim)
    }
}
