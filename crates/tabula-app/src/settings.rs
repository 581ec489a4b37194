// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const PAGE_SIZE_OPTIONS: [usize; 5] = [2, 5, 10, 20, 40];

/// Tuning knobs shared by every table the engine drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub debounce_delay: Duration,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.debounce_delay.is_zero() {
            bail!("debounce delay must be positive");
        }
        if self.page_size_options.is_empty() {
            bail!("page size options must not be empty");
        }
        if self.page_size_options.contains(&0) {
            bail!("page size options must all be positive");
        }
        if !self.page_size_options.contains(&self.page_size) {
            bail!(
                "default page size {} is not one of {:?}",
                self.page_size,
                self.page_size_options
            );
        }
        Ok(())
    }

    /// Smallest selectable page size larger than `current`.
    pub fn next_page_size(&self, current: usize) -> Option<usize> {
        self.page_size_options
            .iter()
            .copied()
            .filter(|size| *size > current)
            .min()
    }

    pub fn previous_page_size(&self, current: usize) -> Option<usize> {
        self.page_size_options
            .iter()
            .copied()
            .filter(|size| *size < current)
            .max()
    }
}
