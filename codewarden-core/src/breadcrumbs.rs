//! Breadcrumbs: short, timestamped notes recorded before an error so the
//! captured event shows what the application was doing.
//!
//! License: MIT OR APACHE 2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::event::{Level, ValueMap};

/// Default number of breadcrumbs retained per client.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    /// e.g. "ui", "http", "database".
    pub category: String,
    pub message: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub data: ValueMap,
}

impl Breadcrumb {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            category: category.into(),
            message: message.into(),
            level: Level::Info,
            data: ValueMap::new(),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_data(mut self, data: ValueMap) -> Self {
        self.data = data;
        self
    }
}

/// Bounded ring of breadcrumbs; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct BreadcrumbBuffer {
    max: usize,
    items: VecDeque<Breadcrumb>,
}

impl Default for BreadcrumbBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BREADCRUMBS)
    }
}

impl BreadcrumbBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            items: VecDeque::with_capacity(max.min(DEFAULT_MAX_BREADCRUMBS)),
        }
    }

    pub fn push(&mut self, crumb: Breadcrumb) {
        if self.max == 0 {
            return;
        }
        while self.items.len() >= self.max {
            self.items.pop_front();
        }
        self.items.push_back(crumb);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.items.iter().cloned().collect()
    }
}
