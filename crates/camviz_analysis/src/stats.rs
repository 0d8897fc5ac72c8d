//! Session statistics.
//!
//! Counts every classification, keeps the most recent confidences and
//! processing times in bounded windows and tracks usage per calendar day.
//! Callers sharing one aggregator across threads wrap it in a mutex.

use std::collections::{BTreeMap, VecDeque};

use camviz_explain::Prediction;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of recent values kept for the rolling averages.
pub const WINDOW_CAPACITY: usize = 100;

/// Fixed-capacity window evicting its oldest value.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, dropping the oldest when full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Number of values held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of the held values, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// Snapshot of a session's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Images classified since the session started.
    pub total_processed: u64,
    /// Mean confidence (percent) over the recent window, one decimal.
    pub avg_confidence: f64,
    /// Mean processing time in seconds over the recent window, two decimals.
    pub avg_processing_time_secs: f64,
    /// Label predicted most often; ties go to the alphabetically first.
    pub most_common_class: Option<String>,
    /// How often `most_common_class` was predicted.
    pub most_common_count: u64,
    /// Images classified today.
    pub daily_count: u64,
    /// Predictions per label.
    pub class_distribution: BTreeMap<String, u64>,
}

impl StatsSummary {
    /// Display the summary as a formatted string.
    pub fn to_string_table(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("{:>24}  {}\n", "total processed", self.total_processed));
        output.push_str(&format!("{:>24}  {:.1}%\n", "avg confidence", self.avg_confidence));
        output.push_str(&format!(
            "{:>24}  {:.2}s\n",
            "avg processing time", self.avg_processing_time_secs
        ));
        output.push_str(&format!(
            "{:>24}  {} ({})\n",
            "most common class",
            self.most_common_class.as_deref().unwrap_or("n/a"),
            self.most_common_count
        ));
        output.push_str(&format!("{:>24}  {}\n", "today", self.daily_count));
        for (label, count) in &self.class_distribution {
            output.push_str(&format!("{:>24}  {}\n", label, count));
        }
        output
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Aggregates classifications made during one session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    total_processed: u64,
    predictions_by_class: BTreeMap<String, u64>,
    confidences: RollingWindow,
    processing_times: RollingWindow,
    daily_usage: BTreeMap<NaiveDate, u64>,
    last_reset: NaiveDate,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::starting(Local::now().date_naive())
    }
}

impl SessionStats {
    /// Create an empty aggregator for today.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty aggregator whose usage day is `today`.
    pub fn starting(today: NaiveDate) -> Self {
        Self {
            total_processed: 0,
            predictions_by_class: BTreeMap::new(),
            confidences: RollingWindow::new(WINDOW_CAPACITY),
            processing_times: RollingWindow::new(WINDOW_CAPACITY),
            daily_usage: BTreeMap::new(),
            last_reset: today,
        }
    }

    /// Record a classification made now.
    pub fn record(&mut self, prediction: &Prediction) {
        self.record_on(prediction, Local::now().date_naive());
    }

    /// Record a classification made on `today`.
    ///
    /// The daily usage counts restart when `today` differs from the day of
    /// the previous reset.
    pub fn record_on(&mut self, prediction: &Prediction, today: NaiveDate) {
        if today != self.last_reset {
            self.daily_usage.clear();
            self.last_reset = today;
        }

        self.total_processed += 1;
        *self
            .predictions_by_class
            .entry(prediction.label.clone())
            .or_insert(0) += 1;
        self.confidences.push(f64::from(prediction.confidence));
        self.processing_times
            .push(prediction.processing_time.as_secs_f64());
        *self.daily_usage.entry(today).or_insert(0) += 1;
    }

    /// Images classified since the session started.
    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    /// Summary as of now.
    pub fn summary(&self) -> StatsSummary {
        self.summary_on(Local::now().date_naive())
    }

    /// Summary as of `today`.
    pub fn summary_on(&self, today: NaiveDate) -> StatsSummary {
        let most_common = self
            .predictions_by_class
            .iter()
            .fold(None::<(&String, u64)>, |best, (label, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((label, count)),
            });

        StatsSummary {
            total_processed: self.total_processed,
            avg_confidence: round_to(self.confidences.mean().unwrap_or(0.0), 1),
            avg_processing_time_secs: round_to(self.processing_times.mean().unwrap_or(0.0), 2),
            most_common_class: most_common.map(|(label, _)| label.clone()),
            most_common_count: most_common.map_or(0, |(_, count)| count),
            daily_count: self.daily_usage.get(&today).copied().unwrap_or(0),
            class_distribution: self.predictions_by_class.clone(),
        }
    }
}
