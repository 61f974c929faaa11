//! Progress reporting hooks for batch stages.

use super::record::{AnsweredRecord, EvaluationRecord};
use super::stats::PASS_THRESHOLD;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Receives batch progress events.
///
/// Calls come from the single collecting task, one per finished item, so
/// implementations see a sequential stream of events.
pub trait ProgressObserver<T>: Send + Sync {
    fn on_batch_start(&self, _total: usize) {}

    /// `index` is the item's position in the submitted batch.
    fn on_item_complete(&self, index: usize, item: &T);

    fn on_batch_finish(&self, _completed: usize) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl<T> ProgressObserver<T> for NoopObserver {
    fn on_item_complete(&self, _index: usize, _item: &T) {}
}

/// Terminal progress bar for CLI runs.
pub struct ProgressBarObserver {
    bar: ProgressBar,
    tally: Mutex<ScoreTally>,
}

#[derive(Default)]
struct ScoreTally {
    count: usize,
    score_sum: f64,
    passed: usize,
}

impl ProgressBarObserver {
    pub fn new(label: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {prefix} {bar:40.cyan/blue} {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix(label.into());

        Self {
            bar,
            tally: Mutex::new(ScoreTally::default()),
        }
    }

    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        if let Ok(mut tally) = self.tally.lock() {
            *tally = ScoreTally::default();
        }
    }
}

impl ProgressObserver<EvaluationRecord> for ProgressBarObserver {
    fn on_batch_start(&self, total: usize) {
        self.start(total);
    }

    fn on_item_complete(&self, _index: usize, item: &EvaluationRecord) {
        if let Ok(mut tally) = self.tally.lock() {
            tally.count += 1;
            tally.score_sum += item.final_score;
            if item.passed(PASS_THRESHOLD) {
                tally.passed += 1;
            }
            self.bar.set_message(format!(
                "avg={:.2} pass={}/{}",
                tally.score_sum / tally.count as f64,
                tally.passed,
                tally.count
            ));
        }
        self.bar.inc(1);
    }

    fn on_batch_finish(&self, completed: usize) {
        self.bar.finish_with_message(format!("{} evaluated", completed));
    }
}

impl ProgressObserver<AnsweredRecord> for ProgressBarObserver {
    fn on_batch_start(&self, total: usize) {
        self.start(total);
    }

    fn on_item_complete(&self, _index: usize, _item: &AnsweredRecord) {
        self.bar.inc(1);
    }

    fn on_batch_finish(&self, completed: usize) {
        self.bar.finish_with_message(format!("{} answered", completed));
    }
}
