//! Linear regression by mini-batch SGD with parameter averaging.
//!
//! Each record is a CSV line `y,x1,...,xn`. Blank lines and lines starting
//! with `#` are skipped. Every iteration makes one pass over the split and
//! sends the resulting weights; the master's average becomes the starting
//! point of the next pass.

use async_trait::async_trait;
use worker_core::config::keys;
use worker_core::{ComputableWorker, RecordReader, Result, TextRecordReader, WorkerConfig, WorkerError};

use crate::model::ParameterVector;

pub const LEARNING_RATE: &str = "learning_rate";

const DEFAULT_LEARNING_RATE: f64 = 0.01;
const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug)]
pub struct LinearRegressionWorker {
    weights: Vec<f64>,
    learning_rate: f64,
    batch_size: usize,
    iteration: u32,
}

impl Default for LinearRegressionWorker {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            learning_rate: DEFAULT_LEARNING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            iteration: 0,
        }
    }
}

impl LinearRegressionWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn parse_line(line: &str) -> Result<Option<(f64, Vec<f64>)>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let values = line
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| WorkerError::compute_with_source(format!("invalid record '{line}'"), e))?;

        match values.split_first() {
            Some((label, features)) if !features.is_empty() => {
                Ok(Some((*label, features.to_vec())))
            }
            _ => Err(WorkerError::compute(format!(
                "record '{line}' has no features"
            ))),
        }
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.weights[0]
            + self.weights[1..]
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    fn ensure_dimensions(&mut self, features: usize) -> Result<()> {
        if self.weights.is_empty() {
            self.weights = vec![0.0; features + 1];
        } else if self.weights.len() != features + 1 {
            return Err(WorkerError::compute(format!(
                "record has {} features, model has {}",
                features,
                self.weights.len() - 1
            )));
        }
        Ok(())
    }

    /// One gradient step over a mini-batch. Returns the examples used.
    fn step(&mut self, batch: &[String]) -> Result<u64> {
        let mut examples = Vec::with_capacity(batch.len());
        for line in batch {
            if let Some(example) = Self::parse_line(line)? {
                self.ensure_dimensions(example.1.len())?;
                examples.push(example);
            }
        }
        if examples.is_empty() {
            return Ok(0);
        }

        let mut gradient = vec![0.0; self.weights.len()];
        for (label, features) in &examples {
            let error = self.predict(features) - label;
            gradient[0] += error;
            for (g, x) in gradient[1..].iter_mut().zip(features) {
                *g += error * x;
            }
        }

        let scale = self.learning_rate / examples.len() as f64;
        for (w, g) in self.weights.iter_mut().zip(&gradient) {
            *w -= scale * g;
        }
        Ok(examples.len() as u64)
    }
}

#[async_trait]
impl ComputableWorker for LinearRegressionWorker {
    type Update = ParameterVector;
    type Reader = TextRecordReader;

    fn setup(&mut self, config: &WorkerConfig) -> Result<()> {
        self.learning_rate = config
            .app_setting_parsed::<f64>(LEARNING_RATE)?
            .unwrap_or(DEFAULT_LEARNING_RATE);
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(WorkerError::config(format!(
                "app.{LEARNING_RATE} must be a positive number, got {}",
                self.learning_rate
            )));
        }

        self.batch_size = config
            .app_setting_parsed::<usize>(keys::BATCH_SIZE)?
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .max(1);

        tracing::info!(
            "Linear regression setup, learning_rate={}, batch_size={}",
            self.learning_rate,
            self.batch_size
        );
        Ok(())
    }

    async fn compute(&mut self, records: &mut TextRecordReader) -> Result<ParameterVector> {
        let mut examples = 0;
        loop {
            let batch = records.next_batch(self.batch_size)?;
            if batch.is_empty() {
                break;
            }
            examples += self.step(&batch)?;
            // Let the heartbeat in between batches
            tokio::task::yield_now().await;
        }

        tracing::debug!(
            "Pass {} done over {} examples, weights={:?}",
            self.iteration,
            examples,
            self.weights
        );
        Ok(ParameterVector::new(self.weights.clone(), examples, self.iteration))
    }

    fn update(&mut self, update: ParameterVector) -> Result<()> {
        if update.weights.is_empty() {
            return Ok(());
        }
        if !self.weights.is_empty() && update.dimensions() != self.weights.len() {
            return Err(WorkerError::compute(format!(
                "master update has {} weights, model has {}",
                update.dimensions(),
                self.weights.len()
            )));
        }
        self.weights = update.weights;
        Ok(())
    }

    fn results(&mut self) -> Result<Option<ParameterVector>> {
        if self.weights.is_empty() {
            return Ok(None);
        }
        Ok(Some(ParameterVector::new(self.weights.clone(), 0, self.iteration)))
    }

    fn increment_iteration(&mut self) {
        self.iteration += 1;
    }
}
