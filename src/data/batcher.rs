// ============================================================
// Layer 4 — Batch Scheduler
// ============================================================
// Produces the lazy stream of training batches:
//
//   for epoch in 0..num_epochs:
//       reshuffle the training rows with a fresh permutation
//       emit rows [0, b), [b, 2b), ... , [k·b, N)
//
// The last batch of an epoch is short when N is not a multiple
// of batch_size, so one epoch yields ceil(N / batch_size)
// batches and the whole stream num_epochs × ceil(N / batch_size).
//
// Nothing is materialised up front: each Batch is gathered when
// the consumer pulls it. Every call to `iterate` starts a new,
// independent stream. The per-epoch shuffle draws from entropy
// (not the split seed) unless a seed is pinned for tests.
//
// TextCnnBatcher is the burn side: it turns the rows of one
// batch into the tensors the model consumes.
//
//   input_ids: [batch, seq_len]  Int
//   targets:   [batch]           Int  (class index of each row)

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::encoded::EncodedDataset;
use crate::error::PipelineError;

/// One slice of training rows.
#[derive(Debug, Clone)]
pub struct Batch {
    /// 0-based epoch this batch belongs to
    pub epoch: usize,
    /// 0-based position of the batch within its epoch
    pub index: usize,
    pub data:  EncodedDataset,
}

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    num_epochs: usize,
    seed:       Option<u64>,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, num_epochs: usize) -> Result<Self> {
        if batch_size == 0 || num_epochs == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size and num_epochs must be positive".into(),
            )
            .into());
        }
        Ok(Self { batch_size, num_epochs, seed: None })
    }

    /// Pin the per-epoch shuffle to a seed (reproducible streams).
    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn batches_per_epoch(&self, rows: usize) -> usize {
        rows.div_ceil(self.batch_size)
    }

    pub fn total_batches(&self, rows: usize) -> usize {
        self.num_epochs * self.batches_per_epoch(rows)
    }

    /// Start a fresh stream of batches over `data`.
    pub fn iterate<'a>(&self, data: &'a EncodedDataset) -> Batches<'a> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        Batches {
            data,
            batch_size: self.batch_size,
            num_epochs: self.num_epochs,
            rng,
            epoch:  0,
            index:  0,
            order:  Vec::new(),
            cursor: 0,
            started: false,
        }
    }
}

/// Lazy iterator returned by [`BatchScheduler::iterate`].
pub struct Batches<'a> {
    data:       &'a EncodedDataset,
    batch_size: usize,
    num_epochs: usize,
    rng:        StdRng,
    epoch:      usize,
    index:      usize,
    order:      Vec<usize>,
    cursor:     usize,
    started:    bool,
}

impl Batches<'_> {
    fn start_epoch(&mut self) {
        self.order = (0..self.data.len()).collect();
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
        self.index  = 0;
    }
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.data.is_empty() {
            return None;
        }
        if !self.started {
            self.started = true;
            self.start_epoch();
        } else if self.cursor >= self.order.len() {
            if self.epoch + 1 >= self.num_epochs {
                return None;
            }
            self.epoch += 1;
            self.start_epoch();
        }

        let end   = (self.cursor + self.batch_size).min(self.order.len());
        let batch = Batch {
            epoch: self.epoch,
            index: self.index,
            data:  self.data.select(&self.order[self.cursor..end]),
        };
        self.cursor = end;
        self.index += 1;
        Some(batch)
    }
}

// ─── Tensor batches ───────────────────────────────────────────────────────────
/// One encoded example: token ids plus its class index.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCnnItem {
    pub ids:   Vec<u32>,
    pub class: usize,
}

/// Every row of `data` as a batcher item, in row order.
pub fn items(data: &EncodedDataset) -> Vec<TextCnnItem> {
    (0..data.len())
        .map(|row| TextCnnItem { ids: data.row_ids(row).to_vec(), class: data.row_class(row) })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TextCnnBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,
    pub targets:   Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct TextCnnBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TextCnnBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TextCnnItem, TextCnnBatch<B>> for TextCnnBatcher<B> {
    fn batch(&self, items: Vec<TextCnnItem>) -> TextCnnBatch<B> {
        let rows    = items.len();
        let seq_len = items.first().map_or(0, |item| item.ids.len());

        let ids: Vec<i64> = items
            .iter()
            .flat_map(|item| item.ids.iter().map(|&id| id as i64))
            .collect();
        let targets: Vec<i64> = items.iter().map(|item| item.class as i64).collect();

        TextCnnBatch {
            input_ids: Tensor::from_data(TensorData::new(ids, [rows, seq_len]), &self.device),
            targets:   Tensor::from_data(TensorData::new(targets, [rows]), &self.device),
        }
    }
}
