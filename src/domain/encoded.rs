// ============================================================
// Layer 3 — Encoded Dataset & Embedding Matrix
// ============================================================
// EncodedDataset is the integer view of a corpus:
//
//   ids:    row-major (N, sequence_length) token ids
//   labels: row-major (N, num_classes) one-hot rows
//
// Row i of `ids` and row i of `labels` always describe the same
// example. Every reordering (`select`) and cut (`split_at`) is
// applied to both matrices with the same indices, so that
// pairing can never drift.

use anyhow::Result;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDataset {
    ids:             Vec<u32>,
    labels:          Vec<f32>,
    sequence_length: usize,
    num_classes:     usize,
}

impl EncodedDataset {
    pub fn new(
        ids:             Vec<u32>,
        labels:          Vec<f32>,
        sequence_length: usize,
        num_classes:     usize,
    ) -> Result<Self> {
        if sequence_length == 0 || num_classes == 0 {
            return Err(PipelineError::InvalidDataset(
                "sequence_length and num_classes must be positive".into(),
            )
            .into());
        }
        if ids.len() % sequence_length != 0 || labels.len() % num_classes != 0 {
            return Err(PipelineError::InvalidDataset(
                "matrix length is not a multiple of its row width".into(),
            )
            .into());
        }
        if ids.len() / sequence_length != labels.len() / num_classes {
            return Err(PipelineError::InvalidDataset(format!(
                "{} input rows but {} label rows",
                ids.len() / sequence_length,
                labels.len() / num_classes
            ))
            .into());
        }
        Ok(Self { ids, labels, sequence_length, num_classes })
    }

    /// An empty dataset with the same row widths as `self`.
    pub fn empty_like(&self) -> Self {
        Self {
            ids:             Vec::new(),
            labels:          Vec::new(),
            sequence_length: self.sequence_length,
            num_classes:     self.num_classes,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len() / self.sequence_length
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[cfg(test)]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    #[cfg(test)]
    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    pub fn row_ids(&self, row: usize) -> &[u32] {
        &self.ids[row * self.sequence_length..(row + 1) * self.sequence_length]
    }

    pub fn row_label(&self, row: usize) -> &[f32] {
        &self.labels[row * self.num_classes..(row + 1) * self.num_classes]
    }

    /// Class index of a row: position of the largest label entry.
    pub fn row_class(&self, row: usize) -> usize {
        self.row_label(row)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    /// Gather rows in the order given by `indices`.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut ids    = Vec::with_capacity(indices.len() * self.sequence_length);
        let mut labels = Vec::with_capacity(indices.len() * self.num_classes);
        for &i in indices {
            ids.extend_from_slice(self.row_ids(i));
            labels.extend_from_slice(self.row_label(i));
        }
        Self { ids, labels, ..self.empty_like() }
    }

    /// Consume the dataset, returning rows `[0, mid)` and `[mid, N)`.
    pub fn split_at(mut self, mid: usize) -> (Self, Self) {
        let tail_ids    = self.ids.split_off(mid * self.sequence_length);
        let tail_labels = self.labels.split_off(mid * self.num_classes);
        let tail = Self { ids: tail_ids, labels: tail_labels, ..self.empty_like() };
        (self, tail)
    }
}

/// Pretrained vectors aligned by vocabulary id: row `i` belongs to token id `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    pub vocab_size: usize,
    pub dimension:  usize,
    pub values:     Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn shape(&self) -> [usize; 2] {
        [self.vocab_size, self.dimension]
    }

    #[cfg(test)]
    pub fn row(&self, id: usize) -> &[f32] {
        &self.values[id * self.dimension..(id + 1) * self.dimension]
    }
}
