// ============================================================
// Layer 4 — Dataset Loaders
// ============================================================
// Reads the supported corpora from disk. Each loader implements
// CorpusSource, so the pipeline only ever calls `load()`.
//
//   MrPolarityLoader  — two files, one sentence per line:
//                         positive file → class 0
//                         negative file → class 1
//
//   CategoryDirLoader — one sub-folder per class, one document
//                       per file (20 Newsgroups "bydate" layout
//                       and any local corpus in the same shape):
//
//                         container/
//                           alt.atheism/49960
//                           comp.graphics/37261
//                           ...
//
// Undecodable bytes are replaced rather than failing the load;
// the preprocessor maps the replacement char to a space anyway.

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::corpus::Corpus;
use crate::domain::traits::CorpusSource;
use crate::error::PipelineError;

// ─── MrPolarityLoader ─────────────────────────────────────────────────────────
pub struct MrPolarityLoader {
    positive: PathBuf,
    negative: PathBuf,
}

impl MrPolarityLoader {
    pub fn new(positive: impl Into<PathBuf>, negative: impl Into<PathBuf>) -> Self {
        Self { positive: positive.into(), negative: negative.into() }
    }
}

impl CorpusSource for MrPolarityLoader {
    fn load(&self) -> Result<Corpus> {
        let positive = read_lines(&self.positive)?;
        let negative = read_lines(&self.negative)?;
        tracing::info!(
            "mrpolarity: {} positive, {} negative sentences",
            positive.len(),
            negative.len()
        );

        let labels = std::iter::repeat(0)
            .take(positive.len())
            .chain(std::iter::repeat(1).take(negative.len()))
            .collect();
        let texts = positive.into_iter().chain(negative).collect();

        Corpus::new(
            texts,
            labels,
            vec!["positive_examples".into(), "negative_examples".into()],
        )
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read data file '{}'", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(|l| l.trim().to_string())
        .collect())
}

// ─── CategoryDirLoader ────────────────────────────────────────────────────────
pub struct CategoryDirLoader {
    container:    PathBuf,
    categories:   Option<Vec<String>>,
    shuffle:      bool,
    random_state: u64,
}

impl CategoryDirLoader {
    pub fn new(
        container:    impl Into<PathBuf>,
        categories:   Option<Vec<String>>,
        shuffle:      bool,
        random_state: u64,
    ) -> Self {
        Self { container: container.into(), categories, shuffle, random_state }
    }

    /// Sorted class folder names, restricted to `categories` if given.
    fn class_folders(&self) -> Result<Vec<String>> {
        let mut folders = Vec::new();
        for entry in fs::read_dir(&self.container)
            .with_context(|| format!("Cannot read directory '{}'", self.container.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                folders.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        folders.sort();

        if let Some(wanted) = &self.categories {
            if let Some(missing) = wanted.iter().find(|c| !folders.contains(c)) {
                return Err(PipelineError::InvalidDataset(format!(
                    "category '{missing}' not found under '{}'",
                    self.container.display()
                ))
                .into());
            }
            folders.retain(|f| wanted.contains(f));
        }
        Ok(folders)
    }
}

impl CorpusSource for CategoryDirLoader {
    fn load(&self) -> Result<Corpus> {
        let class_names = self.class_folders()?;
        let mut texts  = Vec::new();
        let mut labels = Vec::new();

        for (label, class) in class_names.iter().enumerate() {
            let dir = self.container.join(class);
            let mut files: Vec<PathBuf> = fs::read_dir(&dir)
                .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            files.sort();

            for path in files {
                let bytes = fs::read(&path)
                    .with_context(|| format!("Cannot read '{}'", path.display()))?;
                texts.push(String::from_utf8_lossy(&bytes).into_owned());
                labels.push(label);
            }
            tracing::debug!("Loaded class '{}' ({} documents so far)", class, texts.len());
        }

        if self.shuffle {
            let mut order: Vec<usize> = (0..texts.len()).collect();
            order.shuffle(&mut StdRng::seed_from_u64(self.random_state));
            texts  = order.iter().map(|&i| std::mem::take(&mut texts[i])).collect();
            labels = order.iter().map(|&i| labels[i]).collect();
        }

        tracing::info!(
            "Loaded {} documents in {} categories from '{}'",
            texts.len(),
            class_names.len(),
            self.container.display()
        );
        Corpus::new(texts, labels, class_names)
    }
}
