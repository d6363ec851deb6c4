// ============================================================
// Layer 6 — Pipeline Configuration (config.yml)
// ============================================================
// The YAML file names the corpus and the pretrained embedding
// to use, plus the per-variant settings of each:
//
//   word_embeddings:
//     default: word2vec            # or glove, none, ~
//     word2vec: { path: ..., dimension: 300, binary: true }
//     glove:    { path: ..., dimension: 100 }
//   datasets:
//     default: 20newsgroup         # or mrpolarity, localdata
//     mrpolarity:
//       positive_data_file: { path: ... }
//       negative_data_file: { path: ... }
//     20newsgroup: { categories: [...], shuffle: true, random_state: 42 }
//     localdata:   { container_path: ..., categories: ~, shuffle: true, random_state: 42 }
//
// `resolve` turns the string selectors into the closed enums
// DatasetSource / EmbeddingSource exactly once. Unknown names
// fail there, before the pipeline touches the filesystem.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::{Path, PathBuf}, str::FromStr};

use crate::data::loader::{CategoryDirLoader, MrPolarityLoader};
use crate::data::vocabulary::Vocabulary;
use crate::domain::corpus::Corpus;
use crate::domain::encoded::EmbeddingMatrix;
use crate::domain::traits::CorpusSource;
use crate::error::PipelineError;
use crate::infra::embeddings;

/// Where the 20 Newsgroups "bydate" training split is expected by default.
pub const DEFAULT_NEWSGROUP_PATH: &str = "data/20news-bydate/20news-bydate-train";

// ─── Raw YAML shape ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    pub datasets: DatasetsSection,
    #[serde(default)]
    pub word_embeddings: EmbeddingsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsSection {
    pub default: String,
    pub mrpolarity: Option<MrPolaritySection>,
    #[serde(rename = "20newsgroup")]
    pub newsgroup: Option<CategorySection>,
    pub localdata: Option<CategorySection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MrPolaritySection {
    pub positive_data_file: DataFile,
    pub negative_data_file: DataFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataFile {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySection {
    pub container_path: Option<PathBuf>,
    pub categories:     Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingsSection {
    pub default:  Option<String>,
    pub word2vec: Option<Word2VecSection>,
    pub glove:    Option<GloveSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Word2VecSection {
    pub path:      PathBuf,
    pub dimension: usize,
    #[serde(default = "default_true")]
    pub binary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GloveSection {
    pub path:      PathBuf,
    pub dimension: usize,
}

fn default_true() -> bool {
    true
}

fn default_random_state() -> u64 {
    42
}

impl PipelineFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("Cannot parse config file '{}'", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Resolve both selectors. With `enable_embeddings == false` the
    /// embedding selector is ignored and no embedding is used.
    pub fn resolve(&self, enable_embeddings: bool) -> Result<ResolvedPipeline> {
        let dataset   = self.resolve_dataset()?;
        let embedding = if enable_embeddings {
            self.resolve_embedding()?
        } else {
            EmbeddingSource::None
        };
        Ok(ResolvedPipeline { dataset, embedding })
    }

    fn resolve_dataset(&self) -> Result<DatasetSource> {
        let ds = &self.datasets;
        let source = match ds.default.parse::<DatasetName>()? {
            DatasetName::MrPolarity => {
                let s = ds.mrpolarity.as_ref().ok_or_else(|| missing("datasets.mrpolarity"))?;
                DatasetSource::MrPolarity {
                    positive: s.positive_data_file.path.clone(),
                    negative: s.negative_data_file.path.clone(),
                }
            }
            DatasetName::NewsGroups => {
                let s = ds.newsgroup.as_ref().ok_or_else(|| missing("datasets.20newsgroup"))?;
                DatasetSource::NewsGroups(CategoryOptions::from_section(
                    s,
                    s.container_path.clone().unwrap_or_else(|| DEFAULT_NEWSGROUP_PATH.into()),
                ))
            }
            DatasetName::LocalData => {
                let s = ds.localdata.as_ref().ok_or_else(|| missing("datasets.localdata"))?;
                let container = s
                    .container_path
                    .clone()
                    .ok_or_else(|| missing("datasets.localdata.container_path"))?;
                DatasetSource::LocalData(CategoryOptions::from_section(s, container))
            }
        };
        Ok(source)
    }

    fn resolve_embedding(&self) -> Result<EmbeddingSource> {
        let we = &self.word_embeddings;
        let name = match we.default.as_deref() {
            None => return Ok(EmbeddingSource::None),
            Some(s) => s.parse::<EmbeddingName>()?,
        };
        let source = match name {
            EmbeddingName::None => EmbeddingSource::None,
            EmbeddingName::Word2Vec => {
                let s = we.word2vec.as_ref().ok_or_else(|| missing("word_embeddings.word2vec"))?;
                EmbeddingSource::Word2Vec {
                    path:      s.path.clone(),
                    dimension: s.dimension,
                    binary:    s.binary,
                }
            }
            EmbeddingName::Glove => {
                let s = we.glove.as_ref().ok_or_else(|| missing("word_embeddings.glove"))?;
                EmbeddingSource::Glove { path: s.path.clone(), dimension: s.dimension }
            }
        };
        Ok(source)
    }
}

fn missing(section: &str) -> PipelineError {
    PipelineError::MissingSection(section.to_string())
}

// ─── Selectors ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetName {
    MrPolarity,
    NewsGroups,
    LocalData,
}

impl FromStr for DatasetName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mrpolarity"  => Ok(Self::MrPolarity),
            "20newsgroup" => Ok(Self::NewsGroups),
            "localdata"   => Ok(Self::LocalData),
            other => Err(PipelineError::UnknownDataset(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MrPolarity => "mrpolarity",
            Self::NewsGroups => "20newsgroup",
            Self::LocalData  => "localdata",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingName {
    None,
    Word2Vec,
    Glove,
}

impl FromStr for EmbeddingName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "None" => Ok(Self::None),
            "word2vec"      => Ok(Self::Word2Vec),
            "glove"         => Ok(Self::Glove),
            other => Err(PipelineError::UnknownEmbedding(other.to_string())),
        }
    }
}

impl fmt::Display for EmbeddingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None     => "none",
            Self::Word2Vec => "word2vec",
            Self::Glove    => "glove",
        })
    }
}

// ─── Resolved sources ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ResolvedPipeline {
    pub dataset:   DatasetSource,
    pub embedding: EmbeddingSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOptions {
    pub container:    PathBuf,
    pub categories:   Option<Vec<String>>,
    pub shuffle:      bool,
    pub random_state: u64,
}

impl CategoryOptions {
    fn from_section(s: &CategorySection, container: PathBuf) -> Self {
        Self {
            container,
            categories:   s.categories.clone(),
            shuffle:      s.shuffle,
            random_state: s.random_state,
        }
    }

    fn loader(&self) -> CategoryDirLoader {
        CategoryDirLoader::new(
            self.container.clone(),
            self.categories.clone(),
            self.shuffle,
            self.random_state,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    MrPolarity { positive: PathBuf, negative: PathBuf },
    NewsGroups(CategoryOptions),
    LocalData(CategoryOptions),
}

impl DatasetSource {
    pub fn name(&self) -> DatasetName {
        match self {
            Self::MrPolarity { .. } => DatasetName::MrPolarity,
            Self::NewsGroups(_)     => DatasetName::NewsGroups,
            Self::LocalData(_)      => DatasetName::LocalData,
        }
    }
}

impl CorpusSource for DatasetSource {
    fn load(&self) -> Result<Corpus> {
        match self {
            Self::MrPolarity { positive, negative } => {
                MrPolarityLoader::new(positive.clone(), negative.clone()).load()
            }
            Self::NewsGroups(opts) | Self::LocalData(opts) => opts.loader().load(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingSource {
    None,
    Word2Vec { path: PathBuf, dimension: usize, binary: bool },
    Glove { path: PathBuf, dimension: usize },
}

impl EmbeddingSource {
    pub fn name(&self) -> EmbeddingName {
        match self {
            Self::None           => EmbeddingName::None,
            Self::Word2Vec { .. } => EmbeddingName::Word2Vec,
            Self::Glove { .. }    => EmbeddingName::Glove,
        }
    }

    /// Vector width of the configured embedding, if any.
    pub fn dimension(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Word2Vec { dimension, .. } | Self::Glove { dimension, .. } => Some(*dimension),
        }
    }

    /// Load vectors for every id of `vocab`. `Ok(None)` means no
    /// embedding is configured; a configured but unreadable file is an error.
    pub fn load(&self, vocab: &Vocabulary) -> Result<Option<EmbeddingMatrix>> {
        let matrix = match self {
            Self::None => return Ok(None),
            Self::Word2Vec { path, binary, .. } => {
                tracing::info!("Load word2vec file {}", path.display());
                embeddings::load_word2vec(vocab, path, *binary)?
            }
            Self::Glove { path, dimension } => {
                tracing::info!("Load glove file {}", path.display());
                embeddings::load_glove(vocab, path, *dimension)?
            }
        };
        Ok(Some(matrix))
    }
}
