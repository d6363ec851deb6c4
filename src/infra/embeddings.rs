// ============================================================
// Layer 6 — Pretrained Embedding Loaders
// ============================================================
// Builds a (vocab_size × dimension) matrix aligned by vocabulary
// id from a pretrained vector file.
//
// Every row starts as uniform noise in [-0.25, 0.25]; rows whose
// token appears in the file are then overwritten with the
// pretrained vector. Tokens missing from the file keep the noise.
//
// Supported formats:
//
//   word2vec binary:  "<count> <dim>\n" then, per word,
//                     "<word> " + dim little-endian f32 (+ optional "\n")
//   word2vec text:    "<count> <dim>\n" then "<word> v1 ... vdim" lines
//   GloVe text:       "<word> v1 ... vdim" lines, no header
//
// A missing file and a malformed file are different errors so
// the operator can tell "wrong path" from "corrupt download".

use anyhow::{Context, Result};
use rand::Rng;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use crate::data::vocabulary::Vocabulary;
use crate::domain::encoded::EmbeddingMatrix;
use crate::error::PipelineError;

const INIT_RANGE: f32 = 0.25;

/// Load a word2vec file in binary or text format.
pub fn load_word2vec(vocab: &Vocabulary, path: &Path, binary: bool) -> Result<EmbeddingMatrix> {
    let mut reader = open(path)?;

    let mut header = String::new();
    reader
        .read_line(&mut header)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let (count, dimension) = parse_header(&header)
        .ok_or_else(|| malformed(path, 1, format!("bad header '{}'", header.trim())))?;

    let mut matrix = random_matrix(vocab.len(), dimension);
    let mut found  = 0usize;

    if binary {
        let mut word   = Vec::new();
        let mut vector = vec![0u8; dimension * 4];
        for entry in 0..count {
            word.clear();
            let n = reader.read_until(b' ', &mut word)?;
            if n == 0 || word.last() != Some(&b' ') {
                return Err(malformed(path, entry + 2, "unexpected end of file".into()).into());
            }
            word.pop();
            let token = String::from_utf8_lossy(&word);
            let token = token.trim_start_matches('\n');

            reader
                .read_exact(&mut vector)
                .map_err(|_| malformed(path, entry + 2, format!("truncated vector for '{token}'")))?;

            if let Some(id) = vocab.id(token) {
                let row = &mut matrix.values[id as usize * dimension..(id as usize + 1) * dimension];
                for (dst, bytes) in row.iter_mut().zip(vector.chunks_exact(4)) {
                    *dst = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
                found += 1;
            }
        }
    } else {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            found += fill_row(&mut matrix, vocab, &line, path, i + 2)? as usize;
        }
    }

    tracing::info!(
        "word2vec: {} of {} vocabulary tokens found (dimension {})",
        found,
        vocab.len(),
        dimension
    );
    Ok(matrix)
}

/// Load a GloVe text file with vectors of width `dimension`.
pub fn load_glove(vocab: &Vocabulary, path: &Path, dimension: usize) -> Result<EmbeddingMatrix> {
    let reader     = open(path)?;
    let mut matrix = random_matrix(vocab.len(), dimension);
    let mut found  = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        found += fill_row(&mut matrix, vocab, &line, path, i + 1)? as usize;
    }

    tracing::info!(
        "glove: {} of {} vocabulary tokens found (dimension {})",
        found,
        vocab.len(),
        dimension
    );
    Ok(matrix)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(PipelineError::EmbeddingMissing(path.to_path_buf()).into());
    }
    let file = File::open(path)
        .with_context(|| format!("Cannot open embedding file '{}'", path.display()))?;
    Ok(BufReader::new(file))
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let count     = parts.next()?.parse().ok()?;
    let dimension = parts.next()?.parse().ok()?;
    (dimension > 0).then_some((count, dimension))
}

fn random_matrix(vocab_size: usize, dimension: usize) -> EmbeddingMatrix {
    let mut rng = rand::thread_rng();
    let values  = (0..vocab_size * dimension)
        .map(|_| rng.gen_range(-INIT_RANGE..=INIT_RANGE))
        .collect();
    EmbeddingMatrix { vocab_size, dimension, values }
}

/// Parse one "<word> v1 ... vd" line and copy the vector into the
/// token's row. Returns whether the token is in the vocabulary.
fn fill_row(
    matrix: &mut EmbeddingMatrix,
    vocab:  &Vocabulary,
    line:   &str,
    path:   &Path,
    lineno: usize,
) -> Result<bool> {
    let mut fields = line.split_whitespace();
    let token = fields.next().unwrap_or_default();
    let Some(id) = vocab.id(token) else {
        return Ok(false);
    };

    let values: Vec<f32> = fields
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| malformed(path, lineno, format!("bad number: {e}")))?;
    if values.len() != matrix.dimension {
        return Err(malformed(
            path,
            lineno,
            format!("expected {} values, found {}", matrix.dimension, values.len()),
        )
        .into());
    }

    let d = matrix.dimension;
    matrix.values[id as usize * d..(id as usize + 1) * d].copy_from_slice(&values);
    Ok(true)
}

fn malformed(path: &Path, line: usize, reason: String) -> PipelineError {
    PipelineError::EmbeddingMalformed { path: path.to_path_buf(), line, reason }
}
