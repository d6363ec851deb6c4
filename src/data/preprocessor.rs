// ============================================================
// Layer 4 — Sentence Preprocessor
// ============================================================
// Normalises raw sentences before tokenisation, following the
// cleaning used for sentence CNNs (Kim, 2014):
//
//   1. Every character outside [A-Za-z0-9(),!?'`] becomes a space
//   2. Clitics are split off:   "it's" → "it 's", "don't" → "do n't"
//   3. Punctuation is isolated: "wow!" → "wow ! "
//   4. Runs of whitespace collapse to one space, edges trimmed
//   5. Everything is lower-cased
//
// After cleaning, whitespace tokenisation is all the vocabulary
// needs: each token is a word, a clitic or a punctuation mark.
//
// Reference: Kim (2014) Convolutional Neural Networks for
//            Sentence Classification

/// Clitics split off the preceding word, in application order.
const CLITICS: [&str; 6] = ["'s", "'ve", "n't", "'re", "'d", "'ll"];

/// Punctuation surrounded by spaces so it becomes its own token.
const ISOLATED: [char; 5] = [',', '!', '(', ')', '?'];

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean one sentence for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {
        // ── Step 1: keep only the allowed character set ───────────────────────
        let mut s: String = text
            .chars()
            .map(|c| if is_allowed(c) { c } else { ' ' })
            .collect();

        // ── Step 2: split clitics ─────────────────────────────────────────────
        for clitic in CLITICS {
            s = s.replace(clitic, &format!(" {clitic}"));
        }

        // ── Step 3: isolate punctuation ───────────────────────────────────────
        let mut spaced = String::with_capacity(s.len() + 16);
        for c in s.chars() {
            if ISOLATED.contains(&c) {
                spaced.push(' ');
                spaced.push(c);
                spaced.push(' ');
            } else {
                spaced.push(c);
            }
        }

        // ── Steps 4 + 5 ───────────────────────────────────────────────────────
        spaced
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '(' | ')' | ',' | '!' | '?' | '\'' | '`')
}
