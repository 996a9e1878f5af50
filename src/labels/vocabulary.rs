use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

/// Ordered class names. Position `i` names classifier output `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("label vocabulary is empty"));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for (index, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(anyhow!("label vocabulary entry {} is blank", index));
            }
            if !seen.insert(label.as_str()) {
                return Err(anyhow!(
                    "label vocabulary entry {} duplicates '{}'",
                    index,
                    label
                ));
            }
        }
        Ok(Self { labels })
    }

    /// Parse newline-delimited labels.
    ///
    /// A trailing newline at end of input is ignored; a blank line anywhere
    /// else is rejected because it would shift every later index.
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        if labels.last().is_some_and(|last| last.is_empty()) {
            labels.pop();
        }
        Self::new(labels)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label vocabulary {}", path.display()))?;
        let vocabulary = Self::parse(&text)
            .with_context(|| format!("invalid label vocabulary {}", path.display()))?;
        log::info!(
            "loaded {} labels from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Check the vocabulary against a classifier's output width.
    pub fn ensure_width(&self, num_classes: usize) -> Result<()> {
        if self.labels.len() != num_classes {
            return Err(anyhow!(
                "label vocabulary has {} entries but classifier outputs {} classes",
                self.labels.len(),
                num_classes
            ));
        }
        Ok(())
    }
}
