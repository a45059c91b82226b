use crate::error::{GatewayError, GatewayResult};
use crate::image_tensor::{ImageTensor, Nested};
use anyhow::{Context, bail, ensure};
use ndarray::Array2;
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Crop name to the index the model was trained with. Order follows the source file.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndexTable {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoryIndexTable {
    /// Parse `name:index` lines. Blank lines are skipped; anything else malformed is an error.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut table = CategoryIndexTable::default();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, idx)) = line.rsplit_once(':') else {
                bail!("line {}: expected 'name:index', got {:?}", lineno + 1, line);
            };
            let name = name.trim();
            let idx: u32 = idx
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid index {:?}", lineno + 1, idx))?;
            if name.is_empty() {
                bail!("line {}: empty category name", lineno + 1);
            }
            if table.index.insert(name.to_string(), idx).is_some() {
                bail!("line {}: duplicate category {:?}", lineno + 1, name);
            }
            table.names.push(name.to_string());
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read category index {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse category index {}", path.display()))
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Disease labels, parallel to the backend's score vector.
#[derive(Debug, Clone, Default)]
pub struct LabelList(Vec<String>);

impl LabelList {
    /// One label per line, trimmed. Blank lines stay as empty labels so every
    /// position keeps lining up with the score it names.
    pub fn parse(content: &str) -> Self {
        LabelList(content.lines().map(|l| l.trim().to_string()).collect())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lookup tables loaded once at startup and never mutated.
#[derive(Debug, Default)]
pub struct ModelTables {
    pub categories: CategoryIndexTable,
    pub labels: LabelList,
}

impl ModelTables {
    pub fn new(categories: CategoryIndexTable, labels: LabelList) -> Arc<Self> {
        Arc::new(ModelTables { categories, labels })
    }

    pub fn load(
        category_index_path: impl AsRef<Path>,
        labels_path: impl AsRef<Path>,
    ) -> anyhow::Result<Arc<Self>> {
        let category_index_path = category_index_path.as_ref();
        let categories = CategoryIndexTable::load(category_index_path)?;
        ensure!(
            !categories.is_empty(),
            "category index {} has no entries",
            category_index_path.display()
        );
        let labels = LabelList::load(labels_path)?;
        if labels.is_empty() {
            log::warn!("Disease label file is empty");
        }
        log::info!(
            "Loaded {} categories and {} disease labels",
            categories.len(),
            labels.len()
        );
        Ok(Self::new(categories, labels))
    }
}

/// The `(1, 1)` category index input.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTensor(Array2<i64>);

impl CategoryTensor {
    pub fn new(index: u32) -> Self {
        CategoryTensor(Array2::from_elem((1, 1), i64::from(index)))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn index(&self) -> i64 {
        self.0[[0, 0]]
    }
}

impl Serialize for CategoryTensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Nested(self.0.view().into_dyn()).serialize(serializer)
    }
}

/// Resolve `crop_type` against the table, pairing it with the already-built image batch.
///
/// Matching is exact and case-sensitive. A miss reports every valid name.
pub fn resolve(
    table: &CategoryIndexTable,
    image: ImageTensor,
    crop_type: &str,
) -> GatewayResult<(ImageTensor, CategoryTensor)> {
    match table.get(crop_type) {
        Some(idx) => Ok((image, CategoryTensor::new(idx))),
        None => Err(GatewayError::UnknownCategory {
            name: crop_type.to_string(),
            valid: table.names().to_vec(),
        }),
    }
}
