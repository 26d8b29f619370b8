//! Categorical encoding with a fitted vocabulary

use crate::error::{ChurnError, Result};
use crate::utils::frame::{numeric_values, require_column, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Type of encoder to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderType {
    /// One indicator column per category
    #[default]
    OneHot,
    /// Integer codes in first-seen order. Imposes an arbitrary order on
    /// non-ordinal categories.
    Label,
}

/// Which rows the vocabulary is learned from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyPolicy {
    /// Learn on the train split, reject unseen values elsewhere
    #[default]
    FitOnTrain,
    /// Learn on the whole dataset before splitting
    FitOnFull,
}

/// Categorical encoder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    pub encoder_type: EncoderType,
    pub vocabulary: VocabularyPolicy,
}

/// Ordered categories of one source column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnVocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl ColumnVocabulary {
    pub fn indicator_name(&self, category: &str) -> String {
        format!("{}_{}", self.column, category)
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| self.indicator_name(c))
            .collect()
    }

    fn code_of(&self, value: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == value)
    }

    fn codes(&self, values: &[Option<String>]) -> Result<Vec<usize>> {
        values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let v = v.as_deref().ok_or_else(|| {
                    ChurnError::DataIntegrity(format!(
                        "column '{}' is missing at row {}",
                        self.column, row
                    ))
                })?;
                self.code_of(v).ok_or_else(|| ChurnError::UnseenCategory {
                    column: self.column.clone(),
                    value: v.to_string(),
                })
            })
            .collect()
    }
}

/// Categorical encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    encoder_type: EncoderType,
    exclude: Vec<String>,
    vocabularies: Vec<ColumnVocabulary>,
    is_fitted: bool,
}

impl CategoricalEncoder {
    pub fn new(encoder_type: EncoderType) -> Self {
        Self {
            encoder_type,
            exclude: Vec::new(),
            vocabularies: Vec::new(),
            is_fitted: false,
        }
    }

    /// Skip a text column (typically the target)
    pub fn with_excluded(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }

    pub fn encoder_type(&self) -> EncoderType {
        self.encoder_type
    }

    pub fn vocabularies(&self) -> &[ColumnVocabulary] {
        &self.vocabularies
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learn the vocabulary of every text column in `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut vocabularies = Vec::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if column.dtype() != &DataType::String || self.exclude.contains(&name) {
                continue;
            }

            let values = text_values(df, &name)?;
            let mut categories: Vec<String> = Vec::new();
            for (row, v) in values.iter().enumerate() {
                let v = v.as_ref().ok_or_else(|| {
                    ChurnError::DataIntegrity(format!(
                        "column '{}' is missing at row {}",
                        name, row
                    ))
                })?;
                if !categories.contains(v) {
                    categories.push(v.clone());
                }
            }
            if self.encoder_type == EncoderType::OneHot {
                categories.sort();
            }

            debug!(column = %name, categories = categories.len(), "Fitted vocabulary");
            vocabularies.push(ColumnVocabulary {
                column: name,
                categories,
            });
        }

        self.vocabularies = vocabularies;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode with the fitted vocabulary.
    ///
    /// One-hot indicators are appended after the remaining columns in source
    /// column order. Values outside the vocabulary fail with
    /// [`ChurnError::UnseenCategory`].
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::NotFitted);
        }

        for column in df.get_columns() {
            let name = column.name().as_str();
            let known = self.vocabularies.iter().any(|v| v.column == name);
            if column.dtype() == &DataType::String
                && !known
                && !self.exclude.iter().any(|e| e == name)
            {
                return Err(ChurnError::Schema(format!(
                    "text column '{}' has no fitted vocabulary",
                    name
                )));
            }
        }

        let mut out = df.clone();
        let mut indicators: Vec<Series> = Vec::new();

        for vocab in &self.vocabularies {
            let column = require_column(df, &vocab.column)?;
            if column.dtype() != &DataType::String {
                return Err(ChurnError::Schema(format!(
                    "column '{}' is {:?}, expected text",
                    vocab.column,
                    column.dtype()
                )));
            }
            let codes = vocab.codes(&text_values(df, &vocab.column)?)?;

            match self.encoder_type {
                EncoderType::OneHot => {
                    out = out.drop(&vocab.column)?;
                    for (k, category) in vocab.categories.iter().enumerate() {
                        let flags: Vec<i32> = codes.iter().map(|&c| i32::from(c == k)).collect();
                        indicators.push(Series::new(vocab.indicator_name(category).into(), flags));
                    }
                }
                EncoderType::Label => {
                    let labels: Vec<i32> = codes.iter().map(|&c| c as i32).collect();
                    out.with_column(Series::new(vocab.column.as_str().into(), labels))?;
                }
            }
        }

        for series in indicators {
            out.with_column(series)?;
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Recover the original categories of `column` from an encoded frame
    pub fn decode(&self, df: &DataFrame, column: &str) -> Result<Vec<String>> {
        let vocab = self
            .vocabularies
            .iter()
            .find(|v| v.column == column)
            .ok_or_else(|| ChurnError::Schema(format!("no vocabulary for column '{}'", column)))?;

        match self.encoder_type {
            EncoderType::Label => numeric_values(df, column)?
                .into_iter()
                .enumerate()
                .map(|(row, code)| {
                    code.and_then(|c| vocab.categories.get(c as usize).cloned())
                        .ok_or_else(|| {
                            ChurnError::DataIntegrity(format!(
                                "invalid code for column '{}' at row {}",
                                column, row
                            ))
                        })
                })
                .collect(),
            EncoderType::OneHot => {
                let flags = vocab
                    .indicator_names()
                    .iter()
                    .map(|name| numeric_values(df, name))
                    .collect::<Result<Vec<_>>>()?;

                (0..df.height())
                    .map(|row| {
                        let hot: Vec<usize> = flags
                            .iter()
                            .enumerate()
                            .filter(|(_, f)| f[row] == Some(1.0))
                            .map(|(k, _)| k)
                            .collect();
                        match hot.as_slice() {
                            [k] => Ok(vocab.categories[*k].clone()),
                            _ => Err(ChurnError::DataIntegrity(format!(
                                "row {} has {} active indicators for '{}'",
                                row,
                                hot.len(),
                                column
                            ))),
                        }
                    })
                    .collect()
            }
        }
    }
}
