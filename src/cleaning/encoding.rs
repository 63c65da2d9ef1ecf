//! Category to integer encodings retained between training and inference.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::UnseenCategoryPolicy;
use crate::error::{Result, RiskError};

/// Code assigned to categories that were not observed while fitting
pub const UNKNOWN_CODE: i64 = -1;

/// Bijection between the observed values of one column and `0..k`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    categories: Vec<String>,
    codes: FxHashMap<String, i64>,
}

impl CategoryEncoding {
    /// Assign codes in first-seen order
    pub fn fit<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Self {
        let mut encoding = Self::default();
        for value in values {
            if !encoding.codes.contains_key(value) {
                let code = encoding.categories.len() as i64;
                encoding.codes.insert(value.to_string(), code);
                encoding.categories.push(value.to_string());
            }
        }
        encoding
    }

    /// Code of a value, if it was observed while fitting
    #[must_use]
    pub fn code(&self, value: &str) -> Option<i64> {
        self.codes.get(value).copied()
    }

    /// Value for a code, if the code is assigned
    #[must_use]
    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.categories.get(idx))
            .map(String::as_str)
    }

    /// Observed categories in code order
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of distinct categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether no category was observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Encodings for every categorical column seen by a cleaner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingState {
    columns: FxHashMap<String, CategoryEncoding>,
}

impl EncodingState {
    /// Encoding of one column
    #[must_use]
    pub fn encoding(&self, column: &str) -> Option<&CategoryEncoding> {
        self.columns.get(column)
    }

    /// Whether a column has a fitted encoding
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Names of encoded columns, sorted
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether any column is encoded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fit (or refit) the encoding of one column
    pub fn fit_column(&mut self, column: &str, values: &[String]) -> &CategoryEncoding {
        let encoding = CategoryEncoding::fit(values.iter().map(String::as_str));
        self.columns.insert(column.to_string(), encoding);
        &self.columns[column]
    }

    /// Encode values of a column with its fitted mapping
    ///
    /// Values without a code follow `policy`. A column that was never fitted
    /// treats every value as unseen.
    ///
    /// # Returns
    /// The codes and the number of unseen values encountered
    ///
    /// # Errors
    /// Returns [`RiskError::UnseenCategory`] under [`UnseenCategoryPolicy::Reject`]
    pub fn encode(
        &self,
        column: &str,
        values: &[String],
        policy: UnseenCategoryPolicy,
    ) -> Result<(Vec<f64>, usize)> {
        let encoding = self.columns.get(column);
        let mut unseen = 0;
        let codes = values
            .iter()
            .map(|value| match encoding.and_then(|e| e.code(value)) {
                Some(code) => Ok(code as f64),
                None => match policy {
                    UnseenCategoryPolicy::UnknownCode => {
                        unseen += 1;
                        Ok(UNKNOWN_CODE as f64)
                    }
                    UnseenCategoryPolicy::Reject => Err(RiskError::UnseenCategory {
                        column: column.to_string(),
                        value: value.clone(),
                    }),
                },
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((codes, unseen))
    }
}
