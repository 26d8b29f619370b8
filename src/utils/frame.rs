//! Column access helpers over polars frames

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Whether a dtype holds numbers
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Look up a column, mapping absence to a schema error
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ChurnError::Schema(format!("column '{}' not found", name)))
}

/// Read a numeric column as `f64` values, nulls preserved
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(ChurnError::Schema(format!(
            "column '{}' is {:?}, expected numeric",
            name,
            column.dtype()
        )));
    }

    let casted = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = casted.f64()?.into_iter().collect();
    Ok(values)
}

/// Read a text column, nulls preserved
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let ca = column.as_materialized_series().str().map_err(|_| {
        ChurnError::Schema(format!(
            "column '{}' is {:?}, expected text",
            name,
            column.dtype()
        ))
    })?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Select rows by position, preserving the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Extract named columns into a row-major matrix.
///
/// Nulls and non-finite values are rejected: estimators only see complete data.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| {
            numeric_values(df, name)?
                .into_iter()
                .enumerate()
                .map(|(row, v)| match v {
                    Some(x) if x.is_finite() => Ok(x),
                    _ => Err(ChurnError::DataIntegrity(format!(
                        "column '{}' has a missing or non-finite value at row {}",
                        name, row
                    ))),
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| col_data[j][i]))
}

/// Extract a {0,1} label column
pub fn target_array(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    numeric_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(x) if x == 0.0 || x == 1.0 => Ok(x),
            Some(x) => Err(ChurnError::DataIntegrity(format!(
                "label '{}' must be 0 or 1, found {} at row {}",
                name, x, row
            ))),
            None => Err(ChurnError::DataIntegrity(format!(
                "label '{}' is missing at row {}",
                name, row
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "tenure" => &[1i64, 12, 40],
            "MonthlyCharges" => &[29.85, 56.95, 42.30],
            "Contract" => &["Month-to-month", "One year", "Month-to-month"],
            "Churn" => &[1i32, 0, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_values_casts_integers() {
        let df = frame();
        let values = numeric_values(&df, "tenure").unwrap();
        assert_eq!(values, vec![Some(1.0), Some(12.0), Some(40.0)]);
    }

    #[test]
    fn test_numeric_values_rejects_text() {
        let df = frame();
        assert!(matches!(
            numeric_values(&df, "Contract"),
            Err(ChurnError::Schema(_))
        ));
        assert!(matches!(
            numeric_values(&df, "missing"),
            Err(ChurnError::Schema(_))
        ));
    }

    #[test]
    fn test_columns_to_array2() {
        let df = frame();
        let x = columns_to_array2(&df, &["tenure".to_string(), "MonthlyCharges".to_string()]).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert_eq!(x[[1, 0]], 12.0);
        assert_eq!(x[[2, 1]], 42.30);
    }

    #[test]
    fn test_columns_to_array2_rejects_nulls() {
        let df = df!("a" => &[Some(1.0), None]).unwrap();
        assert!(matches!(
            columns_to_array2(&df, &["a".to_string()]),
            Err(ChurnError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_take_rows_preserves_order() {
        let df = frame();
        let taken = take_rows(&df, &[2, 0]).unwrap();
        assert_eq!(numeric_values(&taken, "tenure").unwrap(), vec![Some(40.0), Some(1.0)]);
    }

    #[test]
    fn test_target_array() {
        let df = frame();
        let y = target_array(&df, "Churn").unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 0.0]);
    }
}
