//! Data sanitization functions for text columns.

use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Trim a string column and turn blank values into nulls.
///
/// Returns the cleaned series and how many non-null values became null.
pub(crate) fn blank_strings_to_null(series: &Series) -> Result<(Series, usize)> {
    let as_strings = series.cast(&DataType::String)?;
    let str_series = as_strings.str()?;
    let mut cleaned_values: Vec<Option<String>> = Vec::with_capacity(str_series.len());
    let mut blanked = 0;

    for opt_val in str_series.into_iter() {
        match opt_val {
            Some(val) => {
                let cleaned = val.trim();
                if cleaned.is_empty() {
                    blanked += 1;
                    cleaned_values.push(None);
                } else {
                    cleaned_values.push(Some(cleaned.to_string()));
                }
            }
            None => cleaned_values.push(None),
        }
    }

    Ok((Series::new(series.name().clone(), cleaned_values), blanked))
}

/// Apply [`blank_strings_to_null`] to the named columns of a frame.
///
/// Columns that are not present are skipped.
pub(crate) fn sanitize_text_columns(mut df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    for &name in columns {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let (cleaned, blanked) = blank_strings_to_null(column.as_materialized_series())?;
        if blanked > 0 {
            debug!("Column '{}': {} blank values treated as missing", name, blanked);
        }
        df.replace(name, cleaned)?;
    }
    Ok(df)
}
