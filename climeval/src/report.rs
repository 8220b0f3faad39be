//! Writing evaluation results to disk and rendering them for the terminal.
//!
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    dataset::AttrValue,
    errors::Result,
    load::LoadedDataset,
    netcdf::write_netcdf_file,
    results::{EvaluationResults, MetricResult, MetricValue},
};

fn output_dir(results: &EvaluationResults) -> Result<PathBuf> {
    let dir = results.config.output_dir();
    fs::create_dir_all(&dir)?;

    Ok(dir)
}

/// Write every gridded result to `<name>_<metric>.nc` and the scalar results to
/// `<name>_summary.yaml`, under the configured output directory.
///
/// Returns the paths written.
///
pub fn save_results(results: &EvaluationResults, name: &str) -> Result<Vec<PathBuf>> {
    let dir = output_dir(results)?;
    let mut written = vec![];

    for (metric, result) in &results.results {
        let Some(mut dataset) = result.value.to_dataset()? else {
            continue;
        };
        dataset
            .attrs
            .insert("metric".to_string(), AttrValue::from(metric.as_str()));
        for (key, value) in &result.metadata {
            dataset
                .attrs
                .insert(key.clone(), AttrValue::Text(value.clone()));
        }
        let path = result_path(&dir, name, metric);
        write_netcdf_file(&path, &dataset)?;
        written.push(path);
    }

    let summary = results.summary();
    if !summary.is_empty() {
        let path = dir.join(format!("{name}_summary.yaml"));
        fs::write(&path, serde_yaml::to_string(&summary)?)?;
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "Saved results");

    Ok(written)
}

/// Write the aligned datasets the metrics were computed from.
///
pub fn save_aligned(
    results: &EvaluationResults,
    name: &str,
    datasets: &[&LoadedDataset],
) -> Result<Vec<PathBuf>> {
    let dir = output_dir(results)?;
    let mut written = vec![];
    for dataset in datasets {
        let path = dir.join(format!("{name}_aligned_{}.nc", dataset.kind));
        write_netcdf_file(&path, &dataset.data)?;
        written.push(path);
    }

    Ok(written)
}

fn describe(result: &MetricResult) -> String {
    match &result.value {
        MetricValue::Scalar(value) => format!("{value:.6}"),
        MetricValue::Field(field) => {
            format!("{} {}", field.name, shape(&field.dims, field.shape()))
        }
        MetricValue::Table(table) => {
            let names: Vec<&str> = table.fields.iter().map(|f| f.name.as_str()).collect();
            match table.fields.first() {
                Some(first) => format!("{} {}", names.join("/"), shape(&first.dims, first.shape())),
                None => "empty".to_string(),
            }
        }
    }
}

fn shape(dims: &[String], sizes: &[usize]) -> String {
    let parts: Vec<String> = dims
        .iter()
        .zip(sizes)
        .map(|(dim, size)| format!("{dim}: {size}"))
        .collect();

    format!("({})", parts.join(", "))
}

/// A fixed width table of every result: name, category, kind and value (or shape).
///
pub fn render_table(results: &EvaluationResults) -> String {
    let header = ["Metric", "Category", "Kind", "Value"];
    let rows: Vec<[String; 4]> = results
        .results
        .values()
        .map(|result| {
            [
                result.name.clone(),
                result.metadata.get("category").cloned().unwrap_or_default(),
                result.value.kind().to_string(),
                describe(result),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut table = String::new();
    let mut line = |cells: [&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(table, "{}", padded.join("  ").trim_end());
    };
    line(header);
    let rule = widths.map(|width| "-".repeat(width));
    line([rule[0].as_str(), rule[1].as_str(), rule[2].as_str(), rule[3].as_str()]);
    for row in &rows {
        line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()]);
    }
    if rows.is_empty() {
        table.push_str("(no results)\n");
    }

    table
}

/// Where `save_results` writes the gridded result of `metric`
pub fn result_path(dir: &Path, name: &str, metric: &str) -> PathBuf {
    dir.join(format!("{name}_{metric}.nc"))
}
