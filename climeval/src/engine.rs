//! The evaluation pipeline: load, subset, align, compute, save.
//!
use std::{collections::BTreeMap, path::PathBuf};

use tracing::{debug, info};

use crate::{
    align::align_datasets,
    config::{EvaluationConfig, MetricSpec},
    errors::Result,
    load::{load_dataset, subset_domain, DatasetKind, LoadedDataset},
    metrics::{self, Category, Operands},
    report::{save_aligned, save_results},
    results::EvaluationResults,
};

/// Drives one evaluation of a predicted dataset against a reference dataset.
///
/// The datasets the metrics were last computed from are kept so they can be saved alongside
/// the results.
///
pub struct Evaluation {
    config: EvaluationConfig,
    aligned: Option<(LoadedDataset, LoadedDataset)>,
}

impl Evaluation {
    /// Create an evaluation from a configuration, which is validated first.
    ///
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            aligned: None,
        })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// The aligned predicted and reference datasets of the last run, if there has been one
    pub fn aligned(&self) -> Option<(&LoadedDataset, &LoadedDataset)> {
        self.aligned.as_ref().map(|(pred, refr)| (pred, refr))
    }

    /// Load both datasets concurrently, cut them down to the domain and align them.
    ///
    pub async fn prepare(&self) -> Result<(LoadedDataset, LoadedDataset)> {
        let data = &self.config.data;
        let compute = &self.config.compute;
        let (predicted, reference) = futures::try_join!(
            load_dataset(&data.predicted, DatasetKind::Predicted, compute),
            load_dataset(&data.reference, DatasetKind::Reference, compute),
        )?;

        let domain = &self.config.domain;
        let predicted = LoadedDataset {
            data: subset_domain(&predicted.data, domain)?,
            ..predicted
        };
        let reference = LoadedDataset {
            data: subset_domain(&reference.data, domain)?,
            ..reference
        };

        align_datasets(&predicted, &reference)
    }

    /// Run the whole pipeline and return the computed metrics.
    ///
    pub async fn run(&mut self) -> Result<EvaluationResults> {
        info!(project = %self.config.project_name, "Starting evaluation");
        let (predicted, reference) = self.prepare().await?;
        let results = self.compute(&predicted, &reference)?;
        self.aligned = Some((predicted, reference));
        info!(results = results.len(), "Evaluation finished");

        Ok(results)
    }

    /// Compute every configured metric for every variable of the aligned datasets.
    ///
    /// Results are named `<metric>_<variable>`.
    ///
    pub fn compute(
        &self,
        predicted: &LoadedDataset,
        reference: &LoadedDataset,
    ) -> Result<EvaluationResults> {
        let mut results = EvaluationResults::new(self.config.clone());
        for (category, spec) in self.config.metrics.by_category() {
            for (name, pred) in &predicted.data.variables {
                let refr = reference.variable(name)?;
                debug!(metric = %spec.name, variable = %name, "Computing");
                let operands = Operands {
                    predicted: pred,
                    reference: refr,
                    coords: &predicted.data.coords,
                };
                let value = metrics::compute(&spec.name, &operands, &spec.params)?;
                results.add_result(
                    format!("{}_{name}", spec.name),
                    value,
                    metadata(category, spec, name)?,
                );
            }
        }

        Ok(results)
    }

    /// Write the results, and the aligned datasets when `output.save_intermediate` is set.
    ///
    /// Returns every path written.
    ///
    pub fn save(&self, results: &EvaluationResults, name: &str) -> Result<Vec<PathBuf>> {
        let mut written = save_results(results, name)?;
        if self.config.output.save_intermediate {
            if let Some((predicted, reference)) = &self.aligned {
                written.extend(save_aligned(results, name, &[predicted, reference])?);
            }
        }

        Ok(written)
    }
}

fn metadata(
    category: Category,
    spec: &MetricSpec,
    variable: &str,
) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::from([
        ("category".to_string(), category.to_string()),
        ("variable".to_string(), variable.to_string()),
    ]);
    if !spec.params.is_empty() {
        metadata.insert("params".to_string(), serde_json::to_string(&spec.params)?);
    }

    Ok(metadata)
}
