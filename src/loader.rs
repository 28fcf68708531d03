//! Loading of run-time artifacts: dataset metadata, network models and
//! reweighting tables. Everything here runs once, before the event loop.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::histogram::Histogram2D;
use crate::network::DenseNetwork;
use crate::transform::nn_score::FoldModels;

#[derive(Deserialize)]
struct DatasetEntry {
    year: u16,
}

fn read_artifact(what: &'static str, path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::NotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}

/// Data-taking year of the dataset `nickname`.
///
/// The datasets file maps nicknames to metadata objects carrying at least an
/// integer `year`.
pub fn load_dataset_year(datasets: &Path, nickname: &str) -> Result<u16> {
    let text = read_artifact("datasets file", datasets)?;
    let mut entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(&text)?;
    let entry = entries.remove(nickname).ok_or_else(|| {
        Error::Config(format!(
            "dataset '{nickname}' is not listed in {}",
            datasets.display()
        ))
    })?;
    let DatasetEntry { year } = serde_json::from_value(entry)?;
    info!(nickname, year, "resolved dataset year");
    Ok(year)
}

pub fn network_model_path(dir: &Path, year: u16, channel: &str, fold: u8) -> PathBuf {
    dir.join(year.to_string())
        .join(channel)
        .join(format!("fold{fold}_lwtnn.json"))
}

pub fn load_network_file(path: &Path) -> Result<DenseNetwork> {
    let text = read_artifact("network model", path)?;
    let network = DenseNetwork::from_json(&text)?;
    info!(model = %path.display(), "loaded network model");
    Ok(network)
}

/// Classifier model of one fold for a year and channel.
pub fn load_network_model(dir: &Path, year: u16, channel: &str, fold: u8) -> Result<DenseNetwork> {
    load_network_file(&network_model_path(dir, year, channel, fold))
}

/// Both fold models of the classifier for a year and channel.
pub fn load_fold_models(dir: &Path, year: u16, channel: &str) -> Result<FoldModels> {
    let fold0 = load_network_model(dir, year, channel, 0)?;
    let fold1 = load_network_model(dir, year, channel, 1)?;
    FoldModels::new(Box::new(fold0), Box::new(fold1))
}

pub fn load_recoil_model(dir: &Path) -> Result<DenseNetwork> {
    load_network_file(&dir.join("NNrecoil").join("NNrecoil_lwtnn.json"))
}

pub fn reweight_table_path(dir: &Path, year: u16) -> PathBuf {
    dir.join(format!("zpt_weights_{year}_kit.json"))
}

pub fn load_reweight_table(dir: &Path, year: u16) -> Result<Histogram2D> {
    let path = reweight_table_path(dir, year);
    let text = read_artifact("reweighting table", &path)?;
    let table: Histogram2D = serde_json::from_str(&text)?;
    table.validate()?;
    info!(
        table = %path.display(),
        x_max = table.x_max(),
        y_max = table.y_max(),
        "loaded reweighting table"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Inference;

    const NET: &str = r#"{
        "inputs": [{"name": "pt_1"}],
        "layers": [{"architecture": "dense", "activation": "sigmoid",
                    "weights": [1.0], "bias": [0.0]}],
        "outputs": ["signal"]
    }"#;

    #[test]
    fn dataset_year_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datasets.json");
        fs::write(
            &path,
            r#"{"DYJets": {"year": 2017, "xsec": 6077.22}, "Data": {"era": "B"}}"#,
        )
        .unwrap();
        assert_eq!(load_dataset_year(&path, "DYJets").unwrap(), 2017);
        assert!(matches!(load_dataset_year(&path, "WJets"), Err(Error::Config(_))));
        assert!(matches!(load_dataset_year(&path, "Data"), Err(Error::Json(_))));
        assert!(matches!(
            load_dataset_year(&dir.path().join("missing.json"), "DYJets"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn fold_models_from_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        for fold in 0..2 {
            let path = network_model_path(dir.path(), 2018, "tt", fold);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, NET).unwrap();
        }
        let models = load_fold_models(dir.path(), 2018, "tt").unwrap();
        assert_eq!(models.output_labels(), &["signal".to_string()]);
        assert!(matches!(
            load_fold_models(dir.path(), 2018, "mt"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn recoil_model_location() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("NNrecoil")).unwrap();
        fs::write(dir.path().join("NNrecoil/NNrecoil_lwtnn.json"), NET).unwrap();
        let net = load_recoil_model(dir.path()).unwrap();
        assert_eq!(net.input_names(), &["pt_1".to_string()]);
    }

    #[test]
    fn reweight_table_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            reweight_table_path(dir.path(), 2016),
            r#"{"x_edges": [50, 100, 200], "y_edges": [0, 100, 1000],
                "contents": [[1.0, 1.1], [0.9, 0.8]]}"#,
        )
        .unwrap();
        let table = load_reweight_table(dir.path(), 2016).unwrap();
        assert_eq!(table.x_max(), 200.0);

        fs::write(
            reweight_table_path(dir.path(), 2017),
            r#"{"x_edges": [50, 100], "y_edges": [0, 100], "contents": [[1.0, 2.0]]}"#,
        )
        .unwrap();
        assert!(matches!(load_reweight_table(dir.path(), 2017), Err(Error::Config(_))));
    }
}
