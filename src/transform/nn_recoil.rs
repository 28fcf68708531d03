//! Hadronic recoil regression from several missing-energy definitions.

use super::{EventTransform, OutputColumn, OutputRecord};
use crate::error::{KernelError, Result};
use crate::kinematics::polar_xy;
use crate::network::{resolve_inputs, Inference};
use crate::table::{ColumnId, ColumnType, Row, RowSource};

/// MET definitions by column prefix.
pub const MET_DEFINITIONS: [&str; 6] = ["", "track", "nopu", "pucor", "pu", "puppi"];

/// The pile-up MET does not contain the di-tau leptons.
const PILEUP_DEFINITION: &str = "pu";

struct MetColumns {
    subtract_leptons: bool,
    met: ColumnId,
    metphi: ColumnId,
    sumet: ColumnId,
}

pub struct NnRecoilRegressor {
    network: Box<dyn Inference>,
    feature_order: Vec<usize>,
    mets: Vec<MetColumns>,
    npv: ColumnId,
    pt: [ColumnId; 2],
    phi: [ColumnId; 2],
    columns: Vec<OutputColumn>,
}

/// Feature names in computation order: `{def}metpx`, `{def}metpy`,
/// `{def}metsumet` per definition, then `npv`.
fn feature_names() -> Vec<String> {
    let mut names: Vec<String> = MET_DEFINITIONS
        .iter()
        .flat_map(|def| [format!("{def}metpx"), format!("{def}metpy"), format!("{def}metsumet")])
        .collect();
    names.push("npv".to_string());
    names
}

impl NnRecoilRegressor {
    pub fn bind(source: &mut RowSource, channel: &str, network: Box<dyn Inference>) -> Result<Self> {
        let feature_order = resolve_inputs(network.as_ref(), &feature_names())?;
        let mut mets = Vec::with_capacity(MET_DEFINITIONS.len());
        for def in MET_DEFINITIONS {
            mets.push(MetColumns {
                subtract_leptons: def != PILEUP_DEFINITION,
                met: source.bind(&format!("{def}met"), ColumnType::F32)?,
                metphi: source.bind(&format!("{def}metphi"), ColumnType::F32)?,
                sumet: source.bind(&format!("{def}metsumet"), ColumnType::F32)?,
            });
        }
        let columns = network
            .output_labels()
            .iter()
            .map(|label| OutputColumn::float(format!("{channel}_{label}")))
            .collect();
        Ok(Self {
            feature_order,
            mets,
            npv: source.bind("npv", ColumnType::U64)?,
            pt: [
                source.bind("pt_1", ColumnType::F32)?,
                source.bind("pt_2", ColumnType::F32)?,
            ],
            phi: [
                source.bind("phi_1", ColumnType::F32)?,
                source.bind("phi_2", ColumnType::F32)?,
            ],
            network,
            columns,
        })
    }

    fn features(&self, row: &Row) -> Vec<f64> {
        let (pt_1, pt_2) = (row.f64(self.pt[0]), row.f64(self.pt[1]));
        let (l1x, l1y) = polar_xy(pt_1, row.f64(self.phi[0]));
        let (l2x, l2y) = polar_xy(pt_2, row.f64(self.phi[1]));
        let mut features = Vec::with_capacity(self.mets.len() * 3 + 1);
        for met in &self.mets {
            let (mut x, mut y) = polar_xy(row.f64(met.met), row.f64(met.metphi));
            let mut sumet = row.f64(met.sumet);
            if met.subtract_leptons {
                x -= l1x + l2x;
                y -= l1y + l2y;
                sumet -= pt_1 + pt_2;
            }
            features.extend([x, y, sumet]);
        }
        features.push(row.u64(self.npv) as f64);
        features
    }
}

impl EventTransform for NnRecoilRegressor {
    fn name(&self) -> &'static str {
        "nn_recoil"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        let features = self.features(row);
        let inputs: Vec<f64> = self.feature_order.iter().map(|&i| features[i]).collect();
        for (i, value) in self.network.evaluate_labelled(&inputs)?.into_iter().enumerate() {
            record.set_f32(i, value as f32);
        }
        Ok(())
    }
}
