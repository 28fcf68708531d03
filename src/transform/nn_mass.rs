//! Regression of the generator-level tau momenta with a neural network.

use super::{EventTransform, OutputColumn, OutputRecord};
use crate::error::{KernelError, Result};
use crate::kinematics::{polar_xy, FourVector, TAU_MASS};
use crate::network::{resolve_inputs, resolve_outputs, Inference};
use crate::table::{ColumnId, ColumnType, Row, RowSource};

/// Features the network may request, in the order they are computed.
const FEATURES: [&str; 10] = [
    "t1_rec_px",
    "t1_rec_py",
    "t1_rec_pz",
    "t1_rec_e",
    "t2_rec_px",
    "t2_rec_py",
    "t2_rec_pz",
    "t2_rec_e",
    "met_rec_px",
    "met_rec_py",
];

const TARGETS: [&str; 6] = [
    "t1_gen_px",
    "t1_gen_py",
    "t1_gen_pz",
    "t2_gen_px",
    "t2_gen_py",
    "t2_gen_pz",
];

pub struct NnMassRegressor {
    network: Box<dyn Inference>,
    feature_order: Vec<usize>,
    target_index: Vec<usize>,
    leptons: [[ColumnId; 4]; 2],
    met: ColumnId,
    metphi: ColumnId,
    columns: Vec<OutputColumn>,
}

impl NnMassRegressor {
    pub fn bind(source: &mut RowSource, network: Box<dyn Inference>) -> Result<Self> {
        let feature_order = resolve_inputs(network.as_ref(), &FEATURES)?;
        let target_index = resolve_outputs(network.as_ref(), &TARGETS)?;
        let mut leptons = [[ColumnId(0); 4]; 2];
        for (i, ids) in leptons.iter_mut().enumerate() {
            let n = i + 1;
            *ids = [
                source.bind(&format!("pt_{n}"), ColumnType::F32)?,
                source.bind(&format!("eta_{n}"), ColumnType::F32)?,
                source.bind(&format!("phi_{n}"), ColumnType::F32)?,
                source.bind(&format!("m_{n}"), ColumnType::F32)?,
            ];
        }
        let mut columns = Vec::with_capacity(12);
        for system in ["", "_1", "_2"] {
            for quantity in ["m", "pt", "eta", "phi"] {
                columns.push(OutputColumn::float(format!("{quantity}{system}_nn")));
            }
        }
        Ok(Self {
            feature_order,
            target_index,
            leptons,
            met: source.bind("met", ColumnType::F32)?,
            metphi: source.bind("metphi", ColumnType::F32)?,
            network,
            columns,
        })
    }

    fn features(&self, row: &Row) -> [f64; 10] {
        let p4 = |[pt, eta, phi, m]: [ColumnId; 4]| {
            FourVector::from_pt_eta_phi_m(row.f64(pt), row.f64(eta), row.f64(phi), row.f64(m))
        };
        let t1 = p4(self.leptons[0]);
        let t2 = p4(self.leptons[1]);
        let (met_x, met_y) = polar_xy(row.f64(self.met), row.f64(self.metphi));
        [t1.px, t1.py, t1.pz, t1.e, t2.px, t2.py, t2.pz, t2.e, met_x, met_y]
    }
}

fn set_p4(record: &mut OutputRecord, offset: usize, p4: &FourVector) {
    record.set_f32(offset, p4.mass() as f32);
    record.set_f32(offset + 1, p4.pt() as f32);
    record.set_f32(offset + 2, p4.eta() as f32);
    record.set_f32(offset + 3, p4.phi() as f32);
}

impl EventTransform for NnMassRegressor {
    fn name(&self) -> &'static str {
        "nn_mass"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        let features = self.features(row);
        let inputs: Vec<f64> = self.feature_order.iter().map(|&i| features[i]).collect();
        let outputs = self.network.evaluate_labelled(&inputs)?;
        let t = |k: usize| outputs[self.target_index[k]];
        let tau1 = FourVector::from_px_py_pz_m(t(0), t(1), t(2), TAU_MASS);
        let tau2 = FourVector::from_px_py_pz_m(t(3), t(4), t(5), TAU_MASS);
        set_p4(record, 0, &(tau1 + tau2));
        set_p4(record, 4, &tau1);
        set_p4(record, 8, &tau2);
        Ok(())
    }
}
