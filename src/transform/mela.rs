//! Matrix-element discriminants for events with two tagging jets.

use super::{guarded_ratio, EventTransform, OutputColumn, OutputRecord};
use crate::error::{KernelError, Result};
use crate::kinematics::FourVector;
use crate::table::{ColumnId, ColumnType, Row, RowSource};

/// Production hypotheses evaluated per event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Hypothesis {
    /// Vector boson fusion, CP-even scalar.
    VbfScalar,
    /// Vector boson fusion, CP-odd pseudoscalar.
    VbfPseudoscalar,
    /// Gluon fusion with two additional jets.
    GluonFusionTwoJets,
}

/// Reconstructed objects handed to the matrix-element engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MelaCandidate {
    pub leptons: [FourVector; 2],
    pub jets: [FourVector; 2],
}

impl MelaCandidate {
    /// Same candidate with the jet ordering swapped.
    pub fn swapped_jets(&self) -> Self {
        Self {
            leptons: self.leptons,
            jets: [self.jets[1], self.jets[0]],
        }
    }
}

/// Matrix-element probability engine.
pub trait MatrixElement: Send + Sync {
    fn probability(
        &self,
        hypothesis: Hypothesis,
        candidate: &MelaCandidate,
    ) -> std::result::Result<f64, KernelError>;
}

const MIN_JETS: i32 = 2;

pub struct MelaScorer {
    engine: Box<dyn MatrixElement>,
    leptons: [[ColumnId; 4]; 2],
    jets: [[ColumnId; 3]; 2],
    njets: ColumnId,
    columns: Vec<OutputColumn>,
}

impl MelaScorer {
    pub fn bind(source: &mut RowSource, engine: Box<dyn MatrixElement>) -> Result<Self> {
        let mut lepton = |i: u8| -> Result<[ColumnId; 4]> {
            Ok([
                source.bind(&format!("pt_{i}"), ColumnType::F32)?,
                source.bind(&format!("eta_{i}"), ColumnType::F32)?,
                source.bind(&format!("phi_{i}"), ColumnType::F32)?,
                source.bind(&format!("m_{i}"), ColumnType::F32)?,
            ])
        };
        let leptons = [lepton(1)?, lepton(2)?];
        let mut jet = |i: u8| -> Result<[ColumnId; 3]> {
            Ok([
                source.bind(&format!("jpt_{i}"), ColumnType::F32)?,
                source.bind(&format!("jeta_{i}"), ColumnType::F32)?,
                source.bind(&format!("jphi_{i}"), ColumnType::F32)?,
            ])
        };
        let jets = [jet(1)?, jet(2)?];
        let njets = source.bind("njets", ColumnType::I32)?;
        let columns = [
            "ME_vbf",
            "ME_vbf_cpodd",
            "ME_ggh",
            "D_vbf",
            "D_vbf_cpodd",
            "D_ggh",
        ]
        .into_iter()
        .map(OutputColumn::float)
        .collect();
        Ok(Self {
            engine,
            leptons,
            jets,
            njets,
            columns,
        })
    }

    fn candidate(&self, row: &Row) -> MelaCandidate {
        let lepton = |[pt, eta, phi, m]: [ColumnId; 4]| {
            FourVector::from_pt_eta_phi_m(row.f64(pt), row.f64(eta), row.f64(phi), row.f64(m))
        };
        let jet = |[pt, eta, phi]: [ColumnId; 3]| {
            FourVector::from_pt_eta_phi_m(row.f64(pt), row.f64(eta), row.f64(phi), 0.0)
        };
        MelaCandidate {
            leptons: self.leptons.map(lepton),
            jets: self.jets.map(jet),
        }
    }
}

impl EventTransform for MelaScorer {
    fn name(&self) -> &'static str {
        "mela"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn gate(&self, row: &Row) -> bool {
        row.i32(self.njets) >= MIN_JETS
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        let candidate = self.candidate(row);
        let vbf = self.engine.probability(Hypothesis::VbfScalar, &candidate)?;
        let vbf_cpodd = self.engine.probability(Hypothesis::VbfPseudoscalar, &candidate)?;
        // The gluon-fusion hypothesis does not distinguish the two jets.
        let ggh = 0.5
            * (self.engine.probability(Hypothesis::GluonFusionTwoJets, &candidate)?
                + self
                    .engine
                    .probability(Hypothesis::GluonFusionTwoJets, &candidate.swapped_jets())?);

        let scores = [vbf, vbf_cpodd, ggh];
        let total: f64 = scores.iter().sum();
        for (i, (score, label)) in scores.iter().zip(["D_vbf", "D_vbf_cpodd", "D_ggh"]).enumerate() {
            record.set_f32(i, *score as f32);
            let discriminant = guarded_ratio(*score, total, label, record);
            record.set_f32(i + 3, discriminant);
        }
        Ok(())
    }
}
