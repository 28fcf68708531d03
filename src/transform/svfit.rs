//! Di-tau mass reconstruction, run once per missing-energy definition.

use tracing::info;

use super::{EventTransform, OutputColumn, OutputRecord};
use crate::error::{Error, KernelError, Result};
use crate::kinematics::FourVector;
use crate::table::{ColumnId, ColumnType, Row, RowSource};

/// Decay mode of a tau candidate as seen by the mass kernel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecayKind {
    Electron,
    Muon,
    Hadronic,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeasuredLepton {
    pub kind: DecayKind,
    /// Visible four-momentum.
    pub p4: FourVector,
}

/// Everything the mass kernel sees for one event and one MET definition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiTauInput {
    pub leptons: [MeasuredLepton; 2],
    pub met_x: f64,
    pub met_y: f64,
    /// MET covariance `[[c00, c01], [c10, c11]]`.
    pub covariance: [[f64; 2]; 2],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiTauSolution {
    /// Most probable di-tau four-vector.
    pub best: FourVector,
    /// Likelihood-weighted di-tau four-vector.
    pub weighted: FourVector,
    /// Likelihood-weighted mass estimate.
    pub mass: f64,
    pub mass_err: f64,
}

/// Numeric di-tau mass estimator.
///
/// `Ok(None)` means the likelihood has no valid solution for this input; that
/// is a per-row degeneracy, not a failure.
pub trait DiTauMassKernel: Send + Sync {
    fn solve(
        &self,
        input: &DiTauInput,
        kappa: f64,
    ) -> std::result::Result<Option<DiTauSolution>, KernelError>;
}

/// Mass regularisation constant for a channel.
pub fn regularization_for_channel(channel: &str) -> Result<f64> {
    match channel {
        "et" | "mt" => Ok(4.0),
        "tt" => Ok(5.0),
        "em" => Ok(3.0),
        other => Err(Error::UnknownChannel(other.to_string())),
    }
}

/// Decay kinds of the first and second candidate in a channel.
pub fn decay_kinds(channel: &str) -> Result<[DecayKind; 2]> {
    match channel {
        "et" => Ok([DecayKind::Electron, DecayKind::Hadronic]),
        "mt" => Ok([DecayKind::Muon, DecayKind::Hadronic]),
        "tt" => Ok([DecayKind::Hadronic, DecayKind::Hadronic]),
        "em" => Ok([DecayKind::Electron, DecayKind::Muon]),
        other => Err(Error::UnknownChannel(other.to_string())),
    }
}

/// A missing-energy definition: input column prefix and output column suffix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetDefinition {
    pub prefix: String,
    pub suffix: String,
}

impl MetDefinition {
    pub fn standard() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
        }
    }
    pub fn puppi() -> Self {
        Self {
            prefix: "puppi".to_string(),
            suffix: "_puppi".to_string(),
        }
    }
}

struct MetColumns {
    label: String,
    met: ColumnId,
    metphi: ColumnId,
    cov: [ColumnId; 4],
}

const OUTPUTS_PER_MET: usize = 9;

pub struct SvFitReconstructor {
    kernel: Box<dyn DiTauMassKernel>,
    kappa: f64,
    kinds: [DecayKind; 2],
    leptons: [[ColumnId; 4]; 2],
    mets: Vec<MetColumns>,
    columns: Vec<OutputColumn>,
}

impl SvFitReconstructor {
    pub fn bind(
        source: &mut RowSource,
        channel: &str,
        definitions: &[MetDefinition],
        kernel: Box<dyn DiTauMassKernel>,
    ) -> Result<Self> {
        let kappa = regularization_for_channel(channel)?;
        let kinds = decay_kinds(channel)?;
        if definitions.is_empty() {
            return Err(Error::Config("no MET definition configured".into()));
        }
        let mut leptons = Vec::with_capacity(2);
        for i in 1..=2 {
            leptons.push([
                source.bind(&format!("pt_{i}"), ColumnType::F32)?,
                source.bind(&format!("eta_{i}"), ColumnType::F32)?,
                source.bind(&format!("phi_{i}"), ColumnType::F32)?,
                source.bind(&format!("m_{i}"), ColumnType::F32)?,
            ]);
        }
        let mut mets = Vec::with_capacity(definitions.len());
        let mut columns = Vec::with_capacity(definitions.len() * OUTPUTS_PER_MET);
        for def in definitions {
            let p = &def.prefix;
            mets.push(MetColumns {
                label: if p.is_empty() { "standard".to_string() } else { p.clone() },
                met: source.bind(&format!("{p}met"), ColumnType::F32)?,
                metphi: source.bind(&format!("{p}metphi"), ColumnType::F32)?,
                cov: [
                    source.bind(&format!("{p}metcov00"), ColumnType::F32)?,
                    source.bind(&format!("{p}metcov01"), ColumnType::F32)?,
                    source.bind(&format!("{p}metcov10"), ColumnType::F32)?,
                    source.bind(&format!("{p}metcov11"), ColumnType::F32)?,
                ],
            });
            let s = &def.suffix;
            for name in [
                "pt_fastmtt",
                "eta_fastmtt",
                "phi_fastmtt",
                "m_fastmtt",
                "pt_sv",
                "eta_sv",
                "phi_sv",
                "m_sv",
                "m_sv_err",
            ] {
                columns.push(OutputColumn::float(format!("{name}{s}")));
            }
        }
        info!(channel, kappa, definitions = definitions.len(), "configured di-tau mass reconstruction");
        Ok(Self {
            kernel,
            kappa,
            kinds,
            leptons: [leptons[0], leptons[1]],
            mets,
            columns,
        })
    }

    fn input(&self, row: &Row, met: &MetColumns) -> DiTauInput {
        let lepton = |i: usize| {
            let [pt, eta, phi, m] = self.leptons[i];
            MeasuredLepton {
                kind: self.kinds[i],
                p4: FourVector::from_pt_eta_phi_m(row.f64(pt), row.f64(eta), row.f64(phi), row.f64(m)),
            }
        };
        let (met_x, met_y) = crate::kinematics::polar_xy(row.f64(met.met), row.f64(met.metphi));
        let [c00, c01, c10, c11] = met.cov.map(|id| row.f64(id));
        DiTauInput {
            leptons: [lepton(0), lepton(1)],
            met_x,
            met_y,
            covariance: [[c00, c01], [c10, c11]],
        }
    }
}

impl EventTransform for SvFitReconstructor {
    fn name(&self) -> &'static str {
        "svfit"
    }

    fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    fn compute(&self, row: &Row, record: &mut OutputRecord) -> std::result::Result<(), KernelError> {
        // definitions are solved independently, nothing carries over
        for (k, met) in self.mets.iter().enumerate() {
            let base = k * OUTPUTS_PER_MET;
            match self.kernel.solve(&self.input(row, met), self.kappa)? {
                Some(solution) => {
                    record.set_f32(base, solution.best.pt() as f32);
                    record.set_f32(base + 1, solution.best.eta() as f32);
                    record.set_f32(base + 2, solution.best.phi() as f32);
                    record.set_f32(base + 3, solution.best.mass() as f32);
                    record.set_f32(base + 4, solution.weighted.pt() as f32);
                    record.set_f32(base + 5, solution.weighted.eta() as f32);
                    record.set_f32(base + 6, solution.weighted.phi() as f32);
                    record.set_f32(base + 7, solution.mass as f32);
                    record.set_f32(base + 8, solution.mass_err as f32);
                }
                None => record.diagnose(format!(
                    "no valid di-tau solution for {} MET",
                    met.label
                )),
            }
        }
        Ok(())
    }
}
