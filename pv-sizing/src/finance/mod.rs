//! Cash-flow based evaluation of a PV investment.
//!
//! [`FinancialEngine::evaluate`] validates the input, builds the yearly
//! ledger and derives NPV, IRR, paybacks, profitability index and LCOE. The
//! same evaluation is then repeated over the sensitivity perturbations and the
//! scenario presets.

pub mod cashflow;
pub mod metrics;
pub mod sweep;

use pv_model::{CashFlowAnalysis, FinancialInput, FinancialResult};
use tracing::info;

use crate::config::FinanceConfig;
use crate::error::InvalidFinancialInput;

#[derive(Debug, Clone, Default)]
pub struct FinancialEngine {
    config: FinanceConfig,
}

impl FinancialEngine {
    pub fn new(config: FinanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FinanceConfig {
        &self.config
    }

    /// Base analysis plus sensitivity series and scenario outcomes.
    pub fn evaluate(
        &self,
        input: &FinancialInput,
    ) -> Result<FinancialResult, InvalidFinancialInput> {
        let analysis = self.analyze(input)?;
        let sensitivity = sweep::sensitivity(input, &self.config)?;
        let scenarios = sweep::scenarios(input, &self.config)?;
        info!(
            npv = analysis.npv,
            irr = ?analysis.irr,
            payback = ?analysis.simple_payback_years,
            "financial evaluation finished"
        );
        Ok(FinancialResult {
            analysis,
            sensitivity,
            scenarios,
        })
    }

    /// Ledger and metrics for `input` alone.
    pub fn analyze(
        &self,
        input: &FinancialInput,
    ) -> Result<CashFlowAnalysis, InvalidFinancialInput> {
        cashflow::validate(input)?;
        let ledger = cashflow::build_ledger(input);
        Ok(metrics::analyze(input, ledger, &self.config.irr))
    }
}
