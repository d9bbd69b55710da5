//! Orchestration of one dimensioning session.
//!
//! The session owns every piece of mutable state: the orientation layout, the
//! last accepted yield estimate and the recompute guard. Estimates are only
//! applied when they belong to the current layout.

use std::path::Path;

use anyhow::Context;
use pv_model::{
    FinancialInput, FinancialResult, Inverter, Orientation, PvModule, Site, YieldEstimate,
};
use tracing::{info, warn};

use crate::aggregation::{GenerationAggregator, GenerationTotals};
use crate::allocation::{CountUpdate, OrientationAllocator};
use crate::catalog::Catalog;
use crate::compatibility::CompatibilityResolver;
use crate::config::EngineConfig;
use crate::consumption::MonthlyProfile;
use crate::error::{EngineError, InvalidFinancialInput};
use crate::estimator::{EstimateRequest, YieldEstimator};
use crate::finance::FinancialEngine;
use crate::project::{FinanceSettings, LossSettings, ProjectFile};
use crate::recompute::{FingerprintInputs, InputFingerprint, RecomputeGuard, Ticket};
use crate::report::{OrientationMonthly, ProjectReport};
use crate::sizing::SystemSizer;

#[derive(Debug)]
pub struct Session {
    allocator: OrientationAllocator,
    inverter: Inverter,
    inverter_quantity: u32,
    site: Site,
    losses: LossSettings,
    guard: RecomputeGuard,
    estimate: Option<YieldEstimate>,
    finance: FinancialEngine,
}

impl Session {
    pub fn new(
        config: &EngineConfig,
        site: Site,
        module: &PvModule,
        inverter: &Inverter,
        inverter_quantity: u32,
        losses: LossSettings,
    ) -> Result<Self, EngineError> {
        let resolver = CompatibilityResolver::new(config.compatibility.clone());
        let allocator = OrientationAllocator::new(
            &resolver,
            module,
            inverter,
            inverter_quantity,
            &config.allocation,
        )?;
        Ok(Self {
            allocator,
            inverter: inverter.clone(),
            inverter_quantity,
            site,
            losses,
            guard: RecomputeGuard::new(),
            estimate: None,
            finance: FinancialEngine::new(config.finance.clone()),
        })
    }

    pub fn allocator(&self) -> &OrientationAllocator {
        &self.allocator
    }

    /// Mutable access to the layout. Drops the current estimate.
    pub fn allocator_mut(&mut self) -> &mut OrientationAllocator {
        self.estimate = None;
        &mut self.allocator
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn estimate(&self) -> Option<&YieldEstimate> {
        self.estimate.as_ref()
    }

    pub fn orientations(&self) -> Vec<Orientation> {
        self.allocator.to_vec()
    }

    pub fn fingerprint(&self) -> InputFingerprint {
        let orientations = self.allocator.to_vec();
        InputFingerprint::of(&FingerprintInputs {
            module: Some(self.allocator.module()),
            inverter: Some(&self.inverter),
            inverter_quantity: self.inverter_quantity,
            orientations: &orientations,
            coordinates: self.site.coordinates,
            total_loss_pct: self.losses.total_loss_pct,
            safety_margin: self.losses.safety_margin,
            decomposition_model: self.losses.decomposition_model.as_deref(),
            transposition_model: self.losses.transposition_model.as_deref(),
        })
    }

    /// Orientation with the most modules; the first one wins ties.
    pub fn primary_orientation(&self) -> Option<&Orientation> {
        self.allocator
            .orientations()
            .filter(|o| o.module_count > 0)
            .fold(None, |best: Option<&Orientation>, o| match best {
                Some(b) if b.module_count >= o.module_count => Some(b),
                _ => Some(o),
            })
    }

    /// Request for the current layout, or `None` when no module is placed.
    pub fn estimate_request(&self) -> Option<EstimateRequest> {
        let primary = self.primary_orientation()?;
        Some(EstimateRequest {
            coordinates: self.site.coordinates,
            tilt_deg: primary.tilt_deg,
            azimuth_deg: primary.azimuth_deg,
            module: self.allocator.module().clone(),
            inverter: self.inverter.clone(),
            module_count: self.allocator.total_modules(),
            total_loss_pct: self.losses.total_loss_pct,
            safety_margin: self.losses.safety_margin,
            decomposition_model: self.losses.decomposition_model.clone(),
            transposition_model: self.losses.transposition_model.clone(),
        })
    }

    /// Starts a recomputation, superseding any one in flight.
    pub fn begin_recompute(&self) -> Option<(Ticket, EstimateRequest)> {
        let request = self.estimate_request()?;
        Some((self.guard.begin(self.fingerprint()), request))
    }

    /// Applies an estimator response if `ticket` is still current.
    ///
    /// Returns whether the estimate was accepted.
    pub fn apply_estimate(&mut self, ticket: &Ticket, estimate: YieldEstimate) -> bool {
        if !self.guard.accept(ticket, self.fingerprint()) {
            return false;
        }
        let totals = GenerationTotals::from(&estimate);
        let distributed = GenerationAggregator.distribute(totals, &self.allocator.to_vec());
        self.allocator.apply_generation(&distributed);
        info!(
            annual_energy_kwh = estimate.annual_energy_kwh,
            sequence = ticket.sequence,
            "yield estimate applied"
        );
        self.estimate = Some(estimate);
        true
    }

    /// Runs one synchronous round-trip against `estimator`.
    pub fn recompute<E>(&mut self, estimator: &E) -> Result<bool, EngineError>
    where
        E: YieldEstimator + ?Sized,
    {
        let Some((ticket, request)) = self.begin_recompute() else {
            warn!("no modules placed, skipping yield estimate");
            self.estimate = None;
            return Ok(false);
        };
        let estimate = estimator.estimate(&request)?;
        Ok(self.apply_estimate(&ticket, estimate))
    }

    /// Combines the accepted estimate with financial assumptions.
    pub fn financial_input(
        &self,
        settings: &FinanceSettings,
        consumption: &MonthlyProfile,
    ) -> Result<FinancialInput, InvalidFinancialInput> {
        let estimate = self.estimate.as_ref().ok_or_else(|| {
            InvalidFinancialInput::new(
                "monthly_generation_kwh",
                "no yield estimate for the current layout",
            )
        })?;
        Ok(FinancialInput {
            initial_investment: settings.initial_investment,
            monthly_generation_kwh: estimate.monthly_energy_or_flat(),
            monthly_consumption_kwh: consumption.as_slice().to_vec(),
            tariff: settings.tariff,
            wire_charge: settings.wire_charge.clone(),
            lifetime_years: settings.lifetime_years,
            discount_rate: settings.discount_rate,
            energy_inflation: settings.energy_inflation,
            degradation_rate: settings.degradation_rate,
            om_cost_year1: settings.om_cost_year1,
            om_inflation: settings.om_inflation,
            load_growth: settings.load_growth,
        })
    }

    pub fn evaluate(
        &self,
        input: &FinancialInput,
    ) -> Result<FinancialResult, InvalidFinancialInput> {
        self.finance.evaluate(input)
    }
}

/// Builds the layout described by `project`, collecting every count update.
///
/// Module and inverter are looked up in `catalog` by the ids the project names.
pub fn session_from_project<C>(
    config: &EngineConfig,
    project: &ProjectFile,
    catalog: &C,
) -> Result<(Session, Vec<CountUpdate>), EngineError>
where
    C: Catalog + ?Sized,
{
    let (module, inverter) = project.resolve_equipment(catalog)?;
    let mut session = Session::new(
        config,
        project.site.clone(),
        module,
        inverter,
        project.inverter_quantity,
        project.losses.clone(),
    )?;

    let sized_total = project
        .sizing
        .as_ref()
        .map(|request| SystemSizer::new(module).size(request))
        .transpose()?;
    let counts = project.requested_counts(sized_total);

    let allocator = session.allocator_mut();
    let mut updates = Vec::new();
    for spec in &project.orientations {
        allocator.add_orientation(&spec.name, spec.azimuth_deg, spec.tilt_deg)?;
        if let Some(channel) = spec.channel {
            allocator.assign_channel(&spec.name, channel)?;
        }
    }
    for (spec, requested) in project.orientations.iter().zip(counts) {
        updates.push(allocator.set_module_count(&spec.name, requested)?);
    }
    Ok((session, updates))
}

/// Runs a project file end to end: layout, yield estimate, finance.
pub fn run_project<E>(
    config: &EngineConfig,
    project: &ProjectFile,
    base_dir: &Path,
    estimator: &E,
) -> anyhow::Result<ProjectReport>
where
    E: YieldEstimator + ?Sized,
{
    let catalog = project.catalog(base_dir)?;
    let (mut session, updates) = session_from_project(config, project, &catalog)
        .context("Failed to build the array layout")?;
    if !session.recompute(estimator).context("Yield estimate failed")? {
        anyhow::bail!("no yield estimate: the layout holds no modules");
    }
    let consumption = project.finance.consumption(base_dir)?;
    let input = session.financial_input(&project.finance, &consumption)?;
    let financial = session.evaluate(&input)?;

    let estimate = session
        .estimate()
        .cloned()
        .context("estimate missing after recompute")?;
    let orientations = session.orientations();
    let monthly =
        GenerationAggregator.distribute_monthly(&estimate.monthly_energy_or_flat(), &orientations);
    let allocator = session.allocator();

    Ok(ProjectReport {
        project: session.site().name.clone(),
        module_count: allocator.total_modules(),
        peak_power_kwp: allocator.peak_power_kwp(),
        capacity: allocator.capacity().clone(),
        exceeds_dc_rating: allocator.exceeds_dc_rating(),
        monthly_by_orientation: orientations
            .iter()
            .zip(monthly)
            .map(|(o, monthly_kwh)| OrientationMonthly {
                name: o.name.clone(),
                monthly_kwh,
            })
            .collect(),
        orientations,
        clamps: updates.iter().filter_map(|u| u.clamp.clone()).collect(),
        corrections: updates.iter().filter_map(|u| u.correction.clone()).collect(),
        estimate,
        financial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::UnknownEquipment;
    use crate::estimator::PeakSunHoursEstimator;
    use crate::project::tests::SAMPLE;
    use pv_model::MpptChannel;

    fn build(project: &ProjectFile) -> Result<(Session, Vec<CountUpdate>), EngineError> {
        let catalog = project.catalog(Path::new(".")).unwrap();
        session_from_project(&EngineConfig::default(), project, &catalog)
    }

    fn sample_session() -> (Session, Vec<CountUpdate>) {
        build(&ProjectFile::from_toml_str(SAMPLE).unwrap()).unwrap()
    }

    #[test]
    fn test_project_counts_are_balanced() {
        let (session, updates) = sample_session();
        // Two strings per MPPT: 13 -> 12, 6 stays.
        assert_eq!(session.allocator().total_modules(), 18);
        assert_eq!(updates.iter().filter(|u| u.correction.is_some()).count(), 1);
        assert_eq!(session.primary_orientation().map(|o| o.name.as_str()), Some("South"));
    }

    #[test]
    fn test_estimate_is_distributed_over_orientations() {
        let (mut session, _) = sample_session();
        assert!(session.recompute(&PeakSunHoursEstimator::new(4.6)).unwrap());

        let total = session.estimate().unwrap().annual_energy_kwh;
        let south = session.allocator().orientation("South").unwrap();
        let share = south.annual_generation_kwh.unwrap() / total;
        assert!((share - 12.0 / 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let (mut session, _) = sample_session();
        let estimator = PeakSunHoursEstimator::new(4.6);

        let (old_ticket, old_request) = session.begin_recompute().unwrap();
        let old = estimator.estimate(&old_request).unwrap();

        session.allocator_mut().set_module_count("West", 4).unwrap();
        let (new_ticket, new_request) = session.begin_recompute().unwrap();
        let new = estimator.estimate(&new_request).unwrap();

        assert!(!session.apply_estimate(&old_ticket, old));
        assert!(session.apply_estimate(&new_ticket, new.clone()));
        assert_eq!(session.estimate(), Some(&new));
    }

    #[test]
    fn test_layout_change_invalidates_in_flight_ticket() {
        let (mut session, _) = sample_session();
        let estimator = PeakSunHoursEstimator::new(4.6);
        let (ticket, request) = session.begin_recompute().unwrap();
        session.allocator_mut().release_channel("West").unwrap();
        let estimate = estimator.estimate(&request).unwrap();
        assert!(!session.apply_estimate(&ticket, estimate));
        assert!(session.estimate().is_none());
    }

    #[test]
    fn test_layout_change_leaves_no_stale_orientation_generation() {
        let (mut session, _) = sample_session();
        assert!(session.recompute(&PeakSunHoursEstimator::new(4.6)).unwrap());
        let south = session.allocator().orientation("South").unwrap();
        assert!(south.annual_generation_kwh.is_some());

        session.allocator_mut().set_module_count("West", 0).unwrap();
        assert!(session.estimate().is_none());
        for o in session.orientations() {
            assert_eq!(o.annual_generation_kwh, None, "{} kept stale generation", o.name);
        }

        // A fresh estimate gives South the whole array.
        assert!(session.recompute(&PeakSunHoursEstimator::new(4.6)).unwrap());
        let total = session.estimate().unwrap().annual_energy_kwh;
        let south = session.allocator().orientation("South").unwrap();
        assert!((south.annual_generation_kwh.unwrap() - total).abs() < 1e-9);
    }

    #[test]
    fn test_financial_input_requires_estimate() {
        let (session, _) = sample_session();
        let project = ProjectFile::from_toml_str(SAMPLE).unwrap();
        let consumption = MonthlyProfile::flat(6000.0).unwrap();
        let err = session
            .financial_input(&project.finance, &consumption)
            .unwrap_err();
        assert_eq!(err.field, "monthly_generation_kwh");
    }

    #[test]
    fn test_channel_conflict_in_project_fails() {
        let mut project = ProjectFile::from_toml_str(SAMPLE).unwrap();
        project.orientations[1].channel = Some(MpptChannel::new(1, 1));
        let err = build(&project).unwrap_err();
        assert!(matches!(err, EngineError::Allocation(_)));
    }

    #[test]
    fn test_unknown_inverter_id_fails() {
        let mut project = ProjectFile::from_toml_str(SAMPLE).unwrap();
        project.inverter_id = "inv-missing".to_string();
        let err = build(&project).unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownEquipment(UnknownEquipment { kind: "inverter", .. })
        ));
    }

    #[test]
    fn test_external_catalog_supplies_equipment() {
        let mut project = ProjectFile::from_toml_str(SAMPLE).unwrap();
        let mut catalog = InMemoryCatalog::new();
        catalog.extend(std::mem::take(&mut project.equipment));
        assert!(project.equipment.is_empty());

        let (session, _) =
            session_from_project(&EngineConfig::default(), &project, &catalog).unwrap();
        assert_eq!(session.allocator().module().id, "m-450");
        assert_eq!(session.allocator().total_modules(), 18);
    }
}
