//! Splits the estimated production of the whole array over its orientations.

use pv_model::{Orientation, YieldEstimate};

/// System-level totals to distribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationTotals {
    pub area_m2: f64,
    pub annual_generation_kwh: f64,
}

impl From<&YieldEstimate> for GenerationTotals {
    fn from(estimate: &YieldEstimate) -> Self {
        Self {
            area_m2: estimate.required_area_m2,
            annual_generation_kwh: estimate.annual_energy_kwh,
        }
    }
}

/// Distributes totals proportionally to each orientation's module count.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenerationAggregator;

impl GenerationAggregator {
    /// Returns a copy of `orientations` with area and generation filled in.
    ///
    /// Orientations without modules receive `0.0`. Without any modules at all
    /// the list comes back unchanged.
    pub fn distribute(
        &self,
        totals: GenerationTotals,
        orientations: &[Orientation],
    ) -> Vec<Orientation> {
        let Some(total) = module_total(orientations) else {
            return orientations.to_vec();
        };
        orientations
            .iter()
            .map(|o| {
                let share = f64::from(o.module_count) / total;
                Orientation {
                    area_m2: Some(totals.area_m2 * share),
                    annual_generation_kwh: Some(totals.annual_generation_kwh * share),
                    ..o.clone()
                }
            })
            .collect()
    }

    /// Per-orientation monthly energy, in the order of `orientations`.
    ///
    /// Empty when no orientation has modules.
    pub fn distribute_monthly(
        &self,
        monthly_kwh: &[f64],
        orientations: &[Orientation],
    ) -> Vec<Vec<f64>> {
        let Some(total) = module_total(orientations) else {
            return Vec::new();
        };
        orientations
            .iter()
            .map(|o| {
                let share = f64::from(o.module_count) / total;
                monthly_kwh.iter().map(|month| month * share).collect()
            })
            .collect()
    }
}

fn module_total(orientations: &[Orientation]) -> Option<f64> {
    let total: u32 = orientations.iter().map(|o| o.module_count).sum();
    (total > 0).then_some(f64::from(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orientation(name: &str, count: u32) -> Orientation {
        let mut o = Orientation::new(name, 180.0, 20.0);
        o.module_count = count;
        o
    }

    fn totals() -> GenerationTotals {
        GenerationTotals {
            area_m2: 44.0,
            annual_generation_kwh: 9000.0,
        }
    }

    #[test]
    fn test_distribution_is_proportional() {
        let list = vec![orientation("South", 12), orientation("East", 6), orientation("West", 2)];
        let out = GenerationAggregator.distribute(totals(), &list);

        let generation: Vec<f64> = out.iter().map(|o| o.annual_generation_kwh.unwrap()).collect();
        for (actual, expected) in generation.iter().zip([5400.0, 2700.0, 900.0]) {
            assert!((actual - expected).abs() < 1e-9);
        }
        assert!((out[0].area_m2.unwrap() - 26.4).abs() < 1e-9);
    }

    #[test]
    fn test_totals_are_preserved() {
        let list = vec![orientation("A", 7), orientation("B", 3), orientation("C", 11)];
        let out = GenerationAggregator.distribute(totals(), &list);
        let generation: f64 = out.iter().filter_map(|o| o.annual_generation_kwh).sum();
        let area: f64 = out.iter().filter_map(|o| o.area_m2).sum();
        assert!((generation - 9000.0).abs() < 1e-6);
        assert!((area - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_orientation_gets_zero_and_stays() {
        let list = vec![orientation("South", 10), orientation("North", 0)];
        let out = GenerationAggregator.distribute(totals(), &list);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].annual_generation_kwh, Some(0.0));
        assert_eq!(out[1].area_m2, Some(0.0));
    }

    #[test]
    fn test_no_modules_returns_list_unchanged() {
        let list = vec![orientation("South", 0), orientation("North", 0)];
        let out = GenerationAggregator.distribute(totals(), &list);
        assert_eq!(out, list);
        assert!(GenerationAggregator.distribute_monthly(&[100.0; 12], &list).is_empty());
    }

    #[test]
    fn test_totals_from_estimate() {
        let estimate = YieldEstimate {
            annual_energy_kwh: 9000.0,
            required_area_m2: 44.0,
            daily_average_kwh: 24.7,
            performance_ratio: 0.8,
            specific_yield_kwh_kwp: 1400.0,
            capacity_factor: 0.16,
            monthly_energy_kwh: Vec::new(),
            monthly_losses: Vec::new(),
        };
        assert_eq!(GenerationTotals::from(&estimate), totals());
    }

    #[test]
    fn test_monthly_split() {
        let list = vec![orientation("South", 3), orientation("East", 1)];
        let monthly = vec![400.0; 12];
        let out = GenerationAggregator.distribute_monthly(&monthly, &list);
        assert_eq!(out[0], vec![300.0; 12]);
        assert_eq!(out[1], vec![100.0; 12]);
    }
}
