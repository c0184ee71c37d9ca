//! Panel construction: ids, treatment interaction, log price.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use crate::domain::{GroupSizes, PanelObservation, PanelRow, YearMonth};
use crate::error::{AppError, EXIT_DATA};

/// Prices at or below this floor are clipped before taking logs.
pub const LOG_PRICE_FLOOR: f64 = 1.0;

/// `ln(max(price, 1))`.
pub fn clipped_log(price: f64) -> f64 {
    price.max(LOG_PRICE_FLOOR).ln()
}

/// A zone × month panel ready for regression.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Sorted by `(entity_id, time_id)`.
    pub observations: Vec<PanelObservation>,
    /// Sorted zone names; `entity_id` indexes into this.
    pub zones: Vec<String>,
    /// Sorted months; `time_id` indexes into this.
    pub months: Vec<YearMonth>,
}

/// Build the panel from raw rows. Row order does not affect the result.
pub fn build_panel(rows: &[PanelRow]) -> Result<Panel, AppError> {
    let zones: Vec<String> = rows
        .iter()
        .map(|r| r.zone.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let months: Vec<YearMonth> = rows
        .iter()
        .map(|r| r.month)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let entity_of: HashMap<&str, usize> = zones.iter().enumerate().map(|(i, z)| (z.as_str(), i)).collect();
    let time_of: HashMap<YearMonth, usize> = months.iter().enumerate().map(|(t, m)| (*m, t)).collect();

    let mut treated_by_zone: HashMap<&str, bool> = HashMap::new();
    let mut cells: BTreeMap<(usize, usize), PanelObservation> = BTreeMap::new();
    for r in rows {
        let entity_id = entity_of[r.zone.as_str()];
        let time_id = time_of[&r.month];

        let first = *treated_by_zone.entry(r.zone.as_str()).or_insert(r.treated);
        if first != r.treated {
            return Err(AppError::new(
                EXIT_DATA,
                format!("Zone {} has inconsistent treated flags.", r.zone),
            ));
        }

        let obs = PanelObservation {
            zone: r.zone.clone(),
            entity_id,
            month: r.month,
            time_id,
            treated: r.treated,
            post: r.post,
            did: r.treated && r.post,
            price: r.price,
            log_price: clipped_log(r.price),
            load: r.load,
            gas_price: r.gas_price,
            weather: r.weather,
        };
        if cells.insert((entity_id, time_id), obs).is_some() {
            return Err(AppError::new(
                EXIT_DATA,
                format!("Duplicate panel row for zone={} month={}.", r.zone, r.month),
            ));
        }
    }

    let panel = Panel {
        observations: cells.into_values().collect(),
        zones,
        months,
    };
    panel.ensure_both_arms()?;
    info!(
        observations = panel.observations.len(),
        zones = panel.zones.len(),
        months = panel.months.len(),
        "panel built"
    );
    Ok(panel)
}

impl Panel {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct zones with at least one observation.
    pub fn n_entities(&self) -> usize {
        self.observations.iter().map(|o| o.entity_id).collect::<BTreeSet<_>>().len()
    }

    /// Distinct months with at least one observation.
    pub fn n_periods(&self) -> usize {
        self.observations.iter().map(|o| o.time_id).collect::<BTreeSet<_>>().len()
    }

    /// Treated zones present in the panel, sorted.
    pub fn treated_zones(&self) -> Vec<String> {
        self.zones_where(|o| o.treated)
    }

    /// Control zones present in the panel, sorted.
    pub fn control_zones(&self) -> Vec<String> {
        self.zones_where(|o| !o.treated)
    }

    fn zones_where(&self, pred: impl Fn(&PanelObservation) -> bool) -> Vec<String> {
        self.observations
            .iter()
            .filter(|o| pred(o))
            .map(|o| o.zone.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn group_sizes(&self) -> GroupSizes {
        let mut g = GroupSizes::default();
        for o in &self.observations {
            match (o.post, o.treated) {
                (false, false) => g.pre_control += 1,
                (false, true) => g.pre_treated += 1,
                (true, false) => g.post_control += 1,
                (true, true) => g.post_treated += 1,
            }
        }
        g
    }

    /// Earliest month flagged `post = 1`.
    pub fn treatment_start(&self) -> Option<YearMonth> {
        self.observations.iter().filter(|o| o.post).map(|o| o.month).min()
    }

    /// Subsample with only `keep` zones. Ids are left unchanged.
    pub fn restrict(&self, keep: &[String]) -> Result<Panel, AppError> {
        let keep: BTreeSet<&str> = keep.iter().map(String::as_str).collect();
        let sub = Panel {
            observations: self
                .observations
                .iter()
                .filter(|o| keep.contains(o.zone.as_str()))
                .cloned()
                .collect(),
            zones: self.zones.clone(),
            months: self.months.clone(),
        };
        sub.ensure_both_arms()?;
        debug!(observations = sub.len(), zones = keep.len(), "restricted panel");
        Ok(sub)
    }

    fn ensure_both_arms(&self) -> Result<(), AppError> {
        if self.observations.iter().all(|o| !o.treated) {
            return Err(AppError::new(EXIT_DATA, "Panel has no treated zone."));
        }
        if self.observations.iter().all(|o| o.treated) {
            return Err(AppError::new(EXIT_DATA, "Panel has no control zone."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(zone: &str, year: i32, month: u32, price: f64) -> PanelRow {
        PanelRow {
            zone: zone.to_string(),
            month: YearMonth::new(year, month).unwrap(),
            treated: zone == "T",
            post: (year, month) >= (2022, 5),
            price,
            load: 1000.0,
            gas_price: 5.0,
            weather: 60.0,
        }
    }

    fn sample() -> Vec<PanelRow> {
        vec![
            row("T", 2022, 4, 40.0),
            row("T", 2022, 5, 60.0),
            row("A", 2022, 4, 38.0),
            row("A", 2022, 5, 41.0),
            row("B", 2021, 12, 30.0),
            row("B", 2022, 5, 44.0),
        ]
    }

    #[test]
    fn time_ids_follow_sorted_months() {
        let panel = build_panel(&sample()).unwrap();
        let ids: BTreeMap<YearMonth, usize> = panel.observations.iter().map(|o| (o.month, o.time_id)).collect();
        assert_eq!(ids[&YearMonth::new(2021, 12).unwrap()], 0);
        assert_eq!(ids[&YearMonth::new(2022, 4).unwrap()], 1);
        assert_eq!(ids[&YearMonth::new(2022, 5).unwrap()], 2);
        assert_eq!(panel.zones, vec!["A", "B", "T"]);
    }

    #[test]
    fn ids_are_invariant_to_row_order() {
        let forward = build_panel(&sample()).unwrap();
        let mut shuffled = sample();
        shuffled.reverse();
        shuffled.swap(0, 3);
        let backward = build_panel(&shuffled).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn did_is_treated_times_post() {
        let panel = build_panel(&sample()).unwrap();
        for o in &panel.observations {
            assert_eq!(o.did, o.treated && o.post);
        }
        assert_eq!(panel.observations.iter().filter(|o| o.did).count(), 1);
    }

    #[test]
    fn log_price_is_clipped_at_one() {
        assert_eq!(clipped_log(-5.0), 0.0);
        assert_eq!(clipped_log(0.0), 0.0);
        assert_eq!(clipped_log(1.0), 0.0);
        assert!((clipped_log(std::f64::consts::E) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_zone_month_is_rejected() {
        let mut rows = sample();
        rows.push(row("A", 2022, 4, 99.0));
        let err = build_panel(&rows).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_DATA);
        assert!(err.message().contains("zone=A"));
    }

    #[test]
    fn group_sizes_and_treatment_start() {
        let panel = build_panel(&sample()).unwrap();
        let g = panel.group_sizes();
        assert_eq!(g.pre_control, 2);
        assert_eq!(g.pre_treated, 1);
        assert_eq!(g.post_control, 2);
        assert_eq!(g.post_treated, 1);
        assert_eq!(panel.treatment_start(), YearMonth::new(2022, 5));
    }

    #[test]
    fn restriction_keeps_original_time_ids() {
        let panel = build_panel(&sample()).unwrap();
        let sub = panel.restrict(&["T".to_string(), "A".to_string()]).unwrap();
        assert_eq!(sub.len(), 4);
        assert!(sub.observations.iter().all(|o| o.time_id >= 1));
        assert_eq!(sub.n_periods(), 2);
        assert_eq!(sub.n_entities(), 2);
    }

    #[test]
    fn restriction_without_controls_fails() {
        let panel = build_panel(&sample()).unwrap();
        assert!(panel.restrict(&["T".to_string()]).is_err());
    }
}
