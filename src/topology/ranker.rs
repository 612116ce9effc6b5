//! Ordering of ESS units by state of charge.

use tracing::warn;

use crate::error::{ControllerError, ControllerResult};
use crate::ess::{EssId, EssUnit};

/// Ranks ESS snapshots by SoC, highest first.
///
/// Ties keep configuration order. The input is never modified; a new ordered
/// list of ids is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocRanker {
    /// Fail on the first unreadable SoC instead of ranking the rest.
    pub require_all: bool,
}

impl SocRanker {
    pub fn new(require_all: bool) -> Self {
        Self { require_all }
    }

    /// # Errors
    ///
    /// * `MissingValue` in strict mode when any SoC is unreadable.
    /// * `InsufficientData` when fewer than two SoC values are readable.
    pub fn rank(&self, units: &[EssUnit]) -> ControllerResult<Vec<EssId>> {
        let mut readable: Vec<(&EssId, u8)> = Vec::with_capacity(units.len());
        for unit in units {
            match unit.soc {
                Some(soc) => readable.push((&unit.id, soc)),
                None if self.require_all => {
                    return Err(ControllerError::MissingValue {
                        ess: unit.id.clone(),
                        what: "state of charge",
                    });
                }
                None => warn!(ess = %unit.id, "SoC unreadable, leaving unit out of ranking"),
            }
        }

        if readable.len() < 2 {
            return Err(ControllerError::InsufficientData {
                readable: readable.len(),
                required: 2,
            });
        }

        // sort_by is stable: equal SoC keeps configuration order
        readable.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(readable.into_iter().map(|(id, _)| id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ess::GridMode;

    fn unit(id: &str, soc: Option<u8>) -> EssUnit {
        EssUnit {
            soc,
            ..EssUnit::unknown(EssId::from(id))
        }
    }

    fn ids(ranked: &[EssId]) -> Vec<&str> {
        ranked.iter().map(EssId::as_str).collect()
    }

    #[test]
    fn ranks_descending() {
        let units = vec![unit("ess1", Some(40)), unit("ess2", Some(90)), unit("ess3", Some(65))];
        let ranked = SocRanker::default().rank(&units).expect("ranking");
        assert_eq!(ids(&ranked), vec!["ess2", "ess3", "ess1"]);
    }

    #[test]
    fn ties_keep_configuration_order() {
        let units = vec![
            unit("ess1", Some(50)),
            unit("ess2", Some(70)),
            unit("ess3", Some(50)),
            unit("ess4", Some(70)),
        ];
        let ranked = SocRanker::default().rank(&units).expect("ranking");
        assert_eq!(ids(&ranked), vec!["ess2", "ess4", "ess1", "ess3"]);
    }

    #[test]
    fn skips_unreadable_units() {
        let units = vec![unit("ess1", None), unit("ess2", Some(30)), unit("ess3", Some(60))];
        let ranked = SocRanker::default().rank(&units).expect("ranking");
        assert_eq!(ids(&ranked), vec!["ess3", "ess2"]);
    }

    #[test]
    fn fewer_than_two_readable_is_insufficient() {
        let units = vec![unit("ess1", None), unit("ess2", Some(30)), unit("ess3", None)];
        assert_eq!(
            SocRanker::default().rank(&units),
            Err(ControllerError::InsufficientData {
                readable: 1,
                required: 2
            })
        );
    }

    #[test]
    fn strict_mode_reports_missing_value() {
        let units = vec![unit("ess1", Some(10)), unit("ess2", None), unit("ess3", Some(60))];
        let result = SocRanker::new(true).rank(&units);
        assert_eq!(
            result,
            Err(ControllerError::MissingValue {
                ess: EssId::from("ess2"),
                what: "state of charge"
            })
        );
    }

    #[test]
    fn input_is_left_untouched() {
        let units = vec![unit("ess1", Some(10)), unit("ess2", Some(20))];
        let before = units.clone();
        SocRanker::default().rank(&units).expect("ranking");
        assert_eq!(units, before);
        assert_eq!(units[0].grid_mode, GridMode::Undefined);
    }
}
