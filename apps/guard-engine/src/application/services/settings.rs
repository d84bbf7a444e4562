//! Runtime Settings
//!
//! Rule sets, thresholds and models that may be hot-swapped. A swap is staged
//! and only promoted at the start of an aggregator tick; each chart cycle
//! takes one snapshot at its start, so no cycle sees a mix of old and new.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::domain::compliance::{ComplianceEngine, RuleSet};
use crate::domain::decision::{ConfluenceProbabilityModel, DecisionEngine, ProbabilityModel};
use crate::domain::system::HealthBands;

/// Everything a cycle reads that is not account state.
#[derive(Clone)]
pub struct RuntimeSettings {
    /// Rule sets by name.
    pub rule_sets: HashMap<String, Arc<RuleSet>>,
    /// Compliance checker (carries the trading calendar and news calendar).
    pub compliance: ComplianceEngine,
    /// Decision engine (carries the thresholds).
    pub decisions: DecisionEngine,
    /// Success probability model.
    pub probability: Arc<dyn ProbabilityModel>,
    /// Health band boundaries.
    pub health_bands: HealthBands,
}

impl RuntimeSettings {
    /// Settings with the given rule sets and defaults for everything else.
    #[must_use]
    pub fn new(rule_sets: impl IntoIterator<Item = RuleSet>) -> Self {
        Self {
            rule_sets: rule_sets
                .into_iter()
                .map(|r| (r.name.clone(), Arc::new(r)))
                .collect(),
            compliance: ComplianceEngine::default(),
            decisions: DecisionEngine::default(),
            probability: Arc::new(ConfluenceProbabilityModel::default()),
            health_bands: HealthBands::default(),
        }
    }

    /// Set the compliance engine.
    #[must_use]
    pub fn with_compliance(mut self, compliance: ComplianceEngine) -> Self {
        self.compliance = compliance;
        self
    }

    /// Set the decision engine.
    #[must_use]
    pub fn with_decisions(mut self, decisions: DecisionEngine) -> Self {
        self.decisions = decisions;
        self
    }

    /// Set the probability model.
    #[must_use]
    pub fn with_probability(mut self, probability: Arc<dyn ProbabilityModel>) -> Self {
        self.probability = probability;
        self
    }

    /// Set the health bands.
    #[must_use]
    pub const fn with_health_bands(mut self, health_bands: HealthBands) -> Self {
        self.health_bands = health_bands;
        self
    }

    /// Rule set by name.
    #[must_use]
    pub fn rule_set(&self, name: &str) -> Option<&Arc<RuleSet>> {
        self.rule_sets.get(name)
    }
}

impl fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.rule_sets.keys().collect();
        names.sort();
        f.debug_struct("RuntimeSettings")
            .field("rule_sets", &names)
            .field("compliance", &self.compliance)
            .field("decisions", &self.decisions)
            .field("health_bands", &self.health_bands)
            .finish_non_exhaustive()
    }
}

/// Active settings plus at most one staged replacement.
#[derive(Debug)]
pub struct SettingsCell {
    active: RwLock<Arc<RuntimeSettings>>,
    staged: Mutex<Option<RuntimeSettings>>,
}

impl SettingsCell {
    /// Create with initial settings.
    #[must_use]
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            active: RwLock::new(Arc::new(settings)),
            staged: Mutex::new(None),
        }
    }

    /// Snapshot of the active settings.
    #[must_use]
    pub fn current(&self) -> Arc<RuntimeSettings> {
        Arc::clone(&*self.active.read())
    }

    /// Stage a replacement, superseding any earlier staged one.
    pub fn stage(&self, settings: RuntimeSettings) {
        *self.staged.lock() = Some(settings);
    }

    /// Whether a replacement is waiting.
    #[must_use]
    pub fn has_staged(&self) -> bool {
        self.staged.lock().is_some()
    }

    /// Promote the staged settings. Returns whether anything changed.
    pub fn promote(&self) -> bool {
        let Some(next) = self.staged.lock().take() else {
            return false;
        };
        *self.active.write() = Arc::new(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::{AccountTier, PropFirm};
    use crate::domain::decision::DecisionThresholds;
    use crate::domain::shared::Money;

    #[test]
    fn staged_settings_wait_for_promotion() {
        let cell = SettingsCell::new(RuntimeSettings::new([RuleSet::preset(
            PropFirm::Topstep,
            AccountTier::K50,
        )]));
        let before = cell.current();

        let thresholds = DecisionThresholds {
            low_drawdown_threshold: Money::dollars(900),
            ..DecisionThresholds::default()
        };
        cell.stage(RuntimeSettings::new([]).with_decisions(DecisionEngine::new(thresholds)));

        assert!(cell.has_staged());
        assert!(Arc::ptr_eq(&before, &cell.current()));

        assert!(cell.promote());
        assert!(!cell.promote());
        let after = cell.current();
        assert_eq!(
            after.decisions.thresholds().low_drawdown_threshold,
            Money::dollars(900)
        );
        assert!(after.rule_sets.is_empty());
        assert_eq!(before.rule_sets.len(), 1);
    }

    #[test]
    fn rule_sets_keyed_by_name() {
        let settings = RuntimeSettings::new([
            RuleSet::preset(PropFirm::Apex, AccountTier::K50).with_name("apex"),
            RuleSet::preset(PropFirm::Topstep, AccountTier::K100),
        ]);
        assert!(settings.rule_set("apex").is_some());
        assert!(settings.rule_set("topstep-100k").is_some());
        assert!(format!("{settings:?}").contains("apex"));
    }
}
