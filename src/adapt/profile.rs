//! Per-learner preference profiles, tuned by exponential moving average.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::SupportType;

use super::Feedback;

/// EMA smoothing factor for all profile weights.
pub const PROFILE_ALPHA: f64 = 0.1;

/// Prior weight assumed for a preference seen for the first time.
pub const PRIOR_WEIGHT: f64 = 0.5;

/// Bound on the adaptation history ring buffer.
const HISTORY_CAP: usize = 50;

/// One dimension of the learning-style vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleDimension {
    Analytical,
    Creative,
    Structured,
    Exploratory,
}

impl StyleDimension {
    /// All dimensions, in a fixed order.
    pub const ALL: [StyleDimension; 4] = [
        StyleDimension::Analytical,
        StyleDimension::Creative,
        StyleDimension::Structured,
        StyleDimension::Exploratory,
    ];

    /// Lowercase name, used for keyword matching against rule ids.
    pub fn as_str(self) -> &'static str {
        match self {
            StyleDimension::Analytical => "analytical",
            StyleDimension::Creative => "creative",
            StyleDimension::Structured => "structured",
            StyleDimension::Exploratory => "exploratory",
        }
    }
}

/// The learning-style vector, each dimension in [0.0, 1.0].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStyle {
    pub analytical: f64,
    pub creative: f64,
    pub structured: f64,
    pub exploratory: f64,
}

impl Default for LearningStyle {
    fn default() -> Self {
        Self {
            analytical: PRIOR_WEIGHT,
            creative: PRIOR_WEIGHT,
            structured: PRIOR_WEIGHT,
            exploratory: PRIOR_WEIGHT,
        }
    }
}

impl LearningStyle {
    /// Read one dimension.
    pub fn get(&self, dim: StyleDimension) -> f64 {
        match dim {
            StyleDimension::Analytical => self.analytical,
            StyleDimension::Creative => self.creative,
            StyleDimension::Structured => self.structured,
            StyleDimension::Exploratory => self.exploratory,
        }
    }

    fn get_mut(&mut self, dim: StyleDimension) -> &mut f64 {
        match dim {
            StyleDimension::Analytical => &mut self.analytical,
            StyleDimension::Creative => &mut self.creative,
            StyleDimension::Structured => &mut self.structured,
            StyleDimension::Exploratory => &mut self.exploratory,
        }
    }

    /// The strongest dimension; ties resolve in [`StyleDimension::ALL`] order.
    pub fn dominant(&self) -> StyleDimension {
        let mut best = StyleDimension::Analytical;
        for dim in StyleDimension::ALL {
            if self.get(dim) > self.get(best) {
                best = dim;
            }
        }
        best
    }
}

/// One recorded adaptation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationEvent {
    /// When the feedback arrived.
    pub at: DateTime<Utc>,
    /// Support type the feedback referred to.
    pub support: SupportType,
    /// Reported satisfaction.
    pub satisfaction: f64,
    /// Reported effectiveness.
    pub effectiveness: f64,
}

/// Exponential moving average toward `value` with the profile alpha.
fn ema(old: f64, value: f64) -> f64 {
    old * (1.0 - PROFILE_ALPHA) + value * PROFILE_ALPHA
}

/// Per-learner preference weights, created lazily on first reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// The learner this profile belongs to.
    pub user: String,
    /// Learning-style vector.
    pub style: LearningStyle,
    /// Preference weight per support type.
    #[serde(default)]
    pub support_preference: BTreeMap<SupportType, f64>,
    /// Effectiveness weight per act combination (sorted-joined key).
    #[serde(default)]
    pub act_combo_effect: BTreeMap<String, f64>,
    /// Preference weight per difficulty label.
    #[serde(default)]
    pub difficulty_preference: BTreeMap<String, f64>,
    /// Bounded ring buffer of adaptation events, newest at the back.
    #[serde(default)]
    pub history: VecDeque<AdaptationEvent>,
}

impl UserProfile {
    /// Create a fresh profile with neutral weights.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            style: LearningStyle::default(),
            support_preference: BTreeMap::new(),
            act_combo_effect: BTreeMap::new(),
            difficulty_preference: BTreeMap::new(),
            history: VecDeque::new(),
        }
    }

    /// Preference weight for a support type, prior for unseen ones.
    pub fn support_weight(&self, support: SupportType) -> f64 {
        self.support_preference
            .get(&support)
            .copied()
            .unwrap_or(PRIOR_WEIGHT)
    }

    /// Effectiveness weight for an act combination key.
    pub fn act_combo_weight(&self, key: &str) -> f64 {
        self.act_combo_effect.get(key).copied().unwrap_or(PRIOR_WEIGHT)
    }

    /// Fold one feedback event into the profile.
    ///
    /// All weight maps move by EMA (α = 0.1) from a 0.5 prior: the support
    /// preference toward satisfaction, the act-combination weight toward
    /// effectiveness, and the style dimension associated with the support
    /// type toward satisfaction.
    pub fn absorb(&mut self, feedback: &Feedback) {
        let support_entry = self
            .support_preference
            .entry(feedback.support)
            .or_insert(PRIOR_WEIGHT);
        *support_entry = ema(*support_entry, feedback.satisfaction);

        let combo_entry = self
            .act_combo_effect
            .entry(feedback.acts_key())
            .or_insert(PRIOR_WEIGHT);
        *combo_entry = ema(*combo_entry, feedback.effectiveness);

        let dim = style_dimension_for(feedback.support);
        let style_entry = self.style.get_mut(dim);
        *style_entry = ema(*style_entry, feedback.satisfaction);

        self.history.push_back(AdaptationEvent {
            at: Utc::now(),
            support: feedback.support,
            satisfaction: feedback.satisfaction,
            effectiveness: feedback.effectiveness,
        });
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }
}

/// Which style dimension a support type speaks to.
fn style_dimension_for(support: SupportType) -> StyleDimension {
    match support {
        SupportType::Understanding | SupportType::Deepening => StyleDimension::Analytical,
        SupportType::Reframing => StyleDimension::Creative,
        SupportType::Pathfinding | SupportType::Narrowing => StyleDimension::Structured,
        SupportType::Articulation => StyleDimension::Exploratory,
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::SpeechAct;

    use super::*;

    fn feedback(support: SupportType, satisfaction: f64, effectiveness: f64) -> Feedback {
        Feedback {
            satisfaction,
            effectiveness,
            support,
            acts: vec![SpeechAct::Clarify, SpeechAct::Probe],
        }
    }

    #[test]
    fn first_feedback_moves_weight_off_the_prior() {
        let mut profile = UserProfile::new("u1");
        profile.absorb(&feedback(SupportType::Understanding, 1.0, 0.8));
        // 0.5 * 0.9 + 1.0 * 0.1
        let w = profile.support_weight(SupportType::Understanding);
        assert!((w - 0.55).abs() < 1e-9);
        // Unseen support types stay at the prior.
        assert_eq!(profile.support_weight(SupportType::Narrowing), 0.5);
    }

    #[test]
    fn act_combo_weight_tracks_effectiveness() {
        let mut profile = UserProfile::new("u1");
        profile.absorb(&feedback(SupportType::Understanding, 0.2, 1.0));
        let w = profile.act_combo_weight("clarify+probe");
        assert!((w - 0.55).abs() < 1e-9);
    }

    #[test]
    fn repeated_feedback_converges_toward_the_signal() {
        let mut profile = UserProfile::new("u1");
        for _ in 0..100 {
            profile.absorb(&feedback(SupportType::Reframing, 1.0, 1.0));
        }
        assert!(profile.support_weight(SupportType::Reframing) > 0.99);
        assert!(profile.style.creative > 0.99);
    }

    #[test]
    fn history_is_bounded() {
        let mut profile = UserProfile::new("u1");
        for _ in 0..200 {
            profile.absorb(&feedback(SupportType::Pathfinding, 0.5, 0.5));
        }
        assert_eq!(profile.history.len(), 50);
    }

    #[test]
    fn dominant_dimension_tie_breaks_in_fixed_order() {
        let style = LearningStyle::default();
        assert_eq!(style.dominant(), StyleDimension::Analytical);
        let style = LearningStyle {
            exploratory: 0.9,
            ..LearningStyle::default()
        };
        assert_eq!(style.dominant(), StyleDimension::Exploratory);
    }
}
