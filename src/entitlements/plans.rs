use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// key: entitlement-plans -> ordered subscription tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Pro, Plan::Premium];

    pub fn level(self) -> u8 {
        match self {
            Plan::Free => 0,
            Plan::Basic => 1,
            Plan::Pro => 2,
            Plan::Premium => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Premium => "premium",
        }
    }

    /// Display name used in upgrade prompts.
    pub fn title(self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Basic => "Basic",
            Plan::Pro => "Pro",
            Plan::Premium => "Premium",
        }
    }

    /// Resolves a stored plan value. Missing, blank or unrecognised values
    /// fall back to [`Plan::Free`].
    pub fn from_stored(value: Option<&str>) -> Plan {
        value
            .and_then(|raw| raw.parse::<Plan>().ok())
            .unwrap_or(Plan::Free)
    }

    pub fn meets(self, required: Plan) -> bool {
        self.level() >= required.level()
    }
}

/// String form of the tier comparison. Both sides go through
/// [`Plan::from_stored`], so garbage on either side ranks as `free`.
pub fn meets(principal_plan: &str, required_plan: &str) -> bool {
    Plan::from_stored(Some(principal_plan)).meets(Plan::from_stored(Some(required_plan)))
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan `{0}`")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "basic" => Ok(Plan::Basic),
            "pro" => Ok(Plan::Pro),
            "premium" => Ok(Plan::Premium),
            _ => Err(UnknownPlan(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_total() {
        for window in Plan::ALL.windows(2) {
            assert!(window[0] < window[1]);
            assert!(window[1].meets(window[0]));
            assert!(!window[0].meets(window[1]));
        }
        for plan in Plan::ALL {
            assert!(plan.meets(plan));
        }
    }

    #[test]
    fn pro_gate_admits_pro_and_premium_only() {
        let admitted: Vec<Plan> = Plan::ALL
            .into_iter()
            .filter(|plan| plan.meets(Plan::Pro))
            .collect();
        assert_eq!(admitted, vec![Plan::Pro, Plan::Premium]);
    }

    #[test]
    fn garbage_plan_strings_rank_as_free() {
        assert!(meets("enterprise", "free"));
        assert!(!meets("enterprise", "basic"));
        assert!(!meets("", "basic"));
        assert!(meets("premium", "platinum"));
        assert_eq!(Plan::from_stored(None), Plan::Free);
        assert_eq!(Plan::from_stored(Some("  PRO ")), Plan::Pro);
    }

    #[test]
    fn strict_parse_rejects_unknown_plans() {
        assert_eq!(
            "gold".parse::<Plan>(),
            Err(UnknownPlan("gold".to_string()))
        );
    }
}
