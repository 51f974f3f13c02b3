//! Center-attribute target selectors: 5-digit `TVVVV` packed ids.
//! Ports `SkillResolver.py`'s `TargetType`/`CheckTarget`/`CheckMultiTarget`.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// `UNIT_DICT`: character group id -> member character ids.
static UNIT_DICT: Lazy<HashMap<i64, HashSet<i64>>> = Lazy::new(|| {
    [
        (101, [1021, 1031, 1041].into_iter().collect()),
        (102, [1022, 1032, 1042].into_iter().collect()),
        (103, [1023, 1033, 1043].into_iter().collect()),
        (105, [1051, 1052].into_iter().collect()),
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelector {
    Member(i64),
    Unit(i64),
    Generation(i64),
    /// Reserved type with no card implementing it yet; never matches.
    StyleType,
    All,
}

impl TargetSelector {
    pub fn parse(target_id: &str) -> Option<Self> {
        if target_id.len() != 5 {
            log::warn!("target id '{target_id}' is not 5 digits, treating as no-match");
            return None;
        }
        let target_type: u8 = target_id[..1].parse().ok()?;
        let value: i64 = target_id[1..].parse().ok()?;
        match target_type {
            1 => Some(TargetSelector::Member(value)),
            2 => Some(TargetSelector::Unit(value)),
            3 => Some(TargetSelector::Generation(value)),
            4 => Some(TargetSelector::StyleType),
            5 => Some(TargetSelector::All),
            other => {
                log::warn!("unknown target type {other} in id '{target_id}'");
                None
            }
        }
    }

    pub fn matches(self, characters_id: i64) -> bool {
        match self {
            TargetSelector::Member(id) => characters_id == id,
            TargetSelector::Unit(group) => UNIT_DICT
                .get(&group)
                .map(|members| members.contains(&characters_id))
                .unwrap_or(false),
            TargetSelector::Generation(prefix) => {
                characters_id.to_string().starts_with(&prefix.to_string())
            }
            TargetSelector::StyleType => false,
            TargetSelector::All => true,
        }
    }
}

/// Comma-joined target ids are OR'd, matching `CheckMultiTarget`.
pub fn matches_any(target_ids: &str, characters_id: i64) -> bool {
    target_ids.split(',').any(|id| {
        TargetSelector::parse(id.trim())
            .map(|t| t.matches(characters_id))
            .unwrap_or(false)
    })
}
