//! Packed-integer condition/effect mini-languages (component D). Every
//! sub-module ports one family from `SkillResolver.py`; malformed or
//! unrecognized ids are logged and treated as a no-op effect / unsatisfied
//! condition rather than raised as an error (see [`crate::error`]'s module
//! doc comment for the policy this follows).

pub mod center_attribute;
pub mod center_skill;
pub mod condition;
pub mod effect;
pub mod target;

pub use center_attribute::{apply_center_attribute, CenterAttributeEffect};
pub use center_skill::{apply_center_skill_effect, check_center_skill_condition, PhaseEvent};
pub use condition::{check_condition, check_multi_condition, ComparisonOperator, SkillCondition};
pub use effect::{apply_effect, use_card_skill, SkillEffect};
pub use target::{matches_any, TargetSelector};
