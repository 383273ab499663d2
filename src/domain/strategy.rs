//! Exit strategies: how a signal is split into legs and which legs react to
//! a target being hit.

use std::fmt;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::position::Role;

/// One leg to open for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegPlan {
    pub role: Role,
    pub take_profit: Option<Decimal>,
}

/// Broker work triggered by a target being hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegAction {
    Close(Role),
    MoveStopToEntry(Role),
}

/// Splits signals into legs and maps target hits to leg actions.
pub trait ExitStrategy: Send + Sync {
    /// Name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Legs to open for a target ladder.
    fn plan(&self, take_profits: &[Decimal]) -> Vec<LegPlan>;

    /// Actions for target `level` (1-based). `breakeven` asks for the
    /// surviving leg's stop to move to entry when the first target fires.
    fn on_target(&self, level: u8, breakeven: bool) -> Vec<LegAction>;

    /// Leg whose stop moves to entry on an explicit break-even instruction.
    fn breakeven_role(&self) -> Role;

    /// Target for `role` given a (possibly updated) ladder.
    fn take_profit_for(&self, role: Role, take_profits: &[Decimal]) -> Option<Decimal> {
        if role == Role::Single {
            return take_profits.first().copied();
        }
        self.plan(take_profits)
            .into_iter()
            .find(|leg| leg.role == role)
            .and_then(|leg| leg.take_profit)
    }
}

/// Scalp leg on the first target, runner leg on the last one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DualTargetStrategy;

impl ExitStrategy for DualTargetStrategy {
    fn name(&self) -> &'static str {
        "dual_target"
    }

    fn plan(&self, take_profits: &[Decimal]) -> Vec<LegPlan> {
        let runner_target = if take_profits.len() >= 2 {
            take_profits.last().copied()
        } else {
            None
        };
        vec![
            LegPlan {
                role: Role::Scalp,
                take_profit: take_profits.first().copied(),
            },
            LegPlan {
                role: Role::Runner,
                take_profit: runner_target,
            },
        ]
    }

    fn on_target(&self, level: u8, breakeven: bool) -> Vec<LegAction> {
        match level {
            0 => Vec::new(),
            1 => {
                let mut actions = vec![LegAction::Close(Role::Scalp)];
                if breakeven {
                    actions.push(LegAction::MoveStopToEntry(Role::Runner));
                }
                actions
            }
            _ => vec![LegAction::Close(Role::Runner)],
        }
    }

    fn breakeven_role(&self) -> Role {
        Role::Runner
    }
}

/// One leg on the first target.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleTargetStrategy;

impl ExitStrategy for SingleTargetStrategy {
    fn name(&self) -> &'static str {
        "single"
    }

    fn plan(&self, take_profits: &[Decimal]) -> Vec<LegPlan> {
        vec![LegPlan {
            role: Role::Single,
            take_profit: take_profits.first().copied(),
        }]
    }

    fn on_target(&self, level: u8, _breakeven: bool) -> Vec<LegAction> {
        if level == 0 {
            Vec::new()
        } else {
            vec![LegAction::Close(Role::Single)]
        }
    }

    fn breakeven_role(&self) -> Role {
        Role::Single
    }
}

/// Strategy selector used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    #[serde(alias = "dual", alias = "dual_tp")]
    DualTarget,
    Single,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DualTarget => write!(f, "dual_target"),
            Self::Single => write!(f, "single"),
        }
    }
}

impl StrategyKind {
    /// Build the strategy this selector names.
    #[must_use]
    pub fn build(self) -> Box<dyn ExitStrategy> {
        match self {
            Self::DualTarget => Box::new(DualTargetStrategy),
            Self::Single => Box::new(SingleTargetStrategy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn dual_target_splits_first_and_last() {
        let legs = DualTargetStrategy.plan(&[dec!(2660), dec!(2665), dec!(2670)]);
        assert_eq!(
            legs,
            vec![
                LegPlan {
                    role: Role::Scalp,
                    take_profit: Some(dec!(2660))
                },
                LegPlan {
                    role: Role::Runner,
                    take_profit: Some(dec!(2670))
                },
            ]
        );
    }

    #[test]
    fn dual_target_runner_has_no_target_with_single_level() {
        let legs = DualTargetStrategy.plan(&[dec!(2660)]);
        assert_eq!(legs[1].take_profit, None);
        assert_eq!(legs[0].take_profit, Some(dec!(2660)));
    }

    #[test]
    fn dual_target_first_hit_closes_scalp_and_protects_runner() {
        assert_eq!(
            DualTargetStrategy.on_target(1, true),
            vec![
                LegAction::Close(Role::Scalp),
                LegAction::MoveStopToEntry(Role::Runner)
            ]
        );
        assert_eq!(
            DualTargetStrategy.on_target(1, false),
            vec![LegAction::Close(Role::Scalp)]
        );
        assert_eq!(
            DualTargetStrategy.on_target(3, true),
            vec![LegAction::Close(Role::Runner)]
        );
        assert!(DualTargetStrategy.on_target(0, true).is_empty());
    }

    #[test]
    fn single_closes_on_any_level() {
        assert_eq!(
            SingleTargetStrategy.on_target(2, true),
            vec![LegAction::Close(Role::Single)]
        );
        assert_eq!(
            SingleTargetStrategy.take_profit_for(Role::Single, &[dec!(1.1), dec!(1.2)]),
            Some(dec!(1.1))
        );
    }

    #[test]
    fn take_profit_for_role_follows_plan() {
        let ladder = [dec!(10), dec!(20)];
        assert_eq!(
            DualTargetStrategy.take_profit_for(Role::Runner, &ladder),
            Some(dec!(20))
        );
        assert_eq!(
            DualTargetStrategy.take_profit_for(Role::Scalp, &ladder),
            Some(dec!(10))
        );
    }

    #[test]
    fn strategy_kind_parses_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: StrategyKind,
        }
        let w: Wrapper = toml::from_str("kind = \"dual\"").unwrap();
        assert_eq!(w.kind, StrategyKind::DualTarget);
        let w: Wrapper = toml::from_str("kind = \"single\"").unwrap();
        assert_eq!(w.kind.build().name(), "single");
    }
}
