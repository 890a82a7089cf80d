//! Liquidation waterfall.
//!
//! One deterministic pass over an exit:
//! 1. sort preferred classes most senior first
//! 2. accrue cumulative dividends to the event date
//! 3. pay preference + dividends in seniority order from the exit value
//! 4. split what remains between participating preferred and common,
//!    holding capped classes to their ceiling
//! 5. offer each class the as-converted alternative and re-split the
//!    residual for classes that would rather convert
//!
//! All splits floor to whole cents; the rounding residue goes to the most
//! junior common holder so the exit value is distributed to the cent.

use super::{
    ensure_unique_ids, validate_dividend, CalculationPolicy, CalculationTrace, EngineError,
    EngineResult,
};
use crate::domain::{
    sort_by_seniority, Cents, CommonShareClass, Decimal, LiquidationEvent, Participation,
    PreferredShareClass, SecurityId, SeniorityRank,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionChoice {
    Preferred,
    Common,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredVsCommon {
    /// Preference and dividends actually paid on the preferred path.
    pub as_preferred: Cents,
    /// Take if this class alone converted to common.
    pub as_common: Cents,
    pub optimal_choice: ConversionChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredDistribution {
    pub class_id: SecurityId,
    pub class_name: String,
    pub seniority_rank: SeniorityRank,
    pub liquidation_preference: Cents,
    pub cumulative_dividends: Cents,
    pub participation: Cents,
    /// Received on the as-converted common path.
    pub common_distribution: Cents,
    pub total_distribution: Cents,
    pub preferred_vs_common: PreferredVsCommon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonDistribution {
    pub class_id: SecurityId,
    pub class_name: String,
    pub shares: u64,
    pub total_distribution: Cents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallSummary {
    pub total_distributed: Cents,
    pub total_liquidation_preferences: Cents,
    pub total_cumulative_dividends: Cents,
    pub total_participation: Cents,
    pub total_common_distribution: Cents,
    pub undistributed_amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallResult {
    pub exit_value: Cents,
    pub event_date: NaiveDate,
    /// Most senior first.
    pub preferred: Vec<PreferredDistribution>,
    /// In input order.
    pub common: Vec<CommonDistribution>,
    pub summary: WaterfallSummary,
    pub calculation_steps: Vec<String>,
}

/// What a class is owed before any residual split.
struct Claim<'a> {
    class: &'a PreferredShareClass,
    preference: Cents,
    dividends: Cents,
    /// Total-take ceiling for capped participation.
    ceiling: Option<Cents>,
}

#[derive(Debug, Clone, Copy)]
struct Payment {
    preference: Cents,
    dividends: Cents,
}

impl Payment {
    fn total(&self) -> Cents {
        self.preference + self.dividends
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Preferred(usize),
    Common(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HolderKind {
    /// Non-converted participating preferred; `headroom` is set for capped classes.
    Participant { headroom: Option<Cents> },
    /// Common stock and converted preferred.
    CommonPool,
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    slot: Slot,
    units: Decimal,
    kind: HolderKind,
}

/// How the post-preference pool was shared out.
#[derive(Debug, Clone)]
struct ResidualSplit {
    pool: Cents,
    participation: Vec<Cents>,
    common_path: Vec<Cents>,
    common: Vec<Cents>,
    capped_excess: Cents,
    residue: Cents,
    unallocated: Cents,
}

impl ResidualSplit {
    fn empty(preferred: usize, common: usize) -> Self {
        Self {
            pool: Cents::ZERO,
            participation: vec![Cents::ZERO; preferred],
            common_path: vec![Cents::ZERO; preferred],
            common: vec![Cents::ZERO; common],
            capped_excess: Cents::ZERO,
            residue: Cents::ZERO,
            unallocated: Cents::ZERO,
        }
    }

    fn credit(&mut self, holder: &Holder, amount: Cents) {
        match (holder.slot, holder.kind) {
            (Slot::Preferred(i), HolderKind::Participant { .. }) => self.participation[i] += amount,
            (Slot::Preferred(i), HolderKind::CommonPool) => self.common_path[i] += amount,
            (Slot::Common(j), _) => self.common[j] += amount,
        }
    }
}

/// `floor(amount * units / total)`.
fn pro_rata(amount: Cents, units: Decimal, total: Decimal) -> EngineResult<Cents> {
    let value = amount
        .to_decimal()
        .checked_mul(units)
        .and_then(|product| product.checked_div(total))
        .or_else(|| {
            units
                .checked_div(total)
                .and_then(|share| amount.to_decimal().checked_mul(share))
        })
        .ok_or_else(|| EngineError::out_of_range("pro-rata share"))?;
    Cents::from_decimal_floor(value).ok_or_else(|| EngineError::out_of_range("pro-rata share"))
}

/// Holder that absorbs rounding residue: the most junior common class with
/// shares, else the most junior converted class, else the most junior
/// uncapped participant. A common class without shares is the last resort.
fn residue_holder(holders: &[Holder]) -> Option<&Holder> {
    let common = |h: &&Holder| matches!(h.slot, Slot::Common(_));
    holders
        .iter()
        .rev()
        .filter(common)
        .find(|h| h.units.is_positive())
        .or_else(|| {
            holders
                .iter()
                .rev()
                .find(|h| h.kind == HolderKind::CommonPool && h.units.is_positive())
        })
        .or_else(|| {
            holders.iter().rev().find(|h| {
                h.kind == HolderKind::Participant { headroom: None } && h.units.is_positive()
            })
        })
        .or_else(|| holders.iter().rev().find(common))
}

/// Share the pool left after preferences. Classes flagged in `converting`
/// give up their preference payment, which returns to the pool, and join
/// the common pool at their as-converted share count.
fn split_residual(
    claims: &[Claim<'_>],
    payments: &[Payment],
    remaining: Cents,
    converting: &[bool],
    common: &[CommonShareClass],
) -> EngineResult<ResidualSplit> {
    let mut split = ResidualSplit::empty(claims.len(), common.len());

    let mut pool = remaining;
    for (payment, converts) in payments.iter().zip(converting) {
        if *converts {
            pool = pool
                .checked_add(payment.total())
                .ok_or_else(|| EngineError::out_of_range("residual pool"))?;
        }
    }
    split.pool = pool;
    if pool.is_zero() {
        return Ok(split);
    }

    let mut holders = Vec::with_capacity(claims.len() + common.len());
    for (i, claim) in claims.iter().enumerate() {
        let units = claim
            .class
            .as_converted_shares()
            .ok_or_else(|| EngineError::out_of_range("as-converted shares"))?;
        if converting[i] {
            holders.push(Holder {
                slot: Slot::Preferred(i),
                units,
                kind: HolderKind::CommonPool,
            });
        } else if claim.class.participation.participates() {
            let headroom = claim
                .ceiling
                .map(|ceiling| ceiling.saturating_sub(payments[i].total()));
            holders.push(Holder {
                slot: Slot::Preferred(i),
                units,
                kind: HolderKind::Participant { headroom },
            });
        }
    }
    for (j, class) in common.iter().enumerate() {
        holders.push(Holder {
            slot: Slot::Common(j),
            units: Decimal::from_u64(class.shares),
            kind: HolderKind::CommonPool,
        });
    }

    let total_units = holders
        .iter()
        .try_fold(Decimal::zero(), |acc, h| acc.checked_add(h.units))
        .ok_or_else(|| EngineError::out_of_range("total as-converted shares"))?;
    if !total_units.is_positive() {
        split.unallocated = pool;
        return Ok(split);
    }

    let mut allocated = Cents::ZERO;
    let mut excess = Cents::ZERO;
    for holder in &holders {
        let mut share = pro_rata(pool, holder.units, total_units)?;
        if let HolderKind::Participant {
            headroom: Some(room),
        } = holder.kind
        {
            if share > room {
                excess += share - room;
                share = room;
            }
        }
        split.credit(holder, share);
        allocated += share;
    }

    if excess.is_positive() {
        split.capped_excess = excess;
        let mut recipients: Vec<&Holder> = holders
            .iter()
            .filter(|h| h.kind == HolderKind::CommonPool && h.units.is_positive())
            .collect();
        if recipients.is_empty() {
            recipients = holders
                .iter()
                .filter(|h| {
                    h.kind == HolderKind::Participant { headroom: None } && h.units.is_positive()
                })
                .collect();
        }

        if recipients.is_empty() {
            split.unallocated += excess;
        } else {
            let units: Decimal = recipients.iter().map(|h| h.units).sum();
            for holder in recipients {
                let share = pro_rata(excess, holder.units, units)?;
                split.credit(holder, share);
                allocated += share;
            }
        }
    }

    let residue = pool - allocated - split.unallocated;
    if residue.is_positive() {
        match residue_holder(&holders) {
            Some(holder) => {
                split.credit(holder, residue);
                split.residue = residue;
            }
            None => split.unallocated += residue,
        }
    }

    Ok(split)
}

/// Runs liquidation waterfalls under a fixed [`CalculationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WaterfallEngine {
    policy: CalculationPolicy,
}

impl WaterfallEngine {
    pub fn new(policy: CalculationPolicy) -> Self {
        Self { policy }
    }

    /// Distribute `event.exit_value` across the preferred and common classes.
    pub fn run(
        &self,
        preferred: &[PreferredShareClass],
        common: &[CommonShareClass],
        event: &LiquidationEvent,
    ) -> EngineResult<WaterfallResult> {
        validate(preferred, common, event)?;
        let ordered = sort_by_seniority(preferred)?;

        let mut trace = CalculationTrace::new();
        trace.step(format!(
            "Exit value = {} on {}",
            event.exit_value, event.event_date
        ));

        let claims = ordered
            .into_iter()
            .map(|class| self.claim(class, event.event_date))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut remaining = event.exit_value;
        let mut payments = Vec::with_capacity(claims.len());
        for claim in &claims {
            let preference = claim.preference.min(remaining);
            remaining -= preference;
            let dividends = claim.dividends.min(remaining);
            remaining -= dividends;
            trace.step(format!(
                "{} (rank {}): preference {} ({}x of {}) + dividends {}; paid {} + {}; pool remaining {}",
                claim.class.name,
                claim.class.seniority_rank,
                claim.preference,
                claim.class.liquidation_multiple,
                claim.class.original_investment,
                claim.dividends,
                preference,
                dividends,
                remaining
            ));
            payments.push(Payment {
                preference,
                dividends,
            });
        }

        let nobody = vec![false; claims.len()];
        let tentative = split_residual(&claims, &payments, remaining, &nobody, common)?;

        let mut choices = Vec::with_capacity(claims.len());
        for (i, claim) in claims.iter().enumerate() {
            let mut alone = nobody.clone();
            alone[i] = true;
            let as_common =
                split_residual(&claims, &payments, remaining, &alone, common)?.common_path[i];
            let as_preferred = payments[i].total();
            let participation = tentative.participation[i];
            let optimal_choice = if as_common > as_preferred + participation {
                ConversionChoice::Common
            } else {
                ConversionChoice::Preferred
            };
            trace.step(format!(
                "{}: as preferred {} + participation {} vs as common {} -> {:?}",
                claim.class.name, as_preferred, participation, as_common, optimal_choice
            ));
            choices.push(PreferredVsCommon {
                as_preferred,
                as_common,
                optimal_choice,
            });
        }

        let converting: Vec<bool> = choices
            .iter()
            .map(|c| c.optimal_choice == ConversionChoice::Common)
            .collect();
        let split = if converting.iter().any(|c| *c) {
            split_residual(&claims, &payments, remaining, &converting, common)?
        } else {
            tentative
        };

        if split.unallocated.is_positive() {
            return Err(EngineError::configuration(format!(
                "{} of residual proceeds has no eligible holder (no common shares and no \
                 uncapped participating or converting preferred)",
                split.unallocated
            )));
        }

        trace.step(format!(
            "Residual pool {} shared pro-rata as converted",
            split.pool
        ));
        if split.capped_excess.is_positive() {
            trace.step(format!(
                "Participation above caps returned to the common pool: {}",
                split.capped_excess
            ));
        }
        if split.residue.is_positive() {
            trace.step(format!(
                "Rounding residue {} allocated to the most junior common holder",
                split.residue
            ));
        }

        let mut distributions = Vec::with_capacity(claims.len());
        for (i, claim) in claims.iter().enumerate() {
            let (preference, dividends, participation) = if converting[i] {
                (Cents::ZERO, Cents::ZERO, Cents::ZERO)
            } else {
                (
                    payments[i].preference,
                    payments[i].dividends,
                    split.participation[i],
                )
            };
            let common_distribution = split.common_path[i];
            let total = preference + dividends + participation + common_distribution;
            trace.step(format!(
                "{} total = {} preference + {} dividends + {} participation + {} as common = {}",
                claim.class.name, preference, dividends, participation, common_distribution, total
            ));
            distributions.push(PreferredDistribution {
                class_id: claim.class.id.clone(),
                class_name: claim.class.name.clone(),
                seniority_rank: claim.class.seniority_rank,
                liquidation_preference: preference,
                cumulative_dividends: dividends,
                participation,
                common_distribution,
                total_distribution: total,
                preferred_vs_common: choices[i],
            });
        }

        let common_distributions: Vec<CommonDistribution> = common
            .iter()
            .zip(&split.common)
            .map(|(class, amount)| {
                trace.step(format!(
                    "{} ({} shares) receives {}",
                    class.name, class.shares, amount
                ));
                CommonDistribution {
                    class_id: class.id.clone(),
                    class_name: class.name.clone(),
                    shares: class.shares,
                    total_distribution: *amount,
                }
            })
            .collect();

        let summary = summarize(event.exit_value, &distributions, &common_distributions);
        debug_assert_eq!(summary.undistributed_amount, Cents::ZERO);
        if !summary.undistributed_amount.is_zero() {
            return Err(EngineError::invariant(format!(
                "distributed {} of exit value {}",
                summary.total_distributed, event.exit_value
            )));
        }
        trace.step(format!(
            "Total distributed = {} (undistributed {})",
            summary.total_distributed, summary.undistributed_amount
        ));

        Ok(WaterfallResult {
            exit_value: event.exit_value,
            event_date: event.event_date,
            preferred: distributions,
            common: common_distributions,
            summary,
            calculation_steps: trace.into_steps(),
        })
    }

    fn claim<'a>(
        &self,
        class: &'a PreferredShareClass,
        event_date: NaiveDate,
    ) -> EngineResult<Claim<'a>> {
        let preference = class
            .bare_preference()
            .ok_or_else(|| EngineError::out_of_range("liquidation preference"))?;
        let dividends = class
            .dividend
            .accrued(
                class.original_investment,
                class.issuance_date,
                event_date,
                self.policy.day_count,
            )
            .ok_or_else(|| EngineError::out_of_range("cumulative dividends"))?;
        let ceiling = class
            .participation_ceiling()
            .ok_or_else(|| EngineError::out_of_range("participation cap"))?;
        Ok(Claim {
            class,
            preference,
            dividends,
            ceiling,
        })
    }
}

fn validate(
    preferred: &[PreferredShareClass],
    common: &[CommonShareClass],
    event: &LiquidationEvent,
) -> EngineResult<()> {
    if event.exit_value.is_negative() {
        return Err(EngineError::validation(format!(
            "exit value must be non-negative, got {}",
            event.exit_value
        )));
    }
    ensure_unique_ids(
        preferred.iter().map(|c| &c.id).chain(common.iter().map(|c| &c.id)),
        "share class",
    )?;

    for class in preferred {
        if class.original_investment.is_negative() {
            return Err(EngineError::validation(format!(
                "{}: original investment must be non-negative, got {}",
                class.id, class.original_investment
            )));
        }
        if class.liquidation_multiple.is_negative() {
            return Err(EngineError::validation(format!(
                "{}: liquidation multiple must be non-negative, got {}",
                class.id, class.liquidation_multiple
            )));
        }
        if !class.conversion_ratio.is_positive() {
            return Err(EngineError::validation(format!(
                "{}: conversion ratio must be positive, got {}",
                class.id, class.conversion_ratio
            )));
        }
        if class.as_converted_shares().is_none() {
            return Err(EngineError::out_of_range(&format!(
                "{}: as-converted shares",
                class.id
            )));
        }
        validate_dividend(&class.id, &class.dividend)?;

        if let Participation::ParticipatingCapped { cap } = class.participation {
            if cap < class.liquidation_multiple {
                return Err(EngineError::configuration(format!(
                    "{}: participation cap {}x ({}) is below liquidation preference {}x ({})",
                    class.id,
                    cap,
                    class.original_investment.mul_ratio(cap).unwrap_or_default(),
                    class.liquidation_multiple,
                    class.bare_preference().unwrap_or_default()
                )));
            }
        }
    }
    Ok(())
}

fn summarize(
    exit_value: Cents,
    preferred: &[PreferredDistribution],
    common: &[CommonDistribution],
) -> WaterfallSummary {
    let total_liquidation_preferences: Cents =
        preferred.iter().map(|d| d.liquidation_preference).sum();
    let total_cumulative_dividends: Cents = preferred.iter().map(|d| d.cumulative_dividends).sum();
    let total_participation: Cents = preferred.iter().map(|d| d.participation).sum();
    let total_common_distribution: Cents = preferred
        .iter()
        .map(|d| d.common_distribution)
        .chain(common.iter().map(|d| d.total_distribution))
        .sum();
    let total_distributed = total_liquidation_preferences
        + total_cumulative_dividends
        + total_participation
        + total_common_distribution;

    WaterfallSummary {
        total_distributed,
        total_liquidation_preferences,
        total_cumulative_dividends,
        total_participation,
        total_common_distribution,
        undistributed_amount: exit_value - total_distributed,
    }
}
