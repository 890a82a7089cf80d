//! SAFE conversions at a priced round or a liquidity event.
//!
//! Priced round: the note converts at the lower of its cap price
//! (`valuation_cap / existing shares`) and its discount price
//! (`round price * (1 - discount)`), so the investor gets the larger share
//! count. Shares are floored; a conversion never grants more value than was
//! invested.
//!
//! Liquidity event: there is no round price, so capped notes take their
//! ownership at the cap (`investment / valuation_cap`) of the exit value.
//! Discount-only notes are cashed out at their purchase amount.

use super::mfn::{apply_most_favored_nation, validate_note_terms};
use super::{CalculationTrace, EngineError, EngineResult};
use crate::domain::{
    CapTableSnapshot, Cents, Decimal, EquityRound, LiquidationEvent, SafeNote, SecurityId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which price a conversion settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceBasis {
    ValuationCap,
    Discount,
    /// Discount-only note repaid at a liquidity event.
    CashOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProRataAnalysis {
    pub eligible: bool,
    /// `investment / round investment`.
    pub percentage_of_round: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeConversionResult {
    pub note_id: SecurityId,
    pub investor_name: String,
    pub investment_amount: Cents,
    /// Cents per share.
    pub conversion_price: Decimal,
    pub cap_price: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    pub price_basis: PriceBasis,
    pub shares_received: u64,
    pub return_multiple: Decimal,
    /// Value of the converted stake: at the round price for a priced round,
    /// the share of exit proceeds for a liquidity event.
    pub implied_valuation: Option<Cents>,
    pub pro_rata_analysis: Option<ProRataAnalysis>,
    pub calculation_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBatchAnalysis {
    pub round_name: String,
    /// Notes after MFN cascading, in input order.
    pub notes: Vec<SafeNote>,
    pub conversions: Vec<SafeConversionResult>,
    /// Notes already marked converted.
    pub skipped_note_ids: Vec<SecurityId>,
    pub total_safe_investment: Cents,
    pub total_shares_issued: u64,
    /// Snapshot fully-diluted shares plus shares issued to the SAFEs.
    pub post_conversion_fully_diluted_shares: u64,
    pub total_ownership_to_safes: Decimal,
    pub calculation_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeLiquidityAnalysis {
    pub exit_value: Cents,
    pub event_date: NaiveDate,
    pub notes: Vec<SafeNote>,
    pub conversions: Vec<SafeConversionResult>,
    pub skipped_note_ids: Vec<SecurityId>,
    pub total_safe_investment: Cents,
    pub total_implied_value: Cents,
    pub total_shares_issued: u64,
    pub calculation_steps: Vec<String>,
}

fn validate_note(note: &SafeNote) -> EngineResult<()> {
    if !note.investment_amount.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: investment amount must be positive, got {}",
            note.id, note.investment_amount
        )));
    }
    validate_note_terms(note)
}

fn validate_round(round: &EquityRound) -> EngineResult<()> {
    if !round.price_per_share.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: price per share must be positive, got {} cents",
            round.name,
            round.price_per_share.as_i64()
        )));
    }
    if round.investment_amount.is_negative() {
        return Err(EngineError::validation(format!(
            "{}: investment amount must be non-negative, got {}",
            round.name, round.investment_amount
        )));
    }
    Ok(())
}

fn whole_shares(investment: Cents, price: Decimal) -> EngineResult<u64> {
    investment
        .to_decimal()
        .checked_div(price)
        .and_then(|shares| shares.floor().to_u64())
        .ok_or_else(|| EngineError::out_of_range("shares received"))
}

/// Converts SAFE notes. Stateless; every call is independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeConversionEngine;

impl SafeConversionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Convert one note into `round`. `existing_shares_at_cap` is the share
    /// count the valuation cap is divided by.
    pub fn convert_safe_in_equity_round(
        &self,
        note: &SafeNote,
        round: &EquityRound,
        existing_shares_at_cap: u64,
    ) -> EngineResult<SafeConversionResult> {
        if note.converted {
            return Err(EngineError::validation(format!(
                "{}: note has already converted",
                note.id
            )));
        }
        validate_note(note)?;
        validate_round(round)?;

        let mut trace = CalculationTrace::new();
        let investment = note.investment_amount.to_decimal();
        let round_price = round.price_per_share.to_decimal();
        trace.step(format!(
            "{} ({}): {} into {} at {} cents/share",
            note.investor_name,
            note.terms.label(),
            note.investment_amount,
            round.name,
            round_price
        ));

        let cap_price = match note.valuation_cap() {
            Some(cap) => {
                if existing_shares_at_cap == 0 {
                    return Err(EngineError::validation(format!(
                        "{}: existing shares for the cap price must be positive",
                        note.id
                    )));
                }
                let price = cap.to_decimal() / Decimal::from_u64(existing_shares_at_cap);
                trace.step(format!(
                    "Cap price = {} / {} shares = {}",
                    cap, existing_shares_at_cap, price
                ));
                Some(price)
            }
            None => None,
        };

        let discount_price = note.discount_rate().map(|rate| {
            let price = round_price * (Decimal::one() - rate);
            trace.step(format!(
                "Discount price = {} x (1 - {}) = {}",
                round_price, rate, price
            ));
            price
        });

        let (conversion_price, price_basis) = match (cap_price, discount_price) {
            (Some(cap), Some(discount)) if discount < cap => (discount, PriceBasis::Discount),
            (Some(cap), _) => (cap, PriceBasis::ValuationCap),
            (None, Some(discount)) => (discount, PriceBasis::Discount),
            (None, None) => {
                return Err(EngineError::validation(format!(
                    "{}: note carries neither a valuation cap nor a discount",
                    note.id
                )))
            }
        };
        trace.step(format!(
            "Conversion price = {} ({:?})",
            conversion_price, price_basis
        ));

        let shares_received = whole_shares(note.investment_amount, conversion_price)?;
        let paid = Decimal::from_u64(shares_received) * conversion_price;
        debug_assert!(paid <= investment);
        if paid > investment {
            return Err(EngineError::invariant(format!(
                "{}: {} shares at {} exceed investment {}",
                note.id, shares_received, conversion_price, note.investment_amount
            )));
        }
        trace.step(format!(
            "Shares = floor({} / {}) = {}",
            investment, conversion_price, shares_received
        ));

        let stake_value = Decimal::from_u64(shares_received)
            .checked_mul(round_price)
            .ok_or_else(|| EngineError::out_of_range("implied valuation"))?;
        let return_multiple = stake_value / investment;
        let implied_valuation = Cents::from_decimal_round_half_even(stake_value)
            .ok_or_else(|| EngineError::out_of_range("implied valuation"))?;
        trace.step(format!(
            "Return multiple = {} x {} / {} = {}",
            shares_received, round_price, investment, return_multiple
        ));

        let pro_rata_analysis = if note.pro_rata_rights {
            let round_investment = round.investment_amount.to_decimal();
            let percentage_of_round = investment.checked_div(round_investment).ok_or_else(|| {
                EngineError::validation(format!(
                    "{}: round investment must be positive for pro-rata analysis",
                    round.name
                ))
            })?;
            trace.step(format!(
                "Pro-rata: {} / {} = {}",
                note.investment_amount, round.investment_amount, percentage_of_round
            ));
            Some(ProRataAnalysis {
                eligible: true,
                percentage_of_round,
            })
        } else {
            None
        };

        Ok(SafeConversionResult {
            note_id: note.id.clone(),
            investor_name: note.investor_name.clone(),
            investment_amount: note.investment_amount,
            conversion_price,
            cap_price,
            discount_price,
            price_basis,
            shares_received,
            return_multiple,
            implied_valuation: Some(implied_valuation),
            pro_rata_analysis,
            calculation_steps: trace.into_steps(),
        })
    }

    /// Cascade MFN terms, then convert every unconverted note into `round`
    /// against the snapshot's fully-diluted shares.
    pub fn analyze_safe_conversions(
        &self,
        notes: &[SafeNote],
        round: &EquityRound,
        cap_table: &CapTableSnapshot,
    ) -> EngineResult<SafeBatchAnalysis> {
        validate_round(round)?;
        if cap_table.fully_diluted_shares == 0 {
            return Err(EngineError::validation(
                "fully diluted shares must be positive",
            ));
        }
        let notes = apply_most_favored_nation(notes)?;
        let mut trace = CalculationTrace::new();
        for note in &notes {
            for adjustment in &note.mfn_adjustments {
                trace.step(format!(
                    "MFN: {} adopts {:?} from {}",
                    note.id, adjustment.improvement, adjustment.source_note_id
                ));
            }
        }

        let mut conversions = Vec::new();
        let mut skipped_note_ids = Vec::new();
        for note in &notes {
            if note.converted {
                trace.step(format!("{} already converted; skipped", note.id));
                skipped_note_ids.push(note.id.clone());
                continue;
            }
            let result =
                self.convert_safe_in_equity_round(note, round, cap_table.fully_diluted_shares)?;
            trace.step(format!(
                "{} receives {} shares at {} ({:?})",
                note.id, result.shares_received, result.conversion_price, result.price_basis
            ));
            conversions.push(result);
        }

        let total_safe_investment = conversions
            .iter()
            .try_fold(Cents::ZERO, |acc, c| acc.checked_add(c.investment_amount))
            .ok_or_else(|| EngineError::out_of_range("total SAFE investment"))?;
        let total_shares_issued = conversions
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.shares_received))
            .ok_or_else(|| EngineError::out_of_range("total shares issued"))?;
        let post_conversion_fully_diluted_shares = cap_table
            .fully_diluted_shares
            .checked_add(total_shares_issued)
            .ok_or_else(|| EngineError::out_of_range("post-conversion shares"))?;
        let total_ownership_to_safes = Decimal::from_u64(total_shares_issued)
            / Decimal::from_u64(post_conversion_fully_diluted_shares);
        trace.step(format!(
            "SAFE ownership = {} / {} = {}",
            total_shares_issued, post_conversion_fully_diluted_shares, total_ownership_to_safes
        ));

        Ok(SafeBatchAnalysis {
            round_name: round.name.clone(),
            notes,
            conversions,
            skipped_note_ids,
            total_safe_investment,
            total_shares_issued,
            post_conversion_fully_diluted_shares,
            total_ownership_to_safes,
            calculation_steps: trace.into_steps(),
        })
    }

    /// Settle every unconverted note at an exit.
    pub fn convert_safes_in_liquidity_event(
        &self,
        notes: &[SafeNote],
        event: &LiquidationEvent,
        cap_table: &CapTableSnapshot,
    ) -> EngineResult<SafeLiquidityAnalysis> {
        if event.exit_value.is_negative() {
            return Err(EngineError::validation(format!(
                "exit value must be non-negative, got {}",
                event.exit_value
            )));
        }
        if cap_table.fully_diluted_shares == 0 {
            return Err(EngineError::validation(
                "fully diluted shares must be positive",
            ));
        }
        let notes = apply_most_favored_nation(notes)?;
        let fully_diluted = Decimal::from_u64(cap_table.fully_diluted_shares);
        let exit_value = event.exit_value.to_decimal();

        let mut trace = CalculationTrace::new();
        trace.step(format!(
            "Liquidity event {} on {}",
            event.exit_value, event.event_date
        ));

        let mut conversions = Vec::new();
        let mut skipped_note_ids = Vec::new();
        for note in &notes {
            if note.converted {
                skipped_note_ids.push(note.id.clone());
                continue;
            }
            validate_note(note)?;
            let investment = note.investment_amount.to_decimal();
            let mut steps = CalculationTrace::new();

            let result = match note.valuation_cap() {
                Some(cap) => {
                    let ownership = investment / cap.to_decimal();
                    let implied = exit_value
                        .checked_mul(ownership)
                        .and_then(Cents::from_decimal_round_half_even)
                        .ok_or_else(|| EngineError::out_of_range("implied valuation"))?;
                    let conversion_price = cap.to_decimal() / fully_diluted;
                    let shares_received = whole_shares(note.investment_amount, conversion_price)?;
                    let return_multiple = implied.to_decimal() / investment;
                    steps.step(format!(
                        "Ownership at cap = {} / {} = {}",
                        note.investment_amount, cap, ownership
                    ));
                    steps.step(format!(
                        "Implied value = {} x {} = {}",
                        event.exit_value, ownership, implied
                    ));
                    steps.step(format!(
                        "Return multiple = {} / {} = {}",
                        implied, note.investment_amount, return_multiple
                    ));
                    SafeConversionResult {
                        note_id: note.id.clone(),
                        investor_name: note.investor_name.clone(),
                        investment_amount: note.investment_amount,
                        conversion_price,
                        cap_price: Some(conversion_price),
                        discount_price: None,
                        price_basis: PriceBasis::ValuationCap,
                        shares_received,
                        return_multiple,
                        implied_valuation: Some(implied),
                        pro_rata_analysis: None,
                        calculation_steps: steps.into_steps(),
                    }
                }
                None => {
                    let conversion_price = exit_value / fully_diluted;
                    let shares_received = if conversion_price.is_positive() {
                        whole_shares(note.investment_amount, conversion_price)?
                    } else {
                        0
                    };
                    steps.step(format!(
                        "No cap: cash-out of purchase amount {}",
                        note.investment_amount
                    ));
                    SafeConversionResult {
                        note_id: note.id.clone(),
                        investor_name: note.investor_name.clone(),
                        investment_amount: note.investment_amount,
                        conversion_price,
                        cap_price: None,
                        discount_price: None,
                        price_basis: PriceBasis::CashOut,
                        shares_received,
                        return_multiple: Decimal::one(),
                        implied_valuation: Some(note.investment_amount),
                        pro_rata_analysis: None,
                        calculation_steps: steps.into_steps(),
                    }
                }
            };
            trace.step(format!(
                "{} settles for {} ({:?})",
                note.id,
                result.implied_valuation.unwrap_or_default(),
                result.price_basis
            ));
            conversions.push(result);
        }

        let total_safe_investment = conversions
            .iter()
            .try_fold(Cents::ZERO, |acc, c| acc.checked_add(c.investment_amount))
            .ok_or_else(|| EngineError::out_of_range("total SAFE investment"))?;
        let total_implied_value = conversions
            .iter()
            .filter_map(|c| c.implied_valuation)
            .try_fold(Cents::ZERO, |acc, value| acc.checked_add(value))
            .ok_or_else(|| EngineError::out_of_range("total implied value"))?;
        let total_shares_issued = conversions
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.shares_received))
            .ok_or_else(|| EngineError::out_of_range("total shares issued"))?;

        Ok(SafeLiquidityAnalysis {
            exit_value: event.exit_value,
            event_date: event.event_date,
            notes,
            conversions,
            skipped_note_ids,
            total_safe_investment,
            total_implied_value,
            total_shares_issued,
            calculation_steps: trace.into_steps(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SafeTerms;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn round(price_cents: i64) -> EquityRound {
        EquityRound {
            name: "Series A".to_string(),
            investment_amount: Cents::from_dollars(5_000_000),
            price_per_share: Cents(price_cents),
            pre_money_valuation: Cents::from_dollars(20_000_000),
            share_class: "Series A Preferred".to_string(),
            existing_shares: 5_000_000,
            existing_valuation: Cents::from_dollars(20_000_000),
            liquidation_preference: Decimal::one(),
            anti_dilution_provision: false,
            participating_preferred: false,
        }
    }

    fn note(terms: SafeTerms) -> SafeNote {
        SafeNote {
            id: SecurityId::new("safe-1"),
            investor_name: "Angel".to_string(),
            investment_amount: Cents::from_dollars(100_000),
            terms,
            most_favored_nation: false,
            pro_rata_rights: false,
            issuance_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            converted: false,
            mfn_adjustments: Vec::new(),
        }
    }

    #[test]
    fn test_cap_without_discount_beats_round_price() {
        let n = note(SafeTerms::PreMoneyValuationCap {
            valuation_cap: Cents::from_dollars(5_000_000),
            discount_rate: None,
        });
        let result = SafeConversionEngine::new()
            .convert_safe_in_equity_round(&n, &round(200), 5_000_000)
            .unwrap();
        assert_eq!(result.conversion_price, d("100"));
        assert_eq!(result.price_basis, PriceBasis::ValuationCap);
        assert_eq!(result.shares_received, 100_000);
        assert_eq!(result.return_multiple, d("2"));
    }

    #[test]
    fn test_cap_only_note_converts_at_cap_price_above_round_price() {
        let n = note(SafeTerms::PostMoneyValuationCap {
            valuation_cap: Cents::from_dollars(50_000_000),
            discount_rate: None,
        });
        let result = SafeConversionEngine::new()
            .convert_safe_in_equity_round(&n, &round(200), 5_000_000)
            .unwrap();
        // $50M / 5M shares = 1000 cents, above the 200 cent round price.
        assert_eq!(result.cap_price, Some(d("1000")));
        assert_eq!(result.conversion_price, d("1000"));
        assert_eq!(result.price_basis, PriceBasis::ValuationCap);
        assert_eq!(result.shares_received, 10_000);
        assert_eq!(result.return_multiple, d("0.2"));
    }

    #[test]
    fn test_shares_are_floored() {
        let n = note(SafeTerms::DiscountOnly {
            discount_rate: d("0.2"),
        });
        // 10,000,000 cents / 240 = 41,666.67
        let result = SafeConversionEngine::new()
            .convert_safe_in_equity_round(&n, &round(300), 0)
            .unwrap();
        assert_eq!(result.shares_received, 41_666);
        assert_eq!(result.cap_price, None);
    }

    #[test]
    fn test_converted_note_rejected() {
        let mut n = note(SafeTerms::DiscountOnly {
            discount_rate: d("0.2"),
        });
        n.converted = true;
        let err = SafeConversionEngine::new()
            .convert_safe_in_equity_round(&n, &round(300), 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_pro_rata_only_with_rights() {
        let mut n = note(SafeTerms::DiscountOnly {
            discount_rate: d("0.2"),
        });
        let engine = SafeConversionEngine::new();
        let without = engine
            .convert_safe_in_equity_round(&n, &round(300), 0)
            .unwrap();
        assert!(without.pro_rata_analysis.is_none());

        n.pro_rata_rights = true;
        let with = engine
            .convert_safe_in_equity_round(&n, &round(300), 0)
            .unwrap();
        assert_eq!(with.pro_rata_analysis.unwrap().percentage_of_round, d("0.02"));
    }
}
