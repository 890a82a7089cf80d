//! Most-favored-nation term cascading across a batch of SAFE notes.

use super::{ensure_unique_ids, EngineError, EngineResult};
use crate::domain::{Cents, Decimal, MfnAdjustment, MfnImprovement, SafeNote};

/// Discount rates live in `[0, 1)`; caps must be positive.
pub(crate) fn validate_note_terms(note: &SafeNote) -> EngineResult<()> {
    if let Some(rate) = note.discount_rate() {
        if rate.is_negative() || rate >= Decimal::one() {
            return Err(EngineError::validation(format!(
                "{}: discount rate must be in [0, 1), got {}",
                note.id, rate
            )));
        }
    }
    if let Some(cap) = note.valuation_cap() {
        if !cap.is_positive() {
            return Err(EngineError::validation(format!(
                "{}: valuation cap must be positive, got {}",
                note.id, cap
            )));
        }
    }
    Ok(())
}

/// Give every MFN-flagged note the best discount and the lowest cap found
/// on any other note in the batch.
///
/// Candidates are read from the notes as passed in, so the outcome does not
/// depend on the order MFN holders are visited. A term is adopted only when
/// it strictly beats the holder's own; on ties the earliest note in input
/// order is recorded as the source. Discount-only notes never gain a cap.
/// Running the result through again changes nothing.
pub fn apply_most_favored_nation(notes: &[SafeNote]) -> EngineResult<Vec<SafeNote>> {
    ensure_unique_ids(notes.iter().map(|n| &n.id), "SAFE note")?;
    for note in notes {
        validate_note_terms(note)?;
    }

    let mut adjusted = Vec::with_capacity(notes.len());
    for (index, note) in notes.iter().enumerate() {
        let mut note = note.clone();
        if !note.most_favored_nation {
            adjusted.push(note);
            continue;
        }
        let others = || {
            notes
                .iter()
                .enumerate()
                .filter(move |(i, _)| *i != index)
                .map(|(_, n)| n)
        };

        let own_discount = note.discount_rate();
        let best_discount = others()
            .filter_map(|n| n.discount_rate().map(|rate| (rate, n)))
            .fold(None, |best: Option<(Decimal, &SafeNote)>, (rate, n)| match best {
                Some((top, _)) if top >= rate => best,
                _ => Some((rate, n)),
            });
        if let Some((rate, source)) = best_discount {
            if rate > own_discount.unwrap_or_else(Decimal::zero) {
                note.terms = note.terms.with_discount_rate(rate);
                note.mfn_adjustments.push(MfnAdjustment {
                    improvement: MfnImprovement::DiscountRate {
                        previous: own_discount,
                        adopted: rate,
                    },
                    source_note_id: source.id.clone(),
                    source_investor: source.investor_name.clone(),
                });
            }
        }

        if let Some(own_cap) = note.valuation_cap() {
            let best_cap = others()
                .filter_map(|n| n.valuation_cap().map(|cap| (cap, n)))
                .fold(None, |best: Option<(Cents, &SafeNote)>, (cap, n)| match best {
                    Some((low, _)) if low <= cap => best,
                    _ => Some((cap, n)),
                });
            if let Some((cap, source)) = best_cap {
                if cap < own_cap {
                    note.terms = note.terms.with_valuation_cap(cap);
                    note.mfn_adjustments.push(MfnAdjustment {
                        improvement: MfnImprovement::ValuationCap {
                            previous: own_cap,
                            adopted: cap,
                        },
                        source_note_id: source.id.clone(),
                        source_investor: source.investor_name.clone(),
                    });
                }
            }
        }

        adjusted.push(note);
    }
    Ok(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SafeTerms, SecurityId};
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn note(id: &str, terms: SafeTerms, mfn: bool) -> SafeNote {
        SafeNote {
            id: SecurityId::new(id),
            investor_name: format!("Investor {}", id),
            investment_amount: Cents::from_dollars(100_000),
            terms,
            most_favored_nation: mfn,
            pro_rata_rights: false,
            issuance_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            converted: false,
            mfn_adjustments: Vec::new(),
        }
    }

    fn capped(cap: i64, discount: Option<&str>) -> SafeTerms {
        SafeTerms::PostMoneyValuationCap {
            valuation_cap: Cents::from_dollars(cap),
            discount_rate: discount.map(d),
        }
    }

    #[test]
    fn test_mfn_note_adopts_best_terms_independently() {
        let notes = vec![
            note("early", capped(10_000_000, None), true),
            note("later", capped(8_000_000, Some("0.10")), false),
            note("other", capped(12_000_000, Some("0.25")), false),
        ];
        let out = apply_most_favored_nation(&notes).unwrap();

        assert_eq!(out[0].valuation_cap(), Some(Cents::from_dollars(8_000_000)));
        assert_eq!(out[0].discount_rate(), Some(d("0.25")));
        assert_eq!(out[0].mfn_adjustments.len(), 2);
        assert_eq!(out[1], notes[1]);
        assert_eq!(out[2], notes[2]);
    }

    #[test]
    fn test_non_mfn_notes_untouched() {
        let notes = vec![
            note("a", capped(10_000_000, None), false),
            note("b", capped(5_000_000, Some("0.2")), false),
        ];
        assert_eq!(apply_most_favored_nation(&notes).unwrap(), notes);
    }

    #[test]
    fn test_discount_only_never_gains_cap() {
        let notes = vec![
            note("disc", SafeTerms::DiscountOnly { discount_rate: d("0.15") }, true),
            note("cap", capped(6_000_000, Some("0.10")), false),
        ];
        let out = apply_most_favored_nation(&notes).unwrap();
        assert_eq!(out[0].valuation_cap(), None);
        assert!(out[0].mfn_adjustments.is_empty());
    }

    #[test]
    fn test_application_is_idempotent() {
        let notes = vec![
            note("a", capped(10_000_000, Some("0.1")), true),
            note("b", capped(7_000_000, Some("0.2")), true),
            note("c", SafeTerms::DiscountOnly { discount_rate: d("0.3") }, true),
        ];
        let once = apply_most_favored_nation(&notes).unwrap();
        let twice = apply_most_favored_nation(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tie_records_first_source() {
        let notes = vec![
            note("holder", capped(10_000_000, None), true),
            note("x", capped(9_000_000, None), false),
            note("y", capped(9_000_000, None), false),
        ];
        let out = apply_most_favored_nation(&notes).unwrap();
        assert_eq!(out[0].mfn_adjustments[0].source_note_id, SecurityId::new("x"));
    }

    #[test]
    fn test_rejects_discount_of_one() {
        let notes = vec![note("a", capped(1_000_000, Some("1")), false)];
        let err = apply_most_favored_nation(&notes).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
