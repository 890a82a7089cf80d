use captable_engine::domain::{
    Cents, CommonShareClass, Decimal, DividendPolicy, LiquidationEvent, LiquidationEventType,
    Participation, PreferredShareClass, SecurityId, SeniorityRank,
};
use captable_engine::engine::{ConversionChoice, EngineError, WaterfallEngine, WaterfallResult};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dollars(amount: i64) -> Cents {
    Cents::from_dollars(amount)
}

fn preferred(
    id: &str,
    rank: u32,
    investment: i64,
    multiple: Decimal,
    participation: Participation,
) -> PreferredShareClass {
    PreferredShareClass {
        id: SecurityId::new(id),
        name: format!("Series {}", id.to_uppercase()),
        shares: 1_000_000,
        original_investment: dollars(investment),
        liquidation_multiple: multiple,
        participation,
        seniority_rank: SeniorityRank::new(rank),
        dividend: DividendPolicy::None,
        conversion_ratio: Decimal::one(),
        issuance_date: date(2021, 1, 1),
    }
}

fn common(id: &str, shares: u64) -> CommonShareClass {
    CommonShareClass {
        id: SecurityId::new(id),
        name: format!("Common {}", id),
        shares,
    }
}

fn exit(amount: Cents) -> LiquidationEvent {
    LiquidationEvent {
        exit_value: amount,
        event_date: date(2023, 1, 1),
        event_type: LiquidationEventType::Acquisition,
    }
}

fn total(result: &WaterfallResult) -> Cents {
    result
        .preferred
        .iter()
        .map(|d| d.total_distribution)
        .chain(result.common.iter().map(|d| d.total_distribution))
        .sum()
}

fn stacked_classes() -> Vec<PreferredShareClass> {
    vec![
        preferred("a", 1, 25_000_000, Decimal::new(dec!(3)), Participation::NonParticipating),
        preferred("b", 2, 15_000_000, Decimal::new(dec!(2.5)), Participation::NonParticipating),
        preferred("c", 3, 10_000_000, Decimal::new(dec!(2)), Participation::NonParticipating),
    ]
}

#[test]
fn test_seniority_precedence_when_preferences_exceed_exit() {
    let result = WaterfallEngine::default()
        .run(
            &stacked_classes(),
            &[common("founders", 10_000_000)],
            &exit(dollars(100_000_000)),
        )
        .unwrap();

    assert_eq!(result.preferred[0].liquidation_preference, dollars(75_000_000));
    assert_eq!(result.preferred[1].liquidation_preference, dollars(25_000_000));
    assert_eq!(result.preferred[2].total_distribution, Cents::ZERO);
    assert_eq!(result.common[0].total_distribution, Cents::ZERO);
    assert_eq!(total(&result), dollars(100_000_000));
    assert_eq!(result.summary.undistributed_amount, Cents::ZERO);
    assert!(result
        .preferred
        .iter()
        .all(|d| d.preferred_vs_common.optimal_choice == ConversionChoice::Preferred));
}

#[test]
fn test_stack_is_paid_in_full_and_common_takes_rest() {
    let result = WaterfallEngine::default()
        .run(
            &stacked_classes(),
            &[common("founders", 10_000_000)],
            &exit(dollars(200_000_000)),
        )
        .unwrap();

    assert_eq!(result.summary.total_liquidation_preferences, dollars(132_500_000));
    assert_eq!(result.common[0].total_distribution, dollars(67_500_000));
    assert_eq!(result.summary.total_distributed, dollars(200_000_000));
}

#[test]
fn test_input_order_does_not_change_payment_order() {
    let mut reversed = stacked_classes();
    reversed.reverse();
    let engine = WaterfallEngine::default();
    let commons = [common("founders", 10_000_000)];
    let event = exit(dollars(100_000_000));

    let a = engine.run(&stacked_classes(), &commons, &event).unwrap();
    let b = engine.run(&reversed, &commons, &event).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_participating_preferred_shares_residual() {
    let classes = vec![
        preferred("a", 1, 10_000_000, Decimal::one(), Participation::Participating),
        preferred("b", 2, 20_000_000, Decimal::one(), Participation::NonParticipating),
    ];
    let mut classes = classes;
    classes[0].shares = 2_000_000;
    classes[1].shares = 2_000_000;

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 6_000_000)], &exit(dollars(100_000_000)))
        .unwrap();

    let a = &result.preferred[0];
    assert_eq!(a.liquidation_preference, dollars(10_000_000));
    assert_eq!(a.participation, dollars(17_500_000));
    assert_eq!(a.total_distribution, dollars(27_500_000));
    assert_eq!(result.preferred[1].total_distribution, dollars(20_000_000));
    assert_eq!(result.common[0].total_distribution, dollars(52_500_000));
    assert_eq!(total(&result), dollars(100_000_000));
}

#[test]
fn test_non_participating_converts_when_common_is_worth_more() {
    let mut classes = vec![
        preferred("a", 1, 10_000_000, Decimal::one(), Participation::Participating),
        preferred("b", 2, 20_000_000, Decimal::one(), Participation::NonParticipating),
    ];
    classes[0].shares = 2_000_000;
    classes[1].shares = 2_000_000;

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 6_000_000)], &exit(dollars(500_000_000)))
        .unwrap();

    let b = &result.preferred[1];
    assert_eq!(b.preferred_vs_common.optimal_choice, ConversionChoice::Common);
    assert_eq!(b.preferred_vs_common.as_common, dollars(98_000_000));
    assert_eq!(b.liquidation_preference, Cents::ZERO);
    assert_eq!(b.common_distribution, dollars(98_000_000));

    let a = &result.preferred[0];
    assert_eq!(a.preferred_vs_common.optimal_choice, ConversionChoice::Preferred);
    assert_eq!(a.total_distribution, dollars(108_000_000));
    assert_eq!(result.common[0].total_distribution, dollars(294_000_000));
    assert_eq!(total(&result), dollars(500_000_000));
}

#[test]
fn test_capped_participation_excess_flows_to_common() {
    let mut classes = vec![preferred(
        "a",
        1,
        10_000_000,
        Decimal::one(),
        Participation::ParticipatingCapped {
            cap: Decimal::new(dec!(2)),
        },
    )];
    classes[0].shares = 2_000_000;

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 6_000_000)], &exit(dollars(60_000_000)))
        .unwrap();

    // 50M residual: 12.5M pro-rata, held to 10M by the 2x cap.
    let a = &result.preferred[0];
    assert_eq!(a.participation, dollars(10_000_000));
    assert_eq!(a.total_distribution, dollars(20_000_000));
    assert_eq!(result.common[0].total_distribution, dollars(40_000_000));
    assert_eq!(total(&result), dollars(60_000_000));
}

#[test]
fn test_capped_class_converts_above_cap() {
    let mut classes = vec![preferred(
        "a",
        1,
        10_000_000,
        Decimal::one(),
        Participation::ParticipatingCapped {
            cap: Decimal::new(dec!(2)),
        },
    )];
    classes[0].shares = 2_000_000;

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 6_000_000)], &exit(dollars(100_000_000)))
        .unwrap();

    let a = &result.preferred[0];
    assert_eq!(a.preferred_vs_common.as_preferred, dollars(10_000_000));
    assert_eq!(a.preferred_vs_common.as_common, dollars(25_000_000));
    assert_eq!(a.preferred_vs_common.optimal_choice, ConversionChoice::Common);
    assert_eq!(a.common_distribution, dollars(25_000_000));
    assert_eq!(result.common[0].total_distribution, dollars(75_000_000));
}

#[test]
fn test_cumulative_dividends_paid_after_preference() {
    let mut senior = preferred("a", 1, 10_000_000, Decimal::one(), Participation::NonParticipating);
    senior.dividend = DividendPolicy::Cumulative {
        rate: Decimal::new(dec!(8)),
        unpaid: Cents::ZERO,
    };
    let junior = preferred("b", 2, 5_000_000, Decimal::one(), Participation::NonParticipating);

    let result = WaterfallEngine::default()
        .run(
            &[senior, junior],
            &[common("founders", 5_000_000)],
            &exit(dollars(12_000_000)),
        )
        .unwrap();

    assert_eq!(result.preferred[0].liquidation_preference, dollars(10_000_000));
    assert_eq!(result.preferred[0].cumulative_dividends, dollars(1_600_000));
    assert_eq!(result.preferred[1].liquidation_preference, dollars(400_000));
    assert_eq!(result.summary.total_cumulative_dividends, dollars(1_600_000));
    assert_eq!(result.common[0].total_distribution, Cents::ZERO);
}

#[test]
fn test_rounding_residue_goes_to_junior_common() {
    let commons = [common("one", 1), common("two", 2)];
    let result = WaterfallEngine::default()
        .run(&[], &commons, &exit(Cents(100)))
        .unwrap();

    assert_eq!(result.common[0].total_distribution, Cents(33));
    assert_eq!(result.common[1].total_distribution, Cents(67));
    assert_eq!(result.summary.undistributed_amount, Cents::ZERO);
}

#[test]
fn test_zero_exit_distributes_nothing() {
    let result = WaterfallEngine::default()
        .run(&stacked_classes(), &[common("founders", 1_000)], &exit(Cents::ZERO))
        .unwrap();
    assert_eq!(result.summary.total_distributed, Cents::ZERO);
}

#[test]
fn test_negative_exit_is_rejected() {
    let err = WaterfallEngine::default()
        .run(&stacked_classes(), &[], &exit(Cents(-1)))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_duplicate_rank_is_rejected() {
    let mut classes = stacked_classes();
    classes[2].seniority_rank = SeniorityRank::new(1);
    let err = WaterfallEngine::default()
        .run(&classes, &[], &exit(dollars(1_000)))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_cap_below_preference_is_configuration_error() {
    let classes = vec![preferred(
        "a",
        1,
        1_000_000,
        Decimal::new(dec!(2)),
        Participation::ParticipatingCapped {
            cap: Decimal::new(dec!(1.5)),
        },
    )];
    let err = WaterfallEngine::default()
        .run(&classes, &[common("founders", 1_000)], &exit(dollars(10_000_000)))
        .unwrap_err();
    match err {
        EngineError::Configuration(msg) => {
            assert!(msg.contains("1.5"));
            assert!(msg.contains("2"));
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_residual_without_holder_is_configuration_error() {
    let classes = vec![preferred(
        "a",
        1,
        1_000_000,
        Decimal::one(),
        Participation::NonParticipating,
    )];
    let mut classes = classes;
    classes[0].shares = 0;
    let err = WaterfallEngine::default()
        .run(&classes, &[], &exit(dollars(5_000_000)))
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[test]
fn test_two_non_participating_classes_convert_together() {
    let classes = vec![
        preferred("a", 1, 1_000_000, Decimal::one(), Participation::NonParticipating),
        preferred("b", 2, 2_000_000, Decimal::one(), Participation::NonParticipating),
    ];

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 8_000_000)], &exit(dollars(100_000_000)))
        .unwrap();

    for d in &result.preferred {
        assert_eq!(d.preferred_vs_common.optimal_choice, ConversionChoice::Common);
        assert_eq!(d.liquidation_preference, Cents::ZERO);
        assert_eq!(d.common_distribution, dollars(10_000_000));
        assert_eq!(d.total_distribution, dollars(10_000_000));
    }
    assert_eq!(result.preferred[1].preferred_vs_common.as_common, dollars(11_000_000));
    assert_eq!(result.common[0].total_distribution, dollars(80_000_000));
    assert_eq!(result.summary.total_liquidation_preferences, Cents::ZERO);
    assert_eq!(total(&result), dollars(100_000_000));
}

#[test]
fn test_residue_prefers_converted_holder_over_empty_common_class() {
    let mut classes = vec![
        preferred("a", 1, 0, Decimal::one(), Participation::NonParticipating),
        preferred("b", 2, 0, Decimal::one(), Participation::NonParticipating),
    ];
    classes[0].shares = 1;
    classes[0].original_investment = Cents(1);
    classes[1].shares = 2;
    classes[1].original_investment = Cents(1);

    let result = WaterfallEngine::default()
        .run(&classes, &[common("unissued", 0)], &exit(Cents(100)))
        .unwrap();

    assert_eq!(result.preferred[0].common_distribution, Cents(33));
    assert_eq!(result.preferred[1].common_distribution, Cents(67));
    assert_eq!(result.common[0].total_distribution, Cents::ZERO);
    assert_eq!(result.summary.undistributed_amount, Cents::ZERO);
}

#[test]
fn test_as_converted_overflow_is_rejected() {
    let mut classes = vec![preferred(
        "a",
        1,
        1_000_000,
        Decimal::one(),
        Participation::Participating,
    )];
    classes[0].shares = u64::MAX;
    classes[0].conversion_ratio = Decimal::new(dec!(10000000000));

    let err = WaterfallEngine::default()
        .run(&classes, &[common("founders", 1_000)], &exit(dollars(10_000_000)))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_dividend_accrual_overflow_is_rejected() {
    let mut classes = vec![preferred(
        "a",
        1,
        1_000_000,
        Decimal::one(),
        Participation::NonParticipating,
    )];
    classes[0].issuance_date = date(1900, 1, 1);
    classes[0].dividend = DividendPolicy::Cumulative {
        rate: Decimal::new(rust_decimal::Decimal::MAX),
        unpaid: Cents::ZERO,
    };
    let mut event = exit(dollars(10_000_000));
    event.event_date = date(2100, 1, 1);

    let err = WaterfallEngine::default()
        .run(&classes, &[common("founders", 1_000)], &event)
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_cap_equal_to_multiple_is_accepted() {
    let mut classes = vec![preferred(
        "a",
        1,
        10_000_000,
        Decimal::one(),
        Participation::ParticipatingCapped { cap: Decimal::one() },
    )];
    classes[0].shares = 2_000_000;

    let result = WaterfallEngine::default()
        .run(&classes, &[common("founders", 6_000_000)], &exit(dollars(20_000_000)))
        .unwrap();

    let a = &result.preferred[0];
    assert_eq!(a.liquidation_preference, dollars(10_000_000));
    assert_eq!(a.participation, Cents::ZERO);
    assert_eq!(a.preferred_vs_common.optimal_choice, ConversionChoice::Preferred);
    assert_eq!(result.common[0].total_distribution, dollars(10_000_000));
}
