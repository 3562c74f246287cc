//! Progressive access schedule used by the informational profit examples.
//!
//! The bot's advertised daily profit rate is fixed; a user's share of it
//! grows week by week until full access: 0.5% in week 1, 2% in week 2, 4%
//! in week 3, then 12% from week 4 with 4 percentage points added per week,
//! capped at 100% (reached at week 26).

/// Advertised daily bot profit as a fraction of the deposit (top of the
/// 30–72% corridor).
pub const DAILY_BOT_RATE: f64 = 0.72;

/// Week at which the user share reaches 100%.
pub const FULL_ACCESS_WEEK: u32 = 26;

/// User share of the bot's profit for the given week, in percent.
pub fn user_share_percent(week: u32) -> f64 {
    match week {
        0 | 1 => 0.5,
        2 => 2.0,
        3 => 4.0,
        w if w <= FULL_ACCESS_WEEK => 12.0 + f64::from(w - 4) * 4.0,
        _ => 100.0,
    }
}

/// Projected weekly profit for a deposit at the given week:
/// `deposit × daily rate × share/100 × 7`.
pub fn weekly_profit(deposit: f64, week: u32) -> f64 {
    deposit * DAILY_BOT_RATE * (user_share_percent(week) / 100.0) * 7.0
}

/// The figure the calculator displays: weekly profit rounded to whole
/// dollars.
pub fn weekly_profit_display(deposit: f64, week: u32) -> f64 {
    weekly_profit(deposit, week).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_schedule_tiers() {
        assert_eq!(user_share_percent(1), 0.5);
        assert_eq!(user_share_percent(2), 2.0);
        assert_eq!(user_share_percent(3), 4.0);
        assert_eq!(user_share_percent(4), 12.0);
        assert_eq!(user_share_percent(5), 16.0);
        assert_eq!(user_share_percent(25), 96.0);
        assert_eq!(user_share_percent(26), 100.0);
        // Capped past full access.
        assert_eq!(user_share_percent(27), 100.0);
        assert_eq!(user_share_percent(100), 100.0);
    }

    #[test]
    fn thousand_dollar_table_matches_marketing_copy() {
        // The published schedule for a $1,000 deposit.
        let expected = [
            (1, 25.0),
            (2, 101.0),
            (3, 202.0),
            (4, 605.0),
            (5, 806.0),
            (6, 1_008.0),
            (13, 2_419.0),
            (19, 3_629.0),
            (25, 4_838.0),
            (26, 5_040.0),
        ];
        for (week, profit) in expected {
            assert_eq!(
                weekly_profit_display(1_000.0, week),
                profit,
                "week {week}"
            );
        }
    }

    #[test]
    fn weekly_profit_formula() {
        // Week 1: 1000 × 0.72 × 0.005 × 7 = 25.2
        let exact = weekly_profit(1_000.0, 1);
        assert!((exact - 25.2).abs() < 1e-9);
        assert_eq!(weekly_profit_display(1_000.0, 1), 25.0);

        // Scales linearly with the deposit.
        assert_eq!(weekly_profit_display(2_000.0, 2), 202.0);
    }
}
