// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::FinError;
use crate::models::Goal;
use crate::settings::Preferences;
use crate::utils::{
    flag, id_for_goal, maybe_print_json, optional, parse_date, parse_decimal, pretty_table,
    required, stored_decimal,
};
use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("deposit", sub)) => deposit(conn, sub)?,
        Some(("rm", sub)) => {
            let name = required(sub, "name")?;
            let id = id_for_goal(conn, name)?;
            conn.execute("DELETE FROM goals WHERE id=?1", params![id])?;
            println!("Removed goal '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = required(sub, "name")?;
    let target = parse_decimal(required(sub, "target")?)?;
    if target <= Decimal::ZERO {
        return Err(FinError::InvalidInput(format!("target must be positive, got {}", target)).into());
    }
    let current = match optional(sub, "current") {
        Some(raw) => parse_decimal(raw)?,
        None => Decimal::ZERO,
    };
    let deadline = match optional(sub, "deadline") {
        Some(raw) => Some(parse_date(raw)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO goals(name, target_amount, current_amount, deadline) VALUES (?1,?2,?3,?4)",
        params![
            name,
            target.to_string(),
            current.to_string(),
            deadline.map(|d| d.to_string())
        ],
    )?;
    log::info!("goal '{}' added", name);
    println!("Added goal '{}' (target {})", name, target);
    Ok(())
}

pub fn load_goals(conn: &Connection) -> Result<Vec<Goal>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, target_amount, current_amount, deadline FROM goals ORDER BY deadline IS NULL, deadline, name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, target, current, deadline) = row?;
        out.push(Goal {
            target_amount: stored_decimal(&target, "goal target")?,
            current_amount: stored_decimal(&current, "goal amount")?,
            deadline: deadline.as_deref().map(parse_date).transpose()?,
            id,
            name,
        });
    }
    Ok(out)
}

fn deposit(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = required(sub, "name")?;
    let amount = parse_decimal(required(sub, "amount")?)?;
    let id = id_for_goal(conn, name)?;
    let current: String = conn.query_row(
        "SELECT current_amount FROM goals WHERE id=?1",
        params![id],
        |r| r.get(0),
    )?;
    let updated = stored_decimal(&current, "goal amount")? + amount;
    conn.execute(
        "UPDATE goals SET current_amount=?1 WHERE id=?2",
        params![updated.to_string(), id],
    )?;
    log::info!("goal '{}' moved by {}", name, amount);
    println!("Goal '{}' now at {}", name, updated);
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub progress_percent: Decimal,
    pub remaining: Decimal,
    pub deadline: Option<NaiveDate>,
    pub months_left: Option<u32>,
    pub monthly_needed: Option<Decimal>,
    pub overdue: bool,
}

/// Whole calendar months from `today` to `deadline`; 0 once it has passed.
pub fn months_until(today: NaiveDate, deadline: NaiveDate) -> u32 {
    if deadline <= today {
        return 0;
    }
    let months = (deadline.year() - today.year()) * 12 + deadline.month() as i32
        - today.month() as i32;
    months.max(0) as u32
}

pub fn goal_progress(goal: &Goal, today: NaiveDate) -> GoalProgress {
    let progress = if goal.target_amount.is_zero() {
        Decimal::ZERO
    } else {
        match goal
            .current_amount
            .checked_div(goal.target_amount)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        {
            Some(p) => p.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
            // overflow only happens far past either bound
            None if goal.current_amount > Decimal::ZERO => Decimal::ONE_HUNDRED,
            None => Decimal::ZERO,
        }
    };
    let remaining = (goal.target_amount - goal.current_amount).max(Decimal::ZERO);
    let months_left = goal.deadline.map(|d| months_until(today, d));
    let monthly_needed = months_left.map(|m| remaining / Decimal::from(m.max(1)));
    GoalProgress {
        name: goal.name.clone(),
        target_amount: goal.target_amount,
        current_amount: goal.current_amount,
        progress_percent: progress.round_dp(2),
        remaining,
        deadline: goal.deadline,
        months_left,
        monthly_needed: monthly_needed.map(|d| d.round_dp(2)),
        overdue: goal.deadline.is_some_and(|d| d < today) && !remaining.is_zero(),
    }
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let prefs = Preferences::load(conn)?;
    let today = Utc::now().with_timezone(&prefs.utc_offset).date_naive();
    let progress: Vec<GoalProgress> = load_goals(conn)?
        .iter()
        .map(|g| goal_progress(g, today))
        .collect();
    if maybe_print_json(flag(sub, "json"), false, &progress)? {
        return Ok(());
    }
    let rows = progress
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                prefs.money(&p.current_amount),
                prefs.money(&p.target_amount),
                prefs.percent(&p.progress_percent),
                p.deadline.map(|d| d.to_string()).unwrap_or_default(),
                match (p.overdue, p.monthly_needed) {
                    (true, _) => "overdue".to_string(),
                    (false, Some(m)) => prefs.money(&m),
                    (false, None) => String::new(),
                },
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Goal", "Saved", "Target", "Progress", "Deadline", "Per Month"],
            rows
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn goal(target: i64, current: i64, deadline: Option<NaiveDate>) -> Goal {
        Goal {
            id: 1,
            name: "Trip".into(),
            target_amount: Decimal::from(target),
            current_amount: Decimal::from(current),
            deadline,
        }
    }

    #[test]
    fn progress_splits_remaining_over_months() {
        let p = goal_progress(&goal(1200, 200, Some(d(2025, 1, 15))), d(2024, 3, 1));
        assert_eq!(p.progress_percent, Decimal::new(1667, 2));
        assert_eq!(p.months_left, Some(10));
        assert_eq!(p.monthly_needed, Some(Decimal::from(100)));
        assert!(!p.overdue);
    }

    #[test]
    fn progress_is_clamped_and_overshoot_leaves_nothing_remaining() {
        let p = goal_progress(&goal(100, 150, None), d(2024, 1, 1));
        assert_eq!(p.progress_percent, Decimal::ONE_HUNDRED);
        assert!(p.remaining.is_zero());
        assert_eq!(p.monthly_needed, None);
    }

    #[test]
    fn progress_survives_overflowing_ratio() {
        let mut g = goal(1, 1000, None);
        g.target_amount = Decimal::new(1, 28);
        assert_eq!(goal_progress(&g, d(2024, 1, 1)).progress_percent, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn past_deadline_is_overdue_until_reached() {
        let p = goal_progress(&goal(100, 40, Some(d(2024, 1, 1))), d(2024, 6, 1));
        assert!(p.overdue);
        assert_eq!(p.months_left, Some(0));
        assert_eq!(p.monthly_needed, Some(Decimal::from(60)));
    }
}
