//! DA increment allocation.
//!
//! Every employee is re-scored, ranked by score (descending), and the top
//! decile (at least one employee) receives `round(salary * 5%)`. Ties are
//! broken by creation time and then by id, both ascending.

use std::cmp::Ordering;

use crate::types::Employee;

/// Share of the workforce, in percent, that receives an increment.
pub const TOP_SHARE_PERCENT: usize = 10;
/// Increment granted to each recipient, in percent of salary.
pub const DA_INCREMENT_PERCENT: f64 = 5.0;

/// Increment granted to a single employee by an allocation run.
#[derive(Debug, Clone, PartialEq)]
pub struct DaIncrementAward {
    pub id: String,
    pub name: String,
    pub performance_score: i64,
    pub da_increment: f64,
}

/// Result of ranking the workforce. Awards are ordered best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationPlan {
    pub evaluated: usize,
    pub awards: Vec<DaIncrementAward>,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }
}

/// Number of recipients for a workforce of `total` employees.
pub fn recipient_count(total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (total * TOP_SHARE_PERCENT / 100).max(1)
}

/// Increment amount for a salary, rounded half up.
pub fn da_increment_for(salary: f64) -> f64 {
    let amount = salary * DA_INCREMENT_PERCENT / 100.0;
    if amount.is_finite() {
        return amount.round();
    }
    // The product overflows near f64::MAX; scaling down first cannot.
    (salary / 100.0 * DA_INCREMENT_PERCENT).round()
}

/// Ranks all employees on freshly computed scores and selects the recipients.
///
/// The input is not mutated; callers persist the returned awards.
pub fn plan_da_increment(employees: &[Employee]) -> AllocationPlan {
    let mut ranked: Vec<(i64, &Employee)> = employees
        .iter()
        .map(|employee| (employee.compute_performance(), employee))
        .collect();
    ranked.sort_by(rank_order);

    let take = recipient_count(ranked.len());
    let awards = ranked
        .into_iter()
        .take(take)
        .map(|(score, employee)| DaIncrementAward {
            id: employee.id.clone(),
            name: employee.name.clone(),
            performance_score: score,
            da_increment: da_increment_for(employee.salary),
        })
        .collect();

    AllocationPlan {
        evaluated: employees.len(),
        awards,
    }
}

fn rank_order(left: &(i64, &Employee), right: &(i64, &Employee)) -> Ordering {
    right
        .0
        .cmp(&left.0)
        .then_with(|| left.1.created_at.cmp(&right.1.created_at))
        .then_with(|| left.1.id.cmp(&right.1.id))
}
