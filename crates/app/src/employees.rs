use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info};

use hrm_core::allocation::DaIncrementAward;
use hrm_core::policy::Operation;
use hrm_core::types::{AttendanceEntry, AttendanceStatus, Employee};
use hrm_storage::{EmployeeError, EmployeeUpdate, NewEmployee};

use crate::allocation::RunTrigger;
use crate::auth::Caller;
use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateEmployeeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub salary: Option<f64>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub salary: Option<f64>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub increment: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwardView {
    pub id: String,
    pub name: String,
    pub da_increment: f64,
}

impl From<DaIncrementAward> for AwardView {
    fn from(award: DaIncrementAward) -> Self {
        Self {
            id: award.id,
            name: award.name,
            da_increment: award.da_increment,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DaIncrementResponse {
    pub updated: Vec<AwardView>,
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> Result<Json<Employee>, ProblemResponse> {
    let operation = Operation::CreateEmployee;
    caller.authorize(&state, operation)?;

    let request: CreateEmployeeRequest = parse_body(&body)?;
    let name = request
        .name
        .as_deref()
        .ok_or_else(|| ProblemResponse::validation("name is required"))
        .and_then(validate_name)?;
    let salary = validate_salary(request.salary.unwrap_or(0.0))?;

    let employee = state
        .storage()
        .employees()
        .insert(&NewEmployee {
            name,
            department: request.department.as_deref(),
            salary,
            user: request.user.as_deref(),
            created_at: state.now(),
        })
        .await
        .map_err(|err| storage_failure(operation, err))?;

    record_mutation(operation, &caller, &employee.id);
    Ok(Json(employee))
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Employee>>, ProblemResponse> {
    let operation = Operation::ListEmployees;
    caller.authorize(&state, operation)?;

    let Query(query) =
        query.map_err(|err| ProblemResponse::validation(format!("invalid query string: {err}")))?;

    let page = parse_page(query.page.as_deref());
    let employees = state
        .storage()
        .employees()
        .list_page(page)
        .await
        .map_err(|err| storage_failure(operation, err))?;
    Ok(Json(employees))
}

pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Employee>, ProblemResponse> {
    let operation = Operation::GetEmployee;
    caller.authorize(&state, operation)?;

    state
        .storage()
        .employees()
        .fetch(&id)
        .await
        .map_err(|err| storage_failure(operation, err))?
        .map(Json)
        .ok_or_else(ProblemResponse::not_found)
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Employee>, ProblemResponse> {
    let operation = Operation::UpdateEmployee;
    caller.authorize(&state, operation)?;

    let request: UpdateEmployeeRequest = parse_body(&body)?;
    let name = request.name.as_deref().map(validate_name).transpose()?;
    let salary = request.salary.map(validate_salary).transpose()?;

    let employee = state
        .storage()
        .employees()
        .update_profile(
            &id,
            &EmployeeUpdate {
                name,
                department: request.department.as_deref(),
                salary,
                user: request.user.as_deref(),
                updated_at: state.now(),
            },
        )
        .await
        .map_err(|err| storage_failure(operation, err))?;

    record_mutation(operation, &caller, &employee.id);
    Ok(Json(employee))
}

/// Appends an attendance mark. The cached score stays as is until the next recompute.
pub async fn mark_attendance(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Employee>, ProblemResponse> {
    let operation = Operation::MarkAttendance;
    caller.authorize(&state, operation)?;

    let request: AttendanceRequest = parse_body(&body)?;
    let status: AttendanceStatus = request
        .status
        .as_deref()
        .ok_or_else(|| ProblemResponse::validation("status is required"))?
        .parse()
        .map_err(|err| ProblemResponse::validation(format!("{err}")))?;
    let now = state.now();
    let date = match request.date.as_deref() {
        Some(raw) => parse_attendance_date(raw)?,
        None => now,
    };

    let employee = state
        .storage()
        .employees()
        .append_attendance(&id, &AttendanceEntry { date, status }, now)
        .await
        .map_err(|err| storage_failure(operation, err))?;

    record_mutation(operation, &caller, &employee.id);
    Ok(Json(employee))
}

/// Adds to the completed task counter and stores the recomputed score with it.
pub async fn record_task_completion(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Employee>, ProblemResponse> {
    let operation = Operation::RecordTaskCompletion;
    caller.authorize(&state, operation)?;

    let request: TaskRequest = parse_body(&body)?;
    let increment = request.increment.unwrap_or(1);

    let repo = state.storage().employees();
    let mut employee = repo
        .fetch(&id)
        .await
        .map_err(|err| storage_failure(operation, err))?
        .ok_or_else(ProblemResponse::not_found)?;

    let total = i64::from(employee.tasks_completed)
        .checked_add(increment)
        .ok_or_else(|| ProblemResponse::validation("increment is out of range"))?;
    if total < 0 {
        return Err(ProblemResponse::validation(
            "tasksCompleted cannot drop below zero",
        ));
    }
    employee.tasks_completed = u32::try_from(total)
        .map_err(|_| ProblemResponse::validation("tasksCompleted is out of range"))?;
    let score = employee.refresh_performance();

    let employee = repo
        .set_task_progress(&id, employee.tasks_completed, score, state.now())
        .await
        .map_err(|err| storage_failure(operation, err))?;

    record_mutation(operation, &caller, &employee.id);
    Ok(Json(employee))
}

pub async fn run_da_increment(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<DaIncrementResponse>, ProblemResponse> {
    caller.authorize(&state, Operation::RunDaIncrement)?;

    let plan = state
        .increment_runner()
        .run(RunTrigger::Manual)
        .await
        .map_err(|_| ProblemResponse::internal())?;

    info!(
        stage = "employees",
        subject = %caller.subject,
        recipients = plan.awards.len(),
        "DA increment run requested"
    );
    Ok(Json(DaIncrementResponse {
        updated: plan.awards.into_iter().map(AwardView::from).collect(),
    }))
}

/// Parses an optional JSON body; an empty body yields the request's defaults.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ProblemResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ProblemResponse::validation(format!("invalid request body: {err}")))
}

fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

fn parse_attendance_date(raw: &str) -> Result<DateTime<Utc>, ProblemResponse> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map(|midnight| midnight.and_utc())
        })
        .ok_or_else(|| {
            ProblemResponse::validation("date must be an RFC 3339 timestamp or YYYY-MM-DD")
        })?;

    // Stored as RFC 3339, which only has four-digit years.
    if !(0..=9999).contains(&date.year()) {
        return Err(ProblemResponse::validation(
            "date must fall between the years 0000 and 9999 in UTC",
        ));
    }
    Ok(date)
}

fn validate_name(name: &str) -> Result<&str, ProblemResponse> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProblemResponse::validation("name must not be empty"));
    }
    Ok(trimmed)
}

fn validate_salary(salary: f64) -> Result<f64, ProblemResponse> {
    if !salary.is_finite() || salary < 0.0 {
        return Err(ProblemResponse::validation(
            "salary must be a non-negative amount",
        ));
    }
    Ok(salary)
}

fn storage_failure(operation: Operation, err: EmployeeError) -> ProblemResponse {
    match err {
        EmployeeError::NotFound => ProblemResponse::not_found(),
        other => {
            error!(
                stage = "employees",
                op = operation.as_str(),
                error = %other,
                "employee storage operation failed"
            );
            ProblemResponse::internal()
        }
    }
}

fn record_mutation(operation: Operation, caller: &Caller, employee_id: &str) {
    counter!("employee_mutations_total", "op" => operation.as_str()).increment(1);
    info!(
        stage = "employees",
        op = operation.as_str(),
        subject = %caller.subject,
        role = caller.role.as_str(),
        %employee_id,
        "employee record updated"
    );
}
