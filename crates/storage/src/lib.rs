use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use hrm_core::allocation::DaIncrementAward;
use hrm_core::types::{AttendanceEntry, AttendanceStatus, Employee};

/// Number of employees returned per listing page.
pub const PAGE_SIZE: u32 = 20;

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to the employee record store.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for employee records and their attendance history.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts a new employee with zeroed counters and returns the stored record.
    pub async fn insert(&self, record: &NewEmployee<'_>) -> Result<Employee, EmployeeError> {
        let id = Uuid::new_v4().to_string();
        let created_at = to_rfc3339(record.created_at);
        sqlx::query(
            "INSERT INTO employees \
             (id, user_id, name, department, tasks_completed, performance_score, salary, da_increment, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, 0, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(record.user)
        .bind(record.name)
        .bind(record.department)
        .bind(record.salary)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        self.fetch(&id).await?.ok_or(EmployeeError::NotFound)
    }

    /// Loads a single employee with its attendance history.
    pub async fn fetch(&self, id: &str) -> Result<Option<Employee>, EmployeeError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, user_id, name, department, tasks_completed, performance_score, salary, da_increment, created_at, updated_at \
             FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attendance = sqlx::query_as::<_, AttendanceRow>(
            "SELECT employee_id, date, status FROM employee_attendance WHERE employee_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AttendanceRow::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_domain(attendance).map(Some)
    }

    /// Lists one page of employees, newest first. Pages start at 1.
    pub async fn list_page(&self, page: u32) -> Result<Vec<Employee>, EmployeeError> {
        let offset = i64::from(page.max(1) - 1) * i64::from(PAGE_SIZE);
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, user_id, name, department, tasks_completed, performance_score, salary, da_increment, created_at, updated_at \
             FROM employees ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(PAGE_SIZE))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT employee_id, date, status FROM employee_attendance WHERE employee_id IN (",
        );
        let mut ids = builder.separated(", ");
        for row in &rows {
            ids.push_bind(row.id.clone());
        }
        builder.push(") ORDER BY seq");
        let attendance = builder
            .build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?;

        assemble(rows, attendance)
    }

    /// Lists every employee, oldest first.
    pub async fn list_all(&self) -> Result<Vec<Employee>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, user_id, name, department, tasks_completed, performance_score, salary, da_increment, created_at, updated_at \
             FROM employees ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let attendance = sqlx::query_as::<_, AttendanceRow>(
            "SELECT employee_id, date, status FROM employee_attendance ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        assemble(rows, attendance)
    }

    /// Applies a partial profile update. Absent fields keep their stored value.
    pub async fn update_profile(
        &self,
        id: &str,
        update: &EmployeeUpdate<'_>,
    ) -> Result<Employee, EmployeeError> {
        let result = sqlx::query(
            "UPDATE employees SET \
                 name = COALESCE(?, name), \
                 department = COALESCE(?, department), \
                 salary = COALESCE(?, salary), \
                 user_id = COALESCE(?, user_id), \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(update.name)
        .bind(update.department)
        .bind(update.salary)
        .bind(update.user)
        .bind(to_rfc3339(update.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EmployeeError::NotFound);
        }

        self.fetch(id).await?.ok_or(EmployeeError::NotFound)
    }

    /// Appends an attendance entry. The cached performance score is left untouched.
    pub async fn append_attendance(
        &self,
        id: &str,
        entry: &AttendanceEntry,
        recorded_at: DateTime<Utc>,
    ) -> Result<Employee, EmployeeError> {
        let recorded_at = to_rfc3339(recorded_at);
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE employees SET updated_at = ? WHERE id = ?")
            .bind(&recorded_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(EmployeeError::NotFound);
        }

        sqlx::query(
            "INSERT INTO employee_attendance (employee_id, date, status, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(to_rfc3339(entry.date))
        .bind(entry.status.as_str())
        .bind(&recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch(id).await?.ok_or(EmployeeError::NotFound)
    }

    /// Stores a new task counter together with its recomputed score in one statement.
    pub async fn set_task_progress(
        &self,
        id: &str,
        tasks_completed: u32,
        performance_score: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<Employee, EmployeeError> {
        let result = sqlx::query(
            "UPDATE employees SET tasks_completed = ?, performance_score = ?, updated_at = ? WHERE id = ?",
        )
        .bind(i64::from(tasks_completed))
        .bind(performance_score)
        .bind(to_rfc3339(updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EmployeeError::NotFound);
        }

        self.fetch(id).await?.ok_or(EmployeeError::NotFound)
    }

    /// Writes every award (fresh score and increment) inside one transaction.
    ///
    /// Employees absent from `awards` keep whatever increment they had before.
    pub async fn apply_da_increments(
        &self,
        awards: &[DaIncrementAward],
        updated_at: DateTime<Utc>,
    ) -> Result<(), EmployeeError> {
        if awards.is_empty() {
            return Ok(());
        }

        let updated_at = to_rfc3339(updated_at);
        let mut tx = self.pool.begin().await?;
        for award in awards {
            let result = sqlx::query(
                "UPDATE employees SET performance_score = ?, da_increment = ?, updated_at = ? WHERE id = ?",
            )
            .bind(award.performance_score)
            .bind(award.da_increment)
            .bind(&updated_at)
            .bind(&award.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(EmployeeError::NotFound);
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Data required to create a new employee.
#[derive(Debug, Clone)]
pub struct NewEmployee<'a> {
    pub name: &'a str,
    pub department: Option<&'a str>,
    pub salary: f64,
    pub user: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone)]
pub struct EmployeeUpdate<'a> {
    pub name: Option<&'a str>,
    pub department: Option<&'a str>,
    pub salary: Option<f64>,
    pub user: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Errors raised by the employee repository.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("employee not found")]
    NotFound,
    #[error("stored employee data is invalid: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    user_id: Option<String>,
    name: String,
    department: Option<String>,
    tasks_completed: i64,
    performance_score: i64,
    salary: f64,
    da_increment: f64,
    created_at: String,
    updated_at: String,
}

impl EmployeeRow {
    fn into_domain(self, attendance: Vec<AttendanceEntry>) -> Result<Employee, EmployeeError> {
        let tasks_completed = u32::try_from(self.tasks_completed).map_err(|_| {
            EmployeeError::Corrupt(format!("tasks_completed out of range: {}", self.tasks_completed))
        })?;
        Ok(Employee {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            user: self.user_id,
            name: self.name,
            department: self.department,
            attendance,
            tasks_completed,
            performance_score: self.performance_score,
            salary: self.salary,
            da_increment: self.da_increment,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
    employee_id: String,
    date: String,
    status: String,
}

impl AttendanceRow {
    fn into_domain(self) -> Result<AttendanceEntry, EmployeeError> {
        let status: AttendanceStatus = self
            .status
            .parse()
            .map_err(|err| EmployeeError::Corrupt(format!("{err}")))?;
        Ok(AttendanceEntry {
            date: parse_timestamp(&self.date)?,
            status,
        })
    }
}

fn assemble(
    rows: Vec<EmployeeRow>,
    attendance: Vec<AttendanceRow>,
) -> Result<Vec<Employee>, EmployeeError> {
    let mut by_employee: HashMap<String, Vec<AttendanceEntry>> = HashMap::new();
    for row in attendance {
        let employee_id = row.employee_id.clone();
        by_employee
            .entry(employee_id)
            .or_default()
            .push(row.into_domain()?);
    }

    rows.into_iter()
        .map(|row| {
            let entries = by_employee.remove(&row.id).unwrap_or_default();
            row.into_domain(entries)
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EmployeeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| EmployeeError::Corrupt(format!("invalid timestamp {raw:?}: {err}")))
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
