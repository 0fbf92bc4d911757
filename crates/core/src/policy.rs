use thiserror::Error;

/// Role carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Hr,
    Manager,
    /// Any authenticated caller without an HR-tooling role.
    Employee,
}

impl Role {
    /// Resolves a role claim. Unknown values fall back to [`Role::Employee`].
    pub fn from_claim(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "hr" => Self::Hr,
            "manager" => Self::Manager,
            _ => Self::Employee,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Hr => "hr",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }
}

/// Operations exposed by the employee API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateEmployee,
    ListEmployees,
    GetEmployee,
    UpdateEmployee,
    MarkAttendance,
    RecordTaskCompletion,
    RunDaIncrement,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Self::CreateEmployee,
        Self::ListEmployees,
        Self::GetEmployee,
        Self::UpdateEmployee,
        Self::MarkAttendance,
        Self::RecordTaskCompletion,
        Self::RunDaIncrement,
    ];

    /// Returns the label used for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateEmployee => "create_employee",
            Self::ListEmployees => "list_employees",
            Self::GetEmployee => "get_employee",
            Self::UpdateEmployee => "update_employee",
            Self::MarkAttendance => "mark_attendance",
            Self::RecordTaskCompletion => "record_task_completion",
            Self::RunDaIncrement => "run_da_increment",
        }
    }
}

/// Who may perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    AnyAuthenticated,
    Roles(&'static [Role]),
}

impl Access {
    pub fn permits(self, role: Role) -> bool {
        match self {
            Self::AnyAuthenticated => true,
            Self::Roles(roles) => roles.contains(&role),
        }
    }
}

const RECORD_MANAGERS: &[Role] = &[Role::Hr, Role::Admin, Role::Manager];
const INCREMENT_RUNNERS: &[Role] = &[Role::Hr, Role::Admin];

/// Declared access rules, one per operation.
pub const ACCESS_TABLE: &[(Operation, Access)] = &[
    (Operation::CreateEmployee, Access::Roles(RECORD_MANAGERS)),
    (Operation::ListEmployees, Access::AnyAuthenticated),
    (Operation::GetEmployee, Access::AnyAuthenticated),
    (Operation::UpdateEmployee, Access::Roles(RECORD_MANAGERS)),
    (Operation::MarkAttendance, Access::AnyAuthenticated),
    (Operation::RecordTaskCompletion, Access::AnyAuthenticated),
    (Operation::RunDaIncrement, Access::Roles(INCREMENT_RUNNERS)),
];

/// Authorization gate backed by a static access table.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    table: &'static [(Operation, Access)],
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            table: ACCESS_TABLE,
        }
    }
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rule for an operation. Operations missing from the table are denied.
    pub fn access_for(&self, operation: Operation) -> Option<Access> {
        self.table
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, access)| *access)
    }

    pub fn authorize(&self, operation: Operation, role: Role) -> Result<(), AccessDenied> {
        match self.access_for(operation) {
            Some(access) if access.permits(role) => Ok(()),
            _ => Err(AccessDenied { operation, role }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("role {} may not perform {}", .role.as_str(), .operation.as_str())]
pub struct AccessDenied {
    pub operation: Operation,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 4] = [Role::Admin, Role::Hr, Role::Manager, Role::Employee];

    #[test]
    fn every_operation_has_a_rule() {
        let policy = AccessPolicy::new();
        for operation in Operation::ALL {
            assert!(
                policy.access_for(operation).is_some(),
                "missing rule for {}",
                operation.as_str()
            );
        }
    }

    #[test]
    fn record_management_is_limited_to_hr_tooling_roles() {
        let policy = AccessPolicy::new();
        for operation in [Operation::CreateEmployee, Operation::UpdateEmployee] {
            assert!(policy.authorize(operation, Role::Hr).is_ok());
            assert!(policy.authorize(operation, Role::Admin).is_ok());
            assert!(policy.authorize(operation, Role::Manager).is_ok());
            let err = policy.authorize(operation, Role::Employee).unwrap_err();
            assert_eq!(err.role, Role::Employee);
            assert_eq!(err.operation, operation);
        }
    }

    #[test]
    fn increment_runs_exclude_managers() {
        let policy = AccessPolicy::new();
        assert!(policy.authorize(Operation::RunDaIncrement, Role::Hr).is_ok());
        assert!(policy.authorize(Operation::RunDaIncrement, Role::Admin).is_ok());
        assert!(policy
            .authorize(Operation::RunDaIncrement, Role::Manager)
            .is_err());
        assert!(policy
            .authorize(Operation::RunDaIncrement, Role::Employee)
            .is_err());
    }

    #[test]
    fn open_operations_allow_every_role() {
        let policy = AccessPolicy::new();
        for operation in [
            Operation::ListEmployees,
            Operation::GetEmployee,
            Operation::MarkAttendance,
            Operation::RecordTaskCompletion,
        ] {
            for role in ALL_ROLES {
                assert!(policy.authorize(operation, role).is_ok());
            }
        }
    }

    #[test]
    fn operations_missing_from_table_are_denied() {
        let policy = AccessPolicy {
            table: &[(Operation::ListEmployees, Access::AnyAuthenticated)],
        };
        assert!(policy
            .authorize(Operation::GetEmployee, Role::Admin)
            .is_err());
    }

    #[test]
    fn role_claims_resolve_case_insensitively() {
        assert_eq!(Role::from_claim("HR"), Role::Hr);
        assert_eq!(Role::from_claim(" admin "), Role::Admin);
        assert_eq!(Role::from_claim("manager"), Role::Manager);
        assert_eq!(Role::from_claim("intern"), Role::Employee);
        assert_eq!(Role::from_claim(""), Role::Employee);
    }
}
