use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    CommandFailed,
    CommandSpawnFailed,
    PipelineFailed,
    ArchiveFailed,

    DatabaseConnectFailed,
    DatabaseStatementFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::CommandSpawnFailed => "command.spawn_failed",
            ErrorCode::PipelineFailed => "pipeline.failed",
            ErrorCode::ArchiveFailed => "archive.failed",

            ErrorCode::DatabaseConnectFailed => "database.connect_failed",
            ErrorCode::DatabaseStatementFailed => "database.statement_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Everything known about an external command that exited non-zero.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem,
                value,
            }),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key '{}'", key),
            to_details(ConfigMissingKeyDetails { key, path }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("Invalid JSON in configuration {}", path),
            to_details(ConfigInvalidJsonDetails {
                path,
                error: err.to_string(),
            }),
        )
        .with_hint("Configuration must be a JSON object; fix the file rather than relying on defaults")
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = format!(
            "Command `{}` exited with code {}",
            details.command, details.exit_code
        );
        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn command_spawn_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::CommandSpawnFailed,
            format!("Failed to start `{}`", command),
            serde_json::json!({ "command": command, "error": error.into() }),
        )
    }

    pub fn pipeline_failed(
        stage: usize,
        command: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::PipelineFailed,
            format!("Pipeline stage {} (`{}`) failed", stage, command),
            serde_json::json!({ "stage": stage, "command": command, "error": error.into() }),
        )
    }

    pub fn archive_failed(
        operation: impl Into<String>,
        path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let path = path.into();
        Self::new(
            ErrorCode::ArchiveFailed,
            format!("{} failed for {}", operation, path),
            serde_json::json!({ "operation": operation, "path": path, "error": error.into() }),
        )
    }

    pub fn database_connect_failed(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DatabaseConnectFailed,
            "Could not connect to MySQL",
            to_details(DatabaseErrorDetails {
                error: error.into(),
                sql: None,
            }),
        )
        .with_hint("Check --user, --password, --hostname and --port")
    }

    pub fn database_statement_failed(sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DatabaseStatementFailed,
            "MySQL statement failed",
            to_details(DatabaseErrorDetails {
                error: error.into(),
                sql: Some(sql.into()),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("IO error ({}): {}", ctx, error),
            None => format!("IO error: {}", error),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self.code {
            ErrorCode::ConfigMissingKey
            | ErrorCode::ConfigInvalidJson
            | ErrorCode::ValidationMissingArgument
            | ErrorCode::ValidationInvalidArgument => 2,

            ErrorCode::CommandFailed
            | ErrorCode::CommandSpawnFailed
            | ErrorCode::PipelineFailed
            | ErrorCode::ArchiveFailed => 20,

            ErrorCode::DatabaseConnectFailed | ErrorCode::DatabaseStatementFailed => 30,

            ErrorCode::InternalIoError
            | ErrorCode::InternalJsonError
            | ErrorCode::InternalUnexpected => 1,
        }
    }
}
