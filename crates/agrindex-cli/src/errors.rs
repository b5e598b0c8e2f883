use agrindex_core::models::TriggerRef;
use agrindex_core::AgrindexError;
use console::style;
use std::fmt;

/// Error with context and suggestions, rendered for a terminal
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// No state machine to schedule the follow-up workflow on
pub fn missing_state_machine() -> CliError {
    CliError::new("No state machine configured")
        .with_context("A run ends by starting the follow-up workflow, which needs a state machine ARN.")
        .with_suggestion("Pass --state-machine-arn arn:aws:states:<region>:<account>:stateMachine:<name>")
        .with_suggestion("Or set AGRINDEX_STATE_MACHINE_ARN")
        .with_suggestion("Or add state_machine_arn to agrindex.toml")
        .with_help("Run: agrindex config")
}

/// The event document could not be read
pub fn event_unreadable(path: &str, error: &std::io::Error) -> CliError {
    CliError::new("Cannot read event document")
        .with_context(format!("Path: {}\nError: {}", path, error))
        .with_suggestion("Pass a path to a storage event JSON file, or - to read stdin")
        .with_help("Run: agrindex event --help")
}

/// The event document was read but is not a storage event
pub fn event_malformed(error: &AgrindexError) -> CliError {
    CliError::new("Malformed trigger event")
        .with_context(error.to_string())
        .with_suggestion("The document needs Records[0].s3.bucket.name and Records[0].s3.object.key")
        .with_help("Run: agrindex event --help")
}

/// A run failed; names the index and band when the failure concerns one
pub fn run_failed(trigger: &TriggerRef, error: &AgrindexError) -> CliError {
    let mut context = format!("Document: s3://{}/{}\nError: {}", trigger.bucket, trigger.key, error);

    if let AgrindexError::IndexFailed { index, uploaded, .. } = error {
        context.push_str(&format!("\nIndex: {}", index));
        if let Some(band) = error.band() {
            context.push_str(&format!("\nBand: {}", band));
        }
        if !uploaded.is_empty() {
            context.push_str(&format!("\nAlready uploaded: {}", uploaded.join(", ")));
        }
    }

    let cli_error = CliError::new("Field index run failed").with_context(context);
    let cli_error = match error {
        err if err.is_retryable() => {
            cli_error.with_suggestion("This failure is transient; run the same trigger again")
        }
        AgrindexError::MalformedGeometry { .. } => cli_error
            .with_suggestion("Check that the document is a GeoJSON Feature with a Polygon geometry"),
        AgrindexError::ExecutionIdentityExhausted { .. } => cli_error
            .with_suggestion("Raise --max-probe-attempts or clean up old executions"),
        AgrindexError::IndexFailed { source, .. }
            if matches!(**source, AgrindexError::EmptyClipError { .. }) =>
        {
            cli_error.with_suggestion("The field lies outside the resolved scene; check its coordinates")
        }
        _ => cli_error,
    };

    cli_error.with_help("Run with RUST_LOG=debug for stage-by-stage logs")
}
