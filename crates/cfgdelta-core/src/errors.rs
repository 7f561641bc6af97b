use crate::model::{NodeId, NodeKind};
use crate::path::Path;
use thiserror::Error;

/// Result type alias using DeltaError
pub type Result<T> = std::result::Result<T, DeltaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// in cfgdelta. Each kind maps to a stable error code that can be used for
/// programmatic error handling, testing, and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Paths
    InvalidPath,
    PathNotFound,

    // Store
    NotFound,
    WrongNodeKind,
    Rejected,

    // Alignment
    NotMemoizable,
    AlreadyAligned,
    KindMismatch,
    LengthMismatch,
    UnequalValues,

    // Diff building
    AlreadyBuilt,

    // Reference resolution
    UnknownReferenceRoot,
    InvalidReference,

    // Application
    ApplyFailed,

    // Statement emission
    ForwardReference,

    // Integration/IO
    Serialization,
    Config,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidPath => "ERR_INVALID_PATH",
            ExErrorKind::PathNotFound => "ERR_PATH_NOT_FOUND",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::WrongNodeKind => "ERR_WRONG_NODE_KIND",
            ExErrorKind::Rejected => "ERR_REJECTED",
            ExErrorKind::NotMemoizable => "ERR_NOT_MEMOIZABLE",
            ExErrorKind::AlreadyAligned => "ERR_ALREADY_ALIGNED",
            ExErrorKind::KindMismatch => "ERR_KIND_MISMATCH",
            ExErrorKind::LengthMismatch => "ERR_LENGTH_MISMATCH",
            ExErrorKind::UnequalValues => "ERR_UNEQUAL_VALUES",
            ExErrorKind::AlreadyBuilt => "ERR_ALREADY_BUILT",
            ExErrorKind::UnknownReferenceRoot => "ERR_UNKNOWN_REFERENCE_ROOT",
            ExErrorKind::InvalidReference => "ERR_INVALID_REFERENCE",
            ExErrorKind::ApplyFailed => "ERR_APPLY_FAILED",
            ExErrorKind::ForwardReference => "ERR_FORWARD_REFERENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    path: Option<String>,
    node_id: Option<NodeId>,
    failure_count: Option<usize>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            path: None,
            node_id: None,
            failure_count: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add path context (rendered with the canonical path grammar)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add node handle context
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Add the number of aggregated failures
    pub fn with_failure_count(mut self, count: usize) -> Self {
        self.failure_count = Some(count);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the node handle context, if any
    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    /// Get the number of aggregated failures, if any
    pub fn failure_count(&self) -> Option<usize> {
        self.failure_count
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(node_id) = self.node_id {
            write!(f, " (node: {})", node_id)?;
        }
        if let Some(count) = self.failure_count {
            write!(f, " ({} failures)", count)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Which side of an alignment an operand belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        }
    }
}

/// Classification of a single failed change inside an [`ApplyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyFailureKind {
    /// The change targets the root path
    RootTarget,
    /// The parent path does not resolve in the old tree
    ParentMissing,
    /// The parent exists but cannot hold the addressed element
    ParentWrongKind,
    /// The operation is not supported for this path element
    UnsupportedPathElement,
    /// `SetValue` on a target that already holds a value
    ValueAlreadyPresent,
    /// `ModifyValue`/`DeleteValue` on a target without a value
    ValueAbsent,
    /// `SetValue`/`DeleteValue` addressed through a sequence index
    IndexUnsupported,
    /// The record refused the change under its type schema
    Rejected,
}

/// One failed change: the target path, the rendered operation and the reason
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    pub path: Path,
    pub operation: String,
    pub kind: ApplyFailureKind,
    pub message: String,
}

/// Aggregate of every change that could not be applied in one call
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyError {
    failures: Vec<ApplyFailure>,
}

impl ApplyError {
    /// Build an aggregate error; failures are ordered by rendered path.
    pub fn new(mut failures: Vec<ApplyFailure>) -> Self {
        failures.sort_by_key(|failure| failure.path.to_string());
        Self { failures }
    }

    pub fn failures(&self) -> &[ApplyFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if any failure is of the given kind
    pub fn contains_kind(&self, kind: ApplyFailureKind) -> bool {
        self.failures.iter().any(|failure| failure.kind == kind)
    }
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to apply diff:")?;
        for failure in &self.failures {
            write!(
                f,
                "\n  * For <root>{}={}: {}",
                failure.path, failure.operation, failure.message
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplyError {}

/// Comprehensive error taxonomy for cfgdelta operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeltaError {
    // ===== Path Errors =====
    /// Path text does not follow the path grammar
    #[error("Invalid path {input:?} at offset {offset}: {reason}")]
    PathSyntax {
        input: String,
        offset: usize,
        reason: String,
    },

    /// Element cannot be followed on a container of this kind
    #[error("Cannot follow {element} on a {found}")]
    PathKindMismatch { element: String, found: String },

    /// Element is valid for the container but holds no value
    #[error("No value at {element}")]
    PathNotFound { element: String },

    // ===== Store Errors =====
    /// Handle does not name a node in the store
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: NodeId },

    /// Node exists but is not of the kind the operation requires
    #[error("Node {node_id} is a {found}, expected a {expected}")]
    WrongNodeKind {
        node_id: NodeId,
        expected: NodeKind,
        found: NodeKind,
    },

    /// Record type does not permit the field
    #[error("Type {type_name} does not accept field {field:?}")]
    FieldRejected { type_name: String, field: String },

    /// Record cannot switch type while it holds a field the new type refuses
    #[error("Cannot change type to {type_name}: field {field:?} is not accepted")]
    TypeRejected { type_name: String, field: String },

    // ===== Alignment Errors =====
    /// Leaves are compared by value and can never be aligned
    #[error("{side}_value={value} may not be aligned because it is not memoizable")]
    NotMemoizable { side: Side, value: String },

    /// Operand already has a counterpart
    #[error("An alignment has already been added for {side} value {node_id}")]
    AlreadyAligned { side: Side, node_id: NodeId },

    /// Aligned nodes must share a kind
    #[error("Aligning objects of different types is not supported ({old} vs {new})")]
    KindMismatch { old: NodeKind, new: NodeKind },

    /// Aligned sequences must share a length
    #[error("Aligning sequences with different lengths is not supported ({old_len} vs {new_len})")]
    LengthMismatch { old_len: usize, new_len: usize },

    /// Unordered collections may only be aligned when structurally equal
    #[error("Values of type {kind} may only be aligned if they are equal ({old} vs {new})")]
    UnequalValues {
        kind: NodeKind,
        old: NodeId,
        new: NodeId,
    },

    // ===== Diff Building Errors =====
    /// A builder produces exactly one diff
    #[error("build_diff should be called at most once")]
    DiffAlreadyBuilt,

    /// Alignment broke an invariant the builder relies on
    #[error("Diff builder invariant violated: {message}")]
    BuilderInvariant { message: String },

    // ===== Reference Resolution Errors =====
    /// Reference root is neither `old` nor `new_shared_values`
    #[error("Unexpected Reference.root {root:?}")]
    UnknownReferenceRoot { root: String },

    /// Reference target cannot be resolved
    #[error("Invalid reference {reference}: {reason}")]
    InvalidReferenceTarget { reference: String, reason: String },

    // ===== Application Errors =====
    /// Every change that failed during one apply call
    #[error(transparent)]
    Apply(ApplyError),

    // ===== Statement Emission Errors =====
    /// Change cannot be expressed as a statement
    #[error("Cannot emit change at {path:?}: {reason}")]
    UnsupportedChange { path: String, reason: String },

    /// A shared value binding refers to a shared value bound after it
    #[error("new_shared_values[{index}] refers to new_shared_values[{target}], which is bound later")]
    ForwardSharedReference { index: usize, target: usize },

    // ===== Integration Errors =====
    /// Tree or diff document could not be converted
    #[error("Interchange error: {message}")]
    Interchange { message: String },

    /// Options could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filesystem error
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl DeltaError {
    /// Aggregated apply failures, if this is an apply error
    pub fn apply_failures(&self) -> Option<&[ApplyFailure]> {
        match self {
            DeltaError::Apply(err) => Some(err.failures()),
            _ => None,
        }
    }
}

impl From<ApplyError> for DeltaError {
    fn from(err: ApplyError) -> Self {
        DeltaError::Apply(err)
    }
}

impl From<serde_json::Error> for DeltaError {
    fn from(err: serde_json::Error) -> Self {
        DeltaError::Interchange {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for DeltaError {
    fn from(err: std::io::Error) -> Self {
        DeltaError::Io {
            message: err.to_string(),
        }
    }
}

/// Conversion from DeltaError to ExError
///
/// This allows the logging facility and external callers to classify any
/// domain error by its stable code.
impl From<DeltaError> for ExError {
    fn from(err: DeltaError) -> Self {
        let message = err.to_string();
        match err {
            DeltaError::PathSyntax { input, .. } => ExError::new(ExErrorKind::InvalidPath)
                .with_path(input)
                .with_message(message),

            DeltaError::PathKindMismatch { element, .. } => {
                ExError::new(ExErrorKind::WrongNodeKind)
                    .with_path(element)
                    .with_message(message)
            }

            DeltaError::PathNotFound { element } => ExError::new(ExErrorKind::PathNotFound)
                .with_path(element)
                .with_message(message),

            DeltaError::NodeNotFound { node_id } => ExError::new(ExErrorKind::NotFound)
                .with_node_id(node_id)
                .with_message(message),

            DeltaError::WrongNodeKind { node_id, .. } => ExError::new(ExErrorKind::WrongNodeKind)
                .with_node_id(node_id)
                .with_message(message),

            DeltaError::FieldRejected { .. } | DeltaError::TypeRejected { .. } => {
                ExError::new(ExErrorKind::Rejected).with_message(message)
            }

            DeltaError::NotMemoizable { .. } => {
                ExError::new(ExErrorKind::NotMemoizable).with_message(message)
            }

            DeltaError::AlreadyAligned { node_id, .. } => {
                ExError::new(ExErrorKind::AlreadyAligned)
                    .with_node_id(node_id)
                    .with_message(message)
            }

            DeltaError::KindMismatch { .. } => {
                ExError::new(ExErrorKind::KindMismatch).with_message(message)
            }

            DeltaError::LengthMismatch { .. } => {
                ExError::new(ExErrorKind::LengthMismatch).with_message(message)
            }

            DeltaError::UnequalValues { old, .. } => ExError::new(ExErrorKind::UnequalValues)
                .with_node_id(old)
                .with_message(message),

            DeltaError::DiffAlreadyBuilt => ExError::new(ExErrorKind::AlreadyBuilt)
                .with_op("build_diff")
                .with_message(message),

            DeltaError::BuilderInvariant { .. } => ExError::new(ExErrorKind::Internal)
                .with_op("build_diff")
                .with_message(message),

            DeltaError::UnknownReferenceRoot { .. } => {
                ExError::new(ExErrorKind::UnknownReferenceRoot)
                    .with_op("resolve_diff_references")
                    .with_message(message)
            }

            DeltaError::InvalidReferenceTarget { reference, .. } => {
                ExError::new(ExErrorKind::InvalidReference)
                    .with_op("resolve_diff_references")
                    .with_path(reference)
                    .with_message(message)
            }

            DeltaError::Apply(apply) => ExError::new(ExErrorKind::ApplyFailed)
                .with_op("apply_diff")
                .with_failure_count(apply.len())
                .with_message(message),

            DeltaError::UnsupportedChange { path, .. } => ExError::new(ExErrorKind::Rejected)
                .with_op("emit_statements")
                .with_path(path)
                .with_message(message),

            DeltaError::ForwardSharedReference { .. } => {
                ExError::new(ExErrorKind::ForwardReference)
                    .with_op("emit_statements")
                    .with_message(message)
            }

            DeltaError::Interchange { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            DeltaError::Config { .. } => ExError::new(ExErrorKind::Config).with_message(message),

            DeltaError::Io { .. } => ExError::new(ExErrorKind::Io).with_message(message),
        }
    }
}
