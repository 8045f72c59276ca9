//! Errors raised while reading and resolving shader node graphs.
//!
//! Every error aborts the enclosing technique load. The [Location] points at the statement that
//! triggered it when one is known.

use super::{definition::Stage, parsing::Statement};

/// Result of any loading or resolving step.
pub type LoadResult<T> = Result<T, Error>;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Originating line of an [Error].
pub struct Location {
    /// 1-based line number in the source text.
    pub line: usize,
    /// Trimmed text of the statement line.
    pub text: String,
}

impl From<&Statement> for Location {
    fn from(statement: &Statement) -> Self {
        Self {
            line: statement.line_number,
            text: statement.line.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Coarse classification of an [ErrorKind].
pub enum Category {
    /// Malformed text.
    Syntax,
    /// Something named does not exist (or exists twice).
    Reference,
    /// Incompatible types, swizzles or multiplicities.
    Type,
    /// Illegal data flow between shader stages.
    Stage,
    /// The asset loader could not provide a requested file.
    Asset,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
/// What went wrong.
pub enum ErrorKind {
    #[error("Unable to read block structure: {0}")]
    /// The block reader rejected the text.
    Block(String),

    #[error("Expected {expected}, got `{got}`")]
    /// A statement keyword is not valid in its block.
    UnexpectedStatement {
        /// Keywords accepted at this point.
        expected: &'static str,
        /// First word of the offending line.
        got: String,
    },

    #[error("Not a valid mapping `{0}`, should be `<varName>[.<swizzling>] = <nameSpace>.<varName>[.<swizzling>][:Condition]`")]
    /// Mapping line with a wrong `=` count or wrong reference shape.
    MalformedMapping(String),

    #[error("Not a valid variable declaration `{0}`, should be `<glslType> <varName>[<multiplicity>] [<defaultValue>]`")]
    /// Variable declaration with a wrong token count.
    MalformedVariable(String),

    #[error("{0} statement syntax incorrect")]
    /// Structurally wrong statement (missing `:`, wrong token count...).
    MalformedStatement(&'static str),

    #[error("Duplicate variable name `{0}`")]
    /// Same variable declared twice in one `Input`/`Output` block.
    DuplicateVariable(String),

    #[error("Unknown shader stage `{0}`")]
    /// `Type:` value of a definition is not a stage.
    UnknownStage(String),

    #[error("Unknown material parameter type `{0}`")]
    /// Material parameter declared with an unknown type.
    UnknownVarType(String),

    #[error("Shader node definition `{0}` does not declare its Type")]
    /// Definition block without a `Type:` line.
    MissingStage(String),

    #[error("Shader node `{0}` must declare its Definition before anything else")]
    /// A node block without (or not starting with) a `Definition:` line.
    MissingDefinition(String),

    #[error("Only the Global namespace is allowed on the left of an output mapping, got `{0}`")]
    /// Output mapping writing to something else than a global.
    OutputNamespace(String),

    #[error("ShaderNode `{0}` is already defined")]
    /// Two nodes with the same name in one technique.
    DuplicateNode(String),

    #[error("Undeclared node `{0}`, make sure this node is declared before the current node")]
    /// Reference to a node that is unknown at this point.
    UndeclaredNode(String),

    #[error("`{0}` is not declared as a shader node definition")]
    /// `Definition:` names something that was never loaded.
    UnknownDefinition(String),

    #[error("Could not find a material parameter named `{0}`")]
    /// `MatParam.<name>` with no such parameter.
    UnknownMaterialParameter(String),

    #[error("Could not find a world parameter named `{0}`")]
    /// `WorldParam.<name>` not bound by the technique.
    UnknownWorldParameter(String),

    #[error("Unknown world binding `{0}`")]
    /// `WorldParameters` entry that is not an engine binding.
    UnknownBinding(String),

    #[error("`{variable}` is not an input variable of `{definition}`")]
    /// Input mapping to a name the definition does not declare.
    NotAnInput {
        /// Mapped name.
        variable: String,
        /// Definition searched.
        definition: String,
    },

    #[error("`{variable}` is not an output variable of `{definition}`")]
    /// Reference to an output the definition does not declare.
    NotAnOutput {
        /// Referenced name.
        variable: String,
        /// Definition searched.
        definition: String,
    },

    #[error("Invalid condition `{0}`, condition must match a material parameter")]
    /// Condition identifier that is not a material parameter.
    InvalidCondition(String),

    #[error("Wrong multiplicity for variable `{variable}`: `{multiplicity}` should be an int or a declared material parameter")]
    /// Multiplicity token that is neither a literal nor a parameter.
    InvalidMultiplicity {
        /// Left variable carrying the multiplicity.
        variable: String,
        /// Offending token.
        multiplicity: String,
    },

    #[error("Type mismatch, cannot convert {right} to {left}")]
    /// Component counts differ.
    TypeMismatch {
        /// Left type with swizzle.
        left: String,
        /// Right type with swizzle.
        right: String,
    },

    #[error("Type mismatch, cannot convert {left} to {right}")]
    /// Array sizes differ.
    MultiplicityMismatch {
        /// Left type with multiplicity.
        left: String,
        /// Right type with multiplicity.
        right: String,
    },

    #[error("Samplers can only be inputs, `{0}` is a sampler output")]
    /// Sampler on an output mapping.
    SamplerOutput(String),

    #[error("Samplers can only be assigned to material parameters, got `{0}`")]
    /// Sampler input fed from something else than a material parameter.
    SamplerSource(String),

    #[error("{param} can only be matched to one of {expected}, found {found}")]
    /// A sampler union with no alternative matching the consumer.
    SamplerUnion {
        /// Material parameter name.
        param: String,
        /// Accepted alternatives, comma separated.
        expected: String,
        /// Type expected by the consumer.
        found: String,
    },

    #[error("`{0}` is not of Array type")]
    /// Multiplicity used with a non-array parameter.
    NotAnArray(String),

    #[error("Cannot have attribute `{0}` as input of a fragment shader node")]
    /// Attribute read from the fragment stage.
    FragmentAttribute(String),

    #[error("Data cannot flow backward across stages: `{producer}` ({producer_stage}) feeds `{consumer}` ({consumer_stage})")]
    /// Node output consumed by an earlier (or unrelated) stage.
    BackwardFlow {
        /// Producing node.
        producer: String,
        /// Stage of the producing node.
        producer_stage: Stage,
        /// Consuming node.
        consumer: String,
        /// Stage of the consuming node.
        consumer_stage: Stage,
    },

    #[error("A global output is already defined for the vertex shader: `{existing}`, vertex shader can only have one global output (got `{found}`)")]
    /// Second vertex global with a different name.
    VertexGlobal {
        /// Global already stored.
        existing: String,
        /// Global being added.
        found: String,
    },

    #[error("Could not load `{path}`: {reason}")]
    /// The asset loader failed.
    Asset {
        /// Requested asset.
        path: String,
        /// Loader message.
        reason: String,
    },
}

impl ErrorKind {
    /// Coarse classification used for diagnostics.
    pub fn category(&self) -> Category {
        use ErrorKind::*;

        match self {
            Block(_)
            | UnexpectedStatement { .. }
            | MalformedMapping(_)
            | MalformedVariable(_)
            | MalformedStatement(_)
            | DuplicateVariable(_)
            | UnknownStage(_)
            | UnknownVarType(_)
            | MissingStage(_)
            | MissingDefinition(_)
            | OutputNamespace(_) => Category::Syntax,

            DuplicateNode(_)
            | UndeclaredNode(_)
            | UnknownDefinition(_)
            | UnknownMaterialParameter(_)
            | UnknownWorldParameter(_)
            | UnknownBinding(_)
            | NotAnInput { .. }
            | NotAnOutput { .. }
            | InvalidCondition(_)
            | InvalidMultiplicity { .. } => Category::Reference,

            TypeMismatch { .. }
            | MultiplicityMismatch { .. }
            | SamplerOutput(_)
            | SamplerSource(_)
            | SamplerUnion { .. }
            | NotAnArray(_) => Category::Type,

            FragmentAttribute(_) | BackwardFlow { .. } | VertexGlobal { .. } => Category::Stage,

            Asset { .. } => Category::Asset,
        }
    }

    /// Attach the statement being read.
    pub fn at(self, statement: &Statement) -> Error {
        Error {
            kind: self,
            location: Some(statement.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", .location.as_ref().map_or(String::new(), |l| format!(" (line {}: `{}`)", l.line, l.text)))]
/// An [ErrorKind] with the statement it was raised from.
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where, if known.
    pub location: Option<Location>,
}

impl Error {
    /// Shorthand for `self.kind.category()`.
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Attach a location if none was recorded yet.
    pub fn or_at(mut self, statement: &Statement) -> Self {
        if self.location.is_none() {
            self.location = Some(statement.into());
        }
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }
}
