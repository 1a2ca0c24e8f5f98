//! Configuration error types

use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown key in an options document
    #[error("Invalid option \"{0}\"")]
    InvalidOption(String),

    /// The stage registry was initialized a second time
    #[error("Stages have already been initialized")]
    StagesAlreadyInitialized,

    /// Stage list is not a sequence of stage descriptors
    #[error("Invalid stage list: {0}")]
    InvalidStageList(String),

    /// Abbreviation has bad characters or collides with a registered name
    #[error("Invalid stage abbreviation \"{abbrev}\": {reason}")]
    InvalidAbbreviation {
        /// The rejected abbreviation
        abbrev: String,
        /// Why it was rejected
        reason: String,
    },

    /// No stage could be resolved for a store
    #[error("Environment required: no stage could be resolved")]
    MissingEnvironment,

    /// Options document is not a mapping or has a wrongly typed field
    #[error("Invalid options: {0}")]
    InvalidOptionsType(String),

    /// A layer value is not a string, boolean or number
    #[error("Type \"{type_name}\" not supported in config (key \"{key}\")")]
    UnsupportedValueType {
        /// Key carrying the offending value
        key: String,
        /// JSON type name of the offending value
        type_name: &'static str,
    },

    /// Options were passed for a stage that already has a cached store
    #[error("Cannot pass options when a config for stage \"{0}\" already exists")]
    SingletonConflict(String),

    /// Stage membership check called with an unsupported shape
    #[error("Invalid lookup environments specified: {0}")]
    InvalidLookupInput(String),

    /// Required external environment variable is not set
    #[error("Environment variable not set: {0}")]
    MissingVariable(String),

    /// Failed to parse an options document
    #[error("Failed to parse options: {0}")]
    ParseError(String),

    /// Shared state lock was poisoned by a panicking holder
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Fieldless discriminant of [`ConfigError`], convenient for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    InvalidOption,
    StagesAlreadyInitialized,
    InvalidStageList,
    InvalidAbbreviation,
    MissingEnvironment,
    InvalidOptionsType,
    UnsupportedValueType,
    SingletonConflict,
    InvalidLookupInput,
    MissingVariable,
    ParseError,
    LockPoisoned,
}

impl ConfigError {
    /// Create an abbreviation error
    pub fn invalid_abbreviation<S: Into<String>>(abbrev: S, reason: S) -> Self {
        ConfigError::InvalidAbbreviation {
            abbrev: abbrev.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing variable error
    pub fn missing_variable<S: Into<String>>(key: S) -> Self {
        ConfigError::MissingVariable(key.into())
    }

    /// Create a lock poisoned error
    pub fn poisoned(err: impl std::fmt::Display) -> Self {
        ConfigError::LockPoisoned(err.to_string())
    }

    /// The kind of this error
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigError::InvalidOption(_) => ConfigErrorKind::InvalidOption,
            ConfigError::StagesAlreadyInitialized => ConfigErrorKind::StagesAlreadyInitialized,
            ConfigError::InvalidStageList(_) => ConfigErrorKind::InvalidStageList,
            ConfigError::InvalidAbbreviation { .. } => ConfigErrorKind::InvalidAbbreviation,
            ConfigError::MissingEnvironment => ConfigErrorKind::MissingEnvironment,
            ConfigError::InvalidOptionsType(_) => ConfigErrorKind::InvalidOptionsType,
            ConfigError::UnsupportedValueType { .. } => ConfigErrorKind::UnsupportedValueType,
            ConfigError::SingletonConflict(_) => ConfigErrorKind::SingletonConflict,
            ConfigError::InvalidLookupInput(_) => ConfigErrorKind::InvalidLookupInput,
            ConfigError::MissingVariable(_) => ConfigErrorKind::MissingVariable,
            ConfigError::ParseError(_) => ConfigErrorKind::ParseError,
            ConfigError::LockPoisoned(_) => ConfigErrorKind::LockPoisoned,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
