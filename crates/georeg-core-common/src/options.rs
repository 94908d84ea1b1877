//! Creation option schema and `KEY=VALUE` option lists.

use std::fmt;

use crate::error::DriverError;

/// Value type of a creation option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Free-form string.
    String,
    /// One of [`CreationOptionDef::allowed_values`].
    StringSelect,
    /// `YES`/`NO` style flag.
    Boolean,
    /// Integer with an inclusive range.
    Int { min: i64, max: i64 },
    /// Floating point value with an inclusive lower bound.
    Float { min: f64 },
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::StringSelect => f.write_str("string-select"),
            Self::Boolean => f.write_str("boolean"),
            Self::Int { min, max } => write!(f, "int [{min}, {max}]"),
            Self::Float { min } => write!(f, "float >= {min}"),
        }
    }
}

/// One entry of a driver's creation option schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationOptionDef {
    pub name: String,
    pub kind: OptionKind,
    pub default: Option<String>,
    pub allowed_values: Vec<String>,
    pub description: String,
}

impl CreationOptionDef {
    pub fn new(name: &str, kind: OptionKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            allowed_values: Vec::new(),
            description: description.to_string(),
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered, case-insensitive `KEY=VALUE` list handed to a creator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationOptions {
    entries: Vec<(String, String)>,
}

impl CreationOptions {
    /// Parses `KEY=VALUE` strings.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidCreationOption`] for an item without `=`
    /// or with an empty key.
    pub fn parse<I, S>(items: I) -> Result<Self, DriverError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        for item in items {
            let item = item.as_ref();
            let (key, value) =
                item.split_once('=')
                    .ok_or_else(|| DriverError::InvalidCreationOption {
                        option: item.to_string(),
                        message: "expected KEY=VALUE".to_string(),
                    })?;
            if key.trim().is_empty() {
                return Err(DriverError::InvalidCreationOption {
                    option: item.to_string(),
                    message: "empty option name".to_string(),
                });
            }
            options.set(key.trim(), value.trim());
        }
        Ok(options)
    }

    /// Sets `key`, replacing an earlier value for the same key.
    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Reads a boolean flag; absent keys yield `default`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidCreationOption`] for values that are not
    /// one of `YES/NO/TRUE/FALSE/ON/OFF/1/0`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, DriverError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse_bool(value).ok_or_else(|| DriverError::InvalidCreationOption {
                option: key.to_string(),
                message: format!("'{value}' is not a boolean"),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" | "1" => Some(true),
        "NO" | "FALSE" | "OFF" | "0" => Some(false),
        _ => None,
    }
}

/// A problem found while checking options against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionIssue {
    /// The driver does not declare this option.
    UnknownOption { name: String },
    /// The value does not fit the declared type or range.
    InvalidValue { name: String, value: String, expected: String },
}

impl fmt::Display for OptionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption { name } => {
                write!(f, "driver does not support creation option {name}")
            },
            Self::InvalidValue {
                name,
                value,
                expected,
            } => write!(f, "{name}={value} is invalid, expected {expected}"),
        }
    }
}

/// Checks `options` against a driver schema.
///
/// Issues are advisory: the driver's own negotiation decides what is fatal.
/// String-select values are compared case-insensitively.
#[must_use]
pub fn validate_creation_options(
    schema: &[CreationOptionDef],
    options: &CreationOptions,
) -> Vec<OptionIssue> {
    let mut issues = Vec::new();
    for (name, value) in options.iter() {
        let Some(def) = schema.iter().find(|d| d.name.eq_ignore_ascii_case(name)) else {
            issues.push(OptionIssue::UnknownOption {
                name: name.to_string(),
            });
            continue;
        };
        let ok = match &def.kind {
            OptionKind::String => true,
            OptionKind::StringSelect => def
                .allowed_values
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(value)),
            OptionKind::Boolean => parse_bool(value).is_some(),
            OptionKind::Int { min, max } => value
                .parse::<i64>()
                .is_ok_and(|v| (*min..=*max).contains(&v)),
            OptionKind::Float { min } => value.parse::<f64>().is_ok_and(|v| v >= *min),
        };
        if !ok {
            let expected = if def.kind == OptionKind::StringSelect {
                def.allowed_values.join("|")
            } else {
                def.kind.to_string()
            };
            issues.push(OptionIssue::InvalidValue {
                name: def.name.clone(),
                value: value.to_string(),
                expected,
            });
        }
    }
    issues
}
