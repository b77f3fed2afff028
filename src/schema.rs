use crate::model::{Genre, MoviePatch, NewMovie};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use url::Url;

const MIN_YEAR: i64 = 1900;
const MAX_YEAR: i64 = 2025;
const MAX_RATE: f64 = 10.0;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathSegment {
    Key(&'static str),
    Index(usize),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    TooSmall,
    TooBig,
    InvalidEnumValue,
    InvalidString,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<&'static str>,
}

impl Issue {
    fn new(path: Vec<PathSegment>, code: IssueCode, message: impl Into<String>) -> Self {
        Issue {
            path,
            code,
            message: message.into(),
            expected: None,
            received: None,
        }
    }

    fn invalid_type(
        path: Vec<PathSegment>,
        expected: &'static str,
        received: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Issue {
            expected: Some(expected),
            received: Some(received),
            ..Issue::new(path, IssueCode::InvalidType, message)
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self.path.first() {
            Some(PathSegment::Key(key)) => Some(*key),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<Issue>);

impl ValidationErrors {
    pub fn single(issue: Issue) -> Self {
        ValidationErrors(vec![issue])
    }

    #[cfg(test)]
    pub fn issues(&self) -> &[Issue] {
        &self.0
    }

    #[cfg(test)]
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|issue| issue.field() == Some(field))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            match issue.field() {
                Some(field) => write!(f, "{}: {}", field, issue.message)?,
                None => f.write_str(&issue.message)?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub fn malformed_body(message: impl Into<String>) -> ValidationErrors {
    ValidationErrors::single(Issue::new(Vec::new(), IssueCode::InvalidType, message))
}

pub fn validate_movie(input: &Value) -> Result<NewMovie, ValidationErrors> {
    let object = as_object(input)?;
    let mut fields = Fields::new(object, true);

    let title = fields.check("title", title);
    let year = fields.check("year", year);
    let director = fields.check("director", director);
    let duration = fields.check("duration", duration);
    let poster = fields.check("poster", poster);
    let genre = fields.check("genre", genre);
    let rate = fields.check_optional("rate", rate);

    fields.finish()?;
    match (title, year, director, duration, poster, genre) {
        (Some(title), Some(year), Some(director), Some(duration), Some(poster), Some(genre)) => {
            Ok(NewMovie {
                title,
                year,
                director,
                duration,
                poster,
                genre,
                rate: rate.unwrap_or(0.0),
            })
        }
        _ => unreachable!("every required field was checked"),
    }
}

pub fn validate_partial_movie(input: &Value) -> Result<MoviePatch, ValidationErrors> {
    let object = as_object(input)?;
    let mut fields = Fields::new(object, false);

    let patch = MoviePatch {
        title: fields.check("title", title),
        year: fields.check("year", year),
        director: fields.check("director", director),
        duration: fields.check("duration", duration),
        poster: fields.check("poster", poster),
        genre: fields.check("genre", genre),
        rate: fields.check_optional("rate", rate),
    };

    fields.finish()?;
    Ok(patch)
}

fn as_object(input: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    input.as_object().ok_or_else(|| {
        ValidationErrors::single(Issue::invalid_type(
            Vec::new(),
            "object",
            type_name(input),
            format!("Expected object, received {}", type_name(input)),
        ))
    })
}

type Rule<T> = fn(&'static str, &Value) -> Result<T, Vec<Issue>>;

struct Fields<'a> {
    object: &'a Map<String, Value>,
    required: bool,
    issues: Vec<Issue>,
}

impl<'a> Fields<'a> {
    fn new(object: &'a Map<String, Value>, required: bool) -> Self {
        Fields {
            object,
            required,
            issues: Vec::new(),
        }
    }

    fn check<T>(&mut self, field: &'static str, rule: Rule<T>) -> Option<T> {
        match self.object.get(field) {
            Some(value) => self.run(field, value, rule),
            None => {
                if self.required {
                    self.issues.push(Issue::invalid_type(
                        vec![PathSegment::Key(field)],
                        expected_type(field),
                        "missing",
                        required_message(field),
                    ));
                }
                None
            }
        }
    }

    fn check_optional<T>(&mut self, field: &'static str, rule: Rule<T>) -> Option<T> {
        let value = self.object.get(field)?;
        self.run(field, value, rule)
    }

    fn run<T>(&mut self, field: &'static str, value: &Value, rule: Rule<T>) -> Option<T> {
        match rule(field, value) {
            Ok(parsed) => Some(parsed),
            Err(mut issues) => {
                self.issues.append(&mut issues);
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.issues))
        }
    }
}

fn expected_type(field: &str) -> &'static str {
    match field {
        "year" | "duration" => "integer",
        "rate" => "number",
        "genre" => "array",
        _ => "string",
    }
}

fn required_message(field: &str) -> String {
    match field {
        "title" => "Movie title is required".to_owned(),
        _ => "Required".to_owned(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn key(field: &'static str) -> Vec<PathSegment> {
    vec![PathSegment::Key(field)]
}

fn string(field: &'static str, value: &Value) -> Result<String, Vec<Issue>> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(vec![Issue::invalid_type(
            key(field),
            "string",
            type_name(other),
            format!("Expected string, received {}", type_name(other)),
        )]),
    }
}

fn integer(field: &'static str, value: &Value) -> Result<i64, Vec<Issue>> {
    let number = match value {
        Value::Number(n) => n,
        other => {
            return Err(vec![Issue::invalid_type(
                key(field),
                "integer",
                type_name(other),
                format!("Expected number, received {}", type_name(other)),
            )])
        }
    };
    if let Some(i) = number.as_i64() {
        return Ok(i);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Some(f) if f.fract() == 0.0 => Ok(if f > 0.0 { i64::MAX } else { i64::MIN }),
        _ => Err(vec![Issue::invalid_type(
            key(field),
            "integer",
            "float",
            "Expected integer, received float",
        )]),
    }
}

fn bounded(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, Vec<Issue>> {
    if value < min {
        Err(vec![Issue::new(
            key(field),
            IssueCode::TooSmall,
            format!("Number must be greater than or equal to {}", min),
        )])
    } else if value > max {
        Err(vec![Issue::new(
            key(field),
            IssueCode::TooBig,
            format!("Number must be less than or equal to {}", max),
        )])
    } else {
        Ok(value)
    }
}

fn title(field: &'static str, value: &Value) -> Result<String, Vec<Issue>> {
    let raw = match value {
        Value::String(s) => s,
        other => {
            return Err(vec![Issue::invalid_type(
                key(field),
                "string",
                type_name(other),
                "Movie title must be a string",
            )])
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(vec![Issue::new(
            key(field),
            IssueCode::TooSmall,
            "Movie title must not be empty",
        )]);
    }
    Ok(trimmed.to_owned())
}

fn year(field: &'static str, value: &Value) -> Result<u16, Vec<Issue>> {
    let year = bounded(field, integer(field, value)?, MIN_YEAR, MAX_YEAR)?;
    Ok(year as u16)
}

fn director(field: &'static str, value: &Value) -> Result<String, Vec<Issue>> {
    string(field, value)
}

fn duration(field: &'static str, value: &Value) -> Result<u32, Vec<Issue>> {
    let minutes = integer(field, value)?;
    if minutes <= 0 {
        return Err(vec![Issue::new(
            key(field),
            IssueCode::TooSmall,
            "Number must be greater than 0",
        )]);
    }
    let minutes = bounded(field, minutes, 1, u32::MAX as i64)?;
    Ok(minutes as u32)
}

fn poster(field: &'static str, value: &Value) -> Result<String, Vec<Issue>> {
    let raw = string(field, value)?;
    match Url::parse(&raw) {
        Ok(_) => Ok(raw),
        Err(_) => Err(vec![Issue::new(
            key(field),
            IssueCode::InvalidString,
            "Invalid url",
        )]),
    }
}

fn genre(field: &'static str, value: &Value) -> Result<Vec<Genre>, Vec<Issue>> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(vec![Issue::invalid_type(
                key(field),
                "array",
                type_name(other),
                format!("Expected array, received {}", type_name(other)),
            )])
        }
    };

    let mut genres = Vec::with_capacity(items.len());
    let mut issues = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let path = vec![PathSegment::Key(field), PathSegment::Index(index)];
        match item {
            Value::String(name) => match Genre::from_name(name) {
                Some(genre) => genres.push(genre),
                None => issues.push(Issue::new(
                    path,
                    IssueCode::InvalidEnumValue,
                    format!(
                        "Invalid enum value. Expected {}, received '{}'",
                        expected_genres(),
                        name
                    ),
                )),
            },
            other => issues.push(Issue::invalid_type(
                path,
                "string",
                type_name(other),
                format!("Expected string, received {}", type_name(other)),
            )),
        }
    }

    if issues.is_empty() {
        Ok(genres)
    } else {
        Err(issues)
    }
}

fn expected_genres() -> String {
    Genre::ALL
        .iter()
        .map(|genre| format!("'{}'", genre))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn rate(field: &'static str, value: &Value) -> Result<f64, Vec<Issue>> {
    let rate = match value.as_f64() {
        Some(rate) => rate,
        None => {
            return Err(vec![Issue::invalid_type(
                key(field),
                "number",
                type_name(value),
                format!("Expected number, received {}", type_name(value)),
            )])
        }
    };
    if rate < 0.0 {
        Err(vec![Issue::new(
            key(field),
            IssueCode::TooSmall,
            "Number must be greater than or equal to 0",
        )])
    } else if rate > MAX_RATE {
        Err(vec![Issue::new(
            key(field),
            IssueCode::TooBig,
            format!("Number must be less than or equal to {}", MAX_RATE),
        )])
    } else {
        Ok(rate)
    }
}
