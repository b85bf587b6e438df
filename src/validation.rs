/// Request schema validation for the inference endpoint
///
/// Incoming bodies must look like `{"data": [[f1, f2, f3, f4], ...]}`. Every
/// violation found in a body is collected and reported together, in input
/// order, so a client can fix a whole batch in one round trip.
///
/// Validation is pure: it never touches the model.
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Number of features in one record (sepal length/width, petal length/width).
pub const FEATURE_COUNT: usize = 4;

/// One validated input record.
pub type FeatureRecord = [f64; FEATURE_COUNT];

/// Name of the body field carrying the batch.
pub const DATA_FIELD: &str = "data";

/// Which constraint a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    JsonInvalid,
    Missing,
    Type,
    TooShort,
    TooLong,
    EmptyBatch,
    BatchTooLarge,
}

/// Path segment pointing at the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Loc {
    Field(String),
    Index(usize),
}

impl From<&str> for Loc {
    fn from(name: &str) -> Self {
        Loc::Field(name.to_string())
    }
}

impl From<usize> for Loc {
    fn from(idx: usize) -> Self {
        Loc::Index(idx)
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub loc: Vec<Loc>,
    pub kind: IssueKind,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Issue {
    pub fn new(loc: Vec<Loc>, kind: IssueKind, msg: impl Into<String>) -> Self {
        Self {
            loc,
            kind,
            msg: msg.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Rejection of a request body. Always holds at least one issue.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    pub fn single(issue: Issue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    fn from_issues(issues: Vec<Issue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = &self.issues[0];
        write!(f, "{}", first.msg)?;
        if self.issues.len() > 1 {
            write!(f, " (and {} more)", self.issues.len() - 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Parse raw request bytes into JSON.
pub fn parse_body(bytes: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(bytes).map_err(|e| {
        ValidationError::single(Issue::new(
            vec!["body".into()],
            IssueKind::JsonInvalid,
            format!("request body is not valid JSON: {e}"),
        ))
    })
}

/// Validate a predict request body and normalize it into fixed-size records.
pub fn validate_predict_request(
    body: &Value,
    max_batch_size: usize,
) -> Result<Vec<FeatureRecord>, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::single(Issue::new(
            vec!["body".into()],
            IssueKind::Type,
            "request body must be a JSON object",
        )));
    };

    let Some(data) = obj.get(DATA_FIELD) else {
        return Err(ValidationError::single(Issue::new(
            vec![DATA_FIELD.into()],
            IssueKind::Missing,
            "field required",
        )));
    };

    let Some(rows) = data.as_array() else {
        return Err(ValidationError::single(Issue::new(
            vec![DATA_FIELD.into()],
            IssueKind::Type,
            "value must be a list of records",
        )));
    };

    if rows.is_empty() {
        return Err(ValidationError::single(
            Issue::new(
                vec![DATA_FIELD.into()],
                IssueKind::EmptyBatch,
                "batch must contain at least one record",
            )
            .with_limit(1),
        ));
    }

    if rows.len() > max_batch_size {
        return Err(ValidationError::single(
            Issue::new(
                vec![DATA_FIELD.into()],
                IssueKind::BatchTooLarge,
                format!(
                    "batch has {} records, maximum is {}",
                    rows.len(),
                    max_batch_size
                ),
            )
            .with_limit(max_batch_size),
        ));
    }

    let mut records = Vec::with_capacity(rows.len());
    let mut issues = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        match validate_record(idx, row) {
            Ok(record) => records.push(record),
            Err(mut found) => issues.append(&mut found),
        }
    }

    match ValidationError::from_issues(issues) {
        Some(err) => Err(err),
        None => Ok(records),
    }
}

/// Validate one record at position `idx` of the batch.
pub fn validate_record(idx: usize, row: &Value) -> Result<FeatureRecord, Vec<Issue>> {
    let loc = || vec![Loc::from(DATA_FIELD), Loc::Index(idx)];

    let Some(values) = row.as_array() else {
        return Err(vec![Issue::new(
            loc(),
            IssueKind::Type,
            "record must be a list of numbers",
        )]);
    };

    let mut issues = Vec::new();
    let mut record = [0.0_f64; FEATURE_COUNT];
    for (j, value) in values.iter().enumerate() {
        match value.as_f64() {
            Some(v) => {
                if j < FEATURE_COUNT {
                    record[j] = v;
                }
            }
            None => {
                let mut at = loc();
                at.push(Loc::Index(j));
                issues.push(Issue::new(
                    at,
                    IssueKind::Type,
                    "value is not a valid number",
                ));
            }
        }
    }

    if values.len() < FEATURE_COUNT {
        issues.push(
            Issue::new(
                loc(),
                IssueKind::TooShort,
                format!(
                    "record must contain exactly {} values, got {}",
                    FEATURE_COUNT,
                    values.len()
                ),
            )
            .with_limit(FEATURE_COUNT),
        );
    } else if values.len() > FEATURE_COUNT {
        issues.push(
            Issue::new(
                loc(),
                IssueKind::TooLong,
                format!(
                    "record must contain exactly {} values, got {}",
                    FEATURE_COUNT,
                    values.len()
                ),
            )
            .with_limit(FEATURE_COUNT),
        );
    }

    if issues.is_empty() {
        Ok(record)
    } else {
        Err(issues)
    }
}
