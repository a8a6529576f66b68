//! Flow package service.
//!
//! Parses package submissions, validates the flow and its questions, stores them in
//! one atomic write, and renders packages back out as JSON:API documents.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::ServiceError;
use super::fields::{self, CharField};
use super::pagination::{
    CursorPage, PAGE_SIZE_PARAM, PageLinks, PageRequest, SequencedSource, paginate, query_param,
};
use crate::config::PaginationConfig;
use crate::models::flow::{MAX_CHAR_LENGTH, max_length_error};
use crate::models::{
    Flow, FlowQuestion, FlowVersion, QuestionType, ValidationErrors, validate_type_options,
};
use crate::storage::{SequenceRange, StorageBackend, StorageError, StoredFlow};

pub const PACKAGE_TYPE: &str = "packages";
pub const PACKAGE_PROFILE: &str = "flow-results-package";
pub const MEDIA_TYPE: &str = "application/json";
pub const ENCODING: &str = "utf-8";

/// Exactly one resource per package is supported.
const RESOURCES_LENGTH: &str = "must contain exactly 1 item";

/// A validated package ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSubmission {
    pub flow: Flow,
    pub questions: Vec<FlowQuestion>,
}

struct RawQuestion {
    id: String,
    question_type: String,
    label: String,
    type_options: Map<String, Value>,
}

struct RawResource {
    language: String,
    questions: Vec<RawQuestion>,
}

struct RawPackage {
    id: Option<Uuid>,
    name: String,
    version: String,
    created: Option<chrono::DateTime<Utc>>,
    modified: Option<chrono::DateTime<Utc>>,
    title: String,
    resources: Vec<RawResource>,
}

/// Parse and validate a package submission body.
///
/// Structural problems are reported first; model and question rules only run once the
/// body has the right shape. All errors are keyed by their path in the request body.
pub fn parse_package(body: &Value) -> Result<PackageSubmission, ValidationErrors> {
    let raw = parse_structure(body)?;
    build_submission(raw)
}

fn parse_structure(body: &Value) -> Result<RawPackage, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(root) = fields::body_object(body, &mut errors) else {
        return Err(errors);
    };
    let Some(data) = fields::required_object(root, "data", &mut errors) else {
        return Err(errors);
    };

    let mut data_errors = ValidationErrors::new();
    fields::choice(data, "type", &[PACKAGE_TYPE], &mut data_errors);
    let package = match fields::required_object(data, "attributes", &mut data_errors) {
        Some(attributes) => match parse_attributes(attributes) {
            Ok(package) => Some(package),
            Err(attribute_errors) => {
                data_errors.nest("attributes", attribute_errors);
                None
            }
        },
        None => None,
    };

    errors.nest("data", data_errors);
    match package {
        Some(package) if errors.is_empty() => Ok(package),
        _ => Err(errors),
    }
}

fn parse_attributes(attributes: &Map<String, Value>) -> Result<RawPackage, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    fields::choice(attributes, "profile", &[PACKAGE_PROFILE], &mut errors);
    let name = fields::char_field(
        attributes,
        "name",
        CharField::optional(MAX_CHAR_LENGTH),
        &mut errors,
    );
    let version = fields::char_field(
        attributes,
        "flow-results-specification",
        CharField::required(None),
        &mut errors,
    );
    let created = fields::optional_datetime(attributes, "created", &mut errors);
    let modified = fields::optional_datetime(attributes, "modified", &mut errors);
    let id = fields::optional_uuid(attributes, "id", &mut errors);
    let title = fields::char_field(
        attributes,
        "title",
        CharField::optional(MAX_CHAR_LENGTH),
        &mut errors,
    );

    let mut resources = Vec::new();
    if let Some(items) = fields::required_array(attributes, "resources", &mut errors) {
        let mut resource_errors = ValidationErrors::new();
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::Object(resource) => match parse_resource(resource) {
                    Ok(parsed) => resources.push(parsed),
                    Err(nested) => resource_errors.nest(index.to_string(), nested),
                },
                _ => resource_errors.add(index.to_string(), fields::NOT_AN_OBJECT),
            }
        }
        if resource_errors.is_empty() && items.len() != 1 {
            errors.add("resources", RESOURCES_LENGTH);
        }
        errors.nest("resources", resource_errors);
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    match (name, version, created, modified, id, title) {
        (Some(name), Some(version), Some(created), Some(modified), Some(id), Some(title)) => {
            Ok(RawPackage {
                id,
                name,
                version,
                created,
                modified,
                title,
                resources,
            })
        }
        _ => Err(errors),
    }
}

fn parse_resource(resource: &Map<String, Value>) -> Result<RawResource, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    fields::choice(resource, "mediatype", &[MEDIA_TYPE], &mut errors);
    fields::choice(resource, "encoding", &[ENCODING], &mut errors);

    let mut parsed = None;
    if let Some(schema) = fields::required_object(resource, "schema", &mut errors) {
        match parse_schema(schema) {
            Ok(schema) => parsed = Some(schema),
            Err(schema_errors) => errors.nest("schema", schema_errors),
        }
    }

    match parsed {
        Some(resource) if errors.is_empty() => Ok(resource),
        _ => Err(errors),
    }
}

fn parse_schema(schema: &Map<String, Value>) -> Result<RawResource, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let language = fields::char_field(schema, "language", CharField::optional(3), &mut errors);

    let mut questions = Vec::new();
    if let Some(declared) = fields::required_object(schema, "questions", &mut errors) {
        let mut question_errors = ValidationErrors::new();
        for (id, question) in declared {
            match question {
                Value::Object(question) => match parse_question(id, question) {
                    Ok(parsed) => questions.push(parsed),
                    Err(nested) => question_errors.nest(id.clone(), nested),
                },
                _ => question_errors.add(id.clone(), fields::NOT_AN_OBJECT),
            }
        }
        errors.nest("questions", question_errors);
    }

    match language {
        Some(language) if errors.is_empty() => Ok(RawResource {
            language,
            questions,
        }),
        _ => Err(errors),
    }
}

fn parse_question(id: &str, question: &Map<String, Value>) -> Result<RawQuestion, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let question_type = fields::char_field(question, "type", CharField::required(None), &mut errors);
    let label = fields::char_field(
        question,
        "label",
        CharField::required(Some(MAX_CHAR_LENGTH)),
        &mut errors,
    );
    let type_options = fields::required_object(question, "type_options", &mut errors);

    match (question_type, label, type_options) {
        (Some(question_type), Some(label), Some(type_options)) if errors.is_empty() => {
            Ok(RawQuestion {
                id: id.to_string(),
                question_type,
                label,
                type_options: type_options.clone(),
            })
        }
        _ => Err(errors),
    }
}

/// Model-level validation of a structurally sound package.
fn build_submission(raw: RawPackage) -> Result<PackageSubmission, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let version = match raw.version.parse::<FlowVersion>() {
        Ok(version) => version,
        Err(message) => {
            errors.add("flow-results-specification", message);
            FlowVersion::V1_0_0Rc1
        }
    };

    let now = Utc::now();
    let mut resources = raw.resources.into_iter();
    let resource = resources.next().unwrap_or(RawResource {
        language: String::new(),
        questions: Vec::new(),
    });

    let flow = Flow {
        id: raw.id.unwrap_or_else(Uuid::new_v4),
        name: raw.name,
        version,
        created: raw.created.unwrap_or(now),
        modified: raw.modified.unwrap_or(now),
        title: raw.title,
        language: resource.language,
    };

    let mut flow_errors = flow.validate();
    let language_errors = flow_errors.take("language");
    errors.merge(flow_errors);

    let mut schema_errors = ValidationErrors::new();
    schema_errors.extend("language", language_errors);

    let mut questions = Vec::with_capacity(resource.questions.len());
    let mut question_errors = ValidationErrors::new();
    for raw_question in resource.questions {
        let mut question_error = ValidationErrors::new();
        if let Some(message) = max_length_error(&raw_question.id) {
            question_error.add("id", message);
        }
        let question_type = match raw_question.question_type.parse::<QuestionType>() {
            Ok(question_type) => Some(question_type),
            Err(message) => {
                question_error.add("type", message);
                None
            }
        };
        if let Some(question_type) = question_type {
            question_error.extend(
                "type_options",
                validate_type_options(question_type, &raw_question.type_options),
            );
            questions.push(FlowQuestion::new(
                raw_question.id.clone(),
                question_type,
                raw_question.label,
                raw_question.type_options,
            ));
        }
        question_errors.nest(raw_question.id, question_error);
    }
    schema_errors.nest("questions", question_errors);

    let mut resource_errors = ValidationErrors::new();
    resource_errors.nest("schema", schema_errors);
    let mut resources_errors = ValidationErrors::new();
    resources_errors.nest("0", resource_errors);
    errors.nest("resources", resources_errors);

    if errors.is_empty() {
        Ok(PackageSubmission { flow, questions })
    } else {
        Err(errors.wrap("data.attributes"))
    }
}

/// The fixed column descriptor of response rows.
pub fn fields_descriptor() -> Value {
    json!([
        {"name": "timestamp", "title": "Timestamp", "type": "datetime"},
        {"name": "row_id", "title": "Row ID", "type": "string"},
        {"name": "contact_id", "title": "Contact ID", "type": "string"},
        {"name": "session_id", "title": "Session ID", "type": "string"},
        {"name": "question_id", "title": "Question ID", "type": "string"},
        {"name": "response_id", "title": "Response ID", "type": "any"},
        {"name": "response_metadata", "title": "Response Metadata", "type": "object"},
    ])
}

/// Full package document, as returned on creation and by the detail view.
///
/// `package_url` is the absolute URL of the package's detail view.
pub fn package_document(flow: &Flow, questions: &[FlowQuestion], package_url: &str) -> Value {
    let mut schema_questions = Map::new();
    for question in questions {
        schema_questions.insert(
            question.id.clone(),
            json!({
                "type": question.question_type.as_str(),
                "label": question.label,
                "type_options": question.type_options,
            }),
        );
    }

    json!({
        "data": {
            "type": PACKAGE_TYPE,
            "id": flow.id,
            "attributes": {
                "profile": PACKAGE_PROFILE,
                "name": flow.name,
                "flow-results-specification": flow.version.as_str(),
                "created": flow.created.to_rfc3339(),
                "modified": flow.modified.to_rfc3339(),
                "id": flow.id,
                "title": flow.title,
                "resources": [{
                    "path": null,
                    "api-data-url": responses_url(package_url),
                    "mediatype": MEDIA_TYPE,
                    "encoding": ENCODING,
                    "schema": {
                        "language": flow.language,
                        "fields": fields_descriptor(),
                        "questions": schema_questions,
                    },
                }],
            },
        },
        "links": {"self": package_url},
    })
}

/// Short package entry used by the collection listing.
pub fn package_summary(flow: &Flow) -> Value {
    json!({
        "type": PACKAGE_TYPE,
        "id": flow.id,
        "attributes": {
            "created": flow.created.to_rfc3339(),
            "modified": flow.modified.to_rfc3339(),
            "name": flow.name,
            "title": flow.title,
        },
    })
}

/// URL of the responses sub-resource of a package.
pub fn responses_url(package_url: &str) -> String {
    format!("{}/responses", package_url.trim_end_matches('/'))
}

/// Packages ordered by their storage sequence, paged by package id.
struct FlowSource<'a> {
    storage: &'a dyn StorageBackend,
}

#[async_trait]
impl SequencedSource for FlowSource<'_> {
    type Item = StoredFlow;

    async fn sequence_after(&self, cursor: &str) -> Result<Option<i64>, StorageError> {
        self.sequence(cursor).await
    }

    async fn sequence_before(&self, cursor: &str) -> Result<Option<i64>, StorageError> {
        self.sequence(cursor).await
    }

    async fn scan(&self, range: SequenceRange) -> Result<Vec<StoredFlow>, StorageError> {
        self.storage.scan_flows(range).await
    }

    fn cursor_of(item: &StoredFlow) -> String {
        flow_cursor(item)
    }

    fn sequence_of(item: &StoredFlow) -> i64 {
        item.primary_key
    }
}

fn flow_cursor(stored: &StoredFlow) -> String {
    stored.flow.id.to_string()
}

impl FlowSource<'_> {
    async fn sequence(&self, cursor: &str) -> Result<Option<i64>, StorageError> {
        match Uuid::parse_str(cursor) {
            Ok(id) => self.storage.flow_sequence(id).await,
            Err(_) => Ok(None),
        }
    }
}

/// Service for flow packages.
#[derive(Clone)]
pub struct PackageService {
    storage: Arc<dyn StorageBackend>,
    pagination: PaginationConfig,
}

impl PackageService {
    pub fn new(storage: Arc<dyn StorageBackend>, pagination: PaginationConfig) -> Self {
        Self {
            storage,
            pagination,
        }
    }

    /// Validate and store a package submission. Nothing is written unless the whole
    /// package is valid.
    pub async fn create_package(&self, body: &Value) -> Result<PackageSubmission, ServiceError> {
        let submission = parse_package(body)?;

        match self
            .storage
            .create_flow(&submission.flow, &submission.questions)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                let mut errors = ValidationErrors::new();
                errors.add("id", "flow with this id already exists.");
                return Err(errors.wrap("data.attributes").into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Created flow package {} with {} question(s)",
            submission.flow.id,
            submission.questions.len()
        );
        Ok(submission)
    }

    /// Load a package and its questions. Unknown ids are `NotFound`.
    pub async fn get_package(&self, id: Uuid) -> Result<(StoredFlow, Vec<FlowQuestion>), ServiceError> {
        let stored = self
            .storage
            .get_flow(id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let questions = self
            .storage
            .get_questions(stored.primary_key)
            .await?
            .into_iter()
            .map(|stored| stored.question)
            .collect();
        Ok((stored, questions))
    }

    /// One page of the package collection plus its links.
    pub async fn list_packages(
        &self,
        query: &[(String, String)],
        links: &PageLinks,
    ) -> Result<Value, ServiceError> {
        let size = self
            .pagination
            .effective_size(query_param(query, PAGE_SIZE_PARAM));
        let request = PageRequest::from_query(query, size);
        let source = FlowSource {
            storage: self.storage.as_ref(),
        };
        let page: CursorPage<StoredFlow> = paginate(&source, &request).await?;
        debug!("Listing {} package(s)", page.items.len());

        let next = page
            .next_cursor(flow_cursor)
            .map(|cursor| links.after(&cursor));
        let previous = page
            .previous_cursor(flow_cursor)
            .map(|cursor| links.before(&cursor));
        let data: Vec<Value> = page
            .items
            .iter()
            .map(|stored| package_summary(&stored.flow))
            .collect();

        Ok(json!({
            "data": data,
            "links": {
                "self": links.current(),
                "next": next,
                "previous": previous,
            },
        }))
    }
}
