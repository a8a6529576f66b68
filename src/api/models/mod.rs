// Models module - contains Flow, FlowQuestion, FlowResponse, the value codec and validation errors

pub mod errors;
pub mod flow;
pub mod question;
pub mod response;
pub mod value;

pub use errors::{ErrorNode, ValidationErrors};
pub use flow::{Flow, FlowVersion};
pub use question::{FlowQuestion, QuestionType, validate_type_options};
pub use response::{FlowResponse, NewFlowResponse, StoredResponse};
pub use value::{CodecError, ResponseValue, StoredValue, ValueType};
