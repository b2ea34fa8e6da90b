/// Error code registry for datagrowth
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Validation errors
/// - 3000-3999: Growth state errors
/// - 4000-4999: Transport errors
/// - 5000-5999: Processor errors
/// - 6000-6999: Storage errors
/// - 7000-7999: Serialization errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_UNKNOWN_PROCESSOR: u16 = 1003;
    pub const CONFIG_UNSUPPORTED_OPERATION: u16 = 1004;
    pub const CONFIG_UNKNOWN_CONTRIBUTE_TYPE: u16 = 1005;
    pub const CONFIG_UNKNOWN_RESOURCE: u16 = 1006;
    pub const CONFIG_UNKNOWN_ENTITY_KIND: u16 = 1007;
    pub const CONFIG_MISSING_KEY: u16 = 1008;

    // Validation errors (2000-2999)
    pub const VALIDATION_GENERIC: u16 = 2000;
    pub const VALIDATION_SCHEMA: u16 = 2001;
    pub const VALIDATION_UNEXPECTED_ARGS: u16 = 2002;
    pub const VALIDATION_UNSUPPORTED_METHOD: u16 = 2003;
    pub const VALIDATION_URL: u16 = 2004;
    pub const VALIDATION_TEMPLATE: u16 = 2005;
    pub const VALIDATION_RECORD: u16 = 2006;

    // Growth state errors (3000-3999)
    pub const STATE_ILLEGAL_TRANSITION: u16 = 3001;

    // Transport errors (4000-4999)
    pub const TRANSPORT_CLIENT: u16 = 4400;
    pub const TRANSPORT_SERVER: u16 = 4500;
    pub const TRANSPORT_NETWORK: u16 = 4001;

    // Processor errors (5000-5999)
    pub const PROCESSOR_GENERIC: u16 = 5000;
    pub const PROCESSOR_UNKNOWN_HANDLE: u16 = 5001;
    pub const PROCESSOR_TASK_PANICKED: u16 = 5002;
    pub const PROCESSOR_TASK_FAILED: u16 = 5003;

    // Storage errors (6000-6999)
    pub const STORAGE_GENERIC: u16 = 6000;
    pub const STORAGE_NOT_FOUND: u16 = 6001;

    // Serialization errors (7000-7999)
    pub const SERIALIZATION_JSON: u16 = 7001;
    pub const SERIALIZATION_TOML: u16 = 7002;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description of an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "Configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Failed to parse configuration",
        ErrorCode::CONFIG_UNKNOWN_PROCESSOR => "No processor registered under this name",
        ErrorCode::CONFIG_UNSUPPORTED_OPERATION => "Processor does not support this operation",
        ErrorCode::CONFIG_UNKNOWN_CONTRIBUTE_TYPE => "Unknown contribute type",
        ErrorCode::CONFIG_UNKNOWN_RESOURCE => "No resource kind registered under this name",
        ErrorCode::CONFIG_UNKNOWN_ENTITY_KIND => "No lookup registered for this entity kind",
        ErrorCode::CONFIG_MISSING_KEY => "Required configuration key is missing",

        ErrorCode::VALIDATION_GENERIC => "Validation failed",
        ErrorCode::VALIDATION_SCHEMA => "Arguments do not match the input schema",
        ErrorCode::VALIDATION_UNEXPECTED_ARGS => "Arguments given where none are accepted",
        ErrorCode::VALIDATION_UNSUPPORTED_METHOD => "Unsupported HTTP method",
        ErrorCode::VALIDATION_URL => "Invalid URL",
        ErrorCode::VALIDATION_TEMPLATE => "URI template could not be filled",
        ErrorCode::VALIDATION_RECORD => "Record rejected by organism",

        ErrorCode::STATE_ILLEGAL_TRANSITION => "Illegal growth state transition",

        ErrorCode::TRANSPORT_CLIENT => "Remote returned a client error (4xx)",
        ErrorCode::TRANSPORT_SERVER => "Remote returned a server error (5xx)",
        ErrorCode::TRANSPORT_NETWORK => "Network failure before a response was received",

        ErrorCode::PROCESSOR_GENERIC => "Processor error",
        ErrorCode::PROCESSOR_UNKNOWN_HANDLE => "Unknown task handle",
        ErrorCode::PROCESSOR_TASK_PANICKED => "Task panicked or was cancelled",
        ErrorCode::PROCESSOR_TASK_FAILED => "Task failed unrecoverably",

        ErrorCode::STORAGE_GENERIC => "Storage error",
        ErrorCode::STORAGE_NOT_FOUND => "Entity not found",

        ErrorCode::SERIALIZATION_JSON => "JSON (de)serialization failed",
        ErrorCode::SERIALIZATION_TOML => "TOML deserialization failed",

        _ => "Unknown error",
    }
}
