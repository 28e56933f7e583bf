//! Structured logging helpers for task/queue/storage operations. Each
//! function logs one named operation with the fields an operator greps
//! for most: correlation id, status/stage, queue depth, error context.

pub fn log_task_operation(operation: &str, correlation_id: &str, status: Option<&str>, stage: Option<&str>) {
    tracing::info!(operation, correlation_id, status, stage, "task operation");
}

pub fn log_queue_operation(operation: &str, queue_name: &str, correlation_id: Option<&str>, message_count: Option<u32>) {
    tracing::info!(operation, queue_name, correlation_id, message_count, "queue operation");
}

pub fn log_connection_operation(operation: &str, service: &str, status: &str) {
    tracing::info!(operation, service, status, "connection operation");
}

pub fn log_storage_operation(operation: &str, correlation_id: &str, storage_type: &str, key: Option<&str>) {
    tracing::info!(operation, correlation_id, storage_type, key, "storage operation");
}

pub fn log_error_with_context(error: &dyn std::fmt::Display, operation: &str, correlation_id: Option<&str>) {
    tracing::error!(operation, correlation_id, error_message = %error, "error in task operation");
}
