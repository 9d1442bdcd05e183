//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to [`StoreError`] so the retry decorator and the
//! repository never see SDK types.

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;

use super::store::StoreError;

/// Service error codes that may succeed when the request is sent again.
const RETRYABLE_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
];

/// Cancellation reasons of a transaction that may succeed when retried.
const RETRYABLE_CANCELLATION_REASONS: &[&str] = &[
    "TransactionConflict",
    "ThrottlingError",
    "ProvisionedThroughputExceeded",
];

/// Map a single-operation SDK error to StoreError.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient(message)
        }
        _ => match err.as_service_error().and_then(|e| e.code()) {
            Some("ConditionalCheckFailedException") => StoreError::ConditionFailed,
            Some(code) if RETRYABLE_CODES.contains(&code) => StoreError::Transient(message),
            _ => StoreError::Request(message),
        },
    }
}

/// Map a TransactWriteItems SDK error to StoreError.
///
/// A canceled transaction is only retryable when it was canceled by a
/// conflict or by throttling, never by a failed condition.
pub fn map_transaction_error<R>(err: SdkError<TransactWriteItemsError, R>) -> StoreError
where
    R: Debug + Send + Sync + 'static,
{
    if let Some(TransactWriteItemsError::TransactionCanceledException(canceled)) =
        err.as_service_error()
    {
        let message = DisplayErrorContext(canceled).to_string();
        if RETRYABLE_CANCELLATION_REASONS
            .iter()
            .any(|reason| message.contains(reason))
        {
            return StoreError::Transient(message);
        }
        return StoreError::TransactionCanceled(message);
    }

    map_sdk_error(err)
}

/// Map a request builder error (a required field was not set) to StoreError.
pub fn map_build_error(err: BuildError) -> StoreError {
    StoreError::Request(err.to_string())
}
