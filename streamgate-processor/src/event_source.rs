//! Classification of raw function invocation payloads.
//!
//! Probes run in a fixed order; the first match wins. Only the shape of the
//! payload is inspected, never its contents beyond the discriminating keys.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CloudFront,
    AwsConfig,
    CodeCommit,
    ApiGatewayAuthorizer,
    CloudFormation,
    Ses,
    ApiGatewayProxy,
    ScheduledEvent,
    CloudWatchLogs,
    Sns,
    Dynamodb,
    KinesisFirehose,
    CognitoSyncTrigger,
    Kinesis,
    S3,
    MobileBackend,
    Sqs,
    AppSyncResolver,
    StepFunction,
    LambdaFunction,
    EventBridge,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::CloudFront => "cloudfront",
            EventKind::AwsConfig => "aws-config",
            EventKind::CodeCommit => "codecommit",
            EventKind::ApiGatewayAuthorizer => "api-gateway-authorizer",
            EventKind::CloudFormation => "cloudformation",
            EventKind::Ses => "ses",
            EventKind::ApiGatewayProxy => "api-gateway-proxy",
            EventKind::ScheduledEvent => "scheduled-event",
            EventKind::CloudWatchLogs => "cloudwatch-logs",
            EventKind::Sns => "sns",
            EventKind::Dynamodb => "dynamodb",
            EventKind::KinesisFirehose => "kinesis-firehose",
            EventKind::CognitoSyncTrigger => "cognito-sync-trigger",
            EventKind::Kinesis => "kinesis",
            EventKind::S3 => "s3",
            EventKind::MobileBackend => "mobile-backend",
            EventKind::Sqs => "sqs",
            EventKind::AppSyncResolver => "appsync-resolver",
            EventKind::StepFunction => "step-function",
            EventKind::LambdaFunction => "lambda-function",
            EventKind::EventBridge => "eventbridge",
        };
        f.write_str(name)
    }
}

/// Identify the trigger that produced `event`, if known.
pub fn classify(event: &Value) -> Option<EventKind> {
    let first_record = event
        .get("Records")
        .and_then(Value::as_array)
        .and_then(|records| records.first());
    let record_source = |key: &str| {
        first_record
            .and_then(|r| r.get(key))
            .and_then(Value::as_str)
    };
    let has = |key: &str| event.get(key).is_some_and(|v| !v.is_null());
    let str_at = |key: &str| event.get(key).and_then(Value::as_str);
    let truthy = |key: &str| match event.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    };

    if first_record.is_some_and(|r| r.get("cf").is_some()) {
        return Some(EventKind::CloudFront);
    }
    if has("configRuleId") && has("configRuleName") && has("configRuleArn") {
        return Some(EventKind::AwsConfig);
    }
    if record_source("eventSource") == Some("aws:codecommit") {
        return Some(EventKind::CodeCommit);
    }
    if str_at("authorizationToken") == Some("incoming-client-token") {
        return Some(EventKind::ApiGatewayAuthorizer);
    }
    if has("StackId") && has("RequestType") && has("ResourceType") {
        return Some(EventKind::CloudFormation);
    }
    if record_source("eventSource") == Some("aws:ses") {
        return Some(EventKind::Ses);
    }
    if has("headers") && has("requestContext") {
        return Some(EventKind::ApiGatewayProxy);
    }
    if str_at("source") == Some("aws.events") {
        return Some(EventKind::ScheduledEvent);
    }
    if event
        .get("awslogs")
        .and_then(|logs| logs.get("data"))
        .is_some_and(|d| !d.is_null())
    {
        return Some(EventKind::CloudWatchLogs);
    }
    if record_source("EventSource") == Some("aws:sns") {
        return Some(EventKind::Sns);
    }
    if record_source("eventSource") == Some("aws:dynamodb") {
        return Some(EventKind::Dynamodb);
    }
    if is_firehose(event) {
        return Some(EventKind::KinesisFirehose);
    }
    if str_at("eventType") == Some("SyncTrigger") && has("identityId") && has("identityPoolId") {
        return Some(EventKind::CognitoSyncTrigger);
    }
    if record_source("eventSource") == Some("aws:kinesis") {
        return Some(EventKind::Kinesis);
    }
    if record_source("eventSource") == Some("aws:s3") {
        return Some(EventKind::S3);
    }
    if has("operation") && has("message") {
        return Some(EventKind::MobileBackend);
    }
    if record_source("eventSource") == Some("aws:sqs") {
        return Some(EventKind::Sqs);
    }
    if truthy("IS_APPSYNC") {
        return Some(EventKind::AppSyncResolver);
    }
    if truthy("IS_STEP_FUNCTION") {
        return Some(EventKind::StepFunction);
    }
    if truthy("IS_LAMBDA_FUNCTION") {
        return Some(EventKind::LambdaFunction);
    }
    if has("detail-type") {
        return Some(EventKind::EventBridge);
    }
    None
}

fn is_firehose(event: &Value) -> bool {
    let Some(records) = event.get("records").and_then(Value::as_array) else {
        return false;
    };
    let arrival = records
        .first()
        .and_then(|r| r.get("approximateArrivalTimestamp"))
        .is_some_and(|v| !v.is_null());
    let stream_arn = event
        .get("deliveryStreamArn")
        .and_then(Value::as_str)
        .is_some_and(|arn| arn.starts_with("arn:aws:kinesis:"));
    arrival || stream_arn
}
